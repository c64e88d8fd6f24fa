//! CFG-based IR: data model, builder, CFG queries, formatter, verifier.

pub mod builder;
pub mod cfg;
pub mod format;
pub mod model;
pub mod verify;

pub use builder::FuncBuilder;
pub use cfg::Cfg;
pub use format::format_func;
pub use model::{
    BlockData, BlockId, BuiltinOp, FuncRef, FuncRefKind, Function, InstData, InstId, InstKind,
    MethodRef, Terminator, Ty, ValueId, ValueUser, for_each_operand, for_each_term_operand,
    replace_value_in_func, replace_value_in_inst, replace_value_in_term,
};
pub use verify::{VerifyIrError, verify_function};

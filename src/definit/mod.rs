//! Definite initialization checking.
//!
//! For every tracked memory object the pass proves each use initialized,
//! emits diagnostics where it cannot, resolves polymorphic `assign`s into
//! concrete stores, and inserts runtime liveness-bitmap logic where control
//! flow makes the initialization state dynamic. Afterwards the raw
//! instructions that exist only for this pass's benefit are lowered away.

mod checker;
mod collect;
mod control;
mod errors;
mod lattice;
mod liveness;
mod lower;
mod memory;

pub use collect::{CollectedUses, MemoryUse, UseKind, collect_uses};
pub use errors::{DefInitDiagKind, Diagnostic, InitCall};
pub use lattice::{AvailabilitySet, DiKind, merge_kinds};
pub use memory::{ElementInfo, MemoryObject, MemoryRole};

use crate::ir::{FuncBuilder, Function, InstKind, replace_value_in_func};
use checker::DefInitChecker;
use lower::lower_assign;

/// Runs the pass over one function: checks every tracked memory object, then
/// lowers the residual raw instructions.
pub fn run(func: &mut Function, objects: Vec<MemoryObject>) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    for object in objects {
        check_memory_object(func, object, &mut diags);
    }
    lower_raw_ops(func);
    diags
}

/// Checks a single memory object against freshly collected uses.
pub fn check_memory_object(
    func: &mut Function,
    object: MemoryObject,
    diags: &mut Vec<Diagnostic>,
) {
    let collected = collect_uses(func, &object);
    DefInitChecker::new(func, object, collected, diags).check();
}

/// Lowers the raw instructions once checking is done: residual `assign`s
/// become plain assignments, `mark_uninit` resolves to its operand, and
/// escape markers disappear.
fn lower_raw_ops(func: &mut Function) {
    for inst in func.inst_ids() {
        if func.inst(inst).deleted {
            continue;
        }
        match &func.inst(inst).kind {
            InstKind::Assign { .. } => {
                let mut builder = FuncBuilder::before_inst(func, inst);
                lower_assign(&mut builder, inst, false, false);
            }
            InstKind::MarkUninit { ptr } => {
                let ptr = *ptr;
                let result = func.result_of(inst);
                replace_value_in_func(func, result, ptr);
                let mut builder = FuncBuilder::before_inst(func, inst);
                builder.erase_inst(inst);
            }
            InstKind::MarkFuncEscape { .. } => {
                let mut builder = FuncBuilder::before_inst(func, inst);
                builder.erase_inst(inst);
            }
            _ => {}
        }
    }
}

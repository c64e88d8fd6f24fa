//! Text formatter for the IR.
//!
//! Output is deterministic and line-oriented so tests can compare dumps
//! verbatim.

use std::fmt::Write as _;

use crate::ir::model::{
    BlockId, BuiltinOp, Function, FuncRefKind, InstId, InstKind, Terminator, Ty, ValueId,
};

pub fn format_func(func: &Function) -> String {
    let mut formatter = Formatter::new();
    formatter.write_function(func);
    formatter.finish()
}

struct Formatter {
    out: String,
}

impl Formatter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn finish(self) -> String {
        self.out
    }

    fn write_function(&mut self, func: &Function) {
        let _ = writeln!(&mut self.out, "fn {} {{", func.name);
        for block in func.block_ids() {
            self.write_block(func, block);
        }
        let _ = writeln!(&mut self.out, "}}");
    }

    fn write_block(&mut self, func: &Function, block: BlockId) {
        let _ = writeln!(&mut self.out, "{}:", bb(block));
        for &inst in &func.block(block).insts {
            self.write_inst(func, inst);
        }
        self.write_terminator(&func.block(block).term);
    }

    fn write_inst(&mut self, func: &Function, inst: InstId) {
        let data = func.inst(inst);
        self.out.push_str("  ");
        if let Some(result) = data.result {
            let _ = write!(&mut self.out, "{} = ", val(result));
        }
        match &data.kind {
            InstKind::AllocStack { ty } => {
                let _ = write!(&mut self.out, "alloc_stack {}", ty_name(*ty));
            }
            InstKind::AllocBox { ty } => {
                let _ = write!(&mut self.out, "alloc_box {}", ty_name(*ty));
            }
            InstKind::MarkUninit { ptr } => {
                let _ = write!(&mut self.out, "mark_uninit {}", val(*ptr));
            }
            InstKind::ElementAddr { base, index } => {
                let _ = write!(&mut self.out, "element_addr {}, {}", val(*base), index);
            }
            InstKind::RefFieldAddr { base, field } => {
                let _ = write!(&mut self.out, "ref_field_addr {}, #{}", val(*base), field);
            }
            InstKind::Load { addr } => {
                let _ = write!(&mut self.out, "load {}", val(*addr));
            }
            InstKind::Store { value, addr } => {
                let _ = write!(&mut self.out, "store {} to {}", val(*value), val(*addr));
            }
            InstKind::Assign { value, addr } => {
                let _ = write!(&mut self.out, "assign {} to {}", val(*value), val(*addr));
            }
            InstKind::CopyAddr {
                src,
                dst,
                is_init,
                is_take,
            } => {
                let _ = write!(&mut self.out, "copy_addr {} to {}", val(*src), val(*dst));
                if *is_take {
                    self.out.push_str(" [take]");
                }
                if *is_init {
                    self.out.push_str(" [init]");
                }
            }
            InstKind::StoreWeak {
                value,
                addr,
                is_init,
            } => {
                let _ = write!(&mut self.out, "store_weak {} to {}", val(*value), val(*addr));
                if *is_init {
                    self.out.push_str(" [init]");
                }
            }
            InstKind::DestroyAddr { addr } => {
                let _ = write!(&mut self.out, "destroy_addr {}", val(*addr));
            }
            InstKind::Release { value } => {
                let _ = write!(&mut self.out, "release {}", val(*value));
            }
            InstKind::DeallocStack { addr } => {
                let _ = write!(&mut self.out, "dealloc_stack {}", val(*addr));
            }
            InstKind::DeallocBox { value } => {
                let _ = write!(&mut self.out, "dealloc_box {}", val(*value));
            }
            InstKind::DeallocRef { value } => {
                let _ = write!(&mut self.out, "dealloc_ref {}", val(*value));
            }
            InstKind::IntLiteral { value, bits } => {
                let _ = write!(&mut self.out, "int {} : i{}", value, bits);
            }
            InstKind::Builtin { op, args } => {
                let _ = write!(&mut self.out, "builtin {}(", builtin_name(*op));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    let _ = write!(&mut self.out, "{}", val(*arg));
                }
                self.out.push(')');
            }
            InstKind::Upcast { value } => {
                let _ = write!(&mut self.out, "upcast {}", val(*value));
            }
            InstKind::ClassMethod { base, method } => {
                let _ = write!(&mut self.out, "class_method {}, #{}", val(*base), method.name);
            }
            InstKind::FunctionRef { func } => {
                let marker = match func.kind {
                    FuncRefKind::Normal => "",
                    FuncRefKind::SuperInit => " [super.init]",
                    FuncRefKind::SelfInit => " [self.init]",
                };
                let _ = write!(&mut self.out, "function_ref @{}{}", func.name, marker);
            }
            InstKind::Apply { callee, args } => {
                let _ = write!(&mut self.out, "apply {}(", val(*callee));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    let _ = write!(&mut self.out, "{}", val(*arg));
                }
                self.out.push(')');
            }
            InstKind::AddressToPointer { addr } => {
                let _ = write!(&mut self.out, "address_to_pointer {}", val(*addr));
            }
            InstKind::MarkFuncEscape { addrs } => {
                self.out.push_str("mark_func_escape ");
                for (i, addr) in addrs.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    let _ = write!(&mut self.out, "{}", val(*addr));
                }
            }
        }
        self.out.push('\n');
    }

    fn write_terminator(&mut self, term: &Terminator) {
        self.out.push_str("  ");
        match term {
            Terminator::Br { target } => {
                let _ = write!(&mut self.out, "br {}", bb(*target));
            }
            Terminator::CondBr {
                cond,
                then_bb,
                else_bb,
            } => {
                let _ = write!(
                    &mut self.out,
                    "cond_br {}, {}, {}",
                    val(*cond),
                    bb(*then_bb),
                    bb(*else_bb)
                );
            }
            Terminator::Return { value } => match value {
                Some(value) => {
                    let _ = write!(&mut self.out, "ret {}", val(*value));
                }
                None => self.out.push_str("ret"),
            },
            Terminator::Unreachable => self.out.push_str("unreachable"),
        }
        self.out.push('\n');
    }
}

fn val(value: ValueId) -> String {
    format!("%{}", value.0)
}

fn bb(block: BlockId) -> String {
    format!("bb{}", block.0)
}

fn ty_name(ty: Ty) -> String {
    match ty {
        Ty::Int { bits } => format!("$i{}", bits),
        Ty::Bool => "$bool".to_string(),
        Ty::Address => "$addr".to_string(),
        Ty::Object => "$object".to_string(),
        Ty::Opaque => "$opaque".to_string(),
    }
}

fn builtin_name(op: BuiltinOp) -> String {
    match op {
        BuiltinOp::Or { bits } => format!("or_Int{}", bits),
        BuiltinOp::LShr { bits } => format!("lshr_Int{}", bits),
        BuiltinOp::TruncToI1 { bits } => format!("trunc_Int{}_Int1", bits),
    }
}

#[cfg(test)]
#[path = "../tests/t_format.rs"]
mod tests;

//! Structural IR verifier.
//!
//! Checks arena/block bookkeeping invariants the rewrite stages rely on:
//! every value defined once, every operand defined by a live instruction,
//! block membership consistent, terminator targets valid.

use std::collections::HashSet;
use std::fmt;

use crate::ir::model::{
    BlockId, Function, Terminator, ValueId, for_each_operand, for_each_term_operand,
};

#[derive(Debug, Clone)]
pub struct VerifyIrError {
    message: String,
}

impl VerifyIrError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for VerifyIrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for VerifyIrError {}

pub fn verify_function(func: &Function) -> Result<(), VerifyIrError> {
    let mut defined: HashSet<ValueId> = HashSet::new();
    let mut linked: HashSet<_> = HashSet::new();

    for block in func.block_ids() {
        for &inst in &func.block(block).insts {
            let data = func.inst(inst);
            if data.deleted {
                return Err(err(
                    func,
                    Some(block),
                    format!("deleted inst {:?} still linked", inst),
                ));
            }
            if data.block != block {
                return Err(err(
                    func,
                    Some(block),
                    format!("inst {:?} parent says {:?}", inst, data.block),
                ));
            }
            if !linked.insert(inst) {
                return Err(err(
                    func,
                    Some(block),
                    format!("inst {:?} linked more than once", inst),
                ));
            }
            if let Some(result) = data.result
                && !defined.insert(result)
            {
                return Err(err(
                    func,
                    Some(block),
                    format!("duplicate value {:?}", result),
                ));
            }
        }
    }

    for block in func.block_ids() {
        for &inst in &func.block(block).insts {
            let mut use_error = None;
            for_each_operand(&func.inst(inst).kind, |value| {
                if use_error.is_none() && !defined.contains(&value) {
                    use_error = Some(err(
                        func,
                        Some(block),
                        format!("use of undefined value {:?}", value),
                    ));
                }
            });
            if let Some(error) = use_error {
                return Err(error);
            }
        }
        verify_terminator(func, block, &defined)?;
    }

    Ok(())
}

fn verify_terminator(
    func: &Function,
    block: BlockId,
    defined: &HashSet<ValueId>,
) -> Result<(), VerifyIrError> {
    let term = &func.block(block).term;

    let mut use_error = None;
    for_each_term_operand(term, |value| {
        if use_error.is_none() && !defined.contains(&value) {
            use_error = Some(err(
                func,
                Some(block),
                format!("terminator uses undefined value {:?}", value),
            ));
        }
    });
    if let Some(error) = use_error {
        return Err(error);
    }

    let check_target = |target: BlockId| -> Result<(), VerifyIrError> {
        if target.index() >= func.num_blocks() {
            return Err(err(
                func,
                Some(block),
                format!("branch to invalid block {:?}", target),
            ));
        }
        Ok(())
    };

    match term {
        Terminator::Br { target } => check_target(*target),
        Terminator::CondBr {
            then_bb, else_bb, ..
        } => {
            check_target(*then_bb)?;
            check_target(*else_bb)
        }
        Terminator::Return { .. } | Terminator::Unreachable => Ok(()),
    }
}

fn err(func: &Function, block: Option<BlockId>, message: String) -> VerifyIrError {
    match block {
        Some(block) => VerifyIrError::new(format!("{}/bb{}: {}", func.name, block.0, message)),
        None => VerifyIrError::new(format!("{}: {}", func.name, message)),
    }
}

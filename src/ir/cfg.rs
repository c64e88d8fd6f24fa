//! Control-flow graph utilities.

use std::collections::HashSet;

use crate::ir::model::{BlockId, Function, Terminator};

/// Control-flow graph for a single function, built from block terminators.
pub struct Cfg {
    entry: BlockId,
    preds: Vec<Vec<BlockId>>,
    succs: Vec<Vec<BlockId>>,
}

impl Cfg {
    pub fn new(func: &Function) -> Self {
        let num_blocks = func.num_blocks();
        let mut preds = vec![Vec::new(); num_blocks];
        let mut succs = vec![Vec::new(); num_blocks];

        for block in func.block_ids() {
            let mut block_succs = Vec::new();
            match &func.block(block).term {
                Terminator::Br { target } => {
                    push_unique(&mut block_succs, *target);
                }
                Terminator::CondBr {
                    then_bb, else_bb, ..
                } => {
                    push_unique(&mut block_succs, *then_bb);
                    push_unique(&mut block_succs, *else_bb);
                }
                Terminator::Return { .. } | Terminator::Unreachable => {}
            }

            for succ in &block_succs {
                push_unique(&mut preds[succ.index()], block);
            }
            succs[block.index()] = block_succs;
        }

        Self {
            entry: func.entry(),
            preds,
            succs,
        }
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        &self.preds[block.index()]
    }

    pub fn succs(&self, block: BlockId) -> &[BlockId] {
        &self.succs[block.index()]
    }

    /// The set of blocks reachable from the entry block.
    pub fn reachable_from_entry(&self) -> HashSet<BlockId> {
        let mut reachable = HashSet::new();
        let mut worklist = vec![self.entry];
        reachable.insert(self.entry);
        while let Some(block) = worklist.pop() {
            for &succ in self.succs(block) {
                if reachable.insert(succ) {
                    worklist.push(succ);
                }
            }
        }
        reachable
    }
}

/// Blocks that end in a `Return`, in block order.
pub fn return_blocks(func: &Function) -> Vec<BlockId> {
    func.block_ids()
        .filter(|&bb| matches!(func.block(bb).term, Terminator::Return { .. }))
        .collect()
}

fn push_unique(list: &mut Vec<BlockId>, block: BlockId) {
    if !list.contains(&block) {
        list.push(block);
    }
}

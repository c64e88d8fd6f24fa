//! On-demand, memoized liveness dataflow.
//!
//! `liveness_at` answers "how initialized is each element of the window just
//! before this instruction executes". Per-block live-out values are computed
//! by merging predecessor live-outs into local facts and cached behind the
//! `LiveOutState` tri-state; a block being recomputed contributes nothing to
//! its own cycle, and a result still containing Unknown is never cached so a
//! later query retries it.

use super::checker::{DefInitChecker, LiveOutState, MEMORY_INST_USE};
use super::lattice::{AvailabilitySet, DiKind, merge_kinds};
use crate::ir::{BlockId, InstId};

impl DefInitChecker<'_> {
    /// Availability of elements `[first, first + num)` immediately before
    /// `inst`. Elements outside the window may not be computed correctly.
    pub(super) fn liveness_at(&mut self, inst: InstId, first: u32, num: u32) -> AvailabilitySet {
        let num_elements = self.memory.num_elements();
        let mut result = AvailabilitySet::new(num_elements);

        // An empty window cares about nothing.
        if num == 0 {
            return result;
        }

        let inst_block = self.func.inst(inst).block;

        // The single-element case is by far the most common; it avoids the
        // needed-elements bookkeeping entirely.
        if num_elements == 1 {
            if self.block_state_mut(inst_block).has_non_load_use {
                let position = self.position_in_block(inst, inst_block);
                let insts = self.func.block(inst_block).insts[..position].to_vec();
                for &prev in insts.iter().rev() {
                    if !self.non_load_uses.contains_key(&prev) {
                        continue;
                    }
                    // Reaching the defining instruction means nothing was
                    // stored yet; any other non-load use settles it to Yes.
                    let kind = if prev == self.memory.inst {
                        DiKind::No
                    } else {
                        DiKind::Yes
                    };
                    result.set(0, kind);
                    return result;
                }
            }

            let mut value = None;
            self.preds_live_out_1(inst_block, &mut value);

            // Still unknown only inside a cycle not dominated by the memory
            // definition; that code is unreachable, so default to Yes rather
            // than making every caller handle it.
            result.set(0, value.unwrap_or(DiKind::Yes));
            return result;
        }

        let mut needed = vec![false; num_elements as usize];
        for i in first..first + num {
            needed[i as usize] = true;
        }

        if self.block_state_mut(inst_block).has_non_load_use {
            let position = self.position_in_block(inst, inst_block);
            let insts = self.func.block(inst_block).insts[..position].to_vec();
            for &prev in insts.iter().rev() {
                if prev == self.memory.inst {
                    // Above the definition nothing exists; whatever the local
                    // scan already satisfied stays satisfied.
                    for i in first..first + num {
                        let kind = if needed[i as usize] {
                            DiKind::No
                        } else {
                            DiKind::Yes
                        };
                        result.set(i, kind);
                    }
                    return result;
                }

                let Some(&use_idx) = self.non_load_uses.get(&prev) else {
                    continue;
                };
                assert_ne!(use_idx, MEMORY_INST_USE);
                let memory_use = self.uses[use_idx];
                let end = memory_use.first_element + memory_use.num_elements;
                for i in memory_use.first_element..end {
                    needed[i as usize] = false;
                }
                if needed.iter().all(|&still_needed| !still_needed) {
                    result.change_unset_to(DiKind::Yes);
                    return result;
                }
            }
        }

        self.preds_live_out_n(inst_block, &mut result);

        for i in first..first + num {
            // Locally satisfied elements win over predecessor information,
            // and unknown elements get the unreachable-cycle default.
            if !needed[i as usize] || result.get_conditional(i).is_none() {
                result.set(i, DiKind::Yes);
            }
        }
        result
    }

    fn position_in_block(&self, inst: InstId, block: BlockId) -> usize {
        self.func
            .block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .unwrap_or_else(|| panic!("inst {:?} not linked in {:?}", inst, block))
    }

    fn live_out_1(&mut self, block: BlockId) -> Option<DiKind> {
        match self.block_state_mut(block).live_out {
            LiveOutState::Known => {
                return Some(self.block_state_mut(block).availability.get(0));
            }
            // A cycle: contribute nothing and let the other predecessors
            // decide.
            LiveOutState::InProgress => return None,
            LiveOutState::Unknown => {}
        }

        // A local definition is live out regardless of what predecessors
        // think; a not-defined predecessor cannot drop it to Partial.
        let local = self.block_state_mut(block).availability.get_conditional(0);
        if local == Some(DiKind::Yes) {
            let state = self.block_state_mut(block);
            state.availability.set(0, DiKind::Yes);
            state.live_out = LiveOutState::Known;
            return local;
        }

        self.block_state_mut(block).live_out = LiveOutState::InProgress;

        let mut result = local;
        self.preds_live_out_1(block, &mut result);

        let state = self.block_state_mut(block);
        match result {
            Some(kind) => {
                state.availability.set(0, kind);
                state.live_out = LiveOutState::Known;
            }
            None => {
                // Unknown means a predecessor is mid-computation. Caching it
                // would freeze a wrong answer; revert so a later query
                // recomputes.
                state.live_out = LiveOutState::Unknown;
            }
        }
        result
    }

    fn preds_live_out_1(&mut self, block: BlockId, result: &mut Option<DiKind>) {
        for pred in self.cfg.preds(block).to_vec() {
            *result = merge_kinds(*result, self.live_out_1(pred));
        }
    }

    fn live_out_n(&mut self, block: BlockId) -> AvailabilitySet {
        let num_elements = self.memory.num_elements();
        match self.block_state_mut(block).live_out {
            LiveOutState::Known => return self.block_state_mut(block).availability.clone(),
            LiveOutState::InProgress => return AvailabilitySet::new(num_elements),
            LiveOutState::Unknown => {}
        }

        self.block_state_mut(block).live_out = LiveOutState::InProgress;

        let mut result = AvailabilitySet::new(num_elements);
        self.preds_live_out_n(block, &mut result);

        // Local definitions win over predecessor merges.
        let local = self.block_state_mut(block).availability.clone();
        for i in 0..num_elements {
            if local.get_conditional(i) == Some(DiKind::Yes) {
                result.set(i, DiKind::Yes);
            }
        }

        let state = self.block_state_mut(block);
        if !result.contains_unknown() {
            state.availability = result.clone();
            state.live_out = LiveOutState::Known;
        } else {
            state.live_out = LiveOutState::Unknown;
        }
        result
    }

    fn preds_live_out_n(&mut self, block: BlockId, result: &mut AvailabilitySet) {
        for pred in self.cfg.preds(block).to_vec() {
            let pred_out = self.live_out_n(pred);
            result.merge_in(&pred_out);
        }
    }
}

#[cfg(test)]
#[path = "../tests/t_liveness.rs"]
mod tests;

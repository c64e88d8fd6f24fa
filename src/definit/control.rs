//! Runtime control logic for flow-dependent initialization state.
//!
//! When a store may be an initialization or an assignment depending on the
//! path taken, a per-element liveness bitmap on the stack disambiguates it at
//! runtime: bits are set at each dynamic initialization, and ambiguous stores
//! and partially-live destroys test the bits through a CFG diamond.

use crate::diag::Span;
use crate::ir::{BlockId, BuiltinOp, FuncBuilder, InstKind, Terminator, Ty, ValueId, cfg};

use super::checker::DefInitChecker;
use super::collect::UseKind;
use super::lattice::DiKind;
use super::lower::erase_dead_addr_chain;

pub(super) struct CfgDiamond {
    pub(super) true_bb: BlockId,
    #[allow(dead_code)]
    pub(super) false_bb: Option<BlockId>,
    pub(super) cont_bb: BlockId,
}

/// Splits the block at the builder's cursor and wires up a conditional
/// branch: a fresh true block (and optionally a false block) branching to the
/// continuation. The builder is left at the start of the continuation.
pub(super) fn insert_cfg_diamond(
    builder: &mut FuncBuilder,
    cond: ValueId,
    with_false_block: bool,
) -> CfgDiamond {
    let start = builder.current_block();
    let cont_bb = builder.split_block();

    let true_bb = builder.add_block();
    builder.set_terminator(true_bb, Terminator::Br { target: cont_bb });

    let false_bb = with_false_block.then(|| {
        let false_bb = builder.add_block();
        builder.set_terminator(false_bb, Terminator::Br { target: cont_bb });
        false_bb
    });

    builder.set_terminator(
        start,
        Terminator::CondBr {
            cond,
            then_bb: true_bb,
            else_bb: false_bb.unwrap_or(cont_bb),
        },
    );

    builder.set_point_block_start(cont_bb);
    CfgDiamond {
        true_bb,
        false_bb,
        cont_bb,
    }
}

/// The address of one element of the tracked memory. Single-element objects
/// are addressed directly.
fn emit_element_addr(
    builder: &mut FuncBuilder,
    base: ValueId,
    element: u32,
    num_memory_elements: u32,
    span: Span,
) -> ValueId {
    if num_memory_elements == 1 {
        return base;
    }
    let inst = builder.element_addr(base, element, span);
    builder.func().result_of(inst)
}

fn all_ones(bits: u32) -> u64 {
    if bits >= 64 { !0 } else { (1u64 << bits) - 1 }
}

impl DefInitChecker<'_> {
    /// Allocates the per-element liveness bitmap, keeps it up to date at
    /// every initialization, and rewrites each ambiguous store into
    /// "destroy-if-live, then initialize" diamonds. Returns the bitmap
    /// address for the conditional-destroy rewrite.
    pub(super) fn insert_conditional_init_assign(&mut self) -> ValueId {
        let span = Span::SYNTHESIZED;
        let num_bits = self.memory.num_memory_elements();
        assert!(
            num_bits >= 1 && num_bits <= 64,
            "liveness bitmap limited to 64 elements"
        );
        let memory_inst = self.memory.inst;

        // The bitmap lives for the whole function: allocated first thing in
        // the entry block, deallocated before every return, zeroed right
        // after the tracked allocation comes into existence.
        let control_addr = {
            let mut builder = FuncBuilder::new(self.func);
            let alloc = builder.alloc_stack(Ty::Int { bits: num_bits }, span);
            let control_addr = builder.func().result_of(alloc);

            for block in cfg::return_blocks(builder.func()) {
                builder.set_point_block_end(block);
                builder.dealloc_stack(control_addr, span);
            }

            builder.set_point_after(memory_inst);
            let zero_inst = builder.int_literal(0, num_bits, span);
            let zero = builder.func().result_of(zero_inst);
            builder.store(zero, control_addr, span);
            control_addr
        };

        let mut i = 0;
        while i < self.uses.len() {
            let memory_use = self.uses[i];
            let Some(inst) = memory_use.inst else {
                i += 1;
                continue;
            };

            match memory_use.kind {
                UseKind::InitOrAssign => {}
                UseKind::Initialization => {
                    // Keep the bitmap in sync. Trivial elements never get
                    // destroyed, so their bits don't need to be precise.
                    if !memory_use.only_touches_trivial_elements(&self.memory) {
                        let mask = memory_use.element_bitmask(num_bits);
                        let mut builder = FuncBuilder::before_inst(self.func, inst);
                        let mask_inst = builder.int_literal(mask, num_bits, span);
                        let mut mask_value = builder.func().result_of(mask_inst);
                        if mask != all_ones(num_bits) {
                            let load = builder.load(control_addr, span);
                            let loaded = builder.func().result_of(load);
                            let or = builder.builtin(
                                BuiltinOp::Or { bits: num_bits },
                                vec![loaded, mask_value],
                                span,
                            );
                            mask_value = builder.func().result_of(or);
                        }
                        builder.store(mask_value, control_addr, span);
                    }
                    i += 1;
                    continue;
                }
                // Inout uses, escapes, and resolved assignments only happen
                // when some initialization already made the element live.
                _ => {
                    i += 1;
                    continue;
                }
            }

            // An ambiguous store of only trivial elements needs no dynamic
            // logic at all.
            if memory_use.only_touches_trivial_elements(&self.memory) {
                i += 1;
                continue;
            }

            // Destroy whatever is live, element by element, so the store
            // below is always an initialization.
            let memory_addr = self.func.result_of(memory_inst);
            {
                let mut builder = FuncBuilder::before_inst(self.func, inst);
                let load = builder.load(control_addr, span);
                let bitmask = builder.func().result_of(load);

                let end = (memory_use.first_element + memory_use.num_elements).min(num_bits);
                for element in memory_use.first_element..end {
                    builder.set_point_before(inst);
                    let mut cond = bitmask;
                    if num_bits != 1 {
                        if element != 0 {
                            let amount_inst =
                                builder.int_literal(element as u64, num_bits, span);
                            let amount = builder.func().result_of(amount_inst);
                            let shifted = builder.builtin(
                                BuiltinOp::LShr { bits: num_bits },
                                vec![cond, amount],
                                span,
                            );
                            cond = builder.func().result_of(shifted);
                        }
                        let trunc = builder.builtin(
                            BuiltinOp::TruncToI1 { bits: num_bits },
                            vec![cond],
                            span,
                        );
                        cond = builder.func().result_of(trunc);
                    }

                    let diamond = insert_cfg_diamond(&mut builder, cond, false);
                    builder.set_point_block_start(diamond.true_bb);
                    let element_addr =
                        emit_element_addr(&mut builder, memory_addr, element, num_bits, span);
                    let destroy = builder.destroy_addr(element_addr, span);
                    self.releases.push(Some(destroy));
                    builder.set_point_block_start(diamond.cont_bb);
                }
            }

            // The store is now provably an initialization; resolve it and
            // revisit this index so the new form gets its bitmap update.
            self.uses[i].kind = UseKind::Initialization;
            self.update_inst_for_init_state(i);
        }

        control_addr
    }

    /// Rewrites each release of possibly-partial memory: statically destroy
    /// the known-live elements, skip the known-dead ones, and test the
    /// bitmap for the rest. Class self additionally frees the object memory.
    pub(super) fn process_conditional_destroys(&mut self, control_addr: Option<ValueId>) {
        let num_bits = self.memory.num_memory_elements();
        let memory_inst = self.memory.inst;

        let destroys = std::mem::take(&mut self.conditional_destroys);
        for (release_idx, availability) in destroys {
            let release = self.releases[release_idx].expect("conditional release vanished");
            let span = self.func.inst(release).span;
            let released_addr = match &self.func.inst(release).kind {
                InstKind::DestroyAddr { addr } => *addr,
                InstKind::Release { value } => *value,
                other => panic!("unexpected conditional release {:?}", other),
            };
            let memory_addr = self.func.result_of(memory_inst);

            let mut loaded_mask: Option<ValueId> = None;
            for element in 0..num_bits {
                match availability.get(element) {
                    // Known dead: nothing to destroy.
                    DiKind::No => continue,
                    DiKind::Yes => {
                        let mut builder = FuncBuilder::before_inst(self.func, release);
                        let element_addr =
                            emit_element_addr(&mut builder, memory_addr, element, num_bits, span);
                        let destroy = builder.destroy_addr(element_addr, span);
                        self.releases.push(Some(destroy));
                        continue;
                    }
                    DiKind::Partial => {}
                }

                let control_addr =
                    control_addr.expect("partially live element without a control bitmap");
                let mut builder = FuncBuilder::before_inst(self.func, release);
                let mask = match loaded_mask {
                    Some(mask) => mask,
                    None => {
                        let load = builder.load(control_addr, span);
                        let mask = builder.func().result_of(load);
                        loaded_mask = Some(mask);
                        mask
                    }
                };

                let mut cond = mask;
                if num_bits != 1 {
                    if element != 0 {
                        let amount_inst = builder.int_literal(element as u64, num_bits, span);
                        let amount = builder.func().result_of(amount_inst);
                        let shifted = builder.builtin(
                            BuiltinOp::LShr { bits: num_bits },
                            vec![cond, amount],
                            span,
                        );
                        cond = builder.func().result_of(shifted);
                    }
                    let trunc =
                        builder.builtin(BuiltinOp::TruncToI1 { bits: num_bits }, vec![cond], span);
                    cond = builder.func().result_of(trunc);
                }

                let diamond = insert_cfg_diamond(&mut builder, cond, false);
                builder.set_point_block_start(diamond.true_bb);
                let element_addr =
                    emit_element_addr(&mut builder, memory_addr, element, num_bits, span);
                let destroy = builder.destroy_addr(element_addr, span);
                self.releases.push(Some(destroy));
            }

            // An early exit from a class initializer still has to free the
            // object allocation (and the box holding it, when present).
            if self.memory.is_class_init_self() {
                let box_value = self.box_storage();
                let mut builder = FuncBuilder::before_inst(self.func, release);
                let object_inst = builder.load(memory_addr, span);
                let object = builder.func().result_of(object_inst);
                builder.dealloc_ref(object, span);
                if let Some(box_value) = box_value {
                    let dealloc_box = builder.dealloc_box(box_value, span);
                    self.releases.push(Some(dealloc_box));
                }
            }

            let mut builder = FuncBuilder::before_inst(self.func, release);
            builder.erase_inst(release);
            erase_dead_addr_chain(&mut builder, released_addr);
            self.releases[release_idx] = None;
        }
    }
}

#[cfg(test)]
#[path = "../tests/t_control.rs"]
mod tests;

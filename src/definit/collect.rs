//! Structural use collection.
//!
//! Walks the users of a tracked allocation's address and classifies each into
//! a `MemoryUse` over a contiguous element window, plus the list of release
//! instructions that end the object's lifetime. Classification is
//! conservative: any user the walk does not recognize becomes an `Escape`.

use crate::ir::{FuncRefKind, Function, InstId, InstKind, ValueId, ValueUser};

use super::memory::MemoryObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Load,
    IndirectIn,
    InOutUse,
    Initialization,
    Assign,
    InitOrAssign,
    PartialStore,
    Escape,
    SuperInit,
    SelfInit,
}

/// An instruction touching elements `[first_element, first_element +
/// num_elements)` of a memory object. `inst` goes to `None` when a rewrite
/// deletes the instruction but the entry must stay in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUse {
    pub inst: Option<InstId>,
    pub kind: UseKind,
    pub first_element: u32,
    pub num_elements: u32,
}

impl MemoryUse {
    pub fn new(inst: InstId, kind: UseKind, first_element: u32, num_elements: u32) -> Self {
        Self {
            inst: Some(inst),
            kind,
            first_element,
            num_elements,
        }
    }

    /// Bitmask of the touched element indices within an `n`-bit liveness
    /// bitmap; elements past the bitmap (the synthetic super-init element)
    /// are not represented.
    pub fn element_bitmask(&self, num_memory_elements: u32) -> u64 {
        assert!(
            num_memory_elements <= 64,
            "liveness bitmap limited to 64 elements"
        );
        let mut mask = 0u64;
        let end = (self.first_element + self.num_elements).min(num_memory_elements);
        for i in self.first_element..end {
            mask |= 1u64 << i;
        }
        mask
    }

    /// True if every element the use touches has a trivial destructor; such
    /// uses never need bitmap updates.
    pub fn only_touches_trivial_elements(&self, memory: &MemoryObject) -> bool {
        memory.range_is_trivial(self.first_element, self.num_elements)
    }
}

#[derive(Debug, Default)]
pub struct CollectedUses {
    pub uses: Vec<MemoryUse>,
    pub releases: Vec<InstId>,
}

/// Collects the uses and releases of `memory` within `func`, in arena order.
pub fn collect_uses(func: &Function, memory: &MemoryObject) -> CollectedUses {
    let mut collected = CollectedUses::default();
    let addr = func.result_of(memory.inst);
    let num_elements = memory.num_elements();

    for user in func.users_of(addr) {
        let ValueUser::Inst(inst) = user else {
            // An address reaching a terminator directly has escaped our
            // understanding of it.
            continue;
        };
        collect_direct_use(func, memory, inst, addr, num_elements, &mut collected);
    }

    collected
}

fn collect_direct_use(
    func: &Function,
    memory: &MemoryObject,
    inst: InstId,
    addr: ValueId,
    num_elements: u32,
    collected: &mut CollectedUses,
) {
    let full = (0, num_elements);
    match &func.inst(inst).kind {
        InstKind::Store { addr: a, .. } | InstKind::Assign { addr: a, .. } if *a == addr => {
            push_use(collected, inst, UseKind::InitOrAssign, full);
        }
        InstKind::StoreWeak {
            addr: a, is_init, ..
        } if *a == addr => {
            let kind = if *is_init {
                UseKind::Initialization
            } else {
                UseKind::InitOrAssign
            };
            push_use(collected, inst, kind, full);
        }
        InstKind::CopyAddr { src, dst, is_init, .. } => {
            if *dst == addr {
                let kind = if *is_init {
                    UseKind::Initialization
                } else {
                    UseKind::InitOrAssign
                };
                push_use(collected, inst, kind, full);
            }
            if *src == addr {
                push_use(collected, inst, UseKind::IndirectIn, full);
            }
        }
        InstKind::Load { .. } => {
            // Uses of a delegating initializer's self are all-or-nothing;
            // loads of it count as escapes of the whole value.
            let kind = if memory.is_delegating_init() {
                UseKind::Escape
            } else {
                UseKind::Load
            };
            push_use(collected, inst, kind, full);
        }
        InstKind::ElementAddr { index, .. } => {
            collect_projection(func, memory, inst, *index, collected);
        }
        InstKind::Apply { callee, args } if args.contains(&addr) => {
            match callee_kind(func, *callee) {
                FuncRefKind::SuperInit => {
                    push_use(collected, inst, UseKind::SuperInit, full);
                }
                FuncRefKind::SelfInit => {
                    push_use(collected, inst, UseKind::SelfInit, (0, 1));
                }
                FuncRefKind::Normal => {
                    push_use(collected, inst, UseKind::InOutUse, full);
                }
            }
        }
        InstKind::DestroyAddr { .. }
        | InstKind::Release { .. }
        | InstKind::DeallocStack { .. }
        | InstKind::DeallocBox { .. }
        | InstKind::DeallocRef { .. } => {
            collected.releases.push(inst);
        }
        _ => {
            push_use(collected, inst, UseKind::Escape, full);
        }
    }
}

/// Classifies the users of one projected element address. Stores through a
/// projection are per-element initializations for multi-element objects and
/// intra-element partial stores for single-element aggregates; a nested
/// projection always makes its stores partial.
fn collect_projection(
    func: &Function,
    memory: &MemoryObject,
    elem_addr_inst: InstId,
    index: u32,
    collected: &mut CollectedUses,
) {
    let num_elements = memory.num_elements();
    assert!(
        index < num_elements || num_elements == 1,
        "projection index {} out of range for memory object",
        index
    );
    let (window, store_kind) = if num_elements > 1 {
        ((index, 1), UseKind::InitOrAssign)
    } else {
        ((0, 1), UseKind::PartialStore)
    };

    let elem_value = func.result_of(elem_addr_inst);
    for user in func.users_of(elem_value) {
        let ValueUser::Inst(inst) = user else {
            continue;
        };
        match &func.inst(inst).kind {
            InstKind::Store { addr, .. } | InstKind::Assign { addr, .. }
                if *addr == elem_value =>
            {
                push_use(collected, inst, store_kind, window);
            }
            InstKind::StoreWeak { addr, .. } if *addr == elem_value => {
                push_use(collected, inst, store_kind, window);
            }
            InstKind::CopyAddr { src, dst, is_init, .. } => {
                if *dst == elem_value {
                    let kind = if *is_init {
                        UseKind::Initialization
                    } else {
                        store_kind
                    };
                    push_use(collected, inst, kind, window);
                }
                if *src == elem_value {
                    push_use(collected, inst, UseKind::IndirectIn, window);
                }
            }
            InstKind::Load { .. } => {
                push_use(collected, inst, UseKind::Load, window);
            }
            InstKind::ElementAddr { .. } => {
                // Deeper projection: any store below this point is a partial
                // store into the window element.
                collect_nested_projection(func, inst, window, collected);
            }
            InstKind::Apply { args, .. } if args.contains(&elem_value) => {
                push_use(collected, inst, UseKind::InOutUse, window);
            }
            _ => {
                push_use(collected, inst, UseKind::Escape, window);
            }
        }
    }
}

fn collect_nested_projection(
    func: &Function,
    elem_addr_inst: InstId,
    window: (u32, u32),
    collected: &mut CollectedUses,
) {
    let elem_value = func.result_of(elem_addr_inst);
    for user in func.users_of(elem_value) {
        let ValueUser::Inst(inst) = user else {
            continue;
        };
        match &func.inst(inst).kind {
            InstKind::Store { addr, .. }
            | InstKind::Assign { addr, .. }
            | InstKind::StoreWeak { addr, .. }
                if *addr == elem_value =>
            {
                push_use(collected, inst, UseKind::PartialStore, window);
            }
            InstKind::CopyAddr { src, dst, .. } => {
                if *dst == elem_value {
                    push_use(collected, inst, UseKind::PartialStore, window);
                }
                if *src == elem_value {
                    push_use(collected, inst, UseKind::Load, window);
                }
            }
            InstKind::Load { .. } => {
                push_use(collected, inst, UseKind::Load, window);
            }
            InstKind::ElementAddr { .. } => {
                collect_nested_projection(func, inst, window, collected);
            }
            _ => {
                push_use(collected, inst, UseKind::Escape, window);
            }
        }
    }
}

fn callee_kind(func: &Function, callee: ValueId) -> FuncRefKind {
    for id in func.inst_ids() {
        let inst = func.inst(id);
        if inst.deleted || inst.result != Some(callee) {
            continue;
        }
        if let InstKind::FunctionRef { func: fref } = &inst.kind {
            return fref.kind;
        }
        break;
    }
    FuncRefKind::Normal
}

fn push_use(collected: &mut CollectedUses, inst: InstId, kind: UseKind, window: (u32, u32)) {
    collected
        .uses
        .push(MemoryUse::new(inst, kind, window.0, window.1));
}

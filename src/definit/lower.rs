//! Lowering of the polymorphic `assign` instruction.

use crate::ir::{FuncBuilder, InstId, InstKind, ValueId};

pub(super) struct LoweredAssign {
    pub(super) load: Option<InstId>,
    pub(super) store: InstId,
}

/// Replaces an `assign` with its concrete sequence. Initializations and
/// trivially-destructible destinations become a plain store; a real
/// assignment loads the old value, stores the new one, and releases the old.
/// The incoming value is already retained, so no extra retain is emitted.
pub(super) fn lower_assign(
    builder: &mut FuncBuilder,
    assign: InstId,
    is_init: bool,
    dest_trivial: bool,
) -> LoweredAssign {
    let (value, addr, span) = {
        let data = builder.func().inst(assign);
        let InstKind::Assign { value, addr } = &data.kind else {
            panic!("lowering a non-assign instruction {:?}", data.kind);
        };
        (*value, *addr, data.span)
    };

    builder.set_point_before(assign);

    if is_init || dest_trivial {
        let store = builder.store(value, addr, span);
        builder.erase_inst(assign);
        return LoweredAssign { load: None, store };
    }

    let load = builder.load(addr, span);
    let old = builder.func().result_of(load);
    let store = builder.store(value, addr, span);
    builder.release(old, span);
    builder.erase_inst(assign);
    LoweredAssign {
        load: Some(load),
        store,
    }
}

/// Erases a pure address computation left without users, walking down its
/// operand chain. Anything with side effects or remaining users stays.
pub(super) fn erase_dead_addr_chain(builder: &mut FuncBuilder, value: ValueId) {
    let Some(inst) = builder.func().defining_inst(value) else {
        return;
    };
    let base = match &builder.func().inst(inst).kind {
        InstKind::ElementAddr { base, .. }
        | InstKind::Upcast { value: base }
        | InstKind::AddressToPointer { addr: base } => *base,
        _ => return,
    };
    if !builder.func().users_of(value).is_empty() {
        return;
    }
    builder.erase_inst(inst);
    erase_dead_addr_chain(builder, base);
}

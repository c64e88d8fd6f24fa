use crate::definit::collect::{MemoryUse, UseKind};
use crate::definit::memory::{ElementInfo, MemoryObject, MemoryRole};
use crate::definit::run;
use crate::diag::Span;
use crate::ir::{
    BuiltinOp, FuncBuilder, Function, InstId, InstKind, Terminator, Ty, ValueId, verify_function,
};

fn span() -> Span {
    Span::point(1, 1)
}

fn count_insts(func: &Function, pred: impl Fn(&InstKind) -> bool) -> usize {
    func.inst_ids()
        .filter(|&id| !func.inst(id).deleted && pred(&func.inst(id).kind))
        .count()
}

fn emit_local(builder: &mut FuncBuilder) -> (ValueId, InstId) {
    let alloc = builder.alloc_stack(Ty::Opaque, span());
    let addr = builder.func().result_of(alloc);
    let mark = builder.mark_uninit(addr, span());
    let mark_addr = builder.func().result_of(mark);
    (mark_addr, mark)
}

#[test]
fn test_element_bitmask_windows() {
    let whole = MemoryUse::new(InstId(0), UseKind::Initialization, 0, 3);
    assert_eq!(whole.element_bitmask(3), 0b111);

    let middle = MemoryUse::new(InstId(0), UseKind::Initialization, 1, 1);
    assert_eq!(middle.element_bitmask(3), 0b010);

    // The synthetic super-init element sits past the bitmap and drops out.
    let with_super = MemoryUse::new(InstId(0), UseKind::Initialization, 0, 3);
    assert_eq!(with_super.element_bitmask(2), 0b11);

    let wide = MemoryUse::new(InstId(0), UseKind::Initialization, 0, 64);
    assert_eq!(wide.element_bitmask(64), !0u64);
}

#[test]
fn test_statically_partial_destroy_splits_per_element() {
    // Element 0 is always initialized, element 1 never; the destroy must
    // shrink to a single static element destroy.
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let (addr, mark) = emit_local(&mut b);

    let elem0 = b.element_addr(addr, 0, span());
    let elem0 = b.func().result_of(elem0);
    let lit = b.int_literal(1, 64, span());
    let value = b.func().result_of(lit);
    b.store(value, elem0, span());

    let destroy = b.destroy_addr(addr, span());
    b.dealloc_stack(addr, span());
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    let elements = vec![ElementInfo::new("t.0", false), ElementInfo::new("t.1", false)];
    let object = MemoryObject::new(mark, MemoryRole::LocalVar, elements, span());
    let diags = run(&mut func, vec![object]);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);

    // The whole-object destroy is gone, replaced by a destroy of element 0
    // only; no dynamic checks were needed.
    assert!(func.inst(destroy).deleted);
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DestroyAddr { .. })),
        1
    );
    assert_eq!(count_insts(&func, |k| matches!(k, InstKind::Builtin { .. })), 0);
    let diamonds = func
        .block_ids()
        .filter(|&bb| matches!(func.block(bb).term, Terminator::CondBr { .. }))
        .count();
    assert_eq!(diamonds, 0);
    verify_function(&func).expect("well-formed after rewrite");
}

#[test]
fn test_dynamically_partial_destroy_tests_the_bitmap() {
    // if c { x = a }; destroy x
    let mut func = Function::new("f");
    let entry = func.entry();
    let then_bb = func.add_block();
    let cont = func.add_block();

    let mut b = FuncBuilder::new(&mut func);
    let (addr, mark) = emit_local(&mut b);
    let cond = b.int_literal(1, 1, span());
    let cond = b.func().result_of(cond);
    b.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            then_bb,
            else_bb: cont,
        },
    );

    b.set_point_block_start(then_bb);
    let lit = b.int_literal(1, 64, span());
    let value = b.func().result_of(lit);
    b.store(value, addr, span());
    b.set_terminator(then_bb, Terminator::Br { target: cont });

    b.set_point_block_start(cont);
    let destroy = b.destroy_addr(addr, span());
    b.dealloc_stack(addr, span());
    b.set_terminator(cont, Terminator::Return { value: None });
    drop(b);

    let object = MemoryObject::new(
        mark,
        MemoryRole::LocalVar,
        vec![ElementInfo::new("x", false)],
        span(),
    );
    let diags = run(&mut func, vec![object]);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);

    // Bitmap allocated, zeroed, updated at the initialization, then tested
    // at the destroy point through a diamond.
    assert_eq!(
        count_insts(&func, |k| matches!(
            k,
            InstKind::AllocStack {
                ty: Ty::Int { bits: 1 }
            }
        )),
        1
    );
    assert!(func.inst(destroy).deleted);
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DestroyAddr { .. })),
        1
    );
    let diamonds = func
        .block_ids()
        .filter(|&bb| matches!(func.block(bb).term, Terminator::CondBr { .. }))
        .count();
    assert_eq!(diamonds, 2, "source branch plus one bitmap test");
    verify_function(&func).expect("well-formed after rewrite");
}

#[test]
fn test_multi_element_bitmap_shifts_and_truncates() {
    // if c { x.0 = a }; x = b  -- the whole-object store must test each
    // element's bit separately.
    let mut func = Function::new("f");
    let entry = func.entry();
    let then_bb = func.add_block();
    let cont = func.add_block();

    let mut b = FuncBuilder::new(&mut func);
    let (addr, mark) = emit_local(&mut b);
    let cond = b.int_literal(1, 1, span());
    let cond = b.func().result_of(cond);
    b.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            then_bb,
            else_bb: cont,
        },
    );

    b.set_point_block_start(then_bb);
    let elem0 = b.element_addr(addr, 0, span());
    let elem0 = b.func().result_of(elem0);
    let lit = b.int_literal(1, 64, span());
    let value = b.func().result_of(lit);
    b.store(value, elem0, span());
    b.set_terminator(then_bb, Terminator::Br { target: cont });

    b.set_point_block_start(cont);
    let lit = b.int_literal(2, 64, span());
    let value = b.func().result_of(lit);
    b.store(value, addr, span());
    b.load(addr, span());
    b.set_terminator(cont, Terminator::Return { value: None });
    drop(b);

    let elements = vec![ElementInfo::new("x.0", false), ElementInfo::new("x.1", false)];
    let object = MemoryObject::new(mark, MemoryRole::LocalVar, elements, span());
    let diags = run(&mut func, vec![object]);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);

    assert_eq!(
        count_insts(&func, |k| matches!(
            k,
            InstKind::AllocStack {
                ty: Ty::Int { bits: 2 }
            }
        )),
        1
    );
    // One guarded destroy per element of the ambiguous store.
    let diamonds = func
        .block_ids()
        .filter(|&bb| matches!(func.block(bb).term, Terminator::CondBr { .. }))
        .count();
    assert_eq!(diamonds, 3, "source branch plus one bitmap test per element");
    assert_eq!(
        count_insts(&func, |k| matches!(
            k,
            InstKind::Builtin {
                op: BuiltinOp::TruncToI1 { .. },
                ..
            }
        )),
        2
    );
    assert_eq!(
        count_insts(&func, |k| matches!(
            k,
            InstKind::Builtin {
                op: BuiltinOp::LShr { .. },
                ..
            }
        )),
        1,
        "only the second element needs a shift"
    );
    verify_function(&func).expect("well-formed after rewrite");
}

#[test]
fn test_class_self_early_release_is_rejected_and_freed() {
    let mut func = Function::new("C.init");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let alloc = b.alloc_box(Ty::Object, span());
    let box_addr = b.func().result_of(alloc);
    let mark = b.mark_uninit(box_addr, span());
    let addr = b.func().result_of(mark);

    let elem0 = b.element_addr(addr, 0, span());
    let elem0 = b.func().result_of(elem0);
    let lit = b.int_literal(1, 64, span());
    let value = b.func().result_of(lit);
    b.store(value, elem0, span());

    let release = b.release(addr, Span::point(4, 5));
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    let elements = vec![ElementInfo::new("x", false), ElementInfo::new("y", false)];
    let object = MemoryObject::new(mark, MemoryRole::RootClassSelf, elements, span());
    let diags = run(&mut func, vec![object]);

    // Partial cleanup of a class self is rejected, but the IR is still made
    // coherent: the live element is destroyed and the object memory freed.
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].kind,
        crate::definit::DefInitDiagKind::ObjectNotFullyInitializedBeforeFailure
    );
    assert!(func.inst(release).deleted);
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DestroyAddr { .. })),
        1
    );
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DeallocRef { .. })),
        1
    );
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DeallocBox { .. })),
        1
    );
    verify_function(&func).expect("well-formed after rewrite");
}

#[test]
fn test_class_self_release_with_nothing_initialized() {
    let mut func = Function::new("C.init");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let alloc = b.alloc_box(Ty::Object, span());
    let box_addr = b.func().result_of(alloc);
    let mark = b.mark_uninit(box_addr, span());
    let addr = b.func().result_of(mark);
    let release = b.release(addr, Span::point(2, 5));
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    let elements = vec![ElementInfo::new("x", false)];
    let object = MemoryObject::new(mark, MemoryRole::RootClassSelf, elements, span());
    let diags = run(&mut func, vec![object]);

    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].kind,
        crate::definit::DefInitDiagKind::ObjectNotFullyInitializedBeforeFailure
    );
    // The release is replaced by a direct free; nothing gets destroyed.
    assert!(func.inst(release).deleted);
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DestroyAddr { .. })),
        0
    );
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DeallocRef { .. })),
        1
    );
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::DeallocBox { .. })),
        1
    );
    verify_function(&func).expect("well-formed after rewrite");
}

#[test]
fn test_fully_initialized_destroy_is_left_alone() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let (addr, mark) = emit_local(&mut b);
    let lit = b.int_literal(1, 64, span());
    let value = b.func().result_of(lit);
    b.store(value, addr, span());
    let destroy = b.destroy_addr(addr, span());
    b.dealloc_stack(addr, span());
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    let object = MemoryObject::new(
        mark,
        MemoryRole::LocalVar,
        vec![ElementInfo::new("x", false)],
        span(),
    );
    let diags = run(&mut func, vec![object]);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    assert!(!func.inst(destroy).deleted);
    assert_eq!(
        count_insts(&func, |k| matches!(k, InstKind::AllocStack { ty: Ty::Int { .. } })),
        0
    );
    verify_function(&func).expect("well-formed after rewrite");
}

use crate::diag::Span;
use crate::ir::cfg::return_blocks;
use crate::ir::{
    Cfg, FuncBuilder, Function, InstKind, Terminator, Ty, ValueId, ValueUser, verify_function,
};

fn span() -> Span {
    Span::point(1, 1)
}

#[test]
fn test_builder_emits_in_program_order() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let alloc = b.alloc_stack(Ty::Opaque, span());
    let addr = b.func().result_of(alloc);
    let value = b.int_literal(7, 64, span());
    let value = b.func().result_of(value);
    let store = b.store(value, addr, span());
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    let insts = &func.block(entry).insts;
    assert_eq!(insts.len(), 3);
    assert_eq!(insts[2], store);
    assert!(matches!(func.inst(insts[0]).kind, InstKind::AllocStack { .. }));
    verify_function(&func).expect("well-formed function");
}

#[test]
fn test_split_block_moves_tail_and_terminator() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let alloc = b.alloc_stack(Ty::Opaque, span());
    let addr = b.func().result_of(alloc);
    let lit = b.int_literal(1, 64, span());
    let value = b.func().result_of(lit);
    let store = b.store(value, addr, span());
    b.set_terminator(entry, Terminator::Return { value: None });

    b.set_point_before(store);
    let cont = b.split_block();
    b.set_terminator(entry, Terminator::Br { target: cont });
    drop(b);

    assert_eq!(func.block(entry).insts.len(), 2);
    assert_eq!(func.block(cont).insts, vec![store]);
    assert_eq!(func.inst(store).block, cont);
    assert!(matches!(func.block(cont).term, Terminator::Return { .. }));
    assert!(matches!(func.block(entry).term, Terminator::Br { .. }));
    verify_function(&func).expect("well-formed function");
}

#[test]
fn test_erase_inst_unlinks_and_marks_deleted() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let alloc = b.alloc_stack(Ty::Opaque, span());
    let addr = b.func().result_of(alloc);
    let load = b.load(addr, span());
    b.set_terminator(entry, Terminator::Return { value: None });
    b.erase_inst(load);
    drop(b);

    assert!(func.inst(load).deleted);
    assert_eq!(func.block(entry).insts.len(), 1);
    verify_function(&func).expect("well-formed function");
}

#[test]
fn test_users_of_sees_insts_and_terminators() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let lit = b.int_literal(3, 64, span());
    let value = b.func().result_of(lit);
    let alloc = b.alloc_stack(Ty::Opaque, span());
    let addr = b.func().result_of(alloc);
    let store = b.store(value, addr, span());
    b.set_terminator(entry, Terminator::Return { value: Some(value) });
    drop(b);

    let users = func.users_of(value);
    assert_eq!(users, vec![ValueUser::Inst(store), ValueUser::Term(entry)]);
    assert_eq!(func.defining_inst(value), Some(lit));
}

#[test]
fn test_cfg_preds_succs_and_reachability() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let then_bb = func.add_block();
    let else_bb = func.add_block();
    let join = func.add_block();
    let orphan = func.add_block();

    let mut b = FuncBuilder::new(&mut func);
    let cond = b.int_literal(1, 1, span());
    let cond = b.func().result_of(cond);
    b.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            then_bb,
            else_bb,
        },
    );
    b.set_terminator(then_bb, Terminator::Br { target: join });
    b.set_terminator(else_bb, Terminator::Br { target: join });
    b.set_terminator(join, Terminator::Return { value: None });
    b.set_terminator(orphan, Terminator::Br { target: join });
    drop(b);

    let cfg = Cfg::new(&func);
    assert_eq!(cfg.succs(entry), &[then_bb, else_bb]);
    assert_eq!(cfg.preds(join), &[then_bb, else_bb, orphan]);

    let reachable = cfg.reachable_from_entry();
    assert!(reachable.contains(&join));
    assert!(!reachable.contains(&orphan));

    assert_eq!(return_blocks(&func), vec![join]);
}

#[test]
fn test_verify_rejects_undefined_value_use() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    b.emit_raw(InstKind::Load { addr: ValueId(99) }, span());
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    let error = verify_function(&func).unwrap_err();
    assert!(error.to_string().contains("undefined value"));
}

#[test]
fn test_verify_rejects_double_linked_inst() {
    let mut func = Function::new("f");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let alloc = b.alloc_stack(Ty::Opaque, span());
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    func.block_mut(entry).insts.push(alloc);
    let error = verify_function(&func).unwrap_err();
    assert!(error.to_string().contains("linked more than once"));
}

#[test]
fn test_verify_rejects_branch_to_invalid_block() {
    let mut func = Function::new("f");
    let entry = func.entry();
    func.block_mut(entry).term = Terminator::Br {
        target: crate::ir::BlockId(42),
    };
    let error = verify_function(&func).unwrap_err();
    assert!(error.to_string().contains("invalid block"));
}

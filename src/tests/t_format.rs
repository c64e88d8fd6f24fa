use indoc::indoc;

use crate::diag::Span;
use crate::ir::{BuiltinOp, FuncBuilder, Function, Terminator, Ty, format_func};

#[test]
fn test_format_straight_line_function() {
    let mut func = Function::new("init_local");
    let entry = func.entry();
    let mut b = FuncBuilder::new(&mut func);
    let span = Span::point(1, 1);
    let alloc = b.alloc_stack(Ty::Opaque, span);
    let addr = b.func().result_of(alloc);
    let mark = b.mark_uninit(addr, span);
    let mark_addr = b.func().result_of(mark);
    let lit = b.int_literal(7, 64, span);
    let value = b.func().result_of(lit);
    b.assign(value, mark_addr, span);
    b.set_terminator(entry, Terminator::Return { value: None });
    drop(b);

    assert_eq!(
        format_func(&func),
        indoc! {"
            fn init_local {
            bb0:
              %0 = alloc_stack $opaque
              %1 = mark_uninit %0
              %2 = int 7 : i64
              assign %2 to %1
              ret
            }
        "}
    );
}

#[test]
fn test_format_branching_with_builtins() {
    let mut func = Function::new("guarded");
    let entry = func.entry();
    let then_bb = func.add_block();
    let join = func.add_block();

    let mut b = FuncBuilder::new(&mut func);
    let span = Span::point(1, 1);
    let mask = b.int_literal(2, 2, span);
    let mask = b.func().result_of(mask);
    let amount = b.int_literal(1, 2, span);
    let amount = b.func().result_of(amount);
    let shifted = b.builtin(BuiltinOp::LShr { bits: 2 }, vec![mask, amount], span);
    let shifted = b.func().result_of(shifted);
    let cond = b.builtin(BuiltinOp::TruncToI1 { bits: 2 }, vec![shifted], span);
    let cond = b.func().result_of(cond);
    b.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            then_bb,
            else_bb: join,
        },
    );
    b.set_terminator(then_bb, Terminator::Br { target: join });
    b.set_terminator(join, Terminator::Return { value: None });
    drop(b);

    assert_eq!(
        format_func(&func),
        indoc! {"
            fn guarded {
            bb0:
              %0 = int 2 : i2
              %1 = int 1 : i2
              %2 = builtin lshr_Int2(%0, %1)
              %3 = builtin trunc_Int2_Int1(%2)
              cond_br %3, bb1, bb2
            bb1:
              br bb2
            bb2:
              ret
            }
        "}
    );
}

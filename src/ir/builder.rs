//! Cursor-based instruction builder.
//!
//! Provides a small API for emitting instructions at an insertion point,
//! splitting blocks, and erasing instructions without exposing raw arena
//! bookkeeping. Emission advances the cursor, so consecutive emits appear in
//! program order.

use crate::diag::Span;
use crate::ir::model::{
    BlockId, BuiltinOp, Function, InstId, InstKind, Terminator, Ty, ValueId,
};

pub struct FuncBuilder<'a> {
    func: &'a mut Function,
    block: BlockId,
    ip: usize,
}

impl<'a> FuncBuilder<'a> {
    /// Positions the cursor at the start of the entry block.
    pub fn new(func: &'a mut Function) -> Self {
        let entry = func.entry();
        Self {
            func,
            block: entry,
            ip: 0,
        }
    }

    /// Positions the cursor immediately before `inst`.
    pub fn before_inst(func: &'a mut Function, inst: InstId) -> Self {
        let mut builder = Self::new(func);
        builder.set_point_before(inst);
        builder
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn current_block(&self) -> BlockId {
        self.block
    }

    pub fn set_point_before(&mut self, inst: InstId) {
        let block = self.func.inst(inst).block;
        let ip = self
            .func
            .block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .unwrap_or_else(|| panic!("inst {:?} not linked in its block", inst));
        self.block = block;
        self.ip = ip;
    }

    pub fn set_point_after(&mut self, inst: InstId) {
        self.set_point_before(inst);
        self.ip += 1;
    }

    pub fn set_point_block_start(&mut self, block: BlockId) {
        self.block = block;
        self.ip = 0;
    }

    /// Positions the cursor at the end of a block, before its terminator.
    pub fn set_point_block_end(&mut self, block: BlockId) {
        self.block = block;
        self.ip = self.func.block(block).insts.len();
    }

    pub fn add_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        self.func.block_mut(block).term = term;
    }

    /// Splits the current block at the cursor. Everything from the cursor on,
    /// including the terminator, moves to a fresh block; the current block is
    /// left unterminated for the caller to re-terminate. The cursor stays in
    /// the (now shorter) current block.
    pub fn split_block(&mut self) -> BlockId {
        let cont = self.func.add_block();
        let moved: Vec<InstId> = self.func.block_mut(self.block).insts.split_off(self.ip);
        for &inst in &moved {
            self.func.inst_mut(inst).block = cont;
        }
        let term = std::mem::replace(
            &mut self.func.block_mut(self.block).term,
            Terminator::Unreachable,
        );
        let cont_block = self.func.block_mut(cont);
        cont_block.insts = moved;
        cont_block.term = term;
        cont
    }

    /// Marks an instruction deleted and unlinks it from its block.
    pub fn erase_inst(&mut self, inst: InstId) {
        let block = self.func.inst(inst).block;
        let block_data = self.func.block_mut(block);
        if let Some(pos) = block_data.insts.iter().position(|&i| i == inst) {
            block_data.insts.remove(pos);
            if block == self.block && pos < self.ip {
                self.ip -= 1;
            }
        }
        self.func.inst_mut(inst).deleted = true;
    }

    fn emit(&mut self, kind: InstKind, span: Span) -> InstId {
        let id = self.func.alloc_inst(kind, span, self.block);
        self.func.block_mut(self.block).insts.insert(self.ip, id);
        self.ip += 1;
        id
    }

    pub fn alloc_stack(&mut self, ty: Ty, span: Span) -> InstId {
        self.emit(InstKind::AllocStack { ty }, span)
    }

    pub fn alloc_box(&mut self, ty: Ty, span: Span) -> InstId {
        self.emit(InstKind::AllocBox { ty }, span)
    }

    pub fn mark_uninit(&mut self, ptr: ValueId, span: Span) -> InstId {
        self.emit(InstKind::MarkUninit { ptr }, span)
    }

    pub fn element_addr(&mut self, base: ValueId, index: u32, span: Span) -> InstId {
        self.emit(InstKind::ElementAddr { base, index }, span)
    }

    pub fn load(&mut self, addr: ValueId, span: Span) -> InstId {
        self.emit(InstKind::Load { addr }, span)
    }

    pub fn store(&mut self, value: ValueId, addr: ValueId, span: Span) -> InstId {
        self.emit(InstKind::Store { value, addr }, span)
    }

    pub fn assign(&mut self, value: ValueId, addr: ValueId, span: Span) -> InstId {
        self.emit(InstKind::Assign { value, addr }, span)
    }

    pub fn destroy_addr(&mut self, addr: ValueId, span: Span) -> InstId {
        self.emit(InstKind::DestroyAddr { addr }, span)
    }

    pub fn release(&mut self, value: ValueId, span: Span) -> InstId {
        self.emit(InstKind::Release { value }, span)
    }

    pub fn dealloc_stack(&mut self, addr: ValueId, span: Span) -> InstId {
        self.emit(InstKind::DeallocStack { addr }, span)
    }

    pub fn dealloc_box(&mut self, value: ValueId, span: Span) -> InstId {
        self.emit(InstKind::DeallocBox { value }, span)
    }

    pub fn dealloc_ref(&mut self, value: ValueId, span: Span) -> InstId {
        self.emit(InstKind::DeallocRef { value }, span)
    }

    pub fn int_literal(&mut self, value: u64, bits: u32, span: Span) -> InstId {
        self.emit(InstKind::IntLiteral { value, bits }, span)
    }

    pub fn builtin(&mut self, op: BuiltinOp, args: Vec<ValueId>, span: Span) -> InstId {
        self.emit(InstKind::Builtin { op, args }, span)
    }

    pub fn emit_raw(&mut self, kind: InstKind, span: Span) -> InstId {
        self.emit(kind, span)
    }
}

#[cfg(test)]
#[path = "../tests/t_ir.rs"]
mod tests;

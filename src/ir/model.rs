//! Explicit-memory CFG IR data model.
//!
//! Functions own two arenas (instructions and blocks) addressed by index
//! newtypes. Blocks hold instruction ids in execution order plus a
//! terminator; instructions are never removed from the arena, only marked
//! deleted and unlinked, so ids held by analyses stay valid across rewrites.

use crate::diag::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub u32);

impl InstId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Int { bits: u32 },
    Bool,
    Address,
    Object,
    Opaque,
}

/// Reference to a function-like callee, tagged with the initializer-call
/// flavor the frontend resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncRef {
    pub name: String,
    pub kind: FuncRefKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncRefKind {
    Normal,
    SuperInit,
    SelfInit,
}

/// A class member reference, carrying enough declaration context for
/// diagnostics: accessors report the name of the storage they wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub name: String,
    pub is_accessor: bool,
    pub storage: Option<String>,
}

impl MethodRef {
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_accessor: false,
            storage: None,
        }
    }

    pub fn accessor(name: impl Into<String>, storage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_accessor: true,
            storage: Some(storage.into()),
        }
    }

    /// The name diagnostics should use: accessors resolve to their storage.
    pub fn diag_name(&self) -> &str {
        match &self.storage {
            Some(storage) if self.is_accessor => storage,
            _ => &self.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOp {
    Or { bits: u32 },
    LShr { bits: u32 },
    TruncToI1 { bits: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    AllocStack {
        ty: Ty,
    },
    AllocBox {
        ty: Ty,
    },
    /// Marks an allocation whose initialization state is tracked; resolves to
    /// its operand once checking is done.
    MarkUninit {
        ptr: ValueId,
    },
    ElementAddr {
        base: ValueId,
        index: u32,
    },
    RefFieldAddr {
        base: ValueId,
        field: String,
    },
    Load {
        addr: ValueId,
    },
    Store {
        value: ValueId,
        addr: ValueId,
    },
    /// Polymorphic store-or-initialize; rewritten away by the checker.
    Assign {
        value: ValueId,
        addr: ValueId,
    },
    CopyAddr {
        src: ValueId,
        dst: ValueId,
        is_init: bool,
        is_take: bool,
    },
    StoreWeak {
        value: ValueId,
        addr: ValueId,
        is_init: bool,
    },
    DestroyAddr {
        addr: ValueId,
    },
    Release {
        value: ValueId,
    },
    DeallocStack {
        addr: ValueId,
    },
    DeallocBox {
        value: ValueId,
    },
    DeallocRef {
        value: ValueId,
    },
    IntLiteral {
        value: u64,
        bits: u32,
    },
    Builtin {
        op: BuiltinOp,
        args: Vec<ValueId>,
    },
    Upcast {
        value: ValueId,
    },
    ClassMethod {
        base: ValueId,
        method: MethodRef,
    },
    FunctionRef {
        func: FuncRef,
    },
    Apply {
        callee: ValueId,
        args: Vec<ValueId>,
    },
    AddressToPointer {
        addr: ValueId,
    },
    MarkFuncEscape {
        addrs: Vec<ValueId>,
    },
}

impl InstKind {
    pub fn has_result(&self) -> bool {
        match self {
            InstKind::AllocStack { .. }
            | InstKind::AllocBox { .. }
            | InstKind::MarkUninit { .. }
            | InstKind::ElementAddr { .. }
            | InstKind::RefFieldAddr { .. }
            | InstKind::Load { .. }
            | InstKind::IntLiteral { .. }
            | InstKind::Builtin { .. }
            | InstKind::Upcast { .. }
            | InstKind::ClassMethod { .. }
            | InstKind::FunctionRef { .. }
            | InstKind::Apply { .. }
            | InstKind::AddressToPointer { .. } => true,
            InstKind::Store { .. }
            | InstKind::Assign { .. }
            | InstKind::CopyAddr { .. }
            | InstKind::StoreWeak { .. }
            | InstKind::DestroyAddr { .. }
            | InstKind::Release { .. }
            | InstKind::DeallocStack { .. }
            | InstKind::DeallocBox { .. }
            | InstKind::DeallocRef { .. }
            | InstKind::MarkFuncEscape { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstData {
    pub result: Option<ValueId>,
    pub kind: InstKind,
    pub span: Span,
    pub block: BlockId,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub insts: Vec<InstId>,
    pub term: Terminator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Br {
        target: BlockId,
    },
    CondBr {
        cond: ValueId,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Return {
        value: Option<ValueId>,
    },
    Unreachable,
}

/// Something that reads an SSA value: an instruction operand or a terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueUser {
    Inst(InstId),
    Term(BlockId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    insts: Vec<InstData>,
    blocks: Vec<BlockData>,
    entry: BlockId,
    next_value: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let mut func = Self {
            name: name.into(),
            insts: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
            next_value: 0,
        };
        func.entry = func.add_block();
        func
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData {
            insts: Vec::new(),
            term: Terminator::Unreachable,
        });
        id
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        self.blocks
            .get(id.index())
            .unwrap_or_else(|| panic!("invalid block id {:?}", id))
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BlockData {
        self.blocks
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("invalid block id {:?}", id))
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + use<> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        self.insts
            .get(id.index())
            .unwrap_or_else(|| panic!("invalid inst id {:?}", id))
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut InstData {
        self.insts
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("invalid inst id {:?}", id))
    }

    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> + use<> {
        (0..self.insts.len() as u32).map(InstId)
    }

    /// The SSA value an instruction defines. Panics for non-producing kinds.
    pub fn result_of(&self, id: InstId) -> ValueId {
        self.inst(id)
            .result
            .unwrap_or_else(|| panic!("inst {:?} has no result", id))
    }

    pub(crate) fn alloc_inst(&mut self, kind: InstKind, span: Span, block: BlockId) -> InstId {
        let result = kind.has_result().then(|| {
            let value = ValueId(self.next_value);
            self.next_value += 1;
            value
        });
        let id = InstId(self.insts.len() as u32);
        self.insts.push(InstData {
            result,
            kind,
            span,
            block,
            deleted: false,
        });
        id
    }

    /// The live instruction defining `value`, if any.
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        self.inst_ids().find(|&id| {
            let inst = self.inst(id);
            !inst.deleted && inst.result == Some(value)
        })
    }

    /// All readers of `value` among live instructions and terminators, in
    /// arena/block order.
    pub fn users_of(&self, value: ValueId) -> Vec<ValueUser> {
        let mut users = Vec::new();
        for id in self.inst_ids() {
            let inst = self.inst(id);
            if inst.deleted {
                continue;
            }
            let mut uses_it = false;
            for_each_operand(&inst.kind, |v| uses_it |= v == value);
            if uses_it {
                users.push(ValueUser::Inst(id));
            }
        }
        for bb in self.block_ids() {
            let mut uses_it = false;
            for_each_term_operand(&self.block(bb).term, |v| uses_it |= v == value);
            if uses_it {
                users.push(ValueUser::Term(bb));
            }
        }
        users
    }
}

/// Visits each SSA value read by an instruction.
pub fn for_each_operand(kind: &InstKind, mut f: impl FnMut(ValueId)) {
    match kind {
        InstKind::AllocStack { .. }
        | InstKind::AllocBox { .. }
        | InstKind::IntLiteral { .. }
        | InstKind::FunctionRef { .. } => {}
        InstKind::MarkUninit { ptr: value }
        | InstKind::ElementAddr { base: value, .. }
        | InstKind::RefFieldAddr { base: value, .. }
        | InstKind::Load { addr: value }
        | InstKind::DestroyAddr { addr: value }
        | InstKind::Release { value }
        | InstKind::DeallocStack { addr: value }
        | InstKind::DeallocBox { value }
        | InstKind::DeallocRef { value }
        | InstKind::Upcast { value }
        | InstKind::ClassMethod { base: value, .. }
        | InstKind::AddressToPointer { addr: value } => f(*value),
        InstKind::Store { value, addr }
        | InstKind::Assign { value, addr }
        | InstKind::StoreWeak { value, addr, .. } => {
            f(*value);
            f(*addr);
        }
        InstKind::CopyAddr { src, dst, .. } => {
            f(*src);
            f(*dst);
        }
        InstKind::Builtin { args, .. } => {
            for arg in args {
                f(*arg);
            }
        }
        InstKind::Apply { callee, args } => {
            f(*callee);
            for arg in args {
                f(*arg);
            }
        }
        InstKind::MarkFuncEscape { addrs } => {
            for addr in addrs {
                f(*addr);
            }
        }
    }
}

/// Visits each SSA value read by a terminator.
pub fn for_each_term_operand(term: &Terminator, mut f: impl FnMut(ValueId)) {
    match term {
        Terminator::Br { .. } | Terminator::Unreachable => {}
        Terminator::CondBr { cond, .. } => f(*cond),
        Terminator::Return { value } => {
            if let Some(value) = value {
                f(*value);
            }
        }
    }
}

/// Replaces all uses of `from` with `to` in an instruction.
pub fn replace_value_in_inst(kind: &mut InstKind, from: ValueId, to: ValueId) {
    let replace = |value: &mut ValueId| {
        if *value == from {
            *value = to;
        }
    };

    match kind {
        InstKind::AllocStack { .. }
        | InstKind::AllocBox { .. }
        | InstKind::IntLiteral { .. }
        | InstKind::FunctionRef { .. } => {}
        InstKind::MarkUninit { ptr: value }
        | InstKind::ElementAddr { base: value, .. }
        | InstKind::RefFieldAddr { base: value, .. }
        | InstKind::Load { addr: value }
        | InstKind::DestroyAddr { addr: value }
        | InstKind::Release { value }
        | InstKind::DeallocStack { addr: value }
        | InstKind::DeallocBox { value }
        | InstKind::DeallocRef { value }
        | InstKind::Upcast { value }
        | InstKind::ClassMethod { base: value, .. }
        | InstKind::AddressToPointer { addr: value } => replace(value),
        InstKind::Store { value, addr }
        | InstKind::Assign { value, addr }
        | InstKind::StoreWeak { value, addr, .. } => {
            replace(value);
            replace(addr);
        }
        InstKind::CopyAddr { src, dst, .. } => {
            replace(src);
            replace(dst);
        }
        InstKind::Builtin { args, .. } => {
            for arg in args {
                replace(arg);
            }
        }
        InstKind::Apply { callee, args } => {
            replace(callee);
            for arg in args {
                replace(arg);
            }
        }
        InstKind::MarkFuncEscape { addrs } => {
            for addr in addrs {
                replace(addr);
            }
        }
    }
}

/// Replaces all uses of `from` with `to` in a terminator.
pub fn replace_value_in_term(term: &mut Terminator, from: ValueId, to: ValueId) {
    let replace = |value: &mut ValueId| {
        if *value == from {
            *value = to;
        }
    };

    match term {
        Terminator::Br { .. } | Terminator::Unreachable => {}
        Terminator::CondBr { cond, .. } => replace(cond),
        Terminator::Return { value } => {
            if let Some(value) = value {
                replace(value);
            }
        }
    }
}

/// Replaces `from` with `to` throughout a function.
pub fn replace_value_in_func(func: &mut Function, from: ValueId, to: ValueId) {
    for id in func.inst_ids().collect::<Vec<_>>() {
        let inst = func.inst_mut(id);
        if inst.deleted {
            continue;
        }
        replace_value_in_inst(&mut inst.kind, from, to);
    }
    for bb in func.block_ids().collect::<Vec<_>>() {
        replace_value_in_term(&mut func.block_mut(bb).term, from, to);
    }
}

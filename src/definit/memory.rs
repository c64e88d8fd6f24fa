//! Tracked memory objects and their element decomposition.

use crate::diag::Span;
use crate::ir::InstId;

/// What kind of storage a tracked allocation backs. Initializer `self` slots
/// get their own roles because the diagnostics and the rules for the
/// synthetic super-init element differ per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRole {
    LocalVar,
    GlobalVar,
    RootClassSelf,
    DerivedClassSelf,
    StructSelf,
    EnumSelf,
    DelegatingSelf,
}

/// Per-element metadata supplied by the frontend: the access path used in
/// diagnostics, mutability, destructor triviality, and the declaration span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    pub path: String,
    pub is_let: bool,
    pub trivial: bool,
    pub implicit: bool,
    pub has_initial_value: bool,
    pub span: Span,
}

impl ElementInfo {
    pub fn new(path: impl Into<String>, trivial: bool) -> Self {
        Self {
            path: path.into(),
            is_let: false,
            trivial,
            implicit: false,
            has_initial_value: false,
            span: Span::SYNTHESIZED,
        }
    }

    pub fn as_let(mut self) -> Self {
        self.is_let = true;
        self
    }

    pub fn with_initial_value(mut self) -> Self {
        self.has_initial_value = true;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A storage allocation whose per-element initialization state is tracked,
/// identified by its `MarkUninit` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub inst: InstId,
    pub role: MemoryRole,
    pub elements: Vec<ElementInfo>,
    pub span: Span,
}

impl MemoryObject {
    pub fn new(inst: InstId, role: MemoryRole, elements: Vec<ElementInfo>, span: Span) -> Self {
        Self {
            inst,
            role,
            elements,
            span,
        }
    }

    /// A derived-class `self`: the stored properties plus a synthetic trailing
    /// element modeling the super.init call.
    pub fn derived_class_self(
        inst: InstId,
        mut elements: Vec<ElementInfo>,
        span: Span,
    ) -> Self {
        elements.push(ElementInfo {
            path: "super.init".to_string(),
            is_let: false,
            trivial: true,
            implicit: true,
            has_initial_value: false,
            span: Span::SYNTHESIZED,
        });
        Self::new(inst, MemoryRole::DerivedClassSelf, elements, span)
    }

    /// Total element count, including the synthetic super-init element.
    pub fn num_elements(&self) -> u32 {
        self.elements.len() as u32
    }

    /// Elements that correspond to real storage (the synthetic super-init
    /// element excluded). The runtime liveness bitmap covers only these.
    pub fn num_memory_elements(&self) -> u32 {
        if self.is_derived_class_self() {
            self.num_elements() - 1
        } else {
            self.num_elements()
        }
    }

    pub fn is_any_init_self(&self) -> bool {
        matches!(
            self.role,
            MemoryRole::RootClassSelf
                | MemoryRole::DerivedClassSelf
                | MemoryRole::StructSelf
                | MemoryRole::EnumSelf
                | MemoryRole::DelegatingSelf
        )
    }

    pub fn is_class_init_self(&self) -> bool {
        matches!(
            self.role,
            MemoryRole::RootClassSelf | MemoryRole::DerivedClassSelf
        )
    }

    pub fn is_derived_class_self(&self) -> bool {
        self.role == MemoryRole::DerivedClassSelf
    }

    pub fn is_struct_init_self(&self) -> bool {
        self.role == MemoryRole::StructSelf
    }

    pub fn is_enum_init_self(&self) -> bool {
        self.role == MemoryRole::EnumSelf
    }

    pub fn is_delegating_init(&self) -> bool {
        self.role == MemoryRole::DelegatingSelf
    }

    pub fn element(&self, index: u32) -> &ElementInfo {
        &self.elements[index as usize]
    }

    pub fn element_is_let(&self, index: u32) -> bool {
        self.element(index).is_let
    }

    pub fn element_is_trivial(&self, index: u32) -> bool {
        self.element(index).trivial
    }

    /// The human-readable access path to an element, for diagnostics.
    pub fn path_of(&self, index: u32) -> &str {
        &self.element(index).path
    }

    /// Whether every element has a no-op destructor; trivial objects need no
    /// release processing at all.
    pub fn is_trivial(&self) -> bool {
        self.elements.iter().all(|e| e.trivial)
    }

    pub fn range_is_trivial(&self, first: u32, num: u32) -> bool {
        (first..first + num).all(|i| self.element_is_trivial(i))
    }
}

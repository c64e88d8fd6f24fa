//! Lifetime checking for a single tracked memory object.
//!
//! The checker walks the collected uses in order, asks the dataflow for the
//! availability of the touched elements at each one, and either accepts the
//! use, emits a diagnostic, or rewrites the instruction into its resolved
//! form. Classification runs first; the CFG rewrites only run on functions
//! with no user errors.

use std::collections::{HashMap, HashSet};

use crate::diag::Span;
use crate::ir::{
    BlockId, Cfg, FuncBuilder, Function, InstId, InstKind, MethodRef, Terminator, ValueId,
    ValueUser,
};

use super::collect::{CollectedUses, MemoryUse, UseKind};
use super::errors::{DefInitDiagKind, Diagnostic, InitCall};
use super::lattice::{AvailabilitySet, DiKind};
use super::lower::{erase_dead_addr_chain, lower_assign};
use super::memory::MemoryObject;

/// Memoization state of a block's live-out availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LiveOutState {
    Unknown,
    InProgress,
    Known,
}

/// Per-block facts: locally computed availability, whether the block contains
/// any non-load use, and the live-out cache state.
pub(super) struct BlockState {
    pub(super) availability: AvailabilitySet,
    pub(super) has_non_load_use: bool,
    pub(super) live_out: LiveOutState,
}

impl BlockState {
    fn new(num_elements: u32) -> Self {
        Self {
            availability: AvailabilitySet::new(num_elements),
            has_non_load_use: false,
            live_out: LiveOutState::Unknown,
        }
    }

    fn mark_available(&mut self, memory_use: &MemoryUse) {
        if self.availability.is_empty() {
            return;
        }
        let end = memory_use.first_element + memory_use.num_elements;
        for i in memory_use.first_element..end {
            self.availability.set(i, DiKind::Yes);
        }
    }
}

/// Sentinel entry in `non_load_uses` for the defining instruction itself: it
/// participates in local scans but has no `uses` entry.
pub(super) const MEMORY_INST_USE: usize = usize::MAX;

pub(super) struct InitCheck {
    pub(super) initialized: bool,
    pub(super) super_init_done: bool,
}

pub(super) struct DefInitChecker<'a> {
    pub(super) func: &'a mut Function,
    pub(super) memory: MemoryObject,
    pub(super) uses: Vec<MemoryUse>,
    pub(super) releases: Vec<Option<InstId>>,
    pub(super) cfg: Cfg,
    pub(super) per_block: HashMap<BlockId, BlockState>,
    pub(super) non_load_uses: HashMap<InstId, usize>,
    pub(super) conditional_destroys: Vec<(usize, AvailabilitySet)>,
    pub(super) has_conditional_init_assign: bool,
    emitted_spans: Vec<Span>,
    reachable: Option<HashSet<BlockId>>,
    diags: &'a mut Vec<Diagnostic>,
}

impl<'a> DefInitChecker<'a> {
    pub(super) fn new(
        func: &'a mut Function,
        memory: MemoryObject,
        collected: CollectedUses,
        diags: &'a mut Vec<Diagnostic>,
    ) -> Self {
        let cfg = Cfg::new(func);
        let mut checker = Self {
            func,
            memory,
            uses: collected.uses,
            releases: collected.releases.into_iter().map(Some).collect(),
            cfg,
            per_block: HashMap::new(),
            non_load_uses: HashMap::new(),
            conditional_destroys: Vec::new(),
            has_conditional_init_assign: false,
            emitted_spans: Vec::new(),
            reachable: None,
            diags,
        };

        // Seed local availability: every non-load use settles its window to
        // Yes within its block for cross-block purposes.
        for ui in 0..checker.uses.len() {
            let memory_use = checker.uses[ui];
            let Some(inst) = memory_use.inst else { continue };
            if matches!(memory_use.kind, UseKind::Load | UseKind::Escape) {
                continue;
            }
            checker.non_load_uses.insert(inst, ui);
            let block = checker.func.inst(inst).block;
            let state = checker.block_state_mut(block);
            state.has_non_load_use = true;
            state.mark_available(&memory_use);
            if state.availability.is_all_yes() {
                state.live_out = LiveOutState::Known;
            }
        }

        // The defining instruction is not a use, but the local scans must see
        // it: anything above it in its block is before the memory exists.
        let memory_inst = checker.memory.inst;
        checker.non_load_uses.insert(memory_inst, MEMORY_INST_USE);
        let memory_block = checker.func.inst(memory_inst).block;
        let state = checker.block_state_mut(memory_block);
        state.has_non_load_use = true;
        state.availability.change_unset_to(DiKind::No);
        state.live_out = LiveOutState::Known;

        checker
    }

    pub(super) fn block_state_mut(&mut self, block: BlockId) -> &mut BlockState {
        let num_elements = self.memory.num_elements();
        self.per_block
            .entry(block)
            .or_insert_with(|| BlockState::new(num_elements))
    }

    /// Classifies every use, then runs the post-analysis rewrites if no user
    /// error was found.
    pub(super) fn check(mut self) {
        // The use list grows as assigns are lowered; iterate by index and
        // skip entries whose instruction was deleted along the way.
        let mut i = 0;
        while i < self.uses.len() {
            let memory_use = self.uses[i];
            if memory_use.inst.is_none() {
                i += 1;
                continue;
            }
            match memory_use.kind {
                // Produced only when a store was already proven concrete;
                // nothing left to check.
                UseKind::Initialization | UseKind::Assign => {}
                UseKind::InitOrAssign | UseKind::PartialStore => self.handle_store_use(i),
                UseKind::Load | UseKind::IndirectIn => {
                    let check = self.is_initialized_at_use(&memory_use);
                    if !check.initialized {
                        self.handle_load_use_failure(&memory_use, check.super_init_done);
                    }
                }
                UseKind::InOutUse => self.handle_inout_use(&memory_use),
                UseKind::Escape => self.handle_escape_use(&memory_use),
                UseKind::SuperInit => self.handle_super_init_use(&memory_use),
                UseKind::SelfInit => self.handle_self_init_use(i),
            }
            i += 1;
        }

        // A diagnosed function keeps its IR as-is; rewriting around errors
        // would emit malformed code.
        if !self.emitted_spans.is_empty() {
            return;
        }

        if !self.memory.is_trivial() {
            for idx in 0..self.releases.len() {
                self.process_release(idx);
            }
        }

        let mut control_addr = None;
        if self.has_conditional_init_assign {
            control_addr = Some(self.insert_conditional_init_assign());
        }
        if !self.conditional_destroys.is_empty() {
            self.process_conditional_destroys(control_addr);
        }
    }

    /// Whether all elements the use touches are definitely initialized, and
    /// whether the super.init element (if any) is among the initialized ones.
    pub(super) fn is_initialized_at_use(&mut self, memory_use: &MemoryUse) -> InitCheck {
        let inst = memory_use.inst.expect("checking a deleted use");
        let liveness = self.liveness_at(inst, memory_use.first_element, memory_use.num_elements);

        let num_elements = self.memory.num_elements();
        let mut super_init_done = true;
        if memory_use.first_element + memory_use.num_elements == num_elements
            && self.memory.is_derived_class_self()
            && liveness.get(num_elements - 1) != DiKind::Yes
        {
            super_init_done = false;
        }

        let end = memory_use.first_element + memory_use.num_elements;
        let initialized =
            (memory_use.first_element..end).all(|i| liveness.get(i) == DiKind::Yes);
        InitCheck {
            initialized,
            super_init_done,
        }
    }

    fn handle_store_use(&mut self, use_idx: usize) {
        let memory_use = self.uses[use_idx];
        let inst = memory_use.inst.expect("checking a deleted use");
        let liveness = self.liveness_at(inst, memory_use.first_element, memory_use.num_elements);
        let end = memory_use.first_element + memory_use.num_elements;

        let mut fully_initialized = true;
        let mut fully_uninitialized = true;
        for i in memory_use.first_element..end {
            let kind = liveness.get(i);
            if kind != DiKind::Yes {
                fully_initialized = false;
            }
            if kind != DiKind::No {
                fully_uninitialized = false;
            }
        }

        // A store into part of an aggregate requires the whole aggregate to
        // already be initialized.
        if memory_use.kind == UseKind::PartialStore && !fully_initialized {
            assert_eq!(memory_use.num_elements, 1, "partial stores are intra-element");
            self.diagnose_init_error(&memory_use, DefInitDiagKind::StructNotFullyInitialized);
            return;
        }

        // `let` elements may be stored to once; any overwrite is rejected.
        if memory_use.kind == UseKind::PartialStore || !fully_uninitialized {
            for i in memory_use.first_element..end {
                if liveness.get(i) == DiKind::No || !self.memory.element_is_let(i) {
                    continue;
                }
                let span = self.func.inst(inst).span;
                let block = self.func.inst(inst).block;
                if self.should_emit_diag(span, block) {
                    let path = self.memory.path_of(i).to_string();
                    self.diags
                        .push(DefInitDiagKind::ImmutablePropertyAlreadyInitialized(path).at(span));
                    let element = self.memory.element(i);
                    if element.has_initial_value {
                        let decl_span = element.span;
                        self.diags
                            .push(DefInitDiagKind::InitialValueProvidedInLetDecl.at(decl_span));
                    }
                }
                return;
            }
        }

        if fully_uninitialized {
            self.uses[use_idx].kind = UseKind::Initialization;
        } else if fully_initialized {
            self.uses[use_idx].kind = UseKind::Assign;
        } else {
            // Initialized on some paths only. Resolving this needs the
            // runtime bitmap, inserted after classification finishes.
            assert_eq!(
                memory_use.kind,
                UseKind::InitOrAssign,
                "only store-like instructions may be flow-ambiguous"
            );
            if !memory_use.only_touches_trivial_elements(&self.memory) {
                self.has_conditional_init_assign = true;
            }
            return;
        }

        self.update_inst_for_init_state(use_idx);
    }

    fn handle_inout_use(&mut self, memory_use: &MemoryUse) {
        let check = self.is_initialized_at_use(memory_use);
        if !check.initialized {
            self.diagnose_init_error(memory_use, DefInitDiagKind::VariableInOutBeforeInit);
            return;
        }

        // `let` elements may never be passed inout: the callee could store.
        let end = memory_use.first_element + memory_use.num_elements;
        for i in memory_use.first_element..end {
            if !self.memory.element_is_let(i) {
                continue;
            }
            let inst = memory_use.inst.expect("checking a deleted use");
            let span = self.func.inst(inst).span;
            let block = self.func.inst(inst).block;
            if self.should_emit_diag(span, block) {
                let path = self.memory.path_of(i).to_string();
                self.diags
                    .push(DefInitDiagKind::ImmutablePropertyPassedInOut(path).at(span));
            }
            return;
        }
    }

    fn handle_escape_use(&mut self, memory_use: &MemoryUse) {
        let check = self.is_initialized_at_use(memory_use);
        if check.initialized {
            return;
        }
        let inst = memory_use.inst.expect("checking a deleted use");
        let span = self.func.inst(inst).span;
        let block = self.func.inst(inst).block;

        if self.memory.is_delegating_init() {
            // Returning self before self.init gets its own wording.
            if self.load_sole_user_is_return(inst) {
                if self.should_emit_diag(span, block) {
                    self.diags
                        .push(DefInitDiagKind::ReturnFromInitWithoutSelfInit.at(span));
                }
                return;
            }
            self.diagnose_init_error(
                memory_use,
                DefInitDiagKind::SelfUseBeforeInitInDelegatingInit,
            );
            return;
        }

        let ctor: fn(String) -> DefInitDiagKind = match &self.func.inst(inst).kind {
            InstKind::MarkFuncEscape { .. } => DefInitDiagKind::GlobalVariableFunctionUseUninit,
            InstKind::AddressToPointer { .. } => DefInitDiagKind::VariableAddrTakenBeforeInit,
            _ => DefInitDiagKind::VariableEscapeBeforeInit,
        };
        self.diagnose_init_error(memory_use, ctor);
    }

    /// Diagnoses a load (or indirect read) of not-fully-initialized memory.
    /// Cases are checked from most to least specific.
    fn handle_load_use_failure(&mut self, memory_use: &MemoryUse, super_init_done: bool) {
        let inst = memory_use.inst.expect("checking a deleted use");
        let span = self.func.inst(inst).span;
        let block = self.func.inst(inst).block;

        // A load whose only consumer is the function return: the initializer
        // is returning an incomplete self.
        if self.load_sole_user_is_return(inst) && self.memory.is_any_init_self() {
            if self.memory.is_enum_init_self() {
                if self.should_emit_diag(span, block) {
                    self.diags
                        .push(DefInitDiagKind::ReturnFromInitWithoutInitingSelf.at(span));
                }
                return;
            }
            if !self.memory.is_class_init_self() {
                if self.should_emit_diag(span, block) {
                    self.diags.push(
                        DefInitDiagKind::ReturnFromInitWithoutInitingStoredProperties.at(span),
                    );
                    self.note_uninitialized_members(memory_use);
                }
                return;
            }
            if !self.should_emit_diag(span, block) {
                return;
            }
            if !super_init_done {
                self.diags.push(
                    DefInitDiagKind::SuperSelfInitNotCalledBeforeReturn(InitCall::Super).at(span),
                );
            } else {
                self.diags
                    .push(DefInitDiagKind::ReturnFromInitWithoutInitingStoredProperties.at(span));
                self.note_uninitialized_members(memory_use);
            }
            return;
        }

        // See whether the loaded self feeds a member access, so the error can
        // name the field or method instead of just "self".
        let mut method: Option<MethodRef> = None;
        let mut field: Option<String> = None;
        let mut applied_to_self = false;
        if let Some(result) = self.func.inst(inst).result {
            for user in self.func.users_of(result) {
                let ValueUser::Inst(user_inst) = user else { continue };
                match &self.func.inst(user_inst).kind {
                    InstKind::Upcast { .. } => {
                        let upcast_value = self.func.result_of(user_inst);
                        for up_user in self.func.users_of(upcast_value) {
                            let ValueUser::Inst(up_inst) = up_user else { continue };
                            match &self.func.inst(up_inst).kind {
                                InstKind::RefFieldAddr { field: name, .. } => {
                                    field = Some(name.clone());
                                }
                                InstKind::ClassMethod { method: m, .. } => {
                                    method = Some(m.clone());
                                }
                                _ => {}
                            }
                        }
                    }
                    InstKind::ClassMethod { method: m, .. }
                        if self.memory.is_class_init_self() =>
                    {
                        method = Some(m.clone());
                    }
                    InstKind::Apply { .. } if self.memory.is_class_init_self() => {
                        applied_to_self = true;
                    }
                    _ => {}
                }
            }
        }

        // Accessing a base-class ivar before super.init.
        if let Some(field) = field
            && !super_init_done
        {
            if self.should_emit_diag(span, block) {
                self.diags.push(
                    DefInitDiagKind::SelfUseBeforeFullyInit {
                        name: field,
                        is_property: true,
                        before_super_init: true,
                    }
                    .at(span),
                );
            }
            return;
        }

        if let Some(method) = method {
            if !self.should_emit_diag(span, block) {
                return;
            }
            self.diags.push(
                DefInitDiagKind::SelfUseBeforeFullyInit {
                    name: method.diag_name().to_string(),
                    is_property: method.is_accessor,
                    before_super_init: !super_init_done,
                }
                .at(span),
            );
            if super_init_done {
                self.note_uninitialized_members(memory_use);
            }
            return;
        }

        if !super_init_done {
            if self.should_emit_diag(span, block) {
                let call = if self.memory.is_delegating_init() {
                    InitCall::SelfInit
                } else {
                    InitCall::Super
                };
                self.diags
                    .push(DefInitDiagKind::SelfUseBeforeSuperSelfInit(call).at(span));
            }
            return;
        }

        // Passing self to a call inside a class initializer.
        if applied_to_self {
            if !self.should_emit_diag(span, block) {
                return;
            }
            self.diags
                .push(DefInitDiagKind::UseOfSelfBeforeFullyInit.at(span));
            self.note_uninitialized_members(memory_use);
            return;
        }

        // Loading the whole self in a struct/enum initializer.
        if matches!(self.func.inst(inst).kind, InstKind::Load { .. })
            && self.memory.is_any_init_self()
            && !self.memory.is_class_init_self()
        {
            if !self.should_emit_diag(span, block) {
                return;
            }
            self.diags
                .push(DefInitDiagKind::UseOfSelfBeforeFullyInit.at(span));
            self.note_uninitialized_members(memory_use);
            return;
        }

        self.diagnose_init_error(memory_use, DefInitDiagKind::VariableUsedBeforeInit);
    }

    fn handle_super_init_use(&mut self, memory_use: &MemoryUse) {
        let inst = memory_use.inst.expect("checking a deleted use");
        let num_elements = self.memory.num_elements();
        assert!(
            self.memory.is_derived_class_self(),
            "super.init outside a derived-class initializer"
        );
        let liveness = self.liveness_at(inst, 0, num_elements);
        let span = self.func.inst(inst).span;
        let block = self.func.inst(inst).block;

        // Only one super.init call is allowed.
        match liveness.get(num_elements - 1) {
            DiKind::No => {}
            DiKind::Yes | DiKind::Partial => {
                if self.should_emit_diag(span, block) {
                    self.diags.push(
                        DefInitDiagKind::SelfInitCalledMultipleTimes(InitCall::Super).at(span),
                    );
                }
                return;
            }
        }

        // Every stored property must be set before the superclass runs.
        for i in 0..num_elements - 1 {
            if liveness.get(i) == DiKind::Yes {
                continue;
            }
            let implicit = span.is_synthesized();
            self.diagnose_init_error(memory_use, |name| {
                DefInitDiagKind::IvarNotInitializedAtSuperInit { name, implicit }
            });
            return;
        }
    }

    fn handle_self_init_use(&mut self, use_idx: usize) {
        let memory_use = self.uses[use_idx];
        let inst = memory_use.inst.expect("checking a deleted use");
        assert_eq!(
            self.memory.num_elements(),
            1,
            "delegating initializers track a single element"
        );

        // Only one self.init call is allowed.
        match self.liveness_at(inst, 0, 1).get(0) {
            DiKind::No => {}
            DiKind::Yes | DiKind::Partial => {
                let span = self.func.inst(inst).span;
                let block = self.func.inst(inst).block;
                if self.emitted_spans.is_empty() && self.should_emit_diag(span, block) {
                    self.diags.push(
                        DefInitDiagKind::SelfInitCalledMultipleTimes(InitCall::SelfInit).at(span),
                    );
                }
                return;
            }
        }

        // When the delegation is expressed as a direct store, that store is
        // the initialization.
        if let InstKind::CopyAddr { is_init, .. } = &mut self.func.inst_mut(inst).kind {
            *is_init = true;
        }
        if matches!(self.func.inst(inst).kind, InstKind::Assign { .. }) {
            self.update_inst_for_init_state(use_idx);
        }
    }

    /// Rewrites a use whose init-versus-assign question has been answered:
    /// flag-carrying stores get their flag set, assigns are lowered into
    /// their concrete sequence (and the new loads/stores join the use list).
    pub(super) fn update_inst_for_init_state(&mut self, use_idx: usize) {
        let memory_use = self.uses[use_idx];
        let inst = memory_use.inst.expect("updating a deleted use");
        let is_init = match memory_use.kind {
            UseKind::Initialization | UseKind::SelfInit => true,
            UseKind::Assign => false,
            _ => panic!("resolving a use that is still ambiguous"),
        };

        {
            let data = self.func.inst_mut(inst);
            match &mut data.kind {
                InstKind::CopyAddr { is_init: flag, .. } => {
                    assert!(!*flag, "copy_addr already marked as an initialization");
                    *flag = is_init;
                    return;
                }
                InstKind::StoreWeak { is_init: flag, .. } => {
                    assert!(!*flag, "store_weak already marked as an initialization");
                    *flag = is_init;
                    return;
                }
                InstKind::Store { .. } => return,
                InstKind::Assign { .. } => {}
                other => panic!("cannot resolve init state of {:?}", other),
            }
        }

        // Lower the assign; the instruction goes away, so drop it from the
        // side tables first.
        self.uses[use_idx].inst = None;
        self.non_load_uses.remove(&inst);

        let dest_trivial = self
            .memory
            .range_is_trivial(memory_use.first_element, memory_use.num_elements);
        let mut builder = FuncBuilder::before_inst(self.func, inst);
        let lowered = lower_assign(&mut builder, inst, is_init, dest_trivial);

        if let Some(load) = lowered.load {
            self.uses.push(MemoryUse::new(
                load,
                UseKind::Load,
                memory_use.first_element,
                memory_use.num_elements,
            ));
        }
        self.non_load_uses.insert(lowered.store, self.uses.len());
        self.uses.push(MemoryUse::new(
            lowered.store,
            memory_use.kind,
            memory_use.first_element,
            memory_use.num_elements,
        ));
    }

    /// Classifies a lifetime-ending instruction against the availability at
    /// that point: all-Yes releases need nothing, all-No ones are deleted
    /// (or turned into a plain dealloc for class self), everything else is
    /// queued for the conditional-destroy rewrite.
    fn process_release(&mut self, release_idx: usize) {
        let Some(release) = self.releases[release_idx] else {
            return;
        };

        // Deallocations of uninitialized memory need no destruction.
        match &self.func.inst(release).kind {
            InstKind::DeallocStack { .. }
            | InstKind::DeallocBox { .. }
            | InstKind::DeallocRef { .. } => return,
            InstKind::Release { .. } | InstKind::DestroyAddr { .. } => {}
            other => panic!("unexpected release instruction {:?}", other),
        }

        let num_elements = self.memory.num_elements();
        let availability = self.liveness_at(release, 0, num_elements);
        if availability.is_all_yes() {
            return;
        }

        // Cleaning up a partially initialized class instance after a failure
        // is not supported; only a fully-initialized self may be released.
        if self.memory.is_class_init_self() {
            let span = self.func.inst(release).span;
            let block = self.func.inst(release).block;
            if self.should_emit_diag(span, block) {
                self.diags
                    .push(DefInitDiagKind::ObjectNotFullyInitializedBeforeFailure.at(span));
            }
        }

        if availability.is_all_no() {
            let span = self.func.inst(release).span;
            if self.memory.is_class_init_self() {
                // Nothing was constructed; free the object memory directly.
                let memory_addr = self.func.result_of(self.memory.inst);
                let box_value = self.box_storage();
                let mut builder = FuncBuilder::before_inst(self.func, release);
                let object_inst = builder.load(memory_addr, span);
                let object = builder.func().result_of(object_inst);
                let dealloc = builder.dealloc_ref(object, span);
                self.releases[release_idx] = Some(dealloc);
                if let Some(box_value) = box_value {
                    let dealloc_box = builder.dealloc_box(box_value, span);
                    self.releases.push(Some(dealloc_box));
                }
                builder.erase_inst(release);
                return;
            }

            // A destroy of untouched memory can simply go away.
            let InstKind::DestroyAddr { addr } = self.func.inst(release).kind else {
                panic!("all-no release must be a destroy_addr");
            };
            let mut builder = FuncBuilder::before_inst(self.func, release);
            builder.erase_inst(release);
            erase_dead_addr_chain(&mut builder, addr);
            self.releases[release_idx] = None;
            return;
        }

        if availability.has_any(DiKind::Partial) {
            self.has_conditional_init_assign = true;
        }
        self.conditional_destroys.push((release_idx, availability));
    }

    /// Emits a note per uninitialized stored property, skipping the synthetic
    /// super-init element and implicit declarations.
    fn note_uninitialized_members(&mut self, memory_use: &MemoryUse) {
        assert!(
            self.memory.is_any_init_self() && !self.memory.is_delegating_init(),
            "member notes only apply to designated initializers"
        );
        let inst = memory_use.inst.expect("checking a deleted use");
        let liveness = self.liveness_at(inst, memory_use.first_element, memory_use.num_elements);
        let use_span = self.func.inst(inst).span;

        let end = memory_use.first_element + memory_use.num_elements;
        for i in memory_use.first_element..end {
            if liveness.get(i) == DiKind::Yes {
                continue;
            }
            if self.memory.is_derived_class_self() && i == self.memory.num_elements() - 1 {
                continue;
            }
            let element = self.memory.element(i);
            if element.implicit {
                continue;
            }
            let span = if element.span.is_synthesized() {
                use_span
            } else {
                element.span
            };
            let path = element.path.clone();
            self.diags
                .push(DefInitDiagKind::StoredPropertyNotInitialized(path).at(span));
        }
    }

    /// The access path of the first element in the window that is not
    /// definitely initialized.
    fn uninit_element_name(&mut self, memory_use: &MemoryUse) -> String {
        let inst = memory_use.inst.expect("checking a deleted use");
        let liveness = self.liveness_at(inst, memory_use.first_element, memory_use.num_elements);

        let mut first = memory_use.first_element;
        while liveness.get(first) == DiKind::Yes {
            first += 1;
            assert!(
                first < memory_use.first_element + memory_use.num_elements,
                "no uninitialized element in a failed window"
            );
        }
        self.memory.path_of(first).to_string()
    }

    fn diagnose_init_error(
        &mut self,
        memory_use: &MemoryUse,
        ctor: impl FnOnce(String) -> DefInitDiagKind,
    ) {
        let inst = memory_use.inst.expect("checking a deleted use");
        let span = self.func.inst(inst).span;
        let block = self.func.inst(inst).block;
        if !self.should_emit_diag(span, block) {
            return;
        }

        let name = self.uninit_element_name(memory_use);
        self.diags.push(ctor(name).at(span));

        // Point at the declaration for plain variables; initializer self has
        // no interesting declaration site.
        if !self.memory.is_any_init_self() {
            let memory_span = self.memory.span;
            self.diags
                .push(DefInitDiagKind::VariableDefinedHere.at(memory_span));
        }
    }

    /// One error per source location, and none at all in blocks unreachable
    /// from the entry (synthesized dead code is not the user's fault).
    fn should_emit_diag(&mut self, span: Span, block: BlockId) -> bool {
        if !self.is_reachable(block) {
            return false;
        }
        if self.emitted_spans.contains(&span) {
            return false;
        }
        self.emitted_spans.push(span);
        true
    }

    fn is_reachable(&mut self, block: BlockId) -> bool {
        let reachable = self
            .reachable
            .get_or_insert_with(|| self.cfg.reachable_from_entry());
        reachable.contains(&block)
    }

    fn load_sole_user_is_return(&self, inst: InstId) -> bool {
        let data = self.func.inst(inst);
        if !matches!(data.kind, InstKind::Load { .. }) {
            return false;
        }
        let Some(result) = data.result else {
            return false;
        };
        let users = self.func.users_of(result);
        matches!(
            users.as_slice(),
            [ValueUser::Term(bb)]
                if matches!(self.func.block(*bb).term, Terminator::Return { .. })
        )
    }

    /// The box backing the memory, when the storage operand of the marker is
    /// a box allocation.
    pub(super) fn box_storage(&self) -> Option<ValueId> {
        let InstKind::MarkUninit { ptr } = self.func.inst(self.memory.inst).kind else {
            panic!("memory object not defined by mark_uninit");
        };
        let def = self.func.defining_inst(ptr)?;
        matches!(self.func.inst(def).kind, InstKind::AllocBox { .. }).then_some(ptr)
    }
}

#[cfg(test)]
#[path = "../tests/t_definit.rs"]
mod tests;

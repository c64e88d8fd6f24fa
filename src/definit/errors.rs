use thiserror::Error;

use crate::diag::{Span, SpannedError};

/// Which initializer-delegation call a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitCall {
    Super,
    SelfInit,
}

fn init_call_name(call: &InitCall) -> &'static str {
    match call {
        InitCall::Super => "super",
        InitCall::SelfInit => "self",
    }
}

fn member_desc(is_property: &bool) -> &'static str {
    if *is_property { "property" } else { "method" }
}

fn init_phase(before_super_init: &bool) -> &'static str {
    if *before_super_init {
        "super.init is called"
    } else {
        "all stored properties are initialized"
    }
}

fn implicit_marker(implicit: &bool) -> &'static str {
    if *implicit { "implicitly generated " } else { "" }
}

/// Diagnostic identifiers emitted by the definite-initialization checker.
/// The variant set is a contract with downstream tooling; renaming a variant
/// is a breaking change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefInitDiagKind {
    #[error("variable '{0}' used before being initialized")]
    VariableUsedBeforeInit(String),

    #[error("variable '{0}' passed inout before being initialized")]
    VariableInOutBeforeInit(String),

    #[error("variable '{0}' escapes before being initialized")]
    VariableEscapeBeforeInit(String),

    #[error("address of variable '{0}' taken before it is initialized")]
    VariableAddrTakenBeforeInit(String),

    #[error("global variable '{0}' used by a function definition before being initialized")]
    GlobalVariableFunctionUseUninit(String),

    #[error("struct '{0}' must be completely initialized before a member is stored to")]
    StructNotFullyInitialized(String),

    #[error("immutable value '{0}' may only be initialized once")]
    ImmutablePropertyAlreadyInitialized(String),

    #[error("immutable value '{0}' may not be passed inout")]
    ImmutablePropertyPassedInOut(String),

    #[error("initial value already provided in 'let' declaration")]
    InitialValueProvidedInLetDecl,

    #[error("property '{0}' not initialized")]
    StoredPropertyNotInitialized(String),

    #[error("{}.init called multiple times in initializer", init_call_name(.0))]
    SelfInitCalledMultipleTimes(InitCall),

    #[error("{}.init not called before returning from initializer", init_call_name(.0))]
    SuperSelfInitNotCalledBeforeReturn(InitCall),

    #[error("{} '{}' used on 'self' before {}", member_desc(.is_property), .name, init_phase(.before_super_init))]
    SelfUseBeforeFullyInit {
        name: String,
        is_property: bool,
        before_super_init: bool,
    },

    #[error("'self' used before all stored properties are initialized")]
    UseOfSelfBeforeFullyInit,

    #[error("return from initializer without initializing 'self'")]
    ReturnFromInitWithoutInitingSelf,

    #[error("return from initializer without initializing all stored properties")]
    ReturnFromInitWithoutInitingStoredProperties,

    #[error("return from initializer before 'self.init' call")]
    ReturnFromInitWithoutSelfInit,

    #[error("'{0}' used before 'self.init' call in delegating initializer")]
    SelfUseBeforeInitInDelegatingInit(String),

    #[error("property '{name}' not initialized at {}super.init call", implicit_marker(.implicit))]
    IvarNotInitializedAtSuperInit { name: String, implicit: bool },

    #[error("'self' used before {}.init call", init_call_name(.0))]
    SelfUseBeforeSuperSelfInit(InitCall),

    #[error("object must be fully initialized before an early exit from an initializer")]
    ObjectNotFullyInitializedBeforeFailure,

    #[error("variable defined here")]
    VariableDefinedHere,
}

impl DefInitDiagKind {
    /// Notes accompany a primary error and are exempt from per-location
    /// deduplication.
    pub fn is_note(&self) -> bool {
        matches!(
            self,
            DefInitDiagKind::VariableDefinedHere
                | DefInitDiagKind::InitialValueProvidedInLetDecl
                | DefInitDiagKind::StoredPropertyNotInitialized(_)
        )
    }
}

pub type Diagnostic = SpannedError<DefInitDiagKind>;

impl DefInitDiagKind {
    pub fn at(self, span: Span) -> Diagnostic {
        Diagnostic::new(self, span)
    }
}

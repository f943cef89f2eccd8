//! Error types of the engine.

use crate::instance::NodeId;
use crate::reactive::FlushError;
use std::ops::Range;
use thiserror::Error;

/// Fatal errors raised while compiling a form definition or building the
/// initial instance tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("root node '{name}' must be a group or a subtree")]
    InvalidRoot { name: String },

    #[error("invalid node name '{name}' under {parent}")]
    InvalidName { name: String, parent: String },

    #[error("duplicate child '{name}' under {parent}")]
    DuplicateChild { name: String, parent: String },

    #[error("leaf {nodeset} cannot have children")]
    LeafWithChildren { nodeset: String },

    #[error("bind '{bind}' is not allowed on {nodeset}")]
    MisplacedBind { nodeset: String, bind: &'static str },

    #[error("failed to scan {bind} expression of {nodeset}: {message}")]
    DependencyScan {
        nodeset: String,
        bind: &'static str,
        message: String,
    },

    #[error("unsupported action event '{event}'")]
    UnsupportedEvent { event: String },

    #[error("action targets unknown node {target}")]
    UnknownActionTarget { target: String },

    #[error("action on {event} needs an observed node")]
    MissingObservedNode { event: String },

    #[error("action target {target} is not inside a repeat")]
    ActionOutsideRepeat { target: String },

    #[error("seed of {nodeset} names unknown child '{name}'")]
    UnknownSeedChild { nodeset: String, name: String },

    #[error("seed of {nodeset} does not match its node kind")]
    SeedShape { nodeset: String },

    #[error("default language '{language}' is not one of the form languages")]
    UnknownDefaultLanguage { language: String },

    #[error("mirroring node state failed: {0}")]
    Bridge(#[from] BridgeError),

    #[error("initial computations did not settle: {0}")]
    Unsettled(#[from] FlushError),
}

/// Errors returned to a client calling into a live form instance.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("node {0:?} does not exist or was removed")]
    UnknownNode(NodeId),

    #[error("no node at reference {0}")]
    UnknownReference(String),

    #[error("{operation} is not supported on a {found} node")]
    WrongNodeType {
        operation: &'static str,
        found: &'static str,
    },

    #[error("repeat {reference} is sized by its count expression")]
    ControlledRange { reference: String },

    #[error("repeat index {index} is out of range for {reference} with {len} instances")]
    RepeatIndexOutOfRange {
        reference: String,
        index: usize,
        len: usize,
    },

    #[error("repeat mutation of {reference} needs a positive count")]
    EmptyRepeatMutation { reference: String },

    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    #[error("invalid {value_type} value '{value}': {reason}")]
    InvalidValue {
        value_type: &'static str,
        value: String,
        reason: String,
    },

    #[error("{reference} is readonly")]
    Readonly { reference: String },

    #[error("writing instance XML failed: {0}")]
    Xml(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Unsettled(#[from] FlushError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Failure reported by an expression evaluator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("syntax error at {span:?} in '{expression}': {message}")]
    Syntax {
        expression: String,
        span: Range<usize>,
        message: String,
    },

    #[error("unknown function {name}()")]
    UnknownFunction { name: String },

    #[error("{function}() expects {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("{0}")]
    Type(String),
}

/// The client reactive factory broke its contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("factory returned an object with fields {found:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

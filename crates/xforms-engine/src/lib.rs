//! Reactive computation engine for ODK XForms.
//!
//! A [`FormDefinition`] is compiled once into a [`FormModel`]; every
//! [`FormInstance`] built from it keeps the state of each node (reference,
//! relevance, readonly, required, value, validation) current as the client
//! sets values, adds or removes repeat instances and switches languages.
//! Expressions are evaluated by a caller-supplied [`ExpressionEvaluator`];
//! node state is mirrored one way into objects made by a caller-supplied
//! [`ReactiveFactory`].

pub mod bridge;
pub mod config;
pub mod definition;
pub mod error;
pub mod evaluator;
pub mod instance;
pub mod reactive;
pub mod value;

pub use bridge::{ClientObject, MirrorTarget, PlainFactory, PlainState, ReactiveFactory, StateObject};
pub use config::EngineConfig;
pub use definition::{
    ActionDefinition, FormDefinition, FormModel, NodeDefinition, NodeDefinitionKind, Seed,
    SeedValue,
};
pub use error::{BridgeError, DefinitionError, EngineError, EvaluationError, Result};
pub use evaluator::{DocumentView, EvaluationContext, ExpressionEvaluator, ResultType, TypedResult};
pub use instance::{
    EngineStats, FormInstance, Lifecycle, NodeId, NodeSnapshot, NodeType, Payload,
    ValidationCondition, ValidationState, Violation,
};
pub use value::{ModelValue, ValueType};

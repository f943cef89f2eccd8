use super::node::NodeId;
use super::validation::{DescendantViolation, LeafValidation};
use crate::evaluator::TypedResult;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::sync::Arc;

/// State of one dependency target as seen by a dependent expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProbeSample {
    pub reference: Arc<str>,
    pub relevant: bool,
    pub value: Option<Arc<str>>,
}

/// Value stored in a reactive cell.
///
/// Equality is structural, which is what decides whether dependents of a
/// recomputed cell have to recompute as well.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Text(Arc<str>),
    Number(OrderedFloat<f64>),
    Nodes(Arc<[NodeId]>),
    Probe(Arc<[ProbeSample]>),
    Validation(Arc<LeafValidation>),
    Violations(Arc<[DescendantViolation]>),
}

impl Payload {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn number(number: f64) -> Self {
        Self::Number(OrderedFloat(number))
    }

    pub fn nodes(nodes: impl Into<Arc<[NodeId]>>) -> Self {
        Self::Nodes(nodes.into())
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(text) => !text.is_empty(),
            Self::Number(number) => number.0 != 0.0 && !number.0.is_nan(),
            Self::Nodes(nodes) => !nodes.is_empty(),
            Self::Null | Self::Probe(_) | Self::Validation(_) | Self::Violations(_) => false,
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            _ => "",
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(number) => number.0,
            Self::Bool(true) => 1.0,
            Self::Bool(false) => 0.0,
            Self::Text(text) => text.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    pub fn as_nodes(&self) -> &[NodeId] {
        match self {
            Self::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

impl From<TypedResult> for Payload {
    fn from(result: TypedResult) -> Self {
        match result {
            TypedResult::Boolean(value) => Self::Bool(value),
            TypedResult::String(text) => Self::text(text),
            TypedResult::Number(number) => Self::number(number),
            TypedResult::Nodes(nodes) => Self::nodes(nodes),
        }
    }
}

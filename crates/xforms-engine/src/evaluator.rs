//! The expression evaluator the engine consumes.
//!
//! The engine never parses expressions itself. It hands the contextualized
//! expression text, the expected result type and a read-only view of the
//! document to an [`ExpressionEvaluator`] supplied by the caller.

use crate::error::EvaluationError;
use crate::instance::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Boolean,
    String,
    Number,
    Nodes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedResult {
    Boolean(bool),
    String(String),
    Number(f64),
    Nodes(Vec<NodeId>),
}

impl TypedResult {
    pub fn result_type(&self) -> ResultType {
        match self {
            Self::Boolean(_) => ResultType::Boolean,
            Self::String(_) => ResultType::String,
            Self::Number(_) => ResultType::Number,
            Self::Nodes(_) => ResultType::Nodes,
        }
    }
}

/// Read-only view of the instance tree as the evaluator sees it.
///
/// Repeat ranges are transparent: their instances appear as children of the
/// range's parent, each named like the repeat. Values are the visible ones,
/// so a non-relevant leaf reads as blank.
pub trait DocumentView {
    fn root(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn name(&self, node: NodeId) -> Option<&str>;

    /// Leaf value, or the concatenated values of descendant leaves.
    fn string_value(&self, node: NodeId) -> String;

    fn language(&self) -> Option<&str>;

    /// Text of `id` in the active language.
    fn translate(&self, id: &str) -> Option<&str>;
}

#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub node: NodeId,
    pub document: &'a dyn DocumentView,
}

pub trait ExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        result_type: ResultType,
        context: EvaluationContext<'_>,
    ) -> Result<TypedResult, EvaluationError>;
}

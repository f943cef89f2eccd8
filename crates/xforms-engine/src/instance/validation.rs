//! Per-leaf validity and its roll-up through ancestors.

use super::node::{NodeId, NodeKind};
use super::payload::Payload;
use super::FormInstance;
use crate::bridge::ReactiveFactory;
use crate::reactive::Runtime;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCondition {
    Required,
    Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Violation {
    pub condition: ValidationCondition,
    pub message: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConditionValidation {
    pub condition: ValidationCondition,
    pub valid: bool,
    pub message: Arc<str>,
}

/// Validity of one leaf. At most one violation, `required` first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LeafValidation {
    pub required: ConditionValidation,
    pub constraint: ConditionValidation,
    pub violation: Option<Violation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DescendantViolation {
    pub node: NodeId,
    pub reference: Arc<str>,
    pub violation: Violation,
}

/// Validation as exposed for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationState {
    Leaf { validation: Arc<LeafValidation> },
    /// Relevant descendant leaf violations in document order.
    Parent { violations: Arc<[DescendantViolation]> },
}

impl ValidationState {
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Leaf { validation } => validation.violation.is_none(),
            Self::Parent { violations } => violations.is_empty(),
        }
    }
}

impl<F: ReactiveFactory> FormInstance<F> {
    pub(crate) fn compute_leaf_validation(&mut self, node: NodeId) -> Payload {
        let Some(leaf) = self.nodes.get(node) else {
            return Payload::Null;
        };
        let NodeKind::Leaf { value, .. } = leaf.kind else {
            return Payload::Null;
        };
        let cells = leaf.cells;
        let definition = Arc::clone(&leaf.definition);

        let relevant = self.read(cells.relevant).as_bool();
        let required = self.read(cells.required).as_bool();
        let blank = self.read(value).as_text().trim().is_empty();

        let required_valid = !(relevant && required && blank);
        let constraint_valid = if relevant && !blank {
            cells
                .binds
                .constraint
                .is_none_or(|constraint| self.read(constraint.0).as_bool())
        } else {
            true
        };

        let required = ConditionValidation {
            condition: ValidationCondition::Required,
            valid: required_valid,
            message: definition
                .required_message
                .clone()
                .unwrap_or_else(|| self.config.required_message.as_str().into()),
        };
        let constraint = ConditionValidation {
            condition: ValidationCondition::Constraint,
            valid: constraint_valid,
            message: definition
                .constraint_message
                .clone()
                .unwrap_or_else(|| self.config.constraint_message.as_str().into()),
        };
        let violation = [&required, &constraint]
            .into_iter()
            .find(|condition| !condition.valid)
            .map(|condition| Violation {
                condition: condition.condition,
                message: Arc::clone(&condition.message),
            });
        Payload::Validation(Arc::new(LeafValidation {
            required,
            constraint,
            violation,
        }))
    }

    pub(crate) fn compute_violations(&mut self, node: NodeId) -> Payload {
        let children = self.read_children(node);
        let mut violations = Vec::new();
        for child in children {
            let Some(child_node) = self.nodes.get(child) else {
                continue;
            };
            let is_leaf = matches!(child_node.kind, NodeKind::Leaf { .. });
            let cells = child_node.cells;
            match self.read(cells.validation) {
                Payload::Validation(validation) if is_leaf => {
                    if let Some(violation) = &validation.violation {
                        let reference = self.read(cells.reference);
                        violations.push(DescendantViolation {
                            node: child,
                            reference: reference.as_text().into(),
                            violation: violation.clone(),
                        });
                    }
                }
                Payload::Violations(descendants) => violations.extend(descendants.iter().cloned()),
                _ => {}
            }
        }
        Payload::Violations(violations.into())
    }
}

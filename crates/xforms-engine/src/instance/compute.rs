use super::document::InstanceDocument;
use super::node::{NodeId, NodeKind};
use super::payload::{Payload, ProbeSample};
use super::FormInstance;
use crate::bridge::{MirrorTarget, ReactiveFactory};
use crate::definition::{BindComputation, BindKind, Dependency};
use crate::evaluator::EvaluationContext;
use crate::reactive::{CellId, Runtime};
use std::sync::Arc;

/// What a memo or effect of a form instance computes.
#[derive(Debug, Clone)]
pub enum CellKind {
    Reference(NodeId),
    /// Own relevance AND the parent's.
    Relevant(NodeId),
    /// Own readonly OR the parent's.
    Readonly(NodeId),
    Required(NodeId),
    Expression {
        node: NodeId,
        computation: Arc<BindComputation>,
        probes: Arc<[CellId]>,
        constant: bool,
    },
    /// Reference, relevance and value of the nodes a dependency currently
    /// resolves to.
    Probe {
        node: NodeId,
        dependency: Dependency,
    },
    /// Leaf value as clients see it.
    Visible(NodeId),
    LeafValidation(NodeId),
    Violations(NodeId),
    /// Effect writing the calculate result into the leaf.
    Calculate(NodeId),
    /// Effect sizing a controlled repeat range.
    RepeatCount(NodeId),
    /// Effect pushing one field into a client object.
    Mirror {
        node: NodeId,
        target: MirrorTarget,
        field: &'static str,
        source: CellId,
    },
}

impl<F: ReactiveFactory> FormInstance<F> {
    pub(crate) fn compute_cell(&mut self, cell: CellId, kind: &CellKind) -> Payload {
        match kind {
            CellKind::Reference(node) => self.compute_reference(*node),
            CellKind::Relevant(node) => self.compute_inherited(*node, Inherited::Relevant),
            CellKind::Readonly(node) => self.compute_inherited(*node, Inherited::Readonly),
            CellKind::Required(node) => {
                let required = self
                    .nodes
                    .get(*node)
                    .and_then(|node| node.cells.binds.required);
                Payload::Bool(required.is_some_and(|required| self.read(required.0).as_bool()))
            }
            CellKind::Expression {
                node,
                computation,
                probes,
                constant,
            } => self.compute_expression(*node, computation, probes, *constant),
            CellKind::Probe { node, dependency } => self.compute_probe(*node, dependency),
            CellKind::Visible(node) => self.compute_visible(*node),
            CellKind::LeafValidation(node) => self.compute_leaf_validation(*node),
            CellKind::Violations(node) => self.compute_violations(*node),
            CellKind::Calculate(node) => self.compute_calculate(cell, *node),
            CellKind::RepeatCount(range) => {
                let count = match self.nodes.get(*range).map(|range| &range.kind) {
                    Some(NodeKind::RepeatRange {
                        count: Some(count), ..
                    }) => *count,
                    _ => return Payload::number(0.0),
                };
                let count = self.read(count).as_number();
                Payload::number(if count.is_finite() && count > 0.0 {
                    count.floor()
                } else {
                    0.0
                })
            }
            CellKind::Mirror { source, .. } => self.read(*source),
        }
    }

    pub(crate) fn apply_cell(&mut self, kind: &CellKind, value: &Payload) {
        match kind {
            CellKind::Calculate(node) => {
                let Payload::Text(text) = value else {
                    return;
                };
                if let Some(NodeKind::Leaf { value: cell, .. }) =
                    self.nodes.get(*node).map(|node| &node.kind)
                {
                    let cell = *cell;
                    self.graph.write(cell, Payload::Text(Arc::clone(text)));
                }
            }
            CellKind::RepeatCount(range) => {
                let count = value.as_number();
                if count.is_finite() && count >= 0.0 {
                    let limit = self.config.max_repeat_count;
                    let target = if count > limit as f64 {
                        log::warn!("repeat count {count} of {range:?} clamped to {limit}");
                        limit
                    } else {
                        count as usize
                    };
                    self.resize_range(*range, target);
                }
            }
            CellKind::Mirror {
                node,
                target,
                field,
                ..
            } => self.bridge.propagate(*node, *target, field, value),
            _ => {}
        }
    }

    /// Children as of now, tracking a range's instance list.
    pub(crate) fn read_children(&mut self, node: NodeId) -> Vec<NodeId> {
        let Some(instance_node) = self.nodes.get(node) else {
            return Vec::new();
        };
        match instance_node.kind {
            NodeKind::RepeatRange { instances, .. } => self.read(instances).as_nodes().to_vec(),
            _ => instance_node.static_children().to_vec(),
        }
    }

    fn compute_reference(&mut self, node: NodeId) -> Payload {
        let Some(instance_node) = self.nodes.get(node) else {
            return Payload::Null;
        };
        let name = instance_node.name().to_owned();
        let parent_reference = instance_node
            .parent
            .and_then(|parent| self.nodes.get(parent))
            .map(|parent| parent.cells.reference);
        let position = match instance_node.kind {
            NodeKind::RepeatInstance { position, .. } => Some(position),
            _ => None,
        };
        let Some(parent_reference) = parent_reference else {
            return Payload::text(format!("/{name}"));
        };
        let base = self.read(parent_reference);
        match position {
            Some(position) => {
                let position = self.read(position).as_number();
                Payload::text(format!("{}[{}]", base.as_text(), position as usize))
            }
            None => Payload::text(format!("{}/{name}", base.as_text())),
        }
    }

    fn compute_inherited(&mut self, node: NodeId, inherited: Inherited) -> Payload {
        let Some(instance_node) = self.nodes.get(node) else {
            return Payload::Null;
        };
        let parent = instance_node
            .parent
            .and_then(|parent| self.nodes.get(parent))
            .map(|parent| match inherited {
                Inherited::Relevant => parent.cells.relevant,
                Inherited::Readonly => parent.cells.readonly,
            });
        let own = match inherited {
            Inherited::Relevant => instance_node.cells.binds.relevant,
            Inherited::Readonly => instance_node.cells.binds.readonly,
        };
        // relevant: parent AND own, readonly: parent OR own
        let decided = match inherited {
            Inherited::Relevant => false,
            Inherited::Readonly => true,
        };
        if let Some(parent) = parent {
            if self.read(parent).as_bool() == decided {
                return Payload::Bool(decided);
            }
        }
        Payload::Bool(match own {
            Some(own) => self.read(own.0).as_bool(),
            None => !decided,
        })
    }

    fn compute_expression(
        &mut self,
        node: NodeId,
        computation: &BindComputation,
        probes: &[CellId],
        constant: bool,
    ) -> Payload {
        if !constant {
            if let Some(reference) = self.nodes.get(node).map(|node| node.cells.reference) {
                self.read(reference);
            }
            for probe in probes {
                self.read(*probe);
            }
            if computation.translated {
                if let Some(language) = self.language_cell() {
                    self.read(language);
                }
            }
        }
        let expression = self.contextualize(node, computation);
        self.evaluate(node, &expression, computation)
    }

    /// Run the external evaluator. Failures are logged and replaced by the
    /// neutral value of the bind.
    pub(crate) fn evaluate(
        &self,
        node: NodeId,
        expression: &str,
        computation: &BindComputation,
    ) -> Payload {
        let evaluator = Arc::clone(&self.evaluator);
        let document = InstanceDocument::new(self);
        let context = EvaluationContext {
            node,
            document: &document,
        };
        match evaluator.evaluate(expression, computation.result_type, context) {
            Ok(result) => Payload::from(result),
            Err(error) => {
                log::error!(
                    "{} expression '{expression}' failed on {node:?}: {error}",
                    computation.kind.name()
                );
                fallback(computation.kind)
            }
        }
    }

    fn compute_probe(&mut self, node: NodeId, dependency: &Dependency) -> Payload {
        if let Some(reference) = self.nodes.get(node).map(|node| node.cells.reference) {
            self.read(reference);
        }
        let nodeset = dependency.nodeset.as_str();
        if !self.model.contains(nodeset) {
            log::warn!("unresolvable dependency {nodeset} of {node:?}");
            return Payload::Probe(Arc::from([ProbeSample {
                reference: nodeset.into(),
                relevant: true,
                value: None,
            }]));
        }
        let reference = self.contextualize_path(node, nodeset, dependency.filtered_at.as_deref());
        let targets = self.locate(&reference);
        let mut samples = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(cells) = self.nodes.get(target).map(|target| target.cells) else {
                continue;
            };
            let reference = self.read(cells.reference);
            let relevant = self.read(cells.relevant).as_bool();
            let mut value = String::new();
            self.read_string_value(target, &mut value);
            samples.push(ProbeSample {
                reference: reference.as_text().into(),
                relevant,
                value: Some(value.into()),
            });
        }
        Payload::Probe(samples.into())
    }

    /// Append the string-value of `node` (its visible value, or the
    /// concatenated values of its descendant leaves) reading every cell
    /// involved tracked.
    fn read_string_value(&mut self, node: NodeId, out: &mut String) {
        let visible = match self.nodes.get(node).map(|node| &node.kind) {
            Some(NodeKind::Leaf { visible, .. }) => Some(*visible),
            Some(_) => None,
            None => return,
        };
        match visible {
            Some(visible) => out.push_str(self.read(visible).as_text()),
            None => {
                for child in self.read_children(node) {
                    self.read_string_value(child, out);
                }
            }
        }
    }

    fn compute_visible(&mut self, node: NodeId) -> Payload {
        let Some(leaf) = self.nodes.get(node) else {
            return Payload::Null;
        };
        let NodeKind::Leaf { value, .. } = leaf.kind else {
            return Payload::Null;
        };
        let relevant = leaf.cells.relevant;
        if self.config.blank_non_relevant && !self.read(relevant).as_bool() {
            return Payload::text("");
        }
        self.read(value)
    }

    /// The calculate result while relevant. While not relevant the previous
    /// result is kept, so regaining relevance only writes when the result
    /// differs from what was last written.
    fn compute_calculate(&mut self, cell: CellId, node: NodeId) -> Payload {
        let Some(leaf) = self.nodes.get(node) else {
            return Payload::Null;
        };
        let relevant = leaf.cells.relevant;
        let Some(calculate) = leaf.cells.binds.calculate else {
            return Payload::Null;
        };
        if !self.read(relevant).as_bool() {
            return self.graph.peek(cell).cloned().unwrap_or_default();
        }
        self.read(calculate.0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Inherited {
    Relevant,
    Readonly,
}

/// Neutral result of a failed evaluation.
fn fallback(kind: BindKind) -> Payload {
    match kind {
        BindKind::Relevant | BindKind::Constraint => Payload::Bool(true),
        BindKind::Readonly | BindKind::Required => Payload::Bool(false),
        BindKind::Count => Payload::number(0.0),
        BindKind::Calculate | BindKind::Label | BindKind::Hint | BindKind::ActionValue => {
            Payload::text("")
        }
    }
}

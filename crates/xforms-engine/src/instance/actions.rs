//! Event actions and client mirrors.

use super::compute::CellKind;
use super::node::{NodeId, NodeKind};
use super::payload::Payload;
use super::FormInstance;
use crate::bridge::{MirrorTarget, ReactiveFactory, StateObject};
use crate::definition::{ActionEvent, BindComputation, CompiledAction};
use crate::error::BridgeError;
use crate::reactive::{CellId, Runtime, ScopeId};
use std::sync::Arc;

enum Field {
    Fixed(Payload),
    Cell(CellId),
}

impl<F: ReactiveFactory> FormInstance<F> {
    pub(crate) fn run_first_load_actions(&mut self) {
        let actions: Vec<CompiledAction> = self
            .model
            .actions_for(ActionEvent::InstanceFirstLoad)
            .cloned()
            .collect();
        let root = self.root;
        for action in &actions {
            self.run_action(root, action);
        }
    }

    /// Actions targeting nodes inside the repeat of `instance`, run with
    /// the new instance as context.
    pub(crate) fn run_new_repeat_actions(&mut self, instance: NodeId) {
        let Some(nodeset) = self
            .nodes
            .get(instance)
            .map(|node| format!("{}/", node.definition.nodeset))
        else {
            return;
        };
        let actions: Vec<CompiledAction> = self
            .model
            .actions_for(ActionEvent::NewRepeat)
            .filter(|action| action.target.starts_with(&nodeset))
            .cloned()
            .collect();
        for action in &actions {
            self.run_action(instance, action);
        }
    }

    pub(crate) fn run_value_changed_actions(&mut self, leaf: NodeId) {
        let Some(nodeset) = self
            .nodes
            .get(leaf)
            .map(|node| node.definition.nodeset.clone())
        else {
            return;
        };
        let actions: Vec<CompiledAction> = self
            .model
            .actions_for(ActionEvent::ValueChanged)
            .filter(|action| action.observe.as_deref() == Some(nodeset.as_str()))
            .cloned()
            .collect();
        for action in &actions {
            self.run_action(leaf, action);
        }
    }

    fn run_action(&mut self, context: NodeId, action: &CompiledAction) {
        let target = self.contextualize_path(context, &action.target, None);
        let targets = self.locate(&target);
        if targets.is_empty() {
            log::warn!("{} action target {target} matches no node", action.event.name());
        }
        for target in targets {
            let value_cell = match self.nodes.get(target).map(|node| &node.kind) {
                Some(NodeKind::Leaf { value, .. }) => *value,
                _ => {
                    log::warn!("{} action target {target:?} is not a leaf", action.event.name());
                    continue;
                }
            };
            let value = match &action.value {
                Some(computation) => self.evaluate_detached(target, computation),
                None => Payload::text(""),
            };
            log::trace!("{} action sets {target:?} to {value:?}", action.event.name());
            self.graph.write(value_cell, Payload::text(value.as_text()));
        }
    }

    /// One-off evaluation with fresh dependency probes, torn down afterwards.
    fn evaluate_detached(&mut self, node: NodeId, computation: &Arc<BindComputation>) -> Payload {
        let in_repeat = self.nodes.get(node).is_some_and(|node| {
            node.definition.in_repeat || matches!(node.kind, NodeKind::RepeatInstance { .. })
        });
        let scope = self.graph.create_scope(ScopeId::ROOT);
        let accessor = self.create_expression(scope, node, Arc::clone(computation), in_repeat);
        let value = self.read_untracked(accessor.0);
        self.graph.dispose_scope(scope);
        value
    }

    /// Create client objects for `node` and its descendants in document
    /// order, each followed by effects keeping its fields current.
    pub(crate) fn mirror_subtree(&mut self, node: NodeId) -> Result<(), BridgeError> {
        for id in self.subtree(node) {
            self.mirror_node(id)?;
        }
        Ok(())
    }

    fn mirror_node(&mut self, node: NodeId) -> Result<(), BridgeError> {
        let Some(instance_node) = self.nodes.get(node) else {
            return Ok(());
        };
        let scope = instance_node.scope;
        let cells = instance_node.cells;
        let node_type = instance_node.node_type();
        let optional = |cell: Option<CellId>| cell.map_or(Field::Fixed(Payload::Null), Field::Cell);

        let mut current = vec![
            ("node_type", Field::Fixed(Payload::text(node_type.name()))),
            ("reference", Field::Cell(cells.reference)),
            ("relevant", Field::Cell(cells.relevant)),
            ("readonly", Field::Cell(cells.readonly)),
            ("required", Field::Cell(cells.required)),
            ("label", optional(cells.label)),
            ("hint", optional(cells.hint)),
        ];
        match &instance_node.kind {
            NodeKind::Leaf { visible, .. } => current.push(("value", Field::Cell(*visible))),
            NodeKind::RepeatRange { instances, .. } => {
                current.push(("children", Field::Cell(*instances)))
            }
            NodeKind::Root { children, language } => {
                current.push(("children", Field::Fixed(Payload::nodes(children.clone()))));
                current.push(("language", Field::Cell(*language)));
            }
            NodeKind::Subtree { children }
            | NodeKind::Group { children }
            | NodeKind::RepeatInstance { children, .. } => {
                current.push(("children", Field::Fixed(Payload::nodes(children.clone()))))
            }
        }
        let validation_field = if matches!(instance_node.kind, NodeKind::Leaf { .. }) {
            "validation"
        } else {
            "violations"
        };
        let validation = vec![(validation_field, Field::Cell(cells.validation))];

        self.mirror(node, scope, MirrorTarget::Current, current)?;
        self.mirror(node, scope, MirrorTarget::Validation, validation)
    }

    fn mirror(
        &mut self,
        node: NodeId,
        scope: ScopeId,
        target: MirrorTarget,
        fields: Vec<(&'static str, Field)>,
    ) -> Result<(), BridgeError> {
        let mut state = StateObject::with_capacity(fields.len());
        for (name, field) in &fields {
            let value = match field {
                Field::Fixed(value) => value.clone(),
                Field::Cell(cell) => self.read_untracked(*cell),
            };
            state.insert(*name, value);
        }
        self.bridge.create(node, target, state)?;
        for (field, source) in fields {
            if let Field::Cell(source) = source {
                self.graph.effect(
                    scope,
                    CellKind::Mirror {
                        node,
                        target,
                        field,
                        source,
                    },
                );
            }
        }
        Ok(())
    }
}

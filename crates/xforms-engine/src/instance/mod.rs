//! Live form instances.
//!
//! A [`FormInstance`] owns the node tree built from a [`FormModel`], the
//! reactive graph holding every node's state and the client mirrors. Client
//! mutations go through its methods and each one returns the root node id
//! once all affected computations and mirrors have settled.

mod actions;
mod build;
mod compute;
mod document;
mod node;
mod payload;
mod repeat;
mod resolve;
mod serialize;
mod validation;

pub use compute::CellKind;
pub use node::{
    Accessor, BindAccessors, InstanceNode, Lifecycle, NodeArena, NodeCells, NodeId, NodeKind,
    NodeType,
};
pub use payload::{Payload, ProbeSample};
pub use serialize::NodeSnapshot;
pub use validation::{
    ConditionValidation, DescendantViolation, LeafValidation, ValidationCondition,
    ValidationState, Violation,
};

use crate::bridge::{Bridge, MirrorTarget, PlainFactory, ReactiveFactory};
use crate::config::EngineConfig;
use crate::definition::FormModel;
use crate::error::{DefinitionError, EngineError, Result};
use crate::evaluator::ExpressionEvaluator;
use crate::reactive::{CellId, Graph, Runtime};
use crate::value::ModelValue;
use serde::Serialize;
use std::sync::Arc;

/// Counters for tooling and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub live_nodes: usize,
    pub live_cells: usize,
    pub live_scopes: usize,
    pub mirrored_objects: usize,
    pub recomputations: u64,
}

pub struct FormInstance<F: ReactiveFactory = PlainFactory> {
    model: Arc<FormModel>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    config: EngineConfig,
    graph: Graph<CellKind, Payload>,
    nodes: NodeArena,
    root: NodeId,
    bridge: Bridge<F>,
    /// Repeat instances not yet live.
    settling: Vec<NodeId>,
}

impl<F: ReactiveFactory> FormInstance<F> {
    /// Build the instance tree, run the initial computations and the
    /// `odk-instance-first-load` actions, then mirror every node through
    /// `factory`.
    pub fn new(
        model: Arc<FormModel>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        factory: F,
        config: EngineConfig,
    ) -> Result<Self, DefinitionError> {
        let mut nodes = NodeArena::default();
        let root = nodes.reserve();
        let mut instance = Self {
            model,
            evaluator,
            config,
            graph: Graph::new(),
            nodes,
            root,
            bridge: Bridge::new(factory),
            settling: Vec::new(),
        };
        instance.build_root();
        log::debug!(
            "built form '{}': {} nodes, {} cells",
            instance.model.title,
            instance.nodes.len(),
            instance.graph.stats().live_cells
        );

        instance.flush()?;
        instance.run_first_load_actions();
        for id in instance.settling.clone() {
            instance.advance_lifecycle(id, Lifecycle::Initialized);
        }
        instance.flush()?;

        instance.mirror_subtree(root)?;
        instance.bridge.enable();
        instance.flush()?;
        instance.settle();
        Ok(instance)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn model(&self) -> &FormModel {
        &self.model
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&InstanceNode> {
        self.nodes.get(id).ok_or(EngineError::UnknownNode(id))
    }

    pub fn node_type(&self, node: NodeId) -> Result<NodeType> {
        Ok(self.node(node)?.node_type())
    }

    pub fn name(&self, node: NodeId) -> Result<&str> {
        Ok(self.node(node)?.name())
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(node)?.parent)
    }

    /// Current children: static children for structural nodes, instances
    /// for ranges.
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(node)?;
        Ok(match node.kind {
            NodeKind::RepeatRange { instances, .. } => self
                .graph
                .peek(instances)
                .map(|list| list.as_nodes().to_vec())
                .unwrap_or_default(),
            _ => node.static_children().to_vec(),
        })
    }

    pub fn lifecycle(&self, node: NodeId) -> Result<Lifecycle> {
        let node = self.node(node)?;
        match node.kind {
            NodeKind::RepeatInstance { lifecycle, .. } => Ok(lifecycle),
            _ => Err(EngineError::WrongNodeType {
                operation: "lifecycle",
                found: node.node_type().name(),
            }),
        }
    }

    fn read_cell(&mut self, node: NodeId, cell: impl Fn(&InstanceNode) -> CellId) -> Result<Payload> {
        let cell = cell(self.node(node)?);
        Ok(self.read(cell))
    }

    pub fn reference(&mut self, node: NodeId) -> Result<String> {
        Ok(self.read_cell(node, |node| node.cells.reference)?.as_text().to_owned())
    }

    pub fn is_relevant(&mut self, node: NodeId) -> Result<bool> {
        Ok(self.read_cell(node, |node| node.cells.relevant)?.as_bool())
    }

    pub fn is_readonly(&mut self, node: NodeId) -> Result<bool> {
        Ok(self.read_cell(node, |node| node.cells.readonly)?.as_bool())
    }

    pub fn is_required(&mut self, node: NodeId) -> Result<bool> {
        Ok(self.read_cell(node, |node| node.cells.required)?.as_bool())
    }

    pub fn label(&mut self, node: NodeId) -> Result<Option<String>> {
        let Some(cell) = self.node(node)?.cells.label else {
            return Ok(None);
        };
        Ok(Some(self.read(cell).as_text().to_owned()))
    }

    pub fn hint(&mut self, node: NodeId) -> Result<Option<String>> {
        let Some(cell) = self.node(node)?.cells.hint else {
            return Ok(None);
        };
        Ok(Some(self.read(cell).as_text().to_owned()))
    }

    fn leaf_cells(&self, node: NodeId, operation: &'static str) -> Result<(CellId, CellId)> {
        let leaf = self.node(node)?;
        match leaf.kind {
            NodeKind::Leaf { value, visible, .. } => Ok((value, visible)),
            _ => Err(EngineError::WrongNodeType {
                operation,
                found: leaf.node_type().name(),
            }),
        }
    }

    /// Visible value of a leaf: blank while the leaf is not relevant.
    pub fn value(&mut self, node: NodeId) -> Result<String> {
        let (_, visible) = self.leaf_cells(node, "value")?;
        Ok(self.read(visible).as_text().to_owned())
    }

    /// Visible value decoded according to the leaf's value type.
    pub fn model_value(&mut self, node: NodeId) -> Result<ModelValue> {
        let (_, visible) = self.leaf_cells(node, "model_value")?;
        let value_type = match self.node(node)?.kind {
            NodeKind::Leaf { value_type, .. } => value_type,
            _ => return Err(EngineError::UnknownNode(node)),
        };
        let text = self.read(visible);
        ModelValue::decode(value_type, text.as_text())
    }

    pub fn validation_state(&mut self, node: NodeId) -> Result<ValidationState> {
        match self.read_cell(node, |node| node.cells.validation)? {
            Payload::Validation(validation) => Ok(ValidationState::Leaf { validation }),
            Payload::Violations(violations) => Ok(ValidationState::Parent { violations }),
            _ => Err(EngineError::UnknownNode(node)),
        }
    }

    /// Node currently at `reference`, e.g. `/data/member[2]/age`.
    pub fn find(&mut self, reference: &str) -> Option<NodeId> {
        match self.locate(reference).as_slice() {
            [node] => Some(*node),
            _ => None,
        }
    }

    /// Repeat range at `reference`, e.g. `/data/member`. Unlike [`find`],
    /// which selects the range's instances, this returns the range itself.
    ///
    /// [`find`]: Self::find
    pub fn find_range(&mut self, reference: &str) -> Option<NodeId> {
        let (parent, name) = reference.rsplit_once('/')?;
        if parent.is_empty() {
            return None;
        }
        let parent = self.find(parent)?;
        self.nodes
            .get(parent)?
            .static_children()
            .iter()
            .copied()
            .find(|child| {
                self.nodes.get(*child).is_some_and(|child| {
                    child.name() == name && child.node_type() == NodeType::RepeatRange
                })
            })
    }

    pub fn language(&mut self) -> Option<String> {
        let cell = self.language_cell()?;
        match self.read(cell) {
            Payload::Text(language) => Some(language.to_string()),
            _ => None,
        }
    }

    pub(crate) fn language_cell(&self) -> Option<CellId> {
        match self.nodes.get(self.root)?.kind {
            NodeKind::Root { language, .. } => Some(language),
            _ => None,
        }
    }

    /// Mirrored `currentState` of `node`.
    pub fn current_state(&self, node: NodeId) -> Result<&F::Object> {
        self.bridge
            .get(node, MirrorTarget::Current)
            .ok_or(EngineError::UnknownNode(node))
    }

    /// Mirrored `validationState` of `node`.
    pub fn validation_mirror(&self, node: NodeId) -> Result<&F::Object> {
        self.bridge
            .get(node, MirrorTarget::Validation)
            .ok_or(EngineError::UnknownNode(node))
    }

    /// Set a leaf's value from client input.
    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<NodeId> {
        let (value_cell, _) = self.leaf_cells(node, "set_value")?;
        let (readonly, value_type) = {
            let leaf = self.node(node)?;
            let NodeKind::Leaf { value_type, .. } = leaf.kind else {
                return Err(EngineError::UnknownNode(node));
            };
            (leaf.cells.readonly, value_type)
        };
        if self.read(readonly).as_bool() {
            return Err(EngineError::Readonly {
                reference: self.reference(node)?,
            });
        }
        let canonical = value_type.canonicalize(value)?;
        if self.graph.write(value_cell, Payload::text(canonical)) {
            log::debug!("value of {node:?} set");
            self.flush()?;
            self.run_value_changed_actions(node);
        }
        self.flush()?;
        self.settle();
        Ok(self.root)
    }

    pub fn set_language(&mut self, language: &str) -> Result<NodeId> {
        if !self.model.languages.iter().any(|candidate| candidate == language) {
            return Err(EngineError::UnsupportedLanguage(language.to_owned()));
        }
        let cell = self
            .language_cell()
            .ok_or(EngineError::UnknownNode(self.root))?;
        self.graph.write(cell, Payload::text(language));
        self.flush()?;
        self.settle();
        Ok(self.root)
    }

    pub fn stats(&self) -> EngineStats {
        let graph = self.graph.stats();
        EngineStats {
            live_nodes: self.nodes.len(),
            live_cells: graph.live_cells,
            live_scopes: graph.live_scopes,
            mirrored_objects: self.bridge.len(),
            recomputations: graph.recomputations,
        }
    }

    pub(crate) fn advance_lifecycle(&mut self, id: NodeId, next: Lifecycle) {
        if let Some(InstanceNode {
            kind: NodeKind::RepeatInstance { lifecycle, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            if *lifecycle < next {
                log::trace!("repeat instance {id:?}: {lifecycle:?} -> {next:?}");
                *lifecycle = next;
            }
        }
    }

    /// Promote every initialized repeat instance to live.
    fn settle(&mut self) {
        for id in std::mem::take(&mut self.settling) {
            self.advance_lifecycle(id, Lifecycle::Initialized);
            self.advance_lifecycle(id, Lifecycle::Live);
        }
    }
}

impl<F: ReactiveFactory> Runtime for FormInstance<F> {
    type Kind = CellKind;
    type Value = Payload;

    fn graph(&self) -> &Graph<CellKind, Payload> {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut Graph<CellKind, Payload> {
        &mut self.graph
    }

    fn compute(&mut self, cell: CellId, kind: &CellKind) -> Payload {
        self.compute_cell(cell, kind)
    }

    fn apply_effect(&mut self, _cell: CellId, kind: &CellKind, value: &Payload) {
        self.apply_cell(kind, value);
    }

    fn max_effect_runs(&self) -> usize {
        self.config.max_effect_iterations
    }
}

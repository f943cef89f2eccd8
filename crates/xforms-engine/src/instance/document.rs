use super::node::{NodeId, NodeKind};
use super::FormInstance;
use crate::bridge::ReactiveFactory;
use crate::evaluator::DocumentView;

/// The instance tree as handed to the expression evaluator. Reads peek at
/// cell values; the calling computation has already brought its
/// dependencies up to date.
pub(crate) struct InstanceDocument<'a, F: ReactiveFactory> {
    instance: &'a FormInstance<F>,
}

impl<'a, F: ReactiveFactory> InstanceDocument<'a, F> {
    pub fn new(instance: &'a FormInstance<F>) -> Self {
        Self { instance }
    }

    fn instances(&self, range: NodeId) -> Vec<NodeId> {
        match self.instance.nodes.get(range).map(|range| &range.kind) {
            Some(NodeKind::RepeatRange { instances, .. }) => self
                .instance
                .graph
                .peek(*instances)
                .map(|list| list.as_nodes().to_vec())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl<F: ReactiveFactory> DocumentView for InstanceDocument<'_, F> {
    fn root(&self) -> NodeId {
        self.instance.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.instance.nodes.get(node)?.parent?;
        let parent_node = self.instance.nodes.get(parent)?;
        match parent_node.kind {
            NodeKind::RepeatRange { .. } => parent_node.parent,
            _ => Some(parent),
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Some(node) = self.instance.nodes.get(node) else {
            return Vec::new();
        };
        let mut children = Vec::with_capacity(node.static_children().len());
        for child in node.static_children() {
            match self.instance.nodes.get(*child).map(|child| &child.kind) {
                Some(NodeKind::RepeatRange { .. }) => children.extend(self.instances(*child)),
                Some(_) => children.push(*child),
                None => {}
            }
        }
        children
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.instance.nodes.get(node).map(|node| node.name())
    }

    fn string_value(&self, node: NodeId) -> String {
        let Some(instance_node) = self.instance.nodes.get(node) else {
            return String::new();
        };
        match instance_node.kind {
            NodeKind::Leaf { value, visible, .. } => {
                let graph = &self.instance.graph;
                graph
                    .peek(visible)
                    .or_else(|| graph.peek(value))
                    .map(|payload| payload.as_text().to_owned())
                    .unwrap_or_default()
            }
            _ => self
                .children(node)
                .into_iter()
                .map(|child| self.string_value(child))
                .collect(),
        }
    }

    fn language(&self) -> Option<&str> {
        let cell = self.instance.language_cell()?;
        match self.instance.graph.peek(cell)?.as_text() {
            "" => None,
            language => Some(language),
        }
    }

    fn translate(&self, id: &str) -> Option<&str> {
        let language = self.language()?;
        self.instance.model.translate(language, id)
    }
}

use crate::definition::CompiledNode;
use crate::reactive::{CellId, ScopeId};
use crate::value::ValueType;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identity of an instance node, stable for the node's lifetime and never
/// reused for another node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Id of a first-generation node at `index`, for documents built
    /// outside a form instance.
    pub fn from_index(index: usize) -> Self {
        Self {
            index: index as u32,
            generation: 0,
        }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Root,
    Subtree,
    Group,
    RepeatRange,
    RepeatInstance,
    Leaf,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Subtree => "subtree",
            Self::Group => "group",
            Self::RepeatRange => "repeat-range",
            Self::RepeatInstance => "repeat-instance",
            Self::Leaf => "leaf",
        }
    }
}

/// One-way lifecycle of a repeat instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Constructed,
    Initialized,
    Live,
    Disposed,
}

/// Re-readable handle to the result of a bind computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessor(pub(crate) CellId);

#[derive(Debug, Clone, Copy, Default)]
pub struct BindAccessors {
    pub calculate: Option<Accessor>,
    pub relevant: Option<Accessor>,
    pub readonly: Option<Accessor>,
    pub required: Option<Accessor>,
    pub constraint: Option<Accessor>,
}

/// Cells every node carries.
#[derive(Debug, Clone, Copy)]
pub struct NodeCells {
    pub reference: CellId,
    pub relevant: CellId,
    pub readonly: CellId,
    pub required: CellId,
    pub label: Option<CellId>,
    pub hint: Option<CellId>,
    /// Own validation for leaves, descendant violations for parents.
    pub validation: CellId,
    pub binds: BindAccessors,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root {
        children: Vec<NodeId>,
        language: CellId,
    },
    Subtree {
        children: Vec<NodeId>,
    },
    Group {
        children: Vec<NodeId>,
    },
    RepeatRange {
        /// Ordered instance ids.
        instances: CellId,
        /// Count expression of a controlled range.
        count: Option<CellId>,
    },
    RepeatInstance {
        /// 1-based.
        position: CellId,
        lifecycle: Lifecycle,
        children: Vec<NodeId>,
    },
    Leaf {
        value_type: ValueType,
        /// Underlying value, kept while the leaf is not relevant.
        value: CellId,
        /// What clients see.
        visible: CellId,
        calculate: Option<CellId>,
    },
}

#[derive(Debug, Clone)]
pub struct InstanceNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub definition: Arc<CompiledNode>,
    pub scope: ScopeId,
    pub cells: NodeCells,
    pub kind: NodeKind,
}

impl InstanceNode {
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Root { .. } => NodeType::Root,
            NodeKind::Subtree { .. } => NodeType::Subtree,
            NodeKind::Group { .. } => NodeType::Group,
            NodeKind::RepeatRange { .. } => NodeType::RepeatRange,
            NodeKind::RepeatInstance { .. } => NodeType::RepeatInstance,
            NodeKind::Leaf { .. } => NodeType::Leaf,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Children fixed at construction. Empty for ranges and leaves.
    pub fn static_children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Root { children, .. }
            | NodeKind::Subtree { children }
            | NodeKind::Group { children }
            | NodeKind::RepeatInstance { children, .. } => children,
            NodeKind::RepeatRange { .. } | NodeKind::Leaf { .. } => &[],
        }
    }
}

#[derive(Debug, Default)]
struct NodeSlot {
    generation: u32,
    node: Option<InstanceNode>,
}

/// Owner of all instance nodes. Parents refer to children by id, children to
/// their parent by id.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<NodeSlot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    /// Allocate an id for a node that is filled in later.
    pub fn reserve(&mut self) -> NodeId {
        if let Some(index) = self.free.pop() {
            NodeId {
                index,
                generation: self.slots[index as usize].generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(NodeSlot::default());
            NodeId { index, generation: 0 }
        }
    }

    pub fn fill(&mut self, node: InstanceNode) {
        let id = node.id;
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation => {
                if slot.node.replace(node).is_none() {
                    self.live += 1;
                }
            }
            _ => log::error!("fill of unreserved node {id:?}"),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&InstanceNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut InstanceNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn remove(&mut self, id: NodeId) -> Option<InstanceNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

//! Adding, removing and renumbering repeat instances.

use super::node::{Lifecycle, NodeId, NodeKind};
use super::payload::Payload;
use super::FormInstance;
use crate::bridge::ReactiveFactory;
use crate::error::{BridgeError, EngineError, Result};
use crate::reactive::{CellId, Runtime};
use std::sync::Arc;

impl<F: ReactiveFactory> FormInstance<F> {
    /// Insert `count` new instances after the instance at `after` (0-based),
    /// or at the end. New instances are initialized before this returns.
    pub fn add_instances(&mut self, range: NodeId, after: Option<usize>, count: usize) -> Result<NodeId> {
        let instances = self.uncontrolled_range(range, "add_instances")?;
        if count == 0 {
            return Err(EngineError::EmptyRepeatMutation {
                reference: self.reference(range)?,
            });
        }
        let len = self.read_untracked(instances).as_nodes().len();
        let at = match after {
            Some(after) if after >= len => {
                return Err(EngineError::RepeatIndexOutOfRange {
                    reference: self.reference(range)?,
                    index: after,
                    len,
                });
            }
            Some(after) => after + 1,
            None => len,
        };
        self.insert_instances(range, at, count)?;
        self.flush()?;
        self.settle();
        Ok(self.root)
    }

    /// Remove `count` instances starting at `start` (0-based).
    pub fn remove_instances(&mut self, range: NodeId, start: usize, count: usize) -> Result<NodeId> {
        let instances = self.uncontrolled_range(range, "remove_instances")?;
        if count == 0 {
            return Err(EngineError::EmptyRepeatMutation {
                reference: self.reference(range)?,
            });
        }
        let len = self.read_untracked(instances).as_nodes().len();
        let out_of_range = start
            .checked_add(count)
            .is_none_or(|end| end > len);
        if start >= len || out_of_range {
            return Err(EngineError::RepeatIndexOutOfRange {
                reference: self.reference(range)?,
                index: start.saturating_add(count).saturating_sub(1).max(start),
                len,
            });
        }
        self.drop_instances(range, start, count);
        self.flush()?;
        self.settle();
        Ok(self.root)
    }

    /// Size a controlled range to `target` instances, appending or removing
    /// at the end.
    pub(crate) fn resize_range(&mut self, range: NodeId, target: usize) {
        let Some(instances) = self.instances_cell(range) else {
            return;
        };
        let len = self.read_untracked(instances).as_nodes().len();
        if target > len {
            log::debug!("growing {range:?} from {len} to {target} instances");
            if let Err(error) = self.insert_instances(range, len, target - len) {
                log::error!("mirroring new instances of {range:?} failed: {error}");
            }
        } else if target < len {
            log::debug!("shrinking {range:?} from {len} to {target} instances");
            self.drop_instances(range, target, len - target);
        }
    }

    fn instances_cell(&self, range: NodeId) -> Option<CellId> {
        match self.nodes.get(range)?.kind {
            NodeKind::RepeatRange { instances, .. } => Some(instances),
            _ => None,
        }
    }

    fn uncontrolled_range(&mut self, range: NodeId, operation: &'static str) -> Result<CellId> {
        let node = self.node(range)?;
        let found = node.node_type().name();
        let range_cells = match node.kind {
            NodeKind::RepeatRange { instances, count } => Some((instances, count.is_some())),
            _ => None,
        };
        match range_cells {
            Some((_, true)) => Err(EngineError::ControlledRange {
                reference: self.reference(range)?,
            }),
            Some((instances, false)) => Ok(instances),
            None => Err(EngineError::WrongNodeType { operation, found }),
        }
    }

    fn insert_instances(
        &mut self,
        range: NodeId,
        at: usize,
        count: usize,
    ) -> Result<Vec<NodeId>, BridgeError> {
        let Some(range_node) = self.nodes.get(range) else {
            return Ok(Vec::new());
        };
        let NodeKind::RepeatRange { instances, .. } = range_node.kind else {
            return Ok(Vec::new());
        };
        let definition = Arc::clone(&range_node.definition);
        let scope = range_node.scope;

        let mut list = self.read_untracked(instances).as_nodes().to_vec();
        let at = at.min(list.len());
        let created: Vec<NodeId> = (0..count)
            .map(|offset| self.build_instance(range, &definition, scope, at + offset + 1, None))
            .collect();
        list.splice(at..at, created.iter().copied());
        self.graph.write(instances, Payload::nodes(list.clone()));
        self.renumber(&list, at + count);

        let loaded = self.bridge.is_enabled();
        for instance in &created {
            if loaded {
                self.run_new_repeat_actions(*instance);
            }
            self.advance_lifecycle(*instance, Lifecycle::Initialized);
        }
        if loaded {
            for instance in &created {
                self.mirror_subtree(*instance)?;
            }
        }
        Ok(created)
    }

    fn drop_instances(&mut self, range: NodeId, start: usize, count: usize) {
        let Some(instances) = self.instances_cell(range) else {
            return;
        };
        let mut list = self.read_untracked(instances).as_nodes().to_vec();
        let end = (start + count).min(list.len());
        let removed: Vec<NodeId> = list.drain(start..end).collect();
        for instance in removed {
            self.dispose_instance(instance);
        }
        self.graph.write(instances, Payload::nodes(list.clone()));
        self.renumber(&list, start);
    }

    /// Dispose the instance's scope, then detach its subtree.
    fn dispose_instance(&mut self, instance: NodeId) {
        let subtree = self.subtree(instance);
        self.advance_lifecycle(instance, Lifecycle::Disposed);
        self.settling.retain(|settling| *settling != instance);
        if let Some(scope) = self.nodes.get(instance).map(|node| node.scope) {
            self.graph.dispose_scope(scope);
        }
        for node in subtree {
            self.bridge.release(node);
            self.nodes.remove(node);
        }
        log::debug!("disposed repeat instance {instance:?}");
    }

    /// `node` and all its descendants, parents first.
    pub(crate) fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut pending = vec![node];
        let mut subtree = Vec::new();
        while let Some(id) = pending.pop() {
            let Some(current) = self.nodes.get(id) else {
                continue;
            };
            subtree.push(id);
            match current.kind {
                NodeKind::RepeatRange { instances, .. } => {
                    if let Some(list) = self.graph.peek(instances) {
                        pending.extend(list.as_nodes().iter().rev());
                    }
                }
                _ => pending.extend(current.static_children().iter().rev()),
            }
        }
        subtree
    }

    fn renumber(&mut self, list: &[NodeId], from: usize) {
        for (index, instance) in list.iter().enumerate().skip(from) {
            if let Some(NodeKind::RepeatInstance { position, .. }) =
                self.nodes.get(*instance).map(|node| &node.kind)
            {
                let position = *position;
                self.graph.write(position, Payload::number((index + 1) as f64));
            }
        }
    }
}

//! Rewriting of nodeset paths into references of concrete nodes.
//!
//! Inside a repeat, `/data/rep/x` written in an expression means the `x` of
//! the instance being evaluated, so absolute paths through a repeat get the
//! position of the enclosing instance spliced in before evaluation.

use super::node::{NodeId, NodeKind};
use super::FormInstance;
use crate::bridge::ReactiveFactory;
use crate::definition::BindComputation;
use crate::reactive::Runtime;
use std::borrow::Cow;

impl<F: ReactiveFactory> FormInstance<F> {
    /// `computation`'s expression with its absolute paths bound to the
    /// repeat instances enclosing `node`.
    pub(crate) fn contextualize<'c>(
        &mut self,
        node: NodeId,
        computation: &'c BindComputation,
    ) -> Cow<'c, str> {
        let expression = &*computation.expression;
        if computation.absolute_paths.is_empty() || !self.in_repeat(node) {
            return Cow::Borrowed(expression);
        }
        let mut rewritten = String::with_capacity(expression.len() + 8);
        let mut last = 0;
        for head in &computation.absolute_paths {
            if head.span.start < last {
                continue;
            }
            let path = &expression[head.span.clone()];
            rewritten.push_str(&expression[last..head.span.start]);
            rewritten.push_str(&self.contextualize_path(node, path, head.filtered.then_some(path)));
            last = head.span.end;
        }
        rewritten.push_str(&expression[last..]);
        Cow::Owned(rewritten)
    }

    /// Replace the longest nodeset prefix of `path` shared with an ancestor
    /// of `node` (or `node` itself) by that ancestor's reference.
    ///
    /// With a `filtered` nodeset only ancestors above it qualify: a
    /// predicate on that step selects among all of its nodes.
    pub(crate) fn contextualize_path(
        &mut self,
        node: NodeId,
        path: &str,
        filtered: Option<&str>,
    ) -> String {
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(ancestor) = self.nodes.get(id) else {
                break;
            };
            let parent = ancestor.parent;
            let is_instance = matches!(ancestor.kind, NodeKind::RepeatInstance { .. });
            if !is_instance && !ancestor.definition.in_repeat {
                break;
            }
            if matches!(ancestor.kind, NodeKind::RepeatRange { .. }) {
                current = parent;
                continue;
            }
            let nodeset = ancestor.definition.nodeset.as_str();
            if filtered.is_some_and(|filtered| nodeset.len() >= filtered.len()) {
                current = parent;
                continue;
            }
            let reference = ancestor.cells.reference;
            if let Some(rest) = path.strip_prefix(nodeset) {
                if rest.is_empty() || rest.starts_with('/') {
                    let reference = self.read_untracked(reference);
                    return format!("{}{rest}", reference.as_text());
                }
            }
            current = parent;
        }
        path.to_owned()
    }

    fn in_repeat(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|node| {
            node.definition.in_repeat || matches!(node.kind, NodeKind::RepeatInstance { .. })
        })
    }

    /// Nodes currently at `reference`. A segment naming a repeat without a
    /// position selects every instance; `name[n]` selects the n-th. Every
    /// instance list walked through is read tracked.
    pub(crate) fn locate(&mut self, reference: &str) -> Vec<NodeId> {
        let mut segments = reference.split('/').filter(|segment| !segment.is_empty());
        let Some(root_segment) = segments.next() else {
            return Vec::new();
        };
        let (root_name, root_position) = split_position(root_segment);
        let root_matches = self
            .nodes
            .get(self.root)
            .is_some_and(|root| root.name() == root_name);
        if !root_matches || root_position.is_some_and(|position| position != 1) {
            return Vec::new();
        }

        let mut current = vec![self.root];
        for segment in segments {
            let (name, position) = split_position(segment);
            let mut next = Vec::new();
            for parent in current {
                let Some(child) = self.nodes.get(parent).and_then(|parent| {
                    parent
                        .static_children()
                        .iter()
                        .copied()
                        .find(|child| self.nodes.get(*child).is_some_and(|child| child.name() == name))
                }) else {
                    continue;
                };
                let range_instances = match self.nodes.get(child).map(|child| &child.kind) {
                    Some(NodeKind::RepeatRange { instances, .. }) => Some(*instances),
                    Some(_) => None,
                    None => continue,
                };
                match range_instances {
                    Some(instances) => {
                        let instances = self.read(instances);
                        let instances = instances.as_nodes();
                        match position {
                            None => next.extend_from_slice(instances),
                            Some(position) => {
                                if let Some(instance) = position
                                    .checked_sub(1)
                                    .and_then(|index| instances.get(index))
                                {
                                    next.push(*instance);
                                }
                            }
                        }
                    }
                    None => {
                        if position.is_none_or(|position| position == 1) {
                            next.push(child);
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }
}

/// `name[3]` -> (`name`, Some(3)). An unparsable position selects nothing.
fn split_position(segment: &str) -> (&str, Option<usize>) {
    match segment.split_once('[') {
        Some((name, rest)) => {
            let position = rest
                .strip_suffix(']')
                .and_then(|position| position.trim().parse().ok())
                .unwrap_or(0);
            (name, Some(position))
        }
        None => (segment, None),
    }
}

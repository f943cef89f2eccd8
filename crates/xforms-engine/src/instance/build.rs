//! Construction of nodes and their cells. Nothing is evaluated here: memos
//! start dirty and effects wait for the next flush.

use super::compute::CellKind;
use super::node::{Accessor, BindAccessors, InstanceNode, Lifecycle, NodeCells, NodeId, NodeKind};
use super::payload::Payload;
use super::FormInstance;
use crate::bridge::ReactiveFactory;
use crate::definition::{BindComputation, CompiledKind, CompiledNode, CompiledText, Seed, SeedValue};
use crate::reactive::{CellId, ScopeId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Root, groups, subtrees and leaves own both their binds and texts.
    Plain,
    /// Texts only; the binds belong to the instances.
    Range,
    /// Binds only; the texts belong to the range.
    Instance,
}

impl<F: ReactiveFactory> FormInstance<F> {
    pub(crate) fn build_root(&mut self) {
        let definition = Arc::clone(&self.model.root);
        let root = self.root;
        self.build_node(root, &definition, None, ScopeId::ROOT, None);
    }

    fn build_node(
        &mut self,
        id: NodeId,
        definition: &Arc<CompiledNode>,
        parent: Option<NodeId>,
        parent_scope: ScopeId,
        seed: Option<&SeedValue>,
    ) {
        let scope = self.graph.create_scope(parent_scope);
        let role = if definition.is_repeat() {
            Role::Range
        } else {
            Role::Plain
        };
        let cells = self.create_node_cells(scope, id, definition, role);

        let kind = match &definition.kind {
            CompiledKind::Group | CompiledKind::Subtree => {
                let seed = match seed {
                    Some(SeedValue::Group(seed)) => Some(seed),
                    _ => None,
                };
                let children = self.build_children(id, definition, scope, seed);
                match (&definition.kind, parent) {
                    (_, None) => {
                        let language = self.model.default_language.clone();
                        NodeKind::Root {
                            children,
                            language: self.graph.signal(
                                scope,
                                language.map(Payload::text).unwrap_or_default(),
                            ),
                        }
                    }
                    (CompiledKind::Subtree, Some(_)) => NodeKind::Subtree { children },
                    _ => NodeKind::Group { children },
                }
            }
            CompiledKind::Repeat { count, seeds } => {
                let instances = self.graph.signal(scope, Payload::nodes(Vec::<NodeId>::new()));
                let count = count.as_ref().map(|computation| {
                    let accessor = self.create_expression(
                        scope,
                        id,
                        Arc::clone(computation),
                        definition.in_repeat,
                    );
                    self.graph.effect(scope, CellKind::RepeatCount(id));
                    accessor.0
                });
                self.nodes.fill(InstanceNode {
                    id,
                    parent,
                    definition: Arc::clone(definition),
                    scope,
                    cells,
                    kind: NodeKind::RepeatRange { instances, count },
                });
                let seeds: Vec<Seed> = match seed {
                    Some(SeedValue::Repeat(seeds)) => seeds.clone(),
                    _ => seeds.clone(),
                };
                let built: Vec<NodeId> = seeds
                    .iter()
                    .enumerate()
                    .map(|(index, seed)| self.build_instance(id, definition, scope, index + 1, Some(seed)))
                    .collect();
                self.graph.write(instances, Payload::nodes(built));
                return;
            }
            CompiledKind::Leaf { value_type, default } => {
                let initial = match seed {
                    Some(SeedValue::Value(value)) => value.as_str(),
                    _ => default.as_str(),
                };
                let initial = value_type
                    .canonicalize(initial)
                    .unwrap_or_else(|_| initial.to_owned());
                let value = self.graph.signal(scope, Payload::text(initial));
                let visible = self.graph.memo(scope, CellKind::Visible(id));
                let calculate = definition
                    .calculate
                    .as_ref()
                    .map(|_| self.graph.effect(scope, CellKind::Calculate(id)));
                NodeKind::Leaf {
                    value_type: *value_type,
                    value,
                    visible,
                    calculate,
                }
            }
        };

        self.nodes.fill(InstanceNode {
            id,
            parent,
            definition: Arc::clone(definition),
            scope,
            cells,
            kind,
        });
    }

    fn build_children(
        &mut self,
        parent: NodeId,
        definition: &CompiledNode,
        scope: ScopeId,
        seed: Option<&Seed>,
    ) -> Vec<NodeId> {
        definition
            .children
            .iter()
            .map(|child| {
                let id = self.nodes.reserve();
                let child_seed = seed.and_then(|seed| seed.get(&child.name));
                self.build_node(id, child, Some(parent), scope, child_seed);
                id
            })
            .collect()
    }

    /// Build one repeat instance at `position` (1-based). The caller inserts
    /// it into the range's instance list.
    pub(crate) fn build_instance(
        &mut self,
        range: NodeId,
        definition: &Arc<CompiledNode>,
        range_scope: ScopeId,
        position: usize,
        seed: Option<&Seed>,
    ) -> NodeId {
        let id = self.nodes.reserve();
        let scope = self.graph.create_scope(range_scope);
        let cells = self.create_node_cells(scope, id, definition, Role::Instance);
        let position = self.graph.signal(scope, Payload::number(position as f64));
        let children = self.build_children(id, definition, scope, seed);
        self.nodes.fill(InstanceNode {
            id,
            parent: Some(range),
            definition: Arc::clone(definition),
            scope,
            cells,
            kind: NodeKind::RepeatInstance {
                position,
                lifecycle: Lifecycle::Constructed,
                children,
            },
        });
        self.settling.push(id);
        log::debug!("constructed repeat instance {id:?} of {}", definition.nodeset);
        id
    }

    fn create_node_cells(
        &mut self,
        scope: ScopeId,
        id: NodeId,
        definition: &CompiledNode,
        role: Role,
    ) -> NodeCells {
        let in_repeat = definition.in_repeat || role == Role::Instance;
        let binds = if role == Role::Range {
            BindAccessors::default()
        } else {
            let mut accessor = |computation: &Option<Arc<BindComputation>>| {
                computation
                    .as_ref()
                    .map(|computation| self.create_expression(scope, id, Arc::clone(computation), in_repeat))
            };
            BindAccessors {
                calculate: accessor(&definition.calculate),
                relevant: accessor(&definition.relevant),
                readonly: accessor(&definition.readonly),
                required: accessor(&definition.required),
                constraint: accessor(&definition.constraint),
            }
        };

        let (label, hint) = if role == Role::Instance {
            (None, None)
        } else {
            (
                self.create_text(scope, id, definition.label.as_ref(), in_repeat),
                self.create_text(scope, id, definition.hint.as_ref(), in_repeat),
            )
        };

        let validation = if definition.is_leaf() {
            CellKind::LeafValidation(id)
        } else {
            CellKind::Violations(id)
        };

        NodeCells {
            reference: self.graph.memo(scope, CellKind::Reference(id)),
            relevant: self.graph.memo(scope, CellKind::Relevant(id)),
            readonly: self.graph.memo(scope, CellKind::Readonly(id)),
            required: self.graph.memo(scope, CellKind::Required(id)),
            label,
            hint,
            validation: self.graph.memo(scope, validation),
            binds,
        }
    }

    fn create_text(
        &mut self,
        scope: ScopeId,
        id: NodeId,
        text: Option<&CompiledText>,
        in_repeat: bool,
    ) -> Option<CellId> {
        match text? {
            CompiledText::Literal(text) => Some(self.graph.signal(scope, Payload::Text(Arc::clone(text)))),
            CompiledText::Expression(computation) => {
                Some(self.create_expression(scope, id, Arc::clone(computation), in_repeat).0)
            }
        }
    }

    /// Memo evaluating `computation` on behalf of `node`, with one probe per
    /// dependency. Computations without dependencies outside of repeats are
    /// evaluated once and never again.
    pub(crate) fn create_expression(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        computation: Arc<BindComputation>,
        in_repeat: bool,
    ) -> Accessor {
        let constant = self.config.constant_folding && computation.is_static() && !in_repeat;
        let probes: Arc<[_]> = if constant {
            Arc::from([])
        } else {
            computation
                .dependencies
                .iter()
                .map(|dependency| {
                    self.graph.memo(
                        scope,
                        CellKind::Probe {
                            node,
                            dependency: dependency.clone(),
                        },
                    )
                })
                .collect()
        };
        Accessor(self.graph.memo(
            scope,
            CellKind::Expression {
                node,
                computation,
                probes,
                constant,
            },
        ))
    }
}

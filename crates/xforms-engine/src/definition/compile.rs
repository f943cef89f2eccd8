use super::paths::scan_paths;
use super::{FormDefinition, NodeDefinition, NodeDefinitionKind, Seed, SeedValue, Translations};
use crate::error::DefinitionError;
use crate::evaluator::ResultType;
use crate::value::ValueType;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindKind {
    Calculate,
    Relevant,
    Readonly,
    Required,
    Constraint,
    Count,
    Label,
    Hint,
    ActionValue,
}

impl BindKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Calculate => "calculate",
            Self::Relevant => "relevant",
            Self::Readonly => "readonly",
            Self::Required => "required",
            Self::Constraint => "constraint",
            Self::Count => "count",
            Self::Label => "label",
            Self::Hint => "hint",
            Self::ActionValue => "action value",
        }
    }

    pub fn result_type(self) -> ResultType {
        match self {
            Self::Relevant | Self::Readonly | Self::Required | Self::Constraint => {
                ResultType::Boolean
            }
            Self::Count => ResultType::Number,
            Self::Calculate | Self::Label | Self::Hint | Self::ActionValue => ResultType::String,
        }
    }
}

/// An expression attached to a node definition, with everything the engine
/// needs to know about it before evaluating it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindComputation {
    pub kind: BindKind,
    pub expression: Arc<str>,
    pub result_type: ResultType,
    /// Uses `jr:itext(...)` and follows the active language.
    pub translated: bool,
    /// Nodesets of everything the expression reads.
    pub dependencies: IndexSet<Dependency>,
    /// Absolute location paths of `expression` in source order.
    #[serde(skip)]
    pub absolute_paths: Vec<PathHead>,
}

/// A nodeset read by an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub nodeset: String,
    /// Nodeset of the first step filtered by a predicate. The predicate
    /// ranges over every node of that step, so repeat instances at or below
    /// it are never narrowed to the evaluating instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_at: Option<String>,
}

impl Dependency {
    pub fn new(nodeset: impl Into<String>) -> Self {
        Self {
            nodeset: nodeset.into(),
            filtered_at: None,
        }
    }
}

/// The part of an absolute path in expression text that precedes its first
/// predicate. Heads of distinct paths never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHead {
    pub span: Range<usize>,
    /// A predicate follows the head.
    pub filtered: bool,
}

impl PathHead {
    fn new(expression: &str, span: &Range<usize>) -> Self {
        match expression[span.clone()].find('[') {
            Some(offset) => Self {
                span: span.start..span.start + offset,
                filtered: true,
            },
            None => Self {
                span: span.clone(),
                filtered: false,
            },
        }
    }
}

impl BindComputation {
    pub fn compile(
        kind: BindKind,
        expression: &str,
        context: &str,
    ) -> Result<Self, DefinitionError> {
        let paths = scan_paths(expression).map_err(|message| DefinitionError::DependencyScan {
            nodeset: context.to_owned(),
            bind: kind.name(),
            message,
        })?;
        let dependencies = paths
            .iter()
            .filter_map(|path| {
                Some(Dependency {
                    nodeset: path.resolve(context)?,
                    filtered_at: path.resolve_filtered(context),
                })
            })
            .collect();
        let mut absolute_paths: Vec<PathHead> = paths
            .iter()
            .filter(|path| path.absolute && path.literal)
            .map(|path| PathHead::new(expression, &path.span))
            .collect();
        absolute_paths.sort_by_key(|head| head.span.start);
        Ok(Self {
            kind,
            expression: expression.into(),
            result_type: kind.result_type(),
            translated: expression.contains("jr:itext("),
            dependencies,
            absolute_paths,
        })
    }

    /// Nothing to subscribe to: the result depends on neither the document
    /// nor the language.
    pub fn is_static(&self) -> bool {
        self.dependencies.is_empty() && !self.translated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "text", rename_all = "snake_case")]
pub enum CompiledText {
    Literal(Arc<str>),
    Expression(Arc<BindComputation>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompiledKind {
    Group,
    Subtree,
    Repeat {
        count: Option<Arc<BindComputation>>,
        seeds: Vec<Seed>,
    },
    Leaf {
        value_type: ValueType,
        default: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledNode {
    pub name: String,
    pub nodeset: String,
    #[serde(flatten)]
    pub kind: CompiledKind,
    /// Some ancestor is a repeat, so the node exists once per instance.
    pub in_repeat: bool,
    pub calculate: Option<Arc<BindComputation>>,
    pub relevant: Option<Arc<BindComputation>>,
    pub readonly: Option<Arc<BindComputation>>,
    pub required: Option<Arc<BindComputation>>,
    pub constraint: Option<Arc<BindComputation>>,
    pub required_message: Option<Arc<str>>,
    pub constraint_message: Option<Arc<str>>,
    pub label: Option<CompiledText>,
    pub hint: Option<CompiledText>,
    pub children: Vec<Arc<CompiledNode>>,
}

impl CompiledNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, CompiledKind::Leaf { .. })
    }

    pub fn is_repeat(&self) -> bool {
        matches!(self.kind, CompiledKind::Repeat { .. })
    }

    pub fn child(&self, name: &str) -> Option<&Arc<CompiledNode>> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Computations evaluated on behalf of this node, in bind order.
    pub fn computations(&self) -> impl Iterator<Item = &Arc<BindComputation>> {
        let texts = [&self.label, &self.hint].into_iter().flatten().filter_map(|text| match text {
            CompiledText::Literal(_) => None,
            CompiledText::Expression(computation) => Some(computation),
        });
        [
            &self.calculate,
            &self.relevant,
            &self.readonly,
            &self.required,
            &self.constraint,
        ]
        .into_iter()
        .flatten()
        .chain(texts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionEvent {
    InstanceFirstLoad,
    NewRepeat,
    ValueChanged,
}

impl ActionEvent {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "odk-instance-first-load" => Some(Self::InstanceFirstLoad),
            "odk-new-repeat" => Some(Self::NewRepeat),
            "xforms-value-changed" => Some(Self::ValueChanged),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InstanceFirstLoad => "odk-instance-first-load",
            Self::NewRepeat => "odk-new-repeat",
            Self::ValueChanged => "xforms-value-changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledAction {
    pub event: ActionEvent,
    pub target: String,
    pub value: Option<Arc<BindComputation>>,
    pub observe: Option<String>,
}

/// A validated form definition, shared by every instance created from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormModel {
    pub title: String,
    pub languages: Vec<String>,
    pub default_language: Option<String>,
    pub translations: Translations,
    pub root: Arc<CompiledNode>,
    pub actions: Vec<CompiledAction>,
    #[serde(skip)]
    nodesets: IndexMap<String, Arc<CompiledNode>>,
}

impl FormModel {
    pub fn compile(definition: &FormDefinition) -> Result<Self, DefinitionError> {
        if !matches!(
            definition.root.kind,
            NodeDefinitionKind::Group | NodeDefinitionKind::Subtree
        ) {
            return Err(DefinitionError::InvalidRoot {
                name: definition.root.name.clone(),
            });
        }
        let root = compile_node(&definition.root, "", false)?;
        let mut nodesets = IndexMap::new();
        index(&root, &mut nodesets);

        let default_language = match &definition.default_language {
            Some(language) if !definition.languages.contains(language) => {
                return Err(DefinitionError::UnknownDefaultLanguage {
                    language: language.clone(),
                });
            }
            Some(language) => Some(language.clone()),
            None => definition.languages.first().cloned(),
        };

        let actions = definition
            .actions
            .iter()
            .map(|action| {
                let event = ActionEvent::parse(&action.event).ok_or_else(|| {
                    DefinitionError::UnsupportedEvent {
                        event: action.event.clone(),
                    }
                })?;
                let target: &Arc<CompiledNode> = nodesets.get(&action.target).ok_or_else(|| {
                    DefinitionError::UnknownActionTarget {
                        target: action.target.clone(),
                    }
                })?;
                if event == ActionEvent::NewRepeat && !target.in_repeat {
                    return Err(DefinitionError::ActionOutsideRepeat {
                        target: action.target.clone(),
                    });
                }
                if event == ActionEvent::ValueChanged {
                    let observe = action.observe.as_ref().ok_or_else(|| {
                        DefinitionError::MissingObservedNode {
                            event: action.event.clone(),
                        }
                    })?;
                    if !nodesets.get(observe).is_some_and(|node| node.is_leaf()) {
                        return Err(DefinitionError::UnknownActionTarget {
                            target: observe.clone(),
                        });
                    }
                }
                let value = action
                    .value
                    .as_deref()
                    .map(|expression| {
                        BindComputation::compile(BindKind::ActionValue, expression, &action.target)
                            .map(Arc::new)
                    })
                    .transpose()?;
                Ok(CompiledAction {
                    event,
                    target: action.target.clone(),
                    value,
                    observe: action.observe.clone(),
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        log::debug!(
            "compiled form '{}': {} nodesets, {} actions",
            definition.title,
            nodesets.len(),
            actions.len()
        );

        Ok(Self {
            title: definition.title.clone(),
            languages: definition.languages.clone(),
            default_language,
            translations: definition.translations.clone(),
            root,
            actions,
            nodesets,
        })
    }

    pub fn node(&self, nodeset: &str) -> Option<&Arc<CompiledNode>> {
        self.nodesets.get(nodeset)
    }

    pub fn contains(&self, nodeset: &str) -> bool {
        self.nodesets.contains_key(nodeset)
    }

    /// All node definitions in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<CompiledNode>> {
        self.nodesets.values()
    }

    pub fn translate(&self, language: &str, id: &str) -> Option<&str> {
        self.translations
            .get(language)
            .and_then(|texts| texts.get(id))
            .map(String::as_str)
    }

    pub fn actions_for(&self, event: ActionEvent) -> impl Iterator<Item = &CompiledAction> {
        self.actions.iter().filter(move |action| action.event == event)
    }
}

fn valid_name(name: &str) -> bool {
    let mut characters = name.chars();
    characters
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_')
        && characters.all(|character| {
            character.is_alphanumeric() || matches!(character, '_' | '-' | '.' | ':')
        })
}

fn compile_node(
    definition: &NodeDefinition,
    parent: &str,
    in_repeat: bool,
) -> Result<Arc<CompiledNode>, DefinitionError> {
    if !valid_name(&definition.name) {
        return Err(DefinitionError::InvalidName {
            name: definition.name.clone(),
            parent: if parent.is_empty() { "/".to_owned() } else { parent.to_owned() },
        });
    }
    let nodeset = format!("{parent}/{}", definition.name);

    let binds = &definition.binds;
    let is_leaf = matches!(definition.kind, NodeDefinitionKind::Leaf { .. });
    if !is_leaf {
        for (bind, present) in [
            ("calculate", binds.calculate.is_some()),
            ("constraint", binds.constraint.is_some()),
            ("required", binds.required.is_some()),
        ] {
            if present {
                return Err(DefinitionError::MisplacedBind { nodeset, bind });
            }
        }
    } else if !definition.children.is_empty() {
        return Err(DefinitionError::LeafWithChildren { nodeset });
    }

    let compile = |kind: BindKind, expression: &Option<String>| {
        expression
            .as_deref()
            .map(|expression| BindComputation::compile(kind, expression, &nodeset).map(Arc::new))
            .transpose()
    };
    let calculate = compile(BindKind::Calculate, &binds.calculate)?;
    let relevant = compile(BindKind::Relevant, &binds.relevant)?;
    let readonly = compile(BindKind::Readonly, &binds.readonly)?;
    let required = compile(BindKind::Required, &binds.required)?;
    let constraint = compile(BindKind::Constraint, &binds.constraint)?;

    let text = |kind: BindKind, literal: &Option<String>, id: &Option<String>| {
        match (id, literal) {
            (Some(id), _) => {
                let expression = if id.contains('\'') {
                    format!("jr:itext(\"{id}\")")
                } else {
                    format!("jr:itext('{id}')")
                };
                BindComputation::compile(kind, &expression, &nodeset)
                    .map(|computation| Some(CompiledText::Expression(Arc::new(computation))))
            }
            (None, Some(literal)) => Ok(Some(CompiledText::Literal(literal.as_str().into()))),
            (None, None) => Ok(None),
        }
    };
    let label = text(BindKind::Label, &definition.label, &definition.label_ref)?;
    let hint = text(BindKind::Hint, &definition.hint, &definition.hint_ref)?;

    let kind = match &definition.kind {
        NodeDefinitionKind::Group => CompiledKind::Group,
        NodeDefinitionKind::Subtree => CompiledKind::Subtree,
        NodeDefinitionKind::Repeat { count, seeds } => CompiledKind::Repeat {
            count: compile(BindKind::Count, count)?,
            seeds: seeds.clone(),
        },
        NodeDefinitionKind::Leaf { value_type, default } => CompiledKind::Leaf {
            value_type: *value_type,
            default: default.clone(),
        },
    };

    let children_in_repeat = in_repeat || matches!(kind, CompiledKind::Repeat { .. });
    let mut children: Vec<Arc<CompiledNode>> = Vec::with_capacity(definition.children.len());
    for child in &definition.children {
        if children.iter().any(|existing| existing.name == child.name) {
            return Err(DefinitionError::DuplicateChild {
                name: child.name.clone(),
                parent: nodeset,
            });
        }
        children.push(compile_node(child, &nodeset, children_in_repeat)?);
    }

    let node = CompiledNode {
        name: definition.name.clone(),
        nodeset: nodeset.clone(),
        kind,
        in_repeat,
        calculate,
        relevant,
        readonly,
        required,
        constraint,
        required_message: binds.required_message.as_deref().map(Into::into),
        constraint_message: binds.constraint_message.as_deref().map(Into::into),
        label,
        hint,
        children,
    };
    if let CompiledKind::Repeat { seeds, .. } = &node.kind {
        for seed in seeds {
            check_seed(&node, seed)?;
        }
    }

    Ok(Arc::new(node))
}

fn index(node: &Arc<CompiledNode>, nodesets: &mut IndexMap<String, Arc<CompiledNode>>) {
    nodesets.insert(node.nodeset.clone(), Arc::clone(node));
    for child in &node.children {
        index(child, nodesets);
    }
}

fn check_seed(node: &CompiledNode, seed: &Seed) -> Result<(), DefinitionError> {
    for (name, value) in seed {
        let child = node
            .child(name)
            .ok_or_else(|| DefinitionError::UnknownSeedChild {
                nodeset: node.nodeset.clone(),
                name: name.clone(),
            })?;
        let shape_error = || DefinitionError::SeedShape {
            nodeset: child.nodeset.clone(),
        };
        match (&child.kind, value) {
            (CompiledKind::Leaf { value_type, .. }, SeedValue::Value(raw)) => {
                if value_type.canonicalize(raw).is_err() {
                    return Err(shape_error());
                }
            }
            (CompiledKind::Group | CompiledKind::Subtree, SeedValue::Group(inner)) => {
                check_seed(child, inner)?;
            }
            (CompiledKind::Repeat { .. }, SeedValue::Repeat(instances)) => {
                for inner in instances {
                    check_seed(child, inner)?;
                }
            }
            _ => return Err(shape_error()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ActionDefinition;

    fn household() -> FormDefinition {
        FormDefinition::new(
            NodeDefinition::group("data")
                .child(NodeDefinition::leaf("count").value_type(ValueType::Int))
                .child(
                    NodeDefinition::repeat("member")
                        .relevant("/data/count > 0")
                        .child(NodeDefinition::leaf("age").value_type(ValueType::Int))
                        .child(NodeDefinition::leaf("double").calculate("2 * ../age")),
                ),
        )
    }

    #[test]
    fn nodesets_follow_the_tree() {
        let model = FormModel::compile(&household()).unwrap();
        let nodesets: Vec<_> = model.nodes().map(|node| node.nodeset.as_str()).collect();
        assert_eq!(
            nodesets,
            vec![
                "/data",
                "/data/count",
                "/data/member",
                "/data/member/age",
                "/data/member/double"
            ]
        );
        assert!(model.node("/data/member/age").unwrap().in_repeat);
        assert!(!model.node("/data/member").unwrap().in_repeat);
    }

    #[test]
    fn bind_dependencies_are_absolute() {
        let model = FormModel::compile(&household()).unwrap();
        let double = model.node("/data/member/double").unwrap();
        let calculate = double.calculate.as_ref().unwrap();
        assert_eq!(
            calculate.dependencies.iter().collect::<Vec<_>>(),
            vec![&Dependency::new("/data/member/age")]
        );
        assert!(calculate.absolute_paths.is_empty());
        assert_eq!(calculate.result_type, ResultType::String);

        let member = model.node("/data/member").unwrap();
        let relevant = member.relevant.as_ref().unwrap();
        assert_eq!(
            relevant.absolute_paths,
            vec![PathHead {
                span: 0..11,
                filtered: false
            }]
        );
    }

    #[test]
    fn predicate_paths_keep_heads_apart() {
        let computation = BindComputation::compile(
            BindKind::Calculate,
            "sum(/data/rep[position() = /data/sel]/x)",
            "/data/rep/y",
        )
        .unwrap();
        assert_eq!(
            computation.absolute_paths,
            vec![
                PathHead {
                    span: 4..13,
                    filtered: true
                },
                PathHead {
                    span: 27..36,
                    filtered: false
                },
            ]
        );
        assert_eq!(
            computation.dependencies.iter().collect::<Vec<_>>(),
            vec![
                &Dependency {
                    nodeset: "/data/rep/x".to_owned(),
                    filtered_at: Some("/data/rep".to_owned()),
                },
                &Dependency::new("/data/sel"),
            ]
        );
    }

    #[test]
    fn duplicate_children_are_rejected() {
        let definition = FormDefinition::new(
            NodeDefinition::group("data")
                .child(NodeDefinition::leaf("a"))
                .child(NodeDefinition::leaf("a")),
        );
        assert_eq!(
            FormModel::compile(&definition),
            Err(DefinitionError::DuplicateChild {
                name: "a".to_owned(),
                parent: "/data".to_owned(),
            })
        );
    }

    #[test]
    fn leaf_root_is_rejected() {
        let definition = FormDefinition::new(NodeDefinition::leaf("data"));
        assert!(matches!(
            FormModel::compile(&definition),
            Err(DefinitionError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn unsupported_event_is_fatal() {
        let definition = household().action(
            ActionDefinition::new("xforms-ready", "/data/count").value("1"),
        );
        assert_eq!(
            FormModel::compile(&definition),
            Err(DefinitionError::UnsupportedEvent {
                event: "xforms-ready".to_owned(),
            })
        );
    }

    #[test]
    fn new_repeat_action_must_target_repeat_content() {
        let definition =
            household().action(ActionDefinition::new("odk-new-repeat", "/data/count"));
        assert!(matches!(
            FormModel::compile(&definition),
            Err(DefinitionError::ActionOutsideRepeat { .. })
        ));
    }

    #[test]
    fn translated_labels_use_itext() {
        let definition = FormDefinition::new(
            NodeDefinition::group("data").child(NodeDefinition::leaf("name").label_ref("name-label")),
        )
        .language("en")
        .translation("en", "name-label", "Name");
        let model = FormModel::compile(&definition).unwrap();
        let Some(CompiledText::Expression(label)) = &model.node("/data/name").unwrap().label else {
            panic!("expected a translated label");
        };
        assert!(label.translated);
        assert!(!label.is_static());
        assert_eq!(model.default_language.as_deref(), Some("en"));
        assert_eq!(model.translate("en", "name-label"), Some("Name"));
    }

    #[test]
    fn seeds_must_match_children() {
        let definition = FormDefinition::new(
            NodeDefinition::group("data").child(
                NodeDefinition::repeat("member")
                    .seed(Seed::from([("nickname".to_owned(), SeedValue::Value("x".to_owned()))]))
                    .child(NodeDefinition::leaf("name")),
            ),
        );
        assert!(matches!(
            FormModel::compile(&definition),
            Err(DefinitionError::UnknownSeedChild { .. })
        ));
    }
}

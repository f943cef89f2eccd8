//! Static form definitions.
//!
//! A [`FormDefinition`] is the parsed, position-agnostic description of the
//! data model. It deserializes from JSON and has builder methods for
//! constructing forms in code. [`FormModel::compile`] validates it and
//! prepares the bind computations.

mod compile;
mod paths;

pub use compile::{
    ActionEvent, BindComputation, BindKind, CompiledAction, CompiledKind, CompiledNode,
    CompiledText, Dependency, FormModel, PathHead,
};
pub use paths::{ScannedPath, scan_paths};

use crate::value::ValueType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// language -> text id -> text
pub type Translations = IndexMap<String, IndexMap<String, String>>;

/// Initial data of one repeat instance, keyed by child name.
pub type Seed = IndexMap<String, SeedValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedValue {
    Value(String),
    Group(Seed),
    Repeat(Vec<Seed>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub translations: Translations,
    pub root: NodeDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDefinition>,
}

impl FormDefinition {
    pub fn new(root: NodeDefinition) -> Self {
        Self {
            title: String::new(),
            languages: Vec::new(),
            default_language: None,
            translations: Translations::new(),
            root,
            actions: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Add a language. The first one added becomes the default.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        if self.default_language.is_none() {
            self.default_language = Some(language.clone());
        }
        self.languages.push(language);
        self
    }

    pub fn translation(
        mut self,
        language: impl Into<String>,
        id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.translations
            .entry(language.into())
            .or_default()
            .insert(id.into(), text.into());
        self
    }

    pub fn action(mut self, action: ActionDefinition) -> Self {
        self.actions.push(action);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDefinitionKind {
    Group,
    Subtree,
    Repeat {
        /// Number expression sizing a controlled repeat.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        seeds: Vec<Seed>,
    },
    Leaf {
        #[serde(default)]
        value_type: ValueType,
        #[serde(default)]
        default: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeDefinitionKind,
    #[serde(default, skip_serializing_if = "is_default")]
    pub binds: Binds,
    /// Literal label text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Translated label, by text id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDefinition>,
}

fn is_default(binds: &Binds) -> bool {
    *binds == Binds::default()
}

impl NodeDefinition {
    fn with_kind(name: impl Into<String>, kind: NodeDefinitionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            binds: Binds::default(),
            label: None,
            label_ref: None,
            hint: None,
            hint_ref: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeDefinitionKind::Group)
    }

    pub fn subtree(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeDefinitionKind::Subtree)
    }

    pub fn repeat(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeDefinitionKind::Repeat {
                count: None,
                seeds: Vec::new(),
            },
        )
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeDefinitionKind::Leaf {
                value_type: ValueType::String,
                default: String::new(),
            },
        )
    }

    pub fn child(mut self, child: NodeDefinition) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeDefinition>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        if let NodeDefinitionKind::Leaf { value_type: current, .. } = &mut self.kind {
            *current = value_type;
        }
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        if let NodeDefinitionKind::Leaf { default, .. } = &mut self.kind {
            *default = value.into();
        }
        self
    }

    pub fn count(mut self, expression: impl Into<String>) -> Self {
        if let NodeDefinitionKind::Repeat { count, .. } = &mut self.kind {
            *count = Some(expression.into());
        }
        self
    }

    pub fn seed(mut self, seed: Seed) -> Self {
        if let NodeDefinitionKind::Repeat { seeds, .. } = &mut self.kind {
            seeds.push(seed);
        }
        self
    }

    pub fn calculate(mut self, expression: impl Into<String>) -> Self {
        self.binds.calculate = Some(expression.into());
        self
    }

    pub fn relevant(mut self, expression: impl Into<String>) -> Self {
        self.binds.relevant = Some(expression.into());
        self
    }

    pub fn readonly(mut self, expression: impl Into<String>) -> Self {
        self.binds.readonly = Some(expression.into());
        self
    }

    pub fn required(mut self, expression: impl Into<String>) -> Self {
        self.binds.required = Some(expression.into());
        self
    }

    pub fn constraint(mut self, expression: impl Into<String>) -> Self {
        self.binds.constraint = Some(expression.into());
        self
    }

    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.binds.required_message = Some(message.into());
        self
    }

    pub fn constraint_message(mut self, message: impl Into<String>) -> Self {
        self.binds.constraint_message = Some(message.into());
        self
    }

    pub fn label(mut self, text: impl Into<String>) -> Self {
        self.label = Some(text.into());
        self
    }

    pub fn label_ref(mut self, id: impl Into<String>) -> Self {
        self.label_ref = Some(id.into());
        self
    }

    pub fn hint(mut self, text: impl Into<String>) -> Self {
        self.hint = Some(text.into());
        self
    }

    pub fn hint_ref(mut self, id: impl Into<String>) -> Self {
        self.hint_ref = Some(id.into());
        self
    }
}

/// `setvalue` bound to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub event: String,
    /// Nodeset of the node receiving the value.
    pub target: String,
    /// String expression evaluated in the context of the target. Absent
    /// means the empty string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Nodeset of the leaf whose changes trigger `xforms-value-changed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observe: Option<String>,
}

impl ActionDefinition {
    pub fn new(event: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            target: target.into(),
            value: None,
            observe: None,
        }
    }

    pub fn value(mut self, expression: impl Into<String>) -> Self {
        self.value = Some(expression.into());
        self
    }

    pub fn observe(mut self, nodeset: impl Into<String>) -> Self {
        self.observe = Some(nodeset.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_deserializes_from_json() {
        let definition: FormDefinition = serde_json::from_str(
            r#"{
                "title": "Household",
                "root": {
                    "name": "data",
                    "kind": "group",
                    "children": [
                        { "name": "age", "kind": "leaf", "value_type": "int",
                          "binds": { "constraint": ". >= 0" } },
                        { "name": "member", "kind": "repeat",
                          "seeds": [ { "name": "Ana" } ],
                          "children": [ { "name": "name", "kind": "leaf" } ] }
                    ]
                }
            }"#,
        )
        .unwrap();

        let expected = FormDefinition::new(
            NodeDefinition::group("data")
                .child(
                    NodeDefinition::leaf("age")
                        .value_type(ValueType::Int)
                        .constraint(". >= 0"),
                )
                .child(
                    NodeDefinition::repeat("member")
                        .seed(Seed::from([(
                            "name".to_owned(),
                            SeedValue::Value("Ana".to_owned()),
                        )]))
                        .child(NodeDefinition::leaf("name")),
                ),
        )
        .title("Household");
        assert_eq!(definition, expected);
    }
}

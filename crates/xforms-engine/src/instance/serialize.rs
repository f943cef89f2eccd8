use super::node::{NodeId, NodeKind, NodeType};
use super::validation::Violation;
use super::FormInstance;
use crate::bridge::ReactiveFactory;
use crate::error::{EngineError, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;

/// Current state of a node and its subtree, for tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub node_type: NodeType,
    pub name: String,
    pub reference: String,
    pub relevant: bool,
    pub readonly: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl<F: ReactiveFactory> FormInstance<F> {
    pub fn snapshot(&mut self) -> Result<NodeSnapshot> {
        self.snapshot_node(self.root)
    }

    fn snapshot_node(&mut self, node: NodeId) -> Result<NodeSnapshot> {
        let node_type = self.node_type(node)?;
        let is_leaf = node_type == NodeType::Leaf;
        let violation = if is_leaf {
            match self.validation_state(node)? {
                super::ValidationState::Leaf { validation } => validation.violation.clone(),
                super::ValidationState::Parent { .. } => None,
            }
        } else {
            None
        };
        let children = self
            .children(node)?
            .into_iter()
            .map(|child| self.snapshot_node(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeSnapshot {
            id: node,
            node_type,
            name: self.name(node)?.to_owned(),
            reference: self.reference(node)?,
            relevant: self.is_relevant(node)?,
            readonly: self.is_readonly(node)?,
            required: self.is_required(node)?,
            label: self.label(node)?,
            hint: self.hint(node)?,
            value: if is_leaf { Some(self.value(node)?) } else { None },
            violation,
            children,
        })
    }

    /// The primary instance as XML. Non-relevant nodes are left out; repeat
    /// ranges contribute one element per instance.
    pub fn instance_xml(&mut self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_node(&mut writer, self.root)?;
        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }

    fn write_node(&mut self, writer: &mut Writer<Vec<u8>>, node: NodeId) -> Result<()> {
        if !self.is_relevant(node)? {
            return Ok(());
        }
        let is_range = matches!(self.node(node)?.kind, NodeKind::RepeatRange { .. });
        if is_range {
            for instance in self.children(node)? {
                self.write_node(writer, instance)?;
            }
            return Ok(());
        }
        let name = self.name(node)?.to_owned();
        if self.node_type(node)? == NodeType::Leaf {
            let value = self.value(node)?;
            if value.is_empty() {
                writer
                    .write_event(Event::Empty(BytesStart::new(name.as_str())))
                    .map_err(xml_error)?;
            } else {
                writer
                    .write_event(Event::Start(BytesStart::new(name.as_str())))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&value)))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new(name.as_str())))
                    .map_err(xml_error)?;
            }
            return Ok(());
        }
        writer
            .write_event(Event::Start(BytesStart::new(name.as_str())))
            .map_err(xml_error)?;
        for child in self.children(node)? {
            self.write_node(writer, child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_error)?;
        Ok(())
    }
}

fn xml_error(error: impl std::fmt::Display) -> EngineError {
    EngineError::Xml(error.to_string())
}

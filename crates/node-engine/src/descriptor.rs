//! Self-describing node types
//!
//! Each processor publishes its palette entry, ports and optional agent
//! tool through [`NodeDescriptor`], so the registry never keeps a second
//! copy of that information.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{NodeCategory, NodeData};

/// Implemented by processors alongside `NodeProcessor`
///
/// ```ignore
/// impl NodeDescriptor for SearchProcessor {
///     fn descriptor() -> NodeTypeMetadata {
///         NodeTypeMetadata::new("searchNode", NodeCategory::Query, "Search")
///             .with_input(PortMetadata::required("input", "Model", PortDataType::Model))
///             .with_output(PortMetadata::optional("elements", "Elements", PortDataType::Elements))
///     }
/// }
/// ```
pub trait NodeDescriptor {
    fn descriptor() -> NodeTypeMetadata
    where
        Self: Sized;
}

/// Value shape a port produces or accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    Any,
    /// Parsed model document
    Model,
    /// Array of element records
    Elements,
    Json,
    String,
    Number,
    Boolean,
}

impl PortDataType {
    /// Whether an edge may carry a `self` output into an `other` input
    ///
    /// `Any` matches everything. Besides equal types, element lists and
    /// JSON interchange freely and a model may feed an elements port.
    pub fn is_compatible_with(&self, other: &PortDataType) -> bool {
        use PortDataType::*;
        match (self, other) {
            (Any, _) | (_, Any) => true,
            (Elements, Json) | (Json, Elements) | (Model, Elements) => true,
            (a, b) => a == b,
        }
    }
}

/// Palette badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeStatus {
    #[default]
    Working,
    WorkInProgress,
    NotWorking,
    NewFeature,
}

/// A node type exposed as an agent tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Snake-case name the agent calls, e.g. `search_elements`
    pub name: String,
    pub description: String,
    /// JSON Schema the call parameters are checked against
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeMetadata {
    /// Registry key, matches `GraphNode::node_type`
    pub node_type: String,
    pub category: NodeCategory,
    pub label: String,
    pub description: String,
    pub icon: String,
    pub status: NodeStatus,
    /// Seed for the data bag of nodes made by `NodeRegistry::create_node`
    pub default_data: NodeData,
    pub inputs: Vec<PortMetadata>,
    pub outputs: Vec<PortMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolDescriptor>,
    /// Node type whose first instance feeds `input` when a node of this
    /// type has no incoming edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_upstream: Option<String>,
}

impl NodeTypeMetadata {
    pub fn new(node_type: impl Into<String>, category: NodeCategory, label: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: String::new(),
            icon: String::new(),
            status: NodeStatus::default(),
            default_data: NodeData::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            tool: None,
            implicit_upstream: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    /// Anything but a JSON object leaves the defaults untouched
    pub fn with_default_data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            self.default_data = map;
        }
        self
    }

    pub fn with_input(mut self, port: PortMetadata) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortMetadata) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn with_implicit_upstream(mut self, node_type: impl Into<String>) -> Self {
        self.implicit_upstream = Some(node_type.into());
        self
    }

    pub fn input(&self, id: &str) -> Option<&PortMetadata> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&PortMetadata> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// One connection point; `id` doubles as the edge handle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMetadata {
    pub id: String,
    pub label: String,
    pub data_type: PortDataType,
    pub required: bool,
    /// Accepts more than one incoming edge
    pub multiple: bool,
}

impl PortMetadata {
    fn build(id: impl Into<String>, label: impl Into<String>, data_type: PortDataType, required: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_type,
            required,
            multiple: false,
        }
    }

    pub fn required(id: impl Into<String>, label: impl Into<String>, data_type: PortDataType) -> Self {
        Self::build(id, label, data_type, true)
    }

    pub fn optional(id: impl Into<String>, label: impl Into<String>, data_type: PortDataType) -> Self {
        Self::build(id, label, data_type, false)
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

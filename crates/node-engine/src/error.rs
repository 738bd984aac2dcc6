use thiserror::Error;

use crate::types::NodeId;

pub type Result<T> = std::result::Result<T, NodeEngineError>;

#[derive(Debug, Error)]
pub enum NodeEngineError {
    /// `path` starts and ends on the same node
    #[error("Cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<NodeId> },

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Metadata is registered for the type but no processor
    #[error("No processor registered for node type '{node_type}' (node '{node_id}')")]
    MissingProcessor { node_id: NodeId, node_type: String },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Raised once, at the node whose processor returned `source`
    #[error("Node '{node_id}' ({node_type}) failed: {source}")]
    NodeFailed {
        node_id: NodeId,
        node_type: String,
        #[source]
        source: Box<NodeEngineError>,
    },

    #[error("Workflow is already running")]
    AlreadyRunning,

    #[error("Workflow cancelled")]
    Cancelled,

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{port}': expected {expected}")]
    InvalidInputType { port: String, expected: String },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Parameters failed the tool's input schema
    #[error("Invalid parameters for tool '{tool}': {message}")]
    InvalidToolParams { tool: String, message: String },

    /// An extension is missing, has the wrong type, or its backend failed
    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeEngineError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// `(node_id, node_type)` of a [`NodeFailed`](Self::NodeFailed)
    pub fn failed_node(&self) -> Option<(&str, &str)> {
        if let Self::NodeFailed { node_id, node_type, .. } = self {
            Some((node_id.as_str(), node_type.as_str()))
        } else {
            None
        }
    }
}

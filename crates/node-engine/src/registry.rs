//! Node type catalog
//!
//! Maps a node type string to its metadata and, usually, one shared
//! processor. Every node of a type runs through the same processor
//! instance, so anything a processor keeps in `self` is per type, not per
//! node.
//!
//! ```ignore
//! let mut registry = NodeRegistry::new();
//! registry.register(SearchProcessor::descriptor(), Arc::new(SearchProcessor));
//!
//! let node = registry.create_node("searchNode", Position::new(100.0, 100.0), None)?;
//! let processor = registry.get_processor(&node)?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::descriptor::{NodeTypeMetadata, ToolDescriptor};
use crate::error::{NodeEngineError, Result};
use crate::processor::{CallbackProcessor, NodeProcessor};
use crate::types::{GraphNode, NodeCategory, NodeInputs, Position};

struct Registration {
    metadata: NodeTypeMetadata,
    /// `None` for palette-only types
    processor: Option<Arc<dyn NodeProcessor>>,
}

#[derive(Default)]
pub struct NodeRegistry {
    types: HashMap<String, Registration>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, metadata: NodeTypeMetadata, processor: Option<Arc<dyn NodeProcessor>>) {
        let key = metadata.node_type.clone();
        if let Some(previous) = self.types.insert(key, Registration { metadata, processor }) {
            log::debug!("Replaced registration for node type '{}'", previous.metadata.node_type);
        }
    }

    /// Later registrations of the same type replace earlier ones
    pub fn register(&mut self, metadata: NodeTypeMetadata, processor: Arc<dyn NodeProcessor>) {
        self.insert(metadata, Some(processor));
    }

    /// Back a type with an async `(node, inputs) -> value` closure
    pub fn register_callback<F, Fut>(&mut self, metadata: NodeTypeMetadata, callback: F)
    where
        F: Fn(GraphNode, NodeInputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        self.register(metadata, Arc::new(CallbackProcessor::new(callback)));
    }

    /// Palette-only type: nodes can be created and validated, but running
    /// one fails with [`NodeEngineError::MissingProcessor`]
    pub fn register_metadata(&mut self, metadata: NodeTypeMetadata) {
        self.insert(metadata, None);
    }

    pub fn get_metadata(&self, node_type: &str) -> Option<&NodeTypeMetadata> {
        Some(&self.types.get(node_type)?.metadata)
    }

    /// Sorted by node type
    pub fn all_metadata(&self) -> Vec<&NodeTypeMetadata> {
        let mut all: Vec<_> = self.types.values().map(|r| &r.metadata).collect();
        all.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        all
    }

    pub fn metadata_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeTypeMetadata>> {
        self.all_metadata()
            .into_iter()
            .fold(HashMap::new(), |mut grouped, metadata| {
                grouped.entry(metadata.category).or_insert_with(Vec::new).push(metadata);
                grouped
            })
    }

    /// `(node_type, tool)` for each type that exposes a tool
    pub fn tool_descriptors(&self) -> Vec<(&str, &ToolDescriptor)> {
        self.all_metadata()
            .into_iter()
            .filter_map(|m| Some((m.node_type.as_str(), m.tool.as_ref()?)))
            .collect()
    }

    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.types.contains_key(node_type)
    }

    pub fn node_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Absorb `other`; its registrations win on conflicts
    pub fn merge(&mut self, other: NodeRegistry) {
        self.types.extend(other.types);
    }

    /// A new node with a fresh `<type>-<uuid>` id
    ///
    /// Data starts from the type's defaults; top-level keys of an object
    /// `extra_data` override them.
    pub fn create_node(
        &self,
        node_type: &str,
        position: Position,
        extra_data: Option<serde_json::Value>,
    ) -> Result<GraphNode> {
        let metadata = self
            .get_metadata(node_type)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(node_type.to_string()))?;

        let mut node = GraphNode::new(format!("{}-{}", node_type, uuid::Uuid::new_v4()), node_type);
        node.position = position;
        node.data = metadata.default_data.clone();
        if let Some(serde_json::Value::Object(extra)) = extra_data {
            node.data.extend(extra);
        }
        Ok(node)
    }

    pub fn get_processor(&self, node: &GraphNode) -> Result<Arc<dyn NodeProcessor>> {
        let registration = self
            .types
            .get(&node.node_type)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(node.node_type.clone()))?;

        registration
            .processor
            .clone()
            .ok_or_else(|| NodeEngineError::MissingProcessor {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            })
    }
}

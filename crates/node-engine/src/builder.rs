//! Programmatic graph construction for hosts and tests that bypass the canvas

use crate::registry::NodeRegistry;
use crate::types::{GraphEdge, GraphNode, Position, WorkflowGraph};
use crate::validation::{validate_workflow, ValidationError};

/// Chained graph construction
///
/// `with_data` and `at` apply to the node added last. Edges are numbered
/// `edge-1`, `edge-2`, ... in the order they are connected.
///
/// ```ignore
/// let graph = WorkflowBuilder::new("wf-1", "Walls")
///     .add_node("load", "fileManagerNode")
///     .with_data(json!({"file": "house.ifc"}))
///     .add_node("walls", "searchNode")
///     .connect_handles("load", "model", "walls", "input")
///     .build();
/// ```
pub struct WorkflowBuilder {
    graph: WorkflowGraph,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            graph: WorkflowGraph::new(id, name),
        }
    }

    pub fn add_node(self, id: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.push_node(GraphNode::new(id, node_type))
    }

    /// Append a prepared node, e.g. one from [`NodeRegistry::create_node`]
    pub fn push_node(mut self, node: GraphNode) -> Self {
        self.graph.nodes.push(node);
        self
    }

    /// Replace the data bag; ignored unless `data` is an object
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = data {
            if let Some(node) = self.graph.nodes.last_mut() {
                node.data = map;
            }
        }
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        if let Some(node) = self.graph.nodes.last_mut() {
            node.position = Position::new(x, y);
        }
        self
    }

    /// Whole output of `source` into the default input of `target`
    pub fn connect(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edge(source.into(), target.into(), None, None)
    }

    pub fn connect_handles(
        self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        self.edge(
            source.into(),
            target.into(),
            Some(source_handle.into()),
            Some(target_handle.into()),
        )
    }

    fn edge(
        mut self,
        source: String,
        target: String,
        source_handle: Option<String>,
        target_handle: Option<String>,
    ) -> Self {
        let id = format!("edge-{}", self.graph.edges.len() + 1);
        self.graph
            .edges
            .push(GraphEdge::new(id, source, target).with_handles(source_handle, target_handle));
        self
    }

    pub fn build(self) -> WorkflowGraph {
        self.graph
    }

    /// The graph, or everything [`validate_workflow`] found wrong with it
    pub fn build_validated(self, registry: &NodeRegistry) -> Result<WorkflowGraph, Vec<ValidationError>> {
        let errors = validate_workflow(&self.graph, Some(registry));
        if errors.is_empty() {
            Ok(self.graph)
        } else {
            Err(errors)
        }
    }
}

//! Graph snapshot types
//!
//! A [`WorkflowGraph`] is what the canvas hands over when a run starts:
//! nodes carrying a free-form data bag, and edges routing one node's
//! output into a named input of another. The serde shape matches the
//! editor's JSON (`type`, `sourceHandle`, `targetHandle`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type NodeId = String;
pub type EdgeId = String;

/// Configuration and display state of one node
pub type NodeData = serde_json::Map<String, Value>;

/// What a processor receives, keyed by target handle
pub type NodeInputs = HashMap<String, Value>;

/// Where an edge without a target handle delivers
pub const DEFAULT_TARGET_HANDLE: &str = "input";

/// Source handle that forwards the upstream output unchanged
pub const FULL_OUTPUT_HANDLE: &str = "full";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Palette section a node type is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Input,
    Query,
    Analysis,
    Viewer,
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    /// Registry key of the processor that runs this node
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default)]
    pub position: Position,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: NodeData::new(),
            position: Position::default(),
        }
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key)?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Output key to pick from the source; absent forwards everything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input key on the target; absent means [`DEFAULT_TARGET_HANDLE`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl GraphEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<String>, target_handle: Option<String>) -> Self {
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    /// Key under which the target sees this edge's value
    pub fn input_key(&self) -> &str {
        self.target_handle
            .as_deref()
            .filter(|handle| !handle.is_empty())
            .unwrap_or(DEFAULT_TARGET_HANDLE)
    }

    /// The part of `upstream` this edge delivers
    ///
    /// A named handle picks that property. When the output has no such
    /// property, or the handle is empty or [`FULL_OUTPUT_HANDLE`], the
    /// whole output goes through.
    pub fn forward(&self, upstream: &Value) -> Value {
        let picked = match self.source_handle.as_deref() {
            None | Some("") | Some(FULL_OUTPUT_HANDLE) => None,
            Some(handle) => upstream.get(handle),
        };
        picked.unwrap_or(upstream).clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowGraph {
    pub id: String,
    pub name: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Anonymous graph over the given lists
    pub fn from_parts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self {
            nodes,
            edges,
            ..Self::default()
        }
    }

    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Earliest node in list order with this type
    pub fn find_node_by_type(&self, node_type: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.node_type == node_type)
    }

    /// Edges ending at `node_id`, in list order
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Upstream node ids, one per incoming edge
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id).map(|e| e.source.clone()).collect()
    }

    /// Downstream node ids, one per outgoing edge
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id).map(|e| e.target.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fan_out() -> WorkflowGraph {
        WorkflowGraph::from_parts(
            vec![
                GraphNode::new("file", "fileManagerNode"),
                GraphNode::new("walls", "searchNode"),
                GraphNode::new("doors", "searchNode"),
            ],
            vec![GraphEdge::new("e1", "file", "walls"), GraphEdge::new("e2", "file", "doors")],
        )
    }

    #[test]
    fn test_neighbours_follow_edge_order() {
        let graph = fan_out();

        assert_eq!(graph.get_dependents("file"), vec!["walls", "doors"]);
        assert_eq!(graph.get_dependencies("doors"), vec!["file"]);
        assert!(graph.get_dependencies("file").is_empty());
        assert_eq!(graph.find_node_by_type("searchNode").map(|n| n.id.as_str()), Some("walls"));
        assert!(graph.find_node("roof").is_none());
    }

    #[test]
    fn test_named_handle_picks_property() {
        let edge = GraphEdge::new("e", "a", "b").with_handles(Some("count".into()), Some("limit".into()));
        let upstream = json!({"count": 3, "elements": []});

        assert_eq!(edge.forward(&upstream), json!(3));
        assert_eq!(edge.input_key(), "limit");
    }

    #[test]
    fn test_unnamed_full_and_unknown_handles_forward_whole_output() {
        let upstream = json!({"count": 3});
        let handles = [None, Some(String::new()), Some("full".to_string()), Some("size".to_string())];

        for handle in handles {
            let edge = GraphEdge::new("e", "a", "b").with_handles(handle.clone(), Some(String::new()));
            assert_eq!(edge.forward(&upstream), upstream, "handle {:?}", handle);
            assert_eq!(edge.input_key(), DEFAULT_TARGET_HANDLE);
        }
    }

    #[test]
    fn test_editor_json_round_trip_keeps_wire_names() {
        let raw = json!({
            "nodes": [{"id": "n1", "type": "fileManagerNode", "data": {"file": "a.ifc"},
                       "position": {"x": 10.0, "y": 20.0}}],
            "edges": [{"id": "e1", "source": "n1", "target": "n2", "sourceHandle": "model"}]
        });
        let graph: WorkflowGraph = serde_json::from_value(raw).unwrap();

        assert_eq!(graph.id, "");
        assert_eq!(graph.nodes[0].data_str("file"), Some("a.ifc"));
        assert_eq!(graph.nodes[0].position, Position::new(10.0, 20.0));

        let back = serde_json::to_value(&graph).unwrap();
        assert_eq!(back["nodes"][0]["type"], "fileManagerNode");
        assert_eq!(back["edges"][0]["sourceHandle"], "model");
        assert!(back["edges"][0].get("targetHandle").is_none());
    }
}

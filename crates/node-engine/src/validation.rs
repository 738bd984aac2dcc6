//! Pre-run checks on a graph snapshot
//!
//! The executor tolerates dangling edges and only discovers cycles when
//! it walks into one. Hosts that want every problem up front, before
//! anything runs, call [`validate_workflow`].

use std::collections::{HashMap, HashSet};

use crate::error::NodeEngineError;
use crate::registry::NodeRegistry;
use crate::topology::topological_sort;
use crate::types::{GraphEdge, GraphNode, NodeId, WorkflowGraph};

/// A structural or typing problem, located by node or edge id
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Cycle detected in graph: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<NodeId> },

    #[error("Node '{node_id}' has unregistered type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },

    /// Neither an edge nor a data value supplies the port
    #[error("Required input '{port_id}' on node '{node_id}' is not connected")]
    UnconnectedRequiredInput { node_id: String, port_id: String },

    #[error("Edge '{edge_id}' carries {source_type} into a {target_type} port")]
    IncompatiblePortTypes {
        edge_id: String,
        source_type: String,
        target_type: String,
    },

    #[error("Edge '{edge_id}' points at missing node '{node_id}'")]
    UnknownNode { edge_id: String, node_id: String },

    #[error("Node id '{node_id}' is used more than once")]
    DuplicateNodeId { node_id: String },
}

/// Collect every problem in `graph`
///
/// Without a registry only structure is checked (ids, edge endpoints,
/// cycles). With one, node types, required inputs and port types on
/// handle-named edges are checked as well.
pub fn validate_workflow(
    graph: &WorkflowGraph,
    registry: Option<&NodeRegistry>,
) -> Vec<ValidationError> {
    let mut checker = Checker::new(graph);

    checker.structure();
    if let Err(NodeEngineError::Cycle { path }) = topological_sort(&graph.nodes, &graph.edges) {
        checker.errors.push(ValidationError::CycleDetected { path });
    }
    if let Some(registry) = registry {
        checker.against(registry);
    }

    for error in &checker.errors {
        log::warn!("Workflow validation: {}", error);
    }
    checker.errors
}

struct Checker<'g> {
    graph: &'g WorkflowGraph,
    nodes: HashMap<&'g str, &'g GraphNode>,
    errors: Vec<ValidationError>,
}

impl<'g> Checker<'g> {
    fn new(graph: &'g WorkflowGraph) -> Self {
        Self {
            graph,
            nodes: HashMap::with_capacity(graph.nodes.len()),
            errors: Vec::new(),
        }
    }

    /// Duplicate ids and dangling edge endpoints
    fn structure(&mut self) {
        let graph = self.graph;
        for node in &graph.nodes {
            if self.nodes.insert(node.id.as_str(), node).is_some() {
                self.errors.push(ValidationError::DuplicateNodeId {
                    node_id: node.id.clone(),
                });
            }
        }

        for edge in &graph.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !self.nodes.contains_key(endpoint.as_str()) {
                    self.errors.push(ValidationError::UnknownNode {
                        edge_id: edge.id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
        }
    }

    fn against(&mut self, registry: &NodeRegistry) {
        let graph = self.graph;
        let fed: HashSet<(&str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.target.as_str(), e.input_key()))
            .collect();

        for node in &graph.nodes {
            let Some(metadata) = registry.get_metadata(&node.node_type) else {
                self.errors.push(ValidationError::UnknownNodeType {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
                continue;
            };

            let unfed = metadata.inputs.iter().filter(|port| {
                port.required
                    && !fed.contains(&(node.id.as_str(), port.id.as_str()))
                    && !node.data.contains_key(&port.id)
            });
            for port in unfed {
                self.errors.push(ValidationError::UnconnectedRequiredInput {
                    node_id: node.id.clone(),
                    port_id: port.id.clone(),
                });
            }
        }

        for edge in &graph.edges {
            if let Some(error) = self.port_mismatch(edge, registry) {
                self.errors.push(error);
            }
        }
    }

    /// Only edges whose source handle names a declared output are typed
    fn port_mismatch(&self, edge: &GraphEdge, registry: &NodeRegistry) -> Option<ValidationError> {
        let source = registry.get_metadata(&self.nodes.get(edge.source.as_str())?.node_type)?;
        let target = registry.get_metadata(&self.nodes.get(edge.target.as_str())?.node_type)?;
        let output = source.output(edge.source_handle.as_deref()?)?;
        let input = target.input(edge.input_key())?;

        (!output.data_type.is_compatible_with(&input.data_type)).then(|| {
            ValidationError::IncompatiblePortTypes {
                edge_id: edge.id.clone(),
                source_type: format!("{:?}", output.data_type),
                target_type: format!("{:?}", input.data_type),
            }
        })
    }
}

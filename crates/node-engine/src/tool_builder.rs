//! Tool-driven graph builder
//!
//! Lets an agent grow a graph one tool call at a time: each call maps a
//! tool name to a node type, places the new node on the layout grid,
//! wires it to the node created before it and runs it immediately.
//!
//! Outputs accumulate in `node_results` across calls until [`reset`]
//! starts a new session.
//!
//! [`reset`]: ToolGraphBuilder::reset

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{AutoWiring, GridLayout, ToolNodeMap};
use crate::error::{NodeEngineError, Result};
use crate::events::{EventSink, NullEventSink};
use crate::executor::invoke_processor;
use crate::extensions::ExecutorExtensions;
use crate::processor::{NodeStateStore, ProcessorContext, ResultCache};
use crate::registry::NodeRegistry;
use crate::types::{
    GraphEdge, GraphNode, NodeId, NodeInputs, WorkflowGraph, DEFAULT_TARGET_HANDLE,
};

/// Sequencing state of one agent session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuilderState {
    /// Agent turn; selects the grid column
    pub iteration: usize,
    /// Nodes created in this turn; selects the grid row
    pub parameter_index: usize,
    /// The most recently connected node
    pub last_node_id: Option<NodeId>,
}

pub struct ToolGraphBuilder {
    registry: Arc<NodeRegistry>,
    tools: ToolNodeMap,
    wiring: AutoWiring,
    layout: GridLayout,
    extensions: Arc<ExecutorExtensions>,
    events: Arc<dyn EventSink>,
    graph: WorkflowGraph,
    node_state: Arc<NodeStateStore>,
    state: BuilderState,
    node_results: ResultCache,
    session_id: String,
    cancel: CancellationToken,
}

impl ToolGraphBuilder {
    pub fn new(registry: Arc<NodeRegistry>, tools: ToolNodeMap, wiring: AutoWiring) -> Self {
        Self {
            registry,
            tools,
            wiring,
            layout: GridLayout::default(),
            extensions: Arc::new(ExecutorExtensions::new()),
            events: Arc::new(NullEventSink),
            graph: WorkflowGraph::new("tool-session", "Tool session"),
            node_state: Arc::new(NodeStateStore::new(Vec::new())),
            state: BuilderState::default(),
            node_results: ResultCache::default(),
            session_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_extensions(mut self, extensions: ExecutorExtensions) -> Self {
        self.extensions = Arc::new(extensions);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Seed the session with an existing canvas snapshot
    pub fn with_graph(mut self, graph: WorkflowGraph) -> Self {
        self.node_state = Arc::new(NodeStateStore::new(graph.nodes.clone()));
        self.graph = graph;
        self
    }

    /// The graph built so far
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn state(&self) -> &BuilderState {
        &self.state
    }

    /// Nodes with processor data patches applied
    pub fn get_updated_nodes(&self) -> Vec<GraphNode> {
        self.node_state.snapshot()
    }

    /// Every output produced in this session
    pub async fn node_results(&self) -> HashMap<NodeId, serde_json::Value> {
        self.node_results.read().await.clone()
    }

    /// Node type a tool name maps to
    pub fn node_type_for(&self, tool_name: &str) -> Option<&str> {
        self.tools.get(tool_name).map(String::as_str)
    }

    /// Create a node for a tool call
    ///
    /// `params` become the node's data overrides after validation against
    /// the tool's input schema.
    pub fn create_node_from_tool(
        &mut self,
        tool_name: &str,
        params: serde_json::Value,
    ) -> Result<GraphNode> {
        let node_type = self
            .tools
            .get(tool_name)
            .ok_or_else(|| NodeEngineError::UnknownTool(tool_name.to_string()))?
            .clone();

        let metadata = self
            .registry
            .get_metadata(&node_type)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(node_type.clone()))?;
        if let Some(tool) = &metadata.tool {
            validate_params(tool_name, &tool.input_schema, &params)?;
        }

        let position = self
            .layout
            .position(self.state.iteration, self.state.parameter_index);
        let node = self.registry.create_node(&node_type, position, Some(params))?;

        log::debug!(
            "Tool '{}' created node '{}' at ({}, {})",
            tool_name,
            node.id,
            position.x,
            position.y
        );
        self.graph.nodes.push(node.clone());
        self.node_state.insert(node.clone());
        self.state.parameter_index += 1;
        Ok(node)
    }

    /// Wire the previously connected node into `node_id` and make `node_id`
    /// the new tail of the chain
    ///
    /// Returns the created edge, or `None` when there is no previous node.
    pub fn connect_to_previous_node(&mut self, node_id: &str) -> Result<Option<GraphEdge>> {
        let target = self
            .graph
            .find_node(node_id)
            .ok_or_else(|| NodeEngineError::NodeNotFound(node_id.to_string()))?;

        let edge = match self.state.last_node_id.as_deref() {
            Some(previous) if previous != node_id => {
                match self.graph.find_node(previous) {
                    Some(source) => {
                        let (source_handle, target_handle) =
                            self.wiring.handles_for(&source.node_type, &target.node_type);
                        Some(
                            GraphEdge::new(format!("edge-{}-{}", previous, node_id), previous, node_id)
                                .with_handles(source_handle, target_handle),
                        )
                    }
                    None => {
                        log::warn!("Previous node '{}' is gone; not connecting", previous);
                        None
                    }
                }
            }
            _ => None,
        };

        if let Some(edge) = &edge {
            self.graph.edges.push(edge.clone());
        }
        self.state.last_node_id = Some(node_id.to_string());
        Ok(edge)
    }

    /// Run a single node with inputs drawn from earlier session results
    ///
    /// Each incoming edge whose source already ran contributes its routed
    /// value. If that leaves `input` unset, the first such source's whole
    /// output is passed as `input`.
    pub async fn execute_node(&self, node_id: &str) -> Result<serde_json::Value> {
        let node = self
            .graph
            .find_node(node_id)
            .ok_or_else(|| NodeEngineError::NodeNotFound(node_id.to_string()))?;

        let inputs = {
            let results = self.node_results.read().await;
            let mut inputs = NodeInputs::new();
            let mut first_upstream = None;
            for edge in self.graph.incoming_edges(node_id) {
                if let Some(upstream) = results.get(&edge.source) {
                    inputs.insert(edge.input_key().to_string(), edge.forward(upstream));
                    first_upstream.get_or_insert(upstream);
                }
            }
            if let Some(upstream) = first_upstream {
                inputs
                    .entry(DEFAULT_TARGET_HANDLE.to_string())
                    .or_insert_with(|| upstream.clone());
            }
            inputs
        };

        let context = ProcessorContext::new(
            self.session_id.clone(),
            Arc::new(self.graph.clone()),
            self.node_results.clone(),
            self.node_state.clone(),
            self.extensions.clone(),
            self.events.clone(),
            self.cancel.clone(),
        );
        let value = invoke_processor(&self.registry, node, inputs, &context).await?;
        self.node_results
            .write()
            .await
            .insert(node_id.to_string(), value.clone());
        Ok(value)
    }

    /// Create, connect and execute in one step
    pub async fn run_tool(
        &mut self,
        tool_name: &str,
        params: serde_json::Value,
    ) -> Result<(GraphNode, serde_json::Value)> {
        let node = self.create_node_from_tool(tool_name, params)?;
        self.connect_to_previous_node(&node.id)?;
        let value = self.execute_node(&node.id).await?;
        Ok((node, value))
    }

    /// Start the next agent turn: new grid column, first row
    pub fn next_iteration(&mut self) {
        self.state.iteration += 1;
        self.state.parameter_index = 0;
    }

    /// Cancel any tool execution still running
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Forget the session's sequencing state and results
    ///
    /// Nodes already created stay in the graph.
    pub fn reset(&mut self) {
        self.state = BuilderState::default();
        self.node_results = ResultCache::default();
        self.session_id = uuid::Uuid::new_v4().to_string();
        self.cancel = CancellationToken::new();
    }
}

fn validate_params(tool_name: &str, schema: &serde_json::Value, params: &serde_json::Value) -> Result<()> {
    let validator = jsonschema::validator_for(schema).map_err(|e| NodeEngineError::InvalidToolParams {
        tool: tool_name.to_string(),
        message: format!("schema does not compile: {}", e),
    })?;

    let messages: Vec<String> = validator.iter_errors(params).map(|e| e.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        log::warn!("Rejected parameters for tool '{}': {:?}", tool_name, messages);
        Err(NodeEngineError::InvalidToolParams {
            tool: tool_name.to_string(),
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{NodeTypeMetadata, ToolDescriptor};
    use crate::types::{NodeCategory, Position};
    use serde_json::json;

    fn registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register_callback(
            NodeTypeMetadata::new("loader", NodeCategory::Input, "Loader")
                .with_default_data(json!({"file": ""}))
                .with_tool(ToolDescriptor::new(
                    "load",
                    "Load a file",
                    json!({
                        "type": "object",
                        "properties": {"file": {"type": "string"}},
                        "required": ["file"]
                    }),
                )),
            |node, _inputs| async move {
                Ok(json!({"model": {"file": node.data.get("file").cloned()}, "elementCount": 2}))
            },
        );
        registry.register_callback(
            NodeTypeMetadata::new("echo", NodeCategory::Analysis, "Echo"),
            |_node, inputs| async move { Ok(json!({"received": inputs})) },
        );
        Arc::new(registry)
    }

    fn builder() -> ToolGraphBuilder {
        let tools = HashMap::from([
            ("load".to_string(), "loader".to_string()),
            ("echo".to_string(), "echo".to_string()),
        ]);
        let wiring = AutoWiring {
            source_handles: HashMap::from([("loader".into(), "model".into())]),
            target_handles: HashMap::from([("echo".into(), "input".into())]),
        };
        ToolGraphBuilder::new(registry(), tools, wiring)
    }

    #[test]
    fn test_unknown_tool_and_invalid_params() {
        let mut builder = builder();

        let err = builder.create_node_from_tool("fly", json!({})).unwrap_err();
        assert!(matches!(err, NodeEngineError::UnknownTool(ref t) if t == "fly"));

        let err = builder.create_node_from_tool("load", json!({"file": 3})).unwrap_err();
        assert!(matches!(err, NodeEngineError::InvalidToolParams { ref tool, .. } if tool == "load"));
        assert!(builder.graph().nodes.is_empty());
        assert_eq!(builder.state().parameter_index, 0);
    }

    #[test]
    fn test_grid_placement_follows_iterations() {
        let mut builder = builder();

        let a = builder.create_node_from_tool("load", json!({"file": "a.ifc"})).unwrap();
        let b = builder.create_node_from_tool("echo", json!({})).unwrap();
        builder.next_iteration();
        let c = builder.create_node_from_tool("echo", json!({})).unwrap();

        assert_eq!(a.position, Position::new(100.0, 100.0));
        assert_eq!(b.position, Position::new(100.0, 250.0));
        assert_eq!(c.position, Position::new(400.0, 100.0));
        assert_eq!(a.data.get("file"), Some(&json!("a.ifc")));
    }

    #[test]
    fn test_connect_uses_wiring_table() {
        let mut builder = builder();
        let a = builder.create_node_from_tool("load", json!({"file": "a.ifc"})).unwrap();
        let b = builder.create_node_from_tool("echo", json!({})).unwrap();
        let c = builder.create_node_from_tool("echo", json!({})).unwrap();

        assert!(builder.connect_to_previous_node(&a.id).unwrap().is_none());
        let ab = builder.connect_to_previous_node(&b.id).unwrap().unwrap();
        assert_eq!(ab.source_handle.as_deref(), Some("model"));
        assert_eq!(ab.target_handle.as_deref(), Some("input"));

        // echo has no source entry, so the whole output flows on
        let bc = builder.connect_to_previous_node(&c.id).unwrap().unwrap();
        assert!(bc.source_handle.is_none());

        assert!(builder.connect_to_previous_node(&c.id).unwrap().is_none());
        assert_eq!(builder.graph().edges.len(), 2);
        assert_eq!(builder.state().last_node_id.as_deref(), Some(c.id.as_str()));

        let err = builder.connect_to_previous_node("missing").unwrap_err();
        assert!(matches!(err, NodeEngineError::NodeNotFound(_)));
    }

    #[tokio::test]
    async fn test_run_tool_threads_previous_output() {
        let mut builder = builder();

        let (_, loaded) = builder.run_tool("load", json!({"file": "a.ifc"})).await.unwrap();
        assert_eq!(loaded["elementCount"], json!(2));

        let (echo, echoed) = builder.run_tool("echo", json!({})).await.unwrap();
        assert_eq!(echoed["received"]["input"], json!({"file": "a.ifc"}));

        let results = builder.node_results().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[&echo.id], echoed);
    }

    #[tokio::test]
    async fn test_unwired_types_receive_whole_output_as_input() {
        let mut builder = ToolGraphBuilder::new(
            registry(),
            HashMap::from([("echo".to_string(), "echo".to_string())]),
            AutoWiring::default(),
        );

        let (_, first) = builder.run_tool("echo", json!({})).await.unwrap();
        let (_, second) = builder.run_tool("echo", json!({})).await.unwrap();
        assert_eq!(second["received"]["input"], first);
    }

    #[tokio::test]
    async fn test_reset_starts_new_session() {
        let mut builder = builder();
        builder.run_tool("load", json!({"file": "a.ifc"})).await.unwrap();
        builder.next_iteration();

        builder.reset();
        assert_eq!(builder.state(), &BuilderState::default());
        assert!(builder.node_results().await.is_empty());
        assert_eq!(builder.graph().nodes.len(), 1);

        // the old tail is forgotten, so the next node stands alone
        let (echo, echoed) = builder.run_tool("echo", json!({})).await.unwrap();
        assert_eq!(echoed, json!({"received": {}}));
        assert_eq!(echo.position, Position::new(100.0, 100.0));
    }

    #[tokio::test]
    async fn test_stopped_builder_refuses_to_run() {
        let mut builder = builder();
        let node = builder.create_node_from_tool("echo", json!({})).unwrap();
        builder.stop();

        let err = builder.execute_node(&node.id).await.unwrap_err();
        assert!(matches!(err, NodeEngineError::Cancelled));
    }
}

//! Processor contract and the per-run context handed to processors
//!
//! A processor is the unit of computation for one node type. The registry
//! holds a single shared instance per type, so any state a processor keeps
//! is shared by every node of that type.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{NodeEngineError, Result};
use crate::events::{emit, EventSink, WorkflowEvent};
use crate::extensions::ExecutorExtensions;
use crate::types::{GraphEdge, GraphNode, NodeData, NodeId, NodeInputs, WorkflowGraph};

/// Node id → computed output, populated once per node per run
pub type ResultCache = Arc<RwLock<HashMap<NodeId, serde_json::Value>>>;

/// What a processor produces for one node
///
/// `value` is the computed output that flows along edges and into the
/// result cache. `display` is an optional UI-state patch merged into the
/// node's data once the processor returns.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub value: serde_json::Value,
    pub display: Option<NodeData>,
}

impl NodeOutput {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            display: None,
        }
    }

    /// Attach a display patch; non-object values are ignored
    pub fn with_display(mut self, display: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = display {
            self.display = Some(map);
        }
        self
    }
}

impl From<serde_json::Value> for NodeOutput {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// Per-node-type unit of computation
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    /// Transform resolved inputs into this node's output
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        context: &ProcessorContext,
    ) -> Result<NodeOutput>;
}

/// Working copy of node data, mutated by display patches during a run
pub struct NodeStateStore {
    nodes: Mutex<Vec<GraphNode>>,
}

impl NodeStateStore {
    pub fn new(nodes: Vec<GraphNode>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    /// Shallow-merge a patch into a node's data. Unknown ids are ignored.
    pub fn merge(&self, node_id: &str, patch: &NodeData) {
        let mut nodes = self.nodes.lock();
        if let Some(node) = nodes.iter_mut().find(|n| n.id == node_id) {
            for (key, value) in patch {
                node.data.insert(key.clone(), value.clone());
            }
        }
    }

    /// Add a node created after the store was built
    pub fn insert(&self, node: GraphNode) {
        self.nodes.lock().push(node);
    }

    /// Current data of one node
    pub fn data(&self, node_id: &str) -> Option<NodeData> {
        self.nodes
            .lock()
            .iter()
            .find(|n| n.id == node_id)
            .map(|n| n.data.clone())
    }

    /// All nodes with their patched data
    pub fn snapshot(&self) -> Vec<GraphNode> {
        self.nodes.lock().clone()
    }
}

/// Transient per-run bundle passed to every processor invocation
#[derive(Clone)]
pub struct ProcessorContext {
    execution_id: String,
    graph: Arc<WorkflowGraph>,
    results: ResultCache,
    node_state: Arc<NodeStateStore>,
    extensions: Arc<ExecutorExtensions>,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl ProcessorContext {
    pub fn new(
        execution_id: impl Into<String>,
        graph: Arc<WorkflowGraph>,
        results: ResultCache,
        node_state: Arc<NodeStateStore>,
        extensions: Arc<ExecutorExtensions>,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            graph,
            results,
            node_state,
            extensions,
            events,
            cancel,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// The read-only graph snapshot of this run
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.graph.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.graph.edges
    }

    /// Output of an already-evaluated node, if any
    pub async fn result(&self, node_id: &str) -> Option<serde_json::Value> {
        self.results.read().await.get(node_id).cloned()
    }

    /// Copy of every output computed so far
    pub async fn results(&self) -> HashMap<NodeId, serde_json::Value> {
        self.results.read().await.clone()
    }

    /// Push display state for a node. Fire-and-forget.
    pub fn update_node_data(&self, node_id: &str, patch: serde_json::Value) {
        let serde_json::Value::Object(patch) = patch else {
            log::warn!("Ignoring non-object data update for node '{}'", node_id);
            return;
        };
        self.node_state.merge(node_id, &patch);
        emit(
            self.events.as_ref(),
            WorkflowEvent::node_data_updated(node_id, patch),
        );
    }

    /// Current (patched) data of a node
    pub fn node_data(&self, node_id: &str) -> Option<NodeData> {
        self.node_state.data(node_id)
    }

    pub(crate) fn event_sink(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Injected resource handles
    pub fn extensions(&self) -> &ExecutorExtensions {
        &self.extensions
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

type BoxedProcessFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

/// Async callback-based processor
///
/// Wraps an async closure as a NodeProcessor, for hosts that implement
/// node types outside Rust and for test stubs.
pub struct CallbackProcessor {
    callback: Box<dyn Fn(GraphNode, NodeInputs) -> BoxedProcessFuture + Send + Sync>,
}

impl CallbackProcessor {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(GraphNode, NodeInputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            callback: Box::new(move |node, inputs| Box::pin(callback(node, inputs))),
        }
    }
}

#[async_trait]
impl NodeProcessor for CallbackProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        (self.callback)(node.clone(), inputs).await.map(NodeOutput::new)
    }
}

/// Synchronous callback-based processor
pub struct SyncCallbackProcessor {
    callback: Box<dyn Fn(&GraphNode, &NodeInputs) -> Result<serde_json::Value> + Send + Sync>,
}

impl SyncCallbackProcessor {
    pub fn new(
        callback: impl Fn(&GraphNode, &NodeInputs) -> Result<serde_json::Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeProcessor for SyncCallbackProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        (self.callback)(node, &inputs).map(NodeOutput::new)
    }
}

/// Typed lookups on resolved inputs
///
/// A `null` input counts as absent.
pub trait InputsExt {
    fn require(&self, key: &str) -> Result<&serde_json::Value>;
    fn get_string_opt(&self, key: &str) -> Option<&str>;
    fn get_number_or(&self, key: &str, fallback: f64) -> f64;
    /// [`require`](Self::require), then insist on an array
    fn get_array(&self, key: &str) -> Result<&Vec<serde_json::Value>>;
}

impl InputsExt for NodeInputs {
    fn require(&self, key: &str) -> Result<&serde_json::Value> {
        self.get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeEngineError::MissingInput(key.to_string()))
    }

    fn get_string_opt(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    fn get_number_or(&self, key: &str, fallback: f64) -> f64 {
        self.get(key).and_then(serde_json::Value::as_f64).unwrap_or(fallback)
    }

    fn get_array(&self, key: &str) -> Result<&Vec<serde_json::Value>> {
        self.require(key)?
            .as_array()
            .ok_or_else(|| NodeEngineError::InvalidInputType {
                port: key.to_string(),
                expected: "array".to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::NullEventSink;

    /// Context over a graph with no resources and an empty cache
    pub fn context_for(graph: WorkflowGraph) -> ProcessorContext {
        let node_state = Arc::new(NodeStateStore::new(graph.nodes.clone()));
        ProcessorContext::new(
            "test",
            Arc::new(graph),
            ResultCache::default(),
            node_state,
            Arc::new(ExecutorExtensions::new()),
            Arc::new(NullEventSink),
            CancellationToken::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::context_for;
    use super::*;
    use crate::events::VecEventSink;
    use serde_json::json;

    #[test]
    fn test_sync_callback_processor() {
        let processor = SyncCallbackProcessor::new(|node, _inputs| Ok(json!({"id": node.id})));
        let context = context_for(WorkflowGraph::default());
        let node = GraphNode::new("n1", "stub");

        let output = tokio_test::block_on(processor.process(&node, NodeInputs::new(), &context)).unwrap();
        assert_eq!(output.value, json!({"id": "n1"}));
        assert!(output.display.is_none());
    }

    #[tokio::test]
    async fn test_async_callback_processor_receives_inputs() {
        let processor = CallbackProcessor::new(|_node, inputs| async move {
            Ok(inputs.get("input").cloned().unwrap_or_default())
        });
        let context = context_for(WorkflowGraph::default());
        let mut inputs = NodeInputs::new();
        inputs.insert("input".into(), json!("hello"));

        let output = processor
            .process(&GraphNode::new("n1", "echo"), inputs, &context)
            .await
            .unwrap();
        assert_eq!(output.value, json!("hello"));
    }

    #[test]
    fn test_update_node_data_merges_and_emits() {
        let graph = WorkflowGraph::from_parts(vec![GraphNode::new("n1", "watchNode")], vec![]);
        let sink = Arc::new(VecEventSink::new());
        let node_state = Arc::new(NodeStateStore::new(graph.nodes.clone()));
        let context = ProcessorContext::new(
            "exec",
            Arc::new(graph),
            ResultCache::default(),
            node_state.clone(),
            Arc::new(ExecutorExtensions::new()),
            sink.clone(),
            CancellationToken::new(),
        );

        context.update_node_data("n1", json!({"isLoading": true}));
        context.update_node_data("n1", json!({"isLoading": false, "count": 3}));
        context.update_node_data("n1", json!("not an object"));

        let data = node_state.data("n1").unwrap();
        assert_eq!(data.get("isLoading"), Some(&json!(false)));
        assert_eq!(data.get("count"), Some(&json!(3)));
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_inputs_ext() {
        let mut inputs = NodeInputs::new();
        inputs.insert("elements".into(), json!([1, 2]));
        inputs.insert("name".into(), json!("wall"));
        inputs.insert("empty".into(), serde_json::Value::Null);

        assert_eq!(inputs.get_array("elements").unwrap().len(), 2);
        assert!(matches!(
            inputs.get_array("name"),
            Err(NodeEngineError::InvalidInputType { .. })
        ));
        assert!(matches!(inputs.require("empty"), Err(NodeEngineError::MissingInput(_))));
        assert_eq!(inputs.get_string_opt("name"), Some("wall"));
        assert_eq!(inputs.get_number_or("missing", 2.5), 2.5);
    }
}

//! Pull-based workflow executor
//!
//! Evaluating a node first evaluates every upstream node its incoming edges
//! name, memoizing each output in the run's result cache, then routes the
//! upstream values into the node's inputs and invokes its processor. Order
//! is discovered lazily; `execute_batch` computes it up front instead.
//!
//! Only node ids still on the active resolution path count as a cycle. The
//! result cache alone can't detect one because it is only written on success.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{NodeEngineError, Result};
use crate::events::{emit, EventSink, NullEventSink, WorkflowEvent};
use crate::extensions::ExecutorExtensions;
use crate::processor::{NodeStateStore, ProcessorContext, ResultCache};
use crate::registry::NodeRegistry;
use crate::topology::topological_sort;
use crate::types::{GraphEdge, GraphNode, NodeId, NodeInputs, WorkflowGraph};

/// Run one node's processor and apply its display patch
///
/// This is the single evaluation primitive shared by the whole-graph
/// executor and the tool-driven builder. It does not touch any result
/// cache; callers store the returned value themselves.
pub(crate) async fn invoke_processor(
    registry: &NodeRegistry,
    node: &GraphNode,
    inputs: NodeInputs,
    context: &ProcessorContext,
) -> Result<serde_json::Value> {
    if context.is_cancelled() {
        return Err(NodeEngineError::Cancelled);
    }

    let processor = registry.get_processor(node)?;

    log::debug!("Processing node '{}' ({})", node.id, node.node_type);
    emit(
        context.event_sink(),
        WorkflowEvent::NodeStarted {
            execution_id: context.execution_id().to_string(),
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
        },
    );

    match processor.process(node, inputs, context).await {
        Ok(output) => {
            if let Some(display) = output.display {
                context.update_node_data(&node.id, serde_json::Value::Object(display));
            }
            emit(
                context.event_sink(),
                WorkflowEvent::NodeCompleted {
                    execution_id: context.execution_id().to_string(),
                    node_id: node.id.clone(),
                },
            );
            log::debug!("Node '{}' completed", node.id);
            Ok(output.value)
        }
        Err(NodeEngineError::Cancelled) => Err(NodeEngineError::Cancelled),
        Err(e) => {
            log::debug!("Node '{}' failed: {}", node.id, e);
            emit(
                context.event_sink(),
                WorkflowEvent::NodeFailed {
                    execution_id: context.execution_id().to_string(),
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    error: e.to_string(),
                },
            );
            Err(NodeEngineError::NodeFailed {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                source: Box::new(e),
            })
        }
    }
}

/// Graph edges plus one implied edge per unconnected node whose type
/// declares an implicit upstream
///
/// The implied edge runs from the first node of the upstream type, in node
/// list order, into the target's default input.
fn effective_edges(graph: &WorkflowGraph, registry: &NodeRegistry) -> Vec<GraphEdge> {
    let mut edges = graph.edges.clone();
    for node in &graph.nodes {
        let Some(upstream_type) = registry
            .get_metadata(&node.node_type)
            .and_then(|m| m.implicit_upstream.as_deref())
        else {
            continue;
        };
        if graph.incoming_edges(&node.id).next().is_some() {
            continue;
        }
        let source = graph
            .nodes
            .iter()
            .find(|n| n.node_type == upstream_type && n.id != node.id);
        if let Some(source) = source {
            log::debug!("Implied edge '{}' -> '{}'", source.id, node.id);
            edges.push(GraphEdge::new(
                format!("implicit:{}->{}", source.id, node.id),
                source.id.clone(),
                node.id.clone(),
            ));
        }
    }
    edges
}

/// Identity of the current (or most recent) run
struct RunHandle {
    execution_id: String,
    cancel: CancellationToken,
}

impl RunHandle {
    fn fresh() -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Clears the running flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Executes a workflow graph snapshot against a node registry
///
/// # Example
///
/// ```ignore
/// let executor = WorkflowExecutor::new(graph, Arc::new(registry))
///     .with_extensions(extensions)
///     .with_event_sink(Arc::new(sink));
///
/// let results = executor.execute().await?;
/// let nodes = executor.get_updated_nodes();
/// ```
pub struct WorkflowExecutor {
    graph: Arc<WorkflowGraph>,
    /// What evaluation follows: the graph's edges plus implied ones
    edges: Vec<GraphEdge>,
    registry: Arc<NodeRegistry>,
    extensions: Arc<ExecutorExtensions>,
    events: Arc<dyn EventSink>,
    results: ResultCache,
    node_state: Arc<NodeStateStore>,
    running: AtomicBool,
    run: Mutex<RunHandle>,
}

impl WorkflowExecutor {
    /// Create an executor over a graph snapshot
    pub fn new(graph: WorkflowGraph, registry: Arc<NodeRegistry>) -> Self {
        let node_state = Arc::new(NodeStateStore::new(graph.nodes.clone()));
        let edges = effective_edges(&graph, &registry);
        Self {
            graph: Arc::new(graph),
            edges,
            registry,
            extensions: Arc::new(ExecutorExtensions::new()),
            events: Arc::new(NullEventSink),
            results: ResultCache::default(),
            node_state,
            running: AtomicBool::new(false),
            run: Mutex::new(RunHandle::fresh()),
        }
    }

    /// Inject resource handles visible to every processor
    pub fn with_extensions(mut self, extensions: ExecutorExtensions) -> Self {
        self.extensions = Arc::new(extensions);
        self
    }

    /// Route progress and node-data events to a sink
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Evaluate every node of the graph
    ///
    /// Clears the result cache first and returns the full cache on success.
    /// Nodes are pulled in node-list order; each pull evaluates its
    /// upstream dependencies first.
    pub async fn execute(&self) -> Result<HashMap<NodeId, serde_json::Value>> {
        self.run_all(false).await
    }

    /// Like [`execute`](Self::execute) but computes the topological order
    /// first, so a cycle is reported before any processor runs
    pub async fn execute_batch(&self) -> Result<HashMap<NodeId, serde_json::Value>> {
        self.run_all(true).await
    }

    /// Request cooperative cancellation of the current run
    ///
    /// A processor already in flight finishes; no further node starts.
    pub fn stop(&self) {
        log::info!("Stop requested for workflow '{}'", self.graph.id);
        self.run.lock().cancel.cancel();
    }

    /// Evaluate a single node (and its upstream nodes) in the current run
    ///
    /// Returns the cached output if the node was already evaluated.
    pub async fn process_node(&self, node_id: &str) -> Result<serde_json::Value> {
        let context = self.context();
        self.resolve(node_id, &context, Vec::new()).await
    }

    /// Nodes with every data patch from processors applied
    pub fn get_updated_nodes(&self) -> Vec<GraphNode> {
        self.node_state.snapshot()
    }

    /// Copy of the result cache
    pub async fn results(&self) -> HashMap<NodeId, serde_json::Value> {
        self.results.read().await.clone()
    }

    async fn run_all(&self, batch: bool) -> Result<HashMap<NodeId, serde_json::Value>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NodeEngineError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        *self.run.lock() = RunHandle::fresh();
        self.results.write().await.clear();

        let context = self.context();
        let execution_id = context.execution_id().to_string();
        log::info!(
            "Starting workflow '{}' ({} nodes, execution {})",
            self.graph.id,
            self.graph.nodes.len(),
            execution_id
        );
        emit(
            self.events.as_ref(),
            WorkflowEvent::WorkflowStarted {
                execution_id: execution_id.clone(),
                node_count: self.graph.nodes.len(),
            },
        );

        let outcome = self.evaluate_all(&context, batch).await;

        match outcome {
            Ok(()) => {
                log::info!("Workflow '{}' completed", self.graph.id);
                emit(
                    self.events.as_ref(),
                    WorkflowEvent::WorkflowCompleted { execution_id },
                );
                Ok(self.results().await)
            }
            Err(NodeEngineError::Cancelled) => {
                log::info!("Workflow '{}' cancelled", self.graph.id);
                emit(
                    self.events.as_ref(),
                    WorkflowEvent::WorkflowCancelled { execution_id },
                );
                Err(NodeEngineError::Cancelled)
            }
            Err(e) => {
                log::info!("Workflow '{}' failed: {}", self.graph.id, e);
                let failed = e.failed_node();
                emit(
                    self.events.as_ref(),
                    WorkflowEvent::WorkflowFailed {
                        execution_id,
                        node_id: failed.map(|(id, _)| id.to_string()),
                        node_type: failed.map(|(_, ty)| ty.to_string()),
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    async fn evaluate_all(&self, context: &ProcessorContext, batch: bool) -> Result<()> {
        let order: Vec<NodeId> = if batch {
            topological_sort(&self.graph.nodes, &self.edges)?
        } else {
            self.graph.nodes.iter().map(|n| n.id.clone()).collect()
        };

        for node_id in &order {
            self.resolve(node_id, context, Vec::new()).await?;
        }
        Ok(())
    }

    fn context(&self) -> ProcessorContext {
        let run = self.run.lock();
        ProcessorContext::new(
            run.execution_id.clone(),
            self.graph.clone(),
            self.results.clone(),
            self.node_state.clone(),
            self.extensions.clone(),
            self.events.clone(),
            run.cancel.clone(),
        )
    }

    /// Memoized recursive evaluation of one node
    ///
    /// `path` holds the ids currently being resolved above this call.
    fn resolve<'a>(
        &'a self,
        node_id: &'a str,
        context: &'a ProcessorContext,
        path: Vec<NodeId>,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        async move {
            let cached = self.results.read().await.get(node_id).cloned();
            if let Some(value) = cached {
                return Ok(value);
            }

            if let Some(start) = path.iter().position(|id| id == node_id) {
                let mut cycle = path[start..].to_vec();
                cycle.push(node_id.to_string());
                return Err(NodeEngineError::Cycle { path: cycle });
            }

            let node = self
                .graph
                .find_node(node_id)
                .ok_or_else(|| NodeEngineError::NodeNotFound(node_id.to_string()))?;

            let mut path = path;
            path.push(node_id.to_string());

            let mut inputs = NodeInputs::new();
            for edge in self.edges.iter().filter(|e| e.target == node_id) {
                if self.graph.find_node(&edge.source).is_none() {
                    log::warn!(
                        "Skipping edge '{}': source node '{}' is not in the graph",
                        edge.id,
                        edge.source
                    );
                    continue;
                }
                let upstream = self.resolve(&edge.source, context, path.clone()).await?;
                inputs.insert(edge.input_key().to_string(), edge.forward(&upstream));
            }

            let value = invoke_processor(&self.registry, node, inputs, context).await?;
            self.results
                .write()
                .await
                .insert(node_id.to_string(), value.clone());
            Ok(value)
        }
        .boxed()
    }
}

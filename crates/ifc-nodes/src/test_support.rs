//! Processor contexts for unit tests

use std::sync::Arc;

use node_engine::processor::{NodeStateStore, ResultCache};
use node_engine::{
    ExecutorExtensions, GraphNode, NodeInputs, NodeOutput, NodeProcessor, NullEventSink,
    ProcessorContext, Result, WorkflowGraph,
};
use tokio_util::sync::CancellationToken;

use crate::resources::{keys, InMemoryModelStore, ModelStore, ModelViewer, RecordingViewer};

pub fn context_with(
    nodes: Vec<GraphNode>,
    store: Option<InMemoryModelStore>,
    viewer: Option<Arc<RecordingViewer>>,
) -> ProcessorContext {
    context_with_cache(nodes, ResultCache::default(), store, viewer)
}

pub fn context_with_cache(
    nodes: Vec<GraphNode>,
    cache: ResultCache,
    store: Option<InMemoryModelStore>,
    viewer: Option<Arc<RecordingViewer>>,
) -> ProcessorContext {
    let mut extensions = ExecutorExtensions::new();
    if let Some(store) = store {
        let store: Arc<dyn ModelStore> = Arc::new(store);
        extensions.set(keys::MODEL_STORE, store);
    }
    if let Some(viewer) = viewer {
        let viewer: Arc<dyn ModelViewer> = viewer;
        extensions.set(keys::MODEL_VIEWER, viewer);
    }

    context_from(nodes, cache, extensions)
}

pub fn context_from(
    nodes: Vec<GraphNode>,
    cache: ResultCache,
    extensions: ExecutorExtensions,
) -> ProcessorContext {
    let node_state = Arc::new(NodeStateStore::new(nodes.clone()));
    ProcessorContext::new(
        "test",
        Arc::new(WorkflowGraph::from_parts(nodes, vec![])),
        cache,
        node_state,
        Arc::new(extensions),
        Arc::new(NullEventSink),
        CancellationToken::new(),
    )
}

pub async fn run<P: NodeProcessor>(
    processor: &P,
    node: &GraphNode,
    inputs: NodeInputs,
    context: &ProcessorContext,
) -> Result<NodeOutput> {
    processor.process(node, inputs, context).await
}

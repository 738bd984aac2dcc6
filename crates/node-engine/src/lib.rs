//! Node Engine - Graph-based workflow execution for the IFC node editor
//!
//! This crate evaluates a canvas snapshot (nodes with free-form data, and
//! edges routing one node's output into another's named input) against a
//! registry of per-type processors. It supports:
//!
//! - Pull-based memoized evaluation with cycle detection
//! - Batch evaluation in precomputed topological order
//! - Cooperative cancellation between nodes
//! - Display-state patches streamed to the host as events
//! - An agent-facing builder that grows and runs a graph tool call by tool call
//!
//! # Architecture
//!
//! - `NodeRegistry`: node type → metadata, factory defaults and shared processor
//! - `WorkflowExecutor`: one run at a time over a graph snapshot
//! - `ToolGraphBuilder`: tool name → node, auto-placed, auto-wired, executed
//! - `EventSink`: generic event streaming (not tied to any UI)
//!
//! The engine knows nothing about IFC; node types live in `ifcflow-nodes`.
//!
//! # Example
//!
//! ```ignore
//! use node_engine::{WorkflowBuilder, WorkflowExecutor};
//!
//! let graph = WorkflowBuilder::new("wf", "Walls")
//!     .add_node("load", "fileManagerNode")
//!     .with_data(serde_json::json!({"file": "house.ifc"}))
//!     .add_node("info", "projectInfoNode")
//!     .connect("load", "info")
//!     .build();
//!
//! let executor = WorkflowExecutor::new(graph, Arc::new(registry));
//! let results = executor.execute().await?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod executor;
pub mod extensions;
pub mod processor;
pub mod registry;
pub mod tool_builder;
pub mod topology;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use config::{AutoWiring, EngineConfig, GridLayout, ToolNodeMap};
pub use descriptor::{
    NodeDescriptor, NodeStatus, NodeTypeMetadata, PortDataType, PortMetadata, ToolDescriptor,
};
pub use error::{NodeEngineError, Result};
pub use events::{ChannelEventSink, EventError, EventSink, NullEventSink, VecEventSink, WorkflowEvent};
pub use executor::WorkflowExecutor;
pub use extensions::ExecutorExtensions;
pub use processor::{
    CallbackProcessor, InputsExt, NodeOutput, NodeProcessor, ProcessorContext,
    SyncCallbackProcessor,
};
pub use registry::NodeRegistry;
pub use tool_builder::{BuilderState, ToolGraphBuilder};
pub use topology::topological_sort;
pub use types::{
    GraphEdge, GraphNode, NodeCategory, NodeData, NodeId, NodeInputs, Position, WorkflowGraph,
};
pub use validation::{validate_workflow, ValidationError};

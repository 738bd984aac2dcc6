//! Run progress notifications
//!
//! The executor reports run lifecycle, per-node outcomes and display-state
//! patches to an [`EventSink`]. Sending never blocks a run; a sink that
//! cannot deliver only costs a log line.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::NodeData;

/// Destination for [`WorkflowEvent`]s
///
/// Hosts implement this over whatever transport reaches their UI.
pub trait EventSink: Send + Sync {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Delivery failure reported by a sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("event receiver has been dropped")]
    Disconnected,
    #[error("event rejected: {0}")]
    Rejected(String),
}

/// Progress of a run, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowEvent {
    WorkflowStarted {
        execution_id: String,
        node_count: usize,
    },
    WorkflowCompleted {
        execution_id: String,
    },
    /// `node_id` and `node_type` name the failing node when there is one
    WorkflowFailed {
        execution_id: String,
        node_id: Option<String>,
        node_type: Option<String>,
        error: String,
    },
    /// Stopped before every node ran
    WorkflowCancelled {
        execution_id: String,
    },
    NodeStarted {
        execution_id: String,
        node_id: String,
        node_type: String,
    },
    NodeCompleted {
        execution_id: String,
        node_id: String,
    },
    NodeFailed {
        execution_id: String,
        node_id: String,
        node_type: String,
        error: String,
    },
    /// Display state a processor pushed for a node
    NodeDataUpdated {
        node_id: String,
        data: NodeData,
    },
}

impl WorkflowEvent {
    pub fn node_data_updated(node_id: &str, data: NodeData) -> Self {
        Self::NodeDataUpdated {
            node_id: node_id.to_string(),
            data,
        }
    }

    /// Run this event belongs to; data updates carry none
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::WorkflowStarted { execution_id, .. }
            | Self::WorkflowCompleted { execution_id }
            | Self::WorkflowFailed { execution_id, .. }
            | Self::WorkflowCancelled { execution_id }
            | Self::NodeStarted { execution_id, .. }
            | Self::NodeCompleted { execution_id, .. }
            | Self::NodeFailed { execution_id, .. } => Some(execution_id),
            Self::NodeDataUpdated { .. } => None,
        }
    }
}

/// Deliver an event; failures are logged and dropped
pub(crate) fn emit(sink: &dyn EventSink, event: WorkflowEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("Dropped workflow event: {}", e);
    }
}

/// Discards everything
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Keeps every event in memory, in send order
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what has been sent so far
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards events into an unbounded tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelEventSink {
    /// The sink plus the receiver the host drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.sender.send(event).map_err(|_| EventError::Disconnected)
    }
}

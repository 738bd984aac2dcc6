//! Extensions setup for host applications.
//!
//! Hosts call [`setup_extensions`] with their model loader and, when they
//! have one, their viewer bridge. Processors then find both under
//! [`keys`](crate::resources::keys).

use std::sync::Arc;

use node_engine::ExecutorExtensions;

use crate::resources::{keys, ModelStore, ModelViewer};

/// Build the extension map IFC processors expect
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(JsonModelStore::new("models"));
/// let extensions = ifc_nodes::setup_extensions(store, None);
/// let executor = WorkflowExecutor::new(graph, registry).with_extensions(extensions);
/// ```
pub fn setup_extensions(
    store: Arc<dyn ModelStore>,
    viewer: Option<Arc<dyn ModelViewer>>,
) -> ExecutorExtensions {
    let mut extensions = ExecutorExtensions::new();
    extensions.set(keys::MODEL_STORE, store);
    match viewer {
        Some(viewer) => extensions.set(keys::MODEL_VIEWER, viewer),
        None => log::info!("No model viewer attached; visibility nodes will fail"),
    }
    extensions
}

//! Host-provided resources for processors
//!
//! Model stores, viewer bridges and similar handles are not serializable
//! and must not live in globals. Hosts register them here under a string
//! key; the map travels read-only with every run.
//!
//! ```ignore
//! let viewer: Arc<dyn ModelViewer> = Arc::new(RecordingViewer::new());
//! let extensions = ExecutorExtensions::new().with("ifc.modelViewer", viewer);
//!
//! // inside a processor
//! let viewer = context.extensions().require::<Arc<dyn ModelViewer>>("ifc.modelViewer")?;
//! ```

use std::any::Any;
use std::collections::HashMap;

use crate::error::{NodeEngineError, Result};

type Resource = Box<dyn Any + Send + Sync>;

/// String-keyed, type-checked resource map
#[derive(Default)]
pub struct ExecutorExtensions {
    resources: HashMap<String, Resource>,
}

impl ExecutorExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, dropping whatever was there
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.resources.insert(key.to_owned(), Box::new(value));
    }

    pub fn with<T: Send + Sync + 'static>(mut self, key: &str, value: T) -> Self {
        self.set(key, value);
        self
    }

    /// The resource under `key` if it was stored as a `T`
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.resources.get(key)?.downcast_ref::<T>()
    }

    /// [`get`](Self::get), with absence reported as [`NodeEngineError::Resource`]
    pub fn require<T: Send + Sync + 'static>(&self, key: &str) -> Result<&T> {
        match self.resources.get(key) {
            Some(resource) => resource.downcast_ref::<T>().ok_or_else(|| {
                NodeEngineError::resource(format!(
                    "Resource '{}' has an unexpected type (wanted {})",
                    key,
                    std::any::type_name::<T>()
                ))
            }),
            None => Err(NodeEngineError::resource(format!(
                "Resource '{}' is not available",
                key
            ))),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }
}

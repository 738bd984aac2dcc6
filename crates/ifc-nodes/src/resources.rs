//! Resource handles injected into processors
//!
//! Processors reach the model loader and the 3D viewer through the
//! executor extensions under the keys in [`keys`], never through globals.
//! Whoever loads a model owns these handles and their lifetime.

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use node_engine::{ExecutorExtensions, NodeEngineError, Result};
use parking_lot::{Mutex, RwLock};

use crate::model::IfcModel;

/// Extension keys
pub mod keys {
    /// `Arc<dyn ModelStore>`
    pub const MODEL_STORE: &str = "ifc.modelStore";
    /// `Arc<dyn ModelViewer>`
    pub const MODEL_VIEWER: &str = "ifc.modelViewer";
    /// [`ExportRoot`](super::ExportRoot)
    pub const EXPORT_ROOT: &str = "ifc.exportRoot";
}

/// Loads building models by source name
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn load(&self, source: &str) -> Result<IfcModel>;
}

/// Reads pre-parsed model documents (JSON) from a directory
///
/// `house.ifc` resolves to `house.ifc.json` when the `.ifc` file itself
/// isn't a JSON document next to it; a source ending in `.json` is read
/// as is. Relative sources are resolved against the root.
pub struct JsonModelStore {
    root: PathBuf,
}

impl JsonModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidates(&self, source: &str) -> Vec<PathBuf> {
        let path = Path::new(source);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        if path.extension().is_some_and(|ext| ext == "json") {
            vec![path]
        } else {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(".json");
            vec![PathBuf::from(sidecar), path.with_extension("json")]
        }
    }
}

#[async_trait]
impl ModelStore for JsonModelStore {
    async fn load(&self, source: &str) -> Result<IfcModel> {
        for candidate in self.candidates(source) {
            if !tokio::fs::try_exists(&candidate).await? {
                continue;
            }
            log::debug!("Loading model document {:?}", candidate);
            let contents = tokio::fs::read_to_string(&candidate).await?;
            let mut model: IfcModel = serde_json::from_str(&contents)?;
            if model.file_name.is_empty() {
                model.file_name = source.to_string();
            }
            if model.id.is_empty() {
                model.id = source.to_string();
            }
            return Ok(model);
        }
        Err(NodeEngineError::resource(format!(
            "No model document found for '{}' under {:?}",
            source, self.root
        )))
    }
}

/// Models held in memory, keyed by source name
#[derive(Default)]
pub struct InMemoryModelStore {
    models: RwLock<HashMap<String, IfcModel>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: impl Into<String>, model: IfcModel) {
        self.models.write().insert(source.into(), model);
    }

    pub fn with_model(self, source: impl Into<String>, model: IfcModel) -> Self {
        self.insert(source, model);
        self
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn load(&self, source: &str) -> Result<IfcModel> {
        self.models
            .read()
            .get(source)
            .cloned()
            .ok_or_else(|| NodeEngineError::resource(format!("Model '{}' is not loaded", source)))
    }
}

/// Visibility and highlight control of the 3D viewer
#[async_trait]
pub trait ModelViewer: Send + Sync {
    async fn load_model(&self, model: &IfcModel) -> Result<()>;
    async fn show(&self, global_ids: &[String]) -> Result<()>;
    async fn hide(&self, global_ids: &[String]) -> Result<()>;
    /// Show only these elements
    async fn isolate(&self, global_ids: &[String]) -> Result<()>;
    async fn highlight(&self, global_ids: &[String]) -> Result<()>;
    async fn clear_highlight(&self, global_ids: &[String]) -> Result<()>;
    /// Everything visible, nothing highlighted
    async fn reset(&self) -> Result<()>;
}

/// What a [`RecordingViewer`] currently shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerState {
    pub model_id: Option<String>,
    pub elements: BTreeSet<String>,
    pub hidden: BTreeSet<String>,
    pub highlighted: BTreeSet<String>,
}

impl ViewerState {
    pub fn visible(&self) -> BTreeSet<String> {
        self.elements.difference(&self.hidden).cloned().collect()
    }
}

/// Headless viewer that keeps visibility state in memory
#[derive(Default)]
pub struct RecordingViewer {
    state: Mutex<ViewerState>,
}

impl RecordingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewerState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl ModelViewer for RecordingViewer {
    async fn load_model(&self, model: &IfcModel) -> Result<()> {
        *self.state.lock() = ViewerState {
            model_id: Some(model.id.clone()),
            elements: model.elements.iter().map(|e| e.global_id.clone()).collect(),
            ..ViewerState::default()
        };
        Ok(())
    }

    async fn show(&self, global_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        for id in global_ids {
            state.hidden.remove(id);
        }
        Ok(())
    }

    async fn hide(&self, global_ids: &[String]) -> Result<()> {
        self.state.lock().hidden.extend(global_ids.iter().cloned());
        Ok(())
    }

    async fn isolate(&self, global_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        let keep: BTreeSet<&String> = global_ids.iter().collect();
        state.hidden = state
            .elements
            .iter()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();
        Ok(())
    }

    async fn highlight(&self, global_ids: &[String]) -> Result<()> {
        self.state.lock().highlighted.extend(global_ids.iter().cloned());
        Ok(())
    }

    async fn clear_highlight(&self, global_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        for id in global_ids {
            state.highlighted.remove(id);
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.hidden.clear();
        state.highlighted.clear();
        Ok(())
    }
}

/// Directory export nodes may write under
///
/// Targets are relative paths made only of plain components; absolute
/// paths and `..` are refused.
#[derive(Debug, Clone)]
pub struct ExportRoot {
    dir: PathBuf,
}

impl ExportRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn resolve(&self, target: &Path) -> Result<PathBuf> {
        let plain = target
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !plain || target.as_os_str().is_empty() {
            return Err(NodeEngineError::failed(format!(
                "Export path {:?} must be relative to the export directory",
                target
            )));
        }
        Ok(self.dir.join(target))
    }
}

/// Fetch the model store from the extensions
pub fn model_store(extensions: &ExecutorExtensions) -> Result<Arc<dyn ModelStore>> {
    extensions
        .require::<Arc<dyn ModelStore>>(keys::MODEL_STORE)
        .cloned()
}

/// Fetch the viewer, if the host provides one
pub fn model_viewer(extensions: &ExecutorExtensions) -> Option<Arc<dyn ModelViewer>> {
    extensions
        .get::<Arc<dyn ModelViewer>>(keys::MODEL_VIEWER)
        .cloned()
}

/// The export directory; without one, export nodes refuse to write files
pub fn export_root(extensions: &ExecutorExtensions) -> Option<&ExportRoot> {
    extensions.get::<ExportRoot>(keys::EXPORT_ROOT)
}

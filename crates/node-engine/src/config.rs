//! Engine configuration storage
//!
//! Grid layout and lookup tables used by the tool-driven graph builder,
//! stored as JSON. Fields missing from the file take their defaults.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::layout;
use crate::error::{NodeEngineError, Result};
use crate::types::Position;

/// Agent tool name → node type
pub type ToolNodeMap = HashMap<String, String>;

/// Grid positions for tool-created nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridLayout {
    pub start_x: f64,
    pub start_y: f64,
    pub spacing_x: f64,
    pub spacing_y: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            start_x: layout::START_X,
            start_y: layout::START_Y,
            spacing_x: layout::SPACING_X,
            spacing_y: layout::SPACING_Y,
        }
    }
}

impl GridLayout {
    /// Canvas position of the `parameter_index`-th node of an iteration
    pub fn position(&self, iteration: usize, parameter_index: usize) -> Position {
        Position::new(
            self.start_x + iteration as f64 * self.spacing_x,
            self.start_y + parameter_index as f64 * self.spacing_y,
        )
    }
}

/// Type-directed default handles for auto-connected nodes
///
/// A type missing from either table leaves that handle unset, which means
/// "whole output" on the source side and `input` on the target side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoWiring {
    /// Source node type → output handle
    pub source_handles: HashMap<String, String>,
    /// Target node type → input handle
    pub target_handles: HashMap<String, String>,
}

impl AutoWiring {
    /// Handles for an edge from a `source_type` node to a `target_type` node
    pub fn handles_for(&self, source_type: &str, target_type: &str) -> (Option<String>, Option<String>) {
        (
            self.source_handles.get(source_type).cloned(),
            self.target_handles.get(target_type).cloned(),
        )
    }

    /// Entries in `other` replace entries of the same type
    pub fn overlay(&mut self, other: AutoWiring) {
        self.source_handles.extend(other.source_handles);
        self.target_handles.extend(other.target_handles);
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Grid for tool-created nodes
    pub layout: GridLayout,
    /// Extra or overriding tool → node type entries
    pub tools: ToolNodeMap,
    /// Extra or overriding auto-wiring entries
    pub wiring: AutoWiring,
}

impl EngineConfig {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await? {
            log::debug!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await?;
        serde_json::from_str(&contents)
            .map_err(|e| NodeEngineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration as pretty-printed JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).await?;

        log::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Resolve the builder tables with this config layered over built-in ones
    pub fn layered_over(&self, mut tools: ToolNodeMap, mut wiring: AutoWiring) -> (ToolNodeMap, AutoWiring) {
        tools.extend(self.tools.clone());
        wiring.overlay(self.wiring.clone());
        (tools, wiring)
    }
}

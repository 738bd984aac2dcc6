//! IFC Nodes
//!
//! Node types and processors for the IFC workflow editor, built on
//! `node-engine`.
//!
//! # Categories
//!
//! - **Input**: Load models, summarize projects, provide constants
//! - **Query**: Search elements and read their properties
//! - **Analysis**: Aggregate quantities, group by storey
//! - **Viewer**: Drive the 3D viewer's visibility and highlighting
//! - **Output**: Export and inspect results
//!
//! Processors reach the model loader and viewer through the executor
//! extensions; see [`setup_extensions`].

pub mod analysis;
pub mod input;
pub mod model;
pub mod node_type;
pub mod output;
pub mod query;
pub mod resources;
pub mod setup;
pub mod values;
pub mod viewer;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::*;
pub use input::*;
pub use model::{IfcElement, IfcModel, IfcProject, PropertySets};
pub use node_type::{build_registry, default_tool_map, default_wiring, IfcNodeType};
pub use output::*;
pub use query::*;
pub use resources::{
    ExportRoot, InMemoryModelStore, JsonModelStore, ModelStore, ModelViewer, RecordingViewer,
    ViewerState,
};
pub use setup::setup_extensions;
pub use viewer::*;

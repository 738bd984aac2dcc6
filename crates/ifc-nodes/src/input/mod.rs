//! Input nodes
//!
//! Nodes that load models or provide values.

mod file_manager;
mod parameter;
mod project_info;

pub use file_manager::FileManagerProcessor;
pub use parameter::ParameterProcessor;
pub use project_info::ProjectInfoProcessor;

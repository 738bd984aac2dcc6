//! Viewer nodes

mod ai_visibility;

pub use ai_visibility::{AiVisibilityProcessor, VisibilityMode};

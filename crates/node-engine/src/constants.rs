//! Engine-wide constants
//!
//! Single source of truth for layout defaults and well-known names.

/// Grid used when nodes are placed by tool calls
pub mod layout {
    /// X of the first column
    pub const START_X: f64 = 100.0;
    /// Y of the first row
    pub const START_Y: f64 = 100.0;
    /// Horizontal distance between iterations
    pub const SPACING_X: f64 = 300.0;
    /// Vertical distance between nodes of one iteration
    pub const SPACING_Y: f64 = 150.0;
}

/// File names
pub mod files {
    /// Name of the engine configuration file inside a config directory
    pub const CONFIG: &str = "ifcflow.json";
}

//! Output nodes

mod export;
mod watch;

pub use export::{ExportFormat, ExportProcessor};
pub use watch::WatchProcessor;

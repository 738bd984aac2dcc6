//! Analysis nodes

mod spatial;
mod statistics;

pub use spatial::SpatialProcessor;
pub use statistics::{GroupBy, StatisticsProcessor, Summary};

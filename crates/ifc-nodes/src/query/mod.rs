//! Query nodes

mod property;
mod search;

pub use property::PropertyProcessor;
pub use search::{ConditionOperator, PropertyCondition, SearchProcessor};

//! Shallow Index and Deep Index builders, plus the on-disk wire format — §4.4-4.6.

pub mod deep;
pub mod shallow;
pub mod store;

pub use deep::build_deep_index;
pub use shallow::build_shallow_index;

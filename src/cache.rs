//! Cache-aside memoization of expensive aggregate results.

pub mod memory;
pub mod stats;
pub mod store;
pub mod ttl;

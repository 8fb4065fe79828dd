//! Fan-out/fan-in batching: chunk planning, outstanding-chunk tracking, and
//! the coordinator that aggregates chunk results.

pub mod chunk;
pub mod coordinator;
pub mod tracker;

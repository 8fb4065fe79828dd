//! Bounded worker pool: jobs, workers, and the dispatcher that pairs them.

mod dispatcher;
pub mod job;
mod worker;
pub mod worker_pool;

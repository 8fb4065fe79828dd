//! Periodic maintenance scheduling, independent of the worker pool.

pub mod maintenance;
pub mod periodic;
pub mod spec;
pub mod task;

#[path = "../support/mod.rs"]
mod support;

mod cache_aside;
mod pool_flow;
mod substrate;

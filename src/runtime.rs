//! Runtime glue that wires configuration, telemetry and the substrate lifecycle.

pub mod config;
pub mod substrate;
pub mod telemetry;

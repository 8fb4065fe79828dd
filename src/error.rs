use thiserror::Error;

/// Errors surfaced by [`WorkerPool`](crate::WorkerPool) construction and submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool size must be at least 1, got {0}")]
    InvalidSize(usize),

    #[error("submission queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("worker pool has been stopped")]
    Closed,
}

/// Errors produced while parsing a schedule string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule spec is empty")]
    Empty,

    #[error("invalid number {number:?} in schedule spec {spec:?}")]
    InvalidNumber { spec: String, number: String },

    #[error("missing time unit in schedule spec {0:?}")]
    MissingUnit(String),

    #[error("unknown time unit {unit:?} in schedule spec {spec:?}")]
    UnknownUnit { spec: String, unit: String },

    #[error("schedule spec {0:?} resolves to a zero interval")]
    ZeroInterval(String),
}

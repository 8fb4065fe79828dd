pub mod batch;
pub mod cache;
pub mod error;
pub mod pool;
pub mod runtime;
pub mod scheduler;

pub use batch::chunk::{plan_chunks, Chunk, DEFAULT_CHUNK_SIZE};
pub use batch::coordinator::{BatchCoordinator, Keyed};
pub use cache::memory::MemoryStore;
pub use cache::stats::{CacheStats, CacheStatsSnapshot};
pub use cache::store::{CacheEntry, CacheStore};
pub use cache::ttl::{spawn_housekeeping, TtlCache, DEFAULT_CACHE_TTL};
pub use error::{PoolError, ScheduleError};
pub use pool::job::Job;
pub use pool::worker_pool::{PoolConfig, WorkerPool, DEFAULT_QUEUE_CAPACITY};
pub use runtime::config::{RuntimeConfig, RuntimeConfigBuilder};
pub use runtime::substrate::Substrate;
pub use runtime::telemetry::{init_tracing, PoolSnapshot, PoolTelemetry};
pub use scheduler::maintenance::{refresh_task, Refresh};
pub use scheduler::periodic::Scheduler;
pub use scheduler::spec::Schedule;
pub use scheduler::task::{Overlap, ScheduledTask};

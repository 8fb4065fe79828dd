use bytes::Bytes;
use tokio::time::Instant;

/// A memoized value with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    value: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    pub fn new(value: Bytes, expires_at: Instant) -> Self {
        Self { value, expires_at }
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[inline]
    pub fn is_live_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Backing storage for [`TtlCache`](crate::TtlCache).
///
/// Implementations must tolerate concurrent calls from any thread. Expiry is
/// enforced by the cache layer; `sweep` is housekeeping only.
pub trait CacheStore: Send + Sync + 'static {
    fn load(&self, key: &str) -> Option<CacheEntry>;

    fn store(&self, key: String, entry: CacheEntry);

    /// Removes every entry that is no longer live at `now`, returning how many were dropped.
    fn sweep(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

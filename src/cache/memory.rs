use super::store::{CacheEntry, CacheStore};
use dashmap::DashMap;
use tokio::time::Instant;

/// Process-local store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn store(&self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live_at(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

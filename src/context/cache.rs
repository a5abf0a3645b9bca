//! Short-lived snapshot cache.
//!
//! Bounds re-analysis cost during rapid edits: a snapshot stays valid for
//! a throttle window measured from its last update, not from request
//! time. Entries are last-writer-wins per document key; concurrent
//! rebuilds of the same key are allowed since rebuilding is idempotent.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::context::types::ContextSnapshot;

/// Throttle window after which a cached snapshot is stale.
pub const CACHE_TTL: Duration = Duration::from_millis(200);

struct CacheEntry {
    snapshot: ContextSnapshot,
    updated_at: Instant,
}

/// Snapshot cache keyed by document identity.
pub struct SnapshotCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh snapshot for the key, if one exists within the throttle window.
    pub fn get(&self, key: &str) -> Option<ContextSnapshot> {
        let entries = self.entries.lock().expect("snapshot cache poisoned");
        let entry = entries.get(key)?;
        if entry.updated_at.elapsed() > self.ttl {
            trace!("Cache entry for {} is stale", key);
            return None;
        }
        Some(entry.snapshot.clone())
    }

    /// Store a snapshot, replacing any previous entry for the key.
    pub fn put(&self, key: &str, snapshot: ContextSnapshot) {
        let mut entries = self.entries.lock().expect("snapshot cache poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                snapshot,
                updated_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for one key (explicit refresh).
    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .expect("snapshot cache poisoned")
            .remove(key);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("snapshot cache poisoned")
            .clear();
    }

    /// Remove entries past the throttle window; returns how many were kept.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock().expect("snapshot cache poisoned");
        entries.retain(|_, entry| entry.updated_at.elapsed() <= self.ttl);
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_within_window() {
        let cache = SnapshotCache::new();
        cache.put("doc@1", ContextSnapshot::default());
        assert!(cache.get("doc@1").is_some());
        assert!(cache.get("doc@2").is_none());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = SnapshotCache::with_ttl(Duration::from_millis(10));
        cache.put("doc@1", ContextSnapshot::default());
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get("doc@1").is_none());
        assert_eq!(cache.prune(), 0);
    }

    #[test]
    fn test_invalidate_is_immediate() {
        let cache = SnapshotCache::new();
        cache.put("doc@1", ContextSnapshot::default());
        cache.invalidate("doc@1");
        assert!(cache.get("doc@1").is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = SnapshotCache::new();
        let mut first = ContextSnapshot::default();
        first.notes.insert("writer".to_string(), "first".to_string());
        let mut second = ContextSnapshot::default();
        second
            .notes
            .insert("writer".to_string(), "second".to_string());

        cache.put("doc@1", first);
        cache.put("doc@1", second);
        let got = cache.get("doc@1").unwrap();
        assert_eq!(got.notes.get("writer").map(String::as_str), Some("second"));
    }
}

//! Cache store boundary and the in-process backend.
//!
//! `CacheStore` is the key-value contract every backend implements. Any
//! method may fail with `CacheError::StoreUnavailable`; callers are expected
//! to degrade rather than propagate.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;

use super::clock::{Clock, SystemClock};
use super::error::CacheError;
use super::lock::{mutex_lock, rw_read, rw_write};
use super::registry::TagIndex;
use super::tags::Tag;

const SOURCE: &str = "cache::store";
pub const METRIC_MEMORY_EVICT: &str = "tenancy_cache_memory_evict_total";

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` for `ttl`. A zero TTL stores nothing, drops any previous
    /// value and reports `false`.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError>;

    /// Add one to an integer entry, creating it with 1 when absent.
    async fn increment(&self, key: &str) -> Result<i64, CacheError>;

    async fn forget(&self, key: &str) -> Result<bool, CacheError>;

    async fn flush_all(&self) -> Result<(), CacheError>;

    /// Keys the store dropped on its own (capacity eviction, expiry noticed
    /// on access) since the last call. Backends that cannot report this
    /// return nothing and rely on explicit tag index pruning.
    fn drain_dropped(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports_native_tags(&self) -> bool {
        false
    }

    async fn put_tagged(
        &self,
        _key: &str,
        _tags: &[Tag],
        _value: Value,
        _ttl: Duration,
    ) -> Result<bool, CacheError> {
        Err(CacheError::TagsUnsupported)
    }

    async fn flush_tags(&self, _tags: &[Tag]) -> Result<(), CacheError> {
        Err(CacheError::TagsUnsupported)
    }
}

struct StoredEntry {
    value: Value,
    expires_at: Option<OffsetDateTime>,
}

impl StoredEntry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory store with LRU capacity and clock-driven expiry.
///
/// Expired entries are dropped lazily when touched. Evicted and expired keys
/// are remembered (up to `capacity` of them, rewritten keys excluded) until
/// [`CacheStore::drain_dropped`] collects them. A TTL too large to represent
/// never expires. With [`MemoryStore::with_native_tags`] the store keeps its
/// own tag index and answers `flush_tags` directly.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, StoredEntry>>,
    native_tags: Option<TagIndex>,
    dropped: Mutex<LruCache<String, ()>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            native_tags: None,
            dropped: Mutex::new(LruCache::new(capacity)),
            clock,
        }
    }

    pub fn with_native_tags(mut self) -> Self {
        self.native_tags = Some(TagIndex::new());
        self
    }

    /// Number of stored entries, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_live(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            drop(entries);
            self.detach_native(key);
            self.record_dropped(key);
        }
        None
    }

    fn write(&self, key: &str, value: Value, ttl: Duration) -> bool {
        if ttl.is_zero() {
            self.remove(key);
            return false;
        }

        let entry = StoredEntry {
            value,
            expires_at: expiry(self.clock.now(), ttl),
        };
        let displaced = rw_write(&self.entries, SOURCE, "put").push(key.to_string(), entry);
        // A rewrite starts with no tags; `put_tagged` registers them afterwards.
        self.detach_native(key);
        self.revive(key);
        if let Some((evicted_key, _)) = displaced
            && evicted_key != key
        {
            self.evicted(&evicted_key);
        }
        true
    }

    fn evicted(&self, key: &str) {
        counter!(METRIC_MEMORY_EVICT).increment(1);
        self.detach_native(key);
        self.record_dropped(key);
    }

    fn record_dropped(&self, key: &str) {
        mutex_lock(&self.dropped, SOURCE, "record_dropped").put(key.to_string(), ());
    }

    fn revive(&self, key: &str) {
        mutex_lock(&self.dropped, SOURCE, "revive").pop(key);
    }

    fn remove(&self, key: &str) -> bool {
        let removed = rw_write(&self.entries, SOURCE, "forget").pop(key).is_some();
        self.detach_native(key);
        removed
    }

    fn detach_native(&self, key: &str) {
        if let Some(index) = &self.native_tags {
            index.unregister(key);
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.read_live(key))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        Ok(self.write(key, value, ttl))
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "increment");

        if let Some(entry) = entries.get_mut(key)
            && entry.is_live(now)
        {
            let current = entry.value.as_i64().ok_or_else(|| CacheError::NotAnInteger {
                key: key.to_string(),
            })?;
            let next = current.saturating_add(1);
            entry.value = Value::from(next);
            return Ok(next);
        }

        let displaced = entries.push(
            key.to_string(),
            StoredEntry {
                value: Value::from(1),
                expires_at: None,
            },
        );
        drop(entries);
        self.detach_native(key);
        self.revive(key);
        if let Some((evicted_key, _)) = displaced
            && evicted_key != key
        {
            self.evicted(&evicted_key);
        }
        Ok(1)
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.remove(key))
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "flush_all").clear();
        mutex_lock(&self.dropped, SOURCE, "flush_all").clear();
        if let Some(index) = &self.native_tags {
            index.clear();
        }
        Ok(())
    }

    fn drain_dropped(&self) -> Vec<String> {
        let mut dropped = mutex_lock(&self.dropped, SOURCE, "drain_dropped");
        std::iter::from_fn(|| dropped.pop_lru().map(|(key, ())| key)).collect()
    }

    fn supports_native_tags(&self) -> bool {
        self.native_tags.is_some()
    }

    async fn put_tagged(
        &self,
        key: &str,
        tags: &[Tag],
        value: Value,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let Some(index) = &self.native_tags else {
            return Err(CacheError::TagsUnsupported);
        };

        let stored = self.write(key, value, ttl);
        if stored {
            index.register(key, tags.iter().cloned());
        }
        Ok(stored)
    }

    async fn flush_tags(&self, tags: &[Tag]) -> Result<(), CacheError> {
        let Some(index) = &self.native_tags else {
            return Err(CacheError::TagsUnsupported);
        };

        for tag in tags {
            for key in index.take_tag(tag) {
                self.remove(&key);
            }
        }
        Ok(())
    }
}

/// Absolute expiry for `ttl` from `now`; `None` when it is past the last
/// representable instant.
fn expiry(now: OffsetDateTime, ttl: Duration) -> Option<OffsetDateTime> {
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;
    use crate::cache::clock::ManualClock;

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn store_with_clock(capacity: usize) -> (MemoryStore, ManualClock) {
        let clock = ManualClock::default();
        let capacity = NonZeroUsize::new(capacity).expect("non-zero capacity");
        let store = MemoryStore::with_clock(capacity, Arc::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn put_get_forget_roundtrip() {
        let (store, _) = store_with_clock(8);

        assert!(store.get("k").await.expect("get").is_none());
        assert!(store.put("k", json!({"a": 1}), TEN_MINUTES).await.expect("put"));
        assert_eq!(store.get("k").await.expect("get"), Some(json!({"a": 1})));

        assert!(store.forget("k").await.expect("forget"));
        assert!(!store.forget("k").await.expect("forget"));
        assert!(store.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn entries_expire_with_the_clock() {
        let (store, clock) = store_with_clock(8);

        store.put("k", json!(1), TEN_MINUTES).await.expect("put");
        clock.advance(Duration::from_secs(599));
        assert!(store.get("k").await.expect("get").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("k").await.expect("get").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_drops_previous_value() {
        let (store, _) = store_with_clock(8);

        store.put("k", json!(1), TEN_MINUTES).await.expect("put");
        assert!(!store.put("k", json!(2), Duration::ZERO).await.expect("put"));
        assert!(store.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn increment_creates_then_counts() {
        let (store, _) = store_with_clock(8);

        assert_eq!(store.increment("hits").await.expect("increment"), 1);
        assert_eq!(store.increment("hits").await.expect("increment"), 2);
        assert_eq!(store.get("hits").await.expect("get"), Some(json!(2)));
    }

    #[tokio::test]
    async fn increment_rejects_non_integer_values() {
        let (store, _) = store_with_clock(8);

        store.put("k", json!("text"), TEN_MINUTES).await.expect("put");
        let err = store.increment("k").await.expect_err("not an integer");
        assert!(matches!(err, CacheError::NotAnInteger { .. }));
    }

    #[tokio::test]
    async fn increment_restarts_expired_counters() {
        let (store, clock) = store_with_clock(8);

        store.put("k", json!(41), TEN_MINUTES).await.expect("put");
        clock.advance(TEN_MINUTES);
        assert_eq!(store.increment("k").await.expect("increment"), 1);
    }

    #[tokio::test]
    async fn lru_capacity_evicts_oldest() {
        let (store, _) = store_with_clock(2);

        store.put("a", json!(1), TEN_MINUTES).await.expect("put");
        store.put("b", json!(2), TEN_MINUTES).await.expect("put");
        store.put("c", json!(3), TEN_MINUTES).await.expect("put");

        assert!(store.get("a").await.expect("get").is_none());
        assert!(store.get("b").await.expect("get").is_some());
        assert!(store.get("c").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn plain_store_rejects_tag_operations() {
        let (store, _) = store_with_clock(8);

        assert!(!store.supports_native_tags());
        let err = store
            .flush_tags(&[Tag::missions()])
            .await
            .expect_err("tags unsupported");
        assert!(matches!(err, CacheError::TagsUnsupported));
    }

    #[tokio::test]
    async fn native_tags_flush_only_tagged_entries() {
        let (store, _) = store_with_clock(8);
        let store = store.with_native_tags();

        store
            .put_tagged("m1", &[Tag::missions()], json!(1), TEN_MINUTES)
            .await
            .expect("put");
        store
            .put_tagged("d1", &[Tag::dashboard()], json!(2), TEN_MINUTES)
            .await
            .expect("put");

        store.flush_tags(&[Tag::missions()]).await.expect("flush");

        assert!(store.get("m1").await.expect("get").is_none());
        assert!(store.get("d1").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn flush_all_clears_everything() {
        let (store, _) = store_with_clock(8);
        let store = store.with_native_tags();

        store.put("a", json!(1), TEN_MINUTES).await.expect("put");
        store
            .put_tagged("b", &[Tag::calendar()], json!(2), TEN_MINUTES)
            .await
            .expect("put");

        store.flush_all().await.expect("flush");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn untagged_rewrite_leaves_native_tags() {
        let (store, _) = store_with_clock(8);
        let store = store.with_native_tags();

        store
            .put_tagged("k", &[Tag::missions()], json!(1), TEN_MINUTES)
            .await
            .expect("put");
        store.put("k", json!(2), TEN_MINUTES).await.expect("put");

        store.flush_tags(&[Tag::missions()]).await.expect("flush");
        assert_eq!(store.get("k").await.expect("get"), Some(json!(2)));
    }

    #[tokio::test]
    async fn tagged_rewrite_replaces_native_tags() {
        let (store, _) = store_with_clock(8);
        let store = store.with_native_tags();

        store
            .put_tagged("k", &[Tag::missions()], json!(1), TEN_MINUTES)
            .await
            .expect("put");
        store
            .put_tagged("k", &[Tag::calendar()], json!(2), TEN_MINUTES)
            .await
            .expect("put");

        store.flush_tags(&[Tag::missions()]).await.expect("flush");
        assert!(store.get("k").await.expect("get").is_some());
        store.flush_tags(&[Tag::calendar()]).await.expect("flush");
        assert!(store.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn evicted_and_expired_keys_are_reported_once() {
        let (store, clock) = store_with_clock(2);

        store.put("a", json!(1), TEN_MINUTES).await.expect("put");
        store.put("b", json!(2), Duration::from_secs(5)).await.expect("put");
        store.put("c", json!(3), TEN_MINUTES).await.expect("put");
        assert_eq!(store.drain_dropped(), vec!["a".to_string()]);

        clock.advance(Duration::from_secs(5));
        assert!(store.get("b").await.expect("get").is_none());
        assert_eq!(store.drain_dropped(), vec!["b".to_string()]);
        assert!(store.drain_dropped().is_empty());
    }

    #[tokio::test]
    async fn dropped_keys_are_bounded_by_capacity() {
        let (store, _) = store_with_clock(1);

        for n in 0..10 {
            store
                .put(&format!("k{n}"), json!(n), TEN_MINUTES)
                .await
                .expect("put");
        }

        assert_eq!(store.drain_dropped(), vec!["k8".to_string()]);
    }

    #[tokio::test]
    async fn rewritten_keys_are_not_reported() {
        let (store, _) = store_with_clock(2);

        store.put("a", json!(1), TEN_MINUTES).await.expect("put");
        store.put("b", json!(2), TEN_MINUTES).await.expect("put");
        store.put("c", json!(3), TEN_MINUTES).await.expect("put");
        store.put("a", json!(4), TEN_MINUTES).await.expect("put");

        assert_eq!(store.drain_dropped(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let (store, clock) = store_with_clock(8);

        assert!(
            store
                .put("k", json!(1), Duration::from_secs(1_000_000_000_000))
                .await
                .expect("put")
        );
        clock.advance(Duration::from_secs(365 * 24 * 60 * 60));
        assert_eq!(store.get("k").await.expect("get"), Some(json!(1)));
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let (store, _) = store_with_clock(8);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entries.write().expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.put("k", json!(1), TEN_MINUTES).await.expect("put");
        assert!(store.get("k").await.expect("get").is_some());
    }
}

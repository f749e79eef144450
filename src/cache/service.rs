//! Remember/fallback engine.
//!
//! Every read goes through [`CacheService::remember_with_tags`]: return the
//! cached value if present, otherwise run the producer once, cache its
//! result and return it. Store failures and timeouts never reach the caller;
//! the engine logs them and falls back to the producer. Producer errors are
//! the caller's own and pass through untouched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::config::CacheConfig;
use super::error::CacheError;
use super::registry::TagIndex;
use super::store::CacheStore;
use super::tags::Tag;

pub const METRIC_HIT: &str = "tenancy_cache_hit_total";
pub const METRIC_MISS: &str = "tenancy_cache_miss_total";
pub const METRIC_DEGRADED: &str = "tenancy_cache_degraded_total";
pub const METRIC_STORE_ERROR: &str = "tenancy_cache_store_error_total";

pub struct CacheService {
    store: Arc<dyn CacheStore>,
    index: Arc<TagIndex>,
    timeout: Duration,
    enabled: bool,
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>, index: Arc<TagIndex>, config: &CacheConfig) -> Self {
        Self {
            store,
            index,
            timeout: config.store_timeout(),
            enabled: config.is_enabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<TagIndex> {
        &self.index
    }

    /// Run one store call under the configured timeout.
    ///
    /// An elapsed timeout is reported exactly like a backend failure.
    pub(crate) async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::unavailable(
                operation,
                format!("no answer within {} ms", self.timeout.as_millis()),
            )),
        };

        if outcome.is_err() {
            counter!(METRIC_STORE_ERROR, "operation" => operation).increment(1);
        }
        outcome
    }

    /// Return the cached value for `key`, computing and caching it on a miss.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.remember_with_tags(key, &[], ttl, producer).await
    }

    /// [`remember`](Self::remember) that also files the entry under `tags`.
    #[instrument(level = "debug", skip_all, fields(key = %key, tags = tags.len()))]
    pub async fn remember_with_tags<T, E, F, Fut>(
        &self,
        key: &str,
        tags: &[Tag],
        ttl: Duration,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return producer().await;
        }

        match self.guarded("get", self.store.get(key)).await {
            Ok(Some(payload)) => match serde_json::from_value::<T>(payload) {
                Ok(value) => {
                    counter!(METRIC_HIT).increment(1);
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key, error = %err, "Discarding cached payload that no longer decodes");
                }
            },
            Ok(None) => {}
            Err(err) => {
                counter!(METRIC_DEGRADED).increment(1);
                warn!(key, error = %err, "Cache read failed; computing without cache");
                return producer().await;
            }
        }

        counter!(METRIC_MISS).increment(1);
        let value = producer().await?;

        match serde_json::to_value(&value) {
            Ok(payload) => {
                self.write(key, tags, ttl, payload).await;
            }
            Err(err) => {
                warn!(key, error = %err, "Computed value could not be serialized; returning uncached");
            }
        }

        Ok(value)
    }

    /// Read a cached value. Store failures and undecodable payloads read as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        match self.guarded("get", self.store.get(key)).await {
            Ok(Some(payload)) => serde_json::from_value(payload)
                .inspect_err(|err| warn!(key, error = %err, "Cached payload does not decode"))
                .ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "Cache read failed");
                None
            }
        }
    }

    /// Unconditionally (re)write an untagged entry. Returns whether it was stored.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        self.put_with_tags(key, &[], value, ttl).await
    }

    /// Unconditionally (re)write a tagged entry. Used to warm entries ahead of reads.
    pub async fn put_with_tags<T: Serialize>(
        &self,
        key: &str,
        tags: &[Tag],
        value: &T,
        ttl: Duration,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        match serde_json::to_value(value) {
            Ok(payload) => self.write(key, tags, ttl, payload).await,
            Err(err) => {
                warn!(key, error = %err, "Value could not be serialized for caching");
                false
            }
        }
    }

    async fn write(&self, key: &str, tags: &[Tag], ttl: Duration, payload: Value) -> bool {
        let native = !tags.is_empty() && self.store.supports_native_tags();
        let result = if native {
            self.guarded("put_tagged", self.store.put_tagged(key, tags, payload, ttl))
                .await
        } else {
            self.guarded("put", self.store.put(key, payload, ttl)).await
        };

        match result {
            Ok(stored) => {
                if !native {
                    if stored {
                        self.index.register(key, tags.iter().cloned());
                    } else {
                        self.index.unregister(key);
                    }
                }
                self.release_dropped();
                stored
            }
            Err(err) => {
                warn!(key, error = %err, "Cache write failed; value returned uncached");
                false
            }
        }
    }

    /// Drop keys the store evicted or expired on its own from the tag index.
    fn release_dropped(&self) {
        let dropped = self.store.drain_dropped();
        if dropped.is_empty() {
            return;
        }

        let released = dropped
            .iter()
            .filter(|key| self.index.unregister(key))
            .count();
        debug!(dropped = dropped.len(), released, "Released dropped keys from tag index");
    }

    /// Increment an integer counter. `None` when the store cannot answer.
    pub async fn increment(&self, key: &str) -> Option<i64> {
        if !self.enabled {
            return None;
        }

        self.guarded("increment", self.store.increment(key))
            .await
            .inspect_err(|err| warn!(key, error = %err, "Cache increment failed"))
            .ok()
    }

    /// Remove one entry by key and drop it from the tag index.
    pub async fn forget(&self, key: &str) -> bool {
        match self.guarded("forget", self.store.forget(key)).await {
            Ok(removed) => {
                self.index.unregister(key);
                removed
            }
            Err(err) => {
                warn!(key, error = %err, "Cache forget failed");
                false
            }
        }
    }

    /// Remove every entry. The tag index is cleared only if the store flushed.
    pub async fn flush_all(&self) -> bool {
        match self.guarded("flush_all", self.store.flush_all()).await {
            Ok(()) => {
                self.index.clear();
                true
            }
            Err(err) => {
                warn!(error = %err, "Cache flush failed");
                false
            }
        }
    }

    /// Drop index members whose entry is already gone from the store.
    ///
    /// Stops early if the store becomes unavailable. Returns the number of
    /// keys pruned.
    pub async fn prune_tag_index(&self) -> usize {
        let mut pruned = 0;
        for key in self.index.keys() {
            match self.guarded("get", self.store.get(&key)).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if self.index.unregister(&key) {
                        pruned += 1;
                    }
                }
                Err(err) => {
                    warn!(error = %err, pruned, "Tag index pruning interrupted");
                    break;
                }
            }
        }
        debug!(pruned, "Tag index pruned");
        pruned
    }
}

//! Cache configuration.
//!
//! Resolved from the `[cache]` section of `tenancy-cache.toml`.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use super::policy::{DEFAULT_TTL, KeyRenderMode, PolicyOverride};

const DEFAULT_STORE_TIMEOUT_MS: u64 = 250;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every read runs its producer and every trigger is a no-op.
    pub enabled: bool,
    /// TTL applied to categories without a registered policy.
    pub default_ttl_seconds: u64,
    /// Upper bound for a single store call before it counts as unavailable.
    pub store_timeout_ms: u64,
    /// Maximum entries held by the in-memory store.
    pub memory_capacity: usize,
    /// Let the in-memory store index tags itself.
    pub native_tags: bool,
    /// Maximum events per invalidation batch.
    pub consume_batch_limit: usize,
    /// Fail on unresolved key placeholders instead of keeping them literally.
    pub strict_keys: bool,
    /// Per-category TTL and template overrides.
    pub policy_overrides: BTreeMap<String, PolicyOverride>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: DEFAULT_TTL.as_secs(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            native_tags: false,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
            strict_keys: false,
            policy_overrides: BTreeMap::new(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl_seconds: settings.default_ttl.as_secs(),
            store_timeout_ms: u64::try_from(settings.store_timeout.as_millis()).unwrap_or(u64::MAX),
            memory_capacity: settings.memory_capacity.get(),
            native_tags: settings.native_tags,
            consume_batch_limit: settings.consume_batch_limit.get(),
            strict_keys: settings.strict_keys,
            policy_overrides: settings.policies.clone(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn key_render_mode(&self) -> KeyRenderMode {
        if self.strict_keys {
            KeyRenderMode::Strict
        } else {
            KeyRenderMode::Lenient
        }
    }
}

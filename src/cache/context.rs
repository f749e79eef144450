//! Composition root for the cache layer.
//!
//! Builds the component graph once at startup and hands out shared handles.
//! Nothing in the cache layer resolves its collaborators by itself.

use std::sync::Arc;

use tracing::info;

use super::config::CacheConfig;
use super::consumer::InvalidationConsumer;
use super::events::EventQueue;
use super::facades::DomainCache;
use super::invalidation::TagInvalidator;
use super::policy::PolicyRegistry;
use super::registry::TagIndex;
use super::service::CacheService;
use super::store::{CacheStore, MemoryStore};
use super::trigger::CacheTrigger;

#[derive(Clone)]
pub struct CacheContext {
    pub policies: Arc<PolicyRegistry>,
    pub service: Arc<CacheService>,
    pub domain: Arc<DomainCache>,
    pub trigger: Arc<CacheTrigger>,
}

impl CacheContext {
    /// Build the graph over the in-process memory store.
    pub fn build(config: &CacheConfig) -> Self {
        let mut store = MemoryStore::new(config.memory_capacity_non_zero());
        if config.native_tags {
            store = store.with_native_tags();
        }
        Self::with_store(config, Arc::new(store))
    }

    /// Build the graph over an externally provided store.
    pub fn with_store(config: &CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let policies = Arc::new(PolicyRegistry::with_default_ttl(
            config.key_render_mode(),
            config.default_ttl(),
        ));
        for (category, update) in &config.policy_overrides {
            policies.apply_override(category, update);
        }

        info!(
            enabled = config.is_enabled(),
            native_tags = store.supports_native_tags(),
            store_timeout_ms = config.store_timeout_ms,
            key_mode = ?config.key_render_mode(),
            overrides = config.policy_overrides.len(),
            "Cache layer initialised"
        );

        let service = Arc::new(CacheService::new(store, Arc::new(TagIndex::new()), config));
        let domain = Arc::new(DomainCache::new(service.clone(), policies.clone()));
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(InvalidationConsumer::new(
            config,
            queue.clone(),
            policies.clone(),
            service.clone(),
        ));
        let trigger = Arc::new(CacheTrigger::new(config.clone(), queue, consumer));

        Self {
            policies,
            service,
            domain,
            trigger,
        }
    }

    /// A standalone invalidator sharing this context's store and index.
    pub fn invalidator(&self) -> TagInvalidator {
        TagInvalidator::new(self.service.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::cache::policy::{PolicyOverride, category};

    #[test]
    fn overrides_are_applied_at_build() {
        let config = CacheConfig {
            policy_overrides: BTreeMap::from([(
                category::NOTIFICATIONS.to_string(),
                PolicyOverride {
                    ttl: Some(Duration::from_secs(30)),
                    key_template: None,
                },
            )]),
            default_ttl_seconds: 90,
            ..Default::default()
        };

        let context = CacheContext::build(&config);

        assert_eq!(context.policies.ttl(category::NOTIFICATIONS), Duration::from_secs(30));
        assert_eq!(context.policies.ttl("unregistered"), Duration::from_secs(90));
    }

    #[test]
    fn native_tags_follow_config() {
        let plain = CacheContext::build(&CacheConfig::default());
        let native = CacheContext::build(&CacheConfig {
            native_tags: true,
            ..Default::default()
        });

        assert!(!plain.service.store().supports_native_tags());
        assert!(native.service.store().supports_native_tags());
    }
}

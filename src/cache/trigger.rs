//! Cache trigger.
//!
//! The entry point write paths call after a successful mutation. Publishes
//! the matching event and, by default, consumes it right away.

use std::sync::Arc;

use tracing::debug;

use super::config::CacheConfig;
use super::consumer::{ConsumeOutcome, InvalidationConsumer};
use super::events::{EventKind, EventQueue};
use crate::domain::{Checklist, Mission, UserId};

/// # Usage
///
/// ```ignore
/// // After a mission is reassigned:
/// trigger.mission_updated(&mission).await;
/// ```
pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<InvalidationConsumer>,
}

impl CacheTrigger {
    pub fn new(
        config: CacheConfig,
        queue: Arc<EventQueue>,
        consumer: Arc<InvalidationConsumer>,
    ) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume immediately.
    ///
    /// With `consume_now` false the event waits for the next explicit
    /// consumption. Disabled caching makes this a no-op.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) -> Option<ConsumeOutcome> {
        if !self.config.is_enabled() {
            debug!(event_kind = kind.name(), "Cache trigger skipped: cache disabled");
            return None;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await
        } else {
            None
        }
    }

    pub async fn user_updated(&self, user_id: UserId) {
        self.trigger(EventKind::UserUpdated { user_id }, true).await;
    }

    pub async fn mission_updated(&self, mission: &Mission) {
        self.trigger(
            EventKind::MissionUpdated {
                mission: mission.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn checklist_updated(&self, checklist: &Checklist) {
        self.trigger(
            EventKind::ChecklistUpdated {
                checklist_id: checklist.id,
                mission: checklist.mission.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn role_updated(&self, role: &str) {
        self.trigger(
            EventKind::RoleUpdated {
                role: role.to_string(),
            },
            true,
        )
        .await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<InvalidationConsumer> {
        &self.consumer
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::cache::policy::{KeyRenderMode, PolicyRegistry};
    use crate::cache::registry::TagIndex;
    use crate::cache::service::CacheService;
    use crate::cache::store::MemoryStore;

    fn create_trigger(config: CacheConfig) -> CacheTrigger {
        let service = Arc::new(CacheService::new(
            Arc::new(MemoryStore::new(NonZeroUsize::new(16).expect("non-zero"))),
            Arc::new(TagIndex::new()),
            &config,
        ));
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(InvalidationConsumer::new(
            &config,
            queue.clone(),
            Arc::new(PolicyRegistry::new(KeyRenderMode::Strict)),
            service,
        ));
        CacheTrigger::new(config, queue, consumer)
    }

    #[tokio::test]
    async fn deferred_trigger_leaves_event_queued() {
        let trigger = create_trigger(CacheConfig::default());

        let outcome = trigger
            .trigger(EventKind::UserUpdated { user_id: 1 }, false)
            .await;

        assert!(outcome.is_none());
        assert_eq!(trigger.queue().len(), 1);
    }

    #[tokio::test]
    async fn immediate_trigger_consumes() {
        let trigger = create_trigger(CacheConfig::default());

        trigger.role_updated("ops").await;

        assert!(trigger.queue().is_empty());
    }

    #[tokio::test]
    async fn checklist_trigger_carries_parent_mission() {
        let trigger = create_trigger(CacheConfig::default());
        let checklist = Checklist {
            id: 5,
            mission: Mission::new(2).with_checker(7),
        };

        trigger.trigger(
            EventKind::ChecklistUpdated {
                checklist_id: checklist.id,
                mission: checklist.mission.clone(),
            },
            false,
        )
        .await;

        let event = trigger.queue().drain(1).remove(0);
        assert_eq!(
            event.kind,
            EventKind::ChecklistUpdated {
                checklist_id: 5,
                mission: Mission::new(2).with_checker(7),
            }
        );
    }

    #[tokio::test]
    async fn disabled_cache_skips_publishing() {
        let trigger = create_trigger(CacheConfig {
            enabled: false,
            ..Default::default()
        });

        trigger.user_updated(1).await;
        trigger.mission_updated(&Mission::new(1)).await;

        assert!(trigger.queue().is_empty());
        assert!(!trigger.config().is_enabled());
    }
}

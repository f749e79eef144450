//! Invalidation consumer.
//!
//! Drains the event queue, merges the batch into one plan and executes it:
//! tag invalidation first, then direct key forgets.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::invalidation::{InvalidationReport, InvalidationRequest, TagInvalidator};
use super::planner::InvalidationPlan;
use super::policy::PolicyRegistry;
use super::service::CacheService;

pub const METRIC_CONSUME_MS: &str = "tenancy_cache_consume_ms";

/// What one consumption pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub events: usize,
    pub plan: InvalidationPlan,
    pub tags: InvalidationReport,
    pub keys_forgotten: usize,
}

pub struct InvalidationConsumer {
    batch_limit: usize,
    queue: Arc<EventQueue>,
    policies: Arc<PolicyRegistry>,
    service: Arc<CacheService>,
    invalidator: TagInvalidator,
}

impl InvalidationConsumer {
    pub fn new(
        config: &CacheConfig,
        queue: Arc<EventQueue>,
        policies: Arc<PolicyRegistry>,
        service: Arc<CacheService>,
    ) -> Self {
        Self {
            batch_limit: config.consume_batch_limit.max(1),
            queue,
            policies,
            invalidator: TagInvalidator::new(service.clone()),
            service,
        }
    }

    /// Consume one batch of pending events.
    ///
    /// Returns `None` when the queue was empty.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> Option<ConsumeOutcome> {
        let started_at = Instant::now();
        let events = self.queue.drain(self.batch_limit);
        if events.is_empty() {
            return None;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events, &self.policies);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache invalidation starting"
        );

        let tags = match InvalidationRequest::new(plan.tags.iter().cloned()) {
            Ok(request) => self.invalidator.invalidate(&request).await,
            Err(_) => InvalidationReport::default(),
        };

        let mut keys_forgotten = 0;
        for key in &plan.forget_keys {
            if self.service.forget(key).await {
                keys_forgotten += 1;
            }
        }

        info!(
            event_count,
            keys_removed = tags.keys_removed,
            keys_forgotten,
            failures = tags.failures,
            "Cache invalidation complete"
        );
        histogram!(METRIC_CONSUME_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        Some(ConsumeOutcome {
            events: event_count,
            plan,
            tags,
            keys_forgotten,
        })
    }

    /// Consume batches until the queue is empty. Returns the number of events.
    pub async fn consume_all(&self) -> usize {
        let mut total = 0;
        while let Some(outcome) = self.consume().await {
            total += outcome.events;
        }
        total
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}

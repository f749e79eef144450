//! Entity mutation events.
//!
//! Write paths publish one event per mutation; the consumer drains them in
//! batches and turns them into a single invalidation plan.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::lock::mutex_lock;
use crate::domain::{ChecklistId, Mission, UserId};

const SOURCE: &str = "cache::events";
pub const METRIC_EVENT_QUEUE_LEN: &str = "tenancy_cache_event_queue_len";

/// Monotonic sequence number assigned at publish time.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier, used to drop duplicate deliveries.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Mutations that make cached reads stale.
///
/// Each variant carries just enough identity to derive the affected tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    UserUpdated { user_id: UserId },
    MissionUpdated { mission: Mission },
    /// The checklist's parent mission is carried along so that its
    /// assignees can be resolved without a lookup.
    ChecklistUpdated {
        checklist_id: ChecklistId,
        mission: Mission,
    },
    RoleUpdated { role: String },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserUpdated { .. } => "user_updated",
            Self::MissionUpdated { .. } => "mission_updated",
            Self::ChecklistUpdated { .. } => "checklist_updated",
            Self::RoleUpdated { .. } => "role_updated",
        }
    }
}

/// In-memory FIFO of pending events.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) -> Uuid {
        let event = CacheEvent::new(kind, self.next_epoch());
        let id = event.id;

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = event.kind.name(),
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        id
    }

    /// Re-enqueue an event that was already published elsewhere.
    ///
    /// Keeps its id so the planner can drop the duplicate.
    pub fn redeliver(&self, event: CacheEvent) {
        let mut queue = mutex_lock(&self.queue, SOURCE, "redeliver");
        queue.push_back(event);
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Remove up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let batch = queue.drain(..count).collect();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        batch
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(0.0);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn role(name: &str) -> EventKind {
        EventKind::RoleUpdated {
            role: name.to_string(),
        }
    }

    #[test]
    fn events_get_unique_ids() {
        let a = CacheEvent::new(EventKind::UserUpdated { user_id: 1 }, 0);
        let b = CacheEvent::new(EventKind::UserUpdated { user_id: 1 }, 1);

        assert_ne!(a.id, b.id);
        assert!(!a.id.is_nil());
    }

    #[test]
    fn epochs_increase() {
        let queue = EventQueue::new();
        let first = queue.next_epoch();
        let second = queue.next_epoch();
        assert!(first < second);
    }

    #[test]
    fn drain_is_fifo_and_bounded() {
        let queue = EventQueue::new();
        queue.publish(EventKind::UserUpdated { user_id: 1 });
        queue.publish(EventKind::MissionUpdated {
            mission: Mission::new(2),
        });
        queue.publish(role("ops"));

        let batch = queue.drain(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].kind, EventKind::UserUpdated { user_id: 1 });
        assert_eq!(batch[0].kind.name(), "user_updated");
        assert_eq!(batch[1].kind.name(), "mission_updated");
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn redelivery_keeps_the_id() {
        let queue = EventQueue::new();
        let id = queue.publish(role("admin"));
        let event = queue.drain(1).remove(0);

        queue.redeliver(event.clone());
        queue.redeliver(event);

        let batch = queue.drain(10);
        assert!(batch.iter().all(|event| event.id == id));
    }

    #[test]
    fn events_serialize_with_their_name() {
        let json = serde_json::to_value(role("checker")).expect("serialize");
        assert_eq!(json["event"], "role_updated");
        assert_eq!(json["role"], "checker");
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = EventQueue::new();
        queue.publish(role("ops"));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(role("ops"));
        assert_eq!(queue.len(), 1);
    }
}

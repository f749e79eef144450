//! Tenancy cache layer.
//!
//! Keyed and tagged cache entries in front of the system of record:
//!
//! - **Policies** map a data category to its TTL and key template
//! - **Remember** computes on miss, reuses on hit, and falls back to the
//!   producer whenever the store fails
//! - **Tags** group entries so a mutation purges every dependent read
//! - **Triggers** turn entity mutations into invalidation plans
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `tenancy-cache.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! store_timeout_ms = 250
//! memory_capacity = 10000
//!
//! [cache.policies.mission_list]
//! ttl_seconds = 120
//! ```

mod clock;
mod config;
mod consumer;
mod context;
mod error;
mod events;
mod facades;
mod invalidation;
mod keys;
mod lock;
mod planner;
mod policy;
mod registry;
mod service;
mod store;
mod tags;
mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use consumer::{ConsumeOutcome, InvalidationConsumer};
pub use context::CacheContext;
pub use error::CacheError;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use facades::DomainCache;
pub use invalidation::{InvalidationReport, InvalidationRequest, TagInvalidator};
pub use keys::MissionFilters;
pub use planner::InvalidationPlan;
pub use policy::{CachePolicy, DEFAULT_TTL, KeyRenderMode, PolicyOverride, PolicyRegistry, category};
pub use registry::TagIndex;
pub use service::CacheService;
pub use store::{CacheStore, MemoryStore};
pub use tags::Tag;
pub use trigger::CacheTrigger;

/// Metric names emitted by the cache layer.
pub mod metric {
    pub use super::consumer::METRIC_CONSUME_MS as CONSUME_MS;
    pub use super::events::METRIC_EVENT_QUEUE_LEN as EVENT_QUEUE_LEN;
    pub use super::invalidation::METRIC_INVALIDATED_KEYS as INVALIDATED_KEYS;
    pub use super::service::{
        METRIC_DEGRADED as DEGRADED, METRIC_HIT as HIT, METRIC_MISS as MISS,
        METRIC_STORE_ERROR as STORE_ERROR,
    };
    pub use super::store::METRIC_MEMORY_EVICT as MEMORY_EVICT;
}

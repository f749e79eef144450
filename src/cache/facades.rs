//! Domain cache façades.
//!
//! Each method names one cached read of the application. It renders the key
//! and TTL from the policy registry, attaches the tags derived from the
//! entity identity, and hands the caller's producer to the remember engine.
//! Nothing else happens here.
//!
//! Producer error types must accept a [`CacheError`] so that an unresolved
//! key template in strict mode can surface through the same `Result`.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use time::Date;

use super::error::CacheError;
use super::keys::MissionFilters;
use super::policy::{PolicyRegistry, category};
use super::service::CacheService;
use super::tags::Tag;
use crate::domain::{BailMobiliteId, ChecklistId, MissionId, UserId, UserRoles};

pub struct DomainCache {
    service: Arc<CacheService>,
    policies: Arc<PolicyRegistry>,
}

impl DomainCache {
    pub fn new(service: Arc<CacheService>, policies: Arc<PolicyRegistry>) -> Self {
        Self { service, policies }
    }

    pub fn service(&self) -> &Arc<CacheService> {
        &self.service
    }

    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    async fn cached<T, E, F, Fut>(
        &self,
        category: &str,
        params: &[(&str, &str)],
        tags: Vec<Tag>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.policies.render_key(category, params)?;
        let ttl = self.policies.ttl(category);
        self.service
            .remember_with_tags(&key, &tags, ttl, producer)
            .await
    }

    pub async fn dashboard_stats<T, E, F, Fut>(&self, user_id: UserId, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = user_id.to_string();
        self.cached(
            category::DASHBOARD_STATS,
            &[("id", id.as_str())],
            vec![Tag::dashboard(), Tag::stats(), Tag::user(user_id)],
            producer,
        )
        .await
    }

    /// Mission list keyed by the stable hash of its filters.
    pub async fn mission_list<T, E, F, Fut>(
        &self,
        filters: &MissionFilters,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let hash = filters.stable_hash();
        self.cached(
            category::MISSION_LIST,
            &[("hash", hash.as_str())],
            vec![Tag::missions()],
            producer,
        )
        .await
    }

    pub async fn mission_details<T, E, F, Fut>(
        &self,
        mission_id: MissionId,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = mission_id.to_string();
        self.cached(
            category::MISSION_DETAILS,
            &[("id", id.as_str())],
            vec![Tag::missions(), Tag::mission(mission_id)],
            producer,
        )
        .await
    }

    /// Per-user mission summary. Only updates to missions the user is
    /// assigned to reach it, through the per-assignee tag.
    pub async fn mission_summary<T, E, F, Fut>(&self, user_id: UserId, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = user_id.to_string();
        self.cached(
            category::MISSION_SUMMARY,
            &[("id", id.as_str())],
            vec![Tag::mission_summary(user_id)],
            producer,
        )
        .await
    }

    pub async fn bail_mobilite_details<T, E, F, Fut>(
        &self,
        bail_mobilite_id: BailMobiliteId,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = bail_mobilite_id.to_string();
        self.cached(
            category::BAIL_MOBILITE_DETAILS,
            &[("id", id.as_str())],
            vec![Tag::bail_mobilites(), Tag::bail_mobilite(bail_mobilite_id)],
            producer,
        )
        .await
    }

    pub async fn calendar_events<T, E, F, Fut>(&self, date: Date, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let day = date.to_string();
        self.cached(
            category::CALENDAR_EVENTS,
            &[("date", day.as_str())],
            vec![Tag::calendar(), Tag::date(date)],
            producer,
        )
        .await
    }

    pub async fn checklist_details<T, E, F, Fut>(
        &self,
        checklist_id: ChecklistId,
        mission_id: MissionId,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = checklist_id.to_string();
        self.cached(
            category::CHECKLIST_DETAILS,
            &[("id", id.as_str())],
            vec![
                Tag::checklists(),
                Tag::checklist(checklist_id),
                Tag::mission(mission_id),
            ],
            producer,
        )
        .await
    }

    /// Effective permissions of a user, tagged with every role they hold.
    pub async fn user_permissions<T, E, F, Fut>(
        &self,
        user: &UserRoles,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = user.user_id.to_string();
        let mut tags = vec![Tag::permissions(), Tag::user(user.user_id)];
        tags.extend(user.roles.iter().map(|role| Tag::role(role)));
        self.cached(category::USER_PERMISSIONS, &[("id", id.as_str())], tags, producer)
            .await
    }

    pub async fn user_roles<T, E, F, Fut>(&self, user_id: UserId, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = user_id.to_string();
        self.cached(
            category::USER_ROLES,
            &[("id", id.as_str())],
            vec![Tag::user(user_id)],
            producer,
        )
        .await
    }

    pub async fn role_permissions<T, E, F, Fut>(&self, role: &str, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cached(
            category::ROLE_PERMISSIONS,
            &[("role", role)],
            vec![Tag::role(role)],
            producer,
        )
        .await
    }

    pub async fn notifications<T, E, F, Fut>(&self, user_id: UserId, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = user_id.to_string();
        self.cached(
            category::NOTIFICATIONS,
            &[("id", id.as_str())],
            vec![Tag::notifications(), Tag::user(user_id)],
            producer,
        )
        .await
    }
}

//! Invalidation plan generation.
//!
//! A fixed dispatch table from event kind to the tags and keys it makes
//! stale. A batch of events is merged into one plan so that a tag touched by
//! many events is purged once.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::events::{CacheEvent, EventKind};
use super::policy::{PolicyRegistry, category};
use super::tags::Tag;
use crate::domain::Mission;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationPlan {
    /// Tags to purge through the tag invalidator.
    pub tags: BTreeSet<Tag>,
    /// Keys forgotten directly, for entries addressed by key rather than tag.
    pub forget_keys: BTreeSet<String>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ tags: {}, forget_keys: {} }}",
            self.tags.len(),
            self.forget_keys.len()
        )
    }
}

impl InvalidationPlan {
    /// Merge a batch of events, skipping any event id already seen.
    pub fn from_events(events: Vec<CacheEvent>, policies: &PolicyRegistry) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            plan.add(&event.kind, policies);
        }

        plan
    }

    /// Plan for a single event.
    pub fn for_event(kind: &EventKind, policies: &PolicyRegistry) -> Self {
        let mut plan = Self::default();
        plan.add(kind, policies);
        plan
    }

    fn add(&mut self, kind: &EventKind, policies: &PolicyRegistry) {
        match kind {
            EventKind::UserUpdated { user_id } => {
                self.tags.insert(Tag::user(*user_id));
                self.tags.insert(Tag::dashboard());
                self.tags.insert(Tag::notifications());

                let id = user_id.to_string();
                self.forget(policies, category::USER_PERMISSIONS, &[("id", id.as_str())]);
                self.forget(policies, category::USER_ROLES, &[("id", id.as_str())]);
            }
            EventKind::MissionUpdated { mission } => self.add_mission(mission),
            EventKind::ChecklistUpdated {
                checklist_id,
                mission,
            } => {
                self.add_mission(mission);
                self.tags.insert(Tag::checklists());
                self.tags.insert(Tag::checklist(*checklist_id));
            }
            EventKind::RoleUpdated { role } => {
                // Permission entries of every user holding the role carry this tag.
                self.tags.insert(Tag::role(role));
                self.forget(policies, category::ROLE_PERMISSIONS, &[("role", role.as_str())]);
            }
        }
    }

    fn add_mission(&mut self, mission: &Mission) {
        self.tags.insert(Tag::missions());
        self.tags.insert(Tag::mission(mission.id));
        self.tags.insert(Tag::dashboard());
        self.tags.insert(Tag::calendar());
        for user_id in mission.assignees() {
            self.tags.insert(Tag::mission_summary(user_id));
        }
    }

    fn forget(&mut self, policies: &PolicyRegistry, category: &str, params: &[(&str, &str)]) {
        match policies.render_key(category, params) {
            Ok(key) => {
                self.forget_keys.insert(key);
            }
            Err(err) => {
                warn!(category, error = %err, "Key left out of invalidation plan");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.forget_keys.is_empty()
    }
}

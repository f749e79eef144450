//! Typed cache tags.
//!
//! Tags group cache entries so that a whole family can be purged without
//! knowing the individual keys. Constructors keep the string forms stable
//! (`user_42`, `mission_7`, `date_2024-05-01`, ...) because stores without
//! native tag support index entries by these exact strings.

use std::fmt;

use serde::Serialize;
use time::Date;

use crate::domain::{BailMobiliteId, ChecklistId, MissionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Build a tag from an arbitrary label.
    ///
    /// Prefer the typed constructors below; this exists for store adapters
    /// and administrative tooling that receive labels from the outside.
    pub fn named(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Collection tags

    pub fn dashboard() -> Self {
        Self::named("dashboard")
    }

    pub fn stats() -> Self {
        Self::named("stats")
    }

    pub fn missions() -> Self {
        Self::named("missions")
    }

    pub fn calendar() -> Self {
        Self::named("calendar")
    }

    pub fn notifications() -> Self {
        Self::named("notifications")
    }

    pub fn checklists() -> Self {
        Self::named("checklists")
    }

    pub fn bail_mobilites() -> Self {
        Self::named("bail_mobilites")
    }

    pub fn permissions() -> Self {
        Self::named("permissions")
    }

    // Entity tags

    pub fn user(id: UserId) -> Self {
        Self(format!("user_{id}"))
    }

    pub fn mission(id: MissionId) -> Self {
        Self(format!("mission_{id}"))
    }

    /// Mission summaries are scoped per assignee.
    pub fn mission_summary(user_id: UserId) -> Self {
        Self(format!("mission_summary_{user_id}"))
    }

    pub fn bail_mobilite(id: BailMobiliteId) -> Self {
        Self(format!("bail_mobilite_{id}"))
    }

    pub fn checklist(id: ChecklistId) -> Self {
        Self(format!("checklist_{id}"))
    }

    pub fn date(date: Date) -> Self {
        Self(format!("date_{date}"))
    }

    pub fn role(name: &str) -> Self {
        Self(format!("role_{name}"))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

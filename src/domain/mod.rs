//! Domain references consumed by the cache layer.
//!
//! Persistence owns the real models; the cache only needs their identities
//! and the relationships that drive invalidation.

pub mod entities;

pub use entities::{Checklist, Mission, UserRoles};

pub type UserId = i64;
pub type MissionId = i64;
pub type ChecklistId = i64;
pub type BailMobiliteId = i64;

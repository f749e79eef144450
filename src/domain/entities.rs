//! Identity snapshots of persisted entities.

use serde::{Deserialize, Serialize};

use super::{ChecklistId, MissionId, UserId};

/// A mission and the users assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub checker_id: Option<UserId>,
    pub ops_id: Option<UserId>,
    pub admin_id: Option<UserId>,
}

impl Mission {
    pub fn new(id: MissionId) -> Self {
        Self {
            id,
            checker_id: None,
            ops_id: None,
            admin_id: None,
        }
    }

    pub fn with_checker(mut self, user_id: UserId) -> Self {
        self.checker_id = Some(user_id);
        self
    }

    pub fn with_ops(mut self, user_id: UserId) -> Self {
        self.ops_id = Some(user_id);
        self
    }

    pub fn with_admin(mut self, user_id: UserId) -> Self {
        self.admin_id = Some(user_id);
        self
    }

    /// Assigned users in checker, ops, admin order, duplicates removed.
    pub fn assignees(&self) -> Vec<UserId> {
        let mut ids = Vec::with_capacity(3);
        for id in [self.checker_id, self.ops_id, self.admin_id]
            .into_iter()
            .flatten()
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// A checklist together with its parent mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub mission: Mission,
}

/// A user and the names of the roles they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoles {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

impl UserRoles {
    pub fn new(user_id: UserId, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

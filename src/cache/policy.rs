//! Cache policy registry.
//!
//! Maps a data category (`user_permissions`, `mission_list`, ...) to its TTL
//! and key template. This is the single source of truth for cache lifetimes
//! and key shapes; façades never hard-code either.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tracing::warn;

use super::error::CacheError;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::policy";

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_KEY_TEMPLATE: &str = "cache_{type}_{id}";

/// Category names with a built-in policy.
pub mod category {
    pub const DASHBOARD_STATS: &str = "dashboard_stats";
    pub const MISSION_LIST: &str = "mission_list";
    pub const MISSION_DETAILS: &str = "mission_details";
    pub const MISSION_SUMMARY: &str = "mission_summary";
    pub const BAIL_MOBILITE_DETAILS: &str = "bail_mobilite_details";
    pub const CALENDAR_EVENTS: &str = "calendar_events";
    pub const CHECKLIST_DETAILS: &str = "checklist_details";
    pub const USER_PERMISSIONS: &str = "user_permissions";
    pub const USER_ROLES: &str = "user_roles";
    pub const ROLE_PERMISSIONS: &str = "role_permissions";
    pub const NOTIFICATIONS: &str = "notifications";
}

const BUILTIN_POLICIES: &[(&str, u64, &str)] = &[
    (category::DASHBOARD_STATS, 30 * 60, "dashboard_stats_{id}"),
    (category::MISSION_LIST, 5 * 60, "missions_list_{hash}"),
    (category::MISSION_DETAILS, 30 * 60, "mission_details_{id}"),
    (category::MISSION_SUMMARY, 15 * 60, "mission_summary_{id}"),
    (category::BAIL_MOBILITE_DETAILS, 30 * 60, "bail_mobilite_{id}"),
    (category::CALENDAR_EVENTS, 30 * 60, "calendar_events_{date}"),
    (category::CHECKLIST_DETAILS, 30 * 60, "checklist_details_{id}"),
    (category::USER_PERMISSIONS, 60 * 60, "user_permissions_{id}"),
    (category::USER_ROLES, 60 * 60, "user_roles_{id}"),
    (category::ROLE_PERMISSIONS, 60 * 60, "role_permissions_{role}"),
    (category::NOTIFICATIONS, 5 * 60, "notifications_{id}"),
];

/// What to do when a key template names a parameter the caller did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRenderMode {
    /// Fail with `UnresolvedKeyTemplate`. Used in development.
    Strict,
    /// Leave the literal `{placeholder}` in the key and log a warning.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub key_template: String,
}

impl CachePolicy {
    pub fn new(ttl: Duration, key_template: impl Into<String>) -> Self {
        Self {
            ttl,
            key_template: key_template.into(),
        }
    }
}

/// Override for a single category; unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOverride {
    pub ttl: Option<Duration>,
    pub key_template: Option<String>,
}

pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, CachePolicy>>,
    fallback: CachePolicy,
    mode: KeyRenderMode,
}

impl PolicyRegistry {
    /// Registry with the built-in policy table.
    pub fn new(mode: KeyRenderMode) -> Self {
        Self::with_default_ttl(mode, DEFAULT_TTL)
    }

    /// Registry whose fallback policy for unknown categories uses `default_ttl`.
    pub fn with_default_ttl(mode: KeyRenderMode, default_ttl: Duration) -> Self {
        let policies = BUILTIN_POLICIES
            .iter()
            .map(|(name, ttl_secs, template)| {
                (
                    (*name).to_string(),
                    CachePolicy::new(Duration::from_secs(*ttl_secs), *template),
                )
            })
            .collect();

        Self {
            policies: RwLock::new(policies),
            fallback: CachePolicy::new(default_ttl, DEFAULT_KEY_TEMPLATE),
            mode,
        }
    }

    pub fn mode(&self) -> KeyRenderMode {
        self.mode
    }

    /// Policy for `category`, or the fallback policy if none is registered.
    pub fn policy(&self, category: &str) -> CachePolicy {
        rw_read(&self.policies, SOURCE, "policy")
            .get(category)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn ttl(&self, category: &str) -> Duration {
        self.policy(category).ttl
    }

    pub fn is_registered(&self, category: &str) -> bool {
        rw_read(&self.policies, SOURCE, "is_registered").contains_key(category)
    }

    /// Administrative override; replaces the whole policy for `category`.
    pub fn set_policy(&self, category: impl Into<String>, policy: CachePolicy) {
        rw_write(&self.policies, SOURCE, "set_policy").insert(category.into(), policy);
    }

    /// Merge a partial override onto the current (or fallback) policy.
    pub fn apply_override(&self, category: &str, update: &PolicyOverride) {
        let mut policy = self.policy(category);
        if let Some(ttl) = update.ttl {
            policy.ttl = ttl;
        }
        if let Some(template) = &update.key_template {
            policy.key_template = template.clone();
        }
        self.set_policy(category, policy);
    }

    /// Registered policies sorted by category name.
    pub fn categories(&self) -> Vec<(String, CachePolicy)> {
        let mut entries: Vec<_> = rw_read(&self.policies, SOURCE, "categories")
            .iter()
            .map(|(name, policy)| (name.clone(), policy.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Render the key for `category` by substituting `{name}` placeholders.
    ///
    /// `{type}` resolves to the category name unless the caller passes it.
    pub fn render_key(&self, category: &str, params: &[(&str, &str)]) -> Result<String, CacheError> {
        let policy = self.policy(category);
        render_template(category, &policy.key_template, params, self.mode)
    }
}

fn render_template(
    category: &str,
    template: &str,
    params: &[(&str, &str)],
    mode: KeyRenderMode,
) -> Result<String, CacheError> {
    let mut key = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        key.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            // Unbalanced brace: keep the remainder verbatim.
            key.push_str(&rest[open..]);
            return Ok(key);
        };

        let name = &after_open[..close];
        let value = params
            .iter()
            .find(|(param, _)| *param == name)
            .map(|(_, value)| *value)
            .or_else(|| (name == "type").then_some(category));

        match (value, mode) {
            (Some(value), _) => key.push_str(value),
            (None, KeyRenderMode::Strict) => {
                return Err(CacheError::UnresolvedKeyTemplate {
                    category: category.to_string(),
                    placeholder: name.to_string(),
                });
            }
            (None, KeyRenderMode::Lenient) => {
                warn!(
                    category,
                    placeholder = name,
                    "Cache key template left unresolved"
                );
                key.push('{');
                key.push_str(name);
                key.push('}');
            }
        }

        rest = &after_open[close + 1..];
    }

    key.push_str(rest);
    Ok(key)
}

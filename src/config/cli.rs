use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::cache::EventKind;
use crate::domain::{ChecklistId, Mission, MissionId, UserId};

/// Command-line arguments for the tenancy-cache binary.
#[derive(Debug, Parser)]
#[command(
    name = "tenancy-cache",
    version,
    about = "Inspect cache policies, keys and invalidation plans"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TENANCY_CACHE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the effective policy table, one JSON object per line.
    Policies,
    /// Render the cache key of a category.
    #[command(name = "render-key")]
    RenderKey(RenderKeyArgs),
    /// Show the tags and keys an entity event would purge.
    Plan(PlanArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderKeyArgs {
    /// Policy category, e.g. `user_permissions`.
    #[arg(value_name = "CATEGORY")]
    pub category: String,

    /// Template parameter as `name=value`; repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Args, Clone)]
pub struct PlanArgs {
    #[command(subcommand)]
    pub event: PlanEvent,
}

#[derive(Debug, Subcommand, Clone)]
pub enum PlanEvent {
    #[command(name = "user-updated")]
    UserUpdated {
        #[arg(long = "user-id", value_name = "ID")]
        user_id: UserId,
    },
    #[command(name = "mission-updated")]
    MissionUpdated(MissionArgs),
    #[command(name = "checklist-updated")]
    ChecklistUpdated {
        #[arg(long = "checklist-id", value_name = "ID")]
        checklist_id: ChecklistId,
        #[command(flatten)]
        mission: MissionArgs,
    },
    #[command(name = "role-updated")]
    RoleUpdated {
        #[arg(long = "role", value_name = "NAME")]
        role: String,
    },
}

impl PlanEvent {
    pub fn to_event(&self) -> EventKind {
        match self {
            Self::UserUpdated { user_id } => EventKind::UserUpdated { user_id: *user_id },
            Self::MissionUpdated(mission) => EventKind::MissionUpdated {
                mission: mission.to_mission(),
            },
            Self::ChecklistUpdated {
                checklist_id,
                mission,
            } => EventKind::ChecklistUpdated {
                checklist_id: *checklist_id,
                mission: mission.to_mission(),
            },
            Self::RoleUpdated { role } => EventKind::RoleUpdated { role: role.clone() },
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct MissionArgs {
    #[arg(long = "mission-id", value_name = "ID")]
    pub mission_id: MissionId,

    #[arg(long = "checker-id", value_name = "ID")]
    pub checker_id: Option<UserId>,

    #[arg(long = "ops-id", value_name = "ID")]
    pub ops_id: Option<UserId>,

    #[arg(long = "admin-id", value_name = "ID")]
    pub admin_id: Option<UserId>,
}

impl MissionArgs {
    pub fn to_mission(&self) -> Mission {
        Mission {
            id: self.mission_id,
            checker_id: self.checker_id,
            ops_id: self.ops_id,
            admin_id: self.admin_id,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the deployment environment (development|production).
    #[arg(long = "environment", value_name = "ENV", global = true)]
    pub environment: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Toggle caching altogether.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the per-call store timeout.
    #[arg(long = "cache-store-timeout-ms", value_name = "MILLIS", global = true)]
    pub cache_store_timeout_ms: Option<u64>,

    /// Fail on unresolved key placeholders instead of keeping them.
    #[arg(
        long = "cache-strict-keys",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_strict_keys: Option<bool>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name is empty in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

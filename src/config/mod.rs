//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::PolicyOverride;

mod cli;

pub use cli::{CliArgs, Command, GlobalOverrides, MissionArgs, PlanArgs, PlanEvent, RenderKeyArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tenancy-cache";
const ENV_PREFIX: &str = "TENANCY_CACHE";
const DEFAULT_TTL_SECS: u64 = 1800;
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 250;
const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_CONSUME_BATCH_LIMIT: u64 = 100;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: DeploymentEnvironment,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEnvironment {
    Development,
    Production,
}

impl FromStr for DeploymentEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub store_timeout: Duration,
    pub memory_capacity: NonZeroUsize,
    pub native_tags: bool,
    pub consume_batch_limit: NonZeroUsize,
    pub strict_keys: bool,
    pub policies: BTreeMap<String, PolicyOverride>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    environment: Option<String>,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(environment) = overrides.environment.as_ref() {
            self.environment = Some(environment.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(timeout) = overrides.cache_store_timeout_ms {
            self.cache.store_timeout_ms = Some(timeout);
        }
        if let Some(strict) = overrides.cache_strict_keys {
            self.cache.strict_keys = Some(strict);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            environment,
            logging,
            cache,
        } = raw;

        let environment = match environment {
            Some(value) => DeploymentEnvironment::from_str(&value)
                .map_err(|reason| LoadError::invalid("environment", reason))?,
            None => DeploymentEnvironment::Development,
        };
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache, environment)?;

        Ok(Self {
            environment,
            logging,
            cache,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(
    cache: RawCacheSettings,
    environment: DeploymentEnvironment,
) -> Result<CacheSettings, LoadError> {
    let default_ttl = ttl_from_seconds(
        cache.default_ttl_seconds.unwrap_or(DEFAULT_TTL_SECS),
        "cache.default_ttl_seconds".to_string(),
    )?;

    let store_timeout_ms = cache.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS);
    if store_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.store_timeout_ms",
            "must be greater than zero",
        ));
    }

    let memory_capacity = non_zero_usize(
        cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;
    let consume_batch_limit = non_zero_usize(
        cache
            .consume_batch_limit
            .unwrap_or(DEFAULT_CONSUME_BATCH_LIMIT),
        "cache.consume_batch_limit",
    )?;

    let mut policies = BTreeMap::new();
    for (category, policy) in cache.policies {
        let category = category.trim().to_string();
        if category.is_empty() {
            return Err(LoadError::invalid(
                "cache.policies",
                "category name must not be empty",
            ));
        }
        policies.insert(category.clone(), build_policy_override(&category, policy)?);
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        default_ttl,
        store_timeout: Duration::from_millis(store_timeout_ms),
        memory_capacity,
        native_tags: cache.native_tags.unwrap_or(false),
        consume_batch_limit,
        strict_keys: cache
            .strict_keys
            .unwrap_or(environment == DeploymentEnvironment::Development),
        policies,
    })
}

fn build_policy_override(
    category: &str,
    policy: RawPolicySettings,
) -> Result<PolicyOverride, LoadError> {
    let ttl = policy
        .ttl_seconds
        .map(|seconds| {
            ttl_from_seconds(seconds, format!("cache.policies.{category}.ttl_seconds"))
        })
        .transpose()?;

    let key_template = match policy.key_template {
        Some(template) if template.trim().is_empty() => {
            return Err(LoadError::invalid(
                format!("cache.policies.{category}.key_template"),
                "template must not be empty",
            ));
        }
        other => other,
    };

    Ok(PolicyOverride { ttl, key_template })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    default_ttl_seconds: Option<u64>,
    store_timeout_ms: Option<u64>,
    memory_capacity: Option<u64>,
    native_tags: Option<bool>,
    consume_batch_limit: Option<u64>,
    strict_keys: Option<bool>,
    policies: BTreeMap<String, RawPolicySettings>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPolicySettings {
    ttl_seconds: Option<u64>,
    key_template: Option<String>,
}

fn ttl_from_seconds(seconds: u64, key: String) -> Result<Duration, LoadError> {
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    if seconds > MAX_TTL_SECS {
        return Err(LoadError::invalid(
            key,
            format!("must not exceed {MAX_TTL_SECS} seconds"),
        ));
    }
    Ok(Duration::from_secs(seconds))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;

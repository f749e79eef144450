use config::FileFormat;

use super::*;

fn raw_from_toml(sources: &[&str]) -> RawSettings {
    let mut builder = Config::builder();
    for source in sources {
        builder = builder.add_source(File::from_str(source, FileFormat::Toml));
    }
    builder
        .build()
        .expect("config builds")
        .try_deserialize()
        .expect("raw settings deserialize")
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.environment, DeploymentEnvironment::Development);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(1800));
    assert_eq!(settings.cache.store_timeout, Duration::from_millis(250));
    assert_eq!(settings.cache.memory_capacity.get(), 10_000);
    assert_eq!(settings.cache.consume_batch_limit.get(), 100);
    assert!(settings.cache.policies.is_empty());
}

#[test]
fn strict_keys_follow_environment_unless_set() {
    let development = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert!(development.cache.strict_keys);

    let mut raw = RawSettings {
        environment: Some("production".to_string()),
        ..Default::default()
    };
    let production = Settings::from_raw(raw.clone()).expect("valid settings");
    assert!(!production.cache.strict_keys);

    raw.cache.strict_keys = Some(true);
    let forced = Settings::from_raw(raw).expect("valid settings");
    assert!(forced.cache.strict_keys);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_from_toml(&["[cache]\nstore_timeout_ms = 500\nenabled = true\n"]);

    let overrides = GlobalOverrides {
        cache_store_timeout_ms: Some(40),
        cache_enabled: Some(false),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_global_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.store_timeout, Duration::from_millis(40));
    assert!(!settings.cache.enabled);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn later_files_override_earlier_ones() {
    let raw = raw_from_toml(&[
        "[cache]\nmemory_capacity = 50\nnative_tags = false\n",
        "[cache]\nnative_tags = true\n",
    ]);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.memory_capacity.get(), 50);
    assert!(settings.cache.native_tags);
}

#[test]
fn policy_overrides_are_parsed() {
    let raw = raw_from_toml(&[r#"
[cache.policies.mission_list]
ttl_seconds = 120

[cache.policies.notifications]
key_template = "notifications_v2_{id}"
"#]);
    let settings = Settings::from_raw(raw).expect("valid settings");

    let mission_list = &settings.cache.policies["mission_list"];
    assert_eq!(mission_list.ttl, Some(Duration::from_secs(120)));
    assert_eq!(mission_list.key_template, None);

    let notifications = &settings.cache.policies["notifications"];
    assert_eq!(notifications.ttl, None);
    assert_eq!(
        notifications.key_template.as_deref(),
        Some("notifications_v2_{id}")
    );
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { ref key, .. }) if key == "cache.default_ttl_seconds"
    ));

    let mut raw = RawSettings::default();
    raw.cache.memory_capacity = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let raw = raw_from_toml(&["[cache.policies.user_roles]\nttl_seconds = 0\n"]);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { ref key, .. }) if key == "cache.policies.user_roles.ttl_seconds"
    ));
}

#[test]
fn oversized_ttls_are_rejected() {
    let raw = raw_from_toml(&["[cache.policies.mission_list]\nttl_seconds = 1000000000000\n"]);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { ref key, .. }) if key == "cache.policies.mission_list.ttl_seconds"
    ));

    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(MAX_TTL_SECS + 1);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { ref key, .. }) if key == "cache.default_ttl_seconds"
    ));

    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(MAX_TTL_SECS);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(MAX_TTL_SECS));
}

#[test]
fn unknown_environment_is_rejected() {
    let raw = RawSettings {
        environment: Some("staging".to_string()),
        ..Default::default()
    };
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_global_overrides(&GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn command_is_optional() {
    let args = CliArgs::parse_from(["tenancy-cache"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_render_key_arguments() {
    let args = CliArgs::parse_from([
        "tenancy-cache",
        "render-key",
        "user_permissions",
        "--param",
        "id=42",
        "--param",
        " tenant = acme ",
    ]);

    match args.command.expect("render-key command") {
        Command::RenderKey(render) => {
            assert_eq!(render.category, "user_permissions");
            assert_eq!(
                render.params,
                vec![
                    ("id".to_string(), "42".to_string()),
                    ("tenant".to_string(), "acme".to_string()),
                ]
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn malformed_param_is_rejected() {
    let result = CliArgs::try_parse_from(["tenancy-cache", "render-key", "x", "--param", "id"]);
    assert!(result.is_err());
}

#[test]
fn parse_plan_arguments() {
    let args = CliArgs::parse_from([
        "tenancy-cache",
        "plan",
        "checklist-updated",
        "--checklist-id",
        "5",
        "--mission-id",
        "2",
        "--checker-id",
        "7",
        "--cache-strict-keys",
        "false",
    ]);

    assert_eq!(args.overrides.cache_strict_keys, Some(false));
    match args.command.expect("plan command") {
        Command::Plan(plan) => match plan.event {
            PlanEvent::ChecklistUpdated {
                checklist_id,
                mission,
            } => {
                assert_eq!(checklist_id, 5);
                assert_eq!(mission.mission_id, 2);
                assert_eq!(mission.checker_id, Some(7));
                assert_eq!(mission.ops_id, None);
            }
            _ => panic!("wrong event parsed"),
        },
        _ => panic!("wrong command parsed"),
    }
}

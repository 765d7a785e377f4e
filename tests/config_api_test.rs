//! Integration tests for config module public API.

use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use umake::config::{
    apply_layers, load_from_paths, validate, validate_config, ConfigLayer, ConfigPaths,
    UmakeConfig,
};
use umake::requirements::{RetryPolicy, ServiceOptions};

#[test]
fn public_api_is_accessible() {
    let config = UmakeConfig::default();
    assert!(validate(&config).is_ok());
    assert!(ConfigPaths::default().all().is_empty());
}

#[test]
fn user_and_explicit_configs_merge() {
    let temp = TempDir::new().unwrap();
    let user = temp.path().join("user.yml");
    let explicit = temp.path().join("explicit.yml");
    fs::write(
        &user,
        r#"
requirements:
  elevation_command: [sudo, -n]
  reload_retry:
    max_attempts: 4
    initial_delay_ms: 10
"#,
    )
    .unwrap();
    fs::write(
        &explicit,
        r#"
requirements:
  exchange_dir: /var/tmp/umake
  reload_retry:
    max_attempts: 2
"#,
    )
    .unwrap();

    let paths = ConfigPaths {
        user: Some(user),
        explicit: Some(explicit),
    };
    let config = load_from_paths(&paths).unwrap();
    validate(&config).unwrap();

    let settings = &config.requirements;
    assert_eq!(settings.elevation_command, vec!["sudo", "-n"]);
    assert_eq!(settings.reload_retry.max_attempts, 2);
    assert_eq!(settings.reload_retry.initial_delay_ms, 10);

    let options = ServiceOptions::from(settings);
    assert_eq!(
        options.retry,
        RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(16000),
        }
    );
    assert_eq!(
        options.exchange_dir.as_deref(),
        Some(std::path::Path::new("/var/tmp/umake"))
    );
}

#[test]
fn missing_explicit_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let paths = ConfigPaths {
        user: None,
        explicit: Some(temp.path().join("nope.yml")),
    };
    let err = load_from_paths(&paths).unwrap_err();
    assert!(err.to_string().contains("Configuration not found"));
}

#[test]
fn validation_collects_every_problem() {
    let config: UmakeConfig = serde_yaml::from_str(
        r#"
requirements:
  elevation_command: ["pkexec", " "]
  reload_retry:
    max_attempts: 0
    initial_delay_ms: 500
    max_delay_ms: 100
"#,
    )
    .unwrap();

    let rules: Vec<String> = validate_config(&config)
        .into_iter()
        .map(|e| e.rule)
        .collect();
    assert_eq!(
        rules,
        vec![
            "blank-elevation-arg",
            "zero-attempts",
            "inverted-delays"
        ]
    );
}

#[test]
fn later_layer_replaces_elevation_command() {
    let base: ConfigLayer = serde_yaml::from_str(
        "requirements:\n  elevation_command: [sudo, -n, -E]\n  exchange_dir: /var/tmp/umake\n",
    )
    .unwrap();
    let overlay: ConfigLayer =
        serde_yaml::from_str("requirements:\n  elevation_command: [pkexec]\n").unwrap();

    let merged = apply_layers([base, overlay]);
    assert_eq!(merged.requirements.elevation_command, vec!["pkexec"]);
    assert_eq!(
        merged.requirements.exchange_dir.as_deref(),
        Some(std::path::Path::new("/var/tmp/umake"))
    );
}

#[test]
fn unknown_apt_get_setting_has_no_effect() {
    let config: UmakeConfig =
        serde_yaml::from_str("requirements:\n  apt_get: /home/user/bin/apt-get\n").unwrap();
    assert!(validate(&config).is_ok());
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(!yaml.contains("apt_get"));
}

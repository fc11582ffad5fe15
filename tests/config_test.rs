//! Tests for loading [`Config`] from disk and building a gateway from it.

use std::time::Duration;

use heimdall::{Config, Heimdall, HeimdallError};

#[test]
fn load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [model]
        name = "llama3"

        [cache]
        max_entries = 20
        ttl_secs = 120

        [rate_limit]
        requests_per_minute = 10
        burst_size = 2
        "#,
    )
    .unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.cache.max_entries, 20);
    assert_eq!(
        config.cache.to_cache_config().ttl,
        Duration::from_secs(120)
    );
    assert_eq!(config.rate_limit.burst_size, 2);
    // Untouched sections keep their defaults.
    assert_eq!(config.chat_history.max_sessions, 1000);
    assert_eq!(config.generator.max_attempts, 3);
}

#[test]
fn load_rejects_invalid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[cache\nmax_entries = ").unwrap();

    let err = Config::load(Some(path.as_path())).unwrap_err();
    assert!(matches!(err, HeimdallError::Configuration(_)));
}

#[test]
fn load_rejects_wrong_types() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[rate_limit]\nburst_size = \"lots\"\n").unwrap();

    assert!(Config::load(Some(path.as_path())).is_err());
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn empty_file_yields_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.model.name, "default");
    assert!(config.cache.enabled);
    assert!(config.chat_history.enabled);
    assert!(config.rate_limit.enabled);
}

#[tokio::test]
async fn gateway_from_config_applies_sections() {
    let config = Config::from_toml_str(
        r#"
        [model]
        name = "mistral"

        [cache]
        enabled = false

        [rate_limit]
        burst_size = 3

        [security]
        max_prompt_chars = 100

        [generator]
        base_url = "http://127.0.0.1:9"
        max_attempts = 1
        "#,
    )
    .unwrap();

    let gateway = Heimdall::from_config(&config).unwrap();
    assert_eq!(gateway.model(), "mistral");
    assert!(!gateway.response_cache().is_enabled());
    assert_eq!(gateway.limiter().stats().burst_size, 3);

    let health = gateway.health();
    assert_eq!(health.generator, "http");
    assert!(gateway.spawn_maintenance().is_empty());
}

#[tokio::test]
async fn maintenance_tasks_follow_config() {
    let config = Config::from_toml_str(
        r#"
        [cache]
        sweep_interval_secs = 60

        [chat_history]
        sweep_interval_secs = 60

        [rate_limit]
        idle_timeout_secs = 300
        "#,
    )
    .unwrap();

    let gateway = Heimdall::from_config(&config).unwrap();
    let handles = gateway.spawn_maintenance();
    assert_eq!(handles.len(), 3);
    for handle in handles {
        handle.abort();
    }
}

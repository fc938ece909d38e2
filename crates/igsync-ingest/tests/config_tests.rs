//! Environment-driven configuration

use igsync_ingest::config::IngestConfig;
use serial_test::serial;
use std::path::PathBuf;

const VARS: &[&str] = &[
    "INGEST_SEARCH_TAGS",
    "INGEST_FOOD_KEYWORDS",
    "PACING_LOCK_PATH",
    "PACING_LOCK_TIMEOUT_MS",
    "PACING_MIN_SHORT_INTERVAL_SECS",
    "PACING_MAX_SHORT_INTERVAL_SECS",
    "PACING_MIN_LONG_BREAK_SECS",
    "PACING_MAX_LONG_BREAK_SECS",
    "PACING_LONG_BREAK_COUNT",
    "DATABASE_URL",
    "DATABASE_MAX_CONNECTIONS",
    "DATABASE_CONNECT_TIMEOUT",
    "SOURCE_BASE_URL",
    "SOURCE_TIMEOUT_SECS",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();

    let config = IngestConfig::from_env().unwrap();

    assert_eq!(config, IngestConfig::default());
    assert_eq!(config.pacing.lock_path, PathBuf::from(".interval.lock"));
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_env();
    std::env::set_var("INGEST_SEARCH_TAGS", "台北美食, 新竹美食");
    std::env::set_var("INGEST_FOOD_KEYWORDS", "food dessert");
    std::env::set_var("PACING_LOCK_PATH", "/tmp/igsync/.interval.lock");
    std::env::set_var("PACING_MIN_SHORT_INTERVAL_SECS", "5");
    std::env::set_var("PACING_MAX_SHORT_INTERVAL_SECS", "10");
    std::env::set_var("PACING_LONG_BREAK_COUNT", "4");
    std::env::set_var("SOURCE_BASE_URL", "http://gateway.local:9000");

    let config = IngestConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.search_tags, vec!["台北美食", "新竹美食"]);
    assert_eq!(config.food_keywords, vec!["food", "dessert"]);
    assert_eq!(
        config.pacing.lock_path,
        PathBuf::from("/tmp/igsync/.interval.lock")
    );
    assert_eq!(config.pacing.min_short_interval_secs, 5);
    assert_eq!(config.pacing.max_short_interval_secs, 10);
    assert_eq!(config.pacing.long_break_count, 4);
    assert_eq!(config.source.base_url, "http://gateway.local:9000");
}

#[test]
#[serial]
fn test_inverted_interval_is_rejected() {
    clear_env();
    std::env::set_var("PACING_MIN_LONG_BREAK_SECS", "900");
    std::env::set_var("PACING_MAX_LONG_BREAK_SECS", "600");

    let result = IngestConfig::from_env();
    clear_env();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("PACING_MIN_LONG_BREAK_SECS"));
}

#[test]
#[serial]
fn test_zero_long_break_count_is_rejected() {
    clear_env();
    std::env::set_var("PACING_LONG_BREAK_COUNT", "0");

    let result = IngestConfig::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_unparsable_pacing_value_is_rejected() {
    clear_env();
    std::env::set_var("PACING_LONG_BREAK_COUNT", "ten");

    let result = IngestConfig::from_env();
    clear_env();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("PACING_LONG_BREAK_COUNT"));
}

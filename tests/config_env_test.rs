//! Environment variable handling for `Config::load`.

use std::env;
use std::sync::Mutex;

use canvas_sync::{Config, FramingMode};
use tempfile::TempDir;

// Global lock to prevent env var pollution between tests
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "CANVAS_HOST",
    "CANVAS_PORT",
    "CANVAS_WIDTH",
    "CANVAS_HEIGHT",
    "CANVAS_FRAMING",
];

/// Point the config dir at a fresh temp dir and clear overrides.
fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let temp_dir = TempDir::new().unwrap();
    for var in VARS {
        env::remove_var(var);
    }
    env::set_var("CANVAS_CONFIG_DIR", temp_dir.path());
    (temp_dir, guard)
}

#[test]
fn test_load_without_file_uses_defaults() {
    let (_dir, _guard) = setup_test_env();
    assert_eq!(Config::load().unwrap(), Config::default());
}

#[test]
fn test_saved_file_is_loaded_and_env_wins() {
    let (dir, _guard) = setup_test_env();
    let saved = Config {
        host: "relay.local".to_string(),
        port: 4000,
        ..Config::default()
    };
    saved.save().unwrap();
    assert!(dir.path().join("config.json").exists());

    env::set_var("CANVAS_PORT", "4100");
    env::set_var("CANVAS_WIDTH", "1024");
    env::set_var("CANVAS_FRAMING", "string-aware");
    let config = Config::load().unwrap();
    for var in VARS {
        env::remove_var(var);
    }

    assert_eq!(config.host, "relay.local");
    assert_eq!(config.port, 4100);
    assert_eq!(config.width, 1024);
    assert_eq!(config.framing, FramingMode::StringAware);
}

#[test]
fn test_invalid_env_values_are_ignored() {
    let (_dir, _guard) = setup_test_env();
    env::set_var("CANVAS_PORT", "not-a-port");
    env::set_var("CANVAS_FRAMING", "zigzag");
    let config = Config::load().unwrap();
    for var in VARS {
        env::remove_var(var);
    }

    assert_eq!(config.port, Config::default().port);
    assert_eq!(config.framing, FramingMode::Legacy);
}

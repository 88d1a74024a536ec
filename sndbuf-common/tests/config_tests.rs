//! Unit tests for configuration discovery and graceful degradation
//!
//! Covers:
//! - Missing config files do not cause failure
//! - Priority order for config file resolution (CLI > env > user config dir)
//! - Malformed config files are reported, not ignored
//! - Required path resolution (CLI > config > env)
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SNDBUF_TEST_* variables are marked with #[serial].

use serde::Deserialize;
use serial_test::serial;
use sndbuf_common::config::{load_toml_config, resolve_required_path};
use sndbuf_common::{CompiledDefaults, ConfigResolver, Error, LoggingConfig};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, PartialEq)]
struct SampleConfig {
    #[serde(default)]
    input: Option<PathBuf>,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform("sndbuf-test");

    if let Some(path) = defaults.config_file {
        assert!(path.ends_with(Path::new("sndbuf-test").join("config.toml")));
    }
}

#[test]
#[serial]
fn test_resolver_cli_takes_precedence() {
    env::set_var("SNDBUF_TEST_A_CONFIG", "/tmp/from-env.toml");

    let resolver = ConfigResolver::new("sndbuf-test-a");
    let resolved = resolver.resolve(Some(Path::new("/tmp/from-cli.toml")));

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var("SNDBUF_TEST_A_CONFIG");
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var("SNDBUF_TEST_B_CONFIG", "/tmp/from-env.toml");

    let resolver = ConfigResolver::new("sndbuf-test-b");
    let resolved = resolver.resolve(None);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var("SNDBUF_TEST_B_CONFIG");
}

#[test]
#[serial]
fn test_resolver_without_any_source_returns_none() {
    env::remove_var("SNDBUF_NONEXISTENT_TEST_MODULE_12345_CONFIG");

    // No user config file exists for this app name
    let resolver = ConfigResolver::new("sndbuf-nonexistent-test-module-12345");
    assert_eq!(resolver.resolve(None), None);
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let config: SampleConfig =
        load_toml_config(Some(Path::new("/nonexistent/sndbuf/config.toml"))).unwrap();

    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_load_no_path_uses_defaults() {
    let config: SampleConfig = load_toml_config(None).unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.input, None);
}

#[test]
fn test_load_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
        input = "/music/test.ogg"

        [logging]
        level = "debug"
        "#
    )
    .unwrap();

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();

    assert_eq!(config.input, Some(PathBuf::from("/music/test.ogg")));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "input = [unterminated").unwrap();

    let result: sndbuf_common::Result<SampleConfig> = load_toml_config(Some(&path));

    match result {
        Err(Error::ConfigParse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected ConfigParse error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_required_path_priority() {
    env::set_var("SNDBUF_TEST_INPUT", "/tmp/from-env.ogg");

    let cli = resolve_required_path(
        "input",
        Some(PathBuf::from("/tmp/from-cli.ogg")),
        Some(PathBuf::from("/tmp/from-config.ogg")),
        "SNDBUF_TEST_INPUT",
    )
    .unwrap();
    assert_eq!(cli, PathBuf::from("/tmp/from-cli.ogg"));

    let config = resolve_required_path(
        "input",
        None,
        Some(PathBuf::from("/tmp/from-config.ogg")),
        "SNDBUF_TEST_INPUT",
    )
    .unwrap();
    assert_eq!(config, PathBuf::from("/tmp/from-config.ogg"));

    let from_env = resolve_required_path("input", None, None, "SNDBUF_TEST_INPUT").unwrap();
    assert_eq!(from_env, PathBuf::from("/tmp/from-env.ogg"));

    env::remove_var("SNDBUF_TEST_INPUT");
}

#[test]
#[serial]
fn test_required_path_missing_everywhere() {
    env::remove_var("SNDBUF_TEST_INPUT_MISSING");

    let result = resolve_required_path("input", None, None, "SNDBUF_TEST_INPUT_MISSING");
    assert!(matches!(result, Err(Error::Missing(_))));
}

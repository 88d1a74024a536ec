//! Configuration file tests for sndbuf-ap
//!
//! Loads `TomlConfig` through the shared loader the binary uses and checks
//! that section defaults and validation behave as documented.

use sndbuf_ap::audio::TargetSampleFormat;
use sndbuf_ap::config::{InputMode, PlaybackConfig, TomlConfig};
use sndbuf_ap::Error;
use sndbuf_common::config::load_toml_config;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        input = "/music/song.ogg"

        [pipeline]
        target_sample_format = "s32"
        target_channel_count = 1
        input_mode = "memory"

        [playback]
        enabled = false
        stall_timeout_ms = 1500

        [logging]
        level = "trace"
        "#,
    );

    let config: TomlConfig = load_toml_config(Some(&path)).unwrap();

    assert_eq!(config.input, Some(PathBuf::from("/music/song.ogg")));
    assert_eq!(config.pipeline.target_sample_format, TargetSampleFormat::S32);
    assert_eq!(config.pipeline.output_channel_count(), 1);
    assert_eq!(config.pipeline.input_mode, InputMode::Memory);
    assert!(!config.playback.enabled);
    assert_eq!(config.playback.stall_timeout_ms, 1500);
    assert_eq!(config.playback.poll_initial_ms, PlaybackConfig::default().poll_initial_ms);
    assert_eq!(config.logging.level, "trace");
}

#[test]
fn test_partial_config_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[pipeline]\nresample_to_mono = true\n");

    let config: TomlConfig = load_toml_config(Some(&path)).unwrap();

    assert!(config.pipeline.resample_to_mono);
    assert_eq!(config.pipeline.target_sample_format, TargetSampleFormat::S16);
    assert_eq!(config.input, None);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_unknown_sample_format_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[pipeline]\ntarget_sample_format = \"s24\"\n");

    let result: sndbuf_common::Result<TomlConfig> = load_toml_config(Some(&path));
    assert!(matches!(
        result,
        Err(sndbuf_common::Error::ConfigParse { .. })
    ));
}

#[test]
fn test_invalid_channel_count_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[pipeline]\ntarget_channel_count = 5\n");

    let config: TomlConfig = load_toml_config(Some(&path)).unwrap();
    assert!(matches!(config.pipeline.validate(), Err(Error::Config(_))));
}

#[test]
fn test_common_error_maps_to_configuration_stage() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "input = [");

    let err: Error = load_toml_config::<TomlConfig>(Some(&path)).unwrap_err().into();
    assert_eq!(err.stage(), "configuration");
}

//! sndbuf Audio Player (sndbuf-ap) - Main entry point
//!
//! Decodes the first audio track of the input file into one PCM buffer,
//! then plays the buffer once on an output device and waits for completion.
//! Any fatal error is logged with the failing stage and ends the process with
//! a non-zero status; nothing is played after a failed decode.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sndbuf_ap::audio::TargetSampleFormat;
use sndbuf_ap::config::{PipelineConfig, TomlConfig};
use sndbuf_ap::playback::{OutputDevice, PollBackoff};
use sndbuf_ap::{decode_file_with_stats, InputMode};
use sndbuf_common::config::{load_toml_config, resolve_required_path};
use sndbuf_common::{ConfigResolver, LoggingConfig};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

const LOG_TARGET: &str = "sndbuf_ap";

/// Command-line arguments for sndbuf-ap
#[derive(Parser, Debug)]
#[command(name = "sndbuf-ap")]
#[command(about = "Decode an audio file to PCM and play it")]
#[command(version)]
struct Args {
    /// Audio file to decode (falls back to the config file, then SNDBUF_INPUT)
    input: Option<PathBuf>,

    /// Config file (default: SNDBUF_CONFIG, then the per-user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mix down to mono
    #[arg(long)]
    mono: bool,

    /// Output channel count (1 or 2)
    #[arg(long)]
    channels: Option<u16>,

    /// Output sample format: u8, s16, s32 or f32
    #[arg(short, long)]
    format: Option<TargetSampleFormat>,

    /// Read the whole file into memory before decoding
    #[arg(long)]
    memory: bool,

    /// Output device name
    #[arg(short, long, env = "SNDBUF_DEVICE")]
    device: Option<String>,

    /// Decode only, skip playback
    #[arg(long)]
    no_play: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SNDBUF_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Command-line values override the config file's `[pipeline]` section.
    fn pipeline_config(&self, mut config: PipelineConfig) -> PipelineConfig {
        if self.mono {
            config.resample_to_mono = true;
        }
        if let Some(channels) = self.channels {
            config.target_channel_count = channels;
        }
        if let Some(format) = self.format {
            config.target_sample_format = format;
        }
        if self.memory {
            config.input_mode = InputMode::Memory;
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing; RUST_LOG wins, then --log-level, then the config file
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let initial = LoggingConfig {
        level: args.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(initial.directive_for(LOG_TARGET)));
    let (filter, filter_handle) = reload::Layer::<EnvFilter, Registry>::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting sndbuf-ap v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("SNDBUF_GIT_HASH"),
        env!("SNDBUF_BUILD_TIMESTAMP"),
        env!("SNDBUF_BUILD_PROFILE")
    );

    let config_path = ConfigResolver::new("sndbuf").resolve(args.config.as_deref());
    let toml_config: TomlConfig =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    if !rust_log_set && args.log_level.is_none() {
        let directive = toml_config.logging.directive_for(LOG_TARGET);
        if let Err(e) = filter_handle.reload(EnvFilter::new(&directive)) {
            warn!("Could not apply log level '{}': {}", directive, e);
        }
    }

    if args.list_devices {
        for name in OutputDevice::list_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let input = resolve_required_path(
        "input file",
        args.input.clone(),
        toml_config.input.clone(),
        "SNDBUF_INPUT",
    )?;
    let pipeline = args.pipeline_config(toml_config.pipeline.clone());
    info!(
        "Decoding {} -> {} ch {} ({:?} input)",
        input.display(),
        pipeline.output_channel_count(),
        pipeline.target_sample_format,
        pipeline.input_mode
    );

    let (sound, stats) = match decode_file_with_stats(&input, &pipeline) {
        Ok(result) => result,
        Err(e) => {
            error!("Decode failed in {} stage: {}", e.stage(), e);
            return Err(e).with_context(|| format!("Failed to decode {}", input.display()));
        }
    };
    info!(
        "Decoded {} packets ({} skipped), {} frames, {:.2}s",
        stats.packets_read,
        stats.packets_skipped,
        stats.frames_decoded,
        sound.duration().as_secs_f64()
    );
    if let Some(source) = stats.source {
        debug!(
            "Input: {} bytes in {} reads, {} seeks",
            source.bytes_read, source.reads, source.seeks
        );
    }

    if args.no_play || !toml_config.playback.enabled {
        info!("Playback disabled, exiting");
        return Ok(());
    }
    if sound.is_empty() {
        warn!("Decoded buffer is empty, nothing to play");
        return Ok(());
    }

    let device_name = args.device.as_deref().or(toml_config.playback.device.as_deref());
    let device = OutputDevice::open(device_name).context("Failed to open audio output")?;
    let mut playback = device.play(&sound).context("Failed to start playback")?;

    let backoff = PollBackoff::new(
        toml_config.playback.poll_initial(),
        toml_config.playback.poll_max(),
        toml_config.playback.stall_timeout(),
    );
    if let Err(e) = playback.wait(backoff) {
        error!("Playback failed in {} stage: {}", e.stage(), e);
        return Err(e).context("Playback did not complete");
    }

    info!("Done");
    Ok(())
}

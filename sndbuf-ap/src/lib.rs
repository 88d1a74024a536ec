//! # sndbuf Audio Player Library (sndbuf-ap)
//!
//! Decodes the first audio track of a file into one contiguous PCM buffer
//! and plays it back.
//!
//! **Architecture:** byte source adapter -> symphonia container reader ->
//! symphonia decoder -> channel remix and sample reformat -> [`SoundBuffer`],
//! then cpal output.
//!
//! ```no_run
//! use sndbuf_ap::{decode_file, PipelineConfig};
//! use std::path::Path;
//!
//! let sound = decode_file(Path::new("track.flac"), &PipelineConfig::default())?;
//! println!("{} Hz, {} channels, {} bytes", sound.sample_rate(), sound.channel_count(), sound.len());
//! # Ok::<(), sndbuf_ap::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use audio::{decode_file, decode_file_with_stats, DecodeStats, SoundBuffer};
pub use config::{InputMode, PipelineConfig};
pub use error::{Error, Result};

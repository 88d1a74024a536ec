//! Error types for sndbuf-ap
//!
//! One variant per fatal stage of the decode pipeline, plus the playback
//! collaborator and configuration. The benign decode signals
//! ("needs more input", "end of stream") are not errors and never appear here.

use thiserror::Error;

/// Main error type for sndbuf-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Container could not be parsed or its format inferred
    #[error("Failed to open container: {0}")]
    Open(String),

    /// Stream parameters could not be determined
    #[error("Failed to probe stream parameters: {0}")]
    Probe(String),

    /// Container holds no audio track
    #[error("No audio track found in container ({track_count} tracks)")]
    NoAudioTrack { track_count: usize },

    /// No decoder is available for the track's codec
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Decoder refused a packet
    #[error("Failed to submit packet to decoder: {0}")]
    DecodeSubmit(String),

    /// Decoder failed while producing a frame
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Resampler could not be configured for the requested formats
    #[error("Failed to initialize resampler: {0}")]
    ResamplerInit(String),

    /// Frame conversion failed
    #[error("Sample conversion error: {0}")]
    Convert(String),

    /// Container reader failed while reading a packet
    #[error("Failed to read packet: {0}")]
    Read(String),

    /// Byte source I/O failure
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sound buffer channel count has no playback format
    #[error("Unsupported channel count for playback: {0} (expected 1 or 2)")]
    UnsupportedChannelCount(u16),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),
}

impl Error {
    /// Short name of the stage that failed, for top-level reporting.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Open(_) => "open",
            Error::Probe(_) => "probe",
            Error::NoAudioTrack { .. } => "track selection",
            Error::UnsupportedCodec(_) => "decoder open",
            Error::DecodeSubmit(_) | Error::Decode(_) => "decode",
            Error::ResamplerInit(_) => "resampler open",
            Error::Convert(_) => "convert",
            Error::Read(_) => "packet read",
            Error::Io(_) => "byte source",
            Error::Config(_) => "configuration",
            Error::UnsupportedChannelCount(_) | Error::AudioOutput(_) => "playback",
        }
    }
}

impl From<sndbuf_common::Error> for Error {
    fn from(err: sndbuf_common::Error) -> Self {
        match err {
            sndbuf_common::Error::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using sndbuf-ap Error
pub type Result<T> = std::result::Result<T, Error>;

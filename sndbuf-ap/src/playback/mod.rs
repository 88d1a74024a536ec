//! Playback of a finished sound buffer

pub mod backoff;
pub mod format;
pub mod output;

pub use backoff::PollBackoff;
pub use format::PcmFormatTag;
pub use output::{OutputDevice, Playback};

//! Upload format tags
//!
//! A sound buffer is described to the output device by one tag combining its
//! channel count and sample encoding.

use crate::audio::types::{SoundBuffer, TargetSampleFormat};
use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmFormatTag {
    Mono8,
    Stereo8,
    Mono16,
    Stereo16,
    Mono32,
    Stereo32,
    MonoFloat32,
    StereoFloat32,
}

impl PcmFormatTag {
    /// Tag for `channel_count` channels of `format`.
    ///
    /// Only mono and stereo are playable.
    pub fn new(channel_count: u16, format: TargetSampleFormat) -> Result<Self> {
        let tag = match (channel_count, format) {
            (1, TargetSampleFormat::U8) => PcmFormatTag::Mono8,
            (2, TargetSampleFormat::U8) => PcmFormatTag::Stereo8,
            (1, TargetSampleFormat::S16) => PcmFormatTag::Mono16,
            (2, TargetSampleFormat::S16) => PcmFormatTag::Stereo16,
            (1, TargetSampleFormat::S32) => PcmFormatTag::Mono32,
            (2, TargetSampleFormat::S32) => PcmFormatTag::Stereo32,
            (1, TargetSampleFormat::F32) => PcmFormatTag::MonoFloat32,
            (2, TargetSampleFormat::F32) => PcmFormatTag::StereoFloat32,
            (other, _) => return Err(Error::UnsupportedChannelCount(other)),
        };
        Ok(tag)
    }

    pub fn for_buffer(buffer: &SoundBuffer) -> Result<Self> {
        Self::new(buffer.channel_count(), buffer.sample_format())
    }

    pub fn channels(&self) -> u16 {
        match self {
            PcmFormatTag::Mono8
            | PcmFormatTag::Mono16
            | PcmFormatTag::Mono32
            | PcmFormatTag::MonoFloat32 => 1,
            _ => 2,
        }
    }

    pub fn sample_format(&self) -> TargetSampleFormat {
        match self {
            PcmFormatTag::Mono8 | PcmFormatTag::Stereo8 => TargetSampleFormat::U8,
            PcmFormatTag::Mono16 | PcmFormatTag::Stereo16 => TargetSampleFormat::S16,
            PcmFormatTag::Mono32 | PcmFormatTag::Stereo32 => TargetSampleFormat::S32,
            PcmFormatTag::MonoFloat32 | PcmFormatTag::StereoFloat32 => TargetSampleFormat::F32,
        }
    }

    /// Decode interleaved buffer bytes in this format to normalized f32.
    pub fn decode_samples(&self, bytes: &[u8]) -> Vec<f32> {
        let format = self.sample_format();
        bytes
            .chunks_exact(format.byte_width())
            .map(|chunk| format.decode(chunk))
            .collect()
    }
}

impl fmt::Display for PcmFormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = if self.channels() == 1 { "mono" } else { "stereo" };
        write!(f, "{} {}", layout, self.sample_format())
    }
}

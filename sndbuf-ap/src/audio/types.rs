//! Core audio data types
//!
//! Defines the sample formats, channel layouts and buffers that flow through
//! the decode pipeline.
//!
//! **Format of a finished [`SoundBuffer`]:**
//! - Interleaved (packed) samples: `[L, R, L, R, ...]` for stereo
//! - Native-endian encoding of the configured [`TargetSampleFormat`]
//! - Sample rate equal to the source track's rate (no rate conversion)

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use symphonia::core::audio::Channels;

/// Sample encoding a decoded frame arrived in from the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    U16,
    U24,
    U32,
    S8,
    S16,
    S24,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// Short lowercase name (`"s16"`, `"f32"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::U16 => "u16",
            SampleFormat::U24 => "u24",
            SampleFormat::U32 => "u32",
            SampleFormat::S8 => "s8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "f32",
            SampleFormat::F64 => "f64",
        }
    }
}

impl From<symphonia::core::sample::SampleFormat> for SampleFormat {
    fn from(format: symphonia::core::sample::SampleFormat) -> Self {
        use symphonia::core::sample::SampleFormat as Sf;
        match format {
            Sf::U8 => SampleFormat::U8,
            Sf::U16 => SampleFormat::U16,
            Sf::U24 => SampleFormat::U24,
            Sf::U32 => SampleFormat::U32,
            Sf::S8 => SampleFormat::S8,
            Sf::S16 => SampleFormat::S16,
            Sf::S24 => SampleFormat::S24,
            Sf::S32 => SampleFormat::S32,
            Sf::F32 => SampleFormat::F32,
            Sf::F64 => SampleFormat::F64,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output sample format of the pipeline. Fixed for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSampleFormat {
    /// Unsigned 8-bit, 128 = silence
    U8,
    /// Signed 16-bit
    #[default]
    S16,
    /// Signed 32-bit
    S32,
    /// 32-bit float in [-1.0, 1.0]
    F32,
}

impl TargetSampleFormat {
    /// Bytes per sample of one channel.
    pub fn byte_width(&self) -> usize {
        match self {
            TargetSampleFormat::U8 => 1,
            TargetSampleFormat::S16 => 2,
            TargetSampleFormat::S32 | TargetSampleFormat::F32 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetSampleFormat::U8 => "u8",
            TargetSampleFormat::S16 => "s16",
            TargetSampleFormat::S32 => "s32",
            TargetSampleFormat::F32 => "f32",
        }
    }

    /// Encode one normalized sample into `out` (exactly `byte_width()` bytes).
    ///
    /// Input outside [-1.0, 1.0] is clipped.
    pub fn encode(&self, sample: f32, out: &mut [u8]) {
        let sample = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
        match self {
            TargetSampleFormat::U8 => {
                out[0] = ((sample * 128.0).round() + 128.0).clamp(0.0, 255.0) as u8;
            }
            TargetSampleFormat::S16 => {
                let value = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                out.copy_from_slice(&value.to_ne_bytes());
            }
            TargetSampleFormat::S32 => {
                let value = (f64::from(sample) * 2_147_483_648.0)
                    .round()
                    .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
                out.copy_from_slice(&value.to_ne_bytes());
            }
            TargetSampleFormat::F32 => {
                out.copy_from_slice(&sample.to_ne_bytes());
            }
        }
    }

    /// Decode one sample (exactly `byte_width()` bytes) back to [-1.0, 1.0].
    pub fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            TargetSampleFormat::U8 => (f32::from(bytes[0]) - 128.0) / 128.0,
            TargetSampleFormat::S16 => {
                f32::from(i16::from_ne_bytes([bytes[0], bytes[1]])) / 32768.0
            }
            TargetSampleFormat::S32 => {
                let value = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (f64::from(value) / 2_147_483_648.0) as f32
            }
            TargetSampleFormat::F32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

impl FromStr for TargetSampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(TargetSampleFormat::U8),
            "s16" => Ok(TargetSampleFormat::S16),
            "s32" => Ok(TargetSampleFormat::S32),
            "f32" => Ok(TargetSampleFormat::F32),
            other => Err(format!(
                "unknown sample format '{}' (expected u8, s16, s32 or f32)",
                other
            )),
        }
    }
}

impl fmt::Display for TargetSampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn count(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    pub fn from_count(count: u16) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

/// Native stream parameters of the selected track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample format reported by the container, if any.
    ///
    /// Compressed codecs often leave this unknown until the first frame.
    pub sample_format: Option<SampleFormat>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Speaker positions of the planes, in plane order, when the container
    /// reports them.
    pub positions: Option<Channels>,
}

impl StreamFormat {
    /// Format with no known sample encoding or speaker positions.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_format: None,
            sample_rate,
            channels,
            positions: None,
        }
    }
}

/// One decoded unit of audio.
///
/// Samples are held planar as normalized `f32`, one plane per channel. The
/// codec's native encoding is kept in `native_format`. A `Frame` is reused
/// across decode iterations: `reset` keeps the plane allocations.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    planes: Vec<Vec<f32>>,
    nb_samples: usize,
    sample_rate: u32,
    native_format: Option<SampleFormat>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `channels` planes of `nb_samples` zeroed samples.
    pub fn reset(
        &mut self,
        channels: usize,
        nb_samples: usize,
        sample_rate: u32,
        native_format: SampleFormat,
    ) {
        self.planes.resize_with(channels, Vec::new);
        for plane in &mut self.planes {
            plane.clear();
            plane.resize(nb_samples, 0.0);
        }
        self.nb_samples = nb_samples;
        self.sample_rate = sample_rate;
        self.native_format = Some(native_format);
    }

    /// Samples per channel in this frame.
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn native_format(&self) -> Option<SampleFormat> {
        self.native_format
    }

    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel]
    }

    pub fn plane_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.planes[channel]
    }
}

/// Decoded and reformatted audio, ready for playback.
///
/// Populated incrementally by the decode driver (append-only) and read-only
/// once handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBuffer {
    bytes: Vec<u8>,
    sample_rate: u32,
    channel_count: u16,
    sample_format: TargetSampleFormat,
}

impl SoundBuffer {
    pub(crate) fn new(sample_rate: u32, channel_count: u16, sample_format: TargetSampleFormat) -> Self {
        Self {
            bytes: Vec::new(),
            sample_rate,
            channel_count,
            sample_format,
        }
    }

    /// Append one converted run after all previously appended runs.
    pub(crate) fn append(&mut self, run: &[u8]) {
        self.bytes.extend_from_slice(run);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_format(&self) -> TargetSampleFormat {
        self.sample_format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes per interleaved frame (all channels of one sample instant).
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.byte_width() * self.channel_count as usize
    }

    /// Number of sample frames held.
    pub fn frames(&self) -> usize {
        self.bytes.len() / self.bytes_per_frame()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

//! Channel remixing and sample reformatting
//!
//! Converts each decoded frame into one run of interleaved bytes in the
//! pipeline's fixed output format and layout. The output rate always equals
//! the input rate; no rate conversion is performed.
//!
//! **Channel mapping:**
//! - Mono output from mono or stereo: copied or averaged
//! - Stereo output from mono: duplicated to both sides
//! - Stereo output from stereo: copied
//! - More than two input channels: position-aware downmix. Left-side speakers
//!   feed L, right-side speakers feed R, centre speakers feed both at -3 dB,
//!   LFE is dropped. Rear, side and height speakers are attenuated by -3 dB.
//!   Each row is normalized so a full-scale input cannot clip. Mono output
//!   averages the stereo downmix.

use crate::audio::staging::StagingBuffer;
use crate::audio::types::{ChannelLayout, Frame, SampleFormat, StreamFormat, TargetSampleFormat};
use crate::error::{Error, Result};
use std::f32::consts::FRAC_1_SQRT_2;
use symphonia::core::audio::Channels;
use tracing::debug;

/// Stereo gains `(left, right)` per speaker position.
const STEREO_GAINS: &[(Channels, f32, f32)] = &[
    (Channels::FRONT_LEFT, 1.0, 0.0),
    (Channels::FRONT_RIGHT, 0.0, 1.0),
    (Channels::FRONT_CENTRE, FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (Channels::LFE1, 0.0, 0.0),
    (Channels::REAR_LEFT, FRAC_1_SQRT_2, 0.0),
    (Channels::REAR_RIGHT, 0.0, FRAC_1_SQRT_2),
    (Channels::FRONT_LEFT_CENTRE, 1.0, 0.0),
    (Channels::FRONT_RIGHT_CENTRE, 0.0, 1.0),
    (Channels::REAR_CENTRE, 0.5, 0.5),
    (Channels::SIDE_LEFT, FRAC_1_SQRT_2, 0.0),
    (Channels::SIDE_RIGHT, 0.0, FRAC_1_SQRT_2),
    (Channels::TOP_CENTRE, 0.5, 0.5),
    (Channels::TOP_FRONT_LEFT, FRAC_1_SQRT_2, 0.0),
    (Channels::TOP_FRONT_CENTRE, 0.5, 0.5),
    (Channels::TOP_FRONT_RIGHT, 0.0, FRAC_1_SQRT_2),
    (Channels::TOP_REAR_LEFT, FRAC_1_SQRT_2, 0.0),
    (Channels::TOP_REAR_CENTRE, 0.5, 0.5),
    (Channels::TOP_REAR_RIGHT, 0.0, FRAC_1_SQRT_2),
    (Channels::REAR_LEFT_CENTRE, FRAC_1_SQRT_2, 0.0),
    (Channels::REAR_RIGHT_CENTRE, 0.0, FRAC_1_SQRT_2),
    (Channels::FRONT_LEFT_WIDE, 1.0, 0.0),
    (Channels::FRONT_RIGHT_WIDE, 0.0, 1.0),
    (Channels::FRONT_LEFT_HIGH, FRAC_1_SQRT_2, 0.0),
    (Channels::FRONT_CENTRE_HIGH, 0.5, 0.5),
    (Channels::FRONT_RIGHT_HIGH, 0.0, FRAC_1_SQRT_2),
    (Channels::LFE2, 0.0, 0.0),
];

#[derive(Debug, Clone, PartialEq)]
enum Mix {
    Copy,
    Duplicate,
    AverageAll,
    /// Per-plane `(left, right)` gains
    Downmix(Vec<(f32, f32)>),
    /// Stereo downmix folded to one channel
    DownmixMono(Vec<(f32, f32)>),
}

/// Speaker position of each plane.
///
/// Planes follow ascending position order. When the container gives no
/// usable mask, the first `channels` positions of that order are assumed.
fn plane_positions(channels: u16, positions: Option<Channels>) -> Vec<Option<Channels>> {
    let mask = positions
        .filter(|mask| mask.count() == channels as usize)
        .unwrap_or_else(|| {
            let bits = u32::from(channels).min(u32::BITS - 1);
            Channels::from_bits_truncate((1u32 << bits) - 1)
        });
    let mut planes: Vec<Option<Channels>> = mask.iter().map(Some).collect();
    planes.resize(channels as usize, None);
    planes
}

/// Build normalized stereo gains for planes at the given positions.
///
/// Planes with no known position feed both sides equally.
fn stereo_downmix(channels: u16, positions: Option<Channels>) -> Vec<(f32, f32)> {
    let mut gains: Vec<(f32, f32)> = plane_positions(channels, positions)
        .into_iter()
        .map(|position| {
            position
                .and_then(|p| STEREO_GAINS.iter().find(|(c, _, _)| *c == p))
                .map(|&(_, left, right)| (left, right))
                .unwrap_or((0.5, 0.5))
        })
        .collect();

    let left_sum: f32 = gains.iter().map(|g| g.0).sum();
    let right_sum: f32 = gains.iter().map(|g| g.1).sum();
    let peak = left_sum.max(right_sum);
    if peak > 1.0 {
        for gain in &mut gains {
            gain.0 /= peak;
            gain.1 /= peak;
        }
    }
    gains
}

/// Converter bound to a fixed input/output format pair.
#[derive(Debug)]
pub struct ResampleContext {
    input_channels: u16,
    input_format: Option<SampleFormat>,
    input_rate: u32,
    output_layout: ChannelLayout,
    output_format: TargetSampleFormat,
    mix: Mix,
    // Interleaved f32 scratch for one frame, reused across calls
    mixed: Vec<f32>,
}

impl ResampleContext {
    /// Configure the converter for the selected track's native format.
    ///
    /// Fails with [`Error::ResamplerInit`] when the input has no channels or
    /// the output rate differs from the input rate.
    pub fn open(
        input: &StreamFormat,
        output_layout: ChannelLayout,
        output_format: TargetSampleFormat,
        output_rate: u32,
    ) -> Result<Self> {
        let input_channels = input.channels;
        let input_rate = input.sample_rate;
        if input_channels == 0 {
            return Err(Error::ResamplerInit("input has no channels".to_string()));
        }
        if input_rate == 0 {
            return Err(Error::ResamplerInit("input sample rate is zero".to_string()));
        }
        if output_rate != input_rate {
            return Err(Error::ResamplerInit(format!(
                "rate conversion {} Hz -> {} Hz is not supported",
                input_rate, output_rate
            )));
        }

        let mix = match (output_layout, input_channels) {
            (ChannelLayout::Mono, 1) | (ChannelLayout::Stereo, 2) => Mix::Copy,
            (ChannelLayout::Mono, 2) => Mix::AverageAll,
            (ChannelLayout::Stereo, 1) => Mix::Duplicate,
            (ChannelLayout::Mono, _) => {
                Mix::DownmixMono(stereo_downmix(input_channels, input.positions))
            }
            (ChannelLayout::Stereo, _) => {
                Mix::Downmix(stereo_downmix(input_channels, input.positions))
            }
        };

        debug!(
            "Resampler opened: {} ch {} @ {} Hz -> {} ch {} @ {} Hz ({:?})",
            input_channels,
            input.sample_format.map(|f| f.name()).unwrap_or("?"),
            input_rate,
            output_layout.count(),
            output_format,
            output_rate,
            mix
        );

        Ok(Self {
            input_channels,
            input_format: input.sample_format,
            input_rate,
            output_layout,
            output_format,
            mix,
            mixed: Vec::new(),
        })
    }

    pub fn output_layout(&self) -> ChannelLayout {
        self.output_layout
    }

    pub fn output_format(&self) -> TargetSampleFormat {
        self.output_format
    }

    /// Convert `frame` into `out` and return the number of bytes written.
    ///
    /// `out` must hold at least `frame.nb_samples()` samples; a smaller
    /// buffer is an error, never a silent truncation.
    pub fn convert(&mut self, frame: &Frame, out: &mut StagingBuffer) -> Result<usize> {
        let nb_samples = frame.nb_samples();

        if frame.channels() != self.input_channels as usize {
            return Err(Error::Convert(format!(
                "frame has {} channels, resampler configured for {}",
                frame.channels(),
                self.input_channels
            )));
        }
        if frame.sample_rate() != self.input_rate {
            return Err(Error::Convert(format!(
                "frame rate {} Hz differs from configured {} Hz",
                frame.sample_rate(),
                self.input_rate
            )));
        }
        if out.channels() != self.output_layout.count() as usize || out.format() != self.output_format {
            return Err(Error::Convert(format!(
                "staging buffer is {} ch {}, output is {} ch {}",
                out.channels(),
                out.format(),
                self.output_layout.count(),
                self.output_format
            )));
        }
        if out.capacity_samples() < nb_samples {
            return Err(Error::Convert(format!(
                "staging buffer holds {} samples, frame has {}",
                out.capacity_samples(),
                nb_samples
            )));
        }
        if let (Some(configured), Some(actual)) = (self.input_format, frame.native_format()) {
            if configured != actual {
                debug!("Input sample format changed: {} -> {}", configured, actual);
                self.input_format = Some(actual);
            }
        }

        self.mix_frame(frame);

        let width = self.output_format.byte_width();
        let written = self.mixed.len() * width;
        let bytes = out.as_mut_bytes();
        for (sample, chunk) in self.mixed.iter().zip(bytes[..written].chunks_exact_mut(width)) {
            self.output_format.encode(*sample, chunk);
        }

        Ok(written)
    }

    fn mix_frame(&mut self, frame: &Frame) {
        let nb_samples = frame.nb_samples();
        let channels = frame.channels();
        self.mixed.clear();

        match &self.mix {
            Mix::Copy => {
                for i in 0..nb_samples {
                    for ch in 0..channels {
                        self.mixed.push(frame.plane(ch)[i]);
                    }
                }
            }
            Mix::Duplicate => {
                for &sample in frame.plane(0) {
                    self.mixed.push(sample);
                    self.mixed.push(sample);
                }
            }
            Mix::AverageAll => {
                let scale = 1.0 / channels as f32;
                for i in 0..nb_samples {
                    let sum: f32 = (0..channels).map(|ch| frame.plane(ch)[i]).sum();
                    self.mixed.push(sum * scale);
                }
            }
            Mix::Downmix(gains) | Mix::DownmixMono(gains) => {
                let mono = matches!(self.mix, Mix::DownmixMono(_));
                for i in 0..nb_samples {
                    let (left, right) = gains
                        .iter()
                        .enumerate()
                        .fold((0.0f32, 0.0f32), |(l, r), (ch, &(gl, gr))| {
                            let sample = frame.plane(ch)[i];
                            (l + sample * gl, r + sample * gr)
                        });
                    if mono {
                        self.mixed.push((left + right) * 0.5);
                    } else {
                        self.mixed.push(left);
                        self.mixed.push(right);
                    }
                }
            }
        }
    }
}

impl Drop for ResampleContext {
    fn drop(&mut self) {
        debug!("Resampler closed");
    }
}

//! Audio Test File Generation Utilities
//!
//! Generates deterministic WAV files with known sample values so pipeline
//! tests can compare decoded output against the exact input.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Deterministic 16-bit sine samples, `frames` long.
pub fn sine_samples(frames: usize, rate: u32, frequency_hz: f32, amplitude: f32) -> Vec<i16> {
    let amplitude_i16 = amplitude * i16::MAX as f32;
    (0..frames)
        .map(|i| {
            let t = i as f32 / rate as f32;
            ((2.0 * PI * frequency_hz * t).sin() * amplitude_i16) as i16
        })
        .collect()
}

/// Write interleaved 16-bit samples as a WAV file.
pub fn write_s16_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    sample_rate: u32,
    interleaved: &[i16],
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in interleaved {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Generate a stereo sine WAV with the same value on both channels.
///
/// Returns the interleaved samples written.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<Vec<i16>, hound::Error> {
    let frames = (TEST_SAMPLE_RATE as u64 * duration_ms / 1000) as usize;
    let interleaved: Vec<i16> = sine_samples(frames, TEST_SAMPLE_RATE, frequency_hz, amplitude)
        .into_iter()
        .flat_map(|s| [s, s])
        .collect();

    write_s16_wav(path, 2, TEST_SAMPLE_RATE, &interleaved)?;
    Ok(interleaved)
}

/// Generate a stereo WAV whose left channel is a sine and right channel is
/// silent, so channel mixing is observable.
///
/// Returns the interleaved samples written.
pub fn generate_left_only_wav<P: AsRef<Path>>(
    path: P,
    frames: usize,
    amplitude: f32,
) -> Result<Vec<i16>, hound::Error> {
    let interleaved: Vec<i16> = sine_samples(frames, TEST_SAMPLE_RATE, 440.0, amplitude)
        .into_iter()
        .flat_map(|s| [s, 0])
        .collect();

    write_s16_wav(path, 2, TEST_SAMPLE_RATE, &interleaved)?;
    Ok(interleaved)
}

/// Generate a mono sine WAV at `sample_rate`.
pub fn generate_mono_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    frames: usize,
) -> Result<Vec<i16>, hound::Error> {
    let samples = sine_samples(frames, sample_rate, 220.0, 0.5);
    write_s16_wav(path, 1, sample_rate, &samples)?;
    Ok(samples)
}

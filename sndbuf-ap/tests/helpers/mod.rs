//! Test helper modules for sndbuf-ap integration tests
//!
//! - audio_generator: deterministic WAV fixtures written with hound
//! - byte decoding of finished sound buffers

#![allow(dead_code)]

pub mod audio_generator;

pub use audio_generator::{
    generate_left_only_wav, generate_mono_wav, generate_sine_wav, sine_samples, write_s16_wav,
    TEST_SAMPLE_RATE,
};

/// Native-endian 16-bit samples of a sound buffer.
pub fn s16_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

/// Native-endian f32 samples of a sound buffer.
pub fn f32_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Largest absolute difference between two sample sequences of equal length.
pub fn max_abs_diff(a: &[i16], b: &[i16]) -> i32 {
    assert_eq!(a.len(), b.len(), "sample counts differ");
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as i32 - y as i32).abs())
        .max()
        .unwrap_or(0)
}

//! Resample output staging
//!
//! Byte buffer sized for exactly one frame's worth of converted samples.
//! It is reallocated only when the incoming frame's sample count differs from
//! the previous frame's, so runs of equally-sized frames reuse one
//! allocation.

use crate::audio::types::TargetSampleFormat;
use tracing::trace;

#[derive(Debug)]
pub struct StagingBuffer {
    data: Vec<u8>,
    capacity_samples: usize,
    channels: usize,
    format: TargetSampleFormat,
    reallocations: usize,
}

impl StagingBuffer {
    /// Empty staging buffer for `channels` interleaved channels of `format`.
    pub fn new(channels: u16, format: TargetSampleFormat) -> Self {
        Self {
            data: Vec::new(),
            capacity_samples: 0,
            channels: channels as usize,
            format,
            reallocations: 0,
        }
    }

    /// Size the buffer for a frame of `nb_samples` samples per channel.
    ///
    /// Returns `true` when a new allocation was made.
    pub fn prepare(&mut self, nb_samples: usize) -> bool {
        if nb_samples == self.capacity_samples && self.reallocations > 0 {
            return false;
        }

        self.data = vec![0u8; nb_samples * self.channels * self.format.byte_width()];
        self.capacity_samples = nb_samples;
        self.reallocations += 1;
        trace!(
            "Staging buffer reallocated for {} samples ({} bytes)",
            nb_samples,
            self.data.len()
        );
        true
    }

    /// Samples per channel the buffer can hold.
    pub fn capacity_samples(&self) -> usize {
        self.capacity_samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn format(&self) -> TargetSampleFormat {
        self.format
    }

    /// Number of allocations made so far.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// First `len` converted bytes.
    pub fn bytes(&self, len: usize) -> &[u8] {
        &self.data[..len]
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

//! Decode pipeline driver
//!
//! Pulls packets of the selected track from the container, feeds the
//! decoder, converts every decoded frame and appends the converted bytes to
//! the sound buffer.
//!
//! **State machine:**
//! ```text
//! AwaitPacket -> Decoding <-> FrameReady
//!                   |
//!                   v
//!                Drained
//! ```
//! - `NeedsMoreInput` while decoding: read and submit another packet; end of
//!   input at that point drains the pipeline with no further extraction
//! - `EndOfStream` from the decoder drains the pipeline
//! - Every other error is fatal and propagates

use crate::audio::decoder::{DecodeStatus, FrameDecoder};
use crate::audio::demux::{ContainerReader, Packet, PacketRead, StreamContext};
use crate::audio::resampler::ResampleContext;
use crate::audio::source::SourceStats;
use crate::audio::staging::StagingBuffer;
use crate::audio::types::{Frame, SoundBuffer};
use crate::error::{Error, Result};
use tracing::{debug, trace};

/// Driver progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    AwaitPacket,
    Decoding,
    FrameReady,
    Drained,
}

/// Summary of one driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Packets of the selected track submitted to the decoder
    pub packets_read: u64,
    /// Packets of other tracks that were discarded
    pub packets_skipped: u64,
    pub frames_decoded: u64,
    /// Sample count of every decoded frame, in decode order
    pub frame_sizes: Vec<usize>,
    pub staging_reallocations: usize,
    pub bytes_produced: u64,
    pub final_state: DriverState,
    /// Byte source activity, when the backend tracks it
    pub source: Option<SourceStats>,
}

/// Runs the packet -> frame -> bytes loop for one selected track.
pub struct DecodeDriver<'a, C, D> {
    stream: &'a mut StreamContext<C>,
    decoder: &'a mut D,
    resampler: &'a mut ResampleContext,
    track_id: u32,
    state: DriverState,
    stats: DecodeStats,
}

impl<'a, C, D> DecodeDriver<'a, C, D>
where
    C: ContainerReader,
    D: FrameDecoder,
{
    /// Bind the driver to the selected track of `stream`.
    pub fn new(
        stream: &'a mut StreamContext<C>,
        decoder: &'a mut D,
        resampler: &'a mut ResampleContext,
    ) -> Result<Self> {
        let track_id = stream
            .selected_track()
            .map(|t| t.id)
            .ok_or(Error::NoAudioTrack {
                track_count: stream.tracks().len(),
            })?;

        Ok(Self {
            stream,
            decoder,
            resampler,
            track_id,
            state: DriverState::AwaitPacket,
            stats: DecodeStats::default(),
        })
    }

    /// Decode the whole track into `sound`.
    ///
    /// On error, `sound` may hold a prefix of the output; callers must not
    /// hand it on.
    pub fn run(mut self, sound: &mut SoundBuffer) -> Result<DecodeStats> {
        let mut staging = StagingBuffer::new(
            self.resampler.output_layout().count(),
            self.resampler.output_format(),
        );

        match self.pump(&mut staging, sound) {
            Ok(()) => Ok(self.finish(&staging)),
            Err(e) => {
                debug!(
                    "Driver stopped in {:?} state after {} frames: {}",
                    self.state, self.stats.frames_decoded, e
                );
                Err(e)
            }
        }
    }

    fn pump(&mut self, staging: &mut StagingBuffer, sound: &mut SoundBuffer) -> Result<()> {
        let mut frame = Frame::new();

        match self.next_track_packet()? {
            Some(packet) => self.submit(packet)?,
            None => {
                debug!("No packets for track {}", self.track_id);
                return Ok(());
            }
        }
        self.state = DriverState::Decoding;

        loop {
            match self.decoder.receive_frame(&mut frame)? {
                DecodeStatus::NeedsMoreInput => match self.next_track_packet()? {
                    Some(packet) => self.submit(packet)?,
                    None => {
                        debug!("End of input, decoder drained");
                        return Ok(());
                    }
                },
                DecodeStatus::EndOfStream => {
                    debug!("Decoder signalled end of stream");
                    return Ok(());
                }
                DecodeStatus::Frame => {
                    self.state = DriverState::FrameReady;
                    let nb_samples = frame.nb_samples();
                    staging.prepare(nb_samples);

                    let written = self.resampler.convert(&frame, staging)?;
                    sound.append(staging.bytes(written));

                    self.stats.frames_decoded += 1;
                    self.stats.frame_sizes.push(nb_samples);
                    self.stats.bytes_produced += written as u64;
                    trace!("Frame {}: {} samples, {} bytes", self.stats.frames_decoded, nb_samples, written);

                    self.state = DriverState::Decoding;
                }
            }
        }
    }

    fn submit(&mut self, packet: Packet) -> Result<()> {
        self.stats.packets_read += 1;
        self.decoder.send_packet(packet)
    }

    /// Next packet of the selected track, skipping every other track.
    fn next_track_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.stream.read_packet()? {
                PacketRead::Eof => return Ok(None),
                PacketRead::Packet(packet) if packet.track_id() == self.track_id => {
                    return Ok(Some(packet))
                }
                PacketRead::Packet(packet) => {
                    trace!("Skipping packet of track {}", packet.track_id());
                    self.stats.packets_skipped += 1;
                }
            }
        }
    }

    fn finish(mut self, staging: &StagingBuffer) -> DecodeStats {
        self.state = DriverState::Drained;
        self.stats.staging_reallocations = staging.reallocations();
        self.stats.final_state = self.state;
        self.stats
    }
}

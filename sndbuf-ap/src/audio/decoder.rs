//! Audio decoder using symphonia
//!
//! Wraps a symphonia codec in a send/receive interface: packets are queued
//! with [`FrameDecoder::send_packet`] and decoded lazily by
//! [`FrameDecoder::receive_frame`], which reports "needs more input" when
//! the queue is empty. A packet may be submitted while frames from earlier
//! packets are still pending extraction.

use crate::audio::demux::{Packet, TrackInfo};
use crate::audio::types::{Frame, SampleFormat};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::sample::Sample;
use tracing::{debug, trace, warn};

/// Outcome of [`FrameDecoder::receive_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A frame was written to the caller's [`Frame`]
    Frame,
    /// No frame is available until another packet is submitted
    NeedsMoreInput,
    /// The decoder will produce no further frames
    EndOfStream,
}

/// Stateful packet-to-frame decoder.
pub trait FrameDecoder {
    /// Queue one compressed packet.
    fn send_packet(&mut self, packet: Packet) -> Result<()>;

    /// Extract the next decoded frame into `frame`.
    fn receive_frame(&mut self, frame: &mut Frame) -> Result<DecodeStatus>;
}

/// Decoder state bound to one track's codec parameters.
pub struct CodecContext {
    decoder: Box<dyn Decoder>,
    codec_name: String,
    pending: VecDeque<Packet>,
    finished: bool,
}

impl CodecContext {
    /// Open a decoder for `track`.
    pub fn open(track: &TrackInfo) -> Result<Self> {
        let decoder_opts = DecoderOptions::default();
        let decoder = symphonia::default::get_codecs()
            .make(&track.params, &decoder_opts)
            .map_err(|e| {
                Error::UnsupportedCodec(format!("{} (track {}): {}", track.codec_name, track.id, e))
            })?;

        debug!("Decoder opened: {}", track.codec_name);
        Ok(Self {
            decoder,
            codec_name: track.codec_name.clone(),
            pending: VecDeque::new(),
            finished: false,
        })
    }
}

impl FrameDecoder for CodecContext {
    fn send_packet(&mut self, packet: Packet) -> Result<()> {
        if self.finished {
            return Err(Error::DecodeSubmit(format!(
                "packet ts={} submitted after end of stream",
                packet.ts()
            )));
        }
        self.pending.push_back(packet);
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<DecodeStatus> {
        if self.finished {
            return Ok(DecodeStatus::EndOfStream);
        }

        while let Some(packet) = self.pending.pop_front() {
            match self.decoder.decode(packet.as_symphonia()) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        // Codec consumed the packet without output (e.g. priming)
                        trace!("Packet ts={} produced no samples", packet.ts());
                        continue;
                    }
                    copy_into_frame(&decoded, frame);
                    return Ok(DecodeStatus::Frame);
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Decoder reported end of stream");
                    self.finished = true;
                    self.pending.clear();
                    return Ok(DecodeStatus::EndOfStream);
                }
                Err(e) => {
                    return Err(Error::Decode(format!(
                        "{} packet ts={}: {}",
                        self.codec_name,
                        packet.ts(),
                        e
                    )));
                }
            }
        }

        Ok(DecodeStatus::NeedsMoreInput)
    }
}

impl Drop for CodecContext {
    fn drop(&mut self) {
        let result = self.decoder.finalize();
        if result.verify_ok == Some(false) {
            warn!("{} decoder: stream checksum verification failed", self.codec_name);
        }
        debug!("Decoder closed: {}", self.codec_name);
    }
}

/// Copy a decoded buffer into `frame` as planar normalized f32.
fn copy_into_frame(decoded: &AudioBufferRef<'_>, frame: &mut Frame) {
    match decoded {
        AudioBufferRef::U8(buf) => copy_planes(buf, SampleFormat::U8, frame),
        AudioBufferRef::U16(buf) => copy_planes(buf, SampleFormat::U16, frame),
        AudioBufferRef::U24(buf) => copy_planes(buf, SampleFormat::U24, frame),
        AudioBufferRef::U32(buf) => copy_planes(buf, SampleFormat::U32, frame),
        AudioBufferRef::S8(buf) => copy_planes(buf, SampleFormat::S8, frame),
        AudioBufferRef::S16(buf) => copy_planes(buf, SampleFormat::S16, frame),
        AudioBufferRef::S24(buf) => copy_planes(buf, SampleFormat::S24, frame),
        AudioBufferRef::S32(buf) => copy_planes(buf, SampleFormat::S32, frame),
        AudioBufferRef::F32(buf) => copy_planes(buf, SampleFormat::F32, frame),
        AudioBufferRef::F64(buf) => copy_planes(buf, SampleFormat::F64, frame),
    }
}

fn copy_planes<S>(buf: &AudioBuffer<S>, format: SampleFormat, frame: &mut Frame)
where
    S: Sample + IntoSample<f32>,
{
    let spec = buf.spec();
    let channels = spec.channels.count();
    frame.reset(channels, buf.frames(), spec.rate, format);

    for ch in 0..channels {
        for (dst, &src) in frame.plane_mut(ch).iter_mut().zip(buf.chan(ch)) {
            *dst = src.into_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::{Channels, SignalSpec};
    use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_NULL, CODEC_TYPE_PCM_S16LE};

    fn pcm_track(channels: Channels) -> TrackInfo {
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_PCM_S16LE)
            .with_sample_rate(8000)
            .with_channels(channels)
            .with_bits_per_sample(16)
            .with_bits_per_coded_sample(16)
            .with_max_frames_per_packet(1024);
        TrackInfo::new(0, 0, params)
    }

    fn s16_packet(samples: &[i16]) -> Packet {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Packet::new(0, 0, samples.len() as u64, data)
    }

    #[test]
    fn test_unsupported_codec() {
        let track = TrackInfo::new(0, 0, CodecParameters::new());
        assert!(track.params.codec == CODEC_TYPE_NULL);
        assert!(matches!(
            CodecContext::open(&track),
            Err(Error::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn test_needs_more_input_when_idle() {
        let mut ctx = CodecContext::open(&pcm_track(Channels::FRONT_LEFT)).unwrap();
        let mut frame = Frame::new();
        assert_eq!(
            ctx.receive_frame(&mut frame).unwrap(),
            DecodeStatus::NeedsMoreInput
        );
    }

    #[test]
    fn test_pcm_packet_decodes_to_frame() {
        let mut ctx = CodecContext::open(&pcm_track(Channels::FRONT_LEFT)).unwrap();
        let mut frame = Frame::new();

        ctx.send_packet(s16_packet(&[0, 16384, -16384, 0])).unwrap();
        assert_eq!(ctx.receive_frame(&mut frame).unwrap(), DecodeStatus::Frame);

        assert_eq!(frame.channels(), 1);
        assert_eq!(frame.nb_samples(), 4);
        assert_eq!(frame.sample_rate(), 8000);
        assert_eq!(frame.native_format(), Some(SampleFormat::S16));
        assert!((frame.plane(0)[1] - 0.5).abs() < 1e-4);
        assert!((frame.plane(0)[2] + 0.5).abs() < 1e-4);

        assert_eq!(
            ctx.receive_frame(&mut frame).unwrap(),
            DecodeStatus::NeedsMoreInput
        );
    }

    #[test]
    fn test_packets_queue_while_frames_pending() {
        let mut ctx = CodecContext::open(&pcm_track(Channels::FRONT_LEFT)).unwrap();
        let mut frame = Frame::new();

        ctx.send_packet(s16_packet(&[1, 2])).unwrap();
        ctx.send_packet(s16_packet(&[3, 4, 5])).unwrap();

        assert_eq!(ctx.receive_frame(&mut frame).unwrap(), DecodeStatus::Frame);
        assert_eq!(frame.nb_samples(), 2);
        assert_eq!(ctx.receive_frame(&mut frame).unwrap(), DecodeStatus::Frame);
        assert_eq!(frame.nb_samples(), 3);
    }

    #[test]
    fn test_copy_planes_keeps_channel_order() {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::<f32>::new(8, spec);
        buf.render_reserved(Some(2));
        buf.chan_mut(0).copy_from_slice(&[0.25, 0.5]);
        buf.chan_mut(1).copy_from_slice(&[-0.25, -0.5]);

        let mut frame = Frame::new();
        copy_planes(&buf, SampleFormat::F32, &mut frame);

        assert_eq!(frame.plane(0), &[0.25, 0.5]);
        assert_eq!(frame.plane(1), &[-0.25, -0.5]);
        assert_eq!(frame.sample_rate(), 44100);
    }
}

//! Container reader
//!
//! Opens a container through the byte source adapter, enumerates its tracks
//! and yields compressed packets in container order.
//!
//! [`ContainerReader`] is the seam between the decode driver and the
//! container implementation; [`SymphoniaContainer`] is the production reader.
//! [`StreamContext`] holds the reader together with the probed track list and
//! the selected audio track.

use crate::audio::types::{SampleFormat, StreamFormat};
use crate::error::{Error, Result};
use std::time::Duration;
use symphonia::core::codecs::{CodecParameters, CodecType, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, trace};

/// Kind of elementary stream a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    /// Anything the codec registry cannot identify as audio
    Other,
}

/// Per-track metadata gathered by [`StreamContext::probe`].
#[derive(Debug, Clone)]
pub struct TrackInfo {
    /// Container-assigned track id (matches [`Packet::track_id`])
    pub id: u32,
    /// Position in the container's enumeration order
    pub index: usize,
    pub codec: CodecType,
    /// Short codec name, `"unknown"` if the registry has no decoder for it
    pub codec_name: String,
    pub media_type: MediaType,
    pub sample_format: Option<SampleFormat>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Total frames in the track, if the container states it
    pub n_frames: Option<u64>,
    /// Full codec parameters, used to open the decoder
    pub params: CodecParameters,
}

impl TrackInfo {
    /// Build track metadata from codec parameters.
    pub fn new(id: u32, index: usize, params: CodecParameters) -> Self {
        let media_type = if params.codec == CODEC_TYPE_NULL {
            MediaType::Other
        } else {
            MediaType::Audio
        };
        let codec_name = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|descriptor| descriptor.short_name.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            id,
            index,
            codec: params.codec,
            codec_name,
            media_type,
            sample_format: params.sample_format.map(SampleFormat::from),
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count() as u16),
            n_frames: params.n_frames,
            params,
        }
    }

    fn from_track(index: usize, track: &Track) -> Self {
        Self::new(track.id, index, track.codec_params.clone())
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == MediaType::Audio
    }

    /// Human-readable channel layout name.
    pub fn layout_name(&self) -> &'static str {
        match self.channels {
            Some(1) => "mono",
            Some(2) => "stereo",
            Some(6) => "5.1",
            Some(8) => "7.1",
            Some(_) => "multichannel",
            None => "unknown",
        }
    }

    /// Track length derived from frame count and rate, when both are known.
    pub fn duration(&self) -> Option<Duration> {
        match (self.n_frames, self.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => {
                Some(Duration::from_secs_f64(frames as f64 / rate as f64))
            }
            _ => None,
        }
    }

    /// Native stream parameters needed to configure the resampler.
    ///
    /// Fails with [`Error::Probe`] when the rate or channel count is unknown.
    pub fn stream_format(&self) -> Result<StreamFormat> {
        let sample_rate = self.sample_rate.filter(|&r| r > 0).ok_or_else(|| {
            Error::Probe(format!("track {} has no sample rate", self.id))
        })?;
        let channels = self.channels.filter(|&c| c > 0).ok_or_else(|| {
            Error::Probe(format!("track {} has no channel layout", self.id))
        })?;

        Ok(StreamFormat {
            sample_format: self.sample_format,
            positions: self.params.channels,
            ..StreamFormat::new(sample_rate, channels)
        })
    }
}

/// One compressed unit read from the container.
#[derive(Clone)]
pub struct Packet {
    inner: symphonia::core::formats::Packet,
}

impl Packet {
    pub fn new(track_id: u32, ts: u64, dur: u64, data: Vec<u8>) -> Self {
        Self {
            inner: symphonia::core::formats::Packet::new_from_boxed_slice(
                track_id,
                ts,
                dur,
                data.into_boxed_slice(),
            ),
        }
    }

    pub fn track_id(&self) -> u32 {
        self.inner.track_id()
    }

    pub fn ts(&self) -> u64 {
        self.inner.ts()
    }

    pub fn data(&self) -> &[u8] {
        self.inner.buf()
    }

    pub(crate) fn as_symphonia(&self) -> &symphonia::core::formats::Packet {
        &self.inner
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("track_id", &self.track_id())
            .field("ts", &self.ts())
            .field("len", &self.data().len())
            .finish()
    }
}

impl From<symphonia::core::formats::Packet> for Packet {
    fn from(inner: symphonia::core::formats::Packet) -> Self {
        Self { inner }
    }
}

/// Outcome of [`ContainerReader::read_packet`].
#[derive(Debug)]
pub enum PacketRead {
    Packet(Packet),
    /// No packets remain in any track
    Eof,
}

/// Source of tracks and compressed packets.
pub trait ContainerReader {
    /// Enumerate every track with its metadata, in container order.
    fn tracks(&mut self) -> Result<Vec<TrackInfo>>;

    /// Next packet in container order across all tracks.
    fn read_packet(&mut self) -> Result<PacketRead>;
}

/// Container reader backed by symphonia's format probe.
pub struct SymphoniaContainer {
    reader: Box<dyn FormatReader>,
}

impl SymphoniaContainer {
    /// Open the container behind `source`, inferring the format from its
    /// contents (and `hint`, when given).
    pub fn open(source: Box<dyn MediaSource>, hint: &Hint) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| match e {
                SymphoniaError::IoError(io) if io.kind() != std::io::ErrorKind::UnexpectedEof => {
                    Error::Io(io)
                }
                other => Error::Open(other.to_string()),
            })?;

        debug!("Container opened");
        Ok(Self {
            reader: probed.format,
        })
    }
}

impl ContainerReader for SymphoniaContainer {
    fn tracks(&mut self) -> Result<Vec<TrackInfo>> {
        Ok(self
            .reader
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, track)| TrackInfo::from_track(index, track))
            .collect())
    }

    fn read_packet(&mut self) -> Result<PacketRead> {
        match self.reader.next_packet() {
            Ok(packet) => Ok(PacketRead::Packet(packet.into())),
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(PacketRead::Eof)
            }
            Err(SymphoniaError::ResetRequired) => Err(Error::Read(
                "track list changed mid-stream".to_string(),
            )),
            Err(e) => Err(Error::Read(e.to_string())),
        }
    }
}

impl Drop for SymphoniaContainer {
    fn drop(&mut self) {
        debug!("Container closed");
    }
}

/// Demuxer state: the open container, its tracks and the selected track.
pub struct StreamContext<C> {
    container: C,
    tracks: Vec<TrackInfo>,
    selected: Option<usize>,
}

impl<C: ContainerReader> StreamContext<C> {
    pub fn new(container: C) -> Self {
        Self {
            container,
            tracks: Vec::new(),
            selected: None,
        }
    }

    /// Populate per-track metadata.
    pub fn probe(&mut self) -> Result<&[TrackInfo]> {
        self.tracks = self.container.tracks()?;
        for track in &self.tracks {
            debug!(
                "Track {} (#{}): codec={} type={:?} rate={:?} channels={:?}",
                track.id,
                track.index,
                track.codec_name,
                track.media_type,
                track.sample_rate,
                track.channels
            );
        }
        Ok(&self.tracks)
    }

    /// Select the first audio track in container order.
    pub fn select_audio_track(&mut self) -> Result<&TrackInfo> {
        let index = self
            .tracks
            .iter()
            .position(TrackInfo::is_audio)
            .ok_or(Error::NoAudioTrack {
                track_count: self.tracks.len(),
            })?;
        self.selected = Some(index);

        let track = &self.tracks[index];
        info!(
            "Selected audio track {}: {} {} Hz {} ({} channels)",
            track.id,
            track.codec_name,
            track.sample_rate.unwrap_or(0),
            track.layout_name(),
            track.channels.unwrap_or(0)
        );
        Ok(track)
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    pub fn selected_track(&self) -> Option<&TrackInfo> {
        self.selected.map(|index| &self.tracks[index])
    }

    /// Next packet in container order, from any track.
    pub fn read_packet(&mut self) -> Result<PacketRead> {
        let read = self.container.read_packet()?;
        if let PacketRead::Packet(ref packet) = read {
            trace!(
                "Packet: track={} ts={} {} bytes",
                packet.track_id(),
                packet.ts(),
                packet.data().len()
            );
        }
        Ok(read)
    }
}

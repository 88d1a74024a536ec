//! Pipeline setup and teardown
//!
//! Opens every stage in order, runs the driver and releases the stages in
//! reverse-of-open order:
//!
//! ```text
//! open: byte source -> container -> probe -> select track -> decoder -> resampler
//! close: resampler -> decoder -> container (owns the byte source)
//! ```
//!
//! Stages are owned locals, so the reverse order holds on every exit path,
//! including early `?` returns. A failed run never returns a partial buffer.

use crate::audio::decoder::{CodecContext, FrameDecoder};
use crate::audio::demux::{ContainerReader, StreamContext, SymphoniaContainer, TrackInfo};
use crate::audio::driver::{DecodeDriver, DecodeStats};
use crate::audio::resampler::ResampleContext;
use crate::audio::source::{ByteSource, SourceStatsHandle};
use crate::audio::types::SoundBuffer;
use crate::config::{InputMode, PipelineConfig};
use crate::error::Result;
use std::path::{Path, PathBuf};
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;
use tracing::{debug, info, instrument};

/// Factory for the container and decoder stages.
pub trait MediaBackend {
    type Container: ContainerReader;
    type Decoder: FrameDecoder;

    /// Open the byte source and the container on top of it.
    fn open_container(&mut self) -> Result<Self::Container>;

    /// Open a decoder for the selected track.
    fn open_decoder(&mut self, track: &TrackInfo) -> Result<Self::Decoder>;
}

/// Production backend: file input through [`ByteSource`] into symphonia.
pub struct SymphoniaBackend {
    path: PathBuf,
    input_mode: InputMode,
    source_stats: Option<SourceStatsHandle>,
}

impl SymphoniaBackend {
    pub fn new(path: &Path, input_mode: InputMode) -> Self {
        Self {
            path: path.to_path_buf(),
            input_mode,
            source_stats: None,
        }
    }

    /// Counters of the byte source opened by the last `open_container`.
    pub fn source_stats(&self) -> Option<&SourceStatsHandle> {
        self.source_stats.as_ref()
    }

    fn hint(&self) -> Hint {
        let mut hint = Hint::new();
        if let Some(ext) = self.path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        hint
    }
}

impl MediaBackend for SymphoniaBackend {
    type Container = SymphoniaContainer;
    type Decoder = CodecContext;

    fn open_container(&mut self) -> Result<SymphoniaContainer> {
        let source: Box<dyn MediaSource> = match self.input_mode {
            InputMode::Stream => {
                let source = ByteSource::open_file(&self.path)?;
                self.source_stats = Some(source.stats());
                Box::new(source)
            }
            InputMode::Memory => {
                let source = ByteSource::load_file(&self.path)?;
                self.source_stats = Some(source.stats());
                Box::new(source)
            }
        };

        SymphoniaContainer::open(source, &self.hint())
    }

    fn open_decoder(&mut self, track: &TrackInfo) -> Result<CodecContext> {
        CodecContext::open(track)
    }
}

/// Decode the first audio track of `path` into one sound buffer.
pub fn decode_file(path: &Path, config: &PipelineConfig) -> Result<SoundBuffer> {
    decode_file_with_stats(path, config).map(|(sound, _)| sound)
}

/// Like [`decode_file`], also returning the driver's run summary.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn decode_file_with_stats(
    path: &Path,
    config: &PipelineConfig,
) -> Result<(SoundBuffer, DecodeStats)> {
    let mut backend = SymphoniaBackend::new(path, config.input_mode);
    let (sound, mut stats) = decode_with(&mut backend, config)?;
    stats.source = backend.source_stats().map(SourceStatsHandle::snapshot);
    Ok((sound, stats))
}

/// Run the full pipeline against any backend.
pub fn decode_with<B: MediaBackend>(
    backend: &mut B,
    config: &PipelineConfig,
) -> Result<(SoundBuffer, DecodeStats)> {
    let output_layout = config.output_layout()?;

    let container = backend.open_container()?;
    let mut stream = StreamContext::new(container);
    stream.probe()?;
    let track = stream.select_audio_track()?.clone();
    let input = track.stream_format()?;

    let mut decoder = backend.open_decoder(&track)?;
    let mut resampler = ResampleContext::open(
        &input,
        output_layout,
        config.target_sample_format,
        input.sample_rate,
    )?;

    let mut sound = SoundBuffer::new(
        input.sample_rate,
        output_layout.count(),
        config.target_sample_format,
    );
    let stats = DecodeDriver::new(&mut stream, &mut decoder, &mut resampler)?.run(&mut sound)?;

    drop(resampler);
    drop(decoder);
    drop(stream);
    debug!("Pipeline closed");

    info!(
        "Decoded {} frames: {} bytes, {:.2}s at {} Hz, {} ch {} ({} staging reallocations)",
        stats.frames_decoded,
        sound.len(),
        sound.duration().as_secs_f64(),
        sound.sample_rate(),
        sound.channel_count(),
        sound.sample_format(),
        stats.staging_reallocations
    );

    Ok((sound, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::DecodeStatus;
    use crate::audio::demux::{Packet, PacketRead};
    use crate::audio::types::{Frame, SampleFormat, TargetSampleFormat};
    use crate::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;
    use symphonia::core::audio::Channels;
    use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_PCM_S16LE};

    type EventLog = Rc<RefCell<Vec<&'static str>>>;

    struct LoggedContainer {
        tracks: Vec<TrackInfo>,
        packets: Vec<Packet>,
        log: EventLog,
    }

    impl ContainerReader for LoggedContainer {
        fn tracks(&mut self) -> Result<Vec<TrackInfo>> {
            Ok(self.tracks.clone())
        }

        fn read_packet(&mut self) -> Result<PacketRead> {
            if self.packets.is_empty() {
                return Ok(PacketRead::Eof);
            }
            Ok(PacketRead::Packet(self.packets.remove(0)))
        }
    }

    impl Drop for LoggedContainer {
        fn drop(&mut self) {
            self.log.borrow_mut().push("container closed");
        }
    }

    struct LoggedDecoder {
        pending: Option<usize>,
        log: EventLog,
    }

    impl FrameDecoder for LoggedDecoder {
        fn send_packet(&mut self, packet: Packet) -> Result<()> {
            self.pending = Some(packet.data().len());
            Ok(())
        }

        fn receive_frame(&mut self, frame: &mut Frame) -> Result<DecodeStatus> {
            match self.pending.take() {
                Some(n) => {
                    frame.reset(2, n, 44100, SampleFormat::S16);
                    Ok(DecodeStatus::Frame)
                }
                None => Ok(DecodeStatus::NeedsMoreInput),
            }
        }
    }

    impl Drop for LoggedDecoder {
        fn drop(&mut self) {
            self.log.borrow_mut().push("decoder closed");
        }
    }

    struct MockBackend {
        tracks: Vec<TrackInfo>,
        packets: Vec<Packet>,
        log: EventLog,
    }

    impl MediaBackend for MockBackend {
        type Container = LoggedContainer;
        type Decoder = LoggedDecoder;

        fn open_container(&mut self) -> Result<LoggedContainer> {
            self.log.borrow_mut().push("container opened");
            Ok(LoggedContainer {
                tracks: self.tracks.clone(),
                packets: std::mem::take(&mut self.packets),
                log: Rc::clone(&self.log),
            })
        }

        fn open_decoder(&mut self, _track: &TrackInfo) -> Result<LoggedDecoder> {
            self.log.borrow_mut().push("decoder opened");
            Ok(LoggedDecoder {
                pending: None,
                log: Rc::clone(&self.log),
            })
        }
    }

    fn stereo_track(id: u32) -> TrackInfo {
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_PCM_S16LE)
            .with_sample_rate(44100)
            .with_channels(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        TrackInfo::new(id, 0, params)
    }

    fn backend(tracks: Vec<TrackInfo>, frame_sizes: &[usize]) -> MockBackend {
        MockBackend {
            tracks,
            packets: frame_sizes
                .iter()
                .map(|&n| Packet::new(1, 0, 0, vec![0; n]))
                .collect(),
            log: Rc::default(),
        }
    }

    #[test]
    fn test_no_audio_track_opens_no_decoder() {
        let mut backend = backend(vec![TrackInfo::new(1, 0, CodecParameters::new())], &[]);

        let result = decode_with(&mut backend, &PipelineConfig::default());

        assert!(matches!(result, Err(Error::NoAudioTrack { track_count: 1 })));
        assert_eq!(
            *backend.log.borrow(),
            vec!["container opened", "container closed"]
        );
    }

    #[test]
    fn test_close_in_reverse_open_order() {
        let mut backend = backend(vec![stereo_track(1)], &[64, 64]);

        let (sound, stats) = decode_with(&mut backend, &PipelineConfig::default()).unwrap();

        assert_eq!(stats.frames_decoded, 2);
        assert_eq!(sound.len(), 128 * 2 * 2);
        assert_eq!(
            *backend.log.borrow(),
            vec![
                "container opened",
                "decoder opened",
                "decoder closed",
                "container closed"
            ]
        );
    }

    #[test]
    fn test_mono_halves_byte_length() {
        let config = PipelineConfig {
            resample_to_mono: true,
            ..Default::default()
        };
        let (stereo, _) =
            decode_with(&mut backend(vec![stereo_track(1)], &[100, 50]), &PipelineConfig::default())
                .unwrap();
        let (mono, _) = decode_with(&mut backend(vec![stereo_track(1)], &[100, 50]), &config).unwrap();

        assert_eq!(mono.channel_count(), 1);
        assert_eq!(mono.len() * 2, stereo.len());
    }

    #[test]
    fn test_byte_length_law() {
        let config = PipelineConfig {
            target_sample_format: TargetSampleFormat::F32,
            ..Default::default()
        };
        let sizes = [1152, 1152, 576, 17];
        let (sound, _) = decode_with(&mut backend(vec![stereo_track(1)], &sizes), &config).unwrap();

        let expected: usize = sizes.iter().map(|n| n * 4 * 2).sum();
        assert_eq!(sound.len(), expected);
        assert_eq!(sound.frames(), sizes.iter().sum::<usize>());
    }

    #[test]
    fn test_invalid_config_opens_nothing() {
        let mut backend = backend(vec![stereo_track(1)], &[10]);
        let config = PipelineConfig {
            target_channel_count: 3,
            ..Default::default()
        };

        assert!(matches!(decode_with(&mut backend, &config), Err(Error::Config(_))));
        assert!(backend.log.borrow().is_empty());
    }

    #[test]
    fn test_missing_file_is_byte_source_error() {
        let result = decode_file(
            Path::new("/nonexistent/sndbuf/input.wav"),
            &PipelineConfig::default(),
        );
        match result {
            Err(err) => assert_eq!(err.stage(), "byte source"),
            Ok(_) => panic!("decoding a missing file succeeded"),
        }
    }
}

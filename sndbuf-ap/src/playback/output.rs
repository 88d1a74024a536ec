//! Audio output using cpal
//!
//! Uploads a finished sound buffer to an output device and plays it once.
//!
//! The device handle is explicit: [`OutputDevice::open`] returns a value the
//! caller owns, and [`OutputDevice::play`] returns a [`Playback`] that owns the
//! running stream. Completion is signalled from the audio callback thread over
//! a channel; [`Playback::wait`] blocks on that channel and polls for stalls
//! with bounded exponential backoff.

use crate::audio::types::SoundBuffer;
use crate::error::{Error, Result};
use crate::playback::backoff::PollBackoff;
use crate::playback::format::PcmFormatTag;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Messages from the audio thread.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PlaybackEvent {
    Finished,
    Failed(String),
}

/// Audio output device handle.
pub struct OutputDevice {
    device: Device,
    name: String,
}

impl OutputDevice {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// A named device that cannot be found falls back to the default device.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::AudioOutput(format!("Failed to enumerate devices: {}", e))
                })?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!(
                            "Requested device '{}' not found, falling back to default device",
                            name
                        );
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {}", name);
        Ok(Self { device, name })
    }

    pub fn device_name(&self) -> &str {
        &self.name
    }

    /// Upload `buffer` and start playing it.
    pub fn play(&self, buffer: &SoundBuffer) -> Result<Playback> {
        let tag = PcmFormatTag::for_buffer(buffer)?;
        let samples = Arc::new(tag.decode_samples(buffer.bytes()));
        let source_channels = tag.channels() as usize;
        let total_frames = samples.len() / source_channels;

        let (config, sample_format) =
            self.select_config(tag.channels(), buffer.sample_rate())?;
        debug!(
            "Stream config: {} Hz, {} channels, {:?} (buffer is {})",
            config.sample_rate.0, config.channels, sample_format, tag
        );

        let (events_tx, events_rx) = mpsc::sync_channel(4);
        let position = Arc::new(AtomicUsize::new(0));
        let feed = SampleFeed {
            samples,
            source_channels,
            position: Arc::clone(&position),
            events: events_tx.clone(),
            finished_sent: false,
        };

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream_f32(&config, feed, events_tx)?,
            SampleFormat::I16 => self.build_stream_i16(&config, feed, events_tx)?,
            SampleFormat::U16 => self.build_stream_u16(&config, feed, events_tx)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!(
            "Playing {} frames ({:.2}s) on {}",
            total_frames,
            buffer.duration().as_secs_f64(),
            self.name
        );

        Ok(Playback {
            stream,
            events: events_rx,
            position,
            total_frames,
            finished: false,
        })
    }

    /// Pick a stream config at exactly `rate` with at least `channels`
    /// channels, preferring an exact channel match, then f32 over i16 over u16.
    fn select_config(&self, channels: u16, rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let best = supported
            .filter(|range| {
                range.channels() >= channels
                    && range.min_sample_rate().0 <= rate
                    && range.max_sample_rate().0 >= rate
            })
            .filter_map(|range| format_rank(range.sample_format()).map(|rank| (rank, range)))
            .min_by_key(|(rank, range)| (range.channels() != channels, *rank));

        match best {
            Some((_, range)) => {
                let sample_format = range.sample_format();
                let config = range.with_sample_rate(cpal::SampleRate(rate)).config();
                Ok((config, sample_format))
            }
            None => Err(Error::AudioOutput(format!(
                "Device '{}' cannot play {} channels at {} Hz",
                self.name, channels, rate
            ))),
        }
    }

    fn build_stream_f32(
        &self,
        config: &StreamConfig,
        mut feed: SampleFeed,
        errors: SyncSender<PlaybackEvent>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        self.device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    feed.fill(data, channels, |s| s);
                },
                move |err| report_stream_error(&errors, err),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_i16(
        &self,
        config: &StreamConfig,
        mut feed: SampleFeed,
        errors: SyncSender<PlaybackEvent>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        self.device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    feed.fill(data, channels, |s| (s * i16::MAX as f32) as i16);
                },
                move |err| report_stream_error(&errors, err),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_u16(
        &self,
        config: &StreamConfig,
        mut feed: SampleFeed,
        errors: SyncSender<PlaybackEvent>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        self.device
            .build_output_stream(
                config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    // [-1.0, 1.0] -> [0, 65535]
                    feed.fill(data, channels, |s| ((s + 1.0) * 32767.5) as u16);
                },
                move |err| report_stream_error(&errors, err),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(0),
        SampleFormat::I16 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

fn report_stream_error(events: &SyncSender<PlaybackEvent>, err: cpal::StreamError) {
    error!("Audio stream error: {}", err);
    let _ = events.try_send(PlaybackEvent::Failed(err.to_string()));
}

/// Audio-thread side of a playback: hands out buffer samples frame by frame.
struct SampleFeed {
    samples: Arc<Vec<f32>>,
    source_channels: usize,
    /// Frames consumed so far, shared with [`Playback`]
    position: Arc<AtomicUsize>,
    events: SyncSender<PlaybackEvent>,
    finished_sent: bool,
}

impl SampleFeed {
    fn total_frames(&self) -> usize {
        self.samples.len() / self.source_channels
    }

    /// Fill one device callback buffer of `device_channels` interleaved
    /// channels. Mono sources go to every device channel; extra device
    /// channels beyond a stereo source are silent. Past the end, silence.
    ///
    /// Completion is signalled from the first callback that starts past the
    /// end: the device only asks for more once the buffer holding the tail
    /// has been taken for output.
    fn fill<T: Copy>(&mut self, data: &mut [T], device_channels: usize, convert: impl Fn(f32) -> T) {
        let total = self.total_frames();
        let mut pos = self.position.load(Ordering::Relaxed);
        let tail_consumed = pos >= total;
        let silence = convert(0.0);

        for out in data.chunks_mut(device_channels) {
            if pos >= total {
                out.fill(silence);
                continue;
            }
            let frame = &self.samples[pos * self.source_channels..(pos + 1) * self.source_channels];
            for (ch, slot) in out.iter_mut().enumerate() {
                *slot = if self.source_channels == 1 {
                    convert(frame[0])
                } else if ch < self.source_channels {
                    convert(frame[ch])
                } else {
                    silence
                };
            }
            pos += 1;
        }

        self.position.store(pos, Ordering::Relaxed);
        if tail_consumed && !self.finished_sent {
            self.finished_sent = true;
            let _ = self.events.try_send(PlaybackEvent::Finished);
        }
    }
}

/// A running playback of one sound buffer.
pub struct Playback {
    stream: Stream,
    events: Receiver<PlaybackEvent>,
    position: Arc<AtomicUsize>,
    total_frames: usize,
    finished: bool,
}

impl Playback {
    /// Frames handed to the device so far.
    pub fn position_frames(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn is_playing(&self) -> bool {
        !self.finished && self.position_frames() < self.total_frames
    }

    /// Block until the device has taken the whole buffer for output.
    ///
    /// Fails when the device reports a stream error or stops consuming
    /// samples for longer than `backoff.stall_timeout`.
    pub fn wait(&mut self, backoff: PollBackoff) -> Result<()> {
        wait_for_completion(&self.events, &self.position, backoff)?;
        self.finished = true;
        info!("Playback finished ({} frames)", self.total_frames);
        Ok(())
    }

    /// Stop playback early.
    pub fn stop(self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::AudioOutput(format!("Failed to stop stream: {}", e)))?;
        info!("Playback stopped at frame {}", self.position_frames());
        Ok(())
    }
}

fn wait_for_completion(
    events: &Receiver<PlaybackEvent>,
    position: &AtomicUsize,
    backoff: PollBackoff,
) -> Result<()> {
    let mut intervals = backoff.intervals();
    let mut last_position = position.load(Ordering::Relaxed);
    let mut last_progress = Instant::now();

    loop {
        let interval = intervals.next().unwrap_or(backoff.max);
        match events.recv_timeout(interval) {
            Ok(PlaybackEvent::Finished) => return Ok(()),
            Ok(PlaybackEvent::Failed(message)) => return Err(Error::AudioOutput(message)),
            Err(RecvTimeoutError::Timeout) => {
                let current = position.load(Ordering::Relaxed);
                if current != last_position {
                    last_position = current;
                    last_progress = Instant::now();
                } else if last_progress.elapsed() >= backoff.stall_timeout {
                    return Err(Error::AudioOutput(format!(
                        "device stopped consuming samples at frame {}",
                        current
                    )));
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::AudioOutput(
                    "audio callback ended without signalling completion".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(samples: Vec<f32>, channels: usize) -> (SampleFeed, Receiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::sync_channel(4);
        (
            SampleFeed {
                samples: Arc::new(samples),
                source_channels: channels,
                position: Arc::new(AtomicUsize::new(0)),
                events: tx,
                finished_sent: false,
            },
            rx,
        )
    }

    #[test]
    fn test_mono_feed_duplicates_to_stereo_device() {
        let (mut feed, _rx) = feed(vec![0.5, -0.5], 1);
        let mut out = [0.0f32; 4];
        feed.fill(&mut out, 2, |s| s);
        assert_eq!(out, [0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_stereo_feed_on_wider_device() {
        let (mut feed, _rx) = feed(vec![0.1, 0.2], 2);
        let mut out = [9.0f32; 4];
        feed.fill(&mut out, 4, |s| s);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_finished_signalled_once_then_silence() {
        let (mut feed, rx) = feed(vec![0.25; 3], 1);
        let mut out = [1i16; 4];

        feed.fill(&mut out, 1, |s| (s * 4.0) as i16);
        assert_eq!(out, [1, 1, 1, 0]);
        feed.fill(&mut out, 1, |s| (s * 4.0) as i16);
        assert_eq!(out, [0, 0, 0, 0]);
        feed.fill(&mut out, 1, |s| (s * 4.0) as i16);

        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::Finished));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_finished_waits_for_callback_after_tail() {
        let (mut feed, rx) = feed(vec![0.5; 4], 1);
        let mut out = [0.0f32; 4];

        // Buffer holding the last frame is still queued on the device
        feed.fill(&mut out, 1, |s| s);
        assert_eq!(out, [0.5; 4]);
        assert!(rx.try_recv().is_err());

        feed.fill(&mut out, 1, |s| s);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::Finished));
    }

    #[test]
    fn test_wait_returns_on_finished() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(PlaybackEvent::Finished).unwrap();
        let position = AtomicUsize::new(0);

        assert!(wait_for_completion(&rx, &position, PollBackoff::default()).is_ok());
    }

    #[test]
    fn test_wait_reports_stream_error() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(PlaybackEvent::Failed("device unplugged".to_string()))
            .unwrap();
        let position = AtomicUsize::new(0);

        let result = wait_for_completion(&rx, &position, PollBackoff::default());
        assert!(matches!(result, Err(Error::AudioOutput(msg)) if msg == "device unplugged"));
    }

    #[test]
    fn test_wait_detects_stall() {
        let (_tx, rx) = mpsc::sync_channel::<PlaybackEvent>(1);
        let position = AtomicUsize::new(0);
        let backoff = PollBackoff::new(
            Duration::from_millis(1),
            Duration::from_millis(4),
            Duration::from_millis(20),
        );

        let started = Instant::now();
        let result = wait_for_completion(&rx, &position, backoff);

        assert!(matches!(result, Err(Error::AudioOutput(_))));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_format_preference() {
        assert!(format_rank(SampleFormat::F32) < format_rank(SampleFormat::I16));
        assert!(format_rank(SampleFormat::I16) < format_rank(SampleFormat::U16));
        assert_eq!(format_rank(SampleFormat::I8), None);
    }
}

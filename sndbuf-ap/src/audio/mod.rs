//! Decode core: byte source, container, decoder, resampler and driver

pub mod decoder;
pub mod demux;
pub mod driver;
pub mod pipeline;
pub mod resampler;
pub mod source;
pub mod staging;
pub mod types;

pub use decoder::{CodecContext, DecodeStatus, FrameDecoder};
pub use demux::{ContainerReader, MediaType, Packet, PacketRead, StreamContext, SymphoniaContainer, TrackInfo};
pub use driver::{DecodeDriver, DecodeStats, DriverState};
pub use pipeline::{decode_file, decode_file_with_stats, decode_with, MediaBackend, SymphoniaBackend};
pub use resampler::ResampleContext;
pub use source::{ByteSource, ReadOutcome, SeekOrigin, SourceStats, SourceStatsHandle};
pub use staging::StagingBuffer;
pub use types::{ChannelLayout, Frame, SampleFormat, SoundBuffer, StreamFormat, TargetSampleFormat};

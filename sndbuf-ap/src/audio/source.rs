//! Byte source adapter
//!
//! Wraps any `Read + Seek` handle so the container reader pulls bytes through
//! it instead of opening the file itself. The adapter exposes two operations:
//! bounded reads that distinguish "end of input" from data, and seeks relative
//! to the start, the current position or the end. A request to report the
//! total stream size is always refused, so container formats that need the
//! size degrade to their size-less behavior.
//!
//! **Custom-I/O mode:** the container never sees a file path, only this adapter
//! (implemented as a symphonia [`MediaSource`]).

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use symphonia::core::io::MediaSource;
use tracing::{debug, trace};

/// Reference point for [`ByteSource::seek_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Absolute offset from the start of the stream
    Start,
    /// Relative to the current position
    Current,
    /// Relative to the end of the stream
    End,
    /// Request for the total stream size (never supported)
    SizeProbe,
}

/// Result of one bounded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were written to the front of the caller's buffer (`n > 0`
    /// unless the caller asked for zero bytes)
    Data(usize),
    /// The underlying stream is exhausted
    Eof,
}

/// Snapshot of adapter activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub bytes_read: u64,
    pub reads: u64,
    pub seeks: u64,
    /// Size probes refused
    pub rejected_size_probes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_read: AtomicU64,
    reads: AtomicU64,
    seeks: AtomicU64,
    rejected_size_probes: AtomicU64,
}

/// Shared view of a [`ByteSource`]'s counters.
///
/// Stays valid after the source itself has been moved into the container
/// reader (and after it has been dropped).
#[derive(Debug, Clone)]
pub struct SourceStatsHandle(Arc<Counters>);

impl SourceStatsHandle {
    pub fn snapshot(&self) -> SourceStats {
        SourceStats {
            bytes_read: self.0.bytes_read.load(Ordering::Relaxed),
            reads: self.0.reads.load(Ordering::Relaxed),
            seeks: self.0.seeks.load(Ordering::Relaxed),
            rejected_size_probes: self.0.rejected_size_probes.load(Ordering::Relaxed),
        }
    }
}

/// Adapter between an opened input handle and the container reader.
///
/// Owns the handle exclusively for its whole lifetime and closes it on drop.
pub struct ByteSource<R> {
    inner: R,
    seekable: bool,
    counters: Arc<Counters>,
}

impl ByteSource<File> {
    /// Open `path` for streaming reads.
    pub fn open_file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        debug!("Opened byte source {}", path.display());
        Ok(Self::new(file))
    }
}

impl ByteSource<Cursor<Vec<u8>>> {
    /// Serve an in-memory copy of the input.
    pub fn from_memory(bytes: Vec<u8>) -> Self {
        debug!("In-memory byte source: {} bytes", bytes.len());
        Self::new(Cursor::new(bytes))
    }

    /// Read the whole file at `path` into memory and serve it from there.
    pub fn load_file(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_memory(bytes))
    }
}

impl<R: Read + Seek> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            seekable: true,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Report the source as forward-only to the container reader.
    ///
    /// Seeks are still honored if the reader issues them anyway.
    pub fn sequential(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn stats(&self) -> SourceStatsHandle {
        SourceStatsHandle(Arc::clone(&self.counters))
    }

    /// Copy up to `buf.len()` bytes into `buf`.
    ///
    /// Returns [`ReadOutcome::Eof`] once the underlying stream is exhausted.
    /// Interrupted reads are retried.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Data(0));
        }

        let n = loop {
            match self.inner.read(buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        if n == 0 {
            trace!("Byte source reached end of input");
            return Ok(ReadOutcome::Eof);
        }

        self.counters.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(ReadOutcome::Data(n))
    }

    /// Reposition the stream and return the new absolute position.
    ///
    /// [`SeekOrigin::SizeProbe`] always fails with `ErrorKind::Unsupported`.
    pub fn seek_to(&mut self, offset: i64, origin: SeekOrigin) -> io::Result<u64> {
        let target = match origin {
            SeekOrigin::Start => {
                let pos = u64::try_from(offset).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("negative absolute seek offset {}", offset),
                    )
                })?;
                SeekFrom::Start(pos)
            }
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
            SeekOrigin::SizeProbe => {
                self.counters
                    .rejected_size_probes
                    .fetch_add(1, Ordering::Relaxed);
                trace!("Refusing stream size probe");
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "stream size is not available",
                ));
            }
        };

        let pos = self.inner.seek(target)?;
        self.counters.seeks.fetch_add(1, Ordering::Relaxed);
        Ok(pos)
    }
}

impl<R: Read + Seek> Read for ByteSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_chunk(buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::Eof => Ok(0),
        }
    }
}

impl<R: Read + Seek> Seek for ByteSource<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(pos) => {
                let offset = i64::try_from(pos).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range")
                })?;
                self.seek_to(offset, SeekOrigin::Start)
            }
            SeekFrom::Current(offset) => self.seek_to(offset, SeekOrigin::Current),
            SeekFrom::End(offset) => self.seek_to(offset, SeekOrigin::End),
        }
    }
}

impl<R: Read + Seek + Send + Sync> MediaSource for ByteSource<R> {
    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn byte_len(&self) -> Option<u64> {
        // The total size is never reported
        None
    }
}

impl<R> Drop for ByteSource<R> {
    fn drop(&mut self) {
        debug!(
            "Byte source closed ({} bytes in {} reads, {} seeks)",
            self.counters.bytes_read.load(Ordering::Relaxed),
            self.counters.reads.load(Ordering::Relaxed),
            self.counters.seeks.load(Ordering::Relaxed)
        );
    }
}

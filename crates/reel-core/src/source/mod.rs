//! Frame sources
//!
//! A source is the head of a render program: it produces timestamped frames
//! for the chain. Sequential sources hand out frames in play-out order and
//! report end-of-stream by returning `Ok(None)` (a normal terminal signal,
//! not an error). Random-access sources additionally serve frames by index,
//! idempotently.
//!
//! Sources that cannot honor a format constraint fail with the typed
//! [`SourceError::UnsupportedFormat`], never a catch-all.

mod buffer;
mod queued;
mod sine;
mod wav;

pub use buffer::BufferSource;
pub use queued::{QueuedSource, DEFAULT_LOOKAHEAD_SECS};
pub use sine::SineSource;
pub use wav::WavSource;

use thiserror::Error;

use crate::frame::Frame;
use crate::types::{FrameCount, MediaKind, PixelFormat, StreamLength};

/// Media format a source produces
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFormat {
    Audio { sample_rate: u32, channels: u16 },
    Video { width: u32, height: u32, format: PixelFormat },
}

impl MediaFormat {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            MediaFormat::Audio { .. } => MediaKind::Audio,
            MediaFormat::Video { .. } => MediaKind::Video,
        }
    }
}

/// Introspection data every source exposes before producing anything
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub format: MediaFormat,
    /// Frames per second (for audio, blocks per second)
    pub frame_rate: f64,
    pub frame_count: FrameCount,
    pub length: StreamLength,
}

impl SourceInfo {
    pub fn media_kind(&self) -> MediaKind {
        self.format.media_kind()
    }

    /// Nominal duration of one frame in seconds
    pub fn frame_duration(&self) -> f64 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            0.0
        }
    }
}

/// Errors a source can raise
///
/// `Decode` is recoverable: the pipeline logs it and carries the previous
/// frame through the cycle. Everything else is fatal for the stream.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source cannot produce the requested format
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A single frame failed to decode; the stream itself is still good
    #[error("decode error: {0}")]
    Decode(String),

    /// Frame index outside the source's range
    #[error("frame index {0} out of range")]
    OutOfRange(u64),

    /// This source cannot rewind
    #[error("rewind is not supported by this source")]
    RewindUnsupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the pipeline may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Decode(_))
    }
}

/// Sequential frame production
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    /// Produce the next frame in stream order
    ///
    /// `Ok(None)` marks end-of-stream. Successive frames carry
    /// non-decreasing `payout_time` until [`rewind`](Self::rewind).
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Restart the stream from the beginning
    fn rewind(&mut self) -> Result<(), SourceError>;
}

/// Frame production by index, with no ordering requirement
///
/// `frame_at` must be idempotent: the same index always yields the same
/// frame.
pub trait RandomAccessSource: FrameSource {
    fn frame_at(&mut self, index: u64) -> Result<Frame, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_recoverable() {
        assert!(SourceError::Decode("bad frame".into()).is_recoverable());
        assert!(!SourceError::UnsupportedFormat("7.1 audio".into()).is_recoverable());
        assert!(!SourceError::Io(std::io::Error::other("gone")).is_recoverable());
    }

    #[test]
    fn frame_duration_from_rate() {
        let info = SourceInfo {
            format: MediaFormat::Audio { sample_rate: 48_000, channels: 2 },
            frame_rate: 50.0,
            frame_count: FrameCount::Unknown,
            length: StreamLength::Infinite,
        };
        assert!((info.frame_duration() - 0.02).abs() < 1e-12);
    }
}

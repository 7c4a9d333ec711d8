//! In-memory frame list source

use crate::frame::{Frame, FramePayload};
use crate::types::{FrameCount, StreamLength};

use super::{FrameSource, MediaFormat, RandomAccessSource, SourceError, SourceInfo};

/// Source backed by a pre-built frame list
///
/// Serves frames sequentially and by index. Frames are cheap to clone (the
/// payload buffers are shared), so `frame_at` is idempotent by construction.
pub struct BufferSource {
    frames: Vec<Frame>,
    info: SourceInfo,
    cursor: usize,
}

impl BufferSource {
    /// Build from a non-empty frame list
    ///
    /// The format is taken from the first frame; all frames are expected to
    /// share it.
    pub fn new(frames: Vec<Frame>) -> Result<Self, SourceError> {
        let first = frames
            .first()
            .ok_or_else(|| SourceError::UnsupportedFormat("empty frame list".into()))?;

        let format = match &first.payload {
            FramePayload::Audio(a) => MediaFormat::Audio {
                sample_rate: a.sample_rate,
                channels: a.channels,
            },
            FramePayload::Video(v) => MediaFormat::Video {
                width: v.width,
                height: v.height,
                format: v.format,
            },
        };

        let frame_rate = match &first.payload {
            FramePayload::Audio(a) => {
                a.sample_rate as f64 / a.len_per_channel().max(1) as f64
            }
            // Derive from the first two timestamps; a single frame has no rate
            FramePayload::Video(_) => match frames.get(1) {
                Some(second) if second.payout_time > first.payout_time => {
                    1.0 / (second.payout_time - first.payout_time)
                }
                _ => 0.0,
            },
        };

        let length = frames
            .last()
            .map(|f| StreamLength::Seconds(f.payout_time + frame_duration(f)))
            .unwrap_or(StreamLength::Unknown);

        let info = SourceInfo {
            format,
            frame_rate,
            frame_count: FrameCount::Frames(frames.len() as u64),
            length,
        };

        Ok(Self { frames, info, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn frame_duration(frame: &Frame) -> f64 {
    match &frame.payload {
        FramePayload::Audio(a) => a.duration(),
        FramePayload::Video(_) => 0.0,
    }
}

impl FrameSource for BufferSource {
    fn info(&self) -> SourceInfo {
        self.info.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self.frames.get(self.cursor) {
            Some(frame) => {
                self.cursor += 1;
                Ok(Some(frame.clone()))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.cursor = 0;
        Ok(())
    }
}

impl RandomAccessSource for BufferSource {
    fn frame_at(&mut self, index: u64) -> Result<Frame, SourceError> {
        self.frames
            .get(index as usize)
            .cloned()
            .ok_or(SourceError::OutOfRange(index))
    }
}

//! Frame and timestamp model
//!
//! A [`Frame`] is a timestamped payload flowing through the pipeline: an
//! interleaved audio block or an image buffer, plus the absolute time at
//! which the target should play it out. Payload buffers live behind `Arc`
//! so frames move through the chain by reference; an FX that rewrites the
//! data allocates a fresh buffer and replaces the payload.

use std::sync::Arc;

use crate::types::{MediaKind, PixelFormat, Sample};

/// Interleaved audio block
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Interleaved samples, `channels` values per sample instant
    pub samples: Arc<[Sample]>,
    /// Channel count (1 = mono, 2 = stereo, ...)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Absolute offset of the first sample instant within the stream
    pub sample_offset: u64,
}

impl AudioPayload {
    pub fn new(samples: Vec<Sample>, channels: u16, sample_rate: u32, sample_offset: u64) -> Self {
        debug_assert!(channels > 0, "audio payload needs at least one channel");
        debug_assert!(
            samples.len() % channels as usize == 0,
            "interleaved buffer length must be a multiple of the channel count"
        );
        Self {
            samples: samples.into(),
            channels,
            sample_rate,
            sample_offset,
        }
    }

    /// Number of sample instants (per-channel samples) in this block
    pub fn len_per_channel(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration of this block in seconds
    pub fn duration(&self) -> f64 {
        self.len_per_channel() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Image buffer
#[derive(Debug, Clone)]
pub struct VideoPayload {
    /// Packed pixel bytes, row-major, no padding
    pub pixels: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl VideoPayload {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * format.bytes_per_pixel(),
            "pixel buffer length must match width * height * bytes_per_pixel"
        );
        Self {
            pixels: pixels.into(),
            width,
            height,
            format,
        }
    }
}

/// Payload carried by a frame
#[derive(Debug, Clone)]
pub enum FramePayload {
    Audio(AudioPayload),
    Video(VideoPayload),
}

impl FramePayload {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            FramePayload::Audio(_) => MediaKind::Audio,
            FramePayload::Video(_) => MediaKind::Video,
        }
    }
}

/// A timestamped payload
///
/// `payout_time` is the absolute play-out time in seconds on the owning
/// target's clock. Within one source's output it is monotonic non-decreasing
/// until the source is rewound.
#[derive(Debug, Clone)]
pub struct Frame {
    pub payout_time: f64,
    pub payload: FramePayload,
}

impl Frame {
    pub fn audio(payout_time: f64, payload: AudioPayload) -> Self {
        Self {
            payout_time,
            payload: FramePayload::Audio(payload),
        }
    }

    pub fn video(payout_time: f64, payload: VideoPayload) -> Self {
        Self {
            payout_time,
            payload: FramePayload::Video(payload),
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        self.payload.media_kind()
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.payload, FramePayload::Audio(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self.payload, FramePayload::Video(_))
    }

    /// Audio payload accessor, `None` for video frames
    pub fn as_audio(&self) -> Option<&AudioPayload> {
        match &self.payload {
            FramePayload::Audio(a) => Some(a),
            FramePayload::Video(_) => None,
        }
    }

    /// Video payload accessor, `None` for audio frames
    pub fn as_video(&self) -> Option<&VideoPayload> {
        match &self.payload {
            FramePayload::Video(v) => Some(v),
            FramePayload::Audio(_) => None,
        }
    }
}

//! Common types for Reel
//!
//! Fundamental types shared across the pipeline: sample/pixel primitives and
//! the introspection enums sources report through [`crate::source::SourceInfo`].

/// Default sample rate used throughout Reel (48kHz - standard professional audio rate)
/// This is the default; the actual rate is whatever the bound source reports.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default audio block size (samples per channel per frame)
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Pixel layout of a video payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale, 1 byte per pixel
    Gray8,
    /// 8-bit RGB, 3 bytes per pixel
    Rgb8,
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Which branch of the pipeline a payload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Number of frames a source can deliver, when it knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCount {
    /// Exact frame count
    Frames(u64),
    /// The source cannot tell (e.g. live capture, pipe-backed decode)
    Unknown,
}

/// Total stream duration as reported by a source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamLength {
    /// Duration in seconds
    Seconds(f64),
    /// The source cannot tell
    Unknown,
    /// The source never ends (generators, live inputs)
    Infinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_sizes() {
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
    }
}

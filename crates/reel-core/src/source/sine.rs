//! Sine test-tone source

use std::f64::consts::TAU;

use crate::frame::{AudioPayload, Frame};
use crate::types::{FrameCount, Sample, StreamLength, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};

use super::{FrameSource, MediaFormat, SourceError, SourceInfo};

/// Infinite sine generator
///
/// Produces fixed-size interleaved blocks with the same tone on every
/// channel. Mostly useful for tests and for exercising a chain without a
/// decoder, but cheap enough to use as a live input.
pub struct SineSource {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    channels: u16,
    block_size: usize,
    /// Absolute offset of the next block's first sample
    offset: u64,
    /// Optional frame cap, after which the stream ends
    limit: Option<u64>,
    produced: u64,
}

impl SineSource {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            amplitude: 0.8,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            offset: 0,
            limit: None,
            produced: 0,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// End the stream after `frames` blocks instead of running forever
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }
}

impl FrameSource for SineSource {
    fn info(&self) -> SourceInfo {
        let (frame_count, length) = match self.limit {
            Some(frames) => {
                let seconds =
                    frames as f64 * self.block_size as f64 / self.sample_rate as f64;
                (FrameCount::Frames(frames), StreamLength::Seconds(seconds))
            }
            None => (FrameCount::Unknown, StreamLength::Infinite),
        };
        SourceInfo {
            format: MediaFormat::Audio {
                sample_rate: self.sample_rate,
                channels: self.channels,
            },
            frame_rate: self.sample_rate as f64 / self.block_size as f64,
            frame_count,
            length,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if let Some(limit) = self.limit {
            if self.produced >= limit {
                return Ok(None);
            }
        }

        let step = TAU * self.frequency / self.sample_rate as f64;
        let mut samples = Vec::with_capacity(self.block_size * self.channels as usize);
        for i in 0..self.block_size {
            let value = ((self.offset + i as u64) as f64 * step).sin() as Sample * self.amplitude;
            for _ in 0..self.channels {
                samples.push(value);
            }
        }

        let payout_time = self.offset as f64 / self.sample_rate as f64;
        let payload = AudioPayload::new(samples, self.channels, self.sample_rate, self.offset);
        self.offset += self.block_size as u64;
        self.produced += 1;
        Ok(Some(Frame::audio(payout_time, payload)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.offset = 0;
        self.produced = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_times_are_monotonic_until_rewind() {
        let mut source = SineSource::new(1000.0).with_block_size(256);
        let mut last = f64::NEG_INFINITY;
        for _ in 0..32 {
            let frame = source.next_frame().unwrap().unwrap();
            assert!(frame.payout_time >= last);
            last = frame.payout_time;
        }

        source.rewind().unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.payout_time, 0.0);
    }

    #[test]
    fn frame_limit_ends_the_stream() {
        let mut source = SineSource::new(440.0).with_frame_limit(3);
        for _ in 0..3 {
            assert!(source.next_frame().unwrap().is_some());
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn blocks_are_phase_continuous() {
        let mut source = SineSource::new(1000.0).with_block_size(128);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        let a = a.as_audio().unwrap();
        let b = b.as_audio().unwrap();
        assert_eq!(b.sample_offset, 128);

        // The first sample of block 1 continues the sine of block 0
        let step = TAU * 1000.0 / 48_000.0;
        let expected = (128.0 * step).sin() as f32 * 0.8;
        assert!((b.samples[0] - expected).abs() < 1e-6);
        assert_eq!(a.samples.len(), 128);
    }
}

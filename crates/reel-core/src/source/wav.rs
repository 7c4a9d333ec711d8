//! WAV file source
//!
//! Decodes PCM WAV files via hound into fixed-size audio frames. Compressed
//! or exotic encodings are rejected with the typed unsupported-format error
//! at open time; codec handling beyond PCM lives outside this crate.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec};

use crate::frame::{AudioPayload, Frame};
use crate::types::{FrameCount, Sample, StreamLength, DEFAULT_BLOCK_SIZE};

use super::{FrameSource, MediaFormat, SourceError, SourceInfo};

/// Sequential source over a PCM WAV file
pub struct WavSource {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    /// Multiplier turning raw integer samples into [-1, 1] floats
    int_scale: f32,
    block_size: usize,
    /// Absolute offset (in sample instants) of the next block
    offset: u64,
    /// Total sample instants in the file
    total_instants: u64,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Self::open_with_block_size(path, DEFAULT_BLOCK_SIZE)
    }

    pub fn open_with_block_size(
        path: impl AsRef<Path>,
        block_size: usize,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(open_error)?;
        let spec = reader.spec();

        let int_scale = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => 1.0,
            (SampleFormat::Int, bits @ 8..=32) => 1.0 / (1u64 << (bits - 1)) as f32,
            (format, bits) => {
                return Err(SourceError::UnsupportedFormat(format!(
                    "{}: {bits}-bit {format:?} WAV",
                    path.display()
                )))
            }
        };

        let total_instants = reader.duration() as u64;
        log::debug!(
            "WavSource: opened {} ({} Hz, {} ch, {} instants)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            total_instants
        );

        Ok(Self {
            path,
            reader,
            spec,
            int_scale,
            block_size: block_size.max(1),
            offset: 0,
            total_instants,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_block(&mut self) -> Result<Vec<Sample>, SourceError> {
        let want = self.block_size * self.spec.channels as usize;
        let mut samples = Vec::with_capacity(want);

        if self.spec.sample_format == SampleFormat::Float {
            for s in self.reader.samples::<f32>().take(want) {
                samples.push(s.map_err(read_error)?);
            }
        } else {
            let scale = self.int_scale;
            for s in self.reader.samples::<i32>().take(want) {
                samples.push(s.map_err(read_error)? as f32 * scale);
            }
        }

        // Pad a short final block so downstream always sees whole instants
        let channels = self.spec.channels as usize;
        if samples.len() % channels != 0 {
            samples.resize(samples.len() + channels - samples.len() % channels, 0.0);
        }
        Ok(samples)
    }
}

fn open_error(e: hound::Error) -> SourceError {
    match e {
        hound::Error::IoError(io) => SourceError::Io(io),
        other => SourceError::UnsupportedFormat(other.to_string()),
    }
}

fn read_error(e: hound::Error) -> SourceError {
    match e {
        hound::Error::IoError(io) => SourceError::Io(io),
        other => SourceError::Decode(other.to_string()),
    }
}

impl FrameSource for WavSource {
    fn info(&self) -> SourceInfo {
        let rate = self.spec.sample_rate;
        SourceInfo {
            format: MediaFormat::Audio {
                sample_rate: rate,
                channels: self.spec.channels,
            },
            frame_rate: rate as f64 / self.block_size as f64,
            frame_count: FrameCount::Frames(self.total_instants.div_ceil(self.block_size as u64)),
            length: StreamLength::Seconds(self.total_instants as f64 / rate as f64),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let samples = self.read_block()?;
        if samples.is_empty() {
            return Ok(None);
        }

        let payout_time = self.offset as f64 / self.spec.sample_rate as f64;
        let payload = AudioPayload::new(
            samples,
            self.spec.channels,
            self.spec.sample_rate,
            self.offset,
        );
        self.offset += payload.len_per_channel() as u64;
        Ok(Some(Frame::audio(payout_time, payload)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.reader.seek(0)?;
        self.offset = 0;
        Ok(())
    }
}

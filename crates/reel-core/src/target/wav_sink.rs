//! WAV export sink
//!
//! Writes 32-bit float WAV through `hound`. The writer is created on the
//! first frame (the spec of the file comes from the frame, not the sink) and
//! finalized in `drain`. Pair with a free-run clock for faster-than-realtime
//! export.

use std::path::PathBuf;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;

use crate::frame::Frame;
use crate::fx::RenderError;
use crate::program::ProgramError;
use crate::source::{MediaFormat, SourceInfo};

use super::RenderSink;

pub struct WavSink {
    path: PathBuf,
    writer: Option<WavWriter<std::io::BufWriter<std::fs::File>>>,
    samples_written: u64,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: None, samples_written: 0 }
    }

    fn sink_error(err: hound::Error) -> RenderError {
        RenderError::Sink(format!("wav write failed: {err}"))
    }
}

impl RenderSink for WavSink {
    fn name(&self) -> &'static str {
        "wav-export"
    }

    fn accepts(&self, source: &SourceInfo) -> Result<(), ProgramError> {
        match source.format {
            MediaFormat::Audio { .. } => Ok(()),
            MediaFormat::Video { .. } => Err(ProgramError::UnsupportedFormat(
                "wav export takes audio only".into(),
            )),
        }
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let audio = frame.as_audio().ok_or(RenderError::ExpectedAudio {
            command: "wav-export",
        })?;

        if self.writer.is_none() {
            let spec = WavSpec {
                channels: audio.channels,
                sample_rate: audio.sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            };
            self.writer = Some(WavWriter::create(&self.path, spec).map_err(Self::sink_error)?);
        }

        let writer = self.writer.as_mut().ok_or(RenderError::Sink(
            "wav writer missing after creation".into(),
        ))?;
        for &sample in audio.samples.iter() {
            writer.write_sample(sample).map_err(Self::sink_error)?;
        }
        self.samples_written += audio.samples.len() as u64;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), RenderError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(Self::sink_error)?;
            info!(
                "wav export: {} samples written to {}",
                self.samples_written,
                self.path.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::AudioPayload;
    use crate::types::{FrameCount, StreamLength};

    fn audio_info() -> SourceInfo {
        SourceInfo {
            format: MediaFormat::Audio { sample_rate: 48_000, channels: 2 },
            frame_rate: 46.875,
            frame_count: FrameCount::Unknown,
            length: StreamLength::Unknown,
        }
    }

    #[test]
    fn rejects_video_sources() {
        use crate::types::PixelFormat;

        let sink = WavSink::new("/tmp/never-created.wav");
        let info = SourceInfo {
            format: MediaFormat::Video { width: 8, height: 8, format: PixelFormat::Rgb8 },
            frame_rate: 30.0,
            frame_count: FrameCount::Unknown,
            length: StreamLength::Unknown,
        };
        assert!(matches!(
            sink.accepts(&info),
            Err(ProgramError::UnsupportedFormat(_))
        ));
        assert!(sink.accepts(&audio_info()).is_ok());
    }

    #[test]
    fn writes_a_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut sink = WavSink::new(&path);
        for i in 0..4u64 {
            let frame = Frame::audio(
                i as f64 * 0.01,
                AudioPayload::new(vec![0.25; 960], 2, 48_000, i * 480),
            );
            sink.render(&frame).unwrap();
        }
        sink.drain().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48_000);
        assert_eq!(reader.duration(), 4 * 480);
        let first = reader.samples::<f32>().next().unwrap().unwrap();
        assert_eq!(first, 0.25);
    }

    #[test]
    fn drain_without_frames_is_a_no_op() {
        let mut sink = WavSink::new("/tmp/never-created-either.wav");
        sink.drain().unwrap();
        assert!(!std::path::Path::new("/tmp/never-created-either.wav").exists());
    }
}

//! Audio device sink via CPAL
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated owner
//! thread for its whole life; the sink that travels to the render thread
//! only holds the producer side of a lock-free ring. The device callback
//! pops from the ring and zero-fills on underrun.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{bounded, Sender};
use log::{error, warn};
use rtrb::RingBuffer;

use crate::frame::Frame;
use crate::fx::RenderError;
use crate::program::ProgramError;
use crate::source::{MediaFormat, SourceInfo};

use super::RenderSink;

// Ring sized for ~250 ms at 48 kHz stereo; render blocks briefly when full.
const RING_SAMPLES: usize = 24_000;
const PUSH_RETRY: Duration = Duration::from_millis(1);

pub struct CpalSink {
    sample_rate: u32,
    channels: u16,
    producer: rtrb::Producer<f32>,
    _shutdown: Sender<()>,
}

impl CpalSink {
    /// Open the default output device at the given format
    ///
    /// Fails if no device is available or the device refuses the format.
    pub fn open(sample_rate: u32, channels: u16) -> Result<Self, RenderError> {
        let (producer, consumer) = RingBuffer::<f32>::new(RING_SAMPLES);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        std::thread::Builder::new()
            .name("reel-cpal-output".into())
            .spawn(move || {
                let stream = match build_stream(sample_rate, channels, consumer) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(err) = stream.play() {
                    let _ = ready_tx.send(Err(format!("failed to start stream: {err}")));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // Keep the stream alive until the sink drops
                let _ = shutdown_rx.recv();
            })?;

        ready_rx
            .recv()
            .map_err(|_| RenderError::Sink("cpal owner thread died".into()))?
            .map_err(RenderError::Sink)?;

        Ok(Self {
            sample_rate,
            channels,
            producer,
            _shutdown: shutdown_tx,
        })
    }
}

fn build_stream(
    sample_rate: u32,
    channels: u16,
    mut consumer: rtrb::Consumer<f32>,
) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "no default output device".to_string())?;

    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    device
        .build_output_stream(
            &config,
            move |out: &mut [f32], _| {
                let mut underrun = 0usize;
                for sample in out.iter_mut() {
                    match consumer.pop() {
                        Ok(s) => *sample = s,
                        Err(_) => {
                            *sample = 0.0;
                            underrun += 1;
                        }
                    }
                }
                // Whole-buffer underruns are normal before the first frame
                if underrun > 0 && underrun < out.len() {
                    warn!("audio output underrun: {underrun} samples zero-filled");
                }
            },
            |err| error!("audio output stream error: {err}"),
            None,
        )
        .map_err(|err| format!("failed to build output stream: {err}"))
}

impl RenderSink for CpalSink {
    fn name(&self) -> &'static str {
        "cpal-output"
    }

    fn accepts(&self, source: &SourceInfo) -> Result<(), ProgramError> {
        match source.format {
            MediaFormat::Audio { sample_rate, channels }
                if sample_rate == self.sample_rate && channels == self.channels =>
            {
                Ok(())
            }
            MediaFormat::Audio { sample_rate, channels } => {
                Err(ProgramError::UnsupportedFormat(format!(
                    "device runs {} Hz / {} ch, source is {} Hz / {} ch",
                    self.sample_rate, self.channels, sample_rate, channels
                )))
            }
            MediaFormat::Video { .. } => Err(ProgramError::UnsupportedFormat(
                "audio device takes audio only".into(),
            )),
        }
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let audio = frame.as_audio().ok_or(RenderError::ExpectedAudio {
            command: "cpal-output",
        })?;

        // Device backpressure: block in short steps until the ring drains
        for &sample in audio.samples.iter() {
            let mut value = sample;
            loop {
                match self.producer.push(value) {
                    Ok(()) => break,
                    Err(rtrb::PushError::Full(rejected)) => {
                        if self.producer.is_abandoned() {
                            return Err(RenderError::Sink("audio device stream gone".into()));
                        }
                        value = rejected;
                        std::thread::sleep(PUSH_RETRY);
                    }
                }
            }
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), RenderError> {
        // Let the callback play out what is still queued
        while self.producer.slots() < RING_SAMPLES {
            if self.producer.is_abandoned() {
                return Err(RenderError::Sink("audio device stream gone".into()));
            }
            std::thread::sleep(PUSH_RETRY);
        }
        Ok(())
    }
}

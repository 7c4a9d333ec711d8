//! Render targets
//!
//! A target owns one render thread. Each cycle pulls a frame from the bound
//! program's source, runs it through the FX chain, parks until the frame's
//! payout time on the target's clock, then hands it to the sink. Exactly one
//! program is bound at a time, and every per-command state the chain creates
//! lives on this thread alone.

mod priority;
mod sink;
mod timebase;
mod wav_sink;

#[cfg(feature = "cpal-output")]
mod cpal_sink;

pub use priority::ThreadPriority;
pub use sink::{CollectSink, NullSink, RenderSink};
pub use timebase::{FreeRunTimebase, ManualTimebase, MonotonicTimebase, Timebase};
pub use wav_sink::WavSink;

#[cfg(feature = "cpal-output")]
pub use cpal_sink::CpalSink;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver};
use log::{debug, info, warn};
use thiserror::Error;

use crate::frame::Frame;
use crate::fx::{CommandId, CommandState, Cycle, RenderCommand, RenderError};
use crate::program::{ProgramError, RenderProgram, Stage};
use crate::source::SourceInfo;

/// Process-unique target identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TargetId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a command gets to know about the target it runs on
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub id: TargetId,
    pub name: String,
    /// Introspection data of the bound program's source
    pub source: SourceInfo,
}

#[cfg(test)]
impl TargetInfo {
    /// Mono 48 kHz audio target for command tests
    pub(crate) fn for_tests() -> Self {
        use crate::source::MediaFormat;
        use crate::types::{FrameCount, StreamLength, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};

        TargetInfo {
            id: TargetId::next(),
            name: "test".into(),
            source: SourceInfo {
                format: MediaFormat::Audio {
                    sample_rate: DEFAULT_SAMPLE_RATE,
                    channels: 1,
                },
                frame_rate: DEFAULT_SAMPLE_RATE as f64 / DEFAULT_BLOCK_SIZE as f64,
                frame_count: FrameCount::Unknown,
                length: StreamLength::Infinite,
            },
        }
    }
}

/// Target lifecycle errors
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("target is already running")]
    AlreadyRunning,

    #[error("target is not running")]
    NotRunning,

    #[error("no program bound to the target")]
    NoProgram,

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("render thread panicked")]
    ThreadPanic,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Totals reported by a finished render thread
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    /// Frames delivered to the sink
    pub frames: u64,
    /// Payout time of the last delivered frame
    pub last_payout: f64,
}

type Outcome = (Box<dyn RenderSink>, Result<CycleStats, RenderError>);

struct Running {
    handle: JoinHandle<()>,
    outcome: Receiver<Outcome>,
    stop: Arc<AtomicBool>,
}

/// A scheduled delivery point for one program
///
/// The sink decides the target's capability and which source formats it
/// accepts; both are checked in [`use_program`](RenderTarget::use_program),
/// so a running target never revisits them.
pub struct RenderTarget {
    id: TargetId,
    name: String,
    priority: ThreadPriority,
    timebase: Arc<dyn Timebase>,
    sink: Option<Box<dyn RenderSink>>,
    program: Option<Arc<RenderProgram>>,
    slot: Arc<Mutex<Option<Frame>>>,
    running: Option<Running>,
}

impl RenderTarget {
    pub fn new(name: impl Into<String>, sink: Box<dyn RenderSink>) -> Self {
        Self::with_timebase(name, sink, Arc::new(MonotonicTimebase::new()))
    }

    pub fn with_timebase(
        name: impl Into<String>,
        sink: Box<dyn RenderSink>,
        timebase: Arc<dyn Timebase>,
    ) -> Self {
        Self {
            id: TargetId::next(),
            name: name.into(),
            priority: ThreadPriority::Normal,
            timebase,
            sink: Some(sink),
            program: None,
            slot: Arc::new(Mutex::new(None)),
            running: None,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scheduling class applied to the render thread at start
    pub fn set_priority(&mut self, priority: ThreadPriority) {
        self.priority = priority;
    }

    /// Bind a program, validating it against the sink
    ///
    /// Checks run here, not per cycle: the chain's capability must match the
    /// sink's, the sink must accept the source's format, and the program must
    /// not already be bound elsewhere. Replaces (and releases) any program
    /// bound before.
    pub fn use_program(&mut self, program: Arc<RenderProgram>) -> Result<(), TargetError> {
        if self.running.is_some() {
            return Err(TargetError::AlreadyRunning);
        }
        let sink = self.sink.as_ref().ok_or(TargetError::NotRunning)?;

        if let Some(chain_cap) = program.capability() {
            if chain_cap != sink.capability() {
                return Err(ProgramError::CapabilityMismatch {
                    chain: chain_cap,
                    target: sink.capability(),
                }
                .into());
            }
        }
        sink.accepts(program.source_info())?;
        program.bind()?;

        if let Some(old) = self.program.take() {
            old.unbind();
        }
        self.program = Some(program);
        Ok(())
    }

    /// Spawn the render thread
    pub fn start(&mut self) -> Result<(), TargetError> {
        if self.running.is_some() {
            return Err(TargetError::AlreadyRunning);
        }
        let program = self.program.clone().ok_or(TargetError::NoProgram)?;
        let mut sink = self.sink.take().ok_or(TargetError::NoProgram)?;

        let info = TargetInfo {
            id: self.id,
            name: self.name.clone(),
            source: program.source_info().clone(),
        };
        let timebase = Arc::clone(&self.timebase);
        let slot = Arc::clone(&self.slot);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let priority = self.priority;
        let (tx, rx) = bounded::<Outcome>(1);

        let handle = std::thread::Builder::new()
            .name(format!("reel-target-{}", self.name))
            .spawn(move || {
                priority.apply();
                let result = run_cycles(
                    &info,
                    &program,
                    sink.as_mut(),
                    timebase.as_ref(),
                    &slot,
                    &stop_flag,
                );
                match &result {
                    Ok(stats) => info!(
                        "target {}: stopped after {} frames (t = {:.3})",
                        info.name, stats.frames, stats.last_payout
                    ),
                    Err(err) => warn!("target {}: render thread failed: {err}", info.name),
                }
                let _ = tx.send((sink, result));
            })?;

        self.running = Some(Running { handle, outcome: rx, stop });
        Ok(())
    }

    /// Whether the render thread is still alive
    ///
    /// Turns false on its own when the source reaches end-of-stream.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the render thread and collect its outcome
    ///
    /// Safe to call after the thread already ended on its own (end-of-stream
    /// or a fatal error); the outcome is returned either way.
    pub fn stop(&mut self) -> Result<CycleStats, TargetError> {
        let running = self.running.take().ok_or(TargetError::NotRunning)?;
        running.stop.store(true, Ordering::Release);
        if running.handle.join().is_err() {
            return Err(TargetError::ThreadPanic);
        }
        let (sink, result) = running
            .outcome
            .recv()
            .map_err(|_| TargetError::ThreadPanic)?;
        self.sink = Some(sink);
        Ok(result?)
    }

    /// Current time on the target's clock
    pub fn get_time(&self) -> f64 {
        self.timebase.now()
    }

    /// The most recent frame that completed the chain, if any
    pub fn get_frame(&self) -> Option<Frame> {
        self.slot.lock().expect("frame slot poisoned").clone()
    }

    /// Seed or override the visible frame (e.g. a still while stopped)
    pub fn set_frame(&self, frame: Option<Frame>) {
        *self.slot.lock().expect("frame slot poisoned") = frame;
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop.store(true, Ordering::Release);
            let _ = running.handle.join();
        }
        if let Some(program) = self.program.take() {
            program.unbind();
        }
    }
}

fn run_cycles(
    info: &TargetInfo,
    program: &RenderProgram,
    sink: &mut dyn RenderSink,
    timebase: &dyn Timebase,
    slot: &Mutex<Option<Frame>>,
    stop: &AtomicBool,
) -> Result<CycleStats, RenderError> {
    let mut states: HashMap<CommandId, Option<CommandState>> = HashMap::new();
    let mut chain = program.chain();
    let mut held: Option<Frame> = None;
    let mut stats = CycleStats::default();

    while !stop.load(Ordering::Acquire) {
        // Pick up chain edits between cycles; drop states of removed stages
        let current = program.chain();
        if !Arc::ptr_eq(&chain, &current) {
            chain = current;
            states.retain(|id, _| chain.iter().any(|s| s.id == *id));
            debug!("target {}: chain swapped, {} stages", info.name, chain.len());
        }

        let mut frame = match program.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) if err.is_recoverable() => {
                warn!("target {}: {err}, holding previous frame", info.name);
                match held.clone() {
                    Some(frame) => frame,
                    None => continue,
                }
            }
            Err(err) => return Err(err.into()),
        };

        let now = timebase.now();
        for stage in chain.iter() {
            run_stage(info, stage, &mut states, now, &mut frame)?;
        }

        stats.frames += 1;
        stats.last_payout = frame.payout_time;
        *slot.lock().expect("frame slot poisoned") = Some(frame.clone());

        timebase.sleep_until(frame.payout_time);
        sink.render(&frame)?;
        held = Some(frame);
    }

    sink.drain()?;
    Ok(stats)
}

fn run_stage(
    info: &TargetInfo,
    stage: &Stage,
    states: &mut HashMap<CommandId, Option<CommandState>>,
    now: f64,
    frame: &mut Frame,
) -> Result<(), RenderError> {
    // State is created lazily, once per (command, target) pair
    let state = states
        .entry(stage.id)
        .or_insert_with(|| stage.fx.make_state(info));
    let mut cycle = Cycle::new(info, now, frame, state.as_mut());
    stage.fx.run(&mut cycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::AudioPayload;
    use crate::fx::GainFx;
    use crate::source::{BufferSource, SineSource};
    use std::time::Duration;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                Frame::audio(
                    i as f64 * 0.01,
                    AudioPayload::new(vec![0.5; 480], 1, 48_000, i as u64 * 480),
                )
            })
            .collect()
    }

    fn free_run_target(sink: Box<dyn RenderSink>) -> RenderTarget {
        RenderTarget::with_timebase("test", sink, Arc::new(FreeRunTimebase::new()))
    }

    #[test]
    fn runs_to_end_of_stream_and_stops() {
        let sink = CollectSink::new();
        let collected = sink.frames_handle();
        let mut target = free_run_target(Box::new(sink));

        let source = BufferSource::new(frames(16)).unwrap();
        let program = Arc::new(RenderProgram::new(Box::new(source)));
        program.push(Arc::new(GainFx::with_gain(2.0))).unwrap();

        target.use_program(Arc::clone(&program)).unwrap();
        target.start().unwrap();

        while target.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        let stats = target.stop().unwrap();

        assert_eq!(stats.frames, 16);
        let out = collected.lock().unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(out[0].as_audio().unwrap().samples[0], 1.0);
        assert!(!target.is_running());
    }

    #[test]
    fn delivered_frames_keep_payout_order() {
        let sink = CollectSink::new();
        let collected = sink.frames_handle();
        let mut target = free_run_target(Box::new(sink));

        let source = BufferSource::new(frames(8)).unwrap();
        let program = Arc::new(RenderProgram::new(Box::new(source)));
        target.use_program(program).unwrap();
        target.start().unwrap();
        while target.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        target.stop().unwrap();

        let out = collected.lock().unwrap();
        let times: Vec<f64> = out.iter().map(|f| f.payout_time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]), "{times:?}");
    }

    #[test]
    fn chain_swap_never_loses_a_frame() {
        let sink = CollectSink::new();
        let collected = sink.frames_handle();
        let mut target = free_run_target(Box::new(sink));

        let source = BufferSource::new(frames(64)).unwrap();
        let program = Arc::new(RenderProgram::new(Box::new(source)));
        let first = program.push(Arc::new(GainFx::with_gain(2.0))).unwrap();

        target.use_program(Arc::clone(&program)).unwrap();
        target.start().unwrap();

        // Swap the chain while the thread is pulling frames
        std::thread::sleep(Duration::from_millis(2));
        program
            .replace(first, Arc::new(GainFx::with_gain(3.0)))
            .unwrap();

        while target.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        let stats = target.stop().unwrap();
        assert_eq!(stats.frames, 64);

        // Every frame went through exactly one of the two chains
        let out = collected.lock().unwrap();
        assert_eq!(out.len(), 64);
        for frame in out.iter() {
            let s = frame.as_audio().unwrap().samples[0];
            assert!((s - 1.0).abs() < 1e-6 || (s - 1.5).abs() < 1e-6, "sample {s}");
        }
    }

    #[test]
    fn second_bind_of_one_program_is_refused() {
        let program = Arc::new(RenderProgram::new(Box::new(SineSource::new(440.0))));
        let mut a = free_run_target(Box::new(NullSink));
        let mut b = free_run_target(Box::new(NullSink));

        a.use_program(Arc::clone(&program)).unwrap();
        assert!(matches!(
            b.use_program(program),
            Err(TargetError::Program(ProgramError::AlreadyBound))
        ));
    }

    #[test]
    fn gpu_chain_is_refused_by_a_frame_sink() {
        use crate::fx::{Capability, RenderCommand};

        struct GpuStub;
        impl RenderCommand for GpuStub {
            fn name(&self) -> &'static str {
                "gpu-stub"
            }
            fn capability(&self) -> Capability {
                Capability::Gpu
            }
            fn run(&self, _cycle: &mut Cycle<'_>) -> Result<(), RenderError> {
                Ok(())
            }
        }

        let program = Arc::new(RenderProgram::new(Box::new(SineSource::new(440.0))));
        program.push(Arc::new(GpuStub)).unwrap();

        let mut target = free_run_target(Box::new(NullSink));
        assert!(matches!(
            target.use_program(program),
            Err(TargetError::Program(ProgramError::CapabilityMismatch { .. }))
        ));
    }

    #[test]
    fn spectral_fx_mutes_a_band_end_to_end() {
        use crate::fx::{RenderCommand, SpectralBandGainFx};
        use crate::param::find_param;

        let sink = CollectSink::new();
        let collected = sink.frames_handle();
        let mut target = free_run_target(Box::new(sink));

        let source = SineSource::new(1000.0).with_frame_limit(16);
        let program = Arc::new(RenderProgram::new(Box::new(source)));
        let fx = Arc::new(SpectralBandGainFx::new(100.0));
        find_param(fx.params(), "low").unwrap().set(500.0);
        find_param(fx.params(), "high").unwrap().set(1500.0);
        find_param(fx.params(), "band_gain").unwrap().set(0.0);
        program.push(fx).unwrap();

        target.use_program(program).unwrap();
        target.start().unwrap();
        while target.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        let stats = target.stop().unwrap();
        assert_eq!(stats.frames, 16);

        // After FFT latency settles, the 1 kHz tone is gone
        let out = collected.lock().unwrap();
        let last = out.last().unwrap().as_audio().unwrap();
        let rms = (last.samples.iter().map(|s| s * s).sum::<f32>()
            / last.samples.len() as f32)
            .sqrt();
        assert!(rms < 0.02, "band not removed: rms {rms}");
    }

    #[test]
    fn stop_without_start_fails() {
        let mut target = free_run_target(Box::new(NullSink));
        assert!(matches!(target.stop(), Err(TargetError::NotRunning)));
    }

    #[test]
    fn start_without_program_fails() {
        let mut target = free_run_target(Box::new(NullSink));
        assert!(matches!(target.start(), Err(TargetError::NoProgram)));
    }

    #[test]
    fn slot_tracks_the_latest_frame() {
        let mut target = free_run_target(Box::new(NullSink));
        assert!(target.get_frame().is_none());

        let source = BufferSource::new(frames(4)).unwrap();
        let program = Arc::new(RenderProgram::new(Box::new(source)));
        target.use_program(program).unwrap();
        target.start().unwrap();
        while target.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        target.stop().unwrap();

        let last = target.get_frame().expect("slot seeded by the run");
        assert!((last.payout_time - 0.03).abs() < 1e-9);
    }
}

//! Render commands (FX) and per-target state
//!
//! An FX is one stage of a render program. Commands are shared immutably
//! between the control thread and the render thread; anything mutable lives
//! either in atomic parameter slots ([`crate::param::Param`]) or in
//! per-target state that only the owning target's cycle thread ever touches.
//!
//! Per-target state is keyed by [`CommandId`], a stable handle the program
//! assigns to each stage - running the same FX on two targets yields two
//! independent states.

mod brightness;
mod gain;
mod spectral;

pub use brightness::BrightnessFx;
pub use gain::GainFx;
pub use spectral::SpectralBandGainFx;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::dsp::SpectralError;
use crate::frame::Frame;
use crate::param::Param;
use crate::source::SourceError;
use crate::target::TargetInfo;

/// Which domain a command transforms in
///
/// A program must be homogeneous: frame-domain and GPU-domain commands never
/// mix in one chain. Validated once when the program is built and bound,
/// never per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// CPU-side transform on the frame payload
    Frame,
    /// Transform expressed against GPU resources (textures, shader passes)
    Gpu,
}

/// Stable identity of one stage in a program
///
/// Allocated from a process-wide counter, so state tables never rely on
/// pointer identity or hashing of the command object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        CommandId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mutable state private to one (command, target) pair
///
/// Created lazily the first time the command runs against a target and
/// dropped when the target stops.
pub type CommandState = Box<dyn Any + Send>;

/// Errors raised while running a command or rendering to a sink
///
/// These are fatal for the target's thread; recoverable decode problems are
/// [`SourceError::Decode`] and get absorbed by the cycle loop before any
/// command runs.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{command} expects an audio frame")]
    ExpectedAudio { command: &'static str },

    #[error("{command} expects a video frame")]
    ExpectedVideo { command: &'static str },

    #[error("{command} ran without its per-target state")]
    MissingState { command: &'static str },

    #[error("{command} found per-target state of the wrong type")]
    StateType { command: &'static str },

    #[error("spectral processing failed: {0}")]
    Spectral(#[from] SpectralError),

    #[error("source failure: {0}")]
    Source(#[from] SourceError),

    #[error("sink failure: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a command sees during one cycle
///
/// The current frame enters from the source (or the previous command), and
/// whatever is left here when the command returns flows on down the chain.
pub struct Cycle<'a> {
    target: &'a TargetInfo,
    now: f64,
    frame: &'a mut Frame,
    state: Option<&'a mut CommandState>,
}

impl<'a> Cycle<'a> {
    pub(crate) fn new(
        target: &'a TargetInfo,
        now: f64,
        frame: &'a mut Frame,
        state: Option<&'a mut CommandState>,
    ) -> Self {
        Self { target, now, frame, state }
    }

    /// The target this cycle runs on
    pub fn target(&self) -> &TargetInfo {
        self.target
    }

    /// Current time on the target's clock
    pub fn now(&self) -> f64 {
        self.now
    }

    /// The frame as produced by the upstream stage
    pub fn frame(&self) -> &Frame {
        self.frame
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        self.frame
    }

    /// Replace the frame flowing down the chain
    pub fn replace_frame(&mut self, frame: Frame) {
        *self.frame = frame;
    }

    /// Typed access to this command's per-target state
    ///
    /// Fails if the command never declared state ([`RenderCommand::make_state`]
    /// returned `None`) or if the downcast type does not match.
    pub fn state<T: Any + Send>(&mut self, command: &'static str) -> Result<&mut T, RenderError> {
        match self.state.as_deref_mut() {
            None => Err(RenderError::MissingState { command }),
            Some(boxed) => boxed
                .downcast_mut::<T>()
                .ok_or(RenderError::StateType { command }),
        }
    }
}

/// One stage of a render program
///
/// Implementations are shared (`&self`) between threads; see the module
/// docs for where mutable state belongs.
pub trait RenderCommand: Send + Sync {
    /// Short stable name, used in logs and error messages
    fn name(&self) -> &'static str;

    fn capability(&self) -> Capability {
        Capability::Frame
    }

    /// Declared parameters, enumerable by any control surface
    fn params(&self) -> &[Param] {
        &[]
    }

    /// Build per-target state, or `None` for stateless commands
    fn make_state(&self, target: &TargetInfo) -> Option<CommandState> {
        let _ = target;
        None
    }

    /// Transform the cycle's current frame
    fn run(&self, cycle: &mut Cycle<'_>) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_are_unique_and_ordered() {
        let a = CommandId::next();
        let b = CommandId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(format!("{a}"), format!("#{}", a.0));
    }
}

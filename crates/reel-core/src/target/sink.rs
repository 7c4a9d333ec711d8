//! Render sinks
//!
//! The tail end of a target: whatever consumes finished frames. Sinks run on
//! the target's render thread, so `render` may block briefly (device
//! backpressure) but must never spin unbounded.

use std::sync::{Arc, Mutex};

use crate::frame::Frame;
use crate::fx::{Capability, RenderError};
use crate::program::ProgramError;
use crate::source::SourceInfo;

pub trait RenderSink: Send {
    /// Short stable name, used in logs and error messages
    fn name(&self) -> &'static str;

    /// Which command domain this sink can consume
    fn capability(&self) -> Capability {
        Capability::Frame
    }

    /// Validate a source format before any thread starts
    fn accepts(&self, source: &SourceInfo) -> Result<(), ProgramError>;

    /// Deliver one finished frame, already at its payout time
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError>;

    /// Flush buffered output when the target stops
    fn drain(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Discards every frame; accepts anything
pub struct NullSink;

impl RenderSink for NullSink {
    fn name(&self) -> &'static str {
        "null"
    }

    fn accepts(&self, _source: &SourceInfo) -> Result<(), ProgramError> {
        Ok(())
    }

    fn render(&mut self, _frame: &Frame) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Collects frames into a shared vector
///
/// The handle survives the sink moving onto the render thread, so tests can
/// inspect delivery while (or after) the target runs.
pub struct CollectSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self { frames: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn frames_handle(&self) -> Arc<Mutex<Vec<Frame>>> {
        Arc::clone(&self.frames)
    }
}

impl Default for CollectSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for CollectSink {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn accepts(&self, _source: &SourceInfo) -> Result<(), ProgramError> {
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.frames
            .lock()
            .map_err(|_| RenderError::Sink("collect buffer poisoned".into()))?
            .push(frame.clone());
        Ok(())
    }
}

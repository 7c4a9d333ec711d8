//! reel-core: a streaming media pipeline
//!
//! Frames flow from a [`source`](crate::source), through a
//! [`program`](crate::program)'s ordered FX chain, to a
//! [`target`](crate::target) that delivers each frame to its sink at the
//! frame's payout time. Programs can be edited while their target runs;
//! parameters are live-tunable; audio FX can work in the frequency domain
//! through the windowed FFT engine in [`dsp`](crate::dsp).
//!
//! ```no_run
//! use std::sync::Arc;
//! use reel_core::fx::GainFx;
//! use reel_core::program::RenderProgram;
//! use reel_core::source::SineSource;
//! use reel_core::target::{NullSink, RenderTarget};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let program = Arc::new(RenderProgram::new(Box::new(SineSource::new(440.0))));
//! let gain = program.push(Arc::new(GainFx::with_gain(0.5)))?;
//!
//! let mut target = RenderTarget::new("monitor", Box::new(NullSink));
//! target.use_program(Arc::clone(&program))?;
//! target.start()?;
//! // ... edit the chain, tune parameters ...
//! program.remove(gain)?;
//! target.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dsp;
pub mod frame;
pub mod fx;
pub mod param;
pub mod program;
pub mod source;
pub mod target;
pub mod types;

pub use config::PipelineConfig;
pub use frame::{AudioPayload, Frame, FramePayload, VideoPayload};
pub use fx::{Capability, CommandId, RenderCommand, RenderError};
pub use param::{Param, ParamKind, ParamSpec};
pub use program::{ProgramError, RenderProgram};
pub use source::{FrameSource, RandomAccessSource, SourceError, SourceInfo};
pub use target::{RenderSink, RenderTarget, TargetError, TargetInfo};

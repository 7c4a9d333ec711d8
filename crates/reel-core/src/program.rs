//! Render programs
//!
//! A [`RenderProgram`] is an ordered chain `[source, fx_1 .. fx_n]` bound to
//! exactly one target. The FX chain is published as an immutable snapshot
//! behind a mutex: control-thread edits build a new snapshot and swap it in,
//! the render thread clones the current `Arc` at the top of each cycle.
//! No cycle ever observes a half-edited chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::frame::Frame;
use crate::fx::{Capability, CommandId, RenderCommand};
use crate::source::{FrameSource, SourceError, SourceInfo};

/// Program construction and binding errors
///
/// All of these are configuration errors: non-retryable, reported
/// synchronously before a render thread starts.
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("FX chain mixes frame-domain and GPU-domain commands")]
    MixedCapabilities,

    #[error("chain capability {chain:?} does not match target capability {target:?}")]
    CapabilityMismatch { chain: Capability, target: Capability },

    #[error("program is already bound to a target")]
    AlreadyBound,

    #[error("no command {0} in the chain")]
    CommandNotFound(CommandId),

    #[error("source format not supported by target: {0}")]
    UnsupportedFormat(String),
}

/// One stage of the chain: a command plus its stable identity
#[derive(Clone)]
pub struct Stage {
    pub id: CommandId,
    pub fx: Arc<dyn RenderCommand>,
}

type Chain = Arc<[Stage]>;

pub struct RenderProgram {
    source: Mutex<Box<dyn FrameSource>>,
    source_info: SourceInfo,
    chain: Mutex<Chain>,
    bound: AtomicBool,
}

impl RenderProgram {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        let source_info = source.info();
        Self {
            source: Mutex::new(source),
            source_info,
            chain: Mutex::new(Arc::from(Vec::new().into_boxed_slice())),
            bound: AtomicBool::new(false),
        }
    }

    /// Introspection data captured from the source at construction
    pub fn source_info(&self) -> &SourceInfo {
        &self.source_info
    }

    /// Append a command, returning its stage id
    ///
    /// Rejected if the command's capability differs from the existing
    /// chain's.
    pub fn push(&self, fx: Arc<dyn RenderCommand>) -> Result<CommandId, ProgramError> {
        let mut guard = self.chain.lock().expect("chain lock poisoned");
        if let Some(cap) = chain_capability(&guard) {
            if cap != fx.capability() {
                return Err(ProgramError::MixedCapabilities);
            }
        }
        let id = CommandId::next();
        let mut stages: Vec<Stage> = guard.to_vec();
        stages.push(Stage { id, fx });
        *guard = stages.into();
        Ok(id)
    }

    /// Atomically swap one stage for a new command
    ///
    /// The render thread either sees the whole old chain or the whole new
    /// one. Returns the new stage's id.
    pub fn replace(
        &self,
        old: CommandId,
        fx: Arc<dyn RenderCommand>,
    ) -> Result<CommandId, ProgramError> {
        let mut guard = self.chain.lock().expect("chain lock poisoned");
        let position = guard
            .iter()
            .position(|s| s.id == old)
            .ok_or(ProgramError::CommandNotFound(old))?;

        // Capability of the rest of the chain still has to hold
        let other_cap = guard
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, s)| s.fx.capability())
            .next();
        if let Some(cap) = other_cap {
            if cap != fx.capability() {
                return Err(ProgramError::MixedCapabilities);
            }
        }

        let id = CommandId::next();
        let mut stages: Vec<Stage> = guard.to_vec();
        stages[position] = Stage { id, fx };
        *guard = stages.into();
        Ok(id)
    }

    /// Remove one stage
    pub fn remove(&self, id: CommandId) -> Result<(), ProgramError> {
        let mut guard = self.chain.lock().expect("chain lock poisoned");
        let position = guard
            .iter()
            .position(|s| s.id == id)
            .ok_or(ProgramError::CommandNotFound(id))?;
        let mut stages: Vec<Stage> = guard.to_vec();
        stages.remove(position);
        *guard = stages.into();
        Ok(())
    }

    /// Drop every stage at once
    pub fn clear(&self) {
        let mut guard = self.chain.lock().expect("chain lock poisoned");
        *guard = Vec::new().into();
    }

    /// Snapshot of the current chain (cheap `Arc` clone)
    pub fn chain(&self) -> Chain {
        self.chain.lock().expect("chain lock poisoned").clone()
    }

    /// Capability of the chain, `None` while it is empty
    pub fn capability(&self) -> Option<Capability> {
        chain_capability(&self.chain())
    }

    /// Claim this program for a target; fails if already claimed
    pub(crate) fn bind(&self) -> Result<(), ProgramError> {
        if self.bound.swap(true, Ordering::AcqRel) {
            return Err(ProgramError::AlreadyBound);
        }
        Ok(())
    }

    pub(crate) fn unbind(&self) {
        self.bound.store(false, Ordering::Release);
    }

    /// Pull the next frame from the source (render thread only)
    pub(crate) fn next_frame(&self) -> Result<Option<Frame>, SourceError> {
        self.source.lock().expect("source lock poisoned").next_frame()
    }

    /// Rewind the source (only sensible while stopped)
    pub fn rewind(&self) -> Result<(), SourceError> {
        self.source.lock().expect("source lock poisoned").rewind()
    }
}

fn chain_capability(chain: &[Stage]) -> Option<Capability> {
    chain.first().map(|s| s.fx.capability())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::{Cycle, GainFx, RenderError};
    use crate::source::SineSource;

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

    fn program() -> RenderProgram {
        RenderProgram::new(Box::new(SineSource::new(440.0)))
    }

    #[test]
    fn mixing_capabilities_is_rejected() {
        let prog = program();
        prog.push(Arc::new(GainFx::new())).unwrap();
        assert!(matches!(
            prog.push(Arc::new(GpuStub)),
            Err(ProgramError::MixedCapabilities)
        ));
    }

    #[test]
    fn replace_swaps_exactly_one_stage() {
        let prog = program();
        let a = prog.push(Arc::new(GainFx::with_gain(0.5))).unwrap();
        let b = prog.push(Arc::new(GainFx::with_gain(2.0))).unwrap();

        let before = prog.chain();
        let c = prog.replace(a, Arc::new(GainFx::with_gain(1.5))).unwrap();
        let after = prog.chain();

        // The old snapshot is untouched
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].id, a);

        assert_eq!(after.len(), 2);
        assert_eq!(after[0].id, c);
        assert_eq!(after[1].id, b);
    }

    #[test]
    fn replace_unknown_id_fails() {
        let prog = program();
        let id = prog.push(Arc::new(GainFx::new())).unwrap();
        prog.remove(id).unwrap();
        assert!(matches!(
            prog.replace(id, Arc::new(GainFx::new())),
            Err(ProgramError::CommandNotFound(_))
        ));
    }

    #[test]
    fn replace_cannot_introduce_a_capability_mix() {
        let prog = program();
        let a = prog.push(Arc::new(GainFx::new())).unwrap();
        prog.push(Arc::new(GainFx::new())).unwrap();
        assert!(matches!(
            prog.replace(a, Arc::new(GpuStub)),
            Err(ProgramError::MixedCapabilities)
        ));
    }

    #[test]
    fn clear_empties_the_chain() {
        let prog = program();
        prog.push(Arc::new(GainFx::new())).unwrap();
        prog.push(Arc::new(GainFx::new())).unwrap();
        prog.clear();
        assert!(prog.chain().is_empty());
        assert!(prog.capability().is_none());
    }

    #[test]
    fn binds_to_one_target_only() {
        let prog = program();
        prog.bind().unwrap();
        assert!(matches!(prog.bind(), Err(ProgramError::AlreadyBound)));
        prog.unbind();
        prog.bind().unwrap();
    }
}

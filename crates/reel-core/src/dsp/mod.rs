//! DSP building blocks for the audio branch
//!
//! - [`Window`]: analysis window functions
//! - [`BlockBuffer`]: fixed-size block accumulation with 50% overlap
//! - [`SpectralEngine`]: windowed forward/inverse FFT with overlap-add
//!   resynthesis and per-bin spectral editing

mod block;
mod fft;
mod window;

pub use block::BlockBuffer;
pub use fft::{fft_size_for, SpectralEngine, SpectralError, SpectrumEditor};
pub use window::Window;

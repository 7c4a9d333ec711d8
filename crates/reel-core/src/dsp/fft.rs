//! Windowed FFT analysis/resynthesis engine
//!
//! Samples accumulate into 50%-overlapping windowed blocks; each block is
//! forward-transformed and its spectrum queued in a FIFO. Queued spectra can
//! be inspected ([`SpectralEngine::power`]), edited per bin before queueing
//! ([`SpectrumEditor`]), and resynthesized by inverse transform plus
//! overlap-add ([`SpectralEngine::synthesize`]).

use std::collections::VecDeque;
use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use thiserror::Error;

use super::{BlockBuffer, Window};

/// Cap on queued spectra for analysis-only use (no resynthesis draining the
/// FIFO). Oldest blocks are dropped beyond this.
const MAX_QUEUED_SPECTRA: usize = 64;

/// Errors from the spectral engine
#[derive(Error, Debug)]
pub enum SpectralError {
    #[error("FFT processing failed: {0}")]
    Fft(#[from] realfft::FftError),
}

/// Per-bin spectral modification applied to each block before it is queued
pub trait SpectrumEditor: Send + Sync {
    /// `bins[i]` covers frequency `i * bin_hz`
    fn edit(&self, bins: &mut [Complex32], bin_hz: f64);
}

impl<F> SpectrumEditor for F
where
    F: Fn(&mut [Complex32], f64) + Send + Sync,
{
    fn edit(&self, bins: &mut [Complex32], bin_hz: f64) {
        self(bins, bin_hz)
    }
}

/// Transform size for a sample rate and lowest resolvable frequency
///
/// Rounded up to the next power of two from `sample_rate / min_frequency`.
pub fn fft_size_for(sample_rate: u32, min_frequency: f64) -> usize {
    let raw = (sample_rate as f64 / min_frequency.max(1.0)).ceil() as usize;
    raw.max(2).next_power_of_two()
}

/// Windowed forward/inverse FFT with overlap-add reconstruction
///
/// One engine handles one channel; multi-channel callers run one engine per
/// channel. Analysis and synthesis advance independently: pushing never
/// blocks on synthesis, and synthesis fills with silence when too few
/// spectra are queued to cover the requested output.
pub struct SpectralEngine {
    sample_rate: u32,
    fft_size: usize,
    hop: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    block: BlockBuffer,
    spectra: VecDeque<Vec<Complex32>>,
    fwd_input: Vec<f32>,
    fwd_output: Vec<Complex32>,
    fwd_scratch: Vec<Complex32>,
    inv_scratch: Vec<Complex32>,
    /// Reconstructed PCM of the previous block (read from its second half)
    synth_prev: Option<Vec<f32>>,
    /// Reconstructed PCM of the current block (read from its first half)
    synth_cur: Option<Vec<f32>>,
    /// Read offset into the current hop, `0..=hop`
    synth_pos: usize,
}

impl SpectralEngine {
    /// Create an engine resolving down to `min_frequency` Hz
    pub fn new(sample_rate: u32, min_frequency: f64, window: Window) -> Self {
        Self::with_fft_size(sample_rate, fft_size_for(sample_rate, min_frequency), window)
    }

    /// Create an engine with an explicit transform size (must be even)
    pub fn with_fft_size(sample_rate: u32, fft_size: usize, window: Window) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let fwd_input = forward.make_input_vec();
        let fwd_output = forward.make_output_vec();
        let fwd_scratch = forward.make_scratch_vec();
        let inv_scratch = inverse.make_scratch_vec();
        Self {
            sample_rate,
            fft_size,
            hop: fft_size / 2,
            forward,
            inverse,
            block: BlockBuffer::new(fft_size, window),
            spectra: VecDeque::new(),
            fwd_input,
            fwd_output,
            fwd_scratch,
            inv_scratch,
            synth_prev: None,
            synth_cur: None,
            // Forces an advance on the first synthesized sample
            synth_pos: fft_size / 2,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of one bin in Hz
    pub fn bin_hz(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Number of spectra currently queued for resynthesis
    pub fn queued_spectra(&self) -> usize {
        self.spectra.len()
    }

    /// Feed samples; completed blocks are transformed and queued
    pub fn push(&mut self, samples: &[f32]) -> Result<(), SpectralError> {
        self.push_edited(samples, None)
    }

    /// Feed samples, applying `editor` to each completed spectrum
    pub fn push_edited(
        &mut self,
        samples: &[f32],
        editor: Option<&dyn SpectrumEditor>,
    ) -> Result<(), SpectralError> {
        let bin_hz = self.bin_hz();
        let Self {
            block,
            forward,
            spectra,
            fwd_input,
            fwd_output,
            fwd_scratch,
            ..
        } = self;

        let mut result = Ok(());
        block.push(samples, |windowed| {
            if result.is_err() {
                return;
            }
            fwd_input.copy_from_slice(windowed);
            if let Err(e) = forward.process_with_scratch(fwd_input, fwd_output, fwd_scratch) {
                result = Err(SpectralError::Fft(e));
                return;
            }
            if let Some(editor) = editor {
                editor.edit(fwd_output, bin_hz);
            }
            spectra.push_back(fwd_output.clone());
            if spectra.len() > MAX_QUEUED_SPECTRA {
                spectra.pop_front();
            }
        });
        result
    }

    /// Summed power over `[f_lo, f_hi)` Hz in the most recent spectrum
    ///
    /// Frequencies map to bins via `round(fft_size * f / sample_rate)`,
    /// clamped to the valid bin range. A high index not strictly greater
    /// than the low index is nudged to `low + 1` so the range is never
    /// empty. Returns 0.0 when no block has been analysed yet.
    pub fn power(&self, f_lo: f64, f_hi: f64) -> f64 {
        let Some(spectrum) = self.spectra.back() else {
            return 0.0;
        };
        let max_bin = spectrum.len() - 1;
        let lo = self.bin_for(f_lo).min(max_bin);
        let mut hi = self.bin_for(f_hi).min(max_bin);
        if hi <= lo {
            hi = (lo + 1).min(max_bin);
        }
        spectrum[lo..=hi]
            .iter()
            .map(|c| c.norm_sqr() as f64)
            .sum()
    }

    fn bin_for(&self, freq: f64) -> usize {
        let idx = (self.fft_size as f64 * freq / self.sample_rate as f64).round();
        idx.clamp(0.0, (self.fft_size - 1) as f64) as usize
    }

    /// Reconstruct samples by inverse transform and 50% overlap-add
    ///
    /// Each output sample is the average of the two reconstructed blocks
    /// overlapping at that position. When the FIFO runs out of spectra, the
    /// missing contribution is silence; the call never blocks or errors on
    /// starvation.
    pub fn synthesize(&mut self, out: &mut [f32]) -> Result<(), SpectralError> {
        for slot in out.iter_mut() {
            if self.synth_pos >= self.hop {
                self.advance_synthesis()?;
            }
            let p = self.synth_pos;
            let tail = self
                .synth_prev
                .as_ref()
                .map(|pcm| pcm[self.hop + p])
                .unwrap_or(0.0);
            let head = self.synth_cur.as_ref().map(|pcm| pcm[p]).unwrap_or(0.0);
            *slot = 0.5 * (tail + head);
            self.synth_pos += 1;
        }
        Ok(())
    }

    fn advance_synthesis(&mut self) -> Result<(), SpectralError> {
        self.synth_prev = self.synth_cur.take();
        self.synth_cur = match self.spectra.pop_front() {
            Some(mut spectrum) => {
                // realfft's inverse expects purely real DC/Nyquist bins;
                // editing may have left residue there
                if let Some(first) = spectrum.first_mut() {
                    first.im = 0.0;
                }
                if let Some(last) = spectrum.last_mut() {
                    last.im = 0.0;
                }
                let mut pcm = self.inverse.make_output_vec();
                self.inverse
                    .process_with_scratch(&mut spectrum, &mut pcm, &mut self.inv_scratch)?;
                let norm = 1.0 / self.fft_size as f32;
                for s in &mut pcm {
                    *s *= norm;
                }
                Some(pcm)
            }
            None => None,
        };
        self.synth_pos = 0;
        Ok(())
    }

    /// Drop all buffered input, queued spectra and synthesis state
    pub fn reset(&mut self) {
        self.block.clear();
        self.spectra.clear();
        self.synth_prev = None;
        self.synth_cur = None;
        self.synth_pos = self.hop;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn fft_size_rounds_up_to_power_of_two() {
        // 48000 / 20 = 2400 -> 4096
        assert_eq!(fft_size_for(48_000, 20.0), 4096);
        assert_eq!(fft_size_for(44_100, 43.066), 1024);
        assert_eq!(fft_size_for(48_000, 48.0), 1024);
    }

    #[test]
    fn rectangle_round_trip_is_near_exact() {
        let rate = 48_000;
        let mut engine = SpectralEngine::with_fft_size(rate, 512, Window::Rectangle);
        let input = sine(1000.0, rate, 512 * 8);
        engine.push(&input).unwrap();

        let mut out = vec![0.0f32; 512 * 6];
        engine.synthesize(&mut out).unwrap();

        // Skip the first hop: only one block overlaps there
        for (i, (&x, &y)) in input.iter().zip(&out).enumerate().skip(256) {
            assert!(
                (x - y).abs() < 1e-3,
                "sample {i}: expected {x}, got {y}"
            );
        }
    }

    #[test]
    fn hann_round_trip_reconstructs_at_window_gain() {
        let rate = 48_000;
        let mut engine = SpectralEngine::with_fft_size(rate, 512, Window::Hann);
        let input = sine(440.0, rate, 512 * 8);
        engine.push(&input).unwrap();

        let mut out = vec![0.0f32; 512 * 6];
        engine.synthesize(&mut out).unwrap();

        let gain = Window::Hann.overlap_average_gain();
        for (i, (&x, &y)) in input.iter().zip(&out).enumerate().skip(256) {
            assert!(
                (x * gain - y).abs() < 1e-3,
                "sample {i}: expected {}, got {y}",
                x * gain
            );
        }
    }

    #[test]
    fn starved_synthesis_fills_with_silence() {
        let mut engine = SpectralEngine::with_fft_size(48_000, 256, Window::Hann);
        // A single queued block only reaches into the first two hops
        engine.push(&sine(500.0, 48_000, 256)).unwrap();

        let mut out = vec![1.0f32; 1024];
        engine.synthesize(&mut out).unwrap();

        // Everything past the single block's reach is silent
        assert!(out[256..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn power_band_concentrates_at_tone() {
        let rate = 48_000;
        let mut engine = SpectralEngine::new(rate, 20.0, Window::Hann);
        assert_eq!(engine.fft_size(), 4096);

        engine.push(&sine(1000.0, rate, 4096 * 2)).unwrap();

        let at_tone = engine.power(900.0, 1100.0);
        let off_tone = engine.power(100.0, 300.0);
        assert!(at_tone > 0.0);
        assert!(
            at_tone > off_tone * 10.0,
            "tone band {at_tone} vs off band {off_tone}"
        );
    }

    #[test]
    fn power_never_returns_an_empty_range() {
        let rate = 48_000;
        let mut engine = SpectralEngine::with_fft_size(rate, 1024, Window::Hann);
        engine.push(&sine(1000.0, rate, 2048)).unwrap();

        // Equal edges are nudged to a one-bin range
        let p = engine.power(1000.0, 1000.0);
        assert!(p > 0.0);

        // Inverted edges behave the same way
        assert!(engine.power(1000.0, 900.0) >= 0.0);
    }

    #[test]
    fn power_without_analysis_is_zero() {
        let engine = SpectralEngine::with_fft_size(48_000, 1024, Window::Hann);
        assert_eq!(engine.power(100.0, 200.0), 0.0);
    }

    #[test]
    fn spectrum_editor_zeroes_a_band() {
        let rate = 48_000;
        let mut engine = SpectralEngine::with_fft_size(rate, 1024, Window::Hann);

        // Kill everything below 2 kHz
        let editor = |bins: &mut [Complex32], bin_hz: f64| {
            for (i, bin) in bins.iter_mut().enumerate() {
                if (i as f64) * bin_hz < 2000.0 {
                    *bin = Complex32::new(0.0, 0.0);
                }
            }
        };
        engine
            .push_edited(&sine(1000.0, rate, 4096), Some(&editor as &dyn SpectrumEditor))
            .unwrap();

        assert!(engine.power(900.0, 1100.0) < 1e-6);
    }

    #[test]
    fn queue_is_bounded_without_synthesis() {
        let mut engine = SpectralEngine::with_fft_size(48_000, 256, Window::Hann);
        engine.push(&vec![0.1f32; 256 * 200]).unwrap();
        assert!(engine.queued_spectra() <= MAX_QUEUED_SPECTRA);
    }
}

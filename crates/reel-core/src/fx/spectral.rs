//! Spectral band gain FX
//!
//! Audio passes through a windowed FFT analysis/resynthesis loop
//! ([`crate::dsp::SpectralEngine`]); bins inside the configured frequency
//! band are scaled before the inverse transform. One engine per channel
//! lives in per-target state, so the same FX on two targets keeps fully
//! independent FFT buffers.

use realfft::num_complex::Complex32;

use crate::dsp::{SpectralEngine, SpectrumEditor, Window};
use crate::frame::{AudioPayload, Frame};
use crate::param::{Param, ParamSpec};
use crate::source::MediaFormat;
use crate::target::TargetInfo;

use super::{CommandState, Cycle, RenderCommand, RenderError};

struct SpectralState {
    engines: Vec<SpectralEngine>,
    chan_in: Vec<f32>,
    chan_out: Vec<f32>,
}

/// Stateful spectral band gain
///
/// Parameters:
/// - `low`, `high`: band edges in Hz
/// - `band_gain`: multiplier applied to bins inside the band (0.0 removes
///   the band entirely)
/// - `window`: analysis window (rectangle / hann / hamming), read when the
///   target starts
///
/// The transform size is the next power of two of
/// `sample_rate / min_frequency`.
pub struct SpectralBandGainFx {
    min_frequency: f64,
    params: [Param; 4],
}

impl SpectralBandGainFx {
    /// `min_frequency` is the lowest frequency the analysis must resolve
    pub fn new(min_frequency: f64) -> Self {
        let params = [
            Param::new(ParamSpec::range("low", "Band low edge in Hz", 20.0, 20_000.0, 200.0)),
            Param::new(ParamSpec::range("high", "Band high edge in Hz", 20.0, 20_000.0, 2_000.0)),
            Param::new(ParamSpec::range("band_gain", "Gain inside the band", 0.0, 4.0, 1.0)),
            Param::new(ParamSpec::items(
                "window",
                "Analysis window",
                Window::NAMES.iter().map(|s| s.to_string()).collect(),
                1,
            )),
        ];
        Self { min_frequency, params }
    }

    fn window(&self) -> Window {
        Window::from_index(self.params[3].get_index())
    }
}

impl RenderCommand for SpectralBandGainFx {
    fn name(&self) -> &'static str {
        "spectral-band-gain"
    }

    fn params(&self) -> &[Param] {
        &self.params
    }

    fn make_state(&self, target: &TargetInfo) -> Option<CommandState> {
        match target.source.format {
            MediaFormat::Audio { sample_rate, channels } => {
                let window = self.window();
                let engines = (0..channels)
                    .map(|_| SpectralEngine::new(sample_rate, self.min_frequency, window))
                    .collect();
                Some(Box::new(SpectralState {
                    engines,
                    chan_in: Vec::new(),
                    chan_out: Vec::new(),
                }))
            }
            MediaFormat::Video { .. } => None,
        }
    }

    fn run(&self, cycle: &mut Cycle<'_>) -> Result<(), RenderError> {
        let audio = cycle
            .frame()
            .as_audio()
            .ok_or(RenderError::ExpectedAudio { command: self.name() })?
            .clone();
        let payout_time = cycle.frame().payout_time;

        let low = self.params[0].get();
        let high = self.params[1].get();
        let gain = self.params[2].get() as f32;
        let band_edit = move |bins: &mut [Complex32], bin_hz: f64| {
            for (i, bin) in bins.iter_mut().enumerate() {
                let freq = i as f64 * bin_hz;
                if freq >= low && freq <= high {
                    *bin = *bin * gain;
                }
            }
        };
        let editor: &dyn SpectrumEditor = &band_edit;

        let state = cycle.state::<SpectralState>("spectral-band-gain")?;

        let channels = audio.channels as usize;
        let instants = audio.len_per_channel();
        debug_assert_eq!(state.engines.len(), channels);

        state.chan_in.resize(instants, 0.0);
        state.chan_out.resize(instants, 0.0);
        let mut out = vec![0.0f32; audio.samples.len()];

        for (c, engine) in state.engines.iter_mut().enumerate().take(channels) {
            for i in 0..instants {
                state.chan_in[i] = audio.samples[i * channels + c];
            }
            engine.push_edited(&state.chan_in, Some(editor))?;
            engine.synthesize(&mut state.chan_out)?;
            for i in 0..instants {
                out[i * channels + c] = state.chan_out[i];
            }
        }

        let payload = AudioPayload::new(out, audio.channels, audio.sample_rate, audio.sample_offset);
        cycle.replace_frame(Frame::audio(payout_time, payload));
        Ok(())
    }
}

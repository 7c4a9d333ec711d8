//! Gain FX - simple volume control

use crate::frame::{AudioPayload, Frame};
use crate::param::{Param, ParamSpec};

use super::{Cycle, RenderCommand, RenderError};

/// Stateless audio gain
///
/// One RANGE parameter: linear multiplier, 0.0 (silence) to 4.0 (+12 dB),
/// default unity. Parameter writes land on the next cycle without stopping
/// the stream.
pub struct GainFx {
    params: [Param; 1],
}

impl GainFx {
    pub fn new() -> Self {
        Self::with_gain(1.0)
    }

    pub fn with_gain(gain: f64) -> Self {
        let params = [Param::new(ParamSpec::range(
            "gain",
            "Linear gain multiplier",
            0.0,
            4.0,
            gain,
        ))];
        Self { params }
    }

    fn gain(&self) -> f32 {
        self.params[0].get() as f32
    }
}

impl Default for GainFx {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCommand for GainFx {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn params(&self) -> &[Param] {
        &self.params
    }

    fn run(&self, cycle: &mut Cycle<'_>) -> Result<(), RenderError> {
        let audio = cycle
            .frame()
            .as_audio()
            .ok_or(RenderError::ExpectedAudio { command: self.name() })?;

        let gain = self.gain();
        if (gain - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }

        let scaled: Vec<f32> = audio.samples.iter().map(|&s| s * gain).collect();
        let payload = AudioPayload::new(
            scaled,
            audio.channels,
            audio.sample_rate,
            audio.sample_offset,
        );
        let payout_time = cycle.frame().payout_time;
        cycle.replace_frame(Frame::audio(payout_time, payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::VideoPayload;
    use crate::param::find_param;
    use crate::target::TargetInfo;
    use crate::types::PixelFormat;

    fn audio_frame() -> Frame {
        Frame::audio(0.0, AudioPayload::new(vec![0.5, -0.25, 1.0, 0.0], 1, 48_000, 0))
    }

    #[test]
    fn scales_samples() {
        let fx = GainFx::with_gain(0.5);
        let info = TargetInfo::for_tests();
        let mut frame = audio_frame();
        let mut cycle = Cycle::new(&info, 0.0, &mut frame, None);
        fx.run(&mut cycle).unwrap();

        let out = frame.as_audio().unwrap();
        assert_eq!(out.samples[0], 0.25);
        assert_eq!(out.samples[2], 0.5);
    }

    #[test]
    fn unity_gain_leaves_the_buffer_shared() {
        let fx = GainFx::new();
        let info = TargetInfo::for_tests();
        let mut frame = audio_frame();
        let before = frame.as_audio().unwrap().samples.clone();
        let mut cycle = Cycle::new(&info, 0.0, &mut frame, None);
        fx.run(&mut cycle).unwrap();

        // No rewrite at unity: same allocation flows on
        let after = &frame.as_audio().unwrap().samples;
        assert!(std::sync::Arc::ptr_eq(&before, after));
    }

    #[test]
    fn parameter_is_clamped_and_live() {
        let fx = GainFx::new();
        find_param(fx.params(), "gain").unwrap().set(99.0);
        assert_eq!(fx.gain(), 4.0);
    }

    #[test]
    fn rejects_video_frames() {
        let fx = GainFx::new();
        let info = TargetInfo::for_tests();
        let mut frame = Frame::video(0.0, VideoPayload::new(vec![0; 3], 1, 1, PixelFormat::Rgb8));
        let mut cycle = Cycle::new(&info, 0.0, &mut frame, None);
        assert!(matches!(
            fx.run(&mut cycle),
            Err(RenderError::ExpectedAudio { .. })
        ));
    }
}

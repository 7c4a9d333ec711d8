//! Brightness FX - per-pixel video scaling

use crate::frame::{Frame, VideoPayload};
use crate::param::{Param, ParamSpec};
use crate::types::PixelFormat;

use super::{Cycle, RenderCommand, RenderError};

/// Stateless video brightness
///
/// One RANGE parameter: multiplier from 0.0 (black) to 4.0, default unity.
/// Alpha channels pass through untouched.
pub struct BrightnessFx {
    params: [Param; 1],
}

impl BrightnessFx {
    pub fn new() -> Self {
        let params = [Param::new(ParamSpec::range(
            "brightness",
            "Brightness multiplier",
            0.0,
            4.0,
            1.0,
        ))];
        Self { params }
    }

    fn factor(&self) -> f32 {
        self.params[0].get() as f32
    }
}

impl Default for BrightnessFx {
    fn default() -> Self {
        Self::new()
    }
}

fn scale_byte(value: u8, factor: f32) -> u8 {
    (value as f32 * factor).round().clamp(0.0, 255.0) as u8
}

impl RenderCommand for BrightnessFx {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn params(&self) -> &[Param] {
        &self.params
    }

    fn run(&self, cycle: &mut Cycle<'_>) -> Result<(), RenderError> {
        let video = cycle
            .frame()
            .as_video()
            .ok_or(RenderError::ExpectedVideo { command: self.name() })?;

        let factor = self.factor();
        if (factor - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }

        let mut pixels = video.pixels.to_vec();
        match video.format {
            PixelFormat::Gray8 | PixelFormat::Rgb8 => {
                for p in &mut pixels {
                    *p = scale_byte(*p, factor);
                }
            }
            PixelFormat::Rgba8 => {
                for rgba in pixels.chunks_exact_mut(4) {
                    for p in &mut rgba[..3] {
                        *p = scale_byte(*p, factor);
                    }
                }
            }
        }

        let payload = VideoPayload::new(pixels, video.width, video.height, video.format);
        let payout_time = cycle.frame().payout_time;
        cycle.replace_frame(Frame::video(payout_time, payload));
        Ok(())
    }
}

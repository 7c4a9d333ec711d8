//! Export two seconds of a 1 kHz sine to a WAV file, with a spectral band
//! gain FX muting 500-1500 Hz for the second half.
//!
//! Run with: cargo run --example sine_band_gain

use std::sync::Arc;

use anyhow::Result;
use reel_core::fx::{RenderCommand, SpectralBandGainFx};
use reel_core::param::find_param;
use reel_core::program::RenderProgram;
use reel_core::source::SineSource;
use reel_core::target::{FreeRunTimebase, RenderTarget, WavSink};

fn main() -> Result<()> {
    env_logger::init();

    // 2 s at 48 kHz in 1024-sample frames
    let source = SineSource::new(1000.0).with_frame_limit(94);
    let program = Arc::new(RenderProgram::new(Box::new(source)));

    let fx = Arc::new(SpectralBandGainFx::new(100.0));
    find_param(fx.params(), "low").expect("declared").set(500.0);
    find_param(fx.params(), "high").expect("declared").set(1500.0);
    program.push(fx.clone())?;

    let mut target = RenderTarget::with_timebase(
        "export",
        Box::new(WavSink::new("band_gain.wav")),
        Arc::new(FreeRunTimebase::new()),
    );
    target.use_program(Arc::clone(&program))?;
    target.start()?;

    // Mute the band once the export clock passes the halfway mark
    while target.is_running() && target.get_time() < 1.0 {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    find_param(fx.params(), "band_gain").expect("declared").set(0.0);

    while target.is_running() {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    let stats = target.stop()?;
    println!("wrote band_gain.wav: {} frames, {:.2} s", stats.frames, stats.last_payout);
    Ok(())
}

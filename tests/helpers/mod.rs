//! Test helpers and fixtures for Ripieno integration tests
//!
//! Engines are driven period by period with [`RipienoEngine::tick`]; no
//! audio hardware is involved.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `INT16_EPSILON`: one step of the default S16 output
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use ripieno::prelude::*;
use ripieno::EngineConfig;

/// Default configuration: 44100 Hz, 512 frames, 120 bpm, sixteenth ticks.
/// One tick lasts 10 periods.
pub const PERIODS_PER_TICK: usize = 10;

pub const TEST_BUFFER_SIZE: usize = 512;

/// Engine with the default configuration.
pub fn test_engine() -> RipienoEngine {
    RipienoEngine::builder()
        .build()
        .expect("Failed to create test engine")
}

/// Engine built from `config`.
pub fn test_engine_with(config: EngineConfig) -> RipienoEngine {
    RipienoEngine::builder()
        .config(config)
        .build()
        .expect("Failed to create test engine")
}

/// One audio channel, one output pad, `input_pads` input pads.
pub fn mono_audio(engine: &RipienoEngine, input_pads: usize) -> std::sync::Arc<ripieno::Audio> {
    engine
        .add_audio(AudioGeometry::new(1, 1, input_pads), AudioFlags::INPUT_HAS_RECYCLING)
        .expect("Failed to add audio")
}

/// Samples of pcm channel `channel` of an interleaved stereo period.
pub fn channel_samples(period: &SampleBuffer, channel: usize) -> Vec<f64> {
    period
        .to_normalized()
        .into_iter()
        .skip(channel)
        .step_by(2)
        .collect()
}

/// Run `periods` periods, returning pcm channel `channel` of each.
pub fn render_channel(engine: &RipienoEngine, periods: usize, channel: usize) -> Vec<Vec<f64>> {
    (0..periods)
        .map(|_| channel_samples(&engine.tick(), channel))
        .collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s.abs()).fold(0.0_f64, f64::max)
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f64], tolerance: f64) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f64], min_rms: f64) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}

//! Tolerance constants for audio testing.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (for passthrough, exact gain).
pub const FLOAT_EPSILON: f64 = 1e-6;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f64 = 0.0001;

/// 16-bit quantization step size.
/// Use when comparing against the default S16 output.
pub const INT16_EPSILON: f64 = 1.0 / 32768.0;

/// RMS a rendered tone must at least reach to count as audible.
pub const AUDIBLE_RMS: f64 = 0.05;

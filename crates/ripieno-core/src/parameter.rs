//! Port value ranges and the normalized `[0.0, 1.0]` parameter protocol.
//!
//! Effect processors expose their controls in plugin-native units. Callers
//! on the control side (automation, registry lookups, remote writes) speak
//! normalized values; a [`ParameterRange`] converts between the two.
//!
//! ```
//! use ripieno_core::{ParameterRange, ParameterScale};
//!
//! let cutoff = ParameterRange::new(20.0, 20000.0, 1000.0, ParameterScale::Logarithmic);
//! let hz = cutoff.denormalize(0.5);
//! assert!((cutoff.normalize(hz) - 0.5).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

/// Mapping between normalized and native values, following the port hints
/// plugin formats advertise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ParameterScale {
    #[default]
    Linear,
    /// `native = min * (max / min)^normalized`; needs `min > 0`.
    Logarithmic,
    /// Normalized below 0.5 is `min`, otherwise `max`.
    Toggle,
    /// Linear, rounded to whole numbers.
    Integer,
}

/// Native range of one port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub scale: ParameterScale,
}

impl ParameterRange {
    /// `default` is clamped into `[min, max]`.
    pub fn new(min: f64, max: f64, default: f64, scale: ParameterScale) -> Self {
        debug_assert!(max >= min, "max must not be below min");

        Self {
            min,
            max,
            default: default.clamp(min, max),
            scale,
        }
    }

    pub fn linear(min: f64, max: f64, default: f64) -> Self {
        Self::new(min, max, default, ParameterScale::Linear)
    }

    pub fn toggle(default_on: bool) -> Self {
        Self::new(
            0.0,
            1.0,
            if default_on { 1.0 } else { 0.0 },
            ParameterScale::Toggle,
        )
    }

    pub fn integer(min: i64, max: i64, default: i64) -> Self {
        Self::new(
            min as f64,
            max as f64,
            default as f64,
            ParameterScale::Integer,
        )
    }

    fn logarithmic_usable(&self) -> bool {
        self.min > 0.0
    }

    /// Native value to `[0.0, 1.0]`.
    pub fn normalize(&self, value: f64) -> f64 {
        let value = value.clamp(self.min, self.max);
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }

        match self.scale {
            ParameterScale::Logarithmic if self.logarithmic_usable() => {
                (value.ln() - self.min.ln()) / (self.max.ln() - self.min.ln())
            }
            ParameterScale::Toggle => {
                if value >= (self.min + self.max) / 2.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ParameterScale::Integer => (value.round() - self.min) / span,
            _ => (value - self.min) / span,
        }
    }

    /// `[0.0, 1.0]` to native value. Out-of-range input is clamped first.
    pub fn denormalize(&self, normalized: f64) -> f64 {
        let normalized = normalized.clamp(0.0, 1.0);
        let span = self.max - self.min;

        match self.scale {
            ParameterScale::Logarithmic if self.logarithmic_usable() => {
                (self.min.ln() + normalized * (self.max.ln() - self.min.ln())).exp()
            }
            ParameterScale::Toggle => {
                if normalized >= 0.5 {
                    self.max
                } else {
                    self.min
                }
            }
            ParameterScale::Integer => (self.min + normalized * span).round(),
            _ => self.min + normalized * span,
        }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for ParameterRange {
    fn default() -> Self {
        Self::linear(0.0, 1.0, 0.0)
    }
}

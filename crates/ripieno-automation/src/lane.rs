//! Automation lane: samples an [`Automation`] at the playback position.

use crate::automation::Automation;
use ripieno_core::{AtomicDouble, LoopRange, Port, PortValue, Soundcard};
use std::sync::Arc;

/// Grid automation positions are quantized to, in ticks.
pub const MINIMUM_ACCELERATION_LENGTH: f64 = 0.25;

/// Snap `x` down onto the acceleration grid.
#[inline]
pub fn quantize(x: f64) -> f64 {
    (x / MINIMUM_ACCELERATION_LENGTH).floor() * MINIMUM_ACCELERATION_LENGTH
}

/// Lookup window for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationPosition {
    pub x: f64,
    pub x_end: f64,
    pub return_prev_on_failure: bool,
}

impl AutomationPosition {
    /// Window for period `delay_counter` of tick `note_offset`.
    ///
    /// The previous value is reused exactly when looping and the offset sits
    /// on the loop's left edge.
    pub fn at(note_offset: u64, delay_counter: u64, delay: f64, loop_range: LoopRange) -> Self {
        let fraction = if delay > 0.0 {
            delay_counter as f64 / delay
        } else {
            0.0
        };
        let x = quantize(note_offset as f64 + fraction);
        Self {
            x,
            x_end: x + MINIMUM_ACCELERATION_LENGTH,
            return_prev_on_failure: loop_range.enabled && note_offset == loop_range.left,
        }
    }

    pub fn from_soundcard(soundcard: &dyn Soundcard) -> Self {
        Self::at(
            soundcard.note_offset(),
            soundcard.delay_counter(),
            soundcard.delay(),
            soundcard.loop_range(),
        )
    }
}

/// Drives one port from an automation timeline.
///
/// Lookup misses leave the port untouched and keep the last value.
#[derive(Debug)]
pub struct AutomationLane {
    automation: Arc<Automation>,
    last_value: AtomicDouble,
}

impl AutomationLane {
    pub fn new(automation: Arc<Automation>) -> Self {
        let last_value = AtomicDouble::new(automation.default_value());
        Self {
            automation,
            last_value,
        }
    }

    pub fn automation(&self) -> &Arc<Automation> {
        &self.automation
    }

    pub fn specifier(&self) -> &str {
        self.automation.specifier()
    }

    pub fn line(&self) -> usize {
        self.automation.line()
    }

    pub fn last_value(&self) -> f64 {
        self.last_value.get()
    }

    /// Value governing `position`, if any.
    pub fn update(&self, position: AutomationPosition) -> Option<f64> {
        let acceleration = self.automation.get_value(
            position.x,
            position.x_end,
            position.return_prev_on_failure,
        )?;
        self.last_value.set(acceleration.y);
        Some(acceleration.y)
    }

    /// Sample at `position` and write the value into `port`, converted to
    /// the port's type. Returns the stored value.
    pub fn apply(&self, port: &Port, position: AutomationPosition) -> Option<PortValue> {
        match self.update(position) {
            Some(value) => Some(port.write_f64(value)),
            None => {
                tracing::debug!(
                    specifier = self.specifier(),
                    x = position.x,
                    "no automation value in window"
                );
                None
            }
        }
    }
}

impl Clone for AutomationLane {
    fn clone(&self) -> Self {
        Self {
            automation: Arc::clone(&self.automation),
            last_value: self.last_value.clone(),
        }
    }
}

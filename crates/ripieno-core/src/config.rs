//! Engine configuration.

use crate::buffer::SampleFormat;
use crate::{Error, Result};

/// Ticks per whole note at delay factor 1.0.
pub const TICKS_PER_WHOLE: f64 = 16.0;

/// Sub-tick subdivisions in 256th mode.
pub const NOTE_256TH_SUBDIVISIONS: u64 = 16;

/// Configuration for the staging engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SampleFormat,
    pub pcm_channels: usize,
    pub bpm: f64,
    /// Note length of one tick relative to a sixteenth.
    pub delay_factor: f64,
    pub note_256th_mode: bool,
    pub loop_left: u64,
    pub loop_right: u64,
    pub do_loop: bool,
    /// Workers for super-threaded channel processing. Zero runs channels inline.
    pub worker_threads: usize,
    /// Capacity of each effect's pending parameter ring.
    pub pending_param_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            samplerate: 44100,
            buffer_size: 512,
            format: SampleFormat::S16,
            pcm_channels: 2,
            bpm: 120.0,
            delay_factor: 0.25,
            note_256th_mode: false,
            loop_left: 0,
            loop_right: 64,
            do_loop: false,
            worker_threads: 0,
            pending_param_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000..=384000).contains(&self.samplerate) {
            return Err(Error::InvalidConfig(format!(
                "samplerate {} out of range (8000-384000 Hz)",
                self.samplerate
            )));
        }
        if self.buffer_size == 0 || self.buffer_size > 65536 {
            return Err(Error::InvalidConfig(format!(
                "buffer_size {} out of range (1-65536)",
                self.buffer_size
            )));
        }
        if self.pcm_channels == 0 {
            return Err(Error::InvalidConfig("pcm_channels must be non-zero".into()));
        }
        if !(1.0..=999.0).contains(&self.bpm) {
            return Err(Error::InvalidTempo(self.bpm));
        }
        if !(self.delay_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "delay_factor {} must be positive",
                self.delay_factor
            )));
        }
        if self.do_loop && self.loop_left >= self.loop_right {
            return Err(Error::InvalidLoopRange {
                left: self.loop_left,
                right: self.loop_right,
            });
        }
        if self.pending_param_capacity == 0 {
            return Err(Error::InvalidConfig(
                "pending_param_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Buffer periods per tick at the configured tempo.
    pub fn delay(&self) -> f64 {
        absolute_delay(self.samplerate, self.buffer_size, self.bpm, self.delay_factor)
    }
}

/// Buffer periods per tick.
pub fn absolute_delay(samplerate: u32, buffer_size: usize, bpm: f64, delay_factor: f64) -> f64 {
    let periods_per_second = samplerate as f64 / buffer_size as f64;
    60.0 * (periods_per_second / bpm) * (1.0 / TICKS_PER_WHOLE) * (1.0 / delay_factor)
}

/// Whole periods a tick lasts for `delay`. Never zero.
#[inline]
pub fn periods_per_tick(delay: f64) -> u64 {
    (delay.floor() as u64).max(1)
}

//! Builder for configuring and constructing a `RipienoEngine`.

use crate::context::ApplicationContext;
use crate::plugin::PluginRegistry;
use crate::{Result, RipienoEngine};
use ripieno_core::{EngineConfig, SampleFormat};

/// Collects an [`EngineConfig`] and the plugins known up front.
///
/// The configuration is validated by [`build`](Self::build); bad values
/// come back as errors, never as a half-built engine.
///
/// # Example
///
/// ```
/// use ripieno::prelude::*;
///
/// let engine = RipienoEngine::builder()
///     .samplerate(48000)
///     .buffer_size(256)
///     .bpm(90.0)
///     .loop_range(0, 16)
///     .build()?;
///
/// assert_eq!(engine.config().samplerate, 48000);
/// assert!(engine.soundcard().loop_range().enabled);
/// # Ok::<(), ripieno::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct RipienoEngineBuilder {
    config: EngineConfig,
    plugins: PluginRegistry,
}

impl RipienoEngineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn samplerate(mut self, samplerate: u32) -> Self {
        self.config.samplerate = samplerate;
        self
    }

    /// Frames per period. Default: 512
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    /// Default: S16
    pub fn format(mut self, format: SampleFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Output channels. Default: 2
    pub fn pcm_channels(mut self, channels: usize) -> Self {
        self.config.pcm_channels = channels;
        self
    }

    /// Default: 120
    pub fn bpm(mut self, bpm: f64) -> Self {
        self.config.bpm = bpm;
        self
    }

    /// Length of one tick relative to a sixteenth. Default: 0.25
    pub fn delay_factor(mut self, delay_factor: f64) -> Self {
        self.config.delay_factor = delay_factor;
        self
    }

    /// Schedule notes on the 256th grid.
    pub fn note_256th_mode(mut self, enabled: bool) -> Self {
        self.config.note_256th_mode = enabled;
        self
    }

    /// Loop between ticks `left` and `right`, enabling the loop.
    pub fn loop_range(mut self, left: u64, right: u64) -> Self {
        self.config.loop_left = left;
        self.config.loop_right = right;
        self.config.do_loop = true;
        self
    }

    /// Spread channel work over `threads` workers. Default: 0 (inline)
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    /// Capacity of each effect's pending parameter ring. Default: 256
    pub fn pending_param_capacity(mut self, capacity: usize) -> Self {
        self.config.pending_param_capacity = capacity;
        self
    }

    /// Use `plugins` for effect lookups.
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn build(self) -> Result<RipienoEngine> {
        let context = ApplicationContext::new(self.config, self.plugins)?;
        tracing::info!(
            samplerate = context.config().samplerate,
            buffer_size = context.config().buffer_size,
            bpm = context.config().bpm,
            workers = context.config().worker_threads,
            "engine built"
        );
        Ok(RipienoEngine::from_context(context))
    }
}

//! Centralized error type for the ripieno umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use ripieno_core::AudioId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] ripieno_core::Error),

    #[error("Automation: {0}")]
    Automation(#[from] ripieno_automation::Error),

    #[error(transparent)]
    Recall(#[from] ripieno_recall::Error),

    #[error("Audio not found: {0}")]
    AudioNotFound(AudioId),

    #[error("Plugin not found: {effect} in {filename}")]
    PluginNotFound { filename: String, effect: String },

    #[error("Audio channel {audio_channel} out of range for {audio}")]
    AudioChannelOutOfRange { audio: AudioId, audio_channel: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

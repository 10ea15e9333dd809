//! # Ripieno - Real-time Audio Staging Engine
//!
//! A sequencer engine built around recalls: small units of per-period work
//! attached to audio, channel, recycling and signal level, duplicated per
//! concurrent run and walked stage by stage every buffer period.
//!
//! ## Architecture
//!
//! Ripieno is an umbrella crate that coordinates:
//! - **ripieno-core** - Sample codec, recall ids, recycling contexts, timelines, ports, soundcard clock
//! - **ripieno-automation** - Automation timelines sampled into ports once per period
//! - **ripieno-recall** - Audio tree, recall graph, staging pipeline, processors and built-in effects
//!
//! ## Quick Start
//!
//! ```
//! use ripieno::prelude::*;
//!
//! let engine = RipienoEngine::builder().build()?;
//! let audio = engine.add_audio(AudioGeometry::new(2, 1, 8), AudioFlags::INPUT_HAS_RECYCLING)?;
//!
//! // two ticks of pad 3 on audio channel 0
//! engine.add_note(audio.id(), 0, Note::new(0, 2, 3))?;
//! engine.start(audio.id(), SoundScope::Notation)?;
//!
//! let output = engine.render(4);
//! assert!(output.to_normalized().iter().any(|s| s.abs() > 0.0));
//! # Ok::<(), ripieno::Error>(())
//! ```

/// Re-export of ripieno-core for direct access
pub use ripieno_core as core;

/// Re-export of ripieno-automation
pub use ripieno_automation as automation;

/// Re-export of ripieno-recall
pub use ripieno_recall as recall;

// Core types
pub use ripieno_core::{
    AudioChannelTarget, AudioId, ContainerId, EngineConfig, LoopRange, MidiEventQueue, ParameterRange, Port,
    PortFlags, PortValue, PortWrite, RecallId, RecyclingContext, SampleBuffer, SampleFormat, SequencerInput,
    SoundScope, Soundcard, SoundcardClock, StagingFlags, StateFlags,
};

pub use ripieno_core::timeline::{CropMode, MidiEvent, Note, NoteEnvelope, Notation, Pattern, Wave};

pub use ripieno_automation::{Acceleration, Automation, AutomationLane};

pub use ripieno_recall::fx::{EffectPlugin, PluginDescriptor};
pub use ripieno_recall::{
    Audio, AudioFlags, AudioGeometry, Channel, ChannelSide, Recall, RecallBehaviour, RecallContainer,
    RecallKind, RecallList, RunContext,
};

mod builder;
mod context;
mod engine;
pub mod error;
mod plugin;

pub use builder::RipienoEngineBuilder;
pub use context::ApplicationContext;
pub use engine::RipienoEngine;
pub use error::{Error, Result};
pub use plugin::{PluginFactory, PluginRegistry};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{RipienoEngine, RipienoEngineBuilder};

    // Topology
    pub use crate::{AudioFlags, AudioGeometry, ChannelSide};

    // Timelines
    pub use crate::{CropMode, MidiEvent, Note, SoundScope};

    // Ports and plugins
    pub use crate::{AudioChannelTarget, EffectPlugin, PluginDescriptor, PluginRegistry, PortValue, PortWrite};

    pub use crate::{SampleBuffer, SampleFormat, Soundcard};
}

//! Recall graph and staging pipeline for Ripieno.
//!
//! # Contents
//!
//! - [`topology`]: the audio tree and the [`AudioSignal`](topology::AudioSignal) stream engine
//! - [`recall`]: recalls, their behaviours, containers and dependencies
//! - pipeline: scope start/stop, duplicate → resolve → init → run stages and cleanup, as methods on [`Audio`]
//! - [`processor`]: the audio processor keying notation, patterns, live MIDI, waves and playback
//! - [`fx`]: built-in play, stream, volume, envelope, peak and plugin effect recalls
//! - [`ChannelWorkerPool`]: threads running child runs one line group each
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ripieno_core::{EngineConfig, IdAllocator, SoundScope, Soundcard, SoundcardClock};
//! use ripieno_recall::{Audio, AudioFlags, AudioGeometry, AudioSettings};
//!
//! let config = EngineConfig::default();
//! let soundcard: Arc<dyn Soundcard> = Arc::new(SoundcardClock::new(&config));
//! let audio = Audio::new(
//!     Arc::new(IdAllocator::new()),
//!     AudioSettings::from(&config),
//!     AudioGeometry::new(2, 1, 4),
//!     AudioFlags::INPUT_HAS_RECYCLING,
//! )
//! .unwrap();
//!
//! audio.start(SoundScope::Sequencer, &*soundcard);
//! audio.tick(&soundcard);
//! assert_eq!(audio.stop(SoundScope::Sequencer), 1);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod fx;
mod pipeline;
pub mod processor;
pub mod recall;
pub mod topology;
mod worker;

pub use processor::{AudioProcessor, ProcessorCounters};
pub use recall::{Recall, RecallBehaviour, RecallContainer, RecallFlags, RecallKind, RecallList, RunContext};
pub use topology::{Audio, AudioFlags, AudioGeometry, AudioSettings, AudioSignal, Channel, ChannelSide, Recycling};
pub use worker::{ChannelJob, ChannelWorkerPool};

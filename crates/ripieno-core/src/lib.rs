//! Core runtime types for the Ripieno staging engine.
//!
//! # Contents
//!
//! - [`buffer`]: [`SampleBuffer`] and the format codec (copy, envelope, volume, peak, resample)
//! - [`RecallId`] / [`RecyclingContext`]: identity and topology view of one concurrent run
//! - [`StagingFlags`] / [`StateFlags`] / [`SoundScope`]: pipeline progress and scope
//! - [`timeline`]: notes, notation, patterns, waves and live MIDI events
//! - [`Soundcard`] / [`SequencerInput`]: the driver boundary, with [`SoundcardClock`]
//! - [`Port`]: mutex-guarded control values with normalized parameter ranges
//! - [`Persist`]: JSON read/write hooks for external persistence
//!
//! # Example
//!
//! ```
//! use ripieno_core::{RecallId, RecyclingContext, SoundScope, StagingFlags};
//!
//! let context = RecyclingContext::new(SoundScope::Notation, 8);
//! let id = RecallId::with_context_scope(context);
//!
//! id.set_staging_flags(StagingFlags::RUN_PRE);
//! assert!(!id.check_staging_flags(StagingFlags::RUN_PRE | StagingFlags::RUN_INTER));
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod buffer;
pub use buffer::{SampleBuffer, SampleFormat};

pub mod config;
pub use config::EngineConfig;

mod ids;
pub use ids::{AudioId, ContainerId, IdAllocator, RecallHandle, RecyclingId};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat, AtomicTick};

mod parameter;
pub use parameter::{ParameterRange, ParameterScale};

mod persist;
pub use persist::Persist;

mod port;
pub use port::{AudioChannelTarget, Port, PortFlags, PortValue, PortWrite};

mod recall_id;
pub use recall_id::{find_by_scope, RecallId};

mod recycling_context;
pub use recycling_context::{
    find_parent_recycling_context, find_recycling_context, RecyclingContext,
};

mod soundcard;
pub use soundcard::{
    note_256th_window, LoopRange, MidiEventQueue, SequencerInput, Soundcard, SoundcardClock,
};

mod staging;
pub use staging::{ScopeMask, SoundScope, StagingFlags, StateFlags};

pub mod timeline;

//! Scheduling processors.
//!
//! Every audio carries one [`AudioProcessor`] template in its `play` list.
//! Its working copy in a toplevel run moves the run's [`ProcessorCounters`]
//! once per period and keys the scope's timeline (notation, pattern steps,
//! live MIDI, wave buffers or template streams) into the signals of the
//! child run.

mod audio_processor;
mod counters;
mod mode;

pub use audio_processor::{key_for_pad, pad_for_key, AudioProcessor};
pub use counters::ProcessorCounters;
pub use mode::{KeyMode, ProcessorMode};

use crate::recall::{RecallBuilder, RecallContainer, RecallKind, RecallList};
use ripieno_core::IdAllocator;
use std::sync::Arc;

pub const PROCESSOR_NAME: &str = "audio-processor";

/// Container holding the audio processor template.
pub fn processor_container(ids: &IdAllocator) -> Arc<RecallContainer> {
    RecallContainer::builder(PROCESSOR_NAME, RecallList::Play)
        .template(RecallBuilder::new(
            RecallKind::AudioRun,
            PROCESSOR_NAME,
            AudioProcessor::new(),
        ))
        .build(ids)
}

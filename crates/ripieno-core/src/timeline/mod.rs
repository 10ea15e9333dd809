//! Timelines read by the scheduling processors.
//!
//! - [`Notation`]: notes per audio channel
//! - [`Pattern`]: step grid per input line
//! - [`Wave`]: audio blocks placed on the frame timeline
//! - [`MidiEvent`]: live input delivered per period

mod midi;
mod notation;
mod note;
mod pattern;
mod wave;

pub use midi::MidiEvent;
pub use notation::{CropMode, Notation, NotationDocument};
pub use note::{EnvelopePoint, EnvelopeSegment, Note, NoteEnvelope, NoteFlags, NoteRef};
pub use pattern::{Pattern, PatternDocument};
pub use wave::{Wave, WaveBuffer, WaveMetadata};

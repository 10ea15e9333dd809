//! Note records.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::NOTE_256TH_SUBDIVISIONS;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct NoteFlags: u32 {
        /// Shape the feeding signal with the note's envelope.
        const ENVELOPE = 1;
        /// Synthesized for one step by a pattern or live input.
        const TRANSIENT = 1 << 1;
        const IS_SELECTED = 1 << 2;
    }
}

/// One envelope corner: `length` as a fraction of the note, `level` as gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub length: f64,
    pub level: f64,
}

impl Default for EnvelopePoint {
    fn default() -> Self {
        Self {
            length: 0.25,
            level: 1.0,
        }
    }
}

/// Attack/decay/sustain/release shape. `ratio` offsets every level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteEnvelope {
    pub attack: EnvelopePoint,
    pub decay: EnvelopePoint,
    pub sustain: EnvelopePoint,
    pub release: EnvelopePoint,
    pub ratio: f64,
}

/// Frame span and gain ramp of one envelope stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeSegment {
    pub start_frame: usize,
    pub end_frame: usize,
    pub from: f64,
    pub to: f64,
}

impl EnvelopeSegment {
    /// Per-frame gain step.
    pub fn ratio(&self) -> f64 {
        let span = self.end_frame.saturating_sub(self.start_frame);
        if span == 0 {
            0.0
        } else {
            (self.to - self.from) / span as f64
        }
    }

    /// Gain at `frame`, which must lie inside the segment.
    pub fn volume_at(&self, frame: usize) -> f64 {
        self.from + self.ratio() * frame.saturating_sub(self.start_frame) as f64
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.start_frame <= frame && frame < self.end_frame
    }
}

impl NoteEnvelope {
    /// The four stages laid out over a note of `frame_count` frames.
    pub fn segments(&self, frame_count: usize) -> [EnvelopeSegment; 4] {
        let stages = [self.attack, self.decay, self.sustain, self.release];
        let mut segments = [EnvelopeSegment {
            start_frame: 0,
            end_frame: 0,
            from: 0.0,
            to: 0.0,
        }; 4];

        let mut x = 0.0;
        let mut level = self.ratio;
        for (segment, stage) in segments.iter_mut().zip(stages) {
            let start = (x * frame_count as f64).floor() as usize;
            x += stage.length;
            let end = (x * frame_count as f64).floor() as usize;
            *segment = EnvelopeSegment {
                start_frame: start,
                end_frame: end,
                from: level,
                to: stage.level + self.ratio,
            };
            level = stage.level + self.ratio;
        }
        segments
    }
}

/// A key held from tick `x0` up to tick `x1`.
///
/// The `_256th` offsets carry the same interval at sixteen subdivisions per
/// tick; notes built with [`Note::new`] keep both resolutions in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub x0: u64,
    pub x1: u64,
    pub x0_256th: u64,
    pub x1_256th: u64,
    pub y: u32,
    pub velocity: f64,
    pub flags: NoteFlags,
    pub envelope: NoteEnvelope,
}

impl Note {
    pub fn new(x0: u64, x1: u64, y: u32) -> Self {
        Self {
            x0,
            x1,
            x0_256th: x0 * NOTE_256TH_SUBDIVISIONS,
            x1_256th: x1 * NOTE_256TH_SUBDIVISIONS,
            y,
            velocity: 1.0,
            flags: NoteFlags::empty(),
            envelope: NoteEnvelope::default(),
        }
    }

    /// Note placed on the 256th grid; tick offsets are derived from it.
    pub fn with_256th(x0_256th: u64, x1_256th: u64, y: u32) -> Self {
        let mut note = Self::new(
            x0_256th / NOTE_256TH_SUBDIVISIONS,
            x1_256th.div_ceil(NOTE_256TH_SUBDIVISIONS),
            y,
        );
        note.x0_256th = x0_256th;
        note.x1_256th = x1_256th;
        note
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_envelope(mut self, envelope: NoteEnvelope) -> Self {
        self.envelope = envelope;
        self.flags |= NoteFlags::ENVELOPE;
        self
    }

    /// Length in ticks.
    pub fn length(&self) -> u64 {
        self.x1.saturating_sub(self.x0)
    }

    /// Sort key: onset, then key.
    pub fn sort_cmp(&self, other: &Note) -> Ordering {
        self.x0.cmp(&other.x0).then(self.y.cmp(&other.y))
    }
}

/// Non-owning view of a note feeding a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteRef {
    pub x0: u64,
    pub x1: u64,
    pub x0_256th: u64,
    pub x1_256th: u64,
    pub y: u32,
}

impl From<&Note> for NoteRef {
    fn from(note: &Note) -> Self {
        Self {
            x0: note.x0,
            x1: note.x1,
            x0_256th: note.x0_256th,
            x1_256th: note.x1_256th,
            y: note.y,
        }
    }
}

impl NoteRef {
    /// Still sounding at tick `offset`.
    pub fn sounding_at(&self, offset: u64) -> bool {
        self.x0 <= offset && offset < self.x1
    }

    /// Still sounding at 256th position `offset_256th`.
    pub fn sounding_at_256th(&self, offset_256th: u64) -> bool {
        self.x0_256th <= offset_256th && offset_256th < self.x1_256th
    }
}

//! Per-audio-channel note list.
//!
//! Notes live in a copy-on-write snapshot so the render thread reads a
//! consistent list while an editor appends or removes notes.

use super::note::{Note, NoteFlags};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How [`Notation::crop`] changes note lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropMode {
    /// Every selected note becomes `length` ticks long.
    Absolute { length: u64 },
    /// Selected notes grow (or shrink) by `delta` ticks. Never below one tick.
    Relative { delta: i64 },
}

#[derive(Debug)]
pub struct Notation {
    audio_channel: usize,
    notes: ArcSwap<Vec<Note>>,
}

impl Notation {
    pub fn new(audio_channel: usize) -> Self {
        Self {
            audio_channel,
            notes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn audio_channel(&self) -> usize {
        self.audio_channel
    }

    /// Current snapshot, sorted by onset then key.
    pub fn snapshot(&self) -> Arc<Vec<Note>> {
        self.notes.load_full()
    }

    pub fn len(&self) -> usize {
        self.notes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.load().is_empty()
    }

    /// Insert keeping sort order. A note at the same onset and key is replaced.
    pub fn add_note(&self, note: Note) {
        self.notes.rcu(|notes| {
            let mut notes = Vec::clone(notes);
            match notes.binary_search_by(|n| n.sort_cmp(&note)) {
                Ok(i) => notes[i] = note.clone(),
                Err(i) => notes.insert(i, note.clone()),
            }
            notes
        });
    }

    /// Remove the note starting at `x` on key `y`, or failing that the note on
    /// `y` that is sounding at `x`. Returns whether a note was removed.
    pub fn remove_note_at(&self, x: u64, y: u32) -> bool {
        let mut removed = false;
        self.notes.rcu(|notes| {
            let mut notes = Vec::clone(notes);
            let position = notes
                .iter()
                .position(|n| n.x0 == x && n.y == y)
                .or_else(|| notes.iter().rposition(|n| n.y == y && n.x0 < x && x < n.x1));
            removed = position.is_some();
            if let Some(i) = position {
                notes.remove(i);
            }
            notes
        });
        removed
    }

    /// Last note starting at `x` on key `y`.
    pub fn find_point(&self, x: u64, y: u32) -> Option<Note> {
        self.notes
            .load()
            .iter()
            .rev()
            .find(|n| n.x0 == x && n.y == y)
            .cloned()
    }

    /// Notes with onset in `[x0, x1)` and key in `[y0, y1)`. Bounds may be given
    /// in either order.
    pub fn find_range(&self, x0: u64, y0: u32, x1: u64, y1: u32) -> Vec<Note> {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        self.notes
            .load()
            .iter()
            .filter(|n| n.x0 >= x0 && n.x0 < x1 && n.y >= y0 && n.y < y1)
            .cloned()
            .collect()
    }

    /// Notes starting exactly at tick `x`.
    pub fn starting_at(&self, x: u64) -> Vec<Note> {
        self.notes
            .load()
            .iter()
            .filter(|n| n.x0 == x)
            .cloned()
            .collect()
    }

    /// Notes starting at a 256th position in `[lower, upper]`.
    pub fn starting_in_256th(&self, lower: u64, upper: u64) -> Vec<Note> {
        self.notes
            .load()
            .iter()
            .filter(|n| n.x0_256th >= lower && n.x0_256th <= upper)
            .cloned()
            .collect()
    }

    fn update_flags(&self, mut predicate: impl FnMut(&Note) -> Option<bool>) {
        self.notes.rcu(|notes| {
            let mut notes = Vec::clone(notes);
            for note in notes.iter_mut() {
                match predicate(note) {
                    Some(true) => note.flags.insert(NoteFlags::IS_SELECTED),
                    Some(false) => note.flags.remove(NoteFlags::IS_SELECTED),
                    None => {}
                }
            }
            notes
        });
    }

    /// Select the note at the cursor position, clearing any other selection.
    pub fn position(&self, x: u64, y: u32) {
        self.update_flags(|n| Some(n.x0 == x && n.y == y));
    }

    /// Add the notes of a region to the selection.
    pub fn select_region(&self, x0: u64, y0: u32, x1: u64, y1: u32) {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        self.update_flags(|n| {
            (n.x0 >= x0 && n.x0 < x1 && n.y >= y0 && n.y < y1).then_some(true)
        });
    }

    pub fn select_all(&self) {
        self.update_flags(|_| Some(true));
    }

    pub fn free_selection(&self) {
        self.update_flags(|_| Some(false));
    }

    pub fn selection(&self) -> Vec<Note> {
        self.notes
            .load()
            .iter()
            .filter(|n| n.flags.contains(NoteFlags::IS_SELECTED))
            .cloned()
            .collect()
    }

    pub fn is_note_selected(&self, x0: u64, y: u32) -> bool {
        self.notes
            .load()
            .iter()
            .any(|n| n.x0 == x0 && n.y == y && n.flags.contains(NoteFlags::IS_SELECTED))
    }

    /// Change the length of every selected note.
    pub fn crop(&self, mode: CropMode) {
        self.notes.rcu(|notes| {
            let mut notes = Vec::clone(notes);
            for note in notes
                .iter_mut()
                .filter(|n| n.flags.contains(NoteFlags::IS_SELECTED))
            {
                let length = match mode {
                    CropMode::Absolute { length } => length.max(1),
                    CropMode::Relative { delta } => {
                        (note.length() as i64).saturating_add(delta).max(1) as u64
                    }
                };
                let length_256th = length * crate::config::NOTE_256TH_SUBDIVISIONS;
                note.x1 = note.x0 + length;
                note.x1_256th = note.x0_256th + length_256th;
            }
            notes
        });
    }

    /// Replace every note. Input is re-sorted.
    pub fn replace_all(&self, mut notes: Vec<Note>) {
        notes.sort_by(|a, b| a.sort_cmp(b));
        self.notes.store(Arc::new(notes));
    }
}

/// Persisted form of a notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotationDocument {
    pub audio_channel: usize,
    pub notes: Vec<Note>,
}

impl From<&Notation> for NotationDocument {
    fn from(notation: &Notation) -> Self {
        Self {
            audio_channel: notation.audio_channel,
            notes: notation.snapshot().as_ref().clone(),
        }
    }
}

impl From<NotationDocument> for Notation {
    fn from(document: NotationDocument) -> Self {
        let notation = Notation::new(document.audio_channel);
        notation.replace_all(document.notes);
        notation
    }
}

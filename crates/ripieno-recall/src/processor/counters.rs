use ripieno_core::config::{periods_per_tick, NOTE_256TH_SUBDIVISIONS};
use ripieno_core::{note_256th_window, AtomicTick, LoopRange, Soundcard};

const UNSET: u64 = u64::MAX;

/// Transport position of one processor run.
///
/// Written by the processor on the render thread, read by dependants that
/// resolved against it.
#[derive(Debug)]
pub struct ProcessorCounters {
    delay_counter: AtomicTick,
    offset_counter: AtomicTick,
    note_256th_offset_counter: AtomicTick,
    note_256th_offset_last: AtomicTick,
}

impl Default for ProcessorCounters {
    fn default() -> Self {
        Self {
            delay_counter: AtomicTick::new(0),
            offset_counter: AtomicTick::new(0),
            note_256th_offset_counter: AtomicTick::new(0),
            note_256th_offset_last: AtomicTick::new(UNSET),
        }
    }
}

impl ProcessorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take over the soundcard's position.
    pub fn reset(&self, soundcard: &dyn Soundcard) {
        self.delay_counter.set(soundcard.delay_counter());
        self.offset_counter.set(soundcard.note_offset());
        self.note_256th_offset_counter
            .set(soundcard.note_256th_offset().0);
        self.note_256th_offset_last.set(UNSET);
    }

    /// Periods elapsed in the current tick.
    pub fn delay_counter(&self) -> u64 {
        self.delay_counter.get()
    }

    /// Current tick.
    pub fn offset(&self) -> u64 {
        self.offset_counter.get()
    }

    /// First 256th position of the current period.
    pub fn note_256th_offset(&self) -> u64 {
        self.note_256th_offset_counter.get()
    }

    /// Last 256th position already scheduled, if any.
    pub fn note_256th_offset_last(&self) -> Option<u64> {
        match self.note_256th_offset_last.get() {
            UNSET => None,
            last => Some(last),
        }
    }

    pub fn set_note_256th_offset_last(&self, last: u64) {
        self.note_256th_offset_last.set(last);
    }

    /// Inclusive 256th window of the current period.
    pub fn note_256th_window(&self, delay: f64) -> (u64, u64) {
        note_256th_window(self.offset(), self.delay_counter(), delay)
    }

    /// Advance by one period. Returns whether a new tick started.
    pub fn counter_change(&self, delay: f64, loop_range: LoopRange) -> bool {
        let counter = self.delay_counter.get();
        if counter + 1 < periods_per_tick(delay) {
            self.delay_counter.set(counter + 1);
            self.note_256th_offset_counter
                .set(self.note_256th_window(delay).0);
            return false;
        }

        let offset = self.offset_counter.get();
        let next = loop_range.next_offset(offset);
        if next <= offset {
            self.note_256th_offset_last.set(UNSET);
        }
        self.delay_counter.set(0);
        self.offset_counter.set(next);
        self.note_256th_offset_counter
            .set(next * NOTE_256TH_SUBDIVISIONS);
        true
    }
}

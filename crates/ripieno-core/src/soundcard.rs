//! Driver boundary: the soundcard clock and live sequencer input.
//!
//! Backends implement [`Soundcard`] to expose their period geometry and tick
//! counters, and [`SequencerInput`] to hand over live MIDI. [`SoundcardClock`]
//! is the in-process soundcard used when no hardware driver is attached.

use crate::buffer::{self, SampleBuffer, SampleFormat};
use crate::config::{absolute_delay, periods_per_tick, EngineConfig, NOTE_256TH_SUBDIVISIONS};
use crate::lockfree::{AtomicDouble, AtomicFlag, AtomicTick};
use crate::timeline::MidiEvent;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// Loop region in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopRange {
    pub left: u64,
    pub right: u64,
    pub enabled: bool,
}

impl LoopRange {
    /// Next tick after `offset`, wrapping to `left` at `right`.
    pub fn next_offset(&self, offset: u64) -> u64 {
        if self.enabled && offset + 1 >= self.right {
            self.left
        } else {
            offset + 1
        }
    }
}

/// Period geometry and tick counters of an output device.
pub trait Soundcard: Send + Sync {
    fn buffer_size(&self) -> usize;
    fn samplerate(&self) -> u32;
    fn format(&self) -> SampleFormat;
    fn pcm_channels(&self) -> usize;
    fn bpm(&self) -> f64;

    /// Buffer periods per tick.
    fn delay(&self) -> f64;

    /// Periods elapsed in the current tick.
    fn delay_counter(&self) -> u64;

    fn note_offset(&self) -> u64;

    /// Ticks elapsed since start, ignoring loops.
    fn note_offset_absolute(&self) -> u64;

    fn loop_range(&self) -> LoopRange;

    /// Add `src` (mono, one period) onto pcm channel `channel` of the output.
    fn mix_output(&self, src: &SampleBuffer, channel: usize);

    /// Advance the counters by one period.
    fn tic(&self);

    /// Periods per 256th subdivision.
    fn note_256th_delay(&self) -> f64 {
        self.delay() / NOTE_256TH_SUBDIVISIONS as f64
    }

    /// Inclusive window `(lower, upper)` of 256th positions starting in the
    /// current period. `upper < lower` when none does.
    fn note_256th_offset(&self) -> (u64, u64) {
        note_256th_window(self.note_offset(), self.delay_counter(), self.delay())
    }
}

/// 256th positions starting during period `delay_counter` of tick `note_offset`.
pub fn note_256th_window(note_offset: u64, delay_counter: u64, delay: f64) -> (u64, u64) {
    let periods = periods_per_tick(delay);
    let counter = delay_counter.min(periods - 1);
    let base = note_offset * NOTE_256TH_SUBDIVISIONS;
    let lower = base + (counter * NOTE_256TH_SUBDIVISIONS).div_ceil(periods);
    let upper = base + ((counter + 1) * NOTE_256TH_SUBDIVISIONS).div_ceil(periods) - 1;
    (lower, upper)
}

/// Live MIDI delivered to the midi scope.
pub trait SequencerInput: Send + Sync {
    /// Move every pending event into `out`.
    fn drain_events(&self, out: &mut Vec<MidiEvent>);
}

/// Soundcard advancing its counters in process, one [`Soundcard::tic`] per period.
#[derive(Debug)]
pub struct SoundcardClock {
    samplerate: u32,
    buffer_size: usize,
    format: SampleFormat,
    pcm_channels: usize,
    delay_factor: f64,
    bpm: AtomicDouble,
    delay_counter: AtomicTick,
    note_offset: AtomicTick,
    note_offset_absolute: AtomicTick,
    loop_left: AtomicTick,
    loop_right: AtomicTick,
    do_loop: AtomicFlag,
    output: Mutex<SampleBuffer>,
}

impl SoundcardClock {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            samplerate: config.samplerate,
            buffer_size: config.buffer_size,
            format: config.format,
            pcm_channels: config.pcm_channels,
            delay_factor: config.delay_factor,
            bpm: AtomicDouble::new(config.bpm),
            delay_counter: AtomicTick::new(0),
            note_offset: AtomicTick::new(0),
            note_offset_absolute: AtomicTick::new(0),
            loop_left: AtomicTick::new(config.loop_left),
            loop_right: AtomicTick::new(config.loop_right),
            do_loop: AtomicFlag::new(config.do_loop),
            output: Mutex::new(SampleBuffer::new(
                config.format,
                config.buffer_size * config.pcm_channels,
            )),
        }
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.bpm.set(bpm);
    }

    pub fn set_loop(&self, left: u64, right: u64, enabled: bool) {
        self.loop_left.set(left);
        self.loop_right.set(right);
        self.do_loop.set(enabled);
    }

    /// Jump to `note_offset` at the start of its first period.
    pub fn seek(&self, note_offset: u64) {
        self.note_offset.set(note_offset);
        self.delay_counter.set(0);
    }

    /// Copy of the output period.
    pub fn output(&self) -> SampleBuffer {
        self.output.lock().clone()
    }

    /// Take the output period, leaving silence behind.
    pub fn take_output(&self) -> SampleBuffer {
        let mut output = self.output.lock();
        let silence = SampleBuffer::new(self.format, output.len());
        std::mem::replace(&mut *output, silence)
    }
}

impl Soundcard for SoundcardClock {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn samplerate(&self) -> u32 {
        self.samplerate
    }

    fn format(&self) -> SampleFormat {
        self.format
    }

    fn pcm_channels(&self) -> usize {
        self.pcm_channels
    }

    fn bpm(&self) -> f64 {
        self.bpm.get()
    }

    fn delay(&self) -> f64 {
        absolute_delay(self.samplerate, self.buffer_size, self.bpm.get(), self.delay_factor)
    }

    fn delay_counter(&self) -> u64 {
        self.delay_counter.get()
    }

    fn note_offset(&self) -> u64 {
        self.note_offset.get()
    }

    fn note_offset_absolute(&self) -> u64 {
        self.note_offset_absolute.get()
    }

    fn loop_range(&self) -> LoopRange {
        LoopRange {
            left: self.loop_left.get(),
            right: self.loop_right.get(),
            enabled: self.do_loop.get(),
        }
    }

    fn mix_output(&self, src: &SampleBuffer, channel: usize) {
        if channel >= self.pcm_channels {
            tracing::debug!(channel, "output channel out of range");
            return;
        }
        let mut output = self.output.lock();
        buffer::copy(
            &mut output,
            self.pcm_channels,
            channel,
            src,
            1,
            0,
            self.buffer_size,
        );
    }

    fn tic(&self) {
        let periods = periods_per_tick(self.delay());
        let counter = self.delay_counter.get();
        if counter + 1 >= periods {
            let next = self.loop_range().next_offset(self.note_offset.get());
            self.note_offset.set(next);
            self.note_offset_absolute.fetch_add(1);
            self.delay_counter.set(0);
        } else {
            self.delay_counter.set(counter + 1);
        }
    }
}

/// Bounded queue of live MIDI events.
///
/// The sending half can be handed to a driver thread; the engine drains the
/// receiving half once per period.
#[derive(Debug, Clone)]
pub struct MidiEventQueue {
    tx: Sender<MidiEvent>,
    rx: Receiver<MidiEvent>,
}

impl MidiEventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<MidiEvent> {
        self.tx.clone()
    }

    /// Enqueue an event. Returns false when the queue is full.
    pub fn push(&self, event: MidiEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("midi input queue full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl SequencerInput for MidiEventQueue {
    fn drain_events(&self, out: &mut Vec<MidiEvent>) {
        out.extend(self.rx.try_iter());
    }
}

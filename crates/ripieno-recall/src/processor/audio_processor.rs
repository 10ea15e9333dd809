use super::{KeyMode, ProcessorCounters, ProcessorMode};
use crate::recall::{RecallBehaviour, RunContext};
use crate::topology::{Audio, AudioFlags, ChannelSide, Generator};
use ripieno_core::config::{periods_per_tick, NOTE_256TH_SUBDIVISIONS};
use ripieno_core::timeline::{MidiEvent, Note, NoteFlags, NoteRef};
use ripieno_core::RecallId;
use smallvec::SmallVec;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// Audio-run recall of the `play` list. Keeps the run's transport counters
/// and keys the scope's timeline into the signals of the child run.
#[derive(Debug)]
pub struct AudioProcessor {
    counters: Arc<ProcessorCounters>,
    mode: Option<ProcessorMode>,
    /// Set once the first period ran; counters move from the second on.
    primed: bool,
    events: Vec<MidiEvent>,
}

impl Default for AudioProcessor {
    fn default() -> Self {
        Self {
            counters: Arc::new(ProcessorCounters::new()),
            mode: None,
            primed: false,
            events: Vec::new(),
        }
    }
}

// Every working copy keeps its own counters.
impl Clone for AudioProcessor {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode,
            ..Self::default()
        }
    }
}

/// Input pad key `key` maps to, if any.
pub fn pad_for_key(audio: &Audio, key: u32) -> Option<usize> {
    let pads = audio.geometry().input_pads;
    let relative = key.checked_sub(audio.base_key())? as usize;
    if relative >= pads {
        return None;
    }
    if audio.test_flags(AudioFlags::REVERSE_MAPPING) {
        Some(pads - 1 - relative)
    } else {
        Some(relative)
    }
}

/// Key mapped onto input pad `pad`.
pub fn key_for_pad(audio: &Audio, pad: usize) -> u32 {
    let relative = if audio.test_flags(AudioFlags::REVERSE_MAPPING) {
        audio.geometry().input_pads.saturating_sub(pad + 1)
    } else {
        pad
    };
    audio.base_key() + relative as u32
}

impl AudioProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &Arc<ProcessorCounters> {
        &self.counters
    }

    pub fn mode(&self) -> Option<ProcessorMode> {
        self.mode
    }

    /// One period: move the counters, then key and feed.
    pub fn play(&mut self, cx: &RunContext<'_>) {
        self.run_pre(cx);
        self.run_inter(cx);
    }

    /// Start `note` on the input lines its key maps to, in the child run
    /// `child`. Keys outside the input pads are ignored.
    pub fn key_on(&self, cx: &RunContext<'_>, child: &Arc<RecallId>, note: &Note, velocity: f64, key_mode: KeyMode) {
        let audio = cx.audio;
        let Some(pad) = pad_for_key(audio, note.y) else {
            debug!(key = note.y, base_key = audio.base_key(), "key outside the input pads");
            return;
        };
        let audio_channels = audio.audio_channels();
        let lines: SmallVec<[usize; 4]> = match key_mode.audio_channel() {
            Some(audio_channel) if audio_channel < audio_channels => {
                SmallVec::from_elem(pad * audio_channels + audio_channel, 1)
            }
            Some(_) => return,
            None => (0..audio_channels).map(|c| pad * audio_channels + c).collect(),
        };

        let delay = cx.soundcard.delay();
        let note_ref = NoteRef::from(note);
        for line in lines {
            let Some(channel) = audio.input(line) else {
                continue;
            };
            let generator = channel.generator();
            for recycling in channel.recyclings() {
                recycling.with_signal_and_template(child, |signal, template| {
                    let frames = key_mode.frames(note, delay, signal.buffer_size());
                    signal.add_note(note_ref, velocity);
                    if note.flags.contains(NoteFlags::ENVELOPE) {
                        signal.set_envelope(Some(note.envelope));
                    }
                    if signal.is_active() {
                        let played = signal.length_till_current() * signal.buffer_size();
                        signal.feed((played + frames).saturating_sub(signal.first_frame()));
                    } else {
                        signal.open_feed(frames, key_mode.attack(), delay, &generator, template);
                    }
                });
            }
        }
    }

    /// Release held notes of `key`.
    pub fn key_off(&self, cx: &RunContext<'_>, child: &Arc<RecallId>, key: u32) {
        let audio = cx.audio;
        let Some(pad) = pad_for_key(audio, key) else {
            return;
        };
        let audio_channels = audio.audio_channels();
        for line in (0..audio_channels).map(|c| pad * audio_channels + c) {
            let Some(channel) = audio.input(line) else {
                continue;
            };
            for recycling in channel.recyclings() {
                recycling.with_signal(child, |signal| {
                    signal.remove_notes_where(|n| n.y == key && n.x1 == u64::MAX)
                });
            }
        }
    }

    fn schedule_notation(&self, cx: &RunContext<'_>, child: &Arc<RecallId>) {
        let audio = cx.audio;
        let delay = cx.soundcard.delay();
        let offset = self.counters.offset();

        if !audio.test_flags(AudioFlags::NOTE_256TH_MODE) {
            if self.counters.delay_counter() != 0 {
                return;
            }
            for audio_channel in 0..audio.audio_channels() {
                let Some(notation) = audio.notation(audio_channel) else {
                    continue;
                };
                for note in notation.starting_at(offset) {
                    let key_mode = KeyMode::Notation {
                        audio_channel,
                        attack: 0,
                    };
                    self.key_on(cx, child, &note, note.velocity, key_mode);
                }
            }
            return;
        }

        let (lower, upper) = self.counters.note_256th_window(delay);
        if upper < lower {
            return;
        }
        let last = self.counters.note_256th_offset_last();
        let periods = periods_per_tick(delay) as f64;
        let delay_counter = self.counters.delay_counter() as f64;
        let buffer_size = audio.settings().buffer_size as f64;
        for audio_channel in 0..audio.audio_channels() {
            let Some(notation) = audio.notation(audio_channel) else {
                continue;
            };
            for note in notation.starting_in_256th(lower, upper) {
                if last.is_some_and(|last| note.x0_256th <= last) {
                    continue;
                }
                let position = note.x0_256th.saturating_sub(offset * NOTE_256TH_SUBDIVISIONS) as f64;
                let attack = ((position * periods / NOTE_256TH_SUBDIVISIONS as f64 - delay_counter) * buffer_size)
                    .max(0.0) as usize;
                let key_mode = KeyMode::Notation { audio_channel, attack };
                self.key_on(cx, child, &note, note.velocity, key_mode);
            }
        }
        self.counters.set_note_256th_offset_last(upper);
    }

    fn schedule_pattern(&self, cx: &RunContext<'_>, child: &Arc<RecallId>) {
        if self.counters.delay_counter() != 0 {
            return;
        }
        let offset = self.counters.offset();
        for channel in cx.audio.channels(ChannelSide::Input) {
            let (_, _, length) = channel.pattern().dim();
            if length == 0 {
                continue;
            }
            let step = (offset % length as u64) as usize;
            if !channel.pattern().get_bit(0, 0, step) {
                continue;
            }
            let mut note = Note::new(offset, offset + 1, key_for_pad(cx.audio, channel.pad()));
            note.flags |= NoteFlags::TRANSIENT;
            let key_mode = KeyMode::Pattern {
                audio_channel: channel.audio_channel(),
            };
            self.key_on(cx, child, &note, note.velocity, key_mode);
        }
    }

    fn schedule_midi(&mut self, cx: &RunContext<'_>, child: &Arc<RecallId>) {
        let Some(input) = cx.audio.sequencer_input() else {
            return;
        };
        let mut events = std::mem::take(&mut self.events);
        input.drain_events(&mut events);
        let offset = self.counters.offset();
        for event in &events {
            let Some(key) = event.note().map(u32::from) else {
                continue;
            };
            if event.is_note_on() {
                let mut note = Note::new(offset, offset + 1, key);
                note.x1 = u64::MAX;
                note.x1_256th = u64::MAX;
                note.flags |= NoteFlags::TRANSIENT;
                let velocity = event.velocity().unwrap_or(1.0);
                let key_mode = KeyMode::Midi {
                    attack: event.frame_offset,
                };
                self.key_on(cx, child, &note, velocity, key_mode);
            } else if event.is_note_off() {
                self.key_off(cx, child, key);
            }
        }
        events.clear();
        self.events = events;
    }

    /// Drop ended notes, grow signals still fed by notes and render the
    /// segment each signal plays this period.
    fn feed_signals(&self, cx: &RunContext<'_>, child: &Arc<RecallId>) {
        let note_256th = cx.audio.test_flags(AudioFlags::NOTE_256TH_MODE);
        let offset = self.counters.offset();
        let lower = self.counters.note_256th_window(cx.soundcard.delay()).0;

        for channel in cx.audio.channels(ChannelSide::Input) {
            let generator = channel.generator();
            for recycling in channel.recyclings() {
                recycling.with_signal_and_template(child, |signal, template| {
                    if !signal.is_active() {
                        return;
                    }
                    if note_256th {
                        signal.remove_notes_where(|n| n.x1_256th <= lower);
                    } else {
                        signal.remove_notes_where(|n| n.x1 <= offset);
                    }
                    let buffer_size = signal.buffer_size();
                    let current = signal.length_till_current();
                    if !signal.notes().is_empty() && (current + 1) * buffer_size >= signal.last_frame() {
                        signal.feed(signal.frame_count() + buffer_size);
                    }
                    if signal.needs_feed()
                        && (!signal.notes().is_empty() || current * buffer_size < signal.last_frame())
                    {
                        signal.continue_feed(&generator, template);
                    }
                });
            }
        }
    }

    /// Play the wave of audio channel `c` into input line `c`.
    fn play_wave(&self, cx: &RunContext<'_>, child: &Arc<RecallId>) {
        let audio = cx.audio;
        let delay = cx.soundcard.delay();
        let periods = periods_per_tick(delay);
        let buffer_size = audio.settings().buffer_size as u64;
        let frame = (self.counters.offset() * periods + self.counters.delay_counter()) * buffer_size;

        let mut playing = false;
        for audio_channel in 0..audio.audio_channels() {
            let end = audio
                .with_wave(audio_channel, |wave| {
                    wave.snapshot().iter().map(|b| b.end()).max().unwrap_or(0)
                })
                .unwrap_or(0);
            let Some(channel) = audio.input(audio_channel) else {
                continue;
            };
            for recycling in channel.recyclings() {
                let active = recycling.with_signal_and_template(child, |signal, template| {
                    if !signal.is_active() {
                        if frame >= end {
                            return false;
                        }
                        signal.open_feed((end - frame) as usize, 0, delay, &Generator::Silence, template);
                        if let Some(buffer) = signal.current_buffer_mut() {
                            let count = buffer.len();
                            audio.with_wave(audio_channel, |wave| wave.read(frame, buffer, 1, 0, count));
                        }
                    } else if signal.needs_feed() {
                        signal.render_next(|dest, _| {
                            let count = dest.len();
                            audio.with_wave(audio_channel, |wave| wave.read(frame, dest, 1, 0, count));
                        });
                    }
                    true
                });
                playing |= active.unwrap_or(false);
            }
        }
        if !playing {
            cx.request_done();
        }
    }

    fn any_signal_active(cx: &RunContext<'_>, child: &Arc<RecallId>) -> bool {
        cx.audio
            .channels(ChannelSide::Input)
            .iter()
            .flat_map(|channel| channel.recyclings())
            .any(|recycling| recycling.with_signal(child, |s| s.is_active()).unwrap_or(false))
    }
}

impl RecallBehaviour for AudioProcessor {
    fn run_init_pre(&mut self, cx: &RunContext<'_>) {
        self.mode = cx.scope().map(ProcessorMode::for_scope);
        self.counters.reset(cx.soundcard);
        self.primed = false;
    }

    fn run_init_inter(&mut self, cx: &RunContext<'_>) {
        if self.mode != Some(ProcessorMode::Playback) {
            return;
        }
        let Some(child) = cx.child_recall_id() else {
            return;
        };
        for channel in cx.audio.channels(ChannelSide::Input) {
            for recycling in channel.recyclings() {
                recycling.with_signal_and_template(&child, |signal, template| {
                    signal.duplicate_stream(template);
                });
            }
        }
    }

    fn run_pre(&mut self, cx: &RunContext<'_>) {
        if !self.primed {
            self.primed = true;
            return;
        }
        self.counters
            .counter_change(cx.soundcard.delay(), cx.soundcard.loop_range());
    }

    fn run_inter(&mut self, cx: &RunContext<'_>) {
        let Some(mode) = self.mode else {
            return;
        };
        let Some(child) = cx.child_recall_id() else {
            debug!("audio processor without a child run");
            return;
        };
        match mode {
            ProcessorMode::Notation => self.schedule_notation(cx, &child),
            ProcessorMode::Pattern => self.schedule_pattern(cx, &child),
            ProcessorMode::Midi => self.schedule_midi(cx, &child),
            ProcessorMode::Wave => {
                self.play_wave(cx, &child);
                return;
            }
            ProcessorMode::Playback => {}
        }
        if mode.finishes_with_signals() {
            if !Self::any_signal_active(cx, &child) {
                cx.request_done();
            }
            return;
        }
        self.feed_signals(cx, &child);
    }

    fn shared_state(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::clone(&self.counters) as Arc<dyn Any + Send + Sync>)
    }
}

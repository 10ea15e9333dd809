//! Audio signal streams.
//!
//! An [`AudioSignal`] is a list of mono segments of `buffer_size` frames.
//! `stream_current` indexes the segment played in the current period; the
//! signal is done once it is `None`. Segments up to `rendered` hold
//! generated audio, the rest are silent placeholders sized from the note.

use super::generator::{overwrite, Generator};
use ripieno_core::buffer::{self, SampleBuffer, SampleFormat};
use ripieno_core::timeline::{NoteEnvelope, NoteRef};
use ripieno_core::{RecallId, RecyclingId};
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AudioSignal {
    recycling: RecyclingId,
    recall_id: Option<Arc<RecallId>>,
    samplerate: u32,
    buffer_size: usize,
    format: SampleFormat,
    stream: Vec<SampleBuffer>,
    stream_current: Option<usize>,
    rendered: usize,
    /// Generator position of the next rendered frame.
    frame_position: u64,
    frame_count: usize,
    first_frame: usize,
    last_frame: usize,
    /// Periods per tick when the signal was opened.
    delay: f64,
    /// Silent lead-in frames of the first segment.
    attack: usize,
    loop_start: usize,
    loop_end: usize,
    velocity: f64,
    envelope: Option<NoteEnvelope>,
    notes: SmallVec<[NoteRef; 4]>,
}

impl AudioSignal {
    /// Prototype signal of a recycling. Holds loaded sample data, never plays.
    pub fn template(recycling: RecyclingId, samplerate: u32, buffer_size: usize, format: SampleFormat) -> Self {
        Self {
            recycling,
            recall_id: None,
            samplerate,
            buffer_size: buffer_size.max(1),
            format,
            stream: Vec::new(),
            stream_current: None,
            rendered: 0,
            frame_position: 0,
            frame_count: 0,
            first_frame: 0,
            last_frame: 0,
            delay: 0.0,
            attack: 0,
            loop_start: 0,
            loop_end: 0,
            velocity: 1.0,
            envelope: None,
            notes: SmallVec::new(),
        }
    }

    /// Empty working signal for `recall_id`, sharing the template's geometry.
    pub fn for_recall_id(template: &AudioSignal, recall_id: Arc<RecallId>) -> Self {
        Self {
            recall_id: Some(recall_id),
            loop_start: template.loop_start,
            loop_end: template.loop_end,
            ..Self::template(
                template.recycling,
                template.samplerate,
                template.buffer_size,
                template.format,
            )
        }
    }

    pub fn recycling(&self) -> RecyclingId {
        self.recycling
    }

    pub fn recall_id(&self) -> Option<&Arc<RecallId>> {
        self.recall_id.as_ref()
    }

    pub fn belongs_to(&self, recall_id: &Arc<RecallId>) -> bool {
        self.recall_id
            .as_ref()
            .is_some_and(|own| Arc::ptr_eq(own, recall_id))
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Segments in the stream.
    pub fn length(&self) -> usize {
        self.stream.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn first_frame(&self) -> usize {
        self.first_frame
    }

    pub fn last_frame(&self) -> usize {
        self.last_frame
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn attack(&self) -> usize {
        self.attack
    }

    pub fn loop_points(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn set_loop(&mut self, loop_start: usize, loop_end: usize) {
        if loop_start < loop_end {
            self.loop_start = loop_start;
            self.loop_end = loop_end;
        } else {
            self.loop_start = 0;
            self.loop_end = 0;
        }
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Shape of the most recently attached enveloped note.
    pub fn envelope(&self) -> Option<&NoteEnvelope> {
        self.envelope.as_ref()
    }

    pub fn set_envelope(&mut self, envelope: Option<NoteEnvelope>) {
        self.envelope = envelope;
    }

    pub fn notes(&self) -> &[NoteRef] {
        &self.notes
    }

    pub fn stream(&self) -> &[SampleBuffer] {
        &self.stream
    }

    pub fn stream_current(&self) -> Option<usize> {
        self.stream_current
    }

    pub fn current_buffer(&self) -> Option<&SampleBuffer> {
        self.stream_current.and_then(|i| self.stream.get(i))
    }

    pub fn current_buffer_mut(&mut self) -> Option<&mut SampleBuffer> {
        self.stream_current.and_then(|i| self.stream.get_mut(i))
    }

    /// Still producing audio.
    pub fn is_active(&self) -> bool {
        self.stream_current.is_some()
    }

    /// Segments played before the current one; the whole length once done.
    pub fn length_till_current(&self) -> usize {
        self.stream_current.unwrap_or(self.stream.len())
    }

    /// Replace the stream with mono `data`, split into segments.
    pub fn load(&mut self, data: &SampleBuffer) {
        let frames = data.len();
        let segments = frames.div_ceil(self.buffer_size);
        self.stream = (0..segments)
            .map(|i| {
                let mut segment = SampleBuffer::new(self.format, self.buffer_size);
                let offset = i * self.buffer_size;
                buffer::copy(&mut segment, 1, 0, data, 1, offset, self.buffer_size.min(frames - offset));
                segment
            })
            .collect();
        self.rendered = segments;
        self.frame_count = frames;
        self.first_frame = 0;
        self.last_frame = frames;
    }

    /// All `frame_count` frames as one double buffer.
    pub fn frames(&self) -> SampleBuffer {
        let mut frames = SampleBuffer::new(SampleFormat::Double, self.frame_count);
        for (i, segment) in self.stream.iter().enumerate() {
            let offset = i * self.buffer_size;
            if offset >= self.frame_count {
                break;
            }
            let count = segment.len().min(self.frame_count - offset);
            buffer::copy(&mut frames, 1, offset, segment, 1, 0, count);
        }
        frames
    }

    /// Move the loaded frames to a new samplerate, segment size and format.
    /// Loop points follow the samplerate.
    pub fn set_geometry(&mut self, samplerate: u32, buffer_size: usize, format: SampleFormat) {
        let mut frames = self.frames();
        if samplerate != self.samplerate && samplerate > 0 && !frames.is_empty() {
            frames = buffer::resample(&frames, 1, self.samplerate, frames.len(), samplerate);
            let scale = samplerate as f64 / self.samplerate.max(1) as f64;
            self.loop_start = (self.loop_start as f64 * scale).round() as usize;
            self.loop_end = (self.loop_end as f64 * scale).round() as usize;
        }
        self.samplerate = samplerate;
        self.buffer_size = buffer_size.max(1);
        self.format = format;
        if self.stream.is_empty() {
            return;
        }
        self.load(&frames);
    }

    /// Copy `dest.len()` frames from signal frame `frame` on, wrapping inside
    /// the loop points. Frames past the end stay silent.
    pub fn read_looped(&self, frame: u64, dest: &mut SampleBuffer) {
        let count = dest.len();
        let mut written = 0;
        let mut position = frame as usize;
        while written < count {
            if self.loop_end > self.loop_start && position >= self.loop_end {
                position = self.loop_start + (position - self.loop_start) % (self.loop_end - self.loop_start);
            }
            if position >= self.frame_count {
                break;
            }
            let segment = position / self.buffer_size;
            let offset = position % self.buffer_size;
            let mut chunk = (self.buffer_size - offset).min(count - written);
            chunk = chunk.min(self.frame_count - position);
            if self.loop_end > self.loop_start && position < self.loop_end {
                chunk = chunk.min(self.loop_end - position);
            }
            let Some(src) = self.stream.get(segment) else {
                break;
            };
            overwrite(dest, written, src, offset, chunk);
            written += chunk;
            position += chunk;
        }
    }

    /// Truncate or extend with silent segments.
    pub fn stream_resize(&mut self, length: usize) {
        let silent = SampleBuffer::new(self.format, self.buffer_size);
        self.stream.resize(length, silent);
        self.rendered = self.rendered.min(length);
        if self.stream_current.is_some_and(|current| current >= length) {
            self.stream_current = None;
        }
    }

    /// Grow to `length` segments. Never drops the current or rendered ones.
    pub fn stream_safe_resize(&mut self, length: usize) {
        let keep = self
            .stream_current
            .map_or(self.rendered, |current| (current + 1).max(self.rendered));
        self.stream_resize(length.max(keep).max(self.stream.len()));
    }

    /// Append one silent segment.
    pub fn add_stream(&mut self) {
        self.stream.push(SampleBuffer::new(self.format, self.buffer_size));
    }

    /// Replace the stream with a copy of `template`'s, converted to this
    /// signal's format, and play it from the start.
    pub fn duplicate_stream(&mut self, template: &AudioSignal) {
        self.stream = template
            .stream
            .iter()
            .map(|src| {
                let mut segment = SampleBuffer::new(self.format, self.buffer_size);
                buffer::copy(&mut segment, 1, 0, src, 1, 0, self.buffer_size.min(src.len()));
                segment
            })
            .collect();
        self.rendered = self.stream.len();
        self.frame_count = template.frame_count;
        self.last_frame = template.last_frame;
        self.loop_start = template.loop_start;
        self.loop_end = template.loop_end;
        self.stream_current = if self.stream.is_empty() { None } else { Some(0) };
    }

    pub fn add_note(&mut self, note: NoteRef, velocity: f64) {
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
        self.velocity = velocity;
    }

    /// Detach `note`. Returns whether it was attached.
    pub fn remove_note(&mut self, note: &NoteRef) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n != note);
        before != self.notes.len()
    }

    /// Detach every note matching `ended`. Returns how many were removed.
    pub fn remove_notes_where(&mut self, mut ended: impl FnMut(&NoteRef) -> bool) -> usize {
        let before = self.notes.len();
        self.notes.retain(|n| !ended(n));
        before - self.notes.len()
    }

    /// Start a fresh stream of `frame_count` frames and render its first
    /// segment. The first `attack` frames stay silent.
    pub fn open_feed(
        &mut self,
        frame_count: usize,
        attack: usize,
        delay: f64,
        generator: &Generator,
        template: &AudioSignal,
    ) {
        let attack = attack.min(self.buffer_size - 1);
        self.stream.clear();
        self.rendered = 0;
        self.frame_position = 0;
        self.attack = attack;
        self.delay = delay;
        self.first_frame = attack;
        self.frame_count = frame_count.max(1);
        self.last_frame = attack + self.frame_count;
        self.stream_resize(self.last_frame.div_ceil(self.buffer_size).max(1));
        self.stream_current = Some(0);
        self.continue_feed(generator, template);
    }

    /// Render the next unrendered segment, appending one when the stream is
    /// exhausted.
    pub fn continue_feed(&mut self, generator: &Generator, template: &AudioSignal) {
        let samplerate = self.samplerate;
        self.render_next(|dest, frame| generator.render(dest, frame, samplerate, template));
    }

    /// Like [`continue_feed`](Self::continue_feed) with a caller supplied
    /// source writing mono frames from signal frame `frame` on.
    pub fn render_next(&mut self, render: impl FnOnce(&mut SampleBuffer, u64)) {
        if self.rendered >= self.stream.len() {
            self.add_stream();
        }
        let lead = if self.rendered == 0 { self.attack } else { 0 };
        let count = self.buffer_size - lead;
        let mut scratch = SampleBuffer::new(self.format, count);
        render(&mut scratch, self.frame_position);
        if self.velocity != 1.0 {
            buffer::volume(&mut scratch, 1, count, self.velocity);
        }
        if let Some(segment) = self.stream.get_mut(self.rendered) {
            overwrite(segment, lead, &scratch, 0, count);
        }
        self.frame_position += count as u64;
        self.rendered += 1;
    }

    /// Grow the stream to cover `frame_count` frames from the first one.
    /// Used when a sounding note outlasts the segments sized at open.
    pub fn feed(&mut self, frame_count: usize) {
        if frame_count <= self.frame_count {
            return;
        }
        self.frame_count = frame_count;
        self.last_frame = self.first_frame + frame_count;
        self.stream_safe_resize(self.last_frame.div_ceil(self.buffer_size));
    }

    /// True when the current segment has not been rendered yet.
    pub fn needs_feed(&self) -> bool {
        self.stream_current.is_some_and(|current| current >= self.rendered)
    }

    /// Move to the next segment. Past the end, a signal still fed by notes
    /// grows by one segment; otherwise it is done.
    pub fn advance(&mut self) {
        let Some(current) = self.stream_current else {
            return;
        };
        let next = current + 1;
        if next < self.stream.len() {
            self.stream_current = Some(next);
        } else if !self.notes.is_empty() {
            self.add_stream();
            self.stream_current = Some(next);
        } else {
            self.stream_current = None;
        }
    }
}

/// First signal of `recall_id` in `list`.
pub fn find_by_recall_id<'a>(list: &'a [AudioSignal], recall_id: &Arc<RecallId>) -> Option<&'a AudioSignal> {
    list.iter().find(|signal| signal.belongs_to(recall_id))
}

/// First signal of `recall_id` that is still playing.
pub fn find_stream_current<'a>(list: &'a [AudioSignal], recall_id: &Arc<RecallId>) -> Option<&'a AudioSignal> {
    list.iter()
        .find(|signal| signal.belongs_to(recall_id) && signal.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ripieno_core::{RecyclingContext, SoundScope};

    fn template() -> AudioSignal {
        AudioSignal::template(RecyclingId(7), 44100, 4, SampleFormat::Double)
    }

    fn working() -> AudioSignal {
        let id = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Notation, 1));
        AudioSignal::for_recall_id(&template(), id)
    }

    fn tone() -> Generator {
        Generator::Oscillator {
            frequency: 441.0,
            amplitude: 0.5,
        }
    }

    #[test]
    fn test_open_feed_sizes_from_frame_count() {
        let mut signal = working();
        signal.open_feed(10, 0, 2.5, &tone(), &template());
        assert_eq!(signal.length(), 3);
        assert_eq!(signal.stream_current(), Some(0));
        assert!(!signal.needs_feed());
        assert!(!signal.current_buffer().unwrap().is_silent());
    }

    #[test]
    fn test_attack_leaves_lead_in_silent() {
        let mut signal = working();
        signal.open_feed(8, 3, 2.0, &Generator::Template, &template());
        let mut loaded = template();
        loaded.load(&SampleBuffer::Double(vec![1.0; 8]));
        signal.open_feed(8, 3, 2.0, &Generator::Template, &loaded);
        let first = signal.current_buffer().unwrap();
        assert_eq!(first.to_normalized(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_advance_to_done() {
        let mut signal = working();
        signal.open_feed(8, 0, 2.0, &tone(), &template());
        signal.advance();
        assert!(signal.needs_feed());
        signal.continue_feed(&tone(), &template());
        signal.advance();
        assert_eq!(signal.stream_current(), None);
        assert_eq!(signal.length_till_current(), 2);
    }

    #[test]
    fn test_notes_keep_stream_alive() {
        let mut signal = working();
        let note = NoteRef {
            x0: 0,
            x1: 4,
            x0_256th: 0,
            x1_256th: 64,
            y: 60,
        };
        signal.add_note(note, 1.0);
        signal.open_feed(4, 0, 1.0, &tone(), &template());
        signal.advance();
        assert_eq!(signal.stream_current(), Some(1));
        assert_eq!(signal.length(), 2);

        assert!(signal.remove_note(&note));
        signal.advance();
        assert!(!signal.is_active());
    }

    #[test]
    fn test_safe_resize_keeps_current() {
        let mut signal = working();
        signal.open_feed(16, 0, 4.0, &tone(), &template());
        signal.advance();
        signal.advance();
        signal.stream_safe_resize(1);
        assert_eq!(signal.length(), 4);
        signal.stream_resize(1);
        assert_eq!(signal.stream_current(), None);
    }

    #[test]
    fn test_feed_grows() {
        let mut signal = working();
        signal.open_feed(4, 0, 1.0, &tone(), &template());
        signal.feed(12);
        assert_eq!(signal.length(), 3);
        assert_eq!(signal.frame_count(), 12);
    }

    #[test]
    fn test_template_loop() {
        let mut loaded = template();
        loaded.load(&SampleBuffer::Double(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));
        loaded.set_loop(2, 4);
        let mut dest = SampleBuffer::new(SampleFormat::Double, 8);
        loaded.read_looped(0, &mut dest);
        let values: Vec<f64> = dest.to_normalized().iter().map(|v| (v * 10.0).round() / 10.0).collect();
        assert_eq!(values, vec![0.1, 0.2, 0.3, 0.4, 0.3, 0.4, 0.3, 0.4]);
    }

    #[test]
    fn test_duplicate_stream_converts() {
        let mut loaded = template();
        loaded.load(&SampleBuffer::Double(vec![0.5; 6]));
        let mut signal = AudioSignal::template(RecyclingId(7), 44100, 4, SampleFormat::S16);
        signal.duplicate_stream(&loaded);
        assert_eq!(signal.length(), 2);
        assert_eq!(signal.frame_count(), 6);
        assert_eq!(signal.stream()[1].format(), SampleFormat::S16);
    }

    #[test]
    fn test_set_geometry_resamples() {
        let mut loaded = template();
        loaded.load(&SampleBuffer::Double(vec![0.25; 8]));
        loaded.set_loop(2, 6);
        loaded.set_geometry(88200, 8, SampleFormat::Float);
        assert_eq!(loaded.frame_count(), 16);
        assert_eq!(loaded.length(), 2);
        assert_eq!(loaded.loop_points(), (4, 12));
        assert_eq!(loaded.format(), SampleFormat::Float);
    }

    #[test]
    fn test_find_helpers() {
        let id = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Playback, 1));
        let mut playing = AudioSignal::for_recall_id(&template(), Arc::clone(&id));
        let idle = AudioSignal::for_recall_id(&template(), Arc::clone(&id));
        playing.open_feed(4, 0, 1.0, &tone(), &template());
        let list = vec![idle, playing];
        assert!(find_by_recall_id(&list, &id).is_some_and(|s| !s.is_active()));
        assert!(find_stream_current(&list, &id).is_some_and(|s| s.is_active()));
    }

    proptest! {
        #[test]
        fn prop_safe_resize_never_drops_current(segments in 1usize..8, steps in 0usize..8, length in 0usize..16) {
            let steps = steps % segments;
            let mut signal = working();
            signal.open_feed(segments * 4, 0, segments as f64, &tone(), &template());
            for _ in 0..steps {
                signal.advance();
            }
            signal.stream_safe_resize(length);
            prop_assert_eq!(signal.stream_current(), Some(steps));
            prop_assert_eq!(signal.length(), length.max(segments));
        }
    }
}

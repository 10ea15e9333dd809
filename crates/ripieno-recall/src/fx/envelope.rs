//! Note envelopes.
//!
//! [`EnvelopeChannelRun`] is the per-line parent; one [`EnvelopeAudioSignal`]
//! per recycling shapes the current segment of its signal with the envelope
//! of the note feeding it. The position inside the note is read from the
//! audio processor's counters, so the signal recall depends on it.

use crate::processor::ProcessorCounters;
use crate::recall::{Recall, RecallBehaviour, RecallDependency, RunContext};
use crate::topology::{overwrite, AudioFlags};
use ripieno_core::buffer::{self, SampleBuffer};
use ripieno_core::config::periods_per_tick;
use ripieno_core::timeline::NoteEnvelope;
use std::sync::Arc;
use tracing::warn;

pub const USE_NOTE_LENGTH_PORT: &str = "./use-note-length[0]";
pub const FIXED_LENGTH_PORT: &str = "./fixed-length[0]";

/// Parent of the per-recycling envelope recalls of one line.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeChannelRun;

impl RecallBehaviour for EnvelopeChannelRun {}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeAudioSignal {
    counters: Option<Arc<ProcessorCounters>>,
    warned: bool,
}

impl EnvelopeAudioSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.counters.is_some()
    }
}

impl RecallBehaviour for EnvelopeAudioSignal {
    fn resolve_dependency(&mut self, _dependency: &RecallDependency, provider: &Recall) {
        self.counters = provider
            .shared_state()
            .and_then(|state| state.downcast::<ProcessorCounters>().ok());
    }

    fn run_inter(&mut self, cx: &RunContext<'_>) {
        let Some(counters) = &self.counters else {
            if !self.warned {
                warn!(recall = %cx.recall.name(), "envelope without processor counters, staying silent");
                self.warned = true;
            }
            return;
        };
        let Some(recycling) = cx.recycling() else {
            return;
        };
        let use_note_length = cx.port_value(USE_NOTE_LENGTH_PORT, 1.0) != 0.0;
        let fixed_length = cx.port_value(FIXED_LENGTH_PORT, 1.0);
        let delay = cx.soundcard.delay();
        let periods = periods_per_tick(delay);
        let tick_mode = !cx.audio.test_flags(AudioFlags::NOTE_256TH_MODE);

        recycling.with_signal(cx.recall_id, |signal| {
            let Some(envelope) = signal.envelope().copied() else {
                return;
            };
            let Some(current) = signal.stream_current() else {
                return;
            };
            let buffer_size = signal.buffer_size();
            let frame_count = if use_note_length {
                signal.frame_count()
            } else {
                (fixed_length * delay * buffer_size as f64).round() as usize
            };
            // frames since the note started, at the first frame of this period
            let position = match signal.notes().first() {
                Some(note) if tick_mode && note.x1 != u64::MAX && counters.offset() >= note.x0 => {
                    let elapsed = (counters.offset() - note.x0) * periods + counters.delay_counter();
                    (elapsed * buffer_size as u64) as i64 - signal.attack() as i64
                }
                _ => (current * buffer_size) as i64 - signal.first_frame() as i64,
            };
            if let Some(segment) = signal.current_buffer_mut() {
                apply_envelope(segment, &envelope, frame_count, position);
            }
        });
    }
}

/// Shape `segment` with `envelope` laid out over `frame_count` frames.
/// Frame 0 of `segment` is envelope frame `position`, which is negative
/// while the note's lead-in plays.
pub fn apply_envelope(segment: &mut SampleBuffer, envelope: &NoteEnvelope, frame_count: usize, position: i64) {
    let length = segment.len() as i64;
    let mut scratch = SampleBuffer::new(segment.format(), segment.len());
    for stage in envelope.segments(frame_count) {
        let from = (stage.start_frame as i64).max(position);
        let to = (stage.end_frame as i64).min(position + length);
        if from >= to {
            continue;
        }
        let offset = (from - position) as usize;
        let count = (to - from) as usize;
        overwrite(&mut scratch, 0, segment, offset, count);
        buffer::envelope(&mut scratch, 1, count, stage.volume_at(from as usize), stage.ratio());
        overwrite(segment, offset, &scratch, 0, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ripieno_core::timeline::EnvelopePoint;
    use ripieno_core::SampleFormat;

    fn ramp() -> NoteEnvelope {
        let point = |level| EnvelopePoint { length: 0.25, level };
        NoteEnvelope {
            attack: point(1.0),
            decay: point(1.0),
            sustain: point(1.0),
            release: point(0.0),
            ratio: 0.0,
        }
    }

    #[test]
    fn test_envelope_is_continuous_across_periods() {
        let envelope = ramp();
        let mut whole = SampleBuffer::Double(vec![1.0; 16]);
        apply_envelope(&mut whole, &envelope, 16, 0);

        let mut first = SampleBuffer::Double(vec![1.0; 8]);
        let mut second = SampleBuffer::Double(vec![1.0; 8]);
        apply_envelope(&mut first, &envelope, 16, 0);
        apply_envelope(&mut second, &envelope, 16, 8);

        let split: Vec<f64> = first
            .to_normalized()
            .into_iter()
            .chain(second.to_normalized())
            .collect();
        for (a, b) in whole.to_normalized().iter().zip(&split) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_relative_eq!(whole.get(0).unwrap(), 0.0);
        assert_relative_eq!(whole.get(4).unwrap(), 1.0);
        assert!(whole.get(15).unwrap() < 0.3);
    }

    #[test]
    fn test_lead_in_is_left_alone() {
        let mut segment = SampleBuffer::from_normalized(SampleFormat::Float, &[0.5; 8]);
        apply_envelope(&mut segment, &ramp(), 16, -4);
        for i in 0..4 {
            assert_relative_eq!(segment.get(i).unwrap(), 0.5, epsilon = 1e-6);
        }
        assert_relative_eq!(segment.get(4).unwrap(), 0.0, epsilon = 1e-6);
    }
}

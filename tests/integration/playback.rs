//! Playback integration tests
//!
//! One scope per test: notes keyed from the notation, pattern steps, wave
//! buffers and live MIDI all end up mixed into the output period.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use ripieno::prelude::*;
use ripieno::{EngineConfig, MidiEventQueue, RecallId, SequencerInput};
use std::sync::Arc;

/// A two tick note plays for two ticks' worth of periods, then the line
/// falls silent while the notation run stays active.
#[test]
fn test_simple_note_playback() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 8);
    engine.add_note(audio.id(), 0, Note::new(0, 2, 3)).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    let left = render_channel(&engine, 3 * PERIODS_PER_TICK, 0);
    for period in &left[..2 * PERIODS_PER_TICK] {
        assert_has_audio(period, AUDIBLE_RMS);
    }
    for period in &left[2 * PERIODS_PER_TICK + 3..] {
        assert_silence(period, SILENCE_THRESHOLD);
    }
    assert_eq!(audio.check_scope(SoundScope::Notation).len(), 2);
}

/// A one tick note keeps its signal's stream current for the whole tick;
/// the signal closes only once the clock has moved past the note.
#[test]
fn test_note_signal_closes_after_its_tick() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::new(0, 1, 3)).unwrap();
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();
    let recycling = audio.input(3).unwrap().first_recycling().unwrap();

    let mut first_closed = None;
    for period in 0..3 * PERIODS_PER_TICK {
        engine.tick();
        let signal = recycling.signal_snapshot(&child).unwrap();
        if period < PERIODS_PER_TICK {
            assert!(signal.stream_current().is_some(), "period {period} closed early");
        }
        if signal.stream_current().is_none() && first_closed.is_none() {
            first_closed = Some((period, engine.soundcard().note_offset()));
        }
    }
    let (period, note_offset) = first_closed.expect("signal never closed");
    assert!(period >= PERIODS_PER_TICK && period <= PERIODS_PER_TICK + 2, "closed at period {period}");
    assert_eq!(note_offset, 1);
}

#[test]
fn test_mono_audio_stays_on_first_pcm_channel() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::new(0, 1, 0)).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    let period = engine.tick();
    assert_has_audio(&channel_samples(&period, 0), AUDIBLE_RMS);
    assert_silence(&channel_samples(&period, 1), SILENCE_THRESHOLD);
}

#[test]
fn test_second_audio_channel_maps_to_right() {
    let engine = test_engine();
    let audio = engine
        .add_audio(AudioGeometry::new(2, 1, 4), AudioFlags::INPUT_HAS_RECYCLING)
        .unwrap();
    engine.add_note(audio.id(), 1, Note::new(0, 1, 2)).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    let period = engine.tick();
    assert_silence(&channel_samples(&period, 0), SILENCE_THRESHOLD);
    assert_has_audio(&channel_samples(&period, 1), AUDIBLE_RMS);
}

#[test]
fn test_notes_start_on_their_tick() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::new(1, 2, 1)).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    let left = render_channel(&engine, 2 * PERIODS_PER_TICK, 0);
    for period in &left[..PERIODS_PER_TICK] {
        assert_silence(period, SILENCE_THRESHOLD);
    }
    assert_has_audio(&left[PERIODS_PER_TICK], AUDIBLE_RMS);
}

#[test]
fn test_keys_outside_the_pads_are_ignored() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::new(0, 1, 9)).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    for period in render_channel(&engine, 4, 0) {
        assert_silence(&period, SILENCE_THRESHOLD);
    }
}

fn note_256th_engine(buffer_size: usize) -> RipienoEngine {
    test_engine_with(EngineConfig {
        buffer_size,
        note_256th_mode: true,
        ..EngineConfig::default()
    })
}

/// Periods in which the signal of `line` went from idle to playing.
fn openings(engine: &RipienoEngine, audio: &ripieno::Audio, child: &Arc<RecallId>, line: usize, periods: usize) -> Vec<usize> {
    let recycling = audio.input(line).unwrap().first_recycling().unwrap();
    let mut was_active = false;
    let mut opened = Vec::new();
    for period in 0..periods {
        engine.tick();
        let active = recycling.signal_snapshot(child).unwrap().is_active();
        if active && !was_active {
            opened.push(period);
        }
        was_active = active;
    }
    opened
}

/// With one period per tick a single 256th window covers the whole tick:
/// every note starting in it opens, each at its own attack.
#[test]
fn test_256th_notes_in_one_period_all_open() {
    let engine = note_256th_engine(4096);
    assert_eq!(engine.soundcard().delay().floor(), 1.0);
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::with_256th(1, 17, 0)).unwrap();
    engine.add_note(audio.id(), 0, Note::with_256th(3, 19, 1)).unwrap();
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();

    let left = channel_samples(&engine.tick(), 0);
    assert_has_audio(&left, AUDIBLE_RMS);
    for (line, attack) in [(0, 256), (1, 768)] {
        let signal = audio
            .input(line)
            .unwrap()
            .first_recycling()
            .unwrap()
            .signal_snapshot(&child)
            .unwrap();
        assert!(signal.is_active(), "line {line}");
        assert_eq!(signal.attack(), attack);
        assert_eq!(signal.notes().len(), 1);
    }
    assert!(left[..256].iter().all(|s| s.abs() <= SILENCE_THRESHOLD));
}

/// Consecutive 256th windows never key the same note twice.
#[test]
fn test_256th_note_keys_once_across_windows() {
    let engine = note_256th_engine(TEST_BUFFER_SIZE);
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::with_256th(1, 2, 2)).unwrap();
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();

    assert_eq!(openings(&engine, &audio, &child, 2, 3 * PERIODS_PER_TICK), vec![0]);
}

/// A loop wrap forgets the scheduled window, so the note keys once per
/// pass and no more.
#[test]
fn test_256th_note_keys_once_per_loop_pass() {
    let engine = note_256th_engine(TEST_BUFFER_SIZE);
    engine.set_loop(0, 1, true).unwrap();
    let audio = mono_audio(&engine, 4);
    engine.add_note(audio.id(), 0, Note::with_256th(1, 2, 2)).unwrap();
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();

    let opened = openings(&engine, &audio, &child, 2, 3 * PERIODS_PER_TICK);
    assert_eq!(opened, vec![0, PERIODS_PER_TICK, 2 * PERIODS_PER_TICK]);
}

/// Toggling a step on makes the sequencer key that line on the step's
/// tick; toggling it back off leaves the next pass silent.
#[test]
fn test_pattern_toggle_then_playback() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    engine.toggle_pattern_step(audio.id(), 2, 1).unwrap();
    let top = engine.start(audio.id(), SoundScope::Sequencer).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();

    let left = render_channel(&engine, 2 * PERIODS_PER_TICK, 0);
    for period in &left[..PERIODS_PER_TICK] {
        assert_silence(period, SILENCE_THRESHOLD);
    }
    assert_has_audio(&left[PERIODS_PER_TICK], AUDIBLE_RMS);
    // only the toggled line opened a signal
    for line in 0..audio.input_lines() {
        let signal = audio
            .input(line)
            .unwrap()
            .first_recycling()
            .unwrap()
            .signal_snapshot(&child)
            .unwrap();
        assert_eq!(signal.is_active(), line == 2, "line {line}");
    }

    engine.toggle_pattern_step(audio.id(), 2, 1).unwrap();
    // rest of the pattern, then step 1 of the second pass
    let rest = render_channel(&engine, 16 * PERIODS_PER_TICK, 0);
    for period in &rest[15 * PERIODS_PER_TICK..] {
        assert_silence(period, SILENCE_THRESHOLD);
    }
}

/// A wave run plays its buffers once and then finishes by itself.
#[test]
fn test_wave_playback_finishes() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 1);
    let data = SampleBuffer::from_normalized(SampleFormat::Double, &vec![0.5; 4 * TEST_BUFFER_SIZE]);
    audio.with_wave(0, |wave| wave.add_buffer(0, data)).unwrap();
    engine.start(audio.id(), SoundScope::Wave).unwrap();

    let left = render_channel(&engine, 8, 0);
    for period in &left[..4] {
        assert!((peak(period) - 0.5).abs() <= INT16_EPSILON * 2.0);
    }
    for period in &left[5..] {
        assert_silence(period, SILENCE_THRESHOLD);
    }
    assert!(audio.check_scope(SoundScope::Wave).is_empty());
}

/// Note-on from the sequencer input sounds until note-off; the held note
/// outlasts the one tick its signal opens with.
#[test]
fn test_midi_note_on_off() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let queue = Arc::new(MidiEventQueue::new(64));
    engine
        .set_sequencer_input(audio.id(), Some(Arc::clone(&queue) as Arc<dyn SequencerInput>))
        .unwrap();
    engine.start(audio.id(), SoundScope::Midi).unwrap();

    assert!(queue.push(MidiEvent::note_on(0, 0, 1, 127)));
    let held = render_channel(&engine, 3 * PERIODS_PER_TICK, 0);
    for period in &held {
        assert_has_audio(period, AUDIBLE_RMS);
    }

    assert!(queue.push(MidiEvent::note_off(0, 0, 1)));
    let released = render_channel(&engine, 4, 0);
    assert_silence(&released[3], SILENCE_THRESHOLD);
}

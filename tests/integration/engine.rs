//! Engine integration tests
//!
//! Configuration validation, audio management and the editing commands.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use ripieno::prelude::*;
use ripieno::{EngineConfig, Error};

#[test]
fn test_config_errors_are_synchronous() {
    let err = RipienoEngine::builder().bpm(1000.0).build().unwrap_err();
    assert!(matches!(err, Error::Core(ripieno::core::Error::InvalidTempo(_))));

    let err = RipienoEngine::builder().buffer_size(0).build().unwrap_err();
    assert!(matches!(err, Error::Core(ripieno::core::Error::InvalidConfig(_))));

    let engine = test_engine();
    assert!(matches!(
        engine.set_bpm(0.5),
        Err(Error::Core(ripieno::core::Error::InvalidTempo(_)))
    ));
    assert!(matches!(
        engine.set_loop(8, 4, true),
        Err(Error::Core(ripieno::core::Error::InvalidLoopRange { left: 8, right: 4 }))
    ));
    // a disabled loop is not checked
    assert!(engine.set_loop(8, 4, false).is_ok());
}

#[test]
fn test_tempo_changes_tick_length() {
    let engine = test_engine();
    assert_eq!(engine.soundcard().delay().floor() as usize, PERIODS_PER_TICK);

    engine.set_bpm(60.0).unwrap();
    assert_eq!(engine.soundcard().bpm(), 60.0);
    assert_eq!(engine.soundcard().delay().floor() as usize, 2 * PERIODS_PER_TICK + 1);
}

#[test]
fn test_clock_advances_once_per_period() {
    let engine = test_engine();
    for _ in 0..PERIODS_PER_TICK * 3 {
        engine.tick();
    }
    assert_eq!(engine.soundcard().note_offset(), 3);
    assert_eq!(engine.soundcard().delay_counter(), 0);

    engine.seek(16);
    engine.tick();
    assert_eq!(engine.soundcard().note_offset(), 16);
    assert_eq!(engine.soundcard().delay_counter(), 1);
}

#[test]
fn test_loop_wraps_clock() {
    let engine = test_engine();
    engine.set_loop(0, 2, true).unwrap();
    for _ in 0..PERIODS_PER_TICK * 2 {
        engine.tick();
    }
    assert_eq!(engine.soundcard().note_offset(), 0);
    assert_eq!(engine.soundcard().note_offset_absolute(), 2);
}

#[test]
fn test_add_and_remove_audio() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let id = audio.id();
    assert_eq!(engine.audios().len(), 1);
    assert_eq!(engine.audio(id).unwrap().input_lines(), 4);

    engine.start(id, SoundScope::Notation).unwrap();
    let removed = engine.remove_audio(id).unwrap();
    assert!(removed.check_scope(SoundScope::Notation).is_empty());
    assert!(matches!(engine.audio(id), Err(Error::AudioNotFound(_))));
    assert!(matches!(engine.remove_audio(id), Err(Error::AudioNotFound(_))));
}

#[test]
fn test_geometry_commands() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);

    engine.set_audio_channels(audio.id(), 2).unwrap();
    assert_eq!(audio.input_lines(), 8);
    assert_eq!(audio.output_lines(), 2);

    engine.set_pads(audio.id(), ChannelSide::Input, 2).unwrap();
    assert_eq!(audio.input_lines(), 4);
    assert_eq!(audio.input(3).unwrap().line(), 3);

    assert!(engine.set_pads(audio.id(), ChannelSide::Output, 0).is_err());
}

/// Growing the input pads of a running notation gives the new lines the
/// run's id and signal, and notes on them play.
#[test]
fn test_pads_added_during_run_join_the_run() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();
    engine.tick();

    engine.set_pads(audio.id(), ChannelSide::Input, 8).unwrap();
    assert_eq!(child.recycling_context().len(), audio.input_lines());
    let channel = audio.input(6).unwrap();
    assert!(channel.recall_ids().iter().any(|id| std::sync::Arc::ptr_eq(id, &child)));
    let recycling = channel.first_recycling().unwrap();
    assert_eq!(recycling.signal_count(), 1);
    assert!(recycling.has_signal(&child));
    assert_eq!(child.recycling_context().find(recycling.id()), Some(6));

    engine.add_note(audio.id(), 0, Note::new(1, 2, 6)).unwrap();
    let left = render_channel(&engine, 2 * PERIODS_PER_TICK, 0);
    assert!(left.iter().any(|period| rms(period) >= AUDIBLE_RMS));
}

/// Shrinking the input pads of a running notation drops the run's ids and
/// signals from the removed lines along with their slots.
#[test]
fn test_pads_removed_during_run_leave_the_run() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 8);
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();
    let removed = audio.input(6).unwrap();
    let removed_recycling = removed.first_recycling().unwrap();
    assert!(removed_recycling.has_signal(&child));

    engine.set_pads(audio.id(), ChannelSide::Input, 4).unwrap();
    assert_eq!(child.recycling_context().len(), 4);
    assert!(child.recycling_context().find(removed_recycling.id()).is_none());
    assert!(removed.recall_ids().is_empty());
    assert_eq!(removed_recycling.signal_count(), 0);
    for line in 0..4 {
        assert!(audio.input(line).unwrap().first_recycling().unwrap().has_signal(&child));
    }
    for _ in 0..PERIODS_PER_TICK {
        engine.tick();
    }
    assert_eq!(audio.check_scope(SoundScope::Notation).len(), 2);
}

/// Adding an audio channel mid-run rebinds both sides of the run.
#[test]
fn test_audio_channels_added_during_run_join_the_run() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let top = engine.start(audio.id(), SoundScope::Notation).unwrap();
    let child = top
        .recycling_context()
        .child_recall_id(&audio.recall_ids())
        .unwrap();

    engine.set_audio_channels(audio.id(), 2).unwrap();
    assert_eq!(top.recycling_context().len(), 2);
    assert_eq!(child.recycling_context().len(), 8);
    for line in 0..8 {
        assert!(audio.input(line).unwrap().first_recycling().unwrap().has_signal(&child));
    }
    let right_output = audio.output(1).unwrap();
    assert!(right_output.recall_ids().iter().any(|id| std::sync::Arc::ptr_eq(id, &top)));

    engine.add_note(audio.id(), 1, Note::new(1, 2, 2)).unwrap();
    let right = render_channel(&engine, 2 * PERIODS_PER_TICK, 1);
    assert!(right.iter().any(|period| rms(period) >= AUDIBLE_RMS));
}

#[test]
fn test_256th_mode_follows_config() {
    let engine = test_engine_with(EngineConfig {
        note_256th_mode: true,
        ..EngineConfig::default()
    });
    let audio = mono_audio(&engine, 4);
    assert!(audio.test_flags(AudioFlags::NOTE_256TH_MODE));
}

#[test]
fn test_notation_editing() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 8);
    let id = audio.id();

    engine.add_note(id, 0, Note::new(0, 1, 2)).unwrap();
    engine.add_note(id, 0, Note::new(4, 6, 3)).unwrap();
    engine.add_note(id, 0, Note::new(8, 9, 7)).unwrap();
    assert!(matches!(
        engine.add_note(id, 1, Note::new(0, 1, 0)),
        Err(Error::AudioChannelOutOfRange { audio_channel: 1, .. })
    ));

    engine.position(id, 0, 4, 3).unwrap();
    let notation = audio.notation(0).unwrap();
    assert!(notation.is_note_selected(4, 3));
    assert!(!notation.is_note_selected(0, 2));

    engine.select_region(id, 0, 0, 0, 5, 4).unwrap();
    assert_eq!(notation.selection().len(), 2);

    engine.crop(id, 0, CropMode::Relative { delta: 2 }).unwrap();
    let snapshot = notation.snapshot();
    assert_eq!(snapshot[0].x1, 3);
    assert_eq!(snapshot[1].x1, 8);
    assert_eq!(snapshot[2].x1, 9);

    assert!(engine.remove_note(id, 0, 8, 7).unwrap());
    assert_eq!(notation.len(), 2);
}

#[test]
fn test_pattern_toggle_is_involution() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 2);

    assert!(engine.toggle_pattern_step(audio.id(), 1, 5).unwrap());
    assert!(audio.input(1).unwrap().pattern().get_bit(0, 0, 5));
    assert!(!engine.toggle_pattern_step(audio.id(), 1, 5).unwrap());
    assert!(!audio.input(1).unwrap().pattern().get_bit(0, 0, 5));

    assert!(engine.toggle_pattern_step(audio.id(), 2, 0).is_err());
    assert!(engine.toggle_pattern_step(audio.id(), 0, 64).is_err());
}

//! Concurrent scope tests
//!
//! Runs of different scopes share the audio tree but keep their own recall
//! ids, signals and working recalls.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use ripieno::prelude::*;
use ripieno::{EngineConfig, StagingFlags, StateFlags};

fn notation_and_pattern(engine: &RipienoEngine, notation: bool, pattern: bool) -> std::sync::Arc<ripieno::Audio> {
    let audio = mono_audio(engine, 4);
    engine.add_note(audio.id(), 0, Note::new(0, 1, 0)).unwrap();
    engine.toggle_pattern_step(audio.id(), 1, 0).unwrap();
    if notation {
        engine.start(audio.id(), SoundScope::Notation).unwrap();
    }
    if pattern {
        engine.start(audio.id(), SoundScope::Sequencer).unwrap();
    }
    audio
}

/// Notation and sequencer runs on one audio mix like the two runs played
/// on their own.
#[test]
fn test_concurrent_scopes_mix() {
    let periods = 4;
    let notation_only = {
        let engine = test_engine();
        notation_and_pattern(&engine, true, false);
        render_channel(&engine, periods, 0)
    };
    let pattern_only = {
        let engine = test_engine();
        notation_and_pattern(&engine, false, true);
        render_channel(&engine, periods, 0)
    };

    let engine = test_engine();
    let audio = notation_and_pattern(&engine, true, true);
    assert_eq!(audio.check_scope(SoundScope::Notation).len(), 2);
    assert_eq!(audio.check_scope(SoundScope::Sequencer).len(), 2);
    assert_eq!(audio.recall_ids().len(), 4);

    let both = render_channel(&engine, periods, 0);
    for period in 0..periods {
        assert_has_audio(&notation_only[period], AUDIBLE_RMS);
        assert_has_audio(&pattern_only[period], AUDIBLE_RMS);
        for (i, sample) in both[period].iter().enumerate() {
            let expected = notation_only[period][i] + pattern_only[period][i];
            assert!(
                (sample - expected).abs() <= 2.0 * INT16_EPSILON,
                "period {period} frame {i}: {sample} != {expected}"
            );
        }
    }
}

/// Each run walks its own stages: a run started later begins unstaged
/// while the earlier one is mid-period, and the scope check tells the
/// toplevel ids apart.
#[test]
fn test_concurrent_runs_stage_independently() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let notation = engine.start(audio.id(), SoundScope::Notation).unwrap();
    engine.tick();
    let after_tick = notation.staging_flags();
    assert!(after_tick.contains(StagingFlags::RUN_INTER | StagingFlags::RUN_POST));
    assert!(!after_tick.contains(StagingFlags::RUN_PRE));

    let sequencer = engine.start(audio.id(), SoundScope::Sequencer).unwrap();
    assert!(!sequencer.staging_flags().intersects(StagingFlags::RUN));
    assert!(sequencer.check_staging_flags(StagingFlags::RUN_INIT | StagingFlags::RESOLVE));
    assert_eq!(notation.staging_flags(), after_tick);

    engine.tick();
    for top in [&notation, &sequencer] {
        assert!(top.check_staging_flags(StagingFlags::RUN_POST));
        assert!(!top.check_staging_flags(StagingFlags::RUN_PRE));
    }

    assert!(notation.check_sound_scope(Some(SoundScope::Notation)));
    assert!(!notation.check_sound_scope(Some(SoundScope::Sequencer)));
    assert!(sequencer.check_sound_scope(Some(SoundScope::Sequencer)));
    assert!(!sequencer.check_sound_scope(Some(SoundScope::Notation)));
    assert!(notation.check_sound_scope(None) && sequencer.check_sound_scope(None));
    assert!(!std::sync::Arc::ptr_eq(notation.recycling_context(), sequencer.recycling_context()));
}

#[test]
fn test_each_run_gets_its_own_signal() {
    let engine = test_engine();
    let audio = notation_and_pattern(&engine, true, true);
    let recycling = audio.input(0).unwrap().first_recycling().unwrap();
    assert_eq!(recycling.signal_count(), 2);

    let notation_child = audio
        .check_scope(SoundScope::Notation)
        .into_iter()
        .find(|id| id.recycling_context().parent().is_some())
        .unwrap();
    engine.tick();
    let signal = recycling.signal_snapshot(&notation_child).unwrap();
    assert!(signal.is_active());
    assert_eq!(signal.notes().len(), 1);
}

/// Stopping one scope tears down its run only.
#[test]
fn test_stop_one_scope() {
    let engine = test_engine();
    let audio = notation_and_pattern(&engine, true, true);
    engine.tick();

    assert_eq!(engine.stop(audio.id(), SoundScope::Sequencer).unwrap(), 1);
    assert!(audio.check_scope(SoundScope::Sequencer).is_empty());
    assert_eq!(audio.recall_ids().len(), 2);

    let recycling = audio.input(1).unwrap().first_recycling().unwrap();
    assert_eq!(recycling.signal_count(), 1);

    // the notation run keeps playing pad 0 alone
    let left = channel_samples(&engine.tick(), 0);
    assert_has_audio(&left, AUDIBLE_RMS);
    let top = audio
        .check_scope(SoundScope::Notation)
        .into_iter()
        .find(|id| id.recycling_context().parent().is_none())
        .unwrap();
    assert!(top.check_state_flags(StateFlags::IS_ACTIVE));

    assert_eq!(engine.stop(audio.id(), SoundScope::Sequencer).unwrap(), 0);
}

#[test]
fn test_stopped_audio_is_silent() {
    let engine = test_engine();
    let audio = notation_and_pattern(&engine, true, true);
    engine.tick();
    engine.stop(audio.id(), SoundScope::Notation).unwrap();
    engine.stop(audio.id(), SoundScope::Sequencer).unwrap();

    assert!(audio.recall_ids().is_empty());
    assert_silence(&channel_samples(&engine.tick(), 0), SILENCE_THRESHOLD);
}

/// Spreading lines over worker threads does not change the output.
#[test]
fn test_worker_pool_matches_inline() {
    let inline = test_engine();
    notation_and_pattern(&inline, true, true);
    let threaded = test_engine_with(EngineConfig {
        worker_threads: 2,
        ..EngineConfig::default()
    });
    notation_and_pattern(&threaded, true, true);

    for _ in 0..PERIODS_PER_TICK + 2 {
        let a = channel_samples(&inline.tick(), 0);
        let b = channel_samples(&threaded.tick(), 0);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() <= 2.0 * INT16_EPSILON);
        }
    }
}

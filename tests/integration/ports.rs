//! Port write, effect, envelope and automation tests
//!
//! Control values reach the render thread through shared ports, the
//! pending parameter ring of an effect, or an automation lane.

use approx::assert_abs_diff_eq;
use crate::helpers::tolerances::*;
use crate::helpers::*;
use ripieno::prelude::*;
use ripieno::recall::fx::{self, PEAK_PORT, VOLUME_PORT};
use ripieno::core::timeline::{EnvelopePoint, NoteEnvelope};
use ripieno::{Acceleration, Automation, Error, ParameterRange};
use std::sync::Arc;

struct Gain;

impl EffectPlugin for Gain {
    fn process(&mut self, _: usize, buffer: &mut SampleBuffer, params: &[f32]) -> Result<(), String> {
        let len = buffer.len();
        ripieno::core::buffer::volume(buffer, 1, len, params[0] as f64);
        Ok(())
    }
}

fn playing_note(engine: &RipienoEngine) -> Arc<ripieno::Audio> {
    let audio = mono_audio(engine, 4);
    engine.add_note(audio.id(), 0, Note::new(0, 4, 0)).unwrap();
    audio
}

#[test]
fn test_write_volume_port() {
    let engine = test_engine();
    let audio = playing_note(&engine);
    engine.add_volume(audio.id()).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();
    assert_has_audio(&channel_samples(&engine.tick(), 0), AUDIBLE_RMS);

    let mute = PortWrite::new(VOLUME_PORT, PortValue::Double(0.0), AudioChannelTarget::All);
    assert_eq!(engine.write_port(audio.id(), &mute).unwrap(), 4);
    assert_silence(&channel_samples(&engine.tick(), 0), SILENCE_THRESHOLD);

    let other = PortWrite::new(VOLUME_PORT, PortValue::Double(1.0), AudioChannelTarget::Channel(1));
    assert!(matches!(
        engine.write_port(audio.id(), &other),
        Err(Error::Recall(ripieno::recall::Error::PortNotFound(_)))
    ));

    let unmute = PortWrite::new(VOLUME_PORT, PortValue::Double(1.0), AudioChannelTarget::Channel(0));
    engine.write_port(audio.id(), &unmute).unwrap();
    assert_has_audio(&channel_samples(&engine.tick(), 0), AUDIBLE_RMS);
}

#[test]
fn test_write_port_errors() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 2);
    engine.add_volume(audio.id()).unwrap();

    let unknown = PortWrite::new("./nope[0]", PortValue::Double(1.0), AudioChannelTarget::All);
    assert!(matches!(
        engine.write_port(audio.id(), &unknown),
        Err(Error::Recall(ripieno::recall::Error::PortNotFound(_)))
    ));

    let wrong_type = PortWrite::new(VOLUME_PORT, PortValue::Bool(true), AudioChannelTarget::All);
    assert!(matches!(
        engine.write_port(audio.id(), &wrong_type),
        Err(Error::Recall(ripieno::recall::Error::Core(ripieno::core::Error::PortType { .. })))
    ));
}

#[test]
fn test_effect_parameter_reaches_plugin() {
    let plugins = PluginRegistry::new();
    plugins.register(
        PluginDescriptor::new("gain.so", "gain").with_param("./gain[0]", ParameterRange::linear(0.0, 2.0, 1.0)),
        || Box::new(Gain),
    );
    let engine = RipienoEngine::builder().plugins(plugins).build().unwrap();
    let audio = playing_note(&engine);
    engine.add_effect(audio.id(), "gain.so", "gain").unwrap();
    assert!(matches!(
        engine.add_effect(audio.id(), "gain.so", "other"),
        Err(Error::PluginNotFound { .. })
    ));

    engine.start(audio.id(), SoundScope::Notation).unwrap();
    assert_has_audio(&channel_samples(&engine.tick(), 0), AUDIBLE_RMS);

    // audio-wide holder plus one holder per line
    let mute = PortWrite::new("./gain[0]", PortValue::Double(0.0), AudioChannelTarget::All);
    assert_eq!(engine.write_port(audio.id(), &mute).unwrap(), 5);
    assert_silence(&channel_samples(&engine.tick(), 0), SILENCE_THRESHOLD);

    let container = audio.find_container("gain").unwrap();
    assert_eq!(container.effect().unwrap().param(0), Some(0.0));
}

#[test]
fn test_zero_envelope_silences_note() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let closed = EnvelopePoint { length: 0.25, level: 0.0 };
    let envelope = NoteEnvelope {
        attack: closed,
        decay: closed,
        sustain: closed,
        release: closed,
        ratio: 0.0,
    };
    engine
        .add_note(audio.id(), 0, Note::new(0, 2, 0).with_envelope(envelope))
        .unwrap();
    engine.add_note(audio.id(), 0, Note::new(0, 2, 1)).unwrap();
    engine.add_envelope(audio.id()).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    for _ in 0..PERIODS_PER_TICK {
        engine.tick();
        let shaped = audio.input(0).unwrap().first_recycling().unwrap();
        let plain = audio.input(1).unwrap().first_recycling().unwrap();
        let child = child_id(&audio, SoundScope::Notation);
        let shaped = shaped.signal_snapshot(&child).unwrap();
        let plain = plain.signal_snapshot(&child).unwrap();
        let played = shaped.length_till_current() - 1;
        assert_silence(&shaped.stream()[played].to_normalized(), SILENCE_THRESHOLD);
        assert_has_audio(&plain.stream()[played].to_normalized(), AUDIBLE_RMS);
    }
}

/// An envelope whose processor is not in the run never resolves; it warns
/// and leaves the signal as it is instead of failing the period.
#[test]
fn test_unresolved_envelope_leaves_signal_alone() {
    let engine = test_engine();
    let audio = mono_audio(&engine, 4);
    let closed = EnvelopePoint { length: 0.25, level: 0.0 };
    let envelope = NoteEnvelope {
        attack: closed,
        decay: closed,
        sustain: closed,
        release: closed,
        ratio: 0.0,
    };
    engine
        .add_note(audio.id(), 0, Note::new(0, 2, 0).with_envelope(envelope))
        .unwrap();
    let stray = engine.context().ids().recall();
    engine
        .add_recall_container(audio.id(), fx::envelope_container(engine.context().ids(), stray))
        .unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    for period in render_channel(&engine, 3, 0) {
        assert_has_audio(&period, AUDIBLE_RMS);
    }
}

#[test]
fn test_peak_meter_follows_signal() {
    let engine = test_engine();
    let audio = playing_note(&engine);
    engine.add_peak(audio.id()).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();
    engine.tick();

    let peak_port = |line: usize| {
        audio
            .find_container("peak")
            .and_then(|c| c.channel_recall(line))
            .and_then(|r| r.port(PEAK_PORT))
            .map(|p| p.read_f64())
            .unwrap()
    };
    assert_abs_diff_eq!(peak_port(0), 0.5, epsilon = 0.01);
    assert_eq!(peak_port(1), 0.0);
}

#[test]
fn test_automation_drives_volume() {
    let engine = test_engine();
    let audio = playing_note(&engine);
    engine.add_volume(audio.id()).unwrap();

    let automation = Automation::new(VOLUME_PORT, 0, ParameterRange::linear(0.0, 2.0, 1.0));
    automation.add_acceleration(Acceleration::new(0.0, 0.0)).unwrap();
    automation.add_acceleration(Acceleration::new(1.0, 1.0)).unwrap();
    let lane = engine.add_automation(audio.id(), automation).unwrap();
    engine.start(audio.id(), SoundScope::Notation).unwrap();

    let left = render_channel(&engine, PERIODS_PER_TICK + 1, 0);
    assert_silence(&left[0], SILENCE_THRESHOLD);
    assert_has_audio(&left[PERIODS_PER_TICK], AUDIBLE_RMS);
    assert_abs_diff_eq!(lane.last_value(), 1.0, epsilon = FLOAT_EPSILON);

    let port = audio
        .find_container("volume")
        .and_then(|c| c.channel_recall(0))
        .and_then(|r| r.port(VOLUME_PORT))
        .unwrap();
    assert!(port.flags().contains(ripieno::PortFlags::IS_AUTOMATED));
}

fn child_id(audio: &ripieno::Audio, scope: SoundScope) -> Arc<ripieno::RecallId> {
    audio
        .check_scope(scope)
        .into_iter()
        .find(|id| id.recycling_context().parent().is_some())
        .unwrap()
}

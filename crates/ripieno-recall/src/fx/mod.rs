//! Built-in effect recalls and the factories installing them.
//!
//! Every audio gets [`play_container`] and [`stream_container`] on creation.
//! The others are added on demand with `Audio::add_recall_container`.

pub mod effect;
mod envelope;
mod peak;
mod play;
mod stream;
mod volume;

pub use effect::{EffectPlugin, EffectProcessor, EffectShared, PendingParam, PluginDescriptor, PluginParam};
pub use envelope::{apply_envelope, EnvelopeAudioSignal, EnvelopeChannelRun, FIXED_LENGTH_PORT, USE_NOTE_LENGTH_PORT};
pub use peak::{PeakChannelRun, PEAK_PORT};
pub use play::PlayChannelRun;
pub use stream::StreamChannelRun;
pub use volume::{VolumeChannel, VOLUME_PORT};

use crate::recall::{RecallBuilder, RecallContainer, RecallFlags, RecallKind, RecallList};
use ripieno_core::{IdAllocator, ParameterRange, Port, PortFlags, PortValue, RecallHandle};
use std::sync::Arc;

pub fn play_container(ids: &IdAllocator) -> Arc<RecallContainer> {
    RecallContainer::builder("play", RecallList::Recall)
        .template(RecallBuilder::new(RecallKind::ChannelRun, "play", PlayChannelRun))
        .build(ids)
}

pub fn stream_container(ids: &IdAllocator) -> Arc<RecallContainer> {
    RecallContainer::builder("stream", RecallList::Recall)
        .template(RecallBuilder::new(RecallKind::ChannelRun, "stream", StreamChannelRun))
        .build(ids)
}

/// Per-line volume, `./volume[0]` in `[0, 2]`.
pub fn volume_container(ids: &IdAllocator) -> Arc<RecallContainer> {
    RecallContainer::builder("volume", RecallList::Recall)
        .channel_ports(|_, _| vec![Port::double(VOLUME_PORT, ParameterRange::linear(0.0, 2.0, 1.0))])
        .template(RecallBuilder::new(RecallKind::ChannelRun, "volume", VolumeChannel))
        .build(ids)
}

/// Note envelopes. `processor` is the audio's processor template, see
/// `Audio::processor`.
pub fn envelope_container(ids: &IdAllocator, processor: RecallHandle) -> Arc<RecallContainer> {
    RecallContainer::builder("envelope", RecallList::Recall)
        .channel_ports(|_, _| {
            vec![
                Port::new(USE_NOTE_LENGTH_PORT, PortValue::Bool(true), ParameterRange::toggle(true)),
                Port::double(FIXED_LENGTH_PORT, ParameterRange::linear(0.0, 64.0, 1.0)),
            ]
        })
        .template(
            RecallBuilder::new(RecallKind::ChannelRun, "envelope", EnvelopeChannelRun)
                .flags(RecallFlags::PROPAGATE_DONE),
        )
        .template(
            RecallBuilder::new(RecallKind::AudioSignal, "envelope-signal", EnvelopeAudioSignal::new())
                .depends_on(processor),
        )
        .build(ids)
}

/// Per-line meter writing the output port `./peak[0]`.
pub fn peak_container(ids: &IdAllocator) -> Arc<RecallContainer> {
    RecallContainer::builder("peak", RecallList::Recall)
        .channel_ports(|_, _| {
            let port = Port::double(PEAK_PORT, ParameterRange::linear(0.0, 1.0, 0.0));
            port.set_flags(PortFlags::IS_OUTPUT);
            vec![port]
        })
        .template(RecallBuilder::new(RecallKind::ChannelRun, "peak", PeakChannelRun::default()))
        .build(ids)
}

/// Opaque plugin effect. Every descriptor parameter gets an audio-wide and a
/// per-line port forwarding to the plugin; `capacity` bounds the pending
/// parameter ring.
pub fn effect_container(
    ids: &IdAllocator,
    descriptor: PluginDescriptor,
    plugin: Box<dyn EffectPlugin>,
    capacity: usize,
) -> Arc<RecallContainer> {
    let params = descriptor.params.clone();
    let builder = RecallContainer::builder(descriptor.effect.clone(), RecallList::Recall)
        .filename(descriptor.filename.clone());
    let builder = plugin_ports(&params).into_iter().fold(builder, |b, port| b.audio_port(port));
    let shared = EffectShared::new(descriptor, plugin, capacity);
    builder
        .channel_ports(move |_, _| plugin_ports(&params))
        .template(RecallBuilder::new(
            RecallKind::ChannelRun,
            "effect",
            EffectProcessor::new(Arc::clone(&shared)),
        ))
        .effect(shared)
        .build(ids)
}

fn plugin_ports(params: &[PluginParam]) -> Vec<Port> {
    params
        .iter()
        .map(|p| Port::double(p.specifier.clone(), p.range).for_plugin(p.index))
        .collect()
}

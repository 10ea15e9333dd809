//! Opaque effect recalls.
//!
//! An effect container owns one [`EffectShared`]: the plugin instance, its
//! base parameter values, per scope and audio channel parameter data, and a
//! bounded ring of pending parameter changes. Control threads stage changes
//! through [`EffectShared::stage`]; the render thread drains them in
//! `run_pre` before processing.

use crate::recall::{RecallBehaviour, RunContext};
use crate::topology::Audio;
use crate::{Error, Result};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use ripieno_core::{
    buffer, AtomicFloat, AudioChannelTarget, ParameterRange, PortFlags, PortWrite, SampleBuffer, SampleFormat,
    SoundScope,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Processing side of a loaded plugin.
pub trait EffectPlugin: Send {
    /// Process one mono period of `audio_channel` in place with `params`,
    /// indexed like the descriptor's parameters.
    fn process(
        &mut self,
        audio_channel: usize,
        buffer: &mut SampleBuffer,
        params: &[f32],
    ) -> std::result::Result<(), String>;
}

/// One plugin parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginParam {
    pub index: u32,
    pub specifier: String,
    pub range: ParameterRange,
}

/// Identity and parameters of a plugin effect.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    pub filename: String,
    pub effect: String,
    pub params: Vec<PluginParam>,
}

impl PluginDescriptor {
    pub fn new(filename: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            effect: effect.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, specifier: impl Into<String>, range: ParameterRange) -> Self {
        let index = self.params.len() as u32;
        self.params.push(PluginParam {
            index,
            specifier: specifier.into(),
            range,
        });
        self
    }

    pub fn param(&self, index: u32) -> Option<&PluginParam> {
        self.params.iter().find(|p| p.index == index)
    }
}

/// Parameter change waiting for the render thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingParam {
    pub target: AudioChannelTarget,
    pub index: u32,
    pub value: f32,
}

#[derive(Debug, Clone)]
struct ChannelData {
    scope: SoundScope,
    audio_channel: usize,
    params: Vec<f32>,
}

/// Buffers `process` reuses from period to period.
#[derive(Debug)]
struct Scratch {
    buffer: SampleBuffer,
    params: Vec<f32>,
}

impl Scratch {
    /// Make `buffer` a copy of `src` without reallocating when format and
    /// length already match.
    fn load(&mut self, src: &SampleBuffer) {
        let len = src.len();
        if self.buffer.format() != src.format() {
            self.buffer = SampleBuffer::new(src.format(), len);
        } else {
            self.buffer.resize(len);
            buffer::clear(&mut self.buffer, 0, len);
        }
        buffer::copy(&mut self.buffer, 1, 0, src, 1, 0, len);
    }
}

pub struct EffectShared {
    descriptor: PluginDescriptor,
    plugin: Mutex<Box<dyn EffectPlugin>>,
    pending_tx: Mutex<HeapProd<PendingParam>>,
    pending_rx: Mutex<HeapCons<PendingParam>>,
    base: Vec<AtomicFloat>,
    channels: Mutex<Vec<ChannelData>>,
    scratch: Mutex<Scratch>,
}

impl fmt::Debug for EffectShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectShared")
            .field("descriptor", &self.descriptor)
            .field("channels", &self.channels.lock().len())
            .finish()
    }
}

impl EffectShared {
    /// `capacity` bounds the changes staged between two periods.
    pub fn new(descriptor: PluginDescriptor, plugin: Box<dyn EffectPlugin>, capacity: usize) -> Arc<Self> {
        let (pending_tx, pending_rx) = HeapRb::<PendingParam>::new(capacity.max(1)).split();
        let base = descriptor
            .params
            .iter()
            .map(|p| AtomicFloat::new(p.range.default as f32))
            .collect::<Vec<_>>();
        let scratch = Scratch {
            buffer: SampleBuffer::new(SampleFormat::Double, 0),
            params: Vec::with_capacity(base.len()),
        };
        Arc::new(Self {
            descriptor,
            plugin: Mutex::new(plugin),
            pending_tx: Mutex::new(pending_tx),
            pending_rx: Mutex::new(pending_rx),
            base,
            channels: Mutex::new(Vec::new()),
            scratch: Mutex::new(scratch),
        })
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Queue a change for the next period. A full ring drops it.
    pub fn stage(&self, target: AudioChannelTarget, index: u32, value: f32) -> bool {
        let pending = PendingParam { target, index, value };
        if self.pending_tx.lock().try_push(pending).is_err() {
            warn!(effect = %self.descriptor.effect, index, "pending parameter ring full, change dropped");
            return false;
        }
        true
    }

    /// Base value of parameter `index`.
    pub fn param(&self, index: u32) -> Option<f32> {
        self.base.get(index as usize).map(AtomicFloat::get)
    }

    /// Value of parameter `index` as `(scope, audio_channel)` processes it.
    pub fn channel_param(&self, scope: SoundScope, audio_channel: usize, index: u32) -> Option<f32> {
        let mut channels = self.channels.lock();
        let data = self.channel_data(&mut channels, scope, audio_channel);
        data.params.get(index as usize).copied()
    }

    fn channel_data<'a>(
        &self,
        channels: &'a mut Vec<ChannelData>,
        scope: SoundScope,
        audio_channel: usize,
    ) -> &'a mut ChannelData {
        let position = channels
            .iter()
            .position(|d| d.scope == scope && d.audio_channel == audio_channel);
        let index = match position {
            Some(index) => index,
            None => {
                channels.push(ChannelData {
                    scope,
                    audio_channel,
                    params: self.base.iter().map(AtomicFloat::get).collect(),
                });
                channels.len() - 1
            }
        };
        &mut channels[index]
    }

    /// Move every staged change into the parameter data. Returns how many
    /// were applied.
    pub fn apply_pending(&self) -> usize {
        let mut rx = self.pending_rx.lock();
        let mut channels = self.channels.lock();
        let mut applied = 0;
        while let Some(pending) = rx.try_pop() {
            let index = pending.index as usize;
            if index >= self.base.len() {
                debug!(effect = %self.descriptor.effect, index, "parameter index out of range");
                continue;
            }
            match pending.target {
                AudioChannelTarget::All => {
                    self.base[index].set(pending.value);
                    for data in channels.iter_mut() {
                        data.params[index] = pending.value;
                    }
                }
                AudioChannelTarget::Channel(audio_channel) => {
                    for scope in SoundScope::ALL {
                        self.channel_data(&mut channels, scope, audio_channel).params[index] = pending.value;
                    }
                }
            }
            applied += 1;
        }
        applied
    }

    /// Run the plugin over `buffer`. A failing plugin leaves it untouched.
    ///
    /// The plugin works on a scratch copy that is swapped in on success, so
    /// steady state processing does not allocate.
    pub fn process(&self, scope: SoundScope, audio_channel: usize, buffer: &mut SampleBuffer) {
        let mut scratch = self.scratch.lock();
        scratch.params.clear();
        {
            let mut channels = self.channels.lock();
            let data = self.channel_data(&mut channels, scope, audio_channel);
            scratch.params.extend_from_slice(&data.params);
        }
        scratch.load(buffer);
        let Scratch {
            buffer: processed,
            params,
        } = &mut *scratch;
        match self.plugin.lock().process(audio_channel, processed, params) {
            Ok(()) => std::mem::swap(buffer, processed),
            Err(reason) => {
                warn!(effect = %self.descriptor.effect, audio_channel, %reason, "effect bypassed for this period")
            }
        }
    }
}

/// Channel-run recall feeding the current segment of every signal on its
/// line through the container's effect.
#[derive(Debug, Clone)]
pub struct EffectProcessor {
    shared: Arc<EffectShared>,
}

impl EffectProcessor {
    pub fn new(shared: Arc<EffectShared>) -> Self {
        Self { shared }
    }

    pub fn shared(&self) -> &Arc<EffectShared> {
        &self.shared
    }
}

impl RecallBehaviour for EffectProcessor {
    fn run_pre(&mut self, _cx: &RunContext<'_>) {
        self.shared.apply_pending();
    }

    fn run_inter(&mut self, cx: &RunContext<'_>) {
        let (Some(scope), Some(channel)) = (cx.scope(), cx.channel()) else {
            return;
        };
        let audio_channel = channel.audio_channel();
        for recycling in channel.recyclings() {
            recycling.with_signal(cx.recall_id, |signal| {
                if let Some(buffer) = signal.current_buffer_mut() {
                    self.shared.process(scope, audio_channel, buffer);
                }
            });
        }
    }
}

impl Audio {
    /// Write `write.value` to every port named `write.specifier` that
    /// `write.target` addresses: audio-wide holders for every channel,
    /// channel holders by their line's audio channel. Ports forwarding to a
    /// plugin also stage the change on the container's effect.
    ///
    /// Returns how many ports were written.
    pub fn write_port(&self, write: &PortWrite) -> Result<usize> {
        let audio_channels = self.audio_channels();
        let mut written = 0;
        for container in self.containers() {
            let mut holders = Vec::new();
            if write.target == AudioChannelTarget::All {
                holders.push((Arc::clone(container.audio_recall()), None));
            }
            for recall in container.channel_recalls() {
                let Some(audio_channel) = recall.line().map(|line| line % audio_channels) else {
                    continue;
                };
                if write.target.matches(audio_channel) {
                    holders.push((recall, Some(audio_channel)));
                }
            }

            for (holder, audio_channel) in holders {
                let Some(port) = holder.port(&write.specifier) else {
                    continue;
                };
                port.safe_write(write.value.clone())?;
                written += 1;
                if !port.flags().contains(PortFlags::FORWARD_TO_PLUGIN) {
                    continue;
                }
                let target = match (write.target, audio_channel) {
                    (AudioChannelTarget::All, Some(_)) => continue,
                    (AudioChannelTarget::All, None) => AudioChannelTarget::All,
                    (target @ AudioChannelTarget::Channel(_), _) => target,
                };
                if let (Some(effect), Some(index)) = (container.effect(), port.plugin_port_index()) {
                    effect.stage(target, index, write.value.as_f64() as f32);
                }
            }
        }
        if written == 0 {
            return Err(Error::PortNotFound(write.specifier.clone()));
        }
        debug!(audio = %self.id(), specifier = %write.specifier, written, "port written");
        Ok(written)
    }
}

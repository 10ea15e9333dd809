//! RipienoEngine that coordinates audios, the soundcard clock and plugins

use crate::context::ApplicationContext;
use crate::plugin::PluginRegistry;
use crate::{Error, Result};
use ripieno_automation::{Automation, AutomationLane};
use ripieno_core::timeline::{CropMode, Note};
use ripieno_core::{
    AudioId, ContainerId, EngineConfig, PortWrite, RecallId, SampleBuffer, SequencerInput, SoundScope,
    Soundcard, SoundcardClock,
};
use ripieno_recall::fx;
use ripieno_recall::{Audio, AudioFlags, AudioGeometry, AudioSettings, ChannelSide, RecallContainer};
use std::sync::Arc;
use tracing::{debug, info};

/// Main engine: owns the [`ApplicationContext`] and exposes the editing and
/// transport commands a frontend issues.
///
/// Periods are driven explicitly with [`tick`](Self::tick); a driver thread
/// calls it once per soundcard period.
///
/// # Example
///
/// ```
/// use ripieno::prelude::*;
///
/// let engine = RipienoEngine::builder().buffer_size(256).build()?;
/// let audio = engine.add_audio(AudioGeometry::new(1, 1, 4), AudioFlags::INPUT_HAS_RECYCLING)?;
/// engine.add_note(audio.id(), 0, Note::new(0, 2, 0))?;
///
/// engine.start(audio.id(), SoundScope::Notation)?;
/// let period = engine.tick();
/// assert_eq!(period.len(), 256 * 2);
/// # Ok::<(), ripieno::Error>(())
/// ```
#[derive(Debug)]
pub struct RipienoEngine {
    context: Arc<ApplicationContext>,
}

impl RipienoEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::RipienoEngineBuilder {
        crate::RipienoEngineBuilder::default()
    }

    pub(crate) fn from_context(context: ApplicationContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &Arc<ApplicationContext> {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        self.context.config()
    }

    pub fn soundcard(&self) -> &Arc<SoundcardClock> {
        self.context.soundcard()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        self.context.plugins()
    }

    // ==================== Audio tree ====================

    /// New audio with the engine's stream settings.
    ///
    /// The 256th scheduling flag follows the configuration, and the audio
    /// shares the engine's worker pool if there is one.
    pub fn add_audio(&self, geometry: AudioGeometry, mut flags: AudioFlags) -> Result<Arc<Audio>> {
        let config = self.config();
        if config.note_256th_mode {
            flags |= AudioFlags::NOTE_256TH_MODE;
        }
        let audio = Audio::new(
            Arc::clone(self.context.ids()),
            AudioSettings::from(config),
            geometry,
            flags,
        )?;
        audio.set_worker_pool(self.context.worker_pool().cloned());
        self.context.add_audio(Arc::clone(&audio));
        info!(audio = %audio.id(), ?geometry, "audio added");
        Ok(audio)
    }

    /// Stop every scope of the audio and drop it.
    pub fn remove_audio(&self, id: AudioId) -> Result<Arc<Audio>> {
        let audio = self.context.remove_audio(id)?;
        for scope in SoundScope::ALL {
            audio.stop(scope);
        }
        info!(audio = %id, "audio removed");
        Ok(audio)
    }

    pub fn audio(&self, id: AudioId) -> Result<Arc<Audio>> {
        self.context.audio(id)
    }

    pub fn audios(&self) -> Vec<Arc<Audio>> {
        self.context.audios()
    }

    pub fn set_audio_channels(&self, id: AudioId, audio_channels: usize) -> Result<()> {
        self.audio(id)?.set_audio_channels(audio_channels)?;
        Ok(())
    }

    pub fn set_pads(&self, id: AudioId, side: ChannelSide, pads: usize) -> Result<()> {
        self.audio(id)?.set_pads(side, pads)?;
        Ok(())
    }

    /// Live MIDI source of the audio's midi scope.
    pub fn set_sequencer_input(&self, id: AudioId, input: Option<Arc<dyn SequencerInput>>) -> Result<()> {
        self.audio(id)?.set_sequencer_input(input);
        Ok(())
    }

    // ==================== Recalls ====================

    pub fn add_recall_container(&self, id: AudioId, container: Arc<RecallContainer>) -> Result<ContainerId> {
        let container_id = container.id();
        self.audio(id)?.add_recall_container(container);
        Ok(container_id)
    }

    pub fn remove_recall_container(&self, id: AudioId, container: ContainerId) -> Result<()> {
        self.audio(id)?.remove_recall_container(container)?;
        Ok(())
    }

    pub fn add_volume(&self, id: AudioId) -> Result<ContainerId> {
        self.add_recall_container(id, fx::volume_container(self.context.ids()))
    }

    /// Note envelopes, depending on the audio's processor.
    pub fn add_envelope(&self, id: AudioId) -> Result<ContainerId> {
        let audio = self.audio(id)?;
        let container = fx::envelope_container(self.context.ids(), audio.processor());
        let container_id = container.id();
        audio.add_recall_container(container);
        Ok(container_id)
    }

    pub fn add_peak(&self, id: AudioId) -> Result<ContainerId> {
        self.add_recall_container(id, fx::peak_container(self.context.ids()))
    }

    /// Instantiate the registered plugin `(filename, effect)` as an effect
    /// recall on the audio.
    pub fn add_effect(&self, id: AudioId, filename: &str, effect: &str) -> Result<ContainerId> {
        let audio = self.audio(id)?;
        let (descriptor, plugin) = self.plugins().instantiate(filename, effect)?;
        let container = fx::effect_container(
            self.context.ids(),
            descriptor,
            plugin,
            self.config().pending_param_capacity,
        );
        let container_id = container.id();
        audio.add_recall_container(container);
        debug!(audio = %id, filename, effect, "effect added");
        Ok(container_id)
    }

    /// Drive the port the automation names from its timeline, once per period.
    pub fn add_automation(&self, id: AudioId, automation: Automation) -> Result<Arc<AutomationLane>> {
        Ok(self.audio(id)?.add_automation(Arc::new(automation)))
    }

    /// Write a control value to every matching port of the audio.
    pub fn write_port(&self, id: AudioId, write: &PortWrite) -> Result<usize> {
        Ok(self.audio(id)?.write_port(write)?)
    }

    // ==================== Transport ====================

    /// Start a run of `scope` on the audio. Returns its toplevel id.
    pub fn start(&self, id: AudioId, scope: SoundScope) -> Result<Arc<RecallId>> {
        let audio = self.audio(id)?;
        Ok(audio.start(scope, &**self.soundcard()))
    }

    /// Stop every run of `scope` on the audio.
    pub fn stop(&self, id: AudioId, scope: SoundScope) -> Result<usize> {
        Ok(self.audio(id)?.stop(scope))
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        if !(1.0..=999.0).contains(&bpm) {
            return Err(ripieno_core::Error::InvalidTempo(bpm).into());
        }
        self.soundcard().set_bpm(bpm);
        debug!(bpm, "tempo changed");
        Ok(())
    }

    pub fn set_loop(&self, left: u64, right: u64, enabled: bool) -> Result<()> {
        if enabled && left >= right {
            return Err(ripieno_core::Error::InvalidLoopRange { left, right }.into());
        }
        self.soundcard().set_loop(left, right, enabled);
        Ok(())
    }

    pub fn seek(&self, note_offset: u64) {
        self.soundcard().seek(note_offset);
    }

    /// Run one period of every audio and advance the clock. Returns the
    /// interleaved output period.
    pub fn tick(&self) -> SampleBuffer {
        let soundcard: Arc<dyn Soundcard> = Arc::clone(self.soundcard()) as Arc<dyn Soundcard>;
        for audio in self.audios() {
            audio.tick(&soundcard);
        }
        let output = self.soundcard().take_output();
        self.soundcard().tic();
        output
    }

    /// Run `periods` periods, concatenating their output.
    pub fn render(&self, periods: usize) -> SampleBuffer {
        let config = self.config();
        let frames = config.buffer_size * config.pcm_channels;
        let mut out = SampleBuffer::new(config.format, frames * periods);
        for period in 0..periods {
            let buffer = self.tick();
            ripieno_core::buffer::copy(&mut out, 1, period * frames, &buffer, 1, 0, buffer.len());
        }
        out
    }

    // ==================== Notation editing ====================

    fn notation(&self, id: AudioId, audio_channel: usize) -> Result<Arc<ripieno_core::timeline::Notation>> {
        self.audio(id)?
            .notation(audio_channel)
            .ok_or(Error::AudioChannelOutOfRange { audio: id, audio_channel })
    }

    pub fn add_note(&self, id: AudioId, audio_channel: usize, note: Note) -> Result<()> {
        self.notation(id, audio_channel)?.add_note(note);
        Ok(())
    }

    pub fn remove_note(&self, id: AudioId, audio_channel: usize, x: u64, y: u32) -> Result<bool> {
        Ok(self.notation(id, audio_channel)?.remove_note_at(x, y))
    }

    /// Resize the selected notes.
    pub fn crop(&self, id: AudioId, audio_channel: usize, mode: CropMode) -> Result<()> {
        self.notation(id, audio_channel)?.crop(mode);
        Ok(())
    }

    /// Select the note at `(x, y)`.
    pub fn position(&self, id: AudioId, audio_channel: usize, x: u64, y: u32) -> Result<()> {
        self.notation(id, audio_channel)?.position(x, y);
        Ok(())
    }

    pub fn select_region(&self, id: AudioId, audio_channel: usize, x0: u64, y0: u32, x1: u64, y1: u32) -> Result<()> {
        self.notation(id, audio_channel)?.select_region(x0, y0, x1, y1);
        Ok(())
    }

    /// Toggle step `bit` of the pattern on input line `line`. Returns the
    /// new state of the step.
    pub fn toggle_pattern_step(&self, id: AudioId, line: usize, bit: usize) -> Result<bool> {
        let audio = self.audio(id)?;
        let channel = audio.input(line).ok_or(ripieno_recall::Error::LineOutOfRange {
            line,
            lines: audio.input_lines(),
        })?;
        Ok(channel.pattern().toggle_bit(0, 0, bit)?)
    }
}

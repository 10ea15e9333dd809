use super::channel::{Channel, ChannelSide};
use super::generator::Generator;
use super::recycling::Recycling;
use crate::recall::{Recall, RecallContainer, RecallList};
use crate::worker::ChannelWorkerPool;
use crate::{Error, Result};
use bitflags::bitflags;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use ripieno_automation::{Automation, AutomationLane};
use ripieno_core::timeline::{Notation, Wave};
use ripieno_core::{
    AudioId, ContainerId, EngineConfig, IdAllocator, RecallHandle, RecallId, RecyclingContext,
    SampleFormat, SequencerInput, SoundScope, StagingFlags,
};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Key of the tone rendered by input pad 0.
const ROOT_KEY: u32 = 57;
const TONE_AMPLITUDE: f64 = 0.5;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AudioFlags: u32 {
        /// Schedule notes on the 256th grid.
        const NOTE_256TH_MODE = 1;
        const PATTERN_MODE = 1 << 1;
        /// Map keys onto input pads from the top.
        const REVERSE_MAPPING = 1 << 2;
        const OUTPUT_HAS_RECYCLING = 1 << 3;
        const INPUT_HAS_RECYCLING = 1 << 4;
    }
}

/// Stream geometry shared by an audio's recyclings and waves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SampleFormat,
}

impl From<&EngineConfig> for AudioSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            samplerate: config.samplerate,
            buffer_size: config.buffer_size,
            format: config.format,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioGeometry {
    pub audio_channels: usize,
    pub output_pads: usize,
    pub input_pads: usize,
}

impl AudioGeometry {
    pub fn new(audio_channels: usize, output_pads: usize, input_pads: usize) -> Self {
        Self {
            audio_channels,
            output_pads,
            input_pads,
        }
    }

    pub fn pads(&self, side: ChannelSide) -> usize {
        match side {
            ChannelSide::Output => self.output_pads,
            ChannelSide::Input => self.input_pads,
        }
    }

    pub fn lines(&self, side: ChannelSide) -> usize {
        self.audio_channels * self.pads(side)
    }

    pub fn output_lines(&self) -> usize {
        self.lines(ChannelSide::Output)
    }

    pub fn input_lines(&self) -> usize {
        self.lines(ChannelSide::Input)
    }
}

#[derive(Debug)]
struct Topology {
    geometry: AudioGeometry,
    output: Vec<Arc<Channel>>,
    input: Vec<Arc<Channel>>,
}

impl Topology {
    fn chain(&self, side: ChannelSide) -> &Vec<Arc<Channel>> {
        match side {
            ChannelSide::Output => &self.output,
            ChannelSide::Input => &self.input,
        }
    }

    fn chain_mut(&mut self, side: ChannelSide) -> &mut Vec<Arc<Channel>> {
        match side {
            ChannelSide::Output => &mut self.output,
            ChannelSide::Input => &mut self.input,
        }
    }
}

/// Root of the audio tree.
///
/// Channels are stored line-indexed, `line = pad * audio_channels +
/// audio_channel`. Locks are taken briefly and never held while recall
/// hooks run; list accessors hand out snapshots.
pub struct Audio {
    id: AudioId,
    ids: Arc<IdAllocator>,
    flags: AtomicU32,
    base_key: AtomicU32,
    settings: Mutex<AudioSettings>,
    topology: Mutex<Topology>,
    notation: Mutex<Vec<Arc<Notation>>>,
    wave: Mutex<Vec<Wave>>,
    automation: Mutex<Vec<Arc<AutomationLane>>>,
    sequencer_input: Mutex<Option<Arc<dyn SequencerInput>>>,
    containers: Mutex<Vec<Arc<RecallContainer>>>,
    pub(crate) play: Mutex<Vec<Arc<Recall>>>,
    pub(crate) recall: Mutex<Vec<Arc<Recall>>>,
    pub(crate) recall_ids: Mutex<Vec<Arc<RecallId>>>,
    pub(crate) recycling_contexts: Mutex<Vec<Arc<RecyclingContext>>>,
    staging: [AtomicU32; SoundScope::COUNT],
    period: ReentrantMutex<()>,
    workers: Mutex<Option<Arc<ChannelWorkerPool>>>,
    processor: RecallHandle,
}

impl fmt::Debug for Audio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audio")
            .field("id", &self.id)
            .field("flags", &self.flags())
            .field("geometry", &self.geometry())
            .field("recall_ids", &self.recall_ids.lock().len())
            .finish()
    }
}

fn invalid_geometry(audio: AudioId, reason: &str) -> Error {
    Error::InvalidGeometry {
        audio,
        reason: reason.to_string(),
    }
}

impl Audio {
    /// New audio with the built-in processor, play and stream recalls.
    pub fn new(
        ids: Arc<IdAllocator>,
        settings: AudioSettings,
        geometry: AudioGeometry,
        flags: AudioFlags,
    ) -> Result<Arc<Self>> {
        let id = ids.audio();
        if geometry.audio_channels == 0 {
            return Err(invalid_geometry(id, "audio channel count must be non-zero"));
        }
        if geometry.output_pads == 0 || geometry.input_pads == 0 {
            return Err(invalid_geometry(id, "pad count must be non-zero"));
        }

        let processor = crate::processor::processor_container(&ids);
        let processor_handle = processor
            .templates()
            .first()
            .map(|t| t.handle())
            .ok_or_else(|| invalid_geometry(id, "processor container has no template"))?;

        let audio = Arc::new(Self {
            id,
            ids: Arc::clone(&ids),
            flags: AtomicU32::new(flags.bits()),
            base_key: AtomicU32::new(0),
            settings: Mutex::new(settings),
            topology: Mutex::new(Topology {
                geometry: AudioGeometry::new(geometry.audio_channels, 0, 0),
                output: Vec::new(),
                input: Vec::new(),
            }),
            notation: Mutex::new(Vec::new()),
            wave: Mutex::new(Vec::new()),
            automation: Mutex::new(Vec::new()),
            sequencer_input: Mutex::new(None),
            containers: Mutex::new(Vec::new()),
            play: Mutex::new(Vec::new()),
            recall: Mutex::new(Vec::new()),
            recall_ids: Mutex::new(Vec::new()),
            recycling_contexts: Mutex::new(Vec::new()),
            staging: std::array::from_fn(|_| AtomicU32::new(0)),
            period: ReentrantMutex::new(()),
            workers: Mutex::new(None),
            processor: processor_handle,
        });

        audio.resize_timelines(geometry.audio_channels);
        audio.set_pads(ChannelSide::Output, geometry.output_pads)?;
        audio.set_pads(ChannelSide::Input, geometry.input_pads)?;
        audio.add_recall_container(processor);
        audio.add_recall_container(crate::fx::play_container(&ids));
        audio.add_recall_container(crate::fx::stream_container(&ids));
        Ok(audio)
    }

    pub fn id(&self) -> AudioId {
        self.id
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Template handle of the built-in audio processor.
    pub fn processor(&self) -> RecallHandle {
        self.processor
    }

    pub fn flags(&self) -> AudioFlags {
        AudioFlags::from_bits_retain(self.flags.load(Ordering::Acquire))
    }

    pub fn set_flags(&self, flags: AudioFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn unset_flags(&self, flags: AudioFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    pub fn test_flags(&self, flags: AudioFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Key mapped onto input pad 0.
    pub fn base_key(&self) -> u32 {
        self.base_key.load(Ordering::Acquire)
    }

    pub fn set_base_key(&self, key: u32) {
        self.base_key.store(key, Ordering::Release);
    }

    pub fn settings(&self) -> AudioSettings {
        *self.settings.lock()
    }

    pub fn geometry(&self) -> AudioGeometry {
        self.topology.lock().geometry
    }

    pub fn audio_channels(&self) -> usize {
        self.geometry().audio_channels
    }

    pub fn output_lines(&self) -> usize {
        self.geometry().output_lines()
    }

    pub fn input_lines(&self) -> usize {
        self.geometry().input_lines()
    }

    pub fn channel(&self, side: ChannelSide, line: usize) -> Option<Arc<Channel>> {
        self.topology.lock().chain(side).get(line).cloned()
    }

    pub fn output(&self, line: usize) -> Option<Arc<Channel>> {
        self.channel(ChannelSide::Output, line)
    }

    pub fn input(&self, line: usize) -> Option<Arc<Channel>> {
        self.channel(ChannelSide::Input, line)
    }

    pub fn channels(&self, side: ChannelSide) -> Vec<Arc<Channel>> {
        self.topology.lock().chain(side).clone()
    }

    pub fn next(&self, channel: &Channel) -> Option<Arc<Channel>> {
        self.channel(channel.side(), channel.line() + 1)
    }

    pub fn prev(&self, channel: &Channel) -> Option<Arc<Channel>> {
        let line = channel.line().checked_sub(1)?;
        self.channel(channel.side(), line)
    }

    pub fn next_pad(&self, channel: &Channel) -> Option<Arc<Channel>> {
        self.channel(channel.side(), channel.line() + self.audio_channels())
    }

    pub fn prev_pad(&self, channel: &Channel) -> Option<Arc<Channel>> {
        let line = channel.line().checked_sub(self.audio_channels())?;
        self.channel(channel.side(), line)
    }

    fn make_channel(
        &self,
        side: ChannelSide,
        pad: usize,
        audio_channel: usize,
        audio_channels: usize,
        settings: AudioSettings,
    ) -> Arc<Channel> {
        let channel = Channel::new(side, pad, audio_channel, audio_channels);
        let flag = match side {
            ChannelSide::Output => AudioFlags::OUTPUT_HAS_RECYCLING,
            ChannelSide::Input => AudioFlags::INPUT_HAS_RECYCLING,
        };
        if self.test_flags(flag) {
            channel.add_recycling(Recycling::new(
                self.ids.recycling(),
                settings.samplerate,
                settings.buffer_size,
                settings.format,
            ));
        }
        if side == ChannelSide::Input {
            channel.set_generator(Generator::for_key(ROOT_KEY + pad as u32, TONE_AMPLITUDE));
        }
        channel
    }

    /// Regroup both chains into `audio_channels` channels per pad. Existing
    /// channels keep their pad and audio channel, with their recyclings.
    pub fn set_audio_channels(&self, audio_channels: usize) -> Result<()> {
        if audio_channels == 0 {
            return Err(invalid_geometry(self.id, "audio channel count must be non-zero"));
        }
        let _period = self.lock_period();
        let settings = self.settings();
        let mut removed: [Vec<Arc<Channel>>; 2] = Default::default();
        {
            let mut topology = self.topology.lock();
            let old = topology.geometry;
            if old.audio_channels == audio_channels {
                return Ok(());
            }
            for (side, removed) in [ChannelSide::Output, ChannelSide::Input].into_iter().zip(removed.iter_mut()) {
                removed.extend(
                    topology
                        .chain(side)
                        .iter()
                        .filter(|channel| channel.audio_channel() >= audio_channels)
                        .cloned(),
                );
                let pads = old.pads(side);
                let mut rebuilt = Vec::with_capacity(pads * audio_channels);
                for pad in 0..pads {
                    for audio_channel in 0..audio_channels {
                        let channel = if audio_channel < old.audio_channels {
                            Arc::clone(&topology.chain(side)[pad * old.audio_channels + audio_channel])
                        } else {
                            self.make_channel(side, pad, audio_channel, audio_channels, settings)
                        };
                        channel.reposition(pad, audio_channel, audio_channels);
                        rebuilt.push(channel);
                    }
                }
                *topology.chain_mut(side) = rebuilt;
            }
            topology.geometry.audio_channels = audio_channels;
        }
        self.resize_timelines(audio_channels);
        self.sync_containers();
        self.rebind_runs(ChannelSide::Output, &removed[0]);
        self.rebind_runs(ChannelSide::Input, &removed[1]);
        debug!(audio = %self.id, audio_channels, "audio channels set");
        Ok(())
    }

    /// Grow or shrink one chain to `pads` pads.
    pub fn set_pads(&self, side: ChannelSide, pads: usize) -> Result<()> {
        if pads == 0 {
            return Err(invalid_geometry(self.id, "pad count must be non-zero"));
        }
        let _period = self.lock_period();
        let settings = self.settings();
        let removed;
        {
            let mut topology = self.topology.lock();
            let geometry = topology.geometry;
            let audio_channels = geometry.audio_channels;
            let old_pads = geometry.pads(side);
            if old_pads == pads {
                return Ok(());
            }
            let mut added = Vec::new();
            for pad in old_pads..pads {
                for audio_channel in 0..audio_channels {
                    added.push(self.make_channel(side, pad, audio_channel, audio_channels, settings));
                }
            }
            let chain = topology.chain_mut(side);
            removed = chain.split_off(chain.len().min(pads * audio_channels));
            chain.extend(added);
            match side {
                ChannelSide::Output => topology.geometry.output_pads = pads,
                ChannelSide::Input => topology.geometry.input_pads = pads,
            }
        }
        self.sync_containers();
        self.rebind_runs(side, &removed);
        debug!(audio = %self.id, ?side, pads, "pads set");
        Ok(())
    }

    fn resize_timelines(&self, audio_channels: usize) {
        let settings = self.settings();
        let mut notation = self.notation.lock();
        notation.truncate(audio_channels);
        for audio_channel in notation.len()..audio_channels {
            notation.push(Arc::new(Notation::new(audio_channel)));
        }
        let mut wave = self.wave.lock();
        wave.truncate(audio_channels);
        for audio_channel in wave.len()..audio_channels {
            wave.push(Wave::new(
                audio_channel,
                settings.samplerate,
                settings.buffer_size,
                settings.format,
            ));
        }
    }

    fn line_map(&self, side: ChannelSide) -> Vec<(usize, usize)> {
        self.channels(side)
            .iter()
            .map(|c| (c.line(), c.audio_channel()))
            .collect()
    }

    fn sync_containers(&self) {
        let output = self.line_map(ChannelSide::Output);
        let input = self.line_map(ChannelSide::Input);
        for container in self.containers() {
            let lines = match container.list().side() {
                ChannelSide::Output => &output,
                ChannelSide::Input => &input,
            };
            container.sync_lines(&self.ids, lines);
        }
    }

    /// Propagate a new samplerate to waves and recycling templates.
    pub fn set_samplerate(&self, samplerate: u32) {
        self.update_settings(|s| s.samplerate = samplerate);
        for wave in self.wave.lock().iter_mut() {
            wave.set_samplerate(samplerate);
        }
    }

    pub fn set_buffer_size(&self, buffer_size: usize) {
        self.update_settings(|s| s.buffer_size = buffer_size.max(1));
        for wave in self.wave.lock().iter_mut() {
            wave.set_buffer_size(buffer_size);
        }
    }

    pub fn set_format(&self, format: SampleFormat) {
        self.update_settings(|s| s.format = format);
        for wave in self.wave.lock().iter_mut() {
            wave.set_format(format);
        }
    }

    fn update_settings(&self, update: impl FnOnce(&mut AudioSettings)) {
        let settings = {
            let mut settings = self.settings.lock();
            update(&mut settings);
            *settings
        };
        for side in [ChannelSide::Output, ChannelSide::Input] {
            for channel in self.channels(side) {
                for recycling in channel.recyclings() {
                    recycling.set_geometry(settings.samplerate, settings.buffer_size, settings.format);
                }
            }
        }
    }

    pub fn notation(&self, audio_channel: usize) -> Option<Arc<Notation>> {
        self.notation.lock().get(audio_channel).cloned()
    }

    pub fn with_wave<R>(&self, audio_channel: usize, f: impl FnOnce(&Wave) -> R) -> Option<R> {
        self.wave.lock().get(audio_channel).map(f)
    }

    /// Attach an automation timeline. Returns the lane sampling it.
    pub fn add_automation(&self, automation: Arc<Automation>) -> Arc<AutomationLane> {
        let lane = Arc::new(AutomationLane::new(automation));
        self.automation.lock().push(Arc::clone(&lane));
        lane
    }

    pub fn remove_automation(&self, specifier: &str, line: usize) -> bool {
        let mut lanes = self.automation.lock();
        let before = lanes.len();
        lanes.retain(|lane| !(lane.specifier() == specifier && lane.line() == line));
        before != lanes.len()
    }

    pub fn automation_lanes(&self) -> Vec<Arc<AutomationLane>> {
        self.automation.lock().clone()
    }

    pub fn set_sequencer_input(&self, input: Option<Arc<dyn SequencerInput>>) {
        *self.sequencer_input.lock() = input;
    }

    pub fn sequencer_input(&self) -> Option<Arc<dyn SequencerInput>> {
        self.sequencer_input.lock().clone()
    }

    /// Install `container`, adding its holder and templates to its list.
    pub fn add_recall_container(&self, container: Arc<RecallContainer>) {
        container.sync_lines(&self.ids, &self.line_map(container.list().side()));
        let list = match container.list() {
            RecallList::Play => &self.play,
            RecallList::Recall => &self.recall,
        };
        {
            let mut list = list.lock();
            list.push(Arc::clone(container.audio_recall()));
            list.extend(container.templates().iter().cloned());
        }
        debug!(audio = %self.id, container = %container.id(), name = container.name(), "recall container added");
        self.containers.lock().push(container);
    }

    /// Uninstall a container. Its running copies are cancelled and left
    /// for cleanup.
    pub fn remove_recall_container(&self, id: ContainerId) -> Result<Arc<RecallContainer>> {
        let container = {
            let mut containers = self.containers.lock();
            let position = containers
                .iter()
                .position(|c| c.id() == id)
                .ok_or(Error::ContainerNotFound(id))?;
            containers.remove(position)
        };
        for list in [&self.play, &self.recall] {
            let mut list = list.lock();
            for recall in list.iter().filter(|r| r.container() == Some(id)) {
                recall.cancel();
            }
            list.retain(|r| r.container() != Some(id) || r.recall_id().is_some());
        }
        Ok(container)
    }

    pub fn container(&self, id: ContainerId) -> Option<Arc<RecallContainer>> {
        self.containers.lock().iter().find(|c| c.id() == id).cloned()
    }

    pub fn containers(&self) -> Vec<Arc<RecallContainer>> {
        self.containers.lock().clone()
    }

    pub fn find_container(&self, name: &str) -> Option<Arc<RecallContainer>> {
        self.containers.lock().iter().find(|c| c.name() == name).cloned()
    }

    pub fn play_list(&self) -> Vec<Arc<Recall>> {
        self.play.lock().clone()
    }

    pub fn recall_list(&self) -> Vec<Arc<Recall>> {
        self.recall.lock().clone()
    }

    pub fn recall_ids(&self) -> Vec<Arc<RecallId>> {
        self.recall_ids.lock().clone()
    }

    pub fn recycling_contexts(&self) -> Vec<Arc<RecyclingContext>> {
        self.recycling_contexts.lock().clone()
    }

    pub fn staging_flags(&self, scope: SoundScope) -> StagingFlags {
        StagingFlags::from_bits_retain(self.staging[scope.index()].load(Ordering::Acquire))
    }

    pub fn set_staging_flags(&self, scope: SoundScope, flags: StagingFlags) {
        self.staging[scope.index()].fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn unset_staging_flags(&self, scope: SoundScope, flags: StagingFlags) {
        self.staging[scope.index()].fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Distribute channel-level work of each period over `pool`.
    pub fn set_worker_pool(&self, pool: Option<Arc<ChannelWorkerPool>>) {
        *self.workers.lock() = pool;
    }

    pub(crate) fn worker_pool(&self) -> Option<Arc<ChannelWorkerPool>> {
        self.workers.lock().clone()
    }

    /// Held for a whole period; cancellation waits on it.
    pub(crate) fn lock_period(&self) -> ReentrantMutexGuard<'_, ()> {
        self.period.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(flags: AudioFlags) -> Arc<Audio> {
        let settings = AudioSettings {
            samplerate: 44100,
            buffer_size: 64,
            format: SampleFormat::S16,
        };
        Audio::new(Arc::new(IdAllocator::new()), settings, AudioGeometry::new(2, 1, 4), flags).unwrap()
    }

    #[test]
    fn test_line_layout() {
        let audio = audio(AudioFlags::INPUT_HAS_RECYCLING);
        assert_eq!(audio.input_lines(), 8);
        assert_eq!(audio.output_lines(), 2);
        let channel = audio.input(5).unwrap();
        assert_eq!((channel.pad(), channel.audio_channel()), (2, 1));
        assert_eq!(audio.next_pad(&channel).unwrap().line(), 7);
        assert_eq!(audio.prev(&channel).unwrap().line(), 4);
        assert!(audio.next(&audio.input(7).unwrap()).is_none());
        assert!(channel.has_recycling());
        assert!(!audio.output(0).unwrap().has_recycling());
    }

    #[test]
    fn test_zero_counts_are_rejected() {
        let audio = audio(AudioFlags::empty());
        assert!(matches!(
            audio.set_audio_channels(0),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(audio.set_pads(ChannelSide::Input, 0).is_err());
        assert_eq!(audio.input_lines(), 8);
    }

    #[test]
    fn test_set_audio_channels_keeps_channels() {
        let audio = audio(AudioFlags::INPUT_HAS_RECYCLING);
        let kept = audio.input(3).unwrap();
        let recycling = kept.first_recycling().unwrap().id();

        audio.set_audio_channels(3).unwrap();
        assert_eq!(audio.input_lines(), 12);
        assert_eq!(audio.output_lines(), 3);
        let moved = audio.input(4).unwrap();
        assert!(Arc::ptr_eq(&moved, &kept));
        assert_eq!(moved.first_recycling().unwrap().id(), recycling);
        assert!(audio.notation(2).is_some());

        audio.set_audio_channels(1).unwrap();
        assert_eq!(audio.input_lines(), 4);
        assert!(audio.notation(1).is_none());
    }

    #[test]
    fn test_set_pads_resizes_channel_holders() {
        let audio = audio(AudioFlags::empty());
        let volume = crate::fx::volume_container(audio.ids());
        let id = volume.id();
        audio.add_recall_container(volume);
        assert_eq!(audio.container(id).unwrap().channel_recalls().len(), 8);

        audio.set_pads(ChannelSide::Input, 6).unwrap();
        assert_eq!(audio.input_lines(), 12);
        assert_eq!(audio.container(id).unwrap().channel_recalls().len(), 12);
    }

    #[test]
    fn test_set_samplerate_converts_templates() {
        let audio = audio(AudioFlags::INPUT_HAS_RECYCLING);
        let recycling = audio.input(0).unwrap().first_recycling().unwrap();
        recycling.load_template(&ripieno_core::SampleBuffer::Double(vec![0.5; 128]));
        audio.set_samplerate(88200);
        assert_eq!(audio.settings().samplerate, 88200);
        recycling.with_template(|t| {
            assert_eq!(t.samplerate(), 88200);
            assert_eq!(t.frame_count(), 256);
        });
    }

    #[test]
    fn test_remove_unknown_container() {
        let audio = audio(AudioFlags::empty());
        assert!(matches!(
            audio.remove_recall_container(ContainerId(9999)),
            Err(Error::ContainerNotFound(_))
        ));
    }
}

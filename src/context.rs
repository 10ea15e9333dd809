//! Shared state of one engine instance.

use crate::plugin::PluginRegistry;
use crate::{Error, Result};
use parking_lot::Mutex;
use ripieno_core::{AudioId, EngineConfig, IdAllocator, SoundcardClock};
use ripieno_recall::{Audio, ChannelWorkerPool};
use std::sync::Arc;

/// Everything an engine owns: the id source, the soundcard clock, the audio
/// list, the plugin registry and the optional channel worker pool.
///
/// Passed around explicitly; there is no global instance.
pub struct ApplicationContext {
    ids: Arc<IdAllocator>,
    config: EngineConfig,
    soundcard: Arc<SoundcardClock>,
    audios: Mutex<Vec<Arc<Audio>>>,
    plugins: PluginRegistry,
    workers: Option<Arc<ChannelWorkerPool>>,
}

impl ApplicationContext {
    pub fn new(config: EngineConfig, plugins: PluginRegistry) -> Result<Self> {
        config.validate()?;
        let workers = match config.worker_threads {
            0 => None,
            threads => Some(Arc::new(ChannelWorkerPool::new(threads)?)),
        };
        Ok(Self {
            ids: Arc::new(IdAllocator::new()),
            soundcard: Arc::new(SoundcardClock::new(&config)),
            config,
            audios: Mutex::new(Vec::new()),
            plugins,
            workers,
        })
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn soundcard(&self) -> &Arc<SoundcardClock> {
        &self.soundcard
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn worker_pool(&self) -> Option<&Arc<ChannelWorkerPool>> {
        self.workers.as_ref()
    }

    pub fn add_audio(&self, audio: Arc<Audio>) {
        self.audios.lock().push(audio);
    }

    pub fn remove_audio(&self, id: AudioId) -> Result<Arc<Audio>> {
        let mut audios = self.audios.lock();
        let position = audios
            .iter()
            .position(|a| a.id() == id)
            .ok_or(Error::AudioNotFound(id))?;
        Ok(audios.remove(position))
    }

    pub fn audio(&self, id: AudioId) -> Result<Arc<Audio>> {
        self.audios
            .lock()
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or(Error::AudioNotFound(id))
    }

    /// Snapshot of the audio list.
    pub fn audios(&self) -> Vec<Arc<Audio>> {
        self.audios.lock().clone()
    }
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("config", &self.config)
            .field("audios", &self.audios.lock().len())
            .field("plugins", &self.plugins)
            .field("workers", &self.workers.as_ref().map(|w| w.threads()))
            .finish()
    }
}

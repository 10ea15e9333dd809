use super::generator::Generator;
use super::recycling::Recycling;
use parking_lot::Mutex;
use ripieno_core::timeline::Pattern;
use ripieno_core::{RecallId, RecyclingId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Which chain of an audio a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSide {
    Output,
    Input,
}

/// Default pattern geometry: one bank pair, sixteen steps.
pub const DEFAULT_PATTERN_DIM: (usize, usize, usize) = (1, 1, 16);

/// One line of an audio's output or input chain.
///
/// Position fields are reassigned by the owning audio whenever its geometry
/// changes. Neighbours are not stored; ask the audio for them.
#[derive(Debug)]
pub struct Channel {
    side: ChannelSide,
    line: AtomicUsize,
    pad: AtomicUsize,
    audio_channel: AtomicUsize,
    recyclings: Mutex<Vec<Arc<Recycling>>>,
    pattern: Pattern,
    generator: Mutex<Generator>,
    recall_ids: Mutex<Vec<Arc<RecallId>>>,
}

impl Channel {
    pub fn new(side: ChannelSide, pad: usize, audio_channel: usize, audio_channels: usize) -> Arc<Self> {
        let (dim0, dim1, length) = DEFAULT_PATTERN_DIM;
        Arc::new(Self {
            side,
            line: AtomicUsize::new(pad * audio_channels + audio_channel),
            pad: AtomicUsize::new(pad),
            audio_channel: AtomicUsize::new(audio_channel),
            recyclings: Mutex::new(Vec::new()),
            pattern: Pattern::new(dim0, dim1, length),
            generator: Mutex::new(Generator::default()),
            recall_ids: Mutex::new(Vec::new()),
        })
    }

    pub fn side(&self) -> ChannelSide {
        self.side
    }

    pub fn line(&self) -> usize {
        self.line.load(Ordering::Acquire)
    }

    pub fn pad(&self) -> usize {
        self.pad.load(Ordering::Acquire)
    }

    pub fn audio_channel(&self) -> usize {
        self.audio_channel.load(Ordering::Acquire)
    }

    pub(crate) fn reposition(&self, pad: usize, audio_channel: usize, audio_channels: usize) {
        self.pad.store(pad, Ordering::Release);
        self.audio_channel.store(audio_channel, Ordering::Release);
        self.line
            .store(pad * audio_channels + audio_channel, Ordering::Release);
    }

    pub fn recyclings(&self) -> Vec<Arc<Recycling>> {
        self.recyclings.lock().clone()
    }

    pub fn first_recycling(&self) -> Option<Arc<Recycling>> {
        self.recyclings.lock().first().cloned()
    }

    pub fn last_recycling(&self) -> Option<Arc<Recycling>> {
        self.recyclings.lock().last().cloned()
    }

    pub fn recycling(&self, id: RecyclingId) -> Option<Arc<Recycling>> {
        self.recyclings
            .lock()
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    pub fn has_recycling(&self) -> bool {
        !self.recyclings.lock().is_empty()
    }

    /// Replace the bound sub-chain. Returns the previous one.
    pub fn set_recyclings(&self, recyclings: Vec<Arc<Recycling>>) -> Vec<Arc<Recycling>> {
        std::mem::replace(&mut *self.recyclings.lock(), recyclings)
    }

    pub fn add_recycling(&self, recycling: Arc<Recycling>) {
        self.recyclings.lock().push(recycling);
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn generator(&self) -> Generator {
        self.generator.lock().clone()
    }

    pub fn set_generator(&self, generator: Generator) {
        *self.generator.lock() = generator;
    }

    pub fn recall_ids(&self) -> Vec<Arc<RecallId>> {
        self.recall_ids.lock().clone()
    }

    pub(crate) fn add_recall_id(&self, recall_id: &Arc<RecallId>) {
        let mut ids = self.recall_ids.lock();
        if !ids.iter().any(|id| Arc::ptr_eq(id, recall_id)) {
            ids.push(Arc::clone(recall_id));
        }
    }

    pub(crate) fn remove_recall_id(&self, recall_id: &Arc<RecallId>) {
        self.recall_ids
            .lock()
            .retain(|id| !Arc::ptr_eq(id, recall_id));
    }
}

use super::signal::AudioSignal;
use parking_lot::Mutex;
use ripieno_core::{RecallId, RecyclingId, SampleBuffer, SampleFormat};
use std::sync::Arc;

/// One recycling slot of a channel.
///
/// Holds the template signal (loaded sample data) and at most one working
/// signal per [`RecallId`] running over it.
#[derive(Debug)]
pub struct Recycling {
    id: RecyclingId,
    template: Mutex<AudioSignal>,
    signals: Mutex<Vec<AudioSignal>>,
}

impl Recycling {
    pub fn new(id: RecyclingId, samplerate: u32, buffer_size: usize, format: SampleFormat) -> Arc<Self> {
        Arc::new(Self {
            id,
            template: Mutex::new(AudioSignal::template(id, samplerate, buffer_size, format)),
            signals: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> RecyclingId {
        self.id
    }

    /// Load mono sample data into the template.
    pub fn load_template(&self, data: &SampleBuffer) {
        self.template.lock().load(data);
    }

    pub fn set_template_loop(&self, loop_start: usize, loop_end: usize) {
        self.template.lock().set_loop(loop_start, loop_end);
    }

    pub fn with_template<R>(&self, f: impl FnOnce(&AudioSignal) -> R) -> R {
        f(&self.template.lock())
    }

    pub fn template_snapshot(&self) -> AudioSignal {
        self.template.lock().clone()
    }

    /// Convert the template. Idle working signals follow; playing ones keep
    /// their geometry until they finish.
    pub(crate) fn set_geometry(&self, samplerate: u32, buffer_size: usize, format: SampleFormat) {
        self.template
            .lock()
            .set_geometry(samplerate, buffer_size, format);
        for signal in self.signals.lock().iter_mut().filter(|s| !s.is_active()) {
            signal.set_geometry(samplerate, buffer_size, format);
        }
    }

    /// Create the idle working signal for `recall_id`. Returns `false` when
    /// one already exists.
    pub fn add_signal_for(&self, recall_id: &Arc<RecallId>) -> bool {
        let template = self.template.lock();
        let mut signals = self.signals.lock();
        if signals.iter().any(|s| s.belongs_to(recall_id)) {
            return false;
        }
        signals.push(AudioSignal::for_recall_id(&template, Arc::clone(recall_id)));
        true
    }

    pub fn has_signal(&self, recall_id: &Arc<RecallId>) -> bool {
        self.signals.lock().iter().any(|s| s.belongs_to(recall_id))
    }

    /// Run `f` on the working signal of `recall_id`, if any.
    pub fn with_signal<R>(&self, recall_id: &Arc<RecallId>, f: impl FnOnce(&mut AudioSignal) -> R) -> Option<R> {
        let mut signals = self.signals.lock();
        signals
            .iter_mut()
            .find(|s| s.belongs_to(recall_id))
            .map(f)
    }

    /// Like [`Recycling::with_signal`] with the template readable alongside.
    pub fn with_signal_and_template<R>(
        &self,
        recall_id: &Arc<RecallId>,
        f: impl FnOnce(&mut AudioSignal, &AudioSignal) -> R,
    ) -> Option<R> {
        let template = self.template.lock();
        let mut signals = self.signals.lock();
        signals
            .iter_mut()
            .find(|s| s.belongs_to(recall_id))
            .map(|signal| f(signal, &template))
    }

    /// Copy of the working signal of `recall_id`.
    pub fn signal_snapshot(&self, recall_id: &Arc<RecallId>) -> Option<AudioSignal> {
        self.with_signal(recall_id, |s| s.clone())
    }

    pub fn signal_count(&self) -> usize {
        self.signals.lock().len()
    }

    /// Drop the working signals of `recall_id`. Returns how many went.
    pub fn remove_signals(&self, recall_id: &Arc<RecallId>) -> usize {
        let mut signals = self.signals.lock();
        let before = signals.len();
        signals.retain(|s| !s.belongs_to(recall_id));
        before - signals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripieno_core::{RecyclingContext, SoundScope};

    fn recall_id() -> Arc<RecallId> {
        RecallId::with_context_scope(RecyclingContext::new(SoundScope::Playback, 1))
    }

    #[test]
    fn test_one_signal_per_recall_id() {
        let recycling = Recycling::new(RecyclingId(1), 44100, 64, SampleFormat::S16);
        let a = recall_id();
        let b = recall_id();
        assert!(recycling.add_signal_for(&a));
        assert!(!recycling.add_signal_for(&a));
        assert!(recycling.add_signal_for(&b));
        assert_eq!(recycling.signal_count(), 2);

        assert_eq!(recycling.remove_signals(&a), 1);
        assert!(!recycling.has_signal(&a));
        assert!(recycling.has_signal(&b));
    }

    #[test]
    fn test_working_signal_follows_template_geometry() {
        let recycling = Recycling::new(RecyclingId(2), 44100, 64, SampleFormat::Float);
        recycling.set_template_loop(0, 32);
        let id = recall_id();
        recycling.add_signal_for(&id);
        let signal = recycling.signal_snapshot(&id).unwrap();
        assert_eq!(signal.buffer_size(), 64);
        assert_eq!(signal.format(), SampleFormat::Float);
        assert_eq!(signal.loop_points(), (0, 32));
        assert!(!signal.is_active());
    }
}

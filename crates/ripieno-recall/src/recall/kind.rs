use bitflags::bitflags;

/// Level of the audio tree a recall works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecallKind {
    /// Audio-wide port holder. Never duplicated, gets `automate`.
    Audio,
    /// Audio-wide worker, one working copy per run.
    AudioRun,
    /// Per-line port holder. Never duplicated.
    Channel,
    /// Per-line worker.
    ChannelRun,
    /// Per-recycling worker.
    Recycling,
    /// Per-signal worker.
    AudioSignal,
}

impl RecallKind {
    /// Holds ports shared by working copies instead of doing work.
    pub fn is_port_holder(self) -> bool {
        matches!(self, RecallKind::Audio | RecallKind::Channel)
    }

    /// Duplicated once per run rather than per line.
    pub fn is_audio_level(self) -> bool {
        matches!(self, RecallKind::Audio | RecallKind::AudioRun)
    }

    /// Duplicated once per recycling of each line.
    pub fn is_per_recycling(self) -> bool {
        matches!(self, RecallKind::Recycling | RecallKind::AudioSignal)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RecallFlags: u32 {
        /// Prototype; only its duplicates run.
        const TEMPLATE = 1;
        /// Survives `done` until cancelled.
        const PERSISTENT = 1 << 1;
        /// Finishes when its last child does.
        const PROPAGATE_DONE = 1 << 2;
        /// Skipped by run stages until initialized.
        const HIDE = 1 << 3;
        /// Has not completed a period yet.
        const INITIAL_RUN = 1 << 4;
        const RUN_INITIALIZED = 1 << 5;
    }
}

//! Staging and state flag sets, sound scopes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Pipeline stages a run has passed through.
    ///
    /// Bits are set individually; `CANCEL`, `DONE` and `REMOVE` overlay any
    /// other combination.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StagingFlags: u32 {
        const CHECK_RT_DATA = 1;
        const RUN_INIT_PRE = 1 << 1;
        const RUN_INIT_INTER = 1 << 2;
        const RUN_INIT_POST = 1 << 3;
        const FEED_INPUT_QUEUE = 1 << 4;
        const AUTOMATE = 1 << 5;
        const RUN_PRE = 1 << 6;
        const RUN_INTER = 1 << 7;
        const RUN_POST = 1 << 8;
        const DO_FEEDBACK = 1 << 9;
        const FEED_OUTPUT_QUEUE = 1 << 10;
        const FINI = 1 << 11;
        const CANCEL = 1 << 12;
        const DONE = 1 << 13;
        const REMOVE = 1 << 14;
        /// Dependencies have been resolved for this run.
        const RESOLVE = 1 << 15;
    }
}

impl StagingFlags {
    pub const RUN_INIT: StagingFlags = StagingFlags::RUN_INIT_PRE
        .union(StagingFlags::RUN_INIT_INTER)
        .union(StagingFlags::RUN_INIT_POST);

    pub const RUN: StagingFlags = StagingFlags::RUN_PRE
        .union(StagingFlags::RUN_INTER)
        .union(StagingFlags::RUN_POST);

    /// The three init stages in execution order.
    pub const INIT_STAGES: [StagingFlags; 3] = [
        StagingFlags::RUN_INIT_PRE,
        StagingFlags::RUN_INIT_INTER,
        StagingFlags::RUN_INIT_POST,
    ];

    /// The three run stages in execution order.
    pub const RUN_STAGES: [StagingFlags; 3] = [
        StagingFlags::RUN_PRE,
        StagingFlags::RUN_INTER,
        StagingFlags::RUN_POST,
    ];
}

bitflags! {
    /// Scheduling state of a run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        const IS_WAITING = 1;
        const IS_ACTIVE = 1 << 1;
        const IS_PROCESSING = 1 << 2;
        const IS_TERMINATING = 1 << 3;
    }
}

/// Mutually exclusive execution context of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundScope {
    Playback,
    Sequencer,
    Notation,
    Wave,
    Midi,
}

impl SoundScope {
    pub const COUNT: usize = 5;

    pub const ALL: [SoundScope; 5] = [
        SoundScope::Playback,
        SoundScope::Sequencer,
        SoundScope::Notation,
        SoundScope::Wave,
        SoundScope::Midi,
    ];

    pub fn index(self) -> usize {
        match self {
            SoundScope::Playback => 0,
            SoundScope::Sequencer => 1,
            SoundScope::Notation => 2,
            SoundScope::Wave => 3,
            SoundScope::Midi => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn mask(self) -> ScopeMask {
        match self {
            SoundScope::Playback => ScopeMask::PLAYBACK,
            SoundScope::Sequencer => ScopeMask::SEQUENCER,
            SoundScope::Notation => ScopeMask::NOTATION,
            SoundScope::Wave => ScopeMask::WAVE,
            SoundScope::Midi => ScopeMask::MIDI,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SoundScope::Playback => "playback",
            SoundScope::Sequencer => "sequencer",
            SoundScope::Notation => "notation",
            SoundScope::Wave => "wave",
            SoundScope::Midi => "midi",
        }
    }
}

bitflags! {
    /// Set of sound scopes a recall template is able to run in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScopeMask: u8 {
        const PLAYBACK = 1;
        const SEQUENCER = 1 << 1;
        const NOTATION = 1 << 2;
        const WAVE = 1 << 3;
        const MIDI = 1 << 4;
    }
}

impl ScopeMask {
    pub fn accepts(self, scope: SoundScope) -> bool {
        self.contains(scope.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_groups() {
        assert!(StagingFlags::RUN.contains(StagingFlags::RUN_INTER));
        assert!(!StagingFlags::RUN.contains(StagingFlags::RUN_INIT_PRE));
        assert_eq!(StagingFlags::RUN_INIT.bits().count_ones(), 3);
    }

    #[test]
    fn test_scope_index_roundtrip() {
        for scope in SoundScope::ALL {
            assert_eq!(SoundScope::from_index(scope.index()), Some(scope));
        }
        assert_eq!(SoundScope::from_index(SoundScope::COUNT), None);
    }

    #[test]
    fn test_scope_mask_accepts() {
        let mask = ScopeMask::NOTATION | ScopeMask::SEQUENCER;
        assert!(mask.accepts(SoundScope::Notation));
        assert!(!mask.accepts(SoundScope::Playback));
    }
}

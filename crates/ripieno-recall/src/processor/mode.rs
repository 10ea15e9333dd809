use ripieno_core::config::NOTE_256TH_SUBDIVISIONS;
use ripieno_core::timeline::Note;
use ripieno_core::SoundScope;

/// What the processor turns into signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorMode {
    /// Notes of the notation, per audio channel.
    Notation,
    /// Steps set in each input channel's pattern.
    Pattern,
    /// Live events from the audio's sequencer input.
    Midi,
    /// Wave timeline buffers.
    Wave,
    /// Template streams, played once.
    Playback,
}

impl ProcessorMode {
    pub fn for_scope(scope: SoundScope) -> Self {
        match scope {
            SoundScope::Notation => ProcessorMode::Notation,
            SoundScope::Sequencer => ProcessorMode::Pattern,
            SoundScope::Midi => ProcessorMode::Midi,
            SoundScope::Wave => ProcessorMode::Wave,
            SoundScope::Playback => ProcessorMode::Playback,
        }
    }

    /// The run ends once none of its signals is playing.
    pub fn finishes_with_signals(self) -> bool {
        matches!(self, ProcessorMode::Wave | ProcessorMode::Playback)
    }
}

/// Where a keyed note sounds and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// One audio channel, for the note's length. `attack` frames of the
    /// period pass before it starts.
    Notation { audio_channel: usize, attack: usize },
    /// One audio channel, for one step.
    Pattern { audio_channel: usize },
    /// Every audio channel of the pad, until released.
    Midi { attack: usize },
}

impl KeyMode {
    pub fn attack(self) -> usize {
        match self {
            KeyMode::Notation { attack, .. } | KeyMode::Midi { attack } => attack,
            KeyMode::Pattern { .. } => 0,
        }
    }

    pub fn audio_channel(self) -> Option<usize> {
        match self {
            KeyMode::Notation { audio_channel, .. } | KeyMode::Pattern { audio_channel } => Some(audio_channel),
            KeyMode::Midi { .. } => None,
        }
    }

    /// Frames a signal opened for `note` covers. Held notes start with one
    /// tick and grow while they sound.
    pub fn frames(self, note: &Note, delay: f64, buffer_size: usize) -> usize {
        let ticks = match self {
            KeyMode::Notation { .. } => {
                note.x1_256th.saturating_sub(note.x0_256th) as f64 / NOTE_256TH_SUBDIVISIONS as f64
            }
            KeyMode::Pattern { .. } | KeyMode::Midi { .. } => 1.0,
        };
        (ticks * delay * buffer_size as f64).ceil().max(1.0) as usize
    }
}

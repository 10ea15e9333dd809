use crate::recall::{RecallBehaviour, RunContext};

/// Mixes the current segment of every signal of its line into the
/// soundcard channel of the line's audio channel.
#[derive(Debug, Clone, Default)]
pub struct PlayChannelRun;

impl RecallBehaviour for PlayChannelRun {
    fn run_post(&mut self, cx: &RunContext<'_>) {
        let Some(channel) = cx.channel() else {
            return;
        };
        let pcm_channels = cx.soundcard.pcm_channels().max(1);
        let output = channel.audio_channel() % pcm_channels;
        for recycling in channel.recyclings() {
            recycling.with_signal(cx.recall_id, |signal| {
                if let Some(buffer) = signal.current_buffer() {
                    cx.soundcard.mix_output(buffer, output);
                }
            });
        }
    }
}

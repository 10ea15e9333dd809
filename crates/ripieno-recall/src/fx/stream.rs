use crate::recall::{RecallBehaviour, RunContext};

/// Moves every signal of its line to the next segment once the period has
/// been played.
#[derive(Debug, Clone, Default)]
pub struct StreamChannelRun;

impl RecallBehaviour for StreamChannelRun {
    fn run_post(&mut self, cx: &RunContext<'_>) {
        let Some(channel) = cx.channel() else {
            return;
        };
        for recycling in channel.recyclings() {
            recycling.with_signal(cx.recall_id, |signal| signal.advance());
        }
    }
}

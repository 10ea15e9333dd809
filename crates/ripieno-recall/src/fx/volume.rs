use crate::recall::{RecallBehaviour, RunContext};
use ripieno_core::buffer;

pub const VOLUME_PORT: &str = "./volume[0]";

/// Scales the current segment of every signal of its line by the line's
/// volume port.
#[derive(Debug, Clone, Default)]
pub struct VolumeChannel;

impl RecallBehaviour for VolumeChannel {
    fn run_inter(&mut self, cx: &RunContext<'_>) {
        let Some(channel) = cx.channel() else {
            return;
        };
        let volume = cx.port_value(VOLUME_PORT, 1.0);
        if volume == 1.0 {
            return;
        }
        for recycling in channel.recyclings() {
            recycling.with_signal(cx.recall_id, |signal| {
                if let Some(segment) = signal.current_buffer_mut() {
                    let length = segment.len();
                    buffer::volume(segment, 1, length, volume);
                }
            });
        }
    }
}

use crate::recall::{RecallBehaviour, RunContext};
use ripieno_core::buffer;

pub const PEAK_PORT: &str = "./peak[0]";

const HARMONIC_RATE: f64 = 440.0;
const MAX_RATE: f64 = 22000.0;
const PRESSURE_FACTOR: f64 = 1.0;

/// Meters its line into the output port `./peak[0]`. The reading falls off
/// by `decay` per period unless a louder one replaces it.
#[derive(Debug, Clone)]
pub struct PeakChannelRun {
    decay: f64,
}

impl Default for PeakChannelRun {
    fn default() -> Self {
        Self { decay: 0.9 }
    }
}

impl PeakChannelRun {
    pub fn new(decay: f64) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
        }
    }
}

impl RecallBehaviour for PeakChannelRun {
    fn run_inter(&mut self, cx: &RunContext<'_>) {
        let (Some(channel), Some(port)) = (cx.channel(), cx.port(PEAK_PORT)) else {
            return;
        };
        let mut peak: f64 = 0.0;
        for recycling in channel.recyclings() {
            let current = recycling.with_signal(cx.recall_id, |signal| {
                signal.current_buffer().map_or(0.0, |segment| {
                    buffer::peak(segment, 1, segment.len(), HARMONIC_RATE, MAX_RATE, PRESSURE_FACTOR)
                })
            });
            peak = peak.max(current.unwrap_or(0.0));
        }
        let held = port.read_f64() * self.decay;
        port.write_f64(peak.max(held));
    }
}

use super::signal::AudioSignal;
use ripieno_core::buffer::{self, SampleBuffer};
use std::f64::consts::TAU;

/// What a channel renders into an opened signal.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Generator {
    #[default]
    Silence,
    /// Sine at `frequency` Hz.
    Oscillator { frequency: f64, amplitude: f64 },
    /// Plays the recycling's template signal, honoring its loop points.
    Template,
}

impl Generator {
    /// Sine tuned to MIDI key `key`.
    pub fn for_key(key: u32, amplitude: f64) -> Self {
        Generator::Oscillator {
            frequency: key_frequency(key),
            amplitude,
        }
    }

    /// Render `dest.len()` mono frames starting at signal frame `frame`.
    pub fn render(&self, dest: &mut SampleBuffer, frame: u64, samplerate: u32, template: &AudioSignal) {
        match self {
            Generator::Silence => {}
            Generator::Oscillator {
                frequency,
                amplitude,
            } => {
                let step = TAU * frequency / samplerate.max(1) as f64;
                for i in 0..dest.len() {
                    let phase = step * (frame + i as u64) as f64;
                    dest.set(i, amplitude * phase.sin());
                }
            }
            Generator::Template => template.read_looped(frame, dest),
        }
    }
}

/// Equal-tempered frequency of MIDI key `key`, A4 = 440 Hz.
pub fn key_frequency(key: u32) -> f64 {
    440.0 * 2f64.powf((key as f64 - 69.0) / 12.0)
}

/// Copy `count` frames of `src` starting at `soffset` into `dest` at
/// `doffset`, overwriting rather than mixing.
pub(crate) fn overwrite(dest: &mut SampleBuffer, doffset: usize, src: &SampleBuffer, soffset: usize, count: usize) {
    buffer::clear(dest, doffset, count);
    buffer::copy(dest, 1, doffset, src, 1, soffset, count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ripieno_core::{RecyclingId, SampleFormat};

    #[test]
    fn test_key_frequency() {
        assert_relative_eq!(key_frequency(69), 440.0);
        assert_relative_eq!(key_frequency(81), 880.0);
    }

    #[test]
    fn test_oscillator_is_continuous() {
        let template = AudioSignal::template(RecyclingId(1), 48000, 4, SampleFormat::Double);
        let generator = Generator::Oscillator {
            frequency: 1000.0,
            amplitude: 1.0,
        };
        let mut whole = SampleBuffer::new(SampleFormat::Double, 8);
        generator.render(&mut whole, 0, 48000, &template);
        let mut tail = SampleBuffer::new(SampleFormat::Double, 4);
        generator.render(&mut tail, 4, 48000, &template);
        for i in 0..4 {
            assert_relative_eq!(whole.get(4 + i).unwrap(), tail.get(i).unwrap());
        }
    }
}

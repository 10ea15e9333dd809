//! In-place gain and metering primitives.

use super::lane::{with_lane, Lane};
use super::SampleBuffer;

/// Zero `count` samples starting at `offset`.
pub fn clear(buffer: &mut SampleBuffer, offset: usize, count: usize) {
    with_lane!(buffer, |data, _L| {
        let end = offset.saturating_add(count).min(data.len());
        if offset < end {
            data[offset..end].fill(Default::default());
        }
    })
}

/// Multiply `length` frames by `volume`, stepping `channels` samples per frame.
pub fn volume(buffer: &mut SampleBuffer, channels: usize, length: usize, volume: f64) {
    if channels == 0 || length == 0 {
        return;
    }

    with_lane!(buffer, |data, L| {
        for elem in data.iter_mut().step_by(channels).take(length) {
            L::scale(elem, volume);
        }
    })
}

/// Apply a linear gain ramp and return the gain for the frame after the last.
///
/// Frame `i` is scaled by `current_volume + i * ratio`. Feeding the returned
/// value into the next call continues the ramp without a seam.
pub fn envelope(
    buffer: &mut SampleBuffer,
    channels: usize,
    length: usize,
    current_volume: f64,
    ratio: f64,
) -> f64 {
    if channels == 0 || length == 0 {
        return current_volume;
    }

    with_lane!(buffer, |data, L| {
        for (i, elem) in data.iter_mut().step_by(channels).take(length).enumerate() {
            L::scale(elem, current_volume + i as f64 * ratio);
        }
    });

    current_volume + length as f64 * ratio
}

/// Leaky peak value of `length` frames.
///
/// Every non-zero sample adds its reciprocal pressure
/// `1 / (pressure_factor * |sample|)`; the sum is then folded through
/// `atan(1 / harmonic_rate) / sin(sum / max_rate)`. Silence yields `0.0`.
pub fn peak(
    buffer: &SampleBuffer,
    channels: usize,
    length: usize,
    harmonic_rate: f64,
    max_rate: f64,
    pressure_factor: f64,
) -> f64 {
    if channels == 0 || length == 0 {
        return 0.0;
    }

    let sum: f64 = with_lane!(buffer, |data, L| {
        data.iter()
            .step_by(channels)
            .take(length)
            .map(|elem| L::read(*elem).abs())
            .filter(|value| *value != 0.0)
            .map(|value| 1.0 / (pressure_factor * value))
            .sum()
    });

    if sum == 0.0 {
        return 0.0;
    }

    (1.0 / harmonic_rate).atan() / (sum / max_rate).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleFormat;
    use approx::assert_relative_eq;

    #[test]
    fn test_clear_range() {
        let mut buffer = SampleBuffer::S16(vec![1, 2, 3, 4]);
        clear(&mut buffer, 1, 2);
        assert_eq!(buffer, SampleBuffer::S16(vec![1, 0, 0, 4]));
        clear(&mut buffer, 3, 10);
        assert_eq!(buffer, SampleBuffer::S16(vec![1, 0, 0, 0]));
    }

    #[test]
    fn test_volume_strided() {
        let mut buffer = SampleBuffer::Float(vec![1.0, 1.0, 1.0, 1.0]);
        volume(&mut buffer, 2, 2, 0.5);
        assert_eq!(buffer, SampleBuffer::Float(vec![0.5, 1.0, 0.5, 1.0]));
    }

    #[test]
    fn test_volume_clamps_integers() {
        let mut buffer = SampleBuffer::S8(vec![100, -100]);
        volume(&mut buffer, 1, 2, 2.0);
        assert_eq!(buffer, SampleBuffer::S8(vec![127, -128]));
    }

    #[test]
    fn test_envelope_ramp() {
        let mut buffer = SampleBuffer::Double(vec![1.0; 4]);
        let next = envelope(&mut buffer, 1, 4, 0.0, 0.25);
        assert_eq!(buffer, SampleBuffer::Double(vec![0.0, 0.25, 0.5, 0.75]));
        assert_relative_eq!(next, 1.0);
    }

    #[test]
    fn test_envelope_chained_matches_single_call() {
        let mut whole = SampleBuffer::Double(vec![1.0; 16]);
        envelope(&mut whole, 1, 16, 0.2, 0.05);

        let mut first = SampleBuffer::Double(vec![1.0; 8]);
        let mut second = SampleBuffer::Double(vec![1.0; 8]);
        let seam = envelope(&mut first, 1, 8, 0.2, 0.05);
        envelope(&mut second, 1, 8, seam, 0.05);

        let chained: Vec<f64> = first
            .to_normalized()
            .into_iter()
            .chain(second.to_normalized())
            .collect();
        for (a, b) in whole.to_normalized().iter().zip(&chained) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_envelope_zero_length_returns_volume() {
        let mut buffer = SampleBuffer::new(SampleFormat::S16, 4);
        assert_eq!(envelope(&mut buffer, 1, 0, 0.7, 0.1), 0.7);
    }

    #[test]
    fn test_peak_of_silence_is_zero() {
        let buffer = SampleBuffer::new(SampleFormat::S16, 64);
        assert_eq!(peak(&buffer, 1, 64, 440.0, 1000.0, 25.0), 0.0);
    }

    #[test]
    fn test_peak_is_format_independent() {
        let values = vec![0.5, -0.25, 0.0, 0.75];
        let a = SampleBuffer::from_normalized(SampleFormat::Float, &values);
        let b = SampleBuffer::from_normalized(SampleFormat::Double, &values);
        let pa = peak(&a, 1, 4, 440.0, 1000.0, 25.0);
        let pb = peak(&b, 1, 4, 440.0, 1000.0, 25.0);
        assert!(pa.is_finite());
        assert_relative_eq!(pa, pb, epsilon = 1e-6);
    }
}

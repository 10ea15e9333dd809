//! Linear-interpolation samplerate conversion.

use super::lane::{with_lane, Lane};
use super::SampleBuffer;

/// Resample `length` interleaved frames from `samplerate` to `target_samplerate`.
///
/// Returns a new buffer of the same format holding
/// `ceil(length * target_samplerate / samplerate)` frames, so the duration is
/// preserved. Zero rates or lengths give an empty buffer.
pub fn resample(
    buffer: &SampleBuffer,
    channels: usize,
    samplerate: u32,
    length: usize,
    target_samplerate: u32,
) -> SampleBuffer {
    let format = buffer.format();
    if channels == 0 || length == 0 || samplerate == 0 || target_samplerate == 0 {
        return SampleBuffer::new(format, 0);
    }

    let frames = length.min(buffer.len() / channels);
    if frames == 0 {
        return SampleBuffer::new(format, 0);
    }

    let ratio = target_samplerate as f64 / samplerate as f64;
    let output_frames =
        (frames as u64 * target_samplerate as u64).div_ceil(samplerate as u64) as usize;

    let input = buffer.to_normalized();
    let mut output = SampleBuffer::new(format, output_frames * channels);

    with_lane!(&mut output, |data, L| {
        for frame in 0..output_frames {
            let position = frame as f64 / ratio;
            let i0 = (position.floor() as usize).min(frames - 1);
            let i1 = (i0 + 1).min(frames - 1);
            let frac = position - i0 as f64;

            for channel in 0..channels {
                let a = input[i0 * channels + channel];
                let b = input[i1 * channels + channel];
                data[frame * channels + channel] = L::write(a + (b - a) * frac);
            }
        }
    });

    output
}

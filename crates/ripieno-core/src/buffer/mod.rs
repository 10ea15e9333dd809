//! Typed PCM buffers and the format codec.
//!
//! A [`SampleBuffer`] owns interleaved samples of one [`SampleFormat`]. The
//! codec functions operate on any pair of formats:
//!
//! - [`copy`] / [`copy_with_mode`]: additive convert-and-interleave
//! - [`envelope`], [`volume`]: gain ramps and flat gain
//! - [`peak`]: leaky peak meter value
//! - [`resample`]: linear interpolation to a new samplerate
//!
//! # Example
//!
//! ```
//! use ripieno_core::buffer::{copy, SampleBuffer, SampleFormat};
//!
//! let src = SampleBuffer::S16(vec![16384, -16384]);
//! let mut dest = SampleBuffer::new(SampleFormat::Double, 2);
//! copy(&mut dest, 1, 0, &src, 1, 0, 2);
//! assert!((dest.get(0).unwrap() - 0.5).abs() < 1e-4);
//! ```

mod codec;
mod format;
pub(crate) mod lane;
mod ops;
mod resample;

pub use codec::{copy, copy_with_mode, CopyMode};
pub use format::{
    SampleFormat, FORMAT_COMPLEX, FORMAT_DOUBLE, FORMAT_FLOAT, FORMAT_S16, FORMAT_S24,
    FORMAT_S32, FORMAT_S64, FORMAT_S8,
};
pub use ops::{clear, envelope, peak, volume};
pub use resample::resample;

use crate::Result;
use lane::{with_lane, Lane};

use num_complex::Complex64;

/// Interleaved samples of one format.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    S8(Vec<i8>),
    S16(Vec<i16>),
    S24(Vec<i32>),
    S32(Vec<i32>),
    S64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl SampleBuffer {
    /// Zeroed buffer of `len` samples.
    pub fn new(format: SampleFormat, len: usize) -> Self {
        match format {
            SampleFormat::S8 => SampleBuffer::S8(vec![0; len]),
            SampleFormat::S16 => SampleBuffer::S16(vec![0; len]),
            SampleFormat::S24 => SampleBuffer::S24(vec![0; len]),
            SampleFormat::S32 => SampleBuffer::S32(vec![0; len]),
            SampleFormat::S64 => SampleBuffer::S64(vec![0; len]),
            SampleFormat::Float => SampleBuffer::Float(vec![0.0; len]),
            SampleFormat::Double => SampleBuffer::Double(vec![0.0; len]),
            SampleFormat::Complex => SampleBuffer::Complex(vec![Complex64::default(); len]),
        }
    }

    /// Zeroed buffer for a raw soundcard format tag.
    pub fn from_raw_format(raw: u32, len: usize) -> Result<Self> {
        Ok(Self::new(SampleFormat::try_from(raw)?, len))
    }

    /// Buffer of `format` holding the given normalized values.
    pub fn from_normalized(format: SampleFormat, values: &[f64]) -> Self {
        let mut buffer = Self::new(format, values.len());
        with_lane!(&mut buffer, |data, L| {
            for (elem, value) in data.iter_mut().zip(values) {
                *elem = L::write(*value);
            }
        });
        buffer
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            SampleBuffer::S8(_) => SampleFormat::S8,
            SampleBuffer::S16(_) => SampleFormat::S16,
            SampleBuffer::S24(_) => SampleFormat::S24,
            SampleBuffer::S32(_) => SampleFormat::S32,
            SampleBuffer::S64(_) => SampleFormat::S64,
            SampleBuffer::Float(_) => SampleFormat::Float,
            SampleBuffer::Double(_) => SampleFormat::Double,
            SampleBuffer::Complex(_) => SampleFormat::Complex,
        }
    }

    pub fn len(&self) -> usize {
        with_lane!(self, |data, _L| data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalized value at `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        with_lane!(self, |data, L| data.get(index).map(|elem| L::read(*elem)))
    }

    /// Overwrite the value at `index` with a normalized value. Out of range is ignored.
    pub fn set(&mut self, index: usize, value: f64) {
        with_lane!(self, |data, L| {
            if let Some(elem) = data.get_mut(index) {
                *elem = L::write(value);
            }
        })
    }

    /// All samples as normalized values.
    pub fn to_normalized(&self) -> Vec<f64> {
        with_lane!(self, |data, L| data.iter().map(|elem| L::read(*elem)).collect())
    }

    /// True when every sample is zero.
    pub fn is_silent(&self) -> bool {
        with_lane!(self, |data, L| data.iter().all(|elem| L::read(*elem) == 0.0))
    }

    /// Resize in place, zero-filling new samples.
    pub fn resize(&mut self, len: usize) {
        with_lane!(self, |data, _L| data.resize(len, Default::default()))
    }
}

//! Additive convert-and-interleave copy between any two formats.

use super::lane::{with_lane, Lane};
use super::{SampleBuffer, SampleFormat};
use crate::{Error, Result};

/// One destination × source format pair.
///
/// Encoded as `dest.index() * SampleFormat::COUNT + src.index()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyMode {
    pub dest: SampleFormat,
    pub src: SampleFormat,
}

impl CopyMode {
    pub fn new(dest: SampleFormat, src: SampleFormat) -> Self {
        Self { dest, src }
    }

    /// Mode for copying `src` into `dest`.
    pub fn of(dest: &SampleBuffer, src: &SampleBuffer) -> Self {
        Self::new(dest.format(), src.format())
    }

    pub fn raw(self) -> u32 {
        (self.dest.index() * SampleFormat::COUNT + self.src.index()) as u32
    }

    pub fn from_raw(raw: u32) -> Result<Self> {
        let raw_index = raw as usize;
        if raw_index >= SampleFormat::COUNT * SampleFormat::COUNT {
            return Err(Error::UnsupportedFormat(raw));
        }

        Ok(Self::new(
            SampleFormat::ALL[raw_index / SampleFormat::COUNT],
            SampleFormat::ALL[raw_index % SampleFormat::COUNT],
        ))
    }
}

/// Frames addressable from `offset` with `stride` in a buffer of `len` samples.
#[inline]
fn frames_available(len: usize, offset: usize, stride: usize) -> usize {
    if stride == 0 || offset >= len {
        return 0;
    }
    (len - offset - 1) / stride + 1
}

fn copy_lanes<D: Lane, S: Lane>(
    dest: &mut [D::Elem],
    dchannels: usize,
    doffset: usize,
    src: &[S::Elem],
    schannels: usize,
    soffset: usize,
    count: usize,
) {
    let count = count
        .min(frames_available(dest.len(), doffset, dchannels))
        .min(frames_available(src.len(), soffset, schannels));

    for i in 0..count {
        D::accumulate(
            &mut dest[doffset + i * dchannels],
            S::read(src[soffset + i * schannels]),
        );
    }
}

/// Convert `count` frames of `src` and add them onto `dest`.
///
/// Reads every `schannels`-th sample starting at `soffset` and accumulates it
/// into every `dchannels`-th sample of `dest` starting at `doffset`. Integer
/// destinations clamp. A zero `count` or channel stride does nothing; counts
/// larger than either buffer are truncated.
pub fn copy(
    dest: &mut SampleBuffer,
    dchannels: usize,
    doffset: usize,
    src: &SampleBuffer,
    schannels: usize,
    soffset: usize,
    count: usize,
) {
    if count == 0 {
        return;
    }

    with_lane!(dest, |d, DL| {
        with_lane!(src, |s, SL| {
            copy_lanes::<DL, SL>(d, dchannels, doffset, s, schannels, soffset, count)
        })
    })
}

/// [`copy`] with an explicit mode, which must match the buffer formats.
#[allow(clippy::too_many_arguments)]
pub fn copy_with_mode(
    dest: &mut SampleBuffer,
    dchannels: usize,
    doffset: usize,
    src: &SampleBuffer,
    schannels: usize,
    soffset: usize,
    count: usize,
    mode: CopyMode,
) -> Result<()> {
    if mode != CopyMode::of(dest, src) {
        return Err(Error::CopyModeMismatch {
            mode: mode.raw(),
            dest: dest.format().name(),
            src: src.format().name(),
        });
    }

    copy(dest, dchannels, doffset, src, schannels, soffset, count);
    Ok(())
}

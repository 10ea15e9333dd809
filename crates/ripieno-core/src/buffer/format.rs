//! Sample formats and their soundcard tags.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Soundcard tag for signed 8 bit PCM.
pub const FORMAT_S8: u32 = 0x8;
/// Soundcard tag for signed 16 bit PCM.
pub const FORMAT_S16: u32 = 0x10;
/// Soundcard tag for signed 24 bit PCM (stored in 32 bit words).
pub const FORMAT_S24: u32 = 0x18;
/// Soundcard tag for signed 32 bit PCM.
pub const FORMAT_S32: u32 = 0x20;
/// Soundcard tag for signed 64 bit PCM.
pub const FORMAT_S64: u32 = 0x40;
/// Soundcard tag for 32 bit float.
pub const FORMAT_FLOAT: u32 = 0x1000;
/// Soundcard tag for 64 bit float.
pub const FORMAT_DOUBLE: u32 = 0x2000;
/// Soundcard tag for complex samples.
pub const FORMAT_COMPLEX: u32 = 0x4000;

/// Numeric representation of a sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    S8,
    #[default]
    S16,
    S24,
    S32,
    S64,
    Float,
    Double,
    /// Real and imaginary part as `f64`; conversions to real formats read the
    /// real part.
    Complex,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 8] = [
        SampleFormat::S8,
        SampleFormat::S16,
        SampleFormat::S24,
        SampleFormat::S32,
        SampleFormat::S64,
        SampleFormat::Float,
        SampleFormat::Double,
        SampleFormat::Complex,
    ];

    /// Number of formats, the side length of the copy-mode matrix.
    pub const COUNT: usize = 8;

    /// Soundcard tag.
    pub fn raw(self) -> u32 {
        match self {
            SampleFormat::S8 => FORMAT_S8,
            SampleFormat::S16 => FORMAT_S16,
            SampleFormat::S24 => FORMAT_S24,
            SampleFormat::S32 => FORMAT_S32,
            SampleFormat::S64 => FORMAT_S64,
            SampleFormat::Float => FORMAT_FLOAT,
            SampleFormat::Double => FORMAT_DOUBLE,
            SampleFormat::Complex => FORMAT_COMPLEX,
        }
    }

    /// Position in [`SampleFormat::ALL`].
    pub fn index(self) -> usize {
        match self {
            SampleFormat::S8 => 0,
            SampleFormat::S16 => 1,
            SampleFormat::S24 => 2,
            SampleFormat::S32 => 3,
            SampleFormat::S64 => 4,
            SampleFormat::Float => 5,
            SampleFormat::Double => 6,
            SampleFormat::Complex => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::S8 => "s8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::S64 => "s64",
            SampleFormat::Float => "float",
            SampleFormat::Double => "double",
            SampleFormat::Complex => "complex",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SampleFormat::S8
                | SampleFormat::S16
                | SampleFormat::S24
                | SampleFormat::S32
                | SampleFormat::S64
        )
    }

    /// Bytes per sample in memory.
    pub fn word_size(self) -> usize {
        match self {
            SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 | SampleFormat::S32 | SampleFormat::Float => 4,
            SampleFormat::S64 | SampleFormat::Double => 8,
            SampleFormat::Complex => 16,
        }
    }

    /// Largest positive magnitude, used as normalization scale for integer formats.
    pub fn max_magnitude(self) -> f64 {
        match self {
            SampleFormat::S8 => i8::MAX as f64,
            SampleFormat::S16 => i16::MAX as f64,
            SampleFormat::S24 => 8_388_607.0,
            SampleFormat::S32 => i32::MAX as f64,
            SampleFormat::S64 => i64::MAX as f64,
            SampleFormat::Float | SampleFormat::Double | SampleFormat::Complex => 1.0,
        }
    }
}

impl TryFrom<u32> for SampleFormat {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            FORMAT_S8 => Ok(SampleFormat::S8),
            FORMAT_S16 => Ok(SampleFormat::S16),
            FORMAT_S24 => Ok(SampleFormat::S24),
            FORMAT_S32 => Ok(SampleFormat::S32),
            FORMAT_S64 => Ok(SampleFormat::S64),
            FORMAT_FLOAT => Ok(SampleFormat::Float),
            FORMAT_DOUBLE => Ok(SampleFormat::Double),
            FORMAT_COMPLEX => Ok(SampleFormat::Complex),
            other => Err(Error::UnsupportedFormat(other)),
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        for format in SampleFormat::ALL {
            assert_eq!(SampleFormat::try_from(format.raw()).unwrap(), format);
        }
    }

    #[test]
    fn test_unknown_raw_is_unsupported() {
        let err = SampleFormat::try_from(0x7).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(0x7)));
    }

    #[test]
    fn test_index_matches_all() {
        for (i, format) in SampleFormat::ALL.iter().enumerate() {
            assert_eq!(format.index(), i);
        }
    }
}

//! Per-format element access in normalized units.
//!
//! Every format reads to and writes from `f64` in the `[-1.0, 1.0]` range
//! (integer formats divide by their maximum magnitude). Writes into integer
//! formats round and clamp, so narrowing never wraps.

use num_complex::Complex64;

pub(crate) trait Lane {
    type Elem: Copy + Default;

    fn read(elem: Self::Elem) -> f64;

    fn write(value: f64) -> Self::Elem;

    /// `*elem += value`, saturating for integer formats.
    fn accumulate(elem: &mut Self::Elem, value: f64);

    /// `*elem *= gain`, saturating for integer formats.
    fn scale(elem: &mut Self::Elem, gain: f64);
}

macro_rules! int_lane {
    ($name:ident, $elem:ty, $min:expr, $max:expr) => {
        pub(crate) struct $name;

        impl $name {
            const MIN: f64 = $min as f64;
            const MAX: f64 = $max as f64;

            #[inline]
            fn clamp(raw: f64) -> $elem {
                raw.round().clamp(Self::MIN, Self::MAX) as $elem
            }
        }

        impl Lane for $name {
            type Elem = $elem;

            #[inline]
            fn read(elem: $elem) -> f64 {
                elem as f64 / Self::MAX
            }

            #[inline]
            fn write(value: f64) -> $elem {
                Self::clamp(value * Self::MAX)
            }

            #[inline]
            fn accumulate(elem: &mut $elem, value: f64) {
                *elem = Self::clamp(*elem as f64 + value * Self::MAX);
            }

            #[inline]
            fn scale(elem: &mut $elem, gain: f64) {
                *elem = Self::clamp(*elem as f64 * gain);
            }
        }
    };
}

int_lane!(S8Lane, i8, i8::MIN, i8::MAX);
int_lane!(S16Lane, i16, i16::MIN, i16::MAX);
int_lane!(S24Lane, i32, -8_388_608i32, 8_388_607i32);
int_lane!(S32Lane, i32, i32::MIN, i32::MAX);
int_lane!(S64Lane, i64, i64::MIN, i64::MAX);

pub(crate) struct FloatLane;

impl Lane for FloatLane {
    type Elem = f32;

    #[inline]
    fn read(elem: f32) -> f64 {
        elem as f64
    }

    #[inline]
    fn write(value: f64) -> f32 {
        value as f32
    }

    #[inline]
    fn accumulate(elem: &mut f32, value: f64) {
        *elem += value as f32;
    }

    #[inline]
    fn scale(elem: &mut f32, gain: f64) {
        *elem = (*elem as f64 * gain) as f32;
    }
}

pub(crate) struct DoubleLane;

impl Lane for DoubleLane {
    type Elem = f64;

    #[inline]
    fn read(elem: f64) -> f64 {
        elem
    }

    #[inline]
    fn write(value: f64) -> f64 {
        value
    }

    #[inline]
    fn accumulate(elem: &mut f64, value: f64) {
        *elem += value;
    }

    #[inline]
    fn scale(elem: &mut f64, gain: f64) {
        *elem *= gain;
    }
}

pub(crate) struct ComplexLane;

impl Lane for ComplexLane {
    type Elem = Complex64;

    #[inline]
    fn read(elem: Complex64) -> f64 {
        elem.re
    }

    #[inline]
    fn write(value: f64) -> Complex64 {
        Complex64::new(value, 0.0)
    }

    #[inline]
    fn accumulate(elem: &mut Complex64, value: f64) {
        elem.re += value;
    }

    #[inline]
    fn scale(elem: &mut Complex64, gain: f64) {
        *elem *= gain;
    }
}

/// Bind the typed storage of a [`SampleBuffer`](super::SampleBuffer) and its
/// lane type, then evaluate `$body`.
macro_rules! with_lane {
    ($buffer:expr, |$data:ident, $lane:ident| $body:expr) => {
        match $buffer {
            $crate::buffer::SampleBuffer::S8($data) => {
                type $lane = $crate::buffer::lane::S8Lane;
                $body
            }
            $crate::buffer::SampleBuffer::S16($data) => {
                type $lane = $crate::buffer::lane::S16Lane;
                $body
            }
            $crate::buffer::SampleBuffer::S24($data) => {
                type $lane = $crate::buffer::lane::S24Lane;
                $body
            }
            $crate::buffer::SampleBuffer::S32($data) => {
                type $lane = $crate::buffer::lane::S32Lane;
                $body
            }
            $crate::buffer::SampleBuffer::S64($data) => {
                type $lane = $crate::buffer::lane::S64Lane;
                $body
            }
            $crate::buffer::SampleBuffer::Float($data) => {
                type $lane = $crate::buffer::lane::FloatLane;
                $body
            }
            $crate::buffer::SampleBuffer::Double($data) => {
                type $lane = $crate::buffer::lane::DoubleLane;
                $body
            }
            $crate::buffer::SampleBuffer::Complex($data) => {
                type $lane = $crate::buffer::lane::ComplexLane;
                $body
            }
        }
    };
}

pub(crate) use with_lane;

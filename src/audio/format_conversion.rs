// Format conversion between sample words and normalized f64
//
// Every soundcard format has its own pair of conversion routines:
// - s8/s16/s24/s32/s64: full-scale signed integers, rounded and clamped
// - float/double: -1.0..1.0, no scaling
// - complex: amplitude carried as magnitude with phase 0 or PI
//
// All conversions are allocation-free and safe to call from the audio thread.

use num_complex::Complex;
use std::f64::consts::PI;

const S24_MAX: i32 = 8_388_607;
const S24_MIN: i32 = -8_388_608;

/// Convert normalized f64 to s8
///
/// Maps [-1.0, 1.0] to [-127, 127], clamping out-of-range input
#[inline]
pub fn f64_to_s8(sample: f64) -> i8 {
    (sample * 127.0).round().clamp(i8::MIN as f64, i8::MAX as f64) as i8
}

/// Convert normalized f64 to s16
#[inline]
pub fn f64_to_s16(sample: f64) -> i16 {
    (sample * 32767.0)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Convert normalized f64 to s24 (stored in an i32 word)
#[inline]
pub fn f64_to_s24(sample: f64) -> i32 {
    (sample * S24_MAX as f64)
        .round()
        .clamp(S24_MIN as f64, S24_MAX as f64) as i32
}

/// Convert normalized f64 to s32
#[inline]
pub fn f64_to_s32(sample: f64) -> i32 {
    // `as` saturates for out-of-range floats
    (sample * i32::MAX as f64).round() as i32
}

/// Convert normalized f64 to s64
#[inline]
pub fn f64_to_s64(sample: f64) -> i64 {
    (sample * i64::MAX as f64).round() as i64
}

/// Encode a signed amplitude as complex magnitude/phase
#[inline]
pub fn f64_to_complex(sample: f64) -> Complex<f64> {
    if sample >= 0.0 {
        Complex::from_polar(sample, 0.0)
    } else {
        Complex::from_polar(-sample, PI)
    }
}

#[inline]
pub fn s8_to_f64(sample: i8) -> f64 {
    sample as f64 / 127.0
}

#[inline]
pub fn s16_to_f64(sample: i16) -> f64 {
    sample as f64 / 32767.0
}

#[inline]
pub fn s24_to_f64(sample: i32) -> f64 {
    sample as f64 / S24_MAX as f64
}

#[inline]
pub fn s32_to_f64(sample: i32) -> f64 {
    sample as f64 / i32::MAX as f64
}

#[inline]
pub fn s64_to_f64(sample: i64) -> f64 {
    sample as f64 / i64::MAX as f64
}

/// Decode complex magnitude/phase back to a signed amplitude
#[inline]
pub fn complex_to_f64(sample: Complex<f64>) -> f64 {
    sample.re
}

/// Saturating add of two s24 words
#[inline]
pub fn add_s24(a: i32, b: i32) -> i32 {
    a.saturating_add(b).clamp(S24_MIN, S24_MAX)
}

/// Convert decoded wave samples to normalized f64
///
/// `bits` is the wave file's bit depth; integer input is right-aligned.
pub fn wave_int_to_f64(sample: i32, bits: u16) -> f64 {
    match bits {
        8 => sample as f64 / 127.0,
        16 => sample as f64 / 32767.0,
        24 => sample as f64 / S24_MAX as f64,
        _ => sample as f64 / i32::MAX as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_s16_extremes() {
        assert_eq!(f64_to_s16(1.0), 32767);
        assert_eq!(f64_to_s16(-1.0), -32767);
        assert_eq!(f64_to_s16(0.0), 0);
        // Clamped
        assert_eq!(f64_to_s16(2.0), i16::MAX);
        assert_eq!(f64_to_s16(-2.0), i16::MIN);
    }

    #[test]
    fn test_s24_stays_in_range() {
        assert_eq!(f64_to_s24(1.5), S24_MAX);
        assert_eq!(f64_to_s24(-1.5), S24_MIN);
        assert_eq!(add_s24(S24_MAX, 10), S24_MAX);
        assert_eq!(add_s24(-5, 7), 2);
    }

    #[test]
    fn test_integer_roundtrip_close() {
        let value = 0.25;
        assert!((s8_to_f64(f64_to_s8(value)) - value).abs() < 0.01);
        assert!((s16_to_f64(f64_to_s16(value)) - value).abs() < 1e-4);
        assert!((s32_to_f64(f64_to_s32(value)) - value).abs() < 1e-8);
        assert!((s64_to_f64(f64_to_s64(value)) - value).abs() < 1e-8);
    }

    #[test]
    fn test_complex_encodes_sign_as_phase() {
        let positive = f64_to_complex(0.5);
        assert!((positive.norm() - 0.5).abs() < EPSILON);
        assert!(positive.arg().abs() < EPSILON);

        let negative = f64_to_complex(-0.5);
        assert!((negative.norm() - 0.5).abs() < EPSILON);
        assert!((negative.arg().abs() - PI).abs() < EPSILON);
        assert!((complex_to_f64(negative) + 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_wave_int_to_f64() {
        assert!((wave_int_to_f64(32767, 16) - 1.0).abs() < EPSILON);
        assert!((wave_int_to_f64(-127, 8) + 1.0).abs() < EPSILON);
    }
}

// Sample buffers - one fixed-size buffer per format

use crate::audio::format::SoundcardFormat;
use crate::audio::format_conversion::*;
use num_complex::Complex;
use std::collections::TryReserveError;

/// A fixed-size buffer of sample words in one soundcard format
///
/// Buffers are allocated once (outside the tick) and then only mutated in
/// place. Mixing saturates at the format's full scale.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    S8(Vec<i8>),
    S16(Vec<i16>),
    S24(Vec<i32>),
    S32(Vec<i32>),
    S64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Complex(Vec<Complex<f64>>),
}

fn zeroed<T: Clone>(value: T, len: usize) -> Result<Vec<T>, TryReserveError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)?;
    data.resize(len, value);
    Ok(data)
}

impl SampleBuffer {
    /// Allocate a silent buffer, reporting allocation failure
    pub fn try_new(format: SoundcardFormat, len: usize) -> Result<Self, TryReserveError> {
        Ok(match format {
            SoundcardFormat::Signed8 => SampleBuffer::S8(zeroed(0, len)?),
            SoundcardFormat::Signed16 => SampleBuffer::S16(zeroed(0, len)?),
            SoundcardFormat::Signed24 => SampleBuffer::S24(zeroed(0, len)?),
            SoundcardFormat::Signed32 => SampleBuffer::S32(zeroed(0, len)?),
            SoundcardFormat::Signed64 => SampleBuffer::S64(zeroed(0, len)?),
            SoundcardFormat::Float => SampleBuffer::Float(zeroed(0.0, len)?),
            SoundcardFormat::Double => SampleBuffer::Double(zeroed(0.0, len)?),
            SoundcardFormat::Complex => {
                SampleBuffer::Complex(zeroed(Complex::new(0.0, 0.0), len)?)
            }
        })
    }

    pub fn format(&self) -> SoundcardFormat {
        match self {
            SampleBuffer::S8(_) => SoundcardFormat::Signed8,
            SampleBuffer::S16(_) => SoundcardFormat::Signed16,
            SampleBuffer::S24(_) => SoundcardFormat::Signed24,
            SampleBuffer::S32(_) => SoundcardFormat::Signed32,
            SampleBuffer::S64(_) => SoundcardFormat::Signed64,
            SampleBuffer::Float(_) => SoundcardFormat::Float,
            SampleBuffer::Double(_) => SoundcardFormat::Double,
            SampleBuffer::Complex(_) => SoundcardFormat::Complex,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::S8(data) => data.len(),
            SampleBuffer::S16(data) => data.len(),
            SampleBuffer::S24(data) => data.len(),
            SampleBuffer::S32(data) => data.len(),
            SampleBuffer::S64(data) => data.len(),
            SampleBuffer::Float(data) => data.len(),
            SampleBuffer::Double(data) => data.len(),
            SampleBuffer::Complex(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Silence the buffer without reallocating
    pub fn clear(&mut self) {
        match self {
            SampleBuffer::S8(data) => data.fill(0),
            SampleBuffer::S16(data) => data.fill(0),
            SampleBuffer::S24(data) => data.fill(0),
            SampleBuffer::S32(data) => data.fill(0),
            SampleBuffer::S64(data) => data.fill(0),
            SampleBuffer::Float(data) => data.fill(0.0),
            SampleBuffer::Double(data) => data.fill(0.0),
            SampleBuffer::Complex(data) => data.fill(Complex::new(0.0, 0.0)),
        }
    }

    /// Read sample `index` as a normalized value, 0.0 when out of range
    pub fn get(&self, index: usize) -> f64 {
        match self {
            SampleBuffer::S8(data) => data.get(index).map_or(0.0, |s| s8_to_f64(*s)),
            SampleBuffer::S16(data) => data.get(index).map_or(0.0, |s| s16_to_f64(*s)),
            SampleBuffer::S24(data) => data.get(index).map_or(0.0, |s| s24_to_f64(*s)),
            SampleBuffer::S32(data) => data.get(index).map_or(0.0, |s| s32_to_f64(*s)),
            SampleBuffer::S64(data) => data.get(index).map_or(0.0, |s| s64_to_f64(*s)),
            SampleBuffer::Float(data) => data.get(index).map_or(0.0, |s| *s as f64),
            SampleBuffer::Double(data) => data.get(index).copied().unwrap_or(0.0),
            SampleBuffer::Complex(data) => data.get(index).map_or(0.0, |s| complex_to_f64(*s)),
        }
    }

    /// Overwrite sample `index` with a normalized value; out of range is ignored
    pub fn set(&mut self, index: usize, value: f64) {
        if index >= self.len() {
            return;
        }

        match self {
            SampleBuffer::S8(data) => data[index] = f64_to_s8(value),
            SampleBuffer::S16(data) => data[index] = f64_to_s16(value),
            SampleBuffer::S24(data) => data[index] = f64_to_s24(value),
            SampleBuffer::S32(data) => data[index] = f64_to_s32(value),
            SampleBuffer::S64(data) => data[index] = f64_to_s64(value),
            SampleBuffer::Float(data) => data[index] = value as f32,
            SampleBuffer::Double(data) => data[index] = value,
            SampleBuffer::Complex(data) => data[index] = f64_to_complex(value),
        }
    }

    /// Mix `count` samples of `source` into `self`
    ///
    /// Same-format buffers add word by word with saturation; mixed formats
    /// go through the normalized representation. Ranges are clipped to both
    /// buffers' lengths.
    pub fn mix_from(
        &mut self,
        source: &SampleBuffer,
        dst_offset: usize,
        src_offset: usize,
        count: usize,
    ) {
        let count = count
            .min(self.len().saturating_sub(dst_offset))
            .min(source.len().saturating_sub(src_offset));

        if count == 0 {
            return;
        }

        let dst_range = dst_offset..dst_offset + count;
        let src_range = src_offset..src_offset + count;

        match (self, source) {
            (SampleBuffer::S8(dst), SampleBuffer::S8(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d = d.saturating_add(*s);
                }
            }
            (SampleBuffer::S16(dst), SampleBuffer::S16(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d = d.saturating_add(*s);
                }
            }
            (SampleBuffer::S24(dst), SampleBuffer::S24(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d = add_s24(*d, *s);
                }
            }
            (SampleBuffer::S32(dst), SampleBuffer::S32(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d = d.saturating_add(*s);
                }
            }
            (SampleBuffer::S64(dst), SampleBuffer::S64(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d = d.saturating_add(*s);
                }
            }
            (SampleBuffer::Float(dst), SampleBuffer::Float(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d += *s;
                }
            }
            (SampleBuffer::Double(dst), SampleBuffer::Double(src)) => {
                for (d, s) in dst[dst_range].iter_mut().zip(&src[src_range]) {
                    *d += *s;
                }
            }
            (dst, src) => {
                for i in 0..count {
                    let mixed = dst.get(dst_offset + i) + src.get(src_offset + i);
                    dst.set(dst_offset + i, mixed);
                }
            }
        }
    }

    /// Overwrite `count` samples of `self` with `source`, converting if needed
    pub fn copy_from(
        &mut self,
        source: &SampleBuffer,
        dst_offset: usize,
        src_offset: usize,
        count: usize,
    ) {
        let count = count
            .min(self.len().saturating_sub(dst_offset))
            .min(source.len().saturating_sub(src_offset));

        if count == 0 {
            return;
        }

        let dst_range = dst_offset..dst_offset + count;
        let src_range = src_offset..src_offset + count;

        match (self, source) {
            (SampleBuffer::S8(dst), SampleBuffer::S8(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::S16(dst), SampleBuffer::S16(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::S24(dst), SampleBuffer::S24(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::S32(dst), SampleBuffer::S32(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::S64(dst), SampleBuffer::S64(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::Float(dst), SampleBuffer::Float(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::Double(dst), SampleBuffer::Double(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (SampleBuffer::Complex(dst), SampleBuffer::Complex(src)) => {
                dst[dst_range].copy_from_slice(&src[src_range])
            }
            (dst, src) => {
                for i in 0..count {
                    dst.set(dst_offset + i, src.get(src_offset + i));
                }
            }
        }
    }

    /// Count sign changes between consecutive samples
    pub fn zero_crossings(&self) -> usize {
        let mut count = 0;
        let mut previous: Option<bool> = None;

        for i in 0..self.len() {
            let value = self.get(i);
            if value == 0.0 {
                continue;
            }

            let positive = value > 0.0;
            if previous.is_some_and(|p| p != positive) {
                count += 1;
            }
            previous = Some(positive);
        }

        count
    }
}

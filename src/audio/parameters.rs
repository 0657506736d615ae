// Atomic floats - port storage readable from the audio thread without locks
//
// Values are kept as their bit patterns in atomic integers. Sharing is done
// one level up, by the Arc around the port.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_default_is_zero() {
        assert_eq!(AtomicF32::default().get(), 0.0);
        assert_eq!(AtomicF64::default().get(), 0.0);
    }

    #[test]
    fn test_negative_zero_and_nan_bits() {
        let value = AtomicF32::new(-0.0);
        assert!(value.get().is_sign_negative());

        value.set(f32::NAN);
        assert!(value.get().is_nan());
    }

    #[test]
    fn test_f64_written_from_other_thread() {
        let bpm = Arc::new(AtomicF64::new(120.0));
        let writer = Arc::clone(&bpm);

        thread::spawn(move || writer.set(140.5))
            .join()
            .unwrap();

        assert_eq!(bpm.get(), 140.5);
    }
}

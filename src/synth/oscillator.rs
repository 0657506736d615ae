// Oscillateurs - Waveform primitives evaluated at a phase position

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Waveform generated by the synth utilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveformType {
    Sine,
    Sawtooth,
    Triangle,
    Square,
    Impulse,
}

impl Default for WaveformType {
    fn default() -> Self {
        WaveformType::Sine
    }
}

/// Impulse threshold: the wave is high while sin(2 PI p) >= sin(2 PI 3/5)
const IMPULSE_FACTOR: f64 = 3.0 / 5.0;

impl WaveformType {
    /// Evaluate the waveform at `phase`, measured in cycles
    ///
    /// Only the fractional part of `phase` matters. The result is in [-1, 1].
    pub fn value_at(self, phase: f64) -> f64 {
        let p = phase.rem_euclid(1.0);

        match self {
            WaveformType::Sine => (p * 2.0 * PI).sin(),
            WaveformType::Sawtooth => (p * 2.0) - 1.0,
            WaveformType::Triangle => {
                if p < 0.5 {
                    (p * 4.0) - 1.0
                } else {
                    3.0 - (p * 4.0)
                }
            }
            WaveformType::Square => {
                if (p * 2.0 * PI).sin() >= 0.0 { 1.0 } else { -1.0 }
            }
            WaveformType::Impulse => {
                if (p * 2.0 * PI).sin() >= (2.0 * PI * IMPULSE_FACTOR).sin() {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaveformType::Sine => "sine",
            WaveformType::Sawtooth => "sawtooth",
            WaveformType::Triangle => "triangle",
            WaveformType::Square => "square",
            WaveformType::Impulse => "impulse",
        }
    }
}

// Module synth - Waveform generation for AudioSignal templates

pub mod oscillator;
pub mod seq_synth_util;

pub use oscillator::WaveformType;
pub use seq_synth_util::{SeqSynthUtil, StepSequence, Vibrato};

// Step-sequenced synth utility
//
// Fills a sample buffer with an oscillator waveform whose tuning and volume
// are modulated by two 8-step sequencers, plus an optional vibrato stage.
// The struct keeps `offset` and `vibrato_lfo_offset` between calls so that
// consecutive buffers continue the same waveform without phase jumps.
//
// Samples are added to the buffer, not overwritten.

use crate::audio::buffer::SampleBuffer;
use crate::audio::format_conversion::{add_s24, f64_to_complex};
use crate::synth::oscillator::WaveformType;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of slots in a step sequence
pub const SEQ_STEPS: usize = 8;

pub const DEFAULT_VIBRATO_GAIN: f64 = 1.0;
pub const DEFAULT_VIBRATO_LFO_DEPTH: f64 = 1.0;
pub const DEFAULT_VIBRATO_LFO_FREQ: f64 = 8.172;
pub const DEFAULT_VIBRATO_TUNING: f64 = 0.0;

const S24_MAX: f64 = 8_388_607.0;
const S24_MIN: f64 = -8_388_608.0;

/// Frequency of the note `semitones` away from A4 (440 Hz)
pub fn note_frequency(semitones: f64) -> f64 {
    440.0 * 2f64.powf(semitones / 12.0)
}

/// An 8-slot step sequencer driving tuning or volume
///
/// The active slot is `floor(lfo_frequency * elapsed) mod 8`. In ping-pong
/// mode every odd pass runs backwards (7 down to 0) instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSequence {
    pub steps: [f64; SEQ_STEPS],
    pub pingpong: bool,
    pub lfo_frequency: f64,
}

impl StepSequence {
    /// All slots set to `value`, no ping-pong, frozen on slot 0
    pub fn constant(value: f64) -> Self {
        Self {
            steps: [value; SEQ_STEPS],
            pingpong: false,
            lfo_frequency: 0.0,
        }
    }

    /// Slot active after `elapsed` seconds
    pub fn slot_at(&self, elapsed: f64) -> usize {
        let ticks = (self.lfo_frequency * elapsed).floor();
        if !ticks.is_finite() || ticks < 0.0 {
            return 0;
        }

        let ticks = ticks as u64;
        let position = (ticks % SEQ_STEPS as u64) as usize;
        let pass = ticks / SEQ_STEPS as u64;

        if self.pingpong && pass % 2 == 1 {
            SEQ_STEPS - 1 - position
        } else {
            position
        }
    }

    pub fn value_at(&self, elapsed: f64) -> f64 {
        self.steps[self.slot_at(elapsed)]
    }
}

/// Vibrato stage applied on top of the sequenced tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vibrato {
    pub enabled: bool,
    pub gain: f64,
    pub lfo_depth: f64,
    pub lfo_freq: f64,
    /// Detune of the vibrato LFO itself, in cents
    pub tuning: f64,
}

impl Vibrato {
    /// Pitch deviation in cents at vibrato LFO position `lfo_offset` (frames)
    pub fn cents(&self, lfo_offset: f64, samplerate: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }

        let lfo_freq = self.lfo_freq * 2f64.powf(self.tuning / 1200.0);
        100.0 * self.gain * (lfo_offset * 2.0 * PI * lfo_freq / samplerate).sin() * self.lfo_depth
    }
}

impl Default for Vibrato {
    fn default() -> Self {
        Self {
            enabled: false,
            gain: DEFAULT_VIBRATO_GAIN,
            lfo_depth: DEFAULT_VIBRATO_LFO_DEPTH,
            lfo_freq: DEFAULT_VIBRATO_LFO_FREQ,
            tuning: DEFAULT_VIBRATO_TUNING,
        }
    }
}

/// Oscillator state and parameters for filling sample buffers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqSynthUtil {
    /// Distance between written samples in the buffer (interleaving)
    pub source_stride: usize,
    /// Frames to write per call
    pub buffer_length: usize,
    pub samplerate: u32,

    pub oscillator: WaveformType,
    pub frequency: f64,
    /// Phase shift in frames
    pub phase: f64,
    pub volume: f64,
    /// Base detune in cents
    pub tuning: f64,

    pub seq_tuning: StepSequence,
    pub seq_volume: StepSequence,

    pub vibrato: Vibrato,
    pub vibrato_lfo_offset: u64,

    /// Total frames to generate, 0 for unlimited
    pub frame_count: u64,
    /// Frames generated so far
    pub offset: u64,

    /// Start writing `offset_256th` frames into the buffer
    pub note_256th_mode: bool,
    pub offset_256th: usize,
}

impl SeqSynthUtil {
    pub fn new(samplerate: u32, buffer_length: usize) -> Self {
        Self {
            source_stride: 1,
            buffer_length,
            samplerate,
            oscillator: WaveformType::Sine,
            frequency: 440.0,
            phase: 0.0,
            volume: 1.0,
            tuning: 0.0,
            seq_tuning: StepSequence::constant(0.0),
            seq_volume: StepSequence::constant(1.0),
            vibrato: Vibrato::default(),
            vibrato_lfo_offset: 0,
            frame_count: 0,
            offset: 0,
            note_256th_mode: false,
            offset_256th: 0,
        }
    }

    /// Restart the waveform from frame 0
    pub fn reset(&mut self) {
        self.offset = 0;
        self.vibrato_lfo_offset = 0;
    }

    /// Whether `frame_count` frames have been generated
    pub fn is_finished(&self) -> bool {
        self.frame_count > 0 && self.offset >= self.frame_count
    }

    pub fn compute_sin(&mut self, source: &mut SampleBuffer) {
        self.compute_waveform(WaveformType::Sine, source);
    }

    pub fn compute_sawtooth(&mut self, source: &mut SampleBuffer) {
        self.compute_waveform(WaveformType::Sawtooth, source);
    }

    pub fn compute_triangle(&mut self, source: &mut SampleBuffer) {
        self.compute_waveform(WaveformType::Triangle, source);
    }

    pub fn compute_square(&mut self, source: &mut SampleBuffer) {
        self.compute_waveform(WaveformType::Square, source);
    }

    pub fn compute_impulse(&mut self, source: &mut SampleBuffer) {
        self.compute_waveform(WaveformType::Impulse, source);
    }

    /// Fill `source` with the configured `oscillator`
    pub fn compute(&mut self, source: &mut SampleBuffer) {
        let waveform = self.oscillator;
        self.compute_waveform(waveform, source);
    }

    fn compute_waveform(&mut self, waveform: WaveformType, source: &mut SampleBuffer) {
        let written = match source {
            SampleBuffer::S8(data) => self.fill_s8(waveform, data),
            SampleBuffer::S16(data) => self.fill_s16(waveform, data),
            SampleBuffer::S24(data) => self.fill_s24(waveform, data),
            SampleBuffer::S32(data) => self.fill_s32(waveform, data),
            SampleBuffer::S64(data) => self.fill_s64(waveform, data),
            SampleBuffer::Float(data) => self.fill_float(waveform, data),
            SampleBuffer::Double(data) => self.fill_double(waveform, data),
            SampleBuffer::Complex(data) => self.fill_complex(waveform, data),
        };

        self.offset += written;
        self.vibrato_lfo_offset += written;
    }

    /// Count zero crossings among the frames this util writes
    pub fn xcross_count(&self, source: &SampleBuffer) -> usize {
        let stride = self.source_stride.max(1);
        let mut count = 0;
        let mut previous: Option<bool> = None;

        for i in 0..self.buffer_length {
            let index = i * stride;
            if index >= source.len() {
                break;
            }

            let value = source.get(index);
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

    /// Normalized sample at absolute frame `frame`
    fn sample_at(&self, waveform: WaveformType, frame: u64, vibrato_frame: u64) -> f64 {
        let samplerate = self.samplerate as f64;
        let elapsed = frame as f64 / samplerate;

        let cents = self.tuning
            + self.seq_tuning.value_at(elapsed)
            + self.vibrato.cents(vibrato_frame as f64, samplerate);
        let frequency = self.frequency * 2f64.powf(cents / 1200.0);
        let amplitude = self.volume * self.seq_volume.value_at(elapsed);

        waveform.value_at((frame as f64 + self.phase) * frequency / samplerate) * amplitude
    }

    /// Walk the frames due this call, handing (buffer index, sample) to `write`
    ///
    /// Returns the number of frames generated.
    fn render<F>(&self, waveform: WaveformType, len: usize, mut write: F) -> u64
    where
        F: FnMut(usize, f64),
    {
        if self.samplerate == 0 {
            return 0;
        }

        let stride = self.source_stride.max(1);
        let start = if self.note_256th_mode {
            self.offset_256th.min(self.buffer_length)
        } else {
            0
        };

        let mut written = 0;
        for i in start..self.buffer_length {
            let frame = self.offset + written;
            if self.frame_count > 0 && frame >= self.frame_count {
                break;
            }

            let index = i * stride;
            if index >= len {
                break;
            }

            let y = self.sample_at(waveform, frame, self.vibrato_lfo_offset + written);
            write(index, y);
            written += 1;
        }

        written
    }

    fn fill_s8(&self, waveform: WaveformType, data: &mut [i8]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            let value = data[index] as f64 + (y * 127.0).round();
            data[index] = value.clamp(i8::MIN as f64, i8::MAX as f64) as i8;
        })
    }

    fn fill_s16(&self, waveform: WaveformType, data: &mut [i16]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            let value = data[index] as f64 + (y * 32767.0).round();
            data[index] = value.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        })
    }

    fn fill_s24(&self, waveform: WaveformType, data: &mut [i32]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            let value = (y * S24_MAX).round().clamp(S24_MIN, S24_MAX) as i32;
            data[index] = add_s24(data[index], value);
        })
    }

    fn fill_s32(&self, waveform: WaveformType, data: &mut [i32]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            let value = data[index] as f64 + (y * i32::MAX as f64).round();
            data[index] = value as i32;
        })
    }

    fn fill_s64(&self, waveform: WaveformType, data: &mut [i64]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            let value = (y * i64::MAX as f64).round() as i64;
            data[index] = data[index].saturating_add(value);
        })
    }

    fn fill_float(&self, waveform: WaveformType, data: &mut [f32]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            data[index] += y as f32;
        })
    }

    fn fill_double(&self, waveform: WaveformType, data: &mut [f64]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            data[index] += y;
        })
    }

    fn fill_complex(&self, waveform: WaveformType, data: &mut [Complex<f64>]) -> u64 {
        let len = data.len();
        self.render(waveform, len, |index, y| {
            let mixed = data[index].re + f64_to_complex(y).re;
            data[index] = f64_to_complex(mixed);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SoundcardFormat;

    const SAMPLERATE: u32 = 44100;
    const EPSILON: f64 = 1e-6;

    fn s16_buffer(len: usize) -> SampleBuffer {
        SampleBuffer::try_new(SoundcardFormat::Signed16, len).unwrap()
    }

    #[test]
    fn test_sine_440_s16_zero_crossing() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 256);
        let mut buffer = s16_buffer(256);

        util.compute_sin(&mut buffer);

        let SampleBuffer::S16(data) = &buffer else {
            panic!("format changed");
        };

        assert_eq!(data[0], 0);
        // Half period is 44100 / 440 / 2 = 50.1 frames
        assert!(data[50] > 0);
        assert!(data[51] < 0);
        assert_eq!(data.iter().position(|s| *s < 0), Some(51));
        assert_eq!(util.offset, 256);
    }

    #[test]
    fn test_sine_peak_is_full_scale() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 512);
        let mut buffer = s16_buffer(512);
        util.compute_sin(&mut buffer);

        let SampleBuffer::S16(data) = &buffer else {
            panic!("format changed");
        };
        let peak = data.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 32700, "peak {}", peak);
    }

    #[test]
    fn test_offset_continues_waveform() {
        let mut whole = SeqSynthUtil::new(SAMPLERATE, 512);
        let mut reference = SampleBuffer::try_new(SoundcardFormat::Double, 512).unwrap();
        whole.compute_sin(&mut reference);

        let mut split = SeqSynthUtil::new(SAMPLERATE, 256);
        let mut first = SampleBuffer::try_new(SoundcardFormat::Double, 256).unwrap();
        let mut second = SampleBuffer::try_new(SoundcardFormat::Double, 256).unwrap();
        split.compute_sin(&mut first);
        split.compute_sin(&mut second);

        for i in 0..256 {
            assert!((reference.get(i) - first.get(i)).abs() < EPSILON);
            assert!((reference.get(256 + i) - second.get(i)).abs() < EPSILON);
        }
    }

    #[test]
    fn test_output_is_added() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 64);
        let mut buffer = SampleBuffer::Double(vec![0.5; 64]);
        util.compute_square(&mut buffer);

        // Square starts high
        assert!((buffer.get(0) - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_stride_and_frame_count() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 8);
        util.source_stride = 2;
        util.frame_count = 3;
        util.phase = 10.0;
        let mut buffer = SampleBuffer::try_new(SoundcardFormat::Double, 16).unwrap();

        util.compute_sawtooth(&mut buffer);

        assert_eq!(util.offset, 3);
        assert!(buffer.get(0) != 0.0);
        assert_eq!(buffer.get(1), 0.0);
        assert!(buffer.get(4) != 0.0);
        assert_eq!(buffer.get(6), 0.0);
        assert!(util.is_finished());
    }

    #[test]
    fn test_step_sequence_forward_and_pingpong() {
        let mut seq = StepSequence::constant(0.0);
        seq.lfo_frequency = 1.0;

        assert_eq!(seq.slot_at(0.5), 0);
        assert_eq!(seq.slot_at(3.2), 3);
        assert_eq!(seq.slot_at(9.0), 1);

        seq.pingpong = true;
        assert_eq!(seq.slot_at(3.2), 3);
        assert_eq!(seq.slot_at(8.0), 7);
        assert_eq!(seq.slot_at(9.0), 6);
        assert_eq!(seq.slot_at(16.0), 0);
    }

    #[test]
    fn test_seq_volume_mutes_slot() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 64);
        util.seq_volume.steps = [0.0; SEQ_STEPS];
        let mut buffer = s16_buffer(64);

        util.compute_sin(&mut buffer);

        assert_eq!(util.xcross_count(&buffer), 0);
        assert!((0..64).all(|i| buffer.get(i) == 0.0));
    }

    #[test]
    fn test_seq_tuning_octave_doubles_crossings() {
        let mut plain = SeqSynthUtil::new(SAMPLERATE, 4410);
        let mut plain_buffer = SampleBuffer::try_new(SoundcardFormat::Double, 4410).unwrap();
        plain.compute_sin(&mut plain_buffer);

        let mut octave = SeqSynthUtil::new(SAMPLERATE, 4410);
        octave.seq_tuning = StepSequence::constant(1200.0);
        let mut octave_buffer = SampleBuffer::try_new(SoundcardFormat::Double, 4410).unwrap();
        octave.compute_sin(&mut octave_buffer);

        let base = plain.xcross_count(&plain_buffer) as i64;
        let doubled = octave.xcross_count(&octave_buffer) as i64;
        assert!((doubled - 2 * base).abs() <= 2, "{} vs {}", doubled, base);
    }

    #[test]
    fn test_vibrato_changes_output_and_persists() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 1024);
        util.vibrato.enabled = true;
        util.vibrato.lfo_depth = 4.0;
        let mut buffer = SampleBuffer::try_new(SoundcardFormat::Double, 1024).unwrap();
        util.compute_sin(&mut buffer);

        let mut plain = SeqSynthUtil::new(SAMPLERATE, 1024);
        let mut plain_buffer = SampleBuffer::try_new(SoundcardFormat::Double, 1024).unwrap();
        plain.compute_sin(&mut plain_buffer);

        let differs = (0..1024).any(|i| (buffer.get(i) - plain_buffer.get(i)).abs() > 1e-3);
        assert!(differs);
        assert_eq!(util.vibrato_lfo_offset, 1024);
    }

    #[test]
    fn test_note_256th_offset_skips_head() {
        let mut util = SeqSynthUtil::new(SAMPLERATE, 32);
        util.note_256th_mode = true;
        util.offset_256th = 8;
        util.phase = 5.0;
        let mut buffer = SampleBuffer::try_new(SoundcardFormat::Float, 32).unwrap();

        util.compute_triangle(&mut buffer);

        assert!((0..8).all(|i| buffer.get(i) == 0.0));
        assert!(buffer.get(8) != 0.0);
        assert_eq!(util.offset, 24);
    }

    #[test]
    fn test_every_format_filled() {
        for format in SoundcardFormat::ALL {
            let mut util = SeqSynthUtil::new(SAMPLERATE, 128);
            let mut buffer = SampleBuffer::try_new(format, 128).unwrap();
            util.compute_sin(&mut buffer);

            assert!(buffer.get(0).abs() < 1e-3, "{}", format);
            assert!(buffer.get(25) > 0.9, "{} {}", format, buffer.get(25));
            assert!(util.xcross_count(&buffer) >= 2, "{}", format);
        }
    }

    #[test]
    fn test_note_frequency() {
        assert!((note_frequency(0.0) - 440.0).abs() < EPSILON);
        assert!((note_frequency(12.0) - 880.0).abs() < EPSILON);
    }
}

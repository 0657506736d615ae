// Soundcard - presets and the per-tick output mix

use crate::audio::buffer::SampleBuffer;
use crate::audio::format::Presets;
use std::collections::TryReserveError;

/// Output side of the graph: one mix buffer per PCM channel
#[derive(Debug, Clone)]
pub struct Soundcard {
    presets: Presets,
    output: Vec<SampleBuffer>,
    /// Ticks rendered so far
    tic_counter: u64,
}

impl Soundcard {
    pub fn new(presets: Presets) -> Result<Self, TryReserveError> {
        let mut soundcard = Self {
            presets,
            output: Vec::new(),
            tic_counter: 0,
        };
        soundcard.realloc(presets)?;
        Ok(soundcard)
    }

    pub fn presets(&self) -> &Presets {
        &self.presets
    }

    /// Apply new presets and reallocate the mix buffers
    pub fn realloc(&mut self, presets: Presets) -> Result<(), TryReserveError> {
        let mut output = Vec::new();
        output.try_reserve_exact(presets.pcm_channels)?;
        for _ in 0..presets.pcm_channels {
            output.push(SampleBuffer::try_new(presets.format, presets.buffer_size)?);
        }

        self.output = output;
        self.presets = presets;
        Ok(())
    }

    /// Silence every mix buffer, called at the start of a tick
    pub fn clear(&mut self) {
        for buffer in &mut self.output {
            buffer.clear();
        }
    }

    /// Mix `count` frames of `source` from `src_offset` into PCM channel
    /// `pcm_channel` at `dst_offset`
    pub fn mix(
        &mut self,
        pcm_channel: usize,
        source: &SampleBuffer,
        dst_offset: usize,
        src_offset: usize,
        count: usize,
    ) {
        let channels = self.output.len();
        if channels == 0 {
            return;
        }

        self.output[pcm_channel % channels].mix_from(source, dst_offset, src_offset, count);
    }

    pub fn output(&self, pcm_channel: usize) -> Option<&SampleBuffer> {
        self.output.get(pcm_channel)
    }

    pub fn pcm_channels(&self) -> usize {
        self.output.len()
    }

    /// Interleave the mix buffers as normalized frames
    pub fn interleaved(&self) -> Vec<f64> {
        let mut frames = Vec::with_capacity(self.presets.buffer_size * self.output.len());
        for i in 0..self.presets.buffer_size {
            for buffer in &self.output {
                frames.push(buffer.get(i));
            }
        }
        frames
    }

    pub fn tic_counter(&self) -> u64 {
        self.tic_counter
    }

    pub(crate) fn advance(&mut self) {
        self.tic_counter += 1;
    }

    /// Frames of one 16th note at `bpm`
    pub fn frames_per_16th(&self, bpm: f64) -> f64 {
        if bpm <= 0.0 {
            return 0.0;
        }
        self.presets.samplerate as f64 * 60.0 / bpm / 4.0
    }

    /// Whole ticks of one 16th note at `bpm`, at least one
    pub fn delay_ticks(&self, bpm: f64) -> u64 {
        let ticks = self.frames_per_16th(bpm) / self.presets.buffer_size.max(1) as f64;
        (ticks.floor() as u64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SoundcardFormat;

    const EPSILON: f64 = 1e-6;

    fn soundcard() -> Soundcard {
        Soundcard::new(Presets {
            samplerate: 44100,
            buffer_size: 8,
            format: SoundcardFormat::Double,
            pcm_channels: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_mix_and_clear() {
        let mut card = soundcard();
        let source = SampleBuffer::Double(vec![0.5; 8]);

        card.mix(1, &source, 2, 0, 6);
        card.mix(1, &source, 0, 0, 8);

        let out = card.output(1).unwrap();
        assert!((out.get(0) - 0.5).abs() < EPSILON);
        assert!((out.get(2) - 1.0).abs() < EPSILON);
        assert_eq!(card.output(0).unwrap().get(3), 0.0);

        card.clear();
        assert_eq!(card.output(1).unwrap().get(2), 0.0);
    }

    #[test]
    fn test_mix_from_source_offset() {
        let mut card = soundcard();
        let source = SampleBuffer::Double((0..8).map(|i| i as f64 / 10.0).collect());

        // Tail of the source into the head of the output
        card.mix(0, &source, 0, 5, 3);

        let out = card.output(0).unwrap();
        assert!((out.get(0) - 0.5).abs() < EPSILON);
        assert!((out.get(2) - 0.7).abs() < EPSILON);
        assert_eq!(out.get(3), 0.0);
    }

    #[test]
    fn test_delay_ticks() {
        let card = Soundcard::new(Presets::default()).unwrap();
        // 44100 * 60 / 120 / 4 = 5512.5 frames, 10.77 buffers of 512
        assert!((card.frames_per_16th(120.0) - 5512.5).abs() < EPSILON);
        assert_eq!(card.delay_ticks(120.0), 10);
        assert_eq!(card.delay_ticks(100_000.0), 1);
    }

    #[test]
    fn test_interleaved_layout() {
        let mut card = soundcard();
        card.mix(0, &SampleBuffer::Double(vec![0.25; 8]), 0, 0, 8);
        card.mix(1, &SampleBuffer::Double(vec![-0.25; 8]), 0, 0, 8);

        let frames = card.interleaved();
        assert_eq!(frames.len(), 16);
        assert!((frames[0] - 0.25).abs() < EPSILON);
        assert!((frames[1] + 0.25).abs() < EPSILON);
    }
}

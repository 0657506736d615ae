// AudioSignal - a stream of fixed-size sample buffers
//
// Templates are prototypes owned by their Recycling and never played.
// Instances are copied from a template per playback pass and tagged with the
// pass's RecallId.

use crate::audio::buffer::SampleBuffer;
use crate::audio::format::{Presets, SoundcardFormat};
use crate::graph::key::graph_key;
use crate::graph::recycling::RecyclingId;
use crate::recall::recall_id::RecallId;
use std::collections::TryReserveError;

graph_key!(
    /// Id of an AudioSignal in the graph
    SignalId,
    "audio-signal"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Template,
    Instance,
}

#[derive(Debug, Clone)]
pub struct AudioSignal {
    pub kind: SignalKind,
    pub recycling: Option<RecyclingId>,
    pub recall_id: Option<RecallId>,

    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SoundcardFormat,

    /// Number of buffers in the stream
    pub length: usize,
    pub first_frame: usize,
    pub last_frame: usize,
    pub loop_start: usize,
    pub loop_end: usize,

    pub delay: f64,
    /// Frame offset of the first buffer within the output buffer
    pub attack: usize,

    pub(crate) stream: Vec<SampleBuffer>,
    pub(crate) stream_cursor: usize,
}

impl AudioSignal {
    /// Allocate a silent signal of `length` buffers
    pub fn try_new(
        kind: SignalKind,
        samplerate: u32,
        buffer_size: usize,
        format: SoundcardFormat,
        length: usize,
    ) -> Result<Self, TryReserveError> {
        let mut stream = Vec::new();
        stream.try_reserve_exact(length)?;
        for _ in 0..length {
            stream.push(SampleBuffer::try_new(format, buffer_size)?);
        }

        Ok(Self {
            kind,
            recycling: None,
            recall_id: None,
            samplerate,
            buffer_size,
            format,
            length,
            first_frame: 0,
            last_frame: 0,
            loop_start: 0,
            loop_end: 0,
            delay: 0.0,
            attack: 0,
            stream,
            stream_cursor: 0,
        })
    }

    /// Single silent buffer using the soundcard presets
    pub fn template(presets: &Presets) -> Result<Self, TryReserveError> {
        Self::try_new(
            SignalKind::Template,
            presets.samplerate,
            presets.buffer_size,
            presets.format,
            1,
        )
    }

    pub fn is_template(&self) -> bool {
        self.kind == SignalKind::Template
    }

    pub fn stream(&self) -> &[SampleBuffer] {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut [SampleBuffer] {
        &mut self.stream
    }

    pub fn stream_cursor(&self) -> usize {
        self.stream_cursor
    }

    /// Reset playback to the first buffer
    pub fn rewind(&mut self) {
        self.stream_cursor = 0;
    }

    /// Buffer the cursor points at, if any
    pub fn current_buffer(&self) -> Option<&SampleBuffer> {
        self.stream.get(self.stream_cursor)
    }

    /// Frames of audible content
    pub fn frame_count(&self) -> usize {
        if self.length == 0 {
            0
        } else {
            self.last_frame + 1
        }
    }

    /// Normalized sample at absolute frame `frame`
    pub fn frame(&self, frame: usize) -> f64 {
        if self.buffer_size == 0 {
            return 0.0;
        }

        self.stream
            .get(frame / self.buffer_size)
            .map_or(0.0, |buffer| buffer.get(frame % self.buffer_size))
    }

    /// Resize the stream to `length` buffers, keeping existing content
    pub fn realloc_stream(&mut self, length: usize) -> Result<(), TryReserveError> {
        if length > self.stream.len() {
            self.stream.try_reserve_exact(length - self.stream.len())?;
            while self.stream.len() < length {
                self.stream
                    .push(SampleBuffer::try_new(self.format, self.buffer_size)?);
            }
        } else {
            self.stream.truncate(length);
        }

        self.length = length;
        self.stream_cursor = self.stream_cursor.min(length);
        Ok(())
    }

    /// Replace content with `frames` normalized samples
    ///
    /// Used to load decoded files and rendered waveforms into templates.
    pub fn write_frames(&mut self, frames: &[f64]) -> Result<(), TryReserveError> {
        let buffer_size = self.buffer_size.max(1);
        let length = frames.len().div_ceil(buffer_size).max(1);

        self.realloc_stream(length)?;
        for buffer in &mut self.stream {
            buffer.clear();
        }

        for (frame, value) in frames.iter().enumerate() {
            self.stream[frame / buffer_size].set(frame % buffer_size, *value);
        }

        self.first_frame = 0;
        self.last_frame = frames.len().saturating_sub(1);
        self.loop_start = 0;
        self.loop_end = frames.len();
        Ok(())
    }

    /// Convert stream to another buffer size/format, keeping frame content
    pub fn convert(&mut self, presets: &Presets) -> Result<(), TryReserveError> {
        let frames: Vec<f64> = (0..self.frame_count()).map(|f| self.frame(f)).collect();

        self.samplerate = presets.samplerate;
        self.buffer_size = presets.buffer_size;
        self.format = presets.format;
        self.stream.clear();
        self.length = 0;

        let (loop_start, loop_end) = (self.loop_start, self.loop_end);
        self.write_frames(&frames)?;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-4;

    fn presets() -> Presets {
        Presets {
            samplerate: 44100,
            buffer_size: 4,
            format: SoundcardFormat::Double,
            pcm_channels: 2,
        }
    }

    #[test]
    fn test_template_defaults() {
        let signal = AudioSignal::template(&presets()).unwrap();

        assert!(signal.is_template());
        assert_eq!(signal.length, 1);
        assert_eq!(signal.stream().len(), 1);
        assert_eq!(signal.stream()[0].len(), 4);
    }

    #[test]
    fn test_write_frames_spans_buffers() {
        let mut signal = AudioSignal::template(&presets()).unwrap();
        let frames: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();

        signal.write_frames(&frames).unwrap();

        assert_eq!(signal.length, 3);
        assert_eq!(signal.last_frame, 9);
        assert_eq!(signal.frame_count(), 10);
        assert!((signal.frame(7) - 0.7).abs() < EPSILON);
        assert_eq!(signal.frame(11), 0.0);
    }

    #[test]
    fn test_convert_keeps_content() {
        let mut signal = AudioSignal::template(&presets()).unwrap();
        signal.write_frames(&[0.5, -0.5, 0.25, 0.0, 1.0]).unwrap();

        let target = Presets {
            buffer_size: 2,
            format: SoundcardFormat::Signed16,
            ..presets()
        };
        signal.convert(&target).unwrap();

        assert_eq!(signal.format, SoundcardFormat::Signed16);
        assert_eq!(signal.length, 3);
        assert!((signal.frame(1) + 0.5).abs() < EPSILON);
        assert!((signal.frame(4) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_rewind_and_cursor() {
        let mut signal = AudioSignal::try_new(
            SignalKind::Instance,
            44100,
            4,
            SoundcardFormat::Float,
            2,
        )
        .unwrap();

        signal.stream_cursor = 2;
        assert!(signal.current_buffer().is_none());

        signal.rewind();
        assert_eq!(signal.stream_cursor(), 0);
        assert!(signal.current_buffer().is_some());
    }
}

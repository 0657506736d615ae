// Import tasks - load decoded audio into recycling templates
//
// Each task writes frames into the template signals of input channels; new
// playback passes copy those templates into their signals.

use crate::audio::buffer::SampleBuffer;
use crate::audio::format::SoundcardFormat;
use crate::audio::format_conversion::wave_int_to_f64;
use crate::graph::{AudioId, Graph, GraphError};
use crate::synth::seq_synth_util::{SeqSynthUtil, note_frequency};
use crate::task::trait_def::{LaunchGuard, Task, TaskError, TaskResult};
use hound::{SampleFormat, WavReader};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Frames of every channel of a decoded file
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedWave {
    pub samplerate: u32,
    pub channels: Vec<Vec<f64>>,
}

impl DecodedWave {
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Decode a WAV file into normalized per-channel frames
pub fn decode_wave(path: &Path) -> TaskResult<DecodedWave> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channel_count = usize::from(spec.channels.max(1));

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| wave_int_to_f64(v, spec.bits_per_sample)))
            .collect::<Result<_, _>>()?,
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for (i, sample) in interleaved.into_iter().enumerate() {
        channels[i % channel_count].push(sample);
    }

    Ok(DecodedWave {
        samplerate: spec.sample_rate,
        channels,
    })
}

/// Write `frames` into the template of every recycling of one input channel
fn write_pad_template(
    graph: &mut Graph,
    audio: AudioId,
    pad: usize,
    audio_channel: usize,
    frames: &[f64],
) -> TaskResult<()> {
    let channel = graph
        .input_channel(audio, pad, audio_channel)?
        .ok_or_else(|| {
            TaskError::InvalidArgument(format!(
                "{} has no input pad {} channel {}",
                audio, pad, audio_channel
            ))
        })?;

    for recycling in graph.channel_recyclings(channel)? {
        let template = graph.recycling_template(recycling)?;
        graph
            .signal_mut(template)?
            .write_frames(frames)
            .map_err(GraphError::from)?;
    }
    Ok(())
}

/// Load one WAV file into an input pad
///
/// File channels map onto audio channels in order; a mono file feeds every
/// audio channel.
pub struct OpenSingleFile {
    path: PathBuf,
    audio: AudioId,
    pad: usize,
    guard: LaunchGuard,
}

impl OpenSingleFile {
    pub fn new(path: impl Into<PathBuf>, audio: AudioId, pad: usize) -> Self {
        Self {
            path: path.into(),
            audio,
            pad,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for OpenSingleFile {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("open-single-file")?;

        let wave = decode_wave(&self.path)?;
        if wave.samplerate != graph.presets().samplerate {
            warn!(
                "{} is {} Hz, soundcard runs at {} Hz; played unresampled",
                self.path.display(),
                wave.samplerate,
                graph.presets().samplerate
            );
        }

        let audio_channels = graph.audio(self.audio)?.audio_channels;
        for audio_channel in 0..audio_channels {
            let frames = &wave.channels[audio_channel % wave.channels.len()];
            write_pad_template(graph, self.audio, self.pad, audio_channel, frames)?;
        }

        info!(
            "opened {} ({} frames) into pad {} of {}",
            self.path.display(),
            wave.frame_count(),
            self.pad,
            self.audio
        );
        Ok(())
    }

    fn description(&self) -> String {
        format!("Open {}", self.path.display())
    }
}

/// Source of per-key sample data of an instrument
///
/// Implementations sit on top of an SF2 (or similar) parser and hand out
/// already decoded, normalized frames.
pub trait InstrumentDecoder: Send {
    fn name(&self) -> &str;

    /// Frames of `key`, or `None` when the instrument has no sample there
    fn decode_key(&mut self, key: usize) -> TaskResult<Option<Vec<f64>>>;
}

/// Instrument held in memory, keyed by pad
#[derive(Debug, Clone, Default)]
pub struct MemoryInstrument {
    name: String,
    keys: BTreeMap<usize, Vec<f64>>,
}

impl MemoryInstrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: usize, frames: Vec<f64>) -> Self {
        self.keys.insert(key, frames);
        self
    }
}

impl InstrumentDecoder for MemoryInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode_key(&mut self, key: usize) -> TaskResult<Option<Vec<f64>>> {
        Ok(self.keys.get(&key).cloned())
    }
}

/// Load an instrument's samples into the input pads of an audio, one key
/// per pad
pub struct OpenSf2Instrument {
    audio: AudioId,
    decoder: Box<dyn InstrumentDecoder>,
    guard: LaunchGuard,
}

impl OpenSf2Instrument {
    pub fn new(audio: AudioId, decoder: Box<dyn InstrumentDecoder>) -> Self {
        Self {
            audio,
            decoder,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for OpenSf2Instrument {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("open-sf2-instrument")?;

        let (input_pads, audio_channels) = {
            let entry = graph.audio(self.audio)?;
            (entry.input_pads, entry.audio_channels)
        };

        let mut loaded = 0;
        for pad in 0..input_pads {
            let Some(frames) = self.decoder.decode_key(pad)? else {
                debug!("{}: no sample for key {}", self.decoder.name(), pad);
                continue;
            };
            for audio_channel in 0..audio_channels {
                write_pad_template(graph, self.audio, pad, audio_channel, &frames)?;
            }
            loaded += 1;
        }

        info!(
            "instrument {}: {} of {} keys loaded into {}",
            self.decoder.name(),
            loaded,
            input_pads,
            self.audio
        );
        Ok(())
    }

    fn description(&self) -> String {
        format!("Open instrument {}", self.decoder.name())
    }
}

/// Render a SeqSynthUtil waveform into every input pad
///
/// Pad `n` plays `base_key + n` semitones from A4.
pub struct ApplySeqSynth {
    audio: AudioId,
    synth: SeqSynthUtil,
    base_key: f64,
    frame_count: usize,
    guard: LaunchGuard,
}

impl ApplySeqSynth {
    pub fn new(audio: AudioId, synth: SeqSynthUtil, base_key: f64, frame_count: usize) -> Self {
        Self {
            audio,
            synth,
            base_key,
            frame_count,
            guard: LaunchGuard::new(),
        }
    }

    fn render(&self, key: f64, samplerate: u32) -> TaskResult<Vec<f64>> {
        let mut synth = self.synth.clone();
        synth.samplerate = samplerate;
        synth.source_stride = 1;
        synth.buffer_length = self.frame_count;
        synth.frequency = note_frequency(key);
        synth.reset();

        let mut buffer = SampleBuffer::try_new(SoundcardFormat::Double, self.frame_count)
            .map_err(GraphError::from)?;
        synth.compute(&mut buffer);

        Ok((0..self.frame_count).map(|i| buffer.get(i)).collect())
    }
}

impl Task for ApplySeqSynth {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("apply-seq-synth")?;
        if self.frame_count == 0 {
            return Err(TaskError::InvalidArgument("frame count is 0".into()));
        }

        let (input_pads, audio_channels) = {
            let entry = graph.audio(self.audio)?;
            (entry.input_pads, entry.audio_channels)
        };
        let samplerate = graph.presets().samplerate;

        for pad in 0..input_pads {
            let frames = self.render(self.base_key + pad as f64, samplerate)?;
            for audio_channel in 0..audio_channels {
                write_pad_template(graph, self.audio, pad, audio_channel, &frames)?;
            }
        }

        info!(
            "{} synth on {} pads of {}",
            self.synth.oscillator.as_str(),
            input_pads,
            self.audio
        );
        Ok(())
    }

    fn description(&self) -> String {
        format!("Apply {} synth", self.synth.oscillator.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::Presets;

    #[test]
    fn test_instrument_fills_pads_with_samples() {
        let mut graph = Graph::new(Presets::default()).unwrap();
        let audio = graph.add_audio("kit", 1, 1, 3).unwrap();
        let instrument = MemoryInstrument::new("kit")
            .with_key(0, vec![0.5; 10])
            .with_key(2, vec![0.25; 700]);

        OpenSf2Instrument::new(audio, Box::new(instrument))
            .launch(&mut graph)
            .unwrap();

        let template_of = |graph: &Graph, pad: usize| {
            let channel = graph.input_channel(audio, pad, 0).unwrap().unwrap();
            let recycling = graph.channel(channel).unwrap().first_recycling.unwrap();
            graph.recycling_template(recycling).unwrap()
        };

        let first = graph.signal(template_of(&graph, 0)).unwrap();
        assert_eq!(first.frame_count(), 10);
        let untouched = graph.signal(template_of(&graph, 1)).unwrap();
        assert_eq!(untouched.frame(0), 0.0);
        let last = graph.signal(template_of(&graph, 2)).unwrap();
        assert_eq!(last.length, 2);
        assert_eq!(last.frame_count(), 700);
    }

    #[test]
    fn test_apply_seq_synth_rejects_empty_render() {
        let mut graph = Graph::new(Presets::default()).unwrap();
        let audio = graph.add_audio("synth", 1, 1, 1).unwrap();

        let result = ApplySeqSynth::new(audio, SeqSynthUtil::new(44100, 0), 0.0, 0)
            .launch(&mut graph);
        assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    }
}

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use recall_engine::audio::{Presets, SampleBuffer, SoundcardFormat};
use recall_engine::graph::{Graph, Notation, Note};
use recall_engine::synth::{SeqSynthUtil, StepSequence, WaveformType};
use recall_engine::task::{ApplySeqSynth, StartAudio, Task};
use recall_engine::SchedulingPolicy;

/// Benchmark one buffer of each waveform (runs once per tick per voice)
fn bench_seq_synth_waveforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("seq_synth");
    let buffer_size = 512;

    for waveform in [
        WaveformType::Sine,
        WaveformType::Sawtooth,
        WaveformType::Triangle,
        WaveformType::Square,
        WaveformType::Impulse,
    ] {
        let mut synth = SeqSynthUtil::new(48000, buffer_size);
        synth.oscillator = waveform;
        let mut buffer = SampleBuffer::try_new(SoundcardFormat::Float, buffer_size).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(waveform.as_str()),
            &buffer_size,
            |b, _| {
                b.iter(|| {
                    buffer.clear();
                    synth.compute(black_box(&mut buffer));
                });
            },
        );
    }
    group.finish();
}

/// Sequenced tuning and vibrato on top of the plain oscillator
fn bench_seq_synth_modulated(c: &mut Criterion) {
    let buffer_size = 512;
    let mut synth = SeqSynthUtil::new(48000, buffer_size);
    synth.seq_tuning = StepSequence {
        steps: [0.0, 200.0, 400.0, 500.0, 700.0, 900.0, 1100.0, 1200.0],
        pingpong: true,
        lfo_frequency: 6.0,
    };
    synth.vibrato.enabled = true;
    let mut buffer = SampleBuffer::try_new(SoundcardFormat::Signed16, buffer_size).unwrap();

    c.bench_function("seq_synth_modulated_s16", |b| {
        b.iter(|| {
            buffer.clear();
            synth.compute(black_box(&mut buffer));
        });
    });
}

/// Full tick of a playing 4-pad audio: delay, notation copy, mixing
fn bench_graph_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_tick");

    for policy in [
        SchedulingPolicy::Linear,
        SchedulingPolicy::PerAudio,
        SchedulingPolicy::PerChannel,
    ] {
        let mut graph = Graph::new(Presets::default()).unwrap();
        let audio = graph.add_audio("drums", 2, 1, 4).unwrap();
        let notes: Vec<Note> = (0..64).map(|x0| Note::new(x0, x0 + 1, (x0 % 4) as usize)).collect();
        for ac in 0..2 {
            *graph.notation_mut(audio, ac).unwrap() = Notation::from_notes(ac, notes.clone());
        }
        graph.add_notation_playback(audio).unwrap();
        ApplySeqSynth::new(audio, SeqSynthUtil::new(44100, 0), 0.0, 4096)
            .launch(&mut graph)
            .unwrap();
        StartAudio::new(audio).with_length(64).launch(&mut graph).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(policy.as_str()),
            &policy,
            |b, &policy| {
                b.iter(|| {
                    black_box(graph.tick(policy));
                    graph.launch_scheduled();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_seq_synth_waveforms,
    bench_seq_synth_modulated,
    bench_graph_tick
);
criterion_main!(benches);

// Integration test: Tasks and settings touching the filesystem

use recall_engine::audio::{Presets, SoundcardFormat};
use recall_engine::config::{Config, SOUNDCARD, THREAD};
use recall_engine::graph::Graph;
use recall_engine::task::{decode_wave, OpenSingleFile, Task, TaskError};
use recall_engine::SchedulingPolicy;
use std::path::Path;
use tempfile::tempdir;

fn write_wave(path: &Path, channels: u16, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for sample in samples {
        writer.write_sample(*sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn double_graph() -> Graph {
    Graph::new(Presets {
        format: SoundcardFormat::Double,
        ..Presets::default()
    })
    .unwrap()
}

#[test]
fn test_decode_stereo_wave() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    write_wave(&path, 2, &[32767, -32767, 0, 16384, 32767, 0]);

    let wave = decode_wave(&path).unwrap();
    assert_eq!(wave.samplerate, 44100);
    assert_eq!(wave.channels.len(), 2);
    assert_eq!(wave.frame_count(), 3);
    assert_eq!(wave.channels[0], vec![1.0, 0.0, 1.0]);
    assert_eq!(wave.channels[1][0], -1.0);
}

#[test]
fn test_open_single_file_fills_pad_template() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kick.wav");
    let samples: Vec<i16> = (0..700).map(|i| (i * 40) as i16).collect();
    write_wave(&path, 1, &samples);

    let mut graph = double_graph();
    let audio = graph.add_audio("drums", 2, 1, 2).unwrap();
    OpenSingleFile::new(&path, audio, 1)
        .launch(&mut graph)
        .unwrap();

    // Mono feeds both audio channels
    for audio_channel in 0..2 {
        let channel = graph.input_channel(audio, 1, audio_channel).unwrap().unwrap();
        let recycling = graph.channel(channel).unwrap().first_recycling.unwrap();
        let template = graph.recycling_template(recycling).unwrap();
        let signal = graph.signal(template).unwrap();

        assert_eq!(signal.frame_count(), 700);
        for frame in [0, 1, 511, 512, 699] {
            let expected = (frame * 40) as f64 / 32767.0;
            assert!((signal.frame(frame) - expected).abs() < 1e-9, "frame {}", frame);
        }
    }

    // Pad 0 untouched
    let channel = graph.input_channel(audio, 0, 0).unwrap().unwrap();
    let recycling = graph.channel(channel).unwrap().first_recycling.unwrap();
    let template = graph.recycling_template(recycling).unwrap();
    assert_eq!(graph.signal(template).unwrap().frame(0), 0.0);
}

#[test]
fn test_open_missing_file_fails() {
    let dir = tempdir().unwrap();
    let mut graph = double_graph();
    let audio = graph.add_audio("drums", 1, 1, 1).unwrap();

    let result = OpenSingleFile::new(dir.path().join("missing.wav"), audio, 0).launch(&mut graph);
    assert!(matches!(result, Err(TaskError::Wave(_))));
}

#[test]
fn test_open_unknown_pad_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snare.wav");
    write_wave(&path, 1, &[100, 200]);

    let mut graph = double_graph();
    let audio = graph.add_audio("drums", 1, 1, 1).unwrap();
    let result = OpenSingleFile::new(&path, audio, 3).launch(&mut graph);
    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
}

#[test]
fn test_config_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.ron");

    let mut config = Config::new();
    config.set(SOUNDCARD, "buffer-size", "256");
    config.set(THREAD, "super-threaded-scope", "audio");
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.presets().unwrap().buffer_size, 256);
    assert_eq!(loaded.scheduling_policy().unwrap(), SchedulingPolicy::PerAudio);
}

#[test]
fn test_config_missing_file_is_default() {
    let dir = tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.ron")).unwrap();
    assert_eq!(config, Config::default());
    assert!(Config::load(&dir.path().join("absent.ron")).is_err());
}

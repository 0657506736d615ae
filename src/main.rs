use log::{error, info, warn};
use recall_engine::audio::format_conversion::f64_to_s16;
use recall_engine::graph::{AudioId, Notation, Note};
use recall_engine::synth::WaveformType;
use recall_engine::task::{ApplySeqSynth, OpenSingleFile, StartAudio};
use recall_engine::{
    AudioLoop, Config, Graph, LoopSettings, SchedulingPolicy, SeqSynthUtil, TaskLauncher,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Offline renders stop after this many ticks even if a pass never ends
const MAX_RENDER_TICKS: u64 = 100_000;

const DRUM_PADS: usize = 4;

#[derive(Debug, Default)]
struct Args {
    notation: Option<PathBuf>,
    sample: Option<PathBuf>,
    out: Option<PathBuf>,
    live_secs: Option<u64>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            let mut value = || iter.next().ok_or_else(|| format!("{} needs a value", arg));
            match arg.as_str() {
                "--notation" => args.notation = Some(value()?.into()),
                "--sample" => args.sample = Some(value()?.into()),
                "--out" => args.out = Some(value()?.into()),
                "--live" => {
                    let secs = value()?;
                    args.live_secs = Some(secs.parse().map_err(|_| format!("bad seconds: {}", secs))?);
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }
        Ok(args)
    }
}

fn default_notation(audio_channels: usize) -> Vec<Notation> {
    let pattern = [
        Note::new(0, 1, 0),
        Note::new(2, 3, 2),
        Note::new(4, 5, 1),
        Note::new(6, 7, 2),
        Note::new(8, 9, 0),
        Note::new(10, 11, 2),
        Note::new(12, 13, 1),
        Note::new(14, 16, 3),
    ];
    (0..audio_channels)
        .map(|ac| Notation::from_notes(ac, pattern.to_vec()))
        .collect()
}

fn load_notation(path: &Path, audio_channels: usize) -> Result<Vec<Notation>, Box<dyn Error>> {
    let notes: Vec<Note> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok((0..audio_channels)
        .map(|ac| {
            let mut notation = Notation::new(ac);
            for note in &notes {
                notation.add_note(*note);
            }
            notation
        })
        .collect())
}

fn build_graph(config: &Config, args: &Args) -> Result<(Graph, AudioId), Box<dyn Error>> {
    let presets = config.presets()?;
    let mut graph = Graph::new(presets)?;
    graph.bpm().set_f64(config.bpm()?)?;

    let audio_channels = presets.pcm_channels;
    let audio = graph.add_audio("drums", audio_channels, 1, DRUM_PADS)?;

    let notation = match &args.notation {
        Some(path) => load_notation(path, audio_channels)?,
        None => default_notation(audio_channels),
    };
    for (ac, entry) in notation.into_iter().enumerate() {
        *graph.notation_mut(audio, ac)? = entry;
    }

    graph.add_notation_playback(audio)?;

    let mut launcher = TaskLauncher::new();
    let mut synth = SeqSynthUtil::new(presets.samplerate, 0);
    synth.oscillator = WaveformType::Triangle;
    synth.volume = 0.4;
    let frames = presets.samplerate as usize / 8;
    launcher.append(Box::new(ApplySeqSynth::new(audio, synth, -21.0, frames)));
    if let Some(sample) = &args.sample {
        launcher.append(Box::new(OpenSingleFile::new(sample.clone(), audio, 0)));
    }

    for failure in launcher.launch_all(&mut graph) {
        warn!("{}: {}", failure.description, failure.error);
    }
    Ok((graph, audio))
}

/// Tick until the pass ends and write the mix as 16 bit WAV
fn render(
    graph: &mut Graph,
    audio: AudioId,
    policy: SchedulingPolicy,
    out: &Path,
) -> Result<u64, Box<dyn Error>> {
    let mut launcher = TaskLauncher::new();
    launcher.append(Box::new(StartAudio::new(audio)));
    if let Some(failure) = launcher.launch_all(graph).into_iter().next() {
        return Err(format!("{}: {}", failure.description, failure.error).into());
    }

    let presets = *graph.presets();
    let spec = hound::WavSpec {
        channels: presets.pcm_channels as u16,
        sample_rate: presets.samplerate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(out, spec)?;

    let mut ticks = 0;
    while ticks < MAX_RENDER_TICKS {
        for err in graph.tick(policy) {
            warn!("tick {}: {}", ticks, err);
        }
        for frame in graph.soundcard().interleaved() {
            writer.write_sample(f64_to_s16(frame))?;
        }
        ticks += 1;

        for failure in launcher.launch_all(graph) {
            warn!("{}: {}", failure.description, failure.error);
        }
        if graph.active_groups(audio).is_empty() && !graph.has_scheduled() {
            break;
        }
    }

    writer.finalize()?;
    Ok(ticks)
}

fn live(graph: Graph, audio: AudioId, settings: LoopSettings, secs: u64) -> Result<(), Box<dyn Error>> {
    let mut audio_loop = AudioLoop::spawn(graph, settings)?;
    audio_loop.launch(Box::new(StartAudio::new(audio)))?;

    for _ in 0..secs * 10 {
        std::thread::sleep(Duration::from_millis(100));
        for notification in audio_loop.notifications() {
            warn!("{}", notification);
        }
    }

    let ticks = audio_loop.ticks();
    match audio_loop.stop() {
        Some(graph) => info!(
            "live run done: {} ticks, {} recalls left",
            ticks,
            graph.recall_count()
        ),
        None => error!("audio loop did not shut down cleanly"),
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse()?;
    let config = match Config::default_path() {
        Some(path) => Config::load_or_default(&path)?,
        None => Config::default(),
    };

    let (mut graph, audio) = build_graph(&config, &args)?;
    let settings = LoopSettings::from_config(&config)?;

    match args.live_secs {
        Some(secs) => live(graph, audio, settings, secs),
        None => {
            let out = args.out.clone().unwrap_or_else(|| PathBuf::from("render.wav"));
            let ticks = render(&mut graph, audio, settings.policy, &out)?;
            info!("rendered {} buffers to {}", ticks, out.display());
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("{}", err);
        std::process::exit(1);
    }
}

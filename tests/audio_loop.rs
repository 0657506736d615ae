// Integration test: Graph owned by the audio loop thread

use recall_engine::audio::Presets;
use recall_engine::graph::{AudioId, Graph};
use recall_engine::task::{MoveNote, StartAudio};
use recall_engine::{AudioLoop, LoopSettings, NotificationCategory, NotificationLevel};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_loop() -> (AudioLoop, AudioId) {
    let mut graph = Graph::new(Presets::default()).unwrap();
    let audio = graph.add_audio("drums", 1, 1, 2).unwrap();
    graph.add_notation_playback(audio).unwrap();

    let mut settings = LoopSettings::for_graph(&graph);
    settings.max_precision = 2000.0;
    (AudioLoop::spawn(graph, settings).unwrap(), audio)
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < TIMEOUT {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_loop_runs_launched_pass() {
    let (mut audio_loop, audio) = fast_loop();
    assert!(audio_loop.is_running());

    audio_loop
        .launch(Box::new(StartAudio::new(audio).with_length(100_000)))
        .unwrap();
    assert!(wait_for(|| audio_loop.ticks() >= 10));
    // Overrun warnings are allowed, errors are not
    assert!(audio_loop.notifications().iter().all(|n| !n.is_error()));

    let graph = audio_loop.stop().unwrap();
    assert!(graph.soundcard().tic_counter() >= 10);
    assert_eq!(graph.active_groups(audio).len(), 1);
}

#[test]
fn test_failed_task_is_notified() {
    let (mut audio_loop, audio) = fast_loop();

    audio_loop
        .launch(Box::new(MoveNote::new(audio, 0, (3, 0), (4, 0))))
        .unwrap();

    let mut received = Vec::new();
    assert!(wait_for(|| {
        received.extend(audio_loop.notifications().into_iter().filter(|n| n.is_error()));
        !received.is_empty()
    }));

    let notification = &received[0];
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.category, NotificationCategory::Task);
    assert!(notification.message.starts_with("Move note"));

    assert!(audio_loop.stop().is_some());
}

#[test]
fn test_tasks_queued_before_stop_still_apply() {
    let (mut audio_loop, audio) = fast_loop();
    audio_loop
        .launch(Box::new(StartAudio::new(audio).with_length(100_000)))
        .unwrap();

    let graph = audio_loop.stop().unwrap();
    assert_eq!(graph.active_groups(audio).len(), 1);
}

// Integration test: Recall duplication, group isolation and cancellation

use recall_engine::audio::Presets;
use recall_engine::graph::{AudioId, ChannelId, Graph, SignalId};
use recall_engine::recall::{
    CopyNotationAudioRun, CountBeatsAudioRun, RecallContainer, RecallError, RecallFlags,
    RecallHandle, RecallId, RecallIdFlags, RecallKind, RecallType,
};
use recall_engine::task::{CancelAudio, StartAudio, Task, TaskError};

fn playback_graph() -> (Graph, AudioId, ChannelId) {
    let mut graph = Graph::new(Presets::default()).unwrap();
    let audio = graph.add_audio("drums", 1, 1, 1).unwrap();
    graph.add_notation_playback(audio).unwrap();
    let input = graph.input_channel(audio, 0, 0).unwrap().unwrap();
    (graph, audio, input)
}

fn start_pass(graph: &mut Graph, audio: AudioId) -> RecallId {
    let recall_id = graph.next_recall_id(RecallIdFlags::NOTATION | RecallIdFlags::PLAYBACK);
    StartAudio::with_recall_id(audio, recall_id)
        .with_length(64)
        .launch(graph)
        .unwrap();
    recall_id
}

/// Add an instance signal of `recall_id` to the input's recycling
fn add_group_signal(graph: &mut Graph, input: ChannelId, recall_id: RecallId) -> SignalId {
    let recycling = graph.channel(input).unwrap().first_recycling.unwrap();
    let signal = graph
        .create_audio_signal_with_defaults(recycling, None, 0.0, 0)
        .unwrap();
    graph.signal_mut(signal).unwrap().recall_id = Some(recall_id);
    graph.add_audio_signal(recycling, signal).unwrap();
    signal
}

/// Every recall below `handle` of type `recall_type`
fn descendants_of_type(graph: &Graph, handle: RecallHandle, recall_type: RecallType) -> Vec<RecallHandle> {
    let mut found = Vec::new();
    let mut stack = graph.recall(handle).unwrap().children.clone();
    while let Some(child) = stack.pop() {
        let node = graph.recall(child).unwrap();
        if node.recall_type() == Some(recall_type) {
            found.push(child);
        }
        stack.extend(node.children.iter().copied());
    }
    found
}

/// The runtime play-channel run of `recall_id` on `channel`
fn play_run(graph: &Graph, channel: ChannelId, recall_id: RecallId) -> RecallHandle {
    graph
        .channel(channel)
        .unwrap()
        .recalls()
        .iter()
        .copied()
        .find(|h| graph.recall(*h).unwrap().recall_id == Some(recall_id))
        .unwrap()
}

#[test]
fn test_group_isolation_on_shared_recycling() {
    let (mut graph, audio, input) = playback_graph();
    let group_a = start_pass(&mut graph, audio);
    let group_b = start_pass(&mut graph, audio);

    let signal = add_group_signal(&mut graph, input, group_a);

    let players_a = descendants_of_type(&graph, play_run(&graph, input, group_a), RecallType::PlayAudioSignal);
    let players_b = descendants_of_type(&graph, play_run(&graph, input, group_b), RecallType::PlayAudioSignal);
    assert_eq!(players_a.len(), 1);
    assert!(players_b.is_empty());

    let player = graph.recall(players_a[0]).unwrap();
    assert_eq!(player.group_id(), Some(group_a.group_id));
    match player.behavior() {
        Some(RecallKind::PlayAudioSignal(play)) => assert_eq!(play.source(), signal),
        other => panic!("unexpected behavior: {:?}", other.map(|b| b.name())),
    }
}

#[test]
fn test_template_signal_is_never_played() {
    let (mut graph, audio, input) = playback_graph();
    let group = start_pass(&mut graph, audio);

    let recycling = graph.channel(input).unwrap().first_recycling.unwrap();
    let template = graph.recycling_template(recycling).unwrap();
    graph.signal_mut(template).unwrap().recall_id = Some(group);
    graph.remove_audio_signal(recycling, template).unwrap();
    graph.add_audio_signal(recycling, template).unwrap();

    let players = descendants_of_type(&graph, play_run(&graph, input, group), RecallType::PlayAudioSignal);
    assert!(players.is_empty());
}

#[test]
fn test_cancel_frees_only_after_scheduled_tasks() {
    let (mut graph, audio, input) = playback_graph();
    let group = start_pass(&mut graph, audio);
    let signal = add_group_signal(&mut graph, input, group);

    let run = play_run(&graph, input, group);
    let player = descendants_of_type(&graph, run, RecallType::PlayAudioSignal)[0];

    CancelAudio::new(audio, Some(group.group_id))
        .launch(&mut graph)
        .unwrap();

    // Flagged, still allocated
    assert!(graph.recall(run).unwrap().flags.contains(RecallFlags::CANCELLED));
    assert!(graph.contains_recall(run));
    assert!(graph.contains_recall(player));
    assert!(graph.contains_signal(signal));
    assert!(graph.has_scheduled());

    assert!(graph.launch_scheduled().is_empty());

    assert!(!graph.contains_recall(run));
    assert!(!graph.contains_recall(player));
    assert!(!graph.contains_signal(signal));
    assert!(graph.active_groups(audio).is_empty());
}

#[test]
fn test_cancel_one_group_keeps_the_other() {
    let (mut graph, audio, input) = playback_graph();
    let group_a = start_pass(&mut graph, audio);
    let group_b = start_pass(&mut graph, audio);
    let signal_b = add_group_signal(&mut graph, input, group_b);

    CancelAudio::new(audio, Some(group_a.group_id))
        .launch(&mut graph)
        .unwrap();
    graph.launch_scheduled();

    assert_eq!(graph.active_groups(audio), vec![group_b]);
    assert!(graph.contains_signal(signal_b));
    let players = descendants_of_type(&graph, play_run(&graph, input, group_b), RecallType::PlayAudioSignal);
    assert_eq!(players.len(), 1);
}

#[test]
fn test_dependency_resolves_to_same_group_runtime() {
    let mut graph = Graph::new(Presets::default()).unwrap();
    let audio = graph.add_audio("drums", 1, 1, 1).unwrap();
    let container = RecallContainer::Audio(audio);

    let count_template = graph
        .add_recall_template(container, RecallKind::CountBeatsAudioRun(CountBeatsAudioRun::new(16)))
        .unwrap();
    let copy_template = graph
        .add_recall_template(container, RecallKind::CopyNotationAudioRun(CopyNotationAudioRun::new(0)))
        .unwrap();
    graph.add_dependency(copy_template, count_template).unwrap();

    let group_a = graph.next_recall_id(RecallIdFlags::NOTATION);
    let group_b = graph.next_recall_id(RecallIdFlags::NOTATION);
    let count_b = graph.duplicate_recall(count_template, group_b).unwrap();
    let count_a = graph.duplicate_recall(count_template, group_a).unwrap();
    let copy_a = graph.duplicate_recall(copy_template, group_a).unwrap();

    graph.resolve_dependencies(copy_a).unwrap();

    let resolved = graph
        .resolved_dependency(copy_a, RecallType::CountBeatsAudioRun)
        .unwrap();
    assert_eq!(resolved, count_a);
    assert_ne!(resolved, count_b);
    let node = graph.recall(resolved).unwrap();
    assert!(!node.is_template());
    assert_eq!(node.group_id(), Some(group_a.group_id));
}

#[test]
fn test_missing_dependency_fails() {
    let mut graph = Graph::new(Presets::default()).unwrap();
    let audio = graph.add_audio("drums", 1, 1, 1).unwrap();
    let container = RecallContainer::Audio(audio);

    let count_template = graph
        .add_recall_template(container, RecallKind::CountBeatsAudioRun(CountBeatsAudioRun::new(16)))
        .unwrap();
    let copy_template = graph
        .add_recall_template(container, RecallKind::CopyNotationAudioRun(CopyNotationAudioRun::new(0)))
        .unwrap();
    graph.add_dependency(copy_template, count_template).unwrap();

    let group = graph.next_recall_id(RecallIdFlags::NOTATION);
    let copy = graph.duplicate_recall(copy_template, group).unwrap();

    let result = graph.resolve_dependencies(copy);
    assert!(matches!(
        result,
        Err(RecallError::MissingDependency {
            dependency: RecallType::CountBeatsAudioRun,
            ..
        })
    ));
    assert_eq!(graph.resolved_dependency(copy, RecallType::CountBeatsAudioRun), None);
}

#[test]
fn test_removed_signal_cancels_player() {
    let (mut graph, audio, input) = playback_graph();
    let group = start_pass(&mut graph, audio);
    let signal = add_group_signal(&mut graph, input, group);

    let player = descendants_of_type(&graph, play_run(&graph, input, group), RecallType::PlayAudioSignal)[0];
    let recycling = graph.channel(input).unwrap().first_recycling.unwrap();
    graph.remove_audio_signal(recycling, signal).unwrap();

    // Hidden and cancelled, freed by the scheduled removal
    let flags = graph.recall(player).unwrap().flags;
    assert!(flags.contains(RecallFlags::HIDE));
    assert!(flags.contains(RecallFlags::CANCELLED));
    assert!(graph.contains_recall(player));
    assert!(graph.has_scheduled());

    graph.launch_scheduled();
    assert!(!graph.contains_recall(player));
    assert_eq!(graph.active_groups(audio), vec![group]);
}

#[test]
fn test_start_rejects_running_group() {
    let (mut graph, audio, _) = playback_graph();
    let group = start_pass(&mut graph, audio);
    let recalls = graph.recall_count();

    let result = StartAudio::with_recall_id(audio, group).launch(&mut graph);
    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    assert_eq!(graph.recall_count(), recalls);
    assert_eq!(graph.active_groups(audio), vec![group]);
}

#[test]
fn test_ambiguous_dependency_fails() {
    let mut graph = Graph::new(Presets::default()).unwrap();
    let audio = graph.add_audio("drums", 1, 1, 1).unwrap();
    let container = RecallContainer::Audio(audio);

    let count_template = graph
        .add_recall_template(container, RecallKind::CountBeatsAudioRun(CountBeatsAudioRun::new(16)))
        .unwrap();
    let copy_template = graph
        .add_recall_template(container, RecallKind::CopyNotationAudioRun(CopyNotationAudioRun::new(0)))
        .unwrap();
    graph.add_dependency(copy_template, count_template).unwrap();

    let group = graph.next_recall_id(RecallIdFlags::NOTATION);
    graph.duplicate_recall(count_template, group).unwrap();
    graph.duplicate_recall(count_template, group).unwrap();
    let copy = graph.duplicate_recall(copy_template, group).unwrap();

    let result = graph.resolve_dependencies(copy);
    assert!(matches!(
        result,
        Err(RecallError::AmbiguousDependency {
            dependency: RecallType::CountBeatsAudioRun,
            found: 2,
            ..
        })
    ));
    assert_eq!(graph.resolved_dependency(copy, RecallType::CountBeatsAudioRun), None);
}

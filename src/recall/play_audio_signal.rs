// PlayAudioSignal - mixes one audio signal into the soundcard

use crate::graph::{Graph, SignalId};
use crate::recall::{
    Recall, RecallHandle, RecallId, RecallKind, RecallResult, RecallType, RunStage, RunStatus,
};
use crate::task::recall_tasks::RemoveAudioSignal;

/// Renders one buffer of `source` per tick, starting where its stream
/// cursor points
///
/// With a nonzero attack every buffer lands `attack` frames late: its head
/// fills the rest of the current output and its tail opens the next one.
/// The run is done once the tail of the last buffer is out.
pub struct PlayAudioSignal {
    source: SignalId,
    pcm_channel: usize,
    /// Frame offset of the signal in the output, below one buffer
    attack: usize,
}

impl PlayAudioSignal {
    pub fn new(source: SignalId, pcm_channel: usize, attack: usize) -> Self {
        Self {
            source,
            pcm_channel,
            attack,
        }
    }

    pub fn source(&self) -> SignalId {
        self.source
    }
}

impl Recall for PlayAudioSignal {
    fn recall_type(&self) -> RecallType {
        RecallType::PlayAudioSignal
    }

    fn name(&self) -> &'static str {
        "play-audio-signal"
    }

    fn duplicate(&self, _recall_id: &RecallId) -> RecallKind {
        RecallKind::PlayAudioSignal(Self::new(self.source, self.pcm_channel, self.attack))
    }

    fn run(
        &mut self,
        graph: &mut Graph,
        _this: RecallHandle,
        stage: RunStage,
    ) -> RecallResult<RunStatus> {
        if stage != RunStage::Inter {
            return Ok(RunStatus::Continue);
        }

        let Some(signal) = graph.signals.get_mut(self.source) else {
            return Ok(RunStatus::Done);
        };

        let buffer_size = graph.soundcard.presets().buffer_size;
        let attack = self.attack.min(buffer_size);
        let cursor = signal.stream_cursor;

        if attack > 0 && cursor > 0 {
            if let Some(previous) = signal.stream.get(cursor - 1) {
                graph
                    .soundcard
                    .mix(self.pcm_channel, previous, 0, buffer_size - attack, attack);
            }
        }
        if let Some(buffer) = signal.stream.get(cursor) {
            graph
                .soundcard
                .mix(self.pcm_channel, buffer, attack, 0, buffer_size - attack);
        }
        signal.stream_cursor += 1;

        let end = signal.length + usize::from(attack > 0);
        if signal.stream_cursor >= end {
            Ok(RunStatus::Done)
        } else {
            Ok(RunStatus::Continue)
        }
    }

    fn on_done(&mut self, graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        graph.schedule(Box::new(RemoveAudioSignal::new(self.source)));
        Ok(())
    }

    fn on_cancel(&mut self, graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        graph.schedule(Box::new(RemoveAudioSignal::new(self.source)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Presets, SoundcardFormat};

    fn graph_with_signal(attack: usize) -> (Graph, SignalId) {
        let mut graph = Graph::new(Presets {
            samplerate: 44100,
            buffer_size: 8,
            format: SoundcardFormat::Double,
            pcm_channels: 1,
        })
        .unwrap();
        let audio = graph.add_audio("pad", 1, 1, 1).unwrap();
        let input = graph.input_channel(audio, 0, 0).unwrap().unwrap();
        let recycling = graph.channel(input).unwrap().first_recycling.unwrap();

        let template = graph.recycling_template(recycling).unwrap();
        let frames: Vec<f64> = (1..=16).map(f64::from).collect();
        graph.signal_mut(template).unwrap().write_frames(&frames).unwrap();

        let signal = graph
            .create_audio_signal_with_defaults(recycling, None, 0.0, attack)
            .unwrap();
        (graph, signal)
    }

    fn render(graph: &mut Graph, play: &mut PlayAudioSignal) -> (Vec<f64>, RunStatus) {
        graph.soundcard.clear();
        let status = play
            .run(graph, RecallHandle::default(), RunStage::Inter)
            .unwrap();
        let out = graph.soundcard.output(0).unwrap();
        ((0..8).map(|f| out.get(f)).collect(), status)
    }

    #[test]
    fn test_plays_one_buffer_per_tick() {
        let (mut graph, signal) = graph_with_signal(0);
        let mut play = PlayAudioSignal::new(signal, 0, 0);

        let (first, status) = render(&mut graph, &mut play);
        assert_eq!(first, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(status, RunStatus::Continue);

        let (second, status) = render(&mut graph, &mut play);
        assert_eq!(second[0], 9.0);
        assert_eq!(status, RunStatus::Done);
    }

    #[test]
    fn test_attack_tail_opens_next_tick() {
        let (mut graph, signal) = graph_with_signal(3);
        let mut play = PlayAudioSignal::new(signal, 0, 3);

        let (first, status) = render(&mut graph, &mut play);
        assert_eq!(first, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(status, RunStatus::Continue);

        let (second, status) = render(&mut graph, &mut play);
        assert_eq!(second, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0]);
        assert_eq!(status, RunStatus::Continue);

        // Remainder of the last buffer, one tick past the signal's length
        let (last, status) = render(&mut graph, &mut play);
        assert_eq!(last, vec![14.0, 15.0, 16.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(status, RunStatus::Done);
    }
}

// CopyNotationAudioRun - turns due notes into audio signals
//
// On every AllocInput tic the run reads the current 16th offset from its
// count-beats dependency and, for each note starting at that offset, adds a
// new signal tagged with its recall id to every recycling of the input
// channel at pad `note.y`. Recycling listeners take it from there.

use crate::audio::port::Port;
use crate::graph::{Graph, Note};
use crate::recall::{
    Recall, RecallContainer, RecallError, RecallHandle, RecallId, RecallKind, RecallResult,
    RecallType, RunStatus, TicPhase,
};
use log::{debug, warn};

pub struct CopyNotationAudioRun {
    audio_channel: usize,
    /// Size new signals to the note duration instead of the template length
    fit_audio_signal: Port,

    notes: Vec<Note>,
    cursor: usize,
    last_offset: Option<u64>,

    count_beats: Option<RecallHandle>,
    delay: Option<RecallHandle>,
}

impl CopyNotationAudioRun {
    pub fn new(audio_channel: usize) -> Self {
        Self {
            audio_channel,
            fit_audio_signal: Port::boolean("fit-audio-signal", true),
            notes: Vec::new(),
            cursor: 0,
            last_offset: None,
            count_beats: None,
            delay: None,
        }
    }

    pub fn audio_channel(&self) -> usize {
        self.audio_channel
    }

    pub fn fit_audio_signal(&self) -> &Port {
        &self.fit_audio_signal
    }

    pub fn count_beats(&self) -> Option<RecallHandle> {
        self.count_beats
    }

    pub fn delay(&self) -> Option<RecallHandle> {
        self.delay
    }

    /// Index of the next note not yet processed
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn current_offset(&self, graph: &Graph, this: RecallHandle) -> RecallResult<u64> {
        let count_beats = self.count_beats.ok_or_else(|| {
            RecallError::InvalidState(format!("{} has no count-beats dependency", this))
        })?;

        match graph.recall(count_beats)?.behavior() {
            Some(RecallKind::CountBeatsAudioRun(run)) => Ok(run.notation_counter()),
            Some(_) => Err(RecallError::InvalidState(format!(
                "{} is not a count-beats run",
                count_beats
            ))),
            None => Err(RecallError::Busy(count_beats)),
        }
    }

    /// Move the cursor to the first note at or after `offset`
    fn seek(&mut self, offset: u64) {
        let looped = self.last_offset.is_some_and(|last| offset < last);
        if looped {
            self.cursor = self.notes.partition_point(|n| n.x0 < offset);
        } else {
            while self.notes.get(self.cursor).is_some_and(|n| n.x0 < offset) {
                self.cursor += 1;
            }
        }
        self.last_offset = Some(offset);
    }

    fn play_note(&self, graph: &mut Graph, this: RecallHandle, note: Note) -> RecallResult<()> {
        let node = graph.recall(this)?;
        let RecallContainer::Audio(audio) = node.container else {
            return Err(RecallError::InvalidState(format!(
                "{} is not on an audio",
                this
            )));
        };
        let recall_id = node.recall_id;

        let Some(channel) = graph.input_channel(audio, note.y, self.audio_channel)? else {
            warn!(
                "{}: no input pad {} for note at {}, skipped",
                this, note.y, note.x0
            );
            return Ok(());
        };

        let fit = self.fit_audio_signal.get_bool();
        let frames_per_16th = graph.soundcard().frames_per_16th(graph.bpm().get_f64());
        let frame_count = ((note.duration() as f64 * frames_per_16th).round() as usize).max(1);

        for recycling in graph.channel_recyclings(channel)? {
            let signal = if fit {
                graph.create_audio_signal_with_frame_count(recycling, None, 0.0, 0, frame_count)?
            } else {
                graph.create_audio_signal_with_defaults(recycling, None, 0.0, 0)?
            };

            graph.signal_mut(signal)?.recall_id = recall_id;
            graph.add_audio_signal(recycling, signal)?;
            debug!("{}: note {:?} -> {} in {}", this, note, signal, recycling);
        }
        Ok(())
    }
}

impl Recall for CopyNotationAudioRun {
    fn recall_type(&self) -> RecallType {
        RecallType::CopyNotationAudioRun
    }

    fn name(&self) -> &'static str {
        "copy-notation-audio-run"
    }

    fn duplicate(&self, _recall_id: &RecallId) -> RecallKind {
        RecallKind::CopyNotationAudioRun(Self {
            fit_audio_signal: self.fit_audio_signal.clone(),
            ..Self::new(self.audio_channel)
        })
    }

    fn resolve_dependency(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        dependency: RecallType,
        resolved: RecallHandle,
    ) -> RecallResult<()> {
        match dependency {
            RecallType::CountBeatsAudioRun => self.count_beats = Some(resolved),
            RecallType::DelayAudioRun => {
                self.delay = Some(resolved);
                graph.connect_tic(resolved, this)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Snapshot the notation and put the cursor on its first note
    ///
    /// Notes edited after this point take effect on the next pass.
    fn run_init_pre(&mut self, graph: &mut Graph, this: RecallHandle) -> RecallResult<()> {
        let RecallContainer::Audio(audio) = graph.recall(this)?.container else {
            return Err(RecallError::InvalidState(format!(
                "{} is not on an audio",
                this
            )));
        };

        self.notes.clear();
        if let Some(notation) = graph.audio(audio)?.notation.get(self.audio_channel) {
            if !notation.is_sorted() {
                return Err(RecallError::InvalidState(format!(
                    "notation of audio channel {} is not sorted by offset",
                    self.audio_channel
                )));
            }
            self.notes.extend_from_slice(notation.notes());
        }

        self.cursor = 0;
        self.last_offset = None;
        Ok(())
    }

    fn on_tic(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        phase: TicPhase,
    ) -> RecallResult<RunStatus> {
        if phase != TicPhase::AllocInput {
            return Ok(RunStatus::Continue);
        }

        let offset = self.current_offset(graph, this)?;
        self.seek(offset);

        while let Some(note) = self.notes.get(self.cursor).copied() {
            if note.x0 != offset {
                break;
            }
            self.play_note(graph, this, note)?;
            self.cursor += 1;
        }

        Ok(RunStatus::Continue)
    }
}

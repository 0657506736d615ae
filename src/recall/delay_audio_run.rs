// DelayAudioRun - 16th note tic generator
//
// Counts ticks and fires once every `delay_ticks(bpm)` ticks, starting with
// the very first tick. A fire raises AllocInput on every connected listener,
// then Count on every connected listener.

use crate::audio::port::Port;
use crate::graph::Graph;
use crate::recall::{
    Recall, RecallHandle, RecallId, RecallKind, RecallResult, RecallType, RunStage, RunStatus,
    TicPhase,
};
use log::error;

pub struct DelayAudioRun {
    bpm: Port,
    counter: u64,
    /// 16th notes emitted so far
    note_offset: u64,
    listeners: Vec<RecallHandle>,
}

impl DelayAudioRun {
    pub fn new(bpm: Port) -> Self {
        Self {
            bpm,
            counter: 0,
            note_offset: 0,
            listeners: Vec::new(),
        }
    }

    pub fn bpm(&self) -> &Port {
        &self.bpm
    }

    pub fn note_offset(&self) -> u64 {
        self.note_offset
    }

    pub fn listeners(&self) -> &[RecallHandle] {
        &self.listeners
    }

    pub(crate) fn connect(&mut self, listener: RecallHandle) {
        if !self.listeners.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    fn emit(&self, graph: &mut Graph, this: RecallHandle, phase: TicPhase) {
        for listener in &self.listeners {
            if let Err(err) = graph.dispatch_tic(*listener, phase) {
                error!("{} failed on {:?} from {}: {}", listener, phase, this, err);
            }
        }
    }
}

impl Recall for DelayAudioRun {
    fn recall_type(&self) -> RecallType {
        RecallType::DelayAudioRun
    }

    fn name(&self) -> &'static str {
        "delay-audio-run"
    }

    fn duplicate(&self, _recall_id: &RecallId) -> RecallKind {
        RecallKind::DelayAudioRun(Self::new(self.bpm.clone()))
    }

    fn run_init_pre(&mut self, _graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        self.counter = 0;
        self.note_offset = 0;
        Ok(())
    }

    fn run(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        stage: RunStage,
    ) -> RecallResult<RunStatus> {
        if stage != RunStage::Pre {
            return Ok(RunStatus::Continue);
        }

        let delay = graph.soundcard().delay_ticks(self.bpm.get_f64());
        let fire = self.counter == 0;
        self.counter = (self.counter + 1) % delay;

        if fire {
            self.emit(graph, this, TicPhase::AllocInput);
            self.emit(graph, this, TicPhase::Count);
            self.note_offset += 1;
        }

        Ok(RunStatus::Continue)
    }
}

// CountBeatsAudioRun - current 16th offset of a notation pass

use crate::audio::port::Port;
use crate::graph::Graph;
use crate::recall::{
    Recall, RecallContainer, RecallHandle, RecallId, RecallKind, RecallResult, RecallType,
    RunStatus, TicPhase,
};
use crate::task::audio_tasks::CancelAudio;

/// Counts 16th notes on every Count tic of its delay dependency
///
/// With the `loop` port set the counter wraps from `loop-end - 1` back to
/// `loop-start`; otherwise the recall is done once the counter reaches
/// `length`. A finished count cancels the whole pass.
///
/// Loop ports are shared with the template. `length` is copied on
/// duplication so every pass keeps its own.
pub struct CountBeatsAudioRun {
    loop_enabled: Port,
    loop_start: Port,
    loop_end: Port,
    length: Port,
    notation_counter: u64,
    delay: Option<RecallHandle>,
}

impl CountBeatsAudioRun {
    pub fn new(length: u64) -> Self {
        Self {
            loop_enabled: Port::boolean("loop", false),
            loop_start: Port::uint("loop-start", 0),
            loop_end: Port::uint("loop-end", length),
            length: Port::uint("length", length),
            notation_counter: 0,
            delay: None,
        }
    }

    pub fn loop_enabled(&self) -> &Port {
        &self.loop_enabled
    }

    pub fn loop_start(&self) -> &Port {
        &self.loop_start
    }

    pub fn loop_end(&self) -> &Port {
        &self.loop_end
    }

    pub fn length(&self) -> &Port {
        &self.length
    }

    pub fn notation_counter(&self) -> u64 {
        self.notation_counter
    }

    pub fn delay(&self) -> Option<RecallHandle> {
        self.delay
    }

    fn advance(&mut self) -> RunStatus {
        if self.loop_enabled.get_bool() {
            let loop_start = self.loop_start.get_f64() as u64;
            let loop_end = self.loop_end.get_f64() as u64;

            if self.notation_counter + 1 >= loop_end {
                self.notation_counter = loop_start;
            } else {
                self.notation_counter += 1;
            }
            return RunStatus::Continue;
        }

        self.notation_counter += 1;
        if self.notation_counter >= self.length.get_f64() as u64 {
            RunStatus::Done
        } else {
            RunStatus::Continue
        }
    }
}

impl Recall for CountBeatsAudioRun {
    fn recall_type(&self) -> RecallType {
        RecallType::CountBeatsAudioRun
    }

    fn name(&self) -> &'static str {
        "count-beats-audio-run"
    }

    fn duplicate(&self, _recall_id: &RecallId) -> RecallKind {
        RecallKind::CountBeatsAudioRun(Self {
            loop_enabled: self.loop_enabled.clone(),
            loop_start: self.loop_start.clone(),
            loop_end: self.loop_end.clone(),
            length: Port::uint("length", self.length.get_f64() as u64),
            notation_counter: 0,
            delay: None,
        })
    }

    fn resolve_dependency(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        dependency: RecallType,
        resolved: RecallHandle,
    ) -> RecallResult<()> {
        if dependency == RecallType::DelayAudioRun {
            self.delay = Some(resolved);
            graph.connect_tic(resolved, this)?;
        }
        Ok(())
    }

    fn run_init_pre(&mut self, _graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        self.notation_counter = if self.loop_enabled.get_bool() {
            self.loop_start.get_f64() as u64
        } else {
            0
        };
        Ok(())
    }

    fn on_tic(
        &mut self,
        _graph: &mut Graph,
        _this: RecallHandle,
        phase: TicPhase,
    ) -> RecallResult<RunStatus> {
        match phase {
            TicPhase::Count => Ok(self.advance()),
            TicPhase::AllocInput => Ok(RunStatus::Continue),
        }
    }

    fn on_done(&mut self, graph: &mut Graph, this: RecallHandle) -> RecallResult<()> {
        let node = graph.recall(this)?;
        if let (RecallContainer::Audio(audio), Some(recall_id)) = (node.container, node.recall_id) {
            graph.schedule(Box::new(CancelAudio::new(audio, Some(recall_id.group_id))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_until_length() {
        let mut run = CountBeatsAudioRun::new(3);
        assert_eq!(run.advance(), RunStatus::Continue);
        assert_eq!(run.advance(), RunStatus::Continue);
        assert_eq!(run.advance(), RunStatus::Done);
        assert_eq!(run.notation_counter(), 3);
    }

    #[test]
    fn test_loop_wraps_to_loop_start() {
        let mut run = CountBeatsAudioRun::new(16);
        run.loop_enabled().write(crate::audio::port::PortValue::Boolean(true)).unwrap();
        run.loop_start().set_f64(2.0).unwrap();
        run.loop_end().set_f64(4.0).unwrap();
        run.notation_counter = 2;

        assert_eq!(run.advance(), RunStatus::Continue);
        assert_eq!(run.notation_counter(), 3);
        assert_eq!(run.advance(), RunStatus::Continue);
        assert_eq!(run.notation_counter(), 2);
    }

    #[test]
    fn test_duplicate_shares_loop_ports_but_owns_length() {
        let template = CountBeatsAudioRun::new(8);
        let RecallKind::CountBeatsAudioRun(copy) = template.duplicate(&RecallId::new(
            crate::recall::GroupId(1),
            crate::recall::RecallIdFlags::NOTATION,
        )) else {
            panic!("wrong kind");
        };

        assert!(copy.loop_enabled().ptr_eq(template.loop_enabled()));
        assert!(copy.loop_end().ptr_eq(template.loop_end()));

        assert!(!copy.length().ptr_eq(template.length()));
        assert_eq!(copy.length().get_f64(), 8.0);
        copy.length().set_f64(2.0).unwrap();
        assert_eq!(template.length().get_f64(), 8.0);
    }
}

// Recall teardown tasks
//
// Scheduled by the graph itself so that nothing a tick may still touch is
// freed synchronously. Each task tolerates its target being gone already.

use crate::graph::{Graph, RecyclingId, SignalId};
use crate::recall::RecallHandle;
use crate::task::trait_def::{LaunchGuard, Task, TaskResult};
use log::debug;

/// Finish cancelling a recall: cancel children, run its cancel hook, queue
/// its removal
pub struct CancelRecall {
    recall: RecallHandle,
    guard: LaunchGuard,
}

impl CancelRecall {
    pub fn new(recall: RecallHandle) -> Self {
        Self {
            recall,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for CancelRecall {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("cancel-recall")?;
        graph.finish_cancel(self.recall)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Cancel {}", self.recall)
    }
}

/// Free a finished recall, requeued while it still has children
pub struct RemoveRecall {
    recall: RecallHandle,
    guard: LaunchGuard,
}

impl RemoveRecall {
    pub fn new(recall: RecallHandle) -> Self {
        Self {
            recall,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for RemoveRecall {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("remove-recall")?;
        if !graph.remove_recall(self.recall)? {
            debug!("{} still has children, retry", self.recall);
            graph.schedule(Box::new(RemoveRecall::new(self.recall)));
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove {}", self.recall)
    }
}

/// Detach and free an audio signal
pub struct RemoveAudioSignal {
    signal: SignalId,
    guard: LaunchGuard,
}

impl RemoveAudioSignal {
    pub fn new(signal: SignalId) -> Self {
        Self {
            signal,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for RemoveAudioSignal {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("remove-audio-signal")?;
        if graph.contains_signal(self.signal) {
            graph.destroy_audio_signal(self.signal)?;
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove {}", self.signal)
    }
}

/// Free a recycling no channel uses anymore, requeued while recalls still
/// process it
pub struct RemoveRecycling {
    recycling: RecyclingId,
    guard: LaunchGuard,
}

impl RemoveRecycling {
    pub fn new(recycling: RecyclingId) -> Self {
        Self {
            recycling,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for RemoveRecycling {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("remove-recycling")?;
        if graph.recycling(self.recycling).is_err() {
            return Ok(());
        }

        if graph.recycling_in_use(self.recycling) {
            debug!("{} still in use, retry", self.recycling);
            graph.schedule(Box::new(RemoveRecycling::new(self.recycling)));
            return Ok(());
        }

        graph.destroy_recycling(self.recycling)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove {}", self.recycling)
    }
}

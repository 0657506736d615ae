// TaskLauncher - Queues tasks and launches them against the graph

use crate::graph::Graph;
use crate::task::trait_def::{Task, TaskError};
use log::{debug, warn};
use std::collections::VecDeque;

/// Default number of launched task descriptions kept in history
const DEFAULT_MAX_HISTORY: usize = 100;

/// Outcome of one launched task
#[derive(Debug)]
pub struct TaskFailure {
    pub description: String,
    pub error: TaskError,
}

/// Queues tasks appended between ticks and launches them in order
///
/// After the queued tasks, the graph's own scheduled work (cancel and
/// removal follow-ups) runs until it settles. A bounded history of launched
/// task descriptions is kept for diagnostics.
pub struct TaskLauncher {
    pending: VecDeque<Box<dyn Task>>,
    history: VecDeque<String>,
    max_history: usize,
}

impl TaskLauncher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Queue a task for the next launch
    pub fn append(&mut self, task: Box<dyn Task>) {
        self.pending.push_back(task);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Launch every queued task, then the graph's scheduled follow-ups
    ///
    /// Failures do not stop the remaining tasks.
    pub fn launch_all(&mut self, graph: &mut Graph) -> Vec<TaskFailure> {
        let mut failures = Vec::new();

        while let Some(mut task) = self.pending.pop_front() {
            let description = task.description();
            match task.launch(graph) {
                Ok(()) => debug!("launched: {}", description),
                Err(error) => {
                    warn!("task failed: {}: {}", description, error);
                    failures.push(TaskFailure {
                        description: description.clone(),
                        error,
                    });
                }
            }
            self.record(description);
        }

        failures.extend(
            graph
                .launch_scheduled()
                .into_iter()
                .map(|(description, error)| TaskFailure { description, error }),
        );
        failures
    }

    /// Descriptions of launched tasks, oldest first
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn record(&mut self, description: String) {
        self.history.push_back(description);
        if self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }
}

impl Default for TaskLauncher {
    fn default() -> Self {
        Self::new()
    }
}

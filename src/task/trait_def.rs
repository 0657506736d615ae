// Task trait definition

use crate::graph::{Graph, GraphError};
use crate::recall::RecallError;

/// Result type for task operations
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors reported by a task to whoever launched it
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0} was already launched")]
    AlreadyLaunched(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Wave error: {0}")]
    Wave(#[from] hound::Error),

    #[error("Recall error: {0}")]
    Recall(#[from] RecallError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Task queue full, dropped: {0}")]
    QueueFull(String),
}

/// One structural mutation of the graph
///
/// Tasks are the only way code outside the audio thread changes the graph.
/// They are queued, then launched between two ticks by the thread owning the
/// graph. Launching a task twice is a caller error and reports
/// [`TaskError::AlreadyLaunched`].
///
/// # Example
/// ```no_run
/// use recall_engine::graph::Graph;
/// use recall_engine::task::trait_def::{Task, TaskResult};
/// use recall_engine::task::LaunchGuard;
///
/// struct SetTempo {
///     bpm: f64,
///     guard: LaunchGuard,
/// }
///
/// impl Task for SetTempo {
///     fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
///         self.guard.begin("set-tempo")?;
///         graph.bpm().set_f64(self.bpm).ok();
///         Ok(())
///     }
///
///     fn description(&self) -> String {
///         format!("Set tempo to {:.1}", self.bpm)
///     }
/// }
/// ```
pub trait Task: Send {
    /// Apply the mutation
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()>;

    /// Human-readable description, used in logs and notifications
    fn description(&self) -> String;
}

/// Tracks whether a task has been launched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchGuard {
    launched: bool,
}

impl LaunchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the task launched, failing if it already was
    pub fn begin(&mut self, task: &'static str) -> TaskResult<()> {
        if self.launched {
            return Err(TaskError::AlreadyLaunched(task));
        }
        self.launched = true;
        Ok(())
    }

    pub fn is_launched(&self) -> bool {
        self.launched
    }
}

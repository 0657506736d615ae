// Audio loop - the thread owning the graph
//
// Between two ticks the loop drains the task ringbuf, launches the queued
// tasks and the graph's scheduled follow-ups, then renders one buffer.
// Task and recall failures go out through the notification ringbuf.

use crate::config::{Config, ConfigResult};
use crate::graph::Graph;
use crate::messaging::channels::{
    NotificationConsumer, NotificationProducer, TaskConsumer, TaskProducer,
    create_notification_channel, create_task_channel,
};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::task::launcher::TaskLauncher;
use crate::task::trait_def::{Task, TaskError, TaskResult};
use crate::thread::scheduling::SchedulingPolicy;
use log::{error, info, warn};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DEFAULT_TASK_CAPACITY: usize = 256;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// How the loop is paced and scheduled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub policy: SchedulingPolicy,
    /// Ticks per second
    pub max_precision: f64,
    pub task_capacity: usize,
    pub notification_capacity: usize,
}

impl LoopSettings {
    /// Settings matching `graph`'s presets: one tick per buffer
    pub fn for_graph(graph: &Graph) -> Self {
        let presets = graph.presets();
        Self {
            policy: SchedulingPolicy::default(),
            max_precision: presets.samplerate as f64 / presets.buffer_size.max(1) as f64,
            task_capacity: DEFAULT_TASK_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }

    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        Ok(Self {
            policy: config.scheduling_policy()?,
            max_precision: config.max_precision()?,
            task_capacity: DEFAULT_TASK_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        })
    }

    fn period(&self) -> Duration {
        if self.max_precision > 0.0 && self.max_precision.is_finite() {
            Duration::from_secs_f64(1.0 / self.max_precision)
        } else {
            Duration::ZERO
        }
    }
}

/// Handle to a running audio loop
pub struct AudioLoop {
    task_tx: TaskProducer,
    notification_rx: NotificationConsumer,
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    handle: Option<JoinHandle<Graph>>,
}

impl AudioLoop {
    /// Move `graph` onto a new thread and start ticking
    pub fn spawn(graph: Graph, settings: LoopSettings) -> std::io::Result<Self> {
        let (task_tx, task_rx) = create_task_channel(settings.task_capacity.max(1));
        let (notification_tx, notification_rx) =
            create_notification_channel(settings.notification_capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            graph,
            settings,
            launcher: TaskLauncher::new(),
            task_rx,
            notification_tx,
            running: running.clone(),
            ticks: ticks.clone(),
        };
        let handle = thread::Builder::new()
            .name("recall-audio-loop".into())
            .spawn(move || worker.run())?;

        info!(
            "audio loop started ({} scope, {:.1} ticks/s)",
            settings.policy, settings.max_precision
        );
        Ok(Self {
            task_tx,
            notification_rx,
            running,
            ticks,
            handle: Some(handle),
        })
    }

    /// Queue a task for the next gap between ticks
    pub fn launch(&mut self, task: Box<dyn Task>) -> TaskResult<()> {
        self.task_tx
            .try_push(task)
            .map_err(|task| TaskError::QueueFull(task.description()))
    }

    /// Drain pending notifications
    pub fn notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Some(notification) = self.notification_rx.try_pop() {
            out.push(notification);
        }
        out
    }

    /// Ticks rendered so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the thread and take the graph back
    ///
    /// Returns `None` if the loop thread panicked.
    pub fn stop(mut self) -> Option<Graph> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Graph> {
        self.running.store(false, Ordering::Release);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(graph) => {
                info!("audio loop stopped after {} ticks", self.ticks());
                Some(graph)
            }
            Err(_) => {
                error!("audio loop thread panicked");
                None
            }
        }
    }
}

impl Drop for AudioLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    graph: Graph,
    settings: LoopSettings,
    launcher: TaskLauncher,
    task_rx: TaskConsumer,
    notification_tx: NotificationProducer,
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
}

impl Worker {
    fn run(mut self) -> Graph {
        let period = self.settings.period();

        while self.running.load(Ordering::Acquire) {
            let started = Instant::now();

            self.launch_pending();
            let tic = self.graph.soundcard().tic_counter();
            for err in self.graph.tick(self.settings.policy) {
                self.notify(Notification::error(NotificationCategory::Recall, tic, err.to_string()));
            }
            self.ticks.fetch_add(1, Ordering::AcqRel);

            let elapsed = started.elapsed();
            match period.checked_sub(elapsed) {
                Some(rest) => thread::sleep(rest),
                None if !period.is_zero() => self.notify(Notification::warning(
                    NotificationCategory::Audio,
                    tic,
                    format!("tick took {:?}, period is {:?}", elapsed, period),
                )),
                None => {}
            }
        }

        // Tasks queued before stop still apply
        self.launch_pending();
        self.graph
    }

    fn launch_pending(&mut self) {
        while let Some(task) = self.task_rx.try_pop() {
            self.launcher.append(task);
        }

        let tic = self.graph.soundcard().tic_counter();
        for failure in self.launcher.launch_all(&mut self.graph) {
            self.notify(Notification::error(
                NotificationCategory::Task,
                tic,
                format!("{}: {}", failure.description, failure.error),
            ));
        }
    }

    fn notify(&mut self, notification: Notification) {
        if self.notification_tx.try_push(notification).is_err() {
            warn!("notification queue full, dropping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::Presets;

    #[test]
    fn test_period_from_precision() {
        let graph = Graph::new(Presets::default()).unwrap();
        let mut settings = LoopSettings::for_graph(&graph);
        assert!((settings.max_precision - 44100.0 / 512.0).abs() < 1e-9);

        settings.max_precision = 0.0;
        assert_eq!(settings.period(), Duration::ZERO);
    }

    #[test]
    fn test_stop_returns_graph() {
        let mut graph = Graph::new(Presets::default()).unwrap();
        graph.add_audio("a", 1, 1, 1).unwrap();
        let settings = LoopSettings {
            max_precision: 1000.0,
            ..LoopSettings::for_graph(&graph)
        };

        let audio_loop = AudioLoop::spawn(graph, settings).unwrap();
        assert!(audio_loop.is_running());
        let graph = audio_loop.stop().unwrap();
        assert_eq!(graph.audio_ids().len(), 1);
    }
}

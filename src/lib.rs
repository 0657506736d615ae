// Recall engine - Library exports for tests and benchmarks

pub mod audio;
pub mod config;
pub mod graph;
pub mod messaging;
pub mod recall;
pub mod synth;
pub mod task;
pub mod thread;

// Re-export commonly used types for convenience
pub use audio::{Port, Presets, SampleBuffer, SoundcardFormat};
pub use config::{Config, ConfigError};
pub use graph::{AudioId, ChannelId, Graph, GraphError, Notation, Note, RecyclingId, SignalId};
pub use messaging::{Notification, NotificationCategory, NotificationLevel};
pub use recall::{GroupId, NotationTemplates, RecallError, RecallFlags, RecallHandle, RecallId};
pub use synth::{SeqSynthUtil, WaveformType};
pub use task::{Task, TaskError, TaskLauncher};
pub use thread::{AudioLoop, LoopSettings, SchedulingPolicy};

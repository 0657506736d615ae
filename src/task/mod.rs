// Task system - structural graph mutations launched between ticks

pub mod audio_tasks;
pub mod import_tasks;
pub mod launcher;
pub mod recall_tasks;
pub mod trait_def;

pub use audio_tasks::{
    AddNote, CancelAudio, LinkChannel, MoveNote, ResizeAudio, SetPresets, StartAudio,
};
pub use import_tasks::{
    ApplySeqSynth, DecodedWave, InstrumentDecoder, MemoryInstrument, OpenSf2Instrument,
    OpenSingleFile, decode_wave,
};
pub use launcher::{TaskFailure, TaskLauncher};
pub use recall_tasks::{CancelRecall, RemoveAudioSignal, RemoveRecall, RemoveRecycling};
pub use trait_def::{LaunchGuard, Task, TaskError, TaskResult};

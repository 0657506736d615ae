// Module graph - Channel/Recycling topology and the context owning it
//
// The Graph owns every Audio, Channel, Recycling, AudioSignal and Recall in
// slotmaps. Objects reference each other by id. A Graph is owned
// by exactly one thread at a time (the audio loop while running); other
// threads reach it only through tasks.

pub mod audio;
pub mod audio_signal;
pub mod channel;
pub mod key;
pub mod notation;
pub mod recycling;
pub mod soundcard;

use crate::audio::format::{Presets, SoundcardFormat};
use crate::audio::port::Port;
use crate::recall::recall_id::{GroupId, RecallId, RecallIdFlags};
use crate::recall::{RecallHandle, RecallNode};
use crate::task::trait_def::{Task, TaskError};
use log::{debug, warn};
use slotmap::SlotMap;
use std::collections::{TryReserveError, VecDeque};

pub use audio::{Audio, AudioId};
pub use audio_signal::{AudioSignal, SignalId, SignalKind};
pub use channel::{Channel, ChannelId, RecyclingChange};
pub use notation::{Notation, Note};
pub use recycling::{Recycling, RecyclingId};
pub use soundcard::Soundcard;

/// Default tempo of new graphs
pub const DEFAULT_BPM: f64 = 120.0;

/// Passes `launch_scheduled` runs before giving up on a self-requeueing queue
const MAX_SCHEDULED_PASSES: usize = 256;

/// Graph error types
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown audio: {0}")]
    UnknownAudio(AudioId),

    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("Unknown recycling: {0}")]
    UnknownRecycling(RecyclingId),

    #[error("Unknown audio signal: {0}")]
    UnknownSignal(SignalId),

    #[error("{audio} has no audio channel {audio_channel}")]
    NoSuchAudioChannel {
        audio: AudioId,
        audio_channel: usize,
    },

    #[error("Invalid format {format} at {samplerate} Hz with buffer size {buffer_size}")]
    InvalidFormat {
        format: SoundcardFormat,
        samplerate: u32,
        buffer_size: usize,
    },

    #[error("Cannot link {channel} to {link}: both on the same side")]
    InvalidLink { channel: ChannelId, link: ChannelId },

    #[error("Invalid frame count: {0}")]
    InvalidFrameCount(usize),

    #[error("{0} has no template signal")]
    MissingTemplate(RecyclingId),

    #[error("Allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),
}

pub type GraphResult<T> = Result<T, GraphError>;

pub struct Graph {
    pub(crate) audios: SlotMap<AudioId, Audio>,
    pub(crate) channels: SlotMap<ChannelId, Channel>,
    pub(crate) recyclings: SlotMap<RecyclingId, Recycling>,
    pub(crate) signals: SlotMap<SignalId, AudioSignal>,
    pub(crate) recalls: SlotMap<RecallHandle, RecallNode>,
    pub(crate) soundcard: Soundcard,
    scheduled: VecDeque<Box<dyn Task>>,
    next_group: u64,
    bpm: Port,
}

impl Graph {
    pub fn new(presets: Presets) -> GraphResult<Self> {
        if !presets.is_valid() {
            return Err(GraphError::InvalidFormat {
                format: presets.format,
                samplerate: presets.samplerate,
                buffer_size: presets.buffer_size,
            });
        }

        Ok(Self {
            audios: SlotMap::with_key(),
            channels: SlotMap::with_key(),
            recyclings: SlotMap::with_key(),
            signals: SlotMap::with_key(),
            recalls: SlotMap::with_key(),
            soundcard: Soundcard::new(presets)?,
            scheduled: VecDeque::new(),
            next_group: 1,
            bpm: Port::double("bpm", DEFAULT_BPM),
        })
    }

    pub fn presets(&self) -> &Presets {
        self.soundcard.presets()
    }

    pub fn soundcard(&self) -> &Soundcard {
        &self.soundcard
    }

    /// Switch soundcard presets and convert every signal to them
    pub fn set_presets(&mut self, presets: Presets) -> GraphResult<()> {
        if !presets.is_valid() {
            return Err(GraphError::InvalidFormat {
                format: presets.format,
                samplerate: presets.samplerate,
                buffer_size: presets.buffer_size,
            });
        }

        self.soundcard.realloc(presets)?;
        for signal in self.signals.values_mut() {
            signal.convert(&presets)?;
        }

        debug!(
            "presets {} Hz, {} frames, {}, {} channels",
            presets.samplerate, presets.buffer_size, presets.format, presets.pcm_channels
        );
        Ok(())
    }

    /// Tempo port shared with every delay recall
    pub fn bpm(&self) -> &Port {
        &self.bpm
    }

    pub fn audio(&self, id: AudioId) -> GraphResult<&Audio> {
        self.audios.get(id).ok_or(GraphError::UnknownAudio(id))
    }

    pub(crate) fn audio_mut(&mut self, id: AudioId) -> GraphResult<&mut Audio> {
        self.audios.get_mut(id).ok_or(GraphError::UnknownAudio(id))
    }

    pub fn audio_ids(&self) -> Vec<AudioId> {
        self.audios.keys().collect()
    }

    pub fn channel(&self, id: ChannelId) -> GraphResult<&Channel> {
        self.channels.get(id).ok_or(GraphError::UnknownChannel(id))
    }

    pub(crate) fn channel_mut(&mut self, id: ChannelId) -> GraphResult<&mut Channel> {
        self.channels.get_mut(id).ok_or(GraphError::UnknownChannel(id))
    }

    pub fn recycling(&self, id: RecyclingId) -> GraphResult<&Recycling> {
        self.recyclings
            .get(id)
            .ok_or(GraphError::UnknownRecycling(id))
    }

    pub(crate) fn recycling_mut(&mut self, id: RecyclingId) -> GraphResult<&mut Recycling> {
        self.recyclings
            .get_mut(id)
            .ok_or(GraphError::UnknownRecycling(id))
    }

    pub fn signal(&self, id: SignalId) -> GraphResult<&AudioSignal> {
        self.signals.get(id).ok_or(GraphError::UnknownSignal(id))
    }

    pub fn signal_mut(&mut self, id: SignalId) -> GraphResult<&mut AudioSignal> {
        self.signals.get_mut(id).ok_or(GraphError::UnknownSignal(id))
    }

    pub fn contains_signal(&self, id: SignalId) -> bool {
        self.signals.contains_key(id)
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Allocate a fresh group for a new playback pass
    pub fn next_recall_id(&mut self, flags: RecallIdFlags) -> RecallId {
        let group_id = GroupId(self.next_group);
        self.next_group += 1;
        RecallId::new(group_id, flags)
    }

    /// Queue internal work to run between ticks
    pub fn schedule(&mut self, task: Box<dyn Task>) {
        debug!("schedule: {}", task.description());
        self.scheduled.push_back(task);
    }

    pub fn has_scheduled(&self) -> bool {
        !self.scheduled.is_empty()
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    /// Run scheduled tasks until the queue is empty
    ///
    /// Tasks may schedule follow-up work; each pass takes the whole queue.
    /// Failed tasks are returned with their description.
    pub fn launch_scheduled(&mut self) -> Vec<(String, TaskError)> {
        let mut failures = Vec::new();

        for _ in 0..MAX_SCHEDULED_PASSES {
            if self.scheduled.is_empty() {
                return failures;
            }

            let pass = std::mem::take(&mut self.scheduled);
            for mut task in pass {
                if let Err(err) = task.launch(self) {
                    warn!("scheduled task failed: {}: {}", task.description(), err);
                    failures.push((task.description(), err));
                }
            }
        }

        warn!(
            "scheduled queue still busy after {} passes, {} tasks left",
            MAX_SCHEDULED_PASSES,
            self.scheduled.len()
        );
        failures
    }
}

// Module recall - Processing nodes of the graph
//
// A recall exists either as a TEMPLATE (registered once on its container,
// never run) or as a runtime instance duplicated from a template for one
// RecallId. Runtime instances form trees: a PlayChannelRun owns one
// PlayRecycling per recycling in range, which owns one PlayAudioSignal per
// playing signal.
//
// Nodes live in the graph's recall slotmap. The concrete behaviour of a node
// is a `RecallKind`; it is taken out of the node while one of its hooks runs
// with mutable access to the graph.

pub mod count_beats_audio_run;
pub mod copy_notation_audio_run;
pub mod delay_audio_run;
pub mod dependency;
pub mod factory;
pub mod lifecycle;
pub mod play_audio_signal;
pub mod play_channel_run;
pub mod play_recycling;
pub mod recall_id;

use crate::graph::key::graph_key;
use crate::graph::{AudioId, ChannelId, Graph, GraphError, RecyclingId, SignalId};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

pub use count_beats_audio_run::CountBeatsAudioRun;
pub use copy_notation_audio_run::CopyNotationAudioRun;
pub use delay_audio_run::DelayAudioRun;
pub use dependency::RecallDependency;
pub use factory::NotationTemplates;
pub use play_audio_signal::PlayAudioSignal;
pub use play_channel_run::PlayChannelRun;
pub use play_recycling::PlayRecycling;
pub use recall_id::{GroupId, RecallId, RecallIdFlags};

graph_key!(
    /// Id of a recall node in the graph
    RecallHandle,
    "recall"
);

/// Recall error types
#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    #[error("{0} is not a template")]
    NotTemplate(RecallHandle),

    #[error("{0} is a template and cannot run")]
    TemplateNotRunnable(RecallHandle),

    #[error("{recall} has no {dependency:?} in {group}")]
    MissingDependency {
        recall: String,
        dependency: RecallType,
        group: GroupId,
    },

    #[error("{recall} has {found} candidates for {dependency:?} in {group}")]
    AmbiguousDependency {
        recall: String,
        dependency: RecallType,
        group: GroupId,
        found: usize,
    },

    #[error("Unknown recall: {0}")]
    UnknownRecall(RecallHandle),

    #[error("{0} is busy")]
    Busy(RecallHandle),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type RecallResult<T> = Result<T, RecallError>;

/// Lifecycle flags of a recall node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecallFlags(u16);

impl RecallFlags {
    pub const NONE: Self = Self(0);
    pub const TEMPLATE: Self = Self(1);
    pub const RUN_INITIALIZED: Self = Self(1 << 1);
    pub const DONE: Self = Self(1 << 2);
    pub const CANCELLED: Self = Self(1 << 3);
    pub const HIDE: Self = Self(1 << 4);
    pub const REMOVE: Self = Self(1 << 5);
    /// Never becomes done on its own
    pub const PERSISTENT: Self = Self(1 << 6);
    /// Becomes done when its last child is done
    pub const PROPAGATE_DONE: Self = Self(1 << 7);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Flags that stop a node from running
    pub fn is_inactive(self) -> bool {
        self.intersects(Self::TEMPLATE | Self::DONE | Self::CANCELLED | Self::HIDE)
    }
}

impl BitOr for RecallFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RecallFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Concrete recall type, used to declare and match dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecallType {
    DelayAudioRun,
    CountBeatsAudioRun,
    CopyNotationAudioRun,
    PlayChannelRun,
    PlayRecycling,
    PlayAudioSignal,
}

/// Object a recall is registered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallContainer {
    Audio(AudioId),
    Channel(ChannelId),
}

/// Graph object a child recall processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallSource {
    Recycling(RecyclingId),
    AudioSignal(SignalId),
}

/// Stage of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Pre,
    Inter,
    Post,
}

/// Events a delay recall raises once per 16th note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicPhase {
    AllocInput,
    Count,
}

/// Change notifications of a recycling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Added,
    Removed,
}

/// What a hook asks the graph to do with its recall afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Continue,
    Done,
}

/// A recall node in the graph
pub struct RecallNode {
    pub handle: RecallHandle,
    pub flags: RecallFlags,
    pub recall_id: Option<RecallId>,
    pub container: RecallContainer,
    pub parent: Option<RecallHandle>,
    pub children: Vec<RecallHandle>,
    /// Template this runtime instance was duplicated from
    pub template: Option<RecallHandle>,
    /// Declared on templates, resolved per group on runtime instances
    pub dependencies: Vec<RecallDependency>,
    pub source: Option<RecallSource>,
    pub(crate) behavior: Option<RecallKind>,
}

impl RecallNode {
    pub fn is_template(&self) -> bool {
        self.flags.contains(RecallFlags::TEMPLATE)
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.recall_id.map(|id| id.group_id)
    }

    pub fn behavior(&self) -> Option<&RecallKind> {
        self.behavior.as_ref()
    }

    pub fn recall_type(&self) -> Option<RecallType> {
        self.behavior.as_ref().map(|b| b.recall_type())
    }
}

impl fmt::Debug for RecallNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecallNode")
            .field("handle", &self.handle)
            .field("type", &self.recall_type())
            .field("flags", &self.flags)
            .field("recall_id", &self.recall_id)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// Behaviour of a recall
///
/// Every hook receives the graph and the recall's own handle. Hooks that
/// return [`RunStatus::Done`] have the graph mark the recall done once the
/// hook returned.
pub trait Recall: Send {
    fn recall_type(&self) -> RecallType;

    fn name(&self) -> &'static str;

    /// Copy subtype fields for a new runtime instance of `recall_id`
    ///
    /// Ports are shared with the template, run state starts fresh.
    fn duplicate(&self, recall_id: &RecallId) -> RecallKind;

    /// Build structure that depends on the current topology
    fn map(&mut self, _graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        Ok(())
    }

    /// Accept the runtime sibling resolved for a declared dependency
    fn resolve_dependency(
        &mut self,
        _graph: &mut Graph,
        _this: RecallHandle,
        _dependency: RecallType,
        _resolved: RecallHandle,
    ) -> RecallResult<()> {
        Ok(())
    }

    fn run_init_pre(&mut self, _graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        Ok(())
    }

    fn run(
        &mut self,
        _graph: &mut Graph,
        _this: RecallHandle,
        _stage: RunStage,
    ) -> RecallResult<RunStatus> {
        Ok(RunStatus::Continue)
    }

    fn on_tic(
        &mut self,
        _graph: &mut Graph,
        _this: RecallHandle,
        _phase: TicPhase,
    ) -> RecallResult<RunStatus> {
        Ok(RunStatus::Continue)
    }

    fn on_done(&mut self, _graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        Ok(())
    }

    fn on_cancel(&mut self, _graph: &mut Graph, _this: RecallHandle) -> RecallResult<()> {
        Ok(())
    }

    fn on_child_done(
        &mut self,
        _graph: &mut Graph,
        _this: RecallHandle,
        _child: RecallHandle,
    ) -> RecallResult<()> {
        Ok(())
    }

    /// React to the container's recycling range changing
    fn remap_child_source(
        &mut self,
        _graph: &mut Graph,
        _this: RecallHandle,
        _old: &[RecyclingId],
        _new: &[RecyclingId],
    ) -> RecallResult<()> {
        Ok(())
    }
}

/// Observer of a recycling's signal list
pub trait RecyclingListener {
    fn on_signal_added(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        recycling: RecyclingId,
        signal: SignalId,
    ) -> RecallResult<()>;

    fn on_signal_removed(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        recycling: RecyclingId,
        signal: SignalId,
    ) -> RecallResult<()>;
}

/// Closed set of recall behaviours
pub enum RecallKind {
    DelayAudioRun(DelayAudioRun),
    CountBeatsAudioRun(CountBeatsAudioRun),
    CopyNotationAudioRun(CopyNotationAudioRun),
    PlayChannelRun(PlayChannelRun),
    PlayRecycling(PlayRecycling),
    PlayAudioSignal(PlayAudioSignal),
}

impl RecallKind {
    pub fn as_recall(&self) -> &dyn Recall {
        match self {
            RecallKind::DelayAudioRun(recall) => recall,
            RecallKind::CountBeatsAudioRun(recall) => recall,
            RecallKind::CopyNotationAudioRun(recall) => recall,
            RecallKind::PlayChannelRun(recall) => recall,
            RecallKind::PlayRecycling(recall) => recall,
            RecallKind::PlayAudioSignal(recall) => recall,
        }
    }

    pub fn as_recall_mut(&mut self) -> &mut dyn Recall {
        match self {
            RecallKind::DelayAudioRun(recall) => recall,
            RecallKind::CountBeatsAudioRun(recall) => recall,
            RecallKind::CopyNotationAudioRun(recall) => recall,
            RecallKind::PlayChannelRun(recall) => recall,
            RecallKind::PlayRecycling(recall) => recall,
            RecallKind::PlayAudioSignal(recall) => recall,
        }
    }

    pub fn as_recycling_listener(&mut self) -> Option<&mut dyn RecyclingListener> {
        match self {
            RecallKind::PlayRecycling(recall) => Some(recall),
            _ => None,
        }
    }

    pub fn recall_type(&self) -> RecallType {
        self.as_recall().recall_type()
    }

    pub fn name(&self) -> &'static str {
        self.as_recall().name()
    }
}

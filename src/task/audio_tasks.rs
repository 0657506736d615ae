// Audio tasks - playback passes, topology and notation edits

use crate::audio::format::Presets;
use crate::graph::{AudioId, ChannelId, Graph, Note};
use crate::recall::{
    GroupId, RecallError, RecallHandle, RecallId, RecallIdFlags, RecallKind,
};
use crate::task::recall_tasks::RemoveAudioSignal;
use crate::task::trait_def::{LaunchGuard, Task, TaskError, TaskResult};
use log::{info, warn};

/// Start a notation playback pass of an audio
///
/// Every template on the audio and its channels is duplicated for one new
/// recall id, dependencies are resolved, then all instances are initialized.
pub struct StartAudio {
    audio: AudioId,
    recall_id: Option<RecallId>,
    /// 16th notes to play; the notation's end when unset
    length: Option<u64>,
    guard: LaunchGuard,
}

impl StartAudio {
    pub fn new(audio: AudioId) -> Self {
        Self {
            audio,
            recall_id: None,
            length: None,
            guard: LaunchGuard::new(),
        }
    }

    /// Start with a recall id allocated by the caller
    pub fn with_recall_id(audio: AudioId, recall_id: RecallId) -> Self {
        Self {
            recall_id: Some(recall_id),
            ..Self::new(audio)
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    fn templates(graph: &Graph, audio: AudioId) -> TaskResult<Vec<RecallHandle>> {
        let entry = graph.audio(audio)?;
        let mut templates: Vec<RecallHandle> = entry.recalls().to_vec();
        for channel in entry.input().iter().chain(entry.output()) {
            templates.extend_from_slice(graph.channel(*channel)?.recalls());
        }

        templates.retain(|h| graph.recall(*h).is_ok_and(|n| n.is_template()));
        Ok(templates)
    }

    fn pass_length(&self, graph: &Graph) -> TaskResult<u64> {
        match self.length {
            Some(length) => Ok(length),
            None => Ok(graph
                .audio(self.audio)?
                .notation
                .iter()
                .map(|n| n.end_offset())
                .max()
                .unwrap_or(0)),
        }
    }

    fn instantiate(
        graph: &mut Graph,
        templates: &[RecallHandle],
        recall_id: RecallId,
        length: u64,
        created: &mut Vec<RecallHandle>,
    ) -> Result<(), RecallError> {
        for template in templates {
            created.push(graph.duplicate_recall(*template, recall_id)?);
        }

        // Length belongs to this pass only
        for handle in created.iter() {
            if let Some(RecallKind::CountBeatsAudioRun(run)) = graph.recall(*handle)?.behavior() {
                run.length()
                    .set_f64(length as f64)
                    .map_err(|err| RecallError::InvalidState(err.to_string()))?;
            }
        }

        for handle in created.iter() {
            graph.resolve_dependencies(*handle)?;
        }
        for handle in created.iter() {
            graph.run_init_pre(*handle)?;
        }
        Ok(())
    }
}

impl Task for StartAudio {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("start-audio")?;

        let templates = Self::templates(graph, self.audio)?;
        let length = self.pass_length(graph)?;

        let recall_id = match self.recall_id {
            Some(recall_id) => {
                let running = graph
                    .active_groups(self.audio)
                    .iter()
                    .any(|g| g.same_group(&recall_id));
                if running {
                    return Err(TaskError::InvalidArgument(format!(
                        "{} already plays {}",
                        self.audio, recall_id
                    )));
                }
                recall_id
            }
            None => graph.next_recall_id(RecallIdFlags::NOTATION | RecallIdFlags::PLAYBACK),
        };
        self.recall_id = Some(recall_id);

        let mut created = Vec::with_capacity(templates.len());
        if let Err(err) = Self::instantiate(graph, &templates, recall_id, length, &mut created) {
            for handle in created {
                if let Err(cancel_err) = graph.cancel_recall(handle) {
                    warn!("rollback of {} failed: {}", handle, cancel_err);
                }
            }
            return Err(err.into());
        }

        info!(
            "start {} as {} with {} recalls",
            self.audio,
            recall_id,
            created.len()
        );
        Ok(())
    }

    fn description(&self) -> String {
        format!("Start {}", self.audio)
    }
}

/// Cancel the running passes of an audio, or only one group
pub struct CancelAudio {
    audio: AudioId,
    group: Option<GroupId>,
    guard: LaunchGuard,
}

impl CancelAudio {
    pub fn new(audio: AudioId, group: Option<GroupId>) -> Self {
        Self {
            audio,
            group,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for CancelAudio {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("cancel-audio")?;

        let entry = graph.audio(self.audio)?;
        let channels: Vec<ChannelId> = entry.input().iter().chain(entry.output()).copied().collect();
        let mut recalls: Vec<RecallHandle> = entry.recalls().to_vec();
        for channel in &channels {
            recalls.extend_from_slice(graph.channel(*channel)?.recalls());
        }

        let group = self.group;
        let in_group = |recall_id: Option<RecallId>| match (group, recall_id) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(group), Some(recall_id)) => recall_id.group_id == group,
        };

        let mut cancelled = 0;
        for handle in recalls {
            let node = graph.recall(handle)?;
            if node.is_template() || !in_group(node.recall_id) {
                continue;
            }
            graph.cancel_recall(handle)?;
            cancelled += 1;
        }

        // Signals no play recall picked up are released as well
        let mut signals = Vec::new();
        for channel in &channels {
            for recycling in graph.channel_recyclings(*channel)? {
                for signal in graph.recycling(recycling)?.audio_signals() {
                    if in_group(graph.signal(*signal)?.recall_id) {
                        signals.push(*signal);
                    }
                }
            }
        }
        for signal in signals {
            graph.schedule(Box::new(RemoveAudioSignal::new(signal)));
        }

        info!("cancel {} recalls of {}", cancelled, self.audio);
        Ok(())
    }

    fn description(&self) -> String {
        match self.group {
            Some(group) => format!("Cancel {} of {}", group, self.audio),
            None => format!("Cancel {}", self.audio),
        }
    }
}

/// Change the channel grid of an audio
pub struct ResizeAudio {
    audio: AudioId,
    audio_channels: usize,
    output_pads: usize,
    input_pads: usize,
    guard: LaunchGuard,
}

impl ResizeAudio {
    pub fn new(audio: AudioId, audio_channels: usize, output_pads: usize, input_pads: usize) -> Self {
        Self {
            audio,
            audio_channels,
            output_pads,
            input_pads,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for ResizeAudio {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("resize-audio")?;
        let outcome = graph.resize_audio(
            self.audio,
            self.audio_channels,
            self.output_pads,
            self.input_pads,
        )?;

        info!(
            "resize {}: {} channels added, {} removed",
            self.audio,
            outcome.added.len(),
            outcome.removed.len()
        );
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "Resize {} to {} channels, {} outputs, {} inputs",
            self.audio, self.audio_channels, self.output_pads, self.input_pads
        )
    }
}

/// Apply new soundcard presets
pub struct SetPresets {
    presets: Presets,
    guard: LaunchGuard,
}

impl SetPresets {
    pub fn new(presets: Presets) -> Self {
        Self {
            presets,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for SetPresets {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("set-presets")?;
        graph.set_presets(self.presets)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "Set presets {} Hz / {} frames / {}",
            self.presets.samplerate, self.presets.buffer_size, self.presets.format
        )
    }
}

/// Link a channel to a channel of the opposite side, or unlink it
pub struct LinkChannel {
    channel: ChannelId,
    link: Option<ChannelId>,
    guard: LaunchGuard,
}

impl LinkChannel {
    pub fn new(channel: ChannelId, link: Option<ChannelId>) -> Self {
        Self {
            channel,
            link,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for LinkChannel {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("link-channel")?;
        let changes = graph.set_link(self.channel, self.link)?;
        graph.apply_recycling_changes(&changes)?;
        Ok(())
    }

    fn description(&self) -> String {
        match self.link {
            Some(link) => format!("Link {} to {}", self.channel, link),
            None => format!("Unlink {}", self.channel),
        }
    }
}

/// Add a note to the notation of one audio channel
pub struct AddNote {
    audio: AudioId,
    audio_channel: usize,
    note: Note,
    guard: LaunchGuard,
}

impl AddNote {
    pub fn new(audio: AudioId, audio_channel: usize, note: Note) -> Self {
        Self {
            audio,
            audio_channel,
            note,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for AddNote {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("add-note")?;
        graph
            .notation_mut(self.audio, self.audio_channel)?
            .add_note(self.note);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "Add note {}..{} pad {} to {}",
            self.note.x0, self.note.x1, self.note.y, self.audio
        )
    }
}

/// Move a note to another offset and pad
///
/// Running passes keep the notation they started with.
pub struct MoveNote {
    audio: AudioId,
    audio_channel: usize,
    from: (u64, usize),
    to: (u64, usize),
    guard: LaunchGuard,
}

impl MoveNote {
    pub fn new(
        audio: AudioId,
        audio_channel: usize,
        from: (u64, usize),
        to: (u64, usize),
    ) -> Self {
        Self {
            audio,
            audio_channel,
            from,
            to,
            guard: LaunchGuard::new(),
        }
    }
}

impl Task for MoveNote {
    fn launch(&mut self, graph: &mut Graph) -> TaskResult<()> {
        self.guard.begin("move-note")?;
        let (x0, y) = self.from;
        let (new_x0, new_y) = self.to;

        graph
            .notation_mut(self.audio, self.audio_channel)?
            .move_note(x0, y, new_x0, new_y)
            .ok_or_else(|| {
                TaskError::InvalidArgument(format!("no note at {} on pad {}", x0, y))
            })?;
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "Move note {:?} -> {:?} on {}",
            self.from, self.to, self.audio
        )
    }
}

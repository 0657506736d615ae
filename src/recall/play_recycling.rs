// PlayRecycling - bridges a recycling's signal list into PlayAudioSignal children

use crate::graph::{Graph, RecyclingId, SignalId};
use crate::recall::{
    PlayAudioSignal, Recall, RecallFlags, RecallHandle, RecallId, RecallKind, RecallResult,
    RecallSource, RecallType, RecyclingListener,
};
use log::debug;

pub struct PlayRecycling {
    recycling: RecyclingId,
    pcm_channel: usize,
}

impl PlayRecycling {
    pub fn new(recycling: RecyclingId, pcm_channel: usize) -> Self {
        Self {
            recycling,
            pcm_channel,
        }
    }

    pub fn recycling(&self) -> RecyclingId {
        self.recycling
    }

    pub fn pcm_channel(&self) -> usize {
        self.pcm_channel
    }

    /// Whether `signal` is an instance of this recall's own group
    fn accepts(&self, graph: &Graph, this: RecallHandle, signal: SignalId) -> RecallResult<bool> {
        let group = graph.recall(this)?.group_id();
        let signal = graph.signal(signal)?;

        Ok(!signal.is_template() && group.is_some() && signal.recall_id.map(|id| id.group_id) == group)
    }

    fn child_for(&self, graph: &Graph, this: RecallHandle, signal: SignalId) -> Option<RecallHandle> {
        graph.recall(this).ok()?.children.iter().copied().find(|child| {
            graph
                .recall(*child)
                .is_ok_and(|n| n.source == Some(RecallSource::AudioSignal(signal)))
        })
    }
}

impl Recall for PlayRecycling {
    fn recall_type(&self) -> RecallType {
        RecallType::PlayRecycling
    }

    fn name(&self) -> &'static str {
        "play-recycling"
    }

    fn duplicate(&self, _recall_id: &RecallId) -> RecallKind {
        RecallKind::PlayRecycling(Self::new(self.recycling, self.pcm_channel))
    }

    fn map(&mut self, graph: &mut Graph, this: RecallHandle) -> RecallResult<()> {
        graph.add_recycling_listener(self.recycling, this)?;
        Ok(())
    }

    fn on_child_done(
        &mut self,
        graph: &mut Graph,
        _this: RecallHandle,
        child: RecallHandle,
    ) -> RecallResult<()> {
        graph
            .recall_mut(child)?
            .flags
            .insert(RecallFlags::REMOVE | RecallFlags::HIDE);
        Ok(())
    }

    fn on_cancel(&mut self, graph: &mut Graph, this: RecallHandle) -> RecallResult<()> {
        graph.remove_recycling_listener(self.recycling, this);
        Ok(())
    }
}

impl RecyclingListener for PlayRecycling {
    fn on_signal_added(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        recycling: RecyclingId,
        signal: SignalId,
    ) -> RecallResult<()> {
        if recycling != self.recycling || !self.accepts(graph, this, signal)? {
            return Ok(());
        }

        let entry = graph.signal_mut(signal)?;
        entry.rewind();
        let attack = entry.attack;
        let child = graph.add_child_recall(
            this,
            RecallKind::PlayAudioSignal(PlayAudioSignal::new(signal, self.pcm_channel, attack)),
            RecallSource::AudioSignal(signal),
        )?;

        debug!("{}: {} plays {}", this, child, signal);
        Ok(())
    }

    fn on_signal_removed(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        recycling: RecyclingId,
        signal: SignalId,
    ) -> RecallResult<()> {
        if recycling != self.recycling || !self.accepts(graph, this, signal)? {
            return Ok(());
        }

        let Some(child) = self.child_for(graph, this, signal) else {
            return Ok(());
        };
        let node = graph.recall_mut(child)?;
        if node.flags.contains(RecallFlags::DONE) {
            return Ok(());
        }

        node.flags.insert(RecallFlags::HIDE);
        graph.cancel_recall(child)
    }
}

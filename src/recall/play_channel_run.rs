// PlayChannelRun - plays every recycling of an input channel

use crate::graph::{ChannelId, Graph, RecyclingId};
use crate::recall::{
    PlayRecycling, Recall, RecallHandle, RecallId, RecallKind, RecallResult,
    RecallSource, RecallType,
};
use log::debug;

/// Owns one PlayRecycling child per recycling in range of `channel`
pub struct PlayChannelRun {
    channel: ChannelId,
}

impl PlayChannelRun {
    pub fn new(channel: ChannelId) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Create PlayRecycling children for the channel's current range
    fn map_play_recycling(&self, graph: &mut Graph, this: RecallHandle) -> RecallResult<()> {
        for recycling in graph.channel_recyclings(self.channel)? {
            self.add_play_recycling(graph, this, recycling)?;
        }
        Ok(())
    }

    fn add_play_recycling(
        &self,
        graph: &mut Graph,
        this: RecallHandle,
        recycling: RecyclingId,
    ) -> RecallResult<RecallHandle> {
        let pcm_channels = graph.soundcard().pcm_channels().max(1);
        let pcm_channel = graph.channel(self.channel)?.audio_channel % pcm_channels;

        let child = graph.add_child_recall(
            this,
            RecallKind::PlayRecycling(PlayRecycling::new(recycling, pcm_channel)),
            RecallSource::Recycling(recycling),
        )?;
        debug!("{}: play {} with {}", this, recycling, child);
        Ok(child)
    }
}

impl Recall for PlayChannelRun {
    fn recall_type(&self) -> RecallType {
        RecallType::PlayChannelRun
    }

    fn name(&self) -> &'static str {
        "play-channel-run"
    }

    fn duplicate(&self, _recall_id: &RecallId) -> RecallKind {
        RecallKind::PlayChannelRun(Self::new(self.channel))
    }

    fn map(&mut self, graph: &mut Graph, this: RecallHandle) -> RecallResult<()> {
        self.map_play_recycling(graph, this)
    }

    /// Cancel children of recyclings that left the range, add children for
    /// recyclings that entered it
    fn remap_child_source(
        &mut self,
        graph: &mut Graph,
        this: RecallHandle,
        old: &[RecyclingId],
        new: &[RecyclingId],
    ) -> RecallResult<()> {
        let children = graph.recall(this)?.children.clone();

        for recycling in old.iter().filter(|r| !new.contains(r)) {
            for child in &children {
                let matches = graph
                    .recall(*child)
                    .is_ok_and(|n| n.source == Some(RecallSource::Recycling(*recycling)));
                if matches {
                    graph.cancel_recall(*child)?;
                }
            }
        }

        for recycling in new.iter().filter(|r| !old.contains(r)) {
            self.add_play_recycling(graph, this, *recycling)?;
        }
        Ok(())
    }
}

// Channel - one input or output line of an Audio
//
// Channels form two linked lists: prev/next across audio channels of one
// pad, prev_pad/next_pad across pads of one audio channel. Each channel
// points at a first..last range of the recycling chain. A linked input
// channel shares the range of the output it is linked to.

use crate::graph::key::graph_key;
use crate::graph::audio::AudioId;
use crate::graph::recycling::RecyclingId;
use crate::graph::{Graph, GraphError, GraphResult};
use crate::recall::RecallHandle;
use log::debug;

graph_key!(
    /// Id of a Channel in the graph
    ChannelId,
    "channel"
);

#[derive(Debug, Clone)]
pub struct Channel {
    pub audio: AudioId,
    pub is_output: bool,
    pub pad: usize,
    pub audio_channel: usize,
    pub line: usize,

    pub prev: Option<ChannelId>,
    pub next: Option<ChannelId>,
    pub prev_pad: Option<ChannelId>,
    pub next_pad: Option<ChannelId>,

    pub link: Option<ChannelId>,

    pub first_recycling: Option<RecyclingId>,
    pub last_recycling: Option<RecyclingId>,

    /// Recall templates and runtime recalls living on this channel
    pub(crate) recalls: Vec<RecallHandle>,
}

impl Channel {
    pub(crate) fn new(audio: AudioId, is_output: bool, pad: usize, audio_channel: usize, audio_channels: usize) -> Self {
        Self {
            audio,
            is_output,
            pad,
            audio_channel,
            line: pad * audio_channels + audio_channel,
            prev: None,
            next: None,
            prev_pad: None,
            next_pad: None,
            link: None,
            first_recycling: None,
            last_recycling: None,
            recalls: Vec::new(),
        }
    }

    pub fn recalls(&self) -> &[RecallHandle] {
        &self.recalls
    }
}

/// Recycling range of a channel before and after a structural change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecyclingChange {
    pub channel: ChannelId,
    pub old: Vec<RecyclingId>,
    pub new: Vec<RecyclingId>,
}

impl RecyclingChange {
    /// Recyclings that left the range
    pub fn removed(&self) -> impl Iterator<Item = RecyclingId> + '_ {
        self.old.iter().copied().filter(|r| !self.new.contains(r))
    }

    /// Recyclings that entered the range
    pub fn added(&self) -> impl Iterator<Item = RecyclingId> + '_ {
        self.new.iter().copied().filter(|r| !self.old.contains(r))
    }

    pub fn is_empty(&self) -> bool {
        self.old == self.new
    }
}

impl Graph {
    /// Recyclings currently in range of `channel`
    pub fn channel_recyclings(&self, channel: ChannelId) -> GraphResult<Vec<RecyclingId>> {
        let entry = self.channel(channel)?;
        Ok(match (entry.first_recycling, entry.last_recycling) {
            (Some(first), Some(last)) => self.recycling_range(first, last),
            _ => Vec::new(),
        })
    }

    /// Point `channel` at a new recycling range
    pub fn set_recycling(
        &mut self,
        channel: ChannelId,
        first: Option<RecyclingId>,
        last: Option<RecyclingId>,
    ) -> GraphResult<RecyclingChange> {
        let old = self.channel_recyclings(channel)?;

        let entry = self.channel_mut(channel)?;
        entry.first_recycling = first;
        entry.last_recycling = last;

        let new = self.channel_recyclings(channel)?;
        debug!("{} recycling range {:?} -> {:?}", channel, old, new);
        Ok(RecyclingChange { channel, old, new })
    }

    /// Give an input channel a fresh recycling of its own
    pub(crate) fn own_recycling(&mut self, input: ChannelId) -> GraphResult<RecyclingChange> {
        let recycling = self.add_recycling(Some(input))?;
        self.set_recycling(input, Some(recycling), Some(recycling))
    }

    /// Link `channel` to `link`, or unlink it with `None`
    ///
    /// The input side of the link takes over the output's recycling range;
    /// an input losing its link gets a fresh recycling. Returns every range
    /// change so callers can remap recalls.
    pub fn set_link(
        &mut self,
        channel: ChannelId,
        link: Option<ChannelId>,
    ) -> GraphResult<Vec<RecyclingChange>> {
        let is_output = self.channel(channel)?.is_output;
        if let Some(link) = link {
            if self.channel(link)?.is_output == is_output {
                return Err(GraphError::InvalidLink { channel, link });
            }
        }

        let mut changes = Vec::new();

        // Detach previous peers of both ends
        let mut peers = Vec::new();
        if let Some(old) = self.channel(channel)?.link {
            peers.push((channel, old));
        }
        if let Some(link) = link {
            if let Some(old) = self.channel(link)?.link {
                if old != channel {
                    peers.push((link, old));
                }
            }
        }

        for (end, peer) in peers {
            self.channel_mut(end)?.link = None;
            if let Ok(entry) = self.channel_mut(peer) {
                entry.link = None;
            }

            for side in [end, peer] {
                if Some(side) == link || side == channel {
                    continue;
                }
                if self.channels.get(side).is_some_and(|c| !c.is_output) {
                    changes.push(self.own_recycling(side)?);
                }
            }
        }

        match link {
            Some(link) => {
                self.channel_mut(channel)?.link = Some(link);
                self.channel_mut(link)?.link = Some(channel);

                let (output, input) = if is_output { (channel, link) } else { (link, channel) };
                let (first, last) = {
                    let output = self.channel(output)?;
                    (output.first_recycling, output.last_recycling)
                };
                changes.push(self.set_recycling(input, first, last)?);
            }
            None => {
                if !is_output {
                    let entry = self.channel(channel)?;
                    let owns = entry
                        .first_recycling
                        .and_then(|r| self.recyclings.get(r))
                        .is_some_and(|r| r.channel == Some(channel));
                    if !owns {
                        changes.push(self.own_recycling(channel)?);
                    }
                }
            }
        }

        debug!("link {} -> {:?}", channel, link);
        Ok(changes)
    }

    /// Channel at `pad`/`audio_channel` on the input or output side
    pub fn nth_channel(
        &self,
        audio: AudioId,
        is_output: bool,
        pad: usize,
        audio_channel: usize,
    ) -> GraphResult<Option<ChannelId>> {
        let entry = self.audio(audio)?;
        if audio_channel >= entry.audio_channels {
            return Ok(None);
        }

        let channels = if is_output { &entry.output } else { &entry.input };
        Ok(channels.get(pad * entry.audio_channels + audio_channel).copied())
    }

    pub fn input_channel(
        &self,
        audio: AudioId,
        pad: usize,
        audio_channel: usize,
    ) -> GraphResult<Option<ChannelId>> {
        self.nth_channel(audio, false, pad, audio_channel)
    }

    pub fn output_channel(
        &self,
        audio: AudioId,
        pad: usize,
        audio_channel: usize,
    ) -> GraphResult<Option<ChannelId>> {
        self.nth_channel(audio, true, pad, audio_channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::Presets;

    #[test]
    fn test_recycling_change_diff() {
        let mut graph = Graph::new(Presets::default()).unwrap();
        let a = graph.add_recycling(None).unwrap();
        let b = graph.add_recycling(None).unwrap();
        let c = graph.add_recycling(None).unwrap();

        let mut ids = slotmap::SlotMap::<ChannelId, ()>::with_key();
        let change = RecyclingChange {
            channel: ids.insert(()),
            old: vec![a, b],
            new: vec![b, c],
        };

        assert_eq!(change.removed().collect::<Vec<_>>(), vec![a]);
        assert_eq!(change.added().collect::<Vec<_>>(), vec![c]);
        assert!(!change.is_empty());
    }
}

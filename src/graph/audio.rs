// Audio - a device/track object owning input and output channels

use crate::graph::key::graph_key;
use crate::graph::channel::{Channel, ChannelId};
use crate::graph::notation::Notation;
use crate::graph::recycling::RecyclingId;
use crate::graph::{Graph, GraphError, GraphResult};
use crate::recall::RecallHandle;
use log::info;

graph_key!(
    /// Id of an Audio in the graph
    AudioId,
    "audio"
);

#[derive(Debug, Clone)]
pub struct Audio {
    pub name: String,
    pub audio_channels: usize,
    pub output_pads: usize,
    pub input_pads: usize,

    /// Channels in line order (pad major)
    pub(crate) output: Vec<ChannelId>,
    pub(crate) input: Vec<ChannelId>,

    /// One notation per audio channel
    pub notation: Vec<Notation>,

    /// Audio level recall templates and runtime recalls
    pub(crate) recalls: Vec<RecallHandle>,

    /// New input channels receive play templates
    pub(crate) play_templates: bool,
}

impl Audio {
    pub fn output(&self) -> &[ChannelId] {
        &self.output
    }

    pub fn input(&self) -> &[ChannelId] {
        &self.input
    }

    pub fn recalls(&self) -> &[RecallHandle] {
        &self.recalls
    }
}

/// Channels created and removed by a resize
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub added: Vec<ChannelId>,
    pub removed: Vec<ChannelId>,
}

impl Graph {
    /// Notation of one audio channel of `audio`
    pub fn notation_mut(
        &mut self,
        audio: AudioId,
        audio_channel: usize,
    ) -> GraphResult<&mut Notation> {
        self.audio_mut(audio)?
            .notation
            .get_mut(audio_channel)
            .ok_or(GraphError::NoSuchAudioChannel {
                audio,
                audio_channel,
            })
    }

    /// Create an audio object with its channels and recyclings
    pub fn add_audio(
        &mut self,
        name: impl Into<String>,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    ) -> GraphResult<AudioId> {
        let audio = self.audios.insert(Audio {
            name: name.into(),
            audio_channels: 0,
            output_pads: 0,
            input_pads: 0,
            output: Vec::new(),
            input: Vec::new(),
            notation: Vec::new(),
            recalls: Vec::new(),
            play_templates: false,
        });

        self.resize_audio(audio, audio_channels, output_pads, input_pads)?;
        info!(
            "add audio {} ({} channels, {} outputs, {} inputs)",
            audio, audio_channels, output_pads, input_pads
        );
        Ok(audio)
    }

    /// Grow or shrink the channel grid of `audio`
    ///
    /// Surviving channels keep their recyclings and recalls. Removed channels
    /// are unlinked and their runtime recalls cancelled; their recyclings are
    /// freed by scheduled tasks.
    pub fn resize_audio(
        &mut self,
        audio: AudioId,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    ) -> GraphResult<ResizeOutcome> {
        let mut outcome = ResizeOutcome::default();

        let (old_output, old_input, old_channels, old_output_pads, old_input_pads) = {
            let entry = self.audio(audio)?;
            (
                entry.output.clone(),
                entry.input.clone(),
                entry.audio_channels,
                entry.output_pads,
                entry.input_pads,
            )
        };

        let output = self.resize_side(
            audio,
            true,
            &old_output,
            (old_channels, old_output_pads),
            (audio_channels, output_pads),
            &mut outcome,
        )?;
        let input = self.resize_side(
            audio,
            false,
            &old_input,
            (old_channels, old_input_pads),
            (audio_channels, input_pads),
            &mut outcome,
        )?;

        {
            let entry = self.audio_mut(audio)?;
            entry.audio_channels = audio_channels;
            entry.output_pads = output_pads;
            entry.input_pads = input_pads;
            entry.output = output;
            entry.input = input;
            entry
                .notation
                .resize_with(audio_channels, Notation::default);
            for (audio_channel, notation) in entry.notation.iter_mut().enumerate() {
                notation.audio_channel = audio_channel;
            }
        }

        for channel in &outcome.removed {
            self.teardown_channel(*channel)?;
        }

        let play_templates = self.audio(audio)?.play_templates;
        for channel in &outcome.added {
            if play_templates && !self.channel(*channel)?.is_output {
                self.add_play_template(*channel)?;
            }
        }

        Ok(outcome)
    }

    fn resize_side(
        &mut self,
        audio: AudioId,
        is_output: bool,
        old: &[ChannelId],
        (old_channels, old_pads): (usize, usize),
        (audio_channels, pads): (usize, usize),
        outcome: &mut ResizeOutcome,
    ) -> GraphResult<Vec<ChannelId>> {
        let mut channels = Vec::with_capacity(audio_channels * pads);

        for pad in 0..pads {
            for audio_channel in 0..audio_channels {
                let channel = if pad < old_pads && audio_channel < old_channels {
                    let id = old[pad * old_channels + audio_channel];
                    self.channel_mut(id)?.line = pad * audio_channels + audio_channel;
                    id
                } else {
                    let id = self.channels.insert(Channel::new(
                        audio,
                        is_output,
                        pad,
                        audio_channel,
                        audio_channels,
                    ));
                    let recycling = self.add_recycling(Some(id))?;
                    self.set_recycling(id, Some(recycling), Some(recycling))?;
                    outcome.added.push(id);
                    id
                };
                channels.push(channel);
            }
        }

        outcome
            .removed
            .extend(old.iter().copied().filter(|id| !channels.contains(id)));

        self.wire_channels(&channels, audio_channels);
        Ok(channels)
    }

    /// Rebuild prev/next and pad neighbours, then chain owned recyclings
    fn wire_channels(&mut self, channels: &[ChannelId], audio_channels: usize) {
        let mut owned: Vec<RecyclingId> = Vec::new();

        for (line, id) in channels.iter().enumerate() {
            let audio_channel = line % audio_channels.max(1);
            let prev = (audio_channel > 0).then(|| channels[line - 1]);
            let next = (audio_channel + 1 < audio_channels)
                .then(|| channels.get(line + 1).copied())
                .flatten();
            let prev_pad = line.checked_sub(audio_channels).map(|l| channels[l]);
            let next_pad = channels.get(line + audio_channels).copied();

            if let Some(channel) = self.channels.get_mut(*id) {
                channel.prev = prev;
                channel.next = next;
                channel.prev_pad = prev_pad;
                channel.next_pad = next_pad;

                if let Some(first) = channel.first_recycling {
                    if self
                        .recyclings
                        .get(first)
                        .is_some_and(|r| r.channel == Some(*id))
                    {
                        owned.push(first);
                    }
                }
            }
        }

        self.chain_recyclings(&owned);
    }
}

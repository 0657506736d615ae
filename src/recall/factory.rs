// Recall factory - template sets for notation playback

use crate::graph::{AudioId, ChannelId, Graph, GraphResult};
use crate::recall::{
    CopyNotationAudioRun, CountBeatsAudioRun, DelayAudioRun, PlayChannelRun, RecallContainer,
    RecallHandle, RecallKind, RecallResult,
};
use log::{error, info};

/// Templates created by [`Graph::add_notation_playback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationTemplates {
    pub delay: RecallHandle,
    pub count_beats: RecallHandle,
    /// One per audio channel
    pub copy_notation: Vec<RecallHandle>,
    /// One per input channel
    pub play: Vec<RecallHandle>,
}

impl Graph {
    /// Install the templates that play `audio`'s notation
    ///
    /// Audio level: a delay run, a count-beats run depending on it, and one
    /// copy-notation run per audio channel depending on both. Every input
    /// channel gets a play-channel run; channels added by later resizes get
    /// one as well.
    pub fn add_notation_playback(&mut self, audio: AudioId) -> RecallResult<NotationTemplates> {
        let entry = self.audio(audio)?;
        let audio_channels = entry.audio_channels;
        let inputs = entry.input.clone();
        let length = entry.notation.iter().map(|n| n.end_offset()).max().unwrap_or(0);

        let container = RecallContainer::Audio(audio);
        let delay = self.add_recall_template(
            container,
            RecallKind::DelayAudioRun(DelayAudioRun::new(self.bpm().clone())),
        )?;
        let count_beats = self.add_recall_template(
            container,
            RecallKind::CountBeatsAudioRun(CountBeatsAudioRun::new(length)),
        )?;
        self.add_dependency(count_beats, delay)?;

        let mut copy_notation = Vec::with_capacity(audio_channels);
        for audio_channel in 0..audio_channels {
            let template = self.add_recall_template(
                container,
                RecallKind::CopyNotationAudioRun(CopyNotationAudioRun::new(audio_channel)),
            )?;
            self.add_dependency(template, delay)?;
            self.add_dependency(template, count_beats)?;
            copy_notation.push(template);
        }

        let mut play = Vec::with_capacity(inputs.len());
        for channel in inputs {
            play.push(self.add_play_template(channel)?);
        }
        self.audio_mut(audio)?.play_templates = true;

        info!(
            "notation playback on {}: {} copy-notation, {} play templates",
            audio,
            copy_notation.len(),
            play.len()
        );
        Ok(NotationTemplates {
            delay,
            count_beats,
            copy_notation,
            play,
        })
    }

    /// Add a play-channel template to `channel`
    ///
    /// Passes already running on the channel's audio get a runtime instance
    /// right away.
    pub(crate) fn add_play_template(&mut self, channel: ChannelId) -> GraphResult<RecallHandle> {
        let audio = self.channel(channel)?.audio;
        let template = self.add_recall_template(
            RecallContainer::Channel(channel),
            RecallKind::PlayChannelRun(PlayChannelRun::new(channel)),
        )?;

        for recall_id in self.active_groups(audio) {
            if let Err(err) = self.instantiate_recall(template, recall_id) {
                error!("failed to play {} in {}: {}", channel, recall_id, err);
            }
        }
        Ok(template)
    }
}

// Scheduling policy and the per-tick recall pass

use crate::graph::{AudioId, Graph};
use crate::recall::{RecallContainer, RecallError, RecallFlags, RecallHandle, RunStage, RunStatus};
use log::{error, warn};
use std::fmt;
use std::str::FromStr;

const STAGES: [RunStage; 3] = [RunStage::Pre, RunStage::Inter, RunStage::Post];

/// Granularity at which a tick groups recall stages
///
/// Each batch of containers runs pre, inter and post before the next batch
/// starts.
/// - `Linear`: one batch, every audio then every channel
/// - `PerAudio`: one batch per audio (its recalls and its channels' recalls)
/// - `PerChannel`: audio recalls first, then one batch per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingPolicy {
    #[default]
    Linear,
    PerAudio,
    PerChannel,
}

impl SchedulingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulingPolicy::Linear => "none",
            SchedulingPolicy::PerAudio => "audio",
            SchedulingPolicy::PerChannel => "channel",
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(SchedulingPolicy::Linear),
            "audio" => Ok(SchedulingPolicy::PerAudio),
            "channel" => Ok(SchedulingPolicy::PerChannel),
            other => Err(format!("unknown scope: {}", other)),
        }
    }
}

impl Graph {
    /// Containers grouped into the batches `policy` runs
    fn tick_batches(&self, policy: SchedulingPolicy) -> Vec<Vec<RecallContainer>> {
        let audios = self.audio_ids();
        let channels_of = |audio| self.channel_containers(audio);

        match policy {
            SchedulingPolicy::Linear => {
                let mut batch: Vec<RecallContainer> =
                    audios.iter().map(|a| RecallContainer::Audio(*a)).collect();
                batch.extend(audios.iter().flat_map(|a| channels_of(*a)));
                vec![batch]
            }
            SchedulingPolicy::PerAudio => audios
                .iter()
                .map(|a| {
                    let mut batch = vec![RecallContainer::Audio(*a)];
                    batch.extend(channels_of(*a));
                    batch
                })
                .collect(),
            SchedulingPolicy::PerChannel => {
                let mut batches = vec![audios.iter().map(|a| RecallContainer::Audio(*a)).collect()];
                batches.extend(audios.iter().flat_map(|a| channels_of(*a)).map(|c| vec![c]));
                batches
            }
        }
    }

    fn channel_containers(&self, audio: AudioId) -> Vec<RecallContainer> {
        self.audios
            .get(audio)
            .map(|entry| {
                entry
                    .output()
                    .iter()
                    .chain(entry.input())
                    .map(|c| RecallContainer::Channel(*c))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn container_roots(&self, container: RecallContainer) -> Vec<RecallHandle> {
        match container {
            RecallContainer::Audio(audio) => self
                .audios
                .get(audio)
                .map(|a| a.recalls().to_vec())
                .unwrap_or_default(),
            RecallContainer::Channel(channel) => self
                .channels
                .get(channel)
                .map(|c| c.recalls().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Run one stage on `handle` and then on its children
    fn run_stage(&mut self, handle: RecallHandle, stage: RunStage, errors: &mut Vec<RecallError>) {
        let Some(node) = self.recalls.get(handle) else {
            return;
        };
        if node.flags.is_inactive() || !node.flags.contains(RecallFlags::RUN_INITIALIZED) {
            return;
        }

        match self.with_behavior(handle, |b, g| b.as_recall_mut().run(g, handle, stage)) {
            Ok(RunStatus::Continue) => {}
            Ok(RunStatus::Done) => {
                if let Err(err) = self.recall_done(handle) {
                    warn!("{} done hook failed: {}", handle, err);
                    errors.push(err);
                }
            }
            Err(err) => {
                error!("{} failed in {:?}, cancelling: {}", handle, stage, err);
                errors.push(err);
                if let Err(cancel_err) = self.cancel_recall(handle) {
                    warn!("cannot cancel {}: {}", handle, cancel_err);
                }
                return;
            }
        }

        let children = match self.recalls.get(handle) {
            Some(node) if !node.flags.is_inactive() => node.children.clone(),
            _ => return,
        };
        for child in children {
            self.run_stage(child, stage, errors);
        }
    }

    /// Render one buffer
    ///
    /// Clears the output mix, runs pre, inter and post over every runtime
    /// recall in the order `policy` gives, frees recalls marked for removal
    /// and advances the tick counter. Recalls that fail are cancelled; their
    /// errors are returned.
    pub fn tick(&mut self, policy: SchedulingPolicy) -> Vec<RecallError> {
        let mut errors = Vec::new();
        self.soundcard.clear();

        for batch in self.tick_batches(policy) {
            for stage in STAGES {
                for container in &batch {
                    for root in self.container_roots(*container) {
                        self.run_stage(root, stage, &mut errors);
                    }
                }
            }
        }

        self.sweep_recalls();
        self.soundcard.advance();
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::Presets;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("none".parse(), Ok(SchedulingPolicy::Linear));
        assert_eq!("Audio".parse(), Ok(SchedulingPolicy::PerAudio));
        assert_eq!(" channel ".parse(), Ok(SchedulingPolicy::PerChannel));
        assert!("pool".parse::<SchedulingPolicy>().is_err());
    }

    #[test]
    fn test_batches_per_policy() {
        let mut graph = Graph::new(Presets::default()).unwrap();
        graph.add_audio("a", 1, 1, 2).unwrap();
        graph.add_audio("b", 2, 1, 1).unwrap();

        let linear = graph.tick_batches(SchedulingPolicy::Linear);
        assert_eq!(linear.len(), 1);
        assert_eq!(linear[0].len(), 2 + 3 + 4);

        assert_eq!(graph.tick_batches(SchedulingPolicy::PerAudio).len(), 2);
        assert_eq!(graph.tick_batches(SchedulingPolicy::PerChannel).len(), 1 + 7);
    }

    #[test]
    fn test_tick_advances_counter_without_recalls() {
        let mut graph = Graph::new(Presets::default()).unwrap();
        graph.add_audio("a", 1, 1, 1).unwrap();

        assert!(graph.tick(SchedulingPolicy::Linear).is_empty());
        assert!(graph.tick(SchedulingPolicy::PerChannel).is_empty());
        assert_eq!(graph.soundcard().tic_counter(), 2);
    }
}

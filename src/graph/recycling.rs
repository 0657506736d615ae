// Recycling - the audio signals of one channel slot
//
// A Recycling owns an ordered list of AudioSignals (creation order). The
// first entry is its template. Recyclings are chained through prev/next in
// parallel to the channels owning them. Recall observers attached with
// `add_recycling_listener` are told about every signal added or removed.

use crate::graph::key::graph_key;
use crate::graph::audio_signal::{AudioSignal, SignalId, SignalKind};
use crate::graph::channel::ChannelId;
use crate::graph::{Graph, GraphError, GraphResult};
use crate::recall::{RecallHandle, SignalEvent};
use log::{debug, error};

graph_key!(
    /// Id of a Recycling in the graph
    RecyclingId,
    "recycling"
);

#[derive(Debug, Clone)]
pub struct Recycling {
    pub channel: Option<ChannelId>,
    pub prev: Option<RecyclingId>,
    pub next: Option<RecyclingId>,
    audio_signals: Vec<SignalId>,
    template: Option<SignalId>,
    listeners: Vec<RecallHandle>,
}

impl Recycling {
    pub fn audio_signals(&self) -> &[SignalId] {
        &self.audio_signals
    }

    pub fn template(&self) -> Option<SignalId> {
        self.template
    }

    pub fn contains(&self, signal: SignalId) -> bool {
        self.audio_signals.contains(&signal)
    }

    pub fn listeners(&self) -> &[RecallHandle] {
        &self.listeners
    }
}

impl Graph {
    /// Create a recycling with a silent template signal
    pub fn add_recycling(&mut self, channel: Option<ChannelId>) -> GraphResult<RecyclingId> {
        let mut template = AudioSignal::template(self.presets())?;

        let recycling = self.recyclings.insert(Recycling {
            channel,
            prev: None,
            next: None,
            audio_signals: Vec::new(),
            template: None,
            listeners: Vec::new(),
        });

        template.recycling = Some(recycling);
        let template = self.signals.insert(template);

        let entry = self.recycling_mut(recycling)?;
        entry.template = Some(template);
        entry.audio_signals.push(template);

        debug!("add recycling {} with template {}", recycling, template);
        Ok(recycling)
    }

    /// Free a recycling and every signal it still owns
    pub(crate) fn destroy_recycling(&mut self, recycling: RecyclingId) -> GraphResult<()> {
        let entry = self
            .recyclings
            .remove(recycling)
            .ok_or(GraphError::UnknownRecycling(recycling))?;

        for signal in entry.audio_signals {
            self.signals.remove(signal);
        }

        if let Some(prev) = entry.prev.and_then(|id| self.recyclings.get_mut(id)) {
            if prev.next == Some(recycling) {
                prev.next = entry.next;
            }
        }
        if let Some(next) = entry.next.and_then(|id| self.recyclings.get_mut(id)) {
            if next.prev == Some(recycling) {
                next.prev = entry.prev;
            }
        }

        debug!("destroy recycling {}", recycling);
        Ok(())
    }

    /// Take `recycling` out of its chain, joining its neighbours
    pub(crate) fn unchain_recycling(&mut self, recycling: RecyclingId) {
        let Some((prev, next)) = self.recyclings.get(recycling).map(|r| (r.prev, r.next)) else {
            return;
        };

        if let Some(entry) = prev.and_then(|id| self.recyclings.get_mut(id)) {
            if entry.next == Some(recycling) {
                entry.next = next;
            }
        }
        if let Some(entry) = next.and_then(|id| self.recyclings.get_mut(id)) {
            if entry.prev == Some(recycling) {
                entry.prev = prev;
            }
        }
        if let Some(entry) = self.recyclings.get_mut(recycling) {
            entry.prev = None;
            entry.next = None;
        }
    }

    /// Template signal of `recycling`
    pub fn recycling_template(&self, recycling: RecyclingId) -> GraphResult<SignalId> {
        self.recycling(recycling)?
            .template
            .ok_or(GraphError::MissingTemplate(recycling))
    }

    /// Append `signal` and notify listeners
    ///
    /// Adding the same signal twice is not guarded against.
    pub fn add_audio_signal(&mut self, recycling: RecyclingId, signal: SignalId) -> GraphResult<()> {
        self.signal_mut(signal)?.recycling = Some(recycling);

        let entry = self.recycling_mut(recycling)?;
        entry.audio_signals.push(signal);
        let listeners = entry.listeners.clone();

        debug!("add {} to {}", signal, recycling);
        self.notify_listeners(&listeners, recycling, signal, SignalEvent::Added);
        Ok(())
    }

    /// Detach `signal` and notify listeners
    ///
    /// Returns false and notifies nobody when the signal is not present. The
    /// signal itself stays allocated until destroyed.
    pub fn remove_audio_signal(
        &mut self,
        recycling: RecyclingId,
        signal: SignalId,
    ) -> GraphResult<bool> {
        let entry = self.recycling_mut(recycling)?;
        let Some(index) = entry.audio_signals.iter().position(|s| *s == signal) else {
            return Ok(false);
        };

        entry.audio_signals.remove(index);
        if entry.template == Some(signal) {
            entry.template = None;
        }
        let listeners = entry.listeners.clone();

        debug!("remove {} from {}", signal, recycling);
        self.notify_listeners(&listeners, recycling, signal, SignalEvent::Removed);
        Ok(true)
    }

    /// Detach (if still attached) and free an audio signal
    pub fn destroy_audio_signal(&mut self, signal: SignalId) -> GraphResult<()> {
        let recycling = self.signal(signal)?.recycling;
        if let Some(recycling) = recycling.filter(|r| self.recyclings.contains_key(*r)) {
            self.remove_audio_signal(recycling, signal)?;
        }

        self.signals.remove(signal);
        Ok(())
    }

    fn notify_listeners(
        &mut self,
        listeners: &[RecallHandle],
        recycling: RecyclingId,
        signal: SignalId,
        event: SignalEvent,
    ) {
        for listener in listeners {
            if let Err(err) = self.dispatch_signal_event(*listener, recycling, signal, event) {
                error!("{} failed on {:?} of {}: {}", listener, event, signal, err);
            }
        }
    }

    pub(crate) fn add_recycling_listener(
        &mut self,
        recycling: RecyclingId,
        listener: RecallHandle,
    ) -> GraphResult<()> {
        let entry = self.recycling_mut(recycling)?;
        if !entry.listeners.contains(&listener) {
            entry.listeners.push(listener);
        }
        Ok(())
    }

    pub(crate) fn remove_recycling_listener(&mut self, recycling: RecyclingId, listener: RecallHandle) {
        if let Some(entry) = self.recyclings.get_mut(recycling) {
            entry.listeners.retain(|l| *l != listener);
        }
    }

    fn template_for(
        &self,
        recycling: RecyclingId,
        template: Option<SignalId>,
    ) -> GraphResult<SignalId> {
        match template {
            Some(template) => Ok(template),
            None => self.recycling_template(recycling),
        }
    }

    /// Copy a template's whole stream into a new instance signal
    ///
    /// Format, length, frame bounds and loop points are copied verbatim.
    /// The signal is allocated in the graph but not yet added to `recycling`.
    pub fn create_audio_signal_with_defaults(
        &mut self,
        recycling: RecyclingId,
        template: Option<SignalId>,
        delay: f64,
        attack: usize,
    ) -> GraphResult<SignalId> {
        let template = self.template_for(recycling, template)?;
        let source = self.signal(template)?;

        let mut stream = Vec::new();
        stream.try_reserve_exact(source.stream.len())?;
        stream.extend(source.stream.iter().cloned());

        let signal = AudioSignal {
            kind: SignalKind::Instance,
            recycling: Some(recycling),
            recall_id: None,
            samplerate: source.samplerate,
            buffer_size: source.buffer_size,
            format: source.format,
            length: source.length,
            first_frame: source.first_frame,
            last_frame: source.last_frame,
            loop_start: source.loop_start,
            loop_end: source.loop_end,
            delay,
            attack,
            stream,
            stream_cursor: 0,
        };

        Ok(self.signals.insert(signal))
    }

    /// Copy a template into a new instance of exactly `frame_count` frames
    ///
    /// Frames the template does not have are silent.
    pub fn create_audio_signal_with_frame_count(
        &mut self,
        recycling: RecyclingId,
        template: Option<SignalId>,
        delay: f64,
        attack: usize,
        frame_count: usize,
    ) -> GraphResult<SignalId> {
        if frame_count == 0 {
            return Err(GraphError::InvalidFrameCount(frame_count));
        }

        let template = self.template_for(recycling, template)?;
        let source = self.signal(template)?;
        let buffer_size = source.buffer_size.max(1);
        let length = frame_count.div_ceil(buffer_size);

        let mut signal = AudioSignal::try_new(
            SignalKind::Instance,
            source.samplerate,
            source.buffer_size,
            source.format,
            length,
        )?;

        let overlap = frame_count.min(source.frame_count());
        let mut frame = 0;
        while frame < overlap {
            let index = frame / buffer_size;
            let count = (buffer_size - frame % buffer_size).min(overlap - frame);
            if let Some(from) = source.stream.get(index) {
                signal.stream[index].copy_from(from, 0, 0, count);
            }
            frame += count;
        }

        signal.recycling = Some(recycling);
        signal.first_frame = source.first_frame.min(frame_count - 1);
        signal.last_frame = frame_count - 1;
        signal.loop_start = source.loop_start.min(frame_count);
        signal.loop_end = source.loop_end.min(frame_count);
        signal.delay = delay;
        signal.attack = attack;

        Ok(self.signals.insert(signal))
    }

    /// Recyclings from `first` to `last` inclusive, following `next`
    pub fn recycling_range(&self, first: RecyclingId, last: RecyclingId) -> Vec<RecyclingId> {
        let mut range = Vec::new();
        let mut current = Some(first);

        while let Some(id) = current {
            let Some(entry) = self.recyclings.get(id) else {
                break;
            };
            range.push(id);
            if id == last {
                break;
            }
            current = entry.next;
        }

        range
    }

    /// Zero-based ordinal of `target` between `first` and `last`
    ///
    /// Returns `None` when `target` is not in range.
    pub fn position(
        &self,
        first: RecyclingId,
        last: RecyclingId,
        target: RecyclingId,
    ) -> Option<usize> {
        let mut current = Some(first);
        let mut position = 0;

        while let Some(id) = current {
            if id == target {
                return Some(position);
            }
            if id == last {
                return None;
            }

            current = self.recyclings.get(id)?.next;
            position += 1;
        }

        None
    }

    /// First recycling of the range not owned by `channel`
    ///
    /// Walking from the channel's own first recycling this is the first
    /// recycling of the next channel.
    pub fn find_next_channel(
        &self,
        first: RecyclingId,
        last: RecyclingId,
        channel: ChannelId,
    ) -> Option<RecyclingId> {
        self.recycling_range(first, last).into_iter().find(|id| {
            self.recyclings
                .get(*id)
                .is_some_and(|entry| entry.channel != Some(channel))
        })
    }

    /// Link `recyclings` into one chain in order
    pub(crate) fn chain_recyclings(&mut self, recyclings: &[RecyclingId]) {
        for (i, id) in recyclings.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| recyclings[p]);
            let next = recyclings.get(i + 1).copied();
            if let Some(entry) = self.recyclings.get_mut(*id) {
                entry.prev = prev;
                entry.next = next;
            }
        }
    }
}

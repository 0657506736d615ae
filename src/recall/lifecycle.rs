// Recall lifecycle - templates, duplication, dependency resolution, teardown
//
// Runtime states: duplicated -> RUN_INITIALIZED -> running -> DONE | CANCELLED
// -> removed. Cancellation only flags the subtree and schedules a
// CancelRecall task; nodes are freed by RemoveRecall once their children are
// gone, never from inside the call that cancelled them.

use crate::graph::channel::RecyclingChange;
use crate::graph::{AudioId, ChannelId, Graph, GraphError, GraphResult, RecyclingId, SignalId};
use crate::recall::{
    RecallContainer, RecallDependency, RecallError, RecallFlags, RecallHandle, RecallId,
    RecallKind, RecallNode, RecallResult, RecallSource, RunStatus, SignalEvent, TicPhase,
};
use crate::task::recall_tasks::{CancelRecall, RemoveRecall, RemoveRecycling};
use log::{debug, error, warn};

impl Graph {
    pub fn recall(&self, handle: RecallHandle) -> RecallResult<&RecallNode> {
        self.recalls
            .get(handle)
            .ok_or(RecallError::UnknownRecall(handle))
    }

    pub(crate) fn recall_mut(&mut self, handle: RecallHandle) -> RecallResult<&mut RecallNode> {
        self.recalls
            .get_mut(handle)
            .ok_or(RecallError::UnknownRecall(handle))
    }

    pub fn contains_recall(&self, handle: RecallHandle) -> bool {
        self.recalls.contains_key(handle)
    }

    pub fn recall_count(&self) -> usize {
        self.recalls.len()
    }

    /// Run `f` on the behaviour of `handle` with the graph available
    ///
    /// The behaviour is moved out of its node for the duration of the call;
    /// reentering the same recall yields `RecallError::Busy`.
    pub(crate) fn with_behavior<R>(
        &mut self,
        handle: RecallHandle,
        f: impl FnOnce(&mut RecallKind, &mut Graph) -> RecallResult<R>,
    ) -> RecallResult<R> {
        let mut behavior = self
            .recall_mut(handle)?
            .behavior
            .take()
            .ok_or(RecallError::Busy(handle))?;

        let result = f(&mut behavior, self);

        if let Some(node) = self.recalls.get_mut(handle) {
            node.behavior = Some(behavior);
        }
        result
    }

    fn container_recalls_mut(&mut self, container: RecallContainer) -> Option<&mut Vec<RecallHandle>> {
        match container {
            RecallContainer::Audio(audio) => self.audios.get_mut(audio).map(|a| &mut a.recalls),
            RecallContainer::Channel(channel) => {
                self.channels.get_mut(channel).map(|c| &mut c.recalls)
            }
        }
    }

    /// Register a template on an audio or channel
    pub fn add_recall_template(
        &mut self,
        container: RecallContainer,
        behavior: RecallKind,
    ) -> GraphResult<RecallHandle> {
        match container {
            RecallContainer::Audio(audio) => {
                self.audio(audio)?;
            }
            RecallContainer::Channel(channel) => {
                self.channel(channel)?;
            }
        }

        let name = behavior.name();
        let handle = self.recalls.insert_with_key(|handle| RecallNode {
            handle,
            flags: RecallFlags::TEMPLATE,
            recall_id: None,
            container,
            parent: None,
            children: Vec::new(),
            template: None,
            dependencies: Vec::new(),
            source: None,
            behavior: Some(behavior),
        });

        if let Some(recalls) = self.container_recalls_mut(container) {
            recalls.push(handle);
        }

        debug!("add {} template {} on {:?}", name, handle, container);
        Ok(handle)
    }

    /// Declare that runtime instances of `template` need the runtime
    /// instance of `dependency` of their own group
    pub fn add_dependency(
        &mut self,
        template: RecallHandle,
        dependency: RecallHandle,
    ) -> RecallResult<()> {
        let target = self.recall(dependency)?;
        if !target.is_template() {
            return Err(RecallError::NotTemplate(dependency));
        }
        let recall_type = target
            .recall_type()
            .ok_or(RecallError::Busy(dependency))?;

        let node = self.recall_mut(template)?;
        if !node.is_template() {
            return Err(RecallError::NotTemplate(template));
        }
        node.dependencies
            .push(RecallDependency::new(dependency, recall_type));
        Ok(())
    }

    /// Create the runtime instance of `template` for `recall_id`
    ///
    /// Flags are copied minus TEMPLATE, subtype fields are copied by the
    /// behaviour, then the instance maps itself onto the current topology.
    pub fn duplicate_recall(
        &mut self,
        template: RecallHandle,
        recall_id: RecallId,
    ) -> RecallResult<RecallHandle> {
        let node = self.recall(template)?;
        if !node.is_template() {
            return Err(RecallError::NotTemplate(template));
        }

        let behavior = node
            .behavior
            .as_ref()
            .ok_or(RecallError::Busy(template))?
            .as_recall()
            .duplicate(&recall_id);

        let mut flags = node.flags;
        flags.remove(RecallFlags::TEMPLATE);
        let container = node.container;
        let dependencies = node.dependencies.clone();

        let handle = self.recalls.insert_with_key(|handle| RecallNode {
            handle,
            flags,
            recall_id: Some(recall_id),
            container,
            parent: None,
            children: Vec::new(),
            template: Some(template),
            dependencies,
            source: None,
            behavior: Some(behavior),
        });

        if let Some(recalls) = self.container_recalls_mut(container) {
            recalls.push(handle);
        }
        debug!("duplicate {} -> {} for {}", template, handle, recall_id);

        if let Err(err) = self.with_behavior(handle, |b, g| b.as_recall_mut().map(g, handle)) {
            self.discard_recall(handle);
            return Err(err);
        }

        Ok(handle)
    }

    /// Bind each declared dependency to the runtime sibling of its group
    ///
    /// Every dependency must match exactly one live runtime sibling; none or
    /// several is a configuration error.
    pub fn resolve_dependencies(&mut self, handle: RecallHandle) -> RecallResult<()> {
        let node = self.recall(handle)?;
        if node.is_template() {
            return Err(RecallError::TemplateNotRunnable(handle));
        }

        let group = node
            .group_id()
            .ok_or_else(|| RecallError::InvalidState(format!("{} has no recall id", handle)))?;
        let name = node.behavior.as_ref().map_or("recall", |b| b.name());
        let declared = node.dependencies.clone();

        let mut resolved = Vec::with_capacity(declared.len());
        for dependency in declared {
            let candidates: Vec<RecallHandle> = self
                .recalls
                .iter()
                .filter(|(_, n)| {
                    !n.is_template()
                        && !n.flags.contains(RecallFlags::CANCELLED)
                        && n.template == Some(dependency.template)
                        && n.group_id() == Some(group)
                })
                .map(|(h, _)| h)
                .collect();

            let sibling = match candidates.as_slice() {
                [sibling] => *sibling,
                [] => {
                    return Err(RecallError::MissingDependency {
                        recall: format!("{} {}", name, handle),
                        dependency: dependency.recall_type,
                        group,
                    });
                }
                found => {
                    return Err(RecallError::AmbiguousDependency {
                        recall: format!("{} {}", name, handle),
                        dependency: dependency.recall_type,
                        group,
                        found: found.len(),
                    });
                }
            };

            self.with_behavior(handle, |b, g| {
                b.as_recall_mut()
                    .resolve_dependency(g, handle, dependency.recall_type, sibling)
            })?;
            resolved.push(dependency.resolved_to(sibling));
        }

        debug!("{} resolved {} dependencies", handle, resolved.len());
        self.recall_mut(handle)?.dependencies = resolved;
        Ok(())
    }

    /// Runtime sibling bound to a dependency of `handle`
    pub fn resolved_dependency(
        &self,
        handle: RecallHandle,
        recall_type: crate::recall::RecallType,
    ) -> Option<RecallHandle> {
        self.recalls
            .get(handle)?
            .dependencies
            .iter()
            .find(|d| d.recall_type == recall_type)
            .and_then(|d| d.resolved)
    }

    /// Prepare a runtime recall and its children for their first tick
    pub fn run_init_pre(&mut self, handle: RecallHandle) -> RecallResult<()> {
        let node = self.recall(handle)?;
        if node.is_template() {
            return Err(RecallError::TemplateNotRunnable(handle));
        }
        if node.flags.contains(RecallFlags::RUN_INITIALIZED) {
            return Ok(());
        }

        self.with_behavior(handle, |b, g| b.as_recall_mut().run_init_pre(g, handle))?;

        let node = self.recall_mut(handle)?;
        node.flags.insert(RecallFlags::RUN_INITIALIZED);
        let children = node.children.clone();

        for child in children {
            self.run_init_pre(child)?;
        }
        Ok(())
    }

    /// Duplicate, resolve and initialize `template` for `recall_id`
    pub fn instantiate_recall(
        &mut self,
        template: RecallHandle,
        recall_id: RecallId,
    ) -> RecallResult<RecallHandle> {
        let handle = self.duplicate_recall(template, recall_id)?;
        self.resolve_dependencies(handle)?;
        self.run_init_pre(handle)?;
        Ok(handle)
    }

    /// Attach a new runtime child processing `source` under `parent`
    pub(crate) fn add_child_recall(
        &mut self,
        parent: RecallHandle,
        behavior: RecallKind,
        source: RecallSource,
    ) -> RecallResult<RecallHandle> {
        let parent_node = self.recall(parent)?;
        if parent_node.is_template() {
            return Err(RecallError::TemplateNotRunnable(parent));
        }

        let recall_id = parent_node.recall_id;
        let container = parent_node.container;
        let initialized = parent_node.flags.contains(RecallFlags::RUN_INITIALIZED);

        let child = self.recalls.insert_with_key(|handle| RecallNode {
            handle,
            flags: RecallFlags::NONE,
            recall_id,
            container,
            parent: Some(parent),
            children: Vec::new(),
            template: None,
            dependencies: Vec::new(),
            source: Some(source),
            behavior: Some(behavior),
        });
        self.recall_mut(parent)?.children.push(child);

        if let Err(err) = self.with_behavior(child, |b, g| b.as_recall_mut().map(g, child)) {
            self.discard_recall(child);
            return Err(err);
        }
        if initialized {
            self.run_init_pre(child)?;
        }

        Ok(child)
    }

    /// Set `flags` on `handle` and every descendant
    pub fn set_recall_flags(&mut self, handle: RecallHandle, flags: RecallFlags) {
        let mut pending = vec![handle];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.recalls.get_mut(current) {
                node.flags.insert(flags);
                pending.extend(node.children.iter().copied());
            }
        }
    }

    /// Mark `handle` done and notify its parent
    ///
    /// No-op on templates, persistent recalls, and recalls already done or
    /// cancelled.
    pub fn recall_done(&mut self, handle: RecallHandle) -> RecallResult<()> {
        let node = self.recall(handle)?;
        if node.flags.intersects(
            RecallFlags::TEMPLATE
                | RecallFlags::PERSISTENT
                | RecallFlags::DONE
                | RecallFlags::CANCELLED,
        ) {
            return Ok(());
        }
        let parent = node.parent;

        self.recall_mut(handle)?.flags.insert(RecallFlags::DONE);
        debug!("{} done", handle);
        self.with_behavior(handle, |b, g| b.as_recall_mut().on_done(g, handle))?;

        let Some(parent) = parent.filter(|p| self.recalls.contains_key(*p)) else {
            return Ok(());
        };

        self.with_behavior(parent, |b, g| {
            b.as_recall_mut().on_child_done(g, parent, handle)
        })?;

        let parent_node = self.recall(parent)?;
        let propagate = parent_node.flags.contains(RecallFlags::PROPAGATE_DONE)
            && parent_node.children.iter().all(|c| {
                self.recalls
                    .get(*c)
                    .is_none_or(|n| n.flags.intersects(RecallFlags::DONE | RecallFlags::CANCELLED))
            });
        if propagate {
            self.recall_done(parent)?;
        }
        Ok(())
    }

    /// Cooperatively cancel `handle` and its subtree
    ///
    /// Flags the subtree CANCELLED | HIDE so it stops running, then schedules
    /// a CancelRecall task. Nothing is freed here.
    pub fn cancel_recall(&mut self, handle: RecallHandle) -> RecallResult<()> {
        let node = self.recall(handle)?;
        if node.is_template() {
            return Err(RecallError::TemplateNotRunnable(handle));
        }
        if node.flags.contains(RecallFlags::CANCELLED) {
            return Ok(());
        }

        self.set_recall_flags(handle, RecallFlags::CANCELLED | RecallFlags::HIDE);
        self.schedule(Box::new(CancelRecall::new(handle)));
        debug!("cancel {}", handle);
        Ok(())
    }

    /// Second half of a cancel, run by the CancelRecall task
    pub(crate) fn finish_cancel(&mut self, handle: RecallHandle) -> RecallResult<()> {
        let Some(node) = self.recalls.get(handle) else {
            debug!("{} already removed", handle);
            return Ok(());
        };
        if node.flags.contains(RecallFlags::REMOVE) {
            return Ok(());
        }

        for child in node.children.clone() {
            self.schedule(Box::new(CancelRecall::new(child)));
        }

        self.with_behavior(handle, |b, g| b.as_recall_mut().on_cancel(g, handle))?;
        self.set_recall_flags(handle, RecallFlags::CANCELLED | RecallFlags::HIDE);
        self.recall_mut(handle)?.flags.insert(RecallFlags::REMOVE);
        self.schedule(Box::new(RemoveRecall::new(handle)));
        Ok(())
    }

    /// Detach and free a finished recall
    ///
    /// Returns `false` while children remain; callers retry later.
    pub(crate) fn remove_recall(&mut self, handle: RecallHandle) -> RecallResult<bool> {
        let Some(node) = self.recalls.get(handle) else {
            return Ok(true);
        };
        if !node
            .flags
            .intersects(RecallFlags::DONE | RecallFlags::CANCELLED)
        {
            return Err(RecallError::InvalidState(format!(
                "{} is neither done nor cancelled",
                handle
            )));
        }
        if node.children.iter().any(|c| self.recalls.contains_key(*c)) {
            return Ok(false);
        }

        self.detach_recall(handle);
        debug!("remove {}", handle);
        Ok(true)
    }

    fn detach_recall(&mut self, handle: RecallHandle) {
        let Some(node) = self.recalls.remove(handle) else {
            return;
        };

        if let Some(parent) = node.parent.and_then(|p| self.recalls.get_mut(p)) {
            parent.children.retain(|c| *c != handle);
        }
        if node.parent.is_none() {
            if let Some(recalls) = self.container_recalls_mut(node.container) {
                recalls.retain(|r| *r != handle);
            }
        }
        if let Some(RecallSource::Recycling(recycling)) = node.source {
            self.remove_recycling_listener(recycling, handle);
        }
    }

    /// Free a recall subtree that never ran
    fn discard_recall(&mut self, handle: RecallHandle) {
        let children = self
            .recalls
            .get(handle)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.discard_recall(child);
        }
        self.detach_recall(handle);
    }

    /// Free every REMOVE-flagged recall that has finished
    pub(crate) fn sweep_recalls(&mut self) -> usize {
        let candidates: Vec<RecallHandle> = self
            .recalls
            .iter()
            .filter(|(_, n)| {
                n.flags.contains(RecallFlags::REMOVE)
                    && n.flags.intersects(RecallFlags::DONE | RecallFlags::CANCELLED)
            })
            .map(|(h, _)| h)
            .collect();

        let mut removed = 0;
        for handle in candidates {
            match self.remove_recall(handle) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!("sweep skipped {}: {}", handle, err),
            }
        }
        removed
    }

    /// Tell runtime recalls about recycling ranges that changed
    ///
    /// Recyclings that left the range of the channel owning them are
    /// scheduled for removal.
    pub fn apply_recycling_changes(&mut self, changes: &[RecyclingChange]) -> RecallResult<()> {
        for change in changes.iter().filter(|c| !c.is_empty()) {
            let recalls = self
                .channels
                .get(change.channel)
                .map(|c| c.recalls.clone())
                .unwrap_or_default();

            for handle in recalls {
                let active = self.recalls.get(handle).is_some_and(|n| {
                    !n.is_template()
                        && !n.flags.intersects(RecallFlags::DONE | RecallFlags::CANCELLED)
                });
                if active {
                    self.with_behavior(handle, |b, g| {
                        b.as_recall_mut()
                            .remap_child_source(g, handle, &change.old, &change.new)
                    })?;
                }
            }

            let orphans: Vec<RecyclingId> = change
                .removed()
                .filter(|r| {
                    self.recyclings
                        .get(*r)
                        .is_some_and(|entry| entry.channel == Some(change.channel))
                })
                .collect();
            for recycling in orphans {
                self.unchain_recycling(recycling);
                self.schedule(Box::new(RemoveRecycling::new(recycling)));
            }
        }
        Ok(())
    }

    /// Recall ids of the passes currently running on `audio`
    pub fn active_groups(&self, audio: AudioId) -> Vec<RecallId> {
        let Some(entry) = self.audios.get(audio) else {
            return Vec::new();
        };

        let mut groups: Vec<RecallId> = Vec::new();
        for node in entry.recalls.iter().filter_map(|h| self.recalls.get(*h)) {
            if node.is_template()
                || node
                    .flags
                    .intersects(RecallFlags::DONE | RecallFlags::CANCELLED)
            {
                continue;
            }
            if let Some(recall_id) = node.recall_id {
                if !groups.iter().any(|g| g.same_group(&recall_id)) {
                    groups.push(recall_id);
                }
            }
        }
        groups
    }

    /// Subscribe `listener` to the tics of a delay recall
    pub(crate) fn connect_tic(
        &mut self,
        delay: RecallHandle,
        listener: RecallHandle,
    ) -> RecallResult<()> {
        match self.recall_mut(delay)?.behavior.as_mut() {
            Some(RecallKind::DelayAudioRun(run)) => {
                run.connect(listener);
                Ok(())
            }
            Some(other) => Err(RecallError::InvalidState(format!(
                "{} is a {} and emits no tics",
                delay,
                other.name()
            ))),
            None => Err(RecallError::Busy(delay)),
        }
    }

    /// Deliver a tic to `listener`, marking it done when it asks to
    pub(crate) fn dispatch_tic(
        &mut self,
        listener: RecallHandle,
        phase: TicPhase,
    ) -> RecallResult<()> {
        let Some(node) = self.recalls.get(listener) else {
            return Ok(());
        };
        if node.flags.is_inactive() || !node.flags.contains(RecallFlags::RUN_INITIALIZED) {
            return Ok(());
        }

        let status =
            self.with_behavior(listener, |b, g| b.as_recall_mut().on_tic(g, listener, phase))?;
        if status == RunStatus::Done {
            self.recall_done(listener)?;
        }
        Ok(())
    }

    /// Deliver a recycling change to a listening recall
    pub(crate) fn dispatch_signal_event(
        &mut self,
        listener: RecallHandle,
        recycling: RecyclingId,
        signal: SignalId,
        event: SignalEvent,
    ) -> RecallResult<()> {
        let Some(node) = self.recalls.get(listener) else {
            return Ok(());
        };
        if node.flags.intersects(RecallFlags::DONE | RecallFlags::CANCELLED) {
            return Ok(());
        }

        self.with_behavior(listener, |b, g| match b.as_recycling_listener() {
            Some(observer) => match event {
                SignalEvent::Added => observer.on_signal_added(g, listener, recycling, signal),
                SignalEvent::Removed => observer.on_signal_removed(g, listener, recycling, signal),
            },
            None => Ok(()),
        })
    }

    /// Detach a channel that is leaving its audio
    ///
    /// The channel is unlinked and freed right away. Its templates go with
    /// it, its runtime recalls are cancelled, and the recyclings it owns are
    /// released by scheduled tasks once no recall uses them.
    pub(crate) fn teardown_channel(&mut self, channel: ChannelId) -> GraphResult<()> {
        let entry = self.channel(channel)?;
        let link = entry.link;
        let recalls = entry.recalls.clone();

        if let Some(peer) = link {
            self.channel_mut(channel)?.link = None;
            let peer_is_input = match self.channels.get_mut(peer) {
                Some(peer_entry) => {
                    peer_entry.link = None;
                    !peer_entry.is_output
                }
                None => false,
            };

            if peer_is_input {
                let change = self.own_recycling(peer)?;
                if let Err(err) = self.apply_recycling_changes(&[change]) {
                    error!("remap of {} after unlink failed: {}", peer, err);
                }
            }
        }

        for handle in recalls {
            let Some(node) = self.recalls.get(handle) else {
                continue;
            };
            if node.is_template() {
                self.detach_recall(handle);
            } else if let Err(err) = self.cancel_recall(handle) {
                warn!("cancel of {} on {} failed: {}", handle, channel, err);
            }
        }

        let owned: Vec<RecyclingId> = self
            .channel_recyclings(channel)?
            .into_iter()
            .filter(|r| {
                self.recyclings
                    .get(*r)
                    .is_some_and(|entry| entry.channel == Some(channel))
            })
            .collect();
        for recycling in owned {
            self.unchain_recycling(recycling);
            self.schedule(Box::new(RemoveRecycling::new(recycling)));
        }

        self.channels
            .remove(channel)
            .ok_or(GraphError::UnknownChannel(channel))?;
        debug!("teardown {}", channel);
        Ok(())
    }

    /// Whether a live recall still processes `recycling`
    pub fn recycling_in_use(&self, recycling: RecyclingId) -> bool {
        self.recalls
            .iter()
            .any(|(_, n)| n.source == Some(RecallSource::Recycling(recycling)))
    }
}

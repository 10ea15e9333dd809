//! Staging pipeline.
//!
//! A run of one sound scope is a pair of [`RecallId`]s: the toplevel id over
//! the output chain running the `play` list, and its child over the input
//! chain running the `recall` list. Each period walks both through
//! `RUN_PRE`, `RUN_INTER` and `RUN_POST`.

use crate::recall::{side_of, Recall, RecallFlags, RecallKind};
use crate::topology::{Audio, Channel, ChannelSide};
use crate::worker::ChannelJob;
use parking_lot::Mutex;
use ripieno_automation::AutomationPosition;
use ripieno_core::{
    find_by_scope, AudioChannelTarget, PortFlags, RecallId, RecyclingContext, RecyclingId, SoundScope, Soundcard,
    StagingFlags, StateFlags,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Audio {
    fn list_for(&self, recall_id: &RecallId) -> &Mutex<Vec<Arc<Recall>>> {
        match side_of(recall_id) {
            ChannelSide::Output => &self.play,
            ChannelSide::Input => &self.recall,
        }
    }

    /// Active ids of `scope`.
    pub fn check_scope(&self, scope: SoundScope) -> Vec<Arc<RecallId>> {
        find_by_scope(&self.recall_ids.lock(), scope)
    }

    /// Toplevel ids of `scope`.
    fn toplevel_ids(&self, scope: SoundScope) -> Vec<Arc<RecallId>> {
        self.check_scope(scope)
            .into_iter()
            .filter(|id| id.recycling_context().parent().is_none())
            .collect()
    }

    fn child_ids(&self, top: &Arc<RecallId>) -> Vec<Arc<RecallId>> {
        let context = top.recycling_context();
        self.recall_ids()
            .into_iter()
            .filter(|id| {
                id.recycling_context()
                    .parent()
                    .is_some_and(|parent| Arc::ptr_eq(&parent, context))
            })
            .collect()
    }

    fn context_for(&self, scope: SoundScope, side: ChannelSide) -> Arc<RecyclingContext> {
        let channels = self.channels(side);
        let context = RecyclingContext::new(scope, channels.len());
        for channel in &channels {
            if let Some(recycling) = channel.first_recycling() {
                context.replace(recycling.id(), channel.line());
            }
        }
        context
    }

    /// Open a run of `scope`: build its contexts and ids, duplicate,
    /// resolve and initialize the recalls. Returns the toplevel id.
    pub fn start(&self, scope: SoundScope, soundcard: &dyn Soundcard) -> Arc<RecallId> {
        let _period = self.lock_period();

        let top_context = self.context_for(scope, ChannelSide::Output);
        let child_context = self.context_for(scope, ChannelSide::Input);
        top_context.add_child(Arc::clone(&child_context));
        let top = RecallId::with_context_scope(Arc::clone(&top_context));
        let child = RecallId::with_context_scope(Arc::clone(&child_context));

        self.recycling_contexts
            .lock()
            .extend([top_context, child_context]);
        self.recall_ids
            .lock()
            .extend([Arc::clone(&top), Arc::clone(&child)]);

        for (side, id) in [(ChannelSide::Output, &top), (ChannelSide::Input, &child)] {
            for channel in self.channels(side) {
                channel.add_recall_id(id);
                for recycling in channel.recyclings() {
                    recycling.add_signal_for(id);
                }
            }
        }

        let ids = [&top, &child];
        for id in ids {
            self.duplicate_recall(id, None, None, None);
        }
        for id in ids {
            self.resolve_recall(id);
        }
        for stage in StagingFlags::INIT_STAGES {
            for id in ids {
                self.init_recall(id, stage, soundcard);
            }
        }
        for id in ids {
            id.set_state_flags(StateFlags::IS_ACTIVE);
        }

        info!(audio = %self.id(), scope = scope.name(), "scope started");
        top
    }

    /// Cancel and clean up every run of `scope`. Returns how many runs stopped.
    pub fn stop(&self, scope: SoundScope) -> usize {
        let tops = self.toplevel_ids(scope);
        for top in &tops {
            let children = self.child_ids(top);
            for id in children.iter().chain(std::iter::once(top)) {
                self.cancel_recall(id);
            }
            for id in children.iter().chain(std::iter::once(top)) {
                self.cleanup_recall(id);
            }
        }
        if !tops.is_empty() {
            info!(audio = %self.id(), scope = scope.name(), runs = tops.len(), "scope stopped");
        }
        tops.len()
    }

    /// Working copies of every compatible template for `recall_id`,
    /// optionally limited to one pad, audio channel or line.
    pub fn duplicate_recall(
        &self,
        recall_id: &Arc<RecallId>,
        pad: Option<usize>,
        audio_channel: Option<usize>,
        line: Option<usize>,
    ) {
        let Some(scope) = recall_id.sound_scope() else {
            debug!("duplicate on an unscoped recall id");
            return;
        };
        let side = side_of(recall_id);
        let audio_channels = self.audio_channels();
        let lines = recall_id.recycling_context().len();
        let existing = self.list_for(recall_id).lock().clone();

        let copy_exists = |created: &[Arc<Recall>], template: &Recall, line: Option<usize>, recycling: Option<RecyclingId>| {
            existing.iter().chain(created).any(|r| {
                r.template() == Some(template.handle())
                    && r.recall_id().is_some_and(|id| Arc::ptr_eq(id, recall_id))
                    && r.line() == line
                    && r.recycling() == recycling
            })
        };

        let mut created: Vec<Arc<Recall>> = Vec::new();
        for template in existing.iter().filter(|r| r.is_template()) {
            if template.check_flags(RecallFlags::RUN_INITIALIZED)
                || template.kind().is_port_holder()
                || !template.ability().accepts(scope)
            {
                continue;
            }
            if template.kind().is_audio_level() {
                if !copy_exists(&created, template, None, None) {
                    created.push(template.duplicate(self.ids(), recall_id, None, None));
                }
                continue;
            }
            for l in 0..lines {
                if template.line().is_some_and(|t| t != l)
                    || line.is_some_and(|x| x != l)
                    || pad.is_some_and(|p| p != l / audio_channels)
                    || audio_channel.is_some_and(|c| c != l % audio_channels)
                {
                    continue;
                }
                if template.kind().is_per_recycling() {
                    let Some(channel) = self.channel(side, l) else {
                        continue;
                    };
                    for recycling in channel.recyclings() {
                        if !copy_exists(&created, template, Some(l), Some(recycling.id())) {
                            created.push(template.duplicate(self.ids(), recall_id, Some(l), Some(recycling.id())));
                        }
                    }
                } else if !copy_exists(&created, template, Some(l), None) {
                    created.push(template.duplicate(self.ids(), recall_id, Some(l), None));
                }
            }
        }

        // per-recycling copies run under their container's channel run
        for copy in created.iter().filter(|r| r.kind().is_per_recycling()) {
            let parent = created.iter().chain(existing.iter()).find(|r| {
                r.kind() == RecallKind::ChannelRun
                    && r.container() == copy.container()
                    && r.line() == copy.line()
                    && r.recall_id().is_some_and(|id| Arc::ptr_eq(id, recall_id))
            });
            if let Some(parent) = parent {
                parent.add_child(Arc::clone(copy));
            }
        }

        debug!(audio = %self.id(), scope = scope.name(), copies = created.len(), "recalls duplicated");
        self.list_for(recall_id).lock().extend(created);
    }

    /// Bring every active run over `side` in line with the chain after a
    /// resize. Contexts are rebound in place, the ids and signals of
    /// `removed` channels go, new channels get them, and line-bound working
    /// copies follow the new lines.
    pub(crate) fn rebind_runs(&self, side: ChannelSide, removed: &[Arc<Channel>]) {
        let _period = self.lock_period();
        let channels = self.channels(side);
        let ids: Vec<Arc<RecallId>> = self
            .recall_ids()
            .into_iter()
            .filter(|id| side_of(id) == side)
            .collect();

        for id in &ids {
            for channel in removed {
                channel.remove_recall_id(id);
                for recycling in channel.recyclings() {
                    recycling.remove_signals(id);
                }
            }
            let mut slots = vec![None; channels.len()];
            for channel in &channels {
                channel.add_recall_id(id);
                for recycling in channel.recyclings() {
                    recycling.add_signal_for(id);
                }
                if let Some(slot) = slots.get_mut(channel.line()) {
                    *slot = channel.first_recycling().map(|r| r.id());
                }
            }
            let context = id.recycling_context();
            context.set_recyclings(slots);

            let stale: Vec<Arc<Recall>> = self
                .list_for(id)
                .lock()
                .iter()
                .filter(|r| r.runs_in(context) && is_stale_line_copy(&channels, r))
                .cloned()
                .collect();
            for recall in &stale {
                if let Some(parent) = recall.parent() {
                    parent.remove_child(recall);
                }
            }
            self.list_for(id)
                .lock()
                .retain(|r| !stale.iter().any(|s| Arc::ptr_eq(s, r)));

            self.duplicate_recall(id, None, None, None);
            id.unset_staging_flags(StagingFlags::RESOLVE);
            self.resolve_recall(id);
        }
        if !ids.is_empty() {
            debug!(audio = %self.id(), ?side, runs = ids.len(), lines = channels.len(), "runs rebound");
        }
    }

    /// Point every dependency of the id's working recalls at the working
    /// copy of its provider in the same run.
    pub fn resolve_recall(&self, recall_id: &Arc<RecallId>) {
        if recall_id.check_staging_flags(StagingFlags::RESOLVE) {
            return;
        }
        recall_id.set_staging_flags(StagingFlags::RESOLVE);

        let context = recall_id.recycling_context();
        let toplevel = context.toplevel();
        let working = Recall::find_recycling_context(&self.list_for(recall_id).lock(), context);
        let candidates: Vec<Arc<Recall>> = self
            .play_list()
            .into_iter()
            .chain(self.recall_list())
            .filter(|r| {
                r.recall_id()
                    .is_some_and(|id| Arc::ptr_eq(&id.recycling_context().toplevel(), &toplevel))
            })
            .collect();

        for recall in &working {
            for (index, dependency) in recall.dependencies().iter().enumerate() {
                if dependency.is_resolved() {
                    continue;
                }
                let providers: Vec<&Arc<Recall>> = candidates
                    .iter()
                    .filter(|c| c.template() == Some(dependency.provider()))
                    .collect();
                let same_id = |c: &&Arc<Recall>| c.recall_id().is_some_and(|id| Arc::ptr_eq(id, recall_id));
                let provider = providers
                    .iter()
                    .find(|c| same_id(c) && c.line() == recall.line())
                    .or_else(|| providers.iter().find(|c| same_id(c)))
                    .or_else(|| providers.first());
                match provider {
                    Some(provider) => recall.resolve_dependency(index, provider),
                    None => warn!(recall = recall.name(), "dependency provider not found in run"),
                }
            }
        }
    }

    /// Run one init stage on the id's recalls, once per id.
    pub fn init_recall(&self, recall_id: &Arc<RecallId>, staging: StagingFlags, soundcard: &dyn Soundcard) {
        if !StagingFlags::INIT_STAGES.contains(&staging) {
            debug!(?staging, "not an init stage");
            return;
        }
        if recall_id.check_staging_flags(staging) {
            return;
        }
        recall_id.set_staging_flags(staging);
        let list = self.list_for(recall_id).lock().clone();
        self.run_list(&list, recall_id, staging, soundcard);
    }

    /// Stage bookkeeping of `play_recall`. Returns whether the stage runs.
    fn enter_stage(&self, recall_id: &RecallId, staging: StagingFlags) -> bool {
        if !StagingFlags::RUN_STAGES.contains(&staging) {
            debug!(?staging, "not a run stage");
            return false;
        }
        if recall_id.check_staging_flags(StagingFlags::RUN) {
            recall_id.unset_staging_flags(StagingFlags::RUN);
        }
        let adjacent = if staging == StagingFlags::RUN_PRE {
            StagingFlags::RUN_INTER
        } else if staging == StagingFlags::RUN_INTER {
            StagingFlags::RUN_POST
        } else {
            StagingFlags::RUN_PRE
        };
        recall_id.unset_staging_flags(adjacent);
        if recall_id.check_staging_flags(staging) {
            debug!(?staging, "stage already run this period");
            return false;
        }
        recall_id.set_staging_flags(staging);
        true
    }

    /// Run one stage on the id's recalls.
    pub fn play_recall(&self, recall_id: &Arc<RecallId>, staging: StagingFlags, soundcard: &dyn Soundcard) {
        if !self.enter_stage(recall_id, staging) {
            return;
        }
        let list = self.list_for(recall_id).lock().clone();
        if staging == StagingFlags::RUN_PRE {
            self.automate(&list, recall_id, soundcard);
        }
        self.run_list(&list, recall_id, staging, soundcard);
    }

    /// Like [`play_recall`](Self::play_recall), with channel-level recalls
    /// spread over the worker pool one line per job.
    fn play_recall_parallel(
        self: &Arc<Self>,
        recall_id: &Arc<RecallId>,
        staging: StagingFlags,
        soundcard: &Arc<dyn Soundcard>,
    ) {
        let Some(pool) = self.worker_pool() else {
            self.play_recall(recall_id, staging, &**soundcard);
            return;
        };
        if !self.enter_stage(recall_id, staging) {
            return;
        }
        let list = self.list_for(recall_id).lock().clone();
        if staging == StagingFlags::RUN_PRE {
            self.automate(&list, recall_id, &**soundcard);
        }

        let mut audio_level = Vec::new();
        let mut by_line: BTreeMap<usize, Vec<Arc<Recall>>> = BTreeMap::new();
        for recall in runnable(&list, recall_id) {
            match recall.line() {
                Some(line) => by_line.entry(line).or_default().push(recall),
                None => audio_level.push(recall),
            }
        }
        for recall in &audio_level {
            recall.run_stage(staging, self, recall_id, &**soundcard);
        }
        let jobs: Vec<ChannelJob> = by_line
            .into_values()
            .map(|recalls| {
                let audio = Arc::clone(self);
                let recall_id = Arc::clone(recall_id);
                let soundcard = Arc::clone(soundcard);
                Box::new(move || {
                    for recall in &recalls {
                        recall.run_stage(staging, &audio, &recall_id, &*soundcard);
                    }
                }) as ChannelJob
            })
            .collect();
        pool.run_period(jobs);
    }

    fn run_list(&self, list: &[Arc<Recall>], recall_id: &Arc<RecallId>, staging: StagingFlags, soundcard: &dyn Soundcard) {
        for recall in runnable(list, recall_id) {
            recall.run_stage(staging, self, recall_id, soundcard);
        }
    }

    /// Sample every automation lane into its port and run the `automate`
    /// hook of the audio-level recalls.
    fn automate(&self, list: &[Arc<Recall>], recall_id: &Arc<RecallId>, soundcard: &dyn Soundcard) {
        recall_id.set_staging_flags(StagingFlags::AUTOMATE);
        let lanes = self.automation_lanes();
        let position = AutomationPosition::from_soundcard(soundcard);
        let audio_channels = self.audio_channels();

        for holder in list.iter().filter(|r| r.kind() == RecallKind::Audio) {
            let container = holder.container().and_then(|id| self.container(id));
            for lane in &lanes {
                let (port, target) = match holder.port(lane.specifier()) {
                    Some(port) => (port, AudioChannelTarget::All),
                    None => {
                        let port = container
                            .as_ref()
                            .and_then(|c| c.channel_recall(lane.line()))
                            .and_then(|r| r.port(lane.specifier()));
                        let Some(port) = port else {
                            continue;
                        };
                        (port, AudioChannelTarget::Channel(lane.line() % audio_channels))
                    }
                };
                port.set_flags(PortFlags::IS_AUTOMATED);
                let Some(value) = lane.apply(&port, position) else {
                    continue;
                };
                if port.flags().contains(PortFlags::FORWARD_TO_PLUGIN) {
                    if let (Some(effect), Some(index)) = (
                        container.as_ref().and_then(|c| c.effect()),
                        port.plugin_port_index(),
                    ) {
                        effect.stage(target, index, value.as_f64() as f32);
                    }
                }
            }
        }

        for recall in runnable(list, recall_id).filter(|r| r.kind().is_audio_level()) {
            recall.run_stage(StagingFlags::AUTOMATE, self, recall_id, soundcard);
        }
        recall_id.unset_staging_flags(StagingFlags::AUTOMATE);
    }

    /// Mark the id's working recalls done.
    pub fn done_recall(&self, recall_id: &Arc<RecallId>) {
        let list = self.list_for(recall_id).lock().clone();
        for recall in runnable(&list, recall_id) {
            recall.done();
        }
        recall_id.set_staging_flags(StagingFlags::DONE);
    }

    /// Flag the id cancelled, wait for the running period and cancel its
    /// working recalls.
    pub fn cancel_recall(&self, recall_id: &Arc<RecallId>) {
        recall_id.set_staging_flags(StagingFlags::CANCEL);
        recall_id.set_state_flags(StateFlags::IS_TERMINATING);
        let _period = self.lock_period();
        let list = self.list_for(recall_id).lock().clone();
        let context = recall_id.recycling_context();
        for recall in list.iter().filter(|r| r.runs_in(context)) {
            recall.cancel();
        }
    }

    /// Drop the id, its context, its signals and its working recalls once
    /// all of them are done. Returns whether the id was removed.
    pub fn cleanup_recall(&self, recall_id: &Arc<RecallId>) -> bool {
        let _period = self.lock_period();
        let context = Arc::clone(recall_id.recycling_context());
        if !(Recall::is_done_in(&self.play_list(), &context) && Recall::is_done_in(&self.recall_list(), &context)) {
            debug!(audio = %self.id(), "recall id still has running recalls");
            return false;
        }

        for list in [&self.play, &self.recall] {
            list.lock().retain(|r| !r.runs_in(&context));
        }
        self.recall_ids.lock().retain(|id| !Arc::ptr_eq(id, recall_id));
        self.recycling_contexts
            .lock()
            .retain(|c| !Arc::ptr_eq(c, &context));
        if let Some(parent) = context.parent() {
            parent.remove_child(&context);
        }

        for channel in self.channels(side_of(recall_id)) {
            channel.remove_recall_id(recall_id);
            for recycling in channel.recyclings() {
                recycling.remove_signals(recall_id);
            }
        }

        recall_id.set_staging_flags(StagingFlags::DONE | StagingFlags::REMOVE);
        recall_id.unset_state_flags(StateFlags::IS_ACTIVE | StateFlags::IS_TERMINATING);
        true
    }

    /// One stage of one period for every active run of `scope`: toplevel ids
    /// first, then their children.
    pub fn recursive_run_stage(
        self: &Arc<Self>,
        scope: SoundScope,
        staging: StagingFlags,
        soundcard: &Arc<dyn Soundcard>,
    ) {
        let _period = self.lock_period();
        if staging == StagingFlags::RUN_PRE {
            self.unset_staging_flags(scope, StagingFlags::RUN);
        }
        self.set_staging_flags(scope, staging);

        let (top, children): (Vec<_>, Vec<_>) = self
            .check_scope(scope)
            .into_iter()
            .filter(|id| {
                id.check_state_flags(StateFlags::IS_ACTIVE)
                    && !id.staging_flags().intersects(StagingFlags::CANCEL | StagingFlags::DONE)
            })
            .partition(|id| id.recycling_context().parent().is_none());

        for id in &top {
            self.play_recall(id, staging, &**soundcard);
        }
        for id in &children {
            self.play_recall_parallel(id, staging, soundcard);
        }

        if staging == StagingFlags::RUN_POST {
            self.finish_runs(scope);
        }
    }

    /// Tear down runs whose toplevel recalls are all done.
    fn finish_runs(&self, scope: SoundScope) {
        for top in self.toplevel_ids(scope) {
            if !Recall::is_done_in(&self.play_list(), top.recycling_context()) {
                continue;
            }
            let children = self.child_ids(&top);
            for child in &children {
                self.done_recall(child);
                self.cleanup_recall(child);
            }
            top.set_staging_flags(StagingFlags::DONE);
            self.cleanup_recall(&top);
            info!(audio = %self.id(), scope = scope.name(), "scope finished");
        }
    }

    /// Run one period of every scope with an active run.
    pub fn tick(self: &Arc<Self>, soundcard: &Arc<dyn Soundcard>) {
        let _period = self.lock_period();
        for scope in SoundScope::ALL {
            if self.check_scope(scope).is_empty() {
                continue;
            }
            for staging in StagingFlags::RUN_STAGES {
                self.recursive_run_stage(scope, staging, soundcard);
            }
        }
    }
}

/// A line-bound copy whose line is gone, or whose recycling no longer sits
/// on its line.
fn is_stale_line_copy(channels: &[Arc<Channel>], recall: &Recall) -> bool {
    let Some(line) = recall.line() else {
        return false;
    };
    let Some(channel) = channels.get(line) else {
        return true;
    };
    recall
        .recycling()
        .is_some_and(|id| !channel.recyclings().iter().any(|r| r.id() == id))
}

/// Working recalls of `recall_id` the walk starts from: children run under
/// their parent, port holders never run.
fn runnable<'a>(list: &'a [Arc<Recall>], recall_id: &'a Arc<RecallId>) -> impl Iterator<Item = Arc<Recall>> + 'a {
    let context = recall_id.recycling_context();
    list.iter()
        .filter(move |r| {
            r.runs_in(context) && !r.kind().is_port_holder() && r.parent().is_none() && !r.is_done()
        })
        .cloned()
}

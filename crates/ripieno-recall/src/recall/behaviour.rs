use super::{Recall, RecallDependency};
use crate::topology::{Audio, Channel, ChannelSide, Recycling};
use dyn_clone::DynClone;
use ripieno_core::{Port, RecallId, SoundScope, Soundcard};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// What a recall hook sees while it runs.
pub struct RunContext<'a> {
    pub audio: &'a Audio,
    pub recall: &'a Recall,
    pub recall_id: &'a Arc<RecallId>,
    pub soundcard: &'a dyn Soundcard,
}

impl RunContext<'_> {
    pub fn scope(&self) -> Option<SoundScope> {
        self.recall_id.sound_scope()
    }

    pub fn line(&self) -> Option<usize> {
        self.recall.line()
    }

    /// Toplevel runs cover the output chain, child runs the input chain.
    pub fn side(&self) -> ChannelSide {
        side_of(self.recall_id)
    }

    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.audio.channel(self.side(), self.line()?)
    }

    /// The recycling a per-recycling recall was duplicated for.
    pub fn recycling(&self) -> Option<Arc<Recycling>> {
        let id = self.recall.recycling()?;
        self.channel()?.recycling(id)
    }

    /// Port by specifier: the recall's own, then its container's channel
    /// recall for this line, then the container's audio recall.
    pub fn port(&self, specifier: &str) -> Option<Arc<Port>> {
        if let Some(port) = self.recall.port(specifier) {
            return Some(port);
        }
        let container = self.audio.container(self.recall.container()?)?;
        if let Some(port) = self
            .line()
            .and_then(|line| container.channel_recall(line))
            .and_then(|recall| recall.port(specifier))
        {
            return Some(port);
        }
        container.audio_recall().port(specifier)
    }

    pub fn port_value(&self, specifier: &str, default: f64) -> f64 {
        self.port(specifier).map_or(default, |port| port.read_f64())
    }

    /// Id of the run below this one, for toplevel recalls.
    pub fn child_recall_id(&self) -> Option<Arc<RecallId>> {
        self.recall_id
            .recycling_context()
            .child_recall_id(&self.audio.recall_ids())
    }

    /// Ask the pipeline to mark this recall done once the hook returns.
    pub fn request_done(&self) {
        self.recall.request_done();
    }
}

pub(crate) fn side_of(recall_id: &RecallId) -> ChannelSide {
    if recall_id.recycling_context().parent().is_none() {
        ChannelSide::Output
    } else {
        ChannelSide::Input
    }
}

/// Capability set of a recall. Every hook defaults to doing nothing.
///
/// Working copies are made with [`dyn_clone`], so state cloned from the
/// template is shared only where the behaviour keeps it behind an `Arc`.
pub trait RecallBehaviour: DynClone + Send + fmt::Debug {
    fn run_init_pre(&mut self, _cx: &RunContext<'_>) {}
    fn run_init_inter(&mut self, _cx: &RunContext<'_>) {}
    fn run_init_post(&mut self, _cx: &RunContext<'_>) {}

    /// Audio-level recalls only, before `run_pre`.
    fn automate(&mut self, _cx: &RunContext<'_>) {}

    fn run_pre(&mut self, _cx: &RunContext<'_>) {}
    fn run_inter(&mut self, _cx: &RunContext<'_>) {}
    fn run_post(&mut self, _cx: &RunContext<'_>) {}

    fn done(&mut self) {}
    fn cancel(&mut self) {}

    /// `provider` is the working copy the dependency now points at.
    fn resolve_dependency(&mut self, _dependency: &RecallDependency, _provider: &Recall) {}

    /// State dependants pick up on resolution.
    fn shared_state(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

dyn_clone::clone_trait_object!(RecallBehaviour);

/// Behaviour of port holders.
#[derive(Debug, Clone, Default)]
pub struct PortHolder;

impl RecallBehaviour for PortHolder {}

use super::behaviour::PortHolder;
use super::instance::{Recall, RecallBuilder};
use super::RecallKind;
use crate::fx::effect::EffectShared;
use crate::topology::ChannelSide;
use parking_lot::Mutex;
use ripieno_core::{ContainerId, IdAllocator, Port, RecallHandle};
use std::fmt;
use std::sync::Arc;

/// Creates the ports of a container's channel recall for `(line, audio_channel)`.
pub type ChannelPorts = Arc<dyn Fn(usize, usize) -> Vec<Port> + Send + Sync>;

/// Which list of the audio a container's templates go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecallList {
    /// Toplevel runs, over the output chain.
    Play,
    /// Child runs, over the input chain.
    Recall,
}

impl RecallList {
    pub fn side(self) -> ChannelSide {
        match self {
            RecallList::Play => ChannelSide::Output,
            RecallList::Recall => ChannelSide::Input,
        }
    }
}

/// One effect as installed on an audio: its audio-wide port holder, one
/// channel port holder per line, and the templates doing the work.
pub struct RecallContainer {
    id: ContainerId,
    name: String,
    filename: Option<String>,
    list: RecallList,
    audio_recall: Arc<Recall>,
    channel_ports: Option<ChannelPorts>,
    channel_recalls: Mutex<Vec<Arc<Recall>>>,
    templates: Vec<Arc<Recall>>,
    effect: Option<Arc<EffectShared>>,
}

impl fmt::Debug for RecallContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecallContainer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("list", &self.list)
            .field("templates", &self.templates.len())
            .field("channel_recalls", &self.channel_recalls.lock().len())
            .finish()
    }
}

impl RecallContainer {
    pub fn builder(name: impl Into<String>, list: RecallList) -> RecallContainerBuilder {
        RecallContainerBuilder {
            name: name.into(),
            filename: None,
            list,
            audio_ports: Vec::new(),
            channel_ports: None,
            templates: Vec::new(),
            effect: None,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn list(&self) -> RecallList {
        self.list
    }

    pub fn audio_recall(&self) -> &Arc<Recall> {
        &self.audio_recall
    }

    pub fn channel_recall(&self, line: usize) -> Option<Arc<Recall>> {
        self.channel_recalls.lock().get(line).cloned()
    }

    pub fn channel_recalls(&self) -> Vec<Arc<Recall>> {
        self.channel_recalls.lock().clone()
    }

    pub fn templates(&self) -> &[Arc<Recall>] {
        &self.templates
    }

    /// Handle of the template named `name`, for dependencies.
    pub fn template_handle(&self, name: &str) -> Option<RecallHandle> {
        self.templates
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.handle())
    }

    pub fn effect(&self) -> Option<&Arc<EffectShared>> {
        self.effect.as_ref()
    }

    /// Keep one channel recall per entry of `lines` (`(line, audio_channel)`
    /// in line order). Surplus recalls go, missing ones are created.
    pub(crate) fn sync_lines(&self, ids: &IdAllocator, lines: &[(usize, usize)]) {
        let Some(factory) = &self.channel_ports else {
            return;
        };
        let mut recalls = self.channel_recalls.lock();
        recalls.truncate(lines.len());
        for &(line, audio_channel) in &lines[recalls.len()..] {
            let recall = RecallBuilder::new(RecallKind::Channel, self.name.clone(), PortHolder)
                .container(self.id)
                .line(line)
                .shared_ports(factory(line, audio_channel).into_iter().map(Arc::new))
                .build(ids);
            recalls.push(recall);
        }
    }
}

pub struct RecallContainerBuilder {
    name: String,
    filename: Option<String>,
    list: RecallList,
    audio_ports: Vec<Port>,
    channel_ports: Option<ChannelPorts>,
    templates: Vec<RecallBuilder>,
    effect: Option<Arc<EffectShared>>,
}

impl RecallContainerBuilder {
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Port of the audio-wide holder.
    pub fn audio_port(mut self, port: Port) -> Self {
        self.audio_ports.push(port);
        self
    }

    pub fn channel_ports(mut self, factory: impl Fn(usize, usize) -> Vec<Port> + Send + Sync + 'static) -> Self {
        self.channel_ports = Some(Arc::new(factory));
        self
    }

    pub fn template(mut self, template: RecallBuilder) -> Self {
        self.templates.push(template);
        self
    }

    pub fn effect(mut self, effect: Arc<EffectShared>) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn build(self, ids: &IdAllocator) -> Arc<RecallContainer> {
        let id = ids.container();
        let audio_recall = self
            .audio_ports
            .into_iter()
            .fold(
                RecallBuilder::new(RecallKind::Audio, self.name.clone(), PortHolder).container(id),
                RecallBuilder::port,
            )
            .build(ids);
        let templates = self
            .templates
            .into_iter()
            .map(|template| template.container(id).build(ids))
            .collect();
        Arc::new(RecallContainer {
            id,
            name: self.name,
            filename: self.filename,
            list: self.list,
            audio_recall,
            channel_ports: self.channel_ports,
            channel_recalls: Mutex::new(Vec::new()),
            templates,
            effect: self.effect,
        })
    }
}

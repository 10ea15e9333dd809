use super::behaviour::{RecallBehaviour, RunContext};
use super::{RecallDependency, RecallFlags, RecallKind};
use crate::topology::Audio;
use parking_lot::Mutex;
use ripieno_core::{
    ContainerId, IdAllocator, Port, RecallHandle, RecallId, RecyclingContext, RecyclingId, ScopeMask,
    Soundcard, StagingFlags,
};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

/// Node of the recall graph: a template or one of its working copies.
#[derive(Debug)]
pub struct Recall {
    handle: RecallHandle,
    kind: RecallKind,
    name: String,
    ability: ScopeMask,
    container: Option<ContainerId>,
    template: Option<RecallHandle>,
    recall_id: Option<Arc<RecallId>>,
    line: Option<usize>,
    recycling: Option<RecyclingId>,
    flags: AtomicU32,
    staging: AtomicU32,
    done_requested: AtomicBool,
    ports: Vec<Arc<Port>>,
    dependencies: Mutex<Vec<RecallDependency>>,
    parent: Mutex<Weak<Recall>>,
    children: Mutex<Vec<Arc<Recall>>>,
    behaviour: Mutex<Box<dyn RecallBehaviour>>,
}

/// Builder for templates and port holders.
pub struct RecallBuilder {
    kind: RecallKind,
    name: String,
    ability: ScopeMask,
    container: Option<ContainerId>,
    line: Option<usize>,
    flags: RecallFlags,
    ports: Vec<Arc<Port>>,
    dependencies: Vec<RecallDependency>,
    behaviour: Box<dyn RecallBehaviour>,
}

impl RecallBuilder {
    /// Port holders start without flags; every other kind is a template
    /// able to run in all scopes.
    pub fn new(kind: RecallKind, name: impl Into<String>, behaviour: impl RecallBehaviour + 'static) -> Self {
        let flags = if kind.is_port_holder() {
            RecallFlags::empty()
        } else {
            RecallFlags::TEMPLATE
        };
        Self {
            kind,
            name: name.into(),
            ability: ScopeMask::all(),
            container: None,
            line: None,
            flags,
            ports: Vec::new(),
            dependencies: Vec::new(),
            behaviour: Box::new(behaviour),
        }
    }

    pub fn ability(mut self, ability: ScopeMask) -> Self {
        self.ability = ability;
        self
    }

    pub fn container(mut self, container: ContainerId) -> Self {
        self.container = Some(container);
        self
    }

    /// Restrict a per-line template to one line.
    pub fn line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn flags(mut self, flags: RecallFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn port(mut self, port: Port) -> Self {
        self.ports.push(Arc::new(port));
        self
    }

    pub fn shared_ports(mut self, ports: impl IntoIterator<Item = Arc<Port>>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn depends_on(mut self, provider: RecallHandle) -> Self {
        self.dependencies.push(RecallDependency::new(provider));
        self
    }

    pub fn build(self, ids: &IdAllocator) -> Arc<Recall> {
        Arc::new(Recall {
            handle: ids.recall(),
            kind: self.kind,
            name: self.name,
            ability: self.ability,
            container: self.container,
            template: None,
            recall_id: None,
            line: self.line,
            recycling: None,
            flags: AtomicU32::new(self.flags.bits()),
            staging: AtomicU32::new(0),
            done_requested: AtomicBool::new(false),
            ports: self.ports,
            dependencies: Mutex::new(self.dependencies),
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            behaviour: Mutex::new(self.behaviour),
        })
    }
}

impl Recall {
    pub fn handle(&self) -> RecallHandle {
        self.handle
    }

    pub fn kind(&self) -> RecallKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ability(&self) -> ScopeMask {
        self.ability
    }

    pub fn container(&self) -> Option<ContainerId> {
        self.container
    }

    /// Handle of the template this copy was made from.
    pub fn template(&self) -> Option<RecallHandle> {
        self.template
    }

    pub fn recall_id(&self) -> Option<&Arc<RecallId>> {
        self.recall_id.as_ref()
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn recycling(&self) -> Option<RecyclingId> {
        self.recycling
    }

    pub fn ports(&self) -> &[Arc<Port>] {
        &self.ports
    }

    pub fn port(&self, specifier: &str) -> Option<Arc<Port>> {
        self.ports
            .iter()
            .find(|port| port.specifier() == specifier)
            .cloned()
    }

    pub fn flags(&self) -> RecallFlags {
        RecallFlags::from_bits_retain(self.flags.load(Ordering::Acquire))
    }

    pub fn set_flags(&self, flags: RecallFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn unset_flags(&self, flags: RecallFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// True only when every bit of `mask` is set.
    pub fn check_flags(&self, mask: RecallFlags) -> bool {
        self.flags().contains(mask)
    }

    pub fn is_template(&self) -> bool {
        self.check_flags(RecallFlags::TEMPLATE)
    }

    pub fn staging_flags(&self) -> StagingFlags {
        StagingFlags::from_bits_retain(self.staging.load(Ordering::Acquire))
    }

    pub fn set_staging_flags(&self, flags: StagingFlags) {
        self.staging.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn is_done(&self) -> bool {
        self.staging_flags().contains(StagingFlags::DONE)
    }

    /// Whether this working copy runs in `context`.
    pub fn runs_in(&self, context: &Arc<RecyclingContext>) -> bool {
        self.recall_id
            .as_ref()
            .is_some_and(|id| Arc::ptr_eq(id.recycling_context(), context))
    }

    pub fn dependencies(&self) -> Vec<RecallDependency> {
        self.dependencies.lock().clone()
    }

    pub(crate) fn resolve_dependency(&self, index: usize, provider: &Arc<Recall>) {
        let dependency = {
            let mut dependencies = self.dependencies.lock();
            let Some(dependency) = dependencies.get_mut(index) else {
                return;
            };
            dependency.resolve(provider);
            dependency.clone()
        };
        self.behaviour
            .lock()
            .resolve_dependency(&dependency, provider);
    }

    pub fn shared_state(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.behaviour.lock().shared_state()
    }

    pub fn parent(&self) -> Option<Arc<Recall>> {
        self.parent.lock().upgrade()
    }

    pub fn children(&self) -> Vec<Arc<Recall>> {
        self.children.lock().clone()
    }

    pub fn add_child(self: &Arc<Self>, child: Arc<Recall>) {
        *child.parent.lock() = Arc::downgrade(self);
        let mut children = self.children.lock();
        if !children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            children.push(child);
        }
    }

    /// Detach `child`. Returns whether it was attached.
    pub fn remove_child(&self, child: &Recall) -> bool {
        let mut children = self.children.lock();
        let before = children.len();
        children.retain(|c| !std::ptr::eq(Arc::as_ptr(c), child));
        let removed = before != children.len();
        if removed {
            *child.parent.lock() = Weak::new();
        }
        removed
    }

    /// Working copy of this template for `recall_id`.
    ///
    /// Ports are shared with the template; dependencies start unresolved.
    pub fn duplicate(
        &self,
        ids: &IdAllocator,
        recall_id: &Arc<RecallId>,
        line: Option<usize>,
        recycling: Option<RecyclingId>,
    ) -> Arc<Recall> {
        let flags = (self.flags() - RecallFlags::TEMPLATE - RecallFlags::RUN_INITIALIZED)
            | RecallFlags::INITIAL_RUN;
        let dependencies = self
            .dependencies
            .lock()
            .iter()
            .map(RecallDependency::unresolved)
            .collect();
        let behaviour = dyn_clone::clone_box(&**self.behaviour.lock());
        Arc::new(Recall {
            handle: ids.recall(),
            kind: self.kind,
            name: self.name.clone(),
            ability: self.ability,
            container: self.container,
            template: Some(self.handle),
            recall_id: Some(Arc::clone(recall_id)),
            line,
            recycling,
            flags: AtomicU32::new(flags.bits()),
            staging: AtomicU32::new(0),
            done_requested: AtomicBool::new(false),
            ports: self.ports.clone(),
            dependencies: Mutex::new(dependencies),
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            behaviour: Mutex::new(behaviour),
        })
    }

    /// Run one init or run stage on this recall, then on its children.
    pub(crate) fn run_stage(
        self: &Arc<Self>,
        stage: StagingFlags,
        audio: &Audio,
        recall_id: &Arc<RecallId>,
        soundcard: &dyn Soundcard,
    ) {
        if self.is_template() {
            warn!(recall = %self.name, "refusing to run a template recall");
            return;
        }
        if self.is_done() {
            return;
        }
        if stage == StagingFlags::RUN_INIT_PRE {
            self.unset_flags(RecallFlags::HIDE);
        }

        if stage.intersects(StagingFlags::RUN_INIT) || !self.check_flags(RecallFlags::HIDE) {
            let cx = RunContext {
                audio,
                recall: self,
                recall_id,
                soundcard,
            };
            let mut behaviour = self.behaviour.lock();
            match stage {
                s if s == StagingFlags::RUN_INIT_PRE => behaviour.run_init_pre(&cx),
                s if s == StagingFlags::RUN_INIT_INTER => behaviour.run_init_inter(&cx),
                s if s == StagingFlags::RUN_INIT_POST => behaviour.run_init_post(&cx),
                s if s == StagingFlags::AUTOMATE => behaviour.automate(&cx),
                s if s == StagingFlags::RUN_PRE => behaviour.run_pre(&cx),
                s if s == StagingFlags::RUN_INTER => behaviour.run_inter(&cx),
                s if s == StagingFlags::RUN_POST => behaviour.run_post(&cx),
                _ => {}
            }
        }

        for child in self.children() {
            child.run_stage(stage, audio, recall_id, soundcard);
        }

        if stage == StagingFlags::RUN_INIT_POST {
            self.set_flags(RecallFlags::RUN_INITIALIZED);
        } else if stage == StagingFlags::RUN_POST {
            self.unset_flags(RecallFlags::INITIAL_RUN);
        }

        if self.done_requested.swap(false, Ordering::AcqRel) {
            self.done();
        }
    }

    pub(crate) fn request_done(&self) {
        self.done_requested.store(true, Ordering::Release);
    }

    /// Mark `DONE` and detach from the parent. Persistent recalls and
    /// templates ignore it. Returns whether the recall finished now.
    pub fn done(&self) -> bool {
        if self
            .flags()
            .intersects(RecallFlags::PERSISTENT | RecallFlags::TEMPLATE)
            || self.is_done()
        {
            return false;
        }
        self.set_staging_flags(StagingFlags::DONE);
        self.behaviour.lock().done();
        self.remove();
        true
    }

    /// Detach from the parent. A propagating parent left without children
    /// finishes too.
    fn remove(&self) {
        self.set_staging_flags(StagingFlags::REMOVE);
        let Some(parent) = self.parent() else {
            return;
        };
        parent.remove_child(self);
        if parent.check_flags(RecallFlags::PROPAGATE_DONE)
            && !parent.check_flags(RecallFlags::PERSISTENT)
            && parent.children.lock().is_empty()
        {
            parent.done();
        }
    }

    /// Cancel the children, then finish. Persistent recalls stop persisting.
    pub fn cancel(&self) {
        if self.is_template() {
            return;
        }
        self.set_staging_flags(StagingFlags::CANCEL);
        self.behaviour.lock().cancel();
        for child in self.children() {
            child.cancel();
        }
        self.unset_flags(RecallFlags::PERSISTENT);
        self.done();
    }

    /// First template of `list`.
    pub fn find_template(list: &[Arc<Recall>]) -> Option<Arc<Recall>> {
        list.iter().find(|r| r.is_template()).cloned()
    }

    /// First recall of `list` named `name`.
    pub fn find_type(list: &[Arc<Recall>], name: &str) -> Option<Arc<Recall>> {
        list.iter().find(|r| r.name == name).cloned()
    }

    /// Working copies of `list` running in `context`.
    pub fn find_recycling_context(list: &[Arc<Recall>], context: &Arc<RecyclingContext>) -> Vec<Arc<Recall>> {
        list.iter().filter(|r| r.runs_in(context)).cloned().collect()
    }

    /// `provider` itself and every copy made from it.
    pub fn find_provider(list: &[Arc<Recall>], provider: RecallHandle) -> Vec<Arc<Recall>> {
        list.iter()
            .filter(|r| r.handle == provider || r.template == Some(provider))
            .cloned()
            .collect()
    }

    /// Whether every working recall of `context` in `list` is done.
    ///
    /// Port holders and templates don't count. An empty list is never done.
    /// Unfinished recalls lose `RUN_INITIALIZED`.
    pub fn is_done_in(list: &[Arc<Recall>], context: &Arc<RecyclingContext>) -> bool {
        if list.is_empty() {
            return false;
        }
        let mut done = true;
        for recall in list {
            if recall.is_template() || recall.kind.is_port_holder() || !recall.runs_in(context) {
                continue;
            }
            if !recall.is_done() {
                recall.unset_flags(RecallFlags::RUN_INITIALIZED);
                done = false;
            }
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::PortHolder;
    use ripieno_core::{ParameterRange, SoundScope};

    fn working(ids: &IdAllocator, flags: RecallFlags) -> (Arc<Recall>, Arc<RecallId>) {
        let template = RecallBuilder::new(RecallKind::ChannelRun, "test", PortHolder)
            .flags(flags)
            .port(Port::double("./gain[0]", ParameterRange::linear(0.0, 1.0, 0.5)))
            .build(ids);
        let id = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Notation, 1));
        (template.duplicate(ids, &id, Some(0), None), id)
    }

    #[test]
    fn test_duplicate_shares_ports() {
        let ids = IdAllocator::new();
        let template = RecallBuilder::new(RecallKind::ChannelRun, "gain", PortHolder)
            .port(Port::double("./gain[0]", ParameterRange::linear(0.0, 1.0, 0.5)))
            .build(&ids);
        let id = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Notation, 1));
        let copy = template.duplicate(&ids, &id, Some(0), None);

        assert!(template.is_template());
        assert!(!copy.is_template());
        assert!(copy.check_flags(RecallFlags::INITIAL_RUN));
        assert_eq!(copy.template(), Some(template.handle()));
        assert!(Arc::ptr_eq(&copy.ports()[0], &template.ports()[0]));
    }

    #[test]
    fn test_done_ignores_persistent() {
        let ids = IdAllocator::new();
        let (recall, _) = working(&ids, RecallFlags::PERSISTENT);
        assert!(!recall.done());
        recall.cancel();
        assert!(recall.is_done());
        assert!(recall.staging_flags().contains(StagingFlags::CANCEL));
    }

    #[test]
    fn test_propagate_done_parent_finishes_with_last_child() {
        let ids = IdAllocator::new();
        let (parent, _) = working(&ids, RecallFlags::PROPAGATE_DONE);
        let (a, _) = working(&ids, RecallFlags::empty());
        let (b, _) = working(&ids, RecallFlags::empty());
        parent.add_child(Arc::clone(&a));
        parent.add_child(Arc::clone(&b));

        assert!(a.done());
        assert!(!parent.is_done());
        assert!(b.done());
        assert!(parent.is_done());
        assert!(parent.children().is_empty());
    }

    #[test]
    fn test_is_done_in_context() {
        let ids = IdAllocator::new();
        let (a, id) = working(&ids, RecallFlags::empty());
        let context = Arc::clone(id.recycling_context());
        assert!(!Recall::is_done_in(&[], &context));

        a.set_flags(RecallFlags::RUN_INITIALIZED);
        let list = vec![Arc::clone(&a)];
        assert!(!Recall::is_done_in(&list, &context));
        assert!(!a.check_flags(RecallFlags::RUN_INITIALIZED));

        a.done();
        assert!(Recall::is_done_in(&list, &context));
    }

    #[test]
    fn test_finders() {
        let ids = IdAllocator::new();
        let template = RecallBuilder::new(RecallKind::AudioRun, "processor", PortHolder).build(&ids);
        let id = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Sequencer, 2));
        let copy = template.duplicate(&ids, &id, None, None);
        let list = vec![Arc::clone(&template), Arc::clone(&copy)];

        assert_eq!(Recall::find_template(&list).unwrap().handle(), template.handle());
        assert!(Recall::find_type(&list, "processor").is_some());
        assert_eq!(Recall::find_provider(&list, template.handle()).len(), 2);
        assert_eq!(
            Recall::find_recycling_context(&list, id.recycling_context()).len(),
            1
        );
    }
}

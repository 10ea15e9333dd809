//! Per-run view of the recycling topology.
//!
//! A [`RecyclingContext`] maps line positions to recyclings for one run.
//! Contexts form a tree: a context owns its children, and each child keeps a
//! weak link to its parent. Recyclings are referenced by [`RecyclingId`],
//! never owned.

use crate::ids::RecyclingId;
use crate::recall_id::RecallId;
use crate::staging::SoundScope;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

#[derive(Debug)]
pub struct RecyclingContext {
    sound_scope: SoundScope,
    recyclings: Mutex<Vec<Option<RecyclingId>>>,
    parent: Mutex<Weak<RecyclingContext>>,
    children: Mutex<Vec<Arc<RecyclingContext>>>,
}

impl RecyclingContext {
    /// Context with `length` empty slots.
    pub fn new(sound_scope: SoundScope, length: usize) -> Arc<Self> {
        Self::with_recyclings(sound_scope, vec![None; length])
    }

    fn with_recyclings(sound_scope: SoundScope, recyclings: Vec<Option<RecyclingId>>) -> Arc<Self> {
        Arc::new(Self {
            sound_scope,
            recyclings: Mutex::new(recyclings),
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn sound_scope(&self) -> SoundScope {
        self.sound_scope
    }

    pub fn len(&self) -> usize {
        self.recyclings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recyclings.lock().is_empty()
    }

    pub fn get(&self, position: usize) -> Option<RecyclingId> {
        self.recyclings.lock().get(position).copied().flatten()
    }

    /// Snapshot of the slot array.
    pub fn recyclings(&self) -> Vec<Option<RecyclingId>> {
        self.recyclings.lock().clone()
    }

    /// Fill slot `position`. Positions outside the array are ignored.
    pub fn replace(&self, recycling: RecyclingId, position: usize) {
        let mut recyclings = self.recyclings.lock();
        if let Some(slot) = recyclings.get_mut(position) {
            *slot = Some(recycling);
        }
    }

    /// Rebind every slot in place. The slot count becomes `recyclings.len()`.
    pub fn set_recyclings(&self, recyclings: Vec<Option<RecyclingId>>) {
        *self.recyclings.lock() = recyclings;
    }

    /// Position of `recycling`, if bound.
    pub fn find(&self, recycling: RecyclingId) -> Option<usize> {
        self.recyclings
            .lock()
            .iter()
            .position(|slot| *slot == Some(recycling))
    }

    /// New context with `recycling` appended.
    pub fn add(&self, recycling: RecyclingId) -> Arc<Self> {
        let mut recyclings = self.recyclings();
        recyclings.push(Some(recycling));
        Self::with_recyclings(self.sound_scope, recyclings)
    }

    /// New context without `recycling`. Returns `None` when it is not bound.
    pub fn remove(&self, recycling: RecyclingId) -> Option<Arc<Self>> {
        let mut recyclings = self.recyclings();
        let position = recyclings.iter().position(|slot| *slot == Some(recycling))?;
        recyclings.remove(position);
        Some(Self::with_recyclings(self.sound_scope, recyclings))
    }

    /// New context with `recycling` inserted at `position` (clamped to the end).
    pub fn insert(&self, recycling: RecyclingId, position: usize) -> Arc<Self> {
        let mut recyclings = self.recyclings();
        let position = position.min(recyclings.len());
        recyclings.insert(position, Some(recycling));
        Self::with_recyclings(self.sound_scope, recyclings)
    }

    /// New context where the bound run `old` is replaced by `new`.
    ///
    /// When `old` is empty or not bound, `new` is appended. Parent link and
    /// children carry over. Returns `None` for an empty `new`.
    pub fn reset_recycling(&self, old: &[RecyclingId], new: &[RecyclingId]) -> Option<Arc<Self>> {
        if new.is_empty() {
            return None;
        }

        let mut recyclings = self.recyclings();
        let start = old.first().and_then(|first| {
            recyclings.iter().position(|slot| *slot == Some(*first))
        });

        let replacement = new.iter().copied().map(Some);
        match start {
            Some(start) => {
                let end = (start + old.len()).min(recyclings.len());
                recyclings.splice(start..end, replacement);
            }
            None => recyclings.extend(replacement),
        }

        let context = Self::with_recyclings(self.sound_scope, recyclings);
        *context.parent.lock() = self.parent.lock().clone();
        *context.children.lock() = self.children.lock().clone();
        Some(context)
    }

    pub fn parent(&self) -> Option<Arc<RecyclingContext>> {
        self.parent.lock().upgrade()
    }

    pub fn children(&self) -> Vec<Arc<RecyclingContext>> {
        self.children.lock().clone()
    }

    /// Root of the tree this context belongs to.
    pub fn toplevel(self: &Arc<Self>) -> Arc<RecyclingContext> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Attach `child`, pointing its parent link at `self`.
    pub fn add_child(self: &Arc<Self>, child: Arc<RecyclingContext>) {
        *child.parent.lock() = Arc::downgrade(self);
        let mut children = self.children.lock();
        if !children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            children.push(child);
        }
    }

    /// Detach `child` and clear its parent link.
    pub fn remove_child(&self, child: &Arc<RecyclingContext>) {
        let mut children = self.children.lock();
        if let Some(position) = children.iter().position(|c| Arc::ptr_eq(c, child)) {
            let removed = children.remove(position);
            *removed.parent.lock() = Weak::new();
        }
    }

    /// Index of `child` among the children.
    pub fn find_child(&self, child: &Arc<RecyclingContext>) -> Option<usize> {
        self.children
            .lock()
            .iter()
            .position(|c| Arc::ptr_eq(c, child))
    }

    /// Index of `self` in its parent's children.
    pub fn find_parent(self: &Arc<Self>) -> Option<usize> {
        self.parent()?.find_child(self)
    }

    /// The id in `recall_ids` whose context is a child of `self`.
    pub fn child_recall_id(
        self: &Arc<Self>,
        recall_ids: &[Arc<RecallId>],
    ) -> Option<Arc<RecallId>> {
        recall_ids
            .iter()
            .find(|id| {
                id.recycling_context()
                    .parent()
                    .is_some_and(|parent| Arc::ptr_eq(&parent, self))
            })
            .cloned()
    }
}

/// The id in `recall_ids` running in `context`.
pub fn find_recycling_context(
    recall_ids: &[Arc<RecallId>],
    context: &Arc<RecyclingContext>,
) -> Option<Arc<RecallId>> {
    recall_ids
        .iter()
        .find(|id| Arc::ptr_eq(id.recycling_context(), context))
        .cloned()
}

/// The id in `recall_ids` whose context's parent is `parent`.
pub fn find_parent_recycling_context(
    recall_ids: &[Arc<RecallId>],
    parent: &Arc<RecyclingContext>,
) -> Option<Arc<RecallId>> {
    parent.child_recall_id(recall_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u64) -> Vec<RecyclingId> {
        (1..=n).map(RecyclingId).collect()
    }

    #[test]
    fn test_replace_ignores_out_of_range() {
        let context = RecyclingContext::new(SoundScope::Notation, 2);
        context.replace(RecyclingId(7), 1);
        context.replace(RecyclingId(8), 2);
        assert_eq!(context.recyclings(), vec![None, Some(RecyclingId(7))]);
        assert_eq!(context.find(RecyclingId(7)), Some(1));
        assert_eq!(context.find(RecyclingId(8)), None);
    }

    #[test]
    fn test_set_recyclings_keeps_identity() {
        let parent = RecyclingContext::new(SoundScope::Notation, 1);
        let context = RecyclingContext::new(SoundScope::Notation, 2);
        parent.add_child(Arc::clone(&context));
        context.set_recyclings(vec![Some(RecyclingId(4)), None, Some(RecyclingId(6))]);
        assert_eq!(context.len(), 3);
        assert_eq!(context.find(RecyclingId(6)), Some(2));
        assert!(context.parent().is_some_and(|p| Arc::ptr_eq(&p, &parent)));
        assert_eq!(parent.find_child(&context), Some(0));
    }

    #[test]
    fn test_add_remove_insert_return_new_contexts() {
        let context = RecyclingContext::new(SoundScope::Playback, 0);
        let added = context.add(RecyclingId(1)).add(RecyclingId(3));
        let inserted = added.insert(RecyclingId(2), 1);
        assert!(context.is_empty());
        assert_eq!(inserted.find(RecyclingId(2)), Some(1));
        assert_eq!(inserted.len(), 3);

        let removed = inserted.remove(RecyclingId(1)).unwrap();
        assert_eq!(removed.find(RecyclingId(2)), Some(0));
        assert!(removed.remove(RecyclingId(9)).is_none());
    }

    #[test]
    fn test_reset_recycling_splices() {
        let context = RecyclingContext::new(SoundScope::Playback, 3);
        for (i, id) in ids(3).into_iter().enumerate() {
            context.replace(id, i);
        }
        let reset = context
            .reset_recycling(&[RecyclingId(2)], &[RecyclingId(20), RecyclingId(21)])
            .unwrap();
        assert_eq!(
            reset.recyclings(),
            vec![
                Some(RecyclingId(1)),
                Some(RecyclingId(20)),
                Some(RecyclingId(21)),
                Some(RecyclingId(3))
            ]
        );
        assert!(context.reset_recycling(&[], &[]).is_none());
    }

    #[test]
    fn test_tree_links() {
        let root = RecyclingContext::new(SoundScope::Playback, 1);
        let child = RecyclingContext::new(SoundScope::Playback, 1);
        let grandchild = RecyclingContext::new(SoundScope::Playback, 1);

        root.add_child(Arc::clone(&child));
        child.add_child(Arc::clone(&grandchild));

        assert!(Arc::ptr_eq(&grandchild.toplevel(), &root));
        assert_eq!(child.find_parent(), Some(0));
        assert_eq!(root.find_child(&child), Some(0));

        root.remove_child(&child);
        assert!(child.parent().is_none());
        assert!(Arc::ptr_eq(&grandchild.toplevel(), &child));
    }

    #[test]
    fn test_parent_link_is_weak() {
        let child = RecyclingContext::new(SoundScope::Wave, 1);
        {
            let root = RecyclingContext::new(SoundScope::Wave, 1);
            root.add_child(Arc::clone(&child));
            assert!(child.parent().is_some());
        }
        assert!(child.parent().is_none());
    }

    #[test]
    fn test_find_recycling_context_scans_ids() {
        let parent = RecyclingContext::new(SoundScope::Notation, 1);
        let child = RecyclingContext::new(SoundScope::Notation, 1);
        parent.add_child(Arc::clone(&child));

        let parent_id = RecallId::new(Arc::clone(&parent));
        let child_id = RecallId::new(Arc::clone(&child));
        let list = vec![Arc::clone(&parent_id), Arc::clone(&child_id)];

        let found = find_recycling_context(&list, &parent).unwrap();
        assert!(Arc::ptr_eq(&found, &parent_id));
        let found = find_parent_recycling_context(&list, &parent).unwrap();
        assert!(Arc::ptr_eq(&found, &child_id));
    }
}

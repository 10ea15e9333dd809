//! Identity of one concurrent run of a recall graph.

use crate::recycling_context::RecyclingContext;
use crate::staging::{SoundScope, StagingFlags, StateFlags};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

const UNSCOPED: u8 = u8::MAX;

/// One run: its sound scope, the stages it has passed and its recycling context.
///
/// Flag updates are lock-free so the render thread never contends with
/// control threads that poll a run's progress.
#[derive(Debug)]
pub struct RecallId {
    sound_scope: AtomicU8,
    staging_flags: AtomicU32,
    state_flags: AtomicU32,
    recycling_context: Arc<RecyclingContext>,
}

impl RecallId {
    /// Unscoped id bound to `recycling_context`.
    pub fn new(recycling_context: Arc<RecyclingContext>) -> Arc<Self> {
        Arc::new(Self {
            sound_scope: AtomicU8::new(UNSCOPED),
            staging_flags: AtomicU32::new(0),
            state_flags: AtomicU32::new(0),
            recycling_context,
        })
    }

    /// Id scoped like its context.
    pub fn with_context_scope(recycling_context: Arc<RecyclingContext>) -> Arc<Self> {
        let scope = recycling_context.sound_scope();
        let id = Self::new(recycling_context);
        id.set_sound_scope(scope);
        id
    }

    #[inline]
    pub fn recycling_context(&self) -> &Arc<RecyclingContext> {
        &self.recycling_context
    }

    pub fn sound_scope(&self) -> Option<SoundScope> {
        match self.sound_scope.load(Ordering::Acquire) {
            UNSCOPED => None,
            index => SoundScope::from_index(index as usize),
        }
    }

    /// Assign the scope. Once scoped, further calls leave the id unchanged.
    pub fn set_sound_scope(&self, scope: SoundScope) {
        let _ = self.sound_scope.compare_exchange(
            UNSCOPED,
            scope.index() as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// `Some(scope)` tests for that scope; `None` tests whether any scope is set.
    pub fn check_sound_scope(&self, scope: Option<SoundScope>) -> bool {
        match (self.sound_scope(), scope) {
            (Some(current), Some(wanted)) => current == wanted,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn staging_flags(&self) -> StagingFlags {
        StagingFlags::from_bits_retain(self.staging_flags.load(Ordering::Acquire))
    }

    pub fn set_staging_flags(&self, flags: StagingFlags) {
        self.staging_flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn unset_staging_flags(&self, flags: StagingFlags) {
        self.staging_flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// True only when every bit of `mask` is set.
    pub fn check_staging_flags(&self, mask: StagingFlags) -> bool {
        self.staging_flags().contains(mask)
    }

    pub fn state_flags(&self) -> StateFlags {
        StateFlags::from_bits_retain(self.state_flags.load(Ordering::Acquire))
    }

    pub fn set_state_flags(&self, flags: StateFlags) {
        self.state_flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn unset_state_flags(&self, flags: StateFlags) {
        self.state_flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// True only when every bit of `mask` is set.
    pub fn check_state_flags(&self, mask: StateFlags) -> bool {
        self.state_flags().contains(mask)
    }
}

/// Ids of `list` running in `scope`.
pub fn find_by_scope(list: &[Arc<RecallId>], scope: SoundScope) -> Vec<Arc<RecallId>> {
    list.iter()
        .filter(|id| id.check_sound_scope(Some(scope)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id() -> Arc<RecallId> {
        RecallId::new(RecyclingContext::new(SoundScope::Playback, 1))
    }

    #[test]
    fn test_sound_scope_is_write_once() {
        let id = id();
        assert!(!id.check_sound_scope(None));

        id.set_sound_scope(SoundScope::Notation);
        id.set_sound_scope(SoundScope::Playback);

        assert_eq!(id.sound_scope(), Some(SoundScope::Notation));
        assert!(id.check_sound_scope(None));
        assert!(id.check_sound_scope(Some(SoundScope::Notation)));
        assert!(!id.check_sound_scope(Some(SoundScope::Playback)));
    }

    #[test]
    fn test_check_staging_flags_requires_every_bit() {
        let id = id();
        id.set_staging_flags(StagingFlags::RUN_PRE);
        assert!(id.check_staging_flags(StagingFlags::RUN_PRE));
        assert!(!id.check_staging_flags(StagingFlags::RUN));

        id.set_staging_flags(StagingFlags::RUN_INTER | StagingFlags::RUN_POST);
        assert!(id.check_staging_flags(StagingFlags::RUN));

        id.unset_staging_flags(StagingFlags::RUN_INTER);
        assert!(!id.check_staging_flags(StagingFlags::RUN));
        assert!(id.check_staging_flags(StagingFlags::RUN_PRE | StagingFlags::RUN_POST));
    }

    #[test]
    fn test_state_flags() {
        let id = id();
        id.set_state_flags(StateFlags::IS_ACTIVE | StateFlags::IS_PROCESSING);
        id.unset_state_flags(StateFlags::IS_PROCESSING);
        assert!(id.check_state_flags(StateFlags::IS_ACTIVE));
        assert!(!id.check_state_flags(StateFlags::IS_PROCESSING));
    }

    #[test]
    fn test_find_by_scope() {
        let a = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Playback, 1));
        let b = RecallId::with_context_scope(RecyclingContext::new(SoundScope::Notation, 1));
        let found = find_by_scope(&[a, Arc::clone(&b)], SoundScope::Notation);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &b));
    }

    proptest! {
        #[test]
        fn prop_staging_set_touches_only_given_bits(bits in prop::collection::vec(0u32..16, 0..16)) {
            let id = id();
            let mut expected = StagingFlags::empty();
            for bit in bits {
                let flag = StagingFlags::from_bits_retain(1 << bit);
                prop_assert_eq!(id.check_staging_flags(flag), expected.contains(flag));
                id.set_staging_flags(flag);
                expected |= flag;
                prop_assert_eq!(id.staging_flags(), expected);
            }
            prop_assert!(id.check_staging_flags(expected));
        }
    }
}

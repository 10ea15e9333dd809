use super::Recall;
use ripieno_core::RecallHandle;
use std::sync::{Arc, Weak};

/// Link from a recall to another one it reads state from.
///
/// Templates point at the provider's template handle. Resolution swaps in
/// the provider's working copy of the same run.
#[derive(Debug, Clone)]
pub struct RecallDependency {
    provider: RecallHandle,
    resolved: Option<Weak<Recall>>,
}

impl RecallDependency {
    pub fn new(provider: RecallHandle) -> Self {
        Self {
            provider,
            resolved: None,
        }
    }

    /// Template handle of the provider.
    pub fn provider(&self) -> RecallHandle {
        self.provider
    }

    pub fn resolved(&self) -> Option<Arc<Recall>> {
        self.resolved.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }

    pub(crate) fn resolve(&mut self, instance: &Arc<Recall>) {
        self.resolved = Some(Arc::downgrade(instance));
    }

    /// Unresolved copy for a new working recall.
    pub(crate) fn unresolved(&self) -> Self {
        Self::new(self.provider)
    }
}

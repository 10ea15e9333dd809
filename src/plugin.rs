//! Plugin descriptor lookup.
//!
//! Backends register each effect they can load under its `(filename,
//! effect)` pair with a factory for fresh instances. The engine looks the
//! pair up when an effect recall is added to an audio.

use crate::{Error, Result};
use dashmap::DashMap;
use ripieno_recall::fx::{EffectPlugin, PluginDescriptor};
use std::sync::Arc;

/// Constructor for one plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn EffectPlugin> + Send + Sync>;

struct PluginEntry {
    descriptor: PluginDescriptor,
    factory: PluginFactory,
}

/// `(filename, effect)` to descriptor and factory.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    entries: Arc<DashMap<(String, String), Arc<PluginEntry>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor`, replacing any previous entry for its pair.
    pub fn register<F>(&self, descriptor: PluginDescriptor, factory: F)
    where
        F: Fn() -> Box<dyn EffectPlugin> + Send + Sync + 'static,
    {
        let key = (descriptor.filename.clone(), descriptor.effect.clone());
        tracing::debug!(filename = %key.0, effect = %key.1, params = descriptor.params.len(), "plugin registered");
        self.entries.insert(
            key,
            Arc::new(PluginEntry {
                descriptor,
                factory: Arc::new(factory),
            }),
        );
    }

    pub fn unregister(&self, filename: &str, effect: &str) -> bool {
        self.entries
            .remove(&(filename.to_string(), effect.to_string()))
            .is_some()
    }

    pub fn descriptor(&self, filename: &str, effect: &str) -> Option<PluginDescriptor> {
        self.entry(filename, effect).map(|e| e.descriptor.clone())
    }

    /// Descriptor and a new instance of the plugin.
    pub fn instantiate(&self, filename: &str, effect: &str) -> Result<(PluginDescriptor, Box<dyn EffectPlugin>)> {
        let entry = self
            .entry(filename, effect)
            .ok_or_else(|| Error::PluginNotFound {
                filename: filename.to_string(),
                effect: effect.to_string(),
            })?;
        Ok((entry.descriptor.clone(), (entry.factory)()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, filename: &str, effect: &str) -> Option<Arc<PluginEntry>> {
        self.entries
            .get(&(filename.to_string(), effect.to_string()))
            .map(|e| Arc::clone(e.value()))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.entries.len())
            .finish()
    }
}

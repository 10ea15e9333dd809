//! Identifier newtypes and their allocator.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

id_type!(
    /// Identity of an audio entity.
    AudioId
);
id_type!(
    /// Identity of one recycling slot.
    RecyclingId
);
id_type!(
    /// Identity of a recall instance (template or working copy).
    RecallHandle
);
id_type!(
    /// Identity of a recall container.
    ContainerId
);

/// Monotonic id source owned by the application context.
///
/// All ids handed out by one allocator are distinct regardless of type.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    #[inline]
    fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn audio(&self) -> AudioId {
        AudioId(self.next_raw())
    }

    pub fn recycling(&self) -> RecyclingId {
        RecyclingId(self.next_raw())
    }

    pub fn recall(&self) -> RecallHandle {
        RecallHandle(self.next_raw())
    }

    pub fn container(&self) -> ContainerId {
        ContainerId(self.next_raw())
    }
}

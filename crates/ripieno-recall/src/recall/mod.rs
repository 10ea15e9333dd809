//! Recall graph.
//!
//! A [`Recall`] is a closed [`RecallKind`] tag plus a [`RecallBehaviour`]
//! trait object. Effects are installed as [`RecallContainer`]s holding port
//! holders and templates; templates are duplicated per run.

mod behaviour;
mod container;
mod dependency;
mod instance;
mod kind;

pub use behaviour::{PortHolder, RecallBehaviour, RunContext};
pub(crate) use behaviour::side_of;
pub use container::{ChannelPorts, RecallContainer, RecallContainerBuilder, RecallList};
pub use dependency::RecallDependency;
pub use instance::{Recall, RecallBuilder};
pub use kind::{RecallFlags, RecallKind};

//! Audio tree: [`Audio`] → [`Channel`] → [`Recycling`] → [`AudioSignal`].

mod audio;
mod channel;
mod generator;
mod recycling;
mod signal;

pub use audio::{Audio, AudioFlags, AudioGeometry, AudioSettings};
pub use channel::{Channel, ChannelSide, DEFAULT_PATTERN_DIM};
pub(crate) use generator::overwrite;
pub use generator::{key_frequency, Generator};
pub use recycling::Recycling;
pub use signal::{find_by_recall_id, find_stream_current, AudioSignal};

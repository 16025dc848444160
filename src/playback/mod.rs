//! Music playback engine
//!
//! Per-guild sessions built on top of an abstract audio node: a
//! bounded pending queue plus a sliding history window feed a single
//! advancement loop, driven by serialized node callbacks.

pub mod listing_queue;
pub mod manager;
pub mod node;
pub mod notify;
pub mod queueable;
pub mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use node::{SongbirdConnector, VoiceConnector};
pub use service::{GateRefusal, MusicService};
pub use session::{PositionControls, SkipMode};

//! Integration test modules for Ripieno

pub mod engine;
pub mod playback;
pub mod ports;
pub mod scopes;

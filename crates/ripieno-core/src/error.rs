//! Error types for ripieno-core.

use thiserror::Error;

/// Error type for ripieno-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 1.0 and 999.0 BPM")]
    InvalidTempo(f64),

    #[error("Invalid loop range: left={left}, right={right}")]
    InvalidLoopRange { left: u64, right: u64 },

    #[error("Unsupported sample format: {0:#x}")]
    UnsupportedFormat(u32),

    #[error("Copy mode {mode} does not match buffers ({dest} <- {src})")]
    CopyModeMismatch {
        mode: u32,
        dest: &'static str,
        src: &'static str,
    },

    #[error("Port '{specifier}' expects {expected}, got {got}")]
    PortType {
        specifier: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Pattern index out of range: bank ({bank0}, {bank1}), bit {bit}")]
    PatternIndex { bank0: usize, bank1: usize, bit: usize },

    #[error("Persistence error: {0}")]
    Persist(#[from] serde_json::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

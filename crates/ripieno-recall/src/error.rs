//! Error types for ripieno-recall.

use ripieno_core::AudioId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid geometry for {audio}: {reason}")]
    InvalidGeometry { audio: AudioId, reason: String },

    #[error("Line {line} out of range ({lines} lines)")]
    LineOutOfRange { line: usize, lines: usize },

    #[error("Recall container not found: {0}")]
    ContainerNotFound(ripieno_core::ContainerId),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Worker pool error: {0}")]
    Worker(String),

    #[error(transparent)]
    Core(#[from] ripieno_core::Error),

    #[error(transparent)]
    Automation(#[from] ripieno_automation::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

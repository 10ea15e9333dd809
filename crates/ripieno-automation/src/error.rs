//! Error types for ripieno-automation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Acceleration at x={x} has non-finite value {y}")]
    InvalidAcceleration { x: f64, y: f64 },

    #[error(transparent)]
    Core(#[from] ripieno_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

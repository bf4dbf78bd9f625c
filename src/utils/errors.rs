use std::io;
use thiserror::Error;

use crate::bus::BusError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Property bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Numerical error in {module}: {detail}")]
    Numerical { module: &'static str, detail: String },

    #[error("Out of domain: {0}")]
    OutOfDomain(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Trim failed: {0}")]
    TrimFailed(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl SimError {
    /// Numerical faults engage Holding rather than aborting the process.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimError::Numerical { .. } | SimError::OutOfDomain(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

//! Configuration loading: XML readers for aircraft, initial conditions,
//! and run scripts.

pub mod aircraft;
pub mod init;
pub mod units;
pub mod xml;

pub use aircraft::AircraftConfig;
pub use init::InitConfig;

use thiserror::Error;

use crate::config::xml::XmlError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: {source}")]
    Xml {
        file: String,
        #[source]
        source: XmlError,
    },

    #[error("{file}: missing required element <{element}>")]
    MissingElement { file: String, element: String },

    #[error("{file}: line {line}: unknown or mismatched unit \"{unit}\"")]
    UnknownUnit {
        file: String,
        line: usize,
        unit: String,
    },

    #[error("{file}: line {line}: {detail}")]
    Invalid {
        file: String,
        line: usize,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

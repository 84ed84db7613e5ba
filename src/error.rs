use std::io;

use thiserror::Error;

use crate::registry::AcKey;

pub type Result<T> = std::result::Result<T, AcError>;

#[derive(Debug, Error)]
pub enum AcError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no registered constituency with key {0}")]
    UnknownPartition(AcKey),
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(
        "bulk write failed on {partition} (batch {batch_index}, {written} documents committed): {message}"
    )]
    BatchWrite {
        partition: String,
        batch_index: usize,
        written: u64,
        message: String,
    },
}

impl From<toml::de::Error> for AcError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for AcError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

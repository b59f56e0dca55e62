use multifold::core::store::{PathError, StoreError};
use multifold::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Multifold(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid store location: {0}")]
    StoreUri(#[from] PathError),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

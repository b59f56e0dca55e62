use thiserror::Error;

use super::config::ConfigError;
use super::search::SearchError;
use crate::core::models::ids::ChainId;
use crate::core::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid run configuration: {source}")]
    Configuration {
        #[from]
        source: ConfigError,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Chain {chain_id}: required input '{what}' is missing")]
    MissingInput { chain_id: ChainId, what: String },

    #[error("Failed to persist artifact '{path}': {source}")]
    Persistence {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Artifact store could not be queried for '{path}': {source}")]
    StoreUnavailable {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Search '{search}' failed for chain {chain_id}: {source}")]
    Search {
        chain_id: ChainId,
        search: &'static str,
        #[source]
        source: SearchError,
    },

    #[error("Chain {chain_id} failed: {source}")]
    ChainFailed {
        chain_id: ChainId,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Model runner '{runner}' failed: {reason}")]
    Prediction { runner: String, reason: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// The chain this error is attributed to, if any.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self {
            EngineError::MissingInput { chain_id, .. }
            | EngineError::Search { chain_id, .. }
            | EngineError::ChainFailed { chain_id, .. } => Some(*chain_id),
            _ => None,
        }
    }
}

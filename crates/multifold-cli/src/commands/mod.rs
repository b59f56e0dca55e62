pub mod features;
pub mod plan;

use crate::error::{CliError, Result};
use multifold::core::store::{LocalStore, StorageUri};
use std::path::Path;

/// Opens the store a run reads and writes. Only local stores are served by this binary.
fn open_store(uri: &StorageUri) -> Result<LocalStore> {
    match uri {
        StorageUri::Local(root) => Ok(LocalStore::open(root.clone())?),
        StorageUri::Bucket { .. } => Err(CliError::Config(format!(
            "store '{uri}' is not supported by this binary; use a local directory"
        ))),
    }
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSearchConfig {
    pub use_small_bfd: Option<bool>,
    pub max_template_date: Option<String>,
    pub uniref_max_hits: Option<usize>,
    pub mgnify_max_hits: Option<usize>,
    pub uniprot_max_hits: Option<usize>,
    pub skip_search: Option<bool>,
    pub n_cpu: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDatabaseConfig {
    pub uniref90: Option<PathBuf>,
    pub mgnify: Option<PathBuf>,
    pub bfd: Option<PathBuf>,
    pub small_bfd: Option<PathBuf>,
    pub uniref30: Option<PathBuf>,
    pub uniprot: Option<PathBuf>,
    pub pdb_seqres: Option<PathBuf>,
    pub pdb_mmcif: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileModelConfig {
    pub preset: Option<String>,
    pub model_names: Option<Vec<String>>,
    pub predictions_per_model: Option<usize>,
    pub random_seed: Option<i64>,
    pub run_relax: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub project: Option<String>,
    pub store: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub search: Option<FileSearchConfig>,
    pub databases: Option<FileDatabaseConfig>,
    pub model: Option<FileModelConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

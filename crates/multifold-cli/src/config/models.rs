use multifold::core::store::StorageUri;
use multifold::engine::config as core_config;
use std::path::PathBuf;

pub struct AppConfig {
    pub input_path: PathBuf,
    pub store: StorageUri,
    pub core_config: core_config::RunConfig,
}

use super::{ArtifactPath, ArtifactStore, StoreError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifacts as files under a root directory, one file per artifact path.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Opens a store rooted at `root`, creating the directory when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::Unavailable(format!(
            "cannot create store root '{}': {e}",
            root.display()
        )))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &ArtifactPath) -> PathBuf {
        self.root.join(path.to_string())
    }
}

fn io_error(path: &ArtifactPath, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_string(),
        source,
    }
}

impl ArtifactStore for LocalStore {
    fn exists(&self, path: &ArtifactPath) -> Result<bool, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "store root '{}' is not a directory",
                self.root.display()
            )));
        }
        self.file_path(path)
            .try_exists()
            .map_err(|e| io_error(path, e))
    }

    fn get(&self, path: &ArtifactPath) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.file_path(path)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn put(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.file_path(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
        }
        // Readers never observe a partially written artifact.
        let staging = target.with_extension("partial");
        fs::write(&staging, bytes).map_err(|e| io_error(path, e))?;
        fs::rename(&staging, &target).map_err(|e| io_error(path, e))?;
        debug!(artifact = %path, bytes = bytes.len(), "Stored artifact");
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut found = Vec::new();
        collect_files(&self.root, &self.root, &mut found).map_err(|e| {
            StoreError::Unavailable(format!("cannot list '{}': {e}", self.root.display()))
        })?;
        found.retain(|p| p.starts_with(prefix));
        found.sort();
        Ok(found)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if path.extension().is_none_or(|ext| ext != "partial") {
            if let Ok(relative) = path.strip_prefix(root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    Ok(())
}

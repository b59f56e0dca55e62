use super::{ArtifactPath, ArtifactStore, StoreError};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Volatile store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, path: &ArtifactPath) -> Result<bool, StoreError> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.contains_key(&path.to_string()))
    }

    fn get(&self, path: &ArtifactPath) -> Result<Vec<u8>, StoreError> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        blobs
            .get(&path.to_string())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn put(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::ArtifactKind;

    #[test]
    fn stores_and_lists_blobs() {
        let store = MemoryStore::new();
        let key: String = std::iter::repeat_n('a', 64).collect();
        let p = ArtifactPath::new("proj", ArtifactKind::ChainArtifacts, &key).unwrap();

        assert!(!store.exists(&p).unwrap());
        store.put(&p, b"one").unwrap();
        assert!(store.exists(&p).unwrap());
        assert_eq!(store.get(&p).unwrap(), b"one");
        assert_eq!(store.list("proj/chain").unwrap(), vec![p.to_string()]);
        assert!(store.list("nope").unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }
}

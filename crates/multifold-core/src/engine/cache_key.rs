use super::config::{RunConfig, TEMPLATE_DATE_FORMAT};
use super::error::EngineError;
use crate::core::models::sequence::Classification;
use crate::core::store::{ArtifactKind, ArtifactPath, ArtifactStore};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Field under which the hashed sequence content joins the run parameters.
const CONTENT_FIELD: &str = "sequence_content";

/// Field recording whether a chain artifact carries paired-alignment fields.
const PAIRED_FIELD: &str = "paired_alignment";

/// The run options that change search results, plus the optional skip-search toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub use_small_bfd: bool,
    pub max_template_date: String,
    pub uniref_max_hits: usize,
    pub mgnify_max_hits: usize,
    pub uniprot_max_hits: usize,
    pub skip_search: Option<bool>,
}

impl RunParameters {
    pub fn from_config(config: &RunConfig) -> Self {
        let search = &config.search;
        Self {
            use_small_bfd: search.use_small_bfd,
            max_template_date: search
                .max_template_date
                .format(TEMPLATE_DATE_FORMAT)
                .to_string(),
            uniref_max_hits: search.uniref_max_hits,
            mgnify_max_hits: search.mgnify_max_hits,
            uniprot_max_hits: search.uniprot_max_hits,
            skip_search: search.skip_search,
        }
    }

    /// Sorted-key form of the parameters merged with `content`.
    fn canonical(
        &self,
        content: &str,
        paired: Option<bool>,
        tier: KeyTier,
    ) -> BTreeMap<&'static str, Value> {
        let mut fields = BTreeMap::new();
        fields.insert(CONTENT_FIELD, Value::from(content));
        if let Some(paired) = paired {
            fields.insert(PAIRED_FIELD, Value::from(paired));
        }
        fields.insert("use_small_bfd", Value::from(self.use_small_bfd));
        fields.insert("max_template_date", Value::from(self.max_template_date.as_str()));
        fields.insert("uniref_max_hits", Value::from(self.uniref_max_hits));
        fields.insert("mgnify_max_hits", Value::from(self.mgnify_max_hits));
        fields.insert("uniprot_max_hits", Value::from(self.uniprot_max_hits));
        if tier == KeyTier::Fallback {
            fields.insert("skip_search", self.skip_search.map_or(Value::Null, Value::from));
        }
        fields
    }
}

/// Which parameter set a key was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTier {
    /// Excludes the skip-search toggle.
    Primary,
    /// Includes the skip-search toggle.
    Fallback,
}

impl fmt::Display for KeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyTier::Primary => "primary",
            KeyTier::Fallback => "fallback",
        })
    }
}

/// A lowercase hex SHA-256 digest naming one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the cache key of `content` under `params` for the given tier.
pub fn resolve(params: &RunParameters, content: &str, tier: KeyTier) -> CacheKey {
    digest(params, content, None, tier)
}

/// Computes the key of one chain's features.
///
/// Chains of mixed runs carry paired-alignment fields and uniform ones do not, so the
/// classification is part of what the key names.
pub fn resolve_chain(
    params: &RunParameters,
    sequence: &str,
    classification: Classification,
    tier: KeyTier,
) -> CacheKey {
    digest(params, sequence, Some(!classification.is_uniform()), tier)
}

fn digest(params: &RunParameters, content: &str, paired: Option<bool>, tier: KeyTier) -> CacheKey {
    let canonical = params.canonical(content, paired, tier);
    // Serializing a map of JSON scalars cannot fail.
    let encoded = serde_json::to_string(&canonical).unwrap_or_default();
    CacheKey(hex::encode(Sha256::digest(encoded.as_bytes())))
}

/// A key chosen for reading and writing, with whether its artifact already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: CacheKey,
    pub tier: KeyTier,
    pub exists: bool,
}

/// Resolves cache keys for one project against one store.
pub struct CacheKeyResolver<'a> {
    params: &'a RunParameters,
    store: &'a dyn ArtifactStore,
    project: &'a str,
}

impl<'a> CacheKeyResolver<'a> {
    pub fn new(params: &'a RunParameters, store: &'a dyn ArtifactStore, project: &'a str) -> Self {
        Self {
            params,
            store,
            project,
        }
    }

    pub fn params(&self) -> &RunParameters {
        self.params
    }

    pub fn path(&self, kind: ArtifactKind, key: &CacheKey) -> Result<ArtifactPath, EngineError> {
        ArtifactPath::new(self.project, kind, key.as_str())
            .map_err(|e| EngineError::MalformedInput(e.to_string()))
    }

    /// Whether an artifact exists for `key`. A store that cannot answer is an error, never
    /// a miss.
    pub fn exists_at(&self, kind: ArtifactKind, key: &CacheKey) -> Result<bool, EngineError> {
        let path = self.path(kind, key)?;
        self.store
            .exists(&path)
            .map_err(|source| EngineError::StoreUnavailable {
                path: path.to_string(),
                source,
            })
    }

    /// Picks the key to read and write `content` under.
    ///
    /// The primary key wins whenever its artifact exists. Otherwise the fallback key is used
    /// when the skip-search toggle is set, and the primary key when it is not.
    pub fn select(&self, kind: ArtifactKind, content: &str) -> Result<ResolvedKey, EngineError> {
        self.select_by(kind, |tier| resolve(self.params, content, tier))
    }

    /// Picks the chain-artifact key of `sequence` with the same tier policy as
    /// [`select`](Self::select).
    pub fn select_chain(
        &self,
        sequence: &str,
        classification: Classification,
    ) -> Result<ResolvedKey, EngineError> {
        self.select_by(ArtifactKind::ChainArtifacts, |tier| {
            resolve_chain(self.params, sequence, classification, tier)
        })
    }

    fn select_by(
        &self,
        kind: ArtifactKind,
        key_for: impl Fn(KeyTier) -> CacheKey,
    ) -> Result<ResolvedKey, EngineError> {
        let primary = key_for(KeyTier::Primary);
        if self.exists_at(kind, &primary)? {
            debug!(key = %primary, %kind, "Primary key hit");
            return Ok(ResolvedKey {
                key: primary,
                tier: KeyTier::Primary,
                exists: true,
            });
        }
        if self.params.skip_search.is_none() {
            return Ok(ResolvedKey {
                key: primary,
                tier: KeyTier::Primary,
                exists: false,
            });
        }
        let fallback = key_for(KeyTier::Fallback);
        let exists = self.exists_at(kind, &fallback)?;
        debug!(key = %fallback, %kind, exists, "Using fallback key");
        Ok(ResolvedKey {
            key: fallback,
            tier: KeyTier::Fallback,
            exists,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{MemoryStore, StoreError};

    fn params(skip_search: Option<bool>) -> RunParameters {
        RunParameters {
            use_small_bfd: false,
            max_template_date: "2022-01-01".into(),
            uniref_max_hits: 10_000,
            mgnify_max_hits: 501,
            uniprot_max_hits: 50_000,
            skip_search,
        }
    }

    #[test]
    fn resolve_is_deterministic_and_hex_encoded() {
        let a = resolve(&params(None), "MKV", KeyTier::Primary);
        let b = resolve(&params(None), "MKV", KeyTier::Primary);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn resolve_changes_with_any_input() {
        let base = resolve(&params(None), "MKV", KeyTier::Primary);
        assert_ne!(base, resolve(&params(None), "MKW", KeyTier::Primary));
        let mut other = params(None);
        other.mgnify_max_hits = 500;
        assert_ne!(base, resolve(&other, "MKV", KeyTier::Primary));
        other = params(None);
        other.use_small_bfd = true;
        assert_ne!(base, resolve(&other, "MKV", KeyTier::Primary));
    }

    #[test]
    fn primary_ignores_toggle_but_fallback_does_not() {
        let on = params(Some(true));
        let off = params(Some(false));
        assert_eq!(
            resolve(&on, "MKV", KeyTier::Primary),
            resolve(&off, "MKV", KeyTier::Primary)
        );
        assert_ne!(
            resolve(&on, "MKV", KeyTier::Fallback),
            resolve(&off, "MKV", KeyTier::Fallback)
        );
        assert_ne!(
            resolve(&on, "MKV", KeyTier::Primary),
            resolve(&on, "MKV", KeyTier::Fallback)
        );
    }

    #[test]
    fn canonical_form_is_sorted_compact_json() {
        let canonical = params(None).canonical("MKV", None, KeyTier::Primary);
        let encoded = serde_json::to_string(&canonical).unwrap();
        assert_eq!(
            encoded,
            "{\"max_template_date\":\"2022-01-01\",\"mgnify_max_hits\":501,\
             \"sequence_content\":\"MKV\",\"uniprot_max_hits\":50000,\
             \"uniref_max_hits\":10000,\"use_small_bfd\":false}"
        );
    }

    #[test]
    fn select_prefers_existing_primary_even_when_toggle_set() {
        let store = MemoryStore::new();
        let p = params(Some(true));
        let primary = resolve(&p, "MKV", KeyTier::Primary);
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        let path = resolver.path(ArtifactKind::ChainArtifacts, &primary).unwrap();
        store.put(&path, b"features").unwrap();

        let selected = resolver.select(ArtifactKind::ChainArtifacts, "MKV").unwrap();
        assert_eq!(selected.tier, KeyTier::Primary);
        assert_eq!(selected.key, primary);
        assert!(selected.exists);
    }

    #[test]
    fn select_uses_fallback_when_primary_absent_and_toggle_set() {
        let store = MemoryStore::new();
        let p = params(Some(true));
        let resolver = CacheKeyResolver::new(&p, &store, "proj");

        let selected = resolver.select(ArtifactKind::ChainArtifacts, "MKV").unwrap();
        assert_eq!(selected.tier, KeyTier::Fallback);
        assert_eq!(selected.key, resolve(&p, "MKV", KeyTier::Fallback));
        assert!(!selected.exists);
    }

    #[test]
    fn select_uses_primary_when_toggle_unset() {
        let store = MemoryStore::new();
        let p = params(None);
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        let selected = resolver.select(ArtifactKind::FullProteinArtifacts, "MKV").unwrap();
        assert_eq!(selected.tier, KeyTier::Primary);
        assert!(!selected.exists);
    }

    #[test]
    fn select_reuses_an_existing_fallback_artifact() {
        let store = MemoryStore::new();
        let p = params(Some(true));
        let fallback = resolve(&p, "MKV", KeyTier::Fallback);
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        let path = resolver.path(ArtifactKind::FullProteinArtifacts, &fallback).unwrap();
        store.put(&path, b"features").unwrap();

        let selected = resolver.select(ArtifactKind::FullProteinArtifacts, "MKV").unwrap();
        assert_eq!(selected.tier, KeyTier::Fallback);
        assert_eq!(selected.key, fallback);
        assert!(selected.exists);
    }

    #[test]
    fn chain_keys_depend_on_classification() {
        let p = params(None);
        let uniform = resolve_chain(&p, "MKV", Classification::Uniform, KeyTier::Primary);
        let mixed = resolve_chain(&p, "MKV", Classification::Mixed, KeyTier::Primary);
        assert_ne!(uniform, mixed);
        assert_ne!(uniform, resolve(&p, "MKV", KeyTier::Primary));
        assert_eq!(
            mixed,
            resolve_chain(&p, "MKV", Classification::Mixed, KeyTier::Primary)
        );
    }

    #[test]
    fn select_chain_does_not_cross_classifications() {
        let store = MemoryStore::new();
        let p = params(None);
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        let uniform = resolver.select_chain("MKV", Classification::Uniform).unwrap();
        store
            .put(&resolver.path(ArtifactKind::ChainArtifacts, &uniform.key).unwrap(), b"x")
            .unwrap();

        assert!(resolver.select_chain("MKV", Classification::Uniform).unwrap().exists);
        let mixed = resolver.select_chain("MKV", Classification::Mixed).unwrap();
        assert!(!mixed.exists);
        assert_ne!(mixed.key, uniform.key);
    }

    struct UnreachableStore;

    impl ArtifactStore for UnreachableStore {
        fn exists(&self, _: &ArtifactPath) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn get(&self, _: &ArtifactPath) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn put(&self, _: &ArtifactPath, _: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn list(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn select_fails_hard_when_store_cannot_be_queried() {
        let p = params(Some(true));
        let resolver = CacheKeyResolver::new(&p, &UnreachableStore, "proj");
        assert!(matches!(
            resolver.select(ArtifactKind::ChainArtifacts, "MKV"),
            Err(EngineError::StoreUnavailable { .. })
        ));
    }
}

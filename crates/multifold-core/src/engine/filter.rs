use super::cache_key::{CacheKeyResolver, ResolvedKey};
use super::error::EngineError;
use crate::core::models::sequence::{Classification, SequenceRecord};
use tracing::info;

/// A chain together with the key its features are read from or written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChain {
    pub record: SequenceRecord,
    pub key: ResolvedKey,
}

/// Chains split by whether their features already exist in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterResult {
    pub to_compute: Vec<PlannedChain>,
    pub cached: Vec<PlannedChain>,
}

/// Partitions `records` into cache misses and hits, preserving input order in both.
///
/// A chain counts as cached when its artifact exists under the primary or the fallback
/// key. Only existence checks are made against the store.
pub fn filter(
    records: &[SequenceRecord],
    classification: Classification,
    resolver: &CacheKeyResolver<'_>,
) -> Result<FilterResult, EngineError> {
    let mut result = FilterResult::default();
    for record in records {
        let key = resolver.select_chain(&record.sequence, classification)?;
        let planned = PlannedChain {
            record: record.clone(),
            key,
        };
        if planned.key.exists {
            result.cached.push(planned);
        } else {
            result.to_compute.push(planned);
        }
    }
    info!(
        cached = result.cached.len(),
        to_compute = result.to_compute.len(),
        "Partitioned chains by cache state"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ChainId;
    use crate::core::store::{ArtifactKind, ArtifactStore, MemoryStore};
    use crate::engine::cache_key::{KeyTier, RunParameters, resolve_chain};

    const MIXED: Classification = Classification::Mixed;

    fn params() -> RunParameters {
        RunParameters {
            use_small_bfd: true,
            max_template_date: "2021-11-01".into(),
            uniref_max_hits: 10,
            mgnify_max_hits: 10,
            uniprot_max_hits: 10,
            skip_search: None,
        }
    }

    fn store_chain(
        store: &MemoryStore,
        resolver: &CacheKeyResolver<'_>,
        params: &RunParameters,
        sequence: &str,
        tier: KeyTier,
    ) {
        let key = resolve_chain(params, sequence, MIXED, tier);
        store
            .put(&resolver.path(ArtifactKind::ChainArtifacts, &key).unwrap(), b"x")
            .unwrap();
    }

    fn records() -> Vec<SequenceRecord> {
        ["MKV", "GGS", "PLW"]
            .iter()
            .enumerate()
            .map(|(i, s)| SequenceRecord::new(ChainId::from_index(i).unwrap(), *s, ""))
            .collect()
    }

    #[test]
    fn cold_run_computes_everything() {
        let store = MemoryStore::new();
        let p = params();
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        let result = filter(&records(), MIXED, &resolver).unwrap();
        assert_eq!(result.to_compute.len(), 3);
        assert!(result.cached.is_empty());
    }

    #[test]
    fn stored_chains_are_cached_and_filtering_is_repeatable() {
        let store = MemoryStore::new();
        let p = params();
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        store_chain(&store, &resolver, &p, "GGS", KeyTier::Primary);

        let first = filter(&records(), MIXED, &resolver).unwrap();
        let second = filter(&records(), MIXED, &resolver).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.cached.len(), 1);
        assert_eq!(first.cached[0].record.sequence, "GGS");
        let order: Vec<&str> = first
            .to_compute
            .iter()
            .map(|c| c.record.sequence.as_str())
            .collect();
        assert_eq!(order, ["MKV", "PLW"]);
    }

    #[test]
    fn full_cache_hit_computes_nothing() {
        let store = MemoryStore::new();
        let p = params();
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        for record in records() {
            store_chain(&store, &resolver, &p, &record.sequence, KeyTier::Primary);
        }
        let result = filter(&records(), MIXED, &resolver).unwrap();
        assert!(result.to_compute.is_empty());
        assert_eq!(result.cached.len(), 3);
    }

    #[test]
    fn fallback_keyed_chains_count_as_cached() {
        let store = MemoryStore::new();
        let mut p = params();
        p.skip_search = Some(true);
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        store_chain(&store, &resolver, &p, "MKV", KeyTier::Fallback);
        store_chain(&store, &resolver, &p, "PLW", KeyTier::Primary);

        let result = filter(&records(), MIXED, &resolver).unwrap();
        let tiers: Vec<(&str, KeyTier)> = result
            .cached
            .iter()
            .map(|c| (c.record.sequence.as_str(), c.key.tier))
            .collect();
        assert_eq!(tiers, [("MKV", KeyTier::Fallback), ("PLW", KeyTier::Primary)]);
        assert_eq!(result.to_compute.len(), 1);
        assert_eq!(result.to_compute[0].key.tier, KeyTier::Fallback);
        assert!(!result.to_compute[0].key.exists);
    }

    #[test]
    fn uniform_artifacts_do_not_satisfy_a_mixed_run() {
        let store = MemoryStore::new();
        let p = params();
        let resolver = CacheKeyResolver::new(&p, &store, "proj");
        let key = resolve_chain(&p, "MKV", Classification::Uniform, KeyTier::Primary);
        store
            .put(&resolver.path(ArtifactKind::ChainArtifacts, &key).unwrap(), b"x")
            .unwrap();

        let result = filter(&records(), MIXED, &resolver).unwrap();
        assert!(result.cached.is_empty());
        let uniform = filter(&records()[..1], Classification::Uniform, &resolver).unwrap();
        assert_eq!(uniform.cached.len(), 1);
    }
}

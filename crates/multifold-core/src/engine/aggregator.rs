use super::context::RunContext;
use super::error::EngineError;
use super::filter::PlannedChain;
use super::search::{SearchRequest, SearchTool};
use crate::core::features::msa::make_msa_features;
use crate::core::features::sequence::make_sequence_features;
use crate::core::models::features::{FeatureError, FeatureSet};
use crate::core::models::ids::ChainId;
use crate::core::models::msa::Msa;
use crate::core::models::sequence::{Classification, EntityDescriptor, SequenceRecord};
use crate::core::store::ArtifactKind;
use crate::engine::config::ConfigError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Suffix marking fields that come from the paired (cross-chain) alignment.
pub const PAIRED_SUFFIX: &str = "_all_seq";

const PAIRED_FIELDS: [&str; 3] = ["msa", "deletion_matrix_int", "msa_species_identifiers"];

/// Row cap of the BFD search.
const BFD_MAX_HITS: usize = 10_000;

/// Alignments of the three primary searches of one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimarySearches {
    pub uniref90: Option<Msa>,
    pub mgnify: Option<Msa>,
    pub bfd: Option<Msa>,
}

/// Why the optional paired search contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalStepFailure {
    pub chain_id: ChainId,
    pub step: &'static str,
    pub reason: String,
}

impl fmt::Display for OptionalStepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain {}: {} failed: {}", self.chain_id, self.step, self.reason)
    }
}

/// Result of aggregating one chain.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    Complete(FeatureSet),
    /// Base features only; the paired search failed.
    Degraded {
        features: FeatureSet,
        failure: OptionalStepFailure,
    },
}

impl AggregateOutcome {
    pub fn features(&self) -> &FeatureSet {
        match self {
            AggregateOutcome::Complete(features) => features,
            AggregateOutcome::Degraded { features, .. } => features,
        }
    }

    pub fn into_features(self) -> FeatureSet {
        match self {
            AggregateOutcome::Complete(features) => features,
            AggregateOutcome::Degraded { features, .. } => features,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AggregateOutcome::Degraded { .. })
    }
}

fn malformed(chain_id: ChainId) -> impl Fn(FeatureError) -> EngineError {
    move |e| EngineError::MalformedInput(format!("chain {chain_id}: {e}"))
}

fn required<'s>(
    chain_id: ChainId,
    what: &str,
    value: Option<&'s Msa>,
) -> Result<&'s Msa, EngineError> {
    value.ok_or_else(|| EngineError::MissingInput {
        chain_id,
        what: what.to_string(),
    })
}

/// Merges a chain's sequence encoding, its three primary alignments and its template
/// features into one feature set.
///
/// The merged alignment fields hold the deduplicated union of all three sources; each
/// source's own fields are kept as well under a `{source}_` prefix.
pub fn merge_base(
    record: &SequenceRecord,
    searches: &PrimarySearches,
    templates: Option<&FeatureSet>,
) -> Result<FeatureSet, EngineError> {
    let id = record.id;
    let sources = [
        ("uniref90", required(id, "uniref90 alignment", searches.uniref90.as_ref())?),
        ("mgnify", required(id, "mgnify alignment", searches.mgnify.as_ref())?),
        ("bfd", required(id, "bfd alignment", searches.bfd.as_ref())?),
    ];
    let templates = templates.ok_or_else(|| EngineError::MissingInput {
        chain_id: id,
        what: "template features".to_string(),
    })?;

    for (source, msa) in &sources {
        if msa.width() != record.len() {
            return Err(EngineError::MalformedInput(format!(
                "chain {id}: {source} alignment has {} columns for a {}-residue query",
                msa.width(),
                record.len()
            )));
        }
    }

    let mut features =
        make_sequence_features(&record.sequence, &record.description).map_err(malformed(id))?;
    let all: Vec<&Msa> = sources.iter().map(|(_, msa)| *msa).collect();
    features.extend(make_msa_features(&all).map_err(malformed(id))?);
    for (source, msa) in &sources {
        let own = make_msa_features(&[*msa]).map_err(malformed(id))?;
        features.extend_prefixed(&format!("{source}_"), &own);
    }
    features.extend(templates.clone());
    Ok(features)
}

/// Builds the paired-alignment fields from the paired search alignment.
pub fn paired_fields(paired: &Msa) -> Result<FeatureSet, FeatureError> {
    let features = make_msa_features(&[paired])?;
    let mut suffixed = FeatureSet::new();
    for name in PAIRED_FIELDS {
        suffixed.insert(format!("{name}{PAIRED_SUFFIX}"), features.require(name)?.clone());
    }
    Ok(suffixed)
}

fn chain_dir(ctx: &RunContext<'_>, chain_id: ChainId) -> Result<PathBuf, EngineError> {
    let dir = ctx.config.work_dir.join(format!("chain_{chain_id}"));
    fs::create_dir_all(&dir).map_err(|e| {
        EngineError::Internal(format!("cannot create '{}': {e}", dir.display()))
    })?;
    Ok(dir)
}

struct ChainSearch<'c> {
    ctx: &'c RunContext<'c>,
    record: &'c SequenceRecord,
    sequence_path: &'c Path,
    dir: PathBuf,
}

impl ChainSearch<'_> {
    fn run(
        &self,
        search: &'static str,
        tool: &dyn SearchTool,
        databases: Vec<PathBuf>,
        output: &str,
        max_hits: usize,
    ) -> Result<Msa, EngineError> {
        let request = SearchRequest {
            sequence_path: self.sequence_path.to_path_buf(),
            databases,
            output_path: self.dir.join(output),
            n_cpu: self.ctx.config.search.n_cpu,
            max_hits,
        };
        let output = tool.run(&request).map_err(|source| EngineError::Search {
            chain_id: self.record.id,
            search,
            source,
        })?;
        debug!(
            chain = %self.record.id,
            search,
            rows = output.msa.len(),
            format = %output.format,
            "Search finished"
        );
        Ok(output.msa)
    }

    fn uniref90_with_templates(&self) -> Result<(Msa, FeatureSet), EngineError> {
        let search = &self.ctx.config.search;
        let uniref90 = self.run(
            "uniref90",
            self.ctx.searches.jackhmmer.as_ref(),
            vec![search.databases.uniref90.clone()],
            "uniref90_hits.sto",
            search.uniref_max_hits,
        )?;
        let templates = self
            .ctx
            .searches
            .templates
            .search(self.record, &uniref90, &self.dir)
            .map_err(|source| EngineError::Search {
                chain_id: self.record.id,
                search: "templates",
                source,
            })?;
        Ok((uniref90, templates))
    }

    fn mgnify(&self) -> Result<Msa, EngineError> {
        let search = &self.ctx.config.search;
        self.run(
            "mgnify",
            self.ctx.searches.jackhmmer.as_ref(),
            vec![search.databases.mgnify.clone()],
            "mgnify_hits.sto",
            search.mgnify_max_hits,
        )
    }

    fn bfd(&self) -> Result<Msa, EngineError> {
        let search = &self.ctx.config.search;
        let dbs = &search.databases;
        if search.use_small_bfd {
            let small_bfd = dbs
                .small_bfd
                .clone()
                .ok_or(ConfigError::MissingParameter("databases.small_bfd"))?;
            self.run(
                "bfd",
                self.ctx.searches.jackhmmer.as_ref(),
                vec![small_bfd],
                "small_bfd_hits.sto",
                BFD_MAX_HITS,
            )
        } else {
            let bfd = dbs
                .bfd
                .clone()
                .ok_or(ConfigError::MissingParameter("databases.bfd"))?;
            let uniref30 = dbs
                .uniref30
                .clone()
                .ok_or(ConfigError::MissingParameter("databases.uniref30"))?;
            self.run(
                "bfd",
                self.ctx.searches.hhblits.as_ref(),
                vec![bfd, uniref30],
                "bfd_uniref_hits.a3m",
                BFD_MAX_HITS,
            )
        }
    }

    /// Runs the uniref90 search (followed by the template search that consumes it)
    /// alongside the mgnify and BFD searches, and waits for all of them.
    fn primary(&self) -> Result<(PrimarySearches, FeatureSet), EngineError> {
        #[cfg(feature = "parallel")]
        let (left, (mgnify, bfd)) = rayon::join(
            || self.uniref90_with_templates(),
            || rayon::join(|| self.mgnify(), || self.bfd()),
        );

        #[cfg(not(feature = "parallel"))]
        let (left, (mgnify, bfd)) = (
            self.uniref90_with_templates(),
            (self.mgnify(), self.bfd()),
        );

        let (uniref90, templates) = left?;
        let searches = PrimarySearches {
            uniref90: Some(uniref90),
            mgnify: Some(mgnify?),
            bfd: Some(bfd?),
        };
        Ok((searches, templates))
    }

    fn paired(&self) -> Result<FeatureSet, OptionalStepFailure> {
        let failure = |reason: String| OptionalStepFailure {
            chain_id: self.record.id,
            step: "paired search",
            reason,
        };
        let search = &self.ctx.config.search;
        let uniprot = search
            .databases
            .uniprot
            .clone()
            .ok_or_else(|| failure("uniprot database is not configured".to_string()))?;
        let msa = self
            .run(
                "uniprot",
                self.ctx.searches.jackhmmer.as_ref(),
                vec![uniprot],
                "uniprot_hits.sto",
                search.uniprot_max_hits,
            )
            .map_err(|e| failure(e.to_string()))?;
        paired_fields(&msa).map_err(|e| failure(e.to_string()))
    }
}

/// Searches, merges and persists the features of one chain.
///
/// The paired search runs only for mixed runs that do not skip it. Its failure leaves the
/// base features intact and is reported through [`AggregateOutcome::Degraded`]. The
/// features are persisted under the chain's key before the outcome is returned.
#[instrument(skip_all, name = "aggregate_chain", fields(chain = %chain.record.id))]
pub fn aggregate_chain(
    ctx: &RunContext<'_>,
    chain: &PlannedChain,
    descriptor: &EntityDescriptor,
    classification: Classification,
) -> Result<AggregateOutcome, EngineError> {
    let record = &chain.record;
    let search = ChainSearch {
        ctx,
        record,
        sequence_path: &descriptor.sequence_path,
        dir: chain_dir(ctx, record.id)?,
    };

    let (primary, templates) = search.primary()?;
    let mut features = merge_base(record, &primary, Some(&templates))?;

    let outcome = if classification.is_uniform() {
        AggregateOutcome::Complete(features)
    } else if ctx.config.search.skips_paired_search() {
        debug!(chain = %record.id, "Paired search skipped by configuration");
        AggregateOutcome::Complete(features)
    } else {
        match search.paired() {
            Ok(paired) => {
                features.extend(paired);
                AggregateOutcome::Complete(features)
            }
            Err(failure) => {
                warn!(
                    chain = %record.id,
                    reason = %failure.reason,
                    "Paired search failed, continuing without paired alignment"
                );
                AggregateOutcome::Degraded { features, failure }
            }
        }
    };

    let resolver = ctx.resolver();
    let path = resolver.path(ArtifactKind::ChainArtifacts, &chain.key.key)?;
    let bytes = outcome
        .features()
        .to_bytes()
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    ctx.store
        .put(&path, &bytes)
        .map_err(|source| EngineError::Persistence {
            path: path.to_string(),
            source,
        })?;
    info!(chain = %record.id, artifact = %path, "Chain features persisted");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{ArtifactStore, MemoryStore};
    use crate::engine::cache_key::{KeyTier, ResolvedKey, resolve};
    use crate::engine::progress::ProgressReporter;
    use crate::test_support::{FakeSearch, FailingStore, test_config};
    use tempfile::tempdir;

    fn record(sequence: &str) -> SequenceRecord {
        SequenceRecord::new(ChainId::from_index(0).unwrap(), sequence, "chain A")
    }

    fn searches(query: &str) -> PrimarySearches {
        PrimarySearches {
            uniref90: Some(Msa::single(query, "q")),
            mgnify: Some(Msa::single(query, "q")),
            bfd: Some(Msa::single(query, "q")),
        }
    }

    fn planned(ctx: &RunContext<'_>, record: SequenceRecord) -> PlannedChain {
        PlannedChain {
            key: ResolvedKey {
                key: resolve(ctx.params(), &record.sequence, KeyTier::Primary),
                tier: KeyTier::Primary,
                exists: false,
            },
            record,
        }
    }

    fn descriptor(dir: &Path, record: &SequenceRecord) -> EntityDescriptor {
        let sequence_path = dir.join("chain_A.fasta");
        fs::write(&sequence_path, format!(">{}\n{}\n", record.description, record.sequence))
            .unwrap();
        EntityDescriptor {
            chain_id: record.id,
            sequence_path,
            description: record.description.clone(),
        }
    }

    #[test]
    fn merge_base_namespaces_each_source() {
        let templates = crate::core::features::template::empty_template_features(3);
        let features = merge_base(&record("MKV"), &searches("MKV"), Some(&templates)).unwrap();
        for name in ["aatype", "msa", "uniref90_msa", "mgnify_msa", "bfd_msa", "template_aatype"] {
            assert!(features.contains(name), "missing {name}");
        }
        assert_eq!(features.get("msa").unwrap().shape(), &[1, 3]);
    }

    #[test]
    fn merge_base_requires_every_primary_result() {
        let mut partial = searches("MKV");
        partial.mgnify = None;
        let templates = crate::core::features::template::empty_template_features(3);
        let result = merge_base(&record("MKV"), &partial, Some(&templates));
        assert!(matches!(
            result,
            Err(EngineError::MissingInput { what, .. }) if what == "mgnify alignment"
        ));
        assert!(matches!(
            merge_base(&record("MKV"), &searches("MKV"), None),
            Err(EngineError::MissingInput { .. })
        ));
    }

    #[test]
    fn merge_base_rejects_misaligned_results() {
        let mut wrong = searches("MKV");
        wrong.bfd = Some(Msa::single("MKVL", "q"));
        let templates = crate::core::features::template::empty_template_features(3);
        assert!(matches!(
            merge_base(&record("MKV"), &wrong, Some(&templates)),
            Err(EngineError::MalformedInput(_))
        ));
    }

    #[test]
    fn mixed_chain_gets_paired_fields_and_is_persisted() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), None);
        let store = MemoryStore::new();
        let suite = FakeSearch::suite(&[]);
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &store, &suite, &reporter);
        let chain = planned(&ctx, record("MKV"));
        let desc = descriptor(dir.path(), &chain.record);

        let outcome = aggregate_chain(&ctx, &chain, &desc, Classification::Mixed).unwrap();
        assert!(!outcome.is_degraded());
        assert!(outcome.features().contains("msa_all_seq"));
        assert!(outcome.features().contains("msa_species_identifiers_all_seq"));

        let path = ctx
            .resolver()
            .path(ArtifactKind::ChainArtifacts, &chain.key.key)
            .unwrap();
        let stored = FeatureSet::from_bytes(&store.get(&path).unwrap()).unwrap();
        assert_eq!(&stored, outcome.features());
    }

    #[test]
    fn failed_paired_search_degrades_without_paired_fields() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), None);
        let store = MemoryStore::new();
        let suite = FakeSearch::suite(&["uniprot"]);
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &store, &suite, &reporter);
        let chain = planned(&ctx, record("MKV"));
        let desc = descriptor(dir.path(), &chain.record);

        let outcome = aggregate_chain(&ctx, &chain, &desc, Classification::Mixed).unwrap();
        let AggregateOutcome::Degraded { features, failure } = outcome else {
            panic!("expected a degraded outcome");
        };
        assert_eq!(failure.step, "paired search");
        assert!(features.contains("msa"));
        assert!(features.contains("uniref90_msa"));
        assert!(features.names().all(|n| !n.ends_with(PAIRED_SUFFIX)));
    }

    #[test]
    fn uniform_and_skipped_runs_do_not_search_uniprot() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let reporter = ProgressReporter::new();

        let config = test_config(dir.path(), None);
        let suite = FakeSearch::suite(&["uniprot"]);
        let ctx = RunContext::new(&config, &store, &suite, &reporter);
        let chain = planned(&ctx, record("MKV"));
        let desc = descriptor(dir.path(), &chain.record);
        let outcome = aggregate_chain(&ctx, &chain, &desc, Classification::Uniform).unwrap();
        assert!(!outcome.is_degraded());

        let skipping = test_config(dir.path(), Some(true));
        let ctx = RunContext::new(&skipping, &store, &suite, &reporter);
        let chain = planned(&ctx, record("MKV"));
        let outcome = aggregate_chain(&ctx, &chain, &desc, Classification::Mixed).unwrap();
        assert!(!outcome.is_degraded());
        assert!(!outcome.features().contains("msa_all_seq"));
    }

    #[test]
    fn primary_search_failure_is_fatal_for_the_chain() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), None);
        let store = MemoryStore::new();
        let suite = FakeSearch::suite(&["mgnify"]);
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &store, &suite, &reporter);
        let chain = planned(&ctx, record("MKV"));
        let desc = descriptor(dir.path(), &chain.record);

        let result = aggregate_chain(&ctx, &chain, &desc, Classification::Mixed);
        assert!(matches!(
            result,
            Err(EngineError::Search { search: "mgnify", .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn store_write_failure_is_a_persistence_error() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), None);
        let store = FailingStore;
        let suite = FakeSearch::suite(&[]);
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &store, &suite, &reporter);
        let chain = planned(&ctx, record("MKV"));
        let desc = descriptor(dir.path(), &chain.record);

        let result = aggregate_chain(&ctx, &chain, &desc, Classification::Uniform);
        assert!(matches!(result, Err(EngineError::Persistence { .. })));
    }
}

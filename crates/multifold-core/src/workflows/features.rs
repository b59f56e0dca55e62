use crate::core::models::features::FeatureSet;
use crate::core::models::ids::ChainId;
use crate::core::store::{ArtifactKind, StoreError};
use crate::engine::aggregator::OptionalStepFailure;
use crate::engine::assembler::assemble;
use crate::engine::context::RunContext;
use crate::engine::error::EngineError;
use crate::engine::fanout::fan_out;
use crate::engine::filter::{FilterResult, PlannedChain, filter};
use crate::engine::planner::plan;
use crate::engine::progress::{ChainStatus, Progress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Where the artifacts of a run live: the merged complex and every chain by id.
///
/// Chains are listed in input order, which for more than 26 chains differs from the
/// string order of their ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub full_protein: String,
    pub chains: BTreeMap<ChainId, String>,
}

#[derive(Debug, Clone)]
pub struct FeatureRun {
    pub descriptor: RunDescriptor,
    /// Whether the complex artifact already existed and nothing was computed.
    pub reused: bool,
    pub statuses: BTreeMap<ChainId, ChainStatus>,
    pub degraded: Vec<OptionalStepFailure>,
}

fn chain_paths(
    ctx: &RunContext<'_>,
    filtered: &FilterResult,
) -> Result<BTreeMap<ChainId, String>, EngineError> {
    let resolver = ctx.resolver();
    filtered
        .cached
        .iter()
        .chain(&filtered.to_compute)
        .map(|chain| {
            let path = resolver.path(ArtifactKind::ChainArtifacts, &chain.key.key)?;
            Ok((chain.record.id, path.to_string()))
        })
        .collect()
}

fn load_cached(
    ctx: &RunContext<'_>,
    chain: &PlannedChain,
) -> Result<FeatureSet, EngineError> {
    let path = ctx
        .resolver()
        .path(ArtifactKind::ChainArtifacts, &chain.key.key)?;
    let bytes = ctx.store.get(&path).map_err(|source| match source {
        StoreError::NotFound(_) => EngineError::MissingInput {
            chain_id: chain.record.id,
            what: format!("cached features at '{path}'"),
        },
        source => EngineError::StoreUnavailable {
            path: path.to_string(),
            source,
        },
    })?;
    FeatureSet::from_bytes(&bytes).map_err(|e| {
        EngineError::MalformedInput(format!("cached features at '{path}' are unreadable: {e}"))
    })
}

/// Produces the complex features for `raw_input` and describes where they are stored.
///
/// A run whose complex artifact already exists returns immediately. Otherwise cached chains
/// are reused, the rest are computed in parallel, and the assembled complex is persisted
/// under the whole-run key.
#[instrument(skip_all, name = "features_workflow", fields(project = %ctx.config.project))]
pub fn run(ctx: &RunContext<'_>, raw_input: &str) -> Result<FeatureRun, EngineError> {
    let reporter = ctx.reporter;
    let resolver = ctx.resolver();

    // === Phase 1: Planning ===
    reporter.report(Progress::PhaseStart { name: "Planning" });
    let chain_plan = plan(raw_input, ctx.config.model.preset)?;
    let run_key = resolver.select(ArtifactKind::FullProteinArtifacts, raw_input)?;
    let full_protein = resolver
        .path(ArtifactKind::FullProteinArtifacts, &run_key.key)?
        .to_string();
    let filtered = filter(&chain_plan.records, chain_plan.classification, &resolver)?;
    let chains = chain_paths(ctx, &filtered)?;
    reporter.report(Progress::PhaseFinish);

    if run_key.exists {
        info!(artifact = %full_protein, tier = %run_key.tier, "Complex features already exist");
        let statuses = chain_plan
            .records
            .iter()
            .map(|r| (r.id, ChainStatus::CacheHit))
            .collect();
        return Ok(FeatureRun {
            descriptor: RunDescriptor {
                full_protein,
                chains,
            },
            reused: true,
            statuses,
            degraded: Vec::new(),
        });
    }

    // === Phase 2: Per-chain features ===
    reporter.report(Progress::PhaseStart {
        name: "Chain Features",
    });
    let descriptors = chain_plan.write_chain_sequences(&ctx.config.work_dir)?;
    let report = fan_out(ctx, &filtered, &descriptors, chain_plan.classification)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Assembly ===
    reporter.report(Progress::PhaseStart { name: "Assembly" });
    let mut features = report.computed;
    for chain in &filtered.cached {
        features.insert(chain.record.id, load_cached(ctx, chain)?);
    }
    let merged = assemble(&chain_plan, features)?;

    let path = resolver.path(ArtifactKind::FullProteinArtifacts, &run_key.key)?;
    let bytes = merged
        .to_bytes()
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    ctx.store
        .put(&path, &bytes)
        .map_err(|source| EngineError::Persistence {
            path: full_protein.clone(),
            source,
        })?;
    reporter.report(Progress::PhaseFinish);

    info!(
        artifact = %full_protein,
        chains = chains.len(),
        degraded = report.degraded.len(),
        "Feature workflow complete"
    );
    Ok(FeatureRun {
        descriptor: RunDescriptor {
            full_protein,
            chains,
        },
        reused: false,
        statuses: report.statuses,
        degraded: report.degraded,
    })
}

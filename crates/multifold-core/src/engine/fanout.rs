use super::aggregator::{AggregateOutcome, OptionalStepFailure, aggregate_chain};
use super::cache_key::CacheKey;
use super::context::RunContext;
use super::error::EngineError;
use super::filter::{FilterResult, PlannedChain};
use super::progress::{ChainStatus, Progress};
use super::state::{WorkItem, WorkLedger, WorkStatus};
use crate::core::models::features::FeatureSet;
use crate::core::models::ids::ChainId;
use crate::core::models::sequence::{Classification, EntityDescriptor};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What the fan-out resolved, available only once every chain task has finished.
#[derive(Debug)]
pub struct FanoutReport {
    /// Features of the chains computed in this run.
    pub computed: BTreeMap<ChainId, FeatureSet>,
    pub statuses: BTreeMap<ChainId, ChainStatus>,
    /// Paired-search failures of chains that were still computed.
    pub degraded: Vec<OptionalStepFailure>,
    pub ledger: WorkLedger,
}

/// Chains sharing one cache key. The lowest chain id computes, the rest reuse its result.
struct KeyGroup<'p> {
    representative: &'p PlannedChain,
    members: Vec<ChainId>,
}

fn group_by_key(to_compute: &[PlannedChain]) -> Vec<KeyGroup<'_>> {
    let mut groups: BTreeMap<&CacheKey, KeyGroup<'_>> = BTreeMap::new();
    for chain in to_compute {
        groups
            .entry(&chain.key.key)
            .and_modify(|g| {
                if chain.record.id < g.representative.record.id {
                    g.representative = chain;
                }
                g.members.push(chain.record.id);
            })
            .or_insert_with(|| KeyGroup {
                representative: chain,
                members: vec![chain.record.id],
            });
    }
    let mut groups: Vec<KeyGroup<'_>> = groups.into_values().collect();
    groups.sort_by_key(|g| g.representative.record.id);
    groups
}

fn run_task(
    ctx: &RunContext<'_>,
    chain: &PlannedChain,
    descriptors: &BTreeMap<ChainId, &EntityDescriptor>,
    classification: Classification,
) -> Result<AggregateOutcome, EngineError> {
    let descriptor = descriptors
        .get(&chain.record.id)
        .ok_or_else(|| EngineError::MissingInput {
            chain_id: chain.record.id,
            what: "sequence file".to_string(),
        })?;
    let result = aggregate_chain(ctx, chain, descriptor, classification);
    ctx.reporter.report(Progress::TaskIncrement);
    result
}

/// Runs one aggregation task per distinct uncached key on a pool of at most
/// `parallelism` workers and waits for all of them before returning.
///
/// A failed chain does not cancel its siblings. When any chain fails the error of the
/// lowest failed chain id is returned, wrapped in [`EngineError::ChainFailed`].
#[instrument(skip_all, name = "fan_out")]
pub fn fan_out(
    ctx: &RunContext<'_>,
    filtered: &FilterResult,
    descriptors: &[EntityDescriptor],
    classification: Classification,
) -> Result<FanoutReport, EngineError> {
    let mut ledger = WorkLedger::new();
    let mut statuses = BTreeMap::new();

    for chain in &filtered.cached {
        ledger.insert(WorkItem::new(chain.record.clone(), chain.key.key.clone()))?;
        ledger.advance(chain.record.id, WorkStatus::CacheHit)?;
        statuses.insert(chain.record.id, ChainStatus::CacheHit);
        ctx.reporter.report(Progress::ChainResolved {
            chain_id: chain.record.id,
            status: ChainStatus::CacheHit,
        });
    }
    for chain in &filtered.to_compute {
        ledger.insert(WorkItem::new(chain.record.clone(), chain.key.key.clone()))?;
        ledger.advance(chain.record.id, WorkStatus::Computing)?;
    }

    let by_chain: BTreeMap<ChainId, &EntityDescriptor> =
        descriptors.iter().map(|d| (d.chain_id, d)).collect();
    let groups = group_by_key(&filtered.to_compute);
    let parallelism = ctx.config.parallelism.max(1);
    info!(
        tasks = groups.len(),
        chains = filtered.to_compute.len(),
        parallelism,
        "Fanning out chain tasks"
    );
    ctx.reporter.report(Progress::TaskStart {
        total_steps: groups.len() as u64,
    });

    #[cfg(feature = "parallel")]
    let results: Vec<Result<AggregateOutcome, EngineError>> = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("chain-worker-{i}"))
            .build()
            .map_err(|e| EngineError::Internal(format!("cannot start worker pool: {e}")))?;
        pool.install(|| {
            groups
                .par_iter()
                .map(|g| run_task(ctx, g.representative, &by_chain, classification))
                .collect()
        })
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<AggregateOutcome, EngineError>> = groups
        .iter()
        .map(|g| run_task(ctx, g.representative, &by_chain, classification))
        .collect();

    ctx.reporter.report(Progress::TaskFinish);

    let mut computed = BTreeMap::new();
    let mut degraded = Vec::new();
    let mut first_failure: Option<(ChainId, EngineError)> = None;

    for (group, result) in groups.iter().zip(results) {
        let (next, status) = match &result {
            Ok(AggregateOutcome::Complete(_)) => (WorkStatus::Done, ChainStatus::Computed),
            Ok(AggregateOutcome::Degraded { .. }) => (WorkStatus::Done, ChainStatus::Degraded),
            Err(_) => (WorkStatus::Failed, ChainStatus::Failed),
        };
        for &member in &group.members {
            ledger.advance(member, next)?;
            statuses.insert(member, status);
            ctx.reporter.report(Progress::ChainResolved {
                chain_id: member,
                status,
            });
        }
        match result {
            Ok(outcome) => {
                if let AggregateOutcome::Degraded { failure, .. } = &outcome {
                    degraded.push(failure.clone());
                }
                let features = outcome.into_features();
                for &member in &group.members {
                    computed.insert(member, features.clone());
                }
            }
            Err(error) => {
                let id = group.representative.record.id;
                warn!(chain = %id, %error, "Chain task failed");
                // Groups are ordered by representative id.
                if first_failure.is_none() {
                    first_failure = Some((id, error));
                }
            }
        }
    }

    debug_assert!(ledger.all_terminal());
    if let Some((chain_id, source)) = first_failure {
        return Err(EngineError::ChainFailed {
            chain_id,
            source: Box::new(source),
        });
    }

    info!(
        computed = computed.len(),
        cached = filtered.cached.len(),
        degraded = degraded.len(),
        "All chains resolved"
    );
    Ok(FanoutReport {
        computed,
        statuses,
        degraded,
        ledger,
    })
}

use super::{open_store, read_input};
use crate::cli::PlanArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use multifold::core::store::{ArtifactKind, ArtifactPath, ArtifactStore};
use multifold::engine::cache_key::{CacheKeyResolver, RunParameters};
use multifold::engine::config::ModelConfig;
use multifold::engine::error::EngineError;
use multifold::engine::filter::filter;
use multifold::engine::{planner, runners};
use tracing::info;

pub async fn run(args: PlanArgs) -> Result<()> {
    let app = build_config(&args.run)?;
    let store = open_store(&app.store)?;
    let raw_input = read_input(&app.input_path)?;
    let config = &app.core_config;

    let chain_plan = planner::plan(&raw_input, config.model.preset)?;
    let params = RunParameters::from_config(config);
    let resolver = CacheKeyResolver::new(&params, &store, &config.project);
    let run_key = resolver.select(ArtifactKind::FullProteinArtifacts, &raw_input)?;
    let filtered = filter(&chain_plan.records, chain_plan.classification, &resolver)?;
    info!("Plan resolved without running any search");

    println!(
        "{} chain(s), {} distinct sequence(s), classification: {}",
        chain_plan.records.len(),
        chain_plan.distinct_sequences(),
        chain_plan.classification
    );
    println!(
        "Complex: {} ({}, {})",
        resolver.path(ArtifactKind::FullProteinArtifacts, &run_key.key)?,
        run_key.tier,
        if run_key.exists { "cached" } else { "missing" }
    );

    let mut chains: Vec<_> = filtered
        .cached
        .iter()
        .map(|c| (c, true))
        .chain(filtered.to_compute.iter().map(|c| (c, false)))
        .collect();
    chains.sort_by_key(|(c, _)| c.record.id);
    for (chain, cached) in chains {
        println!(
            "  chain {:<3} len {:<5} {} {} [{}]",
            chain.record.id.to_string(),
            chain.record.len(),
            chain.key.key,
            chain.key.tier,
            if cached { "cached" } else { "to compute" }
        );
    }

    let stored = store
        .list(&ArtifactPath::namespace(
            &config.project,
            ArtifactKind::ChainArtifacts,
        ))
        .map_err(CliError::Store)?;
    println!("{} chain artifact(s) stored under '{}'", stored.len(), config.project);

    let specs = runners::plan_for(&config.model).map_err(EngineError::from)?;
    println!("{}", runner_heading(&config.model));
    for spec in specs {
        println!("  {:<32} seed {}", spec.runner_name(), spec.seed);
    }
    Ok(())
}

fn runner_heading(model: &ModelConfig) -> String {
    format!(
        "Model runners ({} preset, {} ensemble, relaxation {}):",
        model.preset,
        model.preset.num_ensemble(),
        if model.run_relax { "on" } else { "off" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use multifold::engine::config::RunConfigBuilder;
    use std::path::PathBuf;

    fn model(run_relax: bool) -> ModelConfig {
        RunConfigBuilder::new()
            .project("lab/test")
            .work_dir(PathBuf::from("/tmp/work"))
            .max_template_date("2022-01-01")
            .uniref90(PathBuf::from("/db/uniref90.fasta"))
            .mgnify(PathBuf::from("/db/mgnify.fa"))
            .bfd(Some(PathBuf::from("/db/bfd")))
            .uniref30(Some(PathBuf::from("/db/uniref30")))
            .run_relax(run_relax)
            .build()
            .unwrap()
            .model
    }

    #[test]
    fn heading_reports_relaxation() {
        assert!(runner_heading(&model(true)).ends_with("relaxation on):"));
        assert!(runner_heading(&model(false)).ends_with("relaxation off):"));
    }
}

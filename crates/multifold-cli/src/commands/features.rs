use super::{open_store, read_input};
use crate::cli::FeaturesArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use multifold::engine::context::RunContext;
use multifold::engine::progress::ProgressReporter;
use multifold::engine::search::SearchSuite;
use multifold::workflows;
use tracing::{info, warn};

pub async fn run(args: FeaturesArgs) -> Result<()> {
    let app = build_config(&args.run)?;
    let store = open_store(&app.store)?;
    info!("Using artifact store {}", app.store);

    let raw_input = read_input(&app.input_path)?;
    let searches = SearchSuite::from_path(&app.core_config.search);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let ctx = RunContext::new(&app.core_config, &store, &searches, &reporter);

    println!("Resolving features for {}...", app.input_path.display());
    info!("Invoking the feature workflow...");
    let outcome = tokio::task::block_in_place(|| workflows::features::run(&ctx, &raw_input))?;

    if outcome.reused {
        println!("✓ Complex features already exist; nothing was computed.");
    }
    for failure in &outcome.degraded {
        warn!(chain = %failure.chain_id, "{failure}");
        println!("  Warning: {failure}");
    }

    let json = serde_json::to_string_pretty(&outcome.descriptor)
        .map_err(|e| CliError::Other(e.into()))?;
    match &args.descriptor {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("✓ Run descriptor written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

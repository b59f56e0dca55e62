use crate::core::models::features::FeatureSet;
use crate::engine::config::{ConfigError, RunConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::runners::{ModelRunnerSpec, plan_for};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Raw output of one model runner.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub ranking_confidence: f64,
    /// Predicted structure, e.g. PDB text.
    pub structure: String,
}

/// Structure inference for one runner of the grid.
pub trait Predictor: Send + Sync {
    fn predict(
        &self,
        spec: &ModelRunnerSpec,
        num_ensemble: u32,
        features: &FeatureSet,
    ) -> Result<Prediction, ModelError>;
}

/// Energy minimization of a predicted structure.
pub trait Relaxer: Send + Sync {
    fn relax(&self, structure: &str) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerResult {
    pub spec: ModelRunnerSpec,
    pub prediction: Prediction,
    pub relaxed: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Results in decreasing ranking confidence; ties keep grid order.
    pub ranked: Vec<RunnerResult>,
}

impl PredictionResult {
    pub fn best(&self) -> Option<&RunnerResult> {
        self.ranked.first()
    }
}

fn run_one(
    spec: &ModelRunnerSpec,
    num_ensemble: u32,
    features: &FeatureSet,
    predictor: &dyn Predictor,
    relaxer: Option<&dyn Relaxer>,
) -> Result<RunnerResult, ModelError> {
    let prediction = predictor.predict(spec, num_ensemble, features)?;
    let relaxed = match relaxer {
        Some(relaxer) => Some(relaxer.relax(&prediction.structure)?),
        None => None,
    };
    Ok(RunnerResult {
        spec: spec.clone(),
        prediction,
        relaxed,
    })
}

/// Runs every model runner of the grid on at most `parallelism` workers, relaxing each
/// prediction when relaxation is enabled.
///
/// All runners finish before the first failure in grid order is returned.
#[instrument(skip_all, name = "predict_workflow")]
pub fn run(
    config: &RunConfig,
    features: &FeatureSet,
    predictor: &dyn Predictor,
    relaxer: Option<&dyn Relaxer>,
    reporter: &ProgressReporter,
) -> Result<PredictionResult, EngineError> {
    let relaxer = match (config.model.run_relax, relaxer) {
        (true, None) => {
            return Err(ConfigError::Contradictory(
                "relaxation is enabled but no relaxer was supplied".to_string(),
            )
            .into());
        }
        (true, Some(relaxer)) => Some(relaxer),
        (false, _) => None,
    };

    let specs = plan_for(&config.model)?;
    let num_ensemble = config.model.preset.num_ensemble();
    info!(
        runners = specs.len(),
        preset = %config.model.preset,
        relax = relaxer.is_some(),
        "Starting model runners"
    );

    reporter.report(Progress::PhaseStart { name: "Prediction" });
    reporter.report(Progress::TaskStart {
        total_steps: specs.len() as u64,
    });

    let task = |spec: &ModelRunnerSpec| {
        let result = run_one(spec, num_ensemble, features, predictor, relaxer);
        reporter.report(Progress::TaskIncrement);
        result
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Result<RunnerResult, ModelError>> = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism.max(1))
            .thread_name(|i| format!("model-runner-{i}"))
            .build()
            .map_err(|e| EngineError::Internal(format!("cannot start runner pool: {e}")))?;
        pool.install(|| specs.par_iter().map(task).collect())
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<RunnerResult, ModelError>> = specs.iter().map(task).collect();

    reporter.report(Progress::TaskFinish);

    let mut ranked = Vec::with_capacity(results.len());
    let mut first_failure = None;
    for (spec, result) in specs.iter().zip(results) {
        match result {
            Ok(runner) => ranked.push(runner),
            Err(e) => {
                warn!(runner = %spec.runner_name(), error = %e, "Model runner failed");
                if first_failure.is_none() {
                    first_failure = Some(EngineError::Prediction {
                        runner: spec.runner_name(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
    if let Some(error) = first_failure {
        return Err(error);
    }

    ranked.sort_by(|a, b| {
        b.prediction
            .ranking_confidence
            .total_cmp(&a.prediction.ranking_confidence)
    });
    reporter.report(Progress::PhaseFinish);

    if let Some(best) = ranked.first() {
        info!(
            runner = %best.spec.runner_name(),
            confidence = best.prediction.ranking_confidence,
            "Prediction complete"
        );
    }
    Ok(PredictionResult { ranked })
}

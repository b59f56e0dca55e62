use super::config::{ConfigError, ModelConfig};
use rand::Rng;
use serde::Serialize;
use tracing::info;

/// One (model variant, repetition) cell of the prediction grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelRunnerSpec {
    pub variant_name: String,
    pub repetition_index: usize,
    pub seed: i64,
}

impl ModelRunnerSpec {
    /// Stable name of the runner, e.g. `model_1_multimer_v3_pred_0`.
    pub fn runner_name(&self) -> String {
        format!("{}_pred_{}", self.variant_name, self.repetition_index)
    }
}

/// Expands `variants` into runner specs, drawing the base seed from the thread rng when
/// none is supplied.
pub fn plan(
    variants: &[String],
    base_seed: Option<i64>,
    repetitions: usize,
) -> Result<Vec<ModelRunnerSpec>, ConfigError> {
    plan_with_rng(variants, base_seed, repetitions, &mut rand::thread_rng())
}

/// Runner specs for a model configuration.
pub fn plan_for(model: &ModelConfig) -> Result<Vec<ModelRunnerSpec>, ConfigError> {
    plan(&model.model_names, model.random_seed, model.repetitions())
}

/// Expands `variants` into variant-major runner specs whose seeds are
/// `base_seed + repetition_index`.
///
/// A derived base seed is bounded so that every seed of the grid stays well inside `i64`.
pub fn plan_with_rng<R: Rng>(
    variants: &[String],
    base_seed: Option<i64>,
    repetitions: usize,
    rng: &mut R,
) -> Result<Vec<ModelRunnerSpec>, ConfigError> {
    if variants.is_empty() {
        return Err(ConfigError::MissingParameter("model.model_names"));
    }
    if repetitions == 0 {
        return Err(ConfigError::InvalidValue {
            parameter: "model.predictions_per_model",
            reason: "must be at least 1".to_string(),
        });
    }

    let cells = variants
        .len()
        .checked_mul(repetitions)
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            parameter: "model.predictions_per_model",
            reason: "runner grid is too large".to_string(),
        })?;

    let base_seed = match base_seed {
        Some(seed) => seed,
        None => {
            let seed = rng.gen_range(0..i64::MAX / cells);
            info!(seed, "Derived random base seed");
            seed
        }
    };
    let last_offset = (repetitions - 1) as i64;
    if base_seed.checked_add(last_offset).is_none() {
        return Err(ConfigError::InvalidValue {
            parameter: "model.random_seed",
            reason: format!("{base_seed} overflows when offset by {last_offset}"),
        });
    }

    let specs = variants
        .iter()
        .flat_map(|variant| {
            (0..repetitions).map(move |repetition_index| ModelRunnerSpec {
                variant_name: variant.clone(),
                repetition_index,
                seed: base_seed + repetition_index as i64,
            })
        })
        .collect();
    Ok(specs)
}

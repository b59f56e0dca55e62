//! # multifold Core Library
//!
//! The run-identity and work-deduplication core of a multimeric structure prediction
//! feature pipeline.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`SequenceRecord`, `Msa`,
//!   `FeatureSet`), text-format parsers, pure feature construction and cross-chain merging,
//!   and the `ArtifactStore` boundary.
//!
//! - **[`engine`]: The Logic Core.** Content-addressed cache keys, chain planning, cache
//!   filtering, per-chain feature aggregation with its best-effort secondary search, the
//!   bounded fan-out/fan-in orchestrator, cross-chain assembly and model-runner planning.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie the `engine` and
//!   `core` together: the feature workflow producing a run descriptor, and the prediction
//!   fan-out over the model-runner grid.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod test_support;

//! # Workflows Module
//!
//! High-level procedures that drive a complete run of multifold.
//!
//! ## Overview
//!
//! Workflows are the entry points for users of the library. Each one takes a validated
//! [`RunConfig`](crate::engine::config::RunConfig), reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and returns a typed
//! result, leaving storage backends and external tools to the caller.
//!
//! ## Architecture
//!
//! - **Feature Workflow** ([`features`]) - Plans chains, reuses cached artifacts, fans the
//!   remaining chains out, assembles the complex and persists it behind a run descriptor.
//! - **Prediction Workflow** ([`predict`]) - Expands the model-runner grid and fans it out
//!   over a bounded pool, with optional relaxation of every prediction.

pub mod features;
pub mod predict;

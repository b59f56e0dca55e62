//! # Engine Module
//!
//! This module implements the run-identity and scheduling core of multifold: everything
//! between a parsed input and a merged complex feature set.
//!
//! ## Overview
//!
//! A run is planned into chains, each chain is given a content-addressed cache key, chains
//! whose artifacts already exist are reused, and the remaining chains are searched and
//! aggregated in parallel. Once every chain is resolved the per-chain features are merged
//! into one complex. The engine never talks to a particular storage backend or search binary
//! directly; both sit behind traits supplied through a [`context::RunContext`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - The closed run configuration and its validating builder
//! - **Run Identity** ([`cache_key`]) - Canonical run parameters, cache keys and tier selection
//! - **Planning** ([`planner`], [`filter`]) - Chain planning and cache partitioning
//! - **Search Boundary** ([`search`], [`templates`]) - Search tools, template search over the PDB
//! - **Per-chain Work** ([`aggregator`]) - Feature aggregation with the best-effort paired search
//! - **Scheduling** ([`fanout`], [`state`]) - Bounded fan-out, join barrier and work item ledger
//! - **Assembly** ([`assembler`]) - Cross-chain merge with the single-chain short-circuit
//! - **Model Runners** ([`runners`]) - Deterministic expansion of seeds into runner specs
//! - **Progress Monitoring** ([`progress`]) - Progress reporting and user feedback mechanisms
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation

pub mod aggregator;
pub mod assembler;
pub mod cache_key;
pub mod config;
pub mod context;
pub mod error;
pub mod fanout;
pub mod filter;
pub mod planner;
pub mod progress;
pub mod runners;
pub mod search;
pub mod state;
pub mod templates;

//! # Core Module
//!
//! Fundamental building blocks shared by the engine and the workflows.
//!
//! - **Data Models** ([`models`]) - Chain identifiers, sequence records, alignments and typed
//!   feature tensors
//! - **Text Formats** ([`io`]) - FASTA, A3M and Stockholm readers
//! - **Feature Construction** ([`features`]) - Sequence, MSA and template features, plus the
//!   pure cross-chain pairing and merge
//! - **Artifact Storage** ([`store`]) - The content-addressed store boundary, typed storage
//!   paths and the bundled local and in-memory stores
//!
//! Nothing in this module schedules work or performs network I/O.

pub mod features;
pub mod io;
pub mod models;
pub mod store;

use super::ids::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// One named sequence record (entity) of a run. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: ChainId,
    pub sequence: String,
    pub description: String,
}

impl SequenceRecord {
    pub fn new(id: ChainId, sequence: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            sequence: sequence.into(),
            description: description.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Whether all entities of a run share identical sequence content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// A single distinct sequence: monomer or homomer.
    Uniform,
    /// More than one distinct sequence: heteromer.
    Mixed,
}

impl Classification {
    pub fn of(records: &[SequenceRecord]) -> Self {
        let distinct: HashSet<&str> = records.iter().map(|r| r.sequence.as_str()).collect();
        if distinct.len() == 1 {
            Classification::Uniform
        } else {
            Classification::Mixed
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Classification::Uniform)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Uniform => "uniform",
            Classification::Mixed => "mixed",
        })
    }
}

/// Location of one chain's standalone sequence file, handed from planning to the fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub chain_id: ChainId,
    pub sequence_path: PathBuf,
    pub description: String,
}

use super::config::{ConfigError, ModelPreset};
use super::error::EngineError;
use crate::core::io::fasta::{FastaFile, FastaRecord};
use crate::core::io::traits::TextFormat;
use crate::core::models::ids::ChainId;
use crate::core::models::sequence::{Classification, EntityDescriptor, SequenceRecord};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// The ordered chains of a run and their classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPlan {
    pub records: Vec<SequenceRecord>,
    pub classification: Classification,
}

impl ChainPlan {
    /// Number of distinct sequences among the chains.
    pub fn distinct_sequences(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.sequence.as_str()) {
                seen.push(&record.sequence);
            }
        }
        seen.len()
    }

    /// Writes each chain to `{dir}/chain_{id}.fasta` and describes where it went.
    pub fn write_chain_sequences(&self, dir: &Path) -> Result<Vec<EntityDescriptor>, EngineError> {
        fs::create_dir_all(dir).map_err(|e| {
            EngineError::Internal(format!("cannot create work dir '{}': {e}", dir.display()))
        })?;
        let mut descriptors = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let sequence_path = dir.join(format!("chain_{}.fasta", record.id));
            let write = || -> std::io::Result<()> {
                let mut writer = BufWriter::new(File::create(&sequence_path)?);
                FastaFile::write_to(
                    &[FastaRecord {
                        description: record.description.clone(),
                        sequence: record.sequence.clone(),
                    }],
                    &mut writer,
                )
            };
            write().map_err(|e| {
                EngineError::Internal(format!(
                    "cannot write '{}': {e}",
                    sequence_path.display()
                ))
            })?;
            descriptors.push(EntityDescriptor {
                chain_id: record.id,
                sequence_path,
                description: record.description.clone(),
            });
        }
        Ok(descriptors)
    }
}

/// Parses a multi-record FASTA input into chains in input order.
///
/// More than one record under a monomer preset is a configuration error.
pub fn plan(raw_input: &str, preset: ModelPreset) -> Result<ChainPlan, EngineError> {
    let parsed =
        FastaFile::parse_str(raw_input).map_err(|e| EngineError::MalformedInput(e.to_string()))?;

    if parsed.len() > 1 && !preset.is_multimer() {
        return Err(ConfigError::Contradictory(format!(
            "{} sequences were supplied but the '{preset}' preset predicts a single chain",
            parsed.len()
        ))
        .into());
    }

    let records = parsed
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let id = ChainId::from_index(index)
                .map_err(|e| EngineError::MalformedInput(e.to_string()))?;
            Ok(SequenceRecord::new(
                id,
                record.sequence.to_ascii_uppercase(),
                record.description,
            ))
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    let classification = Classification::of(&records);
    info!(
        chains = records.len(),
        %classification,
        "Planned chains"
    );
    Ok(ChainPlan {
        records,
        classification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::fasta::FastaFile;
    use tempfile::tempdir;

    #[test]
    fn plan_assigns_ids_in_input_order() {
        let plan = plan(">x\nMKV\n>y\nggs\n>z\nMKV\n", ModelPreset::Multimer).unwrap();
        let ids: Vec<String> = plan.records.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, ["A", "B", "C"]);
        assert_eq!(plan.records[1].sequence, "GGS");
        assert_eq!(plan.records[2].description, "z");
        assert_eq!(plan.classification, Classification::Mixed);
        assert_eq!(plan.distinct_sequences(), 2);
    }

    #[test]
    fn identical_chains_are_uniform() {
        let plan = plan(">a\nMKV\n>b\nMKV\n", ModelPreset::Multimer).unwrap();
        assert_eq!(plan.classification, Classification::Uniform);
        assert_eq!(plan.distinct_sequences(), 1);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            plan("", ModelPreset::Multimer),
            Err(EngineError::MalformedInput(_))
        ));
        assert!(matches!(
            plan(">a\n>b\nMKV\n", ModelPreset::Multimer),
            Err(EngineError::MalformedInput(_))
        ));
    }

    #[test]
    fn monomer_preset_rejects_multiple_records() {
        let result = plan(">a\nMKV\n>b\nGGS\n", ModelPreset::Monomer);
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
        assert!(plan(">a\nMKV\n", ModelPreset::MonomerPtm).is_ok());
    }

    #[test]
    fn writes_one_fasta_file_per_chain() {
        let dir = tempdir().unwrap();
        let plan = plan(">first\nMKV\n>second\nGGS\n", ModelPreset::Multimer).unwrap();
        let descriptors = plan.write_chain_sequences(dir.path()).unwrap();

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].sequence_path, dir.path().join("chain_B.fasta"));
        let records = FastaFile::read_from_path(&descriptors[1].sequence_path).unwrap();
        assert_eq!(records[0].description, "second");
        assert_eq!(records[0].sequence, "GGS");
    }
}

use super::traits::TextFormat;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub description: String,
    pub sequence: String,
}

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("No sequence records found")]
    NoRecords,
    #[error("Sequence data on line {line} appears before any '>' header")]
    SequenceBeforeHeader { line: usize },
    #[error("Record #{index} ('{description}') has an empty sequence")]
    EmptySequence { index: usize, description: String },
    #[error("Record #{index} ('{description}') contains invalid residue '{residue}' on line {line}")]
    InvalidResidue {
        index: usize,
        description: String,
        residue: char,
        line: usize,
    },
}

/// Multi-record FASTA.
///
/// A line starting with `>` opens a record whose description is the rest of the line;
/// subsequent non-blank lines are concatenated into its sequence. Blank lines are ignored.
/// Every record must carry a non-empty, purely alphabetic sequence.
pub struct FastaFile;

impl TextFormat for FastaFile {
    type Output = Vec<FastaRecord>;
    type Error = FastaError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut records: Vec<FastaRecord> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(description) = line.strip_prefix('>') {
                records.push(FastaRecord {
                    description: description.to_string(),
                    sequence: String::new(),
                });
                continue;
            }

            let index = records.len();
            let current = records
                .last_mut()
                .ok_or(FastaError::SequenceBeforeHeader { line: line_num })?;
            if let Some(bad) = line.chars().find(|c| !c.is_ascii_alphabetic()) {
                return Err(FastaError::InvalidResidue {
                    index,
                    description: current.description.clone(),
                    residue: bad,
                    line: line_num,
                });
            }
            current.sequence.push_str(line);
        }

        if records.is_empty() {
            return Err(FastaError::NoRecords);
        }
        if let Some((i, empty)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.sequence.is_empty())
        {
            return Err(FastaError::EmptySequence {
                index: i + 1,
                description: empty.description.clone(),
            });
        }
        Ok(records)
    }
}

impl FastaFile {
    pub fn write_to(records: &[FastaRecord], writer: &mut impl Write) -> io::Result<()> {
        for record in records {
            writeln!(writer, ">{}", record.description)?;
            writeln!(writer, "{}", record.sequence)?;
        }
        Ok(())
    }
}

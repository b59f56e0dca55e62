pub mod a3m;
pub mod fasta;
pub mod mmcif;
pub mod stockholm;
pub mod traits;

use crate::core::models::msa::{Msa, MsaError};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use traits::TextFormat;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Alignment data on line {line} appears before any header")]
    SequenceBeforeHeader { line: usize },
    #[error("Line {line} is not a '<name> <aligned sequence>' row")]
    MalformedRow { line: usize },
    #[error("Alignment contains no sequences")]
    Empty,
    #[error("Inconsistent alignment: {0}")]
    Inconsistent(#[from] MsaError),
}

/// Output format tag reported by a search tool alongside its alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignmentFormat {
    A3m,
    Stockholm,
}

#[derive(Debug, Error)]
#[error("Unknown alignment format '{0}', expected 'a3m' or 'sto'")]
pub struct ParseAlignmentFormatError(String);

impl FromStr for AlignmentFormat {
    type Err = ParseAlignmentFormatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a3m" => Ok(AlignmentFormat::A3m),
            "sto" | "stockholm" => Ok(AlignmentFormat::Stockholm),
            _ => Err(ParseAlignmentFormatError(s.to_string())),
        }
    }
}

impl fmt::Display for AlignmentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlignmentFormat::A3m => "a3m",
            AlignmentFormat::Stockholm => "sto",
        })
    }
}

impl AlignmentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AlignmentFormat::A3m => "a3m",
            AlignmentFormat::Stockholm => "sto",
        }
    }
}

/// Reads an alignment file in the given format.
pub fn read_alignment(format: AlignmentFormat, path: &Path) -> Result<Msa, AlignmentError> {
    match format {
        AlignmentFormat::A3m => a3m::A3mFile::read_from_path(path),
        AlignmentFormat::Stockholm => stockholm::StockholmFile::read_from_path(path),
    }
}

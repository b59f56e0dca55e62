use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MsaError {
    #[error("Alignment row {row} has {actual} deletion counts but {expected} aligned columns")]
    DeletionLengthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Alignment row {row} has length {actual}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Alignment has {sequences} sequences but {descriptions} descriptions")]
    DescriptionCountMismatch {
        sequences: usize,
        descriptions: usize,
    },
}

/// A multiple sequence alignment with insertions removed, aligned to its first row (the query).
///
/// `deletion_matrix[i][j]` counts the residues of row `i` that were deleted immediately
/// before aligned column `j`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Msa {
    sequences: Vec<String>,
    deletion_matrix: Vec<Vec<i64>>,
    descriptions: Vec<String>,
}

impl Msa {
    pub fn new(
        sequences: Vec<String>,
        deletion_matrix: Vec<Vec<i64>>,
        descriptions: Vec<String>,
    ) -> Result<Self, MsaError> {
        if sequences.len() != descriptions.len() {
            return Err(MsaError::DescriptionCountMismatch {
                sequences: sequences.len(),
                descriptions: descriptions.len(),
            });
        }
        let width = sequences.first().map_or(0, |s| s.chars().count());
        for (row, (seq, deletions)) in sequences.iter().zip(&deletion_matrix).enumerate() {
            let len = seq.chars().count();
            if len != width {
                return Err(MsaError::RaggedRow {
                    row,
                    expected: width,
                    actual: len,
                });
            }
            if deletions.len() != len {
                return Err(MsaError::DeletionLengthMismatch {
                    row,
                    expected: len,
                    actual: deletions.len(),
                });
            }
        }
        if deletion_matrix.len() != sequences.len() {
            return Err(MsaError::DeletionLengthMismatch {
                row: deletion_matrix.len().min(sequences.len()),
                expected: sequences.len(),
                actual: deletion_matrix.len(),
            });
        }
        Ok(Self {
            sequences,
            deletion_matrix,
            descriptions,
        })
    }

    /// A one-row alignment holding only the query.
    pub fn single(query: &str, description: &str) -> Self {
        Self {
            sequences: vec![query.to_string()],
            deletion_matrix: vec![vec![0; query.chars().count()]],
            descriptions: vec![description.to_string()],
        }
    }

    pub fn sequences(&self) -> &[String] {
        &self.sequences
    }

    pub fn deletion_matrix(&self) -> &[Vec<i64>] {
        &self.deletion_matrix
    }

    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn width(&self) -> usize {
        self.sequences.first().map_or(0, |s| s.chars().count())
    }

    /// Keeps at most `max_rows` rows, query first.
    pub fn truncate(&mut self, max_rows: usize) {
        self.sequences.truncate(max_rows);
        self.deletion_matrix.truncate(max_rows);
        self.descriptions.truncate(max_rows);
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[i64], &str)> {
        self.sequences
            .iter()
            .zip(&self.deletion_matrix)
            .zip(&self.descriptions)
            .map(|((s, d), desc)| (s.as_str(), d.as_slice(), desc.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_ragged_rows() {
        let result = Msa::new(
            vec!["MKV".into(), "MK".into()],
            vec![vec![0; 3], vec![0; 2]],
            vec!["q".into(), "h".into()],
        );
        assert!(matches!(result, Err(MsaError::RaggedRow { row: 1, .. })));
    }

    #[test]
    fn new_rejects_deletion_length_mismatch() {
        let result = Msa::new(vec!["MKV".into()], vec![vec![0; 2]], vec!["q".into()]);
        assert!(matches!(
            result,
            Err(MsaError::DeletionLengthMismatch { row: 0, .. })
        ));
    }

    #[test]
    fn truncate_keeps_query_first() {
        let mut msa = Msa::new(
            vec!["MKV".into(), "MRV".into(), "-KV".into()],
            vec![vec![0; 3]; 3],
            vec!["q".into(), "a".into(), "b".into()],
        )
        .unwrap();
        msa.truncate(2);
        assert_eq!(msa.len(), 2);
        assert_eq!(msa.sequences()[0], "MKV");
        assert_eq!(msa.descriptions(), ["q", "a"]);
    }
}

use super::traits::TextFormat;
use super::AlignmentError;
use crate::core::models::msa::Msa;
use std::io::BufRead;

/// A3M alignments as written by HHblits.
///
/// Upper-case letters and `-` are match columns; lower-case letters are insertions relative
/// to the query and are counted into the deletion matrix rather than kept; `.` is padding.
pub struct A3mFile;

impl TextFormat for A3mFile {
    type Output = Msa;
    type Error = AlignmentError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut descriptions: Vec<String> = Vec::new();
        let mut raw: Vec<String> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(description) = line.strip_prefix('>') {
                descriptions.push(description.to_string());
                raw.push(String::new());
                continue;
            }
            raw.last_mut()
                .ok_or(AlignmentError::SequenceBeforeHeader { line: line_num + 1 })?
                .push_str(line);
        }

        if raw.is_empty() {
            return Err(AlignmentError::Empty);
        }

        let mut sequences = Vec::with_capacity(raw.len());
        let mut deletion_matrix = Vec::with_capacity(raw.len());
        for row in &raw {
            let (aligned, deletions) = strip_insertions(row);
            sequences.push(aligned);
            deletion_matrix.push(deletions);
        }
        Ok(Msa::new(sequences, deletion_matrix, descriptions)?)
    }
}

fn strip_insertions(row: &str) -> (String, Vec<i64>) {
    let mut aligned = String::with_capacity(row.len());
    let mut deletions = Vec::with_capacity(row.len());
    let mut pending = 0i64;
    for c in row.chars() {
        if c.is_ascii_lowercase() {
            pending += 1;
        } else if c == '.' {
            continue;
        } else {
            aligned.push(c);
            deletions.push(pending);
            pending = 0;
        }
    }
    (aligned, deletions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertions_are_removed_and_counted() {
        let msa = A3mFile::parse_str(">query\nMKVL\n>hit1 species\nMkkKVL\n").unwrap();
        assert_eq!(msa.sequences(), ["MKVL", "MKVL"]);
        assert_eq!(msa.deletion_matrix()[0], vec![0, 0, 0, 0]);
        assert_eq!(msa.deletion_matrix()[1], vec![0, 2, 0, 0]);
        assert_eq!(msa.descriptions(), ["query", "hit1 species"]);
    }

    #[test]
    fn gaps_are_kept_as_match_columns() {
        let msa = A3mFile::parse_str(">q\nMKV\n>h\n-aK-\n").unwrap();
        assert_eq!(msa.sequences()[1], "-K-");
        assert_eq!(msa.deletion_matrix()[1], vec![0, 1, 0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let result = A3mFile::parse_str(">q\nMKV\n>h\nMK\n");
        assert!(matches!(result, Err(AlignmentError::Inconsistent(_))));
    }

    #[test]
    fn empty_alignment_is_rejected() {
        assert!(matches!(A3mFile::parse_str("#A3M#\n"), Err(AlignmentError::Empty)));
    }
}

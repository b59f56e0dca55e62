use super::AlignmentError;
use super::traits::TextFormat;
use crate::core::models::msa::{Msa, MsaError};
use std::collections::HashMap;
use std::io::BufRead;

/// Stockholm alignments as written by `jackhmmer -A`.
///
/// Rows of the same name are concatenated across blocks. The first named row is the query;
/// columns where the query has a gap are dropped, and residues of other rows falling in those
/// columns are counted as deletions before the next kept column.
pub struct StockholmFile;

impl TextFormat for StockholmFile {
    type Output = Msa;
    type Error = AlignmentError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut names: Vec<String> = Vec::new();
        let mut rows: Vec<String> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(name), Some(fragment), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(AlignmentError::MalformedRow { line: line_num + 1 });
            };
            let idx = *index_of.entry(name.to_string()).or_insert_with(|| {
                names.push(name.to_string());
                rows.push(String::new());
                rows.len() - 1
            });
            rows[idx].push_str(fragment);
        }

        let query: Vec<char> = rows.first().ok_or(AlignmentError::Empty)?.chars().collect();

        let mut sequences = Vec::with_capacity(rows.len());
        let mut deletion_matrix = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            let residues: Vec<char> = row.chars().collect();
            if residues.len() != query.len() {
                return Err(MsaError::RaggedRow {
                    row: row_index,
                    expected: query.len(),
                    actual: residues.len(),
                }
                .into());
            }
            let (aligned, deletions) = project_onto_query(&residues, &query);
            sequences.push(aligned);
            deletion_matrix.push(deletions);
        }
        Ok(Msa::new(sequences, deletion_matrix, names)?)
    }
}

fn project_onto_query(residues: &[char], query: &[char]) -> (String, Vec<i64>) {
    let mut aligned = String::with_capacity(query.len());
    let mut deletions = Vec::with_capacity(query.len());
    let mut pending = 0i64;
    for (&res, &query_res) in residues.iter().zip(query) {
        if query_res == '-' {
            if res != '-' {
                pending += 1;
            }
        } else {
            aligned.push(res);
            deletions.push(pending);
            pending = 0;
        }
    }
    (aligned, deletions)
}

use super::traits::TextFormat;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MmcifError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unterminated text field starting on line {line}")]
    UnterminatedText { line: usize },
    #[error("Loop over '{category}' holds {values} values for {columns} columns")]
    RaggedLoop {
        category: String,
        columns: usize,
        values: usize,
    },
    #[error("Atom table lacks the '{0}' column")]
    MissingColumn(&'static str),
    #[error("Invalid number '{value}' in column '{column}'")]
    InvalidNumber { column: &'static str, value: String },
}

pub type Position = [f32; 3];

/// The parts of an mmCIF entry a structural template is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    /// Earliest revision date, or the deposition date when no revision history is present.
    pub release_date: Option<NaiveDate>,
    /// First-model atoms keyed by `(auth_asym_id, label_seq_id)`, then atom name.
    atoms: HashMap<(String, i64), HashMap<String, Position>>,
}

impl Structure {
    pub fn residue(&self, chain: &str, seq_id: i64) -> Option<&HashMap<String, Position>> {
        self.atoms.get(&(chain.to_string(), seq_id))
    }

    pub fn has_chain(&self, chain: &str) -> bool {
        self.atoms.keys().any(|(c, _)| c == chain)
    }
}

/// Reader for the PDBx/mmCIF entries under a template structure directory.
///
/// Only the release dates and the `_atom_site` table are interpreted. Every other
/// category is tokenized and skipped.
pub struct MmcifFile;

impl TextFormat for MmcifFile {
    type Output = Structure;
    type Error = MmcifError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let items = collect_items(tokenize(reader)?)?;

        let earliest = |name: &str| {
            items
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
                .min()
        };
        let release_date = earliest("_pdbx_audit_revision_history.revision_date")
            .or_else(|| earliest("_pdbx_database_status.recvd_initial_deposition_date"));

        Ok(Structure {
            release_date,
            atoms: first_model_atoms(&items)?,
        })
    }
}

fn tokenize(reader: &mut impl BufRead) -> Result<Vec<String>, MmcifError> {
    let mut tokens = Vec::new();
    let mut text: Option<(usize, String)> = None;

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        if let Some(rest) = line.strip_prefix(';') {
            match text.take() {
                Some((_, body)) => tokens.push(body),
                None => text = Some((line_num + 1, rest.to_string())),
            }
            continue;
        }
        if let Some((_, body)) = text.as_mut() {
            body.push('\n');
            body.push_str(&line);
            continue;
        }
        split_line(&line, &mut tokens);
    }

    match text {
        Some((line, _)) => Err(MmcifError::UnterminatedText { line }),
        None => Ok(tokens),
    }
}

/// Splits one line into values. Quotes close only when followed by whitespace, so `O5'`
/// stays one bare value.
fn split_line(line: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '\'' || c == '"' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len()
                && !(chars[end] == c && chars.get(end + 1).is_none_or(|n| n.is_whitespace()))
            {
                end += 1;
            }
            tokens.push(chars[start..end.min(chars.len())].iter().collect());
            i = end + 1;
            continue;
        }
        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(chars[start..i].iter().collect());
    }
}

fn is_keyword(token: &str) -> bool {
    token.starts_with('_') || token == "loop_" || token.starts_with("data_")
}

/// Column-wise values of every item, single-valued items included.
fn collect_items(tokens: Vec<String>) -> Result<HashMap<String, Vec<String>>, MmcifError> {
    let mut items: HashMap<String, Vec<String>> = HashMap::new();
    let mut tokens = tokens.into_iter().peekable();

    while let Some(token) = tokens.next() {
        if token == "loop_" {
            let mut columns = Vec::new();
            while let Some(name) = tokens.next_if(|t| t.starts_with('_')) {
                columns.push(name);
            }
            let mut values = Vec::new();
            while let Some(value) = tokens.next_if(|t| !is_keyword(t)) {
                values.push(value);
            }
            if columns.is_empty() {
                continue;
            }
            if values.len() % columns.len() != 0 {
                return Err(MmcifError::RaggedLoop {
                    category: columns[0].split('.').next().unwrap_or_default().to_string(),
                    columns: columns.len(),
                    values: values.len(),
                });
            }
            for (i, value) in values.into_iter().enumerate() {
                items
                    .entry(columns[i % columns.len()].clone())
                    .or_default()
                    .push(value);
            }
        } else if token.starts_with('_') {
            if let Some(value) = tokens.next_if(|t| !is_keyword(t)) {
                items.entry(token).or_default().push(value);
            }
        }
    }
    Ok(items)
}

fn column<'i>(
    items: &'i HashMap<String, Vec<String>>,
    name: &'static str,
) -> Result<&'i [String], MmcifError> {
    items
        .get(name)
        .map(Vec::as_slice)
        .ok_or(MmcifError::MissingColumn(name))
}

fn number<T: std::str::FromStr>(column: &'static str, value: &str) -> Result<T, MmcifError> {
    value.parse().map_err(|_| MmcifError::InvalidNumber {
        column,
        value: value.to_string(),
    })
}

fn first_model_atoms(
    items: &HashMap<String, Vec<String>>,
) -> Result<HashMap<(String, i64), HashMap<String, Position>>, MmcifError> {
    let mut atoms: HashMap<(String, i64), HashMap<String, Position>> = HashMap::new();
    let Some(names) = items.get("_atom_site.label_atom_id") else {
        return Ok(atoms);
    };
    let chains = column(items, "_atom_site.auth_asym_id")?;
    let seq_ids = column(items, "_atom_site.label_seq_id")?;
    let xs = column(items, "_atom_site.Cartn_x")?;
    let ys = column(items, "_atom_site.Cartn_y")?;
    let zs = column(items, "_atom_site.Cartn_z")?;
    let models = items.get("_atom_site.pdbx_PDB_model_num");
    let first_model = models.and_then(|m| m.first());

    for (i, name) in names.iter().enumerate() {
        if models.and_then(|m| m.get(i)) != first_model {
            continue;
        }
        let (Some(chain), Some(seq_id), Some(x), Some(y), Some(z)) =
            (chains.get(i), seq_ids.get(i), xs.get(i), ys.get(i), zs.get(i))
        else {
            continue;
        };
        // Ligands and waters carry no polymer sequence position.
        if seq_id == "." || seq_id == "?" {
            continue;
        }
        let position = [
            number("_atom_site.Cartn_x", x)?,
            number("_atom_site.Cartn_y", y)?,
            number("_atom_site.Cartn_z", z)?,
        ];
        atoms
            .entry((chain.clone(), number("_atom_site.label_seq_id", seq_id)?))
            .or_default()
            .entry(name.clone())
            .or_insert(position);
    }
    Ok(atoms)
}

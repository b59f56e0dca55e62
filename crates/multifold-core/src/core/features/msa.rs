use crate::core::models::features::{Feature, FeatureError, FeatureSet, Scalar};
use crate::core::models::msa::Msa;
use crate::core::models::residue::hhblits_index;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// UniProt-style hit names, e.g. `tr|A0A146SKV9|A0A146SKV9_FUNHE/123-227`.
static UNIPROT_HEADER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:tr|sp)\|[A-Za-z0-9]{6,10}(?:_\d+)?\|(?:[A-Za-z0-9]+)_(?P<species>[A-Za-z0-9]{1,5})",
    )
    .ok()
});

/// Species code of an alignment row, or an empty string when the row name is not in
/// UniProt form.
pub fn species_identifier(description: &str) -> String {
    let Some(name) = description.split_whitespace().next() else {
        return String::new();
    };
    let name = name.split('/').next().unwrap_or(name);
    UNIPROT_HEADER
        .as_ref()
        .and_then(|re| re.captures(name))
        .and_then(|caps| caps.name("species"))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Builds MSA features from one or more alignments of the same query.
///
/// Rows are taken in the order given and a row whose aligned sequence already appeared in an
/// earlier alignment is skipped. `msa` holds HHblits alphabet ids.
pub fn make_msa_features(msas: &[&Msa]) -> Result<FeatureSet, FeatureError> {
    let width = msas
        .iter()
        .find(|m| !m.is_empty())
        .map(|m| m.width())
        .ok_or(FeatureError::NoAlignments)?;

    let mut seen: HashSet<&str> = HashSet::new();
    let mut int_msa: Vec<i64> = Vec::new();
    let mut deletions: Vec<i64> = Vec::new();
    let mut species: Vec<String> = Vec::new();

    for msa in msas {
        for (sequence, deletion_row, description) in msa.rows() {
            if !seen.insert(sequence) {
                continue;
            }
            int_msa.extend(sequence.chars().map(hhblits_index));
            deletions.extend_from_slice(deletion_row);
            species.push(species_identifier(description));
        }
    }

    let num_alignments = species.len();
    let mut features = FeatureSet::new();
    features.insert("msa", Feature::int(vec![num_alignments, width], int_msa)?);
    features.insert(
        "deletion_matrix_int",
        Feature::int(vec![num_alignments, width], deletions)?,
    );
    features.insert(
        "num_alignments",
        Feature::full(vec![width], Scalar::Int(num_alignments as i64)),
    );
    features.insert(
        "msa_species_identifiers",
        Feature::text(vec![num_alignments], species)?,
    );
    Ok(features)
}

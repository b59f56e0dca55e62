//! Cross-chain merge of per-chain feature sets.
//!
//! Each chain is first converted into a pairing-ready form ([`pairing_ready`]) carrying its
//! position in the complex, then [`merge_chains`] joins the chains along the residue axis.
//! The merged alignment starts with a paired block, where each row holds one sequence per
//! chain, followed by each chain's remaining rows placed block-diagonally.

use super::template::TEMPLATE_RESIDUE_FIELDS;
use crate::core::models::features::{Feature, FeatureError, FeatureSet, Scalar};
use crate::core::models::residue::{GAP_RESTYPE, hhblits_to_restype};
use std::collections::{BTreeMap, HashSet};

/// Per-residue fields concatenated along the residue axis.
const RESIDUE_FIELDS: [&str; 7] = [
    "aatype",
    "residue_index",
    "between_segment_residues",
    "asym_id",
    "sym_id",
    "entity_id",
    "seq_mask",
];

/// Position of one chain within the assembled complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPlacement {
    /// 1-based chain index in planner order.
    pub asym_id: i64,
    /// 1-based index of the distinct sequence this chain carries.
    pub entity_id: i64,
    /// 1-based copy number of this chain within its entity.
    pub sym_id: i64,
}

/// How the alignment rows of different chains are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    /// Rows of the paired alignments are matched across chains by species.
    BySpecies,
    /// Only the query rows are paired; everything else is block-diagonal.
    QueryOnly,
}

/// Converts one chain's feature set into the form consumed by [`merge_chains`].
///
/// Adds `asym_id`, `sym_id`, `entity_id` and `seq_mask`, and remaps alignment ids from the
/// HHblits alphabet onto the residue-type alphabet. Fields with no meaning across chains,
/// such as the per-source alignment copies, are left behind.
pub fn pairing_ready(
    features: &FeatureSet,
    placement: ChainPlacement,
) -> Result<FeatureSet, FeatureError> {
    let aatype = features.require("aatype")?;
    let num_res = aatype.dim(0).unwrap_or(0);

    let mut ready = FeatureSet::new();
    for name in ["aatype", "residue_index", "between_segment_residues"] {
        ready.insert(name, features.require(name)?.clone());
    }
    for name in ["sequence", "domain_name"] {
        ready.insert(name, features.require(name)?.clone());
    }
    ready.insert("asym_id", Feature::full(vec![num_res], Scalar::Int(placement.asym_id)));
    ready.insert("sym_id", Feature::full(vec![num_res], Scalar::Int(placement.sym_id)));
    ready.insert(
        "entity_id",
        Feature::full(vec![num_res], Scalar::Int(placement.entity_id)),
    );
    ready.insert("seq_mask", Feature::full(vec![num_res], Scalar::Float(1.0)));

    ready.insert("msa", remap_alignment(features, "msa")?);
    ready.insert("deletion_matrix_int", features.require("deletion_matrix_int")?.clone());
    if features.contains("msa_all_seq") {
        ready.insert("msa_all_seq", remap_alignment(features, "msa_all_seq")?);
        for name in [
            "deletion_matrix_int_all_seq",
            "msa_species_identifiers_all_seq",
        ] {
            ready.insert(name, features.require(name)?.clone());
        }
    }

    for name in TEMPLATE_RESIDUE_FIELDS {
        if let Some(feature) = features.get(name) {
            ready.insert(name, feature.clone());
        }
    }
    Ok(ready)
}

fn remap_alignment(features: &FeatureSet, name: &str) -> Result<Feature, FeatureError> {
    let msa = features.require(name)?;
    let ids = features.require_int(name)?;
    Feature::int(
        msa.shape().to_vec(),
        ids.iter().map(|&id| hhblits_to_restype(id)).collect(),
    )
}

/// A chain's alignment viewed as rows of residue-type ids.
struct ChainRows<'a> {
    width: usize,
    msa: &'a [i64],
    deletions: &'a [i64],
}

impl<'a> ChainRows<'a> {
    fn from_fields(
        features: &'a FeatureSet,
        msa_name: &str,
        deletion_name: &str,
    ) -> Result<Self, FeatureError> {
        let msa = features.require(msa_name)?;
        let width = msa.dim(1).unwrap_or(0);
        Ok(Self {
            width,
            msa: features.require_int(msa_name)?,
            deletions: features.require_int(deletion_name)?,
        })
    }

    fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.msa.len() / self.width
        }
    }

    fn row(&self, index: usize) -> &'a [i64] {
        &self.msa[index * self.width..(index + 1) * self.width]
    }

    fn deletion_row(&self, index: usize) -> &'a [i64] {
        &self.deletions[index * self.width..(index + 1) * self.width]
    }

    fn identity_to_query(&self, index: usize) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        let query = self.row(0);
        let matches = self
            .row(index)
            .iter()
            .zip(query)
            .filter(|(a, q)| a == q && **q != GAP_RESTYPE)
            .count();
        matches as f64 / self.width as f64
    }
}

/// Paired alignment of one chain plus the species of each of its rows.
struct PairedSource<'a> {
    rows: ChainRows<'a>,
    species: Vec<&'a str>,
}

impl<'a> PairedSource<'a> {
    /// Uses the paired-search fields when present. A chain without them contributes only its
    /// query row.
    fn of(features: &'a FeatureSet) -> Result<Self, FeatureError> {
        if features.contains("msa_all_seq") {
            let rows = ChainRows::from_fields(
                features,
                "msa_all_seq",
                "deletion_matrix_int_all_seq",
            )?;
            let species = features
                .require_text("msa_species_identifiers_all_seq")?
                .iter()
                .map(String::as_str)
                .collect();
            Ok(Self { rows, species })
        } else {
            let rows = ChainRows::from_fields(features, "msa", "deletion_matrix_int")?;
            let species = vec![""; rows.len().min(1)];
            Ok(Self {
                rows: ChainRows {
                    width: rows.width,
                    msa: &rows.msa[..rows.width.min(rows.msa.len())],
                    deletions: &rows.deletions[..rows.width.min(rows.deletions.len())],
                },
                species,
            })
        }
    }
}

/// Row indices into each chain's paired alignment; `None` is a gap row for that chain.
type PairedRow = Vec<Option<usize>>;

fn pair_rows(sources: &[PairedSource<'_>], mode: PairingMode) -> Vec<PairedRow> {
    let mut paired: Vec<PairedRow> = vec![sources.iter().map(|_| Some(0)).collect()];
    if mode == PairingMode::QueryOnly {
        return paired;
    }

    let mut by_species: BTreeMap<&str, Vec<Vec<usize>>> = BTreeMap::new();
    for (chain, source) in sources.iter().enumerate() {
        for (row, species) in source.species.iter().enumerate().skip(1) {
            if species.is_empty() {
                continue;
            }
            let per_chain = by_species
                .entry(*species)
                .or_insert_with(|| vec![Vec::new(); sources.len()]);
            per_chain[chain].push(row);
        }
    }

    for per_chain in by_species.values_mut() {
        let present = per_chain.iter().filter(|rows| !rows.is_empty()).count();
        if present < 2 {
            continue;
        }
        for (chain, rows) in per_chain.iter_mut().enumerate() {
            let source = &sources[chain].rows;
            rows.sort_by(|&a, &b| {
                source
                    .identity_to_query(b)
                    .total_cmp(&source.identity_to_query(a))
                    .then(a.cmp(&b))
            });
        }
        let depth = per_chain
            .iter()
            .filter(|rows| !rows.is_empty())
            .map(Vec::len)
            .min()
            .unwrap_or(0);
        for i in 0..depth {
            paired.push(per_chain.iter().map(|rows| rows.get(i).copied()).collect());
        }
    }
    paired
}

/// Merges pairing-ready chains, given in planner order, into one complex feature set.
///
/// `chain_names` labels the entity axis and is recorded as `chain_ids`.
pub fn merge_chains(
    chains: &[FeatureSet],
    chain_names: &[String],
    mode: PairingMode,
) -> Result<FeatureSet, FeatureError> {
    if chains.is_empty() {
        return Err(FeatureError::NothingToConcatenate);
    }
    let mut merged = FeatureSet::new();

    for name in RESIDUE_FIELDS.iter().chain(["sequence", "domain_name"].iter()) {
        let parts: Vec<&Feature> = chains
            .iter()
            .map(|c| c.require(name))
            .collect::<Result<_, _>>()?;
        merged.insert(*name, Feature::concat(&parts, 0)?);
    }

    let lengths: Vec<usize> = chains
        .iter()
        .map(|c| c.require("aatype").map(|f| f.dim(0).unwrap_or(0)))
        .collect::<Result<_, _>>()?;
    let total: usize = lengths.iter().sum();
    merged.insert("seq_length", Feature::full(vec![total], Scalar::Int(total as i64)));
    merged.insert(
        "chain_lengths",
        Feature::int(vec![lengths.len()], lengths.iter().map(|&l| l as i64).collect())?,
    );
    merged.insert(
        "chain_ids",
        Feature::text(vec![chain_names.len()], chain_names.to_vec())?,
    );

    merge_alignments(chains, &lengths, mode, &mut merged)?;
    merge_templates(chains, &mut merged)?;
    Ok(merged)
}

fn merge_alignments(
    chains: &[FeatureSet],
    lengths: &[usize],
    mode: PairingMode,
    merged: &mut FeatureSet,
) -> Result<(), FeatureError> {
    let total: usize = lengths.iter().sum();
    let sources: Vec<PairedSource<'_>> = chains
        .iter()
        .map(PairedSource::of)
        .collect::<Result<_, _>>()?;
    let paired = pair_rows(&sources, mode);

    let mut msa: Vec<i64> = Vec::new();
    let mut deletions: Vec<i64> = Vec::new();
    let mut paired_content: Vec<HashSet<&[i64]>> = vec![HashSet::new(); chains.len()];

    for row in &paired {
        for (chain, (slot, source)) in row.iter().zip(&sources).enumerate() {
            match slot {
                Some(index) => {
                    let residues = source.rows.row(*index);
                    msa.extend_from_slice(residues);
                    deletions.extend_from_slice(source.rows.deletion_row(*index));
                    paired_content[chain].insert(residues);
                }
                None => {
                    msa.extend(std::iter::repeat_n(GAP_RESTYPE, lengths[chain]));
                    deletions.extend(std::iter::repeat_n(0, lengths[chain]));
                }
            }
        }
    }
    let num_paired = paired.len();

    let mut num_rows = num_paired;
    let mut offset = 0;
    for (chain, features) in chains.iter().enumerate() {
        let rows = ChainRows::from_fields(features, "msa", "deletion_matrix_int")?;
        for index in 0..rows.len() {
            let residues = rows.row(index);
            if paired_content[chain].contains(residues) {
                continue;
            }
            msa.extend(std::iter::repeat_n(GAP_RESTYPE, offset));
            msa.extend_from_slice(residues);
            msa.extend(std::iter::repeat_n(GAP_RESTYPE, total - offset - lengths[chain]));
            deletions.extend(std::iter::repeat_n(0, offset));
            deletions.extend_from_slice(rows.deletion_row(index));
            deletions.extend(std::iter::repeat_n(0, total - offset - lengths[chain]));
            num_rows += 1;
        }
        offset += lengths[chain];
    }

    merged.insert("msa", Feature::int(vec![num_rows, total], msa)?);
    merged.insert("deletion_matrix_int", Feature::int(vec![num_rows, total], deletions)?);
    merged.insert("msa_mask", Feature::full(vec![num_rows, total], Scalar::Float(1.0)));
    merged.insert(
        "num_alignments",
        Feature::full(vec![total], Scalar::Int(num_rows as i64)),
    );
    merged.insert("num_paired_alignments", Feature::scalar_int(num_paired as i64));
    Ok(())
}

fn merge_templates(chains: &[FeatureSet], merged: &mut FeatureSet) -> Result<(), FeatureError> {
    for name in TEMPLATE_RESIDUE_FIELDS {
        let parts: Vec<&Feature> = chains.iter().filter_map(|c| c.get(name)).collect();
        if parts.len() != chains.len() {
            continue;
        }
        let max_templates = parts.iter().filter_map(|f| f.dim(0)).max().unwrap_or(0);
        let fill = match parts[0].dtype() {
            "int" => Scalar::Int(0),
            _ => Scalar::Float(0.0),
        };
        let padded: Vec<Feature> = parts
            .iter()
            .map(|f| f.pad_axis(0, max_templates, fill.clone()))
            .collect::<Result<_, _>>()?;
        let refs: Vec<&Feature> = padded.iter().collect();
        merged.insert(name, Feature::concat(&refs, 1)?);
    }
    Ok(())
}

use crate::core::models::features::{Feature, FeatureError, FeatureSet, Scalar};
use crate::core::models::residue::restype_index;

/// Per-residue encoding of one chain's sequence.
pub fn make_sequence_features(
    sequence: &str,
    description: &str,
) -> Result<FeatureSet, FeatureError> {
    let num_res = sequence.chars().count();
    let mut features = FeatureSet::new();
    features.insert(
        "aatype",
        Feature::int(vec![num_res], sequence.chars().map(restype_index).collect())?,
    );
    features.insert(
        "between_segment_residues",
        Feature::full(vec![num_res], Scalar::Int(0)),
    );
    features.insert(
        "domain_name",
        Feature::text(vec![1], vec![description.to_string()])?,
    );
    features.insert(
        "residue_index",
        Feature::int(vec![num_res], (0..num_res as i64).collect())?,
    );
    features.insert(
        "seq_length",
        Feature::full(vec![num_res], Scalar::Int(num_res as i64)),
    );
    features.insert(
        "sequence",
        Feature::text(vec![1], vec![sequence.to_string()])?,
    );
    Ok(features)
}

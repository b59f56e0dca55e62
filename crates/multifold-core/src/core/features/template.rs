use crate::core::io::mmcif::Position;
use crate::core::models::features::{Feature, FeatureError, FeatureSet, Scalar};
use crate::core::models::residue::{GAP_RESTYPE, restype_index};

/// Number of heavy-atom slots per residue in the atom37 layout.
pub const ATOM_TYPE_NUM: usize = 37;

/// Heavy-atom names in atom37 order.
pub const ATOM_TYPES: [&str; ATOM_TYPE_NUM] = [
    "N", "CA", "C", "CB", "O", "CG", "CG1", "CG2", "OG", "OG1", "SG", "CD", "CD1", "CD2", "ND1",
    "ND2", "OD1", "OD2", "SD", "CE", "CE1", "CE2", "CE3", "NE", "NE1", "NE2", "OE1", "OE2",
    "CH2", "NH1", "NH2", "OH", "CZ", "CZ2", "CZ3", "NZ", "OXT",
];

pub fn atom_index(name: &str) -> Option<usize> {
    ATOM_TYPES.iter().position(|&a| a == name)
}

/// One structural template projected onto the query's residue axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTemplate {
    /// `{pdb_id}_{chain}`.
    pub name: String,
    /// Template residue at each query position, `-` where nothing is aligned.
    pub sequence: Vec<char>,
    pub positions: Vec<[Position; ATOM_TYPE_NUM]>,
    pub mask: Vec<[f32; ATOM_TYPE_NUM]>,
    pub sum_probs: f32,
}

impl AlignedTemplate {
    /// A template with every query position unaligned.
    pub fn unaligned(name: impl Into<String>, num_res: usize) -> Self {
        Self {
            name: name.into(),
            sequence: vec!['-'; num_res],
            positions: vec![[[0.0; 3]; ATOM_TYPE_NUM]; num_res],
            mask: vec![[0.0; ATOM_TYPE_NUM]; num_res],
            sum_probs: 0.0,
        }
    }
}

/// Stacks `templates` into the template feature fields of a `num_res`-residue chain.
pub fn make_template_features(
    num_res: usize,
    templates: &[AlignedTemplate],
) -> Result<FeatureSet, FeatureError> {
    if templates.is_empty() {
        return Ok(empty_template_features(num_res));
    }
    let t = templates.len();
    let mut aatype = Vec::with_capacity(t * num_res);
    let mut mask = Vec::with_capacity(t * num_res * ATOM_TYPE_NUM);
    let mut positions = Vec::with_capacity(t * num_res * ATOM_TYPE_NUM * 3);
    for template in templates {
        let lengths = [
            template.sequence.len(),
            template.positions.len(),
            template.mask.len(),
        ];
        if let Some(&actual) = lengths.iter().find(|&&n| n != num_res) {
            return Err(FeatureError::ShapeMismatch {
                shape: vec![num_res],
                expected: num_res,
                actual,
            });
        }
        aatype.extend(template.sequence.iter().map(|&c| {
            if c == '-' {
                GAP_RESTYPE
            } else {
                restype_index(c)
            }
        }));
        mask.extend(template.mask.iter().flatten());
        positions.extend(template.positions.iter().flatten().flatten());
    }

    let mut features = FeatureSet::new();
    features.insert("template_aatype", Feature::int(vec![t, num_res], aatype)?);
    features.insert(
        "template_all_atom_mask",
        Feature::float(vec![t, num_res, ATOM_TYPE_NUM], mask)?,
    );
    features.insert(
        "template_all_atom_positions",
        Feature::float(vec![t, num_res, ATOM_TYPE_NUM, 3], positions)?,
    );
    features.insert(
        "template_domain_names",
        Feature::text(vec![t], templates.iter().map(|x| x.name.clone()).collect())?,
    );
    features.insert(
        "template_sum_probs",
        Feature::float(vec![t, 1], templates.iter().map(|x| x.sum_probs).collect())?,
    );
    Ok(features)
}

pub const TEMPLATE_RESIDUE_FIELDS: [&str; 3] = [
    "template_aatype",
    "template_all_atom_mask",
    "template_all_atom_positions",
];

/// Template features holding zero templates for a chain of `num_res` residues.
pub fn empty_template_features(num_res: usize) -> FeatureSet {
    let mut features = FeatureSet::new();
    features.insert("template_aatype", Feature::full(vec![0, num_res], Scalar::Int(0)));
    features.insert(
        "template_all_atom_mask",
        Feature::full(vec![0, num_res, ATOM_TYPE_NUM], Scalar::Float(0.0)),
    );
    features.insert(
        "template_all_atom_positions",
        Feature::full(vec![0, num_res, ATOM_TYPE_NUM, 3], Scalar::Float(0.0)),
    );
    features.insert(
        "template_domain_names",
        Feature::full(vec![0], Scalar::Text(String::new())),
    );
    features.insert("template_sum_probs", Feature::full(vec![0, 1], Scalar::Float(0.0)));
    features
}

/// Number of templates carried by `features`, zero when none are present.
pub fn template_count(features: &FeatureSet) -> usize {
    features
        .get("template_aatype")
        .and_then(|f| f.dim(0))
        .unwrap_or(0)
}

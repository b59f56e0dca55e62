use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FeatureError {
    #[error("Shape {shape:?} holds {expected} elements but {actual} were supplied")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("Cannot combine features of dtype '{left}' and '{right}'")]
    DtypeMismatch {
        left: &'static str,
        right: &'static str,
    },
    #[error("Axis {axis} is out of range for a rank-{rank} feature")]
    AxisOutOfRange { axis: usize, rank: usize },
    #[error("Feature shapes {left:?} and {right:?} disagree outside the concatenation axis {axis}")]
    IncompatibleShapes {
        left: Vec<usize>,
        right: Vec<usize>,
        axis: usize,
    },
    #[error("Cannot concatenate an empty list of features")]
    NothingToConcatenate,
    #[error("Cannot shrink axis {axis} from {current} to {requested} by padding")]
    PadShrinks {
        axis: usize,
        current: usize,
        requested: usize,
    },
    #[error("Required feature '{0}' is missing")]
    MissingField(String),
    #[error("Feature '{name}' must have dtype '{expected}'")]
    UnexpectedDtype { name: String, expected: &'static str },
    #[error("At least one non-empty alignment is required")]
    NoAlignments,
    #[error("Feature set serialization failed: {0}")]
    Serialization(String),
}

/// Element storage of a [`Feature`], row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum FeatureData {
    Int(Vec<i64>),
    Float(Vec<f32>),
    Text(Vec<String>),
}

impl FeatureData {
    pub fn len(&self) -> usize {
        match self {
            FeatureData::Int(v) => v.len(),
            FeatureData::Float(v) => v.len(),
            FeatureData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            FeatureData::Int(_) => "int",
            FeatureData::Float(_) => "float",
            FeatureData::Text(_) => "text",
        }
    }
}

/// A single fill value, used to build constant features and to pad existing ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f32),
    Text(String),
}

/// A typed, shaped tensor. A rank-0 feature (empty shape) holds exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    shape: Vec<usize>,
    data: FeatureData,
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Feature {
    pub fn new(shape: Vec<usize>, data: FeatureData) -> Result<Self, FeatureError> {
        let expected = element_count(&shape);
        if expected != data.len() {
            return Err(FeatureError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn int(shape: Vec<usize>, values: Vec<i64>) -> Result<Self, FeatureError> {
        Self::new(shape, FeatureData::Int(values))
    }

    pub fn float(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, FeatureError> {
        Self::new(shape, FeatureData::Float(values))
    }

    pub fn text(shape: Vec<usize>, values: Vec<String>) -> Result<Self, FeatureError> {
        Self::new(shape, FeatureData::Text(values))
    }

    pub fn scalar_int(value: i64) -> Self {
        Self {
            shape: Vec::new(),
            data: FeatureData::Int(vec![value]),
        }
    }

    /// A feature of `shape` with every element set to `value`.
    pub fn full(shape: Vec<usize>, value: Scalar) -> Self {
        let n = element_count(&shape);
        let data = match value {
            Scalar::Int(v) => FeatureData::Int(vec![v; n]),
            Scalar::Float(v) => FeatureData::Float(vec![v; n]),
            Scalar::Text(v) => FeatureData::Text(vec![v; n]),
        };
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &FeatureData {
        &self.data
    }

    pub fn dtype(&self) -> &'static str {
        self.data.dtype()
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match &self.data {
            FeatureData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f32]> {
        match &self.data {
            FeatureData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match &self.data {
            FeatureData::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Size of `axis`, if the feature has that many dimensions.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.shape.get(axis).copied()
    }

    /// Concatenates features along `axis`. All parts must share dtype, rank, and every
    /// dimension other than `axis`.
    pub fn concat(parts: &[&Feature], axis: usize) -> Result<Feature, FeatureError> {
        let first = *parts.first().ok_or(FeatureError::NothingToConcatenate)?;
        if axis >= first.rank() {
            return Err(FeatureError::AxisOutOfRange {
                axis,
                rank: first.rank(),
            });
        }
        for part in &parts[1..] {
            if part.dtype() != first.dtype() {
                return Err(FeatureError::DtypeMismatch {
                    left: first.dtype(),
                    right: part.dtype(),
                });
            }
            let compatible = part.rank() == first.rank()
                && part
                    .shape
                    .iter()
                    .zip(&first.shape)
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(FeatureError::IncompatibleShapes {
                    left: first.shape.clone(),
                    right: part.shape.clone(),
                    axis,
                });
            }
        }

        let outer = element_count(&first.shape[..axis]);
        let inner = element_count(&first.shape[axis + 1..]);
        let mut shape = first.shape.clone();
        shape[axis] = parts.iter().map(|p| p.shape[axis]).sum();

        let chunks: Vec<usize> = parts.iter().map(|p| p.shape[axis] * inner).collect();
        let data = match &first.data {
            FeatureData::Int(_) => FeatureData::Int(interleave(parts, &chunks, outer, |p| {
                p.as_int().unwrap_or_default()
            })),
            FeatureData::Float(_) => FeatureData::Float(interleave(parts, &chunks, outer, |p| {
                p.as_float().unwrap_or_default()
            })),
            FeatureData::Text(_) => FeatureData::Text(interleave(parts, &chunks, outer, |p| {
                p.as_text().unwrap_or_default()
            })),
        };
        Feature::new(shape, data)
    }

    /// Grows `axis` to `len` by appending elements equal to `fill`.
    pub fn pad_axis(&self, axis: usize, len: usize, fill: Scalar) -> Result<Feature, FeatureError> {
        let current = self.dim(axis).ok_or(FeatureError::AxisOutOfRange {
            axis,
            rank: self.rank(),
        })?;
        if len < current {
            return Err(FeatureError::PadShrinks {
                axis,
                current,
                requested: len,
            });
        }
        if len == current {
            return Ok(self.clone());
        }
        let mut pad_shape = self.shape.clone();
        pad_shape[axis] = len - current;
        let padding = Feature::full(pad_shape, fill);
        Feature::concat(&[self, &padding], axis)
    }
}

fn interleave<T: Clone>(
    parts: &[&Feature],
    chunks: &[usize],
    outer: usize,
    values: impl Fn(&Feature) -> &[T],
) -> Vec<T> {
    let total: usize = chunks.iter().sum::<usize>() * outer;
    let mut out = Vec::with_capacity(total);
    for o in 0..outer {
        for (part, &chunk) in parts.iter().zip(chunks) {
            let v = values(*part);
            out.extend_from_slice(&v[o * chunk..(o + 1) * chunk]);
        }
    }
    out
}

/// Named feature tensors for one chain or for an assembled complex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    fields: BTreeMap<String, Feature>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, feature: Feature) -> Option<Feature> {
        self.fields.insert(name.into(), feature)
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.fields.get(name)
    }

    /// The named feature, or [`FeatureError::MissingField`].
    pub fn require(&self, name: &str) -> Result<&Feature, FeatureError> {
        self.fields
            .get(name)
            .ok_or_else(|| FeatureError::MissingField(name.to_string()))
    }

    pub fn require_int(&self, name: &str) -> Result<&[i64], FeatureError> {
        self.require(name)?
            .as_int()
            .ok_or_else(|| FeatureError::UnexpectedDtype {
                name: name.to_string(),
                expected: "int",
            })
    }

    pub fn require_text(&self, name: &str) -> Result<&[String], FeatureError> {
        self.require(name)?
            .as_text()
            .ok_or_else(|| FeatureError::UnexpectedDtype {
                name: name.to_string(),
                expected: "text",
            })
    }

    pub fn remove(&mut self, name: &str) -> Option<Feature> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Moves every field of `other` into `self`, replacing fields with the same name.
    pub fn extend(&mut self, other: FeatureSet) {
        self.fields.extend(other.fields);
    }

    /// Copies every field of `other` into `self` under `prefix`.
    pub fn extend_prefixed(&mut self, prefix: &str, other: &FeatureSet) {
        for (name, feature) in other.iter() {
            self.fields
                .insert(format!("{prefix}{name}"), feature.clone());
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FeatureError> {
        serde_json::to_vec(self).map_err(|e| FeatureError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeatureError> {
        serde_json::from_slice(bytes).map_err(|e| FeatureError::Serialization(e.to_string()))
    }
}

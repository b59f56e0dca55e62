use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const KEY_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PathError {
    #[error("Storage URI must not be empty")]
    EmptyUri,
    #[error("Unsupported storage scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("Bucket URI '{0}' has no bucket name")]
    MissingBucket(String),
    #[error("Project '{0}' must be non-empty slash-separated segments without '.' or '..'")]
    InvalidProject(String),
    #[error("Unknown artifact kind '{0}'")]
    UnknownKind(String),
    #[error("Cache key '{0}' is not a 64-character lowercase hex digest")]
    InvalidKey(String),
    #[error("Artifact path '{0}' must look like '<project>/<kind>/<key>'")]
    Malformed(String),
}

/// Root location of an artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageUri {
    /// A directory on the local filesystem, written as `file:///abs/path` or a bare path.
    Local(PathBuf),
    /// An object-store bucket, written as `gs://bucket/optional/prefix`.
    Bucket { bucket: String, prefix: String },
}

impl FromStr for StorageUri {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::EmptyUri);
        }
        if let Some(rest) = s.strip_prefix("gs://") {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(PathError::MissingBucket(s.to_string()));
            }
            return Ok(StorageUri::Bucket {
                bucket: bucket.to_string(),
                prefix: prefix.trim_matches('/').to_string(),
            });
        }
        if let Some(rest) = s.strip_prefix("file://") {
            if rest.is_empty() {
                return Err(PathError::EmptyUri);
            }
            return Ok(StorageUri::Local(PathBuf::from(rest)));
        }
        if let Some((scheme, _)) = s.split_once("://") {
            return Err(PathError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(StorageUri::Local(PathBuf::from(s)))
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageUri::Local(path) => write!(f, "file://{}", path.display()),
            StorageUri::Bucket { bucket, prefix } if prefix.is_empty() => {
                write!(f, "gs://{bucket}")
            }
            StorageUri::Bucket { bucket, prefix } => write!(f, "gs://{bucket}/{prefix}"),
        }
    }
}

/// Namespace under a project for one class of artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// Features of one chain.
    ChainArtifacts,
    /// Assembled features of a whole run.
    FullProteinArtifacts,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ChainArtifacts => "chain_artifacts",
            ArtifactKind::FullProteinArtifacts => "full_protein_artifacts",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chain_artifacts" => Ok(ArtifactKind::ChainArtifacts),
            "full_protein_artifacts" => Ok(ArtifactKind::FullProteinArtifacts),
            _ => Err(PathError::UnknownKind(s.to_string())),
        }
    }
}

/// Store address of one artifact: `{project}/{kind}/{key}`.
///
/// Validated on construction, so every value names exactly one key under one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactPath {
    project: String,
    kind: ArtifactKind,
    key: String,
}

pub(crate) fn validate_project(project: &str) -> Result<(), PathError> {
    let valid = !project.is_empty()
        && project
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    if valid {
        Ok(())
    } else {
        Err(PathError::InvalidProject(project.to_string()))
    }
}

fn validate_key(key: &str) -> Result<(), PathError> {
    let valid = key.len() == KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(PathError::InvalidKey(key.to_string()))
    }
}

impl ArtifactPath {
    pub fn new(project: &str, kind: ArtifactKind, key: &str) -> Result<Self, PathError> {
        validate_project(project)?;
        validate_key(key)?;
        Ok(Self {
            project: project.to_string(),
            kind,
            key: key.to_string(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Listing prefix covering every artifact of `kind` under `project`.
    pub fn namespace(project: &str, kind: ArtifactKind) -> String {
        format!("{project}/{kind}/")
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.kind, self.key)
    }
}

impl FromStr for ArtifactPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, key) = s
            .rsplit_once('/')
            .ok_or_else(|| PathError::Malformed(s.to_string()))?;
        let (project, kind) = rest
            .rsplit_once('/')
            .ok_or_else(|| PathError::Malformed(s.to_string()))?;
        Self::new(project, kind.parse()?, key)
    }
}

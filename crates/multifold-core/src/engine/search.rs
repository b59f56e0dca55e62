use crate::core::features::template::empty_template_features;
use crate::core::io::{AlignmentError, AlignmentFormat, read_alignment};
use crate::core::models::features::FeatureSet;
use crate::core::models::msa::Msa;
use crate::core::models::sequence::SequenceRecord;
use crate::engine::config::SearchConfig;
use crate::engine::templates::Hmmsearch;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Database '{0}' does not exist")]
    MissingDatabase(PathBuf),
    #[error("{tool} expects {expected} database(s), got {actual}")]
    DatabaseCount {
        tool: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },
    #[error("Could not read {tool} output '{path}': {source}")]
    Output {
        tool: &'static str,
        path: PathBuf,
        #[source]
        source: AlignmentError,
    },
    #[error("Template search failed: {0}")]
    Template(String),
}

/// Inputs of one search invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub sequence_path: PathBuf,
    pub databases: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub n_cpu: usize,
    pub max_hits: usize,
}

/// Alignment found by a search, query first, with at most `max_hits` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutput {
    pub msa: Msa,
    pub format: AlignmentFormat,
}

/// An external alignment search. Implementations run in their own failure domain and are
/// called from several worker threads at once.
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, request: &SearchRequest) -> Result<SearchOutput, SearchError>;
}

/// Structural template search seeded with the chain's uniref90 alignment. Intermediate files
/// go to `output_dir`.
pub trait TemplateSearch: Send + Sync {
    fn search(
        &self,
        record: &SequenceRecord,
        uniref90: &Msa,
        output_dir: &Path,
    ) -> Result<FeatureSet, SearchError>;
}

/// Template search that never finds templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTemplates;

impl TemplateSearch for NoTemplates {
    fn search(
        &self,
        record: &SequenceRecord,
        _uniref90: &Msa,
        _output_dir: &Path,
    ) -> Result<FeatureSet, SearchError> {
        Ok(empty_template_features(record.len()))
    }
}

/// The search collaborators of a run.
pub struct SearchSuite {
    /// Profile search over a single sequence database (uniref90, mgnify, small BFD, uniprot).
    pub jackhmmer: Box<dyn SearchTool>,
    /// HMM-HMM search over the full BFD and uniref30.
    pub hhblits: Box<dyn SearchTool>,
    pub templates: Box<dyn TemplateSearch>,
}

impl SearchSuite {
    /// Suite invoking the HMMER and HH-suite binaries from `PATH`. Templates are searched
    /// only when a `pdb_seqres` database is configured.
    pub fn from_path(config: &SearchConfig) -> Self {
        let databases = &config.databases;
        let templates: Box<dyn TemplateSearch> =
            match (&databases.pdb_seqres, &databases.pdb_mmcif) {
                (Some(seqres), Some(mmcif)) => Box::new(Hmmsearch::new(
                    seqres.clone(),
                    mmcif.clone(),
                    config.max_template_date,
                    config.n_cpu,
                )),
                _ => Box::new(NoTemplates),
            };
        Self {
            jackhmmer: Box::new(Jackhmmer::new("jackhmmer")),
            hhblits: Box::new(Hhblits::new("hhblits")),
            templates,
        }
    }
}

/// A database exists either as a file or, for HH-suite databases, as a set of files sharing
/// the path as a prefix (`<path>_a3m.ffdata`, ...).
pub(crate) fn check_database(path: &Path) -> Result<(), SearchError> {
    if path.exists() {
        return Ok(());
    }
    let prefix = path
        .file_name()
        .map(|n| format!("{}_", n.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let has_parts = !prefix.is_empty()
        && fs::read_dir(parent.unwrap_or_else(|| Path::new(".")))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            })
            .unwrap_or(false);
    if has_parts {
        Ok(())
    } else {
        Err(SearchError::MissingDatabase(path.to_path_buf()))
    }
}

pub(crate) fn execute(tool: &'static str, mut command: Command) -> Result<(), SearchError> {
    debug!(?command, "Launching {tool}");
    let started = Instant::now();
    let output = command
        .output()
        .map_err(|source| SearchError::Spawn { tool, source })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
        return Err(SearchError::Failed {
            tool,
            status: output.status.to_string(),
            stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
        });
    }
    info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        "{tool} finished"
    );
    Ok(())
}

fn read_hits(
    tool: &'static str,
    format: AlignmentFormat,
    request: &SearchRequest,
) -> Result<SearchOutput, SearchError> {
    let mut msa =
        read_alignment(format, &request.output_path).map_err(|source| SearchError::Output {
            tool,
            path: request.output_path.clone(),
            source,
        })?;
    msa.truncate(request.max_hits);
    Ok(SearchOutput { msa, format })
}

/// `jackhmmer` from HMMER, one iteration, Stockholm output.
#[derive(Debug, Clone)]
pub struct Jackhmmer {
    binary: PathBuf,
    e_value: f64,
    n_iter: u32,
}

impl Jackhmmer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            e_value: 0.0001,
            n_iter: 1,
        }
    }

    fn command(&self, request: &SearchRequest, database: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-o")
            .arg("/dev/null")
            .arg("-A")
            .arg(&request.output_path)
            .arg("--noali")
            .args(["--F1", "0.0005", "--F2", "0.00005", "--F3", "0.0000005"])
            .arg("--incE")
            .arg(self.e_value.to_string())
            .arg("-E")
            .arg(self.e_value.to_string())
            .arg("--cpu")
            .arg(request.n_cpu.to_string())
            .arg("-N")
            .arg(self.n_iter.to_string())
            .arg(&request.sequence_path)
            .arg(database);
        command
    }
}

impl SearchTool for Jackhmmer {
    fn name(&self) -> &'static str {
        "jackhmmer"
    }

    #[instrument(skip_all, name = "jackhmmer", fields(db = ?request.databases))]
    fn run(&self, request: &SearchRequest) -> Result<SearchOutput, SearchError> {
        let [database] = request.databases.as_slice() else {
            return Err(SearchError::DatabaseCount {
                tool: self.name(),
                expected: 1,
                actual: request.databases.len(),
            });
        };
        check_database(database)?;
        execute(self.name(), self.command(request, database))?;
        read_hits(self.name(), AlignmentFormat::Stockholm, request)
    }
}

/// `hhblits` from HH-suite, three iterations, A3M output.
#[derive(Debug, Clone)]
pub struct Hhblits {
    binary: PathBuf,
    maxseq: usize,
}

impl Hhblits {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            maxseq: 1_000_000,
        }
    }

    fn command(&self, request: &SearchRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-i")
            .arg(&request.sequence_path)
            .arg("-cpu")
            .arg(request.n_cpu.to_string())
            .arg("-oa3m")
            .arg(&request.output_path)
            .args(["-o", "/dev/null", "-n", "3", "-e", "0.001"])
            .arg("-maxseq")
            .arg(self.maxseq.to_string())
            .args(["-realign_max", "100000", "-maxfilt", "100000"])
            .args(["-min_prefilter_hits", "1000"]);
        for database in &request.databases {
            command.arg("-d").arg(database);
        }
        command
    }
}

impl SearchTool for Hhblits {
    fn name(&self) -> &'static str {
        "hhblits"
    }

    #[instrument(skip_all, name = "hhblits", fields(db = ?request.databases))]
    fn run(&self, request: &SearchRequest) -> Result<SearchOutput, SearchError> {
        if request.databases.is_empty() {
            return Err(SearchError::DatabaseCount {
                tool: self.name(),
                expected: 1,
                actual: 0,
            });
        }
        for database in &request.databases {
            check_database(database)?;
        }
        execute(self.name(), self.command(request))?;
        read_hits(self.name(), AlignmentFormat::A3m, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(dir: &Path, databases: Vec<PathBuf>) -> SearchRequest {
        SearchRequest {
            sequence_path: dir.join("query.fasta"),
            databases,
            output_path: dir.join("out.sto"),
            n_cpu: 4,
            max_hits: 2,
        }
    }

    #[test]
    fn jackhmmer_command_carries_output_and_database() {
        let dir = tempdir().unwrap();
        let req = request(dir.path(), vec![dir.path().join("db.fasta")]);
        let tool = Jackhmmer::new("jackhmmer");
        let command = tool.command(&req, &req.databases[0]);
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program(), "jackhmmer");
        assert_eq!(args[2], "-A");
        assert_eq!(args[3], req.output_path.to_string_lossy());
        assert!(args.windows(2).any(|w| w == ["--cpu", "4"]));
        assert_eq!(args[args.len() - 1], req.databases[0].to_string_lossy());
    }

    #[test]
    fn hhblits_command_lists_every_database() {
        let dir = tempdir().unwrap();
        let req = request(
            dir.path(),
            vec![dir.path().join("bfd"), dir.path().join("uniref30")],
        );
        let args: Vec<String> = Hhblits::new("hhblits")
            .command(&req)
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args.iter().filter(|a| *a == "-d").count(), 2);
        assert!(args.windows(2).any(|w| w == ["-maxseq", "1000000"]));
    }

    #[test]
    fn missing_database_is_reported_before_launch() {
        let dir = tempdir().unwrap();
        let req = request(dir.path(), vec![dir.path().join("absent.fasta")]);
        let result = Jackhmmer::new("/nonexistent/jackhmmer").run(&req);
        assert!(matches!(result, Err(SearchError::MissingDatabase(_))));
    }

    #[test]
    fn hh_suite_database_prefixes_count_as_present() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("uniref30_a3m.ffdata"), "").unwrap();
        assert!(check_database(&dir.path().join("uniref30")).is_ok());
        assert!(check_database(&dir.path().join("bfd")).is_err());
    }

    #[test]
    fn jackhmmer_requires_exactly_one_database() {
        let dir = tempdir().unwrap();
        let req = request(dir.path(), vec![]);
        assert!(matches!(
            Jackhmmer::new("jackhmmer").run(&req),
            Err(SearchError::DatabaseCount { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn unlaunchable_binary_is_a_spawn_error() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db.fasta");
        fs::write(&db, ">x\nMKV\n").unwrap();
        let req = request(dir.path(), vec![db]);
        let result = Jackhmmer::new(dir.path().join("no-such-binary")).run(&req);
        assert!(matches!(result, Err(SearchError::Spawn { .. })));
    }

    #[test]
    fn output_is_truncated_to_max_hits() {
        let dir = tempdir().unwrap();
        let req = request(dir.path(), vec![]);
        fs::write(&req.output_path, "q MKV\na MKV\nb MRV\nc MKI\n//\n").unwrap();
        let output = read_hits("jackhmmer", AlignmentFormat::Stockholm, &req).unwrap();
        assert_eq!(output.msa.len(), 2);
        assert_eq!(output.format, AlignmentFormat::Stockholm);
    }

    #[test]
    fn no_templates_yields_empty_template_features() {
        let record = SequenceRecord::new(
            crate::core::models::ids::ChainId::from_index(0).unwrap(),
            "MKV",
            "",
        );
        let dir = tempdir().unwrap();
        let features = NoTemplates
            .search(&record, &Msa::single("MKV", "q"), dir.path())
            .unwrap();
        assert_eq!(features.get("template_aatype").unwrap().shape(), &[0, 3]);
    }
}

//! Fakes shared by the engine and workflow tests.

use crate::core::io::AlignmentFormat;
use crate::core::io::fasta::FastaFile;
use crate::core::io::traits::TextFormat;
use crate::core::models::msa::Msa;
use crate::core::store::{ArtifactPath, ArtifactStore, StoreError};
use crate::engine::config::{ModelPreset, RunConfig, RunConfigBuilder};
use crate::engine::search::{
    NoTemplates, SearchError, SearchOutput, SearchRequest, SearchSuite, SearchTool,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn test_config(dir: &Path, skip_search: Option<bool>) -> RunConfig {
    RunConfigBuilder::new()
        .project("lab/test")
        .work_dir(dir.join("work"))
        .parallelism(2)
        .max_template_date("2022-01-01")
        .skip_search(skip_search)
        .uniref90(PathBuf::from("/db/uniref90.fasta"))
        .mgnify(PathBuf::from("/db/mgnify.fa"))
        .bfd(Some(PathBuf::from("/db/bfd")))
        .uniref30(Some(PathBuf::from("/db/uniref30")))
        .uniprot(Some(PathBuf::from("/db/uniprot.fasta")))
        .preset(ModelPreset::Multimer)
        .build()
        .unwrap()
}

/// Search tool answering from the query itself. Every database yields the query plus one
/// human hit; databases whose name contains a `failing` entry fail instead.
pub(crate) struct FakeSearch {
    failing: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeSearch {
    pub(crate) fn suite(failing: &[&str]) -> SearchSuite {
        Self::counting_suite(failing).0
    }

    /// Suite whose tools share one call counter.
    pub(crate) fn counting_suite(failing: &[&str]) -> (SearchSuite, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = || {
            Box::new(FakeSearch {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                calls: Arc::clone(&calls),
            })
        };
        let suite = SearchSuite {
            jackhmmer: tool(),
            hhblits: tool(),
            templates: Box::new(NoTemplates),
        };
        (suite, calls)
    }
}

impl SearchTool for FakeSearch {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn run(&self, request: &SearchRequest) -> Result<SearchOutput, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let database = request.databases[0].to_string_lossy().into_owned();
        if self.failing.iter().any(|f| database.contains(f.as_str())) {
            return Err(SearchError::Failed {
                tool: "fake",
                status: "exit status: 1".into(),
                stderr: format!("cannot search {database}"),
            });
        }
        let query = FastaFile::read_from_path(&request.sequence_path).unwrap()[0]
            .sequence
            .clone();
        let substitute = if query.starts_with('G') { 'A' } else { 'G' };
        let hit: String = std::iter::once(substitute).chain(query.chars().skip(1)).collect();
        let width = query.len();
        let msa = Msa::new(
            vec![query, hit],
            vec![vec![0; width]; 2],
            vec!["query".into(), "sp|P69905|HBA_HUMAN/1-99".into()],
        )
        .unwrap();
        Ok(SearchOutput {
            msa,
            format: AlignmentFormat::Stockholm,
        })
    }
}

/// Store that answers reads and existence checks but rejects every write.
pub(crate) struct FailingStore;

impl ArtifactStore for FailingStore {
    fn exists(&self, _: &ArtifactPath) -> Result<bool, StoreError> {
        Ok(false)
    }
    fn get(&self, path: &ArtifactPath) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::NotFound(path.to_string()))
    }
    fn put(&self, _: &ArtifactPath, _: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only".into()))
    }
    fn list(&self, _: &str) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

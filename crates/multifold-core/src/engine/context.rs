use super::cache_key::{CacheKeyResolver, RunParameters};
use super::config::RunConfig;
use super::progress::ProgressReporter;
use super::search::SearchSuite;
use crate::core::store::ArtifactStore;

/// Everything a chain task needs, shared read-only across worker threads.
pub struct RunContext<'a> {
    pub config: &'a RunConfig,
    pub store: &'a dyn ArtifactStore,
    pub searches: &'a SearchSuite,
    pub reporter: &'a ProgressReporter<'a>,
    params: RunParameters,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a RunConfig,
        store: &'a dyn ArtifactStore,
        searches: &'a SearchSuite,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            config,
            store,
            searches,
            reporter,
            params: RunParameters::from_config(config),
        }
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn resolver(&self) -> CacheKeyResolver<'_> {
        CacheKeyResolver::new(&self.params, self.store, &self.config.project)
    }
}

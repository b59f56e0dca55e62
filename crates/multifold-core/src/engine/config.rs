use crate::core::store::uri::validate_project;
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const TEMPLATE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("Contradictory configuration: {0}")]
    Contradictory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelPreset {
    Monomer,
    MonomerCasp14,
    MonomerPtm,
    Multimer,
}

impl ModelPreset {
    pub fn is_multimer(&self) -> bool {
        matches!(self, ModelPreset::Multimer)
    }

    /// Ensemble count fed to every runner of this preset.
    pub fn num_ensemble(&self) -> u32 {
        match self {
            ModelPreset::MonomerCasp14 => 8,
            _ => 1,
        }
    }

    pub fn default_model_names(&self) -> Vec<String> {
        let suffix = match self {
            ModelPreset::Monomer | ModelPreset::MonomerCasp14 => "",
            ModelPreset::MonomerPtm => "_ptm",
            ModelPreset::Multimer => "_multimer_v3",
        };
        (1..=5).map(|i| format!("model_{i}{suffix}")).collect()
    }
}

impl fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelPreset::Monomer => "monomer",
            ModelPreset::MonomerCasp14 => "monomer_casp14",
            ModelPreset::MonomerPtm => "monomer_ptm",
            ModelPreset::Multimer => "multimer",
        })
    }
}

impl FromStr for ModelPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monomer" => Ok(ModelPreset::Monomer),
            "monomer_casp14" => Ok(ModelPreset::MonomerCasp14),
            "monomer_ptm" => Ok(ModelPreset::MonomerPtm),
            "multimer" => Ok(ModelPreset::Multimer),
            _ => Err(ConfigError::InvalidValue {
                parameter: "model.preset",
                reason: format!(
                    "unknown preset '{s}', expected monomer, monomer_casp14, monomer_ptm or multimer"
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabasePaths {
    pub uniref90: PathBuf,
    pub mgnify: PathBuf,
    pub bfd: Option<PathBuf>,
    pub small_bfd: Option<PathBuf>,
    pub uniref30: Option<PathBuf>,
    pub uniprot: Option<PathBuf>,
    /// Template search database; enables template search when set.
    pub pdb_seqres: Option<PathBuf>,
    /// Directory of `{pdb_id}.cif` files backing the `pdb_seqres` entries.
    pub pdb_mmcif: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub use_small_bfd: bool,
    pub max_template_date: NaiveDate,
    pub uniref_max_hits: usize,
    pub mgnify_max_hits: usize,
    pub uniprot_max_hits: usize,
    pub skip_search: Option<bool>,
    pub n_cpu: usize,
    pub databases: DatabasePaths,
}

impl SearchConfig {
    /// Whether the optional paired search is switched off for this run.
    pub fn skips_paired_search(&self) -> bool {
        self.skip_search == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub preset: ModelPreset,
    pub model_names: Vec<String>,
    pub predictions_per_model: usize,
    pub random_seed: Option<i64>,
    pub run_relax: bool,
}

impl ModelConfig {
    /// Repetitions per model variant: only multimer models are sampled more than once.
    pub fn repetitions(&self) -> usize {
        if self.preset.is_multimer() {
            self.predictions_per_model
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub project: String,
    pub work_dir: PathBuf,
    pub parallelism: usize,
    pub search: SearchConfig,
    pub model: ModelConfig,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    project: Option<String>,
    work_dir: Option<PathBuf>,
    parallelism: Option<usize>,
    use_small_bfd: Option<bool>,
    max_template_date: Option<String>,
    uniref_max_hits: Option<usize>,
    mgnify_max_hits: Option<usize>,
    uniprot_max_hits: Option<usize>,
    skip_search: Option<bool>,
    n_cpu: Option<usize>,
    uniref90: Option<PathBuf>,
    mgnify: Option<PathBuf>,
    bfd: Option<PathBuf>,
    small_bfd: Option<PathBuf>,
    uniref30: Option<PathBuf>,
    uniprot: Option<PathBuf>,
    pdb_seqres: Option<PathBuf>,
    pdb_mmcif: Option<PathBuf>,
    preset: Option<ModelPreset>,
    model_names: Option<Vec<String>>,
    predictions_per_model: Option<usize>,
    random_seed: Option<i64>,
    run_relax: Option<bool>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn parallelism(mut self, n: usize) -> Self {
        self.parallelism = Some(n);
        self
    }
    pub fn use_small_bfd(mut self, enabled: bool) -> Self {
        self.use_small_bfd = Some(enabled);
        self
    }
    pub fn max_template_date(mut self, date: impl Into<String>) -> Self {
        self.max_template_date = Some(date.into());
        self
    }
    pub fn uniref_max_hits(mut self, n: usize) -> Self {
        self.uniref_max_hits = Some(n);
        self
    }
    pub fn mgnify_max_hits(mut self, n: usize) -> Self {
        self.mgnify_max_hits = Some(n);
        self
    }
    pub fn uniprot_max_hits(mut self, n: usize) -> Self {
        self.uniprot_max_hits = Some(n);
        self
    }
    pub fn skip_search(mut self, skip: Option<bool>) -> Self {
        self.skip_search = skip;
        self
    }
    pub fn n_cpu(mut self, n: usize) -> Self {
        self.n_cpu = Some(n);
        self
    }
    pub fn uniref90(mut self, path: PathBuf) -> Self {
        self.uniref90 = Some(path);
        self
    }
    pub fn mgnify(mut self, path: PathBuf) -> Self {
        self.mgnify = Some(path);
        self
    }
    pub fn bfd(mut self, path: Option<PathBuf>) -> Self {
        self.bfd = path;
        self
    }
    pub fn small_bfd(mut self, path: Option<PathBuf>) -> Self {
        self.small_bfd = path;
        self
    }
    pub fn uniref30(mut self, path: Option<PathBuf>) -> Self {
        self.uniref30 = path;
        self
    }
    pub fn uniprot(mut self, path: Option<PathBuf>) -> Self {
        self.uniprot = path;
        self
    }
    pub fn pdb_seqres(mut self, path: Option<PathBuf>) -> Self {
        self.pdb_seqres = path;
        self
    }
    pub fn pdb_mmcif(mut self, path: Option<PathBuf>) -> Self {
        self.pdb_mmcif = path;
        self
    }
    pub fn preset(mut self, preset: ModelPreset) -> Self {
        self.preset = Some(preset);
        self
    }
    pub fn model_names(mut self, names: Vec<String>) -> Self {
        self.model_names = Some(names);
        self
    }
    pub fn predictions_per_model(mut self, n: usize) -> Self {
        self.predictions_per_model = Some(n);
        self
    }
    pub fn random_seed(mut self, seed: Option<i64>) -> Self {
        self.random_seed = seed;
        self
    }
    pub fn run_relax(mut self, enabled: bool) -> Self {
        self.run_relax = Some(enabled);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let project = self
            .project
            .ok_or(ConfigError::MissingParameter("project"))?;
        validate_project(&project).map_err(|e| ConfigError::InvalidValue {
            parameter: "project",
            reason: e.to_string(),
        })?;

        let raw_date = self
            .max_template_date
            .ok_or(ConfigError::MissingParameter("search.max_template_date"))?;
        let max_template_date = NaiveDate::parse_from_str(&raw_date, TEMPLATE_DATE_FORMAT)
            .map_err(|e| ConfigError::InvalidValue {
                parameter: "search.max_template_date",
                reason: format!("'{raw_date}' is not a YYYY-MM-DD date ({e})"),
            })?;

        let use_small_bfd = self.use_small_bfd.unwrap_or(false);
        if use_small_bfd && self.small_bfd.is_none() {
            return Err(ConfigError::MissingParameter("databases.small_bfd"));
        }
        if !use_small_bfd {
            if self.bfd.is_none() {
                return Err(ConfigError::MissingParameter("databases.bfd"));
            }
            if self.uniref30.is_none() {
                return Err(ConfigError::MissingParameter("databases.uniref30"));
            }
        }
        if self.pdb_seqres.is_some() && self.pdb_mmcif.is_none() {
            return Err(ConfigError::MissingParameter("databases.pdb_mmcif"));
        }

        let databases = DatabasePaths {
            uniref90: self
                .uniref90
                .ok_or(ConfigError::MissingParameter("databases.uniref90"))?,
            mgnify: self
                .mgnify
                .ok_or(ConfigError::MissingParameter("databases.mgnify"))?,
            bfd: self.bfd,
            small_bfd: self.small_bfd,
            uniref30: self.uniref30,
            uniprot: self.uniprot,
            pdb_seqres: self.pdb_seqres,
            pdb_mmcif: self.pdb_mmcif,
        };

        let search = SearchConfig {
            use_small_bfd,
            max_template_date,
            uniref_max_hits: at_least_one("search.uniref_max_hits", self.uniref_max_hits, 10_000)?,
            mgnify_max_hits: at_least_one("search.mgnify_max_hits", self.mgnify_max_hits, 501)?,
            uniprot_max_hits: at_least_one(
                "search.uniprot_max_hits",
                self.uniprot_max_hits,
                50_000,
            )?,
            skip_search: self.skip_search,
            n_cpu: at_least_one("search.n_cpu", self.n_cpu, 8)?,
            databases,
        };

        let preset = self.preset.unwrap_or(ModelPreset::Monomer);
        let model_names = match self.model_names {
            Some(names) if !names.is_empty() => names,
            _ => preset.default_model_names(),
        };
        check_model_names(preset, &model_names)?;

        let model = ModelConfig {
            preset,
            model_names,
            predictions_per_model: at_least_one(
                "model.predictions_per_model",
                self.predictions_per_model,
                1,
            )?,
            random_seed: self.random_seed,
            run_relax: self.run_relax.unwrap_or(true),
        };

        Ok(RunConfig {
            project,
            work_dir: self
                .work_dir
                .ok_or(ConfigError::MissingParameter("work_dir"))?,
            parallelism: at_least_one("parallelism", self.parallelism, 1)?,
            search,
            model,
        })
    }
}

fn at_least_one(
    parameter: &'static str,
    value: Option<usize>,
    default: usize,
) -> Result<usize, ConfigError> {
    match value.unwrap_or(default) {
        0 => Err(ConfigError::InvalidValue {
            parameter,
            reason: "must be at least 1".to_string(),
        }),
        n => Ok(n),
    }
}

fn check_model_names(preset: ModelPreset, names: &[String]) -> Result<(), ConfigError> {
    for name in names {
        if name.contains("multimer") != preset.is_multimer() {
            return Err(ConfigError::Contradictory(format!(
                "model '{name}' does not belong to the '{preset}' preset"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RunConfigBuilder {
        RunConfigBuilder::new()
            .project("lab/proj")
            .work_dir(PathBuf::from("/tmp/work"))
            .max_template_date("2022-01-01")
            .uniref90(PathBuf::from("/db/uniref90.fasta"))
            .mgnify(PathBuf::from("/db/mgnify.fa"))
            .bfd(Some(PathBuf::from("/db/bfd")))
            .uniref30(Some(PathBuf::from("/db/uniref30")))
    }

    #[test]
    fn build_applies_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.search.uniref_max_hits, 10_000);
        assert_eq!(config.search.mgnify_max_hits, 501);
        assert_eq!(config.search.uniprot_max_hits, 50_000);
        assert_eq!(config.search.skip_search, None);
        assert_eq!(config.model.preset, ModelPreset::Monomer);
        assert_eq!(config.model.model_names.len(), 5);
        assert!(config.model.run_relax);
        assert_eq!(
            config.search.max_template_date,
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
        );
    }

    #[test]
    fn build_fails_without_required_parameters() {
        let result = RunConfigBuilder::new().build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("project"));

        let result = minimal().bfd(None).build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("databases.bfd"));

        let result = minimal().use_small_bfd(true).build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingParameter("databases.small_bfd")
        );
    }

    #[test]
    fn template_search_needs_its_structure_directory() {
        let result = minimal()
            .pdb_seqres(Some(PathBuf::from("/db/pdb_seqres.txt")))
            .build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingParameter("databases.pdb_mmcif")
        );

        let config = minimal()
            .pdb_seqres(Some(PathBuf::from("/db/pdb_seqres.txt")))
            .pdb_mmcif(Some(PathBuf::from("/db/mmcif")))
            .build()
            .unwrap();
        assert_eq!(
            config.search.databases.pdb_mmcif,
            Some(PathBuf::from("/db/mmcif"))
        );
    }

    #[test]
    fn small_bfd_does_not_need_full_bfd() {
        let config = minimal()
            .bfd(None)
            .uniref30(None)
            .use_small_bfd(true)
            .small_bfd(Some(PathBuf::from("/db/small_bfd.fasta")))
            .build()
            .unwrap();
        assert!(config.search.use_small_bfd);
    }

    #[test]
    fn build_rejects_invalid_values() {
        assert!(matches!(
            minimal().max_template_date("01/02/2022").build(),
            Err(ConfigError::InvalidValue {
                parameter: "search.max_template_date",
                ..
            })
        ));
        assert!(matches!(
            minimal().parallelism(0).build(),
            Err(ConfigError::InvalidValue {
                parameter: "parallelism",
                ..
            })
        ));
        assert!(matches!(
            minimal().project("a/../b").build(),
            Err(ConfigError::InvalidValue {
                parameter: "project",
                ..
            })
        ));
    }

    #[test]
    fn model_names_must_match_preset() {
        let result = minimal()
            .preset(ModelPreset::Multimer)
            .model_names(vec!["model_1".into()])
            .build();
        assert!(matches!(result, Err(ConfigError::Contradictory(_))));

        let config = minimal().preset(ModelPreset::Multimer).build().unwrap();
        assert_eq!(config.model.model_names[0], "model_1_multimer_v3");
    }

    #[test]
    fn repetitions_only_apply_to_multimer() {
        let monomer = minimal().predictions_per_model(5).build().unwrap();
        assert_eq!(monomer.model.repetitions(), 1);
        let multimer = minimal()
            .preset(ModelPreset::Multimer)
            .predictions_per_model(5)
            .build()
            .unwrap();
        assert_eq!(multimer.model.repetitions(), 5);
    }

    #[test]
    fn presets_parse_and_report_ensembles() {
        assert_eq!("monomer_casp14".parse::<ModelPreset>().unwrap().num_ensemble(), 8);
        assert_eq!("multimer".parse::<ModelPreset>().unwrap().num_ensemble(), 1);
        assert!("dimer".parse::<ModelPreset>().is_err());
    }
}

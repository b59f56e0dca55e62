use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use multifold::core::store::StorageUri;
use multifold::engine::config as core_config;
use std::path::PathBuf;
use std::str::FromStr;

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let search = file_config.search.take().unwrap_or_default();
    let databases = file_config.databases.take().unwrap_or_default();
    let model = file_config.model.take().unwrap_or_default();

    let project = args
        .project
        .clone()
        .or(file_config.project)
        .unwrap_or(defaults.project);
    let store: StorageUri = args
        .store
        .as_deref()
        .or(file_config.store.as_deref())
        .unwrap_or(&defaults.store)
        .parse()?;
    let work_dir = file_config
        .work_dir
        .unwrap_or_else(|| PathBuf::from(&defaults.work_dir));

    let use_small_bfd = match (args.bfd.small_bfd, args.bfd.full_bfd) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => search.use_small_bfd,
    };
    let skip_search = if args.skip_search {
        Some(true)
    } else {
        search.skip_search
    };
    let run_relax = !args.no_relax && model.run_relax.unwrap_or(true);

    let mut builder = core_config::RunConfigBuilder::new()
        .project(project)
        .work_dir(work_dir)
        .skip_search(skip_search)
        .bfd(databases.bfd)
        .small_bfd(databases.small_bfd)
        .uniref30(databases.uniref30)
        .uniprot(databases.uniprot)
        .pdb_seqres(databases.pdb_seqres)
        .pdb_mmcif(databases.pdb_mmcif)
        .random_seed(args.seed.or(model.random_seed))
        .run_relax(run_relax);

    if let Some(n) = args.parallelism.or(file_config.parallelism) {
        builder = builder.parallelism(n);
    }
    if let Some(enabled) = use_small_bfd {
        builder = builder.use_small_bfd(enabled);
    }
    if let Some(date) = search.max_template_date {
        builder = builder.max_template_date(date);
    }
    if let Some(n) = search.uniref_max_hits {
        builder = builder.uniref_max_hits(n);
    }
    if let Some(n) = search.mgnify_max_hits {
        builder = builder.mgnify_max_hits(n);
    }
    if let Some(n) = search.uniprot_max_hits {
        builder = builder.uniprot_max_hits(n);
    }
    if let Some(n) = search.n_cpu {
        builder = builder.n_cpu(n);
    }
    if let Some(path) = databases.uniref90 {
        builder = builder.uniref90(path);
    }
    if let Some(path) = databases.mgnify {
        builder = builder.mgnify(path);
    }
    if let Some(preset) = model.preset {
        let preset = preset
            .parse::<core_config::ModelPreset>()
            .map_err(|e| CliError::Config(e.to_string()))?;
        builder = builder.preset(preset);
    }
    if let Some(names) = model.model_names {
        builder = builder.model_names(names);
    }
    if let Some(n) = model.predictions_per_model {
        builder = builder.predictions_per_model(n);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        input_path: args.input.clone(),
        store,
        core_config,
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "project" => config.project = Some(value_str.to_string()),
            "store" => config.store = Some(value_str.to_string()),
            "work-dir" => config.work_dir = Some(PathBuf::from(value_str)),
            "parallelism" => config.parallelism = Some(parse_value(key, value_str)?),
            "search.use-small-bfd" => {
                config.search.get_or_insert_with(Default::default).use_small_bfd =
                    Some(parse_value(key, value_str)?);
            }
            "search.max-template-date" => {
                config
                    .search
                    .get_or_insert_with(Default::default)
                    .max_template_date = Some(value_str.to_string());
            }
            "search.uniref-max-hits" => {
                config
                    .search
                    .get_or_insert_with(Default::default)
                    .uniref_max_hits = Some(parse_value(key, value_str)?);
            }
            "search.mgnify-max-hits" => {
                config
                    .search
                    .get_or_insert_with(Default::default)
                    .mgnify_max_hits = Some(parse_value(key, value_str)?);
            }
            "search.uniprot-max-hits" => {
                config
                    .search
                    .get_or_insert_with(Default::default)
                    .uniprot_max_hits = Some(parse_value(key, value_str)?);
            }
            "search.skip-search" => {
                config.search.get_or_insert_with(Default::default).skip_search =
                    Some(parse_value(key, value_str)?);
            }
            "search.n-cpu" => {
                config.search.get_or_insert_with(Default::default).n_cpu =
                    Some(parse_value(key, value_str)?);
            }
            "model.preset" => {
                config.model.get_or_insert_with(Default::default).preset =
                    Some(value_str.to_string());
            }
            "model.model-names" => {
                config.model.get_or_insert_with(Default::default).model_names = Some(
                    value_str
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "model.predictions-per-model" => {
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .predictions_per_model = Some(parse_value(key, value_str)?);
            }
            "model.random-seed" => {
                config.model.get_or_insert_with(Default::default).random_seed =
                    Some(parse_value(key, value_str)?);
            }
            "model.run-relax" => {
                config.model.get_or_insert_with(Default::default).run_relax =
                    Some(parse_value(key, value_str)?);
            }
            _ => {
                let Some(database) = key.strip_prefix("databases.") else {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                };
                let databases = config.databases.get_or_insert_with(Default::default);
                let path = Some(PathBuf::from(value_str));
                match database {
                    "uniref90" => databases.uniref90 = path,
                    "mgnify" => databases.mgnify = path,
                    "bfd" => databases.bfd = path,
                    "small-bfd" => databases.small_bfd = path,
                    "uniref30" => databases.uniref30 = path,
                    "uniprot" => databases.uniprot = path,
                    "pdb-seqres" => databases.pdb_seqres = path,
                    "pdb-mmcif" => databases.pdb_mmcif = path,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Unknown database for --set: '{}'",
                            database
                        )));
                    }
                }
            }
        }
    }
    Ok(config)
}

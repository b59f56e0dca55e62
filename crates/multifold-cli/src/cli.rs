use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "multifold CLI - Cached, deduplicated feature generation for multimeric structure prediction.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for the global thread pool.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute (or reuse) per-chain and complex features and write a run descriptor.
    Features(FeaturesArgs),
    /// Show how a run would be resolved against the store without doing any work.
    Plan(PlanArgs),
}

/// Arguments shared by every command that resolves a run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the multi-record FASTA input.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Artifact store location (a directory or file:// URI).
    #[arg(long, value_name = "URI")]
    pub store: Option<String>,

    /// Override the artifact namespace of the run.
    #[arg(long, value_name = "NAME")]
    pub project: Option<String>,

    // --- Scheduling Overrides ---
    /// Maximum number of chains processed at once.
    #[arg(short = 'P', long, value_name = "INT")]
    pub parallelism: Option<usize>,

    // --- Search Overrides ---
    /// Skip the paired (cross-chain) search and key artifacts on the toggle.
    #[arg(long)]
    pub skip_search: bool,

    /// Override `search.use-small-bfd` from the config file.
    #[command(flatten)]
    pub bfd: BfdChoice,

    // --- Model Overrides ---
    /// Base seed of the model-runner grid.
    #[arg(long, value_name = "INT")]
    pub seed: Option<i64>,

    /// Disable relaxation in the model-runner grid. Feature generation never relaxes, so
    /// this only changes the grid `plan` prints.
    #[arg(long)]
    pub no_relax: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S search.mgnify-max-hits=300
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive flags selecting the BFD search.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct BfdChoice {
    /// Search the reduced BFD with jackhmmer.
    #[arg(long)]
    pub small_bfd: bool,
    /// Search the full BFD and uniref30 with hhblits.
    #[arg(long)]
    pub full_bfd: bool,
}

/// Arguments for the `features` subcommand.
#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Write the run descriptor JSON to this path instead of standard output.
    #[arg(long, value_name = "PATH")]
    pub descriptor: Option<PathBuf>,
}

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

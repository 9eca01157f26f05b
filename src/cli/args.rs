use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use crate::brick::OnConflict;
use crate::constants::verbosity;

const HELP_TEMPLATE: &str = r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#;

/// CLI arguments for Mason.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, help_template = HELP_TEMPLATE)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Brick cache directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate files from a brick.
    Make(MakeArgs),
    /// Manage the brick cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Bundle a brick into a single file.
    Bundle(BundleArgs),
}

#[derive(Parser, Debug)]
pub struct MakeArgs {
    /// Brick to generate from: a directory, a git URL, or a registry name
    /// (optionally `name@constraint`).
    #[arg(value_name = "BRICK")]
    pub brick: String,

    /// Destination directory for generated files.
    #[arg(short, long, value_name = "OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Variables as a JSON object, or `-` to read JSON from stdin.
    #[arg(long, value_name = "JSON")]
    pub vars: Option<String>,

    /// Individual variable assignments (`--var name=Dash`), applied over
    /// `--vars`.
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub var: Vec<String>,

    /// What to do when a generated file already exists.
    #[arg(long, value_name = "STRATEGY", default_value = "prompt")]
    pub on_conflict: OnConflict,

    /// Git ref to fetch when the brick is a git URL.
    #[arg(long, value_name = "REF")]
    pub git_ref: Option<String>,

    /// Path to the brick within the git repository.
    #[arg(long, value_name = "PATH")]
    pub git_path: Option<String>,

    /// Fail instead of fetching over the network.
    #[arg(long)]
    pub offline: bool,

    /// Kill a hook that runs longer than this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub hook_timeout: Option<u64>,

    /// Report what would be generated without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Remove every cached brick.
    Clear,
}

#[derive(Parser, Debug)]
pub struct BundleArgs {
    /// Brick directory to bundle.
    #[arg(value_name = "BRICK_DIR")]
    pub brick_dir: PathBuf,

    /// Bundle format.
    #[arg(short = 't', long = "type", value_name = "FORMAT", default_value = "universal")]
    pub format: BundleFormat,

    /// Output file. Defaults to `<name>.bundle` or `<name>_bundle.rs`.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum BundleFormat {
    Universal,
    Source,
}

/// Parse command line arguments.
pub fn get_args() -> Args {
    Args::parse()
}

/// Map `-v` counts to the appropriate log level.
pub fn get_log_level_from_verbose(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        verbosity::OFF => LevelFilter::Error,
        verbosity::INFO => LevelFilter::Info,
        verbosity::DEBUG => LevelFilter::Debug,
        verbosity::TRACE.. => LevelFilter::Trace,
    }
}

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dialoguer::Select;
use serde_json::{Map, Value};

use crate::brick::{BrickRef, ConflictChoice, FileConflictResolver};
use crate::cli::args::{Args, BundleArgs, BundleFormat, CacheCommands, Commands, MakeArgs};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::logging::StdLogger;
use crate::process::SystemProcessRunner;
use crate::resolver::{cache, git, BrickResolver};

/// STDIN indicator for the `--vars` argument.
const STDIN_INDICATOR: &str = "-";

/// Main entry point for CLI execution.
pub fn run(args: Args) -> Result<()> {
    let cache_root = resolve_cache_root(args.cache_root);
    match args.command {
        Commands::Make(make) => run_make(make, cache_root),
        Commands::Cache { command: CacheCommands::Clear } => {
            cache::clear(&cache_root)?;
            println!("Cache cleared.");
            Ok(())
        }
        Commands::Bundle(bundle) => run_bundle(bundle),
    }
}

fn run_make(args: MakeArgs, cache_root: PathBuf) -> Result<()> {
    let mut config = GeneratorConfig::new(cache_root)
        .with_on_conflict(args.on_conflict)
        .with_network(!args.offline);
    if let Some(secs) = args.hook_timeout {
        config = config.with_hook_timeout(Duration::from_secs(secs));
    }

    let brick_ref = parse_brick_ref(&args.brick, args.git_ref, args.git_path);
    let vars = collect_vars(args.vars.as_deref(), &args.var)?;

    let logger = StdLogger;
    let process = SystemProcessRunner;
    let resolver = BrickResolver::new(&config, &process, None, &logger);
    let resolved = resolver.resolve(&brick_ref)?;

    let prompt_resolver = PromptConflictResolver;
    let generator = Generator::new(&config, &logger, &process)
        .with_conflict_resolver(&prompt_resolver)
        .with_dry_run(args.dry_run);
    let report = generator.generate(&resolved.brick, &args.output_dir, vars)?;

    for file in &report.files {
        println!("  {} {}", file.disposition, file.rel_path);
    }
    println!(
        "{}Generated {} file(s) from '{}'.",
        if args.dry_run { "[DRY RUN] " } else { "" },
        report.written().count(),
        resolved.brick.name(),
    );
    Ok(())
}

fn run_bundle(args: BundleArgs) -> Result<()> {
    let brick = crate::loader::load_from_dir(&args.brick_dir)?;
    match args.format {
        BundleFormat::Universal => {
            let bytes = crate::bundle::encode_universal(&brick)?;
            let output = args
                .output
                .unwrap_or_else(|| PathBuf::from(format!("{}.bundle", brick.name())));
            fs::write(&output, bytes)?;
            println!("Bundled '{}' to '{}'.", brick.name(), output.display());
        }
        BundleFormat::Source => {
            let text = crate::bundle::encode_source(&brick)?;
            let output = args
                .output
                .unwrap_or_else(|| PathBuf::from(format!("{}_bundle.rs", brick.name())));
            fs::write(&output, text)?;
            println!("Bundled '{}' to '{}'.", brick.name(), output.display());
        }
    }
    Ok(())
}

/// The cache root: `--cache-root`, else `$HOME/.mason-cache`, else a
/// `.mason-cache` directory next to the working directory.
fn resolve_cache_root(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".mason-cache"),
        None => PathBuf::from(".mason-cache"),
    })
}

/// Classifies the brick argument: git URL, existing directory, or registry
/// coordinates (`name` or `name@constraint`).
fn parse_brick_ref(
    brick: &str,
    git_ref: Option<String>,
    git_path: Option<String>,
) -> BrickRef {
    if git::is_git_url(brick) {
        return BrickRef::Git {
            url: brick.to_string(),
            reference: git_ref,
            sub_path: git_path,
        };
    }
    let path = Path::new(brick);
    if path.exists() {
        return BrickRef::Path { dir: path.to_path_buf() };
    }
    match brick.split_once('@') {
        Some((name, constraint)) => BrickRef::Registry {
            name: name.to_string(),
            version_constraint: constraint.to_string(),
        },
        None => BrickRef::Registry {
            name: brick.to_string(),
            version_constraint: "*".to_string(),
        },
    }
}

/// Merges `--vars` (JSON object or stdin) with repeated `--var name=value`
/// assignments; the individual assignments win.
fn collect_vars(vars: Option<&str>, assignments: &[String]) -> Result<Map<String, Value>> {
    let mut merged = match vars {
        Some(STDIN_INDICATOR) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            parse_vars_object(&buf)?
        }
        Some(json) => parse_vars_object(json)?,
        None => Map::new(),
    };

    for assignment in assignments {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            Error::Other(anyhow::anyhow!(
                "invalid --var '{assignment}': expected NAME=VALUE"
            ))
        })?;
        // Values that parse as JSON keep their type; everything else is a
        // string.
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        merged.insert(name.to_string(), value);
    }
    Ok(merged)
}

fn parse_vars_object(json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Other(anyhow::anyhow!("--vars must be a JSON object"))),
    }
}

/// Conflict resolver that asks the user per conflicting file.
struct PromptConflictResolver;

impl FileConflictResolver for PromptConflictResolver {
    fn resolve(&self, path: &Path, _existing: &[u8], _incoming: &[u8]) -> ConflictChoice {
        let selection = Select::new()
            .with_prompt(format!("Conflict at '{}'", path.display()))
            .items(&["overwrite", "skip", "append"])
            .default(1)
            .interact();
        match selection {
            Ok(0) => ConflictChoice::Overwrite,
            Ok(2) => ConflictChoice::Append,
            // Selection errors (no terminal) fall back to keeping the file.
            _ => ConflictChoice::Skip,
        }
    }
}

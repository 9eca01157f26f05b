//! The brick data model.
//!
//! A brick is an immutable template package: metadata, a tree of template
//! files, and optional generation hooks. Bricks are created by the loader,
//! cached by the resolver, and consumed read-only by the generator.

pub mod metadata;

pub use metadata::{BrickYaml, VariableDef, VariableType};

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// A single file in the brick's template tree. `rel_path` is relative to the
/// template root and uses forward slashes; both the path and the bytes may
/// contain template tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

/// A hook script or dependency manifest, relative to the brick's `hooks/`
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFile {
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

/// The hooks a brick ships. Hooks appear exactly where the loader found them
/// and run in the order pre_gen -> generate -> post_gen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    pub pre_gen: Option<HookFile>,
    pub post_gen: Option<HookFile>,
    /// Raw dependency manifest bytes, when the brick ships one.
    pub manifest: Option<HookFile>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.pre_gen.is_none() && self.post_gen.is_none()
    }
}

/// An immutable, fully-loaded brick.
#[derive(Debug, Clone, PartialEq)]
pub struct Brick {
    pub metadata: BrickYaml,
    /// Template files in lexicographic `rel_path` order.
    pub template_files: Vec<TemplateFile>,
    pub hooks: Hooks,
}

impl Brick {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// The key a brick is resolved by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrickRef {
    /// A brick directory on the local filesystem.
    Path { dir: PathBuf },
    /// A brick inside a git repository.
    Git { url: String, reference: Option<String>, sub_path: Option<String> },
    /// A brick published to a registry.
    Registry { name: String, version_constraint: String },
}

impl std::fmt::Display for BrickRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrickRef::Path { dir } => write!(f, "path: '{}'", dir.display()),
            BrickRef::Git { url, reference, sub_path } => {
                write!(f, "git: '{url}'")?;
                if let Some(reference) = reference {
                    write!(f, "#{reference}")?;
                }
                if let Some(sub_path) = sub_path {
                    write!(f, " ({sub_path})")?;
                }
                Ok(())
            }
            BrickRef::Registry { name, version_constraint } => {
                write!(f, "registry: '{name}@{version_constraint}'")
            }
        }
    }
}

/// A brick materialized into the cache.
///
/// Two resolved bricks with equal `content_hash` have byte-equal template
/// files and hook bytes. Path and git bricks carry their tree hash;
/// registry bricks carry their `<name>_<version>` cache key, relying on
/// published versions being immutable.
#[derive(Debug, Clone)]
pub struct ResolvedBrick {
    pub brick_ref: BrickRef,
    pub cache_dir: PathBuf,
    pub brick: Brick,
    pub content_hash: String,
}

/// What happened to a single destination file during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    Created,
    Overwritten,
    Appended,
    Skipped,
    Identical,
}

impl std::fmt::Display for FileDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileDisposition::Created => "created",
            FileDisposition::Overwritten => "overwritten",
            FileDisposition::Appended => "appended",
            FileDisposition::Skipped => "skipped",
            FileDisposition::Identical => "identical",
        };
        write!(f, "{s}")
    }
}

/// A single emitted (or deliberately not emitted) file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Absolute destination path.
    pub path: PathBuf,
    /// Destination relative to the target directory, forward slashes.
    pub rel_path: String,
    pub disposition: FileDisposition,
    /// The bytes now at the destination (post-append for appends).
    pub bytes: Vec<u8>,
}

/// Collision strategy applied when a rendered file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Ask the configured conflict resolver per file.
    Prompt,
    Overwrite,
    Skip,
    Append,
}

impl std::str::FromStr for OnConflict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(OnConflict::Prompt),
            "overwrite" => Ok(OnConflict::Overwrite),
            "skip" => Ok(OnConflict::Skip),
            "append" => Ok(OnConflict::Append),
            other => Err(format!(
                "unknown conflict strategy '{other}' (expected prompt, overwrite, skip or append)"
            )),
        }
    }
}

impl std::fmt::Display for OnConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OnConflict::Prompt => "prompt",
            OnConflict::Overwrite => "overwrite",
            OnConflict::Skip => "skip",
            OnConflict::Append => "append",
        };
        write!(f, "{s}")
    }
}

/// What a conflict resolver may decide for a single conflicting file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Overwrite,
    Skip,
    Append,
}

/// Per-file capability invoked under [`OnConflict::Prompt`]. Decisions are
/// cached per destination within a single generate call.
pub trait FileConflictResolver {
    fn resolve(&self, path: &Path, existing: &[u8], incoming: &[u8]) -> ConflictChoice;
}

impl<F> FileConflictResolver for F
where
    F: Fn(&Path, &[u8], &[u8]) -> ConflictChoice,
{
    fn resolve(&self, path: &Path, existing: &[u8], incoming: &[u8]) -> ConflictChoice {
        self(path, existing, incoming)
    }
}

fn brick_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid brick name regex"))
}

/// Validates a brick name against `^[a-z][a-z0-9_]*$`.
pub fn validate_brick_name(name: &str) -> Result<()> {
    if brick_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidBrickName { name: name.to_string() })
    }
}

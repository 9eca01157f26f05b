//! Per-file collision resolution and writes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::brick::{ConflictChoice, FileConflictResolver, FileDisposition, OnConflict};
use crate::error::{Error, Result};
use crate::logging::Logger;

/// Decides what to do at one destination, caching prompt decisions per path
/// within a single generate call.
pub(crate) struct CollisionResolver<'a> {
    on_conflict: OnConflict,
    file_resolver: Option<&'a dyn FileConflictResolver>,
    logger: &'a dyn Logger,
    decisions: HashMap<PathBuf, ConflictChoice>,
}

impl<'a> CollisionResolver<'a> {
    pub fn new(
        on_conflict: OnConflict,
        file_resolver: Option<&'a dyn FileConflictResolver>,
        logger: &'a dyn Logger,
    ) -> Self {
        Self { on_conflict, file_resolver, logger, decisions: HashMap::new() }
    }

    /// The choice for a destination whose existing bytes differ from the
    /// incoming ones.
    pub fn decide(
        &mut self,
        path: &Path,
        existing: &[u8],
        incoming: &[u8],
    ) -> ConflictChoice {
        match self.on_conflict {
            OnConflict::Overwrite => ConflictChoice::Overwrite,
            OnConflict::Skip => ConflictChoice::Skip,
            OnConflict::Append => ConflictChoice::Append,
            OnConflict::Prompt => {
                if let Some(cached) = self.decisions.get(path) {
                    return *cached;
                }
                let choice = match self.file_resolver {
                    Some(resolver) => resolver.resolve(path, existing, incoming),
                    None => {
                        self.logger.warn(&format!(
                            "Conflict at '{}' with no resolver configured; skipping",
                            path.display()
                        ));
                        ConflictChoice::Skip
                    }
                };
                self.decisions.insert(path.to_path_buf(), choice);
                choice
            }
        }
    }
}

/// The planned outcome for one destination file.
#[derive(Debug)]
pub(crate) struct FileOutcome {
    pub disposition: FileDisposition,
    /// Bytes that end up at the destination.
    pub bytes: Vec<u8>,
    /// Whether anything must be written.
    pub write: bool,
}

/// Plans the outcome for a destination given its current state, without
/// touching the filesystem.
pub(crate) fn plan_outcome(
    resolver: &mut CollisionResolver<'_>,
    path: &Path,
    existing: Option<&[u8]>,
    incoming: Vec<u8>,
) -> FileOutcome {
    match existing {
        None => FileOutcome {
            disposition: FileDisposition::Created,
            bytes: incoming,
            write: true,
        },
        Some(existing) if existing == incoming.as_slice() => FileOutcome {
            disposition: FileDisposition::Identical,
            bytes: incoming,
            write: false,
        },
        Some(existing) => match resolver.decide(path, existing, &incoming) {
            ConflictChoice::Overwrite => FileOutcome {
                disposition: FileDisposition::Overwritten,
                bytes: incoming,
                write: true,
            },
            ConflictChoice::Append => {
                let mut bytes = existing.to_vec();
                bytes.extend_from_slice(&incoming);
                FileOutcome { disposition: FileDisposition::Appended, bytes, write: true }
            }
            ConflictChoice::Skip => FileOutcome {
                disposition: FileDisposition::Skipped,
                bytes: existing.to_vec(),
                write: false,
            },
        },
    }
}

/// Writes `bytes` to `path`, creating parent directories as needed.
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::FileWriteFailure {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| Error::FileWriteFailure {
        path: path.to_path_buf(),
        source,
    })
}

//! Fetches bricks from git repositories through the process runner.

use std::collections::HashMap;
use std::path::Path;

use tempfile::TempDir;
use url::Url;

use crate::error::{Error, Result};
use crate::process::ProcessRunner;

/// Determines if a string names a git repository rather than a local path.
///
/// Supports HTTPS/HTTP, `git://`, `ssh://` and scp-style `git@host:path`
/// forms.
pub fn is_git_url(s: &str) -> bool {
    if let Ok(url) = Url::parse(s) {
        return matches!(url.scheme(), "http" | "https" | "git" | "ssh");
    }

    // scp-style: user@host:path with a hostname-looking middle segment
    if s.contains('@') && s.contains(':') && !s.contains("://") {
        if let (Some(at_pos), Some(colon_pos)) = (s.find('@'), s.rfind(':')) {
            if colon_pos > at_pos {
                let user_part = &s[..at_pos];
                let host_part = &s[at_pos + 1..colon_pos];
                let path_part = &s[colon_pos + 1..];
                return !user_part.is_empty()
                    && !host_part.is_empty()
                    && !path_part.is_empty()
                    && host_part.contains('.')
                    && path_part.contains('/');
            }
        }
    }

    false
}

/// Clones `url` at `reference` (remote HEAD when `None`) into a fresh temp
/// directory.
///
/// The clone is shallow when the reference is a branch or tag; commit-hash
/// references fall back to a full clone plus checkout. Failures surface the
/// subprocess stderr verbatim.
pub fn fetch(
    url: &str,
    reference: Option<&str>,
    runner: &dyn ProcessRunner,
) -> Result<TempDir> {
    let temp = TempDir::new()?;
    let dest = temp.path().join("repo");
    let dest_str = dest.to_string_lossy().into_owned();
    let env = HashMap::new();
    let cwd = Path::new(".");

    let fetch_err = |stderr: String| Error::GitFetchFailure {
        url: url.to_string(),
        reference: reference.unwrap_or("HEAD").to_string(),
        stderr,
    };

    match reference {
        None => {
            let output = runner.run(
                "git",
                &["clone", "--depth", "1", url, &dest_str],
                cwd,
                &env,
            )?;
            if !output.success() {
                return Err(fetch_err(output.stderr));
            }
        }
        Some(reference) => {
            let shallow = runner.run(
                "git",
                &["clone", "--depth", "1", "--branch", reference, url, &dest_str],
                cwd,
                &env,
            )?;
            if !shallow.success() {
                log::debug!(
                    "Shallow clone of '{url}' at '{reference}' failed, retrying with full clone"
                );
                let full = runner.run("git", &["clone", url, &dest_str], cwd, &env)?;
                if !full.success() {
                    return Err(fetch_err(full.stderr));
                }
                let checkout =
                    runner.run("git", &["checkout", reference], &dest, &env)?;
                if !checkout.success() {
                    return Err(fetch_err(checkout.stderr));
                }
            }
        }
    }

    Ok(temp)
}

/// The directory a fetched clone lives in, within its temp dir.
pub fn clone_dir(temp: &TempDir) -> std::path::PathBuf {
    temp.path().join("repo")
}

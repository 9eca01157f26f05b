//! Content-addressed brick cache.
//!
//! Materialized bricks live under `<cache_root>/bricks/<key>`. Writers stage
//! into a temp sibling directory and rename on success, so a key is either
//! fully materialized or absent. Mutual exclusion per key is an advisory
//! file lock on `<cache_root>/<key>.lock`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::constants::{CACHE_BRICKS_DIR, CACHE_KEY_LEN};
use crate::error::{Error, Result};

/// Hashes a directory tree into a cache key.
///
/// Files are visited in sorted relative-path order; each entry feeds its
/// relative path, a zero byte, then its contents into the digest. `.git`
/// directories are skipped. The result is the hex digest truncated to
/// [`CACHE_KEY_LEN`] characters.
pub fn hash_tree(dir: &Path) -> Result<String> {
    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .expect("walked entries live under the hashed root");
        if rel.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }
        entries.push((rel.to_string_lossy().replace('\\', "/"), entry.path().to_path_buf()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel_path, path) in &entries {
        hasher.update(rel_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(path)?);
    }
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(CACHE_KEY_LEN);
    Ok(hex)
}

/// Guard holding the advisory lock for one cache key. Releases on drop.
pub struct CacheLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl CacheLock {
    /// Acquires the lock for `key`, blocking until the current holder (if
    /// any) finishes. Readers that acquire after a writer observe the fully
    /// written cache directory.
    pub fn acquire(cache_root: &Path, key: &str) -> Result<Self> {
        fs::create_dir_all(cache_root)?;
        let path = cache_root.join(format!("{key}.lock"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = file.as_raw_fd();
            // SAFETY: `fd` is a valid descriptor owned by `file`; LOCK_EX
            // blocks until the lock is granted.
            let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if ret != 0 {
                return Err(Error::CacheWriteFailure {
                    path: path.display().to_string(),
                    source: std::io::Error::last_os_error(),
                });
            }
        }

        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor is still owned by `self.file`; LOCK_UN
            // releases the advisory lock. Failure is benign since the lock
            // is also released when the fd closes.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}

/// Materializes a cache entry under `key`, staging through a temp sibling.
///
/// `stage` fills a fresh temp directory; on success the temp directory is
/// renamed to the final key. Already-materialized keys are returned as-is
/// (writes to the same key are idempotent). Transient staging failures are
/// retried once.
pub fn materialize<F>(cache_root: &Path, key: &str, stage: F) -> Result<PathBuf>
where
    F: Fn(&Path) -> Result<()>,
{
    let bricks_dir = cache_root.join(CACHE_BRICKS_DIR);
    fs::create_dir_all(&bricks_dir).map_err(|source| Error::CacheWriteFailure {
        path: bricks_dir.display().to_string(),
        source,
    })?;

    let _lock = CacheLock::acquire(cache_root, key)?;

    let final_dir = bricks_dir.join(key);
    if final_dir.exists() {
        log::debug!("Cache hit for key '{key}'");
        return Ok(final_dir);
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_stage(&bricks_dir, &final_dir, &stage) {
            Ok(()) => return Ok(final_dir),
            Err(Error::Io(source)) if attempt == 1 => {
                log::warn!("Cache staging for '{key}' failed, retrying once: {source}");
            }
            Err(Error::Io(source)) => {
                return Err(Error::CacheWriteFailure {
                    path: final_dir.display().to_string(),
                    source,
                });
            }
            Err(other) => return Err(other),
        }
    }
}

fn try_stage<F>(bricks_dir: &Path, final_dir: &Path, stage: &F) -> Result<()>
where
    F: Fn(&Path) -> Result<()>,
{
    let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(bricks_dir)?;
    stage(staging.path())?;
    // Rename keeps the final key all-or-nothing; the temp sibling is cleaned
    // up by its guard on failure.
    fs::rename(staging.keep(), final_dir)?;
    Ok(())
}

/// Recursively copies a brick directory, skipping `.git`.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walked entries live under the copied root");
        if rel.as_os_str().is_empty()
            || rel.components().any(|c| c.as_os_str() == ".git")
        {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Removes every materialized brick. The only garbage collection the cache
/// gets.
pub fn clear(cache_root: &Path) -> Result<()> {
    let bricks_dir = cache_root.join(CACHE_BRICKS_DIR);
    if bricks_dir.exists() {
        fs::remove_dir_all(&bricks_dir).map_err(|source| Error::CacheWriteFailure {
            path: bricks_dir.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

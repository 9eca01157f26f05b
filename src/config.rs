//! Configuration recognized by the generator core.
//!
//! The configuration is always passed in as a value and never read from the
//! environment, so tests can swap the cache root per case.

use std::path::PathBuf;
use std::time::Duration;

use crate::brick::OnConflict;

/// Configuration for a generator instance.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root directory of the brick cache. Materialized bricks live under
    /// `<cache_root>/bricks/<key>`.
    pub cache_root: PathBuf,
    /// What to do when a rendered file collides with an existing one.
    pub on_conflict: OnConflict,
    /// Upper bound on a single hook's wall-clock run. `None` means no limit.
    pub hook_timeout: Option<Duration>,
    /// When false, git and registry refs fail fast instead of fetching.
    pub allow_network: bool,
}

impl GeneratorConfig {
    /// Creates a configuration with the given cache root and defaults for
    /// everything else: prompt on conflict, no hook timeout, network allowed.
    pub fn new<P: Into<PathBuf>>(cache_root: P) -> Self {
        Self {
            cache_root: cache_root.into(),
            on_conflict: OnConflict::Prompt,
            hook_timeout: None,
            allow_network: true,
        }
    }

    pub fn with_on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = Some(timeout);
        self
    }

    pub fn with_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }

    /// Directory holding materialized bricks.
    pub fn bricks_dir(&self) -> PathBuf {
        self.cache_root.join(crate::constants::CACHE_BRICKS_DIR)
    }
}

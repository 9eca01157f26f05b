//! Resolves brick references into cached, loaded bricks.
//!
//! A [`BrickRef`] names a brick by path, git reference or registry
//! coordinates; resolution materializes it into the content-addressed cache
//! and loads it. Re-resolving an unchanged ref is a cache hit.

pub mod cache;
pub mod git;
pub mod registry;

pub use registry::RegistryClient;

use std::path::Path;

use crate::brick::{BrickRef, ResolvedBrick};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::loader;
use crate::logging::Logger;
use crate::process::ProcessRunner;

/// Resolves and caches bricks.
pub struct BrickResolver<'a> {
    config: &'a GeneratorConfig,
    process: &'a dyn ProcessRunner,
    registry: Option<&'a dyn RegistryClient>,
    logger: &'a dyn Logger,
}

impl<'a> BrickResolver<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        process: &'a dyn ProcessRunner,
        registry: Option<&'a dyn RegistryClient>,
        logger: &'a dyn Logger,
    ) -> Self {
        Self { config, process, registry, logger }
    }

    /// Resolves `brick_ref` to a materialized, loaded brick.
    pub fn resolve(&self, brick_ref: &BrickRef) -> Result<ResolvedBrick> {
        match brick_ref {
            BrickRef::Path { dir } => self.resolve_path(brick_ref, dir),
            BrickRef::Git { url, reference, sub_path } => {
                self.resolve_git(brick_ref, url, reference.as_deref(), sub_path.as_deref())
            }
            BrickRef::Registry { name, version_constraint } => {
                self.resolve_registry(brick_ref, name, version_constraint)
            }
        }
    }

    /// Hashes a local brick directory and hardlinks-or-copies it into the
    /// cache. Re-resolution with an unchanged tree is a no-op.
    fn resolve_path(&self, brick_ref: &BrickRef, dir: &Path) -> Result<ResolvedBrick> {
        let content_hash = cache::hash_tree(dir)?;
        self.logger.detail(&format!("Resolved {brick_ref} to {content_hash}"));

        let cache_dir =
            cache::materialize(&self.config.cache_root, &content_hash, |staging| {
                cache::copy_dir(dir, staging)
            })?;

        let brick = loader::load_from_dir(&cache_dir)?;
        Ok(ResolvedBrick {
            brick_ref: brick_ref.clone(),
            cache_dir,
            brick,
            content_hash,
        })
    }

    /// Shallow-clones the repository, descends to the brick sub-path, then
    /// caches like a path brick.
    fn resolve_git(
        &self,
        brick_ref: &BrickRef,
        url: &str,
        reference: Option<&str>,
        sub_path: Option<&str>,
    ) -> Result<ResolvedBrick> {
        if !self.config.allow_network {
            return Err(Error::NetworkDisabled);
        }

        let mut progress = self.logger.progress(&format!("Fetching {brick_ref}"));
        let temp = git::fetch(url, reference, self.process)?;
        progress.done("fetched");

        let mut brick_dir = git::clone_dir(&temp);
        if let Some(sub_path) = sub_path {
            brick_dir = brick_dir.join(sub_path);
        }

        let content_hash = cache::hash_tree(&brick_dir)?;
        let cache_dir =
            cache::materialize(&self.config.cache_root, &content_hash, |staging| {
                cache::copy_dir(&brick_dir, staging)
            })?;

        let brick = loader::load_from_dir(&cache_dir)?;
        Ok(ResolvedBrick {
            brick_ref: brick_ref.clone(),
            cache_dir,
            brick,
            content_hash,
        })
    }

    /// Resolves the version constraint against the registry index, then
    /// downloads and unpacks the bundle under `<name>_<version>`. A key that
    /// is already materialized skips the download.
    fn resolve_registry(
        &self,
        brick_ref: &BrickRef,
        name: &str,
        version_constraint: &str,
    ) -> Result<ResolvedBrick> {
        if !self.config.allow_network {
            return Err(Error::NetworkDisabled);
        }
        let client = self.registry.ok_or_else(|| {
            Error::Registry(anyhow::anyhow!("no registry client configured"))
        })?;

        let constraint = registry::parse_constraint(version_constraint)?;
        let version = client.latest_version(name, &constraint)?;
        let key = registry::cache_key(name, &version);
        self.logger.detail(&format!("Resolved {brick_ref} to {key}"));

        let cache_dir = cache::materialize(&self.config.cache_root, &key, |staging| {
            let mut progress = self.logger.progress(&format!("Downloading {key}"));
            let bytes = client.download(name, &version)?;
            let brick = crate::bundle::decode_universal(&bytes)?;
            loader::write_to_dir(&brick, staging)?;
            progress.done("downloaded");
            Ok(())
        })?;

        let brick = loader::load_from_dir(&cache_dir)?;
        // Registry bricks are identified by name and version, not by a tree
        // hash; a published version's bytes are immutable, so the cache key
        // doubles as the content identity.
        Ok(ResolvedBrick {
            brick_ref: brick_ref.clone(),
            cache_dir,
            brick,
            content_hash: key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::StdLogger;
    use crate::process::SystemProcessRunner;
    use std::fs;
    use tempfile::TempDir;

    fn write_brick_dir(dir: &Path) {
        fs::write(dir.join("brick.yaml"), "name: greeting\n").unwrap();
        fs::create_dir_all(dir.join("__brick__")).unwrap();
        fs::write(dir.join("__brick__/GREETINGS.md"), "Hi {{name}}!").unwrap();
    }

    #[test]
    fn test_resolve_path_brick() {
        let brick_dir = TempDir::new().unwrap();
        write_brick_dir(brick_dir.path());
        let cache = TempDir::new().unwrap();
        let config = GeneratorConfig::new(cache.path());
        let runner = SystemProcessRunner;
        let resolver = BrickResolver::new(&config, &runner, None, &StdLogger);

        let resolved = resolver
            .resolve(&BrickRef::Path { dir: brick_dir.path().to_path_buf() })
            .unwrap();
        assert_eq!(resolved.brick.name(), "greeting");
        assert!(resolved.cache_dir.starts_with(cache.path()));
        assert_eq!(resolved.content_hash.len(), crate::constants::CACHE_KEY_LEN);
    }

    #[test]
    fn test_resolving_twice_is_deterministic() {
        let brick_dir = TempDir::new().unwrap();
        write_brick_dir(brick_dir.path());
        let cache = TempDir::new().unwrap();
        let config = GeneratorConfig::new(cache.path());
        let runner = SystemProcessRunner;
        let resolver = BrickResolver::new(&config, &runner, None, &StdLogger);
        let brick_ref = BrickRef::Path { dir: brick_dir.path().to_path_buf() };

        let first = resolver.resolve(&brick_ref).unwrap();
        let second = resolver.resolve(&brick_ref).unwrap();
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.cache_dir, second.cache_dir);
    }

    #[test]
    fn test_network_disabled_fails_fast() {
        let cache = TempDir::new().unwrap();
        let config = GeneratorConfig::new(cache.path()).with_network(false);
        let runner = SystemProcessRunner;
        let resolver = BrickResolver::new(&config, &runner, None, &StdLogger);

        let git_ref = BrickRef::Git {
            url: "https://github.com/user/bricks".to_string(),
            reference: None,
            sub_path: None,
        };
        assert!(matches!(resolver.resolve(&git_ref).unwrap_err(), Error::NetworkDisabled));

        let registry_ref = BrickRef::Registry {
            name: "widget".to_string(),
            version_constraint: "^0.1.0".to_string(),
        };
        assert!(matches!(
            resolver.resolve(&registry_ref).unwrap_err(),
            Error::NetworkDisabled
        ));
    }

    #[test]
    fn test_registry_without_client_is_an_error() {
        let cache = TempDir::new().unwrap();
        let config = GeneratorConfig::new(cache.path());
        let runner = SystemProcessRunner;
        let resolver = BrickResolver::new(&config, &runner, None, &StdLogger);

        let registry_ref = BrickRef::Registry {
            name: "widget".to_string(),
            version_constraint: "^0.1.0".to_string(),
        };
        assert!(matches!(resolver.resolve(&registry_ref).unwrap_err(), Error::Registry(_)));
    }
}

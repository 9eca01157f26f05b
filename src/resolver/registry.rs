//! Registry collaborator contract.
//!
//! The HTTP client itself lives outside the core; the resolver consumes it
//! through [`RegistryClient`] and only understands version constraints and
//! bundle bytes.

use semver::{Version, VersionReq};

use crate::error::{Error, Result};

/// Resolves versions and downloads bundles from a brick registry.
pub trait RegistryClient {
    /// The newest published version of `name` matching `constraint`.
    fn latest_version(&self, name: &str, constraint: &VersionReq) -> Result<Version>;

    /// The universal bundle bytes for `name` at `version`.
    fn download(&self, name: &str, version: &Version) -> Result<Vec<u8>>;
}

/// Parses a version constraint such as `^0.1.0` or `>=1.2, <2.0`.
pub fn parse_constraint(constraint: &str) -> Result<VersionReq> {
    VersionReq::parse(constraint).map_err(|e| {
        Error::Registry(anyhow::anyhow!("invalid version constraint '{constraint}': {e}"))
    })
}

/// Cache key for a registry brick: `<name>_<version>`.
pub fn cache_key(name: &str, version: &Version) -> String {
    format!("{name}_{version}")
}

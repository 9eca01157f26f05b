//! Pre and post generation hook execution.
//!
//! A hook is an out-of-process script with a `run(context)` entrypoint. The
//! runner renders the hook source through the template engine, provisions
//! its dependencies, spawns a sandboxed worker and streams variable updates
//! back to the generator. A hook crash cannot corrupt the host; the worker's
//! exit is always awaited before its error is raised.

pub mod worker;

use regex::Regex;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use crate::brick::{Brick, HookFile};
use crate::constants::{HOOK_DEPS_DIR, HOOK_MANIFESTS};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::process::ProcessRunner;
use crate::renderer::TemplateRenderer;
use crate::resolver::cache::CacheLock;
use worker::WorkerSpec;

/// Marker file proving a dependency directory finished installing.
const INSTALLED_MARKER: &str = ".installed";

fn run_entrypoint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\brun\s*\(").expect("valid run entrypoint regex"))
}

/// The process working directory is process-wide state; hook invocations in
/// the same process are serialized around it.
fn cwd_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Restores the process working directory on every exit path.
struct WorkingDirGuard {
    original: PathBuf,
}

impl WorkingDirGuard {
    fn enter(target: &Path) -> Result<Self> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(target)?;
        Ok(Self { original })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Executes a brick's generation hooks.
pub struct HookRunner<'a> {
    process: &'a dyn ProcessRunner,
    logger: &'a dyn Logger,
    timeout: Option<Duration>,
    /// Root of installed hook dependency sets, `<tmp>/.mason` by default.
    deps_root: PathBuf,
}

impl<'a> HookRunner<'a> {
    pub fn new(
        process: &'a dyn ProcessRunner,
        logger: &'a dyn Logger,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            process,
            logger,
            timeout,
            deps_root: std::env::temp_dir().join(HOOK_DEPS_DIR),
        }
    }

    /// Overrides where dependency sets are installed (tests).
    pub fn with_deps_root<P: Into<PathBuf>>(mut self, deps_root: P) -> Self {
        self.deps_root = deps_root.into();
        self
    }

    /// Runs one hook to completion against `target_dir`.
    ///
    /// The hook source is rendered against `vars` before execution, so var
    /// substitution inside hook source is permitted. Variable updates the
    /// hook emits are streamed to `on_vars_changed` in receive order; the
    /// last update is the returned, authoritative variable map.
    pub fn run(
        &self,
        brick: &Brick,
        hook: &HookFile,
        target_dir: &Path,
        vars: &Map<String, Value>,
        renderer: &TemplateRenderer,
        on_vars_changed: &mut dyn FnMut(&Map<String, Value>),
    ) -> Result<Map<String, Value>> {
        let hook_path = PathBuf::from(&hook.rel_path);

        let rendered = renderer.render_bytes(&hook.bytes, &Value::Object(vars.clone()))?;
        check_source(&hook_path, &rendered)?;

        let deps_dir = match &brick.hooks.manifest {
            Some(manifest) => Some(self.install_dependencies(manifest, &hook_path)?),
            None => None,
        };

        // Stage the rendered script next to its installed dependencies so
        // interpreter-level lookup (node_modules, package configs) works.
        let script_dir = match &deps_dir {
            Some(deps_dir) => deps_dir.clone(),
            None => {
                let staging = self.deps_root.join("scripts");
                fs::create_dir_all(&staging)?;
                staging
            }
        };
        let script = script_dir.join(&hook.rel_path);
        fs::write(&script, &rendered)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        }

        let mut env = Vec::new();
        if let Some(deps_dir) = &deps_dir {
            env.push((
                "NODE_PATH".to_string(),
                deps_dir.join("node_modules").display().to_string(),
            ));
            env.push(("PYTHONPATH".to_string(), deps_dir.display().to_string()));
        }

        self.logger.detail(&format!("Running hook '{}'", hook.rel_path));

        let spec = WorkerSpec {
            script,
            hook_path,
            cwd: target_dir.to_path_buf(),
            env,
            timeout: self.timeout,
            logger: self.logger,
        };

        // Hooks observe the target as the effective working directory; the
        // guard restores the previous one on success, hook error and spawn
        // failure alike.
        let _serial = cwd_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _cwd = WorkingDirGuard::enter(target_dir)?;

        let updated = worker::run_worker(&spec, vars, on_vars_changed)?;
        Ok(updated.unwrap_or_else(|| vars.clone()))
    }

    /// Ensures `<deps_root>/<sha1(manifest)>` holds an installed dependency
    /// set. The first caller installs; everyone after observes the marker.
    fn install_dependencies(
        &self,
        manifest: &HookFile,
        hook_path: &Path,
    ) -> Result<PathBuf> {
        let mut hasher = Sha1::new();
        hasher.update(&manifest.bytes);
        let key = format!("{:x}", hasher.finalize());
        let deps_dir = self.deps_root.join(&key);

        let _lock = CacheLock::acquire(&self.deps_root, &key)?;
        if deps_dir.join(INSTALLED_MARKER).exists() {
            log::debug!("Hook dependencies for '{key}' already installed");
            return Ok(deps_dir);
        }

        fs::create_dir_all(&deps_dir)?;
        fs::write(deps_dir.join(&manifest.rel_path), &manifest.bytes)?;

        let installer = HOOK_MANIFESTS
            .iter()
            .find(|(name, _)| *name == manifest.rel_path)
            .map(|(_, cmd)| *cmd);

        match installer {
            Some(cmd) => {
                let mut progress =
                    self.logger.progress(&format!("Installing hook dependencies ({key})"));
                let (program, args) = cmd.split_first().expect("installer commands are non-empty");
                let output = self.process.run(program, args, &deps_dir, &HashMap::new())?;
                if !output.success() {
                    return Err(Error::HookDependencyInstallFailure {
                        hook_path: hook_path.to_path_buf(),
                        stderr: output.stderr,
                    });
                }
                progress.done("installed");
            }
            None => {
                self.logger.warn(&format!(
                    "No installer known for manifest '{}'; skipping dependency install",
                    manifest.rel_path
                ));
            }
        }

        fs::write(deps_dir.join(INSTALLED_MARKER), b"")?;
        Ok(deps_dir)
    }
}

/// Static checks on rendered hook source: the bytes must decode as UTF-8
/// with no interior NUL (no supported interpreter accepts either in source),
/// and the source must define a `run` entrypoint taking a context parameter.
/// Non-ASCII text in comments and string literals is fine; anything subtler
/// is left to the interpreter itself to reject at run time.
fn check_source(hook_path: &Path, rendered: &[u8]) -> Result<()> {
    let Ok(source) = std::str::from_utf8(rendered) else {
        return Err(Error::HookInvalidCharacters { hook_path: hook_path.to_path_buf() });
    };
    if source.contains('\0') {
        return Err(Error::HookInvalidCharacters { hook_path: hook_path.to_path_buf() });
    }
    if !run_entrypoint_regex().is_match(source) {
        return Err(Error::HookMissingRun { hook_path: hook_path.to_path_buf() });
    }
    Ok(())
}

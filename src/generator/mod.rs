//! The generator: walks a brick's template tree, renders paths and contents
//! against the variable set, applies the collision policy and runs the
//! generation hooks around it.

pub mod operation;

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::brick::{
    Brick, FileConflictResolver, FileDisposition, GeneratedFile, VariableType,
};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::hooks::HookRunner;
use crate::logging::Logger;
use crate::process::ProcessRunner;
use crate::renderer::TemplateRenderer;
use operation::{plan_outcome, write_file, CollisionResolver};

/// Cooperative cancellation handle. Once cancelled, the generator stops
/// issuing new file writes; an in-flight hook is awaited, never killed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The aggregate result of one generate call. File records appear in the
/// deterministic processing order, with forward-slash relative paths.
#[derive(Debug, Default)]
pub struct GenerateReport {
    pub files: Vec<GeneratedFile>,
}

impl GenerateReport {
    /// Files that ended up on disk (everything but skips).
    pub fn written(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter().filter(|f| f.disposition != FileDisposition::Skipped)
    }
}

/// Generates files from a brick into a target directory.
pub struct Generator<'a> {
    config: &'a GeneratorConfig,
    logger: &'a dyn Logger,
    process: &'a dyn ProcessRunner,
    renderer: TemplateRenderer,
    conflict_resolver: Option<&'a dyn FileConflictResolver>,
    cancel: Option<CancelToken>,
    dry_run: bool,
    hook_deps_root: Option<PathBuf>,
}

impl<'a> Generator<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        logger: &'a dyn Logger,
        process: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            config,
            logger,
            process,
            renderer: TemplateRenderer::new(),
            conflict_resolver: None,
            cancel: None,
            dry_run: false,
            hook_deps_root: None,
        }
    }

    /// Installs the per-file capability consulted under the prompt policy.
    pub fn with_conflict_resolver(mut self, resolver: &'a dyn FileConflictResolver) -> Self {
        self.conflict_resolver = Some(resolver);
        self
    }

    /// Registers partial templates available to the brick as `{{> name}}`.
    pub fn with_partials<I, N, T>(mut self, partials: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        for (name, template) in partials {
            self.renderer.add_partial(name, template);
        }
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Reports dispositions without touching the target tree or running
    /// hooks.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Overrides where hook dependencies are installed (tests).
    pub fn with_hook_deps_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.hook_deps_root = Some(root.into());
        self
    }

    /// Renders every template file of `brick` into `target_dir`.
    ///
    /// Variables are validated against the brick's declarations first; the
    /// pre-generation hook may update them before any file is rendered, and
    /// the post-generation hook runs after the last write. For a fixed
    /// `(brick, vars, policy)` and an empty target the resulting report is
    /// identical across runs and platforms.
    pub fn generate(
        &self,
        brick: &Brick,
        target_dir: &Path,
        vars: Map<String, Value>,
    ) -> Result<GenerateReport> {
        let mut vars = validate_vars(brick, vars)?;

        if !self.dry_run {
            fs::create_dir_all(target_dir)?;
        }

        let hook_runner = self.hook_runner();
        if let Some(pre_gen) = &brick.hooks.pre_gen {
            if self.dry_run {
                log::info!("[DRY RUN] Would run hook: {}", pre_gen.rel_path);
            } else {
                vars = hook_runner.run(
                    brick,
                    pre_gen,
                    target_dir,
                    &vars,
                    &self.renderer,
                    &mut |updated| {
                        log::debug!("Hook updated vars: {} keys", updated.len())
                    },
                )?;
            }
        }

        let report = self.render_tree(brick, target_dir, &vars)?;

        if let Some(post_gen) = &brick.hooks.post_gen {
            if self.dry_run {
                log::info!("[DRY RUN] Would run hook: {}", post_gen.rel_path);
            } else {
                hook_runner.run(
                    brick,
                    post_gen,
                    target_dir,
                    &vars,
                    &self.renderer,
                    &mut |updated| {
                        log::debug!("Hook updated vars: {} keys", updated.len())
                    },
                )?;
            }
        }

        Ok(report)
    }

    fn hook_runner(&self) -> HookRunner<'_> {
        let runner =
            HookRunner::new(self.process, self.logger, self.config.hook_timeout);
        match &self.hook_deps_root {
            Some(root) => runner.with_deps_root(root),
            None => runner,
        }
    }

    /// Walks the template files in lexicographic order, rendering and
    /// emitting each one.
    fn render_tree(
        &self,
        brick: &Brick,
        target_dir: &Path,
        vars: &Map<String, Value>,
    ) -> Result<GenerateReport> {
        let vars_value = Value::Object(vars.clone());
        let mut collision = CollisionResolver::new(
            self.config.on_conflict,
            self.conflict_resolver,
            self.logger,
        );

        let mut template_files: Vec<_> = brick.template_files.iter().collect();
        template_files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        let mut files = Vec::new();
        for template_file in template_files {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(Error::GenerateCancelled);
            }

            let rendered_path = self.renderer.render(&template_file.rel_path, &vars_value)?;
            if has_empty_segment(&rendered_path) {
                self.logger.detail(&format!(
                    "Skipping '{}': path rendered empty",
                    template_file.rel_path
                ));
                continue;
            }

            let bytes = self.renderer.render_bytes(&template_file.bytes, &vars_value)?;
            let dest = join_rendered_path(target_dir, &rendered_path);

            let existing = if dest.is_file() { Some(fs::read(&dest)?) } else { None };
            let outcome = plan_outcome(&mut collision, &dest, existing.as_deref(), bytes);
            if outcome.write && !self.dry_run {
                write_file(&dest, &outcome.bytes)?;
            }

            self.logger.detail(&format!("{} {rendered_path}", outcome.disposition));
            files.push(GeneratedFile {
                path: dest,
                rel_path: rendered_path,
                disposition: outcome.disposition,
                bytes: outcome.bytes,
            });
        }

        Ok(GenerateReport { files })
    }
}

/// Fills defaults, coerces declared types and rejects missing required
/// variables.
fn validate_vars(
    brick: &Brick,
    mut vars: Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut missing = Vec::new();

    for (name, def) in &brick.metadata.vars {
        match vars.get_mut(name) {
            Some(value) => coerce(value, def.var_type),
            None => match &def.default {
                Some(default) => {
                    vars.insert(name.clone(), default.clone());
                }
                None => missing.push(name.clone()),
            },
        }
    }

    if missing.is_empty() {
        Ok(vars)
    } else {
        Err(Error::VariableValidation { missing })
    }
}

/// Best-effort coercion of a supplied value to its declared type. Arrays
/// and enums pass through untouched.
fn coerce(value: &mut Value, var_type: VariableType) {
    match var_type {
        VariableType::Number => {
            if let Value::String(s) = value {
                if let Ok(parsed) = s.trim().parse::<i64>() {
                    *value = Value::Number(parsed.into());
                } else if let Ok(parsed) = s.trim().parse::<f64>() {
                    if let Some(number) = serde_json::Number::from_f64(parsed) {
                        *value = Value::Number(number);
                    }
                }
            }
        }
        VariableType::Boolean => {
            if let Value::String(s) = value {
                match s.trim() {
                    "true" => *value = Value::Bool(true),
                    "false" => *value = Value::Bool(false),
                    _ => {}
                }
            }
        }
        VariableType::String | VariableType::Enum | VariableType::Array => {}
    }
}

/// True when a rendered path lost a segment (a section consumed it), which
/// skips the file rather than emitting into a mangled location.
fn has_empty_segment(rendered_path: &str) -> bool {
    rendered_path.split('/').any(|segment| segment.trim().is_empty())
}

/// Joins a forward-slash rendered path onto the target directory using
/// platform separators.
fn join_rendered_path(target_dir: &Path, rendered_path: &str) -> PathBuf {
    rendered_path.split('/').fold(target_dir.to_path_buf(), |acc, seg| acc.join(seg))
}

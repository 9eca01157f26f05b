//! Loads bricks from directories and bundles into the in-memory model.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::brick::{Brick, BrickYaml, HookFile, Hooks, TemplateFile};
use crate::constants::{
    BRICK_METADATA_FILENAME, HOOKS_DIR, HOOK_MANIFESTS, POST_GEN_HOOK_STEM,
    PRE_GEN_HOOK_STEM, TEMPLATE_ROOT_DIR,
};
use crate::error::{Error, Result};

/// Loads a brick from a directory containing `brick.yaml`, a `__brick__/`
/// template tree and an optional `hooks/` directory.
pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Brick> {
    let dir = dir.as_ref();

    let metadata_path = dir.join(BRICK_METADATA_FILENAME);
    if !metadata_path.exists() {
        return Err(Error::BrickMissingMetadata { dir: dir.display().to_string() });
    }
    let metadata_text = fs::read_to_string(&metadata_path)?;
    let metadata =
        BrickYaml::from_yaml(&metadata_path.display().to_string(), &metadata_text)?;

    let template_root = dir.join(TEMPLATE_ROOT_DIR);
    if !template_root.is_dir() {
        return Err(Error::BrickMissingTemplateRoot { dir: dir.display().to_string() });
    }

    let template_files = read_template_tree(&template_root)?;
    let hooks = read_hooks(&dir.join(HOOKS_DIR))?;

    log::debug!(
        "Loaded brick '{}' with {} template files",
        metadata.name,
        template_files.len()
    );

    Ok(Brick { metadata, template_files, hooks })
}

/// Loads a brick from a universal (binary) bundle.
pub fn load_from_bundle(bytes: &[u8]) -> Result<Brick> {
    crate::bundle::decode_universal(bytes)
}

/// Loads a brick from a source (text) bundle.
pub fn load_from_source_bundle(text: &str) -> Result<Brick> {
    crate::bundle::decode_source(text)
}

/// Writes a brick back out as a brick directory: `brick.yaml`, the
/// `__brick__/` tree and any hooks. Inverse of [`load_from_dir`].
pub fn write_to_dir(brick: &Brick, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let metadata = serde_yaml::to_string(&brick.metadata)
        .map_err(|e| Error::Other(anyhow::anyhow!("failed to serialize metadata: {e}")))?;
    fs::write(dir.join(BRICK_METADATA_FILENAME), metadata)?;

    let template_root = dir.join(TEMPLATE_ROOT_DIR);
    fs::create_dir_all(&template_root)?;
    for file in &brick.template_files {
        let path = template_root.join(&file.rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &file.bytes)?;
    }

    let hook_files =
        [&brick.hooks.pre_gen, &brick.hooks.post_gen, &brick.hooks.manifest];
    let hooks: Vec<&HookFile> = hook_files.into_iter().flatten().collect();
    if !hooks.is_empty() {
        let hooks_dir = dir.join(HOOKS_DIR);
        fs::create_dir_all(&hooks_dir)?;
        for hook in hooks {
            fs::write(hooks_dir.join(&hook.rel_path), &hook.bytes)?;
        }
    }
    Ok(())
}

/// Reads the template tree in sorted relative-path order, normalizing path
/// separators to forward slashes.
fn read_template_tree(template_root: &Path) -> Result<Vec<TemplateFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(template_root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(template_root)
            .expect("walked entries live under the template root")
            .to_string_lossy()
            .replace('\\', "/");
        files.push(TemplateFile { rel_path, bytes: fs::read(entry.path())? });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

/// Collects `pre_gen.*`, `post_gen.*` and the dependency manifest from the
/// hooks directory, when present.
fn read_hooks(hooks_dir: &Path) -> Result<Hooks> {
    let mut hooks = Hooks::default();
    if !hooks_dir.is_dir() {
        return Ok(hooks);
    }

    let mut entries: Vec<_> = fs::read_dir(hooks_dir)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|e| e.path().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let stem = file_name.split('.').next().unwrap_or(file_name.as_str());
        let read = || -> Result<HookFile> {
            Ok(HookFile { rel_path: file_name.clone(), bytes: fs::read(entry.path())? })
        };

        if HOOK_MANIFESTS.iter().any(|(name, _)| *name == file_name) {
            if hooks.manifest.is_none() {
                hooks.manifest = Some(read()?);
            }
        } else if stem == PRE_GEN_HOOK_STEM && hooks.pre_gen.is_none() {
            hooks.pre_gen = Some(read()?);
        } else if stem == POST_GEN_HOOK_STEM && hooks.post_gen.is_none() {
            hooks.post_gen = Some(read()?);
        }
    }
    Ok(hooks)
}

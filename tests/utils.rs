//! Shared helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds a brick directory on disk for tests.
pub struct BrickDirBuilder {
    dir: TempDir,
}

impl BrickDirBuilder {
    pub fn new(name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("brick.yaml"), format!("name: {name}\n")).unwrap();
        fs::create_dir_all(dir.path().join("__brick__")).unwrap();
        Self { dir }
    }

    pub fn metadata(self, yaml: &str) -> Self {
        fs::write(self.dir.path().join("brick.yaml"), yaml).unwrap();
        self
    }

    pub fn file(self, rel_path: &str, contents: &str) -> Self {
        let path = self.dir.path().join("__brick__").join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
        self
    }

    pub fn hook(self, file_name: &str, contents: &str) -> Self {
        let hooks_dir = self.dir.path().join("hooks");
        fs::create_dir_all(&hooks_dir).unwrap();
        fs::write(hooks_dir.join(file_name), contents).unwrap();
        self
    }

    pub fn build(self) -> TempDir {
        self.dir
    }
}

/// A brick directory holding one `GREETINGS.md` template.
pub fn greeting_brick() -> TempDir {
    BrickDirBuilder::new("greeting").file("GREETINGS.md", "Hi {{name}}!").build()
}

pub fn read_string(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Collects every file under `dir` as (relative path, bytes), sorted.
pub fn snapshot_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for entry in walk(dir) {
        let rel = entry
            .strip_prefix(dir)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/");
        files.push((rel, fs::read(&entry).unwrap()));
    }
    files.sort();
    files
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(walk(&path));
            } else {
                out.push(path);
            }
        }
    }
    out
}

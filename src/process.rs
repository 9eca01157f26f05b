//! Process-running collaborator used by git fetches and hook dependency
//! installation.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::Result;

/// Captured output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands on behalf of the core.
///
/// Injected so tests can observe or fake git and installer invocations
/// without touching the system.
pub trait ProcessRunner {
    fn run(
        &self,
        cmd: &str,
        args: &[&str],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ProcessOutput>;
}

/// ProcessRunner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        cmd: &str,
        args: &[&str],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ProcessOutput> {
        log::debug!("Running '{cmd} {}' in '{}'", args.join(" "), cwd.display());

        let output = Command::new(cmd)
            .args(args)
            .current_dir(cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

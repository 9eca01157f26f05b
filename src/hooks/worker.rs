//! Hook worker process and its three receive channels.
//!
//! The host spawns one worker per hook invocation and passes the initial
//! variable map as a JSON-encoded argument. The worker talks back over three
//! channels: `message` (stdout lines holding JSON objects of updated vars),
//! `error` (stderr), and `exit` (process termination). Exit is observed only
//! after both stream readers have drained, so every message enqueued before
//! termination is delivered first.

use serde_json::{Map, Value};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::HOOK_INTERPRETERS;
use crate::error::{Error, Result};
use crate::logging::Logger;

/// How often the exit channel is polled while streaming messages.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

enum WorkerEvent {
    /// A stdout line. JSON objects are variable updates; anything else is
    /// plain hook output.
    Out(String),
    /// A stderr line.
    Err(String),
}

/// The interpreter invocation for a hook script, chosen by extension.
/// Scripts with an unlisted extension are executed directly.
pub fn interpreter_for(script: &Path) -> Vec<String> {
    let ext = script.extension().and_then(|e| e.to_str()).unwrap_or("");
    for (known, cmd) in HOOK_INTERPRETERS {
        if *known == ext {
            return cmd.iter().map(|s| s.to_string()).collect();
        }
    }
    Vec::new()
}

/// Everything needed to start one worker.
pub struct WorkerSpec<'a> {
    /// Path of the rendered hook script on disk.
    pub script: PathBuf,
    /// The hook's path inside the brick, for error provenance.
    pub hook_path: PathBuf,
    /// Working directory for the worker (the generation target).
    pub cwd: PathBuf,
    /// Extra environment (dependency lookup paths).
    pub env: Vec<(String, String)>,
    /// Kill the worker if it outlives this.
    pub timeout: Option<Duration>,
    pub logger: &'a dyn Logger,
}

/// Runs the worker to completion, streaming variable updates to
/// `on_vars_changed` in receive order. Returns the last received variable
/// map, or `None` if the hook never sent one.
pub fn run_worker(
    spec: &WorkerSpec<'_>,
    initial_vars: &Map<String, Value>,
    on_vars_changed: &mut dyn FnMut(&Map<String, Value>),
) -> Result<Option<Map<String, Value>>> {
    let vars_json = serde_json::to_string(&Value::Object(initial_vars.clone()))?;

    let interpreter = interpreter_for(&spec.script);
    let mut command = match interpreter.split_first() {
        Some((program, rest)) => {
            let mut command = Command::new(program);
            command.args(rest).arg(&spec.script);
            command
        }
        None => Command::new(&spec.script),
    };
    command
        .arg(&vars_json)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // A dedicated process group lets a timeout kill the hook and anything
    // it spawned, not just the interpreter.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn().map_err(|source| Error::HookRun {
        hook_path: spec.hook_path.clone(),
        source,
    })?;

    let (sender, receiver) = mpsc::channel::<WorkerEvent>();
    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let out_sender = sender.clone();
    let out_reader = thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
            if out_sender.send(WorkerEvent::Out(line)).is_err() {
                break;
            }
        }
    });
    let err_reader = thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
            if sender.send(WorkerEvent::Err(line)).is_err() {
                break;
            }
        }
    });

    let started = Instant::now();
    let mut latest_vars: Option<Map<String, Value>> = None;
    let mut stderr_lines: Vec<String> = Vec::new();
    let mut exit_status = None;

    // Stream until the worker exits, then drain what the readers enqueued
    // before termination.
    loop {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                handle_event(spec, event, &mut latest_vars, &mut stderr_lines, on_vars_changed)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if exit_status.is_none() {
            if let Some(status) = child.try_wait()? {
                exit_status = Some(status);
            } else if timed_out(spec, started) {
                kill_worker(&mut child);
                let _ = child.wait();
                drop_readers(out_reader, err_reader);
                return Err(timeout_error(spec));
            }
        } else if out_reader.is_finished() && err_reader.is_finished() {
            // The worker is gone and the readers hit EOF; drain whatever
            // they enqueued before termination.
            while let Ok(event) = receiver.try_recv() {
                handle_event(spec, event, &mut latest_vars, &mut stderr_lines, on_vars_changed);
            }
            break;
        }
    }

    drop_readers(out_reader, err_reader);
    let status = match exit_status {
        // A worker that closed its streams early is still awaited, bounded
        // by the same timeout.
        Some(status) => status,
        None => loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if timed_out(spec, started) {
                kill_worker(&mut child);
                let _ = child.wait();
                return Err(timeout_error(spec));
            }
            thread::sleep(POLL_INTERVAL);
        },
    };

    if !status.success() {
        let message = if stderr_lines.is_empty() {
            format!("exited with code {}", status.code().unwrap_or(-1))
        } else {
            stderr_lines.join("\n")
        };
        return Err(Error::HookExecution { hook_path: spec.hook_path.clone(), message });
    }

    Ok(latest_vars)
}

fn handle_event(
    spec: &WorkerSpec<'_>,
    event: WorkerEvent,
    latest_vars: &mut Option<Map<String, Value>>,
    stderr_lines: &mut Vec<String>,
    on_vars_changed: &mut dyn FnMut(&Map<String, Value>),
) {
    match event {
        WorkerEvent::Out(line) => {
            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(vars)) => {
                    on_vars_changed(&vars);
                    *latest_vars = Some(vars);
                }
                _ => spec.logger.detail(&line),
            }
        }
        WorkerEvent::Err(line) => stderr_lines.push(line),
    }
}

fn timed_out(spec: &WorkerSpec<'_>, started: Instant) -> bool {
    spec.timeout.is_some_and(|timeout| started.elapsed() >= timeout)
}

fn timeout_error(spec: &WorkerSpec<'_>) -> Error {
    let timeout = spec.timeout.expect("timeout errors require a configured timeout");
    Error::HookExecution {
        hook_path: spec.hook_path.clone(),
        message: format!("timed out after {}s", timeout.as_secs()),
    }
}

fn drop_readers(out_reader: thread::JoinHandle<()>, err_reader: thread::JoinHandle<()>) {
    let _ = out_reader.join();
    let _ = err_reader.join();
}

fn kill_worker(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: a negative pid targets the process group created at
        // spawn, reaping the hook and its children.
        unsafe {
            libc::kill(-(child.id() as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
}

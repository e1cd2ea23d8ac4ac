// src/exec/launcher.rs

//! Runtime launcher abstraction and its process-backed implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::bundler::BoxFuture;
use crate::errors::{PolypackError, Result};
use crate::identity::Signature;

/// What to launch for one run-flagged configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub identity: Signature,
    /// Built artifact to execute.
    pub script: PathBuf,
    /// Extra, unrecognised CLI arguments passed through to the runtime.
    pub args: Vec<String>,
}

/// Starts runtime processes for built artifacts.
///
/// Production code uses [`ProcessLauncher`]; tests can record launches
/// without spawning anything.
pub trait RuntimeLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn RuntimeProcess>>;
}

/// A launched runtime.
pub trait RuntimeProcess: Send {
    /// Stop the current instance and start a fresh one from the same spec.
    fn restart(&mut self) -> BoxFuture<'_, Result<()>>;

    fn stop(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Launches `<interpreter> <script> <args...>` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    interpreter: String,
    cwd: PathBuf,
}

impl ProcessLauncher {
    pub fn new(interpreter: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            cwd: cwd.into(),
        }
    }
}

impl RuntimeLauncher for ProcessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn RuntimeProcess>> {
        let child = spawn_runtime(&self.interpreter, &self.cwd, spec)?;
        Ok(Box::new(ChildRuntime {
            interpreter: self.interpreter.clone(),
            cwd: self.cwd.clone(),
            spec: spec.clone(),
            child: Some(child),
        }))
    }
}

struct ChildRuntime {
    interpreter: String,
    cwd: PathBuf,
    spec: LaunchSpec,
    child: Option<Child>,
}

impl ChildRuntime {
    async fn kill_current(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(compiler = %self.spec.identity, ?status, "runtime already exited");
                }
                _ => {
                    child
                        .kill()
                        .await
                        .with_context(|| format!("killing runtime for {}", self.spec.identity))?;
                }
            }
        }
        Ok(())
    }
}

impl RuntimeProcess for ChildRuntime {
    fn restart(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.kill_current().await?;
            let child = spawn_runtime(&self.interpreter, &self.cwd, &self.spec)?;
            self.child = Some(child);
            info!(compiler = %self.spec.identity, "runtime patched");
            Ok(())
        })
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.kill_current().await?;
            info!(compiler = %self.spec.identity, "runtime stopped");
            Ok(())
        })
    }
}

fn spawn_runtime(interpreter: &str, cwd: &Path, spec: &LaunchSpec) -> Result<Child> {
    let mut cmd = Command::new(interpreter);
    cmd.arg(&spec.script)
        .args(&spec.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        PolypackError::LaunchError(format!(
            "spawning `{} {}`: {}",
            interpreter,
            spec.script.display(),
            e
        ))
    })?;

    info!(
        compiler = %spec.identity,
        script = %spec.script.display(),
        pid = ?child.id(),
        "runtime started"
    );

    // Always consume output so pipe buffers don't fill.
    if let Some(stdout) = child.stdout.take() {
        forward_lines(spec.identity.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(spec.identity.clone(), "stderr", stderr);
    }

    Ok(child)
}

fn forward_lines<R>(identity: Signature, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!(runtime = %identity, stream, "{}", line),
                Ok(None) => break,
                Err(e) => {
                    warn!(runtime = %identity, stream, error = %e, "failed reading runtime output");
                    break;
                }
            }
        }
    });
}

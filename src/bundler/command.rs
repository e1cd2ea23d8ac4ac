// src/bundler/command.rs

//! Bundler backed by an external command (esbuild, webpack-cli, rollup, ...).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BundlerSection;
use crate::errors::Result;

use super::filter::{relative_str, WatchFilter};
use super::{
    BoxFuture, BuildOutcome, BuildSettings, BuildStats, Bundler, BundlerError, WatchHandle,
};

/// Runs a shell command template per build.
///
/// The template may reference `{entry}`, `{out}`, `{mode}` and `{platform}`;
/// each is replaced with the value from [`BuildSettings`].
#[derive(Debug, Clone)]
pub struct CommandBundler {
    template: String,
    filter: Arc<WatchFilter>,
}

impl CommandBundler {
    pub fn new(template: impl Into<String>, filter: WatchFilter) -> Self {
        Self {
            template: template.into(),
            filter: Arc::new(filter),
        }
    }

    pub fn from_section(section: &BundlerSection) -> Result<Self> {
        let filter = WatchFilter::new(&section.watch, &section.exclude)?;
        Ok(Self::new(section.cmd.clone(), filter))
    }

    /// Expand the command template for one configuration.
    pub fn render(&self, settings: &BuildSettings) -> String {
        self.template
            .replace("{entry}", &settings.entry.to_string_lossy())
            .replace("{out}", &settings.out.to_string_lossy())
            .replace("{mode}", &settings.mode.to_string())
            .replace("{platform}", settings.platform)
    }
}

impl Bundler for CommandBundler {
    fn run<'a>(&'a self, settings: &'a BuildSettings) -> BoxFuture<'a, BuildOutcome> {
        let cmd = self.render(settings);
        Box::pin(run_command(cmd, settings.root.clone()))
    }

    fn watch(
        &self,
        settings: &BuildSettings,
        poll_interval: Duration,
        on_build: mpsc::UnboundedSender<BuildOutcome>,
    ) -> std::result::Result<Box<dyn WatchHandle>, BundlerError> {
        let root = settings.root.clone();

        // Channel from the blocking notify callback into the async world.
        let (change_tx, change_rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_access() {
                        return;
                    }
                    for path in event.paths {
                        // Receiver gone means the watch loop stopped.
                        let _ = change_tx.send(path);
                    }
                }
                Err(err) => {
                    // No tracing context on the notify thread; fall back to stderr.
                    eprintln!("polypack: file watch error: {err}");
                }
            },
            Config::default(),
        )
        .map_err(|source| BundlerError::Watch {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| BundlerError::Watch {
                path: root.clone(),
                source,
            })?;

        info!(compiler = %settings.identity, root = ?root, "file watcher started");

        let (close_tx, close_rx) = oneshot::channel::<()>();
        let watch_loop = WatchLoop {
            cmd: self.render(settings),
            root,
            out: settings.out.to_string_lossy().replace('\\', "/"),
            filter: Arc::clone(&self.filter),
            poll_interval,
        };
        let identity = settings.identity.clone();
        let task = tokio::spawn(async move {
            watch_loop.run(change_rx, close_rx, on_build).await;
            debug!(compiler = %identity, "watch loop finished");
        });

        Ok(Box::new(CommandWatch {
            watcher,
            close_tx,
            task,
        }))
    }
}

struct WatchLoop {
    cmd: String,
    root: PathBuf,
    out: String,
    filter: Arc<WatchFilter>,
    poll_interval: Duration,
}

impl WatchLoop {
    async fn run(
        self,
        mut changes: mpsc::UnboundedReceiver<PathBuf>,
        mut close_rx: oneshot::Receiver<()>,
        on_build: mpsc::UnboundedSender<BuildOutcome>,
    ) {
        loop {
            // A close request is only observed between builds, so a build in
            // progress always runs to completion and reports.
            let outcome = run_command(self.cmd.clone(), self.root.clone()).await;
            if on_build.send(outcome).is_err() {
                debug!("build receiver dropped; stopping watch loop");
                return;
            }

            tokio::select! {
                _ = &mut close_rx => return,
                changed = self.next_relevant_change(&mut changes) => {
                    if !changed {
                        return;
                    }
                }
            }

            // Coalesce the burst of events a single save usually produces.
            tokio::select! {
                _ = &mut close_rx => return,
                _ = sleep(self.poll_interval) => {}
            }
            while changes.try_recv().is_ok() {}
        }
    }

    /// Wait for a change to a watched path. Returns false if the notify
    /// watcher went away.
    async fn next_relevant_change(&self, changes: &mut mpsc::UnboundedReceiver<PathBuf>) -> bool {
        while let Some(path) = changes.recv().await {
            let Some(rel) = relative_str(&self.root, &path) else {
                continue;
            };
            // Writing the artifact must not trigger another build.
            if rel == self.out || !self.filter.matches(&rel) {
                continue;
            }
            debug!(path = %rel, "change detected");
            return true;
        }
        false
    }
}

struct CommandWatch {
    watcher: RecommendedWatcher,
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WatchHandle for CommandWatch {
    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        let CommandWatch {
            watcher,
            close_tx,
            task,
        } = *self;

        Box::pin(async move {
            drop(watcher);
            // The loop may already be gone (receiver dropped).
            let _ = close_tx.send(());
            if let Err(err) = task.await {
                warn!(error = %err, "watch loop ended abnormally");
            }
        })
    }
}

/// Run one bundler invocation and collect its output.
async fn run_command(cmd: String, root: PathBuf) -> BuildOutcome {
    debug!(cmd = %cmd, root = ?root, "running bundler");
    let started = Instant::now();

    let output = shell_command(&cmd, &root)
        .output()
        .await
        .map_err(BundlerError::Spawn)?;

    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    lines.extend(
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::to_string),
    );

    Ok(BuildStats::from_output(
        output.status.code(),
        started.elapsed(),
        lines,
    ))
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str, root: &Path) -> Command {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

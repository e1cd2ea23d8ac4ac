// src/engine/dispatch.rs

//! Task dispatcher: maps a task to a fixed pipeline of coordinator stages.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::errors::{PolypackError, Result};
use crate::identity::SignedConfig;

use super::coordinator::Orchestrator;

/// The tasks polypack knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Build everything once, then shut down.
    Dist,
    /// Build everything and keep rebuilding on changes.
    Watch,
    /// Build everything once, then launch run-flagged outputs.
    Run,
    /// Watch everything, launch run-flagged outputs, restart them on rebuild.
    WatchAndRun,
}

impl Task {
    pub const ALL: [Task; 4] = [Task::Dist, Task::Watch, Task::Run, Task::WatchAndRun];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::Dist => "dist",
            Task::Watch => "watch",
            Task::Run => "run",
            Task::WatchAndRun => "watch-and-run",
        }
    }

    /// Whether configurations are built in watch mode.
    pub fn watches(self) -> bool {
        matches!(self, Task::Watch | Task::WatchAndRun)
    }

    /// Whether run-flagged outputs are launched after the build stage.
    pub fn launches(self) -> bool {
        matches!(self, Task::Run | Task::WatchAndRun)
    }

    /// Human-readable pipeline stages, in order.
    pub fn stages(self) -> &'static [&'static str] {
        match self {
            Task::Dist => &["build all once", "shutdown"],
            Task::Watch => &["watch all"],
            Task::Run => &["build all once", "launch run-flagged outputs"],
            Task::WatchAndRun => &[
                "watch all",
                "launch run-flagged outputs",
                "restart runtimes on rebuild",
            ],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = PolypackError;

    fn from_str(s: &str) -> Result<Self> {
        Task::ALL
            .into_iter()
            .find(|task| task.as_str() == s.trim())
            .ok_or_else(|| PolypackError::UnknownTask(s.to_string()))
    }
}

impl Orchestrator {
    /// Run the pipeline for `task`.
    ///
    /// Stages run strictly in order. Any failure skips the remaining stages
    /// and goes to the shutdown sequencer with the error attached, so the
    /// error comes back only after open watchers were drained.
    ///
    /// Once shutdown has been requested (e.g. by a termination signal) no
    /// further stage starts; the pipeline waits for the drain and returns
    /// `Ok`.
    pub async fn dispatch(
        &self,
        task: Task,
        configs: &[SignedConfig],
        extra_args: &[String],
    ) -> Result<()> {
        info!(%task, configurations = configs.len(), "dispatching task");

        match self.run_pipeline(task, configs, extra_args).await {
            Ok(()) => Ok(()),
            Err(PolypackError::Interrupted { missing, .. }) => {
                info!(%task, unreported = missing.len(), "pipeline stopped by shutdown");
                self.registry().shutdown(None).await
            }
            Err(err) => self.registry().shutdown(Some(err)).await,
        }
    }

    /// Like [`Orchestrator::dispatch`], resolving the task by name first.
    ///
    /// An unknown name is rejected before any build starts.
    pub async fn dispatch_named(
        &self,
        name: &str,
        configs: &[SignedConfig],
        extra_args: &[String],
    ) -> Result<()> {
        match name.parse::<Task>() {
            Ok(task) => self.dispatch(task, configs, extra_args).await,
            Err(err) => self.registry().shutdown(Some(err)).await,
        }
    }

    async fn run_pipeline(
        &self,
        task: Task,
        configs: &[SignedConfig],
        extra_args: &[String],
    ) -> Result<()> {
        match task {
            Task::Dist => {
                self.run_all(configs).await?;
                self.registry().shutdown(None).await
            }
            Task::Watch => {
                self.watch_all(configs).await?;
                Ok(())
            }
            Task::Run => {
                self.run_all(configs).await?;
                self.launch_unless_stopping(task, configs, extra_args).await
            }
            Task::WatchAndRun => {
                self.watch_all(configs).await?;
                self.launch_unless_stopping(task, configs, extra_args).await
            }
        }
    }

    async fn launch_unless_stopping(
        &self,
        task: Task,
        configs: &[SignedConfig],
        extra_args: &[String],
    ) -> Result<()> {
        if self.registry().is_shutting_down() {
            info!(%task, "shutdown requested; skipping launch");
            return Ok(());
        }
        self.runtimes().launch_selected(configs, extra_args).await
    }
}

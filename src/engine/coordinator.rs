// src/engine/coordinator.rs

//! Single-pass and watch coordinators.
//!
//! Both follow the same "distribute, then collect" shape:
//! 1. start one build (or watch session) per configuration, all at once;
//! 2. collect reports into a [`ResultMap`] until every configuration has
//!    reported at least once, or until the batch deadline passes.
//!
//! A configuration that reports an error still counts as reported. Only
//! silence past the deadline fails the batch. A shutdown request ends the
//! batch early with [`PolypackError::Interrupted`].

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::build::{report, Compiler, ResultMap, ResultRecord};
use crate::bundler::{BuildOutcome, Bundler};
use crate::config::ConfigFile;
use crate::errors::{PolypackError, Result};
use crate::exec::RuntimeSupervisor;
use crate::identity::{Signature, SignedConfig};

use super::registry::WatcherRegistry;

/// Tunables for a coordinator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// One timer per batch, not per configuration.
    pub batch_timeout: Duration,
    /// Event aggregation interval handed to the bundler in watch mode.
    pub poll_interval: Duration,
    /// Project root the bundler runs in.
    pub root: PathBuf,
}

impl OrchestratorOptions {
    pub fn from_config(cfg: &ConfigFile, root: impl Into<PathBuf>) -> Self {
        let timings = cfg.timings();
        Self {
            batch_timeout: timings.batch_timeout,
            poll_interval: timings.poll_interval,
            root: root.into(),
        }
    }
}

/// Drives builds for a set of signed configurations.
pub struct Orchestrator {
    bundler: Arc<dyn Bundler>,
    registry: Arc<WatcherRegistry>,
    runtimes: Arc<RuntimeSupervisor>,
    options: OrchestratorOptions,
    latest: Arc<Mutex<ResultMap>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        bundler: Arc<dyn Bundler>,
        registry: Arc<WatcherRegistry>,
        runtimes: Arc<RuntimeSupervisor>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            bundler,
            registry,
            runtimes,
            options,
            latest: Arc::new(Mutex::new(ResultMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<WatcherRegistry> {
        &self.registry
    }

    pub fn runtimes(&self) -> &Arc<RuntimeSupervisor> {
        &self.runtimes
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Snapshot of the latest record per configuration, across all batches,
    /// including rebuilds that happened after a watch batch resolved.
    pub fn latest_results(&self) -> ResultMap {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Build a single configuration once.
    pub async fn run_one(&self, config: &SignedConfig) -> ResultRecord {
        let compiler = self.compiler_for(config);
        let record = build_once(&compiler).await;
        record_latest(&self.latest, &record);
        record
    }

    /// Build every configuration once, concurrently.
    ///
    /// Resolves with one record per configuration, or fails with
    /// [`PolypackError::BatchTimeout`] carrying the partial results if any
    /// configuration is still silent when the batch timeout fires.
    pub async fn run_all(&self, configs: &[SignedConfig]) -> Result<ResultMap> {
        let deadline = Instant::now() + self.options.batch_timeout;
        let (results_tx, results_rx) = mpsc::unbounded_channel::<ResultRecord>();

        for config in configs {
            info!(compiler = %config.signature(), "distributing");
            let compiler = self.compiler_for(config);
            let results_tx = results_tx.clone();
            let latest = Arc::clone(&self.latest);

            tokio::spawn(async move {
                let record = build_once(&compiler).await;
                record_latest(&latest, &record);
                // Receiver gone means the batch already timed out.
                let _ = results_tx.send(record);
            });
        }
        drop(results_tx);

        collect_batch(configs, results_rx, deadline, &self.registry).await
    }

    /// Start a watch session per configuration.
    ///
    /// Resolves once every configuration reported its first build (same
    /// timeout rules as [`Orchestrator::run_all`]). Sessions keep rebuilding
    /// afterwards; each rebuild updates [`Orchestrator::latest_results`] and,
    /// on success, fires the configuration's rebuild action.
    pub async fn watch_all(&self, configs: &[SignedConfig]) -> Result<ResultMap> {
        let deadline = Instant::now() + self.options.batch_timeout;
        let (results_tx, results_rx) = mpsc::unbounded_channel::<ResultRecord>();

        for config in configs {
            info!(compiler = %config.signature(), "watching and distributing");
            let compiler = self.compiler_for(config);
            let (build_tx, build_rx) = mpsc::unbounded_channel::<BuildOutcome>();

            match compiler.watch(self.options.poll_interval, build_tx, &self.registry) {
                Ok(id) => {
                    debug!(compiler = %config.signature(), ?id, "watch session started");
                    self.spawn_rebuild_forwarder(config.clone(), build_rx, results_tx.clone());
                }
                Err(err) => {
                    // The watcher never started: report it like a failed build.
                    let record = report(&Err(err), config);
                    record_latest(&self.latest, &record);
                    let _ = results_tx.send(record);
                }
            }
        }
        drop(results_tx);

        collect_batch(configs, results_rx, deadline, &self.registry).await
    }

    fn spawn_rebuild_forwarder(
        &self,
        config: SignedConfig,
        mut builds: mpsc::UnboundedReceiver<BuildOutcome>,
        results_tx: mpsc::UnboundedSender<ResultRecord>,
    ) {
        let runtimes = Arc::clone(&self.runtimes);
        let latest = Arc::clone(&self.latest);

        tokio::spawn(async move {
            while let Some(outcome) = builds.recv().await {
                let record = report(&outcome, &config);
                record_latest(&latest, &record);

                if record.is_success() && config.restarts_runtime_on_rebuild() {
                    if let Err(err) = runtimes.restart(config.signature()).await {
                        warn!(
                            compiler = %config.signature(),
                            error = %err,
                            "failed to restart runtime after rebuild"
                        );
                    }
                }

                // Fails once the batch resolved; later rebuilds only update `latest`.
                let _ = results_tx.send(record);
            }
            debug!(compiler = %config.signature(), "watch stream ended");
        });
    }

    fn compiler_for(&self, config: &SignedConfig) -> Compiler {
        Compiler::new(Arc::clone(&self.bundler), config.clone(), &self.options.root)
    }
}

async fn build_once(compiler: &Compiler) -> ResultRecord {
    let outcome = compiler.run().await;
    report(&outcome, compiler.config())
}

fn record_latest(latest: &Mutex<ResultMap>, record: &ResultRecord) {
    latest
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(record.compiler.clone(), record.clone());
}

/// How a batch stopped collecting.
enum BatchEnd {
    Complete,
    DeadlinePassed,
    ShutdownRequested,
}

/// Collect reports until every configuration has reported, `deadline`
/// passes, or `registry` is asked to shut down. Later reports for the same
/// configuration overwrite earlier ones.
async fn collect_batch(
    configs: &[SignedConfig],
    mut results_rx: mpsc::UnboundedReceiver<ResultRecord>,
    deadline: Instant,
    registry: &WatcherRegistry,
) -> Result<ResultMap> {
    let mut pending: HashSet<Signature> =
        configs.iter().map(|c| c.signature().clone()).collect();
    let mut results = ResultMap::new();

    let interrupted = registry.shutdown_requested();
    tokio::pin!(interrupted);

    let end = loop {
        if pending.is_empty() {
            break BatchEnd::Complete;
        }

        tokio::select! {
            _ = &mut interrupted => break BatchEnd::ShutdownRequested,
            received = timeout_at(deadline, results_rx.recv()) => match received {
                Ok(Some(record)) => {
                    pending.remove(&record.compiler);
                    results.insert(record.compiler.clone(), record);
                }
                // Every producer is gone; nothing else can report. The batch
                // still fails the same way silence does.
                Ok(None) => {
                    break tokio::select! {
                        _ = &mut interrupted => BatchEnd::ShutdownRequested,
                        _ = sleep_until(deadline) => BatchEnd::DeadlinePassed,
                    };
                }
                Err(_elapsed) => break BatchEnd::DeadlinePassed,
            },
        }
    };

    let mut missing: Vec<Signature> = pending.into_iter().collect();
    missing.sort();

    match end {
        BatchEnd::Complete => Ok(results),
        BatchEnd::ShutdownRequested => {
            info!(?missing, reported = results.len(), "batch interrupted by shutdown");
            Err(PolypackError::Interrupted {
                partial: results,
                missing,
            })
        }
        BatchEnd::DeadlinePassed => {
            warn!(?missing, reported = results.len(), "batch timed out");
            Err(PolypackError::BatchTimeout {
                partial: results,
                missing,
            })
        }
    }
}

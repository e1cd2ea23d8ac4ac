// src/lib.rs

pub mod build;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod identity;
pub mod logging;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};

use crate::bundler::{Bundler, CommandBundler};
use crate::cli::CliArgs;
use crate::config::{load_and_validate, project_root, BuildConfig, ConfigFile};
use crate::engine::{
    install_termination_handler, Orchestrator, OrchestratorOptions, Task, WatcherRegistry,
};
use crate::errors::{PolypackError, Result};
use crate::exec::{ProcessLauncher, RuntimeSupervisor};
use crate::identity::{sign_all, SignedConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - project file loading and configuration signing
/// - bundler, runtime launcher, watcher registry and orchestrator
/// - termination signal handling
/// - task dispatch, then waits for the registry to drain
///
/// Returns once the process may exit cleanly. Pipeline failures have already
/// been logged and drained by the time this returns, so they are not
/// returned as errors.
///
/// A termination signal ends the wait even while a batch is still building;
/// the unfinished pipeline is dropped.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config_path();
    let cfg = load_and_validate(&config_path)?;
    let root = project_root(&config_path);

    // Unknown names are rejected by the dispatcher, not here.
    let task = args.task.parse::<Task>().ok();
    let configs = prepare_configs(&cfg, task);

    if args.dry_run {
        print_dry_run(&args.task, task, &configs, &cfg);
        return Ok(());
    }

    let (registry, exit_rx) = WatcherRegistry::new();

    let bundler: Arc<dyn Bundler> = Arc::new(CommandBundler::from_section(&cfg.bundler)?);
    let launcher = Arc::new(ProcessLauncher::new(
        cfg.config.interpreter.clone(),
        root.clone(),
    ));
    let runtimes = Arc::new(RuntimeSupervisor::new(launcher, root.clone()));

    let mut options = OrchestratorOptions::from_config(&cfg, root);
    if let Some(timeout) = args.timeout {
        options.batch_timeout = timeout;
    }

    let orchestrator = Orchestrator::new(
        bundler,
        Arc::clone(&registry),
        Arc::clone(&runtimes),
        options,
    );

    install_termination_handler(Arc::clone(&registry));

    let pipeline = async {
        let outcome = orchestrator
            .dispatch_named(&args.task, &configs, &args.passthrough)
            .await;

        match outcome {
            Ok(()) => {
                // A `run` that launched nothing has nothing left to wait for.
                if task == Some(Task::Run) && runtimes.launched().await.is_empty() {
                    info!("no runtime launched; shutting down");
                    registry.shutdown(None).await?;
                }
            }
            Err(err) => debug!(error = %err, "pipeline failed; watchers drained"),
        }
        Ok::<(), PolypackError>(())
    };

    let mut exit_rx = exit_rx;
    // Biased: a pipeline that fires the exit signal itself (e.g. `dist`)
    // completes in the same poll and counts as finished.
    let exited_early = tokio::select! {
        biased;
        outcome = pipeline => {
            outcome?;
            false
        }
        _ = &mut exit_rx => true,
    };

    if exited_early {
        info!("terminated while the pipeline was still running");
    } else {
        // Sender lives in the registry, which we hold: this only resolves on exit.
        let _ = exit_rx.await;
    }

    runtimes.stop_all().await;
    Ok(())
}

/// Mark configurations as watched when the task watches, then sign them.
fn prepare_configs(cfg: &ConfigFile, task: Option<Task>) -> Vec<SignedConfig> {
    let watch = task.is_some_and(Task::watches);
    sign_all(cfg.compilers().iter().cloned().map(|config| BuildConfig {
        watch,
        ..config
    }))
}

/// Simple dry-run output: print the pipeline and the signed configurations.
fn print_dry_run(name: &str, task: Option<Task>, configs: &[SignedConfig], cfg: &ConfigFile) {
    println!("polypack dry-run");
    match task {
        Some(task) => {
            println!("  task = {task}");
            for (idx, stage) in task.stages().iter().enumerate() {
                println!("    {}. {stage}", idx + 1);
            }
        }
        None => println!("  task = {name} (unknown; would be rejected)"),
    }
    println!("  config.batch_timeout = {:?}", cfg.timings().batch_timeout);
    println!("  config.poll_interval = {:?}", cfg.timings().poll_interval);
    println!("  bundler.cmd = {}", cfg.bundler.cmd);
    println!();

    println!("compilers ({}):", configs.len());
    for config in configs {
        println!("  - {}", config.signature());
        println!("      entry: {}", config.entry.display());
        println!("      out: {}", config.out.display());
        println!("      context: {}", config.context);
        println!("      mode: {}", config.mode);
        if config.run {
            println!("      run: true");
        }
        if config.watch {
            println!("      watch: true");
        }
        if config.restarts_runtime_on_rebuild() {
            println!("      on_rebuild: restart runtime");
        }
    }

    debug!("dry-run complete (no build)");
}

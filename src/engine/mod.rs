// src/engine/mod.rs

//! Orchestration engine for polypack.
//!
//! This module ties together:
//! - the coordinators that fan configurations out to the bundler and
//!   collect their results ([`coordinator`]);
//! - the watcher registry and shutdown sequencer ([`registry`]);
//! - the task dispatcher that composes both into pipelines ([`dispatch`]);
//! - the process-wide termination handler ([`signals`]).

pub mod coordinator;
pub mod dispatch;
pub mod registry;
pub mod signals;

pub use coordinator::{Orchestrator, OrchestratorOptions};
pub use dispatch::Task;
pub use registry::{ExitReceiver, WatcherId, WatcherRegistry};
pub use signals::{install_termination_handler, spawn_termination_listener};

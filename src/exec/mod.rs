// src/exec/mod.rs

//! Runtime process layer.
//!
//! After a build, run-flagged configurations get their output executed by an
//! interpreter (e.g. `node dist/server.js`). In watch mode a successful
//! rebuild restarts that process.
//!
//! - [`launcher`] provides the `RuntimeLauncher` / `RuntimeProcess` traits and
//!   `ProcessLauncher`, the `tokio::process` implementation used in
//!   production. Tests swap in a recording fake.
//! - [`supervisor`] owns launched runtimes keyed by configuration identity.

pub mod launcher;
pub mod supervisor;

pub use launcher::{LaunchSpec, ProcessLauncher, RuntimeLauncher, RuntimeProcess};
pub use supervisor::RuntimeSupervisor;

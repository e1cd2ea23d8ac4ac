use std::sync::{Arc, Mutex};

use polypack::bundler::BoxFuture;
use polypack::errors::{PolypackError, Result};
use polypack::exec::{LaunchSpec, RuntimeLauncher, RuntimeProcess};
use polypack::identity::Signature;

/// A call observed by [`FakeLauncher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherCall {
    Launch(LaunchSpec),
    Restart(Signature),
    Stop(Signature),
}

/// A launcher that records calls instead of spawning processes.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    calls: Arc<Mutex<Vec<LauncherCall>>>,
    fail_launch: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launch attempt fails.
    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<LauncherCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LauncherCall::Launch(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn restarts(&self) -> Vec<Signature> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LauncherCall::Restart(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl RuntimeLauncher for FakeLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn RuntimeProcess>> {
        if self.fail_launch {
            return Err(PolypackError::LaunchError(format!(
                "refusing to launch {}",
                spec.script.display()
            )));
        }

        self.calls
            .lock()
            .unwrap()
            .push(LauncherCall::Launch(spec.clone()));

        Ok(Box::new(FakeProcess {
            identity: spec.identity.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct FakeProcess {
    identity: Signature,
    calls: Arc<Mutex<Vec<LauncherCall>>>,
}

impl RuntimeProcess for FakeProcess {
    fn restart(&mut self) -> BoxFuture<'_, Result<()>> {
        self.calls
            .lock()
            .unwrap()
            .push(LauncherCall::Restart(self.identity.clone()));
        Box::pin(async { Ok(()) })
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<()>> {
        self.calls
            .lock()
            .unwrap()
            .push(LauncherCall::Stop(self.identity.clone()));
        Box::pin(async { Ok(()) })
    }
}

// src/engine/registry.rs

//! Watcher registry and shutdown sequencer.
//!
//! The registry is the only shared mutable state of the orchestrator. It
//! tracks how many watch sessions are alive and owns their handles until
//! shutdown closes them.
//!
//! Mutations are funnelled through two operations so that every increment
//! has exactly one matching decrement:
//! - [`WatcherRegistry::register`] (watch start): `count += 1`, handle stored.
//! - close completion (internal `deregister`): `count -= 1`.
//!
//! The terminal exit signal fires exactly once, from whichever path observes
//! the count at zero after shutdown was requested.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

use crate::bundler::WatchHandle;
use crate::errors::{PolypackError, Result};
use crate::identity::Signature;

/// Registry-local identifier of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

/// Completes when the registry has drained and the process may exit (code 0).
pub type ExitReceiver = oneshot::Receiver<()>;

struct RegisteredWatcher {
    identity: Signature,
    handle: Box<dyn WatchHandle>,
}

#[derive(Default)]
struct RegistryState {
    /// Watchers started and not yet closed.
    count: usize,
    next_id: u64,
    /// Handles not yet asked to close.
    handles: HashMap<WatcherId, RegisteredWatcher>,
    shutting_down: bool,
}

pub struct WatcherRegistry {
    state: Mutex<RegistryState>,
    /// Flips once, on the first shutdown request.
    requested: watch::Sender<bool>,
    terminated: watch::Sender<bool>,
    exit: Mutex<Option<oneshot::Sender<()>>>,
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("WatcherRegistry")
            .field("count", &state.count)
            .field("open_handles", &state.handles.len())
            .field("shutting_down", &state.shutting_down)
            .finish()
    }
}

impl WatcherRegistry {
    /// Create an empty registry plus the receiver for its exit signal.
    pub fn new() -> (Arc<Self>, ExitReceiver) {
        let (exit_tx, exit_rx) = oneshot::channel();
        let (requested, _) = watch::channel(false);
        let (terminated, _) = watch::channel(false);
        let registry = Arc::new(Self {
            state: Mutex::new(RegistryState::default()),
            requested,
            terminated,
            exit: Mutex::new(Some(exit_tx)),
        });
        (registry, exit_rx)
    }

    /// Take ownership of a freshly started watch session.
    ///
    /// If shutdown is already under way the session is closed right away, so
    /// a late watcher can never keep the process alive.
    pub fn register(self: &Arc<Self>, identity: Signature, handle: Box<dyn WatchHandle>) -> WatcherId {
        let mut state = self.lock_state();
        let id = WatcherId(state.next_id);
        state.next_id += 1;
        state.count += 1;
        let count = state.count;
        let watcher = RegisteredWatcher { identity, handle };

        if state.shutting_down {
            drop(state);
            warn!(
                compiler = %watcher.identity,
                "watcher started after shutdown was requested; closing it"
            );
            self.spawn_close(id, watcher);
        } else {
            info!(compiler = %watcher.identity, count, "watcher registered");
            state.handles.insert(id, watcher);
        }

        id
    }

    /// Number of watch sessions started and not yet closed.
    pub fn count(&self) -> usize {
        self.lock_state().count
    }

    /// Identities of the watchers still waiting to be closed.
    pub fn identities(&self) -> Vec<Signature> {
        let mut ids: Vec<Signature> = self
            .lock_state()
            .handles
            .values()
            .map(|w| w.identity.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock_state().shutting_down
    }

    /// Completes once shutdown has been requested (immediately if it already was).
    ///
    /// Pipelines race their waits against this so that a termination request
    /// is never stuck behind a batch deadline.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.requested.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Whether the exit signal has fired.
    pub fn has_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Close every open watcher, wait for the drain, then fire the exit signal.
    ///
    /// Safe to call concurrently and repeatedly: each watcher is asked to
    /// close once, and the exit signal fires once. Every caller returns after
    /// the drain finished.
    ///
    /// An `error` is logged and handed back as `Err` once the drain is done;
    /// callers must not continue the pipeline that produced it.
    pub async fn shutdown(self: &Arc<Self>, error: Option<PolypackError>) -> Result<()> {
        if let Some(err) = &error {
            error!(error = %err, "fatal error; shutting down");
        }

        let (pending, count) = {
            let mut state = self.lock_state();
            state.shutting_down = true;
            let pending: Vec<_> = state.handles.drain().collect();
            (pending, state.count)
        };
        self.requested.send_replace(true);

        if count == 0 {
            info!("polypack exited cleanly");
            self.terminate();
        } else if !pending.is_empty() {
            info!(count, "stopping watchers");
            for (id, watcher) in pending {
                self.spawn_close(id, watcher);
            }
        }

        self.wait_for_termination().await;

        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn spawn_close(self: &Arc<Self>, id: WatcherId, watcher: RegisteredWatcher) {
        let registry = Arc::clone(self);
        let RegisteredWatcher { identity, handle } = watcher;

        tokio::spawn(async move {
            handle.close().await;
            info!(compiler = %identity, "stopped compiling");
            registry.deregister(id);
        });
    }

    fn deregister(&self, id: WatcherId) {
        let drained = {
            let mut state = self.lock_state();
            state.handles.remove(&id);
            match state.count.checked_sub(1) {
                Some(count) => state.count = count,
                None => {
                    warn!(?id, "watcher closed with a zero count; ignoring");
                    return;
                }
            }
            state.count == 0 && state.shutting_down
        };

        if drained {
            info!("all watchers stopped. polypack exited cleanly");
            self.terminate();
        }
    }

    fn terminate(&self) {
        let exit = self
            .exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(exit) = exit {
            self.terminated.send_replace(true);
            // The receiver may be gone (e.g. in tests); the flag still records it.
            let _ = exit.send(());
        }
    }

    async fn wait_for_termination(&self) {
        let mut rx = self.terminated.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|done| *done).await;
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use polypack::bundler::{
    BoxFuture, BuildOutcome, BuildSettings, BuildStats, Bundler, BundlerError, WatchHandle,
};
use polypack::identity::Signature;

/// How the fake bundler reacts to a configuration, keyed by entry path.
#[derive(Debug, Clone)]
pub enum Script {
    /// Build succeeds.
    Succeed,
    /// Build runs but reports these errors.
    FailCompile(Vec<String>),
    /// The bundler cannot run at all.
    FailInvocation(String),
    /// The build never reports.
    Never,
    /// `watch` itself fails to start (run-once builds succeed).
    FailWatchStart,
}

impl Script {
    fn outcome(&self) -> Option<BuildOutcome> {
        match self {
            Script::Succeed | Script::FailWatchStart => Some(Ok(BuildStats::succeeded())),
            Script::FailCompile(errors) => Some(Ok(BuildStats::failed(errors.clone()))),
            Script::FailInvocation(msg) => Some(Err(BundlerError::Other(msg.clone()))),
            Script::Never => None,
        }
    }
}

#[derive(Default)]
struct FakeState {
    runs: Vec<Signature>,
    watching: HashMap<Signature, mpsc::UnboundedSender<BuildOutcome>>,
    watch_starts: Vec<Signature>,
    closes: Vec<Signature>,
}

/// A bundler that:
/// - records every run / watch / close call
/// - answers according to a per-entry [`Script`]
/// - lets tests push rebuilds into live watch sessions.
#[derive(Clone)]
pub struct FakeBundler {
    scripts: Arc<HashMap<PathBuf, Script>>,
    default: Script,
    close_delay: Duration,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBundler {
    /// Every configuration succeeds unless scripted otherwise.
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(HashMap::new()),
            default: Script::Succeed,
            close_delay: Duration::ZERO,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn with_script(mut self, entry: &str, script: Script) -> Self {
        Arc::make_mut(&mut self.scripts).insert(PathBuf::from(entry), script);
        self
    }

    /// Make each watcher close take this long.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    fn script_for(&self, settings: &BuildSettings) -> Script {
        self.scripts
            .get(&settings.entry)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn runs(&self) -> Vec<Signature> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn watch_starts(&self) -> Vec<Signature> {
        self.state.lock().unwrap().watch_starts.clone()
    }

    pub fn closes(&self) -> Vec<Signature> {
        self.state.lock().unwrap().closes.clone()
    }

    /// Push a rebuild outcome into the live watch session for `identity`.
    ///
    /// Returns false if there is no such session (never started or closed).
    pub fn rebuild(&self, identity: &Signature, outcome: BuildOutcome) -> bool {
        let state = self.state.lock().unwrap();
        match state.watching.get(identity) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl Default for FakeBundler {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundler for FakeBundler {
    fn run<'a>(&'a self, settings: &'a BuildSettings) -> BoxFuture<'a, BuildOutcome> {
        self.state.lock().unwrap().runs.push(settings.identity.clone());
        let script = self.script_for(settings);

        Box::pin(async move {
            match script.outcome() {
                Some(outcome) => outcome,
                None => std::future::pending::<BuildOutcome>().await,
            }
        })
    }

    fn watch(
        &self,
        settings: &BuildSettings,
        _poll_interval: Duration,
        on_build: mpsc::UnboundedSender<BuildOutcome>,
    ) -> Result<Box<dyn WatchHandle>, BundlerError> {
        let script = self.script_for(settings);
        if let Script::FailWatchStart = script {
            return Err(BundlerError::Other(format!(
                "cannot watch {}",
                settings.entry.display()
            )));
        }

        if let Some(outcome) = script.outcome() {
            let _ = on_build.send(outcome);
        }

        let mut state = self.state.lock().unwrap();
        state.watch_starts.push(settings.identity.clone());
        state.watching.insert(settings.identity.clone(), on_build);

        Ok(Box::new(FakeWatchHandle {
            identity: settings.identity.clone(),
            close_delay: self.close_delay,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeWatchHandle {
    identity: Signature,
    close_delay: Duration,
    state: Arc<Mutex<FakeState>>,
}

impl WatchHandle for FakeWatchHandle {
    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if !self.close_delay.is_zero() {
                tokio::time::sleep(self.close_delay).await;
            }
            let mut state = self.state.lock().unwrap();
            state.closes.push(self.identity.clone());
            state.watching.remove(&self.identity);
        })
    }
}

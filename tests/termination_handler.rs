// tests/termination_handler.rs
//
// Kept in its own test binary: the handler can only be installed once per
// process.

use polypack::engine::{install_termination_handler, WatcherRegistry};
use polypack_test_utils::init_tracing;

#[tokio::test]
async fn handler_installs_once_per_process() {
    init_tracing();

    let (registry, _exit_rx) = WatcherRegistry::new();

    assert!(install_termination_handler(registry.clone()));
    assert!(!install_termination_handler(registry.clone()));

    // Installing does not start a shutdown by itself.
    assert!(!registry.is_shutting_down());
}

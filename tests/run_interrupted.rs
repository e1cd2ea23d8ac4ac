// tests/run_interrupted.rs
//
// Kept in its own test binary: it installs the process-wide termination
// handler and sends SIGINT to this process.

#![cfg(unix)]

use std::time::{Duration, Instant};

use polypack::cli::CliArgs;
use polypack_test_utils::init_tracing;

#[tokio::test]
async fn sigint_during_a_dist_batch_returns_promptly() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("Polypack.toml");
    // The build signals its parent (this test process) half a second in,
    // then keeps "building" for far longer than the test allows.
    std::fs::write(
        &config_path,
        r#"
[config]
batch_timeout = "100s"

[bundler]
cmd = "sleep 0.5; kill -INT $PPID; sleep 8"

[[compiler]]
entry = "src/app.ts"
out = "dist/app.js"
"#,
    )
    .unwrap();

    let args = CliArgs {
        task: "dist".to_string(),
        config: Some(config_path),
        log_level: None,
        dry_run: false,
        timeout: None,
        passthrough: Vec::new(),
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(20), polypack::run(args))
        .await
        .expect("run() did not return");

    assert!(outcome.is_ok(), "termination is a clean exit: {outcome:?}");
    assert!(
        started.elapsed() < Duration::from_secs(4),
        "run() took {:?} after SIGINT",
        started.elapsed()
    );
}

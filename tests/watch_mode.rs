// tests/watch_mode.rs

use std::time::Duration;

use polypack::build::BuildStatus;
use polypack::bundler::BuildStats;
use polypack::errors::PolypackError;
use polypack::types::{Context, RebuildAction};
use polypack_test_utils::builders::{BuildConfigBuilder, HarnessBuilder};
use polypack_test_utils::fake_bundler::{FakeBundler, Script};
use polypack_test_utils::{init_tracing, wait_until, with_timeout};

#[tokio::test]
async fn watch_all_registers_one_watcher_per_configuration() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    let configs = vec![
        BuildConfigBuilder::new("src/a.ts", "dist/a.js").watch(true).signed(),
        BuildConfigBuilder::new("src/b.ts", "dist/b.js").watch(true).signed(),
        BuildConfigBuilder::new("src/c.ts", "dist/c.js")
            .context(Context::Web)
            .watch(true)
            .signed(),
    ];

    let results = with_timeout(harness.orchestrator.watch_all(&configs))
        .await
        .expect("first builds should all report");

    assert_eq!(results.len(), 3);
    assert!(results.values().all(|r| r.is_success()));
    assert_eq!(harness.registry.count(), 3);
    assert_eq!(harness.bundler.watch_starts().len(), 3);
    assert!(!harness.registry.is_shutting_down());
}

#[tokio::test]
async fn failed_first_build_still_counts_as_reported() {
    init_tracing();

    let bundler =
        FakeBundler::new().with_script("src/a.ts", Script::FailCompile(vec!["error: x".into()]));
    let harness = HarnessBuilder::new(bundler).build();
    let config = BuildConfigBuilder::new("src/a.ts", "dist/a.js").watch(true).signed();

    let results = with_timeout(harness.orchestrator.watch_all(std::slice::from_ref(&config)))
        .await
        .expect("an error report completes the batch");

    assert_eq!(results[config.signature()].status, BuildStatus::Error);
    // The session stays open so a fix can be picked up.
    assert_eq!(harness.registry.count(), 1);
}

#[tokio::test]
async fn watch_start_failure_is_recorded_as_error() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/broken.ts", Script::FailWatchStart);
    let harness = HarnessBuilder::new(bundler).build();
    let ok = BuildConfigBuilder::new("src/ok.ts", "dist/ok.js").watch(true).signed();
    let broken = BuildConfigBuilder::new("src/broken.ts", "dist/broken.js")
        .watch(true)
        .signed();

    let results = with_timeout(harness.orchestrator.watch_all(&[ok.clone(), broken.clone()]))
        .await
        .expect("batch should resolve");

    assert!(results[ok.signature()].is_success());
    assert_eq!(results[broken.signature()].status, BuildStatus::Error);
    assert_eq!(harness.registry.count(), 1);
}

#[tokio::test]
async fn rebuilds_after_the_batch_update_latest_results() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    let config = BuildConfigBuilder::new("src/a.ts", "dist/a.js").watch(true).signed();

    with_timeout(harness.orchestrator.watch_all(std::slice::from_ref(&config)))
        .await
        .expect("batch should resolve");
    assert!(harness.orchestrator.latest_results()[config.signature()].is_success());

    assert!(harness.bundler.rebuild(
        config.signature(),
        Ok(BuildStats::failed(vec!["error: typo".into()]))
    ));

    let orchestrator = &harness.orchestrator;
    let sig = config.signature();
    assert!(
        wait_until(|| orchestrator.latest_results()[sig].status == BuildStatus::Error).await,
        "rebuild result never recorded"
    );
}

#[tokio::test]
async fn silent_watcher_times_out_but_stays_registered() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/slow.ts", Script::Never);
    let harness = HarnessBuilder::new(bundler)
        .batch_timeout(Duration::from_millis(150))
        .build();
    let fast = BuildConfigBuilder::new("src/fast.ts", "dist/fast.js").watch(true).signed();
    let slow = BuildConfigBuilder::new("src/slow.ts", "dist/slow.js").watch(true).signed();

    let err = with_timeout(harness.orchestrator.watch_all(&[fast.clone(), slow.clone()]))
        .await
        .expect_err("silent watcher must fail the batch");

    match err {
        PolypackError::BatchTimeout { partial, missing } => {
            assert!(partial[fast.signature()].is_success());
            assert_eq!(missing, vec![slow.signature().clone()]);
        }
        other => panic!("expected BatchTimeout, got {other:?}"),
    }

    // Closing is the shutdown sequencer's job, not the coordinator's.
    assert_eq!(harness.registry.count(), 2);
}

#[tokio::test]
async fn successful_rebuild_restarts_only_watched_run_configs() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    let server = BuildConfigBuilder::new("src/server.ts", "dist/server.js")
        .watch(true)
        .run(true)
        .signed();
    let quiet = BuildConfigBuilder::new("src/worker.ts", "dist/worker.js")
        .watch(true)
        .run(true)
        .on_rebuild(RebuildAction::None)
        .signed();
    let configs = vec![server.clone(), quiet.clone()];

    with_timeout(harness.orchestrator.watch_all(&configs))
        .await
        .expect("batch should resolve");
    harness
        .orchestrator
        .runtimes()
        .launch_selected(&configs, &[])
        .await
        .expect("launch should succeed");
    assert_eq!(harness.launcher.launches().len(), 2);

    harness
        .bundler
        .rebuild(quiet.signature(), Ok(BuildStats::succeeded()));
    harness
        .bundler
        .rebuild(server.signature(), Ok(BuildStats::failed(vec!["e".into()])));
    harness
        .bundler
        .rebuild(server.signature(), Ok(BuildStats::succeeded()));

    let launcher = &harness.launcher;
    assert!(wait_until(|| !launcher.restarts().is_empty()).await);
    // Give any stray restart a chance to show up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(launcher.restarts(), vec![server.signature().clone()]);
    assert_eq!(launcher.launches().len(), 2);
}

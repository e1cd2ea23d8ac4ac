// tests/shutdown.rs

use std::time::Duration;

use tokio::sync::oneshot;

use polypack::engine::{spawn_termination_listener, WatcherRegistry};
use polypack::errors::PolypackError;
use polypack::identity::Signature;
use polypack_test_utils::builders::{BuildConfigBuilder, HarnessBuilder};
use polypack_test_utils::fake_bundler::{FakeBundler, Script};
use polypack_test_utils::{init_tracing, wait_until, with_timeout};

fn watched(n: usize) -> Vec<polypack::identity::SignedConfig> {
    (0..n)
        .map(|i| {
            BuildConfigBuilder::new(&format!("src/w{i}.ts"), &format!("dist/w{i}.js"))
                .watch(true)
                .signed()
        })
        .collect()
}

fn sorted(mut ids: Vec<Signature>) -> Vec<Signature> {
    ids.sort();
    ids
}

#[tokio::test]
async fn shutdown_with_no_watchers_terminates_immediately() {
    init_tracing();

    let (registry, exit_rx) = WatcherRegistry::new();

    with_timeout(registry.shutdown(None))
        .await
        .expect("shutdown without error succeeds");

    assert!(registry.has_terminated());
    assert_eq!(registry.count(), 0);
    with_timeout(exit_rx).await.expect("exit signal fired");
}

#[tokio::test]
async fn shutdown_closes_every_watcher_once_then_exits() {
    init_tracing();

    let mut harness = HarnessBuilder::new(FakeBundler::new()).build();
    let configs = watched(3);

    with_timeout(harness.orchestrator.watch_all(&configs))
        .await
        .expect("batch should resolve");
    assert_eq!(harness.registry.count(), 3);
    assert_eq!(harness.registry.identities().len(), 3);

    with_timeout(harness.registry.shutdown(None))
        .await
        .expect("shutdown succeeds");

    assert_eq!(harness.registry.count(), 0);
    assert!(harness.registry.identities().is_empty());
    assert!(harness.registry.has_terminated());
    assert_eq!(
        sorted(harness.bundler.closes()),
        sorted(configs.iter().map(|c| c.signature().clone()).collect())
    );
    assert!(harness.exit_rx.try_recv().is_ok());
}

#[tokio::test]
async fn shutdown_with_error_drains_then_returns_it() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    let configs = watched(2);
    with_timeout(harness.orchestrator.watch_all(&configs))
        .await
        .expect("batch should resolve");

    let err = with_timeout(
        harness
            .registry
            .shutdown(Some(PolypackError::UnknownTask("bogus".into()))),
    )
    .await
    .expect_err("the error comes back to the caller");

    assert!(matches!(err, PolypackError::UnknownTask(name) if name == "bogus"));
    // By the time the error is returned, the drain is complete.
    assert_eq!(harness.registry.count(), 0);
    assert_eq!(harness.bundler.closes().len(), 2);
    assert!(harness.registry.has_terminated());
}

#[tokio::test]
async fn concurrent_shutdowns_close_each_watcher_once() {
    init_tracing();

    let bundler = FakeBundler::new().with_close_delay(Duration::from_millis(50));
    let mut harness = HarnessBuilder::new(bundler).build();
    let configs = watched(2);
    with_timeout(harness.orchestrator.watch_all(&configs))
        .await
        .expect("batch should resolve");

    let (first, second) = with_timeout(async {
        tokio::join!(
            harness.registry.shutdown(None),
            harness.registry.shutdown(None)
        )
    })
    .await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(harness.bundler.closes().len(), 2);
    assert_eq!(harness.registry.count(), 0);
    assert!(harness.exit_rx.try_recv().is_ok());

    // A third call after termination returns straight away.
    with_timeout(harness.registry.shutdown(None))
        .await
        .expect("repeat shutdown succeeds");
    assert_eq!(harness.bundler.closes().len(), 2);
}

#[tokio::test]
async fn watcher_started_after_shutdown_is_closed_right_away() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    with_timeout(harness.registry.shutdown(None))
        .await
        .expect("shutdown succeeds");

    let late = watched(1);
    with_timeout(harness.orchestrator.watch_all(&late))
        .await
        .expect("first build still reports");

    let bundler = &harness.bundler;
    assert!(wait_until(|| bundler.closes().len() == 1).await);
    let registry = &harness.registry;
    assert!(wait_until(|| registry.count() == 0).await);
    assert!(registry.identities().is_empty());
}

#[tokio::test]
async fn termination_signal_shuts_the_registry_down() {
    init_tracing();

    let mut harness = HarnessBuilder::new(FakeBundler::new()).build();
    let configs = watched(2);
    with_timeout(harness.orchestrator.watch_all(&configs))
        .await
        .expect("batch should resolve");

    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let listener = spawn_termination_listener(harness.registry.clone(), async move {
        signal_rx
            .await
            .map_err(|_| std::io::Error::other("signal source dropped"))
    });

    // Nothing happens before the signal arrives.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.registry.count(), 2);
    assert!(harness.bundler.closes().is_empty());

    signal_tx.send(()).expect("listener is waiting");
    with_timeout(&mut harness.exit_rx)
        .await
        .expect("exit signal fired");
    with_timeout(listener).await.expect("listener finished");

    assert_eq!(harness.registry.count(), 0);
    assert_eq!(
        sorted(harness.bundler.closes()),
        sorted(configs.iter().map(|c| c.signature().clone()).collect())
    );
}

#[tokio::test]
async fn failed_signal_source_does_not_shut_down() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    let listener = spawn_termination_listener(harness.registry.clone(), async {
        Err(std::io::Error::other("no signal support"))
    });

    with_timeout(listener).await.expect("listener finished");
    assert!(!harness.registry.is_shutting_down());
    assert!(!harness.registry.has_terminated());
}

#[tokio::test]
async fn shutdown_interrupts_a_running_batch() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/w1.ts", Script::Never);
    // The deadline is far away: only the shutdown can end this batch.
    let harness = HarnessBuilder::new(bundler)
        .batch_timeout(Duration::from_secs(3600))
        .build();
    let configs: Vec<_> = (0..2)
        .map(|i| BuildConfigBuilder::new(&format!("src/w{i}.ts"), &format!("dist/w{i}.js")).signed())
        .collect();

    let registry = harness.registry.clone();
    let (batch, shutdown) = with_timeout(async {
        tokio::join!(harness.orchestrator.run_all(&configs), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registry.shutdown(None).await
        })
    })
    .await;

    assert!(shutdown.is_ok());
    match batch {
        Err(PolypackError::Interrupted { partial, missing }) => {
            assert!(partial[configs[0].signature()].is_success());
            assert_eq!(missing, vec![configs[1].signature().clone()]);
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_interrupts_a_watch_batch_waiting_on_a_silent_watcher() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/w0.ts", Script::Never);
    let harness = HarnessBuilder::new(bundler)
        .batch_timeout(Duration::from_secs(3600))
        .build();
    let configs = watched(1);

    let registry = harness.registry.clone();
    let (batch, shutdown) = with_timeout(async {
        tokio::join!(harness.orchestrator.watch_all(&configs), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registry.shutdown(None).await
        })
    })
    .await;

    assert!(shutdown.is_ok());
    assert!(matches!(batch, Err(PolypackError::Interrupted { .. })));
    assert_eq!(harness.bundler.closes(), vec![configs[0].signature().clone()]);
    assert_eq!(harness.registry.count(), 0);
}

#[tokio::test]
async fn batch_started_after_shutdown_ends_at_once() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/w0.ts", Script::Never);
    let harness = HarnessBuilder::new(bundler)
        .batch_timeout(Duration::from_secs(3600))
        .build();
    with_timeout(harness.registry.shutdown(None))
        .await
        .expect("shutdown succeeds");

    let batch = with_timeout(harness.orchestrator.run_all(&watched(1))).await;
    assert!(matches!(batch, Err(PolypackError::Interrupted { .. })));
}

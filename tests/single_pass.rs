// tests/single_pass.rs

use std::time::Duration;

use proptest::prelude::*;

use polypack::build::BuildStatus;
use polypack::errors::PolypackError;
use polypack::identity::SignedConfig;
use polypack_test_utils::builders::{BuildConfigBuilder, HarnessBuilder};
use polypack_test_utils::fake_bundler::{FakeBundler, Script};
use polypack_test_utils::{init_tracing, with_timeout};

fn configs(n: usize) -> Vec<SignedConfig> {
    (0..n)
        .map(|i| {
            BuildConfigBuilder::new(&format!("src/e{i}.ts"), &format!("dist/o{i}.js")).signed()
        })
        .collect()
}

#[tokio::test]
async fn run_all_reports_every_configuration() {
    init_tracing();

    let bundler = FakeBundler::new()
        .with_script("src/e1.ts", Script::FailCompile(vec!["error: boom".into()]))
        .with_script("src/e2.ts", Script::FailInvocation("esbuild not found".into()));
    let harness = HarnessBuilder::new(bundler).build();
    let configs = configs(3);

    let results = with_timeout(harness.orchestrator.run_all(&configs))
        .await
        .expect("batch should resolve");

    assert_eq!(results.len(), 3);
    assert_eq!(results[configs[0].signature()].status, BuildStatus::Success);
    assert_eq!(results[configs[1].signature()].status, BuildStatus::Error);
    assert_eq!(results[configs[2].signature()].status, BuildStatus::Error);

    // Every build ran exactly once.
    let mut runs = harness.bundler.runs();
    runs.sort();
    let mut expected: Vec<_> = configs.iter().map(|c| c.signature().clone()).collect();
    expected.sort();
    assert_eq!(runs, expected);
}

#[tokio::test]
async fn run_all_with_no_configurations_resolves_immediately() {
    init_tracing();

    // A one-hour timeout: the test would hang if the batch waited for it.
    let harness = HarnessBuilder::new(FakeBundler::new())
        .batch_timeout(Duration::from_secs(3600))
        .build();

    let results = with_timeout(harness.orchestrator.run_all(&[]))
        .await
        .expect("empty batch should resolve");

    assert!(results.is_empty());
    assert!(harness.bundler.runs().is_empty());
}

#[tokio::test]
async fn silent_configuration_times_out_with_partial_results() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/e2.ts", Script::Never);
    let harness = HarnessBuilder::new(bundler)
        .batch_timeout(Duration::from_millis(200))
        .build();
    let configs = configs(3);

    let err = with_timeout(harness.orchestrator.run_all(&configs))
        .await
        .expect_err("silent configuration must fail the batch");

    match err {
        PolypackError::BatchTimeout { partial, missing } => {
            assert_eq!(partial.len(), 2);
            assert!(partial.contains_key(configs[0].signature()));
            assert!(partial.contains_key(configs[1].signature()));
            assert_eq!(missing, vec![configs[2].signature().clone()]);
        }
        other => panic!("expected BatchTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_timeout_message_lists_partial_results() {
    init_tracing();

    let bundler = FakeBundler::new().with_script("src/e1.ts", Script::Never);
    let harness = HarnessBuilder::new(bundler)
        .batch_timeout(Duration::from_millis(100))
        .build();
    let configs = configs(2);

    let err = with_timeout(harness.orchestrator.run_all(&configs))
        .await
        .expect_err("batch should time out");

    let message = err.to_string();
    assert!(message.starts_with("compiler timed out with the results"));
    assert!(message.contains(&format!("{}=success", configs[0].signature())));
    assert!(!message.contains(configs[1].signature().as_str()));
}

#[tokio::test]
async fn duplicate_configurations_collapse_to_one_entry() {
    init_tracing();

    let harness = HarnessBuilder::new(FakeBundler::new()).build();
    let one = BuildConfigBuilder::new("src/a.ts", "dist/a.js").signed();
    let configs = vec![one.clone(), one.clone()];

    let results = with_timeout(harness.orchestrator.run_all(&configs))
        .await
        .expect("batch should resolve");

    assert_eq!(results.len(), 1);
    assert!(results[one.signature()].is_success());
}

#[tokio::test]
async fn run_one_and_latest_results() {
    init_tracing();

    let bundler =
        FakeBundler::new().with_script("src/bad.ts", Script::FailCompile(vec!["x".into()]));
    let harness = HarnessBuilder::new(bundler).build();

    let good = BuildConfigBuilder::new("src/good.ts", "dist/good.js").signed();
    let bad = BuildConfigBuilder::new("src/bad.ts", "dist/bad.js").signed();

    let record = with_timeout(harness.orchestrator.run_one(&good)).await;
    assert_eq!(&record.compiler, good.signature());
    assert!(record.is_success());

    let record = with_timeout(harness.orchestrator.run_one(&bad)).await;
    assert_eq!(record.status, BuildStatus::Error);

    let latest = harness.orchestrator.latest_results();
    assert_eq!(latest.len(), 2);
    assert!(latest[good.signature()].is_success());
    assert!(!latest[bad.signature()].is_success());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn one_record_per_configuration(outcomes in prop::collection::vec(0u8..3, 0..8)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let mut bundler = FakeBundler::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            let script = match outcome {
                0 => Script::Succeed,
                1 => Script::FailCompile(vec!["error".into()]),
                _ => Script::FailInvocation("spawn failed".into()),
            };
            bundler = bundler.with_script(&format!("src/e{i}.ts"), script);
        }
        let harness = HarnessBuilder::new(bundler).build();
        let configs = configs(outcomes.len());

        let results = rt.block_on(harness.orchestrator.run_all(&configs)).unwrap();

        prop_assert_eq!(results.len(), outcomes.len());
        for (config, outcome) in configs.iter().zip(&outcomes) {
            let expected = if *outcome == 0 { BuildStatus::Success } else { BuildStatus::Error };
            prop_assert_eq!(results[config.signature()].status, expected);
        }
    }
}

use std::future::pending;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::time::{sleep, Instant};
use wordcount_setup::{
    run, run_until_interrupted, InsertError, RequestError, SetupConfig, SetupError,
};

use crate::utils::{setup_tracing, test_names, Call, MockCluster};

fn config() -> SetupConfig {
    SetupConfig {
        names: test_names("wordcount"),
        ..SetupConfig::default()
    }
}

fn is_create(call: &Call, what: &str) -> bool {
    matches!(call, Call::Execute(s, _) if s.starts_with(what))
}

#[tokio::test(start_paused = true)]
async fn fresh_cluster() {
    setup_tracing();
    let cluster = MockCluster::new(3);

    let report = run(&cluster, &config()).await.unwrap();

    assert!(report.schema.keyspace_created);
    assert_eq!(report.schema.conflicts(), 0);
    assert_eq!(report.seed.rows_inserted, 5316);

    let calls = cluster.calls();
    assert_eq!(
        calls.iter().filter(|c| is_create(c, "CREATE KEYSPACE")).count(),
        1
    );
    assert_eq!(
        calls
            .iter()
            .filter(|c| is_create(c, "CREATE TABLE") || is_create(c, "CREATE INDEX"))
            .count(),
        3
    );
    assert_eq!(
        calls.iter().filter(|c| matches!(c, Call::Prepare(_))).count(),
        1
    );
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, Call::ExecutePrepared(..)))
            .count(),
        5316
    );

    // Keyspace, wait, use, then DDL, then seeding.
    let position = |pred: &dyn Fn(&Call) -> bool| calls.iter().position(pred).unwrap();
    let ring = position(&|c| matches!(c, Call::RingSize(_)));
    let use_ks = position(&|c| matches!(c, Call::UseKeyspace(_)));
    let first_table = position(&|c| is_create(c, "CREATE TABLE"));
    let prepare = position(&|c| matches!(c, Call::Prepare(_)));
    assert!(position(&|c| is_create(c, "CREATE KEYSPACE")) < ring);
    assert!(ring < use_ks);
    assert!(use_ks < first_table);
    assert!(first_table < prepare);
}

#[tokio::test(start_paused = true)]
async fn existing_schema() {
    setup_tracing();
    let cluster = MockCluster::new(3);
    run(&cluster, &config()).await.unwrap();
    let schema = cluster.schema_snapshot();
    let calls_before = cluster.calls().len();

    let report = run(&cluster, &config()).await.unwrap();

    assert!(!report.schema.keyspace_created);
    assert_eq!(report.schema.conflicts(), 3);
    assert_eq!(report.seed.rows_inserted, 5316);
    assert_eq!(cluster.schema_snapshot(), schema);
    assert_eq!(cluster.rows().len(), 5316);

    let second_run = &cluster.calls()[calls_before..];
    assert!(!second_run.iter().any(|c| is_create(c, "CREATE KEYSPACE")));
    assert!(!second_run.iter().any(|c| matches!(c, Call::RingSize(_))));
    assert_eq!(
        second_run
            .iter()
            .filter(|c| is_create(c, "CREATE TABLE") || is_create(c, "CREATE INDEX"))
            .count(),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn insert_timeout_aborts_the_run() {
    setup_tracing();
    let cluster = MockCluster::new(1)
        .with_failing_insert(100, RequestError::Timeout("Operation timed out".to_owned()));

    let err = run(&cluster, &config()).await.unwrap_err();

    assert_matches!(
        err,
        SetupError::Seed(InsertError::Execute {
            attempt: 100,
            source: RequestError::Timeout(_),
            ..
        })
    );
    assert!(cluster.count_calls(|c| matches!(c, Call::ExecutePrepared(..))) <= 100);
}

#[tokio::test(start_paused = true)]
async fn lookup_failure_stops_before_seeding() {
    setup_tracing();
    let cluster = MockCluster::new(1).with_lookup_error(RequestError::Other("broken".to_owned()));

    let err = run(&cluster, &config()).await.unwrap_err();

    assert_matches!(err, SetupError::Schema(_));
    assert_eq!(
        cluster.count_calls(|c| matches!(c, Call::Prepare(_) | Call::ExecutePrepared(..))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn uninterrupted_run_completes() {
    setup_tracing();
    let cluster = MockCluster::new(2);

    let report = run_until_interrupted(&cluster, &config(), pending())
        .await
        .unwrap();

    assert!(report.schema.keyspace_created);
    assert_eq!(report.seed.rows_inserted, 5316);
}

#[tokio::test(start_paused = true)]
async fn interruption_during_seeding_aborts_the_run() {
    setup_tracing();
    let cluster = MockCluster::new(1).with_insert_delay(Duration::from_millis(1));

    // The propagation wait ends at 1000 ms, seeding would take another 5316 ms.
    let start = Instant::now();
    let err = run_until_interrupted(&cluster, &config(), sleep(Duration::from_millis(2500)))
        .await
        .unwrap_err();

    assert_matches!(err, SetupError::Interrupted);
    assert_eq!(start.elapsed().as_millis(), 2500);
    assert_eq!(
        cluster.count_calls(|c| is_create(c, "CREATE TABLE") || is_create(c, "CREATE INDEX")),
        3
    );
    let rows = cluster.rows().len();
    assert!(rows > 0);
    assert!(rows < 5316);

    // Nothing is sent after the interruption.
    let sent = cluster.count_calls(|c| matches!(c, Call::ExecutePrepared(..)));
    sleep(Duration::from_secs(10)).await;
    assert_eq!(
        cluster.count_calls(|c| matches!(c, Call::ExecutePrepared(..))),
        sent
    );
}

#[tokio::test(start_paused = true)]
async fn interruption_during_propagation_wait_aborts_the_run() {
    setup_tracing();
    let cluster = MockCluster::new(3);

    let err = run_until_interrupted(&cluster, &config(), sleep(Duration::from_millis(500)))
        .await
        .unwrap_err();

    assert_matches!(err, SetupError::Interrupted);
    assert_eq!(
        cluster.count_calls(|c| matches!(c, Call::UseKeyspace(_) | Call::Prepare(_))),
        0
    );
}

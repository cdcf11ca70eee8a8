use assert_matches::assert_matches;
use scylla::statement::Consistency;
use wordcount_setup::{
    DdlOutcome, DdlStep, PropagationWaiter, RequestError, SchemaBootstrapper, SchemaError,
};

use crate::utils::{setup_tracing, test_names, Call, MockCluster};

fn bootstrapper() -> SchemaBootstrapper {
    SchemaBootstrapper::new(test_names("wordcount"), PropagationWaiter::default())
}

#[tokio::test(start_paused = true)]
async fn creates_everything_on_empty_cluster() {
    setup_tracing();
    let cluster = MockCluster::new(1);

    let report = bootstrapper().ensure_schema(&cluster).await.unwrap();

    assert!(report.keyspace_created);
    assert_eq!(
        report.steps,
        vec![
            (DdlStep::InputTable, DdlOutcome::Created),
            (DdlStep::TitleIndex, DdlOutcome::Created),
            (DdlStep::OutputTable, DdlOutcome::Created),
        ]
    );

    let (keyspaces, indexes) = cluster.schema_snapshot();
    assert_eq!(
        keyspaces["wordcount"].iter().collect::<Vec<_>>(),
        vec!["input_words", "output_words"]
    );
    assert!(indexes.contains("wordcount.title"));

    assert_eq!(
        cluster.calls(),
        vec![
            Call::DescribeKeyspace("wordcount".to_owned()),
            Call::Execute(
                "CREATE KEYSPACE wordcount WITH replication = {'class': 'SimpleStrategy', 'replication_factor' : 1}".to_owned(),
                Consistency::One
            ),
            Call::RingSize("wordcount".to_owned()),
            Call::UseKeyspace("wordcount".to_owned()),
            Call::Execute(
                "CREATE TABLE wordcount.input_words (user_id text, category_id text, sub_category_id text, title text, body text, PRIMARY KEY (user_id, category_id, sub_category_id))".to_owned(),
                Consistency::One
            ),
            Call::Execute(
                "CREATE INDEX title on input_words(title)".to_owned(),
                Consistency::One
            ),
            Call::Execute(
                "CREATE TABLE wordcount.output_words (row_id text, word text, count_num text, PRIMARY KEY (row_id, word))".to_owned(),
                Consistency::One
            ),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn second_bootstrap_is_a_no_op() {
    setup_tracing();
    let cluster = MockCluster::new(3);

    bootstrapper().ensure_schema(&cluster).await.unwrap();
    let after_first = cluster.schema_snapshot();

    let report = bootstrapper().ensure_schema(&cluster).await.unwrap();
    assert!(!report.keyspace_created);
    assert_eq!(report.conflicts(), 3);
    assert_eq!(report.failures(), 0);
    assert_eq!(cluster.schema_snapshot(), after_first);

    // The keyspace was found, so it was neither created nor waited for again.
    let creates = cluster.count_calls(
        |call| matches!(call, Call::Execute(s, _) if s.starts_with("CREATE KEYSPACE")),
    );
    assert_eq!(creates, 1);
    assert_eq!(
        cluster.count_calls(|call| matches!(call, Call::RingSize(_))),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn lookup_failure_aborts() {
    setup_tracing();
    let cluster =
        MockCluster::new(1).with_lookup_error(RequestError::Unavailable("no replicas".to_owned()));

    let err = bootstrapper().ensure_schema(&cluster).await.unwrap_err();

    assert_matches!(
        err,
        SchemaError::Lookup { keyspace, source: RequestError::Unavailable(_) } if keyspace == "wordcount"
    );
    assert!(cluster.executed_statements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn keyspace_created_concurrently_is_tolerated() {
    setup_tracing();
    let cluster = MockCluster::new(2).with_keyspace_race();

    let report = bootstrapper().ensure_schema(&cluster).await.unwrap();

    assert!(!report.keyspace_created);
    assert_eq!(report.conflicts(), 0);
    assert_eq!(
        cluster.count_calls(|call| matches!(call, Call::RingSize(_))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn keyspace_creation_failure_aborts() {
    setup_tracing();
    let cluster = MockCluster::new(1).with_failing_statement(
        "CREATE KEYSPACE",
        RequestError::Timeout("schema change".to_owned()),
    );

    let err = bootstrapper().ensure_schema(&cluster).await.unwrap_err();

    assert_matches!(err, SchemaError::CreateKeyspace { .. });
    assert_eq!(cluster.executed_statements().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn ddl_failures_do_not_stop_later_steps() {
    setup_tracing();
    let cluster = MockCluster::new(1).with_failing_statement(
        "CREATE INDEX",
        RequestError::Invalid("Secondary indexes are disabled".to_owned()),
    );

    let report = bootstrapper().ensure_schema(&cluster).await.unwrap();

    assert_eq!(
        report.outcome(DdlStep::TitleIndex),
        Some(&DdlOutcome::Failed(RequestError::Invalid(
            "Secondary indexes are disabled".to_owned()
        )))
    );
    assert_eq!(
        report.outcome(DdlStep::OutputTable),
        Some(&DdlOutcome::Created)
    );
    assert_eq!(report.failures(), 1);
    assert_eq!(report.conflicts(), 0);
}

#[tokio::test(start_paused = true)]
async fn use_keyspace_failure_aborts() {
    setup_tracing();
    let cluster = MockCluster::new(1)
        .with_use_keyspace_error(RequestError::Other("disconnected".to_owned()));

    assert_matches!(
        bootstrapper().ensure_schema(&cluster).await,
        Err(SchemaError::UseKeyspace { keyspace, .. }) if keyspace == "wordcount"
    );
    // Nothing that depends on the keyspace being in use was attempted.
    assert_eq!(cluster.executed_statements().len(), 1);
}

//! Idempotent creation of the keyspace, the tables and the title index.
//!
//! DDL is not idempotent on the server side: creating an existing object is an
//! error. The bootstrapper checks for the keyspace before creating it, and
//! absorbs "already exists" answers to the table and index DDL, so it can be
//! rerun against a partially initialized cluster.

use std::fmt;

use tracing::{error, info, warn};

use crate::client::ClusterClient;
use crate::config::SchemaNames;
use crate::errors::{RequestError, SchemaError};
use crate::propagation::PropagationWaiter;
use crate::statements;
use crate::SETUP_CONSISTENCY;

/// DDL statements issued once the keyspace is in use, in issue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DdlStep {
    /// `CREATE TABLE` of the input table.
    InputTable,
    /// `CREATE INDEX` on the input table's `title` column.
    TitleIndex,
    /// `CREATE TABLE` of the output table.
    OutputTable,
}

impl fmt::Display for DdlStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DdlStep::InputTable => "input table",
            DdlStep::TitleIndex => "title index",
            DdlStep::OutputTable => "output table",
        })
    }
}

/// How a DDL step ended. None of these abort the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DdlOutcome {
    /// Object was created.
    Created,
    /// Object existed before.
    AlreadyExists,
    /// Creation failed for another reason.
    Failed(RequestError),
}

/// Summary of a bootstrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaReport {
    /// Whether this run created the keyspace.
    pub keyspace_created: bool,
    /// Outcome of every DDL step, in issue order.
    pub steps: Vec<(DdlStep, DdlOutcome)>,
}

impl SchemaReport {
    /// Outcome of `step`, if it was attempted.
    pub fn outcome(&self, step: DdlStep) -> Option<&DdlOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    /// Number of steps that found their object already there.
    pub fn conflicts(&self) -> usize {
        self.count(|outcome| matches!(outcome, DdlOutcome::AlreadyExists))
    }

    /// Number of steps that failed for another reason.
    pub fn failures(&self) -> usize {
        self.count(|outcome| matches!(outcome, DdlOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&DdlOutcome) -> bool) -> usize {
        self.steps.iter().filter(|(_, outcome)| pred(outcome)).count()
    }
}

// Cassandra reports some duplicates, such as an existing index, as an invalid
// request rather than with the dedicated error code.
fn is_conflict(err: &RequestError) -> bool {
    match err {
        RequestError::AlreadyExists { .. } => true,
        RequestError::Invalid(message) => message.to_lowercase().contains("already exists"),
        _ => false,
    }
}

/// Creates the keyspace and tables named in a [`SchemaNames`].
#[derive(Clone, Debug)]
pub struct SchemaBootstrapper {
    names: SchemaNames,
    waiter: PropagationWaiter,
}

impl SchemaBootstrapper {
    /// Creates a bootstrapper for `names` that waits for a new keyspace with `waiter`.
    pub fn new(names: SchemaNames, waiter: PropagationWaiter) -> Self {
        SchemaBootstrapper { names, waiter }
    }

    /// Ensures the keyspace, both tables and the title index exist, and leaves
    /// the keyspace in use on `client`.
    ///
    /// Only keyspace lookup, creation, selection and the propagation wait can
    /// fail the bootstrap. Table and index DDL failures are logged and
    /// reported in the returned [`SchemaReport`].
    pub async fn ensure_schema<C>(&self, client: &C) -> Result<SchemaReport, SchemaError>
    where
        C: ClusterClient + ?Sized,
    {
        let keyspace_created = self.ensure_keyspace(client).await?;

        let keyspace = &self.names.keyspace;
        client
            .use_keyspace(keyspace.as_str())
            .await
            .map_err(|source| SchemaError::UseKeyspace {
                keyspace: keyspace.to_string(),
                source,
            })?;

        let ddl = [
            (
                DdlStep::InputTable,
                statements::create_input_table(keyspace, &self.names.input_table),
            ),
            (
                DdlStep::TitleIndex,
                statements::create_title_index(&self.names.input_table),
            ),
            (
                DdlStep::OutputTable,
                statements::create_output_table(keyspace, &self.names.output_table),
            ),
        ];

        let mut steps = Vec::with_capacity(ddl.len());
        for (step, statement) in ddl {
            let outcome = self.create(client, step, &statement).await;
            steps.push((step, outcome));
        }

        let report = SchemaReport {
            keyspace_created,
            steps,
        };
        info!(
            "Schema of keyspace {} ready: keyspace created: {}, conflicts: {}, failures: {}",
            keyspace,
            report.keyspace_created,
            report.conflicts(),
            report.failures()
        );
        Ok(report)
    }

    /// Returns whether the keyspace was created by this call.
    async fn ensure_keyspace<C>(&self, client: &C) -> Result<bool, SchemaError>
    where
        C: ClusterClient + ?Sized,
    {
        let keyspace = &self.names.keyspace;
        let existing = client
            .describe_keyspace(keyspace.as_str())
            .await
            .map_err(|source| SchemaError::Lookup {
                keyspace: keyspace.to_string(),
                source,
            })?;

        if let Some(metadata) = existing {
            info!(
                "Keyspace {} already exists with {} table(s)",
                metadata.name,
                metadata.tables.len()
            );
            return Ok(false);
        }

        info!("Setting up keyspace {}", keyspace);
        match client
            .execute(&statements::create_keyspace(keyspace), SETUP_CONSISTENCY)
            .await
        {
            Ok(()) => {
                self.waiter
                    .await_propagation(client, keyspace.as_str())
                    .await?;
                Ok(true)
            }
            // Someone else created it between our lookup and our CREATE.
            Err(err) if is_conflict(&err) => {
                warn!("Keyspace {} appeared concurrently: {}", keyspace, err);
                Ok(false)
            }
            Err(source) => Err(SchemaError::CreateKeyspace {
                keyspace: keyspace.to_string(),
                source,
            }),
        }
    }

    async fn create<C>(&self, client: &C, step: DdlStep, statement: &str) -> DdlOutcome
    where
        C: ClusterClient + ?Sized,
    {
        info!("Setting up {}", step);
        match client.execute(statement, SETUP_CONSISTENCY).await {
            Ok(()) => DdlOutcome::Created,
            Err(err) if is_conflict(&err) => {
                warn!("Failed to create {}, it already exists: {}", step, err);
                DdlOutcome::AlreadyExists
            }
            Err(err) => {
                error!("Failed to create {}: {}", step, err);
                DdlOutcome::Failed(err)
            }
        }
    }
}

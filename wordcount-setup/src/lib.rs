//! Prepares a CQL cluster for the word count batch job.
//!
//! A run connects to one node, makes sure the keyspace, the input table (with an
//! index on `title`) and the output table exist, and then inserts a fixed grid of
//! sample rows into the input table:
//!
//! ```rust,no_run
//! # use wordcount_setup::{setup, SetupConfig};
//! # async fn check_only_compiles() -> Result<(), Box<dyn std::error::Error>> {
//! let report = setup(&SetupConfig::default()).await?;
//! println!("Inserted {} rows", report.seed.rows_inserted);
//! # Ok(())
//! # }
//! ```
//!
//! The workflow is idempotent with respect to the schema: objects that already
//! exist are left alone, so a run can be repeated against a cluster that was
//! fully or partially set up before. Rows are simply written again.
//!
//! Everything goes through a [`ClusterClient`], so the workflow can be driven by
//! [`ScyllaClusterClient`] or by any other implementation.

use std::future::Future;

use scylla::statement::Consistency;
use tracing::{info, warn};

pub mod client;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod propagation;
pub mod schema;
pub mod seed;
pub mod statements;

pub use client::{ClusterClient, KeyspaceMetadata, ScyllaClusterClient};
pub use config::{Command, CqlIdentifier, SchemaNames, SetupConfig};
pub use errors::{
    ConnectionError, InsertError, PropagationError, RequestError, SchemaError, SetupError,
};
pub use propagation::{PropagationStrategy, PropagationWaiter};
pub use schema::{DdlOutcome, DdlStep, SchemaBootstrapper, SchemaReport};
pub use seed::{SeedLoader, SeedReport};

/// Consistency of every statement the setup issues.
pub const SETUP_CONSISTENCY: Consistency = Consistency::One;

/// What a successful run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupReport {
    /// Outcome of the schema bootstrap.
    pub schema: SchemaReport,
    /// Outcome of the seeding.
    pub seed: SeedReport,
}

/// Bootstraps the schema and seeds the input table through `client`.
pub async fn run<C>(client: &C, config: &SetupConfig) -> Result<SetupReport, SetupError>
where
    C: ClusterClient + ?Sized,
{
    let bootstrapper = SchemaBootstrapper::new(
        config.names.clone(),
        PropagationWaiter::new(config.propagation),
    );
    let schema = bootstrapper.ensure_schema(client).await?;

    let loader =
        SeedLoader::new(config.names.input_table.clone()).with_concurrency(config.concurrency);
    let seed = loader.seed_data(client).await?;

    info!(
        "Setup of keyspace {} done, {} rows inserted",
        config.names.keyspace, seed.rows_inserted
    );
    Ok(SetupReport { schema, seed })
}

/// Performs a [`run`] that is abandoned with [`SetupError::Interrupted`] as soon
/// as `interrupt` completes, whichever stage it is in.
pub async fn run_until_interrupted<C, I>(
    client: &C,
    config: &SetupConfig,
    interrupt: I,
) -> Result<SetupReport, SetupError>
where
    C: ClusterClient + ?Sized,
    I: Future<Output = ()>,
{
    tokio::select! {
        res = run(client, config) => res,
        () = interrupt => {
            warn!("Setup of keyspace {} interrupted", config.names.keyspace);
            Err(SetupError::Interrupted)
        }
    }
}

/// Connects to the node named in `config` and performs a [`run`]. Ctrl-C
/// aborts the run at any stage. The Ctrl-C listener replaces the default
/// SIGINT handling for the rest of the process.
pub async fn setup(config: &SetupConfig) -> Result<SetupReport, SetupError> {
    let client = ScyllaClusterClient::connect(config).await?;
    run_until_interrupted(&client, config, propagation::ctrl_c()).await
}

//! Access to the cluster.
//!
//! The setup never talks to the driver directly. It goes through [`ClusterClient`],
//! which exposes exactly the requests the workflow issues. [`ScyllaClusterClient`]
//! implements it on top of a [`Session`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::cluster::metadata::Strategy;
use scylla::errors::{DbError, ExecutionError, PrepareError, RequestAttemptError};
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::{Consistency, Statement};
use tracing::{debug, info};

use crate::config::SetupConfig;
use crate::errors::{ConnectionError, RequestError};

/// What the cluster knows about an existing keyspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyspaceMetadata {
    /// Keyspace name, as stored by the cluster.
    pub name: String,
    /// Replication factor, if the keyspace uses a single cluster-wide one.
    pub replication_factor: Option<usize>,
    /// Tables present in the keyspace.
    pub tables: BTreeSet<String>,
}

/// Requests the setup sends to the cluster.
///
/// Implementations own a single connection handle. Calls are issued one after
/// another, except while seeding with a concurrency above one.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Handle of a statement prepared on the cluster.
    type Prepared: Send + Sync;

    /// Looks up a keyspace. Absence is `Ok(None)`, not an error.
    async fn describe_keyspace(&self, name: &str)
        -> Result<Option<KeyspaceMetadata>, RequestError>;

    /// Number of nodes in the token ring that holds `keyspace`.
    async fn ring_size(&self, keyspace: &str) -> Result<usize, RequestError>;

    /// Executes an unprepared statement without bound values.
    async fn execute(&self, statement: &str, consistency: Consistency)
        -> Result<(), RequestError>;

    /// Prepares a statement for repeated execution.
    async fn prepare(&self, statement: &str) -> Result<Self::Prepared, RequestError>;

    /// Executes a prepared statement with positional text values.
    async fn execute_prepared(
        &self,
        prepared: &Self::Prepared,
        values: &[&str],
        consistency: Consistency,
    ) -> Result<(), RequestError>;

    /// Makes `keyspace` the default for unqualified names in later statements.
    async fn use_keyspace(&self, keyspace: &str) -> Result<(), RequestError>;

    /// Returns true if all reachable nodes report the same schema version.
    async fn check_schema_agreement(&self) -> Result<bool, RequestError>;
}

/// [`ClusterClient`] backed by the scylla driver.
pub struct ScyllaClusterClient {
    session: Session,
}

impl ScyllaClusterClient {
    /// Opens a session to the contact point named in `config`.
    pub async fn connect(config: &SetupConfig) -> Result<Self, ConnectionError> {
        let node = config.node();
        info!("Connecting to {} ...", node);

        let session = SessionBuilder::new()
            .known_node(&node)
            .compression(config.compression)
            .build()
            .await
            .map_err(|source| ConnectionError { node, source })?;

        Ok(ScyllaClusterClient { session })
    }

    /// Wraps an already connected session.
    pub fn from_session(session: Session) -> Self {
        ScyllaClusterClient { session }
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl ClusterClient for ScyllaClusterClient {
    type Prepared = PreparedStatement;

    async fn describe_keyspace(
        &self,
        name: &str,
    ) -> Result<Option<KeyspaceMetadata>, RequestError> {
        self.session
            .refresh_metadata()
            .await
            .map_err(|err| RequestError::Other(err.to_string()))?;

        // Unquoted identifiers are stored lowercase.
        let name = name.to_lowercase();
        let state = self.session.get_cluster_state();
        Ok(state.get_keyspace(&name).map(|keyspace| {
            let replication_factor = match &keyspace.strategy {
                Strategy::SimpleStrategy { replication_factor } => Some(*replication_factor),
                Strategy::LocalStrategy => Some(1),
                _ => None,
            };
            KeyspaceMetadata {
                name: name.clone(),
                replication_factor,
                tables: keyspace.tables.keys().cloned().collect(),
            }
        }))
    }

    async fn ring_size(&self, keyspace: &str) -> Result<usize, RequestError> {
        self.session
            .refresh_metadata()
            .await
            .map_err(|err| RequestError::Other(err.to_string()))?;

        // The keyspace is created with SimpleStrategy, so its ring is the whole ring.
        let nodes = self.session.get_cluster_state().get_nodes_info().len();
        debug!("Keyspace {} is spread over {} node(s)", keyspace, nodes);
        Ok(nodes)
    }

    async fn execute(
        &self,
        statement: &str,
        consistency: Consistency,
    ) -> Result<(), RequestError> {
        let mut statement = Statement::new(statement);
        statement.set_consistency(consistency);
        self.session.query_unpaged(statement, &[]).await?;
        Ok(())
    }

    async fn prepare(&self, statement: &str) -> Result<PreparedStatement, RequestError> {
        Ok(self.session.prepare(statement).await?)
    }

    async fn execute_prepared(
        &self,
        prepared: &PreparedStatement,
        values: &[&str],
        consistency: Consistency,
    ) -> Result<(), RequestError> {
        let mut prepared = prepared.clone();
        prepared.set_consistency(consistency);
        self.session.execute_unpaged(&prepared, values).await?;
        Ok(())
    }

    async fn use_keyspace(&self, keyspace: &str) -> Result<(), RequestError> {
        self.session
            .use_keyspace(keyspace, false)
            .await
            .map_err(|err| RequestError::Other(err.to_string()))
    }

    async fn check_schema_agreement(&self) -> Result<bool, RequestError> {
        match self.session.check_schema_agreement().await {
            Ok(version) => Ok(version.is_some()),
            Err(err) => Err(RequestError::SchemaDisagreement(err.to_string())),
        }
    }
}

impl From<ExecutionError> for RequestError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::LastAttemptError(err) => err.into(),
            ExecutionError::PrepareError(err) => err.into(),
            ExecutionError::RequestTimeout(timeout) => {
                RequestError::Timeout(format!("Request timed out after {timeout:?}"))
            }
            ExecutionError::SchemaAgreementError(err) => {
                RequestError::SchemaDisagreement(err.to_string())
            }
            other => RequestError::Other(other.to_string()),
        }
    }
}

impl From<PrepareError> for RequestError {
    fn from(err: PrepareError) -> Self {
        match err {
            PrepareError::AllAttemptsFailed { first_attempt } => first_attempt.into(),
            other => RequestError::Other(other.to_string()),
        }
    }
}

impl From<RequestAttemptError> for RequestError {
    fn from(err: RequestAttemptError) -> Self {
        match err {
            RequestAttemptError::DbError(db_error, message) => match db_error {
                DbError::AlreadyExists { keyspace, table } => {
                    RequestError::AlreadyExists { keyspace, table }
                }
                DbError::Invalid => RequestError::Invalid(message),
                DbError::Unavailable { .. } => RequestError::Unavailable(message),
                DbError::ReadTimeout { .. } | DbError::WriteTimeout { .. } => {
                    RequestError::Timeout(message)
                }
                other => RequestError::Other(format!("{other}: {message}")),
            },
            other => RequestError::Other(other.to_string()),
        }
    }
}

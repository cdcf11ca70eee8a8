//! Errors that may occur while bootstrapping the schema and seeding the input table.
//!
//! Requests sent through a [`ClusterClient`](crate::client::ClusterClient) fail with
//! a [`RequestError`], which classifies the driver's error into the few cases the
//! workflow reacts to. Each stage wraps it into its own error type, and [`SetupError`]
//! is what a whole run returns.

use scylla::errors::NewSessionError;
use thiserror::Error;

/// Failure of a single request sent to the cluster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    /// Attempted to create a keyspace, table or index that already exists.
    #[error(
        "Attempted to create a keyspace or a table that was already existing \
        (keyspace: {keyspace}, table: {table})"
    )]
    AlreadyExists {
        /// Keyspace that was created, or the keyspace holding the created table.
        keyspace: String,
        /// Created table, empty for keyspace creation.
        table: String,
    },

    /// The statement is syntactically correct but invalid.
    #[error("The statement is invalid: {0}")]
    Invalid(String),

    /// Not enough replicas were alive to satisfy the consistency level.
    #[error("Not enough replicas available: {0}")]
    Unavailable(String),

    /// The coordinator or the driver gave up waiting for a response.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Nodes did not agree on the schema version.
    #[error("Schema versions differ between nodes: {0}")]
    SchemaDisagreement(String),

    /// Any other failure, carrying its rendered message.
    #[error("{0}")]
    Other(String),
}

impl RequestError {
    /// Returns true when the server refused to create an object because it already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RequestError::AlreadyExists { .. })
    }
}

/// Failed to open a session to the contact node.
#[derive(Error, Debug)]
#[error("Failed to connect to {node}")]
pub struct ConnectionError {
    /// Contact point that was used, as `host:port`.
    pub node: String,
    /// Error reported by the driver.
    #[source]
    pub source: NewSessionError,
}

/// Invalid name given for a keyspace or a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BadIdentifier {
    /// Name was empty.
    #[error("Name can't be empty")]
    Empty,

    /// Name was longer than 48 characters.
    #[error("Name too long, must be up to 48 characters, found {1} characters. Bad name: '{0}'")]
    TooLong(String, usize),

    /// Name contained a character other than a letter, a digit or an underscore.
    #[error("Illegal character found: '{1}', only alphanumeric and underscores allowed. Bad name: '{0}'")]
    IllegalCharacter(String, char),
}

/// Invalid command line or environment configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Command line could not be parsed.
    #[error("Failed to parse command line: {0}")]
    Options(#[from] getopts::Fail),

    /// An option had a value that couldn't be interpreted.
    #[error("Bad value '{value}' for {option}: {reason}")]
    BadValue {
        /// Option or environment variable name.
        option: String,
        /// Value that was given.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A keyspace or table name was not a valid identifier.
    #[error("Bad {what} name")]
    BadName {
        /// Which name was rejected.
        what: &'static str,
        /// Validation failure.
        #[source]
        source: BadIdentifier,
    },
}

/// Waiting for the new keyspace to reach every node failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PropagationError {
    /// Token ring of the keyspace couldn't be read.
    #[error("Failed to read the token ring of keyspace {keyspace}")]
    Topology {
        /// Keyspace whose ring was requested.
        keyspace: String,
        /// Underlying request failure.
        #[source]
        source: RequestError,
    },

    /// Wait was interrupted. The run can't resume from the middle of it.
    #[error("Interrupted while waiting for the schema to propagate")]
    Interrupted,
}

/// Fatal failure of the schema bootstrap stage.
///
/// Failures of the table and index DDL are not represented here, since they
/// never abort the run; they are recorded in the
/// [`SchemaReport`](crate::schema::SchemaReport) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// Keyspace metadata lookup failed.
    #[error("Failed to look up keyspace {keyspace}")]
    Lookup {
        /// Keyspace that was looked up.
        keyspace: String,
        /// Underlying request failure.
        #[source]
        source: RequestError,
    },

    /// Keyspace was absent and couldn't be created.
    #[error("Failed to create keyspace {keyspace}")]
    CreateKeyspace {
        /// Keyspace that was being created.
        keyspace: String,
        /// Underlying request failure.
        #[source]
        source: RequestError,
    },

    /// Keyspace couldn't be selected for the rest of the session.
    #[error("Failed to use keyspace {keyspace}")]
    UseKeyspace {
        /// Keyspace that was being selected.
        keyspace: String,
        /// Underlying request failure.
        #[source]
        source: RequestError,
    },

    /// Waiting for the keyspace to propagate failed.
    #[error("Schema propagation failed")]
    Propagation(#[from] PropagationError),
}

/// Fatal failure of the seeding stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InsertError {
    /// The insert statement couldn't be prepared.
    #[error("Failed to prepare the insert statement")]
    Prepare(#[source] RequestError),

    /// Executing the prepared insert failed. Remaining rows were not inserted.
    #[error(
        "Insert #{attempt} failed (user_id: {user_id}, category_id: {category_id}, \
        sub_category_id: {sub_category_id})"
    )]
    Execute {
        /// One-based position of the failed row in the seeding plan.
        attempt: usize,
        /// Key of the failed row.
        user_id: String,
        /// Key of the failed row.
        category_id: String,
        /// Key of the failed row.
        sub_category_id: String,
        /// Underlying request failure.
        #[source]
        source: RequestError,
    },
}

/// Error returned by a whole setup run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SetupError {
    /// Couldn't reach the cluster.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Schema bootstrap aborted.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Seeding aborted.
    #[error(transparent)]
    Seed(#[from] InsertError),

    /// The run was interrupted before it finished.
    #[error("Setup interrupted")]
    Interrupted,
}

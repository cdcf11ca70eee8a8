//! Configuration of a setup run.
//!
//! A [`SetupConfig`] is assembled once at startup from defaults, environment
//! variables and command line options, in that order of precedence.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use getopts::{Matches, Options};
use scylla::client::Compression;
use tracing::warn;

use crate::errors::{BadIdentifier, ConfigError};
use crate::propagation::PropagationStrategy;

/// Host used when neither `--host` nor `CASSANDRA_HOST` is set.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Native protocol port used when neither `--port` nor `CASSANDRA_PORT` is set.
pub const DEFAULT_PORT: u16 = 9042;

/// Environment variable holding the contact host.
pub const HOST_ENV: &str = "CASSANDRA_HOST";
/// Environment variable holding the contact port.
pub const PORT_ENV: &str = "CASSANDRA_PORT";

const MAX_IDENTIFIER_LEN: usize = 48;

/// A keyspace or table name that is safe to splice into CQL text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CqlIdentifier(String);

impl CqlIdentifier {
    /// Validates `name`.
    ///
    /// Names can have up to 48 characters, each a letter, a digit or an underscore.
    /// Cassandra accepts an underscore as the first character, so we do too.
    pub fn new(name: impl Into<String>) -> Result<Self, BadIdentifier> {
        let name = name.into();
        if name.is_empty() {
            return Err(BadIdentifier::Empty);
        }

        if let Some(c) = name
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_'))
        {
            return Err(BadIdentifier::IllegalCharacter(name, c));
        }

        // Only ascii is left, so bytes and characters agree.
        let len = name.len();
        if len > MAX_IDENTIFIER_LEN {
            return Err(BadIdentifier::TooLong(name, len));
        }

        Ok(CqlIdentifier(name))
    }

    /// The validated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CqlIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Names of the objects the setup creates and fills.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaNames {
    /// Keyspace holding both tables.
    pub keyspace: CqlIdentifier,
    /// Table the seed rows go to.
    pub input_table: CqlIdentifier,
    /// Table the word count job writes its results to.
    pub output_table: CqlIdentifier,
}

impl SchemaNames {
    /// Builds the names, validating each of them.
    pub fn new(keyspace: &str, input_table: &str, output_table: &str) -> Result<Self, ConfigError> {
        let named = |what: &'static str, name: &str| {
            CqlIdentifier::new(name).map_err(|source| ConfigError::BadName { what, source })
        };
        Ok(SchemaNames {
            keyspace: named("keyspace", keyspace)?,
            input_table: named("input table", input_table)?,
            output_table: named("output table", output_table)?,
        })
    }
}

impl Default for SchemaNames {
    fn default() -> Self {
        SchemaNames {
            keyspace: CqlIdentifier("wordcount".to_owned()),
            input_table: CqlIdentifier("input_words".to_owned()),
            output_table: CqlIdentifier("output_words".to_owned()),
        }
    }
}

/// Everything a setup run needs to know.
#[derive(Clone, Debug)]
pub struct SetupConfig {
    /// Contact host.
    pub host: String,
    /// Contact port.
    pub port: u16,
    /// Compression negotiated for the connection, none by default.
    pub compression: Option<Compression>,
    /// Keyspace and table names.
    pub names: SchemaNames,
    /// How to wait after creating the keyspace.
    pub propagation: PropagationStrategy,
    /// Maximum number of inserts in flight. One means strictly sequential.
    pub concurrency: NonZeroUsize,
}

impl SetupConfig {
    /// Contact point in the `host:port` form the driver expects.
    pub fn node(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            compression: None,
            names: SchemaNames::default(),
            propagation: PropagationStrategy::default(),
            concurrency: NonZeroUsize::MIN,
        }
    }
}

/// What the command line asked for.
#[derive(Debug)]
pub enum Command {
    /// Run the setup with this configuration.
    Run(SetupConfig),
    /// Print this usage text and exit.
    Help(String),
}

fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt("", "host", "cluster contact host", "HOST");
    opts.optopt("", "port", "cluster contact port", "PORT");
    opts.optopt("", "keyspace", "keyspace to create and use", "NAME");
    opts.optopt("", "input-table", "table receiving the sample rows", "NAME");
    opts.optopt("", "output-table", "table receiving word counts", "NAME");
    opts.optopt(
        "",
        "compression",
        "compression algorithm to use (none, lz4 or snappy)",
        "ALGORITHM",
    );
    opts.optopt("", "concurrency", "inserts kept in flight", "COUNT");
    opts.optopt(
        "",
        "propagation",
        "how to wait for a new keyspace (fixed or agreement)",
        "STRATEGY",
    );
    opts.optopt(
        "",
        "per-node-delay-ms",
        "fixed wait per node in the ring",
        "MILLIS",
    );
    opts.optopt(
        "",
        "agreement-timeout-ms",
        "how long to poll for schema agreement",
        "MILLIS",
    );
    opts.optflag("h", "help", "print this help menu");
    opts
}

/// Parses the command line (without the program name), falling back to
/// `env` for the contact point.
///
/// `env` is the environment lookup, `std::env::var(..).ok()` in the binary.
pub fn parse_args(
    program: &str,
    args: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> Result<Command, ConfigError> {
    let opts = options();
    let matches = opts.parse(args)?;

    if matches.opt_present("h") {
        let brief = format!("Usage: {} [options]", program);
        return Ok(Command::Help(opts.usage(&brief)));
    }

    let host = matches.opt_str("host").or_else(|| env(HOST_ENV));
    let port = match matches.opt_str("port") {
        Some(port) => Some(parse_value::<u16>("--port", &port)?),
        None => env(PORT_ENV)
            .map(|port| parse_value::<u16>(PORT_ENV, &port))
            .transpose()?,
    };
    if host.is_none() || port.is_none() {
        warn!("{} or {} is not defined, using default", HOST_ENV, PORT_ENV);
    }

    let defaults = SchemaNames::default();
    let names = SchemaNames::new(
        matches
            .opt_str("keyspace")
            .as_deref()
            .unwrap_or(defaults.keyspace.as_str()),
        matches
            .opt_str("input-table")
            .as_deref()
            .unwrap_or(defaults.input_table.as_str()),
        matches
            .opt_str("output-table")
            .as_deref()
            .unwrap_or(defaults.output_table.as_str()),
    )?;

    let compression = match matches.opt_str("compression").as_deref() {
        Some("lz4") => Some(Compression::Lz4),
        Some("snappy") => Some(Compression::Snappy),
        Some("none") | None => None,
        Some(c) => return Err(bad_value("--compression", c, "expected none, lz4 or snappy")),
    };

    let concurrency = match opt_value::<usize>(&matches, "concurrency")? {
        Some(n) => NonZeroUsize::new(n)
            .ok_or_else(|| bad_value("--concurrency", "0", "must be at least 1"))?,
        None => NonZeroUsize::MIN,
    };

    let propagation = parse_propagation(&matches)?;

    Ok(Command::Run(SetupConfig {
        host: host.unwrap_or_else(|| DEFAULT_HOST.to_owned()),
        port: port.unwrap_or(DEFAULT_PORT),
        compression,
        names,
        propagation,
        concurrency,
    }))
}

fn parse_propagation(matches: &Matches) -> Result<PropagationStrategy, ConfigError> {
    let per_node_delay = opt_value::<u64>(matches, "per-node-delay-ms")?.map(Duration::from_millis);
    let timeout = opt_value::<u64>(matches, "agreement-timeout-ms")?.map(Duration::from_millis);

    match matches.opt_str("propagation").as_deref() {
        Some("fixed") | None => Ok(match per_node_delay {
            Some(per_node) => PropagationStrategy::FixedPerNode { per_node },
            None => PropagationStrategy::default(),
        }),
        Some("agreement") => Ok(match timeout {
            Some(timeout) => PropagationStrategy::schema_agreement_with_timeout(timeout),
            None => PropagationStrategy::schema_agreement(),
        }),
        Some(s) => Err(bad_value("--propagation", s, "expected fixed or agreement")),
    }
}

fn opt_value<T>(matches: &Matches, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    matches
        .opt_str(name)
        .map(|value| parse_value(&format!("--{}", name), &value))
        .transpose()
}

fn parse_value<T>(option: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| bad_value(option, value, &err.to_string()))
}

fn bad_value(option: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::BadValue {
        option: option.to_owned(),
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

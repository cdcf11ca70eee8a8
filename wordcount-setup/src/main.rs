//! Command line entry point: parses options, then bootstraps and seeds the cluster.

use anyhow::Result;
use std::env;
use tracing_subscriber::EnvFilter;
use wordcount_setup::config::{self, Command};

// Log level is taken from RUST_LOG, for example:
// RUST_LOG=wordcount_setup=debug cargo run -- --keyspace wordcount_test
#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let (program, args) = match args.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => ("wordcount-setup", &[][..]),
    };

    let config = match config::parse_args(program, args, |key| env::var(key).ok())? {
        Command::Run(config) => config,
        Command::Help(usage) => {
            print!("{}", usage);
            return Ok(());
        }
    };

    let report = wordcount_setup::setup(&config).await?;
    println!(
        "Done! Keyspace created: {}, DDL conflicts: {}, DDL failures: {}, rows inserted: {}",
        report.schema.keyspace_created,
        report.schema.conflicts(),
        report.schema.failures(),
        report.seed.rows_inserted
    );

    Ok(())
}

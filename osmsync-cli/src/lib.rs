//! Command-line interface keeping a SPARQL store in step with OSM replication.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod latest;
mod sync;

pub use error::CliError;

use latest::{LatestArgs, run_latest};
use sync::{SyncArgs, run_sync};

const ARG_REPLICATION_URL: &str = "replication-url";
const ARG_INTERVAL: &str = "interval";
const ARG_NODE_URL: &str = "node-url";
const ARG_OSM2RDF_DIR: &str = "osm2rdf-dir";
const ARG_OSM2RDF_IMAGE: &str = "osm2rdf-image";
const ARG_OSM2RDF_BINARY: &str = "osm2rdf-binary";
const ARG_SPARQL_ENDPOINT: &str = "sparql-endpoint";
const ARG_SPARQL_USER: &str = "sparql-user";
const ARG_SPARQL_PASSWORD: &str = "sparql-password";
const ARG_FROM_SEQUENCE: &str = "from-sequence";
const ARG_CURSOR_DB: &str = "cursor-db";
const ARG_APPLY_ORDER: &str = "apply-order";
const ARG_FOLLOW: &str = "follow";
const ARG_POLL_INTERVAL_SECS: &str = "poll-interval-secs";
const ARG_USER_AGENT: &str = "user-agent";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ENV_OSM2RDF_DIR: &str = "OSMSYNC_CMDS_SYNC_OSM2RDF_DIR";
const ENV_OSM2RDF_IMAGE: &str = "OSMSYNC_CMDS_SYNC_OSM2RDF_IMAGE";
const ENV_SPARQL_ENDPOINT: &str = "OSMSYNC_CMDS_SYNC_SPARQL_ENDPOINT";
const ENV_FROM_SEQUENCE: &str = "OSMSYNC_CMDS_SYNC_FROM_SEQUENCE";

/// Run the osmsync CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid, an adapter cannot be
/// built or the sync run fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Sync(args) => run_sync(args),
        Command::Latest(args) => run_latest(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osmsync",
    about = "Apply OpenStreetMap replication diffs to a SPARQL triple store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply every published diff after the cursor.
    Sync(SyncArgs),
    /// Print the newest published sequence number.
    Latest(LatestArgs),
}

#[cfg(test)]
mod tests;

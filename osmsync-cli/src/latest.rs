//! `latest` command: report the newest upstream sequence.

use std::{io::Write, time::Duration};

use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmsync_core::ReplicationSource;
use osmsync_data::{HttpReplicationSource, ReplicationConfig, ReplicationInterval};
use serde::{Deserialize, Serialize};

use crate::{ARG_INTERVAL, ARG_REPLICATION_URL, ARG_TIMEOUT_SECS, ARG_USER_AGENT, CliError};

/// CLI arguments for the `latest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print the newest published sequence number and its sharded path")]
#[ortho_config(prefix = "OSMSYNC")]
pub(crate) struct LatestArgs {
    /// Root of the replication service.
    #[arg(long = ARG_REPLICATION_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) replication_url: Option<String>,
    /// Replication cadence: minute, hour or day.
    #[arg(long = ARG_INTERVAL, value_name = "name")]
    #[serde(default)]
    pub(crate) interval: Option<String>,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl LatestArgs {
    fn into_config(self) -> Result<ReplicationConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ReplicationConfig::try_from(merged)
    }
}

impl TryFrom<LatestArgs> for ReplicationConfig {
    type Error = CliError;

    fn try_from(args: LatestArgs) -> Result<Self, Self::Error> {
        replication_config(
            args.replication_url,
            args.interval.as_deref(),
            args.user_agent,
            args.timeout_secs,
        )
    }
}

/// Assemble replication settings from optional layered values.
pub(crate) fn replication_config(
    url: Option<String>,
    interval: Option<&str>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<ReplicationConfig, CliError> {
    let mut config = ReplicationConfig::default();
    if let Some(url) = url {
        config.base_url = url;
    }
    if let Some(interval) = interval {
        config = config.with_interval(interval.parse::<ReplicationInterval>()?);
    }
    if let Some(user_agent) = user_agent {
        config = config.with_user_agent(user_agent);
    }
    if let Some(secs) = timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

pub(crate) fn run_latest(args: LatestArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let base_url = config.base_url.clone();
    let source = HttpReplicationSource::new(config).map_err(|source| CliError::BuildClient {
        adapter: "replication",
        source,
    })?;
    log::debug!(target: "osmsync::cli", "querying {base_url}");
    let mut stdout = std::io::stdout().lock();
    write_latest(&source, &mut stdout)
}

/// Write `{sequence} {sharded path}` for the newest sequence.
pub(crate) fn write_latest(
    source: &dyn ReplicationSource,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let latest = source.latest_sequence()?;
    writeln!(writer, "{latest} {}", latest.sharded_path()).map_err(CliError::WriteOutput)
}

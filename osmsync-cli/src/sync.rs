//! `sync` command: drain the replication range into the triple store.

use std::{thread, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmsync_core::{
    ApplyOrder, ChangeDispatcher, Converter, CursorStore, DiffDriver, LogObserver, NodeSource,
    ReplicationSource, SequenceNumber, SyncError, SyncObserver, SyncReport, UpdateEmitter,
};
use osmsync_data::{
    ApplyLog, HttpClientConfig, HttpNodeSource, HttpReplicationSource, Osm2RdfConverter,
    Osm2RdfRunner, ReplicationConfig, SparqlConfig, SparqlUpdateEmitter,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_APPLY_ORDER, ARG_CURSOR_DB, ARG_FOLLOW, ARG_FROM_SEQUENCE, ARG_INTERVAL, ARG_NODE_URL,
    ARG_OSM2RDF_BINARY, ARG_OSM2RDF_DIR, ARG_OSM2RDF_IMAGE, ARG_POLL_INTERVAL_SECS,
    ARG_REPLICATION_URL, ARG_SPARQL_ENDPOINT, ARG_SPARQL_PASSWORD, ARG_SPARQL_USER,
    ARG_TIMEOUT_SECS, ARG_USER_AGENT, CliError, ENV_FROM_SEQUENCE, ENV_OSM2RDF_DIR,
    ENV_OSM2RDF_IMAGE, ENV_SPARQL_ENDPOINT, latest::replication_config,
};

const LOG_TARGET: &str = "osmsync::cli";
const DEFAULT_CURSOR_DB: &str = "osmsync.sqlite";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply every published replication diff after the cursor to a \
                 SPARQL Update endpoint. Options can come from CLI flags, \
                 configuration files, or environment variables.",
    about = "Apply replication diffs to the triple store"
)]
#[ortho_config(prefix = "OSMSYNC")]
pub(crate) struct SyncArgs {
    /// Root of the replication service.
    #[arg(long = ARG_REPLICATION_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) replication_url: Option<String>,
    /// Replication cadence: minute, hour or day.
    #[arg(long = ARG_INTERVAL, value_name = "name")]
    #[serde(default)]
    pub(crate) interval: Option<String>,
    /// Endpoint serving single nodes by id.
    #[arg(long = ARG_NODE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) node_url: Option<String>,
    /// Working directory holding the converter's staging directories.
    #[arg(long = ARG_OSM2RDF_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) osm2rdf_dir: Option<Utf8PathBuf>,
    /// Docker image running the converter.
    #[arg(long = ARG_OSM2RDF_IMAGE, value_name = "image")]
    #[serde(default)]
    pub(crate) osm2rdf_image: Option<String>,
    /// Local converter executable, used instead of Docker.
    #[arg(long = ARG_OSM2RDF_BINARY, value_name = "path")]
    #[serde(default)]
    pub(crate) osm2rdf_binary: Option<Utf8PathBuf>,
    /// SPARQL Update endpoint.
    #[arg(long = ARG_SPARQL_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) sparql_endpoint: Option<String>,
    /// Basic-auth user for the endpoint.
    #[arg(long = ARG_SPARQL_USER, value_name = "user")]
    #[serde(default)]
    pub(crate) sparql_user: Option<String>,
    /// Basic-auth password for the endpoint.
    #[arg(long = ARG_SPARQL_PASSWORD, value_name = "password")]
    #[serde(default)]
    pub(crate) sparql_password: Option<String>,
    /// Start after this sequence instead of the recorded cursor.
    #[arg(long = ARG_FROM_SEQUENCE, value_name = "sequence")]
    #[serde(default)]
    pub(crate) from_sequence: Option<u64>,
    /// SQLite database recording applied sequences.
    #[arg(long = ARG_CURSOR_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) cursor_db: Option<Utf8PathBuf>,
    /// Object order within a diff: published (default) or grouped.
    #[arg(long = ARG_APPLY_ORDER, value_name = "order")]
    #[serde(default)]
    pub(crate) apply_order: Option<String>,
    /// Keep polling for new diffs after catching up.
    #[arg(long = ARG_FOLLOW, num_args = 0..=1, default_missing_value = "true", value_name = "bool")]
    #[serde(default)]
    pub(crate) follow: Option<bool>,
    /// Seconds to wait between polls in follow mode.
    #[arg(long = ARG_POLL_INTERVAL_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) poll_interval_secs: Option<u64>,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct SyncConfig {
    pub(crate) replication: ReplicationConfig,
    pub(crate) node_url: Option<String>,
    pub(crate) osm2rdf_dir: Utf8PathBuf,
    pub(crate) runner: Osm2RdfRunner,
    pub(crate) sparql: SparqlConfig,
    pub(crate) from_sequence: Option<SequenceNumber>,
    pub(crate) cursor_db: Utf8PathBuf,
    pub(crate) order: ApplyOrder,
    pub(crate) follow: bool,
    pub(crate) poll_interval: Duration,
}

impl SyncConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        match &self.runner {
            Osm2RdfRunner::Binary { path } => Self::require_existing(path, ARG_OSM2RDF_BINARY),
            Osm2RdfRunner::Docker { .. } => Ok(()),
        }
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match osmsync_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn http(&self) -> &HttpClientConfig {
        &self.replication.http
    }
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let osm2rdf_dir = args.osm2rdf_dir.ok_or(CliError::MissingArgument {
            field: ARG_OSM2RDF_DIR,
            env: ENV_OSM2RDF_DIR,
        })?;
        let runner = match (args.osm2rdf_image, args.osm2rdf_binary) {
            (Some(_), Some(_)) => {
                return Err(CliError::ConflictingArguments {
                    first: ARG_OSM2RDF_IMAGE,
                    second: ARG_OSM2RDF_BINARY,
                });
            }
            (Some(image), None) => Osm2RdfRunner::Docker { image },
            (None, Some(path)) => Osm2RdfRunner::Binary { path },
            (None, None) => {
                return Err(CliError::MissingArgument {
                    field: ARG_OSM2RDF_IMAGE,
                    env: ENV_OSM2RDF_IMAGE,
                });
            }
        };
        let endpoint = args.sparql_endpoint.ok_or(CliError::MissingArgument {
            field: ARG_SPARQL_ENDPOINT,
            env: ENV_SPARQL_ENDPOINT,
        })?;
        let replication = replication_config(
            args.replication_url,
            args.interval.as_deref(),
            args.user_agent,
            args.timeout_secs,
        )?;
        let mut sparql = SparqlConfig::new(endpoint).with_http(replication.http.clone());
        if let Some(user) = args.sparql_user {
            sparql = sparql.with_credentials(user, args.sparql_password.unwrap_or_default());
        }
        let order = args
            .apply_order
            .as_deref()
            .map(str::parse::<ApplyOrder>)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            replication,
            node_url: args.node_url,
            osm2rdf_dir,
            runner,
            sparql,
            from_sequence: args.from_sequence.map(SequenceNumber::new),
            cursor_db: args
                .cursor_db
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CURSOR_DB)),
            order,
            follow: args.follow.unwrap_or(false),
            poll_interval: Duration::from_secs(
                args.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
        })
    }
}

/// Collaborators a sync run is wired from.
pub(crate) struct Pipeline {
    pub(crate) source: Box<dyn ReplicationSource>,
    pub(crate) nodes: Box<dyn NodeSource>,
    pub(crate) converter: Box<dyn Converter>,
    pub(crate) emitter: Box<dyn UpdateEmitter>,
    pub(crate) cursor: Box<dyn CursorStore>,
}

/// Builds the collaborators for the current sync invocation.
pub(crate) trait PipelineBuilder {
    fn build(&self, config: &SyncConfig) -> Result<Pipeline, CliError>;
}

pub(crate) struct DefaultPipelineBuilder;

impl PipelineBuilder for DefaultPipelineBuilder {
    fn build(&self, config: &SyncConfig) -> Result<Pipeline, CliError> {
        let source = HttpReplicationSource::new(config.replication.clone()).map_err(|source| {
            CliError::BuildClient {
                adapter: "replication",
                source,
            }
        })?;
        let node_url = config.node_url.clone().unwrap_or_default();
        let nodes = HttpNodeSource::new(node_url, config.http()).map_err(|source| {
            CliError::BuildClient {
                adapter: "live-data",
                source,
            }
        })?;
        let converter = Osm2RdfConverter::new(&config.osm2rdf_dir, config.runner.clone())
            .map_err(|source| CliError::PrepareConverter {
                path: config.osm2rdf_dir.clone(),
                source,
            })?;
        let emitter = SparqlUpdateEmitter::connect(config.sparql.clone())?;
        let cursor = ApplyLog::initialise(&config.cursor_db)?;
        Ok(Pipeline {
            source: Box::new(source),
            nodes: Box::new(nodes),
            converter: Box::new(converter),
            emitter: Box::new(emitter),
            cursor: Box::new(cursor),
        })
    }
}

pub(crate) fn run_sync(args: SyncArgs) -> Result<(), CliError> {
    let observer = LogObserver::default();
    run_sync_with(args, &DefaultPipelineBuilder, &observer).map(drop)
}

pub(crate) fn run_sync_with(
    args: SyncArgs,
    builder: &dyn PipelineBuilder,
    observer: &dyn SyncObserver,
) -> Result<SyncReport, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let pipeline = builder.build(&config)?;
    execute_sync(&config, &pipeline, observer)
}

fn execute_sync(
    config: &SyncConfig,
    pipeline: &Pipeline,
    observer: &dyn SyncObserver,
) -> Result<SyncReport, CliError> {
    let dispatcher = ChangeDispatcher::new(
        &*pipeline.converter,
        &*pipeline.emitter,
        &*pipeline.nodes,
        observer,
    );
    let driver = DiffDriver::new(&*pipeline.source, &*pipeline.cursor, dispatcher)
        .with_order(config.order);
    let first = match config.from_sequence {
        Some(from) => driver.run(from),
        None => driver.resume(),
    };
    let report = first.map_err(starting_error)?;
    if !config.follow {
        return Ok(report);
    }
    let mut cursor = report.cursor;
    loop {
        log::debug!(
            target: LOG_TARGET,
            "sleeping {}s before polling again",
            config.poll_interval.as_secs()
        );
        thread::sleep(config.poll_interval);
        cursor = driver.run(cursor).map_err(CliError::Sync)?.cursor;
    }
}

fn starting_error(err: SyncError) -> CliError {
    match err {
        SyncError::CursorUnset => CliError::MissingArgument {
            field: ARG_FROM_SEQUENCE,
            env: ENV_FROM_SEQUENCE,
        },
        other => CliError::Sync(other),
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncConfig::try_from(merged)
}

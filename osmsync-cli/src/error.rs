//! Error types emitted by the osmsync CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osmsync_core::{ConversionError, ReplicationError, SyncError, UnknownApplyOrder};
use osmsync_data::{ApplyLogError, ClientBuildError, SparqlConnectError, UnknownInterval};
use thiserror::Error;

/// Errors emitted by the osmsync CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable name.
        env: &'static str,
    },
    /// Two mutually exclusive options were both set.
    #[error("--{first} and --{second} cannot be combined")]
    ConflictingArguments {
        /// First flag name.
        first: &'static str,
        /// Second flag name.
        second: &'static str,
    },
    /// The replication interval is not recognised.
    #[error(transparent)]
    InvalidInterval(#[from] UnknownInterval),
    /// The apply order is not recognised.
    #[error(transparent)]
    InvalidApplyOrder(#[from] UnknownApplyOrder),
    /// The converter binary does not exist or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        /// Flag name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// An HTTP adapter could not be constructed.
    #[error("failed to build {adapter} client: {source}")]
    BuildClient {
        /// Adapter being built.
        adapter: &'static str,
        /// Construction error.
        #[source]
        source: ClientBuildError,
    },
    /// The triple store could not be reached.
    #[error(transparent)]
    ConnectStore(#[from] SparqlConnectError),
    /// The converter working directory could not be prepared.
    #[error("failed to prepare converter directory {path:?}: {source}")]
    PrepareConverter {
        /// Working directory.
        path: Utf8PathBuf,
        /// Staging error.
        #[source]
        source: ConversionError,
    },
    /// The cursor database could not be opened.
    #[error(transparent)]
    OpenApplyLog(#[from] ApplyLogError),
    /// Querying the replication service failed.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
    /// The sync run stopped.
    #[error("sync failed: {0}")]
    Sync(#[source] SyncError),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

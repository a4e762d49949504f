//! Adapters connecting the osmsync pipeline to the outside world.
//!
//! Responsibilities:
//! - Fetch replication state and diffs over HTTP.
//! - Fetch live node data for way resolution.
//! - Run the `osm2rdf` converter as a child process.
//! - Emit SPARQL updates to the triple store.
//! - Persist the replication cursor in SQLite.
//!
//! Boundaries:
//! - Do not encode pipeline rules (live in `osmsync-core`).
//! - Expose blocking implementations of the core traits; async clients stay
//!   behind an owned runtime.
//!
//! Invariants:
//! - No global mutable state.
//! - Staged converter files never outlive a conversion.

mod apply_log;
mod http;
mod live;
mod osm2rdf;
mod replication;
pub mod sparql;

pub use apply_log::{ApplyLog, ApplyLogEntry, ApplyLogError, SequenceStatus};
pub use http::{
    BaseUrl, ClientBuildError, Credentials, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
    HttpClientConfig,
};
pub use live::{DEFAULT_NODE_URL, HttpNodeSource};
pub use osm2rdf::{Osm2RdfConverter, Osm2RdfRunner};
pub use replication::{
    DEFAULT_REPLICATION_URL, HttpReplicationSource, ReplicationConfig, ReplicationInterval,
    ReplicationUrls, UnknownInterval,
};
pub use sparql::{SparqlConfig, SparqlConnectError, SparqlUpdateEmitter};

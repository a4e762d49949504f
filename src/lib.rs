//! Facade crate for the osmsync replication pipeline.
//!
//! This crate re-exports the core domain types and pipeline, and exposes the
//! HTTP, converter and cursor adapters behind the `adapters` feature.

#![forbid(unsafe_code)]

pub use osmsync_core::{
    ApplyOrder, ChangeDispatcher, ChangeSet, ConversionError, Converter, CursorError,
    CursorStore, DiffDriver, DiffReport, ElementId, ElementKind, LogObserver, MemoryCursor,
    NodeSource, ObjectSubjects, ReplicationError, ReplicationSource, SequenceNumber, StoreError,
    SyncError, SyncEvent, SyncObserver, SyncReport, TransportError, Triples, UpdateEmitter,
};

#[cfg(feature = "test-support")]
pub use osmsync_core::test_support;

#[cfg(feature = "adapters")]
pub use osmsync_data::{
    ApplyLog, HttpClientConfig, HttpNodeSource, HttpReplicationSource, Osm2RdfConverter,
    Osm2RdfRunner, ReplicationConfig, ReplicationInterval, SparqlConfig, SparqlUpdateEmitter,
};

//! Core domain types and the diff-application pipeline for osmsync.
//!
//! The crate decodes OpenStreetMap replication diffs, derives store subjects
//! for every changed object and drives a sequence-number cursor through the
//! upstream range. Network, conversion and store access are reached through
//! the collaborator traits defined here; concrete adapters live in
//! `osmsync-data`.
//!
//! # Examples
//!
//! ```
//! use osmsync_core::{ElementId, ElementKind, ObjectSubjects, SequenceNumber};
//!
//! assert_eq!(SequenceNumber::new(6_177_383).sharded_path(), "006/177/383");
//! let subjects = ObjectSubjects::of(ElementKind::Way, ElementId::new(7_738_035));
//! assert_eq!(subjects.primary.as_str(), "osmway:7738035");
//! ```

mod change;
pub mod codec;
mod convert;
mod cursor;
mod dispatch;
mod driver;
mod element;
pub mod normalize;
mod observer;
mod replication;
mod report;
mod resolve;
mod sequence;
mod store;
mod subject;
mod triples;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use change::{ApplyOrder, ChangeAction, ChangeGroup, ChangeSet, UnknownApplyOrder};
pub use convert::{ConversionError, Converter};
pub use cursor::{CursorError, CursorStore, MemoryCursor};
pub use dispatch::{ChangeDispatcher, ObjectOutcome};
pub use driver::{DiffDriver, DriverState, SyncError};
pub use element::{
    Attributes, ChangedObject, ChildElement, ElementId, ElementKind, UnknownElementKind,
};
pub use observer::{LogObserver, SyncEvent, SyncObserver};
pub use replication::{ReplicationError, ReplicationSource, TransportError};
pub use report::{DiffReport, KindCounts, SyncReport};
pub use resolve::{NodeResolution, NodeSource, UnresolvedNode, resolve_way_nodes};
pub use sequence::{SequenceNumber, StateRecord};
pub use store::{StoreError, UpdateEmitter};
pub use subject::{ObjectSubjects, Subject};
pub use triples::Triples;

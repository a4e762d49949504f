//! Boundary to the triple store.

use thiserror::Error;

use crate::{ObjectSubjects, Triples, TransportError};

/// Errors raised by an [`UpdateEmitter`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The endpoint rejected the connectivity probe.
    #[error("triple store unavailable: {source}")]
    Unavailable {
        /// Probe failure.
        #[source]
        source: TransportError,
    },
    /// An update request failed.
    #[error("store update failed: {source}")]
    Request {
        /// Request failure.
        #[source]
        source: TransportError,
    },
}

/// Issues update operations against the triple store.
///
/// Both operations are idempotent: deleting absent subjects and re-inserting
/// present statements leave the store unchanged.
pub trait UpdateEmitter {
    /// Remove every statement whose subject is the primary or geometry
    /// subject of one object.
    ///
    /// # Errors
    /// Returns [`StoreError::Request`] when the store call fails.
    fn delete(&self, subjects: &ObjectSubjects) -> Result<(), StoreError>;

    /// Add `triples` to the store.
    ///
    /// # Errors
    /// Returns [`StoreError::Request`] when the store call fails.
    fn insert(&self, triples: &Triples) -> Result<(), StoreError>;
}

impl<T: UpdateEmitter + ?Sized> UpdateEmitter for &T {
    fn delete(&self, subjects: &ObjectSubjects) -> Result<(), StoreError> {
        (**self).delete(subjects)
    }

    fn insert(&self, triples: &Triples) -> Result<(), StoreError> {
        (**self).insert(triples)
    }
}

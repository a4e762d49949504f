//! Persistence of the replication cursor.

use std::cell::RefCell;

use thiserror::Error;

use crate::{DiffReport, SequenceNumber};

/// Error raised by a [`CursorStore`].
#[derive(Debug, Error)]
#[error("cursor persistence failed: {message}")]
pub struct CursorError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CursorError {
    /// Error with a plain description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Error wrapping an underlying failure.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Durable record of the last sequence the driver advanced past.
pub trait CursorStore {
    /// Most recently stored sequence, if any.
    ///
    /// # Errors
    /// Returns [`CursorError`] when the backing store cannot be read.
    fn load(&self) -> Result<Option<SequenceNumber>, CursorError>;

    /// Record that `sequence` was advanced past. `report` is present when
    /// the diff was applied and absent when it was skipped.
    ///
    /// # Errors
    /// Returns [`CursorError`] when the backing store cannot be written.
    fn store(
        &self,
        sequence: SequenceNumber,
        report: Option<&DiffReport>,
    ) -> Result<(), CursorError>;
}

impl<T: CursorStore + ?Sized> CursorStore for &T {
    fn load(&self) -> Result<Option<SequenceNumber>, CursorError> {
        (**self).load()
    }

    fn store(
        &self,
        sequence: SequenceNumber,
        report: Option<&DiffReport>,
    ) -> Result<(), CursorError> {
        (**self).store(sequence, report)
    }
}

/// Cursor kept in memory for the lifetime of the process.
///
/// # Examples
/// ```
/// use osmsync_core::{CursorStore, MemoryCursor, SequenceNumber};
///
/// let cursor = MemoryCursor::starting_at(SequenceNumber::new(100));
/// cursor.store(SequenceNumber::new(101), None)?;
/// assert_eq!(cursor.load()?, Some(SequenceNumber::new(101)));
/// # Ok::<(), osmsync_core::CursorError>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryCursor {
    position: RefCell<Option<SequenceNumber>>,
    history: RefCell<Vec<SequenceNumber>>,
}

impl MemoryCursor {
    /// Cursor positioned at `sequence`.
    #[must_use]
    pub fn starting_at(sequence: SequenceNumber) -> Self {
        Self {
            position: RefCell::new(Some(sequence)),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Every sequence stored so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<SequenceNumber> {
        self.history.borrow().clone()
    }
}

impl CursorStore for MemoryCursor {
    fn load(&self) -> Result<Option<SequenceNumber>, CursorError> {
        Ok(*self.position.borrow())
    }

    fn store(
        &self,
        sequence: SequenceNumber,
        _report: Option<&DiffReport>,
    ) -> Result<(), CursorError> {
        *self.position.borrow_mut() = Some(sequence);
        self.history.borrow_mut().push(sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn empty_cursor_loads_nothing() {
        let cursor = MemoryCursor::default();
        assert_eq!(cursor.load().expect("load"), None);
        assert!(cursor.history().is_empty());
    }

    #[rstest]
    fn records_history_in_order() {
        let cursor = MemoryCursor::starting_at(SequenceNumber::new(1));
        for raw in [2, 3] {
            cursor.store(SequenceNumber::new(raw), None).expect("store");
        }
        assert_eq!(
            cursor.history(),
            vec![SequenceNumber::new(2), SequenceNumber::new(3)]
        );
        assert_eq!(cursor.load().expect("load"), Some(SequenceNumber::new(3)));
    }

    #[rstest]
    fn error_exposes_source() {
        let io = std::io::Error::other("disk full");
        let err = CursorError::with_source("write failed", io);
        assert_eq!(err.to_string(), "cursor persistence failed: write failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}

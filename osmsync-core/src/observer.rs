//! Injected reporting of pipeline events.
//!
//! Components never log on their own; they hand every notable event to the
//! [`SyncObserver`] they were constructed with. [`LogObserver`] forwards events
//! to the `log` facade.

use std::fmt;

use log::Level;

use crate::{
    ChangeAction, DiffReport, ElementId, ElementKind, SequenceNumber, SyncReport, UnresolvedNode,
};

const DEFAULT_TARGET: &str = "osmsync";

/// Something the pipeline wants an operator to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncEvent {
    /// The driver captured the upstream range it will drain.
    RunStarted {
        /// Cursor at the start of the invocation.
        from: SequenceNumber,
        /// Latest upstream sequence.
        latest: SequenceNumber,
    },
    /// The cursor already reached the latest upstream sequence.
    UpToDate {
        /// Current cursor.
        cursor: SequenceNumber,
        /// Latest upstream sequence.
        latest: SequenceNumber,
    },
    /// No state document attests the sequence; it is skipped.
    StateMissing {
        /// Skipped sequence.
        sequence: SequenceNumber,
    },
    /// The diff was withdrawn upstream; it is skipped.
    DiffGone {
        /// Skipped sequence.
        sequence: SequenceNumber,
    },
    /// A diff was applied.
    DiffApplied(DiffReport),
    /// One object could not be converted; its siblings continue.
    ObjectFailed {
        /// Sequence of the diff carrying the object.
        sequence: SequenceNumber,
        /// Action being applied.
        action: ChangeAction,
        /// Object kind.
        kind: ElementKind,
        /// Object id.
        id: ElementId,
        /// Rendered conversion error.
        error: String,
    },
    /// Conversion produced no statements; nothing was inserted.
    EmptyConversion {
        /// Sequence of the diff carrying the object.
        sequence: SequenceNumber,
        /// Object kind.
        kind: ElementKind,
        /// Object id.
        id: ElementId,
    },
    /// A node referenced by a way could not be fetched and was omitted.
    NodeUnresolved {
        /// Sequence of the diff carrying the way.
        sequence: SequenceNumber,
        /// Referencing way.
        way: ElementId,
        /// Missing node.
        node: ElementId,
        /// Why the node was omitted.
        reason: UnresolvedNode,
    },
    /// The driver finished draining its range.
    RunFinished(SyncReport),
}

impl SyncEvent {
    /// Severity the event is logged at.
    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::RunStarted { .. }
            | Self::UpToDate { .. }
            | Self::DiffApplied(_)
            | Self::RunFinished(_) => Level::Info,
            Self::StateMissing { .. }
            | Self::DiffGone { .. }
            | Self::EmptyConversion { .. }
            | Self::NodeUnresolved { .. } => Level::Warn,
            Self::ObjectFailed { .. } => Level::Error,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { from, latest } => write!(
                f,
                "starting from sequence {from}; latest is {latest} ({} diffs to fetch)",
                latest.get().saturating_sub(from.get())
            ),
            Self::UpToDate { cursor, latest } => {
                write!(f, "cursor {cursor} is up to date with latest {latest}")
            }
            Self::StateMissing { sequence } => {
                write!(f, "state for sequence {sequence} does not exist; skipping")
            }
            Self::DiffGone { sequence } => {
                write!(f, "diff for sequence {sequence} is gone; skipping")
            }
            Self::DiffApplied(report) => write!(f, "applied {report}"),
            Self::ObjectFailed {
                sequence,
                action,
                kind,
                id,
                error,
            } => write!(
                f,
                "sequence {sequence}: failed to {action} {kind} {id}: {error}"
            ),
            Self::EmptyConversion { sequence, kind, id } => write!(
                f,
                "sequence {sequence}: conversion of {kind} {id} produced no triples"
            ),
            Self::NodeUnresolved {
                sequence,
                way,
                node,
                reason,
            } => write!(
                f,
                "sequence {sequence}: omitting node {node} of way {way}: {reason}"
            ),
            Self::RunFinished(report) => write!(f, "finished: {report}"),
        }
    }
}

/// Receives pipeline events.
pub trait SyncObserver {
    /// Handle one event.
    fn record(&self, event: &SyncEvent);
}

impl<T: SyncObserver + ?Sized> SyncObserver for &T {
    fn record(&self, event: &SyncEvent) {
        (**self).record(event);
    }
}

/// Observer that writes every event to the `log` facade.
///
/// # Examples
/// ```
/// use osmsync_core::{LogObserver, SequenceNumber, SyncEvent, SyncObserver};
///
/// let observer = LogObserver::with_target("osmsync::sync");
/// observer.record(&SyncEvent::StateMissing { sequence: SequenceNumber::new(101) });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    target: &'static str,
}

impl LogObserver {
    /// Observer logging under `target`.
    #[must_use]
    pub const fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::with_target(DEFAULT_TARGET)
    }
}

impl SyncObserver for LogObserver {
    fn record(&self, event: &SyncEvent) {
        log::log!(target: self.target, event.level(), "{event}");
    }
}

//! Counters describing what a sync invocation did.

use std::fmt;

use crate::{ChangeAction, ElementKind, SequenceNumber};

/// Object counts broken down by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindCounts {
    /// Nodes.
    pub nodes: u64,
    /// Ways.
    pub ways: u64,
    /// Relations.
    pub relations: u64,
}

impl KindCounts {
    /// Increment the counter for `kind`.
    pub fn bump(&mut self, kind: ElementKind) {
        let slot = match kind {
            ElementKind::Node => &mut self.nodes,
            ElementKind::Way => &mut self.ways,
            ElementKind::Relation => &mut self.relations,
        };
        *slot += 1;
    }

    /// Sum over all kinds.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }
}

/// Outcome of applying one diff.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiffReport {
    /// Sequence the diff belongs to.
    pub sequence: SequenceNumber,
    /// Objects deleted from the store.
    pub deleted: KindCounts,
    /// Objects created in the store.
    pub created: KindCounts,
    /// Objects replaced in the store.
    pub modified: KindCounts,
    /// Objects whose conversion failed.
    pub failed: u64,
    /// Objects whose conversion produced no statements.
    pub empty: u64,
}

impl DiffReport {
    /// Zeroed report for `sequence`.
    #[must_use]
    pub fn new(sequence: SequenceNumber) -> Self {
        Self {
            sequence,
            deleted: KindCounts::default(),
            created: KindCounts::default(),
            modified: KindCounts::default(),
            failed: 0,
            empty: 0,
        }
    }

    /// Count one successfully applied object.
    pub fn record_applied(&mut self, action: ChangeAction, kind: ElementKind) {
        let counts = match action {
            ChangeAction::Delete => &mut self.deleted,
            ChangeAction::Create => &mut self.created,
            ChangeAction::Modify => &mut self.modified,
        };
        counts.bump(kind);
    }

    /// Counts for `action`.
    #[must_use]
    pub const fn applied(&self, action: ChangeAction) -> KindCounts {
        match action {
            ChangeAction::Delete => self.deleted,
            ChangeAction::Create => self.created,
            ChangeAction::Modify => self.modified,
        }
    }

    /// Objects applied across all actions.
    #[must_use]
    pub const fn total_applied(&self) -> u64 {
        self.deleted.total() + self.created.total() + self.modified.total()
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sequence {}: {} deleted, {} created, {} modified, {} failed, {} empty",
            self.sequence,
            self.deleted.total(),
            self.created.total(),
            self.modified.total(),
            self.failed,
            self.empty
        )
    }
}

/// Outcome of one driver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncReport {
    /// Cursor the invocation started from.
    pub from: SequenceNumber,
    /// Latest upstream sequence captured at the start.
    pub latest: SequenceNumber,
    /// Cursor after the invocation.
    pub cursor: SequenceNumber,
    /// Reports of the diffs that were applied, in sequence order.
    pub applied: Vec<DiffReport>,
    /// Sequences advanced past without applying a diff.
    pub skipped: Vec<SequenceNumber>,
}

impl SyncReport {
    /// Report for an invocation starting at `from` with upstream at `latest`.
    #[must_use]
    pub fn new(from: SequenceNumber, latest: SequenceNumber) -> Self {
        Self {
            from,
            latest,
            cursor: from,
            applied: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Whether the invocation advanced the cursor at all.
    #[must_use]
    pub fn advanced(&self) -> bool {
        self.cursor > self.from
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cursor {} -> {} (latest {}): {} applied, {} skipped",
            self.from,
            self.cursor,
            self.latest,
            self.applied.len(),
            self.skipped.len()
        )
    }
}

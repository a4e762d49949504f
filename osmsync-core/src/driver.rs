//! Cursor state machine draining the upstream replication range.

use thiserror::Error;

use crate::{
    ApplyOrder, ChangeDispatcher, ChangeSet, Converter, CursorError, CursorStore, DiffReport,
    NodeSource, ReplicationError, ReplicationSource, SequenceNumber, StoreError, SyncEvent,
    SyncObserver, SyncReport, UpdateEmitter,
    codec::{CodecError, parse_change_set},
};

/// Errors that end a driver invocation.
///
/// The cursor stays at the last sequence advanced before the failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Replication state or a diff could not be fetched.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
    /// A diff was not a valid osmChange document.
    #[error("diff {sequence} is not a valid osmChange document: {source}")]
    DiffParse {
        /// Sequence of the offending diff.
        sequence: SequenceNumber,
        /// Decoder error.
        #[source]
        source: CodecError,
    },
    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The cursor could not be read or written.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// No starting cursor was supplied or stored.
    #[error("no replication cursor has been recorded yet")]
    CursorUnset,
}

/// Position of the driver within one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing left to do.
    Idle,
    /// Checking whether the sequence's state document exists.
    Polling(SequenceNumber),
    /// Downloading and decoding the sequence's diff.
    Fetching(SequenceNumber),
    /// Applying a decoded diff.
    Applying(SequenceNumber, ChangeSet),
    /// The sequence was applied (with its report) or skipped (without).
    Advanced(SequenceNumber, Option<DiffReport>),
}

/// Drives the cursor from a starting sequence to the latest upstream one.
///
/// Every sequence in `[from + 1, latest]` is visited exactly once per
/// invocation, with `latest` captured when the invocation starts. The cursor
/// is persisted after each sequence, whether it was applied or skipped.
pub struct DiffDriver<R, K, C, E, N, O> {
    source: R,
    cursor: K,
    dispatcher: ChangeDispatcher<C, E, N, O>,
    order: ApplyOrder,
}

impl<R, K, C, E, N, O> DiffDriver<R, K, C, E, N, O>
where
    R: ReplicationSource,
    K: CursorStore,
    C: Converter,
    E: UpdateEmitter,
    N: NodeSource,
    O: SyncObserver,
{
    /// Build a driver applying diffs in document order.
    #[must_use]
    pub fn new(source: R, cursor: K, dispatcher: ChangeDispatcher<C, E, N, O>) -> Self {
        Self {
            source,
            cursor,
            dispatcher,
            order: ApplyOrder::default(),
        }
    }

    /// Use `order` when applying each diff.
    #[must_use]
    pub const fn with_order(mut self, order: ApplyOrder) -> Self {
        self.order = order;
        self
    }

    /// Cursor store backing this driver.
    #[must_use]
    pub const fn cursor(&self) -> &K {
        &self.cursor
    }

    /// Continue from the sequence recorded in the cursor store.
    ///
    /// # Errors
    /// Returns [`SyncError::CursorUnset`] when nothing was recorded yet, and
    /// otherwise the errors of [`DiffDriver::run`].
    pub fn resume(&self) -> Result<SyncReport, SyncError> {
        let from = self.cursor.load()?.ok_or(SyncError::CursorUnset)?;
        self.run(from)
    }

    /// Drain every sequence after `from` up to the latest upstream one.
    ///
    /// When `from` is already at or past the latest sequence nothing is
    /// fetched and the cursor store is left untouched.
    ///
    /// # Errors
    /// Returns [`SyncError`] on replication, decoding, store or cursor
    /// failures. Sequences advanced before the failure remain recorded.
    pub fn run(&self, from: SequenceNumber) -> Result<SyncReport, SyncError> {
        let latest = self.source.latest_sequence()?;
        let mut report = SyncReport::new(from, latest);
        if from >= latest {
            self.observe(SyncEvent::UpToDate {
                cursor: from,
                latest,
            });
            return Ok(report);
        }
        self.observe(SyncEvent::RunStarted { from, latest });
        let mut state = DriverState::Polling(from.next());
        while state != DriverState::Idle {
            state = self.step(state, latest, &mut report)?;
        }
        self.observe(SyncEvent::RunFinished(report.clone()));
        Ok(report)
    }

    /// Perform one transition.
    fn step(
        &self,
        state: DriverState,
        latest: SequenceNumber,
        report: &mut SyncReport,
    ) -> Result<DriverState, SyncError> {
        let next = match state {
            DriverState::Idle => DriverState::Idle,
            DriverState::Polling(sequence) => self.poll(sequence)?,
            DriverState::Fetching(sequence) => self.fetch(sequence)?,
            DriverState::Applying(sequence, change_set) => {
                let diff = self.dispatcher.apply(sequence, &change_set, self.order)?;
                self.observe(SyncEvent::DiffApplied(diff.clone()));
                DriverState::Advanced(sequence, Some(diff))
            }
            DriverState::Advanced(sequence, diff) => {
                self.cursor.store(sequence, diff.as_ref())?;
                report.cursor = sequence;
                match diff {
                    Some(diff) => report.applied.push(diff),
                    None => report.skipped.push(sequence),
                }
                if sequence >= latest {
                    DriverState::Idle
                } else {
                    DriverState::Polling(sequence.next())
                }
            }
        };
        Ok(next)
    }

    fn poll(&self, sequence: SequenceNumber) -> Result<DriverState, SyncError> {
        if self.source.state_published(sequence)? {
            return Ok(DriverState::Fetching(sequence));
        }
        self.observe(SyncEvent::StateMissing { sequence });
        Ok(DriverState::Advanced(sequence, None))
    }

    fn fetch(&self, sequence: SequenceNumber) -> Result<DriverState, SyncError> {
        let payload = self.source.fetch_diff(sequence)?;
        if payload.is_empty() {
            self.observe(SyncEvent::DiffGone { sequence });
            return Ok(DriverState::Advanced(sequence, None));
        }
        let change_set = parse_change_set(&payload)
            .map_err(|source| SyncError::DiffParse { sequence, source })?;
        Ok(DriverState::Applying(sequence, change_set))
    }

    fn observe(&self, event: SyncEvent) {
        self.dispatcher.observer().record(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ElementId, ElementKind, MemoryCursor, ObjectSubjects,
        test_support::{
            RecordingEmitter, RecordingObserver, ScriptedConverter, StoreOp, StubNodeSource,
            StubReplicationSource,
        },
    };
    use rstest::rstest;

    const DIFF: &[u8] =
        br#"<osmChange version="0.6"><create><node id="1" lat="0" lon="0"/></create></osmChange>"#;

    const MODIFY_THEN_DELETE: &[u8] = br#"<osmChange version="0.6">
  <modify>
    <node id="1" version="2" lat="0" lon="0">
      <tag k="name" v="Old"/>
    </node>
  </modify>
  <delete>
    <node id="1" version="3" lat="0" lon="0"/>
  </delete>
</osmChange>"#;

    fn seq(raw: u64) -> SequenceNumber {
        SequenceNumber::new(raw)
    }

    #[derive(Default)]
    struct Parts {
        converter: ScriptedConverter,
        emitter: RecordingEmitter,
        nodes: StubNodeSource,
        observer: RecordingObserver,
        cursor: MemoryCursor,
    }

    fn run(
        parts: &Parts,
        source: &StubReplicationSource,
        from: u64,
    ) -> Result<SyncReport, SyncError> {
        let dispatcher =
            ChangeDispatcher::new(&parts.converter, &parts.emitter, &parts.nodes, &parts.observer);
        DiffDriver::new(source, &parts.cursor, dispatcher).run(seq(from))
    }

    #[rstest]
    #[case(102)]
    #[case(103)]
    fn up_to_date_cursor_is_a_no_op(#[case] from: u64) {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(102));
        let report = run(&parts, &source, from).expect("no-op run");
        assert!(!report.advanced());
        assert!(parts.cursor.history().is_empty());
        assert!(source.fetched().is_empty());
    }

    #[rstest]
    fn drains_whole_range() {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(13))
            .with_diff(seq(11), DIFF)
            .with_diff(seq(12), DIFF)
            .with_diff(seq(13), DIFF);
        let report = run(&parts, &source, 10).expect("run succeeds");
        assert_eq!(report.cursor, seq(13));
        assert_eq!(report.applied.len(), 3);
        assert_eq!(parts.cursor.history(), vec![seq(11), seq(12), seq(13)]);
    }

    #[rstest]
    fn parse_failure_keeps_previous_cursor() {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(3))
            .with_diff(seq(2), DIFF)
            .with_diff(seq(3), b"<osm/>".as_slice());
        let err = run(&parts, &source, 1).expect_err("bad diff aborts");
        assert!(matches!(err, SyncError::DiffParse { sequence, .. } if sequence == seq(3)));
        assert_eq!(parts.cursor.history(), vec![seq(2)]);
    }

    #[rstest]
    fn missing_diff_is_fatal() {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(2));
        let err = run(&parts, &source, 1).expect_err("diff unavailable");
        assert!(matches!(
            err,
            SyncError::Replication(ReplicationError::DiffUnavailable { .. })
        ));
        assert!(parts.cursor.history().is_empty());
    }

    #[rstest]
    fn unreachable_upstream_is_fatal() {
        let parts = Parts::default();
        let err = run(&parts, &StubReplicationSource::unreachable(), 1).expect_err("no state");
        assert!(matches!(
            err,
            SyncError::Replication(ReplicationError::UpstreamUnavailable { .. })
        ));
    }

    #[rstest]
    fn store_failure_keeps_cursor() {
        let parts = Parts {
            emitter: RecordingEmitter::default().failing_inserts(),
            ..Parts::default()
        };
        let source = StubReplicationSource::new(seq(2)).with_diff(seq(2), DIFF);
        let err = run(&parts, &source, 1).expect_err("store fails");
        assert!(matches!(err, SyncError::Store(_)));
        assert!(parts.cursor.history().is_empty());
    }

    fn op_names(emitter: &RecordingEmitter) -> Vec<&'static str> {
        emitter
            .ops()
            .iter()
            .map(|op| match op {
                StoreOp::Delete(_) => "delete",
                StoreOp::Insert(_) => "insert",
            })
            .collect()
    }

    #[rstest]
    fn later_delete_of_modified_object_wins_by_default() {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(2)).with_diff(seq(2), MODIFY_THEN_DELETE);
        run(&parts, &source, 1).expect("run succeeds");

        assert_eq!(op_names(&parts.emitter), vec!["delete", "insert", "delete"]);
        let subjects = ObjectSubjects::of(ElementKind::Node, ElementId::new(1));
        assert_eq!(parts.emitter.ops().last(), Some(&StoreOp::Delete(subjects)));
    }

    #[rstest]
    fn grouped_order_reinserts_a_deleted_object() {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(2)).with_diff(seq(2), MODIFY_THEN_DELETE);
        let dispatcher =
            ChangeDispatcher::new(&parts.converter, &parts.emitter, &parts.nodes, &parts.observer);
        DiffDriver::new(&source, &parts.cursor, dispatcher)
            .with_order(ApplyOrder::Grouped)
            .run(seq(1))
            .expect("run succeeds");

        assert_eq!(op_names(&parts.emitter), vec!["delete", "delete", "insert"]);
    }

    #[rstest]
    fn resume_requires_recorded_cursor() {
        let parts = Parts::default();
        let source = StubReplicationSource::new(seq(2));
        let dispatcher =
            ChangeDispatcher::new(&parts.converter, &parts.emitter, &parts.nodes, &parts.observer);
        let err = DiffDriver::new(&source, &parts.cursor, dispatcher)
            .resume()
            .expect_err("nothing recorded");
        assert!(matches!(err, SyncError::CursorUnset));
    }
}

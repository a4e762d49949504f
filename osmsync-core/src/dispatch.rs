//! Translation of individual changed objects into store operations.

use crate::{
    ApplyOrder, ChangeAction, ChangeSet, ChangedObject, ConversionError, Converter, DiffReport,
    ElementKind, NodeSource, ObjectSubjects, SequenceNumber, StoreError, SyncEvent, SyncObserver,
    UpdateEmitter,
    normalize::{prepare, strip_marker},
    resolve_way_nodes,
};

/// What happened to one object.
#[derive(Debug)]
pub enum ObjectOutcome {
    /// Store operations were issued.
    Applied,
    /// Conversion produced no statements, so nothing was inserted.
    Empty,
    /// Conversion failed; the object was left out.
    Failed(ConversionError),
}

/// Applies changed objects to the store.
///
/// Deletions remove the primary and geometry subjects in one call.
/// Creations are converted and inserted. Modifications delete and then
/// create, as two independent store calls.
///
/// Conversion failures are isolated to the object that caused them; store
/// failures abort the diff.
#[derive(Debug)]
pub struct ChangeDispatcher<C, E, N, O> {
    converter: C,
    emitter: E,
    nodes: N,
    observer: O,
}

impl<C, E, N, O> ChangeDispatcher<C, E, N, O>
where
    C: Converter,
    E: UpdateEmitter,
    N: NodeSource,
    O: SyncObserver,
{
    /// Build a dispatcher from its collaborators.
    #[must_use]
    pub const fn new(converter: C, emitter: E, nodes: N, observer: O) -> Self {
        Self {
            converter,
            emitter,
            nodes,
            observer,
        }
    }

    /// Observer receiving this dispatcher's events.
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Apply every object of `change_set` in `order`.
    ///
    /// # Errors
    /// Returns [`StoreError`] as soon as a store call fails; objects applied
    /// before the failure stay applied.
    pub fn apply(
        &self,
        sequence: SequenceNumber,
        change_set: &ChangeSet,
        order: ApplyOrder,
    ) -> Result<DiffReport, StoreError> {
        let mut report = DiffReport::new(sequence);
        for (action, object) in change_set.in_order(order) {
            match self.apply_object(sequence, action, object)? {
                ObjectOutcome::Applied => report.record_applied(action, object.kind),
                ObjectOutcome::Empty => report.empty += 1,
                ObjectOutcome::Failed(error) => {
                    report.failed += 1;
                    self.observer.record(&SyncEvent::ObjectFailed {
                        sequence,
                        action,
                        kind: object.kind,
                        id: object.id,
                        error: error.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Apply a single object.
    ///
    /// # Errors
    /// Returns [`StoreError`] when a store call fails.
    pub fn apply_object(
        &self,
        sequence: SequenceNumber,
        action: ChangeAction,
        object: &ChangedObject,
    ) -> Result<ObjectOutcome, StoreError> {
        match action {
            ChangeAction::Delete => {
                self.delete(object)?;
                Ok(ObjectOutcome::Applied)
            }
            ChangeAction::Create => self.create(sequence, object),
            ChangeAction::Modify => {
                self.delete(object)?;
                self.create(sequence, object)
            }
        }
    }

    fn delete(&self, object: &ChangedObject) -> Result<(), StoreError> {
        self.emitter
            .delete(&ObjectSubjects::of(object.kind, object.id))
    }

    fn create(
        &self,
        sequence: SequenceNumber,
        object: &ChangedObject,
    ) -> Result<ObjectOutcome, StoreError> {
        let dependencies = match object.kind {
            ElementKind::Way => self.way_dependencies(sequence, object),
            ElementKind::Node | ElementKind::Relation => String::new(),
        };
        let payload = prepare(object, &dependencies);
        let triples = match self.converter.convert(&payload.document) {
            Ok(triples) => strip_marker(triples, payload.marked),
            Err(error) => return Ok(ObjectOutcome::Failed(error)),
        };
        if triples.is_empty() {
            self.observer.record(&SyncEvent::EmptyConversion {
                sequence,
                kind: object.kind,
                id: object.id,
            });
            return Ok(ObjectOutcome::Empty);
        }
        self.emitter.insert(&triples)?;
        Ok(ObjectOutcome::Applied)
    }

    fn way_dependencies(&self, sequence: SequenceNumber, way: &ChangedObject) -> String {
        let resolution = resolve_way_nodes(way, &self.nodes);
        for (node, reason) in resolution.unresolved {
            self.observer.record(&SyncEvent::NodeUnresolved {
                sequence,
                way: way.id,
                node,
                reason,
            });
        }
        resolution.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ChildElement, ElementId, Triples,
        test_support::{
            RecordingEmitter, RecordingObserver, ScriptedConverter, StoreOp, StubNodeSource,
        },
    };
    use rstest::{fixture, rstest};

    type TestDispatcher<'a> = ChangeDispatcher<
        &'a ScriptedConverter,
        &'a RecordingEmitter,
        &'a StubNodeSource,
        &'a RecordingObserver,
    >;

    struct Harness {
        converter: ScriptedConverter,
        emitter: RecordingEmitter,
        nodes: StubNodeSource,
        observer: RecordingObserver,
    }

    impl Harness {
        fn dispatcher(&self) -> TestDispatcher<'_> {
            ChangeDispatcher::new(&self.converter, &self.emitter, &self.nodes, &self.observer)
        }
    }

    #[fixture]
    fn harness() -> Harness {
        Harness {
            converter: ScriptedConverter::default(),
            emitter: RecordingEmitter::default(),
            nodes: StubNodeSource::default(),
            observer: RecordingObserver::default(),
        }
    }

    fn sequence() -> SequenceNumber {
        SequenceNumber::new(7)
    }

    #[rstest]
    fn delete_removes_both_subjects_once(harness: Harness) {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(3));
        let outcome = harness
            .dispatcher()
            .apply_object(sequence(), ChangeAction::Delete, &node)
            .expect("delete succeeds");
        assert!(matches!(outcome, ObjectOutcome::Applied));
        assert_eq!(
            harness.emitter.ops(),
            vec![StoreOp::Delete(ObjectSubjects::of(
                ElementKind::Node,
                ElementId::new(3)
            ))]
        );
        assert!(harness.converter.payloads().is_empty());
    }

    #[rstest]
    fn repeated_deletes_are_harmless(harness: Harness) {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(3));
        let dispatcher = harness.dispatcher();
        for _ in 0..2 {
            dispatcher
                .apply_object(sequence(), ChangeAction::Delete, &node)
                .expect("delete succeeds");
        }
        assert_eq!(harness.emitter.ops().len(), 2);
    }

    #[rstest]
    fn create_strips_marker_statements(harness: Harness) {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(11));
        harness
            .dispatcher()
            .apply_object(sequence(), ChangeAction::Create, &node)
            .expect("create succeeds");
        let inserted = harness.emitter.inserted();
        assert_eq!(inserted.len(), 1);
        assert!(!inserted[0].as_str().contains("TEMPORARY"));
        assert!(inserted[0].as_str().contains("osmnode:11"));
        assert!(harness.converter.payloads()[0].contains("TEMPORARY"));
    }

    #[rstest]
    fn modify_deletes_before_inserting(harness: Harness) {
        let way = ChangedObject::new(ElementKind::Way, ElementId::new(4))
            .with_child(ChildElement::tag("highway", "path"));
        harness
            .dispatcher()
            .apply_object(sequence(), ChangeAction::Modify, &way)
            .expect("modify succeeds");
        let ops = harness.emitter.ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], StoreOp::Delete(subjects) if subjects.primary.as_str() == "osmway:4"));
        assert!(matches!(&ops[1], StoreOp::Insert(_)));
    }

    #[rstest]
    fn empty_conversion_skips_insert(harness: Harness) {
        let converter = ScriptedConverter::default().silent_for(ElementKind::Node, ElementId::new(8));
        let dispatcher = ChangeDispatcher::new(
            &converter,
            &harness.emitter,
            &harness.nodes,
            &harness.observer,
        );
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(8));
        let outcome = dispatcher
            .apply_object(sequence(), ChangeAction::Create, &node)
            .expect("no store error");
        assert!(matches!(outcome, ObjectOutcome::Empty));
        assert!(harness.emitter.ops().is_empty());
        assert_eq!(
            harness.observer.events(),
            vec![SyncEvent::EmptyConversion {
                sequence: sequence(),
                kind: ElementKind::Node,
                id: ElementId::new(8),
            }]
        );
    }

    #[rstest]
    fn conversion_failure_is_isolated(harness: Harness) {
        let converter =
            ScriptedConverter::default().failing_for(ElementKind::Node, ElementId::new(1));
        let dispatcher = ChangeDispatcher::new(
            &converter,
            &harness.emitter,
            &harness.nodes,
            &harness.observer,
        );
        let change_set = ChangeSet::new(vec![crate::ChangeGroup {
            action: ChangeAction::Create,
            objects: vec![
                ChangedObject::new(ElementKind::Node, ElementId::new(1)),
                ChangedObject::new(ElementKind::Node, ElementId::new(2)),
            ],
        }]);
        let report = dispatcher
            .apply(sequence(), &change_set, ApplyOrder::Grouped)
            .expect("no store error");
        assert_eq!(report.failed, 1);
        assert_eq!(report.created.nodes, 1);
        assert_eq!(harness.emitter.inserted().len(), 1);
        assert!(matches!(
            harness.observer.events().as_slice(),
            [SyncEvent::ObjectFailed { id, .. }] if *id == ElementId::new(1)
        ));
    }

    #[rstest]
    fn store_failure_aborts(harness: Harness) {
        let emitter = RecordingEmitter::default().failing_inserts();
        let dispatcher = ChangeDispatcher::new(
            &harness.converter,
            &emitter,
            &harness.nodes,
            &harness.observer,
        );
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(1));
        let err = dispatcher
            .apply_object(sequence(), ChangeAction::Create, &node)
            .expect_err("insert fails");
        assert!(matches!(err, StoreError::Request { .. }));
    }

    #[rstest]
    fn way_nodes_precede_way_in_payload(harness: Harness) {
        let nodes = StubNodeSource::default()
            .with_node(ElementId::new(5), "1.0", "1.0")
            .with_node(ElementId::new(7), "2.0", "2.0");
        let dispatcher = ChangeDispatcher::new(
            &harness.converter,
            &harness.emitter,
            &nodes,
            &harness.observer,
        );
        let way = [5, 5, 7].into_iter().fold(
            ChangedObject::new(ElementKind::Way, ElementId::new(9)),
            |way, raw| way.with_child(ChildElement::node_ref(ElementId::new(raw))),
        );
        dispatcher
            .apply_object(sequence(), ChangeAction::Create, &way)
            .expect("create succeeds");
        let payload = &harness.converter.payloads()[0];
        let first = payload.find("<node id=\"5\"").expect("node 5");
        let second = payload.find("<node id=\"7\"").expect("node 7");
        let owner = payload.find("<way id=\"9\"").expect("way");
        assert!(first < second && second < owner);
        assert_eq!(nodes.requests(), vec![ElementId::new(5), ElementId::new(7)]);
        let inserted: Vec<Triples> = harness.emitter.inserted();
        assert!(inserted[0].as_str().contains("osmway:9"));
    }
}

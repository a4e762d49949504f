//! Test-only, in-memory collaborators used by unit and behaviour tests.
//!
//! None of these touch the network, the filesystem or a real converter.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

use crate::{
    ConversionError, Converter, ElementId, ElementKind, NodeSource, ObjectSubjects,
    ReplicationError, ReplicationSource, SequenceNumber, StoreError, SyncEvent, SyncObserver,
    TransportError, Triples, UpdateEmitter,
};

const STUB_URL: &str = "stub://";

fn http_error(status: u16, what: impl std::fmt::Display) -> TransportError {
    TransportError::Http {
        url: format!("{STUB_URL}{what}"),
        status,
        message: "stubbed response".to_owned(),
    }
}

/// Replication feed served from memory.
///
/// Sequences without a scripted diff are published but answer `404` when
/// their diff is fetched.
#[derive(Debug)]
pub struct StubReplicationSource {
    latest: Result<SequenceNumber, TransportError>,
    unpublished: BTreeSet<SequenceNumber>,
    gone: BTreeSet<SequenceNumber>,
    diffs: BTreeMap<SequenceNumber, Vec<u8>>,
    fetched: RefCell<Vec<SequenceNumber>>,
}

impl StubReplicationSource {
    /// Feed whose latest sequence is `latest`.
    #[must_use]
    pub fn new(latest: SequenceNumber) -> Self {
        Self {
            latest: Ok(latest),
            unpublished: BTreeSet::new(),
            gone: BTreeSet::new(),
            diffs: BTreeMap::new(),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// Feed whose state endpoint fails.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            latest: Err(http_error(503, "state.txt")),
            ..Self::new(SequenceNumber::default())
        }
    }

    /// Serve `diff` for `sequence`.
    #[must_use]
    pub fn with_diff(mut self, sequence: SequenceNumber, diff: impl Into<Vec<u8>>) -> Self {
        self.diffs.insert(sequence, diff.into());
        self
    }

    /// Report no state document for `sequence`.
    #[must_use]
    pub fn with_unpublished(mut self, sequence: SequenceNumber) -> Self {
        self.unpublished.insert(sequence);
        self
    }

    /// Answer `410 Gone` for the diff of `sequence`.
    #[must_use]
    pub fn with_gone(mut self, sequence: SequenceNumber) -> Self {
        self.gone.insert(sequence);
        self
    }

    /// Sequences whose diff was requested, in request order.
    #[must_use]
    pub fn fetched(&self) -> Vec<SequenceNumber> {
        self.fetched.borrow().clone()
    }
}

impl ReplicationSource for StubReplicationSource {
    fn latest_sequence(&self) -> Result<SequenceNumber, ReplicationError> {
        self.latest
            .clone()
            .map_err(|source| ReplicationError::UpstreamUnavailable { source })
    }

    fn state_published(&self, sequence: SequenceNumber) -> Result<bool, ReplicationError> {
        Ok(!self.unpublished.contains(&sequence))
    }

    fn fetch_diff(&self, sequence: SequenceNumber) -> Result<Vec<u8>, ReplicationError> {
        self.fetched.borrow_mut().push(sequence);
        if self.gone.contains(&sequence) {
            return Ok(Vec::new());
        }
        self.diffs
            .get(&sequence)
            .cloned()
            .ok_or_else(|| ReplicationError::DiffUnavailable {
                sequence,
                source: http_error(404, sequence.sharded_path()),
            })
    }
}

/// Live-data node source served from memory.
///
/// Unknown nodes answer `404`.
#[derive(Debug, Default)]
pub struct StubNodeSource {
    documents: BTreeMap<ElementId, Result<Vec<u8>, TransportError>>,
    requests: RefCell<Vec<ElementId>>,
}

impl StubNodeSource {
    /// Serve a node at `(lat, lon)`.
    #[must_use]
    pub fn with_node(self, id: ElementId, lat: &str, lon: &str) -> Self {
        let document = format!(
            r#"<osm version="0.6"><node id="{id}" visible="true" version="1" lat="{lat}" lon="{lon}"/></osm>"#
        );
        self.with_document(id, document)
    }

    /// Serve a raw document for `id`.
    #[must_use]
    pub fn with_document(mut self, id: ElementId, document: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(id, Ok(document.into()));
        self
    }

    /// Answer `status` for `id`.
    #[must_use]
    pub fn with_failure(mut self, id: ElementId, status: u16) -> Self {
        self.documents
            .insert(id, Err(http_error(status, format!("node/{id}"))));
        self
    }

    /// Node ids requested so far, in request order.
    #[must_use]
    pub fn requests(&self) -> Vec<ElementId> {
        self.requests.borrow().clone()
    }
}

impl NodeSource for StubNodeSource {
    fn fetch_node(&self, id: ElementId) -> Result<Vec<u8>, TransportError> {
        self.requests.borrow_mut().push(id);
        self.documents
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Err(http_error(404, format!("node/{id}"))))
    }
}

/// Converter that synthesises Turtle from the payload.
///
/// Each object line yields an `rdf:type` statement and each `tag` child a
/// property statement on the object's primary subject. Output includes a
/// prefix header, which is stripped before returning.
#[derive(Debug, Default)]
pub struct ScriptedConverter {
    failing: BTreeSet<(ElementKind, ElementId)>,
    silent: BTreeSet<(ElementKind, ElementId)>,
    payloads: RefCell<Vec<String>>,
}

impl ScriptedConverter {
    /// Fail whenever the payload's last object is `(kind, id)`.
    #[must_use]
    pub fn failing_for(mut self, kind: ElementKind, id: ElementId) -> Self {
        self.failing.insert((kind, id));
        self
    }

    /// Produce no statements whenever the payload's last object is `(kind, id)`.
    #[must_use]
    pub fn silent_for(mut self, kind: ElementKind, id: ElementId) -> Self {
        self.silent.insert((kind, id));
        self
    }

    /// Payloads received so far.
    #[must_use]
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.borrow().clone()
    }
}

impl Converter for ScriptedConverter {
    fn convert(&self, payload: &str) -> Result<Triples, ConversionError> {
        self.payloads.borrow_mut().push(payload.to_owned());
        let owner = payload.lines().filter_map(object_header).last();
        if let Some(key) = owner {
            if self.failing.contains(&key) {
                return Err(ConversionError::Exit { code: Some(1) });
            }
            if self.silent.contains(&key) {
                return Ok(Triples::default());
            }
        }
        Ok(Triples::new(synthesise(payload)).strip_headers())
    }
}

fn synthesise(payload: &str) -> String {
    let mut turtle = String::from("@prefix osmkey: <https://www.openstreetmap.org/wiki/Key:> .\n");
    let mut subject = None;
    for line in payload.lines() {
        if let Some((kind, id)) = object_header(line) {
            let primary = ObjectSubjects::of(kind, id).primary;
            turtle.push_str(&format!("{primary} rdf:type osm:{kind} .\n"));
            subject = Some(primary);
        } else if let (Some(primary), Some((key, value))) = (&subject, tag_line(line)) {
            turtle.push_str(&format!("{primary} osmkey:{key} \"{value}\" .\n"));
        }
    }
    turtle
}

fn object_header(line: &str) -> Option<(ElementKind, ElementId)> {
    let line = line.trim_start();
    let name = line.strip_prefix('<')?.split([' ', '/', '>']).next()?;
    let kind = name.parse().ok()?;
    let id = attribute(line, "id")?.parse().ok()?;
    Some((kind, id))
}

fn tag_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if !line.starts_with("<tag ") {
        return None;
    }
    Some((attribute(line, "k")?, attribute(line, "v")?))
}

fn attribute<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {name}=\"");
    let start = line.find(&needle)? + needle.len();
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}

/// A store call observed by [`RecordingEmitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Deletion of an object's subjects.
    Delete(ObjectSubjects),
    /// Insertion of triples.
    Insert(Triples),
}

/// Emitter recording every store call in order.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    ops: RefCell<Vec<StoreOp>>,
    fail_inserts: bool,
}

impl RecordingEmitter {
    /// Emitter whose inserts fail after being recorded.
    #[must_use]
    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    /// Calls observed so far.
    #[must_use]
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.borrow().clone()
    }

    /// Triples passed to `insert`, in call order.
    #[must_use]
    pub fn inserted(&self) -> Vec<Triples> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                StoreOp::Insert(triples) => Some(triples.clone()),
                StoreOp::Delete(_) => None,
            })
            .collect()
    }
}

impl UpdateEmitter for RecordingEmitter {
    fn delete(&self, subjects: &ObjectSubjects) -> Result<(), StoreError> {
        self.ops.borrow_mut().push(StoreOp::Delete(subjects.clone()));
        Ok(())
    }

    fn insert(&self, triples: &Triples) -> Result<(), StoreError> {
        self.ops.borrow_mut().push(StoreOp::Insert(triples.clone()));
        if self.fail_inserts {
            return Err(StoreError::Request {
                source: http_error(500, "sparql"),
            });
        }
        Ok(())
    }
}

/// Observer collecting every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<SyncEvent>>,
}

impl RecordingObserver {
    /// Events observed so far.
    #[must_use]
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.borrow().clone()
    }
}

impl SyncObserver for RecordingObserver {
    fn record(&self, event: &SyncEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

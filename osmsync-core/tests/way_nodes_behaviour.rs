//! Behavioural tests for resolving the nodes a created way depends on.

use std::{cell::RefCell, fs, path::PathBuf};

use osmsync_core::{
    ChangedObject, ChildElement, ElementId, ElementKind, NodeResolution, UnresolvedNode,
    normalize::{PreparedPayload, prepare},
    resolve_way_nodes,
    test_support::StubNodeSource,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Default)]
struct Resolution {
    resolution: NodeResolution,
    payload: Option<PreparedPayload>,
}

#[fixture]
fn way() -> RefCell<Option<ChangedObject>> {
    RefCell::new(None)
}

#[fixture]
fn live() -> RefCell<StubNodeSource> {
    RefCell::new(StubNodeSource::default())
}

#[fixture]
fn resolved() -> RefCell<Resolution> {
    RefCell::new(Resolution::default())
}

#[given("a way referencing nodes 5, 5 and 7")]
fn way_with_repeats(#[from(way)] way: &RefCell<Option<ChangedObject>>) {
    let object = [5, 5, 7].into_iter().fold(
        ChangedObject::new(ElementKind::Way, ElementId::new(900))
            .with_attribute("version", "1"),
        |way, raw| way.with_child(ChildElement::node_ref(ElementId::new(raw))),
    );
    *way.borrow_mut() = Some(object.with_child(ChildElement::tag("highway", "footway")));
}

#[given("a live-data source that knows nodes 5 and 7")]
fn source_knows_both(#[from(live)] live: &RefCell<StubNodeSource>) {
    let source = StubNodeSource::default()
        .with_node(ElementId::new(5), "47.1", "7.1")
        .with_node(ElementId::new(7), "47.2", "7.2");
    *live.borrow_mut() = source;
}

#[given("a live-data source where node 7 is gone")]
fn source_lost_one(#[from(live)] live: &RefCell<StubNodeSource>) {
    let source = StubNodeSource::default()
        .with_node(ElementId::new(5), "47.1", "7.1")
        .with_failure(ElementId::new(7), 410);
    *live.borrow_mut() = source;
}

#[when("the way is prepared for conversion")]
fn prepare_way(
    #[from(way)] way: &RefCell<Option<ChangedObject>>,
    #[from(live)] live: &RefCell<StubNodeSource>,
    #[from(resolved)] resolved: &RefCell<Resolution>,
) {
    let way = way.borrow();
    let way = way.as_ref().expect("way configured");
    let resolution = resolve_way_nodes(way, &*live.borrow());
    let payload = prepare(way, &resolution.blocks);
    *resolved.borrow_mut() = Resolution {
        resolution,
        payload: Some(payload),
    };
}

fn document(resolved: &RefCell<Resolution>) -> String {
    resolved
        .borrow()
        .payload
        .as_ref()
        .expect("way was prepared")
        .document
        .clone()
}

#[then("nodes 5 and 7 are each requested once")]
fn requested_once(#[from(live)] live: &RefCell<StubNodeSource>) {
    assert_eq!(
        live.borrow().requests(),
        vec![ElementId::new(5), ElementId::new(7)]
    );
}

#[then("the node blocks precede the way in the payload")]
fn blocks_precede(#[from(resolved)] resolved: &RefCell<Resolution>) {
    let document = document(resolved);
    let five = document.find("<node id=\"5\"").expect("node 5 serialised");
    let seven = document.find("<node id=\"7\"").expect("node 7 serialised");
    let owner = document.find("<way id=\"900\"").expect("way serialised");
    assert!(five < seven && seven < owner, "unexpected layout:\n{document}");
}

#[then("node 7 is reported as unresolved")]
fn node_unresolved(#[from(resolved)] resolved: &RefCell<Resolution>) {
    let borrowed = resolved.borrow();
    let unresolved = &borrowed.resolution.unresolved;
    assert_eq!(unresolved.len(), 1);
    let (node, reason) = &unresolved[0];
    assert_eq!(*node, ElementId::new(7));
    assert!(matches!(reason, UnresolvedNode::Transport(err) if err.is_gone()));
}

#[then("only node 5 precedes the way in the payload")]
fn only_one_block(#[from(resolved)] resolved: &RefCell<Resolution>) {
    let document = document(resolved);
    assert!(document.contains("<node id=\"5\""));
    assert!(!document.contains("<node id=\"7\""));
    assert!(document.contains("<nd ref=\"7\"/>"));
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/way_nodes.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "fetching each referenced node once",
            "omitting a deleted node"
        ],
        "scenario order changed in feature file"
    );
}

#[scenario(path = "tests/features/way_nodes.feature", index = 0)]
fn fetching_each_node_once(
    way: RefCell<Option<ChangedObject>>,
    live: RefCell<StubNodeSource>,
    resolved: RefCell<Resolution>,
) {
    let _ = (way, live, resolved);
}

#[scenario(path = "tests/features/way_nodes.feature", index = 1)]
fn omitting_deleted_node(
    way: RefCell<Option<ChangedObject>>,
    live: RefCell<StubNodeSource>,
    resolved: RefCell<Resolution>,
) {
    let _ = (way, live, resolved);
}

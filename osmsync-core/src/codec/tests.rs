//! Unit coverage for osmChange decoding and object encoding.

use super::*;
use crate::ElementId;
use rstest::{fixture, rstest};

#[fixture]
fn minute_diff() -> &'static [u8] {
    br#"<?xml version="1.0" encoding="UTF-8"?>
<osmChange version="0.6" generator="osmdbt-create-diff/0.6">
  <modify>
    <node id="1642992563" version="4" timestamp="2024-01-06T11:59:01Z" lat="47.99" lon="7.84">
      <tag k="amenity" v="bench"/>
    </node>
  </modify>
  <create>
    <node id="11" version="1" lat="47.1" lon="7.1"/>
    <way id="7738035" version="1">
      <nd ref="5"/>
      <nd ref="5"/>
      <nd ref="7"/>
      <tag k="highway" v="path"/>
    </way>
  </create>
  <delete>
    <relation id="2727671" version="9" visible="false"/>
  </delete>
  <create/>
</osmChange>"#
}

#[rstest]
fn decodes_groups_in_document_order(minute_diff: &[u8]) {
    let change_set = parse_change_set(minute_diff).expect("diff should decode");
    let actions: Vec<ChangeAction> = change_set.groups().iter().map(|g| g.action).collect();
    assert_eq!(
        actions,
        vec![
            ChangeAction::Modify,
            ChangeAction::Create,
            ChangeAction::Delete,
            ChangeAction::Create,
        ]
    );
    assert_eq!(change_set.len(), 4);
}

#[rstest]
fn decodes_objects_with_children(minute_diff: &[u8]) {
    let change_set = parse_change_set(minute_diff).expect("diff should decode");
    let way = change_set
        .creations()
        .find(|object| object.kind == ElementKind::Way)
        .expect("diff should contain a way");
    assert_eq!(way.id, ElementId::new(7_738_035));
    assert_eq!(way.children.len(), 4);
    assert_eq!(way.node_refs(), vec![ElementId::new(5), ElementId::new(7)]);
    assert_eq!(way.attribute("version"), Some("1"));

    let node = change_set
        .creations()
        .find(|object| object.kind == ElementKind::Node)
        .expect("diff should contain a node");
    assert!(node.is_bare());
    assert_eq!(node.attributes.first().map(|(k, _)| k.as_str()), Some("id"));
}

#[rstest]
fn decodes_self_closing_root() {
    let change_set = parse_change_set(br#"<osmChange version="0.6"/>"#).expect("empty diff");
    assert!(change_set.is_empty());
}

#[rstest]
fn unescapes_attribute_values() {
    let diff = br#"<osmChange><create><node id="1"><tag k="name" v="A &amp; B &quot;C&quot;"/></node></create></osmChange>"#;
    let change_set = parse_change_set(diff).expect("diff should decode");
    let node = change_set.creations().next().expect("one node");
    assert_eq!(node.tags().collect::<Vec<_>>(), vec![("name", "A & B \"C\"")]);
}

#[rstest]
fn discards_nested_child_content() {
    let diff = br#"<osmChange><create><relation id="4"><member type="way" ref="1" role="outer"><extra/></member></relation></create></osmChange>"#;
    let change_set = parse_change_set(diff).expect("diff should decode");
    let relation = change_set.creations().next().expect("one relation");
    assert_eq!(relation.children.len(), 1);
    assert_eq!(relation.children[0].attribute("role"), Some("outer"));
}

#[rstest]
#[case::wrong_root(br#"<osm><node id="1"/></osm>"#.as_slice())]
#[case::no_root(b"<?xml version=\"1.0\"?>".as_slice())]
#[case::unknown_action(br#"<osmChange><upsert/></osmChange>"#.as_slice())]
#[case::unknown_kind(br#"<osmChange><create><changeset id="1"/></create></osmChange>"#.as_slice())]
#[case::missing_id(br#"<osmChange><create><node lat="1"/></create></osmChange>"#.as_slice())]
#[case::negative_id(br#"<osmChange><create><node id="-3"/></create></osmChange>"#.as_slice())]
#[case::truncated(br#"<osmChange><create><node id="1">"#.as_slice())]
#[case::mismatched(br#"<osmChange><create></delete></osmChange>"#.as_slice())]
#[case::gzip_bytes(b"\x1f\x8b\x08\x00\x00\x00".as_slice())]
fn rejects_malformed_diffs(#[case] payload: &[u8]) {
    assert!(
        parse_change_set(payload).is_err(),
        "payload {:?} should be rejected",
        String::from_utf8_lossy(payload)
    );
}

#[rstest]
fn reports_missing_id_kind() {
    let err = parse_change_set(br#"<osmChange><delete><way/></delete></osmChange>"#)
        .expect_err("way without id");
    assert!(matches!(
        err,
        CodecError::MissingId {
            kind: ElementKind::Way
        }
    ));
}

#[rstest]
fn live_document_skips_non_objects() {
    let document = br#"<?xml version="1.0"?>
<osm version="0.6" generator="openstreetmap-cgimap">
  <bounds minlat="1" minlon="1" maxlat="2" maxlon="2"/>
  <note>ignored <b>markup</b></note>
  <node id="5" lat="1.5" lon="1.5" version="2"/>
</osm>"#;
    let objects = parse_osm_document(document).expect("document should decode");
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].id, ElementId::new(5));
    assert_eq!(objects[0].attribute("lat"), Some("1.5"));
}

#[rstest]
fn writes_bare_objects_self_closing() {
    let node = ChangedObject::new(ElementKind::Node, ElementId::new(8))
        .with_attribute("lat", "1.0")
        .with_attribute("lon", "2.0");
    assert_eq!(write_object(&node), "<node id=\"8\" lat=\"1.0\" lon=\"2.0\"/>\n");
}

#[rstest]
fn written_objects_decode_to_the_same_object(minute_diff: &[u8]) {
    let change_set = parse_change_set(minute_diff).expect("diff should decode");
    let way = change_set
        .creations()
        .find(|object| object.kind == ElementKind::Way)
        .expect("diff should contain a way");
    let envelope = wrap_change_envelope(&format!("<create>{}</create>", write_object(way)));
    let decoded = parse_change_set(envelope.as_bytes()).expect("envelope should decode");
    assert_eq!(decoded.creations().next(), Some(way));
}

#[rstest]
fn envelope_wraps_payload() {
    let wrapped = wrap_change_envelope("<node id=\"1\"/>\n");
    assert!(wrapped.starts_with("<osmChange version=\"0.6\""));
    assert!(wrapped.ends_with("<node id=\"1\"/>\n</osmChange>"));
}

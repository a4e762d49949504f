//! Preparation of single objects for the converter.
//!
//! The converter emits nothing for an object without child elements, so such
//! objects receive a synthetic marker tag before conversion. Every output
//! line mentioning the marker is removed afterwards.

use crate::{
    ChangedObject, ChildElement, Triples,
    codec::{wrap_change_envelope, write_object},
};

/// Key of the synthetic marker tag.
pub const MARKER_KEY: &str = "TEMPORARY";
/// Value of the synthetic marker tag; output lines containing it are dropped.
pub const MARKER_VALUE: &str = "TEMPORARY";

/// Converter input built from one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPayload {
    /// Complete osmChange document.
    pub document: String,
    /// Whether a marker tag was appended.
    pub marked: bool,
}

/// Whether `object` needs the marker to survive conversion.
#[must_use]
pub fn needs_marker(object: &ChangedObject) -> bool {
    object.is_bare()
}

/// Build the converter input for `object`.
///
/// `dependencies` holds serialised objects the converter needs alongside
/// this one (the nodes of a way); they are placed ahead of the object.
///
/// # Examples
/// ```
/// use osmsync_core::{ChangedObject, ElementId, ElementKind, normalize::prepare};
///
/// let node = ChangedObject::new(ElementKind::Node, ElementId::new(1));
/// let payload = prepare(&node, "");
/// assert!(payload.marked);
/// assert!(payload.document.contains(r#"<tag k="TEMPORARY" v="TEMPORARY"/>"#));
/// ```
#[must_use]
pub fn prepare(object: &ChangedObject, dependencies: &str) -> PreparedPayload {
    let marked = needs_marker(object);
    let block = if marked {
        write_object(
            &object
                .clone()
                .with_child(ChildElement::tag(MARKER_KEY, MARKER_VALUE)),
        )
    } else {
        write_object(object)
    };
    PreparedPayload {
        document: wrap_change_envelope(&format!("{dependencies}{block}")),
        marked,
    }
}

/// Remove marker statements from converter output when a marker was added.
#[must_use]
pub fn strip_marker(triples: Triples, marked: bool) -> Triples {
    if marked {
        triples.without_lines_containing(MARKER_VALUE)
    } else {
        triples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementId, ElementKind};
    use rstest::rstest;

    #[rstest]
    fn tagged_objects_are_left_alone() {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(4))
            .with_child(ChildElement::tag("amenity", "bench"));
        let payload = prepare(&node, "");
        assert!(!payload.marked);
        assert!(!payload.document.contains(MARKER_VALUE));
    }

    #[rstest]
    fn ways_with_only_node_refs_are_not_bare() {
        let way = ChangedObject::new(ElementKind::Way, ElementId::new(4))
            .with_child(ChildElement::node_ref(ElementId::new(1)));
        assert!(!needs_marker(&way));
    }

    #[rstest]
    fn marked_payload_carries_exactly_one_marker() {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(4));
        let payload = prepare(&node, "");
        assert_eq!(payload.document.matches("<tag ").count(), 1);
    }

    #[rstest]
    fn dependencies_precede_the_object() {
        let way = ChangedObject::new(ElementKind::Way, ElementId::new(9))
            .with_child(ChildElement::node_ref(ElementId::new(5)));
        let payload = prepare(&way, "<node id=\"5\" lat=\"1\" lon=\"1\"/>\n");
        let node_at = payload.document.find("<node").expect("node block");
        let way_at = payload.document.find("<way").expect("way block");
        assert!(node_at < way_at);
    }

    #[rstest]
    fn objects_sit_directly_inside_the_envelope() {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(4));
        let payload = prepare(&node, "");
        assert_eq!(
            payload.document,
            "<osmChange version=\"0.6\" generator=\"osmsync\">\n<node id=\"4\">\n  <tag k=\"TEMPORARY\" v=\"TEMPORARY\"/>\n</node>\n</osmChange>"
        );
    }

    #[rstest]
    #[case(true, "osmnode:4 osmmeta:version \"1\" .\n")]
    #[case(
        false,
        "osmnode:4 osmkey:TEMPORARY \"TEMPORARY\" .\nosmnode:4 osmmeta:version \"1\" .\n"
    )]
    fn strips_marker_only_when_added(#[case] marked: bool, #[case] expected: &str) {
        let output =
            Triples::new("osmnode:4 osmkey:TEMPORARY \"TEMPORARY\" .\nosmnode:4 osmmeta:version \"1\" .\n");
        assert_eq!(strip_marker(output, marked).as_str(), expected);
    }
}

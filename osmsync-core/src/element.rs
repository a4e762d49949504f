//! OpenStreetMap objects as they appear inside replication diffs.

use std::{collections::HashSet, fmt, str::FromStr};

use thiserror::Error;

/// Ordered `(name, value)` attribute pairs preserved for re-serialisation.
pub type Attributes = Vec<(String, String)>;

/// Kind of an OSM object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    /// A point with coordinates.
    Node,
    /// An ordered list of node references.
    Way,
    /// A grouping of members of any kind.
    Relation,
}

impl ElementKind {
    /// Element name used in OSM XML.
    #[must_use]
    pub const fn tag_name(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    /// Stem used when naming store subjects; relations abbreviate to `rel`.
    #[must_use]
    pub const fn subject_stem(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "rel",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// Error returned when an XML element name is not an OSM object kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown OSM element kind {0:?}")]
pub struct UnknownElementKind(pub String);

impl FromStr for ElementKind {
    type Err = UnknownElementKind;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(UnknownElementKind(other.to_owned())),
        }
    }
}

/// Upstream identifier of an OSM object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u64);

impl ElementId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ElementId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for ElementId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.parse().map(Self)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Child element of an OSM object (`tag`, `nd`, `member`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildElement {
    /// XML element name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Attributes,
}

impl ChildElement {
    /// Build a `<tag k=".." v=".."/>` child.
    #[must_use]
    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: "tag".to_owned(),
            attributes: vec![
                ("k".to_owned(), key.into()),
                ("v".to_owned(), value.into()),
            ],
        }
    }

    /// Build a `<nd ref=".."/>` child.
    #[must_use]
    pub fn node_ref(id: ElementId) -> Self {
        Self {
            name: "nd".to_owned(),
            attributes: vec![("ref".to_owned(), id.to_string())],
        }
    }

    /// Value of the named attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.attributes, name)
    }
}

/// One object carried by a diff or a live-data document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedObject {
    /// Object kind.
    pub kind: ElementKind,
    /// Upstream identifier (mirrors the `id` attribute).
    pub id: ElementId,
    /// Attributes in document order, including `id`.
    pub attributes: Attributes,
    /// Child elements in document order.
    pub children: Vec<ChildElement>,
}

impl ChangedObject {
    /// Build an object carrying only its `id` attribute.
    ///
    /// # Examples
    /// ```
    /// use osmsync_core::{ChangedObject, ChildElement, ElementId, ElementKind};
    ///
    /// let way = ChangedObject::new(ElementKind::Way, ElementId::new(7))
    ///     .with_child(ChildElement::node_ref(ElementId::new(5)))
    ///     .with_child(ChildElement::tag("highway", "service"));
    /// assert_eq!(way.node_refs(), vec![ElementId::new(5)]);
    /// assert_eq!(way.tags().collect::<Vec<_>>(), vec![("highway", "service")]);
    /// ```
    #[must_use]
    pub fn new(kind: ElementKind, id: ElementId) -> Self {
        Self {
            kind,
            id,
            attributes: vec![("id".to_owned(), id.to_string())],
            children: Vec::new(),
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn with_child(mut self, child: ChildElement) -> Self {
        self.children.push(child);
        self
    }

    /// Value of the named attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.attributes, name)
    }

    /// Whether the object has no child elements at all.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.children.is_empty()
    }

    /// `(key, value)` pairs of the object's `tag` children.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.children
            .iter()
            .filter(|child| child.name == "tag")
            .filter_map(|child| Some((child.attribute("k")?, child.attribute("v")?)))
    }

    /// Referenced node ids in first-seen order with duplicates removed.
    ///
    /// Closed ways repeat their first node; references that fail to parse are
    /// ignored.
    #[must_use]
    pub fn node_refs(&self) -> Vec<ElementId> {
        let mut seen = HashSet::new();
        self.children
            .iter()
            .filter(|child| child.name == "nd")
            .filter_map(|child| child.attribute("ref")?.parse::<ElementId>().ok())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

fn lookup<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn way_with_refs(refs: &[u64]) -> ChangedObject {
        refs.iter().fold(
            ChangedObject::new(ElementKind::Way, ElementId::new(1)),
            |way, raw| way.with_child(ChildElement::node_ref(ElementId::new(*raw))),
        )
    }

    #[rstest]
    #[case(&[5, 5, 7], &[5, 7])]
    #[case(&[1, 2, 3, 1], &[1, 2, 3])]
    #[case(&[], &[])]
    fn deduplicates_node_refs(#[case] refs: &[u64], #[case] expected: &[u64]) {
        let expected: Vec<ElementId> = expected.iter().copied().map(ElementId::new).collect();
        assert_eq!(way_with_refs(refs).node_refs(), expected);
    }

    #[rstest]
    fn ignores_malformed_refs() {
        let way = way_with_refs(&[3]).with_child(ChildElement {
            name: "nd".to_owned(),
            attributes: vec![("ref".to_owned(), "-x".to_owned())],
        });
        assert_eq!(way.node_refs(), vec![ElementId::new(3)]);
    }

    #[rstest]
    #[case("node", ElementKind::Node, "node")]
    #[case("way", ElementKind::Way, "way")]
    #[case("relation", ElementKind::Relation, "rel")]
    fn parses_kinds(#[case] name: &str, #[case] kind: ElementKind, #[case] stem: &str) {
        let parsed: ElementKind = name.parse().expect("kind should parse");
        assert_eq!(parsed, kind);
        assert_eq!(parsed.subject_stem(), stem);
        assert_eq!(parsed.tag_name(), name);
    }

    #[rstest]
    fn rejects_unknown_kind() {
        let err = "changeset".parse::<ElementKind>().expect_err("not an object kind");
        assert_eq!(err, UnknownElementKind("changeset".to_owned()));
    }

    #[rstest]
    fn bare_objects_have_no_children() {
        let node = ChangedObject::new(ElementKind::Node, ElementId::new(9));
        assert!(node.is_bare());
        assert!(!node.with_child(ChildElement::tag("a", "b")).is_bare());
    }
}

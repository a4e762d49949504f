//! Canonical store subjects derived from an object's kind and id.
//!
//! Subjects are prefixed names resolved against the namespace preamble sent
//! with every update. The geometry subject is where the converter attaches
//! the object's serialised geometry.

use std::fmt;

use crate::{ElementId, ElementKind};

/// Prefixed name identifying a resource in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    /// Primary subject, e.g. `osmnode:1642992563` or `osmrel:2727671`.
    ///
    /// # Examples
    /// ```
    /// use osmsync_core::{ElementId, ElementKind, Subject};
    ///
    /// let subject = Subject::primary(ElementKind::Relation, ElementId::new(2_727_671));
    /// assert_eq!(subject.as_str(), "osmrel:2727671");
    /// ```
    #[must_use]
    pub fn primary(kind: ElementKind, id: ElementId) -> Self {
        Self(format!("osm{}:{id}", kind.subject_stem()))
    }

    /// Companion geometry subject.
    ///
    /// | kind     | geometry subject            |
    /// |----------|-----------------------------|
    /// | node     | `osm2rdfgeom:osm_node_{id}` |
    /// | way      | `osm2rdf:way_{id}`          |
    /// | relation | `osm2rdf:rel_{id}`          |
    #[must_use]
    pub fn geometry(kind: ElementKind, id: ElementId) -> Self {
        let stem = kind.subject_stem();
        match kind {
            ElementKind::Node => Self(format!("osm2rdfgeom:osm_{stem}_{id}")),
            ElementKind::Way | ElementKind::Relation => Self(format!("osm2rdf:{stem}_{id}")),
        }
    }

    /// Prefixed-name form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pair of subjects owned by one OSM object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectSubjects {
    /// Subject carrying the object's own statements.
    pub primary: Subject,
    /// Subject carrying the converter-produced geometry.
    pub geometry: Subject,
}

impl ObjectSubjects {
    /// Derive both subjects for `(kind, id)`.
    #[must_use]
    pub fn of(kind: ElementKind, id: ElementId) -> Self {
        Self {
            primary: Subject::primary(kind, id),
            geometry: Subject::geometry(kind, id),
        }
    }
}

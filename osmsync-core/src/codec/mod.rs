//! osmChange and OSM XML decoding, plus the single-object encoding handed to
//! the converter.
//!
//! Decoding keeps attribute and child order so an object can be written back
//! byte-for-byte equivalent (modulo whitespace and quoting).

use std::{num::ParseIntError, str::Utf8Error};

use quick_xml::{
    escape::escape,
    events::{BytesStart, Event, attributes::AttrError},
    reader::Reader,
};
use thiserror::Error;

use crate::{
    Attributes, ChangeAction, ChangeGroup, ChangeSet, ChangedObject, ChildElement, ElementKind,
    element::UnknownElementKind,
};

const CHANGE_ROOT: &str = "osmChange";
const DOCUMENT_ROOT: &str = "osm";
const ENVELOPE_OPEN: &str = r#"<osmChange version="0.6" generator="osmsync">"#;
const ENVELOPE_CLOSE: &str = "</osmChange>";

/// Errors raised while decoding OSM XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The XML was not well formed.
    #[error("malformed XML: {source}")]
    Xml {
        #[source]
        source: quick_xml::Error,
    },
    /// An attribute could not be tokenised.
    #[error("malformed attribute: {source}")]
    Attribute {
        #[source]
        source: AttrError,
    },
    /// An element or attribute name was not valid UTF-8.
    #[error("element or attribute name is not UTF-8: {source}")]
    Utf8 {
        #[source]
        source: Utf8Error,
    },
    /// The document contained no root element.
    #[error("document has no root element")]
    MissingRoot,
    /// The root element was not the expected one.
    #[error("expected root element <{expected}>, found <{found}>")]
    UnexpectedRoot {
        /// Required root element name.
        expected: &'static str,
        /// Name that was found instead.
        found: String,
    },
    /// The document ended before its root element was closed.
    #[error("document ended before </{expected}>")]
    UnexpectedEof {
        /// Element that was left open.
        expected: String,
    },
    /// An osmChange block was not `create`, `modify` or `delete`.
    #[error("unknown change action <{name}>")]
    UnknownAction {
        /// Offending element name.
        name: String,
    },
    /// A change block contained something other than a node, way or relation.
    #[error(transparent)]
    UnknownKind(#[from] UnknownElementKind),
    /// An object had no `id` attribute.
    #[error("<{kind}> element has no id attribute")]
    MissingId {
        /// Kind of the offending object.
        kind: ElementKind,
    },
    /// An object's `id` attribute was not a non-negative integer.
    #[error("<{kind}> element has invalid id {value:?}: {source}")]
    InvalidId {
        /// Kind of the offending object.
        kind: ElementKind,
        /// Raw attribute value.
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Decode an osmChange document.
///
/// # Examples
/// ```
/// use osmsync_core::{ChangeAction, codec::parse_change_set};
///
/// let diff = br#"<?xml version="1.0" encoding="UTF-8"?>
/// <osmChange version="0.6">
///   <create><node id="1" lat="1.0" lon="2.0"/></create>
///   <delete><way id="2"/></delete>
/// </osmChange>"#;
/// let change_set = parse_change_set(diff)?;
/// assert_eq!(change_set.len(), 2);
/// assert_eq!(change_set.groups()[0].action, ChangeAction::Create);
/// # Ok::<(), osmsync_core::codec::CodecError>(())
/// ```
pub fn parse_change_set(bytes: &[u8]) -> Result<ChangeSet, CodecError> {
    let mut reader = xml_reader(bytes);
    if !open_root(&mut reader, CHANGE_ROOT)? {
        return Ok(ChangeSet::default());
    }
    let mut groups = Vec::new();
    loop {
        match next_event(&mut reader)? {
            Event::Start(start) => {
                let action = group_action(&start)?;
                let objects = read_objects(&mut reader, action.tag_name(), false)?;
                groups.push(ChangeGroup { action, objects });
            }
            Event::Empty(start) => {
                let action = group_action(&start)?;
                groups.push(ChangeGroup {
                    action,
                    objects: Vec::new(),
                });
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(CodecError::UnexpectedEof {
                    expected: CHANGE_ROOT.to_owned(),
                });
            }
            _ => {}
        }
    }
    Ok(ChangeSet::new(groups))
}

/// Decode the objects of a plain `<osm>` document such as a live-data
/// response.
///
/// Elements other than nodes, ways and relations (`bounds`, `note`, ...) are
/// skipped.
pub fn parse_osm_document(bytes: &[u8]) -> Result<Vec<ChangedObject>, CodecError> {
    let mut reader = xml_reader(bytes);
    if !open_root(&mut reader, DOCUMENT_ROOT)? {
        return Ok(Vec::new());
    }
    read_objects(&mut reader, DOCUMENT_ROOT, true)
}

/// Serialise a single object as an OSM XML element.
///
/// # Examples
/// ```
/// use osmsync_core::{ChangedObject, ChildElement, ElementId, ElementKind, codec::write_object};
///
/// let node = ChangedObject::new(ElementKind::Node, ElementId::new(3))
///     .with_child(ChildElement::tag("name", "Fish & Chips"));
/// assert_eq!(
///     write_object(&node),
///     "<node id=\"3\">\n  <tag k=\"name\" v=\"Fish &amp; Chips\"/>\n</node>\n"
/// );
/// ```
#[must_use]
pub fn write_object(object: &ChangedObject) -> String {
    let name = object.kind.tag_name();
    let attributes = write_attributes(&object.attributes);
    if object.children.is_empty() {
        return format!("<{name}{attributes}/>\n");
    }
    let mut xml = format!("<{name}{attributes}>\n");
    for child in &object.children {
        xml.push_str(&format!(
            "  <{}{}/>\n",
            child.name,
            write_attributes(&child.attributes)
        ));
    }
    xml.push_str(&format!("</{name}>\n"));
    xml
}

/// Wrap serialised objects in the osmChange envelope expected by the
/// converter.
#[must_use]
pub fn wrap_change_envelope(payload: &str) -> String {
    format!("{ENVELOPE_OPEN}\n{payload}{ENVELOPE_CLOSE}")
}

fn write_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!(" {key}=\"{}\"", escape(value.as_str())))
        .collect()
}

fn xml_reader(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    reader
}

fn next_event<'i>(reader: &mut Reader<&'i [u8]>) -> Result<Event<'i>, CodecError> {
    reader
        .read_event()
        .map_err(|source| CodecError::Xml { source })
}

/// Advance to the root element; returns `false` when it is self-closing.
fn open_root(reader: &mut Reader<&[u8]>, expected: &'static str) -> Result<bool, CodecError> {
    loop {
        let (start, has_content) = match next_event(reader)? {
            Event::Start(start) => (start, true),
            Event::Empty(start) => (start, false),
            Event::Eof => return Err(CodecError::MissingRoot),
            _ => continue,
        };
        let found = element_name(&start)?;
        if found != expected {
            return Err(CodecError::UnexpectedRoot { expected, found });
        }
        return Ok(has_content);
    }
}

fn group_action(start: &BytesStart<'_>) -> Result<ChangeAction, CodecError> {
    let name = element_name(start)?;
    ChangeAction::from_tag_name(&name).ok_or(CodecError::UnknownAction { name })
}

/// Read object elements until the enclosing `container` closes.
fn read_objects(
    reader: &mut Reader<&[u8]>,
    container: &str,
    skip_unknown: bool,
) -> Result<Vec<ChangedObject>, CodecError> {
    let mut objects = Vec::new();
    loop {
        match next_event(reader)? {
            Event::Start(start) => match object_kind(&start, skip_unknown)? {
                Some(kind) => {
                    let mut object = start_object(kind, &start)?;
                    read_children(reader, &mut object)?;
                    objects.push(object);
                }
                None => {
                    reader
                        .read_to_end(start.name())
                        .map_err(|source| CodecError::Xml { source })?;
                }
            },
            Event::Empty(start) => {
                if let Some(kind) = object_kind(&start, skip_unknown)? {
                    objects.push(start_object(kind, &start)?);
                }
            }
            Event::End(_) => return Ok(objects),
            Event::Eof => {
                return Err(CodecError::UnexpectedEof {
                    expected: container.to_owned(),
                });
            }
            _ => {}
        }
    }
}

fn object_kind(
    start: &BytesStart<'_>,
    skip_unknown: bool,
) -> Result<Option<ElementKind>, CodecError> {
    let name = element_name(start)?;
    match name.parse::<ElementKind>() {
        Ok(kind) => Ok(Some(kind)),
        Err(_) if skip_unknown => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn start_object(kind: ElementKind, start: &BytesStart<'_>) -> Result<ChangedObject, CodecError> {
    let attributes = read_attributes(start)?;
    let raw_id = attributes
        .iter()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.clone())
        .ok_or(CodecError::MissingId { kind })?;
    let id = raw_id
        .parse()
        .map_err(|source| CodecError::InvalidId {
            kind,
            value: raw_id.clone(),
            source,
        })?;
    Ok(ChangedObject {
        kind,
        id,
        attributes,
        children: Vec::new(),
    })
}

/// Collect direct children of an open object element; nested content below
/// a child is discarded.
fn read_children(
    reader: &mut Reader<&[u8]>,
    object: &mut ChangedObject,
) -> Result<(), CodecError> {
    loop {
        match next_event(reader)? {
            Event::Empty(start) => object.children.push(child_element(&start)?),
            Event::Start(start) => {
                object.children.push(child_element(&start)?);
                reader
                    .read_to_end(start.name())
                    .map_err(|source| CodecError::Xml { source })?;
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(CodecError::UnexpectedEof {
                    expected: object.kind.tag_name().to_owned(),
                });
            }
            _ => {}
        }
    }
}

fn child_element(start: &BytesStart<'_>) -> Result<ChildElement, CodecError> {
    Ok(ChildElement {
        name: element_name(start)?,
        attributes: read_attributes(start)?,
    })
}

fn element_name(start: &BytesStart<'_>) -> Result<String, CodecError> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_owned)
        .map_err(|source| CodecError::Utf8 { source })
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Attributes, CodecError> {
    start
        .attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(|source| CodecError::Attribute { source })?;
            let key = std::str::from_utf8(attribute.key.as_ref())
                .map_err(|source| CodecError::Utf8 { source })?
                .to_owned();
            let value = attribute
                .unescape_value()
                .map_err(|source| CodecError::Xml { source })?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests;

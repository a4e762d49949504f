//! Resolution of the nodes a way references.
//!
//! The converter needs node coordinates to build way geometries, so every
//! node referenced by a created way is fetched from the live-data API and
//! serialised ahead of the way.

use thiserror::Error;

use crate::{
    ChangedObject, ElementId, ElementKind, TransportError,
    codec::{parse_osm_document, write_object},
};

/// Fetches the current version of a single node.
pub trait NodeSource {
    /// Raw `<osm>` document describing node `id`.
    ///
    /// # Errors
    /// Returns [`TransportError`] when the node cannot be fetched, including
    /// when it was deleted upstream (HTTP 410).
    fn fetch_node(&self, id: ElementId) -> Result<Vec<u8>, TransportError>;
}

impl<T: NodeSource + ?Sized> NodeSource for &T {
    fn fetch_node(&self, id: ElementId) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_node(id)
    }
}

/// Reason a referenced node was omitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnresolvedNode {
    /// The live-data request failed.
    #[error(transparent)]
    Transport(TransportError),
    /// The response was not a decodable OSM document.
    #[error("undecodable node document: {0}")]
    Undecodable(String),
    /// The response did not contain the requested node.
    #[error("response did not contain the node")]
    Absent,
}

/// Result of resolving the nodes of one way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeResolution {
    /// Serialised node blocks in reference order.
    pub blocks: String,
    /// Nodes that were fetched.
    pub resolved: Vec<ElementId>,
    /// Nodes that were omitted and why.
    pub unresolved: Vec<(ElementId, UnresolvedNode)>,
}

/// Fetch every distinct node referenced by `way`, in first-seen order.
///
/// Each node is requested once. Failures never abort resolution; they are
/// collected in [`NodeResolution::unresolved`] and the node is left out.
///
/// # Examples
/// ```
/// use osmsync_core::{
///     ChangedObject, ChildElement, ElementId, ElementKind, NodeSource, TransportError,
///     resolve_way_nodes,
/// };
///
/// struct Live;
///
/// impl NodeSource for Live {
///     fn fetch_node(&self, id: ElementId) -> Result<Vec<u8>, TransportError> {
///         Ok(format!(r#"<osm><node id="{id}" lat="1" lon="2"/></osm>"#).into_bytes())
///     }
/// }
///
/// let way = ChangedObject::new(ElementKind::Way, ElementId::new(1))
///     .with_child(ChildElement::node_ref(ElementId::new(5)));
/// let resolution = resolve_way_nodes(&way, &Live);
/// assert_eq!(resolution.blocks, "<node id=\"5\" lat=\"1\" lon=\"2\"/>\n");
/// ```
#[must_use]
pub fn resolve_way_nodes(way: &ChangedObject, source: &impl NodeSource) -> NodeResolution {
    let mut resolution = NodeResolution::default();
    for id in way.node_refs() {
        match fetch_block(source, id) {
            Ok(block) => {
                resolution.blocks.push_str(&block);
                resolution.resolved.push(id);
            }
            Err(reason) => resolution.unresolved.push((id, reason)),
        }
    }
    resolution
}

fn fetch_block(source: &impl NodeSource, id: ElementId) -> Result<String, UnresolvedNode> {
    let document = source.fetch_node(id).map_err(UnresolvedNode::Transport)?;
    let objects = parse_osm_document(&document)
        .map_err(|err| UnresolvedNode::Undecodable(err.to_string()))?;
    objects
        .iter()
        .find(|object| object.kind == ElementKind::Node && object.id == id)
        .map(write_object)
        .ok_or(UnresolvedNode::Absent)
}

//! Parts: the positioned nodes of the scene graph.
//!
//! A [`Part`] is a plain record of geometry, ownership and capability flags.
//! What a part *is* comes from optional role components rather than from a
//! type hierarchy:
//!
//! - [`Container`] makes the part a group that owns ordered children
//! - [`NodeRole`] marks a labelled node (identifiable, avoidable by default)
//! - [`PortRole`] makes the part an attachment point for links
//! - [`LinkRole`] makes the part a routable connection between two ports
//!
//! Parts are created detached with [`Part::new`] and the `as_*` builders,
//! then handed to [`Document::create_part`](crate::Document::create_part).
//! All mutation afterwards goes through the document so that every change is
//! recorded.
//!
//! # Example
//!
//! ```
//! # use vellum::{Document, part::Part};
//! # use vellum_core::geometry::Bounds;
//! let mut doc = Document::new();
//! let node = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 40.0, 20.0)).as_node("Start").as_port());
//! doc.add(node).unwrap();
//! assert_eq!(doc.find_node("Start", false, false, false), Some(node));
//! ```

use std::fmt;

use vellum_core::{
    capability::{Capabilities, Capability},
    change::PartChange,
    geometry::{Bounds, Point},
    key::{LayerKey, PartId, PartKey},
};

use crate::{Document, Result, copy::CopyMap};

/// Distance within which a point counts as touching a link's stroke.
pub const LINK_PICK_MARGIN: f32 = 3.0;

/// Custom per-part reactions, attached with [`Part::with_behavior`].
///
/// A behavior is taken out of its part while a hook runs, so a hook may
/// freely mutate the document, including its own part. Changes raised by a
/// hook do not re-enter the same behavior.
pub trait PartBehavior: fmt::Debug {
    /// Called after the part's bounds changed.
    fn bounds_changed(&mut self, _doc: &mut Document, _this: PartKey, _old: Bounds) -> Result<()> {
        Ok(())
    }

    /// Called for every change raised by a part this part observes.
    fn observed_changed(
        &mut self,
        _doc: &mut Document,
        _this: PartKey,
        _source: PartKey,
        _change: &PartChange,
    ) -> Result<()> {
        Ok(())
    }

    /// Called once every part of a copy exists, so that references to other
    /// copied parts can be remapped through `copies`.
    fn copy_delayed(&mut self, _doc: &mut Document, _this: PartKey, _copies: &CopyMap) -> Result<()> {
        Ok(())
    }

    /// Clones the behavior for a copied part.
    fn clone_box(&self) -> Box<dyn PartBehavior>;
}

/// Ordered children of a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    pub(crate) children: Vec<PartKey>,
}

impl Container {
    /// Children in paint order, back to front.
    pub fn children(&self) -> &[PartKey] {
        &self.children
    }
}

/// A labelled node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRole {
    pub(crate) text: String,
}

impl NodeRole {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A link attachment point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortRole {
    pub(crate) links: Vec<PartKey>,
}

impl PortRole {
    /// Links that have this port as one of their ends, attached or not.
    pub fn links(&self) -> &[PartKey] {
        &self.links
    }
}

/// A routable connection between two ports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkRole {
    pub(crate) from: Option<PartKey>,
    pub(crate) to: Option<PartKey>,
    pub(crate) points: Vec<Point>,
    pub(crate) orthogonal: bool,
    pub(crate) avoids_nodes: bool,
}

impl LinkRole {
    pub fn from_port(&self) -> Option<PartKey> {
        self.from
    }

    pub fn to_port(&self) -> Option<PartKey> {
        self.to
    }

    /// The routed stroke.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_orthogonal(&self) -> bool {
        self.orthogonal
    }

    pub fn avoids_nodes(&self) -> bool {
        self.avoids_nodes
    }

    fn near_stroke(&self, point: Point, margin: f32) -> bool {
        self.points
            .windows(2)
            .any(|seg| distance_to_segment(point, seg[0], seg[1]) <= margin)
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x() - a.x(), b.y() - a.y());
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.x() - a.x()) * dx + (p.y() - a.y()) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x() + t * dx, a.y() + t * dy);
    ((p.x() - cx).powi(2) + (p.y() - cy).powi(2)).sqrt()
}

/// A positioned entity in the scene graph.
pub struct Part {
    pub(crate) bounds: Bounds,
    pub(crate) layer: Option<LayerKey>,
    pub(crate) parent: Option<PartKey>,
    pub(crate) flags: Capabilities,
    pub(crate) id: Option<PartId>,
    pub(crate) avoidable: bool,
    pub(crate) observers: Vec<PartKey>,
    pub(crate) container: Option<Container>,
    pub(crate) node: Option<NodeRole>,
    pub(crate) port: Option<PortRole>,
    pub(crate) link: Option<LinkRole>,
    pub(crate) behavior: Option<Box<dyn PartBehavior>>,
    /// Set while the part moves or rescales its own children, so their
    /// bounds changes do not resize it in turn.
    pub(crate) updating_children: bool,
}

impl Part {
    /// Creates a detached plain part with default capabilities.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            layer: None,
            parent: None,
            flags: Capabilities::default(),
            id: None,
            avoidable: false,
            observers: Vec::new(),
            container: None,
            node: None,
            port: None,
            link: None,
            behavior: None,
            updating_children: false,
        }
    }

    /// Makes the part a group.
    pub fn as_group(mut self) -> Self {
        self.container = Some(Container::default());
        self
    }

    /// Makes the part a labelled node. Nodes are avoidable.
    pub fn as_node(mut self, text: impl Into<String>) -> Self {
        self.node = Some(NodeRole { text: text.into() });
        self.avoidable = true;
        self
    }

    /// Makes the part a port.
    pub fn as_port(mut self) -> Self {
        self.port = Some(PortRole::default());
        self
    }

    /// Makes the part an unconnected link.
    pub fn as_link(mut self, orthogonal: bool) -> Self {
        self.link = Some(LinkRole {
            orthogonal,
            ..LinkRole::default()
        });
        self
    }

    /// Sets whether a link route should stay clear of avoidable parts.
    pub fn with_avoids_nodes(mut self, avoids_nodes: bool) -> Self {
        if let Some(link) = &mut self.link {
            link.avoids_nodes = avoids_nodes;
        }
        self
    }

    pub fn with_capability(mut self, capability: Capability, value: bool) -> Self {
        self.flags.set(capability, value);
        self
    }

    pub fn with_avoidable(mut self, avoidable: bool) -> Self {
        self.avoidable = avoidable;
        self
    }

    /// Presets the identifier, e.g. for parts restored from storage.
    pub fn with_id(mut self, id: PartId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_behavior(mut self, behavior: Box<dyn PartBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// The owning group, if any.
    pub fn parent(&self) -> Option<PartKey> {
        self.parent
    }

    /// The layer this part is directly recorded in. Only top-level parts
    /// have one; use [`Document::layer_of`] to resolve it for descendants.
    pub fn direct_layer(&self) -> Option<LayerKey> {
        self.layer
    }

    /// The part's own flag, ignoring layer and document gates.
    pub fn flag(&self, capability: Capability) -> bool {
        self.flags.get(capability)
    }

    pub fn flags(&self) -> Capabilities {
        self.flags
    }

    pub fn id(&self) -> Option<PartId> {
        self.id
    }

    pub fn is_avoidable(&self) -> bool {
        self.avoidable
    }

    /// Parts notified of this part's changes.
    pub fn observers(&self) -> &[PartKey] {
        &self.observers
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Children in paint order; empty for non-groups.
    pub fn children(&self) -> &[PartKey] {
        self.container.as_ref().map_or(&[], |c| c.children.as_slice())
    }

    pub fn node(&self) -> Option<&NodeRole> {
        self.node.as_ref()
    }

    pub fn port(&self) -> Option<&PortRole> {
        self.port.as_ref()
    }

    pub fn link(&self) -> Option<&LinkRole> {
        self.link.as_ref()
    }

    pub fn is_group(&self) -> bool {
        self.container.is_some()
    }

    pub fn is_link(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_port(&self) -> bool {
        self.port.is_some()
    }

    /// Nodes, links and ports take part in identifier tracking.
    pub fn is_identifiable(&self) -> bool {
        self.node.is_some() || self.link.is_some() || self.port.is_some()
    }

    /// The node label, if this part is a node.
    pub fn text(&self) -> Option<&str> {
        self.node.as_ref().map(|node| node.text.as_str())
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    /// Point-containment test used by picking.
    ///
    /// Links test against their stroke; everything else against its bounds.
    pub fn contains_point(&self, point: Point) -> bool {
        match &self.link {
            Some(link) if link.points.len() >= 2 => link.near_stroke(point, LINK_PICK_MARGIN),
            _ => self.bounds.contains_point(point),
        }
    }

    /// Returns a detached copy: no owner, no children, no link ends, no
    /// observers and no identifier.
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            bounds: self.bounds,
            layer: None,
            parent: None,
            flags: self.flags,
            id: None,
            avoidable: self.avoidable,
            observers: Vec::new(),
            container: self.container.as_ref().map(|_| Container::default()),
            node: self.node.clone(),
            port: self.port.as_ref().map(|_| PortRole::default()),
            link: self.link.as_ref().map(|link| LinkRole {
                from: None,
                to: None,
                ..link.clone()
            }),
            behavior: self.behavior.as_ref().map(|b| b.clone_box()),
            updating_children: false,
        }
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("bounds", &self.bounds)
            .field("layer", &self.layer)
            .field("parent", &self.parent)
            .field("flags", &self.flags)
            .field("id", &self.id)
            .field("container", &self.container)
            .field("node", &self.node)
            .field("port", &self.port)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

//! Links and ports.
//!
//! A link connects a `from` port to a `to` port. Each port keeps the list of
//! links using it, so moving a port can find the links to re-route. Routes
//! are computed from port centers, either as a straight line or as an
//! orthogonal elbow.
//!
//! When routing is suspended, links needing a new route collect in the
//! document's pending set instead; see [`Document::do_delayed_routing`].

use log::trace;

use vellum_core::{
    change::{Change, LinkEnd, PartChange},
    geometry::{Bounds, Point},
    key::PartKey,
    policy::ValidCycle,
};

use crate::{Document, DocumentError, Result, cycle::CycleChecker, part::LinkRole};

/// Computes a link stroke between two port centers.
///
/// An orthogonal route is an elbow of three segments. Its middle segment is
/// vertical when the horizontal distance dominates and horizontal otherwise.
pub fn route_points(from: Point, to: Point, orthogonal: bool) -> Vec<Point> {
    if !orthogonal {
        return vec![from, to];
    }
    if (to.x() - from.x()).abs() >= (to.y() - from.y()).abs() {
        let mid_x = (from.x() + to.x()) / 2.0;
        vec![from, Point::new(mid_x, from.y()), Point::new(mid_x, to.y()), to]
    } else {
        let mid_y = (from.y() + to.y()) / 2.0;
        vec![from, Point::new(from.x(), mid_y), Point::new(to.x(), mid_y), to]
    }
}

impl Document {
    fn link_role(&self, link: PartKey) -> Result<&LinkRole> {
        self.parts
            .part(link)?
            .link()
            .ok_or(DocumentError::MissingRole { part: link, role: "link" })
    }

    fn link_role_mut(&mut self, link: PartKey) -> Result<&mut LinkRole> {
        self.parts
            .part_mut(link)?
            .link
            .as_mut()
            .ok_or(DocumentError::MissingRole { part: link, role: "link" })
    }

    /// Connects one end of a link to `port`, or disconnects it with `None`.
    pub fn set_link_port(&mut self, link: PartKey, end: LinkEnd, port: Option<PartKey>) -> Result<()> {
        let role = self.link_role(link)?;
        let old = match end {
            LinkEnd::From => role.from,
            LinkEnd::To => role.to,
        };
        if let Some(port) = port {
            if !self.parts.part(port)?.is_port() {
                return Err(DocumentError::MissingRole { part: port, role: "port" });
            }
        }
        if old == port {
            return Ok(());
        }

        if let Some(old) = old {
            let other_end_uses_old = match end {
                LinkEnd::From => role.to == Some(old),
                LinkEnd::To => role.from == Some(old),
            };
            if !other_end_uses_old {
                if let Some(registered) = self.parts.get_mut(old).and_then(|p| p.port.as_mut()) {
                    registered.links.retain(|l| *l != link);
                }
            }
        }
        if let Some(new) = port {
            if let Some(registered) = self.parts.get_mut(new).and_then(|p| p.port.as_mut()) {
                if !registered.links.contains(&link) {
                    registered.links.push(link);
                }
            }
        }
        let role = self.link_role_mut(link)?;
        match end {
            LinkEnd::From => role.from = port,
            LinkEnd::To => role.to = port,
        }

        self.raise(Change::Part {
            part: link,
            change: PartChange::LinkPort { end, old, new: port },
        })?;
        self.invalidate_link(link)
    }

    /// Connects both ends of a link.
    pub fn connect(&mut self, link: PartKey, from: PartKey, to: PartKey) -> Result<()> {
        self.set_link_port(link, LinkEnd::From, Some(from))?;
        self.set_link_port(link, LinkEnd::To, Some(to))
    }

    pub fn set_link_orthogonal(&mut self, link: PartKey, orthogonal: bool) -> Result<()> {
        let role = self.link_role_mut(link)?;
        if role.orthogonal == orthogonal {
            return Ok(());
        }
        role.orthogonal = orthogonal;
        self.raise(Change::Part {
            part: link,
            change: PartChange::Orthogonal {
                old: !orthogonal,
                new: orthogonal,
            },
        })?;
        self.invalidate_link(link)
    }

    pub fn set_link_avoids_nodes(&mut self, link: PartKey, avoids_nodes: bool) -> Result<()> {
        let role = self.link_role_mut(link)?;
        if role.avoids_nodes == avoids_nodes {
            return Ok(());
        }
        role.avoids_nodes = avoids_nodes;
        self.raise(Change::Part {
            part: link,
            change: PartChange::AvoidsNodes {
                old: !avoids_nodes,
                new: avoids_nodes,
            },
        })
    }

    /// Replaces a link's stroke and fits its bounds to it.
    pub fn set_link_points(&mut self, link: PartKey, points: Vec<Point>) -> Result<()> {
        if self.link_role(link)?.points == points {
            return Ok(());
        }
        self.replace_link_points(link, points)?;
        let bounds = Bounds::enclosing(self.link_role(link)?.points.iter().copied());
        match bounds {
            Some(bounds) => self.change_bounds(link, bounds, false),
            None => Ok(()),
        }
    }

    /// Replaces the stroke without touching bounds.
    ///
    /// A before-phase record carrying both lists precedes the mutation.
    pub(crate) fn replace_link_points(&mut self, link: PartKey, points: Vec<Point>) -> Result<()> {
        let old = self.link_role(link)?.points.clone();
        if old == points {
            return Ok(());
        }
        self.raise_before(Change::Part {
            part: link,
            change: PartChange::LinkPoints {
                old: old.clone(),
                new: points.clone(),
            },
        })?;
        self.link_role_mut(link)?.points = points.clone();
        self.raise(Change::Part {
            part: link,
            change: PartChange::LinkPoints { old, new: points },
        })
    }

    /// Recomputes a link's stroke from its ports' centers.
    ///
    /// A link missing either port keeps its stroke.
    pub fn route_link(&mut self, link: PartKey) -> Result<()> {
        let role = self.link_role(link)?;
        let (Some(from), Some(to)) = (role.from, role.to) else {
            return Ok(());
        };
        let orthogonal = role.orthogonal;
        let start = self.parts.part(from)?.bounds().center();
        let end = self.parts.part(to)?.bounds().center();
        trace!(link:?, from:?, to:?; "Routing link");
        self.set_link_points(link, route_points(start, end, orthogonal))
    }

    /// Routes an attached link now, or queues it while routing is suspended.
    pub(crate) fn invalidate_link(&mut self, link: PartKey) -> Result<()> {
        if self.undoing || !self.parts.is_attached(link) {
            return Ok(());
        }
        if self.suspends_routing {
            self.pending_routes.insert(link);
            Ok(())
        } else {
            self.route_link(link)
        }
    }

    /// Invalidates every link in `part`'s subtree and every link attached to
    /// a port in it.
    pub(crate) fn invalidate_links_in(&mut self, part: PartKey) -> Result<()> {
        let mut links = Vec::new();
        for key in self.parts.subtree(part) {
            let Some(found) = self.parts.get(key) else {
                continue;
            };
            if found.is_link() {
                links.push(key);
            }
            if let Some(port) = found.port() {
                links.extend_from_slice(port.links());
            }
        }
        links.sort();
        links.dedup();
        links.into_iter().try_for_each(|link| self.invalidate_link(link))
    }

    /// A port moved: its links need new routes.
    pub(crate) fn port_moved(&mut self, port: PartKey) -> Result<()> {
        let links = self
            .parts
            .get(port)
            .and_then(|p| p.port())
            .map(|p| p.links().to_vec())
            .unwrap_or_default();
        links.into_iter().try_for_each(|link| self.invalidate_link(link))
    }

    /// Attached links connected to any port in `part`'s subtree.
    pub fn links_of(&self, part: PartKey) -> Vec<PartKey> {
        let mut links = Vec::new();
        for key in self.parts.subtree(part) {
            let Some(port) = self.parts.get(key).and_then(|p| p.port()) else {
                continue;
            };
            for link in port.links() {
                if self.parts.is_attached(*link) && !links.contains(link) {
                    links.push(*link);
                }
            }
        }
        links
    }

    /// Whether a new link from `from` to `to` is acceptable.
    ///
    /// Both must be ports. Linking a port to itself and duplicating an
    /// existing attached link are rejected; the document's [`ValidCycle`]
    /// mode decides the rest.
    pub fn is_valid_link(&self, from: PartKey, to: PartKey) -> bool {
        let (Some(from_part), Some(to_part)) = (self.parts.get(from), self.parts.get(to)) else {
            return false;
        };
        let Some(from_port) = from_part.port() else {
            return false;
        };
        if !to_part.is_port() || from == to {
            return false;
        }
        let duplicate = from_port.links().iter().any(|link| {
            self.parts.is_attached(*link)
                && self
                    .parts
                    .get(*link)
                    .and_then(|p| p.link())
                    .is_some_and(|l| l.from == Some(from) && l.to == Some(to))
        });
        if duplicate {
            return false;
        }

        let checker = CycleChecker::new(&self.parts);
        let (a, b) = (checker.node_of(from), checker.node_of(to));
        match self.valid_cycle {
            ValidCycle::All => true,
            ValidCycle::NotDirected => !checker.makes_directed_cycle(a, b),
            ValidCycle::NotDirectedFast => !checker.makes_directed_cycle_fast(a, b),
            ValidCycle::NotUndirected => !checker.makes_undirected_cycle(a, b),
            ValidCycle::DestinationTree => {
                checker.incoming(b).is_empty() && !checker.makes_directed_cycle(a, b)
            }
            ValidCycle::SourceTree => {
                checker.outgoing(a).is_empty() && !checker.makes_directed_cycle(a, b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use vellum_core::change::ChangeRecord;

    use super::*;
    use crate::part::Part;

    fn node(doc: &mut Document, text: &str, x: f32, y: f32) -> PartKey {
        let node = doc.create_part(Part::new(Bounds::new(x, y, 10.0, 10.0)).as_node(text).as_port());
        doc.add(node).unwrap();
        node
    }

    fn link(doc: &mut Document, from: PartKey, to: PartKey, orthogonal: bool) -> PartKey {
        let link = doc.create_part(Part::new(Bounds::default()).as_link(orthogonal));
        doc.add(link).unwrap();
        doc.connect(link, from, to).unwrap();
        link
    }

    fn points(doc: &Document, link: PartKey) -> Vec<Point> {
        doc.part(link).unwrap().link().unwrap().points().to_vec()
    }

    #[test]
    fn test_route_points_elbow_orientation() {
        let wide = route_points(Point::new(0.0, 0.0), Point::new(100.0, 20.0), true);
        assert_eq!(wide[1], Point::new(50.0, 0.0));
        assert_eq!(wide[2], Point::new(50.0, 20.0));

        let tall = route_points(Point::new(0.0, 0.0), Point::new(20.0, 100.0), true);
        assert_eq!(tall[1], Point::new(0.0, 50.0));
        assert_eq!(tall[2], Point::new(20.0, 50.0));

        assert_eq!(route_points(Point::new(0.0, 0.0), Point::new(1.0, 1.0), false).len(), 2);
    }

    #[test]
    fn test_connect_routes_and_registers() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let l = link(&mut doc, a, b, false);

        assert_eq!(points(&doc, l), vec![Point::new(5.0, 5.0), Point::new(105.0, 5.0)]);
        assert_eq!(doc.part(a).unwrap().port().unwrap().links(), &[l]);
        assert_eq!(doc.part(l).unwrap().bounds(), Bounds::new(5.0, 5.0, 100.0, 0.0));
        assert_eq!(doc.links_of(b), vec![l]);
    }

    #[test]
    fn test_moving_port_reroutes() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let l = link(&mut doc, a, b, false);

        doc.translate(b, Point::new(0.0, 50.0)).unwrap();
        assert_eq!(points(&doc, l)[1], Point::new(105.0, 55.0));
    }

    #[test]
    fn test_suspended_routing_queues_links() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let l = link(&mut doc, a, b, false);

        doc.set_suspends_routing(true);
        doc.translate(b, Point::new(0.0, 50.0)).unwrap();
        assert_eq!(points(&doc, l)[1], Point::new(105.0, 5.0));
        assert_eq!(doc.pending_routes().collect::<Vec<_>>(), vec![l]);
    }

    #[test]
    fn test_reconnect_moves_registration() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let c = node(&mut doc, "c", 0.0, 100.0);
        let l = link(&mut doc, a, b, false);

        doc.set_link_port(l, LinkEnd::To, Some(c)).unwrap();
        assert!(doc.part(b).unwrap().port().unwrap().links().is_empty());
        assert_eq!(doc.part(c).unwrap().port().unwrap().links(), &[l]);

        let plain = doc.create_part(Part::new(Bounds::default()));
        assert_eq!(
            doc.set_link_port(l, LinkEnd::To, Some(plain)).unwrap_err(),
            DocumentError::MissingRole { part: plain, role: "port" }
        );
    }

    #[test]
    fn test_removing_port_removes_links() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let l = link(&mut doc, a, b, false);

        doc.remove(b).unwrap();
        assert!(!doc.is_attached(l));
        assert_eq!(doc.part(l).unwrap().link().unwrap().to_port(), Some(b));
    }

    #[test]
    fn test_link_points_raise_before_record() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let l = link(&mut doc, a, b, false);

        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&log);
        doc.add_listener(Box::new(move |r: &ChangeRecord| sink.borrow_mut().push(r.clone())));
        doc.set_link_points(l, vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap();

        let log = log.borrow();
        assert!(!log[0].is_after());
        assert!(matches!(log[0].change(), Change::Part { change: PartChange::LinkPoints { .. }, .. }));
        assert!(log[1].is_after());
    }

    #[test]
    fn test_valid_link_rules() {
        let mut doc = Document::new();
        let a = node(&mut doc, "a", 0.0, 0.0);
        let b = node(&mut doc, "b", 100.0, 0.0);
        let c = node(&mut doc, "c", 200.0, 0.0);
        link(&mut doc, a, b, false);

        assert!(!doc.is_valid_link(a, a));
        assert!(!doc.is_valid_link(a, b));
        assert!(doc.is_valid_link(b, a));

        doc.set_valid_cycle(ValidCycle::NotDirected).unwrap();
        assert!(!doc.is_valid_link(b, a));
        assert!(doc.is_valid_link(b, c));

        doc.set_valid_cycle(ValidCycle::DestinationTree).unwrap();
        assert!(!doc.is_valid_link(c, b));
        assert!(doc.is_valid_link(c, a));
        assert!(doc.is_valid_link(b, c));

        doc.set_valid_cycle(ValidCycle::SourceTree).unwrap();
        assert!(!doc.is_valid_link(a, c));
        assert!(doc.is_valid_link(c, a));
        assert!(doc.is_valid_link(b, c));
    }
}

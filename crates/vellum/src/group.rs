//! Group membership.
//!
//! A group is a part with a [`Container`](crate::part::Container) role. Its
//! bounds are the union of its children's; moving it moves them and
//! resizing it rescales them (see [`Document::set_bounds`]).

use log::debug;

use vellum_core::{
    change::{Change, PartChange},
    key::PartKey,
};

use crate::{Document, DocumentError, Result};

impl Document {
    /// Appends `child` to `group`.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::MissingRole`] if `group` is not a group
    /// - [`DocumentError::InvalidOwnership`] if `child` is owned elsewhere,
    ///   or is `group` itself or one of its ancestors
    pub fn group_add(&mut self, group: PartKey, child: PartKey) -> Result<()> {
        let len = self.children_of(group)?.len();
        self.group_insert_at(group, child, len)
    }

    /// Inserts `child` into `group` at `index`.
    pub(crate) fn group_insert_at(&mut self, group: PartKey, child: PartKey, index: usize) -> Result<()> {
        let len = self.children_of(group)?.len();
        let target = self.parts.part(child)?;
        if target.parent == Some(group) {
            return Ok(());
        }
        if child == group || self.parts.is_child_of(group, child) {
            return Err(DocumentError::invalid_ownership(
                child,
                "a group cannot contain itself or an ancestor",
            ));
        }
        if target.layer.is_some() || target.parent.is_some() {
            return Err(DocumentError::invalid_ownership(child, "part is already owned"));
        }

        let index = index.min(len);
        if let Some(container) = self.parts.part_mut(group)?.container.as_mut() {
            container.children.insert(index, child);
        }
        self.parts.part_mut(child)?.parent = Some(group);
        debug!(group:?, child:?, index; "Child inserted");
        self.raise(Change::Part {
            part: group,
            change: PartChange::ChildInserted { child, index },
        })?;

        if self.parts.is_attached(group) {
            self.on_part_attached(child)?;
        }
        self.refresh_group_bounds(group)
    }

    /// Removes `child` from `group`.
    ///
    /// Removing a detached part does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidOwnership`] if `child` belongs to a
    /// different owner.
    pub fn group_remove(&mut self, group: PartKey, child: PartKey) -> Result<()> {
        let index = self.children_of(group)?.iter().position(|c| *c == child);
        let Some(index) = index else {
            let target = self.parts.part(child)?;
            if target.layer.is_none() && target.parent.is_none() {
                return Ok(());
            }
            return Err(DocumentError::invalid_ownership(child, "part is not a child of this group"));
        };

        if let Some(container) = self.parts.part_mut(group)?.container.as_mut() {
            container.children.remove(index);
        }
        self.raise(Change::Part {
            part: group,
            change: PartChange::ChildRemoved { child, index },
        })?;
        let attached = self.parts.is_attached(group);
        self.parts.part_mut(child)?.parent = None;
        debug!(group:?, child:?, index; "Child removed");

        if attached {
            self.on_part_detached(child)?;
        }
        self.refresh_group_bounds(group)
    }

    fn children_of(&self, group: PartKey) -> Result<&[PartKey]> {
        self.parts
            .part(group)?
            .container()
            .map(|container| container.children())
            .ok_or(DocumentError::MissingRole { part: group, role: "group" })
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use vellum_core::geometry::{Bounds, Point};

    use super::*;
    use crate::part::{Part, PartBehavior};

    fn group_of_two(doc: &mut Document) -> (PartKey, PartKey, PartKey) {
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let a = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        let b = doc.create_part(Part::new(Bounds::new(20.0, 10.0, 10.0, 10.0)));
        doc.group_add(group, a).unwrap();
        doc.group_add(group, b).unwrap();
        (group, a, b)
    }

    #[test]
    fn test_group_bounds_are_union() {
        let mut doc = Document::new();
        let (group, _, b) = group_of_two(&mut doc);
        assert_eq!(doc.part(group).unwrap().bounds(), Bounds::new(0.0, 0.0, 30.0, 20.0));

        doc.translate(b, Point::new(10.0, 0.0)).unwrap();
        assert_eq!(doc.part(group).unwrap().bounds(), Bounds::new(0.0, 0.0, 40.0, 20.0));
    }

    #[test]
    fn test_moving_group_moves_children() {
        let mut doc = Document::new();
        let (group, a, b) = group_of_two(&mut doc);
        doc.translate(group, Point::new(5.0, 5.0)).unwrap();
        assert_eq!(doc.part(a).unwrap().bounds(), Bounds::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(doc.part(b).unwrap().bounds(), Bounds::new(25.0, 15.0, 10.0, 10.0));
        assert_eq!(doc.part(group).unwrap().bounds(), Bounds::new(5.0, 5.0, 30.0, 20.0));
    }

    #[test]
    fn test_resizing_group_rescales_children() {
        let mut doc = Document::new();
        let (group, a, b) = group_of_two(&mut doc);
        doc.set_bounds(group, Bounds::new(0.0, 0.0, 60.0, 40.0)).unwrap();

        let a = doc.part(a).unwrap().bounds();
        assert_approx_eq!(f32, a.width(), 20.0);
        assert_approx_eq!(f32, a.height(), 20.0);
        let b = doc.part(b).unwrap().bounds();
        assert_approx_eq!(f32, b.min_x(), 40.0);
        assert_approx_eq!(f32, b.min_y(), 20.0);
        assert_approx_eq!(f32, doc.part(group).unwrap().bounds().width(), 60.0);
    }

    /// Snaps its part back to a fixed size after every bounds change.
    #[derive(Debug, Clone)]
    struct FixedSize;

    impl PartBehavior for FixedSize {
        fn bounds_changed(&mut self, doc: &mut Document, this: PartKey, _old: Bounds) -> crate::Result<()> {
            let bounds = doc.part(this).map(Part::bounds).unwrap_or_default();
            doc.set_bounds(this, Bounds::new(bounds.min_x(), bounds.min_y(), 10.0, 10.0))
        }

        fn clone_box(&self) -> Box<dyn PartBehavior> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_resized_group_refits_to_children() {
        let mut doc = Document::new();
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let a = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)).with_behavior(Box::new(FixedSize)));
        let b = doc.create_part(Part::new(Bounds::new(20.0, 10.0, 10.0, 10.0)).with_behavior(Box::new(FixedSize)));
        doc.group_add(group, a).unwrap();
        doc.group_add(group, b).unwrap();

        doc.set_bounds(group, Bounds::new(0.0, 0.0, 60.0, 40.0)).unwrap();
        let b = doc.part(b).unwrap().bounds();
        assert_approx_eq!(f32, b.min_x(), 40.0);
        assert_approx_eq!(f32, b.width(), 10.0);
        let fitted = doc.part(group).unwrap().bounds();
        assert_approx_eq!(f32, fitted.min_x(), 0.0);
        assert_approx_eq!(f32, fitted.width(), 50.0);
        assert_approx_eq!(f32, fitted.height(), 30.0);
    }

    #[test]
    fn test_group_into_descendant_is_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_part(Part::new(Bounds::default()).as_group());
        let inner = doc.create_part(Part::new(Bounds::default()).as_group());
        doc.group_add(outer, inner).unwrap();

        assert!(matches!(
            doc.group_add(inner, outer).unwrap_err(),
            DocumentError::InvalidOwnership { .. }
        ));
        assert!(matches!(
            doc.group_add(outer, outer).unwrap_err(),
            DocumentError::InvalidOwnership { .. }
        ));
    }

    #[test]
    fn test_owned_part_cannot_join_group() {
        let mut doc = Document::new();
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let part = doc.create_part(Part::new(Bounds::default()));
        doc.add(part).unwrap();
        assert!(matches!(
            doc.group_add(group, part).unwrap_err(),
            DocumentError::InvalidOwnership { .. }
        ));

        let plain = doc.create_part(Part::new(Bounds::default()));
        assert_eq!(
            doc.group_add(plain, group).unwrap_err(),
            DocumentError::MissingRole { part: plain, role: "group" }
        );
    }

    #[test]
    fn test_child_resolves_layer_through_top_level() {
        let mut doc = Document::new();
        let (group, a, _) = group_of_two(&mut doc);
        doc.add(group).unwrap();
        assert_eq!(doc.layer_of(a), Some(doc.default_layer()));
        assert!(doc.part(a).unwrap().direct_layer().is_none());

        doc.group_remove(group, a).unwrap();
        assert!(!doc.is_attached(a));
        assert!(doc.part(a).unwrap().parent().is_none());
        assert_eq!(doc.part(group).unwrap().bounds(), Bounds::new(20.0, 10.0, 10.0, 10.0));
    }

    #[test]
    fn test_remove_child_through_document() {
        let mut doc = Document::new();
        let (group, a, b) = group_of_two(&mut doc);
        doc.remove(a).unwrap();
        assert_eq!(doc.part(group).unwrap().children(), &[b]);
        doc.remove(a).unwrap();
    }
}

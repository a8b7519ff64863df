//! Read-side queries: picking, viewer caches, bounds and node lookup.

use vellum_core::{
    capability::Capability,
    geometry::{Bounds, Point},
    key::{LayerKey, PartKey, ViewId},
};

use crate::{
    Document, DocumentError, Result,
    layer::{Layer, SearchStyle},
};

impl Document {
    /// The front-most part under `point`, searching the front layer first.
    pub fn pick_object(&self, point: Point, selectable_only: bool) -> Option<PartKey> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.pick_object(&self.parts, self.gates, point, selectable_only))
    }

    /// Up to `limit` parts under `point`, front to back across layers.
    pub fn pick_objects(&self, point: Point, selectable_only: bool, limit: usize) -> Vec<PartKey> {
        let mut out = Vec::new();
        for layer in self.layers.iter().rev() {
            if out.len() >= limit {
                break;
            }
            out.extend(layer.pick_objects(&self.parts, self.gates, point, selectable_only, limit - out.len()));
        }
        out
    }

    /// Up to `limit` parts matching `rect` under `style`, front layer first.
    pub fn pick_objects_in_rectangle(&self, rect: Bounds, style: SearchStyle, limit: usize) -> Vec<PartKey> {
        let mut out = Vec::new();
        for layer in self.layers.iter().rev() {
            if out.len() >= limit {
                break;
            }
            out.extend(layer.pick_objects_in_rectangle(&self.parts, self.gates, rect, style, limit - out.len()));
        }
        out
    }

    pub fn layer_pick_object(&self, layer: LayerKey, point: Point, selectable_only: bool) -> Result<Option<PartKey>> {
        let layer = self.layer(layer).ok_or(DocumentError::UnknownLayer(layer))?;
        Ok(layer.pick_object(&self.parts, self.gates, point, selectable_only))
    }

    pub fn layer_pick_objects(
        &self,
        layer: LayerKey,
        point: Point,
        selectable_only: bool,
        limit: usize,
    ) -> Result<Vec<PartKey>> {
        let layer = self.layer(layer).ok_or(DocumentError::UnknownLayer(layer))?;
        Ok(layer.pick_objects(&self.parts, self.gates, point, selectable_only, limit))
    }

    pub fn layer_pick_objects_in_rectangle(
        &self,
        layer: LayerKey,
        rect: Bounds,
        style: SearchStyle,
        limit: usize,
    ) -> Result<Vec<PartKey>> {
        let layer = self.layer(layer).ok_or(DocumentError::UnknownLayer(layer))?;
        Ok(layer.pick_objects_in_rectangle(&self.parts, self.gates, rect, style, limit))
    }

    /// Visible top-level parts of `layer` intersecting a viewer's extent,
    /// in paint order.
    ///
    /// The list is cached per viewer while the extent stays the same; with
    /// `seed`, a list computed for a new extent is cached.
    pub fn parts_in_view(&mut self, layer: LayerKey, view: ViewId, extent: Bounds, seed: bool) -> Result<Vec<PartKey>> {
        let (parts, gates) = (&self.parts, self.gates);
        let target = find_layer_mut(&mut self.layers, layer)?;
        Ok(target.parts_in_view(parts, gates, view, extent, seed))
    }

    /// The drag-snap subset of [`Document::parts_in_view`].
    pub fn snap_parts_in_view(
        &mut self,
        layer: LayerKey,
        view: ViewId,
        extent: Bounds,
        seed: bool,
    ) -> Result<Vec<PartKey>> {
        let (parts, gates) = (&self.parts, self.gates);
        let target = find_layer_mut(&mut self.layers, layer)?;
        Ok(target.snap_parts_in_view(parts, gates, view, extent, seed))
    }

    /// The tight bounds of every visible top-level part.
    ///
    /// Unlike [`Document::extent`] this shrinks when parts go away.
    pub fn compute_bounds(&self) -> Option<Bounds> {
        self.compute_bounds_for(Capability::Visible)
    }

    /// The tight bounds of every top-level part whose effective
    /// `capability` is on, e.g. [`Capability::Printable`].
    pub fn compute_bounds_for(&self, capability: Capability) -> Option<Bounds> {
        self.layers
            .iter()
            .filter(|layer| layer.gate(capability))
            .flat_map(|layer| layer.parts())
            .filter(|key| self.can(*key, capability))
            .filter_map(|key| self.parts.get(key))
            .map(|part| part.bounds())
            .reduce(|a, b| a.merge(&b))
    }

    /// Finds a node by label, searching layers back to front.
    ///
    /// With `prefix`, the label only has to start with `text`. With
    /// `recurse`, nodes inside groups are found too.
    pub fn find_node(&self, text: &str, prefix: bool, ignore_case: bool, recurse: bool) -> Option<PartKey> {
        let wanted = if ignore_case { text.to_lowercase() } else { text.to_owned() };
        let matches = |label: &str| {
            let label = if ignore_case { label.to_lowercase() } else { label.to_owned() };
            if prefix {
                label.starts_with(&wanted)
            } else {
                label == wanted
            }
        };

        for top in self.layers.iter().flat_map(|layer| layer.parts()) {
            let candidates = if recurse { self.parts.subtree(top) } else { vec![top] };
            let found = candidates
                .into_iter()
                .find(|key| self.parts.get(*key).and_then(|p| p.text()).is_some_and(&matches));
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

fn find_layer_mut(layers: &mut [Layer], key: LayerKey) -> Result<&mut Layer> {
    layers
        .iter_mut()
        .find(|layer| layer.key() == key)
        .ok_or(DocumentError::UnknownLayer(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layer::{Inclusion, Selectability},
        part::Part,
    };

    fn add(doc: &mut Document, layer: LayerKey, bounds: Bounds) -> PartKey {
        let part = doc.create_part(Part::new(bounds));
        doc.layer_add(layer, part).unwrap();
        part
    }

    #[test]
    fn test_front_layer_wins() {
        let mut doc = Document::new();
        let back = doc.default_layer();
        let front = doc.create_layer_after(None).unwrap();
        let low = add(&mut doc, back, Bounds::new(0.0, 0.0, 10.0, 10.0));
        let high = add(&mut doc, front, Bounds::new(0.0, 0.0, 10.0, 10.0));

        let point = Point::new(5.0, 5.0);
        assert_eq!(doc.pick_object(point, true), Some(high));
        assert_eq!(doc.pick_objects(point, true, usize::MAX), vec![high, low]);
        assert_eq!(doc.pick_objects(point, true, 1), vec![high]);
        assert_eq!(doc.layer_pick_object(back, point, true).unwrap(), Some(low));

        doc.move_layer_after(front, back).unwrap();
        assert_eq!(doc.pick_object(point, true), Some(low));
    }

    #[test]
    fn test_selectable_only_walks_to_group() {
        let mut doc = Document::new();
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let child = doc.create_part(
            Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)).with_capability(Capability::Selectable, false),
        );
        doc.group_add(group, child).unwrap();
        doc.add(group).unwrap();

        assert_eq!(doc.pick_object(Point::new(5.0, 5.0), false), Some(child));
        assert_eq!(doc.pick_object(Point::new(5.0, 5.0), true), Some(group));
    }

    #[test]
    fn test_rectangle_styles() {
        let mut doc = Document::new();
        let layer = doc.default_layer();
        let inside = add(&mut doc, layer, Bounds::new(1.0, 1.0, 5.0, 5.0));
        let straddling = add(&mut doc, layer, Bounds::new(15.0, 15.0, 10.0, 10.0));
        let rect = Bounds::new(0.0, 0.0, 20.0, 20.0);

        let contained = SearchStyle::new(Inclusion::Contained, Selectability::Any);
        assert_eq!(doc.pick_objects_in_rectangle(rect, contained, usize::MAX), vec![inside]);

        let touching = SearchStyle::new(Inclusion::Intersects, Selectability::Any);
        assert_eq!(doc.pick_objects_in_rectangle(rect, touching, usize::MAX), vec![inside, straddling]);

        doc.set_part_capability(straddling, Capability::Selectable, false).unwrap();
        let selectable = SearchStyle::new(Inclusion::Intersects, Selectability::SelectableOnly);
        assert_eq!(doc.pick_objects_in_rectangle(rect, selectable, usize::MAX), vec![inside]);
    }

    #[test]
    fn test_rectangle_recurses_into_rejected_groups() {
        let mut doc = Document::new();
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let near = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 5.0, 5.0)));
        let far = doc.create_part(Part::new(Bounds::new(100.0, 100.0, 5.0, 5.0)));
        doc.group_add(group, near).unwrap();
        doc.group_add(group, far).unwrap();
        doc.add(group).unwrap();

        let style = SearchStyle::new(Inclusion::Contained, Selectability::Any);
        let found = doc.pick_objects_in_rectangle(Bounds::new(-1.0, -1.0, 10.0, 10.0), style, usize::MAX);
        assert_eq!(found, vec![near]);
    }

    #[test]
    fn test_view_cache_follows_edits() {
        let mut doc = Document::new();
        let layer = doc.default_layer();
        let view = ViewId(3);
        let extent = Bounds::new(0.0, 0.0, 50.0, 50.0);
        let part = add(&mut doc, layer, Bounds::new(100.0, 0.0, 10.0, 10.0));
        assert!(doc.parts_in_view(layer, view, extent, true).unwrap().is_empty());

        doc.set_location(part, Point::new(10.0, 10.0)).unwrap();
        assert_eq!(doc.parts_in_view(layer, view, extent, false).unwrap(), vec![part]);
        assert!(doc.layer(layer).unwrap().has_cache(view));

        doc.set_part_capability(part, Capability::DragSnap, true).unwrap();
        assert_eq!(doc.snap_parts_in_view(layer, view, extent, false).unwrap(), vec![part]);
        assert!(doc.parts_in_view(LayerKey::new(99), view, extent, false).is_err());
    }

    #[test]
    fn test_compute_bounds_is_tight() {
        let mut doc = Document::new();
        let layer = doc.default_layer();
        let a = add(&mut doc, layer, Bounds::new(0.0, 0.0, 10.0, 10.0));
        let b = add(&mut doc, layer, Bounds::new(50.0, 50.0, 10.0, 10.0));
        assert_eq!(doc.compute_bounds(), Some(Bounds::new(0.0, 0.0, 60.0, 60.0)));

        doc.remove(b).unwrap();
        assert_eq!(doc.compute_bounds(), Some(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(doc.extent(), Bounds::new(0.0, 0.0, 60.0, 60.0));

        doc.set_part_capability(a, Capability::Printable, false).unwrap();
        assert_eq!(doc.compute_bounds_for(Capability::Printable), None);
    }

    #[test]
    fn test_find_node_options() {
        let mut doc = Document::new();
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let inner = doc.create_part(Part::new(Bounds::default()).as_node("Inner Task"));
        doc.group_add(group, inner).unwrap();
        doc.add(group).unwrap();
        let start = doc.create_part(Part::new(Bounds::default()).as_node("Start"));
        doc.add(start).unwrap();

        assert_eq!(doc.find_node("Start", false, false, false), Some(start));
        assert_eq!(doc.find_node("start", false, false, false), None);
        assert_eq!(doc.find_node("start", false, true, false), Some(start));
        assert_eq!(doc.find_node("Sta", false, false, false), None);
        assert_eq!(doc.find_node("Sta", true, false, false), Some(start));
        assert_eq!(doc.find_node("Inner Task", false, false, false), None);
        assert_eq!(doc.find_node("inner", true, true, true), Some(inner));
    }
}

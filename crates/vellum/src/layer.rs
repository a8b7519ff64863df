//! Layers: ordered collections of top-level parts.
//!
//! A [`Layer`] owns the paint order of its top-level parts (back to front),
//! gates the capabilities of everything in it, and keeps derived caches for
//! viewers:
//!
//! - a per-viewer list of visible parts intersecting the viewer's extent,
//!   plus the subset that accepts drag snapping
//! - a one-entry memo of the last point pick
//!
//! Layers are mutated only through [`Document`](crate::Document) so that
//! every change is recorded; this module holds the read side.

use std::{cell::RefCell, collections::HashMap};

use indexmap::IndexSet;

use vellum_core::{
    capability::{Capabilities, Capability},
    geometry::{Bounds, Point},
    identifier::LayerName,
    key::{LayerKey, PartKey, ViewId},
};

use crate::store::PartStore;

/// Whether a rectangle search wants parts fully inside or merely touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Inclusion {
    #[default]
    Contained,
    Intersects,
}

/// Whether a search accepts any part or only selectable ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selectability {
    Any,
    #[default]
    SelectableOnly,
}

/// How [`Document::pick_objects_in_rectangle`](crate::Document::pick_objects_in_rectangle)
/// matches parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchStyle {
    pub inclusion: Inclusion,
    pub selectability: Selectability,
}

impl SearchStyle {
    pub fn new(inclusion: Inclusion, selectability: Selectability) -> Self {
        Self {
            inclusion,
            selectability,
        }
    }
}

/// Read-only view of parts under one layer's and one document's gates.
pub(crate) struct PartView<'a> {
    parts: &'a PartStore,
    layer_gates: Capabilities,
    doc_gates: Capabilities,
}

impl<'a> PartView<'a> {
    pub fn new(parts: &'a PartStore, layer_gates: Capabilities, doc_gates: Capabilities) -> Self {
        Self {
            parts,
            layer_gates,
            doc_gates,
        }
    }

    /// A part is visible when it, every ancestor and the layer are visible.
    pub fn is_visible(&self, key: PartKey) -> bool {
        self.layer_gates.get(Capability::Visible)
            && self
                .parts
                .ancestors(key)
                .into_iter()
                .all(|k| self.parts.get(k).is_some_and(|p| p.flag(Capability::Visible)))
    }

    /// The part's own flag gated by its layer and document.
    pub fn can(&self, key: PartKey, capability: Capability) -> bool {
        self.layer_gates.get(capability)
            && self.doc_gates.get(capability)
            && self.parts.get(key).is_some_and(|p| p.flag(capability))
    }

    /// The deepest visible part under `point` within `key`'s subtree.
    ///
    /// A group with children is hit only through its children.
    fn deepest_hit(&self, key: PartKey, point: Point) -> Option<PartKey> {
        let part = self.parts.get(key)?;
        if !part.flag(Capability::Visible) || !part.contains_point(point) {
            return None;
        }
        let children = part.children();
        if children.is_empty() {
            return Some(key);
        }
        children
            .iter()
            .rev()
            .find_map(|child| self.deepest_hit(*child, point))
    }

    /// Picks within one top-level part's subtree.
    fn pick_in(&self, top: PartKey, point: Point, selectable_only: bool) -> Option<PartKey> {
        let hit = self.deepest_hit(top, point)?;
        if !selectable_only {
            return Some(hit);
        }
        self.parts
            .ancestors(hit)
            .into_iter()
            .find(|k| self.can(*k, Capability::Selectable))
    }

    fn collect_in_rect(&self, key: PartKey, rect: &Bounds, style: SearchStyle, out: &mut Vec<PartKey>) {
        let Some(part) = self.parts.get(key) else {
            return;
        };
        if !part.flag(Capability::Visible) {
            return;
        }
        let bounds = part.bounds();
        let matches = match style.inclusion {
            Inclusion::Contained => rect.contains_bounds(&bounds),
            Inclusion::Intersects => rect.intersects(&bounds),
        };
        let selectable = match style.selectability {
            Selectability::Any => true,
            Selectability::SelectableOnly => self.can(key, Capability::Selectable),
        };
        if matches && selectable {
            out.push(key);
        } else if rect.intersects(&bounds) {
            for child in part.children() {
                self.collect_in_rect(*child, rect, style, out);
            }
        }
    }
}

/// Visible parts of a layer within one viewer's extent.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayerCache {
    extent: Bounds,
    parts: Vec<PartKey>,
    snap_parts: Vec<PartKey>,
}

impl LayerCache {
    fn build(view: &PartView<'_>, members: &IndexSet<PartKey>, extent: Bounds) -> Self {
        let parts: Vec<PartKey> = members
            .iter()
            .copied()
            .filter(|key| {
                view.is_visible(*key)
                    && view
                        .parts
                        .get(*key)
                        .is_some_and(|p| extent.intersects(&p.bounds()))
            })
            .collect();
        let snap_parts = parts
            .iter()
            .copied()
            .filter(|key| view.can(*key, Capability::DragSnap))
            .collect();
        Self {
            extent,
            parts,
            snap_parts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PickMemo {
    generation: u64,
    point: Point,
    selectable_only: bool,
    result: Option<PartKey>,
}

/// An ordered collection of top-level parts.
#[derive(Debug)]
pub struct Layer {
    key: LayerKey,
    name: LayerName,
    pub(crate) parts: IndexSet<PartKey>,
    pub(crate) gates: Capabilities,
    caches: HashMap<ViewId, LayerCache>,
    generation: u64,
    pick_memo: RefCell<Option<PickMemo>>,
}

impl Layer {
    pub(crate) fn new(key: LayerKey, name: LayerName) -> Self {
        Self {
            key,
            name,
            parts: IndexSet::new(),
            gates: Capabilities::all(),
            caches: HashMap::new(),
            generation: 0,
            pick_memo: RefCell::new(None),
        }
    }

    pub fn key(&self) -> LayerKey {
        self.key
    }

    pub fn name(&self) -> LayerName {
        self.name
    }

    pub(crate) fn set_name(&mut self, name: LayerName) {
        self.name = name;
    }

    /// Top-level parts in paint order, back to front.
    pub fn parts(&self) -> impl DoubleEndedIterator<Item = PartKey> + '_ {
        self.parts.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn contains(&self, part: PartKey) -> bool {
        self.parts.contains(&part)
    }

    /// Position of a top-level part in paint order.
    pub fn index_of(&self, part: PartKey) -> Option<usize> {
        self.parts.get_index_of(&part)
    }

    /// The layer's gate for `capability`.
    pub fn gate(&self, capability: Capability) -> bool {
        self.gates.get(capability)
    }

    pub fn gates(&self) -> Capabilities {
        self.gates
    }

    /// Marks the layer changed and rebuilds every viewer cache whose extent
    /// intersects one of `touched`.
    pub(crate) fn refresh_caches(&mut self, parts: &PartStore, doc_gates: Capabilities, touched: &[Bounds]) {
        self.generation += 1;
        let view = PartView::new(parts, self.gates, doc_gates);
        let members = &self.parts;
        for cache in self.caches.values_mut() {
            if touched.iter().any(|b| cache.extent.intersects(b)) {
                *cache = LayerCache::build(&view, members, cache.extent);
            }
        }
    }

    /// Drops every viewer cache and the pick memo.
    pub(crate) fn clear_caches(&mut self) {
        self.generation += 1;
        self.caches.clear();
    }

    /// Visible parts intersecting `extent`, in paint order.
    ///
    /// A cached list is reused when the viewer's extent is unchanged. With
    /// `seed` set, a freshly computed list is stored for the viewer.
    pub(crate) fn parts_in_view(
        &mut self,
        parts: &PartStore,
        doc_gates: Capabilities,
        view_id: ViewId,
        extent: Bounds,
        seed: bool,
    ) -> Vec<PartKey> {
        self.cache_for(parts, doc_gates, view_id, extent, seed).parts
    }

    /// The drag-snap subset of [`Layer::parts_in_view`].
    pub(crate) fn snap_parts_in_view(
        &mut self,
        parts: &PartStore,
        doc_gates: Capabilities,
        view_id: ViewId,
        extent: Bounds,
        seed: bool,
    ) -> Vec<PartKey> {
        self.cache_for(parts, doc_gates, view_id, extent, seed).snap_parts
    }

    fn cache_for(
        &mut self,
        parts: &PartStore,
        doc_gates: Capabilities,
        view_id: ViewId,
        extent: Bounds,
        seed: bool,
    ) -> LayerCache {
        if let Some(cache) = self.caches.get(&view_id).filter(|c| c.extent == extent) {
            return cache.clone();
        }
        let view = PartView::new(parts, self.gates, doc_gates);
        let cache = LayerCache::build(&view, &self.parts, extent);
        if seed {
            self.caches.insert(view_id, cache.clone());
        }
        cache
    }

    pub(crate) fn has_cache(&self, view_id: ViewId) -> bool {
        self.caches.contains_key(&view_id)
    }

    /// The front-most part under `point`.
    ///
    /// With `selectable_only`, a hit on an unselectable part resolves to its
    /// nearest selectable ancestor.
    pub(crate) fn pick_object(
        &self,
        parts: &PartStore,
        doc_gates: Capabilities,
        point: Point,
        selectable_only: bool,
    ) -> Option<PartKey> {
        if let Some(memo) = *self.pick_memo.borrow() {
            if memo.generation == self.generation
                && memo.point == point
                && memo.selectable_only == selectable_only
            {
                return memo.result;
            }
        }
        if !self.gates.get(Capability::Visible) {
            return None;
        }
        let view = PartView::new(parts, self.gates, doc_gates);
        let result = self
            .parts
            .iter()
            .rev()
            .find_map(|top| view.pick_in(*top, point, selectable_only));
        *self.pick_memo.borrow_mut() = Some(PickMemo {
            generation: self.generation,
            point,
            selectable_only,
            result,
        });
        result
    }

    /// Every top-level part's pick under `point`, front to back.
    pub(crate) fn pick_objects(
        &self,
        parts: &PartStore,
        doc_gates: Capabilities,
        point: Point,
        selectable_only: bool,
        limit: usize,
    ) -> Vec<PartKey> {
        if !self.gates.get(Capability::Visible) {
            return Vec::new();
        }
        let view = PartView::new(parts, self.gates, doc_gates);
        self.parts
            .iter()
            .rev()
            .filter_map(|top| view.pick_in(*top, point, selectable_only))
            .take(limit)
            .collect()
    }

    /// Parts matching `rect` under `style`, back to front.
    ///
    /// A group that does not match itself is searched through its children.
    pub(crate) fn pick_objects_in_rectangle(
        &self,
        parts: &PartStore,
        doc_gates: Capabilities,
        rect: Bounds,
        style: SearchStyle,
        limit: usize,
    ) -> Vec<PartKey> {
        if !self.gates.get(Capability::Visible) {
            return Vec::new();
        }
        let view = PartView::new(parts, self.gates, doc_gates);
        let mut out = Vec::new();
        for top in &self.parts {
            view.collect_in_rect(*top, &rect, style, &mut out);
            if out.len() >= limit {
                out.truncate(limit);
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::Part;

    fn layer_with(parts: &mut PartStore, bounds: &[Bounds]) -> (Layer, Vec<PartKey>) {
        let mut layer = Layer::new(LayerKey::new(0), LayerName::new("default"));
        let keys: Vec<_> = bounds
            .iter()
            .map(|b| {
                let key = parts.insert(Part::new(*b));
                layer.parts.insert(key);
                key
            })
            .collect();
        (layer, keys)
    }

    #[test]
    fn test_pick_prefers_front_most() {
        let mut parts = PartStore::default();
        let (layer, keys) = layer_with(
            &mut parts,
            &[Bounds::new(0.0, 0.0, 10.0, 10.0), Bounds::new(5.0, 5.0, 10.0, 10.0)],
        );
        let gates = Capabilities::all();
        assert_eq!(layer.pick_object(&parts, gates, Point::new(6.0, 6.0), false), Some(keys[1]));
        assert_eq!(layer.pick_object(&parts, gates, Point::new(1.0, 1.0), false), Some(keys[0]));
        assert_eq!(layer.pick_object(&parts, gates, Point::new(50.0, 50.0), false), None);
    }

    #[test]
    fn test_pick_memo_invalidated_by_refresh() {
        let mut parts = PartStore::default();
        let (mut layer, keys) = layer_with(&mut parts, &[Bounds::new(0.0, 0.0, 10.0, 10.0)]);
        let gates = Capabilities::all();
        let point = Point::new(1.0, 1.0);
        assert_eq!(layer.pick_object(&parts, gates, point, false), Some(keys[0]));

        parts.get_mut(keys[0]).unwrap().bounds = Bounds::new(20.0, 20.0, 10.0, 10.0);
        layer.refresh_caches(&parts, gates, &[]);
        assert_eq!(layer.pick_object(&parts, gates, point, false), None);
    }

    #[test]
    fn test_hidden_layer_picks_nothing() {
        let mut parts = PartStore::default();
        let (mut layer, _) = layer_with(&mut parts, &[Bounds::new(0.0, 0.0, 10.0, 10.0)]);
        layer.gates.set(Capability::Visible, false);
        let gates = Capabilities::all();
        assert_eq!(layer.pick_object(&parts, gates, Point::new(1.0, 1.0), false), None);
        assert!(layer.pick_objects(&parts, gates, Point::new(1.0, 1.0), false, usize::MAX).is_empty());
    }

    #[test]
    fn test_parts_in_view_seeds_cache() {
        let mut parts = PartStore::default();
        let (mut layer, keys) = layer_with(
            &mut parts,
            &[Bounds::new(0.0, 0.0, 10.0, 10.0), Bounds::new(100.0, 0.0, 10.0, 10.0)],
        );
        let gates = Capabilities::all();
        let extent = Bounds::new(0.0, 0.0, 50.0, 50.0);

        let seen = layer.parts_in_view(&parts, gates, ViewId(1), extent, false);
        assert_eq!(seen, vec![keys[0]]);
        assert!(!layer.has_cache(ViewId(1)));

        layer.parts_in_view(&parts, gates, ViewId(1), extent, true);
        assert!(layer.has_cache(ViewId(1)));
    }

    #[test]
    fn test_cache_rebuilt_when_touched() {
        let mut parts = PartStore::default();
        let (mut layer, keys) = layer_with(&mut parts, &[Bounds::new(100.0, 0.0, 10.0, 10.0)]);
        let gates = Capabilities::all();
        let extent = Bounds::new(0.0, 0.0, 50.0, 50.0);
        assert!(layer.parts_in_view(&parts, gates, ViewId(1), extent, true).is_empty());

        let new = Bounds::new(10.0, 10.0, 10.0, 10.0);
        parts.get_mut(keys[0]).unwrap().bounds = new;
        layer.refresh_caches(&parts, gates, &[new]);
        assert_eq!(layer.caches[&ViewId(1)].parts, vec![keys[0]]);
    }

    #[test]
    fn test_snap_parts_need_drag_snap() {
        let mut parts = PartStore::default();
        let (mut layer, keys) = layer_with(
            &mut parts,
            &[Bounds::new(0.0, 0.0, 10.0, 10.0), Bounds::new(20.0, 0.0, 10.0, 10.0)],
        );
        parts.get_mut(keys[1]).unwrap().flags.set(Capability::DragSnap, true);
        let gates = Capabilities::all();
        let extent = Bounds::new(0.0, 0.0, 50.0, 50.0);
        assert_eq!(layer.snap_parts_in_view(&parts, gates, ViewId(0), extent, true), vec![keys[1]]);
    }
}

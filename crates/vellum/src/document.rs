//! The document: root container of layers and parts.
//!
//! A [`Document`] owns the part arena, the ordered layer collection, the
//! aggregate extent and the document-wide policies. Every mutation goes
//! through a document method, which applies it and raises one
//! [`ChangeRecord`] per observable change. Each record flows, in order,
//! through:
//!
//! 1. the document's derived-state updater (extent, viewer caches, position
//!    grid invalidation)
//! 2. registered [`ChangeListener`]s
//! 3. the [`UndoManager`](crate::UndoManager), unless undo/redo is running
//! 4. the behaviors of parts observing the changed part
//!
//! The operations are split across modules by concern; this module holds
//! the state, the notification pipeline and plain part properties.

use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use indexmap::IndexSet;
use log::{debug, trace, warn};

use vellum_core::{
    capability::{Capabilities, Capability},
    change::{Change, ChangeRecord, DocumentChange, LayerChange, PartChange},
    geometry::{Bounds, Point, Size},
    identifier::LayerName,
    key::{LayerKey, PartId, PartKey},
    policy::ValidCycle,
};

use crate::{
    DocumentError, Result,
    config::DocumentConfig,
    grid::PositionGrid,
    layer::Layer,
    part::{Part, PartBehavior},
    store::PartStore,
    transaction::{CustomChangeHandler, UndoManager},
};

/// Receives every change record a document raises.
///
/// Closures taking `&ChangeRecord` are listeners.
pub trait ChangeListener {
    fn on_change(&mut self, record: &ChangeRecord);
}

impl<F> ChangeListener for F
where
    F: FnMut(&ChangeRecord),
{
    fn on_change(&mut self, record: &ChangeRecord) {
        self(record)
    }
}

/// Handle returned by [`Document::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Tags handed to new documents. Tag 0 marks untagged handles.
static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// A diagram document.
pub struct Document {
    pub(crate) config: DocumentConfig,
    /// Tag carried by every part and layer handle this document issues.
    pub(crate) owner: u32,
    pub(crate) name: String,
    pub(crate) parts: PartStore,
    pub(crate) layers: Vec<Layer>,
    /// Removed layers, kept so undo can restore them.
    pub(crate) retired_layers: HashMap<LayerKey, Layer>,
    pub(crate) next_layer_key: u32,
    pub(crate) default_layer: LayerKey,
    pub(crate) links_layer: LayerKey,
    pub(crate) top_left: Point,
    pub(crate) size: Size,
    pub(crate) fixed_size: bool,
    pub(crate) gates: Capabilities,
    pub(crate) maintains_part_id: bool,
    pub(crate) part_ids: HashMap<PartId, PartKey>,
    pub(crate) next_part_id: u32,
    pub(crate) valid_cycle: ValidCycle,
    pub(crate) suspends_routing: bool,
    pub(crate) pending_routes: IndexSet<PartKey>,
    pub(crate) position_grid: Option<PositionGrid>,
    pub(crate) listeners: Vec<(ListenerId, Box<dyn ChangeListener>)>,
    pub(crate) next_listener: u64,
    pub(crate) undo_manager: Option<Box<dyn UndoManager>>,
    pub(crate) custom_handler: Option<Box<dyn CustomChangeHandler>>,
    pub(crate) transaction_level: usize,
    pub(crate) rollback_requested: bool,
    pub(crate) suspends_updates: bool,
    pub(crate) skips_undo_manager: bool,
    pub(crate) undoing: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("parts", &self.parts.len())
            .field("layers", &self.layers)
            .field("default_layer", &self.default_layer)
            .field("links_layer", &self.links_layer)
            .field("top_left", &self.top_left)
            .field("size", &self.size)
            .field("gates", &self.gates)
            .field("transaction_level", &self.transaction_level)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Creates a document with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DocumentConfig::default())
    }

    /// Creates a document with one empty default layer.
    ///
    /// A configuration that fails [`DocumentConfig::validate`] is replaced
    /// by the default configuration.
    pub fn with_config(config: DocumentConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(err:%; "Invalid document configuration, using defaults");
                DocumentConfig::default()
            }
        };
        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        let default_layer = LayerKey::with_owner(owner, 0);
        let maintains_part_id = config.identity().maintains_part_id();
        let valid_cycle = config.cycles().valid_cycle();
        Self {
            config,
            owner,
            name: String::new(),
            parts: PartStore::new(owner),
            layers: vec![Layer::new(default_layer, LayerName::new("default"))],
            retired_layers: HashMap::new(),
            next_layer_key: 1,
            default_layer,
            links_layer: default_layer,
            top_left: Point::default(),
            size: Size::default(),
            fixed_size: false,
            gates: Capabilities::all(),
            maintains_part_id,
            part_ids: HashMap::new(),
            next_part_id: 0,
            valid_cycle,
            suspends_routing: false,
            pending_routes: IndexSet::new(),
            position_grid: None,
            listeners: Vec::new(),
            next_listener: 0,
            undo_manager: None,
            custom_handler: None,
            transaction_level: 0,
            rollback_requested: false,
            suspends_updates: false,
            skips_undo_manager: false,
            undoing: false,
        }
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let new = name.into();
        if new == self.name {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.name, new.clone());
        self.raise(Change::Document(DocumentChange::Name { old, new }))
    }

    // ---- Parts ----

    /// Adds a detached part to the arena.
    ///
    /// The part is not visible in any layer until it is added to one.
    pub fn create_part(&mut self, part: Part) -> PartKey {
        let key = self.parts.insert(part);
        trace!(part:? = key; "Part created");
        key
    }

    pub fn part(&self, key: PartKey) -> Option<&Part> {
        self.parts.get(key)
    }

    /// Every part in the arena, attached or not.
    pub fn parts(&self) -> impl Iterator<Item = (PartKey, &Part)> {
        self.parts.iter()
    }

    /// Frees a detached part and its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotDetached`] if the part is in a layer or a
    /// group.
    pub fn destroy_part(&mut self, key: PartKey) -> Result<()> {
        let part = self.parts.part(key)?;
        if part.layer.is_some() || part.parent.is_some() {
            return Err(DocumentError::NotDetached(key));
        }
        for k in self.parts.subtree(key) {
            self.pending_routes.shift_remove(&k);
            self.parts.remove(k);
        }
        debug!(part:? = key; "Part destroyed");
        Ok(())
    }

    /// The layer holding `key` through its top-level ancestor.
    pub fn layer_of(&self, key: PartKey) -> Option<LayerKey> {
        self.parts.layer_of(key)
    }

    pub fn is_attached(&self, key: PartKey) -> bool {
        self.parts.is_attached(key)
    }

    pub fn top_level(&self, key: PartKey) -> PartKey {
        self.parts.top_level(key)
    }

    /// Returns true if `ancestor` is a strict ancestor of `key`.
    pub fn is_child_of(&self, key: PartKey, ancestor: PartKey) -> bool {
        self.parts.is_child_of(key, ancestor)
    }

    /// The nearest group containing both parts; a part contains itself.
    pub fn find_common_ancestor(&self, a: PartKey, b: PartKey) -> Option<PartKey> {
        self.parts.common_ancestor(a, b)
    }

    // ---- Listeners ----

    pub fn add_listener(&mut self, listener: Box<dyn ChangeListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if no listener was registered under `id`.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    // ---- Notification ----

    pub(crate) fn raise(&mut self, change: Change) -> Result<()> {
        self.dispatch(ChangeRecord::after(change))
    }

    pub(crate) fn raise_before(&mut self, change: Change) -> Result<()> {
        self.dispatch(ChangeRecord::before(change))
    }

    fn dispatch(&mut self, record: ChangeRecord) -> Result<()> {
        if self.suspends_updates {
            return Ok(());
        }
        if record.is_after() {
            self.update_derived_state(record.change())?;
        }
        trace!(hint = record.hint(), subhint = record.subhint(); "Change raised");

        for (_, listener) in &mut self.listeners {
            listener.on_change(&record);
        }

        let recordable = record.is_after() && !matches!(record.change(), Change::Transaction(_));
        if recordable && !self.skips_undo_manager {
            if let Some(manager) = self.undo_manager.as_mut() {
                manager.document_changed(&record);
            }
        }

        if let (true, Change::Part { part, change }) = (record.is_after(), record.change()) {
            self.notify_observers(*part, change)?;
        }
        Ok(())
    }

    fn notify_observers(&mut self, source: PartKey, change: &PartChange) -> Result<()> {
        let observers = self
            .parts
            .get(source)
            .map(|p| p.observers.clone())
            .unwrap_or_default();
        for observer in observers {
            self.with_behavior(observer, |behavior, doc| {
                behavior.observed_changed(doc, observer, source, change)
            })?;
        }
        Ok(())
    }

    /// Runs `f` with the part's behavior taken out of the part.
    ///
    /// A hook that raises changes on its own part therefore does not re-enter
    /// itself.
    pub(crate) fn with_behavior<F>(&mut self, key: PartKey, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn PartBehavior, &mut Document) -> Result<()>,
    {
        let Some(mut behavior) = self.parts.get_mut(key).and_then(|p| p.behavior.take()) else {
            return Ok(());
        };
        let result = f(behavior.as_mut(), self);
        if let Some(part) = self.parts.get_mut(key) {
            if part.behavior.is_none() {
                part.behavior = Some(behavior);
            }
        }
        result
    }

    fn update_derived_state(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::Part { part, change } => {
                let current = self.parts.get(*part).map(Part::bounds).unwrap_or_default();
                match change {
                    PartChange::Bounds { old, new } => {
                        self.touch_part(*part, &[*old, *new]);
                        self.invalidate_grid_for(*part);
                        if self.parts.is_attached(*part) {
                            self.grow_extent(*new)?;
                        }
                    }
                    PartChange::Capability {
                        capability: Capability::Visible,
                        ..
                    }
                    | PartChange::Avoidable { .. } => {
                        self.touch_part(*part, &[current]);
                        if self.parts.is_attached(*part) {
                            self.position_grid = None;
                        }
                    }
                    PartChange::ChildInserted { child, .. } | PartChange::ChildRemoved { child, .. } => {
                        let child_bounds = self.parts.get(*child).map(Part::bounds).unwrap_or_default();
                        self.touch_part(*part, &[child_bounds]);
                        self.invalidate_grid_for(*child);
                    }
                    _ => self.touch_part(*part, &[current]),
                }
            }
            Change::Layer { layer, change } => match change {
                LayerChange::Inserted { part, .. } => {
                    let bounds = self.parts.part(*part)?.bounds();
                    self.touch_layer(*layer, &[bounds]);
                    self.invalidate_grid_for(*part);
                    self.grow_extent(bounds)?;
                }
                LayerChange::Removed { part, .. } | LayerChange::ZOrder { part, .. } => {
                    let bounds = self.parts.part(*part)?.bounds();
                    self.touch_layer(*layer, &[bounds]);
                    self.invalidate_grid_for(*part);
                }
                LayerChange::PartLayer { part, old_layer, .. } => {
                    let bounds = self.parts.part(*part)?.bounds();
                    self.touch_layer(*old_layer, &[bounds]);
                    self.touch_layer(*layer, &[bounds]);
                    self.position_grid = None;
                }
                LayerChange::Capability { capability, .. } => {
                    if let Some(layer) = self.layers.iter_mut().find(|l| l.key() == *layer) {
                        layer.clear_caches();
                    }
                    if *capability == Capability::Visible {
                        self.position_grid = None;
                    }
                }
                LayerChange::Name { .. } => {}
            },
            Change::Document(DocumentChange::Capability { .. }) => {
                for layer in &mut self.layers {
                    layer.clear_caches();
                }
            }
            Change::LayerCollection(_) => self.position_grid = None,
            _ => {}
        }
        Ok(())
    }

    /// Marks the layer holding `part` changed within `touched`.
    fn touch_part(&mut self, part: PartKey, touched: &[Bounds]) {
        if let Some(layer) = self.parts.layer_of(part) {
            self.touch_layer(layer, touched);
        }
    }

    pub(crate) fn touch_layer(&mut self, layer: LayerKey, touched: &[Bounds]) {
        let doc_gates = self.gates;
        let parts = &self.parts;
        if let Some(layer) = self.layers.iter_mut().find(|l| l.key() == layer) {
            layer.refresh_caches(parts, doc_gates, touched);
        }
    }

    fn invalidate_grid_for(&mut self, part: PartKey) {
        if self.position_grid.is_none() || !self.parts.is_attached(part) {
            return;
        }
        let avoidable = |k: &PartKey| self.parts.get(*k).is_some_and(Part::is_avoidable);
        if self.parts.ancestors(part).iter().any(avoidable)
            || self.parts.subtree(part).iter().any(avoidable)
        {
            self.position_grid = None;
        }
    }

    // ---- Extent ----

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// The aggregate document rectangle.
    pub fn extent(&self) -> Bounds {
        Bounds::new_from_top_left(self.top_left, self.size)
    }

    pub fn set_top_left(&mut self, top_left: Point) -> Result<()> {
        if top_left == self.top_left {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.top_left, top_left);
        self.raise(Change::Document(DocumentChange::TopLeft { old, new: top_left }))
    }

    /// Sets the document size; negative sizes are ignored.
    pub fn set_size(&mut self, size: Size) -> Result<()> {
        if size.is_negative() || size == self.size {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.size, size);
        self.raise(Change::Document(DocumentChange::Size { old, new: size }))
    }

    pub fn fixed_size(&self) -> bool {
        self.fixed_size
    }

    /// With a fixed size the extent no longer grows to cover parts.
    pub fn set_fixed_size(&mut self, fixed: bool) -> Result<()> {
        if fixed == self.fixed_size {
            return Ok(());
        }
        self.fixed_size = fixed;
        self.raise(Change::Document(DocumentChange::FixedSize {
            old: !fixed,
            new: fixed,
        }))
    }

    /// Grows the extent to cover `rect`. The extent never shrinks here.
    pub(crate) fn grow_extent(&mut self, rect: Bounds) -> Result<()> {
        let extent = self.extent();
        if self.fixed_size || extent.contains_bounds(&rect) {
            return Ok(());
        }
        let grown = extent.merge(&rect);
        self.set_top_left(grown.min_point())?;
        self.set_size(grown.to_size())
    }

    // ---- Capabilities ----

    /// The document gate for `capability`.
    pub fn capability(&self, capability: Capability) -> bool {
        self.gates.get(capability)
    }

    pub fn set_document_capability(&mut self, capability: Capability, value: bool) -> Result<()> {
        let old = self.gates.get(capability);
        if old == value {
            return Ok(());
        }
        self.gates.set(capability, value);
        self.raise(Change::Document(DocumentChange::Capability {
            capability,
            old,
            new: value,
        }))
    }

    /// The effective capability: the part's own flag, gated by its layer
    /// (when attached) and the document.
    ///
    /// Flags do not propagate to children; each part answers for itself.
    pub fn can(&self, key: PartKey, capability: Capability) -> bool {
        let Some(part) = self.parts.get(key) else {
            return false;
        };
        let layer_gate = self
            .parts
            .layer_of(key)
            .and_then(|layer| self.layer(layer))
            .is_none_or(|layer| layer.gate(capability));
        part.flag(capability) && layer_gate && self.gates.get(capability)
    }

    pub fn can_select(&self, key: PartKey) -> bool {
        self.can(key, Capability::Selectable)
    }

    pub fn can_move(&self, key: PartKey) -> bool {
        self.can(key, Capability::Movable)
    }

    pub fn can_resize(&self, key: PartKey) -> bool {
        self.can(key, Capability::Resizable)
    }

    pub fn can_copy(&self, key: PartKey) -> bool {
        self.can(key, Capability::Copyable)
    }

    pub fn can_delete(&self, key: PartKey) -> bool {
        self.can(key, Capability::Deletable)
    }

    pub fn can_edit(&self, key: PartKey) -> bool {
        self.can(key, Capability::Editable)
    }

    /// A part is visible when it, its ancestors and its layer are visible.
    pub fn is_visible(&self, key: PartKey) -> bool {
        let layer_visible = self
            .parts
            .layer_of(key)
            .and_then(|layer| self.layer(layer))
            .is_none_or(|layer| layer.gate(Capability::Visible));
        layer_visible
            && self
                .parts
                .ancestors(key)
                .into_iter()
                .all(|k| self.parts.get(k).is_some_and(|p| p.flag(Capability::Visible)))
    }

    // ---- Part properties ----

    pub fn set_part_capability(&mut self, key: PartKey, capability: Capability, value: bool) -> Result<()> {
        let part = self.parts.part_mut(key)?;
        let old = part.flags.get(capability);
        if old == value {
            return Ok(());
        }
        part.flags.set(capability, value);
        self.raise(Change::Part {
            part: key,
            change: PartChange::Capability {
                capability,
                old,
                new: value,
            },
        })
    }

    /// Sets a part's bounds.
    ///
    /// Groups carry their children along and links carry their points.
    /// Bounds with a negative size are ignored.
    pub fn set_bounds(&mut self, key: PartKey, bounds: Bounds) -> Result<()> {
        self.parts.part(key)?;
        if bounds.has_negative_size() {
            debug!(part:? = key, bounds:?; "Ignoring bounds with negative size");
            return Ok(());
        }
        self.change_bounds(key, bounds, true)
    }

    /// Moves a part so its top-left corner is at `location`.
    pub fn set_location(&mut self, key: PartKey, location: Point) -> Result<()> {
        let bounds = self.parts.part(key)?.bounds();
        self.set_bounds(key, Bounds::new_from_top_left(location, bounds.to_size()))
    }

    /// Moves a part by `offset`.
    pub fn translate(&mut self, key: PartKey, offset: Point) -> Result<()> {
        let bounds = self.parts.part(key)?.bounds();
        self.set_bounds(key, bounds.translate(offset))
    }

    /// Applies a bounds change and runs its follow-ups.
    ///
    /// With `carry`, a group's children and a link's points follow the
    /// change. Undo passes `carry = false` since those follow-ups were
    /// recorded on their own.
    pub(crate) fn change_bounds(&mut self, key: PartKey, new: Bounds, carry: bool) -> Result<()> {
        let part = self.parts.part_mut(key)?;
        let old = part.bounds;
        if old == new {
            return Ok(());
        }
        part.bounds = new;
        self.raise(Change::Part {
            part: key,
            change: PartChange::Bounds { old, new },
        })?;

        if carry {
            self.carry_contents(key, old, new)?;
        }
        if self.parts.part(key)?.is_port() {
            self.port_moved(key)?;
        }
        self.with_behavior(key, |behavior, doc| behavior.bounds_changed(doc, key, old))?;
        if let Some(parent) = self.parts.part(key)?.parent {
            self.refresh_group_bounds(parent)?;
        }
        Ok(())
    }

    fn carry_contents(&mut self, key: PartKey, old: Bounds, new: Bounds) -> Result<()> {
        let part = self.parts.part(key)?;
        let children = part.children().to_vec();
        let points = part.link().map(|link| link.points().to_vec());

        if let Some(points) = points.filter(|p| !p.is_empty()) {
            let moved = points.into_iter().map(|p| map_point(&old, &new, p)).collect();
            self.replace_link_points(key, moved)?;
        }
        if children.is_empty() {
            return Ok(());
        }

        self.parts.part_mut(key)?.updating_children = true;
        let result = children.iter().try_for_each(|child| {
            let bounds = self.parts.part(*child)?.bounds();
            let moved = map_bounds(&old, &new, bounds);
            self.change_bounds(*child, moved, true)
        });
        if let Some(part) = self.parts.get_mut(key) {
            part.updating_children = false;
        }
        result?;
        self.refresh_group_bounds(key)
    }

    /// Sets a group's bounds to the union of its children.
    pub(crate) fn refresh_group_bounds(&mut self, group: PartKey) -> Result<()> {
        let part = self.parts.part(group)?;
        if part.updating_children {
            return Ok(());
        }
        let union = part
            .children()
            .iter()
            .filter_map(|child| self.parts.get(*child))
            .map(Part::bounds)
            .reduce(|a, b| a.merge(&b));
        match union {
            Some(union) => self.change_bounds(group, union, false),
            None => Ok(()),
        }
    }

    /// Sets a node's label.
    pub fn set_text(&mut self, key: PartKey, text: impl Into<String>) -> Result<()> {
        let new = text.into();
        let node = self
            .parts
            .part_mut(key)?
            .node
            .as_mut()
            .ok_or(DocumentError::MissingRole { part: key, role: "node" })?;
        if node.text == new {
            return Ok(());
        }
        let old = std::mem::replace(&mut node.text, new.clone());
        self.raise(Change::Part {
            part: key,
            change: PartChange::Text { old, new },
        })
    }

    /// Sets whether link routes should stay clear of this part.
    pub fn set_avoidable(&mut self, key: PartKey, avoidable: bool) -> Result<()> {
        let part = self.parts.part_mut(key)?;
        if part.avoidable == avoidable {
            return Ok(());
        }
        part.avoidable = avoidable;
        self.raise(Change::Part {
            part: key,
            change: PartChange::Avoidable {
                old: !avoidable,
                new: avoidable,
            },
        })
    }

    /// Registers `observer` to receive `target`'s changes through its
    /// behavior's observed-changed hook.
    pub fn add_observer(&mut self, target: PartKey, observer: PartKey) -> Result<()> {
        self.parts.part(observer)?;
        let part = self.parts.part_mut(target)?;
        if part.observers.contains(&observer) {
            return Ok(());
        }
        part.observers.push(observer);
        self.raise(Change::Part {
            part: target,
            change: PartChange::ObserverAdded { observer },
        })
    }

    pub fn remove_observer(&mut self, target: PartKey, observer: PartKey) -> Result<()> {
        let part = self.parts.part_mut(target)?;
        let Some(index) = part.observers.iter().position(|o| *o == observer) else {
            return Ok(());
        };
        part.observers.remove(index);
        self.raise(Change::Part {
            part: target,
            change: PartChange::ObserverRemoved { observer },
        })
    }
}

fn map_point(from: &Bounds, to: &Bounds, point: Point) -> Point {
    if from.to_size() == to.to_size() {
        point.add_point(to.min_point().sub_point(from.min_point()))
    } else {
        to.map_point_from(from, point)
    }
}

/// Maps `bounds` from `from`'s frame to `to`'s: a translation when the size
/// is unchanged, a proportional rescale otherwise.
fn map_bounds(from: &Bounds, to: &Bounds, bounds: Bounds) -> Bounds {
    if from.to_size() == to.to_size() {
        return bounds.translate(to.min_point().sub_point(from.min_point()));
    }
    let top_left = to.map_point_from(from, bounds.min_point());
    let bottom_right = to.map_point_from(from, Point::new(bounds.max_x(), bounds.max_y()));
    Bounds::enclosing([top_left, bottom_right]).unwrap_or(bounds)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use float_cmp::assert_approx_eq;

    use super::*;

    fn recorder(doc: &mut Document) -> Rc<RefCell<Vec<ChangeRecord>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        doc.add_listener(Box::new(move |record: &ChangeRecord| {
            sink.borrow_mut().push(record.clone())
        }));
        log
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let config: DocumentConfig = toml::from_str("[grid]\ncell_size = 0.0").unwrap();
        assert!(config.validate().is_err());
        let doc = Document::with_config(config);
        assert_eq!(doc.config().grid().cell_size(), 8.0);
    }

    #[test]
    fn test_new_document_has_one_default_layer() {
        let doc = Document::new();
        assert_eq!(doc.layer_count(), 1);
        assert_eq!(doc.default_layer(), doc.links_layer());
        assert_eq!(doc.extent(), Bounds::default());
    }

    #[test]
    fn test_set_bounds_raises_one_record() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        let log = recorder(&mut doc);

        doc.set_bounds(part, Bounds::new(5.0, 5.0, 10.0, 10.0)).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].change(),
            &Change::Part {
                part,
                change: PartChange::Bounds {
                    old: Bounds::new(0.0, 0.0, 10.0, 10.0),
                    new: Bounds::new(5.0, 5.0, 10.0, 10.0),
                },
            }
        );
    }

    #[test]
    fn test_unchanged_bounds_raise_nothing() {
        let mut doc = Document::new();
        let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let part = doc.create_part(Part::new(bounds));
        let log = recorder(&mut doc);
        doc.set_bounds(part, bounds).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_negative_size_is_ignored() {
        let mut doc = Document::new();
        let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let part = doc.create_part(Part::new(bounds));
        doc.set_bounds(part, Bounds::new(0.0, 0.0, -1.0, 5.0)).unwrap();
        assert_eq!(doc.part(part).unwrap().bounds(), bounds);
    }

    #[test]
    fn test_extent_grows_toward_negative() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::new(10.0, 10.0, 10.0, 10.0)));
        doc.add(part).unwrap();
        assert_eq!(doc.extent(), Bounds::new(0.0, 0.0, 20.0, 20.0));

        doc.set_bounds(part, Bounds::new(-30.0, -5.0, 10.0, 10.0)).unwrap();
        assert_eq!(doc.top_left(), Point::new(-30.0, -5.0));
        assert_eq!(doc.extent(), Bounds::new(-30.0, -5.0, 50.0, 25.0));
    }

    #[test]
    fn test_fixed_size_stops_growth() {
        let mut doc = Document::new();
        doc.set_fixed_size(true).unwrap();
        let part = doc.create_part(Part::new(Bounds::new(10.0, 10.0, 10.0, 10.0)));
        doc.add(part).unwrap();
        assert_eq!(doc.extent(), Bounds::default());
    }

    #[test]
    fn test_detached_part_does_not_grow_extent() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc.set_bounds(part, Bounds::new(100.0, 100.0, 10.0, 10.0)).unwrap();
        assert_eq!(doc.extent(), Bounds::default());
    }

    #[test]
    fn test_effective_capability_needs_all_three_grains() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc.add(part).unwrap();
        assert!(doc.can_move(part));

        let layer = doc.default_layer();
        doc.set_layer_capability(layer, Capability::Movable, false).unwrap();
        assert!(!doc.can_move(part));
        doc.set_layer_capability(layer, Capability::Movable, true).unwrap();

        doc.set_document_capability(Capability::Movable, false).unwrap();
        assert!(!doc.can_move(part));
        doc.set_document_capability(Capability::Movable, true).unwrap();

        doc.set_part_capability(part, Capability::Movable, false).unwrap();
        assert!(!doc.can_move(part));
        assert!(doc.can_select(part));
    }

    #[test]
    fn test_child_flag_does_not_inherit() {
        let mut doc = Document::new();
        let group = doc.create_part(Part::new(Bounds::default()).as_group());
        let child = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 5.0, 5.0)));
        doc.group_add(group, child).unwrap();
        doc.add(group).unwrap();

        doc.set_part_capability(group, Capability::Selectable, false).unwrap();
        assert!(!doc.can_select(group));
        assert!(doc.can_select(child));
    }

    #[test]
    fn test_set_text_requires_node() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::default()));
        assert_eq!(
            doc.set_text(part, "x").unwrap_err(),
            DocumentError::MissingRole { part, role: "node" }
        );

        let node = doc.create_part(Part::new(Bounds::default()).as_node("a"));
        doc.set_text(node, "b").unwrap();
        assert_eq!(doc.part(node).unwrap().text(), Some("b"));
    }

    #[test]
    fn test_remove_listener() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::default()));
        let log = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&log);
        let id = doc.add_listener(Box::new(move |_: &ChangeRecord| *sink.borrow_mut() += 1));

        doc.translate(part, Point::new(1.0, 0.0)).unwrap();
        assert_eq!(*log.borrow(), 1);

        assert!(doc.remove_listener(id));
        assert!(!doc.remove_listener(id));
        doc.translate(part, Point::new(1.0, 0.0)).unwrap();
        assert_eq!(*log.borrow(), 1);
    }

    #[derive(Debug, Clone)]
    struct Follower;

    impl PartBehavior for Follower {
        fn observed_changed(
            &mut self,
            doc: &mut Document,
            this: PartKey,
            _source: PartKey,
            change: &PartChange,
        ) -> Result<()> {
            if let PartChange::Bounds { old, new } = change {
                doc.translate(this, new.min_point().sub_point(old.min_point()))?;
            }
            Ok(())
        }

        fn clone_box(&self) -> Box<dyn PartBehavior> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_observer_follows_target() {
        let mut doc = Document::new();
        let target = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        let follower = doc.create_part(
            Part::new(Bounds::new(0.0, 20.0, 10.0, 10.0)).with_behavior(Box::new(Follower)),
        );
        doc.add_observer(target, follower).unwrap();

        doc.translate(target, Point::new(5.0, 0.0)).unwrap();
        assert_eq!(doc.part(follower).unwrap().bounds(), Bounds::new(5.0, 20.0, 10.0, 10.0));

        doc.remove_observer(target, follower).unwrap();
        doc.translate(target, Point::new(5.0, 0.0)).unwrap();
        assert_eq!(doc.part(follower).unwrap().bounds(), Bounds::new(5.0, 20.0, 10.0, 10.0));
    }

    #[test]
    fn test_destroy_requires_detached() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::default()));
        doc.add(part).unwrap();
        assert_eq!(doc.destroy_part(part).unwrap_err(), DocumentError::NotDetached(part));

        doc.remove(part).unwrap();
        doc.destroy_part(part).unwrap();
        assert!(doc.part(part).is_none());
        assert_eq!(doc.remove(part).unwrap_err(), DocumentError::UnknownPart(part));
    }

    #[test]
    fn test_map_bounds_rescales() {
        let from = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let to = Bounds::new(0.0, 0.0, 20.0, 40.0);
        let mapped = map_bounds(&from, &to, Bounds::new(5.0, 5.0, 5.0, 5.0));
        assert_approx_eq!(f32, mapped.min_x(), 10.0);
        assert_approx_eq!(f32, mapped.min_y(), 20.0);
        assert_approx_eq!(f32, mapped.width(), 10.0);
        assert_approx_eq!(f32, mapped.height(), 20.0);
    }
}

//! Layer collection management and top-level membership.
//!
//! A document always has at least one layer. One layer is the default
//! destination for new parts and one (initially the same) receives links.
//! Within a layer, insertion order is paint order, back to front.

use log::{debug, info};

use vellum_core::{
    capability::Capability,
    change::{Change, LayerChange, LayerCollectionChange},
    identifier::LayerName,
    key::{LayerKey, PartKey},
};

use crate::{Document, DocumentError, Result, layer::Layer};

impl Document {
    pub fn default_layer(&self) -> LayerKey {
        self.default_layer
    }

    pub fn links_layer(&self) -> LayerKey {
        self.links_layer
    }

    pub fn layer(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.key() == key)
    }

    pub(crate) fn layer_mut(&mut self, key: LayerKey) -> Result<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|layer| layer.key() == key)
            .ok_or(DocumentError::UnknownLayer(key))
    }

    /// Layers in paint order, back to front.
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_index(&self, key: LayerKey) -> Option<usize> {
        self.layers.iter().position(|layer| layer.key() == key)
    }

    fn require_layer_index(&self, key: LayerKey) -> Result<usize> {
        self.layer_index(key).ok_or(DocumentError::UnknownLayer(key))
    }

    /// Finds a layer by name.
    pub fn find_layer(&self, name: &str) -> Option<LayerKey> {
        self.layers
            .iter()
            .find(|layer| layer.name() == name)
            .map(Layer::key)
    }

    /// Creates a layer in front of `anchor`, or in front of all layers.
    pub fn create_layer_after(&mut self, anchor: Option<LayerKey>) -> Result<LayerKey> {
        let index = match anchor {
            Some(anchor) => self.require_layer_index(anchor)? + 1,
            None => self.layers.len(),
        };
        self.create_layer_at(index)
    }

    /// Creates a layer behind `anchor`, or behind all layers.
    pub fn create_layer_before(&mut self, anchor: Option<LayerKey>) -> Result<LayerKey> {
        let index = match anchor {
            Some(anchor) => self.require_layer_index(anchor)?,
            None => 0,
        };
        self.create_layer_at(index)
    }

    fn create_layer_at(&mut self, index: usize) -> Result<LayerKey> {
        let key = LayerKey::with_owner(self.owner, self.next_layer_key);
        self.next_layer_key += 1;
        let layer = Layer::new(key, LayerName::numbered(key.get() as usize));
        self.layers.insert(index, layer);
        info!(layer:? = key, index; "Layer created");
        self.raise(Change::LayerCollection(LayerCollectionChange::Inserted {
            layer: key,
            index,
        }))?;
        Ok(key)
    }

    /// Removes a layer after removing its parts.
    ///
    /// The default and links layers are re-pointed when they are removed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::LastLayer`] for the only layer.
    pub fn remove_layer(&mut self, key: LayerKey) -> Result<()> {
        self.require_layer_index(key)?;
        if self.layers.len() == 1 {
            return Err(DocumentError::LastLayer);
        }

        let members: Vec<PartKey> = self
            .layer(key)
            .map(|layer| layer.parts().collect())
            .unwrap_or_default();
        for part in members.into_iter().rev() {
            if self.layer(key).is_some_and(|layer| layer.contains(part)) {
                self.layer_remove(key, part)?;
            }
        }

        if self.default_layer == key {
            let replacement = self
                .layers
                .iter()
                .map(Layer::key)
                .find(|other| *other != key)
                .ok_or(DocumentError::LastLayer)?;
            self.set_default_layer(replacement)?;
        }
        if self.links_layer == key {
            self.set_links_layer(self.default_layer)?;
        }

        let index = self.require_layer_index(key)?;
        self.raise_before(Change::LayerCollection(LayerCollectionChange::Removed {
            layer: key,
            index,
        }))?;
        let layer = self.layers.remove(index);
        self.retired_layers.insert(key, layer);
        info!(layer:? = key, index; "Layer removed");
        self.raise(Change::LayerCollection(LayerCollectionChange::Removed {
            layer: key,
            index,
        }))
    }

    /// Puts a removed layer back at `index`.
    pub(crate) fn restore_layer(&mut self, key: LayerKey, index: usize) -> Result<()> {
        let layer = self
            .retired_layers
            .remove(&key)
            .ok_or(DocumentError::UnknownLayer(key))?;
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        debug!(layer:? = key, index; "Layer restored");
        self.raise(Change::LayerCollection(LayerCollectionChange::Inserted {
            layer: key,
            index,
        }))
    }

    /// Moves `layer` directly in front of `dest`.
    pub fn move_layer_after(&mut self, dest: LayerKey, layer: LayerKey) -> Result<()> {
        let from = self.require_layer_index(layer)?;
        let at = self.require_layer_index(dest)?;
        if dest == layer {
            return Ok(());
        }
        let to = if from < at { at } else { at + 1 };
        self.move_layer_to(layer, to)
    }

    /// Moves `layer` directly behind `dest`.
    pub fn move_layer_before(&mut self, dest: LayerKey, layer: LayerKey) -> Result<()> {
        let from = self.require_layer_index(layer)?;
        let at = self.require_layer_index(dest)?;
        if dest == layer {
            return Ok(());
        }
        let to = if from < at { at - 1 } else { at };
        self.move_layer_to(layer, to)
    }

    pub(crate) fn move_layer_to(&mut self, layer: LayerKey, index: usize) -> Result<()> {
        let old_index = self.require_layer_index(layer)?;
        let new_index = index.min(self.layers.len() - 1);
        if old_index == new_index {
            return Ok(());
        }
        let moved = self.layers.remove(old_index);
        self.layers.insert(new_index, moved);
        self.raise(Change::LayerCollection(LayerCollectionChange::Moved {
            layer,
            old_index,
            new_index,
        }))
    }

    pub fn set_default_layer(&mut self, layer: LayerKey) -> Result<()> {
        self.require_layer_index(layer)?;
        if layer == self.default_layer {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.default_layer, layer);
        self.raise(Change::LayerCollection(LayerCollectionChange::DefaultLayer {
            old,
            new: layer,
        }))
    }

    pub fn set_links_layer(&mut self, layer: LayerKey) -> Result<()> {
        self.require_layer_index(layer)?;
        if layer == self.links_layer {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.links_layer, layer);
        self.raise(Change::LayerCollection(LayerCollectionChange::LinksLayer {
            old,
            new: layer,
        }))
    }

    pub fn set_layer_name(&mut self, layer: LayerKey, name: &str) -> Result<()> {
        let new = LayerName::new(name);
        let target = self.layer_mut(layer)?;
        let old = target.name();
        if old == new {
            return Ok(());
        }
        target.set_name(new);
        self.raise(Change::Layer {
            layer,
            change: LayerChange::Name { old, new },
        })
    }

    /// Sets a layer's gate for `capability`.
    pub fn set_layer_capability(&mut self, layer: LayerKey, capability: Capability, value: bool) -> Result<()> {
        let target = self.layer_mut(layer)?;
        let old = target.gates.get(capability);
        if old == value {
            return Ok(());
        }
        target.gates.set(capability, value);
        self.raise(Change::Layer {
            layer,
            change: LayerChange::Capability {
                capability,
                old,
                new: value,
            },
        })
    }

    // ---- Membership ----

    /// Adds a part to the default layer, or a link to the links layer.
    pub fn add(&mut self, part: PartKey) -> Result<()> {
        let layer = if self.parts.part(part)?.is_link() {
            self.links_layer
        } else {
            self.default_layer
        };
        self.layer_add(layer, part)
    }

    /// Adds a part at the front of `layer`.
    ///
    /// A part already in another layer of this document moves here; a part
    /// already in `layer` is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidOwnership`] for a part inside a group,
    /// and unknown-handle errors for foreign parts or layers.
    pub fn layer_add(&mut self, layer: LayerKey, part: PartKey) -> Result<()> {
        let index = self.require_layer_index(layer)?;
        let target = self.parts.part(part)?;
        if target.parent.is_some() {
            return Err(DocumentError::invalid_ownership(part, "part belongs to a group"));
        }
        let current = target.layer;
        let end = self.layers[index].len();
        match current {
            Some(current) if current == layer => Ok(()),
            Some(_) => self.move_part_to_layer(part, layer, end),
            None => self.layer_insert_at(layer, part, end),
        }
    }

    /// Inserts a detached part into `layer` at `index`.
    pub(crate) fn layer_insert_at(&mut self, layer: LayerKey, part: PartKey, index: usize) -> Result<()> {
        let target = self.parts.part(part)?;
        if target.layer.is_some() || target.parent.is_some() {
            return Err(DocumentError::invalid_ownership(part, "part is already attached"));
        }
        let members = &mut self.layer_mut(layer)?.parts;
        let index = index.min(members.len());
        members.shift_insert(index, part);
        self.parts.part_mut(part)?.layer = Some(layer);
        debug!(part:?, layer:?, index; "Part inserted");
        self.raise(Change::Layer {
            layer,
            change: LayerChange::Inserted { part, index },
        })?;
        self.on_part_attached(part)
    }

    /// Moves a top-level part from its layer into `layer` at `index`.
    pub(crate) fn move_part_to_layer(&mut self, part: PartKey, layer: LayerKey, index: usize) -> Result<()> {
        let old_layer = self
            .parts
            .part(part)?
            .layer
            .ok_or_else(|| DocumentError::invalid_ownership(part, "part is not in a layer"))?;
        let old_index = self
            .layer(old_layer)
            .and_then(|l| l.index_of(part))
            .ok_or(DocumentError::NotTopLevel { part, layer: old_layer })?;
        self.require_layer_index(layer)?;

        self.layer_mut(old_layer)?.parts.shift_remove(&part);
        let members = &mut self.layer_mut(layer)?.parts;
        let new_index = index.min(members.len());
        members.shift_insert(new_index, part);
        self.parts.part_mut(part)?.layer = Some(layer);
        debug!(part:?, old_layer:?, layer:?; "Part moved between layers");
        self.raise(Change::Layer {
            layer,
            change: LayerChange::PartLayer {
                part,
                old_layer,
                old_index,
                new_index,
            },
        })
    }

    /// Detaches a part from whatever owns it.
    ///
    /// Removing an already-detached part does nothing.
    pub fn remove(&mut self, part: PartKey) -> Result<()> {
        let target = self.parts.part(part)?;
        if let Some(layer) = target.layer {
            return self.layer_remove(layer, part);
        }
        if let Some(parent) = target.parent {
            return self.group_remove(parent, part);
        }
        Ok(())
    }

    /// Detaches a top-level part from `layer`.
    ///
    /// The removal record is raised while the part still resolves to the
    /// layer; the layer reference is cleared afterwards.
    pub fn layer_remove(&mut self, layer: LayerKey, part: PartKey) -> Result<()> {
        let index = self
            .layer(layer)
            .ok_or(DocumentError::UnknownLayer(layer))?
            .index_of(part);
        let Some(index) = index else {
            let target = self.parts.part(part)?;
            if target.layer.is_none() && target.parent.is_none() {
                return Ok(());
            }
            return Err(DocumentError::NotTopLevel { part, layer });
        };

        self.layer_mut(layer)?.parts.shift_remove_index(index);
        self.raise(Change::Layer {
            layer,
            change: LayerChange::Removed { part, index },
        })?;
        self.parts.part_mut(part)?.layer = None;
        debug!(part:?, layer:?, index; "Part removed");
        self.on_part_detached(part)
    }

    /// Moves `part` directly behind `dest` in paint order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::SelfReorder`] when `part == dest` and
    /// [`DocumentError::NotTopLevel`] when either is not a member of `layer`.
    ///
    /// # Example
    ///
    /// ```
    /// # use vellum::{Document, part::Part};
    /// # use vellum_core::geometry::Bounds;
    /// let mut doc = Document::new();
    /// let layer = doc.default_layer();
    /// let [a, b, c] = ["a", "b", "c"].map(|_| doc.create_part(Part::new(Bounds::default())));
    /// for part in [a, b, c] {
    ///     doc.add(part).unwrap();
    /// }
    /// doc.move_before(layer, c, a).unwrap();
    /// let order: Vec<_> = doc.layer(layer).unwrap().parts().collect();
    /// assert_eq!(order, vec![b, a, c]);
    /// ```
    pub fn move_before(&mut self, layer: LayerKey, dest: PartKey, part: PartKey) -> Result<()> {
        let (from, at) = self.reorder_indices(layer, dest, part)?;
        let to = if from < at { at - 1 } else { at };
        self.layer_move_to(layer, part, to)
    }

    /// Moves `part` directly in front of `dest` in paint order.
    pub fn move_after(&mut self, layer: LayerKey, dest: PartKey, part: PartKey) -> Result<()> {
        let (from, at) = self.reorder_indices(layer, dest, part)?;
        let to = if from < at { at } else { at + 1 };
        self.layer_move_to(layer, part, to)
    }

    /// Moves `part` to the front of its layer.
    pub fn bring_to_front(&mut self, part: PartKey) -> Result<()> {
        let layer = self.top_level_layer(part)?;
        let last = self.layer_mut(layer)?.len().saturating_sub(1);
        self.layer_move_to(layer, part, last)
    }

    /// Moves `part` to the back of its layer.
    pub fn send_to_back(&mut self, part: PartKey) -> Result<()> {
        let layer = self.top_level_layer(part)?;
        self.layer_move_to(layer, part, 0)
    }

    fn top_level_layer(&self, part: PartKey) -> Result<LayerKey> {
        self.parts
            .part(part)?
            .layer
            .ok_or_else(|| DocumentError::invalid_ownership(part, "part is not a top-level layer member"))
    }

    fn reorder_indices(&self, layer: LayerKey, dest: PartKey, part: PartKey) -> Result<(usize, usize)> {
        if dest == part {
            return Err(DocumentError::SelfReorder(part));
        }
        let target = self.layer(layer).ok_or(DocumentError::UnknownLayer(layer))?;
        let from = target
            .index_of(part)
            .ok_or(DocumentError::NotTopLevel { part, layer })?;
        let at = target
            .index_of(dest)
            .ok_or(DocumentError::NotTopLevel { part: dest, layer })?;
        Ok((from, at))
    }

    /// Moves a member to `index`; a part already there is left alone.
    pub(crate) fn layer_move_to(&mut self, layer: LayerKey, part: PartKey, index: usize) -> Result<()> {
        let members = &mut self.layer_mut(layer)?.parts;
        let old_index = members
            .get_index_of(&part)
            .ok_or(DocumentError::NotTopLevel { part, layer })?;
        let new_index = index.min(members.len() - 1);
        if old_index == new_index {
            return Ok(());
        }
        members.move_index(old_index, new_index);
        self.raise(Change::Layer {
            layer,
            change: LayerChange::ZOrder {
                part,
                old_index,
                new_index,
            },
        })
    }

    /// Follow-ups for a part that just became reachable from a layer.
    pub(crate) fn on_part_attached(&mut self, part: PartKey) -> Result<()> {
        if self.maintains_part_id {
            self.register_part_ids(part)?;
        }
        self.invalidate_links_in(part)
    }

    /// Follow-ups for a part that is no longer reachable from a layer.
    ///
    /// Links attached to ports in the subtree are removed as well, except
    /// during undo and redo where those removals replay on their own.
    pub(crate) fn on_part_detached(&mut self, part: PartKey) -> Result<()> {
        let subtree = self.parts.subtree(part);
        if self.maintains_part_id {
            self.unregister_part_ids(&subtree);
        }
        for key in &subtree {
            self.pending_routes.shift_remove(key);
        }
        if self.undoing {
            return Ok(());
        }

        let mut doomed = Vec::new();
        for key in &subtree {
            let Some(port) = self.parts.get(*key).and_then(|p| p.port()) else {
                continue;
            };
            for link in port.links() {
                if !subtree.contains(link) && !doomed.contains(link) && self.parts.is_attached(*link) {
                    doomed.push(*link);
                }
            }
        }
        for link in doomed {
            if self.parts.is_attached(link) {
                debug!(link:?, port_owner:? = part; "Removing link of removed port");
                self.remove(link)?;
            }
        }
        Ok(())
    }
}

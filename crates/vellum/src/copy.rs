//! Copying parts, within a document or from another one.
//!
//! A copy runs in two phases. The first clones every selected part with its
//! descendants and inserts the clones into layers of the same name. The
//! second reconnects copied links to copied ports and runs each clone's
//! [`PartBehavior::copy_delayed`](crate::part::PartBehavior::copy_delayed)
//! hook, once every clone exists.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;

use vellum_core::{
    change::LinkEnd,
    geometry::Point,
    key::PartKey,
};

use crate::{Document, Result, part::Part};

/// Maps each copied source part to its copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyMap {
    copies: IndexMap<PartKey, PartKey>,
}

impl CopyMap {
    /// The copy made of `source`, if it was copied.
    pub fn get(&self, source: PartKey) -> Option<PartKey> {
        self.copies.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// `(source, copy)` pairs in the order the copies were made.
    pub fn iter(&self) -> impl Iterator<Item = (PartKey, PartKey)> + '_ {
        self.copies.iter().map(|(source, copy)| (*source, *copy))
    }
}

/// Settings for a copy operation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CopyOptions {
    offset: Point,
    copyable_only: bool,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displacement applied to every copy.
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    /// Leave out selected parts whose effective copy capability is off.
    pub fn with_copyable_only(mut self, copyable_only: bool) -> Self {
        self.copyable_only = copyable_only;
        self
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn copyable_only(&self) -> bool {
        self.copyable_only
    }
}

/// A source part captured before any clone is inserted.
#[derive(Debug)]
struct Snapshot {
    source: PartKey,
    part: Part,
    children: Vec<PartKey>,
    /// Set for selected parts, which go into a layer themselves.
    root: bool,
    layer: Option<String>,
    ends: Option<(Option<PartKey>, Option<PartKey>)>,
}

impl Document {
    /// Copies `parts` into this document.
    ///
    /// Parts whose ancestor is also selected are copied once, with the
    /// ancestor. A copied link keeps an end attached to an original port
    /// that was not copied.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnknownPart`](crate::DocumentError::UnknownPart)
    /// for a handle this document does not know.
    pub fn copy_from_collection(&mut self, parts: &[PartKey], options: CopyOptions) -> Result<CopyMap> {
        let snapshots = snapshot(self, parts, options)?;
        self.insert_copies(snapshots, true)
    }

    /// Copies `parts` of `source` into this document.
    ///
    /// Link ends pointing at ports that were not copied are left
    /// disconnected.
    pub fn copy_from_document(
        &mut self,
        source: &Document,
        parts: &[PartKey],
        options: CopyOptions,
    ) -> Result<CopyMap> {
        let snapshots = snapshot(source, parts, options)?;
        self.insert_copies(snapshots, false)
    }

    fn insert_copies(&mut self, snapshots: Vec<Snapshot>, same_document: bool) -> Result<CopyMap> {
        let mut map = CopyMap::default();
        let mut structure = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let copy = self.create_part(snapshot.part);
            map.copies.insert(snapshot.source, copy);
            let layer = snapshot.root.then_some(snapshot.layer);
            structure.push((copy, snapshot.children, layer, snapshot.ends));
        }

        for (copy, children, _, _) in &structure {
            for child in children.iter().filter_map(|child| map.get(*child)) {
                self.group_add(*copy, child)?;
            }
        }
        for (copy, _, layer, _) in &structure {
            let Some(name) = layer else {
                continue;
            };
            let layer = name
                .as_deref()
                .and_then(|name| self.find_layer(name))
                .unwrap_or(self.default_layer);
            self.layer_add(layer, *copy)?;
        }

        for (copy, _, _, ends) in &structure {
            let Some((from, to)) = ends else {
                continue;
            };
            let remap = |port: &Option<PartKey>| {
                port.and_then(|port| match map.get(port) {
                    Some(copied) => Some(copied),
                    None if same_document => Some(port),
                    None => None,
                })
            };
            let (from, to) = (remap(from), remap(to));
            self.set_link_port(*copy, LinkEnd::From, from)?;
            self.set_link_port(*copy, LinkEnd::To, to)?;
        }
        for (_, copy) in map.iter() {
            self.with_behavior(copy, |behavior, doc| behavior.copy_delayed(doc, copy, &map))?;
        }

        debug!(copied = map.len(); "Parts copied");
        Ok(map)
    }
}

/// Captures the selected parts and their descendants in pre-order.
fn snapshot(source: &Document, parts: &[PartKey], options: CopyOptions) -> Result<Vec<Snapshot>> {
    let selected: HashSet<PartKey> = parts.iter().copied().collect();
    let mut snapshots = Vec::new();
    let mut seen = HashSet::new();
    for root in parts {
        source.parts.part(*root)?;
        let covered = source
            .parts
            .ancestors(*root)
            .into_iter()
            .skip(1)
            .any(|ancestor| selected.contains(&ancestor));
        if covered || !seen.insert(*root) {
            continue;
        }
        if options.copyable_only && !source.can_copy(*root) {
            continue;
        }

        let layer = source
            .parts
            .layer_of(*root)
            .and_then(|layer| source.layer(layer))
            .map(|layer| layer.name().as_string());
        for key in source.parts.subtree(*root) {
            let original = source.parts.part(key)?;
            let mut part = original.detached_copy();
            part.bounds = part.bounds.translate(options.offset);
            if let Some(link) = part.link.as_mut() {
                for point in &mut link.points {
                    *point = point.add_point(options.offset);
                }
            }
            snapshots.push(Snapshot {
                source: key,
                part,
                children: original.children().to_vec(),
                root: key == *root,
                layer: layer.clone(),
                ends: original.link().map(|link| (link.from_port(), link.to_port())),
            });
        }
    }
    Ok(snapshots)
}

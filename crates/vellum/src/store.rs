//! The per-document part arena.
//!
//! Parts are addressed by [`PartKey`]. Slots are never reused, so a handle to
//! a destroyed part is reported as unknown instead of aliasing a newer part.
//! Removed parts stay in the arena so undo can reattach them. Keys carry the
//! store's owner tag and only resolve in the store that issued them.

use vellum_core::key::{LayerKey, PartKey};

use crate::{DocumentError, Result, part::Part};

#[derive(Debug, Default)]
pub(crate) struct PartStore {
    owner: u32,
    slots: Vec<Option<Part>>,
}

impl PartStore {
    pub fn new(owner: u32) -> Self {
        Self {
            owner,
            slots: Vec::new(),
        }
    }

    pub fn insert(&mut self, part: Part) -> PartKey {
        let key = PartKey::with_owner(self.owner, self.slots.len() as u32);
        self.slots.push(Some(part));
        key
    }

    fn slot(&self, key: PartKey) -> Option<usize> {
        (key.owner() == self.owner).then_some(key.slot() as usize)
    }

    pub fn get(&self, key: PartKey) -> Option<&Part> {
        self.slots.get(self.slot(key)?).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: PartKey) -> Option<&mut Part> {
        let slot = self.slot(key)?;
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn part(&self, key: PartKey) -> Result<&Part> {
        self.get(key).ok_or(DocumentError::UnknownPart(key))
    }

    pub fn part_mut(&mut self, key: PartKey) -> Result<&mut Part> {
        self.get_mut(key).ok_or(DocumentError::UnknownPart(key))
    }

    pub fn contains(&self, key: PartKey) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: PartKey) -> Option<Part> {
        let slot = self.slot(key)?;
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartKey, &Part)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, part)| part.as_ref().map(|p| (PartKey::with_owner(self.owner, slot as u32), p)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// The outermost ancestor of `key`, or `key` itself.
    pub fn top_level(&self, key: PartKey) -> PartKey {
        let mut current = key;
        while let Some(parent) = self.get(current).and_then(|p| p.parent) {
            current = parent;
        }
        current
    }

    /// The layer owning `key` through its top-level ancestor.
    pub fn layer_of(&self, key: PartKey) -> Option<LayerKey> {
        self.get(self.top_level(key)).and_then(|p| p.layer)
    }

    pub fn is_attached(&self, key: PartKey) -> bool {
        self.layer_of(key).is_some()
    }

    /// Returns true if `ancestor` is a strict ancestor of `key`.
    pub fn is_child_of(&self, key: PartKey, ancestor: PartKey) -> bool {
        let mut current = self.get(key).and_then(|p| p.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get(parent).and_then(|p| p.parent);
        }
        false
    }

    /// The chain from `key` up to its top-level ancestor, inclusive.
    pub fn ancestors(&self, key: PartKey) -> Vec<PartKey> {
        let mut chain = vec![key];
        let mut current = key;
        while let Some(parent) = self.get(current).and_then(|p| p.parent) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// The nearest part that contains both `a` and `b`, where a part counts
    /// as containing itself.
    pub fn common_ancestor(&self, a: PartKey, b: PartKey) -> Option<PartKey> {
        let of_b = self.ancestors(b);
        self.ancestors(a).into_iter().find(|key| of_b.contains(key))
    }

    /// `key` and all its descendants in pre-order.
    pub fn subtree(&self, key: PartKey) -> Vec<PartKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let Some(part) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(part.children().iter().rev());
        }
        out
    }
}

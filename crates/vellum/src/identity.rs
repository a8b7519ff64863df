//! Part identifiers.
//!
//! With identifier tracking on, every identifiable part (node, link or port)
//! reachable from a layer holds a unique [`PartId`] and can be found with
//! [`Document::find_part`]. Turning tracking off drops the table; turning it
//! on rebuilds it from the layers.

use log::{info, trace, warn};

use vellum_core::{
    change::{Change, DocumentChange, PartChange},
    key::{PartId, PartKey},
};

use crate::{Document, Result};

impl Document {
    pub fn maintains_part_id(&self) -> bool {
        self.maintains_part_id
    }

    /// Turns identifier tracking on or off.
    pub fn set_maintains_part_id(&mut self, maintains: bool) -> Result<()> {
        if maintains == self.maintains_part_id {
            return Ok(());
        }
        self.maintains_part_id = maintains;
        info!(maintains; "Part identifier tracking changed");
        self.raise(Change::Document(DocumentChange::MaintainsPartId {
            old: !maintains,
            new: maintains,
        }))?;
        self.part_ids.clear();
        if maintains {
            let tops: Vec<PartKey> = self.layers.iter().flat_map(|layer| layer.parts()).collect();
            for top in tops {
                self.register_part_ids(top)?;
            }
        }
        Ok(())
    }

    /// Looks up an attached part by identifier. Always `None` while
    /// tracking is off.
    pub fn find_part(&self, id: PartId) -> Option<PartKey> {
        if !self.maintains_part_id {
            return None;
        }
        self.part_ids.get(&id).copied()
    }

    /// Sets or clears a part's identifier.
    ///
    /// While tracking is on and the part is attached, an identifier already
    /// held by another part is taken over and the previous holder receives a
    /// fresh one.
    pub fn set_part_id(&mut self, key: PartKey, id: Option<PartId>) -> Result<()> {
        let part = self.parts.part_mut(key)?;
        let old = part.id;
        if old == id {
            return Ok(());
        }
        part.id = id;
        self.raise(Change::Part {
            part: key,
            change: PartChange::PartId { old, new: id },
        })?;

        if !self.maintains_part_id || !self.parts.is_attached(key) {
            return Ok(());
        }
        if let Some(old) = old {
            if self.part_ids.get(&old) == Some(&key) {
                self.part_ids.remove(&old);
            }
        }
        match id {
            Some(id) => self.claim_part_id(key, id),
            None => Ok(()),
        }
    }

    /// Gives every identifiable part in `part`'s subtree a table entry.
    pub(crate) fn register_part_ids(&mut self, part: PartKey) -> Result<()> {
        for key in self.parts.subtree(part) {
            let Some(found) = self.parts.get(key) else {
                continue;
            };
            if !found.is_identifiable() {
                continue;
            }
            let id = found.id;
            match id {
                Some(id) => self.claim_part_id(key, id)?,
                None => {
                    let id = self.fresh_part_id();
                    self.set_part_id_untracked(key, Some(id))?;
                    self.part_ids.insert(id, key);
                }
            }
        }
        Ok(())
    }

    /// Records `key` as the holder of `id`, moving any previous holder to a
    /// fresh identifier.
    fn claim_part_id(&mut self, key: PartKey, id: PartId) -> Result<()> {
        let previous = self.part_ids.insert(id, key);
        match previous {
            Some(holder) if holder != key && self.parts.contains(holder) => {
                let fresh = self.fresh_part_id();
                warn!(id:% = id, holder:?, claimant:? = key, fresh:% = fresh; "Resolving part identifier collision");
                self.set_part_id_untracked(holder, Some(fresh))?;
                self.part_ids.insert(fresh, holder);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn set_part_id_untracked(&mut self, key: PartKey, id: Option<PartId>) -> Result<()> {
        let part = self.parts.part_mut(key)?;
        let old = std::mem::replace(&mut part.id, id);
        trace!(part:? = key, id:?; "Part identifier assigned");
        self.raise(Change::Part {
            part: key,
            change: PartChange::PartId { old, new: id },
        })
    }

    pub(crate) fn unregister_part_ids(&mut self, parts: &[PartKey]) {
        for key in parts {
            let Some(id) = self.parts.get(*key).and_then(|p| p.id) else {
                continue;
            };
            if self.part_ids.get(&id) == Some(key) {
                self.part_ids.remove(&id);
            }
        }
    }

    fn fresh_part_id(&mut self) -> PartId {
        loop {
            let id = PartId(self.next_part_id);
            self.next_part_id = self.next_part_id.wrapping_add(1);
            if !self.part_ids.contains_key(&id) {
                return id;
            }
        }
    }
}

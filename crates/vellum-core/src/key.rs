//! Stable handles for parts, layers and viewers.
//!
//! Handles are indices into the owning document's storage, tagged with that
//! document. They carry no lifetime: a handle that outlives its part, or
//! comes from another document, is reported as unknown instead of aliasing
//! another part.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A handle to a part in a document's arena.
///
/// The handle carries the tag of the document that issued it, so a handle
/// from one document never resolves in another. Untagged handles (owner 0)
/// belong to stores built outside a document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartKey {
    owner: u32,
    slot: u32,
}

impl PartKey {
    /// Creates an untagged handle from a raw arena slot.
    pub const fn new(slot: u32) -> Self {
        Self::with_owner(0, slot)
    }

    /// Creates a handle to `slot` in the arena tagged `owner`.
    pub const fn with_owner(owner: u32, slot: u32) -> Self {
        Self { owner, slot }
    }

    /// Returns the tag of the issuing document.
    pub const fn owner(self) -> u32 {
        self.owner
    }

    /// Returns the raw arena slot.
    pub const fn slot(self) -> u32 {
        self.slot
    }
}

impl fmt::Debug for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            0 => write!(f, "PartKey({})", self.slot),
            owner => write!(f, "PartKey({}@{owner})", self.slot),
        }
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot)
    }
}

/// A handle to a layer of a document.
///
/// Layer handles stay valid while the layer moves within the collection.
/// Like [`PartKey`], they carry the issuing document's tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerKey {
    owner: u32,
    raw: u32,
}

impl LayerKey {
    /// Creates an untagged handle from a raw value.
    pub const fn new(raw: u32) -> Self {
        Self::with_owner(0, raw)
    }

    /// Creates a handle issued by the document tagged `owner`.
    pub const fn with_owner(owner: u32, raw: u32) -> Self {
        Self { owner, raw }
    }

    pub const fn owner(self) -> u32 {
        self.owner
    }

    /// Returns the raw value.
    pub const fn get(self) -> u32 {
        self.raw
    }
}

impl fmt::Debug for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            0 => write!(f, "LayerKey({})", self.raw),
            owner => write!(f, "LayerKey({}@{owner})", self.raw),
        }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.raw)
    }
}

/// Identifies a viewer that keeps its own per-layer spatial cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewId(pub u32);

/// The user-visible integer identifier of an identifiable part.
///
/// Assigned by the document while it maintains part identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub u32);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

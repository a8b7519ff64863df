//! Capability flags shared by parts, layers and documents.
//!
//! The same set of flags exists at three grains. A part's own flag says what
//! the part permits; a layer's flag and a document's flag gate every part
//! beneath them. The effective capability is the conjunction of all three.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single boolean capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Visible,
    Printable,
    Selectable,
    Movable,
    Resizable,
    Reshapable,
    Copyable,
    Deletable,
    Editable,
    /// Parts that viewers may snap a drag to.
    DragSnap,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 10] = [
        Capability::Visible,
        Capability::Printable,
        Capability::Selectable,
        Capability::Movable,
        Capability::Resizable,
        Capability::Reshapable,
        Capability::Copyable,
        Capability::Deletable,
        Capability::Editable,
        Capability::DragSnap,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Returns a human-readable name for this capability.
    pub fn name(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Printable => "printable",
            Self::Selectable => "selectable",
            Self::Movable => "movable",
            Self::Resizable => "resizable",
            Self::Reshapable => "reshapable",
            Self::Copyable => "copyable",
            Self::Deletable => "deletable",
            Self::Editable => "editable",
            Self::DragSnap => "drag-snap",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of capability flags.
///
/// The default set enables everything except [`Capability::DragSnap`].
///
/// # Examples
///
/// ```
/// use vellum_core::capability::{Capabilities, Capability};
///
/// let caps = Capabilities::default().with(Capability::Movable, false);
/// assert!(caps.get(Capability::Visible));
/// assert!(!caps.get(Capability::Movable));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities(u16);

impl Capabilities {
    /// A set with every flag cleared.
    pub const NONE: Capabilities = Capabilities(0);

    /// A set with every flag set; the default for layer and document gates.
    pub fn all() -> Self {
        Capability::ALL
            .into_iter()
            .fold(Self::NONE, |caps, cap| caps.with(cap, true))
    }

    /// Returns whether `capability` is set.
    pub fn get(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Sets or clears `capability`.
    pub fn set(&mut self, capability: Capability, value: bool) {
        if value {
            self.0 |= capability.bit();
        } else {
            self.0 &= !capability.bit();
        }
    }

    /// Returns a copy with `capability` set to `value`.
    pub fn with(mut self, capability: Capability, value: bool) -> Self {
        self.set(capability, value);
        self
    }

    /// Iterates over the capabilities that are set.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |cap| self.get(*cap))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capability::ALL
            .into_iter()
            .filter(|cap| *cap != Capability::DragSnap)
            .fold(Self::NONE, |caps, cap| caps.with(cap, true))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_all_but_drag_snap() {
        let caps = Capabilities::default();
        for cap in Capability::ALL {
            assert_eq!(caps.get(cap), cap != Capability::DragSnap, "{cap}");
        }
    }

    #[test]
    fn test_set_and_clear() {
        let mut caps = Capabilities::NONE;
        caps.set(Capability::Movable, true);
        assert!(caps.get(Capability::Movable));
        assert!(!caps.get(Capability::Visible));

        caps.set(Capability::Movable, false);
        assert_eq!(caps, Capabilities::NONE);
    }

    #[test]
    fn test_flags_are_independent() {
        // Hiding does not clear printability.
        let caps = Capabilities::default().with(Capability::Visible, false);
        assert!(caps.get(Capability::Printable));
    }

    #[test]
    fn test_all() {
        assert!(Capability::ALL.into_iter().all(|cap| Capabilities::all().get(cap)));
    }

    #[test]
    fn test_iter() {
        let caps = Capabilities::NONE
            .with(Capability::Editable, true)
            .with(Capability::Visible, true);
        let set: Vec<_> = caps.iter().collect();
        assert_eq!(set, vec![Capability::Visible, Capability::Editable]);
    }
}

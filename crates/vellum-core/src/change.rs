//! Change records: typed descriptions of single observable mutations.
//!
//! Every mutation of a document, its layer collection, a layer or a part
//! produces one [`ChangeRecord`]. Records feed three consumers, in order:
//! the document's own derived-state updater, registered listeners, and an
//! external undo manager.
//!
//! # Overview
//!
//! - [`ChangeRecord`] - a [`Change`] plus the [`Phase`] it was raised in
//! - [`Change`] - the sum type over every change category
//! - [`DocumentChange`], [`LayerCollectionChange`], [`LayerChange`],
//!   [`PartChange`] - per-category payloads carrying old and new values
//! - [`CustomChange`] - application-defined changes with a private hint
//!
//! # Integer Vocabulary
//!
//! Collaborators that still think in hint/subhint integers can use
//! [`Change::hint`] and [`Change::subhint`]. The built-in categories occupy
//! the reserved ranges in [`hint`]; custom hints must be greater than
//! [`hint::LAST_RESERVED_HINT`].

use crate::{
    capability::Capability,
    geometry::{Bounds, Point, Size},
    identifier::LayerName,
    key::{LayerKey, PartId, PartKey},
    policy::ValidCycle,
};

/// Reserved hint categories.
pub mod hint {
    /// Document properties.
    pub const DOCUMENT: u32 = 100;
    /// Layer collection events.
    pub const LAYER_COLLECTION: u32 = 200;
    /// Events on a single layer.
    pub const LAYER: u32 = 300;
    /// Transaction boundaries.
    pub const TRANSACTION: u32 = 400;
    /// Part properties.
    pub const PART: u32 = 1000;
    /// Highest hint reserved for built-in changes.
    pub const LAST_RESERVED_HINT: u32 = 9999;
}

/// When a record is raised relative to its mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Raised before the mutation, for consumers that need to capture
    /// state that is expensive to pass by value.
    Before,
    /// Raised after the mutation; the standard notification.
    After,
}

/// Which end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkEnd {
    From,
    To,
}

/// A change to a document-level property.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    TopLeft { old: Point, new: Point },
    Size { old: Size, new: Size },
    FixedSize { old: bool, new: bool },
    Capability { capability: Capability, old: bool, new: bool },
    MaintainsPartId { old: bool, new: bool },
    ValidCycle { old: ValidCycle, new: ValidCycle },
    Name { old: String, new: String },
}

/// A change to the document's layer collection.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerCollectionChange {
    Inserted { layer: LayerKey, index: usize },
    Removed { layer: LayerKey, index: usize },
    Moved { layer: LayerKey, old_index: usize, new_index: usize },
    DefaultLayer { old: LayerKey, new: LayerKey },
    LinksLayer { old: LayerKey, new: LayerKey },
}

/// A change within a single layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerChange {
    /// A detached part became a top-level member at `index`.
    Inserted { part: PartKey, index: usize },
    /// A top-level member at `index` was detached.
    Removed { part: PartKey, index: usize },
    /// A top-level member moved within the paint order.
    ZOrder { part: PartKey, old_index: usize, new_index: usize },
    /// A top-level member moved here from `old_layer`. Recorded on the
    /// destination layer.
    PartLayer { part: PartKey, old_layer: LayerKey, old_index: usize, new_index: usize },
    Capability { capability: Capability, old: bool, new: bool },
    Name { old: LayerName, new: LayerName },
}

/// A change to a single part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartChange {
    Bounds { old: Bounds, new: Bounds },
    Capability { capability: Capability, old: bool, new: bool },
    PartId { old: Option<PartId>, new: Option<PartId> },
    Text { old: String, new: String },
    Avoidable { old: bool, new: bool },
    ChildInserted { child: PartKey, index: usize },
    ChildRemoved { child: PartKey, index: usize },
    ObserverAdded { observer: PartKey },
    ObserverRemoved { observer: PartKey },
    LinkPoints { old: Vec<Point>, new: Vec<Point> },
    LinkPort { end: LinkEnd, old: Option<PartKey>, new: Option<PartKey> },
    Orthogonal { old: bool, new: bool },
    AvoidsNodes { old: bool, new: bool },
}

/// A transaction boundary. Only the outermost of nested transactions is
/// reported.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    Started,
    Finished { name: String },
    Aborted,
}

/// A value carried by a [`CustomChange`].
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Point(Point),
    Bounds(Bounds),
}

/// An application-defined change.
///
/// The document forwards custom changes like any other, but undoing one
/// requires a handler that understands its hint.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomChange {
    pub hint: u32,
    pub subhint: u32,
    pub target: Option<PartKey>,
    pub old: CustomValue,
    pub new: CustomValue,
}

/// The object a change is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Document,
    Layer(LayerKey),
    Part(PartKey),
}

/// Every kind of change a document can raise.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Document(DocumentChange),
    LayerCollection(LayerCollectionChange),
    Layer { layer: LayerKey, change: LayerChange },
    Part { part: PartKey, change: PartChange },
    Transaction(TransactionEvent),
    Custom(CustomChange),
}

impl Change {
    /// Returns the hint category of this change.
    pub fn hint(&self) -> u32 {
        match self {
            Self::Document(_) => hint::DOCUMENT,
            Self::LayerCollection(_) => hint::LAYER_COLLECTION,
            Self::Layer { .. } => hint::LAYER,
            Self::Part { .. } => hint::PART,
            Self::Transaction(_) => hint::TRANSACTION,
            Self::Custom(custom) => custom.hint,
        }
    }

    /// Returns the property or event number within the hint category.
    pub fn subhint(&self) -> u32 {
        match self {
            Self::Document(change) => match change {
                DocumentChange::TopLeft { .. } => 1,
                DocumentChange::Size { .. } => 2,
                DocumentChange::FixedSize { .. } => 3,
                DocumentChange::Capability { capability, .. } => 100 + *capability as u32,
                DocumentChange::MaintainsPartId { .. } => 4,
                DocumentChange::ValidCycle { .. } => 5,
                DocumentChange::Name { .. } => 6,
            },
            Self::LayerCollection(change) => match change {
                LayerCollectionChange::Inserted { .. } => 1,
                LayerCollectionChange::Removed { .. } => 2,
                LayerCollectionChange::Moved { .. } => 3,
                LayerCollectionChange::DefaultLayer { .. } => 4,
                LayerCollectionChange::LinksLayer { .. } => 5,
            },
            Self::Layer { change, .. } => match change {
                LayerChange::Inserted { .. } => 1,
                LayerChange::Removed { .. } => 2,
                LayerChange::ZOrder { .. } => 3,
                LayerChange::PartLayer { .. } => 4,
                LayerChange::Capability { capability, .. } => 100 + *capability as u32,
                LayerChange::Name { .. } => 5,
            },
            Self::Part { change, .. } => match change {
                PartChange::Bounds { .. } => 1,
                PartChange::Capability { capability, .. } => 100 + *capability as u32,
                PartChange::PartId { .. } => 2,
                PartChange::Text { .. } => 3,
                PartChange::Avoidable { .. } => 4,
                PartChange::ChildInserted { .. } => 5,
                PartChange::ChildRemoved { .. } => 6,
                PartChange::ObserverAdded { .. } => 7,
                PartChange::ObserverRemoved { .. } => 8,
                PartChange::LinkPoints { .. } => 9,
                PartChange::LinkPort { .. } => 10,
                PartChange::Orthogonal { .. } => 11,
                PartChange::AvoidsNodes { .. } => 12,
            },
            Self::Transaction(event) => match event {
                TransactionEvent::Started => 1,
                TransactionEvent::Finished { .. } => 2,
                TransactionEvent::Aborted => 3,
            },
            Self::Custom(custom) => custom.subhint,
        }
    }

    /// Returns what the change is about.
    pub fn target(&self) -> Target {
        match self {
            Self::Document(_) | Self::LayerCollection(_) | Self::Transaction(_) => Target::Document,
            Self::Layer { layer, .. } => Target::Layer(*layer),
            Self::Part { part, .. } => Target::Part(*part),
            Self::Custom(custom) => custom.target.map_or(Target::Document, Target::Part),
        }
    }

    /// Returns the part this change is about, if any.
    pub fn part(&self) -> Option<PartKey> {
        match self.target() {
            Target::Part(part) => Some(part),
            _ => None,
        }
    }
}

/// A single observable mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    phase: Phase,
    change: Change,
}

impl ChangeRecord {
    /// Creates a record raised after its mutation.
    pub fn after(change: Change) -> Self {
        Self {
            phase: Phase::After,
            change,
        }
    }

    /// Creates a record raised before its mutation.
    pub fn before(change: Change) -> Self {
        Self {
            phase: Phase::Before,
            change,
        }
    }

    /// Returns the phase the record was raised in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true for the standard after-mutation notification.
    pub fn is_after(&self) -> bool {
        self.phase == Phase::After
    }

    /// Returns the change.
    pub fn change(&self) -> &Change {
        &self.change
    }

    /// Consumes the record and returns the change.
    pub fn into_change(self) -> Change {
        self.change
    }

    /// Shorthand for [`Change::hint`].
    pub fn hint(&self) -> u32 {
        self.change.hint()
    }

    /// Shorthand for [`Change::subhint`].
    pub fn subhint(&self) -> u32 {
        self.change.subhint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_ranges_do_not_overlap() {
        let hints = [
            hint::DOCUMENT,
            hint::LAYER_COLLECTION,
            hint::LAYER,
            hint::TRANSACTION,
            hint::PART,
        ];
        for (i, a) in hints.iter().enumerate() {
            for b in &hints[i + 1..] {
                assert_ne!(a, b);
            }
            assert!(*a <= hint::LAST_RESERVED_HINT);
        }
    }

    #[test]
    fn test_part_change_vocabulary() {
        let change = Change::Part {
            part: PartKey::new(3),
            change: PartChange::Bounds {
                old: Bounds::new(0.0, 0.0, 1.0, 1.0),
                new: Bounds::new(1.0, 1.0, 1.0, 1.0),
            },
        };
        assert_eq!(change.hint(), hint::PART);
        assert_eq!(change.subhint(), 1);
        assert_eq!(change.target(), Target::Part(PartKey::new(3)));
        assert_eq!(change.part(), Some(PartKey::new(3)));
    }

    #[test]
    fn test_capability_subhints_are_distinct() {
        let subhint = |capability| {
            Change::Part {
                part: PartKey::new(0),
                change: PartChange::Capability {
                    capability,
                    old: true,
                    new: false,
                },
            }
            .subhint()
        };
        assert_ne!(subhint(Capability::Movable), subhint(Capability::Visible));
    }

    #[test]
    fn test_custom_change_keeps_its_hint() {
        let change = Change::Custom(CustomChange {
            hint: hint::LAST_RESERVED_HINT + 7,
            subhint: 2,
            target: None,
            old: CustomValue::Int(1),
            new: CustomValue::Int(2),
        });
        assert_eq!(change.hint(), 10_006);
        assert_eq!(change.subhint(), 2);
        assert_eq!(change.target(), Target::Document);
    }

    #[test]
    fn test_record_phase() {
        let record = ChangeRecord::before(Change::Transaction(TransactionEvent::Started));
        assert_eq!(record.phase(), Phase::Before);
        assert!(!record.is_after());
        assert_eq!(record.hint(), hint::TRANSACTION);
    }
}

//! Transactions, undo delegation and replaying change records.
//!
//! The document does not keep an undo history itself. An [`UndoManager`]
//! receives every after-phase record outside undo and redo, groups them by
//! transaction, and later hands them back through
//! [`Document::apply_change`].
//!
//! Transactions nest; only the outermost start, finish or abort reaches the
//! manager and the listeners. Aborting an inner transaction marks the whole
//! transaction for rollback when the outermost one ends.

use std::fmt;

use log::{debug, info};

use vellum_core::{
    change::{
        Change, ChangeRecord, CustomChange, DocumentChange, LayerChange, LayerCollectionChange, PartChange,
        TransactionEvent, hint,
    },
    key::{LayerKey, PartKey},
};

use crate::{Document, DocumentError, Result};

/// Which way a recorded change is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Restore the old value.
    Undo,
    /// Re-apply the new value.
    Redo,
}

impl Direction {
    fn pick<T>(self, old: T, new: T) -> T {
        match self {
            Self::Undo => old,
            Self::Redo => new,
        }
    }
}

/// An external undo/redo history.
///
/// While [`UndoManager::undo`], [`UndoManager::redo`] or
/// [`UndoManager::abort_transaction`] run, the manager is detached from the
/// document and records raised by replaying changes are not fed back to it.
pub trait UndoManager: fmt::Debug {
    /// Receives an after-phase record.
    fn document_changed(&mut self, record: &ChangeRecord);

    /// The outermost transaction started.
    fn start_transaction(&mut self) {}

    /// The outermost transaction finished and should become one undoable
    /// step named `name`.
    fn finish_transaction(&mut self, _name: &str) {}

    /// The outermost transaction was aborted; the manager undoes the
    /// changes it recorded since the transaction started.
    fn abort_transaction(&mut self, doc: &mut Document) -> Result<()>;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    fn undo(&mut self, doc: &mut Document) -> Result<()>;

    fn redo(&mut self, doc: &mut Document) -> Result<()>;
}

/// Replays [`CustomChange`]s, which the document cannot interpret.
pub trait CustomChangeHandler: fmt::Debug {
    fn apply_custom(&mut self, doc: &mut Document, change: &CustomChange, direction: Direction) -> Result<()>;
}

impl Document {
    /// Installs an undo manager, returning the previous one.
    pub fn set_undo_manager(&mut self, manager: Option<Box<dyn UndoManager>>) -> Option<Box<dyn UndoManager>> {
        std::mem::replace(&mut self.undo_manager, manager)
    }

    pub fn undo_manager(&self) -> Option<&dyn UndoManager> {
        self.undo_manager.as_deref()
    }

    pub fn set_custom_change_handler(
        &mut self,
        handler: Option<Box<dyn CustomChangeHandler>>,
    ) -> Option<Box<dyn CustomChangeHandler>> {
        std::mem::replace(&mut self.custom_handler, handler)
    }

    // ---- Transactions ----

    pub fn transaction_level(&self) -> usize {
        self.transaction_level
    }

    /// Opens a (possibly nested) transaction.
    pub fn start_transaction(&mut self) -> Result<()> {
        self.transaction_level += 1;
        if self.transaction_level > 1 {
            debug!(level = self.transaction_level; "Nested transaction started");
            return Ok(());
        }
        self.rollback_requested = false;
        if let Some(manager) = self.undo_manager.as_mut() {
            manager.start_transaction();
        }
        info!("Transaction started");
        self.raise(Change::Transaction(TransactionEvent::Started))
    }

    /// Closes the innermost transaction.
    ///
    /// Returns false if no transaction was open, or if the outermost
    /// transaction was rolled back because an inner one aborted.
    pub fn finish_transaction(&mut self, name: &str) -> Result<bool> {
        if self.transaction_level == 0 {
            return Ok(false);
        }
        self.transaction_level -= 1;
        if self.transaction_level > 0 {
            return Ok(true);
        }
        if self.rollback_requested {
            self.roll_back()?;
            return Ok(false);
        }
        if let Some(manager) = self.undo_manager.as_mut() {
            manager.finish_transaction(name);
        }
        info!(name; "Transaction finished");
        self.raise(Change::Transaction(TransactionEvent::Finished { name: name.to_owned() }))?;
        Ok(true)
    }

    /// Aborts the innermost transaction.
    ///
    /// Aborting the outermost transaction rolls it back immediately; an
    /// inner abort defers the rollback to the outermost finish or abort.
    pub fn abort_transaction(&mut self) -> Result<()> {
        if self.transaction_level == 0 {
            return Ok(());
        }
        self.transaction_level -= 1;
        if self.transaction_level > 0 {
            debug!(level = self.transaction_level; "Nested transaction aborted");
            self.rollback_requested = true;
            return Ok(());
        }
        self.roll_back()
    }

    fn roll_back(&mut self) -> Result<()> {
        self.rollback_requested = false;
        info!("Transaction rolled back");
        let result = self.with_undo_manager(|manager, doc| manager.abort_transaction(doc));
        self.raise(Change::Transaction(TransactionEvent::Aborted))?;
        result.map(|_| ())
    }

    // ---- Undo and redo ----

    pub fn can_undo(&self) -> bool {
        self.undo_manager.as_ref().is_some_and(|m| m.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.undo_manager.as_ref().is_some_and(|m| m.can_redo())
    }

    /// Undoes the manager's last step. Returns false if there was nothing
    /// to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        self.with_undo_manager(|manager, doc| manager.undo(doc))
            .map(|ran| ran.is_some())
    }

    /// Redoes the manager's last undone step. Returns false if there was
    /// nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        self.with_undo_manager(|manager, doc| manager.redo(doc))
            .map(|ran| ran.is_some())
    }

    /// True while the undo manager replays changes.
    pub fn is_undoing(&self) -> bool {
        self.undoing
    }

    /// Runs `f` with the undo manager taken out and replay mode on.
    ///
    /// Returns `None` without calling `f` when no manager is installed.
    fn with_undo_manager<F>(&mut self, f: F) -> Result<Option<()>>
    where
        F: FnOnce(&mut dyn UndoManager, &mut Document) -> Result<()>,
    {
        let Some(mut manager) = self.undo_manager.take() else {
            return Ok(None);
        };
        let was_undoing = std::mem::replace(&mut self.undoing, true);
        let result = f(manager.as_mut(), self);
        self.undoing = was_undoing;
        if self.undo_manager.is_none() {
            self.undo_manager = Some(manager);
        }
        result.map(Some)
    }

    /// Replays one recorded change.
    ///
    /// Before-phase records carry no state to restore and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnknownChangeHint`] for a custom change when
    /// no [`CustomChangeHandler`] is installed, and whatever the replayed
    /// operation returns.
    pub fn apply_change(&mut self, record: &ChangeRecord, direction: Direction) -> Result<()> {
        if !record.is_after() {
            return Ok(());
        }
        match record.change() {
            Change::Document(change) => self.apply_document_change(change, direction),
            Change::LayerCollection(change) => self.apply_layer_collection_change(change, direction),
            Change::Layer { layer, change } => self.apply_layer_change(*layer, change, direction),
            Change::Part { part, change } => self.apply_part_change(*part, change, direction),
            Change::Transaction(_) => Ok(()),
            Change::Custom(custom) => {
                let Some(mut handler) = self.custom_handler.take() else {
                    return Err(DocumentError::UnknownChangeHint(custom.hint));
                };
                let result = handler.apply_custom(self, custom, direction);
                if self.custom_handler.is_none() {
                    self.custom_handler = Some(handler);
                }
                result
            }
        }
    }

    fn apply_document_change(&mut self, change: &DocumentChange, direction: Direction) -> Result<()> {
        match change {
            DocumentChange::TopLeft { old, new } => self.set_top_left(direction.pick(*old, *new)),
            DocumentChange::Size { old, new } => self.set_size(direction.pick(*old, *new)),
            DocumentChange::FixedSize { old, new } => self.set_fixed_size(direction.pick(*old, *new)),
            DocumentChange::Capability { capability, old, new } => {
                self.set_document_capability(*capability, direction.pick(*old, *new))
            }
            DocumentChange::MaintainsPartId { old, new } => self.set_maintains_part_id(direction.pick(*old, *new)),
            DocumentChange::ValidCycle { old, new } => self.set_valid_cycle(direction.pick(*old, *new)),
            DocumentChange::Name { old, new } => self.set_name(direction.pick(old, new).clone()),
        }
    }

    fn apply_layer_collection_change(&mut self, change: &LayerCollectionChange, direction: Direction) -> Result<()> {
        match (change, direction) {
            (LayerCollectionChange::Inserted { layer, .. }, Direction::Undo)
            | (LayerCollectionChange::Removed { layer, .. }, Direction::Redo) => self.remove_layer(*layer),
            (LayerCollectionChange::Inserted { layer, index }, Direction::Redo)
            | (LayerCollectionChange::Removed { layer, index }, Direction::Undo) => self.restore_layer(*layer, *index),
            (
                LayerCollectionChange::Moved {
                    layer,
                    old_index,
                    new_index,
                },
                _,
            ) => self.move_layer_to(*layer, direction.pick(*old_index, *new_index)),
            (LayerCollectionChange::DefaultLayer { old, new }, _) => self.set_default_layer(direction.pick(*old, *new)),
            (LayerCollectionChange::LinksLayer { old, new }, _) => self.set_links_layer(direction.pick(*old, *new)),
        }
    }

    fn apply_layer_change(
        &mut self,
        layer: LayerKey,
        change: &LayerChange,
        direction: Direction,
    ) -> Result<()> {
        match (change, direction) {
            (LayerChange::Inserted { part, .. }, Direction::Undo)
            | (LayerChange::Removed { part, .. }, Direction::Redo) => self.layer_remove(layer, *part),
            (LayerChange::Inserted { part, index }, Direction::Redo)
            | (LayerChange::Removed { part, index }, Direction::Undo) => self.layer_insert_at(layer, *part, *index),
            (
                LayerChange::ZOrder {
                    part,
                    old_index,
                    new_index,
                },
                _,
            ) => self.layer_move_to(layer, *part, direction.pick(*old_index, *new_index)),
            (
                LayerChange::PartLayer {
                    part,
                    old_layer,
                    old_index,
                    new_index,
                },
                _,
            ) => {
                let (target, index) = direction.pick((*old_layer, *old_index), (layer, *new_index));
                self.move_part_to_layer(*part, target, index)
            }
            (LayerChange::Capability { capability, old, new }, _) => {
                self.set_layer_capability(layer, *capability, direction.pick(*old, *new))
            }
            (LayerChange::Name { old, new }, _) => {
                self.set_layer_name(layer, &direction.pick(old, new).as_string())
            }
        }
    }

    fn apply_part_change(
        &mut self,
        part: PartKey,
        change: &PartChange,
        direction: Direction,
    ) -> Result<()> {
        match (change, direction) {
            (PartChange::Bounds { old, new }, _) => self.change_bounds(part, direction.pick(*old, *new), false),
            (PartChange::Capability { capability, old, new }, _) => {
                self.set_part_capability(part, *capability, direction.pick(*old, *new))
            }
            (PartChange::PartId { old, new }, _) => self.set_part_id(part, direction.pick(*old, *new)),
            (PartChange::Text { old, new }, _) => self.set_text(part, direction.pick(old, new).clone()),
            (PartChange::Avoidable { old, new }, _) => self.set_avoidable(part, direction.pick(*old, *new)),
            (PartChange::ChildInserted { child, .. }, Direction::Undo)
            | (PartChange::ChildRemoved { child, .. }, Direction::Redo) => self.group_remove(part, *child),
            (PartChange::ChildInserted { child, index }, Direction::Redo)
            | (PartChange::ChildRemoved { child, index }, Direction::Undo) => {
                self.group_insert_at(part, *child, *index)
            }
            (PartChange::ObserverAdded { observer }, Direction::Undo)
            | (PartChange::ObserverRemoved { observer }, Direction::Redo) => self.remove_observer(part, *observer),
            (PartChange::ObserverAdded { observer }, Direction::Redo)
            | (PartChange::ObserverRemoved { observer }, Direction::Undo) => self.add_observer(part, *observer),
            (PartChange::LinkPoints { old, new }, _) => {
                self.replace_link_points(part, direction.pick(old, new).clone())
            }
            (PartChange::LinkPort { end, old, new }, _) => self.set_link_port(part, *end, direction.pick(*old, *new)),
            (PartChange::Orthogonal { old, new }, _) => self.set_link_orthogonal(part, direction.pick(*old, *new)),
            (PartChange::AvoidsNodes { old, new }, _) => self.set_link_avoids_nodes(part, direction.pick(*old, *new)),
        }
    }

    // ---- Custom changes and update suspension ----

    /// Raises an application-defined change.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::ReservedHint`] if the hint is not above
    /// [`hint::LAST_RESERVED_HINT`].
    pub fn raise_custom_change(&mut self, change: CustomChange) -> Result<()> {
        if change.hint <= hint::LAST_RESERVED_HINT {
            return Err(DocumentError::ReservedHint(change.hint));
        }
        self.raise(Change::Custom(change))
    }

    /// Stops raising change records entirely, including the updates of
    /// derived state. Call [`Document::invalidate_caches`] after resuming.
    pub fn suspend_updates(&mut self) {
        debug!("Updates suspended");
        self.suspends_updates = true;
    }

    pub fn resume_updates(&mut self) {
        debug!("Updates resumed");
        self.suspends_updates = false;
    }

    pub fn suspends_updates(&self) -> bool {
        self.suspends_updates
    }

    /// Drops viewer caches and the position grid, and grows the extent to
    /// cover every visible part.
    pub fn invalidate_caches(&mut self) -> Result<()> {
        for layer in &mut self.layers {
            layer.clear_caches();
        }
        self.position_grid = None;
        match self.compute_bounds() {
            Some(bounds) => self.grow_extent(bounds),
            None => Ok(()),
        }
    }

    /// While set, records are not forwarded to the undo manager.
    pub fn set_skips_undo_manager(&mut self, skips: bool) {
        self.skips_undo_manager = skips;
    }

    pub fn skips_undo_manager(&self) -> bool {
        self.skips_undo_manager
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use vellum_core::{
        change::{CustomValue, Phase},
        geometry::{Bounds, Point},
    };

    use super::*;
    use crate::part::Part;

    /// One undoable step per transaction, or per record outside one.
    #[derive(Debug, Default)]
    struct History {
        open: Option<Vec<ChangeRecord>>,
        done: Vec<Vec<ChangeRecord>>,
        undone: Vec<Vec<ChangeRecord>>,
    }

    impl UndoManager for History {
        fn document_changed(&mut self, record: &ChangeRecord) {
            match self.open.as_mut() {
                Some(open) => open.push(record.clone()),
                None => {
                    self.done.push(vec![record.clone()]);
                    self.undone.clear();
                }
            }
        }

        fn start_transaction(&mut self) {
            self.open = Some(Vec::new());
        }

        fn finish_transaction(&mut self, _name: &str) {
            if let Some(step) = self.open.take().filter(|s| !s.is_empty()) {
                self.done.push(step);
                self.undone.clear();
            }
        }

        fn abort_transaction(&mut self, doc: &mut Document) -> Result<()> {
            let step = self.open.take().unwrap_or_default();
            step.iter().rev().try_for_each(|r| doc.apply_change(r, Direction::Undo))
        }

        fn can_undo(&self) -> bool {
            !self.done.is_empty()
        }

        fn can_redo(&self) -> bool {
            !self.undone.is_empty()
        }

        fn undo(&mut self, doc: &mut Document) -> Result<()> {
            let Some(step) = self.done.pop() else {
                return Ok(());
            };
            step.iter().rev().try_for_each(|r| doc.apply_change(r, Direction::Undo))?;
            self.undone.push(step);
            Ok(())
        }

        fn redo(&mut self, doc: &mut Document) -> Result<()> {
            let Some(step) = self.undone.pop() else {
                return Ok(());
            };
            step.iter().try_for_each(|r| doc.apply_change(r, Direction::Redo))?;
            self.done.push(step);
            Ok(())
        }
    }

    fn with_history() -> Document {
        let mut doc = Document::new();
        doc.set_undo_manager(Some(Box::new(History::default())));
        doc
    }

    fn bounds(doc: &Document, part: PartKey) -> Bounds {
        doc.part(part).unwrap().bounds()
    }

    #[test]
    fn test_undo_redo_bounds() {
        let mut doc = with_history();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc.add(part).unwrap();
        doc.translate(part, Point::new(5.0, 5.0)).unwrap();

        assert!(doc.undo().unwrap());
        assert_eq!(bounds(&doc, part), Bounds::new(0.0, 0.0, 10.0, 10.0));
        assert!(doc.can_redo());
        assert!(doc.redo().unwrap());
        assert_eq!(bounds(&doc, part), Bounds::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_transaction_is_one_step() {
        let mut doc = with_history();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc.start_transaction().unwrap();
        doc.add(part).unwrap();
        doc.translate(part, Point::new(5.0, 0.0)).unwrap();
        doc.translate(part, Point::new(5.0, 0.0)).unwrap();
        assert!(doc.finish_transaction("Move").unwrap());

        assert!(doc.undo().unwrap());
        assert!(!doc.is_attached(part));
        assert_eq!(bounds(&doc, part), Bounds::new(0.0, 0.0, 10.0, 10.0));
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_abort_rolls_back() {
        let mut doc = with_history();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc.add(part).unwrap();

        doc.start_transaction().unwrap();
        doc.translate(part, Point::new(5.0, 0.0)).unwrap();
        doc.abort_transaction().unwrap();
        assert_eq!(bounds(&doc, part), Bounds::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(doc.transaction_level(), 0);
    }

    #[test]
    fn test_inner_abort_rolls_back_outermost() {
        let mut doc = with_history();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc.add(part).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        doc.add_listener(Box::new(move |r: &ChangeRecord| {
            if let Change::Transaction(event) = r.change() {
                sink.borrow_mut().push(event.clone());
            }
        }));

        doc.start_transaction().unwrap();
        doc.translate(part, Point::new(5.0, 0.0)).unwrap();
        doc.start_transaction().unwrap();
        doc.translate(part, Point::new(5.0, 0.0)).unwrap();
        doc.abort_transaction().unwrap();
        assert_eq!(bounds(&doc, part), Bounds::new(10.0, 0.0, 10.0, 10.0));

        assert!(!doc.finish_transaction("Outer").unwrap());
        assert_eq!(bounds(&doc, part), Bounds::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(*log.borrow(), vec![TransactionEvent::Started, TransactionEvent::Aborted]);
    }

    #[test]
    fn test_undo_replay_is_not_recorded() {
        let mut doc = with_history();
        let part = doc.create_part(Part::new(Bounds::default()));
        doc.add(part).unwrap();
        doc.undo().unwrap();
        doc.undo().unwrap();
        assert!(!doc.can_undo());
        assert!(!doc.is_undoing());
        assert!(!doc.undo().unwrap());
    }

    #[derive(Debug, Default)]
    struct Counter(Rc<RefCell<i64>>);

    impl CustomChangeHandler for Counter {
        fn apply_custom(&mut self, _doc: &mut Document, change: &CustomChange, direction: Direction) -> Result<()> {
            if let (CustomValue::Int(old), CustomValue::Int(new)) = (&change.old, &change.new) {
                *self.0.borrow_mut() = direction.pick(*old, *new);
            }
            Ok(())
        }
    }

    fn custom(hint: u32) -> CustomChange {
        CustomChange {
            hint,
            subhint: 1,
            target: None,
            old: CustomValue::Int(1),
            new: CustomValue::Int(2),
        }
    }

    #[test]
    fn test_custom_changes() {
        let mut doc = Document::new();
        assert_eq!(
            doc.raise_custom_change(custom(hint::PART)).unwrap_err(),
            DocumentError::ReservedHint(hint::PART)
        );

        let record = ChangeRecord::after(Change::Custom(custom(20_000)));
        assert_eq!(
            doc.apply_change(&record, Direction::Undo).unwrap_err(),
            DocumentError::UnknownChangeHint(20_000)
        );

        let value = Rc::new(RefCell::new(0));
        doc.set_custom_change_handler(Some(Box::new(Counter(Rc::clone(&value)))));
        doc.apply_change(&record, Direction::Undo).unwrap();
        assert_eq!(*value.borrow(), 1);
        doc.apply_change(&record, Direction::Redo).unwrap();
        assert_eq!(*value.borrow(), 2);
        doc.raise_custom_change(custom(20_000)).unwrap();
    }

    #[test]
    fn test_before_records_are_not_replayed() {
        let mut doc = Document::new();
        let part = doc.create_part(Part::new(Bounds::default()));
        let record = ChangeRecord::before(Change::Part {
            part,
            change: PartChange::Bounds {
                old: Bounds::default(),
                new: Bounds::new(1.0, 1.0, 1.0, 1.0),
            },
        });
        assert_eq!(record.phase(), Phase::Before);
        doc.apply_change(&record, Direction::Redo).unwrap();
        assert_eq!(bounds(&doc, part), Bounds::default());
    }

    #[test]
    fn test_suspended_updates_raise_nothing() {
        let mut doc = Document::new();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        doc.add_listener(Box::new(move |_: &ChangeRecord| *sink.borrow_mut() += 1));

        doc.suspend_updates();
        let part = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 50.0, 50.0)));
        doc.add(part).unwrap();
        doc.resume_updates();
        assert_eq!(*count.borrow(), 0);
        assert_eq!(doc.extent(), Bounds::default());

        doc.invalidate_caches().unwrap();
        assert_eq!(doc.extent(), Bounds::new(0.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn test_layer_removal_undo() {
        let mut doc = with_history();
        let layer = doc.create_layer_after(None).unwrap();
        let part = doc.create_part(Part::new(Bounds::default()));
        doc.layer_add(layer, part).unwrap();
        doc.set_default_layer(layer).unwrap();

        doc.start_transaction().unwrap();
        doc.remove_layer(layer).unwrap();
        doc.finish_transaction("Remove layer").unwrap();
        assert_eq!(doc.layer_count(), 1);

        doc.undo().unwrap();
        assert_eq!(doc.layer_count(), 2);
        assert_eq!(doc.default_layer(), layer);
        assert_eq!(doc.layer_of(part), Some(layer));
    }
}

//! Undo/redo routed to the shared document's history.
//!
//! The canvas is never rewound directly: an undo changes the document and
//! the next reconcile pass brings the canvas along.

use crate::error::SyncResult;
use crate::interaction::InteractionState;
use crate::storage::SharedStorage;

pub struct HistoryBridge;

impl HistoryBridge {
    /// Undo the last local transaction. Refused while a shape is being drawn.
    pub fn undo<S: SharedStorage + ?Sized>(storage: &mut S, state: &InteractionState) -> SyncResult<bool> {
        if state.is_drawing() {
            log::debug!("Undo refused while drawing");
            return Ok(false);
        }
        storage.undo()
    }

    /// Redo the last undone transaction. Refused while a shape is being drawn.
    pub fn redo<S: SharedStorage + ?Sized>(storage: &mut S, state: &InteractionState) -> SyncResult<bool> {
        if state.is_drawing() {
            log::debug!("Redo refused while drawing");
            return Ok(false);
        }
        storage.redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::SharedDocument;
    use crate::interaction::Mode;
    use crate::storage::StorageMutator;
    use crate::testing;
    use kurbo::Point;

    #[test]
    fn test_undo_redo_delegate() {
        let mut doc = SharedDocument::new();
        StorageMutator::new(&mut doc)
            .sync_shape(Some(&testing::rect("r1", 0.0, 0.0, 10.0, 10.0)))
            .expect("sync");
        let state = InteractionState::default();

        assert!(HistoryBridge::undo(&mut doc, &state).expect("undo"));
        assert!(doc.is_empty());
        assert!(HistoryBridge::redo(&mut doc, &state).expect("redo"));
        assert_eq!(doc.len(), 1);
        assert!(!HistoryBridge::redo(&mut doc, &state).expect("redo"));
    }

    #[test]
    fn test_refused_while_drawing() {
        let mut doc = SharedDocument::new();
        StorageMutator::new(&mut doc)
            .sync_shape(Some(&testing::rect("r1", 0.0, 0.0, 10.0, 10.0)))
            .expect("sync");
        let mut state = InteractionState::default();
        let handle = testing::rect("tmp", 0.0, 0.0, 1.0, 1.0).handle();
        state.mode = Mode::Drawing { handle, origin: Point::ZERO };

        assert!(!HistoryBridge::undo(&mut doc, &state).expect("undo"));
        assert!(!HistoryBridge::redo(&mut doc, &state).expect("redo"));
        assert_eq!(doc.len(), 1);
    }
}

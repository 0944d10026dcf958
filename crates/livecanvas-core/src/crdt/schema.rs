//! Loro document schema and operations.

use super::convert::{record_from_loro, record_to_loro};
use crate::error::SyncResult;
use crate::record::ShapeRecord;
use crate::storage::{ChangeOrigin, SharedStorage, StorageChange};
use loro::{ExportMode, LoroDoc, LoroMap, LoroValue, UndoManager, ValueOrContainer, VersionVector};

/// Key for the shape record map in the document.
pub const OBJECTS_KEY: &str = "canvasObjects";

/// A CRDT-backed shared document holding one record per object id.
///
/// Writes are staged on the Loro document and become visible to peers and to
/// the undo history on [`commit`](SharedStorage::commit). Every commit, undo,
/// redo and import queues a [`StorageChange`] for the reconciler.
pub struct SharedDocument {
    doc: LoroDoc,
    undo_manager: UndoManager,
    changes: Vec<StorageChange>,
    staged: bool,
}

impl SharedDocument {
    /// Create a new empty document with default undo settings.
    pub fn new() -> Self {
        Self::with_undo_settings(100, 0)
    }

    /// Create a new empty document.
    ///
    /// `merge_interval_ms` groups commits made within that window into one
    /// undo step; 0 makes every commit its own step.
    pub fn with_undo_settings(max_steps: usize, merge_interval_ms: i64) -> Self {
        Self::from_doc(LoroDoc::new(), max_steps, merge_interval_ms)
    }

    /// Create a document from a snapshot exported by a peer.
    pub fn from_snapshot(bytes: &[u8]) -> SyncResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self::from_doc(doc, 100, 0))
    }

    fn from_doc(doc: LoroDoc, max_steps: usize, merge_interval_ms: i64) -> Self {
        let mut undo_manager = UndoManager::new(&doc);
        undo_manager.set_max_undo_steps(max_steps);
        undo_manager.set_merge_interval(merge_interval_ms);
        Self {
            doc,
            undo_manager,
            changes: Vec::new(),
            staged: false,
        }
    }

    /// Get the underlying LoroDoc.
    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    fn objects(&self) -> LoroMap {
        self.doc.get_map(OBJECTS_KEY)
    }

    /// This replica's peer id.
    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    /// Export the document as a snapshot (full state).
    pub fn export_snapshot(&self) -> Vec<u8> {
        self.doc.export(ExportMode::Snapshot).unwrap_or_default()
    }

    /// Export incremental updates since a version.
    pub fn export_updates(&self, since: &VersionVector) -> Vec<u8> {
        self.doc.export(ExportMode::updates(since)).unwrap_or_default()
    }

    /// Apply updates from a peer. Queues a remote change notification.
    pub fn import(&mut self, bytes: &[u8]) -> SyncResult<()> {
        self.commit();
        self.doc.import(bytes)?;
        self.changes.push(StorageChange::new(ChangeOrigin::Remote));
        Ok(())
    }

    /// Get the current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_manager.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_manager.can_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_manager.undo_count()
    }

    /// Clear undo/redo history.
    pub fn clear_undo_history(&self) {
        self.undo_manager.clear();
    }
}

impl Default for SharedDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStorage for SharedDocument {
    fn read(&self, key: &str) -> Option<ShapeRecord> {
        match self.objects().get(key)? {
            ValueOrContainer::Value(value) => record_from_loro(&value),
            // Records are stored as plain values.
            ValueOrContainer::Container(_) => None,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.objects().get(key).is_some()
    }

    fn write(&mut self, key: &str, record: &ShapeRecord) -> SyncResult<()> {
        self.objects().insert(key, record_to_loro(record))?;
        self.staged = true;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> SyncResult<bool> {
        if !self.contains(key) {
            return Ok(false);
        }
        self.objects().delete(key)?;
        self.staged = true;
        Ok(true)
    }

    fn entries(&self) -> Vec<(String, ShapeRecord)> {
        let LoroValue::Map(map) = self.objects().get_deep_value() else {
            return Vec::new();
        };
        let mut entries: Vec<_> = map
            .iter()
            .filter_map(|(key, value)| match record_from_loro(value) {
                Some(record) => Some((key.clone(), record)),
                None => {
                    log::warn!("Ignoring non-record value stored under {key}");
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn len(&self) -> usize {
        self.objects().len()
    }

    fn commit(&mut self) {
        if !self.staged {
            return;
        }
        self.doc.commit();
        self.staged = false;
        self.changes.push(StorageChange::new(ChangeOrigin::Local));
    }

    fn drain_changes(&mut self) -> Vec<StorageChange> {
        std::mem::take(&mut self.changes)
    }

    fn undo(&mut self) -> SyncResult<bool> {
        self.commit();
        let performed = self.undo_manager.undo()?;
        if performed {
            self.changes.push(StorageChange::new(ChangeOrigin::History));
        }
        Ok(performed)
    }

    fn redo(&mut self) -> SyncResult<bool> {
        self.commit();
        let performed = self.undo_manager.redo()?;
        if performed {
            self.changes.push(StorageChange::new(ChangeOrigin::History));
        }
        Ok(performed)
    }
}

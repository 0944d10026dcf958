//! Upsert, remove and clear against shared storage.

use super::SharedStorage;
use crate::error::{SyncError, SyncResult};
use crate::object::VisualObject;
use crate::record::{ShapeRecord, serialize};

/// Applies canvas edits to shared storage, one committed transaction each.
pub struct StorageMutator<'a, S: SharedStorage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: SharedStorage + ?Sized> StorageMutator<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Write or overwrite the record at its `objectId`.
    pub fn upsert(&mut self, record: &ShapeRecord) -> SyncResult<()> {
        let id = record.object_id().ok_or(SyncError::MissingObjectId)?.to_string();
        self.storage.write(&id, record)?;
        self.storage.commit();
        log::debug!("Committed record {id}");
        Ok(())
    }

    /// Serialize and upsert an object. `None` is a no-op.
    pub fn sync_shape(&mut self, object: Option<&VisualObject>) -> SyncResult<()> {
        let Some(object) = object else {
            return Ok(());
        };
        self.upsert(&serialize(object)?)
    }

    /// Delete the record for `id`. Absent keys are left alone without a
    /// transaction. Returns whether a record was removed.
    pub fn remove(&mut self, id: &str) -> SyncResult<bool> {
        if !self.storage.contains(id) {
            return Ok(false);
        }
        self.storage.delete(id)?;
        self.storage.commit();
        log::debug!("Removed record {id}");
        Ok(true)
    }

    /// Delete every record in one transaction. Returns whether the document
    /// ended up empty.
    pub fn clear_all(&mut self) -> SyncResult<bool> {
        for key in self.storage.keys() {
            self.storage.delete(&key)?;
        }
        self.storage.commit();
        let empty = self.storage.is_empty();
        log::debug!("Cleared shared document (empty: {empty})");
        Ok(empty)
    }
}

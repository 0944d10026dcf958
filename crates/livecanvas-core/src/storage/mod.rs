//! Shared storage abstraction and the mutations the canvas performs on it.

mod mutator;

pub use mutator::StorageMutator;

use crate::error::SyncResult;
use crate::record::ShapeRecord;

/// Where a change to the shared document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A transaction committed by this client.
    Local,
    /// Updates received from a peer.
    Remote,
    /// An undo or redo step.
    History,
}

/// Notification that the shared document changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub origin: ChangeOrigin,
}

impl StorageChange {
    pub fn new(origin: ChangeOrigin) -> Self {
        Self { origin }
    }
}

/// A replicated map of shape records keyed by object id.
///
/// `write` and `delete` stage mutations; `commit` closes them into a single
/// transaction (one history entry, one change notification). Change
/// notifications are polled with `drain_changes`.
pub trait SharedStorage {
    /// Read the record stored under `key`.
    fn read(&self, key: &str) -> Option<ShapeRecord>;

    /// Check whether `key` holds a value.
    fn contains(&self, key: &str) -> bool {
        self.read(key).is_some()
    }

    /// Stage a write of `record` under `key`.
    fn write(&mut self, key: &str, record: &ShapeRecord) -> SyncResult<()>;

    /// Stage a delete. Returns whether the key was present.
    fn delete(&mut self, key: &str) -> SyncResult<bool>;

    /// All records, ordered by key.
    fn entries(&self) -> Vec<(String, ShapeRecord)>;

    /// All keys, ordered.
    fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(key, _)| key).collect()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commit staged mutations as one transaction. No-op if nothing is staged.
    fn commit(&mut self);

    /// Take the pending change notifications.
    fn drain_changes(&mut self) -> Vec<StorageChange>;

    /// Undo this client's last transaction. Returns whether anything was undone.
    fn undo(&mut self) -> SyncResult<bool>;

    /// Redo the last undone transaction. Returns whether anything was redone.
    fn redo(&mut self) -> SyncResult<bool>;
}

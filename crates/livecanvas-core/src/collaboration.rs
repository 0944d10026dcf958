//! A replicated room: the shared document plus peer presence.
//!
//! [`Room`] is the reference collaborator. Every local commit, undo and redo
//! queues the new document updates as an outgoing JSON message; incoming
//! messages are applied with [`Room::handle_message`]. Transport is the
//! host's concern: it ships [`Room::take_outgoing`] to the other peers.

use std::collections::BTreeMap;

use crate::config::SyncConfig;
use crate::crdt::{SharedDocument, VersionVector};
use crate::error::SyncResult;
use crate::presence::{Presence, PresenceChannel, ReactionEvent};
use crate::protocol::{RoomMessage, decode_payload};
use crate::record::ShapeRecord;
use crate::storage::{SharedStorage, StorageChange};

/// Everything a session needs from the outside world besides the canvas.
pub trait Collaborator: SharedStorage + PresenceChannel {}

impl<T: SharedStorage + PresenceChannel + ?Sized> Collaborator for T {}

/// Shared document and presence for one peer.
pub struct Room {
    doc: SharedDocument,
    presence: Presence,
    peers: BTreeMap<u64, Presence>,
    events: Vec<ReactionEvent>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    /// Document version already queued for sending.
    last_sent: VersionVector,
}

impl Room {
    pub fn new() -> Self {
        Self::with_document(SharedDocument::new())
    }

    /// Create a room whose undo history follows `config`.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_document(SharedDocument::with_undo_settings(
            config.undo_max_steps,
            config.undo_merge_interval_ms,
        ))
    }

    /// Create from an existing document (e.g., restored from a snapshot).
    /// Its current state counts as already sent.
    pub fn with_document(doc: SharedDocument) -> Self {
        let last_sent = doc.version();
        Self {
            doc,
            presence: Presence::default(),
            peers: BTreeMap::new(),
            events: Vec::new(),
            outgoing: Vec::new(),
            last_sent,
        }
    }

    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Queue the full document for a peer that just joined.
    pub fn announce(&mut self) {
        let snapshot = self.doc.export_snapshot();
        self.queue(RoomMessage::sync(self.peer_id(), &snapshot));
        self.last_sent = self.doc.version();
        self.queue(RoomMessage::Presence {
            peer_id: self.peer_id(),
            state: self.presence.clone(),
        });
    }

    /// Queue a leave notice.
    pub fn leave(&mut self) {
        self.queue(RoomMessage::Left { peer_id: self.peer_id() });
    }

    /// Apply a message from another peer. Our own echoes are ignored.
    pub fn handle_message(&mut self, json: &str) -> SyncResult<()> {
        let msg = RoomMessage::from_json(json)?;
        if msg.sender() == self.peer_id() {
            return Ok(());
        }

        match msg {
            RoomMessage::Sync { data, .. } => {
                let bytes = decode_payload(&data)?;
                // Staged local writes go out before the import commits them.
                self.commit();
                let up_to_date = self.last_sent == self.doc.version();
                self.doc.import(&bytes)?;
                // Remote ops need not be echoed back.
                if up_to_date {
                    self.last_sent = self.doc.version();
                }
            }
            RoomMessage::Presence { peer_id, state } => {
                self.peers.insert(peer_id, state);
            }
            RoomMessage::Broadcast { event, .. } => self.events.push(event),
            RoomMessage::Left { peer_id } => {
                self.peers.remove(&peer_id);
            }
        }
        Ok(())
    }

    fn queue(&mut self, msg: RoomMessage) {
        match msg.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode room message: {e}"),
        }
    }

    /// Queue whatever changed since the last send.
    fn queue_updates(&mut self) {
        let version = self.doc.version();
        if version == self.last_sent {
            return;
        }
        let updates = self.doc.export_updates(&self.last_sent);
        self.last_sent = version;
        self.queue(RoomMessage::sync(self.peer_id(), &updates));
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStorage for Room {
    fn read(&self, key: &str) -> Option<ShapeRecord> {
        self.doc.read(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.doc.contains(key)
    }

    fn write(&mut self, key: &str, record: &ShapeRecord) -> SyncResult<()> {
        self.doc.write(key, record)
    }

    fn delete(&mut self, key: &str) -> SyncResult<bool> {
        self.doc.delete(key)
    }

    fn entries(&self) -> Vec<(String, ShapeRecord)> {
        self.doc.entries()
    }

    fn len(&self) -> usize {
        self.doc.len()
    }

    fn commit(&mut self) {
        self.doc.commit();
        self.queue_updates();
    }

    fn drain_changes(&mut self) -> Vec<StorageChange> {
        self.doc.drain_changes()
    }

    fn undo(&mut self) -> SyncResult<bool> {
        let performed = self.doc.undo()?;
        self.queue_updates();
        Ok(performed)
    }

    fn redo(&mut self) -> SyncResult<bool> {
        let performed = self.doc.redo()?;
        self.queue_updates();
        Ok(performed)
    }
}

impl PresenceChannel for Room {
    fn broadcast(&mut self, event: &ReactionEvent) {
        self.queue(RoomMessage::Broadcast {
            peer_id: self.peer_id(),
            event: event.clone(),
        });
    }

    fn drain_events(&mut self) -> Vec<ReactionEvent> {
        std::mem::take(&mut self.events)
    }

    fn my_presence(&self) -> &Presence {
        &self.presence
    }

    fn update_presence(&mut self, presence: Presence) {
        self.presence = presence;
        self.queue(RoomMessage::Presence {
            peer_id: self.peer_id(),
            state: self.presence.clone(),
        });
    }

    fn others(&self) -> Vec<(u64, Presence)> {
        self.peers.iter().map(|(id, p)| (*id, p.clone())).collect()
    }
}

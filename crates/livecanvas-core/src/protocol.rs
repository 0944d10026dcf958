//! JSON messages exchanged between peers of a room.

use crate::error::{SyncError, SyncResult};
use crate::presence::{Presence, ReactionEvent};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomMessage {
    /// Document updates (base64 encoded Loro bytes)
    Sync { from: u64, data: String },
    /// Presence of a peer
    Presence {
        peer_id: u64,
        #[serde(flatten)]
        state: Presence,
    },
    /// Ephemeral event from a peer
    Broadcast { peer_id: u64, event: ReactionEvent },
    /// Peer left the room
    Left { peer_id: u64 },
}

impl RoomMessage {
    pub fn sync(from: u64, bytes: &[u8]) -> Self {
        RoomMessage::Sync {
            from,
            data: STANDARD.encode(bytes),
        }
    }

    /// The peer that sent this message.
    pub fn sender(&self) -> u64 {
        match self {
            RoomMessage::Sync { from, .. } => *from,
            RoomMessage::Presence { peer_id, .. }
            | RoomMessage::Broadcast { peer_id, .. }
            | RoomMessage::Left { peer_id } => *peer_id,
        }
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::Protocol(e.to_string()))
    }
}

/// Decode the payload of a sync message.
pub fn decode_payload(data: &str) -> SyncResult<Vec<u8>> {
    STANDARD
        .decode(data)
        .map_err(|e| SyncError::Protocol(format!("invalid sync payload: {e}")))
}

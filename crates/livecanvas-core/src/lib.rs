//! LiveCanvas Core Library
//!
//! Keeps a local drawing surface and a replicated shared document in
//! agreement: local edits are written as shape records, remote records are
//! reconciled onto the canvas, and cursor presence and reactions are relayed
//! between peers.

pub mod attributes;
pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod crdt;
pub mod error;
pub mod history;
pub mod input;
pub mod interaction;
pub mod object;
pub mod presence;
pub mod protocol;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod shapes;
pub mod storage;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use attributes::{AttributeEdit, AttributeField, AttributeReadout, ElementAttributes};
pub use camera::Camera;
pub use canvas::{Canvas, PointerTarget, RenderSurface};
pub use collaboration::{Collaborator, Room};
pub use config::{EditSuppression, SyncConfig};
pub use crdt::SharedDocument;
pub use error::{SyncError, SyncResult};
pub use history::HistoryBridge;
pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use interaction::{CanvasEvent, Effect, InteractionState, Mode, transition};
pub use object::{ObjectHandle, ObjectId, VisualObject};
pub use presence::{
    CursorMode, CursorPosition, Interval, Presence, PresenceChannel, Reaction, ReactionBroadcaster,
    ReactionEvent,
};
pub use protocol::RoomMessage;
pub use reconcile::{Exemptions, ReconcileReport, Reconciler};
pub use record::{ShapeRecord, assign_id, deserialize, serialize};
pub use session::{ContextMenuItem, HostEvent, Mount, Session, UiRequest};
pub use storage::{ChangeOrigin, SharedStorage, StorageChange, StorageMutator};
pub use tools::Tool;

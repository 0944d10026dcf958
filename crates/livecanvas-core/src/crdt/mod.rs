//! CRDT-backed shared document using Loro.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! └── "canvasObjects": LoroMap<objectId, Map> (one shape record per key)
//! ```
//!
//! Each record is stored as a single map value and replaced wholesale on
//! update, which gives last-writer-wins semantics per key.

mod convert;
mod schema;

pub use convert::{json_to_loro, loro_to_json, record_from_loro, record_to_loro};
pub use schema::{OBJECTS_KEY, SharedDocument};

pub use loro::{ExportMode, VersionVector};

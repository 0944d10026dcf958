//! Session configuration.

use crate::error::SyncResult;
use crate::shapes::{SerializableColor, ShapeStyle};
use crate::tools::Tool;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which readout fields are protected from overwrites while a text object is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditSuppression {
    /// Keep the whole readout as it was when editing began.
    #[default]
    All,
    /// Keep only fontSize, fontFamily and fontWeight.
    FontFields,
    /// Never suppress.
    Off,
}

/// Tunables for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub reaction_emit_interval_ms: u64,
    pub reaction_prune_interval_ms: u64,
    pub reaction_ttl_ms: u64,
    /// Uploaded images are scaled to fit a square of this size.
    pub max_image_size: f64,
    pub default_stroke: SerializableColor,
    pub default_fill: SerializableColor,
    pub default_stroke_width: f64,
    pub default_tool: Tool,
    pub edit_suppression: EditSuppression,
    pub undo_max_steps: usize,
    pub undo_merge_interval_ms: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let accent = SerializableColor::new(0xaa, 0xbb, 0xcc, 0xff);
        Self {
            reaction_emit_interval_ms: 50,
            reaction_prune_interval_ms: 1000,
            reaction_ttl_ms: 4000,
            max_image_size: 200.0,
            default_stroke: accent,
            default_fill: accent,
            default_stroke_width: 2.0,
            default_tool: Tool::Select,
            edit_suppression: EditSuppression::All,
            undo_max_steps: 100,
            undo_merge_interval_ms: 0,
        }
    }
}

impl SyncConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn reaction_emit_interval(&self) -> Duration {
        Duration::from_millis(self.reaction_emit_interval_ms)
    }

    pub fn reaction_prune_interval(&self) -> Duration {
        Duration::from_millis(self.reaction_prune_interval_ms)
    }

    pub fn reaction_ttl(&self) -> Duration {
        Duration::from_millis(self.reaction_ttl_ms)
    }

    /// Style applied to newly drawn shapes.
    pub fn default_style(&self) -> ShapeStyle {
        ShapeStyle {
            stroke_color: self.default_stroke,
            stroke_width: self.default_stroke_width,
            fill_color: Some(self.default_fill),
            opacity: 1.0,
        }
    }
}

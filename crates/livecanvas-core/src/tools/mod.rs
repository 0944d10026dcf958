//! Drawing tools and the default geometry they create.

use crate::shapes::{Ellipse, Freehand, Line, Rectangle, Shape, ShapeKind, ShapeStyle, Text};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default extent of a shape created by a click without a drag.
pub const DEFAULT_SHAPE_SIZE: f64 = 100.0;

/// Placeholder content of a new text object.
pub const DEFAULT_TEXT: &str = "Tap to Type";

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Rectangle,
    #[serde(rename = "circle", alias = "ellipse")]
    Ellipse,
    Line,
    #[serde(rename = "freeform")]
    Freehand,
    Text,
    Image,
    Delete,
    Reset,
}

impl Tool {
    /// Name used by the host toolbar.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Rectangle => "rectangle",
            Tool::Ellipse => "circle",
            Tool::Line => "line",
            Tool::Freehand => "freeform",
            Tool::Text => "text",
            Tool::Image => "image",
            Tool::Delete => "delete",
            Tool::Reset => "reset",
        }
    }

    /// The kind of shape this tool draws, if it draws one.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            Tool::Line => Some(ShapeKind::Line),
            Tool::Freehand => Some(ShapeKind::Freehand),
            Tool::Text => Some(ShapeKind::Text),
            Tool::Select | Tool::Image | Tool::Delete | Tool::Reset => None,
        }
    }

    pub fn is_drawing_tool(self) -> bool {
        self.shape_kind().is_some()
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for unrecognized tool names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(Tool::Select),
            "rectangle" => Ok(Tool::Rectangle),
            "circle" | "ellipse" => Ok(Tool::Ellipse),
            "line" => Ok(Tool::Line),
            "freeform" | "freehand" => Ok(Tool::Freehand),
            "text" => Ok(Tool::Text),
            "image" => Ok(Tool::Image),
            "delete" => Ok(Tool::Delete),
            "reset" => Ok(Tool::Reset),
            other => Err(UnknownTool(other.to_string())),
        }
    }
}

/// Create the default shape for `tool` at `origin`. Non-drawing tools yield `None`.
pub fn create_shape(tool: Tool, origin: Point, style: &ShapeStyle) -> Option<Shape> {
    let size = Vec2::new(DEFAULT_SHAPE_SIZE, DEFAULT_SHAPE_SIZE);
    let mut shape = match tool {
        Tool::Rectangle => Shape::Rectangle(Rectangle::new(origin, size.x, size.y)),
        Tool::Ellipse => Shape::Ellipse(Ellipse::from_rect(Rect::from_origin_size(origin, size.to_size()))),
        Tool::Line => Shape::Line(Line::new(origin, origin + size)),
        Tool::Freehand => Shape::Freehand(Freehand::from_points(vec![origin])),
        Tool::Text => Shape::Text(Text::new(origin, DEFAULT_TEXT.to_string())),
        Tool::Select | Tool::Image | Tool::Delete | Tool::Reset => return None,
    };
    *shape.style_mut() = style.clone();
    if let Shape::Line(line) = &mut shape {
        // Lines have no interior.
        line.style.fill_color = None;
    }
    if let Shape::Freehand(freehand) = &mut shape {
        freehand.style.fill_color = None;
    }
    Some(shape)
}

/// Reshape an in-progress shape for a drag from `origin` to `current`.
pub fn reshape(shape: &mut Shape, origin: Point, current: Point) {
    match shape {
        Shape::Rectangle(rect) => rect.set_corners(origin, current),
        Shape::Ellipse(ellipse) => ellipse.set_rect(Rect::from_points(origin, current)),
        Shape::Line(line) => {
            line.start = origin;
            line.end = current;
        }
        Shape::Freehand(freehand) => freehand.add_point(current),
        // Text and images are placed, not dragged out.
        Shape::Text(_) | Shape::Image(_) => {}
    }
}

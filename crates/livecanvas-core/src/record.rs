//! Conversion between canvas objects and shape records.
//!
//! A [`ShapeRecord`] is the JSON attribute bag stored in the shared document
//! under its `objectId`. Records are replaced wholesale on every change, so
//! the conversion here must be deterministic: serializing a deserialized
//! record yields the same record.

use crate::error::{SyncError, SyncResult};
use crate::object::{ObjectId, VisualObject};
use crate::shapes::{
    Ellipse, Freehand, Image, ImageFormat, Line, Rectangle, SerializableColor, Shape, ShapeKind,
    ShapeStyle, Text,
};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Common keys
pub const KEY_OBJECT_ID: &str = "objectId";
pub const KEY_TYPE: &str = "type";
const KEY_LEFT: &str = "left";
const KEY_TOP: &str = "top";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_ROTATION: &str = "rotation";
const KEY_SCALE_X: &str = "scaleX";
const KEY_SCALE_Y: &str = "scaleY";

// Style keys
const KEY_FILL: &str = "fill";
const KEY_STROKE: &str = "stroke";
const KEY_STROKE_WIDTH: &str = "strokeWidth";
const KEY_OPACITY: &str = "opacity";

// Rectangle keys
const KEY_CORNER_RADIUS: &str = "cornerRadius";

// Ellipse keys
const KEY_RX: &str = "rx";
const KEY_RY: &str = "ry";

// Line keys
const KEY_X1: &str = "x1";
const KEY_Y1: &str = "y1";
const KEY_X2: &str = "x2";
const KEY_Y2: &str = "y2";

// Path keys
const KEY_POINTS: &str = "points";

// Text keys
pub const KEY_TEXT: &str = "text";
pub const KEY_FONT_SIZE: &str = "fontSize";
pub const KEY_FONT_FAMILY: &str = "fontFamily";
pub const KEY_FONT_WEIGHT: &str = "fontWeight";

// Image keys
const KEY_SRC: &str = "src";
const KEY_FORMAT: &str = "format";
const KEY_SOURCE_WIDTH: &str = "sourceWidth";
const KEY_SOURCE_HEIGHT: &str = "sourceHeight";

/// Serialized form of a canvas object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeRecord(Map<String, Value>);

impl ShapeRecord {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build a record from an arbitrary JSON value. Only objects are records.
    pub fn from_value(value: Value) -> SyncResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SyncError::MalformedRecord(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    pub fn object_id(&self) -> Option<&str> {
        self.0.get(KEY_OBJECT_ID).and_then(Value::as_str)
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.0.get(KEY_TYPE).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn get_f64(record: &ShapeRecord, key: &str) -> SyncResult<f64> {
    record
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| SyncError::MalformedRecord(format!("missing or non-numeric `{key}`")))
}

fn get_f64_or(record: &ShapeRecord, key: &str, default: f64) -> f64 {
    record.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn get_u32(record: &ShapeRecord, key: &str) -> SyncResult<u32> {
    record
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| SyncError::MalformedRecord(format!("missing or invalid `{key}`")))
}

fn get_str<'a>(record: &'a ShapeRecord, key: &str) -> SyncResult<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::MalformedRecord(format!("missing or non-string `{key}`")))
}

fn parse_color(key: &str, hex: &str) -> SyncResult<SerializableColor> {
    SerializableColor::from_hex(hex)
        .ok_or_else(|| SyncError::MalformedRecord(format!("invalid color in `{key}`: {hex}")))
}

fn style_to_record(style: &ShapeStyle, map: &mut Map<String, Value>) {
    map.insert(
        KEY_FILL.into(),
        style.fill_color.map_or(Value::Null, |c| Value::String(c.to_hex())),
    );
    map.insert(KEY_STROKE.into(), Value::String(style.stroke_color.to_hex()));
    map.insert(KEY_STROKE_WIDTH.into(), number(style.stroke_width));
    map.insert(KEY_OPACITY.into(), number(style.opacity));
}

fn style_from_record(record: &ShapeRecord) -> SyncResult<ShapeStyle> {
    let defaults = ShapeStyle::default();
    let stroke_color = match record.get(KEY_STROKE) {
        Some(Value::String(hex)) => parse_color(KEY_STROKE, hex)?,
        _ => defaults.stroke_color,
    };
    let fill_color = match record.get(KEY_FILL) {
        Some(Value::String(hex)) => Some(parse_color(KEY_FILL, hex)?),
        _ => None,
    };
    Ok(ShapeStyle {
        stroke_color,
        stroke_width: get_f64_or(record, KEY_STROKE_WIDTH, defaults.stroke_width),
        fill_color,
        opacity: get_f64_or(record, KEY_OPACITY, defaults.opacity),
    })
}

/// Serialize an object into a record.
///
/// Fails with [`SyncError::MissingObjectId`] if no id has been assigned.
pub fn serialize(object: &VisualObject) -> SyncResult<ShapeRecord> {
    let id = object.id().ok_or(SyncError::MissingObjectId)?;
    let shape = &object.shape;
    let bounds = shape.bounds();

    let mut map = Map::new();
    map.insert(KEY_OBJECT_ID.into(), Value::String(id.to_string()));
    map.insert(KEY_TYPE.into(), Value::String(shape.kind().tag().to_string()));
    map.insert(KEY_LEFT.into(), number(bounds.x0));
    map.insert(KEY_TOP.into(), number(bounds.y0));
    map.insert(KEY_WIDTH.into(), number(bounds.width()));
    map.insert(KEY_HEIGHT.into(), number(bounds.height()));
    map.insert(KEY_ROTATION.into(), number(shape.rotation()));
    map.insert(KEY_SCALE_X.into(), number(object.scale.x));
    map.insert(KEY_SCALE_Y.into(), number(object.scale.y));
    style_to_record(shape.style(), &mut map);

    match shape {
        Shape::Rectangle(rect) => {
            map.insert(KEY_WIDTH.into(), number(rect.width));
            map.insert(KEY_HEIGHT.into(), number(rect.height));
            map.insert(KEY_CORNER_RADIUS.into(), number(rect.corner_radius));
        }
        Shape::Ellipse(ellipse) => {
            map.insert(KEY_RX.into(), number(ellipse.radius_x));
            map.insert(KEY_RY.into(), number(ellipse.radius_y));
        }
        Shape::Line(line) => {
            map.insert(KEY_X1.into(), number(line.start.x));
            map.insert(KEY_Y1.into(), number(line.start.y));
            map.insert(KEY_X2.into(), number(line.end.x));
            map.insert(KEY_Y2.into(), number(line.end.y));
        }
        Shape::Freehand(freehand) => {
            let points = freehand
                .points
                .iter()
                .map(|p| Value::Array(vec![number(p.x), number(p.y)]))
                .collect();
            map.insert(KEY_POINTS.into(), Value::Array(points));
        }
        Shape::Text(text) => {
            map.insert(KEY_TEXT.into(), Value::String(text.content.clone()));
            map.insert(KEY_FONT_SIZE.into(), number(text.font_size));
            map.insert(KEY_FONT_FAMILY.into(), Value::String(text.font_family.clone()));
            map.insert(KEY_FONT_WEIGHT.into(), Value::String(text.font_weight.clone()));
        }
        Shape::Image(image) => {
            map.insert(KEY_WIDTH.into(), number(image.width));
            map.insert(KEY_HEIGHT.into(), number(image.height));
            map.insert(KEY_SRC.into(), Value::String(image.data_base64.clone()));
            map.insert(KEY_FORMAT.into(), Value::String(image.format.name().to_string()));
            map.insert(KEY_SOURCE_WIDTH.into(), Value::from(image.source_width));
            map.insert(KEY_SOURCE_HEIGHT.into(), Value::from(image.source_height));
        }
    }

    Ok(ShapeRecord(map))
}

/// Reconstruct an object from a record. The result gets a fresh handle.
pub fn deserialize(record: &ShapeRecord) -> SyncResult<VisualObject> {
    let id = record.object_id().ok_or(SyncError::MissingObjectId)?;
    let tag = get_str(record, KEY_TYPE)?;
    let kind = ShapeKind::from_tag(tag).ok_or_else(|| SyncError::UnknownShapeKind(tag.to_string()))?;
    let style = style_from_record(record)?;
    let rotation = get_f64_or(record, KEY_ROTATION, 0.0);

    let mut shape = match kind {
        ShapeKind::Rectangle => {
            let mut rect = Rectangle::new(
                Point::new(get_f64(record, KEY_LEFT)?, get_f64(record, KEY_TOP)?),
                get_f64(record, KEY_WIDTH)?,
                get_f64(record, KEY_HEIGHT)?,
            );
            rect.corner_radius = get_f64_or(record, KEY_CORNER_RADIUS, 0.0);
            Shape::Rectangle(rect)
        }
        ShapeKind::Ellipse => {
            let rx = get_f64(record, KEY_RX)?;
            let ry = get_f64(record, KEY_RY)?;
            let center = Point::new(get_f64(record, KEY_LEFT)? + rx, get_f64(record, KEY_TOP)? + ry);
            Shape::Ellipse(Ellipse::new(center, rx, ry))
        }
        ShapeKind::Line => Shape::Line(Line::new(
            Point::new(get_f64(record, KEY_X1)?, get_f64(record, KEY_Y1)?),
            Point::new(get_f64(record, KEY_X2)?, get_f64(record, KEY_Y2)?),
        )),
        ShapeKind::Freehand => {
            let raw = record
                .get(KEY_POINTS)
                .and_then(Value::as_array)
                .ok_or_else(|| SyncError::MalformedRecord(format!("missing `{KEY_POINTS}`")))?;
            let points = raw
                .iter()
                .map(|pair| match pair.as_array().map(Vec::as_slice) {
                    Some([x, y]) => match (x.as_f64(), y.as_f64()) {
                        (Some(x), Some(y)) => Ok(Point::new(x, y)),
                        _ => Err(SyncError::MalformedRecord("non-numeric path point".into())),
                    },
                    _ => Err(SyncError::MalformedRecord("path point is not a pair".into())),
                })
                .collect::<SyncResult<Vec<_>>>()?;
            Shape::Freehand(Freehand::from_points(points))
        }
        ShapeKind::Text => {
            let mut text = Text::new(
                Point::new(get_f64(record, KEY_LEFT)?, get_f64(record, KEY_TOP)?),
                get_str(record, KEY_TEXT)?.to_string(),
            );
            text.font_size = get_f64_or(record, KEY_FONT_SIZE, Text::DEFAULT_FONT_SIZE);
            if let Some(family) = record.get(KEY_FONT_FAMILY).and_then(Value::as_str) {
                text.font_family = family.to_string();
            }
            if let Some(weight) = record.get(KEY_FONT_WEIGHT).and_then(Value::as_str) {
                text.font_weight = weight.to_string();
            }
            Shape::Text(text)
        }
        ShapeKind::Image => {
            let format_name = get_str(record, KEY_FORMAT)?;
            let format = ImageFormat::from_name(format_name).ok_or_else(|| {
                SyncError::MalformedRecord(format!("unsupported image format {format_name}"))
            })?;
            Shape::Image(Image {
                position: Point::new(get_f64(record, KEY_LEFT)?, get_f64(record, KEY_TOP)?),
                width: get_f64(record, KEY_WIDTH)?,
                height: get_f64(record, KEY_HEIGHT)?,
                source_width: get_u32(record, KEY_SOURCE_WIDTH)?,
                source_height: get_u32(record, KEY_SOURCE_HEIGHT)?,
                format,
                data_base64: get_str(record, KEY_SRC)?.to_string(),
                rotation: 0.0,
                style: ShapeStyle::default(),
            })
        }
    };

    *shape.style_mut() = style;
    shape.set_rotation(rotation);

    let mut object = VisualObject::new(shape).with_id(ObjectId::from(id));
    object.scale = Vec2::new(
        get_f64_or(record, KEY_SCALE_X, 1.0),
        get_f64_or(record, KEY_SCALE_Y, 1.0),
    );
    Ok(object)
}

/// Assign a fresh id to an object that has none. Returns the id in effect.
pub fn assign_id(object: &mut VisualObject) -> ObjectId {
    object.ensure_id(ObjectId::generate).clone()
}

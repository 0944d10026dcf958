//! Properties panel readout and validated attribute edits.

use crate::config::EditSuppression;
use crate::error::{SyncError, SyncResult};
use crate::object::{ObjectHandle, VisualObject};
use crate::shapes::SerializableColor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attribute values of the selected object, as shown in the properties panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAttributes {
    pub width: String,
    pub height: String,
    pub font_size: String,
    pub font_family: String,
    pub font_weight: String,
    pub fill: String,
    pub stroke: String,
}

impl ElementAttributes {
    pub fn from_object(object: &VisualObject) -> Self {
        let bounds = object.bounds();
        let style = object.shape.style();
        let text = object.shape.as_text();
        Self {
            width: format_number(bounds.width()),
            height: format_number(bounds.height()),
            font_size: text.map(|t| format_number(t.font_size)).unwrap_or_default(),
            font_family: text.map(|t| t.font_family.clone()).unwrap_or_default(),
            font_weight: text.map(|t| t.font_weight.clone()).unwrap_or_default(),
            fill: style.fill_color.map(|c| c.to_hex()).unwrap_or_default(),
            stroke: style.stroke_color.to_hex(),
        }
    }
}

fn format_number(value: f64) -> String {
    format!("{}", (value * 100.0).round() / 100.0)
}

/// The readout together with the object it describes.
#[derive(Debug, Clone, Default)]
pub struct AttributeReadout {
    current: ElementAttributes,
    subject: Option<ObjectHandle>,
}

impl AttributeReadout {
    pub fn attributes(&self) -> &ElementAttributes {
        &self.current
    }

    pub fn subject(&self) -> Option<ObjectHandle> {
        self.subject
    }

    /// Refresh the readout from `object`.
    ///
    /// While the same text object stays in edit mode, `policy` decides which
    /// fields keep the values captured when editing began.
    pub fn capture(&mut self, object: &VisualObject, editing_text: bool, policy: EditSuppression) {
        let fresh = ElementAttributes::from_object(object);
        let same_subject = self.subject == Some(object.handle());
        if !(editing_text && same_subject) {
            self.current = fresh;
            self.subject = Some(object.handle());
            return;
        }
        match policy {
            EditSuppression::All => {}
            EditSuppression::FontFields => {
                let fonts = (
                    std::mem::take(&mut self.current.font_size),
                    std::mem::take(&mut self.current.font_family),
                    std::mem::take(&mut self.current.font_weight),
                );
                self.current = fresh;
                (self.current.font_size, self.current.font_family, self.current.font_weight) = fonts;
            }
            EditSuppression::Off => self.current = fresh,
        }
    }

    /// Refresh unconditionally, e.g. after an edit made through the panel.
    pub fn force_capture(&mut self, object: &VisualObject) {
        self.current = ElementAttributes::from_object(object);
        self.subject = Some(object.handle());
    }

    pub fn clear(&mut self) {
        self.current = ElementAttributes::default();
        self.subject = None;
    }
}

/// Editable panel fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeField {
    Width,
    Height,
    FontSize,
    FontFamily,
    FontWeight,
    Fill,
    Stroke,
}

impl AttributeField {
    pub fn name(self) -> &'static str {
        match self {
            AttributeField::Width => "width",
            AttributeField::Height => "height",
            AttributeField::FontSize => "fontSize",
            AttributeField::FontFamily => "fontFamily",
            AttributeField::FontWeight => "fontWeight",
            AttributeField::Fill => "fill",
            AttributeField::Stroke => "stroke",
        }
    }
}

impl fmt::Display for AttributeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttributeField {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "width" => Ok(AttributeField::Width),
            "height" => Ok(AttributeField::Height),
            "fontSize" => Ok(AttributeField::FontSize),
            "fontFamily" => Ok(AttributeField::FontFamily),
            "fontWeight" => Ok(AttributeField::FontWeight),
            "fill" => Ok(AttributeField::Fill),
            "stroke" => Ok(AttributeField::Stroke),
            other => Err(SyncError::InvalidAttribute {
                field: other.to_string(),
                value: String::new(),
            }),
        }
    }
}

/// A validated attribute edit.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeEdit {
    Width(f64),
    Height(f64),
    FontSize(f64),
    FontFamily(String),
    /// Numeric CSS weight, `"100"` to `"900"`.
    FontWeight(String),
    /// `None` removes the fill.
    Fill(Option<SerializableColor>),
    Stroke(SerializableColor),
}

impl AttributeEdit {
    /// Validate raw panel input for `field`.
    pub fn parse(field: AttributeField, value: &str) -> SyncResult<Self> {
        let invalid = || SyncError::InvalidAttribute {
            field: field.name().to_string(),
            value: value.to_string(),
        };
        let trimmed = value.trim();
        let positive = || {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(invalid)
        };

        match field {
            AttributeField::Width => Ok(AttributeEdit::Width(positive()?)),
            AttributeField::Height => Ok(AttributeEdit::Height(positive()?)),
            AttributeField::FontSize => Ok(AttributeEdit::FontSize(positive()?)),
            AttributeField::FontFamily => {
                if trimmed.is_empty() {
                    return Err(invalid());
                }
                Ok(AttributeEdit::FontFamily(trimmed.to_string()))
            }
            AttributeField::FontWeight => {
                let weight = match trimmed.to_ascii_lowercase().as_str() {
                    "normal" => 400,
                    "bold" => 700,
                    numeric => numeric.parse::<u16>().map_err(|_| invalid())?,
                };
                if !(100..=900).contains(&weight) || weight % 100 != 0 {
                    return Err(invalid());
                }
                Ok(AttributeEdit::FontWeight(weight.to_string()))
            }
            AttributeField::Fill => match trimmed {
                "" | "transparent" | "none" => Ok(AttributeEdit::Fill(None)),
                hex => SerializableColor::from_hex(hex)
                    .map(|c| AttributeEdit::Fill(Some(c)))
                    .ok_or_else(invalid),
            },
            AttributeField::Stroke => SerializableColor::from_hex(trimmed)
                .map(AttributeEdit::Stroke)
                .ok_or_else(invalid),
        }
    }

    /// Apply to `object`. Returns false when the edit does not apply to it
    /// (font fields on a non-text object, resizing a zero-extent side).
    pub fn apply(&self, object: &mut VisualObject) -> bool {
        match self {
            AttributeEdit::Width(width) => {
                let current = object.bounds().width();
                if current <= 0.0 {
                    return false;
                }
                let scale = kurbo::Vec2::new(object.scale.x * width / current, object.scale.y);
                object.set_scale(scale);
            }
            AttributeEdit::Height(height) => {
                let current = object.bounds().height();
                if current <= 0.0 {
                    return false;
                }
                let scale = kurbo::Vec2::new(object.scale.x, object.scale.y * height / current);
                object.set_scale(scale);
            }
            AttributeEdit::FontSize(size) => {
                let Some(text) = object.shape.as_text_mut() else {
                    return false;
                };
                text.font_size = *size;
                object.touch();
            }
            AttributeEdit::FontFamily(family) => {
                let Some(text) = object.shape.as_text_mut() else {
                    return false;
                };
                text.font_family.clone_from(family);
                object.touch();
            }
            AttributeEdit::FontWeight(weight) => {
                let Some(text) = object.shape.as_text_mut() else {
                    return false;
                };
                text.font_weight.clone_from(weight);
                object.touch();
            }
            AttributeEdit::Fill(fill) => {
                object.shape.style_mut().fill_color = *fill;
                object.touch();
            }
            AttributeEdit::Stroke(stroke) => {
                object.shape.style_mut().stroke_color = *stroke;
                object.touch();
            }
        }
        true
    }
}

//! Shared test fixtures.

use crate::config::SyncConfig;
use crate::object::{ObjectId, VisualObject};
use crate::shapes::{Ellipse, Freehand, Image, ImageFormat, Line, Rectangle, Shape, Text};
use kurbo::Point;
use std::io::Cursor;

/// A committed rectangle with the default style.
pub(crate) fn rect(id: &str, x: f64, y: f64, width: f64, height: f64) -> VisualObject {
    let mut rect = Rectangle::new(Point::new(x, y), width, height);
    rect.style = SyncConfig::default().default_style();
    VisualObject::new(Shape::Rectangle(rect)).with_id(ObjectId::from(id))
}

/// One committed object per shape kind, with binary-exact coordinates.
pub(crate) fn one_of_each_kind() -> Vec<VisualObject> {
    let style = SyncConfig::default().default_style();
    let mut shapes = vec![
        Shape::Rectangle(Rectangle::new(Point::new(10.0, 20.0), 30.0, 40.0)),
        Shape::Ellipse(Ellipse::new(Point::new(50.0, 50.0), 25.0, 12.5)),
        Shape::Line(Line::new(Point::new(0.0, 0.0), Point::new(64.0, 32.0))),
        Shape::Freehand(Freehand::from_points(vec![
            Point::new(1.0, 1.0),
            Point::new(2.5, 4.0),
            Point::new(8.0, 3.0),
        ])),
        Shape::Text(Text::new(Point::new(5.0, 6.0), "Tap to Type".to_string())),
        Shape::Image(
            Image::new(Point::new(0.0, 0.0), &png_bytes(4, 2), 4, 2, ImageFormat::Png)
                .fit_within(200.0, 200.0),
        ),
    ];
    shapes
        .drain(..)
        .enumerate()
        .map(|(i, mut shape)| {
            *shape.style_mut() = style.clone();
            VisualObject::new(shape).with_id(ObjectId::from(format!("obj-{i}")))
        })
        .collect()
}

/// Encode a blank RGBA image of the given size as PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgba8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

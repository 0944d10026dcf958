//! Canvas objects and their identities.
//!
//! Two identities exist side by side: the [`ObjectId`] is the stable,
//! cross-client key stored in the shared document, and the [`ObjectHandle`]
//! is the engine-local instance identity that survives in-place updates but
//! is never serialized.

use crate::shapes::{Shape, ShapeKind};
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Globally unique, immutable identifier of a shape in the shared document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Engine-local instance identity of a canvas object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A renderable primitive owned by the rendering surface.
#[derive(Debug, Clone)]
pub struct VisualObject {
    id: Option<ObjectId>,
    /// Geometry and style.
    pub shape: Shape,
    /// Scale factors applied around the top-left of the shape bounds.
    pub scale: Vec2,
    handle: ObjectHandle,
    revision: u64,
}

impl VisualObject {
    /// Create an object without an id (not yet committed).
    pub fn new(shape: Shape) -> Self {
        Self {
            id: None,
            shape,
            scale: Vec2::new(1.0, 1.0),
            handle: ObjectHandle::next(),
            revision: 0,
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    /// Set the id if none is assigned yet. Returns the id in effect.
    pub(crate) fn ensure_id(&mut self, make: impl FnOnce() -> ObjectId) -> &ObjectId {
        self.id.get_or_insert_with(make)
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Number of in-place modifications since creation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Mark the object as changed.
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Replace attributes with those of `other`, keeping this instance's handle.
    pub fn update_from(&mut self, other: VisualObject) {
        self.id = other.id;
        self.shape = other.shape;
        self.scale = other.scale;
        self.touch();
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.shape.transform(Affine::translate(delta));
        self.touch();
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
        self.touch();
    }

    /// The shape with scale applied.
    pub fn scaled_shape(&self) -> Shape {
        let mut shape = self.shape.clone();
        if self.scale != Vec2::new(1.0, 1.0) {
            let origin = shape.bounds().origin().to_vec2();
            let affine = Affine::translate(origin)
                * Affine::scale_non_uniform(self.scale.x, self.scale.y)
                * Affine::translate(-origin);
            shape.transform(affine);
        }
        shape
    }

    /// Bounds in world coordinates, scale included.
    pub fn bounds(&self) -> Rect {
        self.scaled_shape().bounds()
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.scaled_shape().hit_test(point, tolerance)
    }
}

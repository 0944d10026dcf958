//! Rendering surface contract and the in-memory canvas.

use crate::camera::Camera;
use crate::object::{ObjectHandle, VisualObject};
use crate::shapes::ShapeKind;
use kurbo::{Point, Size};

/// Hit tolerance in world units.
pub const HIT_TOLERANCE: f64 = 4.0;

/// The object under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerTarget {
    pub handle: ObjectHandle,
    pub kind: ShapeKind,
}

/// Capabilities the sync core needs from the rendering engine.
///
/// Objects are owned by the surface and addressed by their engine-local
/// [`ObjectHandle`].
pub trait RenderSurface {
    /// Add an object on top of the z-order.
    fn add_object(&mut self, object: VisualObject) -> ObjectHandle;

    /// Remove an object. Clears the active object if it was the one removed.
    fn remove_object(&mut self, handle: ObjectHandle) -> Option<VisualObject>;

    fn object(&self, handle: ObjectHandle) -> Option<&VisualObject>;

    fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut VisualObject>;

    /// Find the object carrying `id`.
    fn find_by_id(&self, id: &str) -> Option<ObjectHandle>;

    fn active_object(&self) -> Option<ObjectHandle>;

    fn set_active_object(&mut self, handle: Option<ObjectHandle>);

    /// Handles of all objects, back to front.
    fn handles(&self) -> Vec<ObjectHandle>;

    /// Ask for a repaint on the next frame.
    fn request_redraw(&mut self);

    /// Topmost object under a world-space point.
    fn hit_test(&self, point: Point) -> Option<PointerTarget>;

    /// Remove every object.
    fn clear(&mut self);

    fn set_free_drawing(&mut self, enabled: bool);

    fn set_viewport_size(&mut self, size: Size);

    fn screen_to_world(&self, point: Point) -> Point;
}

/// In-memory rendering surface.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    /// Objects in z-order (back to front).
    objects: Vec<VisualObject>,
    active: Option<ObjectHandle>,
    pub camera: Camera,
    free_drawing: bool,
    redraw_requests: usize,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in z-order (back to front).
    pub fn objects(&self) -> impl Iterator<Item = &VisualObject> {
        self.objects.iter()
    }

    /// Ids of all committed objects, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .objects
            .iter()
            .filter_map(|o| o.id().map(|id| id.to_string()))
            .collect();
        ids.sort();
        ids
    }

    pub fn is_free_drawing(&self) -> bool {
        self.free_drawing
    }

    /// Number of redraws requested so far.
    pub fn redraw_requests(&self) -> usize {
        self.redraw_requests
    }

    fn position(&self, handle: ObjectHandle) -> Option<usize> {
        self.objects.iter().position(|o| o.handle() == handle)
    }
}

impl RenderSurface for Canvas {
    fn add_object(&mut self, object: VisualObject) -> ObjectHandle {
        let handle = object.handle();
        self.objects.push(object);
        handle
    }

    fn remove_object(&mut self, handle: ObjectHandle) -> Option<VisualObject> {
        let index = self.position(handle)?;
        if self.active == Some(handle) {
            self.active = None;
        }
        Some(self.objects.remove(index))
    }

    fn object(&self, handle: ObjectHandle) -> Option<&VisualObject> {
        self.objects.iter().find(|o| o.handle() == handle)
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut VisualObject> {
        self.objects.iter_mut().find(|o| o.handle() == handle)
    }

    fn find_by_id(&self, id: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .find(|o| o.id().is_some_and(|oid| oid.as_str() == id))
            .map(VisualObject::handle)
    }

    fn active_object(&self) -> Option<ObjectHandle> {
        self.active
    }

    fn set_active_object(&mut self, handle: Option<ObjectHandle>) {
        self.active = handle.filter(|h| self.position(*h).is_some());
    }

    fn handles(&self) -> Vec<ObjectHandle> {
        self.objects.iter().map(VisualObject::handle).collect()
    }

    fn request_redraw(&mut self) {
        self.redraw_requests += 1;
    }

    fn hit_test(&self, point: Point) -> Option<PointerTarget> {
        let tolerance = HIT_TOLERANCE / self.camera.zoom;
        self.objects
            .iter()
            .rev()
            .find(|o| o.hit_test(point, tolerance))
            .map(|o| PointerTarget {
                handle: o.handle(),
                kind: o.kind(),
            })
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.active = None;
    }

    fn set_free_drawing(&mut self, enabled: bool) {
        self.free_drawing = enabled;
    }

    fn set_viewport_size(&mut self, size: Size) {
        self.camera.resize(size);
    }

    fn screen_to_world(&self, point: Point) -> Point {
        self.camera.screen_to_world(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_add_and_find() {
        let mut canvas = Canvas::new();
        let handle = canvas.add_object(testing::rect("r1", 0.0, 0.0, 10.0, 10.0));
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.find_by_id("r1"), Some(handle));
        assert_eq!(canvas.find_by_id("r2"), None);
        assert_eq!(canvas.ids(), vec!["r1".to_string()]);
    }

    #[test]
    fn test_remove_clears_active() {
        let mut canvas = Canvas::new();
        let handle = canvas.add_object(testing::rect("r1", 0.0, 0.0, 10.0, 10.0));
        canvas.set_active_object(Some(handle));
        assert_eq!(canvas.active_object(), Some(handle));

        assert!(canvas.remove_object(handle).is_some());
        assert_eq!(canvas.active_object(), None);
        assert!(canvas.remove_object(handle).is_none());
    }

    #[test]
    fn test_hit_test_topmost() {
        let mut canvas = Canvas::new();
        canvas.add_object(testing::rect("below", 0.0, 0.0, 100.0, 100.0));
        let top = canvas.add_object(testing::rect("above", 50.0, 50.0, 100.0, 100.0));

        let target = canvas.hit_test(Point::new(75.0, 75.0)).expect("hit");
        assert_eq!(target.handle, top);
        assert_eq!(target.kind, ShapeKind::Rectangle);
        assert!(canvas.hit_test(Point::new(500.0, 500.0)).is_none());
    }

    #[test]
    fn test_set_active_ignores_unknown_handle() {
        let mut canvas = Canvas::new();
        let handle = canvas.add_object(testing::rect("r1", 0.0, 0.0, 10.0, 10.0));
        canvas.remove_object(handle);
        canvas.set_active_object(Some(handle));
        assert_eq!(canvas.active_object(), None);
    }

    #[test]
    fn test_viewport_resize_goes_to_camera() {
        let mut canvas = Canvas::new();
        canvas.set_viewport_size(Size::new(640.0, 480.0));
        assert_eq!(canvas.camera.viewport, Size::new(640.0, 480.0));
        assert_eq!(canvas.screen_to_world(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
    }
}

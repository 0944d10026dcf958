//! The host-facing session: routes input through the state machine and
//! carries out the resulting effects on the canvas and the collaborator.
//!
//! Handlers receive the rendering surface and the collaborator as
//! parameters and never return errors: failures are logged and the session
//! carries on.

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Instant;

use kurbo::{Point, Size};

use crate::attributes::{AttributeEdit, AttributeField, AttributeReadout, ElementAttributes};
use crate::canvas::RenderSurface;
use crate::collaboration::Collaborator;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::history::HistoryBridge;
use crate::input::{KeyEvent, PointerEvent};
use crate::interaction::{CanvasEvent, Effect, InteractionState, TextEdit, transition};
use crate::object::{ObjectHandle, VisualObject};
use crate::presence::{CursorMode, CursorPosition, Presence, ReactionBroadcaster};
use crate::reconcile::{Exemptions, ReconcileReport, Reconciler};
use crate::record::{assign_id, serialize};
use crate::shapes::{Image, ImageFormat, Shape};
use crate::storage::StorageMutator;
use crate::tools::{self, Tool};

/// Requests for the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiRequest {
    OpenFileChooser,
    /// The tool changed on the session's own initiative; update the toolbar.
    ToolChanged(Tool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMenuItem {
    Chat,
    Undo,
    Redo,
    Reactions,
}

pub struct Session {
    config: SyncConfig,
    state: InteractionState,
    readout: AttributeReadout,
    cursor_mode: CursorMode,
    broadcaster: ReactionBroadcaster,
    ui_requests: Vec<UiRequest>,
    /// A remote change to the object under edit is waiting for the edit to end.
    resync_pending: bool,
}

impl Session {
    pub fn new(config: SyncConfig, now: Instant) -> Self {
        let state = InteractionState::new(config.default_tool, config.default_style());
        let broadcaster = ReactionBroadcaster::new(&config, now);
        Self {
            config,
            state,
            readout: AttributeReadout::default(),
            cursor_mode: CursorMode::Hidden,
            broadcaster,
            ui_requests: Vec::new(),
            resync_pending: false,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn tool(&self) -> Tool {
        self.state.tool
    }

    /// Current properties panel readout.
    pub fn attributes(&self) -> &ElementAttributes {
        self.readout.attributes()
    }

    pub fn cursor_mode(&self) -> &CursorMode {
        &self.cursor_mode
    }

    pub fn reactions(&self) -> &ReactionBroadcaster {
        &self.broadcaster
    }

    /// Take the pending UI requests.
    pub fn take_ui_requests(&mut self) -> Vec<UiRequest> {
        std::mem::take(&mut self.ui_requests)
    }

    // --- Host events ---

    /// The toolbar selected a tool.
    pub fn handle_active_element<C: Collaborator + ?Sized>(
        &mut self,
        tool: Tool,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        self.handle_canvas_event(CanvasEvent::ToolSelected(tool), surface, collab);
    }

    pub fn handle_pointer_down<C: Collaborator + ?Sized>(
        &mut self,
        event: &PointerEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        let position = surface.screen_to_world(event.position);
        if let CursorMode::Reaction { is_pressed, .. } = &mut self.cursor_mode {
            *is_pressed = true;
        }
        let target = surface.hit_test(position);
        self.handle_canvas_event(CanvasEvent::PointerDown { position, target }, surface, collab);
    }

    pub fn handle_pointer_move<C: Collaborator + ?Sized>(
        &mut self,
        event: &PointerEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        let position = surface.screen_to_world(event.position);
        if self.cursor_mode != CursorMode::ReactionSelector {
            update_presence(collab, |p| p.cursor = Some(CursorPosition::from(position)));
        }
        self.handle_canvas_event(CanvasEvent::PointerMove { position }, surface, collab);
    }

    pub fn handle_pointer_up<C: Collaborator + ?Sized>(
        &mut self,
        event: &PointerEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        let position = surface.screen_to_world(event.position);
        if let CursorMode::Reaction { is_pressed, .. } = &mut self.cursor_mode {
            *is_pressed = false;
        }
        self.handle_canvas_event(CanvasEvent::PointerUp { position }, surface, collab);
    }

    /// The pointer left the canvas: hide the cursor and its message.
    pub fn handle_pointer_leave<C: Collaborator + ?Sized>(&mut self, collab: &mut C) {
        self.cursor_mode = CursorMode::Hidden;
        update_presence(collab, |p| {
            p.cursor = None;
            p.message = None;
        });
    }

    pub fn handle_key_down<C: Collaborator + ?Sized>(
        &mut self,
        key: &KeyEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        if let CursorMode::Chat { .. } = self.cursor_mode {
            self.compose_chat(key, collab);
            return;
        }
        self.handle_canvas_event(CanvasEvent::KeyDown(key.clone()), surface, collab);
    }

    pub fn handle_key_up<C: Collaborator + ?Sized>(
        &mut self,
        key: &KeyEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        // While composing, only Escape reaches the shortcuts.
        if matches!(self.cursor_mode, CursorMode::Chat { .. }) && !key.is("Escape") {
            return;
        }
        self.handle_canvas_event(CanvasEvent::KeyUp(key.clone()), surface, collab);
    }

    /// Place an uploaded image. Returns whether it was placed.
    pub fn handle_image_upload<C: Collaborator + ?Sized>(
        &mut self,
        bytes: &[u8],
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) -> bool {
        let origin = surface.screen_to_world(Point::ZERO);
        match self.load_image(bytes, origin) {
            Ok(object) => {
                self.handle_canvas_event(CanvasEvent::ImageLoaded(Box::new(object)), surface, collab);
                true
            }
            Err(e) => {
                log::error!("Failed to load uploaded image: {e}");
                false
            }
        }
    }

    fn load_image(&self, bytes: &[u8], origin: Point) -> SyncResult<VisualObject> {
        let format = ImageFormat::from_magic_bytes(bytes)
            .ok_or_else(|| SyncError::MalformedRecord("unsupported image format".to_string()))?;
        let (width, height) =
            image::ImageReader::with_format(Cursor::new(bytes), format.to_decoder_format()).into_dimensions()?;
        let max = self.config.max_image_size;
        let image = Image::new(origin, bytes, width, height, format).fit_within(max, max);
        Ok(VisualObject::new(Shape::Image(image)))
    }

    /// The viewport changed size. Records are never touched.
    pub fn handle_resize(&mut self, size: Size, surface: &mut dyn RenderSurface) {
        surface.set_viewport_size(size);
        surface.request_redraw();
    }

    /// Apply a properties panel edit to the active object. Returns whether
    /// the edit was applied and stored.
    pub fn handle_attribute_edit<C: Collaborator + ?Sized>(
        &mut self,
        field: AttributeField,
        value: &str,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) -> bool {
        let edit = match AttributeEdit::parse(field, value) {
            Ok(edit) => edit,
            Err(e) => {
                log::warn!("Rejected attribute edit: {e}");
                return false;
            }
        };
        let Some(handle) = surface.active_object() else {
            return false;
        };
        let Some(object) = surface.object_mut(handle) else {
            return false;
        };
        if !edit.apply(object) {
            log::debug!("Attribute {field} does not apply to a {}", object.kind().tag());
            return false;
        }
        self.readout.force_capture(object);
        self.commit(handle, surface, collab)
    }

    pub fn handle_context_menu<C: Collaborator + ?Sized>(
        &mut self,
        item: ContextMenuItem,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        let effect = match item {
            ContextMenuItem::Chat => Effect::OpenChat,
            ContextMenuItem::Undo => Effect::Undo,
            ContextMenuItem::Redo => Effect::Redo,
            ContextMenuItem::Reactions => Effect::OpenReactionPicker,
        };
        self.execute(effect, surface, collab);
        self.pump(surface, collab);
    }

    /// A reaction was picked: emit it while the pointer is held.
    pub fn handle_reaction_selected(&mut self, reaction: &str) {
        self.cursor_mode = CursorMode::Reaction {
            reaction: reaction.to_string(),
            is_pressed: false,
        };
    }

    /// Feed an event straight into the state machine (selection, scaling and
    /// text-editing notifications from the host).
    pub fn handle_canvas_event<C: Collaborator + ?Sized>(
        &mut self,
        event: CanvasEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        let (next, effects) = transition(&self.state, event);
        self.state = next;
        for effect in effects {
            self.execute(effect, surface, collab);
        }
        self.pump(surface, collab);
    }

    /// Advance timers: deliver received reactions, emit and expire local ones.
    pub fn tick<C: Collaborator + ?Sized>(&mut self, now: Instant, collab: &mut C) {
        for event in collab.drain_events() {
            self.broadcaster.receive(event, now);
        }
        let cursor = collab.my_presence().cursor;
        self.broadcaster.tick(now, &self.cursor_mode, cursor, collab);
    }

    /// Reconcile the canvas if the document changed since the last pass, or
    /// if an edit that held back a remote change has ended.
    pub fn pump<C: Collaborator + ?Sized>(
        &mut self,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) -> Option<ReconcileReport> {
        let changed = !collab.drain_changes().is_empty();
        let resync = self.resync_pending && !self.state.is_mid_edit();
        if !changed && !resync {
            return None;
        }
        let report = Reconciler::reconcile(&*collab, &mut *surface, Exemptions::from_state(&self.state));
        self.resync_pending = !report.deferred.is_empty();
        for &handle in &report.removed {
            if self.readout.subject() == Some(handle) {
                self.readout.clear();
            }
            let (next, _) = transition(&self.state, CanvasEvent::ObjectRemoved(handle));
            self.state = next;
        }
        Some(report)
    }

    // --- Effects ---

    fn execute<C: Collaborator + ?Sized>(
        &mut self,
        effect: Effect,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) {
        match effect {
            Effect::AddObject(object) => {
                surface.add_object(*object);
            }
            Effect::Reshape { handle, origin, current } => {
                if let Some(object) = surface.object_mut(handle) {
                    tools::reshape(&mut object.shape, origin, current);
                    object.touch();
                }
            }
            Effect::Translate { handle, delta } => {
                if let Some(object) = surface.object_mut(handle) {
                    object.translate(delta);
                }
            }
            Effect::Scale { handle, scale } => {
                if let Some(object) = surface.object_mut(handle) {
                    object.set_scale(scale);
                }
            }
            Effect::EditText { handle, edit } => {
                if let Some(object) = surface.object_mut(handle) {
                    if let Some(text) = object.shape.as_text_mut() {
                        match edit {
                            TextEdit::Insert(c) => text.content.push(c),
                            TextEdit::Backspace => {
                                text.content.pop();
                            }
                        }
                        object.touch();
                    }
                }
            }
            Effect::Commit(handle) => {
                self.commit(handle, surface, collab);
            }
            Effect::Remove(handle) => {
                let Some(object) = surface.remove_object(handle) else {
                    return;
                };
                if self.readout.subject() == Some(handle) {
                    self.readout.clear();
                }
                if let Some(id) = object.id() {
                    if let Err(e) = StorageMutator::new(collab).remove(id.as_str()) {
                        log::error!("Failed to remove {id}: {e}");
                    }
                }
            }
            Effect::DiscardObject(handle) => {
                surface.remove_object(handle);
            }
            Effect::ClearAll => match StorageMutator::new(collab).clear_all() {
                Ok(true) => {
                    surface.clear();
                    self.readout.clear();
                    surface.request_redraw();
                }
                Ok(false) => log::warn!("Shared document not empty after clear; keeping local canvas"),
                Err(e) => log::warn!("Clearing shared document failed, keeping local canvas: {e}"),
            },
            Effect::SetActive(handle) => {
                surface.set_active_object(handle);
                if handle.is_none() {
                    self.readout.clear();
                }
            }
            Effect::CaptureAttributes(handle) => {
                if let Some(object) = surface.object(handle) {
                    let editing_text = self.state.is_editing_text();
                    self.readout.capture(object, editing_text, self.config.edit_suppression);
                }
            }
            Effect::SetFreeDrawing(enabled) => surface.set_free_drawing(enabled),
            Effect::OpenFileChooser => self.ui_requests.push(UiRequest::OpenFileChooser),
            Effect::OpenChat => {
                self.cursor_mode = CursorMode::Chat {
                    previous_message: None,
                    message: String::new(),
                };
            }
            Effect::CloseChat => {
                self.cursor_mode = CursorMode::Hidden;
                update_presence(collab, |p| p.message = None);
            }
            Effect::OpenReactionPicker => self.cursor_mode = CursorMode::ReactionSelector,
            Effect::Undo => {
                if let Err(e) = HistoryBridge::undo(collab, &self.state) {
                    log::error!("Undo failed: {e}");
                }
            }
            Effect::Redo => {
                if let Err(e) = HistoryBridge::redo(collab, &self.state) {
                    log::error!("Redo failed: {e}");
                }
            }
            Effect::ToolChanged(tool) => self.ui_requests.push(UiRequest::ToolChanged(tool)),
        }
    }

    /// Assign an id if needed and upsert. A vanished object is a no-op.
    fn commit<C: Collaborator + ?Sized>(
        &mut self,
        handle: ObjectHandle,
        surface: &mut dyn RenderSurface,
        collab: &mut C,
    ) -> bool {
        let Some(object) = surface.object_mut(handle) else {
            return false;
        };
        assign_id(object);
        let result = serialize(object).and_then(|record| StorageMutator::new(collab).upsert(&record));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to store object: {e}");
                false
            }
        }
    }

    fn compose_chat<C: Collaborator + ?Sized>(&mut self, key: &KeyEvent, collab: &mut C) {
        let CursorMode::Chat { previous_message, message } = &mut self.cursor_mode else {
            return;
        };
        if key.is("Enter") {
            *previous_message = Some(std::mem::take(message));
            return;
        }
        if key.is("Backspace") {
            message.pop();
        } else if let Some(c) = key.printable().filter(|_| !key.modifiers.command()) {
            message.push(c);
        } else {
            return;
        }
        let draft = message.clone();
        update_presence(collab, |p| p.message = Some(draft));
    }
}

fn update_presence<C: Collaborator + ?Sized>(collab: &mut C, change: impl FnOnce(&mut Presence)) {
    let mut presence = collab.my_presence().clone();
    change(&mut presence);
    if &presence != collab.my_presence() {
        collab.update_presence(presence);
    }
}

// --- Host event dispatch ---

/// Events a host delivers to a mounted session.
#[derive(Debug, Clone)]
pub enum HostEvent {
    ActiveElement(Tool),
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    PointerLeave,
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    ImageUpload(Vec<u8>),
    Resize(Size),
    AttributeEdit { field: AttributeField, value: String },
    ContextMenu(ContextMenuItem),
    ReactionSelected(String),
    Canvas(CanvasEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    ActiveElement,
    PointerDown,
    PointerMove,
    PointerUp,
    PointerLeave,
    KeyDown,
    KeyUp,
    ImageUpload,
    Resize,
    AttributeEdit,
    ContextMenu,
    ReactionSelected,
    Canvas,
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::ActiveElement(_) => HostEventKind::ActiveElement,
            HostEvent::PointerDown(_) => HostEventKind::PointerDown,
            HostEvent::PointerMove(_) => HostEventKind::PointerMove,
            HostEvent::PointerUp(_) => HostEventKind::PointerUp,
            HostEvent::PointerLeave => HostEventKind::PointerLeave,
            HostEvent::KeyDown(_) => HostEventKind::KeyDown,
            HostEvent::KeyUp(_) => HostEventKind::KeyUp,
            HostEvent::ImageUpload(_) => HostEventKind::ImageUpload,
            HostEvent::Resize(_) => HostEventKind::Resize,
            HostEvent::AttributeEdit { .. } => HostEventKind::AttributeEdit,
            HostEvent::ContextMenu(_) => HostEventKind::ContextMenu,
            HostEvent::ReactionSelected(_) => HostEventKind::ReactionSelected,
            HostEvent::Canvas(_) => HostEventKind::Canvas,
        }
    }
}

type Handler = fn(&mut Session, HostEvent, &mut dyn RenderSurface, &mut dyn Collaborator);

fn handlers() -> [(HostEventKind, Handler); 13] {
    [
        (HostEventKind::ActiveElement, |s, e, r, c| {
            if let HostEvent::ActiveElement(tool) = e {
                s.handle_active_element(tool, r, c);
            }
        }),
        (HostEventKind::PointerDown, |s, e, r, c| {
            if let HostEvent::PointerDown(p) = e {
                s.handle_pointer_down(&p, r, c);
            }
        }),
        (HostEventKind::PointerMove, |s, e, r, c| {
            if let HostEvent::PointerMove(p) = e {
                s.handle_pointer_move(&p, r, c);
            }
        }),
        (HostEventKind::PointerUp, |s, e, r, c| {
            if let HostEvent::PointerUp(p) = e {
                s.handle_pointer_up(&p, r, c);
            }
        }),
        (HostEventKind::PointerLeave, |s, _, _, c| s.handle_pointer_leave(c)),
        (HostEventKind::KeyDown, |s, e, r, c| {
            if let HostEvent::KeyDown(k) = e {
                s.handle_key_down(&k, r, c);
            }
        }),
        (HostEventKind::KeyUp, |s, e, r, c| {
            if let HostEvent::KeyUp(k) = e {
                s.handle_key_up(&k, r, c);
            }
        }),
        (HostEventKind::ImageUpload, |s, e, r, c| {
            if let HostEvent::ImageUpload(bytes) = e {
                s.handle_image_upload(&bytes, r, c);
            }
        }),
        (HostEventKind::Resize, |s, e, r, _| {
            if let HostEvent::Resize(size) = e {
                s.handle_resize(size, r);
            }
        }),
        (HostEventKind::AttributeEdit, |s, e, r, c| {
            if let HostEvent::AttributeEdit { field, value } = e {
                s.handle_attribute_edit(field, &value, r, c);
            }
        }),
        (HostEventKind::ContextMenu, |s, e, r, c| {
            if let HostEvent::ContextMenu(item) = e {
                s.handle_context_menu(item, r, c);
            }
        }),
        (HostEventKind::ReactionSelected, |s, e, _, _| {
            if let HostEvent::ReactionSelected(reaction) = e {
                s.handle_reaction_selected(&reaction);
            }
        }),
        (HostEventKind::Canvas, |s, e, r, c| {
            if let HostEvent::Canvas(event) = e {
                s.handle_canvas_event(event, r, c);
            }
        }),
    ]
}

/// A session attached to a host. Events are routed through the dispatch
/// table until the mount is dropped.
pub struct Mount<'a> {
    session: &'a mut Session,
    table: HashMap<HostEventKind, Handler>,
}

impl<'a> Mount<'a> {
    pub fn attach(session: &'a mut Session) -> Self {
        let table: HashMap<_, _> = handlers().into_iter().collect();
        log::debug!("Attached {} host event handlers", table.len());
        Self { session, table }
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    /// Route one event. Returns false if no handler is attached for it.
    pub fn dispatch(
        &mut self,
        event: HostEvent,
        surface: &mut dyn RenderSurface,
        collab: &mut dyn Collaborator,
    ) -> bool {
        let Some(handler) = self.table.get(&event.kind()).copied() else {
            return false;
        };
        handler(self.session, event, surface, collab);
        true
    }
}

impl Drop for Mount<'_> {
    fn drop(&mut self) {
        let count = self.table.len();
        self.table.clear();
        log::debug!("Detached {count} host event handlers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::collaboration::Room;
    use crate::presence::{PresenceChannel, ReactionEvent};
    use crate::object::ObjectId;
    use crate::record::ShapeRecord;
    use crate::shapes::Ellipse;
    use crate::storage::{SharedStorage, StorageChange};
    use crate::testing;
    use std::time::Duration;

    struct Peer {
        session: Session,
        canvas: Canvas,
        room: Room,
    }

    impl Peer {
        fn new(start: Instant) -> Self {
            Self {
                session: Session::new(SyncConfig::default(), start),
                canvas: Canvas::new(),
                room: Room::new(),
            }
        }

        fn tool(&mut self, tool: Tool) {
            self.session.handle_active_element(tool, &mut self.canvas, &mut self.room);
        }

        fn down(&mut self, x: f64, y: f64) {
            self.session
                .handle_pointer_down(&PointerEvent::at(x, y), &mut self.canvas, &mut self.room);
        }

        fn drag(&mut self, x: f64, y: f64) {
            self.session
                .handle_pointer_move(&PointerEvent::at(x, y), &mut self.canvas, &mut self.room);
        }

        fn up(&mut self, x: f64, y: f64) {
            self.session
                .handle_pointer_up(&PointerEvent::at(x, y), &mut self.canvas, &mut self.room);
        }

        fn key(&mut self, key: KeyEvent) {
            self.session.handle_key_down(&key, &mut self.canvas, &mut self.room);
            self.session.handle_key_up(&key, &mut self.canvas, &mut self.room);
        }

        fn pump(&mut self) -> Option<ReconcileReport> {
            self.session.pump(&mut self.canvas, &mut self.room)
        }

        fn draw_rect(&mut self, from: (f64, f64), to: (f64, f64)) {
            self.tool(Tool::Rectangle);
            self.down(from.0, from.1);
            self.drag(to.0, to.1);
            self.up(to.0, to.1);
        }

        fn assert_consistent(&self) {
            assert_eq!(self.canvas.ids(), self.room.keys());
        }
    }

    fn relay(from: &mut Peer, to: &mut Peer) {
        for msg in from.room.take_outgoing() {
            to.room.handle_message(&msg).expect("valid message");
        }
        to.pump();
    }

    #[test]
    fn test_draw_and_sync() {
        let mut peer = Peer::new(Instant::now());
        peer.tool(Tool::Rectangle);
        peer.down(10.0, 10.0);
        peer.drag(100.0, 80.0);
        assert!(peer.room.is_empty(), "no write before pointer-up");
        assert_eq!(peer.canvas.len(), 1);

        peer.up(100.0, 80.0);
        peer.assert_consistent();
        let id = peer.canvas.ids().remove(0);
        let record = peer.room.read(&id).expect("stored");
        assert_eq!(record.get("objectId"), Some(&serde_json::json!(id)));
        assert_eq!(record.get("type"), Some(&serde_json::json!("rectangle")));
        assert_eq!(record.get("left"), Some(&serde_json::json!(10.0)));
        assert_eq!(record.get("top"), Some(&serde_json::json!(10.0)));
        assert_eq!(record.get("width"), Some(&serde_json::json!(90.0)));
        assert_eq!(record.get("height"), Some(&serde_json::json!(70.0)));

        let object = peer.canvas.find_by_id(&id).and_then(|h| peer.canvas.object(h)).expect("on canvas");
        assert!(matches!(object.shape, Shape::Rectangle(_)));
        assert_eq!((object.bounds().x0, object.bounds().y0), (10.0, 10.0));
        assert_eq!(peer.session.tool(), Tool::Rectangle);
    }

    #[test]
    fn test_remote_add_without_duplicate() {
        let mut peer = Peer::new(Instant::now());
        let ellipse = VisualObject::new(Shape::Ellipse(Ellipse::new(Point::new(50.0, 50.0), 20.0, 10.0)))
            .with_id(ObjectId::from("x1"));
        let record = serialize(&ellipse).expect("serialize");
        assert_eq!(record.type_tag(), Some("ellipse"));

        for _ in 0..2 {
            peer.room.write("x1", &record).expect("write");
            peer.room.commit();
            peer.pump();
        }
        assert_eq!(peer.canvas.len(), 1);
        peer.assert_consistent();
        let added = peer.canvas.find_by_id("x1").and_then(|h| peer.canvas.object(h)).expect("added");
        assert!(matches!(added.shape, Shape::Ellipse(_)));
    }

    #[test]
    fn test_delete_selection() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (50.0, 50.0));
        peer.tool(Tool::Select);
        peer.down(25.0, 25.0);
        peer.up(25.0, 25.0);
        assert!(peer.session.state().selected().is_some());

        peer.key(KeyEvent::new("Delete"));
        assert!(peer.canvas.is_empty());
        assert!(peer.room.is_empty());

        // No selection: nothing happens.
        peer.key(KeyEvent::new("Delete"));
        assert!(peer.room.is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (50.0, 50.0));
        peer.draw_rect((100.0, 0.0), (150.0, 50.0));
        peer.draw_rect((200.0, 0.0), (250.0, 50.0));
        assert_eq!(peer.room.len(), 3);
        assert_eq!(peer.canvas.len(), 3);

        peer.tool(Tool::Reset);
        assert!(peer.room.is_empty());
        assert!(peer.canvas.is_empty());
        assert_eq!(peer.session.tool(), Tool::Select);
        assert!(peer.session.take_ui_requests().contains(&UiRequest::ToolChanged(Tool::Select)));
    }

    /// Storage whose deletes silently fail to take effect.
    struct StubbornStorage {
        room: Room,
    }

    impl SharedStorage for StubbornStorage {
        fn read(&self, key: &str) -> Option<ShapeRecord> {
            self.room.read(key)
        }

        fn write(&mut self, key: &str, record: &ShapeRecord) -> SyncResult<()> {
            self.room.write(key, record)
        }

        fn delete(&mut self, _key: &str) -> SyncResult<bool> {
            Ok(true)
        }

        fn entries(&self) -> Vec<(String, ShapeRecord)> {
            self.room.entries()
        }

        fn len(&self) -> usize {
            self.room.len()
        }

        fn commit(&mut self) {
            self.room.commit();
        }

        fn drain_changes(&mut self) -> Vec<StorageChange> {
            self.room.drain_changes()
        }

        fn undo(&mut self) -> SyncResult<bool> {
            self.room.undo()
        }

        fn redo(&mut self) -> SyncResult<bool> {
            self.room.redo()
        }
    }

    impl PresenceChannel for StubbornStorage {
        fn broadcast(&mut self, event: &ReactionEvent) {
            self.room.broadcast(event);
        }

        fn drain_events(&mut self) -> Vec<ReactionEvent> {
            self.room.drain_events()
        }

        fn my_presence(&self) -> &Presence {
            self.room.my_presence()
        }

        fn update_presence(&mut self, presence: Presence) {
            self.room.update_presence(presence);
        }

        fn others(&self) -> Vec<(u64, Presence)> {
            self.room.others()
        }
    }

    #[test]
    fn test_reset_failure_keeps_canvas() {
        let mut session = Session::new(SyncConfig::default(), Instant::now());
        let mut canvas = Canvas::new();
        let mut storage = StubbornStorage { room: Room::new() };

        session.handle_active_element(Tool::Rectangle, &mut canvas, &mut storage);
        for x in [0.0, 300.0, 600.0] {
            session.handle_pointer_down(&PointerEvent::at(x, 0.0), &mut canvas, &mut storage);
            session.handle_pointer_up(&PointerEvent::at(x, 0.0), &mut canvas, &mut storage);
        }
        assert_eq!(storage.len(), 3);

        session.handle_active_element(Tool::Reset, &mut canvas, &mut storage);
        assert_eq!(storage.len(), 3);
        assert_eq!(canvas.len(), 3);
        assert_eq!(session.tool(), Tool::Select);
    }

    #[test]
    fn test_freehand_is_single_shot() {
        let mut peer = Peer::new(Instant::now());
        peer.tool(Tool::Freehand);
        assert!(peer.canvas.is_free_drawing());
        peer.down(0.0, 0.0);
        peer.drag(5.0, 5.0);
        peer.drag(10.0, 3.0);
        peer.up(10.0, 3.0);

        assert_eq!(peer.session.tool(), Tool::Select);
        assert!(!peer.canvas.is_free_drawing());
        assert_eq!(peer.room.len(), 1);
        let record = peer.room.entries().remove(0).1;
        assert_eq!(record.type_tag(), Some("path"));
        assert!(peer.session.take_ui_requests().contains(&UiRequest::ToolChanged(Tool::Select)));
    }

    #[test]
    fn test_two_peers_converge() {
        let start = Instant::now();
        let mut a = Peer::new(start);
        let mut b = Peer::new(start);

        a.draw_rect((0.0, 0.0), (40.0, 40.0));
        b.draw_rect((100.0, 100.0), (140.0, 120.0));
        relay(&mut a, &mut b);
        relay(&mut b, &mut a);

        assert_eq!(a.canvas.len(), 2);
        a.assert_consistent();
        b.assert_consistent();
        assert_eq!(a.canvas.ids(), b.canvas.ids());

        // Moving a shape on one side moves it on the other.
        a.tool(Tool::Select);
        a.down(20.0, 20.0);
        a.drag(30.0, 25.0);
        a.up(30.0, 25.0);
        relay(&mut a, &mut b);
        let handle = a.session.state().selected().expect("selected");
        let moved = a.canvas.object(handle).expect("present").clone();
        let id = moved.id().expect("committed").to_string();
        let theirs = b.canvas.find_by_id(&id).and_then(|h| b.canvas.object(h)).expect("replicated");
        assert_eq!(theirs.bounds(), moved.bounds());
        assert!((moved.bounds().x0 - 10.0).abs() < f64::EPSILON);

        // Deletes converge too.
        a.key(KeyEvent::new("Delete"));
        relay(&mut a, &mut b);
        assert_eq!(b.canvas.len(), 1);
        b.assert_consistent();
    }

    #[test]
    fn test_undo_and_redo_through_document() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        assert_eq!(peer.canvas.len(), 1);

        peer.key(KeyEvent::new("z").with_command());
        assert!(peer.canvas.is_empty());
        assert!(peer.room.is_empty());

        peer.session
            .handle_context_menu(ContextMenuItem::Redo, &mut peer.canvas, &mut peer.room);
        assert_eq!(peer.canvas.len(), 1);
        peer.assert_consistent();
    }

    #[test]
    fn test_undo_refused_mid_draw() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        peer.down(100.0, 100.0);
        peer.key(KeyEvent::new("z").with_command());
        assert_eq!(peer.room.len(), 1);
        assert_eq!(peer.canvas.len(), 2, "committed shape and the one being drawn");
    }

    #[test]
    fn test_remote_update_spares_dragged_object() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        let id = peer.canvas.ids().remove(0);
        peer.tool(Tool::Select);
        peer.down(20.0, 20.0);
        peer.drag(25.0, 20.0);

        let remote = serialize(&testing::rect(&id, 500.0, 500.0, 40.0, 40.0)).expect("serialize");
        peer.room.write(&id, &remote).expect("write");
        peer.room.commit();
        peer.pump();
        let handle = peer.canvas.find_by_id(&id).expect("present");
        let x0 = peer.canvas.object(handle).map(|o| o.bounds().x0);
        assert_eq!(x0, Some(5.0));

        // After the gesture ends the drag is committed over the remote value.
        peer.up(25.0, 20.0);
        assert_eq!(peer.room.read(&id).and_then(|r| r.get("left").cloned()), Some(serde_json::json!(5.0)));
    }

    #[test]
    fn test_remote_update_applied_after_click_release() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        let id = peer.canvas.ids().remove(0);
        peer.tool(Tool::Select);
        peer.down(20.0, 20.0);

        let remote = serialize(&testing::rect(&id, 500.0, 500.0, 40.0, 40.0)).expect("serialize");
        peer.room.write(&id, &remote).expect("write");
        peer.room.commit();
        let report = peer.pump().expect("changes pending");
        assert_eq!(report.deferred, vec![id.clone()]);
        let handle = peer.canvas.find_by_id(&id).expect("present");
        assert_eq!(peer.canvas.object(handle).map(|o| o.bounds().x0), Some(0.0));

        // Releasing without moving commits nothing, so the held-back record lands.
        peer.up(20.0, 20.0);
        assert_eq!(peer.canvas.find_by_id(&id), Some(handle));
        assert_eq!(peer.canvas.object(handle).map(|o| o.bounds().x0), Some(500.0));
        assert_eq!(peer.room.read(&id).and_then(|r| r.get("left").cloned()), Some(serde_json::json!(500.0)));
        assert!(peer.pump().is_none());
    }

    #[test]
    fn test_typed_text_survives_selecting_another_object() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        let rect = peer.canvas.find_by_id(&peer.canvas.ids()[0]).expect("rect");
        peer.tool(Tool::Text);
        peer.down(200.0, 200.0);
        peer.up(200.0, 200.0);
        let text = peer
            .canvas
            .objects()
            .find(|o| matches!(o.shape, Shape::Text(_)))
            .map(VisualObject::handle)
            .expect("text placed");
        let id = peer.canvas.object(text).and_then(|o| o.id()).map(|id| id.as_str().to_string()).expect("committed");

        peer.session
            .handle_canvas_event(CanvasEvent::TextEditingEntered { handle: text }, &mut peer.canvas, &mut peer.room);
        peer.key(KeyEvent::new("x"));
        peer.session
            .handle_canvas_event(CanvasEvent::SelectionCreated { handle: rect }, &mut peer.canvas, &mut peer.room);

        let stored = peer.room.read(&id).and_then(|r| r.get("text").cloned());
        let local = peer.canvas.object(text).and_then(|o| match &o.shape {
            Shape::Text(t) => Some(t.content.clone()),
            _ => None,
        });
        assert!(local.as_deref().is_some_and(|s| s.ends_with('x')));
        assert_eq!(stored, local.map(serde_json::Value::String));
    }

    #[test]
    fn test_image_upload() {
        let mut peer = Peer::new(Instant::now());
        peer.tool(Tool::Image);
        assert_eq!(peer.session.take_ui_requests()[0], UiRequest::OpenFileChooser);

        let bytes = testing::png_bytes(400, 100);
        assert!(peer.session.handle_image_upload(&bytes, &mut peer.canvas, &mut peer.room));
        assert_eq!(peer.session.tool(), Tool::Select);
        peer.assert_consistent();

        let object = peer.canvas.objects().next().expect("placed");
        assert!((object.bounds().width() - 200.0).abs() < 1e-9);
        assert!((object.bounds().height() - 50.0).abs() < 1e-9);
        assert_eq!(peer.session.attributes().width, "200");

        assert!(!peer.session.handle_image_upload(b"not an image", &mut peer.canvas, &mut peer.room));
        assert_eq!(peer.room.len(), 1);
    }

    #[test]
    fn test_attribute_edit() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        peer.tool(Tool::Select);
        peer.down(20.0, 20.0);
        peer.up(20.0, 20.0);
        assert_eq!(peer.session.attributes().width, "40");

        assert!(peer.session.handle_attribute_edit(AttributeField::Fill, "#ff0000", &mut peer.canvas, &mut peer.room));
        assert_eq!(peer.session.attributes().fill, "#ff0000");
        let id = peer.canvas.ids().remove(0);
        assert_eq!(peer.room.read(&id).and_then(|r| r.get("fill").cloned()), Some(serde_json::json!("#ff0000")));

        assert!(!peer.session.handle_attribute_edit(AttributeField::Width, "wide", &mut peer.canvas, &mut peer.room));
        assert!(!peer.session.handle_attribute_edit(AttributeField::FontSize, "12", &mut peer.canvas, &mut peer.room));
    }

    #[test]
    fn test_chat_composition() {
        let mut peer = Peer::new(Instant::now());
        peer.session.handle_pointer_move(&PointerEvent::at(5.0, 5.0), &mut peer.canvas, &mut peer.room);
        peer.key(KeyEvent::new("/"));
        assert!(matches!(peer.session.cursor_mode(), CursorMode::Chat { .. }));

        for key in ["h", "i", "/", "e"] {
            peer.key(KeyEvent::new(key));
        }
        peer.key(KeyEvent::new("Backspace"));
        assert_eq!(peer.room.my_presence().message.as_deref(), Some("hi/"));

        peer.key(KeyEvent::new("Enter"));
        assert_eq!(
            peer.session.cursor_mode(),
            &CursorMode::Chat { previous_message: Some("hi/".to_string()), message: String::new() }
        );

        peer.key(KeyEvent::new("Escape"));
        assert_eq!(peer.session.cursor_mode(), &CursorMode::Hidden);
        assert_eq!(peer.room.my_presence().message, None);
        assert!(peer.room.my_presence().cursor.is_some());

        peer.session.handle_pointer_leave(&mut peer.room);
        assert_eq!(peer.room.my_presence(), &Presence::default());
    }

    #[test]
    fn test_reaction_picker_freezes_cursor() {
        let mut peer = Peer::new(Instant::now());
        peer.session
            .handle_context_menu(ContextMenuItem::Reactions, &mut peer.canvas, &mut peer.room);
        assert_eq!(peer.session.cursor_mode(), &CursorMode::ReactionSelector);
        peer.drag(1.0, 1.0);
        assert_eq!(peer.room.my_presence().cursor, None);

        peer.session
            .handle_context_menu(ContextMenuItem::Chat, &mut peer.canvas, &mut peer.room);
        assert!(matches!(peer.session.cursor_mode(), CursorMode::Chat { .. }));
    }

    #[test]
    fn test_reactions_broadcast_and_expire() {
        let start = Instant::now();
        let mut a = Peer::new(start);
        let mut b = Peer::new(start);
        let at = |ms: u64| start + Duration::from_millis(ms);

        a.session.handle_reaction_selected("🔥");
        a.drag(10.0, 10.0);
        a.down(10.0, 10.0);
        a.session.tick(at(50), &mut a.room);
        a.up(10.0, 10.0);
        a.session.tick(at(100), &mut a.room);
        assert_eq!(a.session.reactions().len(), 1);

        relay(&mut a, &mut b);
        b.session.tick(at(50), &mut b.room);
        assert_eq!(b.session.reactions().len(), 1);

        let reaction_time = at(50);
        let live = |peer: &Peer, ms: u64| {
            peer.session
                .reactions()
                .live_reactions(reaction_time + Duration::from_millis(ms))
                .count()
        };
        assert_eq!(live(&b, 3900), 1);
        assert_eq!(live(&b, 4100), 0);

        b.session.tick(reaction_time + Duration::from_millis(3900), &mut b.room);
        assert_eq!(b.session.reactions().len(), 1);
        b.session.tick(reaction_time + Duration::from_millis(4950), &mut b.room);
        assert!(b.session.reactions().is_empty());
    }

    #[test]
    fn test_escape_abandons_drawing() {
        let mut peer = Peer::new(Instant::now());
        peer.tool(Tool::Ellipse);
        peer.down(0.0, 0.0);
        peer.drag(30.0, 30.0);
        assert_eq!(peer.canvas.len(), 1);

        peer.key(KeyEvent::new("Escape"));
        assert!(peer.canvas.is_empty());
        assert!(peer.room.is_empty());
        assert_eq!(peer.session.state().mode, crate::interaction::Mode::Idle);
    }

    #[test]
    fn test_resize_does_not_touch_records() {
        let mut peer = Peer::new(Instant::now());
        peer.draw_rect((0.0, 0.0), (40.0, 40.0));
        let before = peer.room.entries();
        peer.session.handle_resize(Size::new(800.0, 600.0), &mut peer.canvas);
        assert_eq!(peer.room.entries(), before);
        assert_eq!(peer.canvas.camera.viewport, Size::new(800.0, 600.0));
        assert!(peer.pump().is_none());
    }

    #[test]
    fn test_mount_dispatches_until_dropped() {
        let mut session = Session::new(SyncConfig::default(), Instant::now());
        let mut canvas = Canvas::new();
        let mut room = Room::new();
        {
            let mut mount = Mount::attach(&mut session);
            assert!(mount.dispatch(HostEvent::ActiveElement(Tool::Rectangle), &mut canvas, &mut room));
            assert!(mount.dispatch(HostEvent::PointerDown(PointerEvent::at(0.0, 0.0)), &mut canvas, &mut room));
            assert!(mount.dispatch(HostEvent::PointerUp(PointerEvent::at(0.0, 0.0)), &mut canvas, &mut room));
            assert_eq!(mount.session().tool(), Tool::Rectangle);
        }
        assert_eq!(room.len(), 1);
        assert_eq!(canvas.ids(), room.keys());
    }
}

//! Interaction state machine.
//!
//! [`transition`] maps the current [`InteractionState`] and one
//! [`CanvasEvent`] to the next state and a list of [`Effect`]s. It never
//! touches the canvas or storage; the session executes the effects.

use crate::canvas::PointerTarget;
use crate::input::KeyEvent;
use crate::object::{ObjectHandle, VisualObject};
use crate::shapes::ShapeStyle;
use crate::tools::{self, Tool};
use kurbo::{Point, Vec2};

/// An in-progress manipulation of the selected object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Pointer held on the object; `moved` once it has been dragged.
    Dragging { last: Point, moved: bool },
    /// The host is scaling the object with its handles.
    Scaling,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Mode {
    #[default]
    Idle,
    /// A new object is being dragged out. It has no id and is not in storage.
    Drawing { handle: ObjectHandle, origin: Point },
    Selecting {
        handle: ObjectHandle,
        gesture: Option<Gesture>,
        editing_text: bool,
    },
    /// Waiting for the host to deliver an uploaded image.
    PlacingImage,
}

/// Current tool, mode and the style applied to new shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionState {
    pub tool: Tool,
    pub mode: Mode,
    pub default_tool: Tool,
    pub style: ShapeStyle,
}

impl InteractionState {
    pub fn new(default_tool: Tool, style: ShapeStyle) -> Self {
        Self {
            tool: default_tool,
            mode: Mode::Idle,
            default_tool,
            style,
        }
    }

    /// The object being drawn, if any.
    pub fn drawing(&self) -> Option<ObjectHandle> {
        match self.mode {
            Mode::Drawing { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing().is_some()
    }

    /// The selected object, if any.
    pub fn selected(&self) -> Option<ObjectHandle> {
        match self.mode {
            Mode::Selecting { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn is_editing_text(&self) -> bool {
        matches!(self.mode, Mode::Selecting { editing_text: true, .. })
    }

    /// Whether the selected object is being manipulated or edited, in which
    /// case incoming records must not overwrite it.
    pub fn is_mid_edit(&self) -> bool {
        matches!(
            self.mode,
            Mode::Selecting { gesture: Some(_), .. } | Mode::Selecting { editing_text: true, .. }
        )
    }
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::new(Tool::default(), ShapeStyle::default())
    }
}

/// Edit applied to a text object while it is in edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEdit {
    Insert(char),
    Backspace,
}

/// Input to the state machine. Positions are in world coordinates.
#[derive(Debug, Clone)]
pub enum CanvasEvent {
    ToolSelected(Tool),
    PointerDown {
        position: Point,
        target: Option<PointerTarget>,
    },
    PointerMove { position: Point },
    PointerUp { position: Point },
    /// The host is scaling an object; `scale` is the current factor.
    ObjectScaling { handle: ObjectHandle, scale: Vec2 },
    /// A drag, resize or rotate was released.
    ObjectModified { handle: ObjectHandle },
    /// Selection created or changed.
    SelectionCreated { handle: ObjectHandle },
    SelectionCleared,
    TextEditingEntered { handle: ObjectHandle },
    TextEditingExited,
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// A decoded upload, ready to be placed.
    ImageLoaded(Box<VisualObject>),
    /// An object disappeared from the canvas (remote delete, undo).
    ObjectRemoved(ObjectHandle),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    AddObject(Box<VisualObject>),
    Reshape {
        handle: ObjectHandle,
        origin: Point,
        current: Point,
    },
    Translate { handle: ObjectHandle, delta: Vec2 },
    Scale { handle: ObjectHandle, scale: Vec2 },
    EditText { handle: ObjectHandle, edit: TextEdit },
    /// Assign an id if needed and upsert the object.
    Commit(ObjectHandle),
    /// Remove from canvas and storage.
    Remove(ObjectHandle),
    /// Remove an uncommitted object from the canvas only.
    DiscardObject(ObjectHandle),
    /// Two-phase clear: storage first, canvas only if storage ended empty.
    ClearAll,
    SetActive(Option<ObjectHandle>),
    CaptureAttributes(ObjectHandle),
    SetFreeDrawing(bool),
    OpenFileChooser,
    OpenChat,
    CloseChat,
    OpenReactionPicker,
    Undo,
    Redo,
    /// The tool changed without the host asking for it.
    ToolChanged(Tool),
}

/// Compute the next state and effects for one event.
pub fn transition(state: &InteractionState, event: CanvasEvent) -> (InteractionState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        CanvasEvent::ToolSelected(tool) => select_tool(&mut next, tool, &mut effects),

        CanvasEvent::PointerDown { position, target } => match next.mode {
            Mode::Idle | Mode::Selecting { .. } => pointer_down(&mut next, position, target, &mut effects),
            Mode::Drawing { .. } | Mode::PlacingImage => {}
        },

        CanvasEvent::PointerMove { position } => match &mut next.mode {
            Mode::Drawing { handle, origin } => effects.push(Effect::Reshape {
                handle: *handle,
                origin: *origin,
                current: position,
            }),
            Mode::Selecting {
                handle,
                gesture: Some(Gesture::Dragging { last, moved }),
                editing_text: false,
            } => {
                let delta = position - *last;
                if delta != Vec2::ZERO {
                    effects.push(Effect::Translate { handle: *handle, delta });
                    *last = position;
                    *moved = true;
                }
            }
            _ => {}
        },

        CanvasEvent::PointerUp { .. } => match next.mode {
            Mode::Drawing { handle, .. } => {
                effects.push(Effect::Commit(handle));
                next.mode = Mode::Idle;
                if next.tool == Tool::Freehand {
                    next.tool = Tool::Select;
                    effects.push(Effect::SetFreeDrawing(false));
                    effects.push(Effect::ToolChanged(Tool::Select));
                }
            }
            Mode::Selecting { handle, gesture, editing_text } => {
                if let Some(Gesture::Dragging { moved: true, .. }) = gesture {
                    effects.push(Effect::Commit(handle));
                    effects.push(Effect::CaptureAttributes(handle));
                }
                next.mode = Mode::Selecting { handle, gesture: None, editing_text };
            }
            Mode::Idle | Mode::PlacingImage => {}
        },

        CanvasEvent::ObjectScaling { handle, scale } => {
            if next.drawing() != Some(handle) {
                leave_other_text(&mut next, handle, &mut effects);
                let editing_text = next.selected() == Some(handle) && next.is_editing_text();
                next.mode = Mode::Selecting {
                    handle,
                    gesture: Some(Gesture::Scaling),
                    editing_text,
                };
                effects.push(Effect::Scale { handle, scale });
                effects.push(Effect::CaptureAttributes(handle));
            }
        }

        CanvasEvent::ObjectModified { handle } => {
            if next.drawing() != Some(handle) {
                if let Mode::Selecting { handle: selected, gesture, .. } = &mut next.mode {
                    if *selected == handle {
                        *gesture = None;
                    }
                }
                effects.push(Effect::Commit(handle));
                effects.push(Effect::CaptureAttributes(handle));
            }
        }

        CanvasEvent::SelectionCreated { handle } => match next.mode {
            Mode::Drawing { .. } | Mode::PlacingImage => {}
            Mode::Selecting { handle: current, editing_text: true, .. } if current == handle => {
                effects.push(Effect::CaptureAttributes(handle));
            }
            _ => {
                leave_other_text(&mut next, handle, &mut effects);
                next.mode = Mode::Selecting { handle, gesture: None, editing_text: false };
                effects.push(Effect::SetActive(Some(handle)));
                effects.push(Effect::CaptureAttributes(handle));
            }
        },

        CanvasEvent::SelectionCleared => {
            if let Mode::Selecting { handle, editing_text, .. } = next.mode {
                if editing_text {
                    effects.push(Effect::Commit(handle));
                }
                next.mode = Mode::Idle;
                effects.push(Effect::SetActive(None));
            }
        }

        CanvasEvent::TextEditingEntered { handle } => {
            if !next.is_drawing() {
                leave_other_text(&mut next, handle, &mut effects);
                next.mode = Mode::Selecting { handle, gesture: None, editing_text: true };
                effects.push(Effect::SetActive(Some(handle)));
                effects.push(Effect::CaptureAttributes(handle));
            }
        }

        CanvasEvent::TextEditingExited => exit_text_editing(&mut next, &mut effects),

        CanvasEvent::KeyDown(key) => key_down(&mut next, &key, &mut effects),

        CanvasEvent::KeyUp(key) => key_up(&mut next, &key, &mut effects),

        CanvasEvent::ImageLoaded(object) => {
            abandon_drawing(&mut next, &mut effects);
            let handle = object.handle();
            effects.push(Effect::AddObject(object));
            effects.push(Effect::Commit(handle));
            effects.push(Effect::SetActive(Some(handle)));
            effects.push(Effect::CaptureAttributes(handle));
            next.mode = Mode::Selecting { handle, gesture: None, editing_text: false };
            if next.tool != Tool::Select {
                next.tool = Tool::Select;
                effects.push(Effect::ToolChanged(Tool::Select));
            }
        }

        CanvasEvent::ObjectRemoved(handle) => match next.mode {
            Mode::Selecting { handle: selected, .. } if selected == handle => next.mode = Mode::Idle,
            Mode::Drawing { handle: drawing, .. } if drawing == handle => next.mode = Mode::Idle,
            _ => {}
        },
    }

    (next, effects)
}

/// Discard an uncommitted drawing, if one is in progress.
fn abandon_drawing(state: &mut InteractionState, effects: &mut Vec<Effect>) {
    if let Mode::Drawing { handle, .. } = state.mode {
        effects.push(Effect::DiscardObject(handle));
        state.mode = Mode::Idle;
    }
}

fn return_to_default_tool(state: &mut InteractionState, effects: &mut Vec<Effect>) {
    state.tool = state.default_tool;
    state.mode = Mode::Idle;
    effects.push(Effect::SetFreeDrawing(false));
    effects.push(Effect::ToolChanged(state.default_tool));
}

fn select_tool(state: &mut InteractionState, tool: Tool, effects: &mut Vec<Effect>) {
    abandon_drawing(state, effects);
    if state.is_editing_text() {
        exit_text_editing(state, effects);
    }

    match tool {
        Tool::Select => {
            state.tool = Tool::Select;
            if state.mode == Mode::PlacingImage {
                state.mode = Mode::Idle;
            }
            effects.push(Effect::SetFreeDrawing(false));
        }
        Tool::Image => {
            state.tool = Tool::Image;
            state.mode = Mode::PlacingImage;
            effects.push(Effect::SetFreeDrawing(false));
            effects.push(Effect::OpenFileChooser);
        }
        Tool::Delete => {
            if let Some(handle) = state.selected() {
                effects.push(Effect::Remove(handle));
            }
            return_to_default_tool(state, effects);
        }
        Tool::Reset => {
            effects.push(Effect::ClearAll);
            return_to_default_tool(state, effects);
        }
        drawing_tool => {
            state.tool = drawing_tool;
            if state.selected().is_some() || state.mode == Mode::PlacingImage {
                state.mode = Mode::Idle;
                effects.push(Effect::SetActive(None));
            }
            effects.push(Effect::SetFreeDrawing(drawing_tool == Tool::Freehand));
        }
    }
}

fn pointer_down(
    state: &mut InteractionState,
    position: Point,
    target: Option<PointerTarget>,
    effects: &mut Vec<Effect>,
) {
    // Clicking inside the text being edited moves the caret, not the object.
    if let (Mode::Selecting { handle, editing_text: true, .. }, Some(target)) = (state.mode, target) {
        if target.handle == handle {
            return;
        }
    }

    let grab = |handle: ObjectHandle, state: &mut InteractionState, effects: &mut Vec<Effect>| {
        state.mode = Mode::Selecting {
            handle,
            gesture: Some(Gesture::Dragging { last: position, moved: false }),
            editing_text: false,
        };
        effects.push(Effect::SetActive(Some(handle)));
        effects.push(Effect::CaptureAttributes(handle));
    };

    match state.tool.shape_kind() {
        Some(kind) => {
            if let Some(target) = target.filter(|t| t.kind == kind) {
                grab(target.handle, state, effects);
                return;
            }
            if state.is_editing_text() {
                exit_text_editing(state, effects);
            }
            let Some(shape) = tools::create_shape(state.tool, position, &state.style) else {
                return;
            };
            let object = VisualObject::new(shape);
            let handle = object.handle();
            effects.push(Effect::AddObject(Box::new(object)));
            state.mode = Mode::Drawing { handle, origin: position };
        }
        None => {
            if state.is_editing_text() {
                exit_text_editing(state, effects);
            }
            match target {
                Some(target) => grab(target.handle, state, effects),
                None => {
                    if state.selected().is_some() {
                        effects.push(Effect::SetActive(None));
                    }
                    state.mode = Mode::Idle;
                }
            }
        }
    }
}

fn exit_text_editing(state: &mut InteractionState, effects: &mut Vec<Effect>) {
    if let Mode::Selecting { handle, editing_text: true, gesture } = state.mode {
        state.mode = Mode::Selecting { handle, gesture, editing_text: false };
        effects.push(Effect::Commit(handle));
        effects.push(Effect::CaptureAttributes(handle));
    }
}

/// Commit the text being edited if the selection moves to another object.
fn leave_other_text(state: &mut InteractionState, handle: ObjectHandle, effects: &mut Vec<Effect>) {
    if state.is_editing_text() && state.selected() != Some(handle) {
        exit_text_editing(state, effects);
    }
}

fn key_down(state: &mut InteractionState, key: &KeyEvent, effects: &mut Vec<Effect>) {
    if let Mode::Selecting { handle, editing_text: true, .. } = state.mode {
        if key.is("Escape") {
            exit_text_editing(state, effects);
        } else if key.is("Backspace") {
            effects.push(Effect::EditText { handle, edit: TextEdit::Backspace });
        } else if key.is("Enter") {
            effects.push(Effect::EditText { handle, edit: TextEdit::Insert('\n') });
        } else if let Some(c) = key.printable().filter(|_| !key.modifiers.command()) {
            effects.push(Effect::EditText { handle, edit: TextEdit::Insert(c) });
        }
        return;
    }

    if key.is_shortcut("z") {
        effects.push(if key.modifiers.shift { Effect::Redo } else { Effect::Undo });
    } else if key.is_shortcut("y") {
        effects.push(Effect::Redo);
    } else if key.is("Delete") || key.is("Backspace") {
        if let Some(handle) = state.selected() {
            effects.push(Effect::Remove(handle));
            state.mode = Mode::Idle;
        }
    }
}

fn key_up(state: &mut InteractionState, key: &KeyEvent, effects: &mut Vec<Effect>) {
    if state.is_editing_text() || key.modifiers.command() {
        return;
    }
    if key.is("/") {
        effects.push(Effect::OpenChat);
    } else if key.is("e") {
        effects.push(Effect::OpenReactionPicker);
    } else if key.is("Escape") {
        effects.push(Effect::CloseChat);
        abandon_drawing(state, effects);
        if state.mode == Mode::PlacingImage {
            return_to_default_tool(state, effects);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;

    fn run(state: &InteractionState, events: Vec<CanvasEvent>) -> (InteractionState, Vec<Effect>) {
        let mut state = state.clone();
        let mut all = Vec::new();
        for event in events {
            let (next, effects) = transition(&state, event);
            state = next;
            all.extend(effects);
        }
        (state, all)
    }

    fn armed(tool: Tool) -> InteractionState {
        let (state, _) = transition(&InteractionState::default(), CanvasEvent::ToolSelected(tool));
        state
    }

    fn added_handle(effects: &[Effect]) -> ObjectHandle {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::AddObject(obj) => Some(obj.handle()),
                _ => None,
            })
            .expect("an object was added")
    }

    fn down(x: f64, y: f64) -> CanvasEvent {
        CanvasEvent::PointerDown { position: Point::new(x, y), target: None }
    }

    #[test]
    fn test_draw_rectangle_commits_on_pointer_up() {
        let state = armed(Tool::Rectangle);
        let (state, effects) = transition(&state, down(10.0, 10.0));
        let handle = added_handle(&effects);
        assert_eq!(state.mode, Mode::Drawing { handle, origin: Point::new(10.0, 10.0) });

        let (state, effects) =
            transition(&state, CanvasEvent::PointerMove { position: Point::new(40.0, 30.0) });
        assert!(matches!(effects.as_slice(), [Effect::Reshape { .. }]));
        assert!(state.is_drawing());

        let (state, effects) =
            transition(&state, CanvasEvent::PointerUp { position: Point::new(40.0, 30.0) });
        assert!(matches!(effects.as_slice(), [Effect::Commit(h)] if *h == handle));
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.tool, Tool::Rectangle);
    }

    #[test]
    fn test_freehand_is_single_shot() {
        let (state, effects) = run(
            &armed(Tool::Freehand),
            vec![
                down(0.0, 0.0),
                CanvasEvent::PointerMove { position: Point::new(5.0, 5.0) },
                CanvasEvent::PointerUp { position: Point::new(5.0, 5.0) },
            ],
        );
        assert_eq!(state.tool, Tool::Select);
        assert!(effects.iter().any(|e| matches!(e, Effect::ToolChanged(Tool::Select))));
        assert!(effects.iter().any(|e| matches!(e, Effect::SetFreeDrawing(false))));
    }

    #[test]
    fn test_pointer_down_on_same_kind_selects() {
        let state = armed(Tool::Rectangle);
        let existing = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let target = PointerTarget { handle: existing, kind: ShapeKind::Rectangle };
        let (state, effects) =
            transition(&state, CanvasEvent::PointerDown { position: Point::new(5.0, 5.0), target: Some(target) });
        assert_eq!(state.selected(), Some(existing));
        assert!(!effects.iter().any(|e| matches!(e, Effect::AddObject(_))));

        let other_kind = PointerTarget { handle: existing, kind: ShapeKind::Ellipse };
        let (_, effects) = transition(
            &armed(Tool::Rectangle),
            CanvasEvent::PointerDown { position: Point::new(5.0, 5.0), target: Some(other_kind) },
        );
        added_handle(&effects);
    }

    #[test]
    fn test_tool_change_discards_drawing() {
        let (state, effects) = transition(&armed(Tool::Ellipse), down(0.0, 0.0));
        let handle = added_handle(&effects);
        let (state, effects) = transition(&state, CanvasEvent::ToolSelected(Tool::Line));
        assert!(matches!(effects.first(), Some(Effect::DiscardObject(h)) if *h == handle));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Commit(_))));
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.tool, Tool::Line);
    }

    #[test]
    fn test_escape_discards_drawing_and_closes_chat() {
        let (state, _) = transition(&armed(Tool::Rectangle), down(0.0, 0.0));
        let (state, effects) = transition(&state, CanvasEvent::KeyUp(KeyEvent::new("Escape")));
        assert!(matches!(effects.as_slice(), [Effect::CloseChat, Effect::DiscardObject(_)]));
        assert_eq!(state.mode, Mode::Idle);
    }

    #[test]
    fn test_drag_selected_object_commits_once() {
        let handle = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let target = Some(PointerTarget { handle, kind: ShapeKind::Rectangle });
        let (state, effects) = run(
            &InteractionState::default(),
            vec![
                CanvasEvent::PointerDown { position: Point::new(5.0, 5.0), target },
                CanvasEvent::PointerMove { position: Point::new(8.0, 9.0) },
                CanvasEvent::PointerMove { position: Point::new(10.0, 10.0) },
                CanvasEvent::PointerUp { position: Point::new(10.0, 10.0) },
            ],
        );
        let translated: Vec<Vec2> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Translate { delta, .. } => Some(*delta),
                _ => None,
            })
            .collect();
        assert_eq!(translated, vec![Vec2::new(3.0, 4.0), Vec2::new(2.0, 1.0)]);
        assert_eq!(effects.iter().filter(|e| matches!(e, Effect::Commit(_))).count(), 1);
        assert_eq!(state.mode, Mode::Selecting { handle, gesture: None, editing_text: false });
    }

    #[test]
    fn test_click_without_drag_does_not_commit() {
        let handle = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let target = Some(PointerTarget { handle, kind: ShapeKind::Rectangle });
        let (_, effects) = run(
            &InteractionState::default(),
            vec![
                CanvasEvent::PointerDown { position: Point::new(5.0, 5.0), target },
                CanvasEvent::PointerUp { position: Point::new(5.0, 5.0) },
            ],
        );
        assert!(!effects.iter().any(|e| matches!(e, Effect::Commit(_))));
    }

    #[test]
    fn test_scaling_is_mid_edit_until_modified() {
        let handle = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let (state, effects) = transition(
            &InteractionState::default(),
            CanvasEvent::ObjectScaling { handle, scale: Vec2::new(2.0, 2.0) },
        );
        assert!(state.is_mid_edit());
        assert!(!effects.iter().any(|e| matches!(e, Effect::Commit(_))));

        let (state, effects) = transition(&state, CanvasEvent::ObjectModified { handle });
        assert!(!state.is_mid_edit());
        assert!(matches!(effects.first(), Some(Effect::Commit(h)) if *h == handle));
    }

    #[test]
    fn test_delete_key() {
        let handle = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let (state, _) = transition(&InteractionState::default(), CanvasEvent::SelectionCreated { handle });
        let (state, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("Delete")));
        assert!(matches!(effects.as_slice(), [Effect::Remove(h)] if *h == handle));
        assert_eq!(state.mode, Mode::Idle);

        let (_, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("Backspace")));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_delete_and_reset_tools_return_to_default() {
        let handle = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let (state, _) = transition(&armed(Tool::Rectangle), CanvasEvent::SelectionCreated { handle });
        let (state, effects) = transition(&state, CanvasEvent::ToolSelected(Tool::Delete));
        assert!(matches!(effects.first(), Some(Effect::Remove(h)) if *h == handle));
        assert_eq!(state.tool, Tool::Select);

        let (state, effects) = transition(&state, CanvasEvent::ToolSelected(Tool::Reset));
        assert!(matches!(effects.first(), Some(Effect::ClearAll)));
        assert!(effects.iter().any(|e| matches!(e, Effect::ToolChanged(Tool::Select))));
        assert_eq!(state.mode, Mode::Idle);
    }

    #[test]
    fn test_image_tool_requests_file() {
        let state = armed(Tool::Image);
        assert_eq!(state.mode, Mode::PlacingImage);

        let (_, effects) =
            transition(&InteractionState::default(), CanvasEvent::ToolSelected(Tool::Image));
        assert!(effects.iter().any(|e| matches!(e, Effect::OpenFileChooser)));
        assert!(effects.iter().any(|e| matches!(e, Effect::SetFreeDrawing(false))));

        let (state, _) = transition(&state, CanvasEvent::KeyUp(KeyEvent::new("Escape")));
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.tool, Tool::Select);
    }

    #[test]
    fn test_undo_redo_shortcuts() {
        let state = InteractionState::default();
        let (_, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("z").with_command()));
        assert!(matches!(effects.as_slice(), [Effect::Undo]));
        let (_, effects) =
            transition(&state, CanvasEvent::KeyDown(KeyEvent::new("Z").with_command().with_shift()));
        assert!(matches!(effects.as_slice(), [Effect::Redo]));
        let (_, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("y").with_command()));
        assert!(matches!(effects.as_slice(), [Effect::Redo]));
        let (_, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("z")));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_shortcuts_ignored_while_editing_text() {
        let handle = crate::testing::rect("t", 0.0, 0.0, 10.0, 10.0).handle();
        let (state, _) =
            transition(&InteractionState::default(), CanvasEvent::TextEditingEntered { handle });
        assert!(state.is_mid_edit());

        let (state, effects) = transition(&state, CanvasEvent::KeyUp(KeyEvent::new("/")));
        assert!(effects.is_empty());
        let (state, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("e")));
        assert!(matches!(effects.as_slice(), [Effect::EditText { edit: TextEdit::Insert('e'), .. }]));
        let (state, effects) = transition(&state, CanvasEvent::KeyDown(KeyEvent::new("Backspace")));
        assert!(matches!(effects.as_slice(), [Effect::EditText { edit: TextEdit::Backspace, .. }]));
        assert_eq!(state.selected(), Some(handle));

        let (state, effects) = transition(&state, CanvasEvent::TextEditingExited);
        assert!(matches!(effects.first(), Some(Effect::Commit(h)) if *h == handle));
        assert!(!state.is_editing_text());
    }

    #[test]
    fn test_switching_away_from_text_commits_it() {
        let text = crate::testing::rect("t", 0.0, 0.0, 10.0, 10.0).handle();
        let other = crate::testing::rect("o", 20.0, 0.0, 10.0, 10.0).handle();
        let editing = |event: CanvasEvent| {
            let (state, _) = run(
                &InteractionState::default(),
                vec![
                    CanvasEvent::TextEditingEntered { handle: text },
                    CanvasEvent::KeyDown(KeyEvent::new("x")),
                ],
            );
            transition(&state, event)
        };

        for event in [
            CanvasEvent::SelectionCreated { handle: other },
            CanvasEvent::TextEditingEntered { handle: other },
            CanvasEvent::ObjectScaling { handle: other, scale: Vec2::new(2.0, 2.0) },
        ] {
            let (state, effects) = editing(event);
            assert!(matches!(effects.first(), Some(Effect::Commit(h)) if *h == text));
            assert_eq!(state.selected(), Some(other));
        }

        // Re-selecting the same text keeps editing without a commit.
        let (state, effects) = editing(CanvasEvent::SelectionCreated { handle: text });
        assert!(state.is_editing_text());
        assert!(!effects.iter().any(|e| matches!(e, Effect::Commit(_))));
    }

    #[test]
    fn test_chat_and_reaction_keys() {
        let state = InteractionState::default();
        let (_, effects) = transition(&state, CanvasEvent::KeyUp(KeyEvent::new("/")));
        assert!(matches!(effects.as_slice(), [Effect::OpenChat]));
        let (_, effects) = transition(&state, CanvasEvent::KeyUp(KeyEvent::new("e")));
        assert!(matches!(effects.as_slice(), [Effect::OpenReactionPicker]));
    }

    #[test]
    fn test_removed_selection_returns_to_idle() {
        let handle = crate::testing::rect("r1", 0.0, 0.0, 10.0, 10.0).handle();
        let (state, _) = transition(&InteractionState::default(), CanvasEvent::SelectionCreated { handle });
        let (state, effects) = transition(&state, CanvasEvent::ObjectRemoved(handle));
        assert!(effects.is_empty());
        assert_eq!(state.mode, Mode::Idle);
    }

    #[test]
    fn test_image_loaded_is_committed_and_selected() {
        let object = crate::testing::rect("ignored", 0.0, 0.0, 10.0, 10.0);
        let handle = object.handle();
        let (state, effects) = transition(&armed(Tool::Image), CanvasEvent::ImageLoaded(Box::new(object)));
        assert!(matches!(effects[0], Effect::AddObject(_)));
        assert!(matches!(effects[1], Effect::Commit(h) if h == handle));
        assert_eq!(state.tool, Tool::Select);
        assert_eq!(state.selected(), Some(handle));
    }
}

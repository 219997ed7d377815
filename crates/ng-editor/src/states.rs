//! Interaction finite-state machine.
//!
//! Each [`State`] variant owns the ephemeral data of one gesture and maps
//! an input event to the next state. Only [`State::Idle`] starts new
//! gestures. Live previews (nodes following the cursor, a scrubbed value,
//! a detached wire) mutate the group directly and either converge to one
//! emitted command when the gesture ends or are reverted by
//! [`State::cancel`].

use crate::commands::{
    AddNode, ChangePropertyValue, Composite, CreateConnection, Move, NodeMove, RemoveConnection,
    ResizeNode, ToggleCollapse,
};
use crate::editor::Editor;
use crate::handlers::open_value_editor;
use crate::input::Event;
use crate::selection::{Selection, SelectionMode};
use crate::selector::{SELECT_VALUE, SelectorContext, SelectorTarget, number_value};
use ng_core::model::{CommonValueType, Range, ValueDefinition};
use ng_core::{Connection, Framable, FrameId, Node, NodeId, Point, PropertyRef, Rect};
use ng_render::{NodeHit, NodeShape, PropertyShape, find_connector, frame_at, hit_nodes, nodes_inside};
use serde_json::Value;

// ─── Feedback ────────────────────────────────────────────────────────────

/// Transient overlay the host draws on top of the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    /// Wire being dragged. `valid` when `to` snapped to a connectable port.
    PendingConnection { from: Point, to: Point, valid: bool },
    SelectionBox(Rect),
    Resize(Rect),
    /// Node being placed, not yet part of the group.
    AddNode(NodeShape),
}

// ─── Extension point ─────────────────────────────────────────────────────

pub enum Transition {
    Stay,
    Next(State),
}

/// A gesture supplied from outside the crate, usually started by a custom
/// [`PropertyHandler`](crate::PropertyHandler).
pub trait Gesture {
    fn name(&self) -> &str;

    /// A press during the gesture aborts it by default.
    fn pointer_down(&mut self, editor: &mut Editor, _event: &Event) -> Transition {
        self.cancel(editor);
        Transition::Next(State::Idle)
    }

    fn pointer_move(&mut self, _editor: &mut Editor, _event: &Event) -> Transition {
        Transition::Stay
    }

    fn pointer_up(&mut self, _editor: &mut Editor, _event: &Event) -> Transition {
        Transition::Next(State::Idle)
    }

    fn key_up(&mut self, _editor: &mut Editor, _event: &Event) -> Transition {
        Transition::Stay
    }

    /// Revert any live preview.
    fn cancel(&mut self, _editor: &mut Editor) {}

    fn feedback(&self, _editor: &Editor) -> Option<Feedback> {
        None
    }
}

// ─── States ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub enum State {
    #[default]
    Idle,
    Panning {
        start: Point,
    },
    DragConnection(DragConnection),
    ToggleCollapse {
        node: NodeId,
    },
    MaybeDrag(MaybeDrag),
    DragNodes(DragNodes),
    DragResize(DragResize),
    SelectionBox(SelectionBox),
    AddNode(Box<Node>),
    WaitSelectorClose(SelectorTarget),
    PendingScrub(PendingScrub),
    ScrubValue(ScrubValue),
    PlusMinus(PlusMinus),
    ToggleBoolean {
        property: PropertyRef,
    },
    Custom(Box<dyn Gesture>),
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl State {
    pub fn name(&self) -> &str {
        match self {
            State::Idle => "Idle",
            State::Panning { .. } => "Panning",
            State::DragConnection(_) => "DragConnection",
            State::ToggleCollapse { .. } => "ToggleCollapse",
            State::MaybeDrag(_) => "MaybeDrag",
            State::DragNodes(_) => "DragNodes",
            State::DragResize(_) => "DragResize",
            State::SelectionBox(_) => "SelectionBox",
            State::AddNode(_) => "AddNode",
            State::WaitSelectorClose(_) => "WaitSelectorClose",
            State::PendingScrub(_) => "PendingScrub",
            State::ScrubValue(_) => "ScrubValue",
            State::PlusMinus(_) => "PlusMinus",
            State::ToggleBoolean { .. } => "ToggleBoolean",
            State::Custom(g) => g.name(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, State::Idle)
    }

    pub fn pointer_down(self, editor: &mut Editor, event: &Event) -> State {
        match self {
            State::Idle => idle_pointer_down(editor, event),
            State::Custom(mut g) => resolve(g.pointer_down(editor, event), g),
            // Placement commits on release.
            State::AddNode(node) => State::AddNode(node),
            other => {
                log::trace!("pointer down during {}, cancelling", other.name());
                other.cancel(editor);
                State::Idle
            }
        }
    }

    pub fn pointer_move(self, editor: &mut Editor, event: &Event) -> State {
        match self {
            State::Panning { start } => {
                editor.zoom_mut().move_by(start.sub(event.position));
                State::Panning { start }
            }
            State::DragConnection(mut g) => {
                g.track(editor, event.position);
                State::DragConnection(g)
            }
            State::MaybeDrag(g) => g.pointer_move(editor, event),
            State::DragNodes(mut g) => {
                g.apply(editor, event);
                State::DragNodes(g)
            }
            State::DragResize(mut g) => {
                g.cursor = event.position;
                State::DragResize(g)
            }
            State::SelectionBox(mut g) => {
                g.update(editor, event);
                State::SelectionBox(g)
            }
            State::AddNode(mut node) => {
                node.location = editor.snap(event.position, event);
                State::AddNode(node)
            }
            State::PendingScrub(g) => g.pointer_move(editor, event),
            State::ScrubValue(g) => {
                g.apply(editor, event);
                State::ScrubValue(g)
            }
            State::Custom(mut g) => resolve(g.pointer_move(editor, event), g),
            other => other,
        }
    }

    pub fn pointer_up(self, editor: &mut Editor, event: &Event) -> State {
        match self {
            State::Panning { .. } => State::Idle,
            State::DragConnection(g) => {
                g.release(editor, event.position);
                State::Idle
            }
            State::ToggleCollapse { node } => {
                let command = ToggleCollapse::new(editor.group(), node);
                editor.emit(Box::new(command));
                State::Idle
            }
            State::MaybeDrag(g) => g.pointer_up(editor, event),
            State::DragNodes(g) => {
                g.release(editor, event);
                State::Idle
            }
            State::DragResize(g) => {
                let bounds = g.bounds();
                let command = ResizeNode::new(editor.group(), g.node, bounds.dimension());
                editor.emit(Box::new(command));
                State::Idle
            }
            State::SelectionBox(mut g) => {
                g.update(editor, event);
                State::Idle
            }
            State::AddNode(mut node) => {
                node.location = editor.snap(event.position, event);
                let id = node.id();
                editor.emit(Box::new(AddNode::new(*node)));
                editor.select([Framable::Node(id)], SelectionMode::Replace);
                State::Idle
            }
            State::PendingScrub(g) => g.pointer_up(editor),
            State::ScrubValue(g) => {
                g.release(editor);
                State::Idle
            }
            State::PlusMinus(g) => g.pointer_up(editor, event),
            State::ToggleBoolean { property } => {
                let current = editor
                    .group()
                    .property(&property)
                    .and_then(|p| p.value())
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let command =
                    ChangePropertyValue::new(editor.group(), property, Some(Value::Bool(!current)));
                editor.emit(Box::new(command));
                State::Idle
            }
            State::Custom(mut g) => resolve(g.pointer_up(editor, event), g),
            other => other,
        }
    }

    pub fn wheel(self, editor: &mut Editor, event: &Event) -> State {
        if self.is_idle() && event.delta_y != 0.0 {
            let intensity = editor.config().zoom_intensity;
            let factor = if event.delta_y > 0.0 {
                1.0 / intensity
            } else {
                intensity
            };
            let zoom = editor.zoom_mut();
            let scale = zoom.scale / factor;
            // Keep the model point under the cursor fixed.
            let origin = event.position.sub(event.screen.scale(1.0 / scale));
            zoom.update(origin, scale);
        }
        self
    }

    pub fn key_up(self, editor: &mut Editor, event: &Event) -> State {
        let escape = event.is_key("Escape");
        match self {
            State::Idle => {
                let Some(key) = event.key.as_deref() else {
                    return State::Idle;
                };
                match editor.keymap().resolve(key, event.modifiers) {
                    Some(action) => {
                        let action = action.to_owned();
                        editor.do_action(&action)
                    }
                    None => {
                        log::trace!("no binding for {key} {:?}", event.modifiers);
                        State::Idle
                    }
                }
            }
            State::Custom(mut g) => resolve(g.key_up(editor, event), g),
            State::WaitSelectorClose(_) => self,
            other if escape => {
                other.cancel(editor);
                State::Idle
            }
            other => other,
        }
    }

    /// Abort the gesture, reverting its live preview.
    pub fn cancel(self, editor: &mut Editor) {
        match self {
            State::DragConnection(g) => g.cancel(editor),
            State::DragNodes(g) => g.cancel(editor),
            State::SelectionBox(g) => editor.set_selection(g.original),
            State::ScrubValue(g) => g.cancel(editor),
            State::Custom(mut g) => g.cancel(editor),
            _ => {}
        }
    }

    pub fn feedback(&self, editor: &Editor) -> Option<Feedback> {
        match self {
            State::DragConnection(g) => g.feedback(editor),
            State::DragResize(g) => Some(Feedback::Resize(g.bounds())),
            State::SelectionBox(g) => Some(Feedback::SelectionBox(g.bounds())),
            State::AddNode(node) => Some(Feedback::AddNode(editor.layout().layout_node(node))),
            State::Custom(g) => g.feedback(editor),
            _ => None,
        }
    }
}

fn resolve(transition: Transition, gesture: Box<dyn Gesture>) -> State {
    match transition {
        Transition::Stay => State::Custom(gesture),
        Transition::Next(state) => state,
    }
}

// ─── Idle ────────────────────────────────────────────────────────────────

/// Owned result of hit-testing, so the scene borrow ends before mutation.
enum Target {
    Connector(NodeId, PropertyRef),
    CollapseArrow(NodeId),
    Node(NodeId),
    Property(PropertyShape),
    Resize(NodeId, Point),
    Frame { frame: FrameId, on_label: bool },
    Nothing,
}

fn target_at(editor: &Editor, p: Point) -> Target {
    let scene = editor.scene();
    if let Some((shape, hit)) = hit_nodes(scene, p, editor.style()) {
        let node = shape.node;
        return match hit {
            NodeHit::Connector(row) => Target::Connector(node, row.property),
            NodeHit::CollapseArrow => Target::CollapseArrow(node),
            NodeHit::Label | NodeHit::Body => Target::Node(node),
            NodeHit::Property(row) => Target::Property(row.clone()),
            NodeHit::ResizeHandle => Target::Resize(node, shape.bounds.origin()),
        };
    }
    match frame_at(scene, p) {
        Some(frame) => Target::Frame {
            frame: frame.frame,
            on_label: frame.label_bounds.contains(p),
        },
        None => Target::Nothing,
    }
}

fn idle_pointer_down(editor: &mut Editor, event: &Event) -> State {
    if event.modifiers.alt {
        return State::Panning {
            start: event.position,
        };
    }
    let mode = SelectionMode::from_modifiers(event.modifiers);
    match target_at(editor, event.position) {
        Target::Connector(node, property) => {
            editor.select([Framable::Node(node)], SelectionMode::Replace);
            State::DragConnection(DragConnection::grab(editor, property, event.position))
        }
        Target::CollapseArrow(node) => State::ToggleCollapse { node },
        Target::Node(node) => {
            let item = Framable::Node(node);
            if !editor.selection().contains(item) {
                editor.select([item], mode);
            }
            State::MaybeDrag(MaybeDrag::new(event, item, false))
        }
        Target::Property(row) => match editor.property_handler(&row.property) {
            Some(handler) => handler.pointer_down(editor, event, &row),
            None => State::Idle,
        },
        Target::Resize(node, origin) => State::DragResize(DragResize {
            node,
            origin,
            cursor: event.position,
        }),
        Target::Frame { frame, on_label } => {
            let item = Framable::Frame(frame);
            if !editor.selection().contains(item) {
                editor.select([item], mode);
            }
            State::MaybeDrag(MaybeDrag::new(event, item, on_label))
        }
        Target::Nothing => State::SelectionBox(SelectionBox::new(editor, event.position)),
    }
}

// ─── Connections ─────────────────────────────────────────────────────────

pub struct DragConnection {
    /// Fixed end of the wire being dragged.
    from: PropertyRef,
    /// Port the user pressed on.
    grabbed: PropertyRef,
    /// Existing wire detached when the press landed on a connected port.
    previous: Option<Connection>,
    cursor: Point,
    candidate: Option<PropertyRef>,
}

impl DragConnection {
    /// Start dragging from `property`. Pressing a connected port picks up
    /// the loose end of its first wire instead.
    pub fn grab(editor: &mut Editor, property: PropertyRef, cursor: Point) -> Self {
        let existing = editor
            .group()
            .property(&property)
            .and_then(|p| p.connections().first().copied());
        let mut from = property;
        if let Some(connection) = existing {
            editor.group_mut().disconnect(&connection);
            if let Some(opposite) = connection.opposite(&property) {
                // A dynamic sub-property disappears with its last wire.
                from = if editor.group().property(&opposite).is_some() {
                    opposite
                } else {
                    opposite.template()
                };
            }
        }
        Self {
            from,
            grabbed: property,
            previous: existing,
            cursor,
            candidate: None,
        }
    }

    fn valid_target(&self, editor: &Editor, p: Point) -> Option<PropertyRef> {
        let radius = editor.style().connector_radius;
        find_connector(editor.scene(), p, radius)
            .map(|row| row.property)
            .filter(|target| editor.can_connect(&self.from, target))
    }

    fn track(&mut self, editor: &Editor, p: Point) {
        self.cursor = p;
        self.candidate = self.valid_target(editor, p);
    }

    fn release(self, editor: &mut Editor, p: Point) {
        let target = self.valid_target(editor, p);
        match (self.previous, target) {
            (None, Some(to)) => editor.emit(Box::new(CreateConnection::new(self.from, to))),
            (None, None) => {}
            (Some(previous), None) => editor.emit(Box::new(RemoveConnection::new(previous))),
            (Some(previous), Some(to)) if to.is_related_to(&self.grabbed) => {
                editor.group_mut().connect(&previous);
            }
            (Some(previous), Some(to)) => editor.emit(Box::new(Composite::new(vec![
                Box::new(RemoveConnection::new(previous)),
                Box::new(CreateConnection::new(self.from, to)),
            ]))),
        }
    }

    fn cancel(self, editor: &mut Editor) {
        if let Some(previous) = &self.previous {
            editor.group_mut().connect(previous);
        }
    }

    fn feedback(&self, editor: &Editor) -> Option<Feedback> {
        let scene = editor.scene();
        let from = scene.connector_position(&self.from)?;
        let snapped = self
            .candidate
            .and_then(|c| scene.connector_position(&c));
        Some(Feedback::PendingConnection {
            from,
            to: snapped.unwrap_or(self.cursor),
            valid: snapped.is_some(),
        })
    }
}

// ─── Dragging ────────────────────────────────────────────────────────────

/// Press on a node or frame that may turn into a drag.
pub struct MaybeDrag {
    start: Point,
    start_screen: Point,
    item: Framable,
    /// Pressed on a frame label: a plain click renames the frame.
    rename: bool,
}

impl MaybeDrag {
    pub fn new(event: &Event, item: Framable, rename: bool) -> Self {
        Self {
            start: event.position,
            start_screen: event.screen,
            item,
            rename,
        }
    }

    fn pointer_move(self, editor: &mut Editor, event: &Event) -> State {
        if event.screen.distance(self.start_screen) > editor.config().drag_threshold {
            let mut drag = DragNodes::new(editor, self.start);
            drag.apply(editor, event);
            return State::DragNodes(drag);
        }
        State::MaybeDrag(self)
    }

    fn pointer_up(self, editor: &mut Editor, event: &Event) -> State {
        let mode = SelectionMode::from_modifiers(event.modifiers);
        if let (true, Framable::Frame(frame)) = (self.rename, self.item) {
            let Some(label) = editor.group().frame(frame).map(|f| f.label.clone()) else {
                return State::Idle;
            };
            let Some(shape) = editor.scene().frame(frame) else {
                return State::Idle;
            };
            let at = shape.label_bounds.bottom_left();
            let context = SelectorContext::Value {
                value: Value::String(label),
                value_type: ValueDefinition::of(CommonValueType::String),
            };
            return editor.open_selector(
                at,
                SELECT_VALUE,
                context,
                SelectorTarget::RenameFrame { frame, mode },
            );
        }
        editor.select([self.item], mode);
        State::Idle
    }
}

pub struct DragNodes {
    start: Point,
    origins: Vec<(NodeId, Point)>,
}

impl DragNodes {
    /// Drag every selected node; frames contribute all their nodes.
    pub fn new(editor: &Editor, start: Point) -> Self {
        let group = editor.group();
        let origins = editor
            .selection()
            .nodes(group)
            .into_iter()
            .filter_map(|id| group.node(id).map(|n| (id, n.location)))
            .collect();
        Self { start, origins }
    }

    fn target(&self, editor: &Editor, origin: Point, event: &Event) -> Point {
        editor.snap(origin.add(event.position.sub(self.start)), event)
    }

    fn apply(&mut self, editor: &mut Editor, event: &Event) {
        for &(id, origin) in &self.origins {
            let location = self.target(editor, origin, event);
            if let Some(node) = editor.group_mut().node_mut(id) {
                node.location = location;
            }
        }
    }

    fn release(self, editor: &mut Editor, event: &Event) {
        let moves: Vec<NodeMove> = self
            .origins
            .iter()
            .map(|&(node, start)| NodeMove {
                node,
                start,
                end: self.target(editor, start, event),
            })
            .collect();
        if !moves.is_empty() {
            editor.emit(Box::new(Move::new(moves)));
        }
    }

    fn cancel(self, editor: &mut Editor) {
        for (id, origin) in self.origins {
            if let Some(node) = editor.group_mut().node_mut(id) {
                node.location = origin;
            }
        }
    }
}

pub struct DragResize {
    node: NodeId,
    origin: Point,
    cursor: Point,
}

impl DragResize {
    fn bounds(&self) -> Rect {
        self.origin.rect_to(self.cursor)
    }
}

/// Rubber-band selection.
pub struct SelectionBox {
    start: Point,
    cursor: Point,
    original: Selection,
}

impl SelectionBox {
    pub fn new(editor: &Editor, start: Point) -> Self {
        Self {
            start,
            cursor: start,
            original: editor.selection().clone(),
        }
    }

    fn bounds(&self) -> Rect {
        self.start.rect_to(self.cursor)
    }

    fn update(&mut self, editor: &mut Editor, event: &Event) {
        self.cursor = event.position;
        let inside: Vec<Framable> = nodes_inside(editor.scene(), &self.bounds())
            .into_iter()
            .map(Framable::Node)
            .collect();
        let mut selection = self.original.clone();
        selection.select(inside, SelectionMode::from_modifiers(event.modifiers));
        editor.set_selection(selection);
    }
}

// ─── Property micro-gestures ─────────────────────────────────────────────

/// Press on a ranged number: a drag scrubs, a click opens the editor.
pub struct PendingScrub {
    row: PropertyShape,
    start: Point,
    start_screen: Point,
}

impl PendingScrub {
    pub fn new(event: &Event, row: &PropertyShape) -> Self {
        Self {
            row: row.clone(),
            start: event.position,
            start_screen: event.screen,
        }
    }

    fn pointer_move(self, editor: &mut Editor, event: &Event) -> State {
        if event.screen.distance(self.start_screen) <= editor.config().scrub_threshold {
            return State::PendingScrub(self);
        }
        match ScrubValue::new(editor, &self) {
            Some(scrub) => State::ScrubValue(scrub),
            None => State::Idle,
        }
    }

    fn pointer_up(self, editor: &mut Editor) -> State {
        open_value_editor(editor, &self.row)
    }
}

/// Horizontal drag across a ranged number row; the full row width spans
/// the whole range.
pub struct ScrubValue {
    property: PropertyRef,
    start_x: f32,
    width: f32,
    range: Range,
    integer: bool,
    old: Option<Value>,
}

impl ScrubValue {
    fn new(editor: &Editor, pending: &PendingScrub) -> Option<Self> {
        let property = editor.group().property(&pending.row.property)?;
        let value_type = &property.definition().value_type;
        Some(Self {
            property: pending.row.property,
            start_x: pending.start.x,
            width: pending.row.bounds.width.max(1.0),
            range: value_type.bounded_range()?,
            integer: value_type.value_type.common() == Some(CommonValueType::Integer),
            old: property.value().cloned(),
        })
    }

    fn apply(&self, editor: &mut Editor, event: &Event) {
        let (Some(min), Some(max)) = (self.range.min, self.range.max) else {
            return;
        };
        let start = self.old.as_ref().and_then(Value::as_f64).unwrap_or(min);
        let offset = (max - min) * f64::from(event.position.x - self.start_x) / f64::from(self.width);
        let mut value = self.range.clamp(start + offset);
        if self.integer {
            value = value.round();
        }
        editor
            .group_mut()
            .set_value(&self.property, Some(number_value(value, self.integer)));
    }

    fn release(self, editor: &mut Editor) {
        let current = editor
            .group()
            .property(&self.property)
            .and_then(|p| p.value().cloned());
        editor.group_mut().set_value(&self.property, self.old.clone());
        if current != self.old {
            let command = ChangePropertyValue::new(editor.group(), self.property, current);
            editor.emit(Box::new(command));
        }
    }

    fn cancel(self, editor: &mut Editor) {
        editor.group_mut().set_value(&self.property, self.old);
    }
}

/// Press on an unranged number: release on `-` or `+` steps by one,
/// anywhere else opens the editor.
pub struct PlusMinus {
    row: PropertyShape,
}

impl PlusMinus {
    pub fn new(row: &PropertyShape) -> Self {
        Self { row: row.clone() }
    }

    fn pointer_up(self, editor: &mut Editor, event: &Event) -> State {
        let unit = editor.style().unit;
        let area = self.row.bounds.shrink(unit * 2.0, 0.0);
        let minus = area.origin().rect(unit * 3.5, area.height);
        let plus = area
            .top_right()
            .offset(-unit * 3.5, 0.0)
            .rect(unit * 3.5, area.height);
        let step = if minus.contains(event.position) {
            -1.0
        } else if plus.contains(event.position) {
            1.0
        } else {
            return open_value_editor(editor, &self.row);
        };

        let r = self.row.property;
        let Some(property) = editor.group().property(&r) else {
            return State::Idle;
        };
        let value_type = &property.definition().value_type;
        let integer = value_type.value_type.common() != Some(CommonValueType::Real);
        let range = value_type.range.unwrap_or_default();
        let current = property.value().and_then(Value::as_f64).unwrap_or(0.0);
        let next = range.clamp(current + step);
        if next != current {
            let command = ChangePropertyValue::new(editor.group(), r, Some(number_value(next, integer)));
            editor.emit(Box::new(command));
        }
        State::Idle
    }
}

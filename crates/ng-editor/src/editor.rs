//! The editor: document, history, selection and the interaction state
//! machine behind one event entry point.
//!
//! The host feeds raw [`InputEvent`]s into [`Editor::handle`]. The editor
//! converts them to model coordinates, lets the current [`State`] pick the
//! next one, and keeps the layout [`Scene`] in sync with the group. Every
//! durable change goes through [`Editor::emit`] so that it can be undone.

use crate::commands::{DeleteNodes, JoinInNewFrame, RemoveFromFrame, RenameFrame};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::handlers::{PropertyHandler, default_handlers};
use crate::history::{Command, CommandLog};
use crate::input::{Event, InputEvent};
use crate::keymap::Keymap;
use crate::selection::{Selection, SelectionMode};
use crate::selector::{
    Cancelled, SELECT_TREE, Selector, SelectorContext, SelectorTarget, coerce_value,
    tree_from_definitions,
};
use crate::states::{Feedback, State};
use indexmap::IndexMap;
use ng_core::model::ValueType;
use ng_core::{
    Framable, Group, NodeFactory, PersistedGroup, Point, PropertyRef, ZoomState, load, load_str,
    save, save_string,
};
use ng_render::{BoxLayout, GraphLayout, LayoutStyle, Scene};
use serde_json::Value;
use std::mem;
use std::rc::Rc;

/// A named editor action, bound to keys or run by the host.
pub type Action = Rc<dyn Fn(&mut Editor) -> State>;

pub struct Editor {
    group: Group,
    history: CommandLog<Group>,
    factory: NodeFactory,
    layout: Box<dyn GraphLayout>,
    /// Shapes of the group as of the last refresh.
    scene: Scene,
    dirty: bool,
    selection: Selection,
    state: State,
    config: EditorConfig,
    keymap: Keymap,
    actions: IndexMap<String, Action>,
    selectors: IndexMap<String, Box<dyn Selector>>,
    handlers: IndexMap<ValueType, Rc<dyn PropertyHandler>>,
    /// Last known cursor position, in screen coordinates.
    mouse: Point,
}

impl Editor {
    /// Create an editor over an empty group, with the built-in actions,
    /// property handlers and the keymap from `config`.
    pub fn new(factory: NodeFactory, config: EditorConfig) -> Result<Self, EditorError> {
        let keymap = Keymap::from_pairs(&config.keymap)?;
        let history = CommandLog::new(config.history_limit);
        let layout: Box<dyn GraphLayout> = Box::new(BoxLayout::new(LayoutStyle::default()));
        let group = Group::new();
        let scene = Scene::build(&group, layout.as_ref());

        let mut editor = Self {
            group,
            history,
            factory,
            layout,
            scene,
            dirty: false,
            selection: Selection::new(),
            state: State::Idle,
            config,
            keymap,
            actions: IndexMap::new(),
            selectors: IndexMap::new(),
            handlers: IndexMap::new(),
            mouse: Point::ORIGIN,
        };
        for (value_type, handler) in default_handlers() {
            editor
                .handlers
                .insert(ValueType::Common(value_type), handler);
        }
        editor.register_builtin_actions();
        Ok(editor)
    }

    /// Replace the layout strategy.
    pub fn with_layout(mut self, layout: impl GraphLayout + 'static) -> Self {
        self.layout = Box::new(layout);
        self.dirty = true;
        self.refresh();
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Mutable access for live previews. Bypasses the history.
    pub(crate) fn group_mut(&mut self) -> &mut Group {
        self.dirty = true;
        &mut self.group
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.group.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut ZoomState {
        &mut self.group.zoom
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn layout(&self) -> &dyn GraphLayout {
        self.layout.as_ref()
    }

    pub fn style(&self) -> &LayoutStyle {
        self.layout.style()
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn history(&self) -> &CommandLog<Group> {
        &self.history
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Overlay to draw for the gesture in progress.
    pub fn feedback(&self) -> Option<Feedback> {
        self.state.feedback(self)
    }

    /// Last known cursor position, in model coordinates.
    pub fn mouse(&self) -> Point {
        self.group.zoom.to_model(self.mouse)
    }

    /// Snap `p` to the grid while Shift is held.
    pub fn snap(&self, p: Point, event: &Event) -> Point {
        if event.modifiers.shift {
            p.snap(self.style().snap_size)
        } else {
            p
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select(&mut self, items: impl IntoIterator<Item = Framable>, mode: SelectionMode) {
        self.selection.select(items, mode);
    }

    pub(crate) fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Feed one host event through the state machine.
    pub fn handle(&mut self, input: InputEvent) {
        self.refresh();
        if let Some(p) = input.position() {
            self.mouse = p;
        }
        let screen = self.mouse;
        let mut event = Event::at(self.group.zoom.to_model(screen), screen, input.modifiers());

        let state = mem::take(&mut self.state);
        let before = state.name().to_owned();
        let next = match input {
            InputEvent::PointerDown { .. } => state.pointer_down(self, &event),
            InputEvent::PointerMove { .. } => state.pointer_move(self, &event),
            InputEvent::PointerUp { .. } => state.pointer_up(self, &event),
            InputEvent::Wheel { delta_y, .. } => {
                event.delta_y = delta_y;
                state.wheel(self, &event)
            }
            InputEvent::KeyUp { key, .. } => {
                event.key = Some(key);
                state.key_up(self, &event)
            }
        };
        if next.name() != before {
            log::trace!("{before} -> {}", next.name());
        }
        self.state = next;
        self.refresh();
    }

    fn refresh(&mut self) {
        if self.dirty {
            self.scene = Scene::build(&self.group, self.layout.as_ref());
            self.dirty = false;
        }
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Execute `command` and record it for undo.
    pub fn emit(&mut self, command: Box<dyn Command<Group>>) {
        log::trace!("emit {}", command.describe());
        self.history.emit(&mut self.group, command);
        self.after_change();
    }

    pub fn undo(&mut self) -> Option<String> {
        let undone = self.history.undo(&mut self.group);
        self.after_change();
        undone
    }

    pub fn redo(&mut self) -> Option<String> {
        let redone = self.history.redo(&mut self.group);
        self.after_change();
        redone
    }

    /// Forget the undo history, together with the retired sub-properties
    /// only an undo could have revived.
    pub fn clear_history(&mut self) {
        let state = mem::take(&mut self.state);
        state.cancel(self);
        self.history.clear();
        let pruned = self.group.prune_retired();
        log::debug!("history cleared, {pruned} retired sub-properties dropped");
        self.dirty = true;
        self.refresh();
    }

    fn after_change(&mut self) {
        self.selection.prune(&self.group);
        self.dirty = true;
        self.refresh();
    }

    /// Register a history listener, called with the command's visual flag.
    pub fn add_listener(&mut self, listener: impl FnMut(bool) + 'static) {
        self.history.add_listener(listener);
    }

    pub fn can_connect(&self, a: &PropertyRef, b: &PropertyRef) -> bool {
        self.group.can_connect(a, b)
    }

    // ─── Documents ───────────────────────────────────────────────────────

    /// Replace the document. History and selection start over.
    pub fn load(&mut self, persisted: &PersistedGroup) -> Result<(), EditorError> {
        let group = load(&self.factory, persisted)?;
        self.replace_group(group);
        Ok(())
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), EditorError> {
        let group = load_str(&self.factory, json)?;
        self.replace_group(group);
        Ok(())
    }

    fn replace_group(&mut self, group: Group) {
        let state = mem::take(&mut self.state);
        state.cancel(self);
        self.group = group;
        self.history.clear();
        self.selection.clear();
        self.dirty = true;
        self.refresh();
        log::debug!(
            "loaded {} nodes, {} connections",
            self.group.node_ids().len(),
            self.group.connections().len()
        );
    }

    pub fn save(&self) -> PersistedGroup {
        save(&self.group)
    }

    pub fn save_json(&self) -> Result<String, EditorError> {
        Ok(save_string(&self.group)?)
    }

    // ─── Actions and keys ────────────────────────────────────────────────

    pub fn register_action(&mut self, name: &str, action: impl Fn(&mut Editor) -> State + 'static) {
        self.actions.insert(name.to_owned(), Rc::new(action));
    }

    pub fn bind_key(&mut self, binding: &str, action: &str) -> Result<(), EditorError> {
        Ok(self.keymap.bind(binding, action)?)
    }

    /// Run an action from inside the state machine and return the state
    /// it leads to.
    pub(crate) fn do_action(&mut self, name: &str) -> State {
        let Some(action) = self.actions.get(name).cloned() else {
            log::warn!("unknown action `{name}`");
            return State::Idle;
        };
        log::trace!("action {name}");
        action(self)
    }

    /// Run an action on behalf of the host (menu item, toolbar). Only
    /// allowed while no gesture is in progress; returns whether it ran.
    pub fn run_action(&mut self, name: &str) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        self.state = self.do_action(name);
        self.refresh();
        true
    }

    fn register_builtin_actions(&mut self) {
        self.register_action("undo", |e| {
            e.undo();
            State::Idle
        });
        self.register_action("redo", |e| {
            e.redo();
            State::Idle
        });
        self.register_action("select-all", |e| {
            let all: Vec<Framable> = e.group.node_ids().into_iter().map(Framable::Node).collect();
            e.select(all, SelectionMode::Replace);
            State::Idle
        });
        self.register_action("create-node", |e| {
            let nodes = tree_from_definitions(&e.factory.definitions());
            let at = e.mouse();
            e.open_selector(
                at,
                SELECT_TREE,
                SelectorContext::Tree { nodes },
                SelectorTarget::CreateNode { position: at },
            )
        });
        self.register_action("delete-node", |e| {
            let frames = e.selection.frames();
            let nodes = e.selection.nodes(&e.group);
            if !frames.is_empty() || !nodes.is_empty() {
                let command = DeleteNodes::new(&e.group, &nodes, &frames);
                e.selection.clear();
                e.emit(Box::new(command));
            }
            State::Idle
        });
        self.register_action("join-in-new-frame", |e| {
            let roots = e.selection.roots(&e.group);
            if !roots.is_empty() {
                e.selection.clear();
                e.emit(Box::new(JoinInNewFrame::new(roots)));
            }
            State::Idle
        });
        self.register_action("remove-from-frame", |e| {
            let framed: Vec<Framable> = e
                .selection
                .roots(&e.group)
                .into_iter()
                .filter(|item| e.group.parent_of(*item).is_some())
                .collect();
            if !framed.is_empty() {
                e.selection.clear();
                e.emit(Box::new(RemoveFromFrame::new(framed)));
            }
            State::Idle
        });
    }

    // ─── Property handlers ───────────────────────────────────────────────

    pub fn register_handler(&mut self, value_type: ValueType, handler: impl PropertyHandler + 'static) {
        self.handlers.insert(value_type, Rc::new(handler));
    }

    /// Handler for a press on `property`. Read-only properties have none.
    pub(crate) fn property_handler(&self, property: &PropertyRef) -> Option<Rc<dyn PropertyHandler>> {
        let property = self.group.property(property)?;
        if !property.is_editable() {
            return None;
        }
        self.handlers
            .get(&property.definition().value_type.value_type)
            .cloned()
    }

    // ─── Selectors ───────────────────────────────────────────────────────

    pub fn register_selector(&mut self, name: &str, selector: impl Selector + 'static) {
        self.selectors.insert(name.to_owned(), Box::new(selector));
    }

    /// Ask the selector `name` to open at model point `at` and wait for
    /// [`settle_selector`](Self::settle_selector).
    pub fn open_selector(
        &mut self,
        at: Point,
        name: &str,
        context: SelectorContext,
        target: SelectorTarget,
    ) -> State {
        let screen = self.group.zoom.to_screen(at);
        let Some(selector) = self.selectors.get_mut(name) else {
            log::warn!("no selector registered as `{name}`");
            return State::Idle;
        };
        if selector.open(screen, &context) {
            State::WaitSelectorClose(target)
        } else {
            State::Idle
        }
    }

    /// Deliver the result of the open selector. A result that does not fit
    /// the target is dropped. Fails only when a picked node type is unknown.
    pub fn settle_selector(&mut self, result: Result<Value, Cancelled>) -> Result<(), EditorError> {
        let target = match mem::take(&mut self.state) {
            State::WaitSelectorClose(target) => target,
            other => {
                log::warn!("selector settled while {}", other.name());
                self.state = other;
                return Ok(());
            }
        };
        let Ok(value) = result else {
            log::trace!("selector cancelled");
            return Ok(());
        };
        let next = match target {
            SelectorTarget::SetValue(r) => {
                self.apply_value(r, value);
                State::Idle
            }
            SelectorTarget::RenameFrame { frame, mode } => {
                match value.as_str() {
                    Some(label) if self.group.frame(frame).is_some_and(|f| f.label != label) => {
                        let command = RenameFrame::new(&self.group, frame, label);
                        self.emit(Box::new(command));
                    }
                    Some(_) => {}
                    None => log::debug!("frame label must be a string, got {value}"),
                }
                self.select([Framable::Frame(frame)], mode);
                State::Idle
            }
            SelectorTarget::CreateNode { position } => {
                let Some(type_id) = value.as_str() else {
                    log::debug!("node type must be a string, got {value}");
                    return Ok(());
                };
                let node = self.factory.create_node(type_id, position)?;
                self.selection.clear();
                State::AddNode(Box::new(node))
            }
        };
        self.state = next;
        self.refresh();
        Ok(())
    }

    fn apply_value(&mut self, r: PropertyRef, value: Value) {
        let Some(property) = self.group.property(&r) else {
            return;
        };
        let Some(value) = coerce_value(&property.definition().value_type, value) else {
            log::debug!("rejected value for {}", r.path());
            return;
        };
        if property.value() == Some(&value) {
            return;
        }
        let command = crate::commands::ChangePropertyValue::new(&self.group, r, Some(value));
        self.emit(Box::new(command));
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.state)
            .field("selection", &self.selection)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

//! WASM bridge for the node graph editor.
//!
//! Compiled via `wasm-pack build --target web`. The page owns the canvas
//! and the pickers: it forwards DOM events here, draws the JSON returned by
//! [`GraphCanvas::scene_json`], and shows a picker for every request drained
//! with [`GraphCanvas::take_selector_requests`].

mod snapshot;

pub use snapshot::SceneSnapshot;

use ng_core::{DefaultRegistry, NodeFactory, Point};
use ng_editor::selector::{SELECT_TREE, SELECT_VALUE};
use ng_editor::{Cancelled, Editor, EditorConfig, InputEvent, Modifiers, Selector, SelectorContext};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// A picker the page has been asked to show.
#[derive(Debug, Clone, Serialize)]
pub struct SelectorRequest {
    pub name: String,
    /// Screen position to anchor the picker at.
    pub position: Point,
    pub context: SelectorContext,
}

type Requests = Rc<RefCell<Vec<SelectorRequest>>>;

/// Forwards every open request to the page through a shared queue.
struct QueuedSelector {
    name: &'static str,
    requests: Requests,
}

impl Selector for QueuedSelector {
    fn open(&mut self, position: Point, context: &SelectorContext) -> bool {
        self.requests.borrow_mut().push(SelectorRequest {
            name: self.name.to_owned(),
            position,
            context: context.clone(),
        });
        true
    }
}

#[wasm_bindgen]
pub struct GraphCanvas {
    editor: Editor,
    requests: Requests,
    /// Set by the history listener: `Some(visual)` after a change.
    changed: Rc<RefCell<Option<bool>>>,
}

#[wasm_bindgen]
impl GraphCanvas {
    /// Create a canvas for the node types in `definitions_json` (a JSON
    /// array of node definitions). `config_json` may be empty for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(definitions_json: &str, config_json: &str) -> Result<GraphCanvas, JsValue> {
        console_error_panic_hook_setup();
        Self::build(definitions_json, config_json).map_err(|e| JsValue::from_str(&e))
    }

    /// Replace the document. Returns `false` (and logs) when it does not load.
    pub fn load(&mut self, json: &str) -> bool {
        match self.editor.load_json(json) {
            Ok(()) => true,
            Err(e) => {
                log::error!("load failed: {e}");
                false
            }
        }
    }

    /// Serialize the document, or an empty string on failure.
    pub fn save(&self) -> String {
        self.editor.save_json().unwrap_or_else(|e| {
            log::error!("save failed: {e}");
            String::new()
        })
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub fn handle_pointer_down(&mut self, x: f32, y: f32, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        let modifiers = modifiers(shift, ctrl, alt, meta);
        self.editor.handle(InputEvent::pointer_down(x, y, modifiers));
    }

    pub fn handle_pointer_move(&mut self, x: f32, y: f32, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        let modifiers = modifiers(shift, ctrl, alt, meta);
        self.editor.handle(InputEvent::pointer_move(x, y, modifiers));
    }

    pub fn handle_pointer_up(&mut self, x: f32, y: f32, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        let modifiers = modifiers(shift, ctrl, alt, meta);
        self.editor.handle(InputEvent::pointer_up(x, y, modifiers));
    }

    pub fn handle_wheel(&mut self, x: f32, y: f32, delta_y: f32) {
        self.editor.handle(InputEvent::Wheel {
            x,
            y,
            delta_y,
            modifiers: Modifiers::NONE,
        });
    }

    pub fn handle_key_up(&mut self, key: &str, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        let modifiers = modifiers(shift, ctrl, alt, meta);
        self.editor.handle(InputEvent::key_up(key, modifiers));
    }

    /// Handle an event given as JSON, e.g.
    /// `{"type":"pointer_down","x":10,"y":20,"modifiers":{"shift":true}}`.
    pub fn handle_event(&mut self, json: &str) -> bool {
        match serde_json::from_str::<InputEvent>(json) {
            Ok(event) => {
                self.editor.handle(event);
                true
            }
            Err(e) => {
                log::warn!("ignoring malformed event: {e}");
                false
            }
        }
    }

    // ─── Pickers ─────────────────────────────────────────────────────────

    /// Drain pending picker requests as a JSON array.
    pub fn take_selector_requests(&mut self) -> String {
        let requests = std::mem::take(&mut *self.requests.borrow_mut());
        serde_json::to_string(&requests).unwrap_or_else(|_| "[]".to_string())
    }

    /// Deliver the picked value (JSON). Returns `false` if it was rejected.
    pub fn resolve_selector(&mut self, value_json: &str) -> bool {
        let value = match serde_json::from_str(value_json) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("picker returned malformed JSON: {e}");
                return self.cancel_selector();
            }
        };
        match self.editor.settle_selector(Ok(value)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }

    /// The page closed the picker without a value.
    pub fn cancel_selector(&mut self) -> bool {
        self.editor.settle_selector(Err(Cancelled)).is_ok()
    }

    // ─── History and actions ─────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        self.editor.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.editor.redo().is_some()
    }

    /// Run a named action (menu, toolbar). `false` while a gesture is active.
    pub fn run_action(&mut self, name: &str) -> bool {
        self.editor.run_action(name)
    }

    /// Whether the document changed since the last call, as
    /// `"none"`, `"visual"` (layout only) or `"model"`.
    pub fn take_change(&mut self) -> String {
        match self.changed.borrow_mut().take() {
            None => "none",
            Some(true) => "visual",
            Some(false) => "model",
        }
        .to_string()
    }

    /// Call `callback(visual: boolean)` after every emit, undo and redo.
    pub fn on_change(&mut self, callback: js_sys::Function) {
        self.editor.add_listener(move |visual| {
            let _ = callback.call1(&JsValue::NULL, &JsValue::from_bool(visual));
        });
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    /// Everything the page needs to draw one frame, as JSON.
    pub fn scene_json(&self) -> String {
        serde_json::to_string(&SceneSnapshot::capture(&self.editor)).unwrap_or_else(|e| {
            log::error!("scene snapshot failed: {e}");
            "{}".to_string()
        })
    }

    pub fn state_name(&self) -> String {
        self.editor.state().name().to_owned()
    }
}

impl GraphCanvas {
    fn build(definitions_json: &str, config_json: &str) -> Result<Self, String> {
        let registry = DefaultRegistry::from_json(definitions_json).map_err(|e| e.to_string())?;
        let config: EditorConfig = if config_json.trim().is_empty() {
            EditorConfig::default()
        } else {
            serde_json::from_str(config_json).map_err(|e| e.to_string())?
        };
        let mut editor =
            Editor::new(NodeFactory::new(registry), config).map_err(|e| e.to_string())?;

        let requests = Requests::default();
        for name in [SELECT_VALUE, SELECT_TREE] {
            editor.register_selector(
                name,
                QueuedSelector {
                    name,
                    requests: requests.clone(),
                },
            );
        }
        let changed: Rc<RefCell<Option<bool>>> = Rc::default();
        let sink = changed.clone();
        editor.add_listener(move |visual| {
            let mut slot = sink.borrow_mut();
            // A model change outranks layout-only ones.
            *slot = Some(slot.unwrap_or(true) && visual);
        });

        Ok(Self {
            editor,
            requests,
            changed,
        })
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }
}

fn modifiers(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers {
        shift,
        ctrl,
        alt,
        meta,
    }
}

/// Forward panics to the browser console.
fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("node graph WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    const DEFINITIONS: &str = r#"[
        { "id": "source", "label": "Source", "properties": [
            { "type": "OUTPUT", "id": "out", "label": "Out", "linkable": true, "valueType": { "type": "string" } }
        ] },
        { "id": "sink", "label": "Sink", "properties": [
            { "type": "INPUT", "id": "in", "label": "In", "linkable": true, "editable": true, "valueType": { "type": "string" } }
        ] }
    ]"#;

    const GRAPH: &str = r#"{
        "nodes": [
            { "id": "a", "type": "source", "location": { "x": 0, "y": 0 } },
            { "id": "b", "type": "sink", "location": { "x": 300, "y": 0 } }
        ],
        "connections": [
            { "from": { "node": "a", "property": "out" }, "to": { "node": "b", "property": "in" } }
        ]
    }"#;

    fn canvas() -> GraphCanvas {
        let mut canvas = GraphCanvas::build(DEFINITIONS, "").expect("valid definitions");
        assert!(canvas.load(GRAPH));
        canvas
    }

    #[test]
    fn scene_lists_nodes_and_wires() {
        let canvas = canvas();
        let scene: Value = serde_json::from_str(&canvas.scene_json()).unwrap();
        assert_eq!(scene["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(scene["nodes"][0]["id"], "a");
        assert_eq!(scene["connections"].as_array().unwrap().len(), 1);
        assert_eq!(scene["state"], "Idle");
        assert_eq!(scene["canUndo"], false);
    }

    #[test]
    fn picker_requests_are_queued_and_settled() {
        let mut canvas = canvas();
        canvas.handle_key_up("A", true, false, false, false);
        let requests: Value = serde_json::from_str(&canvas.take_selector_requests()).unwrap();
        assert_eq!(requests[0]["name"], "select-tree");
        assert_eq!(requests[0]["context"]["kind"], "tree");
        assert_eq!(canvas.take_selector_requests(), "[]");

        assert!(canvas.resolve_selector(r#""sink""#));
        assert_eq!(canvas.state_name(), "AddNode");
        canvas.handle_pointer_down(600.0, 300.0, false, false, false, false);
        canvas.handle_pointer_up(600.0, 300.0, false, false, false, false);
        assert_eq!(canvas.editor().group().node_ids().len(), 3);
        assert_eq!(canvas.take_change(), "model");
        assert_eq!(canvas.take_change(), "none");
    }

    #[test]
    fn events_round_trip_through_json() {
        let mut canvas = canvas();
        assert!(canvas.handle_event(r#"{"type":"pointer_down","x":100,"y":20}"#));
        assert!(canvas.handle_event(r#"{"type":"pointer_move","x":160,"y":20}"#));
        assert!(canvas.handle_event(r#"{"type":"pointer_up","x":160,"y":20}"#));
        assert!(!canvas.handle_event(r#"{"type":"teleport"}"#));
        assert_eq!(canvas.take_change(), "visual");
        assert!(canvas.undo());
        assert!(!canvas.undo());
    }

    #[test]
    fn broken_documents_are_rejected() {
        let mut canvas = canvas();
        assert!(!canvas.load(r#"{ "nodes": [ { "id": "x", "type": "nope", "location": {} } ] }"#));
        assert_eq!(canvas.editor().group().node_ids().len(), 2);
    }
}

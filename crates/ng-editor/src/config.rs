use serde::{Deserialize, Serialize};

/// Tunables of the interaction controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of undoable commands kept.
    pub history_limit: usize,
    /// Screen distance a press must travel before it becomes a drag.
    pub drag_threshold: f32,
    /// Screen distance a press on a ranged number must travel before scrubbing.
    pub scrub_threshold: f32,
    /// Per-notch wheel zoom factor (< 1).
    pub zoom_intensity: f32,
    /// Ordered `(binding, action)` pairs; the first match wins.
    pub keymap: Vec<(String, String)>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let keymap = [
            ("ctrl z", "undo"),
            ("ctrl y", "redo"),
            ("shift B", "select-all"),
            ("shift A", "create-node"),
            ("Delete", "delete-node"),
            ("shift J", "join-in-new-frame"),
            ("alt p", "remove-from-frame"),
        ]
        .into_iter()
        .map(|(binding, action)| (binding.to_owned(), action.to_owned()))
        .collect();
        Self {
            history_limit: 20,
            drag_threshold: 3.0,
            scrub_threshold: 5.0,
            zoom_intensity: 0.9,
            keymap,
        }
    }
}

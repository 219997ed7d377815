pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod handlers;
pub mod history;
pub mod input;
pub mod keymap;
pub mod selection;
pub mod selector;
pub mod states;

pub use config::EditorConfig;
pub use editor::{Action, Editor};
pub use error::EditorError;
pub use handlers::PropertyHandler;
pub use history::{Command, CommandLog};
pub use input::{Event, InputEvent, Modifiers};
pub use keymap::{KeyBinding, Keymap, KeymapError};
pub use selection::{Selection, SelectionMode};
pub use selector::{Cancelled, Selector, SelectorContext, SelectorTarget, TreeEntry};
pub use states::{Feedback, Gesture, State, Transition};

//! Input abstraction layer.
//!
//! Hosts translate DOM pointer, wheel and keyboard events into
//! [`InputEvent`]s in screen (canvas pixel) coordinates. The editor maps
//! them into model space before any gesture state sees them.

use ng_core::Point;
use serde::{Deserialize, Serialize};

/// Keyboard modifier state at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };

    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };

    /// True when every modifier held in `required` is also held here.
    /// Extra modifiers are allowed.
    pub fn contains(self, required: Modifiers) -> bool {
        (!required.shift || self.shift)
            && (!required.ctrl || self.ctrl)
            && (!required.alt || self.alt)
            && (!required.meta || self.meta)
    }

    pub fn union(self, other: Modifiers) -> Modifiers {
        Modifiers {
            shift: self.shift || other.shift,
            ctrl: self.ctrl || other.ctrl,
            alt: self.alt || other.alt,
            meta: self.meta || other.meta,
        }
    }
}

/// A raw input event, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown {
        x: f32,
        y: f32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        x: f32,
        y: f32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        x: f32,
        y: f32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Mouse wheel; positive `delta_y` scrolls down (zooms out).
    Wheel {
        x: f32,
        y: f32,
        delta_y: f32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Key released. `key` is the DOM `KeyboardEvent.key` value.
    KeyUp {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
}

impl InputEvent {
    pub fn pointer_down(x: f32, y: f32, modifiers: Modifiers) -> Self {
        Self::PointerDown { x, y, modifiers }
    }

    pub fn pointer_move(x: f32, y: f32, modifiers: Modifiers) -> Self {
        Self::PointerMove { x, y, modifiers }
    }

    pub fn pointer_up(x: f32, y: f32, modifiers: Modifiers) -> Self {
        Self::PointerUp { x, y, modifiers }
    }

    pub fn key_up(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self::KeyUp {
            key: key.into(),
            modifiers,
        }
    }

    /// Screen position, if this is a pointer or wheel event.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y, .. }
            | Self::Wheel { x, y, .. } => Some(Point::new(*x, *y)),
            Self::KeyUp { .. } => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Wheel { modifiers, .. }
            | Self::KeyUp { modifiers, .. } => *modifiers,
        }
    }
}

/// An event as seen by gesture states: both coordinate spaces resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Cursor in model coordinates.
    pub position: Point,
    /// Cursor in screen coordinates.
    pub screen: Point,
    pub modifiers: Modifiers,
    pub delta_y: f32,
    pub key: Option<String>,
}

impl Event {
    pub fn at(position: Point, screen: Point, modifiers: Modifiers) -> Self {
        Self {
            position,
            screen,
            modifiers,
            delta_y: 0.0,
            key: None,
        }
    }

    pub fn is_key(&self, key: &str) -> bool {
        self.key.as_deref() == Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_allows_extra_modifiers() {
        let held = Modifiers::CTRL.union(Modifiers::SHIFT);
        assert!(held.contains(Modifiers::CTRL));
        assert!(held.contains(Modifiers::NONE));
        assert!(!Modifiers::CTRL.contains(held));
    }

    #[test]
    fn events_deserialize_from_host_json() {
        let event: InputEvent =
            serde_json::from_str(r#"{"type":"pointer_down","x":3,"y":4,"modifiers":{"shift":true}}"#)
                .unwrap();
        assert_eq!(event.position(), Some(Point::new(3.0, 4.0)));
        assert_eq!(event.modifiers(), Modifiers::SHIFT);

        let key: InputEvent = serde_json::from_str(r#"{"type":"key_up","key":"Delete"}"#).unwrap();
        assert_eq!(key, InputEvent::key_up("Delete", Modifiers::NONE));
    }
}

//! Property micro-gestures.
//!
//! A press on a property row is delegated to the handler registered for
//! the property's value type. Handlers only decide which gesture starts;
//! the gestures themselves are [`State`] variants.

use crate::editor::Editor;
use crate::input::Event;
use crate::selector::{SELECT_TREE, SELECT_VALUE, SelectorContext, SelectorTarget, tree_from_enums};
use crate::states::{PendingScrub, PlusMinus, State};
use ng_core::model::CommonValueType;
use ng_core::{Point, Rect};
use ng_render::PropertyShape;
use serde_json::Value;

pub trait PropertyHandler {
    /// Start a gesture for a press at `event` on `row`.
    fn pointer_down(&self, editor: &mut Editor, event: &Event, row: &PropertyShape) -> State;
}

/// Area of a row that reacts to presses: the row minus its connector margins.
pub(crate) fn active_area(editor: &Editor, row: &PropertyShape) -> Rect {
    row.bounds.shrink(editor.style().unit * 2.0, 0.0)
}

/// Open the inline value editor below a row.
pub(crate) fn open_value_editor(editor: &mut Editor, row: &PropertyShape) -> State {
    let Some(property) = editor.group().property(&row.property) else {
        return State::Idle;
    };
    let context = SelectorContext::Value {
        value: property.value().cloned().unwrap_or(Value::Null),
        value_type: property.definition().value_type.clone(),
    };
    let at = row.bounds.bottom_left();
    editor.open_selector(at, SELECT_VALUE, context, SelectorTarget::SetValue(row.property))
}

// ─── Built-ins ───────────────────────────────────────────────────────────

/// Integers and reals: drag-scrub when the range is bounded, otherwise
/// `-`/`+` steppers at the row ends.
pub struct NumberHandler;

impl PropertyHandler for NumberHandler {
    fn pointer_down(&self, editor: &mut Editor, event: &Event, row: &PropertyShape) -> State {
        if !active_area(editor, row).contains(event.position) {
            return State::Idle;
        }
        let Some(property) = editor.group().property(&row.property) else {
            return State::Idle;
        };
        match property.definition().value_type.bounded_range() {
            Some(_) => State::PendingScrub(PendingScrub::new(event, row)),
            None => State::PlusMinus(PlusMinus::new(row)),
        }
    }
}

pub struct StringHandler;

impl PropertyHandler for StringHandler {
    fn pointer_down(&self, editor: &mut Editor, event: &Event, row: &PropertyShape) -> State {
        if active_area(editor, row).contains(event.position) {
            open_value_editor(editor, row)
        } else {
            State::Idle
        }
    }
}

/// Labels are only editable on dynamic sub-properties, where the value
/// is the sub-property's display name.
pub struct LabelHandler;

impl PropertyHandler for LabelHandler {
    fn pointer_down(&self, editor: &mut Editor, event: &Event, row: &PropertyShape) -> State {
        let is_sub = editor
            .group()
            .property(&row.property)
            .is_some_and(|p| p.parent().is_some());
        if is_sub && active_area(editor, row).contains(event.position) {
            open_value_editor(editor, row)
        } else {
            State::Idle
        }
    }
}

pub struct EnumHandler;

impl PropertyHandler for EnumHandler {
    fn pointer_down(&self, editor: &mut Editor, _event: &Event, row: &PropertyShape) -> State {
        let Some(property) = editor.group().property(&row.property) else {
            return State::Idle;
        };
        let nodes = tree_from_enums(&property.definition().value_type.enum_values);
        editor.open_selector(
            row.bounds.bottom_left(),
            SELECT_TREE,
            SelectorContext::Tree { nodes },
            SelectorTarget::SetValue(row.property),
        )
    }
}

pub struct BooleanHandler;

impl BooleanHandler {
    pub fn checkbox(origin: Point, unit: f32) -> Rect {
        origin.offset(unit * 2.0, 0.0).rect(unit * 3.0, unit * 3.0)
    }
}

impl PropertyHandler for BooleanHandler {
    fn pointer_down(&self, editor: &mut Editor, event: &Event, row: &PropertyShape) -> State {
        let checkbox = Self::checkbox(row.bounds.origin(), editor.style().unit);
        if checkbox.contains(event.position) {
            State::ToggleBoolean {
                property: row.property,
            }
        } else {
            State::Idle
        }
    }
}

/// The handlers installed by [`Editor::new`].
pub fn default_handlers() -> Vec<(CommonValueType, std::rc::Rc<dyn PropertyHandler>)> {
    use std::rc::Rc;
    let number: Rc<dyn PropertyHandler> = Rc::new(NumberHandler);
    vec![
        (CommonValueType::Integer, number.clone()),
        (CommonValueType::Real, number),
        (CommonValueType::String, Rc::new(StringHandler)),
        (CommonValueType::Label, Rc::new(LabelHandler)),
        (CommonValueType::Enum, Rc::new(EnumHandler)),
        (CommonValueType::Boolean, Rc::new(BooleanHandler)),
    ]
}

//! Asynchronous pickers owned by the host.
//!
//! Some gestures need a value the canvas cannot provide: a typed-in
//! number, a new frame label, a node type from the palette. The editor
//! asks a registered [`Selector`] to open, parks in
//! `State::WaitSelectorClose`, and resumes when the host calls
//! [`Editor::settle_selector`](crate::Editor::settle_selector).

use ng_core::model::{CommonValueType, EnumValue, NodeDefinition, ValueDefinition};
use ng_core::{FrameId, Point, PropertyRef};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::selection::SelectionMode;

pub const SELECT_VALUE: &str = "select-value";
pub const SELECT_TREE: &str = "select-tree";

/// The user dismissed the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// One entry of a tree picker. Leaves resolve to their `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEntry {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeEntry>,
}

impl TreeEntry {
    pub fn leaf(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// What the picker should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorContext {
    /// Edit one value inline.
    Value {
        value: Value,
        #[serde(rename = "valueType")]
        value_type: ValueDefinition,
    },
    /// Pick a leaf of a tree.
    Tree { nodes: Vec<TreeEntry> },
}

/// A host-side picker.
pub trait Selector {
    /// Show the picker at `position`, in screen coordinates. Returns
    /// `false` if it cannot open, in which case no result will follow.
    fn open(&mut self, position: Point, context: &SelectorContext) -> bool;
}

/// What to do with the value once the picker settles.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorTarget {
    SetValue(PropertyRef),
    RenameFrame { frame: FrameId, mode: SelectionMode },
    /// Create a node of the picked type and let the user place it.
    CreateNode { position: Point },
}

/// Palette tree: definitions grouped by their `/`-separated categories.
pub fn tree_from_definitions(definitions: &[Arc<NodeDefinition>]) -> Vec<TreeEntry> {
    let mut roots: Vec<TreeEntry> = Vec::new();
    for def in definitions {
        let mut level = &mut roots;
        let path = def.categories.as_deref().unwrap_or_default();
        for category in path.split('/').map(str::trim).filter(|c| !c.is_empty()) {
            let pos = match level
                .iter()
                .position(|e| !e.is_leaf() && e.name == category)
            {
                Some(pos) => pos,
                None => {
                    level.push(TreeEntry {
                        name: category.to_owned(),
                        title: category.to_owned(),
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = &mut level[pos].children;
        }
        level.push(TreeEntry::leaf(def.id.clone(), def.label.clone()));
    }
    roots
}

pub fn tree_from_enums(values: &[EnumValue]) -> Vec<TreeEntry> {
    values
        .iter()
        .map(|v| TreeEntry::leaf(v.name.clone(), v.label.clone()))
        .collect()
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Number value of the right JSON shape for the value type.
pub fn number_value(x: f64, integer: bool) -> Value {
    if integer {
        Value::from(x.round() as i64)
    } else {
        serde_json::Number::from_f64(x).map_or(Value::Null, Value::Number)
    }
}

/// Convert a picker result to the property's value type. Returns `None`
/// when the input does not fit (not a number, outside the range, unknown
/// enum name).
pub fn coerce_value(definition: &ValueDefinition, value: Value) -> Option<Value> {
    let in_range = |x: f64| {
        definition
            .range
            .is_none_or(|r| r.min.is_none_or(|min| x >= min) && r.max.is_none_or(|max| x <= max))
    };
    match definition.value_type.common() {
        Some(CommonValueType::Integer) => {
            let x = as_number(&value)?;
            (x.fract() == 0.0 && in_range(x)).then(|| number_value(x, true))
        }
        Some(CommonValueType::Real) => {
            let x = as_number(&value)?;
            in_range(x).then(|| number_value(x, false))
        }
        Some(CommonValueType::Boolean) => match value {
            Value::Bool(_) => Some(value),
            Value::String(s) => s.trim().parse::<bool>().ok().map(Value::Bool),
            _ => None,
        },
        Some(CommonValueType::Enum) => {
            let name = value.as_str()?;
            let known = definition.enum_values.is_empty()
                || definition.enum_values.iter().any(|v| v.name == name);
            known.then_some(value)
        }
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_core::model::Range;
    use pretty_assertions::assert_eq;

    fn def(id: &str, categories: Option<&str>) -> Arc<NodeDefinition> {
        Arc::new(NodeDefinition {
            id: id.into(),
            label: id.to_uppercase(),
            categories: categories.map(str::to_owned),
            properties: Vec::new(),
            preview: false,
        })
    }

    #[test]
    fn definitions_are_grouped_by_category_path() {
        let tree = tree_from_definitions(&[
            def("blur", Some("Filters/Blur")),
            def("sharpen", Some("Filters")),
            def("load", None),
            def("box", Some("Filters/Blur")),
        ]);
        let names: Vec<&str> = tree.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Filters", "load"]);
        let filters = &tree[0];
        assert_eq!(filters.children.len(), 2);
        assert_eq!(filters.children[0].name, "Blur");
        assert_eq!(
            filters.children[0].children,
            vec![TreeEntry::leaf("blur", "BLUR"), TreeEntry::leaf("box", "BOX")]
        );
        assert_eq!(filters.children[1], TreeEntry::leaf("sharpen", "SHARPEN"));
    }

    #[test]
    fn coerce_numbers() {
        let mut int = ValueDefinition::of(CommonValueType::Integer);
        int.range = Some(Range {
            min: Some(0.0),
            max: Some(10.0),
        });
        assert_eq!(coerce_value(&int, Value::from("7")), Some(Value::from(7)));
        assert_eq!(coerce_value(&int, Value::from("7.5")), None);
        assert_eq!(coerce_value(&int, Value::from(11)), None);
        assert_eq!(coerce_value(&int, Value::from("abc")), None);

        let real = ValueDefinition::of(CommonValueType::Real);
        assert_eq!(coerce_value(&real, Value::from(" 2.5")), Some(Value::from(2.5)));
    }

    #[test]
    fn coerce_enum_checks_names() {
        let mut e = ValueDefinition::of(CommonValueType::Enum);
        e.enum_values = vec![EnumValue {
            name: "linear".into(),
            label: "Linear".into(),
        }];
        assert_eq!(coerce_value(&e, Value::from("linear")), Some(Value::from("linear")));
        assert_eq!(coerce_value(&e, Value::from("cubic")), None);
    }

    #[test]
    fn context_serializes_for_the_host() {
        let ctx = SelectorContext::Value {
            value: Value::from(3),
            value_type: ValueDefinition::of(CommonValueType::Integer),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["kind"], "value");
        assert_eq!(json["valueType"]["type"], "integer");
    }
}

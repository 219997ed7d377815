//! Node and frame geometry.
//!
//! A [`GraphLayout`] turns a model [`Node`] into a [`NodeShape`]: absolute
//! bounds, the header strip, the collapse arrow, and one row per visible
//! property with its connector point. The controller only ever asks
//! geometric questions of these shapes, so a host with real text metrics
//! can swap in its own layout.

use crate::style::LayoutStyle;
use ng_core::{FrameId, Node, NodeId, Point, PortKind, Property, PropertyRef, Rect};
use ng_core::model::CommonValueType;
use std::f32::consts::PI;

// ─── Shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyShape {
    pub property: PropertyRef,
    pub kind: PortKind,
    /// Row bounds in model coordinates. Empty for collapsed nodes.
    pub bounds: Rect,
    /// Connector center, present only for linkable ports.
    pub connector: Option<Point>,
}

impl PropertyShape {
    pub fn is_input(&self) -> bool {
        !self.kind.is_output()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub node: NodeId,
    pub collapsed: bool,
    pub bounds: Rect,
    pub label_bounds: Rect,
    pub collapse_arrow: Point,
    /// Sub-properties precede their template, outputs precede inputs.
    pub properties: Vec<PropertyShape>,
}

impl NodeShape {
    pub fn collapse_arrow_bounds(&self, size: f32) -> Rect {
        Rect::centered(self.collapse_arrow, size)
    }

    /// Center of the resize handle: the bottom-right corner, pulled in by one corner radius.
    pub fn resize_handle(&self, radius: f32) -> Point {
        self.bounds.corner().offset(-radius, -radius)
    }

    pub fn property(&self, r: &PropertyRef) -> Option<&PropertyShape> {
        self.properties.iter().find(|p| p.property == *r)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameShape {
    pub frame: FrameId,
    pub bounds: Rect,
    pub label_bounds: Rect,
    pub label: String,
}

// ─── Layout contract ─────────────────────────────────────────────────────

pub trait GraphLayout {
    fn style(&self) -> &LayoutStyle;

    fn layout_node(&self, node: &Node) -> NodeShape;

    /// Frame bounds from the bounds of its direct children; `None` when empty.
    fn layout_frame(&self, frame: FrameId, label: &str, children: &[Rect]) -> Option<FrameShape> {
        let style = self.style();
        let (first, rest) = children.split_first()?;
        let union = rest.iter().fold(*first, |acc, r| acc.union(r));
        let margin = 20.0;
        let bounds = union
            .expand(margin, margin)
            .move_origin(0.0, margin - style.header_height);
        Some(FrameShape {
            frame,
            label_bounds: bounds.with_height(style.unit * 3.0),
            bounds,
            label: label.to_owned(),
        })
    }
}

// ─── Box layout ──────────────────────────────────────────────────────────

/// Default layout: header, output rows, optional preview, input rows.
#[derive(Debug, Clone, Default)]
pub struct BoxLayout {
    style: LayoutStyle,
}

impl BoxLayout {
    pub fn new(style: LayoutStyle) -> Self {
        Self { style }
    }

    fn rows(node: &Node) -> Vec<(&Property, PropertyRef)> {
        let mut rows = Vec::new();
        for property in node.properties() {
            for sub in property.sub_properties() {
                rows.push((
                    sub,
                    PropertyRef::with_sub(node.id(), property.id(), sub.id()),
                ));
            }
            rows.push((property, PropertyRef::new(node.id(), property.id())));
        }
        rows
    }

    fn row_text(property: &Property) -> String {
        if property.parent().is_some() {
            if let Some(value) = property.value() {
                return match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
        property.label().to_owned()
    }

    fn row_width(&self, property: &Property) -> f32 {
        let s = &self.style;
        let text = s.text_width(&Self::row_text(property));
        match property.definition().value_type.value_type.common() {
            Some(CommonValueType::Boolean) => text + s.unit * 8.0,
            Some(_) => text + s.unit * 3.0,
            None => text + s.unit * 5.5,
        }
    }

    fn connector_of(property: &Property, bounds: Rect) -> Option<Point> {
        if !property.definition().linkable {
            return None;
        }
        Some(if property.kind().is_output() {
            bounds.middle_right()
        } else {
            bounds.middle_left()
        })
    }

    fn layout_expanded(&self, node: &Node) -> NodeShape {
        let s = &self.style;
        let origin = node.location;
        let rows = Self::rows(node);

        let width = rows
            .iter()
            .map(|(p, _)| self.row_width(p))
            .fold(node.full_width.max(s.node_width), f32::max);

        let mut y = s.header_height;
        let mut properties = Vec::with_capacity(rows.len());
        let mut place = |outputs: bool, y: &mut f32| {
            let section = rows.iter().filter(|(p, _)| p.kind().is_output() == outputs);
            for (i, (property, r)) in section.enumerate() {
                if i > 0 {
                    *y += s.unit / 2.0;
                }
                let bounds = Rect::new(origin.x, origin.y + *y, width, s.row_height());
                properties.push(PropertyShape {
                    property: *r,
                    kind: property.kind(),
                    bounds,
                    connector: Self::connector_of(property, bounds),
                });
                *y += s.row_height();
            }
        };

        place(true, &mut y);
        if node.definition().preview {
            y += width * 2.0 / 3.0;
        }
        place(false, &mut y);

        let bounds = origin.rect(width, y + s.unit);
        NodeShape {
            node: node.id(),
            collapsed: false,
            label_bounds: bounds.with_height(s.header_height),
            bounds,
            collapse_arrow: origin.offset(s.unit * 2.0, s.unit * 2.5),
            properties,
        }
    }

    fn layout_collapsed(&self, node: &Node) -> NodeShape {
        let s = &self.style;
        let origin = node.location;
        let rows = Self::rows(node);
        let visible = |p: &Property| p.definition().linkable && !p.kind().is_dynamic();

        let num_in = rows
            .iter()
            .filter(|(p, _)| visible(*p) && p.kind() == PortKind::Input)
            .count();
        let num_out = rows
            .iter()
            .filter(|(p, _)| visible(*p) && p.kind() == PortKind::Output)
            .count();
        let total = num_in.max(num_out);
        let mut radius = s.unit * 3.0;
        if total > 4 {
            radius += s.unit * (total - 4) as f32;
        }
        let width = s.text_width(&node.definition().label) + s.unit * 3.0 + radius * 2.0;

        let in_center = origin.offset(radius, radius);
        let out_center = origin.offset(width - radius, radius);
        let in_step = PI / (1.0 + num_in as f32);
        let out_step = -PI / (1.0 + num_out as f32);
        let mut in_angle = PI / 2.0 + in_step;
        let mut out_angle = PI / 2.0 + out_step;

        let properties = rows
            .iter()
            .map(|(property, r)| {
                let connector = if !visible(*property) {
                    None
                } else if property.kind() == PortKind::Input {
                    let c = in_center.offset(in_angle.cos() * radius, -in_angle.sin() * radius);
                    in_angle += in_step;
                    Some(c)
                } else {
                    let c = out_center.offset(out_angle.cos() * radius, -out_angle.sin() * radius);
                    out_angle += out_step;
                    Some(c)
                };
                PropertyShape {
                    property: *r,
                    kind: property.kind(),
                    bounds: origin.rect(0.0, 0.0),
                    connector,
                }
            })
            .collect();

        let bounds = origin.rect(width, radius * 2.0);
        NodeShape {
            node: node.id(),
            collapsed: true,
            bounds,
            label_bounds: bounds,
            collapse_arrow: origin.offset(radius + s.unit, radius),
            properties,
        }
    }
}

impl GraphLayout for BoxLayout {
    fn style(&self) -> &LayoutStyle {
        &self.style
    }

    fn layout_node(&self, node: &Node) -> NodeShape {
        if node.collapsed {
            self.layout_collapsed(node)
        } else {
            self.layout_expanded(node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_core::model::{NodeDefinition, PropertyDefinition, ValueDefinition};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn port(kind: PortKind, id: &str, linkable: bool) -> PropertyDefinition {
        PropertyDefinition {
            kind,
            id: ng_core::PortId::intern(id),
            label: id.into(),
            linkable,
            editable: true,
            value_type: ValueDefinition::of(CommonValueType::String),
            default_value: None,
        }
    }

    fn node(id: &str) -> Node {
        let def = NodeDefinition {
            id: "layout".into(),
            label: "Layout".into(),
            categories: None,
            properties: vec![
                port(PortKind::Input, "a", true),
                port(PortKind::Input, "b", false),
                port(PortKind::Output, "c", true),
            ],
            preview: false,
        };
        Node::new(NodeId::intern(id), Arc::new(def), Point::new(100.0, 50.0))
    }

    #[test]
    fn expanded_rows_put_outputs_first() {
        let layout = BoxLayout::default();
        let shape = layout.layout_node(&node("lay0"));
        let order: Vec<&str> = shape
            .properties
            .iter()
            .map(|p| p.property.port.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        let style = layout.style();
        assert_eq!(shape.bounds.width, style.node_width);
        assert_eq!(shape.properties[0].bounds.y, 50.0 + style.header_height);
        // Outputs and inputs each restart spacing: no gap between sections.
        assert_eq!(
            shape.properties[1].bounds.y,
            shape.properties[0].bounds.y + style.row_height()
        );
        assert_eq!(
            shape.properties[2].bounds.y,
            shape.properties[1].bounds.y + style.row_height() + style.unit / 2.0
        );
        assert_eq!(shape.label_bounds.height, style.header_height);
    }

    #[test]
    fn connectors_on_row_edges() {
        let shape = BoxLayout::default().layout_node(&node("lay1"));
        let c = &shape.properties[0];
        assert_eq!(c.connector, Some(c.bounds.middle_right()));
        let a = &shape.properties[1];
        assert_eq!(a.connector, Some(a.bounds.middle_left()));
        assert_eq!(shape.properties[2].connector, None);
    }

    #[test]
    fn full_width_widens_node() {
        let mut n = node("lay2");
        n.full_width = 320.0;
        assert_eq!(BoxLayout::default().layout_node(&n).bounds.width, 320.0);
    }

    #[test]
    fn collapsed_node_is_a_pill() {
        let mut n = node("lay3");
        n.collapsed = true;
        let shape = BoxLayout::default().layout_node(&n);
        assert!(shape.collapsed);
        assert_eq!(shape.bounds.height, 8.0 * 3.0 * 2.0);
        assert_eq!(shape.label_bounds, shape.bounds);
        assert!(shape.properties.iter().filter(|p| p.connector.is_some()).count() == 2);
    }

    #[test]
    fn frame_wraps_children() {
        let layout = BoxLayout::default();
        let frame = layout
            .layout_frame(
                FrameId::next(),
                "F",
                &[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 50.0, 10.0, 10.0)],
            )
            .unwrap();
        assert_eq!(frame.bounds.x, -20.0);
        assert_eq!(frame.bounds.corner(), Point::new(80.0, 80.0));
        assert_eq!(frame.bounds.y, -layout.style().header_height);
        assert!(layout.layout_frame(FrameId::next(), "E", &[]).is_none());
    }
}

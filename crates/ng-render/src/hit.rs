//! Hit testing: model point → scene element.
//!
//! Walks nodes and frames in reverse paint order so the topmost element
//! wins.

use crate::layout::{FrameShape, NodeShape, PropertyShape};
use crate::scene::Scene;
use crate::style::LayoutStyle;
use ng_core::{NodeId, Point, Rect};

/// Which part of a node a point falls on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeHit<'a> {
    Connector(&'a PropertyShape),
    CollapseArrow,
    Label,
    Property(&'a PropertyShape),
    ResizeHandle,
    Body,
}

/// First linkable connector within `radius` of `p` on this node.
pub fn node_connector<'a>(shape: &'a NodeShape, p: Point, radius: f32) -> Option<&'a PropertyShape> {
    shape
        .properties
        .iter()
        .find(|prop| prop.connector.is_some_and(|c| c.distance(p) <= radius))
}

/// Classify `p` against one node. Connectors are tested before the bounds
/// because they straddle the node edge.
pub fn hit_node<'a>(shape: &'a NodeShape, p: Point, style: &LayoutStyle) -> Option<NodeHit<'a>> {
    if let Some(connector) = node_connector(shape, p, style.connector_radius) {
        return Some(NodeHit::Connector(connector));
    }
    if !shape.bounds.contains(p) {
        return None;
    }
    if shape.collapse_arrow_bounds(style.collapse_arrow_size).contains(p) {
        return Some(NodeHit::CollapseArrow);
    }
    if shape.label_bounds.contains(p) {
        return Some(NodeHit::Label);
    }
    if let Some(property) = shape.properties.iter().find(|prop| prop.bounds.contains(p)) {
        return Some(NodeHit::Property(property));
    }
    if shape.resize_handle(style.round_radius).distance(p) < style.round_radius {
        return Some(NodeHit::ResizeHandle);
    }
    Some(NodeHit::Body)
}

/// Topmost node under `p`, with the part that was hit.
pub fn hit_nodes<'a>(
    scene: &'a Scene,
    p: Point,
    style: &LayoutStyle,
) -> Option<(&'a NodeShape, NodeHit<'a>)> {
    scene
        .nodes
        .iter()
        .rev()
        .find_map(|shape| hit_node(shape, p, style).map(|hit| (shape, hit)))
}

/// First connector within `radius` of `p`, in paint order.
pub fn find_connector(scene: &Scene, p: Point, radius: f32) -> Option<&PropertyShape> {
    scene
        .nodes
        .iter()
        .find_map(|shape| node_connector(shape, p, radius))
}

/// Innermost frame containing `p`.
pub fn frame_at(scene: &Scene, p: Point) -> Option<&FrameShape> {
    scene.frames.iter().rev().find(|f| f.bounds.contains(p))
}

/// Nodes whose bounds lie fully inside `rect` (marquee selection).
pub fn nodes_inside(scene: &Scene, rect: &Rect) -> Vec<NodeId> {
    scene
        .nodes
        .iter()
        .filter(|shape| rect.contains_rect(&shape.bounds))
        .map(|shape| shape.node)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_core::{PortKind, PropertyRef};
    use pretty_assertions::assert_eq;

    fn shape(id: &str, x: f32) -> NodeShape {
        let bounds = Rect::new(x, 0.0, 200.0, 120.0);
        let row = Rect::new(x, 40.0, 200.0, 32.0);
        NodeShape {
            node: NodeId::intern(id),
            collapsed: false,
            bounds,
            label_bounds: bounds.with_height(40.0),
            collapse_arrow: Point::new(x + 16.0, 20.0),
            properties: vec![PropertyShape {
                property: PropertyRef::parse(id, "in"),
                kind: PortKind::Input,
                bounds: row,
                connector: Some(row.middle_left()),
            }],
        }
    }

    fn scene() -> Scene {
        Scene {
            nodes: vec![shape("h0", 0.0), shape("h1", 100.0)],
            frames: Vec::new(),
        }
    }

    #[test]
    fn topmost_node_wins() {
        let scene = scene();
        let style = LayoutStyle::default();
        let (node, hit) = hit_nodes(&scene, Point::new(150.0, 100.0), &style).unwrap();
        assert_eq!(node.node, NodeId::intern("h1"));
        assert_eq!(hit, NodeHit::Body);
    }

    #[test]
    fn parts_are_classified() {
        let scene = scene();
        let style = LayoutStyle::default();
        let at = |x, y| hit_nodes(&scene, Point::new(x, y), &style).map(|(_, h)| h);
        assert_eq!(at(116.0, 20.0), Some(NodeHit::CollapseArrow));
        assert_eq!(at(250.0, 10.0), Some(NodeHit::Label));
        assert!(matches!(at(250.0, 50.0), Some(NodeHit::Property(_))));
        assert!(matches!(at(100.0, 56.0), Some(NodeHit::Connector(_))));
        assert_eq!(at(292.0, 112.0), Some(NodeHit::ResizeHandle));
        assert_eq!(at(500.0, 500.0), None);
    }

    #[test]
    fn marquee_requires_full_containment() {
        let scene = scene();
        let inside = nodes_inside(&scene, &Rect::new(-10.0, -10.0, 220.0, 140.0));
        assert_eq!(inside, vec![NodeId::intern("h0")]);
    }
}

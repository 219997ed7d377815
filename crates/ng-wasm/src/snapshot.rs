//! JSON shapes handed to the JavaScript renderer.
//!
//! Everything is in model coordinates; `zoom` maps them to the screen.

use ng_core::{Framable, Group, NodeId, Point, Rect};
use ng_editor::{Editor, Feedback, Selection};
use ng_render::{NodeShape, Scene};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSnapshot {
    pub zoom: ZoomSnapshot,
    pub frames: Vec<FrameSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
    pub connections: Vec<Wire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackSnapshot>,
    pub state: String,
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Debug, Serialize)]
pub struct ZoomSnapshot {
    pub origin: Point,
    pub scale: f32,
}

#[derive(Debug, Serialize)]
pub struct FrameSnapshot {
    pub label: String,
    pub bounds: Rect,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub label: String,
    pub bounds: Rect,
    pub collapsed: bool,
    pub selected: bool,
    pub properties: Vec<RowSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSnapshot {
    pub path: String,
    pub label: String,
    pub bounds: Rect,
    pub output: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Wire {
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedbackSnapshot {
    PendingConnection { from: Point, to: Point, valid: bool },
    SelectionBox { bounds: Rect },
    Resize { bounds: Rect },
    AddNode { node: NodeSnapshot },
}

fn node_snapshot(group: &Group, selection: &Selection, shape: &NodeShape) -> NodeSnapshot {
    let node = group.node(shape.node);
    let properties = shape
        .properties
        .iter()
        .map(|row| {
            let property = node.and_then(|n| n.property(&row.property));
            RowSnapshot {
                path: row.property.path(),
                label: property.map(|p| p.label().to_owned()).unwrap_or_default(),
                bounds: row.bounds,
                output: !row.is_input(),
                connector: row.connector,
                value: property.and_then(|p| p.value().cloned()),
                editable: property.is_some_and(|p| p.is_editable()),
            }
        })
        .collect();
    NodeSnapshot {
        id: shape.node,
        label: node
            .map(|n| n.definition().label.clone())
            .unwrap_or_default(),
        bounds: shape.bounds,
        collapsed: shape.collapsed,
        selected: selection.contains(Framable::Node(shape.node)),
        properties,
    }
}

fn wires(group: &Group, scene: &Scene) -> Vec<Wire> {
    group
        .connections()
        .iter()
        .filter_map(|c| {
            Some(Wire {
                from: scene.connector_position(&c.from)?,
                to: scene.connector_position(&c.to)?,
            })
        })
        .collect()
}

impl SceneSnapshot {
    pub fn capture(editor: &Editor) -> Self {
        let group = editor.group();
        let scene = editor.scene();
        let selection = editor.selection();

        let frames = scene
            .frames
            .iter()
            .map(|f| FrameSnapshot {
                label: f.label.clone(),
                bounds: f.bounds,
                selected: selection.contains(Framable::Frame(f.frame)),
            })
            .collect();
        let nodes = scene
            .nodes
            .iter()
            .map(|shape| node_snapshot(group, selection, shape))
            .collect();
        let feedback = editor.feedback().map(|f| match f {
            Feedback::PendingConnection { from, to, valid } => {
                FeedbackSnapshot::PendingConnection { from, to, valid }
            }
            Feedback::SelectionBox(bounds) => FeedbackSnapshot::SelectionBox { bounds },
            Feedback::Resize(bounds) => FeedbackSnapshot::Resize { bounds },
            Feedback::AddNode(shape) => FeedbackSnapshot::AddNode {
                node: NodeSnapshot {
                    id: shape.node,
                    label: String::new(),
                    bounds: shape.bounds,
                    collapsed: shape.collapsed,
                    selected: true,
                    properties: Vec::new(),
                },
            },
        });

        Self {
            zoom: ZoomSnapshot {
                origin: editor.zoom().origin,
                scale: editor.zoom().scale,
            },
            frames,
            nodes,
            connections: wires(group, scene),
            feedback,
            state: editor.state().name().to_owned(),
            can_undo: editor.history().can_undo(),
            can_redo: editor.history().can_redo(),
        }
    }
}

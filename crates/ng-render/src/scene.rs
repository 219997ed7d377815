use crate::layout::{FrameShape, GraphLayout, NodeShape};
use ng_core::{Framable, FrameId, Group, NodeId, Point, PropertyRef, Rect};

/// Laid-out geometry of a whole group, in paint order.
///
/// Nodes keep group order (later nodes are painted on top). Frames are
/// listed parent-first, so a reverse walk finds the innermost frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: Vec<NodeShape>,
    pub frames: Vec<FrameShape>,
}

impl Scene {
    pub fn build(group: &Group, layout: &dyn GraphLayout) -> Scene {
        let nodes: Vec<NodeShape> = group.nodes().map(|n| layout.layout_node(n)).collect();
        let mut scene = Scene {
            nodes,
            frames: Vec::new(),
        };
        let mut frames = Vec::new();
        for frame in group.top_level_frames() {
            scene.layout_frame_tree(group, layout, frame, &mut frames);
        }
        scene.frames = frames;
        log::trace!(
            "scene: {} nodes, {} frames",
            scene.nodes.len(),
            scene.frames.len()
        );
        scene
    }

    /// Lay out `id` and its descendants into `out`, parent first.
    /// Returns the frame bounds; empty frames have none.
    fn layout_frame_tree(
        &self,
        group: &Group,
        layout: &dyn GraphLayout,
        id: FrameId,
        out: &mut Vec<FrameShape>,
    ) -> Option<Rect> {
        let frame = group.frame(id)?;
        let mut child_bounds = Vec::with_capacity(frame.children().len());
        let mut nested = Vec::new();
        for child in frame.children() {
            let bounds = match *child {
                Framable::Node(node) => self.node(node).map(|shape| shape.bounds),
                Framable::Frame(sub) => self.layout_frame_tree(group, layout, sub, &mut nested),
            };
            child_bounds.extend(bounds);
        }
        let shape = layout.layout_frame(id, &frame.label, &child_bounds)?;
        let bounds = shape.bounds;
        out.push(shape);
        out.append(&mut nested);
        Some(bounds)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeShape> {
        self.nodes.iter().find(|n| n.node == id)
    }

    pub fn frame(&self, id: FrameId) -> Option<&FrameShape> {
        self.frames.iter().find(|f| f.frame == id)
    }

    /// Connector position of a property, if it is laid out and linkable.
    pub fn connector_position(&self, r: &PropertyRef) -> Option<Point> {
        self.node(r.node)?.property(r)?.connector
    }
}

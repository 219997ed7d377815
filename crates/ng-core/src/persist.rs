//! Persisted document form and the load/save pair.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "kind": "frame", "label": "Inputs", "nodes": [ { "id": "a", "type": "const", "location": { "x": 0, "y": 0 } } ] },
//!     { "id": "b", "type": "sum", "location": { "x": 200, "y": 0 }, "collapsed": true }
//!   ],
//!   "connections": [ { "from": { "node": "a", "property": "value" }, "to": { "node": "b", "property": "in.s1" } } ],
//!   "canvas": { "position": { "x": 0, "y": 0 }, "zoom": 1 }
//! }
//! ```
//!
//! `save(load(doc)) == doc` for any document that already follows the
//! omission rules `save` applies (see [`PersistedNode`]).

use crate::error::GraphError;
use crate::geometry::Point;
use crate::id::{FrameId, NodeId};
use crate::model::{Frame, Framable, Group, PortKind, PropertyRef};
use crate::registry::NodeFactory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ─── Persisted form ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedGroup {
    pub nodes: Vec<PersistedEntry>,
    #[serde(default)]
    pub connections: Vec<PersistedConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<PersistedCanvas>,
}

/// A frame or a node. Frames are recognized by `"kind": "frame"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedEntry {
    Frame(PersistedFrame),
    Node(PersistedNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameTag {
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeTag {
    Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedFrame {
    pub kind: FrameTag,
    pub label: String,
    #[serde(default)]
    pub nodes: Vec<PersistedEntry>,
}

/// A node entry. `collapsed` is only written when true, `fullWidth` only
/// when positive, `properties` only when at least one value is defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeTag>,
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_id: String,
    pub location: Point,
    #[serde(default, skip_serializing_if = "is_false")]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "is_unset_width")]
    pub full_width: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Value>>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_unset_width(w: &f32) -> bool {
    *w <= 0.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEndpoint {
    pub node: NodeId,
    /// `port` or `port.sub`.
    pub property: String,
}

impl PersistedEndpoint {
    fn resolve(&self) -> PropertyRef {
        PropertyRef::parse(self.node.as_str(), &self.property)
    }

    fn from_ref(r: &PropertyRef) -> Self {
        Self {
            node: r.node,
            property: r.path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConnection {
    pub from: PersistedEndpoint,
    pub to: PersistedEndpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedCanvas {
    #[serde(default)]
    pub position: Point,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
}

fn default_zoom() -> f32 {
    1.0
}

// ─── Load ────────────────────────────────────────────────────────────────

/// Rebuild a live group from its persisted form.
///
/// Fails on unknown node types, duplicate node ids, connections whose
/// endpoints cannot be resolved and a second connection into one input.
/// Unknown property names are skipped.
pub fn load(factory: &NodeFactory, persisted: &PersistedGroup) -> Result<Group, GraphError> {
    let mut group = Group::new();
    for entry in &persisted.nodes {
        load_entry(factory, &mut group, entry)?;
    }

    for connection in &persisted.connections {
        let from = connection.from.resolve();
        let to = connection.to.resolve();
        let connection = group.connection_between(from, to)?;
        let occupied = group
            .property(&connection.to)
            .is_some_and(|p| p.kind() == PortKind::Input && p.is_connected());
        if occupied {
            return Err(GraphError::InputAlreadyConnected {
                node: connection.to.node.to_string(),
                property: connection.to.path(),
            });
        }
        group.connect(&connection);
    }

    // Persisted sub-properties no connection claimed.
    let unused = group.prune_retired();
    if unused > 0 {
        log::debug!("dropped {unused} unconnected sub-properties");
    }

    if let Some(canvas) = &persisted.canvas {
        group.zoom.update(canvas.position, canvas.zoom);
    }

    log::debug!(
        "loaded {} nodes, {} frames, {} connections",
        group.nodes().count(),
        group.frames().count(),
        persisted.connections.len()
    );
    Ok(group)
}

fn load_entry(
    factory: &NodeFactory,
    group: &mut Group,
    entry: &PersistedEntry,
) -> Result<Framable, GraphError> {
    match entry {
        PersistedEntry::Frame(persisted) => {
            let id = FrameId::next();
            group.add_frame(id, Frame::new(persisted.label.clone()));
            for child in &persisted.nodes {
                let child = load_entry(factory, group, child)?;
                group.add_to_frame(child, Some(id));
            }
            Ok(Framable::Frame(id))
        }
        PersistedEntry::Node(persisted) => {
            if group.contains_node(persisted.id) {
                return Err(GraphError::DuplicateNodeId(persisted.id.to_string()));
            }
            let mut node =
                factory.create_node_with_id(persisted.id, &persisted.type_id, persisted.location)?;
            node.collapsed = persisted.collapsed;
            node.full_width = persisted.full_width.max(0.0);
            for (name, value) in persisted.properties.iter().flatten() {
                let Some(port) = node.find_property(name).map(|p| p.id()) else {
                    log::warn!("node `{}` has no property `{name}`; value skipped", persisted.id);
                    continue;
                };
                node.restore_value(port, value.clone());
            }
            group.add_node(node);
            Ok(Framable::Node(persisted.id))
        }
    }
}

/// Parse and load a JSON document.
pub fn load_str(factory: &NodeFactory, json: &str) -> Result<Group, GraphError> {
    let persisted: PersistedGroup = serde_json::from_str(json)?;
    load(factory, &persisted)
}

// ─── Save ────────────────────────────────────────────────────────────────

struct SaveContext<'a> {
    group: &'a Group,
    connections: Vec<PersistedConnection>,
    seen: HashSet<NodeId>,
}

impl SaveContext<'_> {
    fn save_framable(&mut self, item: Framable) -> Option<PersistedEntry> {
        match item {
            Framable::Node(id) => self.save_node(id).map(PersistedEntry::Node),
            Framable::Frame(id) => self.save_frame(id).map(PersistedEntry::Frame),
        }
    }

    fn save_frame(&mut self, id: FrameId) -> Option<PersistedFrame> {
        let group = self.group;
        let frame = group.frame(id)?;
        let nodes = frame
            .children()
            .iter()
            .filter_map(|child| self.save_framable(*child))
            .collect();
        Some(PersistedFrame {
            kind: FrameTag::Frame,
            label: frame.label.clone(),
            nodes,
        })
    }

    fn save_node(&mut self, id: NodeId) -> Option<PersistedNode> {
        let group = self.group;
        let node = group.node(id)?;
        self.seen.insert(id);

        let mut properties = IndexMap::new();
        for property in node.properties() {
            if let Some(value) = property.value() {
                properties.insert(property.id().to_string(), value.clone());
            }
            if property.kind().is_output() {
                for c in property.all_connections() {
                    self.connections.push(PersistedConnection {
                        from: PersistedEndpoint::from_ref(&c.from),
                        to: PersistedEndpoint::from_ref(&c.to),
                    });
                }
            }
        }

        Some(PersistedNode {
            kind: None,
            id,
            type_id: node.definition().id.clone(),
            location: node.location,
            collapsed: node.collapsed,
            full_width: node.full_width,
            properties: (!properties.is_empty()).then_some(properties),
        })
    }
}

/// Produce the persisted form: top-level frames (recursively) first, then
/// every node not already written inside a frame.
pub fn save(group: &Group) -> PersistedGroup {
    let mut ctx = SaveContext {
        group,
        connections: Vec::new(),
        seen: HashSet::new(),
    };
    let mut nodes = Vec::new();
    for frame in group.top_level_frames() {
        if let Some(frame) = ctx.save_frame(frame) {
            nodes.push(PersistedEntry::Frame(frame));
        }
    }
    for node in group.nodes() {
        if ctx.seen.contains(&node.id()) {
            continue;
        }
        if let Some(node) = ctx.save_node(node.id()) {
            nodes.push(PersistedEntry::Node(node));
        }
    }

    log::debug!(
        "saved {} top-level entries, {} connections",
        nodes.len(),
        ctx.connections.len()
    );
    PersistedGroup {
        nodes,
        connections: ctx.connections,
        canvas: Some(PersistedCanvas {
            position: group.zoom.origin,
            zoom: group.zoom.scale,
        }),
    }
}

/// Save as pretty-printed JSON.
pub fn save_string(group: &Group) -> Result<String, GraphError> {
    Ok(serde_json::to_string_pretty(&save(group))?)
}

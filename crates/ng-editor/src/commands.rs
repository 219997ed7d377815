//! Undoable graph mutations.
//!
//! Each command captures whatever it needs to revert itself, either when it
//! is constructed (old values, old widths) or when it first executes
//! (parent links, list positions). Commands address nodes, frames and
//! properties by id, so they stay valid while the objects they touch are
//! temporarily out of the group.

use crate::history::Command;
use ng_core::{
    Connection, Dimension, Framable, Frame, FrameId, Group, Node, NodeId, Point, PropertyRef,
};
use serde_json::Value;

// ─── Composite ───────────────────────────────────────────────────────────

/// Several commands applied as one history entry.
pub struct Composite {
    commands: Vec<Box<dyn Command<Group>>>,
}

impl Composite {
    pub fn new(commands: Vec<Box<dyn Command<Group>>>) -> Self {
        Self { commands }
    }
}

impl Command<Group> for Composite {
    fn execute(&mut self, group: &mut Group) {
        for command in &mut self.commands {
            command.execute(group);
        }
    }

    fn undo(&mut self, group: &mut Group) {
        for command in self.commands.iter_mut().rev() {
            command.undo(group);
        }
    }

    fn redo(&mut self, group: &mut Group) {
        for command in &mut self.commands {
            command.redo(group);
        }
    }

    fn is_visual(&self) -> bool {
        self.commands.iter().all(|c| c.is_visual())
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.commands.iter().map(|c| c.describe()).collect();
        format!("[{}]", parts.join(", "))
    }
}

// ─── Move ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeMove {
    pub node: NodeId,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone)]
pub struct Move {
    moves: Vec<NodeMove>,
}

impl Move {
    pub fn new(moves: Vec<NodeMove>) -> Self {
        Self { moves }
    }

    fn apply(&self, group: &mut Group, pick: fn(&NodeMove) -> Point) {
        for m in &self.moves {
            if let Some(node) = group.node_mut(m.node) {
                node.location = pick(m);
            }
        }
    }
}

impl Command<Group> for Move {
    fn execute(&mut self, group: &mut Group) {
        self.apply(group, |m| m.end);
    }

    fn undo(&mut self, group: &mut Group) {
        self.apply(group, |m| m.start);
    }

    fn is_visual(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("move {} node(s)", self.moves.len())
    }
}

// ─── ToggleCollapse ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ToggleCollapse {
    node: NodeId,
    collapsed: bool,
}

impl ToggleCollapse {
    pub fn new(group: &Group, node: NodeId) -> Self {
        let collapsed = group.node(node).is_some_and(|n| !n.collapsed);
        Self { node, collapsed }
    }

    fn set(&self, group: &mut Group, collapsed: bool) {
        if let Some(node) = group.node_mut(self.node) {
            node.collapsed = collapsed;
        }
    }
}

impl Command<Group> for ToggleCollapse {
    fn execute(&mut self, group: &mut Group) {
        self.set(group, self.collapsed);
    }

    fn undo(&mut self, group: &mut Group) {
        self.set(group, !self.collapsed);
    }

    fn is_visual(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        let verb = if self.collapsed { "collapse" } else { "expand" };
        format!("{verb} {}", self.node)
    }
}

// ─── Connections ─────────────────────────────────────────────────────────

/// Wire two properties, given in either order.
///
/// A dynamic template endpoint gets its sub-property on first execution;
/// redo reconnects that same sub-property.
#[derive(Debug, Clone)]
pub struct CreateConnection {
    a: PropertyRef,
    b: PropertyRef,
    connection: Option<Connection>,
}

impl CreateConnection {
    pub fn new(a: PropertyRef, b: PropertyRef) -> Self {
        Self {
            a,
            b,
            connection: None,
        }
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }
}

impl Command<Group> for CreateConnection {
    fn execute(&mut self, group: &mut Group) {
        match group.connection_between(self.a, self.b) {
            Ok(connection) => {
                group.connect(&connection);
                self.connection = Some(connection);
            }
            Err(e) => log::warn!("create connection {} -> {}: {e}", self.a, self.b),
        }
    }

    fn undo(&mut self, group: &mut Group) {
        if let Some(connection) = &self.connection {
            group.disconnect(connection);
        }
    }

    fn redo(&mut self, group: &mut Group) {
        match &self.connection {
            Some(connection) => group.connect(connection),
            None => self.execute(group),
        }
    }

    fn describe(&self) -> String {
        format!("connect {} {}", self.a, self.b)
    }
}

#[derive(Debug, Clone)]
pub struct RemoveConnection {
    connection: Connection,
}

impl RemoveConnection {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

impl Command<Group> for RemoveConnection {
    fn execute(&mut self, group: &mut Group) {
        group.disconnect(&self.connection);
    }

    fn undo(&mut self, group: &mut Group) {
        group.connect(&self.connection);
    }

    fn describe(&self) -> String {
        format!(
            "disconnect {} -> {}",
            self.connection.from, self.connection.to
        )
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// Insert a node built outside the group. The command holds the node
/// whenever it is not in the group.
#[derive(Debug, Clone)]
pub struct AddNode {
    id: NodeId,
    node: Option<Node>,
}

impl AddNode {
    pub fn new(node: Node) -> Self {
        Self {
            id: node.id(),
            node: Some(node),
        }
    }
}

impl Command<Group> for AddNode {
    fn execute(&mut self, group: &mut Group) {
        if let Some(node) = self.node.take() {
            group.add_node(node);
        }
    }

    fn undo(&mut self, group: &mut Group) {
        self.node = group.remove_node(self.id);
    }

    fn describe(&self) -> String {
        format!("add {}", self.id)
    }
}

/// Delete nodes and frames together with everything they contain.
///
/// Every connection touching a deleted node is severed. A deleted item
/// whose parent frame survives is detached from it first; undo puts every
/// node, frame, child slot and connection back where it was.
#[derive(Debug, Clone)]
pub struct DeleteNodes {
    nodes: Vec<NodeId>,
    frames: Vec<FrameId>,
    connections: Vec<Connection>,
    detached: Vec<(Framable, FrameId, usize)>,
    removed_nodes: Vec<(usize, Node)>,
    removed_frames: Vec<(usize, FrameId, Frame)>,
}

impl DeleteNodes {
    pub fn new(group: &Group, nodes: &[NodeId], frames: &[FrameId]) -> Self {
        let mut all_nodes: Vec<NodeId> = Vec::new();
        let mut all_frames: Vec<FrameId> = Vec::new();
        for &frame in frames {
            if !all_frames.contains(&frame) {
                all_frames.push(frame);
            }
            let (sub_nodes, sub_frames) = group.descendants(frame);
            for f in sub_frames {
                if !all_frames.contains(&f) {
                    all_frames.push(f);
                }
            }
            for n in sub_nodes {
                if !all_nodes.contains(&n) {
                    all_nodes.push(n);
                }
            }
        }
        for &node in nodes {
            if !all_nodes.contains(&node) {
                all_nodes.push(node);
            }
        }

        let mut connections: Vec<Connection> = Vec::new();
        for node in all_nodes.iter().filter_map(|id| group.node(*id)) {
            for c in node.connections() {
                if !connections.contains(&c) {
                    connections.push(c);
                }
            }
        }

        Self {
            nodes: all_nodes,
            frames: all_frames,
            connections,
            detached: Vec::new(),
            removed_nodes: Vec::new(),
            removed_frames: Vec::new(),
        }
    }

    /// Connections severed by this deletion.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Frames left without children go too, walking up towards the root.
    fn remove_emptied_frames(&mut self, group: &mut Group) {
        let mut pending: Vec<FrameId> = self.detached.iter().map(|(_, parent, _)| *parent).collect();
        while let Some(id) = pending.pop() {
            if !group.frame(id).is_some_and(|f| f.children().is_empty()) {
                continue;
            }
            let item = Framable::Frame(id);
            if let Some(parent) = group.parent_of(item) {
                let index = group.child_index(item).unwrap_or(usize::MAX);
                group.add_to_frame(item, None);
                self.detached.push((item, parent, index));
                pending.push(parent);
            }
            let Some(index) = group.frame_index(id) else {
                continue;
            };
            if let Some(frame) = group.remove_frame(id) {
                log::trace!("frame {id:?} emptied by deletion");
                self.removed_frames.push((index, id, frame));
            }
        }
    }
}

impl Command<Group> for DeleteNodes {
    fn execute(&mut self, group: &mut Group) {
        for connection in &self.connections {
            group.disconnect(connection);
        }

        let items = self
            .frames
            .iter()
            .map(|f| Framable::Frame(*f))
            .chain(self.nodes.iter().map(|n| Framable::Node(*n)));
        let mut detached = Vec::new();
        for item in items {
            let Some(parent) = group.parent_of(item) else {
                continue;
            };
            if self.frames.contains(&parent) {
                continue;
            }
            let index = group.child_index(item).unwrap_or(usize::MAX);
            group.add_to_frame(item, None);
            detached.push((item, parent, index));
        }
        self.detached = detached;

        self.removed_nodes.clear();
        for &id in &self.nodes {
            let Some(index) = group.node_index(id) else {
                continue;
            };
            if let Some(node) = group.remove_node(id) {
                self.removed_nodes.push((index, node));
            }
        }
        self.removed_frames.clear();
        for &id in &self.frames {
            let Some(index) = group.frame_index(id) else {
                continue;
            };
            if let Some(frame) = group.remove_frame(id) {
                self.removed_frames.push((index, id, frame));
            }
        }
        self.remove_emptied_frames(group);
    }

    fn undo(&mut self, group: &mut Group) {
        for (index, id, frame) in self.removed_frames.drain(..).rev() {
            group.insert_frame(index, id, frame);
        }
        for (index, node) in self.removed_nodes.drain(..).rev() {
            group.insert_node(index, node);
        }
        for (item, parent, index) in self.detached.iter().rev() {
            group.insert_in_frame(*item, Some(*parent), *index);
        }
        for connection in &self.connections {
            group.connect(connection);
        }
    }

    fn describe(&self) -> String {
        format!(
            "delete {} node(s), {} frame(s)",
            self.nodes.len(),
            self.frames.len()
        )
    }
}

#[derive(Debug, Clone)]
pub struct ChangePropertyValue {
    property: PropertyRef,
    old: Option<Value>,
    new: Option<Value>,
}

impl ChangePropertyValue {
    pub fn new(group: &Group, property: PropertyRef, value: Option<Value>) -> Self {
        let old = group.property(&property).and_then(|p| p.value().cloned());
        Self {
            property,
            old,
            new: value,
        }
    }
}

impl Command<Group> for ChangePropertyValue {
    fn execute(&mut self, group: &mut Group) {
        if !group.set_value(&self.property, self.new.clone()) {
            log::warn!("change value: no property {}", self.property);
        }
    }

    fn undo(&mut self, group: &mut Group) {
        group.set_value(&self.property, self.old.clone());
    }

    fn describe(&self) -> String {
        format!("set {}", self.property)
    }
}

#[derive(Debug, Clone)]
pub struct ResizeNode {
    node: NodeId,
    old_width: f32,
    width: f32,
}

impl ResizeNode {
    pub fn new(group: &Group, node: NodeId, dimension: Dimension) -> Self {
        let old_width = group.node(node).map_or(0.0, |n| n.full_width);
        Self {
            node,
            old_width,
            width: dimension.width,
        }
    }

    fn set(&self, group: &mut Group, width: f32) {
        if let Some(node) = group.node_mut(self.node) {
            node.full_width = width;
        }
    }
}

impl Command<Group> for ResizeNode {
    fn execute(&mut self, group: &mut Group) {
        self.set(group, self.width);
    }

    fn undo(&mut self, group: &mut Group) {
        self.set(group, self.old_width);
    }

    fn is_visual(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("resize {} to {}", self.node, self.width)
    }
}

// ─── Frames ──────────────────────────────────────────────────────────────

/// Previous parent and slot of an item, restored on undo.
type ParentSlot = (Framable, Option<FrameId>, usize);

fn reparent(group: &mut Group, items: &[Framable], target: Option<FrameId>) -> Vec<ParentSlot> {
    items
        .iter()
        .map(|&item| {
            let parent = group.parent_of(item);
            let index = group.child_index(item).unwrap_or(usize::MAX);
            group.add_to_frame(item, target);
            (item, parent, index)
        })
        .collect()
}

fn restore_parents(group: &mut Group, slots: &[ParentSlot]) {
    for &(item, parent, index) in slots.iter().rev() {
        group.insert_in_frame(item, parent, index);
    }
}

/// Wrap items in a new top-level frame labelled "Frame".
#[derive(Debug, Clone)]
pub struct JoinInNewFrame {
    frame: FrameId,
    label: String,
    items: Vec<Framable>,
    old_parents: Vec<ParentSlot>,
}

impl JoinInNewFrame {
    pub const DEFAULT_LABEL: &'static str = "Frame";

    pub fn new(items: Vec<Framable>) -> Self {
        Self {
            frame: FrameId::next(),
            label: Self::DEFAULT_LABEL.to_owned(),
            items,
            old_parents: Vec::new(),
        }
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }
}

impl Command<Group> for JoinInNewFrame {
    fn execute(&mut self, group: &mut Group) {
        group.add_frame(self.frame, Frame::new(self.label.clone()));
        self.old_parents = reparent(group, &self.items, Some(self.frame));
    }

    fn undo(&mut self, group: &mut Group) {
        restore_parents(group, &self.old_parents);
        if let Some(frame) = group.remove_frame(self.frame) {
            self.label = frame.label;
        }
    }

    fn is_visual(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("join {} item(s) in a new frame", self.items.len())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveFromFrame {
    items: Vec<Framable>,
    old_parents: Vec<ParentSlot>,
}

impl RemoveFromFrame {
    pub fn new(items: Vec<Framable>) -> Self {
        Self {
            items,
            old_parents: Vec::new(),
        }
    }
}

impl Command<Group> for RemoveFromFrame {
    fn execute(&mut self, group: &mut Group) {
        self.old_parents = reparent(group, &self.items, None);
    }

    fn undo(&mut self, group: &mut Group) {
        restore_parents(group, &self.old_parents);
    }

    fn is_visual(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("remove {} item(s) from their frame", self.items.len())
    }
}

#[derive(Debug, Clone)]
pub struct RenameFrame {
    frame: FrameId,
    old: String,
    new: String,
}

impl RenameFrame {
    pub fn new(group: &Group, frame: FrameId, label: impl Into<String>) -> Self {
        let old = group
            .frame(frame)
            .map(|f| f.label.clone())
            .unwrap_or_default();
        Self {
            frame,
            old,
            new: label.into(),
        }
    }

    fn set(&self, group: &mut Group, label: &str) {
        if let Some(frame) = group.frame_mut(self.frame) {
            frame.label = label.to_owned();
        }
    }
}

impl Command<Group> for RenameFrame {
    fn execute(&mut self, group: &mut Group) {
        self.set(group, &self.new);
    }

    fn undo(&mut self, group: &mut Group) {
        self.set(group, &self.old);
    }

    fn is_visual(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("rename frame to {:?}", self.new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CommandLog;
    use ng_core::model::{CommonValueType, NodeDefinition, PropertyDefinition, ValueDefinition};
    use ng_core::{PortId, PortKind};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn port(kind: PortKind, id: &str) -> PropertyDefinition {
        PropertyDefinition {
            kind,
            id: PortId::intern(id),
            label: id.into(),
            linkable: true,
            editable: true,
            value_type: ValueDefinition::of(CommonValueType::String),
            default_value: None,
        }
    }

    fn group(ids: &[&str]) -> Group {
        let def = Arc::new(NodeDefinition {
            id: "cmd".into(),
            label: "Cmd".into(),
            categories: None,
            properties: vec![
                port(PortKind::Input, "in"),
                port(PortKind::Output, "out"),
                port(PortKind::NewInput, "many"),
            ],
            preview: false,
        });
        let mut group = Group::new();
        for id in ids {
            group.add_node(Node::new(NodeId::intern(id), def.clone(), Point::ORIGIN));
        }
        group
    }

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn move_and_back() {
        let mut g = group(&["cm0"]);
        let mut log = CommandLog::default();
        let end = Point::new(40.0, 60.0);
        log.emit(
            &mut g,
            Box::new(Move::new(vec![NodeMove {
                node: id("cm0"),
                start: Point::ORIGIN,
                end,
            }])),
        );
        assert_eq!(g.node(id("cm0")).unwrap().location, end);
        log.undo(&mut g);
        assert_eq!(g.node(id("cm0")).unwrap().location, Point::ORIGIN);
    }

    #[test]
    fn toggle_collapse_records_target_state() {
        let mut g = group(&["cm1"]);
        let mut log = CommandLog::default();
        let cmd = ToggleCollapse::new(&g, id("cm1"));
        log.emit(&mut g, Box::new(cmd));
        assert!(g.node(id("cm1")).unwrap().collapsed);
        log.undo(&mut g);
        assert!(!g.node(id("cm1")).unwrap().collapsed);
        log.redo(&mut g);
        assert!(g.node(id("cm1")).unwrap().collapsed);
    }

    #[test]
    fn create_connection_to_template_redoes_same_sub_property() {
        let mut g = group(&["cm2", "cm3"]);
        let mut log = CommandLog::default();
        log.emit(
            &mut g,
            Box::new(CreateConnection::new(
                PropertyRef::parse("cm3", "many"),
                PropertyRef::parse("cm2", "out"),
            )),
        );
        let first = g.connections();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].from, PropertyRef::parse("cm2", "out"));

        log.undo(&mut g);
        assert!(g.connections().is_empty());
        log.redo(&mut g);
        assert_eq!(g.connections(), first);
    }

    #[test]
    fn composite_undoes_in_reverse() {
        let mut g = group(&["cm4", "cm5", "cm6"]);
        let input = PropertyRef::parse("cm5", "in");
        let old = g
            .connection_between(PropertyRef::parse("cm4", "out"), input)
            .unwrap();
        g.connect(&old);

        let mut log = CommandLog::default();
        log.emit(
            &mut g,
            Box::new(Composite::new(vec![
                Box::new(RemoveConnection::new(old)),
                Box::new(CreateConnection::new(PropertyRef::parse("cm6", "out"), input)),
            ])),
        );
        assert_eq!(g.property(&input).unwrap().connections()[0].from.node, id("cm6"));

        log.undo(&mut g);
        assert_eq!(g.connections(), vec![old]);
        log.redo(&mut g);
        assert_eq!(g.property(&input).unwrap().connections()[0].from.node, id("cm6"));
    }

    #[test]
    fn composite_is_visual_only_if_all_members_are() {
        let mixed = Composite::new(vec![
            Box::new(Move::new(Vec::new())),
            Box::new(AddNode::new(group(&["cm7"]).remove_node(id("cm7")).unwrap())),
        ]);
        assert!(!mixed.is_visual());
        let visual = Composite::new(vec![Box::new(Move::new(Vec::new()))]);
        assert!(visual.is_visual());
    }

    #[test]
    fn add_node_round_trip() {
        let mut source = group(&["cm8"]);
        let node = source.remove_node(id("cm8")).unwrap();
        let mut g = group(&[]);
        let mut log = CommandLog::default();
        log.emit(&mut g, Box::new(AddNode::new(node)));
        assert!(g.contains_node(id("cm8")));
        log.undo(&mut g);
        assert!(!g.contains_node(id("cm8")));
        log.redo(&mut g);
        assert!(g.contains_node(id("cm8")));
    }

    #[test]
    fn delete_nested_frame_detaches_from_surviving_parent() {
        let mut g = group(&["cm9", "cm10", "cm11"]);
        let outer = FrameId::next();
        let inner = FrameId::next();
        g.add_frame(outer, Frame::new("outer"));
        g.add_frame(inner, Frame::new("inner"));
        g.add_to_frame(Framable::Node(id("cm9")), Some(outer));
        g.add_to_frame(Framable::Frame(inner), Some(outer));
        g.add_to_frame(Framable::Node(id("cm10")), Some(inner));
        g.add_to_frame(Framable::Node(id("cm11")), Some(outer));

        let mut log = CommandLog::default();
        let cmd = DeleteNodes::new(&g, &[], &[inner]);
        log.emit(&mut g, Box::new(cmd));
        assert!(!g.contains_frame(inner));
        assert!(!g.contains_node(id("cm10")));
        assert_eq!(
            g.frame(outer).unwrap().children(),
            &[Framable::Node(id("cm9")), Framable::Node(id("cm11"))]
        );

        log.undo(&mut g);
        assert_eq!(
            g.frame(outer).unwrap().children(),
            &[
                Framable::Node(id("cm9")),
                Framable::Frame(inner),
                Framable::Node(id("cm11"))
            ]
        );
        assert_eq!(g.parent_of(Framable::Node(id("cm10"))), Some(inner));
        assert_eq!(g.parent_of(Framable::Frame(inner)), Some(outer));
    }

    #[test]
    fn change_value_captures_old_value() {
        let mut g = group(&["cm12"]);
        let r = PropertyRef::parse("cm12", "in");
        g.set_value(&r, Some(Value::from("before")));
        let mut log = CommandLog::default();
        let cmd = ChangePropertyValue::new(&g, r, Some(Value::from("after")));
        log.emit(&mut g, Box::new(cmd));
        assert_eq!(g.property(&r).unwrap().value(), Some(&Value::from("after")));
        log.undo(&mut g);
        assert_eq!(g.property(&r).unwrap().value(), Some(&Value::from("before")));
    }

    #[test]
    fn resize_sets_full_width() {
        let mut g = group(&["cm13"]);
        let mut log = CommandLog::default();
        let cmd = ResizeNode::new(&g, id("cm13"), Dimension::new(320.0, 10.0));
        log.emit(&mut g, Box::new(cmd));
        assert_eq!(g.node(id("cm13")).unwrap().full_width, 320.0);
        log.undo(&mut g);
        assert_eq!(g.node(id("cm13")).unwrap().full_width, 0.0);
    }

    #[test]
    fn join_then_remove_from_frame() {
        let mut g = group(&["cm14", "cm15"]);
        let items = vec![Framable::Node(id("cm14")), Framable::Node(id("cm15"))];
        let mut log = CommandLog::default();
        let join = JoinInNewFrame::new(items.clone());
        let frame = join.frame();
        log.emit(&mut g, Box::new(join));
        assert_eq!(g.frame(frame).unwrap().label, "Frame");
        assert_eq!(g.frame(frame).unwrap().children(), items.as_slice());

        log.emit(&mut g, Box::new(RemoveFromFrame::new(vec![items[0]])));
        assert_eq!(g.parent_of(items[0]), None);
        log.undo(&mut g);
        assert_eq!(g.frame(frame).unwrap().children(), items.as_slice());

        log.undo(&mut g);
        assert!(!g.contains_frame(frame));
        assert_eq!(g.parent_of(items[1]), None);
    }

    #[test]
    fn rename_frame() {
        let mut g = group(&[]);
        let f = FrameId::next();
        g.add_frame(f, Frame::new("old"));
        let mut log = CommandLog::default();
        let cmd = RenameFrame::new(&g, f, "new");
        log.emit(&mut g, Box::new(cmd));
        assert_eq!(g.frame(f).unwrap().label, "new");
        log.undo(&mut g);
        assert_eq!(g.frame(f).unwrap().label, "old");
    }
}

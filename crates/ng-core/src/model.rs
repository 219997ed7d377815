//! Core graph data model.
//!
//! A [`Group`] owns every live [`Node`] and [`Frame`]. Nodes carry one
//! [`Property`] per port of their type definition; properties are linked by
//! [`Connection`]s, which are plain values addressing both endpoints by
//! [`PropertyRef`]. Frames group nodes and other frames; membership is a
//! back-reference on the child plus an ordered child list on the parent.
//!
//! Dynamic ports (`NEW_INPUT` / `NEW_OUTPUT`) never carry a connection
//! themselves. Connecting to one creates a concrete sub-property; the port
//! is then `Materialized` until its last sub-property loses its last
//! connection, at which point it returns to `Template`.

use crate::error::GraphError;
use crate::geometry::Point;
use crate::id::{FrameId, NodeId, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// ─── Definitions ─────────────────────────────────────────────────────────

/// Port kind of a property definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortKind {
    Input,
    Output,
    /// Template that materializes one `Input` per incoming connection.
    NewInput,
    /// Template that materializes one `Output` per outgoing connection.
    NewOutput,
}

impl PortKind {
    pub fn is_output(self) -> bool {
        matches!(self, PortKind::Output | PortKind::NewOutput)
    }

    pub fn is_dynamic(self) -> bool {
        matches!(self, PortKind::NewInput | PortKind::NewOutput)
    }

    /// Kind of the concrete sub-property a template produces.
    pub fn materialized(self) -> PortKind {
        match self {
            PortKind::NewInput => PortKind::Input,
            PortKind::NewOutput => PortKind::Output,
            kind => kind,
        }
    }
}

/// Value types every editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommonValueType {
    Integer,
    Real,
    String,
    Enum,
    Boolean,
    Label,
}

/// Value type of a port. Registries may define their own (e.g. `"image"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueType {
    Common(CommonValueType),
    Custom(String),
}

impl ValueType {
    pub fn common(&self) -> Option<CommonValueType> {
        match self {
            ValueType::Common(c) => Some(*c),
            ValueType::Custom(_) => None,
        }
    }
}

/// Optional numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Range {
    pub fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    pub fn clamp(&self, mut value: f64) -> f64 {
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueDefinition {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<EnumValue>,
}

impl ValueDefinition {
    pub fn of(value_type: CommonValueType) -> Self {
        Self {
            value_type: ValueType::Common(value_type),
            range: None,
            enum_values: Vec::new(),
        }
    }

    /// The range, but only if both ends are defined.
    pub fn bounded_range(&self) -> Option<Range> {
        self.range.filter(Range::is_bounded)
    }
}

/// A typed, named slot on a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    #[serde(rename = "type")]
    pub kind: PortKind,
    pub id: PortId,
    pub label: String,
    #[serde(default)]
    pub linkable: bool,
    #[serde(default)]
    pub editable: bool,
    pub value_type: ValueDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// A node type, as provided by a [`TypeRegistry`](crate::registry::TypeRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<String>,
    pub properties: Vec<PropertyDefinition>,
    #[serde(default)]
    pub preview: bool,
}

// ─── Addressing ──────────────────────────────────────────────────────────

/// Address of a property: node, top-level port, and for materialized
/// dynamic sub-properties the sub-property id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub node: NodeId,
    pub port: PortId,
    pub sub: Option<PortId>,
}

impl PropertyRef {
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self {
            node,
            port,
            sub: None,
        }
    }

    pub fn with_sub(node: NodeId, port: PortId, sub: PortId) -> Self {
        Self {
            node,
            port,
            sub: Some(sub),
        }
    }

    /// Convenience for tests and hosts: `PropertyRef::parse("n1", "in.a")`.
    pub fn parse(node: &str, path: &str) -> Self {
        let node = NodeId::intern(node);
        match path.split_once('.') {
            Some((port, sub)) => Self::with_sub(node, PortId::intern(port), PortId::intern(sub)),
            None => Self::new(node, PortId::intern(path)),
        }
    }

    /// Dotted path as used by the persisted form: `port` or `port.sub`.
    pub fn path(&self) -> String {
        match self.sub {
            Some(sub) => format!("{}.{}", self.port, sub),
            None => self.port.to_string(),
        }
    }

    /// The template port this property belongs to (itself if not a sub-property).
    pub fn template(&self) -> PropertyRef {
        PropertyRef::new(self.node, self.port)
    }

    /// True when both refer to the same logical port, treating every
    /// sub-property of a dynamic port as related to its template.
    pub fn is_related_to(&self, other: &PropertyRef) -> bool {
        self.node == other.node && self.port == other.port
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.path())
    }
}

/// Directed edge from an OUTPUT-kind property to an INPUT-kind property.
///
/// Build one with [`Group::connection_between`], which normalizes endpoint
/// order; then attach it with [`Group::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: PropertyRef,
    pub to: PropertyRef,
}

impl Connection {
    pub fn opposite(&self, end: &PropertyRef) -> Option<PropertyRef> {
        if self.from == *end {
            Some(self.to)
        } else if self.to == *end {
            Some(self.from)
        } else {
            None
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from.node == node || self.to.node == node
    }
}

// ─── Properties ──────────────────────────────────────────────────────────

/// Arity of a property: a fixed port, or a dynamic template port.
#[derive(Debug, Clone, Default)]
pub enum Arity {
    #[default]
    Fixed,
    Dynamic(DynamicPort),
}

/// Connection-count state of a dynamic port.
#[derive(Debug, Clone, Default)]
pub enum DynamicState {
    /// No sub-property is connected.
    #[default]
    Template,
    /// One or more connected sub-properties. Never empty.
    Materialized(Vec<Property>),
}

/// A dynamic port with its live sub-properties.
///
/// Sub-properties that lost their last connection are kept in `retired`
/// so that reconnecting (e.g. on undo) revives them with their label and
/// value intact. Retired sub-properties are invisible to lookups and to
/// persistence.
#[derive(Debug, Clone, Default)]
pub struct DynamicPort {
    state: DynamicState,
    retired: Vec<Property>,
}

impl DynamicPort {
    pub fn state(&self) -> &DynamicState {
        &self.state
    }

    pub fn children(&self) -> &[Property] {
        match &self.state {
            DynamicState::Template => &[],
            DynamicState::Materialized(children) => children,
        }
    }

    fn children_mut(&mut self) -> &mut [Property] {
        match &mut self.state {
            DynamicState::Template => &mut [],
            DynamicState::Materialized(children) => children,
        }
    }

    fn slot(&self, sub: PortId) -> Option<&Property> {
        self.children()
            .iter()
            .chain(self.retired.iter())
            .find(|p| p.id() == sub)
    }

    fn slot_mut(&mut self, sub: PortId) -> Option<&mut Property> {
        let in_children = self.children().iter().any(|p| p.id() == sub);
        if in_children {
            self.children_mut().iter_mut().find(|p| p.id() == sub)
        } else {
            self.retired.iter_mut().find(|p| p.id() == sub)
        }
    }

    /// Forget sub-properties no connection can revive any more.
    fn prune_retired(&mut self) -> usize {
        let count = self.retired.len();
        self.retired.clear();
        count
    }

    fn materialize(&mut self, property: Property) {
        match &mut self.state {
            DynamicState::Template => self.state = DynamicState::Materialized(vec![property]),
            DynamicState::Materialized(children) => children.push(property),
        }
    }

    fn attach(&mut self, sub: PortId, connection: Connection) -> bool {
        if let Some(child) = self.children_mut().iter_mut().find(|p| p.id() == sub) {
            child.push_connection(connection);
            return true;
        }
        if let Some(pos) = self.retired.iter().position(|p| p.id() == sub) {
            let mut revived = self.retired.remove(pos);
            revived.push_connection(connection);
            self.materialize(revived);
            return true;
        }
        false
    }

    fn detach(&mut self, sub: PortId, connection: &Connection) -> bool {
        let DynamicState::Materialized(children) = &mut self.state else {
            return false;
        };
        let Some(pos) = children.iter().position(|p| p.id() == sub) else {
            return false;
        };
        if !children[pos].remove_connection(connection) {
            return false;
        }
        if children[pos].connections.is_empty() {
            let retired = children.remove(pos);
            self.retired.push(retired);
            if children.is_empty() {
                self.state = DynamicState::Template;
            }
        }
        true
    }
}

/// A node's concrete binding of a port definition.
#[derive(Debug, Clone)]
pub struct Property {
    definition: PropertyDefinition,
    value: Option<Value>,
    connections: SmallVec<[Connection; 1]>,
    arity: Arity,
    /// Template port id, set on dynamic sub-properties.
    parent: Option<PortId>,
}

impl Property {
    pub fn new(definition: PropertyDefinition) -> Self {
        let (arity, value) = if definition.kind.is_dynamic() {
            (Arity::Dynamic(DynamicPort::default()), None)
        } else {
            (Arity::Fixed, definition.default_value.clone())
        };
        Self {
            value,
            definition,
            connections: SmallVec::new(),
            arity,
            parent: None,
        }
    }

    pub fn id(&self) -> PortId {
        self.definition.id
    }

    pub fn kind(&self) -> PortKind {
        self.definition.kind
    }

    pub fn definition(&self) -> &PropertyDefinition {
        &self.definition
    }

    pub fn label(&self) -> &str {
        &self.definition.label
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    pub fn parent(&self) -> Option<PortId> {
        self.parent
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Editable unless the definition says otherwise, or this is an input
    /// currently driven by a connection.
    pub fn is_editable(&self) -> bool {
        if !self.definition.editable {
            return false;
        }
        !(self.definition.kind == PortKind::Input && self.is_connected())
    }

    /// Materialized sub-properties of a dynamic port (empty otherwise).
    pub fn sub_properties(&self) -> &[Property] {
        match &self.arity {
            Arity::Dynamic(port) => port.children(),
            Arity::Fixed => &[],
        }
    }

    pub fn find_sub_property(&self, sub: PortId) -> Option<&Property> {
        self.sub_properties().iter().find(|p| p.id() == sub)
    }

    /// Every connection on this property and on its materialized sub-properties.
    pub fn all_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .chain(self.sub_properties().iter().flat_map(|p| p.connections.iter()))
    }

    fn push_connection(&mut self, connection: Connection) {
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
    }

    fn remove_connection(&mut self, connection: &Connection) -> bool {
        match self.connections.iter().position(|c| c == connection) {
            Some(pos) => {
                self.connections.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Create a sub-property on a dynamic port. It stays retired (invisible)
    /// until a connection attaches to it.
    fn create_sub_property(&mut self, id: PortId, label: Option<String>, value: Option<Value>) {
        let template = self.definition.clone();
        let Arity::Dynamic(port) = &mut self.arity else {
            return;
        };
        let label =
            label.unwrap_or_else(|| format!("{}-{}", template.label, port.children().len()));
        let mut sub = Property::new(PropertyDefinition {
            kind: template.kind.materialized(),
            id,
            label: label.clone(),
            linkable: true,
            editable: template.editable,
            value_type: template.value_type,
            default_value: None,
        });
        sub.value = Some(value.unwrap_or(Value::String(label)));
        sub.parent = Some(template.id);
        port.retired.push(sub);
    }

    /// Recompute a template's value from its materialized sub-properties:
    /// an object `{sub id: sub value}`, or nothing while in `Template` state.
    fn sync_template_value(&mut self) {
        let Arity::Dynamic(port) = &self.arity else {
            return;
        };
        self.value = match port.state() {
            DynamicState::Template => None,
            DynamicState::Materialized(children) => Some(Value::Object(
                children
                    .iter()
                    .filter_map(|c| c.value.clone().map(|v| (c.id().to_string(), v)))
                    .collect(),
            )),
        };
    }
}

// ─── Nodes & Frames ──────────────────────────────────────────────────────

/// Something that can live inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framable {
    Node(NodeId),
    Frame(FrameId),
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    definition: Arc<NodeDefinition>,
    pub location: Point,
    pub collapsed: bool,
    /// Explicit width override; `0.0` means "use the layout default".
    pub full_width: f32,
    properties: Vec<Property>,
    parent: Option<FrameId>,
}

impl Node {
    pub fn new(id: NodeId, definition: Arc<NodeDefinition>, location: Point) -> Self {
        let properties = definition
            .properties
            .iter()
            .cloned()
            .map(Property::new)
            .collect();
        Self {
            id,
            definition,
            location,
            collapsed: false,
            full_width: 0.0,
            properties,
            parent: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn definition(&self) -> &Arc<NodeDefinition> {
        &self.definition
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn find_property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id().as_str() == id)
    }

    /// Resolve `port` or `port.sub`; sub-properties must be materialized.
    pub fn find_property_by_path(&self, path: &str) -> Option<&Property> {
        match path.split_once('.') {
            Some((port, sub)) => self
                .find_property(port)?
                .sub_properties()
                .iter()
                .find(|p| p.id().as_str() == sub),
            None => self.find_property(path),
        }
    }

    /// Look up a property by reference; retired sub-properties are not found.
    pub fn property(&self, r: &PropertyRef) -> Option<&Property> {
        let top = self.properties.iter().find(|p| p.id() == r.port)?;
        match r.sub {
            Some(sub) => top.find_sub_property(sub),
            None => Some(top),
        }
    }

    /// Reference to the top-level property at `index`.
    pub fn property_ref(&self, index: usize) -> Option<PropertyRef> {
        self.properties
            .get(index)
            .map(|p| PropertyRef::new(self.id, p.id()))
    }

    /// Every distinct connection touching this node.
    pub fn connections(&self) -> Vec<Connection> {
        let mut out: Vec<Connection> = Vec::new();
        for c in self.properties.iter().flat_map(Property::all_connections) {
            if !out.contains(c) {
                out.push(*c);
            }
        }
        out
    }

    fn top_mut(&mut self, port: PortId) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.id() == port)
    }

    /// Kind and existence check that also sees retired sub-properties.
    fn slot_kind(&self, r: &PropertyRef) -> Option<PortKind> {
        let top = self.properties.iter().find(|p| p.id() == r.port)?;
        match (r.sub, &top.arity) {
            (None, _) => Some(top.kind()),
            (Some(sub), Arity::Dynamic(port)) => port.slot(sub).map(Property::kind),
            (Some(_), Arity::Fixed) => None,
        }
    }

    fn attach(&mut self, r: &PropertyRef, connection: Connection) -> bool {
        let Some(top) = self.top_mut(r.port) else {
            return false;
        };
        match r.sub {
            None => {
                top.push_connection(connection);
                true
            }
            Some(sub) => {
                let attached = match &mut top.arity {
                    Arity::Dynamic(port) => port.attach(sub, connection),
                    Arity::Fixed => false,
                };
                top.sync_template_value();
                attached
            }
        }
    }

    fn detach(&mut self, r: &PropertyRef, connection: &Connection) -> bool {
        let Some(top) = self.top_mut(r.port) else {
            return false;
        };
        match r.sub {
            None => top.remove_connection(connection),
            Some(sub) => {
                let detached = match &mut top.arity {
                    Arity::Dynamic(port) => port.detach(sub, connection),
                    Arity::Fixed => false,
                };
                top.sync_template_value();
                detached
            }
        }
    }

    /// Set a property value. Sub-property values flow into their template's
    /// derived value. Returns `false` if the property does not exist.
    pub fn set_value(&mut self, r: &PropertyRef, value: Option<Value>) -> bool {
        let Some(top) = self.top_mut(r.port) else {
            return false;
        };
        match r.sub {
            None => {
                top.value = value;
                true
            }
            Some(sub) => {
                let found = match &mut top.arity {
                    Arity::Dynamic(port) => match port.slot_mut(sub) {
                        Some(child) => {
                            child.value = value;
                            true
                        }
                        None => false,
                    },
                    Arity::Fixed => false,
                };
                top.sync_template_value();
                found
            }
        }
    }

    /// Restore a persisted value. A dynamic port's value is an object of
    /// `{sub id: label}`; each entry becomes a retired sub-property that a
    /// persisted connection can then address as `port.sub`.
    pub fn restore_value(&mut self, port: PortId, value: Value) -> bool {
        let Some(top) = self.top_mut(port) else {
            return false;
        };
        if !top.kind().is_dynamic() {
            top.value = Some(value);
            return true;
        }
        if let Value::Object(entries) = value {
            for (key, entry) in entries {
                let label = entry.as_str().map(str::to_owned);
                top.create_sub_property(PortId::intern(&key), label, Some(entry));
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub label: String,
    children: Vec<Framable>,
    parent: Option<FrameId>,
}

impl Frame {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn children(&self) -> &[Framable] {
        &self.children
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }
}

// ─── Viewport ────────────────────────────────────────────────────────────

/// Pan/zoom of the canvas. Not undoable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    /// Model coordinate shown at the top-left of the screen.
    pub origin: Point,
    pub scale: f32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            origin: Point::ORIGIN,
            scale: 1.0,
        }
    }
}

impl ZoomState {
    pub fn update(&mut self, origin: Point, scale: f32) {
        self.origin = origin;
        self.scale = scale;
    }

    pub fn move_by(&mut self, offset: Point) {
        self.origin = self.origin.add(offset);
    }

    pub fn to_model(&self, screen: Point) -> Point {
        screen.scale(1.0 / self.scale).add(self.origin)
    }

    pub fn to_screen(&self, model: Point) -> Point {
        model.sub(self.origin).scale(self.scale)
    }
}

// ─── Group ───────────────────────────────────────────────────────────────

/// The editable document: every live node and frame, plus the viewport.
#[derive(Debug, Clone, Default)]
pub struct Group {
    nodes: IndexMap<NodeId, Node>,
    frames: IndexMap<FrameId, Frame>,
    pub zoom: ZoomState,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ──

    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Append a node. A node with the same id is replaced in place.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    /// Remove a node, preserving the order of the others.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.shift_remove(&id)
    }

    /// Position of a node in paint order.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&id)
    }

    /// Put a node back at `index` (clamped), e.g. when undoing a removal.
    pub fn insert_node(&mut self, index: usize, node: Node) {
        let index = index.min(self.nodes.len());
        self.nodes.shift_insert(index, node.id, node);
    }

    // ── Frames ──

    pub fn frames(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().map(|(id, f)| (*id, f))
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(&id)
    }

    pub fn contains_frame(&self, id: FrameId) -> bool {
        self.frames.contains_key(&id)
    }

    pub fn add_frame(&mut self, id: FrameId, frame: Frame) {
        self.frames.insert(id, frame);
    }

    pub fn remove_frame(&mut self, id: FrameId) -> Option<Frame> {
        self.frames.shift_remove(&id)
    }

    pub fn frame_index(&self, id: FrameId) -> Option<usize> {
        self.frames.get_index_of(&id)
    }

    pub fn insert_frame(&mut self, index: usize, id: FrameId, frame: Frame) {
        let index = index.min(self.frames.len());
        self.frames.shift_insert(index, id, frame);
    }

    /// Frames that are not nested inside another frame, in insertion order.
    pub fn top_level_frames(&self) -> Vec<FrameId> {
        self.frames
            .iter()
            .filter(|(_, f)| f.parent.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every node and frame below `frame`, depth-first.
    pub fn descendants(&self, frame: FrameId) -> (Vec<NodeId>, Vec<FrameId>) {
        let mut nodes = Vec::new();
        let mut frames = Vec::new();
        let mut stack = vec![frame];
        while let Some(current) = stack.pop() {
            let Some(f) = self.frames.get(&current) else {
                continue;
            };
            for child in &f.children {
                match *child {
                    Framable::Node(id) => nodes.push(id),
                    Framable::Frame(id) => {
                        frames.push(id);
                        stack.push(id);
                    }
                }
            }
        }
        (nodes, frames)
    }

    // ── Membership ──

    pub fn parent_of(&self, item: Framable) -> Option<FrameId> {
        match item {
            Framable::Node(id) => self.nodes.get(&id).and_then(|n| n.parent),
            Framable::Frame(id) => self.frames.get(&id).and_then(|f| f.parent),
        }
    }

    fn set_parent(&mut self, item: Framable, parent: Option<FrameId>) {
        match item {
            Framable::Node(id) => {
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.parent = parent;
                }
            }
            Framable::Frame(id) => {
                if let Some(f) = self.frames.get_mut(&id) {
                    f.parent = parent;
                }
            }
        }
    }

    /// Position of `item` among its parent's children.
    pub fn child_index(&self, item: Framable) -> Option<usize> {
        let parent = self.parent_of(item)?;
        self.frames.get(&parent)?.children.iter().position(|c| *c == item)
    }

    /// Move `item` into `frame` (or out of any frame with `None`).
    /// Always detaches from the previous parent first.
    pub fn add_to_frame(&mut self, item: Framable, frame: Option<FrameId>) {
        self.insert_in_frame(item, frame, usize::MAX);
    }

    /// Like [`add_to_frame`](Self::add_to_frame), placing `item` at `index`
    /// (clamped) among the new parent's children.
    pub fn insert_in_frame(&mut self, item: Framable, frame: Option<FrameId>, index: usize) {
        if let Some(old) = self.parent_of(item) {
            if let Some(old_frame) = self.frames.get_mut(&old) {
                old_frame.children.retain(|c| *c != item);
            }
        }
        let frame = match frame {
            Some(id) if !self.frames.contains_key(&id) => {
                log::warn!("add_to_frame: frame {id:?} is not part of the group");
                None
            }
            other => other,
        };
        self.set_parent(item, frame);
        if let Some(new_frame) = frame.and_then(|id| self.frames.get_mut(&id)) {
            let index = index.min(new_frame.children.len());
            new_frame.children.insert(index, item);
        }
    }

    // ── Properties & connections ──

    pub fn property(&self, r: &PropertyRef) -> Option<&Property> {
        self.nodes.get(&r.node)?.property(r)
    }

    pub fn set_value(&mut self, r: &PropertyRef, value: Option<Value>) -> bool {
        self.nodes
            .get_mut(&r.node)
            .is_some_and(|n| n.set_value(r, value))
    }

    fn slot_kind(&self, r: &PropertyRef) -> Result<PortKind, GraphError> {
        self.nodes
            .get(&r.node)
            .and_then(|n| n.slot_kind(r))
            .ok_or_else(|| GraphError::MissingEndpoint {
                node: r.node.to_string(),
                property: r.path(),
            })
    }

    /// Give a template endpoint a fresh sub-property; other endpoints pass through.
    fn materialize(&mut self, r: PropertyRef) -> PropertyRef {
        if r.sub.is_some() {
            return r;
        }
        let Some(top) = self.nodes.get_mut(&r.node).and_then(|n| n.top_mut(r.port)) else {
            return r;
        };
        if !top.kind().is_dynamic() {
            return r;
        }
        let sub = PortId::fresh(&format!("{}_", r.port));
        top.create_sub_property(sub, None, None);
        PropertyRef::with_sub(r.node, r.port, sub)
    }

    /// Build a connection between two properties in either order.
    ///
    /// The OUTPUT-kind endpoint always ends up in `from`. Dynamic template
    /// endpoints get a new (not yet visible) sub-property first.
    pub fn connection_between(
        &mut self,
        a: PropertyRef,
        b: PropertyRef,
    ) -> Result<Connection, GraphError> {
        let a_out = self.slot_kind(&a)?.is_output();
        let b_out = self.slot_kind(&b)?.is_output();
        if a_out == b_out {
            return Err(GraphError::IncompatiblePorts {
                from: a.to_string(),
                to: b.to_string(),
            });
        }
        let a = self.materialize(a);
        let b = self.materialize(b);
        let (from, to) = if a_out { (a, b) } else { (b, a) };
        Ok(Connection { from, to })
    }

    /// Attach a connection to both endpoints. Idempotent.
    pub fn connect(&mut self, connection: &Connection) {
        for end in [connection.from, connection.to] {
            if let Some(node) = self.nodes.get_mut(&end.node) {
                node.attach(&end, *connection);
            }
        }
    }

    /// Detach a connection from both endpoints. Idempotent.
    pub fn disconnect(&mut self, connection: &Connection) {
        for end in [connection.from, connection.to] {
            if let Some(node) = self.nodes.get_mut(&end.node) {
                node.detach(&end, connection);
            }
        }
    }

    /// Whether a user may wire `a` to `b`: different nodes, opposite
    /// directions, and neither side an input that is already driven.
    pub fn can_connect(&self, a: &PropertyRef, b: &PropertyRef) -> bool {
        if a.node == b.node {
            return false;
        }
        let (Some(pa), Some(pb)) = (self.property(a), self.property(b)) else {
            return false;
        };
        if pa.kind().is_output() == pb.kind().is_output() {
            return false;
        }
        let occupied = |p: &Property| p.kind() == PortKind::Input && p.is_connected();
        !(occupied(pa) || occupied(pb))
    }

    /// Drop every retired sub-property. Only safe when nothing (an undo
    /// history, a gesture in progress) still holds a connection to one.
    pub fn prune_retired(&mut self) -> usize {
        let mut pruned = 0;
        for node in self.nodes.values_mut() {
            for property in &mut node.properties {
                if let Arity::Dynamic(port) = &mut property.arity {
                    pruned += port.prune_retired();
                }
            }
        }
        pruned
    }

    /// Every connection in the group, each listed once.
    pub fn connections(&self) -> Vec<Connection> {
        self.nodes
            .values()
            .flat_map(|n| n.properties.iter())
            .filter(|p| p.kind().is_output())
            .flat_map(Property::all_connections)
            .copied()
            .collect()
    }
}

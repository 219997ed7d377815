//! Integration tests: command log and commands against a loaded graph.

use ng_core::*;
use ng_editor::commands::*;
use ng_editor::{CommandLog, Editor, EditorConfig};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

fn factory() -> NodeFactory {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = DefaultRegistry::from_json(include_str!("fixtures/definitions.json"))
        .expect("definitions fixture must parse");
    NodeFactory::new(registry)
}

fn editor() -> Editor {
    let mut editor = Editor::new(factory(), EditorConfig::default()).expect("default config");
    editor
        .load_json(include_str!("fixtures/graph.json"))
        .expect("graph fixture must load");
    editor
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn prop(node: &str, path: &str) -> PropertyRef {
    PropertyRef::parse(node, path)
}

/// `emit(c); undo(); redo()` must land exactly where `emit(c)` did, and
/// `undo()` exactly where we started.
fn assert_replays(editor: &mut Editor, command: Box<dyn ng_editor::Command<Group>>) {
    let before = editor.save();
    editor.emit(command);
    let after = editor.save();
    assert_ne!(before, after, "command had no effect");

    editor.undo();
    assert_eq!(editor.save(), before);
    editor.redo();
    assert_eq!(editor.save(), after);
}

// ─── Replay law ──────────────────────────────────────────────────────────

#[test]
fn every_command_replays() {
    let mut editor = editor();

    let moves = vec![NodeMove {
        node: id("n0"),
        start: Point::ORIGIN,
        end: Point::new(40.0, 60.0),
    }];
    assert_replays(&mut editor, Box::new(Move::new(moves)));

    let toggle = ToggleCollapse::new(editor.group(), id("n1"));
    assert_replays(&mut editor, Box::new(toggle));

    let create = CreateConnection::new(prop("n1", "in1"), prop("n2", "out0"));
    assert_replays(&mut editor, Box::new(create));

    let existing = editor.group().connections()[0];
    assert_replays(&mut editor, Box::new(RemoveConnection::new(existing)));

    let node = editor
        .factory()
        .create_node("source", Point::new(800.0, 400.0))
        .unwrap();
    assert_replays(&mut editor, Box::new(AddNode::new(node)));

    let change = ChangePropertyValue::new(editor.group(), prop("n2", "name"), Some(Value::from("x")));
    assert_replays(&mut editor, Box::new(change));

    let resize = ResizeNode::new(editor.group(), id("n2"), Dimension::new(320.0, 10.0));
    assert_replays(&mut editor, Box::new(resize));

    let join = JoinInNewFrame::new(vec![Framable::Node(id("n0")), Framable::Node(id("n3"))]);
    let frame = join.frame();
    assert_replays(&mut editor, Box::new(join));

    let rename = RenameFrame::new(editor.group(), frame, "Sources");
    assert_replays(&mut editor, Box::new(rename));

    let remove = RemoveFromFrame::new(vec![Framable::Node(id("n3"))]);
    assert_replays(&mut editor, Box::new(remove));

    let delete = DeleteNodes::new(editor.group(), &[id("n2")], &[frame]);
    assert_replays(&mut editor, Box::new(delete));
}

#[test]
fn composite_undoes_in_reverse() {
    let mut editor = editor();
    let before = editor.save();
    let previous = editor.group().connections()[0];
    editor.emit(Box::new(Composite::new(vec![
        Box::new(RemoveConnection::new(previous)),
        Box::new(CreateConnection::new(prop("n0", "out0"), prop("n1", "in1"))),
    ])));
    assert_eq!(editor.group().connections()[0].to, prop("n1", "in1"));

    editor.undo();
    assert_eq!(editor.save(), before);
}

// ─── History bounds ──────────────────────────────────────────────────────

#[test]
fn emit_after_undo_discards_the_redo_tail() {
    let mut editor = editor();
    for x in [10.0, 20.0, 30.0] {
        let start = editor.group().node(id("n0")).unwrap().location;
        editor.emit(Box::new(Move::new(vec![NodeMove {
            node: id("n0"),
            start,
            end: Point::new(x, 0.0),
        }])));
    }
    editor.undo();
    editor.undo();
    assert!(editor.history().can_redo());

    let change = ChangePropertyValue::new(editor.group(), prop("n1", "in1"), Some(Value::from("a")));
    editor.emit(Box::new(change));
    assert!(!editor.history().can_redo());
    assert_eq!(editor.history().len(), 2);
    assert!(editor.redo().is_none());
    assert_eq!(editor.group().node(id("n0")).unwrap().location, Point::new(10.0, 0.0));
}

#[test]
fn history_is_capped_at_twenty() {
    let mut editor = editor();
    for i in 0..25 {
        let value = Some(Value::from(format!("v{i}")));
        let change = ChangePropertyValue::new(editor.group(), prop("n2", "name"), value);
        editor.emit(Box::new(change));
    }
    assert_eq!(editor.history().len(), 20);

    while editor.undo().is_some() {}
    // The five oldest edits fell off the log and stay applied.
    let name = editor.group().property(&prop("n2", "name")).unwrap().value().cloned();
    assert_eq!(name, Some(Value::from("v4")));
}

#[test]
fn clearing_history_drops_retired_sub_properties() {
    let mut editor = editor();
    let parts = prop("n3", "parts");
    for _ in 0..3 {
        editor.emit(Box::new(CreateConnection::new(parts, prop("n1", "in1"))));
        editor.undo();
    }
    assert_eq!(editor.group().clone().prune_retired(), 3);

    editor.clear_history();
    assert!(editor.history().is_empty());
    assert!(editor.undo().is_none());
    assert_eq!(editor.group().clone().prune_retired(), 0);

    editor.emit(Box::new(CreateConnection::new(parts, prop("n1", "in1"))));
    assert_eq!(editor.group().property(&parts).unwrap().sub_properties().len(), 1);
}

#[test]
fn undo_at_empty_history_is_a_no_op() {
    let mut editor = editor();
    let before = editor.save();
    assert!(editor.undo().is_none());
    assert!(editor.redo().is_none());
    assert_eq!(editor.save(), before);
}

#[test]
fn listeners_receive_the_visual_flag() {
    let mut editor = editor();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    editor.add_listener(move |visual| sink.borrow_mut().push(visual));

    editor.emit(Box::new(Move::new(vec![NodeMove {
        node: id("n0"),
        start: Point::ORIGIN,
        end: Point::new(5.0, 5.0),
    }])));
    editor.emit(Box::new(CreateConnection::new(prop("n0", "out0"), prop("n1", "in1"))));
    editor.undo();

    assert_eq!(*seen.borrow(), vec![true, false, false]);
}

#[test]
fn command_log_works_without_a_graph() {
    struct Push(i32);
    impl ng_editor::Command<Vec<i32>> for Push {
        fn execute(&mut self, target: &mut Vec<i32>) {
            target.push(self.0);
        }
        fn undo(&mut self, target: &mut Vec<i32>) {
            target.pop();
        }
        fn describe(&self) -> String {
            format!("push {}", self.0)
        }
    }

    let mut log = CommandLog::new(3);
    let mut v = Vec::new();
    for i in 0..4 {
        log.emit(&mut v, Box::new(Push(i)));
    }
    assert_eq!(v, vec![0, 1, 2, 3]);
    assert_eq!(log.len(), 3);
    assert_eq!(log.undo(&mut v).as_deref(), Some("push 3"));
    assert_eq!(v, vec![0, 1, 2]);
}

// ─── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn deleting_a_node_restores_its_connections_on_undo() {
    let mut editor = editor();
    editor.emit(Box::new(CreateConnection::new(prop("n1", "out0"), prop("n3", "source"))));
    assert_eq!(editor.group().connections().len(), 2);
    let before = editor.save();

    let delete = DeleteNodes::new(editor.group(), &[id("n1")], &[]);
    editor.emit(Box::new(delete));
    assert!(editor.group().node(id("n1")).is_none());
    assert!(editor.group().connections().is_empty());
    assert!(!editor.group().property(&prop("n0", "out0")).unwrap().is_connected());

    editor.undo();
    assert_eq!(editor.group().connections().len(), 2);
    assert_eq!(editor.save(), before);
}

#[test]
fn property_value_scenario() {
    let mut editor = editor();
    let out0 = editor.group().property(&prop("n0", "out0")).unwrap();
    assert_eq!(out0.connections()[0].to, prop("n1", "in0"));
    assert_eq!(editor.group().property(&prop("n1", "in1")).unwrap().value(), None);

    let change = ChangePropertyValue::new(editor.group(), prop("n1", "in1"), Some(Value::from("test")));
    editor.emit(Box::new(change));
    assert_eq!(editor_value(&editor, "n1", "in1"), Some(Value::from("test")));

    editor.undo();
    assert_eq!(editor_value(&editor, "n1", "in1"), None);
    editor.redo();
    assert_eq!(editor_value(&editor, "n1", "in1"), Some(Value::from("test")));
}

fn editor_value(editor: &Editor, node: &str, path: &str) -> Option<Value> {
    editor
        .group()
        .property(&prop(node, path))
        .and_then(|p| p.value().cloned())
}

#[test]
fn dynamic_output_materializes_one_sub_property() {
    let mut editor = editor();
    let parts = prop("n3", "parts");
    assert!(editor.group().property(&parts).unwrap().sub_properties().is_empty());

    let create = CreateConnection::new(parts, prop("n1", "in1"));
    editor.emit(Box::new(create));
    let subs = editor.group().property(&parts).unwrap().sub_properties();
    assert_eq!(subs.len(), 1);
    let sub = PropertyRef::with_sub(id("n3"), parts.port, subs[0].id());
    assert_eq!(editor.group().connections().iter().filter(|c| c.from == sub).count(), 1);

    let connection = editor
        .group()
        .connections()
        .into_iter()
        .find(|c| c.from == sub)
        .unwrap();
    editor.emit(Box::new(RemoveConnection::new(connection)));
    assert!(editor.group().property(&parts).unwrap().sub_properties().is_empty());
    assert!(editor.group().property(&sub).is_none());

    let saved = editor.save();
    assert!(saved.connections.iter().all(|c| c.from.node != id("n3")));
    let json = editor.save_json().unwrap();
    assert!(!json.contains("parts"));
}

#[test]
fn second_connection_gets_a_fresh_sub_property() {
    let mut editor = editor();
    let parts = prop("n3", "parts");
    editor.emit(Box::new(CreateConnection::new(parts, prop("n1", "in1"))));
    editor.emit(Box::new(CreateConnection::new(parts, prop("n2", "name"))));
    let subs = editor.group().property(&parts).unwrap().sub_properties();
    assert_eq!(subs.len(), 2);
    assert_ne!(subs[0].id(), subs[1].id());

    editor.undo();
    assert_eq!(editor.group().property(&parts).unwrap().sub_properties().len(), 1);
}

#[test]
fn deleting_the_last_members_removes_their_frames() {
    let mut editor = editor();
    let inner = JoinInNewFrame::new(vec![Framable::Node(id("n0"))]);
    let inner_id = inner.frame();
    editor.emit(Box::new(inner));
    let outer = JoinInNewFrame::new(vec![Framable::Frame(inner_id), Framable::Node(id("n3"))]);
    let outer_id = outer.frame();
    editor.emit(Box::new(outer));
    let before = editor.save();

    // Emptying the inner frame removes it; the outer one still holds n3.
    let delete = DeleteNodes::new(editor.group(), &[id("n0")], &[]);
    editor.emit(Box::new(delete));
    assert!(editor.group().frame(inner_id).is_none());
    assert_eq!(editor.group().frame(outer_id).unwrap().children(), &[Framable::Node(id("n3"))]);

    // Emptying the outer frame as well leaves no frame behind.
    let delete = DeleteNodes::new(editor.group(), &[id("n3")], &[]);
    editor.emit(Box::new(delete));
    assert_eq!(editor.group().frames().count(), 0);
    assert!(!editor.save_json().unwrap().contains("\"frame\""));

    editor.undo();
    editor.undo();
    assert_eq!(editor.save(), before);
    assert_eq!(editor.group().parent_of(Framable::Frame(inner_id)), Some(outer_id));
    assert_eq!(editor.group().parent_of(Framable::Node(id("n0"))), Some(inner_id));
}

#[test]
fn deleting_every_member_at_once_removes_the_frame() {
    let mut editor = editor();
    editor.emit(Box::new(JoinInNewFrame::new(vec![
        Framable::Node(id("n0")),
        Framable::Node(id("n1")),
    ])));
    let before = editor.save();

    let delete = DeleteNodes::new(editor.group(), &[id("n0"), id("n1")], &[]);
    assert_replays(&mut editor, Box::new(delete));
    editor.undo();
    assert_eq!(editor.save(), before);

    editor.redo();
    assert_eq!(editor.group().frames().count(), 0);
    assert!(editor.scene().frames.is_empty());
}

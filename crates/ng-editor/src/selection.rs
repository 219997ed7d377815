use crate::input::Modifiers;
use ng_core::{Framable, FrameId, Group, NodeId};

/// How a pick combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Add,
    Remove,
    Replace,
}

impl SelectionMode {
    /// Shift adds, Ctrl removes, anything else replaces.
    pub fn from_modifiers(modifiers: Modifiers) -> Self {
        if modifiers.shift {
            SelectionMode::Add
        } else if modifiers.ctrl {
            SelectionMode::Remove
        } else {
            SelectionMode::Replace
        }
    }
}

/// Ordered set of selected nodes and frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<Framable>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Framable] {
        &self.items
    }

    pub fn contains(&self, item: Framable) -> bool {
        self.items.contains(&item)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn select(&mut self, items: impl IntoIterator<Item = Framable>, mode: SelectionMode) {
        match mode {
            SelectionMode::Replace => {
                self.items.clear();
                self.add(items);
            }
            SelectionMode::Add => self.add(items),
            SelectionMode::Remove => {
                for item in items {
                    self.items.retain(|i| *i != item);
                }
            }
        }
    }

    fn add(&mut self, items: impl IntoIterator<Item = Framable>) {
        for item in items {
            if !self.items.contains(&item) {
                self.items.push(item);
            }
        }
    }

    pub fn frames(&self) -> Vec<FrameId> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Framable::Frame(id) => Some(*id),
                Framable::Node(_) => None,
            })
            .collect()
    }

    /// Every selected node, with frames expanded to all the nodes they
    /// contain, in selection order and without duplicates.
    pub fn nodes(&self, group: &Group) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut push = |id: NodeId| {
            if group.contains_node(id) && !out.contains(&id) {
                out.push(id);
            }
        };
        for item in &self.items {
            match *item {
                Framable::Node(id) => push(id),
                Framable::Frame(frame) => group.descendants(frame).0.into_iter().for_each(&mut push),
            }
        }
        out
    }

    /// Selected items that are not inside another selected frame.
    pub fn roots(&self, group: &Group) -> Vec<Framable> {
        self.items
            .iter()
            .copied()
            .filter(|item| {
                let mut parent = group.parent_of(*item);
                while let Some(frame) = parent {
                    if self.contains(Framable::Frame(frame)) {
                        return false;
                    }
                    parent = group.parent_of(Framable::Frame(frame));
                }
                true
            })
            .collect()
    }

    /// Drop items that are no longer part of the group.
    pub fn prune(&mut self, group: &Group) {
        self.items.retain(|item| match *item {
            Framable::Node(id) => group.contains_node(id),
            Framable::Frame(id) => group.contains_frame(id),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_core::Frame;

    fn n(id: &str) -> Framable {
        Framable::Node(NodeId::intern(id))
    }

    #[test]
    fn modes() {
        let mut s = Selection::new();
        s.select([n("s0"), n("s1")], SelectionMode::Replace);
        s.select([n("s1"), n("s2")], SelectionMode::Add);
        assert_eq!(s.items(), &[n("s0"), n("s1"), n("s2")]);
        s.select([n("s0")], SelectionMode::Remove);
        assert_eq!(s.items(), &[n("s1"), n("s2")]);
        s.select([n("s3")], SelectionMode::Replace);
        assert_eq!(s.items(), &[n("s3")]);
    }

    #[test]
    fn mode_from_modifiers() {
        assert_eq!(SelectionMode::from_modifiers(Modifiers::SHIFT), SelectionMode::Add);
        assert_eq!(SelectionMode::from_modifiers(Modifiers::CTRL), SelectionMode::Remove);
        assert_eq!(SelectionMode::from_modifiers(Modifiers::NONE), SelectionMode::Replace);
    }

    #[test]
    fn roots_skip_items_inside_selected_frames() {
        let mut group = Group::new();
        let outer = FrameId::next();
        let inner = FrameId::next();
        group.add_frame(outer, Frame::new("outer"));
        group.add_frame(inner, Frame::new("inner"));
        group.add_to_frame(Framable::Frame(inner), Some(outer));

        let mut s = Selection::new();
        s.select([Framable::Frame(inner), Framable::Frame(outer)], SelectionMode::Add);
        assert_eq!(s.roots(&group), vec![Framable::Frame(outer)]);
    }
}

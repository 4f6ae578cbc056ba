//! Node arena: the element lifecycle store.
//!
//! Nodes live in a flat vector addressed by stable [`NodeId`] handles;
//! parent links are indices, so ancestor walks (numeric-spec inheritance,
//! visibility) chase indices instead of pointers. Removal detaches a
//! subtree and tombstones it: a detached node is inert and never revived,
//! re-declaring its key creates a fresh node with a fresh id.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::capability::TweenId;
use crate::classify::NodeKind;

/// Stable handle for one live (or tombstoned) node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Event subscriptions registered on a node through `_ev`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Subscriptions {
    pub button_up: bool,
    pub button_down: bool,
    pub click: bool,
    pub double_click: bool,
    pub pointer_move: bool,
    pub pointer_enter: bool,
    pub pointer_leave: bool,
}

impl Subscriptions {
    /// Fold another set into this one. Subscription lists only ever add
    /// codes; a code absent from a later list stays subscribed.
    pub fn merge(&mut self, other: Self) {
        self.button_up |= other.button_up;
        self.button_down |= other.button_down;
        self.click |= other.click;
        self.double_click |= other.double_click;
        self.pointer_move |= other.pointer_move;
        self.pointer_enter |= other.pointer_enter;
        self.pointer_leave |= other.pointer_leave;
    }
}

/// An in-flight value animation on a node.
#[derive(Debug, Clone)]
pub(crate) struct ActiveTween {
    /// Handle issued by the interpolator; frames carrying a different
    /// handle are stale and ignored.
    pub id: TweenId,
    /// Completion-acknowledgment id, dispatched on natural completion.
    pub ack: Option<String>,
}

/// One live tree element.
#[derive(Debug)]
pub(crate) struct StateNode {
    /// Declaration key, unique among siblings.
    pub id: String,
    /// Semantic kind; `None` for tombstoned and just-cleared nodes
    /// awaiting their next typed update.
    pub kind: Option<NodeKind>,
    /// Display label (empty for ordinal `#` keys).
    pub label: String,
    /// Tree depth; the roots sit at 0.
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub children: HashMap<String, NodeId>,
    /// Own numeric spec entries; merged with ancestors at render time.
    pub numeric_spec: Map<String, Value>,
    /// Persistent options, stored verbatim; survive kind-preserving
    /// updates and reset on retype.
    pub options: Map<String, Value>,
    /// Retained rounded numeric value, the start point for animations.
    pub retained: f64,
    pub subscriptions: Subscriptions,
    pub tween: Option<ActiveTween>,
    /// Tombstone flag; a detached node never re-enters the tree.
    pub detached: bool,
    /// Hidden flag; only the popup root toggles it.
    pub hidden: bool,
    /// Disabled nodes drop input and stop accepting edits.
    pub disabled: bool,
    /// Whether editable hooks have been announced to the surface.
    pub editing: bool,
    /// Whether the plot surface has been announced (line plots).
    pub has_plot: bool,
    /// Selection mark for selectable rows.
    pub selected: bool,
    /// Currently selected row of a single-select container.
    pub selected_child: Option<NodeId>,
    /// Last committed editable text, for commit deduplication.
    pub last_committed: Option<String>,
}

impl StateNode {
    fn new(id: String, kind: Option<NodeKind>, label: String, depth: u32, parent: Option<NodeId>) -> Self {
        Self {
            id,
            kind,
            label,
            depth,
            parent,
            children: HashMap::new(),
            numeric_spec: Map::new(),
            options: Map::new(),
            retained: 0.0,
            subscriptions: Subscriptions::default(),
            tween: None,
            detached: false,
            hidden: false,
            disabled: false,
            editing: false,
            has_plot: false,
            selected: false,
            selected_child: None,
            last_committed: None,
        }
    }
}

/// Reserved path segment addressing the popup tree, for
/// [`Engine::find_node`](crate::engine::Engine::find_node).
pub const POPUP_KEY: &str = "#_pp";

/// The node store.
///
/// Holds the main root and the popup root from construction; the popup
/// starts hidden and unattached.
#[derive(Debug)]
pub(crate) struct Arena {
    nodes: Vec<StateNode>,
    root: NodeId,
    popup: NodeId,
}

impl Arena {
    pub fn new() -> Self {
        let mut arena = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            popup: NodeId(0),
        };
        arena.root = arena.push(StateNode::new(
            "__main__".to_owned(),
            Some(NodeKind::Object),
            String::new(),
            0,
            None,
        ));
        let root = arena.root;
        arena.popup = arena.push(StateNode::new(
            "__pp__".to_owned(),
            Some(NodeKind::Object),
            String::new(),
            0,
            Some(root),
        ));
        arena.get_mut(arena.popup).hidden = true;
        arena
    }

    fn push(&mut self, node: StateNode) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn popup(&self) -> NodeId {
        self.popup
    }

    /// Whether a handle refers to a node this arena ever issued.
    pub fn contains(&self, id: NodeId) -> bool {
        (id.0 as usize) < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut StateNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Create a node under `parent` and link it into the child map.
    pub fn create(
        &mut self,
        parent: NodeId,
        key: &str,
        kind: NodeKind,
        depth: u32,
        label: String,
    ) -> NodeId {
        let node = self.push(StateNode::new(
            key.to_owned(),
            Some(kind),
            label,
            depth,
            Some(parent),
        ));
        self.get_mut(parent).children.insert(key.to_owned(), node);
        node
    }

    pub fn child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.get(parent).children.get(key).copied()
    }

    pub fn child_count(&self, parent: NodeId) -> usize {
        self.get(parent).children.len()
    }

    /// Collect a subtree, the given node included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            stack.extend(self.get(cur).children.values().copied());
        }
        out
    }

    /// Unlink a node from its parent and tombstone its subtree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.get(id).parent {
            let key = self.get(id).id.clone();
            self.get_mut(parent).children.remove(&key);
            if self.get(parent).selected_child == Some(id) {
                self.get_mut(parent).selected_child = None;
            }
        }
        for n in self.subtree(id) {
            let node = self.get_mut(n);
            node.detached = true;
            node.kind = None;
        }
    }

    /// Detach all children of a node, keeping the node itself.
    pub fn detach_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.get(id).children.values().copied().collect();
        self.get_mut(id).children.clear();
        self.get_mut(id).selected_child = None;
        for child in children {
            for n in self.subtree(child) {
                let node = self.get_mut(n);
                node.detached = true;
                node.kind = None;
            }
        }
    }

    /// Whether a node is currently visible: attached all the way up and
    /// not under a hidden root.
    pub fn visible(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            let node = self.get(cur);
            if node.detached || node.hidden {
                return false;
            }
            match node.parent {
                Some(parent) => cur = parent,
                None => return true,
            }
        }
    }

    /// Merge the numeric spec from a node up through its ancestors.
    ///
    /// Nearest entry wins per key. The walk merges the first root it
    /// reaches (main or popup) and stops there, so popup subtrees never
    /// inherit main-tree specs.
    pub fn merged_numeric_spec(&self, id: NodeId) -> Map<String, Value> {
        let mut merged = self.get(id).numeric_spec.clone();
        let mut cur = id;
        while cur != self.root && cur != self.popup {
            let Some(parent) = self.get(cur).parent else {
                break;
            };
            for (key, value) in &self.get(parent).numeric_spec {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            cur = parent;
        }
        merged
    }

    /// Active tween handles in a subtree, root node included.
    pub fn subtree_tweens(&self, id: NodeId) -> Vec<(NodeId, TweenId)> {
        self.subtree(id)
            .into_iter()
            .filter_map(|n| self.get(n).tween.as_ref().map(|t| (n, t.id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_and_lookup() {
        let mut arena = Arena::new();
        let root = arena.root();
        let a = arena.create(root, "a", NodeKind::Object, 1, "a".to_owned());
        assert_eq!(arena.child(root, "a"), Some(a));
        assert_eq!(arena.child_count(root), 1);
        assert_eq!(arena.get(a).depth, 1);
    }

    #[test]
    fn test_detach_is_permanent() {
        let mut arena = Arena::new();
        let root = arena.root();
        let a = arena.create(root, "a", NodeKind::Text, 1, "a".to_owned());
        arena.detach(a);
        assert_eq!(arena.child(root, "a"), None);
        assert!(arena.get(a).detached);
        assert_eq!(arena.get(a).kind, None);

        // A fresh declaration of the same key gets a fresh node.
        let a2 = arena.create(root, "a", NodeKind::Text, 1, "a".to_owned());
        assert_ne!(a, a2);
        assert!(!arena.get(a2).detached);
    }

    #[test]
    fn test_detach_children_keeps_node() {
        let mut arena = Arena::new();
        let root = arena.root();
        let list = arena.create(root, "list", NodeKind::Object, 1, "list".to_owned());
        let item = arena.create(list, "x", NodeKind::Text, 2, "x".to_owned());
        arena.detach_children(list);
        assert!(!arena.get(list).detached);
        assert!(arena.get(item).detached);
        assert_eq!(arena.child_count(list), 0);
    }

    #[test]
    fn test_spec_inheritance_nearest_wins() {
        let mut arena = Arena::new();
        let root = arena.root();
        arena.get_mut(root).numeric_spec = spec(&[("rnd", json!(1)), ("unit", json!("%"))]);
        let mid = arena.create(root, "mid", NodeKind::Object, 1, String::new());
        arena.get_mut(mid).numeric_spec = spec(&[("rnd", json!(0.1))]);
        let leaf = arena.create(mid, "leaf", NodeKind::Number, 2, String::new());

        let merged = arena.merged_numeric_spec(leaf);
        assert_eq!(merged.get("rnd"), Some(&json!(0.1)));
        assert_eq!(merged.get("unit"), Some(&json!("%")));
    }

    #[test]
    fn test_popup_does_not_inherit_main_spec() {
        let mut arena = Arena::new();
        let root = arena.root();
        let popup = arena.popup();
        arena.get_mut(root).numeric_spec = spec(&[("unit", json!("$"))]);
        arena.get_mut(popup).numeric_spec = spec(&[("rnd", json!(1))]);
        let leaf = arena.create(popup, "v", NodeKind::Number, 1, String::new());

        let merged = arena.merged_numeric_spec(leaf);
        assert_eq!(merged.get("rnd"), Some(&json!(1)));
        assert_eq!(merged.get("unit"), None);
    }

    #[test]
    fn test_visibility_under_hidden_popup() {
        let mut arena = Arena::new();
        let popup = arena.popup();
        let leaf = arena.create(popup, "v", NodeKind::Text, 1, String::new());
        assert!(!arena.visible(leaf));
        arena.get_mut(popup).hidden = false;
        assert!(arena.visible(leaf));
        arena.detach(leaf);
        assert!(!arena.visible(leaf));
    }

    #[test]
    fn test_subscription_merge_only_adds() {
        let mut subs = Subscriptions {
            click: true,
            ..Subscriptions::default()
        };
        subs.merge(Subscriptions {
            pointer_move: true,
            ..Subscriptions::default()
        });
        assert!(subs.click);
        assert!(subs.pointer_move);

        subs.merge(Subscriptions::default());
        assert!(subs.click, "an empty set removes nothing");
    }
}

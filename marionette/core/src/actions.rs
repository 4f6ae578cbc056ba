//! User input and outgoing actions.
//!
//! Input lands here from the host as [`InputEvent`]s against node
//! handles. Two dispatch layers run in order: event subscriptions
//! registered on the node itself, then the built-in behavior of special
//! containers' children (item clicks, highlight presses, selection
//! toggles). Every action leaves as one serialized `{target: value}`
//! message; a node carrying a submit policy applies it right after its
//! own dispatch.

use serde_json::{json, Map, Value};
use sha1::{Digest, Sha1};

use crate::arena::{NodeId, Subscriptions};
use crate::classify::{NodeKind, SpecialKind};
use crate::declaration::key_string;
use crate::engine::Engine;
use crate::numeric::value_num;
use crate::render::RenderOp;

/// Button-release event code.
pub const BUTTON_UP: i64 = 1;
/// Button-press event code; subscribing to it also subscribes release.
pub const BUTTON_DOWN: i64 = 2;
/// Click event code.
pub const CLICK: i64 = 3;
/// Double-click event code.
pub const DOUBLE_CLICK: i64 = 4;
/// Pointer-move event code; its action payload carries coordinates only.
pub const POINTER_MOVE: i64 = 8;
/// Pointer-enter event code.
pub const POINTER_ENTER: i64 = 16;
/// Pointer-leave event code.
pub const POINTER_LEAVE: i64 = 32;

/// Submit policy: leave the node as it is.
pub const SUBMIT_NOTHING: i64 = 1;
/// Submit policy: disable the node after dispatch.
pub const SUBMIT_DISABLE: i64 = 0;
/// Submit policy: clear the node after dispatch.
pub const SUBMIT_CLEAR: i64 = -1;

/// What the pointer did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    /// Button pressed.
    Down,
    /// Button released.
    Up,
    /// Click completed.
    Click,
    /// Double click completed.
    DoubleClick,
    /// Pointer moved.
    Move,
    /// Pointer entered the node.
    Enter,
    /// Pointer left the node.
    Leave,
}

/// One pointer event against a node, coordinates node-relative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEvent {
    /// Node under the pointer.
    pub node: NodeId,
    /// What happened.
    pub kind: PointerKind,
    /// Horizontal offset within the node.
    pub x: f64,
    /// Vertical offset within the node.
    pub y: f64,
}

impl InputEvent {
    /// Convenience constructor.
    #[must_use]
    pub fn new(node: NodeId, kind: PointerKind, x: f64, y: f64) -> Self {
        Self { node, kind, x, y }
    }
}

/// Parse an event-subscription list into flags. Entries are event
/// codes; a list or a mapping's values both work. Unknown codes are
/// skipped.
pub(crate) fn parse_subscriptions(value: &Value) -> Subscriptions {
    let mut subs = Subscriptions::default();
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => {
            tracing::debug!(value = %value, "unusable event subscription list");
            return subs;
        }
    };
    for entry in entries {
        let code = value_num(entry);
        if code == BUTTON_UP as f64 {
            subs.button_up = true;
        } else if code == BUTTON_DOWN as f64 {
            // press subscriptions always pair with release
            subs.button_down = true;
            subs.button_up = true;
        } else if code == CLICK as f64 {
            subs.click = true;
        } else if code == DOUBLE_CLICK as f64 {
            subs.double_click = true;
        } else if code == POINTER_MOVE as f64 {
            subs.pointer_move = true;
        } else if code == POINTER_ENTER as f64 {
            subs.pointer_enter = true;
        } else if code == POINTER_LEAVE as f64 {
            subs.pointer_leave = true;
        } else {
            tracing::debug!(code = %entry, "unknown event code in subscription list");
        }
    }
    subs
}

/// Keep whole coordinates as integers on the wire.
fn coord(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

impl Engine {
    /// Feed one pointer event. Detached and disabled nodes drop input.
    pub fn handle_input(&mut self, event: InputEvent) {
        let InputEvent { node, kind, x, y } = event;
        if !self.arena.contains(node) {
            tracing::debug!(%node, "input for unknown node");
            return;
        }
        let state = self.arena.get(node);
        if state.detached || state.disabled {
            return;
        }
        let Some(node_kind) = state.kind else {
            return;
        };
        let subs = state.subscriptions;

        let subscribed = match kind {
            PointerKind::Down if subs.button_down => Some(json!([BUTTON_DOWN, coord(x), coord(y)])),
            PointerKind::Up if subs.button_up => Some(json!([BUTTON_UP, coord(x), coord(y)])),
            PointerKind::Click if subs.click => Some(json!([CLICK, coord(x), coord(y)])),
            PointerKind::DoubleClick if subs.double_click => {
                Some(json!([DOUBLE_CLICK, coord(x), coord(y)]))
            }
            PointerKind::Move if subs.pointer_move => Some(json!([coord(x), coord(y)])),
            PointerKind::Enter if subs.pointer_enter => {
                Some(json!([POINTER_ENTER, coord(x), coord(y)]))
            }
            PointerKind::Leave if subs.pointer_leave => {
                Some(json!([POINTER_LEAVE, coord(x), coord(y)]))
            }
            _ => None,
        };
        if let Some(payload) = subscribed {
            // Subscription actions report under the node's key without
            // engaging its submit policy.
            let target = self.arena.get(node).id.clone();
            self.send_action_raw(&target, payload);
        }

        if matches!(node_kind, NodeKind::SpecialChild(_)) {
            self.special_child_input(node, kind);
        }
    }

    /// Built-in pointer behavior of a special container's child.
    fn special_child_input(&mut self, child: NodeId, kind: PointerKind) {
        let Some(parent) = self.arena.get(child).parent else {
            return;
        };
        let Some(NodeKind::Special(tag)) = self.arena.get(parent).kind else {
            return;
        };
        match (tag, kind) {
            (SpecialKind::GenericItem, PointerKind::Click) => {
                let wrapped = wrap_child(&self.arena.get(child).id, CLICK);
                self.send_action_for(parent, wrapped);
            }
            // highlight presses report as the child itself, unwrapped
            // and without a submit policy
            (SpecialKind::HighlightItem, PointerKind::Down) => {
                let target = self.arena.get(child).id.clone();
                self.send_action_raw(&target, json!(BUTTON_DOWN));
            }
            (SpecialKind::HighlightItem, PointerKind::Up) => {
                let target = self.arena.get(child).id.clone();
                self.send_action_raw(&target, json!(BUTTON_UP));
            }
            (SpecialKind::MultiSelect, PointerKind::Click) => self.multi_toggle(child),
            (SpecialKind::SingleSelect, PointerKind::Click) => self.single_toggle(child),
            _ => {}
        }
    }

    /// Flip a multi-select row and report the new state.
    pub(crate) fn multi_toggle(&mut self, child: NodeId) {
        let Some(parent) = self.arena.get(child).parent else {
            return;
        };
        let selected = !self.arena.get(child).selected;
        self.arena.get_mut(child).selected = selected;
        self.surface(RenderOp::SetSelected {
            node: child,
            selected,
        });
        let code = if selected { BUTTON_DOWN } else { BUTTON_UP };
        let wrapped = wrap_child(&self.arena.get(child).id, code);
        self.send_action_for(parent, wrapped);
    }

    /// Move or clear a single-select container's selection and report.
    ///
    /// Selecting an already-selected row deselects it; selecting a new
    /// row displaces the previous one without a release action for it.
    pub(crate) fn single_toggle(&mut self, child: NodeId) {
        let Some(parent) = self.arena.get(child).parent else {
            return;
        };
        let code = if self.arena.get(parent).selected_child == Some(child) {
            self.arena.get_mut(parent).selected_child = None;
            self.arena.get_mut(child).selected = false;
            self.surface(RenderOp::SetSelected {
                node: child,
                selected: false,
            });
            BUTTON_UP
        } else {
            if let Some(previous) = self.arena.get(parent).selected_child {
                self.arena.get_mut(previous).selected = false;
                self.surface(RenderOp::SetSelected {
                    node: previous,
                    selected: false,
                });
            }
            self.arena.get_mut(parent).selected_child = Some(child);
            self.arena.get_mut(child).selected = true;
            self.surface(RenderOp::SetSelected {
                node: child,
                selected: true,
            });
            BUTTON_DOWN
        };
        let wrapped = wrap_child(&self.arena.get(child).id, code);
        self.send_action_for(parent, wrapped);
    }

    /// Commit edited text from an editable node.
    ///
    /// Identical consecutive commits are dropped. A password salt on
    /// the node replaces the text with a hex digest of salt plus text;
    /// the clear text never leaves the engine then.
    pub fn commit_text(&mut self, node: NodeId, text: &str) {
        if !self.arena.contains(node) || self.arena.get(node).detached {
            tracing::debug!(%node, "text commit for unknown node");
            return;
        }
        if self.arena.get(node).kind != Some(NodeKind::Special(SpecialKind::EditableText)) {
            tracing::warn!(%node, "text commit for a non-editable node");
            return;
        }
        if self.arena.get(node).last_committed.as_deref() == Some(text) {
            return;
        }
        let payload = match self.arena.get(node).options.get("pwd") {
            Some(salt) => {
                let mut hasher = Sha1::new();
                hasher.update(key_string(salt).as_bytes());
                hasher.update(text.as_bytes());
                Value::from(hex::encode(hasher.finalize()))
            }
            None => Value::from(text),
        };
        self.send_action_for(node, payload);
        self.arena.get_mut(node).last_committed = Some(text.to_owned());
    }

    /// Dispatch an action on behalf of a node, applying its submit
    /// policy afterwards.
    pub(crate) fn send_action_for(&mut self, node: NodeId, value: Value) {
        let target = self.arena.get(node).id.clone();
        self.dispatch_action(&target, value);
        self.apply_submit_policy(node);
    }

    /// Dispatch an action for a bare target with no node behind it
    /// (acknowledgments, client-info replies).
    pub(crate) fn send_action_raw(&mut self, target: &str, value: Value) {
        self.dispatch_action(target, value);
    }

    fn dispatch_action(&mut self, target: &str, value: Value) {
        let mut action = Map::new();
        action.insert(target.to_owned(), value);
        let message = Value::Object(action).to_string();
        tracing::debug!(action = %message, "action dispatched");
        self.collab.actions.send(message);
    }

    fn apply_submit_policy(&mut self, node: NodeId) {
        let Some(policy) = self.arena.get(node).options.get("onsubmit") else {
            return;
        };
        let policy = value_num(policy);
        if policy == SUBMIT_DISABLE as f64 {
            self.arena.get_mut(node).disabled = true;
            self.surface(RenderOp::SetDisabled {
                node,
                disabled: true,
            });
        } else if policy == SUBMIT_CLEAR as f64 {
            self.clear_node(node);
        }
    }
}

/// Build the `{childKey: code}` payload reported to a container.
fn wrap_child(child_key: &str, code: i64) -> Value {
    let mut wrapped = Map::new();
    wrapped.insert(child_key.to_owned(), Value::from(code));
    Value::Object(wrapped)
}

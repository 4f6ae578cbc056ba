//! Tree reconciliation: declarations against live nodes.
//!
//! One reconciliation pass walks a normalized declaration and, per key,
//! either creates a child, mutates one in place, clears it, removes it,
//! or retypes it when the declared shape stops being compatible with
//! what exists. Private keys carry options and never become children.
//! The pass recurses through container payloads, so one inbound message
//! can touch any part of the subtree it addresses.

use serde_json::{Map, Value};

use crate::actions::{parse_subscriptions, BUTTON_DOWN};
use crate::arena::NodeId;
use crate::classify::{absorbs, classify, is_pure_options, NodeKind, SpecialKind};
use crate::declaration::{is_truthy, key_string, transition_params, NormalizedDecl};
use crate::engine::Engine;
use crate::numeric::{value_num, NumberRendering, NumberSpec};
use crate::render::{RenderOp, StyleProp};

impl Engine {
    /// Apply one declaration to a container's children.
    ///
    /// An animation directive takes over the whole declaration: targets
    /// tween instead of updating, and nothing else in it is processed.
    pub(crate) fn reconcile(&mut self, container: NodeId, decl: &Value) {
        let normalized = NormalizedDecl::parse(decl);
        if let Some(directive) = normalized.animate {
            self.animate_children(container, &directive);
            return;
        }
        for (key, payload) in &normalized.pairs {
            if key.starts_with('_') {
                continue;
            }
            self.upsert_child(container, key, payload.as_ref());
        }
    }

    /// Bring one child in line with its declared payload.
    fn upsert_child(&mut self, container: NodeId, key: &str, payload: Option<&Value>) {
        // A key declared without a value is an empty text declaration.
        let empty = Value::String(String::new());
        let payload = payload.unwrap_or(&empty);

        let existing = self.arena.child(container, key);

        if payload.is_null() {
            if let Some(node) = existing {
                self.remove_node(node);
            }
            return;
        }
        if payload.as_str() == Some("") {
            if let Some(node) = existing {
                self.clear_node(node);
                return;
            }
        }

        let container_kind = self.arena.get(container).kind;
        let mut classified = classify(payload);
        // Children of a special container always take its child kind,
        // whatever shape their payload has.
        if let Some(NodeKind::Special(tag)) = container_kind {
            classified = NodeKind::SpecialChild(tag);
        }
        let pure_options = matches!(classified, NodeKind::Object)
            && payload.as_object().is_some_and(is_pure_options);

        let node = match existing {
            Some(node) => {
                let keep = match self.arena.get(node).kind {
                    Some(current) => {
                        current == classified || absorbs(current, classified) || pure_options
                    }
                    // a cleared node stays typeless through bare option
                    // updates and re-types on anything else
                    None => pure_options,
                };
                if !keep {
                    self.retype_node(node, classified);
                }
                node
            }
            None => {
                // A fresh key declared with nothing but options becomes
                // a number when a numeric spec rides along.
                let kind = if pure_options && payload.get("_nm").is_some() {
                    NodeKind::Number
                } else {
                    classified
                };
                let depth = self.arena.get(container).depth + 1;
                let label = match kind {
                    // plot strokes carry no label
                    NodeKind::SpecialChild(SpecialKind::LinePlot) => String::new(),
                    _ if key.starts_with('#') => String::new(),
                    _ => self.subst.expand(key.trim()),
                };
                let node = self.arena.create(container, key, kind, depth, label.clone());
                self.surface(RenderOp::CreateNode {
                    node,
                    parent: Some(container),
                    key: key.to_owned(),
                    kind,
                    depth,
                    label,
                });
                node
            }
        };

        self.apply_node_options(node, payload);
        self.render_node(node, payload);
    }

    /// Shared teardown for clear and retype: children detach, tweens in
    /// the subtree stop, the numeric state resets. No op is emitted.
    fn reset_node(&mut self, node: NodeId) {
        self.cancel_subtree_tweens(node);
        self.arena.detach_children(node);
        let state = self.arena.get_mut(node);
        state.kind = None;
        state.numeric_spec = Map::new();
        state.retained = 0.0;
    }

    /// Reset a node in place. Options, subscriptions and interaction
    /// state survive; the kind does not, the next payload re-types it.
    pub(crate) fn clear_node(&mut self, node: NodeId) {
        self.reset_node(node);
        self.surface(RenderOp::ClearNode { node });
    }

    /// Re-kind a node in place. Everything a clear drops goes, and the
    /// stored options go with it.
    fn retype_node(&mut self, node: NodeId, kind: NodeKind) {
        self.reset_node(node);
        let state = self.arena.get_mut(node);
        state.kind = Some(kind);
        state.options = Map::new();
        state.editing = false;
        state.has_plot = false;
        self.surface(RenderOp::RetypeNode { node, kind });
    }

    /// Detach a subtree for good. The key may be declared again later,
    /// but that names a brand-new element.
    fn remove_node(&mut self, node: NodeId) {
        self.cancel_subtree_tweens(node);
        self.arena.detach(node);
        self.surface(RenderOp::RemoveNode { node });
    }

    pub(crate) fn cancel_subtree_tweens(&mut self, node: NodeId) {
        for (owner, tween) in self.arena.subtree_tweens(node) {
            self.collab.interpolator.cancel(tween);
            self.arena.get_mut(owner).tween = None;
        }
    }

    /// Apply the private option entries of a mapping payload: numeric
    /// spec merges, box styles, event subscriptions, and any options
    /// addressed to the node's own special tag.
    pub(crate) fn apply_node_options(&mut self, node: NodeId, payload: &Value) {
        let Some(map) = payload.as_object() else {
            return;
        };

        if let Some(spec) = map.get("_nm").and_then(Value::as_object) {
            for (key, value) in spec {
                if value.is_null() {
                    self.arena.get_mut(node).numeric_spec.remove(key);
                } else {
                    self.arena
                        .get_mut(node)
                        .numeric_spec
                        .insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(style) = map.get("_bx") {
            self.apply_style(node, style);
        }
        if let Some(events) = map.get("_ev") {
            let parsed = parse_subscriptions(events);
            self.arena.get_mut(node).subscriptions.merge(parsed);
        }

        if let Some(NodeKind::Special(tag)) = self.arena.get(node).kind {
            if let Some(extra) = map.get(tag.as_tag()).and_then(Value::as_object) {
                for (key, value) in extra {
                    self.apply_special_option(node, key, value);
                }
            }
        }
    }

    /// One option entry addressed to a special element. `disabled` and
    /// `lines` apply immediately and are not stored; everything else
    /// persists on the node, null deleting.
    fn apply_special_option(&mut self, node: NodeId, key: &str, value: &Value) {
        match key {
            "disabled" => {
                let disabled = is_truthy(value);
                self.arena.get_mut(node).disabled = disabled;
                self.surface(RenderOp::SetDisabled { node, disabled });
            }
            "lines" => {
                self.surface(RenderOp::SetVisibleLines {
                    node,
                    lines: value_num(value),
                });
            }
            _ => {
                if value.is_null() {
                    self.arena.get_mut(node).options.remove(key);
                } else {
                    self.arena
                        .get_mut(node)
                        .options
                        .insert(key.to_owned(), value.clone());
                }
            }
        }
    }

    /// Apply a `_bx` style mapping: immediately, or as a host-side
    /// transition when the mapping carries a `_T` entry.
    fn apply_style(&mut self, node: NodeId, style: &Value) {
        let Some(map) = style.as_object() else {
            return;
        };
        let mut props = Vec::new();
        for (key, value) in map {
            if key == "_T" {
                continue;
            }
            match StyleProp::from_shorthand(key) {
                Some(prop) => props.push((prop, value.clone())),
                None => tracing::debug!(%node, key, "unknown style shorthand"),
            }
        }
        match map.get("_T") {
            Some(transition) => {
                let (duration_secs, easing, ack) = transition_params(transition);
                self.surface(RenderOp::TransitionStyle {
                    node,
                    props,
                    duration_secs,
                    easing,
                    ack,
                });
            }
            None if props.is_empty() => {}
            None => self.surface(RenderOp::SetStyle { node, props }),
        }
    }

    /// Render one node from its payload, recursing into containers.
    pub(crate) fn render_node(&mut self, node: NodeId, payload: &Value) {
        let Some(kind) = self.arena.get(node).kind else {
            // cleared and never re-typed; pure option updates land here
            return;
        };
        match kind {
            NodeKind::Object => self.reconcile(node, payload),
            NodeKind::Number => self.render_number_value(node, payload.as_f64()),
            NodeKind::Text => {
                if payload.is_object() {
                    self.reconcile(node, payload);
                } else {
                    let text = self.subst.expand(&content_text(payload));
                    self.surface(RenderOp::SetContent { node, text });
                }
            }
            NodeKind::Bool => {
                let text = content_text(payload);
                self.surface(RenderOp::SetContent { node, text });
            }
            NodeKind::Special(tag) => match tag {
                SpecialKind::GenericItem
                | SpecialKind::HighlightItem
                | SpecialKind::MultiSelect
                | SpecialKind::SingleSelect => self.reconcile(node, payload),
                SpecialKind::EditableText => self.render_editable(node, payload),
                SpecialKind::LinePlot => {
                    if !self.arena.get(node).has_plot {
                        self.arena.get_mut(node).has_plot = true;
                        self.surface(RenderOp::EnsurePlot { node });
                    }
                    self.reconcile(node, payload);
                }
                // reserved elements swallow their payload
                SpecialKind::Table | SpecialKind::Ignored => {}
            },
            NodeKind::SpecialChild(tag) => self.render_special_child(node, tag, payload),
        }
    }

    /// Run a numeric value through the node's merged spec and retain the
    /// rounded result. Animation frames re-enter here every tick.
    pub(crate) fn render_number_value(&mut self, node: NodeId, payload: Option<f64>) {
        let spec = NumberSpec::from_map(&self.arena.merged_numeric_spec(node));
        let retained = self.arena.get(node).retained;
        let (rounded, rendering) = spec.render(payload, retained);
        self.arena.get_mut(node).retained = rounded;
        match rendering {
            NumberRendering::Plain(text) | NumberRendering::Capped(text) => {
                self.surface(RenderOp::SetContent { node, text });
            }
            NumberRendering::Progress { ratio, text } => {
                self.surface(RenderOp::SetProgress { node, ratio, text });
            }
        }
    }

    /// Editable text renders from the `#0` entry of a mapping payload or
    /// from a scalar payload directly, substitutions applied. The edit
    /// hook is announced once per node.
    fn render_editable(&mut self, node: NodeId, payload: &Value) {
        let text = match payload {
            Value::Object(map) => map
                .get("#0")
                .map(|content| self.subst.expand(&content_text(content))),
            // compound payloads without a content entry change nothing
            Value::Array(_) => None,
            other => Some(self.subst.expand(&content_text(other))),
        };
        if let Some(text) = text {
            self.surface(RenderOp::SetContent { node, text });
        }
        if !self.arena.get(node).editing {
            self.arena.get_mut(node).editing = true;
            self.surface(RenderOp::SetEditable {
                node,
                editable: true,
            });
        }
    }

    /// Declared updates to a special container's child. Item rows render
    /// nothing (their key label carries the text); the rest have
    /// per-variant behavior.
    fn render_special_child(&mut self, node: NodeId, tag: SpecialKind, payload: &Value) {
        match tag {
            // highlight rows show their payload verbatim, unsubstituted
            SpecialKind::HighlightItem => {
                let text = content_text(payload);
                self.surface(RenderOp::SetContent { node, text });
            }
            // a declared press code marks the row without reporting
            SpecialKind::MultiSelect => {
                if value_num(payload) == BUTTON_DOWN as f64 {
                    self.arena.get_mut(node).selected = true;
                    self.surface(RenderOp::SetSelected {
                        node,
                        selected: true,
                    });
                }
            }
            // a declared press code runs the full toggle, report included
            SpecialKind::SingleSelect => {
                if value_num(payload) == BUTTON_DOWN as f64 {
                    self.single_toggle(node);
                }
            }
            SpecialKind::LinePlot => {
                if let Value::Array(coords) = payload {
                    let data = format!("M{}", sequence_text(coords));
                    self.surface(RenderOp::SetPathData { node, data });
                }
            }
            SpecialKind::GenericItem
            | SpecialKind::EditableText
            | SpecialKind::Table
            | SpecialKind::Ignored => {}
        }
    }
}

/// Text form of a declared content value, matching the declaration
/// language's coercion: sequences join their elements with commas.
fn content_text(value: &Value) -> String {
    match value {
        Value::Array(items) => sequence_text(items),
        other => key_string(other),
    }
}

fn sequence_text(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            // nulls vanish inside sequences
            Value::Null => String::new(),
            Value::Array(nested) => sequence_text(nested),
            other => key_string(other),
        })
        .collect::<Vec<_>>()
        .join(",")
}

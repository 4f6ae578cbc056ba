//! The engine: one inbound message at a time against one live tree.
//!
//! [`Engine`] owns the node arena, the substitution table and the wait
//! table, and drives every collaborator. It is strictly single-writer:
//! hosts feed it messages, input events, timer expiries and animation
//! frames from one place, and every call runs to completion before the
//! next. A message walks the directive chain in a fixed order — error
//! report, client-info request, resource suspension, exit warning,
//! substitutions, deferral, popup — and whatever survives reconciles
//! into the root.
//!
//! While a resource load is in flight the engine is suspended: inbound
//! messages and timer expiries queue, in arrival order, and drain once
//! the load resolves. That keeps the actor's sequencing intact even
//! when it styles the session with remote assets first.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::arena::{Arena, NodeId, POPUP_KEY};
use crate::capability::{Collaborators, LoadToken, TimerId};
use crate::classify::NodeKind;
use crate::config::EngineConfig;
use crate::declaration::key_string;
use crate::error::{LoadError, TransportError};
use crate::render::RenderOp;
use crate::subst::SubstitutionTable;
use crate::wait::WaitTable;

/// A message parked behind an in-flight resource load.
#[derive(Debug)]
enum Deferred {
    Message(Value),
    Timer(TimerId),
}

/// The residue of a message whose resources are still loading.
#[derive(Debug)]
struct Suspension {
    token: LoadToken,
    residue: Value,
}

/// The reconciliation engine.
///
/// Construct one with the host's [`Collaborators`], then feed it:
///
/// - [`apply_message`](Engine::apply_message) for each inbound message,
/// - [`handle_input`](Engine::handle_input) for pointer events,
/// - [`commit_text`](Engine::commit_text) for editable-field commits,
/// - [`timer_fired`](Engine::timer_fired) on timer expiry,
/// - [`tween_frame`](Engine::tween_frame) per animation frame,
/// - [`load_finished`](Engine::load_finished) when a resource batch
///   resolves.
#[derive(Debug)]
pub struct Engine {
    pub(crate) arena: Arena,
    pub(crate) subst: SubstitutionTable,
    pub(crate) waits: WaitTable,
    pub(crate) collab: Collaborators,
    pub(crate) config: EngineConfig,
    suspension: Option<Suspension>,
    queue: VecDeque<Deferred>,
    next_load: u64,
}

impl Engine {
    /// Build an engine over the given collaborators and announce both
    /// roots to the surface.
    #[must_use]
    pub fn new(config: EngineConfig, collab: Collaborators) -> Self {
        let mut subst = SubstitutionTable::new();
        for (shorthand, replacement) in &config.substitutions {
            subst.insert(shorthand.clone(), replacement.clone());
        }
        let mut engine = Self {
            arena: Arena::new(),
            subst,
            waits: WaitTable::default(),
            collab,
            config,
            suspension: None,
            queue: VecDeque::new(),
            next_load: 0,
        };
        let root = engine.arena.root();
        let popup = engine.arena.popup();
        engine.surface(RenderOp::CreateNode {
            node: root,
            parent: None,
            key: engine.arena.get(root).id.clone(),
            kind: NodeKind::Object,
            depth: 0,
            label: String::new(),
        });
        engine.surface(RenderOp::CreateNode {
            node: popup,
            parent: None,
            key: engine.arena.get(popup).id.clone(),
            kind: NodeKind::Object,
            depth: 0,
            label: String::new(),
        });
        engine.surface(RenderOp::SetPopupVisible { visible: false });
        engine
    }

    /// Apply one inbound message, or queue it when suspended.
    pub fn apply_message(&mut self, message: Value) {
        if self.suspension.is_some() {
            self.defer(Deferred::Message(message));
            return;
        }
        self.process(message);
    }

    /// A host timer expired. Queued like messages when suspended, so a
    /// deferred wait cannot jump a resource load.
    pub fn timer_fired(&mut self, timer: TimerId) {
        if self.suspension.is_some() {
            self.defer(Deferred::Timer(timer));
            return;
        }
        self.dispatch_timer(timer);
    }

    /// A resource batch resolved. On success the suspended message's
    /// residue applies; on failure it drops with a warning. Either way
    /// the deferred queue drains until empty or re-suspended.
    pub fn load_finished(&mut self, token: LoadToken, result: Result<(), LoadError>) {
        let Some(pending) = self.suspension.take() else {
            tracing::debug!(%token, "load completion with nothing suspended");
            return;
        };
        if pending.token != token {
            tracing::debug!(%token, expected = %pending.token, "stale load completion");
            self.suspension = Some(pending);
            return;
        }
        match result {
            Ok(()) => {
                tracing::info!(%token, "resources loaded, resuming");
                self.process(pending.residue);
            }
            Err(error) => {
                tracing::warn!(%token, %error, "resource load failed, dropping its message");
            }
        }
        self.drain_queue();
    }

    /// A host-side style transition finished; dispatch its ack.
    pub fn transition_done(&mut self, ack: &str) {
        self.send_action_raw(ack, Value::from(0));
    }

    /// The transport is gone. Nothing to unwind; the environment gets
    /// to tell the user.
    pub fn transport_failed(&mut self, error: &TransportError) {
        tracing::error!(%error, "transport failed");
        self.collab.environment.transport_failed(error);
    }

    /// Whether a resource load currently holds up processing.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspension.is_some()
    }

    /// Messages and timer expiries parked behind the current load.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.queue.len()
    }

    /// Waits currently parked, named and anonymous.
    #[must_use]
    pub fn pending_waits(&self) -> usize {
        self.waits.len()
    }

    /// Resolve a key path from the root. A leading [`POPUP_KEY`]
    /// segment resolves into the popup tree instead.
    #[must_use]
    pub fn find_node(&self, path: &[&str]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut cur = if *first == POPUP_KEY {
            self.arena.popup()
        } else {
            self.arena.child(self.arena.root(), first)?
        };
        for key in rest {
            cur = self.arena.child(cur, key)?;
        }
        Some(cur)
    }

    /// The persistent options stored on a node.
    #[must_use]
    pub fn node_options(&self, node: NodeId) -> &Map<String, Value> {
        &self.arena.get(node).options
    }

    pub(crate) fn surface(&mut self, op: RenderOp) {
        self.collab.surface.apply(op);
    }

    /// Run one message through the directive chain. Re-entered by wait
    /// flushes and load completions.
    pub(crate) fn process(&mut self, message: Value) {
        match message {
            Value::Null => self.clear_all(),
            Value::Object(map) => self.process_object(map),
            Value::Array(_) => {
                let root = self.arena.root();
                self.reconcile(root, &message);
            }
            scalar => {
                // a bare scalar appends itself as the next ordinal child
                let key = format!("#{}", self.arena.child_count(self.arena.root()));
                let mut map = Map::new();
                map.insert(key, scalar);
                self.process_object(map);
            }
        }
    }

    fn process_object(&mut self, mut map: Map<String, Value>) {
        if let Some(detail) = map.remove("_error") {
            tracing::error!(detail = %detail, "actor reported an error");
        }
        if let Some(requested) = map.get("_clientinfo") {
            let requested = requested.clone();
            self.send_client_info(&requested);
        }
        if let Some(template) = map.remove("_template") {
            let urls = template_urls(&template);
            if !urls.is_empty() {
                let token = self.next_load_token();
                tracing::info!(%token, count = urls.len(), "suspending for resource load");
                self.suspension = Some(Suspension {
                    token,
                    residue: Value::Object(map),
                });
                self.collab.loader.request(token, urls);
                return;
            }
        }
        if let Some(warning) = map.remove("_unloadwarn") {
            // anything but null installs; falsy payloads are still warnings
            let message = if warning.is_null() {
                None
            } else {
                Some(key_string(&warning))
            };
            self.collab.environment.set_exit_warning(message);
        }
        if let Some(replacements) = map.remove("_replace") {
            self.subst.apply_directive(&replacements);
        }
        if map.remove("_task").is_some() {
            // task manifests address the serving side, not a session
            tracing::debug!("ignoring task manifest");
        }
        if let Some(wait) = map.remove("_W") {
            match self.handle_wait(&wait, map) {
                Some(residue) => map = residue,
                None => return,
            }
        }
        if let Some(popup) = map.remove("_pp") {
            self.show_popup(&popup);
        }
        let root = self.arena.root();
        let residue = Value::Object(map);
        self.apply_node_options(root, &residue);
        self.reconcile(root, &residue);
    }

    /// A null message: both trees empty out, the popup hides. Each root
    /// resets the way a node-level clear does: its numeric spec and
    /// retained value go with the children, options and subscriptions
    /// stay.
    fn clear_all(&mut self) {
        let root = self.arena.root();
        let popup = self.arena.popup();
        for node in [root, popup] {
            self.cancel_subtree_tweens(node);
            self.arena.detach_children(node);
            let state = self.arena.get_mut(node);
            state.numeric_spec = Map::new();
            state.retained = 0.0;
            self.surface(RenderOp::ClearNode { node });
        }
        self.arena.get_mut(popup).hidden = true;
        self.surface(RenderOp::SetPopupVisible { visible: false });
    }

    /// Apply a popup directive: null or empty string dismisses, any
    /// other payload reconciles into the popup tree and shows it.
    fn show_popup(&mut self, payload: &Value) {
        let popup = self.arena.popup();
        if payload.is_null() || payload.as_str() == Some("") {
            self.cancel_subtree_tweens(popup);
            self.arena.detach_children(popup);
            self.arena.get_mut(popup).hidden = true;
            self.surface(RenderOp::ClearNode { node: popup });
            self.surface(RenderOp::SetPopupVisible { visible: false });
            return;
        }
        match payload {
            Value::Object(_) => {
                self.apply_node_options(popup, payload);
                self.reconcile(popup, payload);
            }
            Value::Array(_) => self.reconcile(popup, payload),
            scalar => {
                let key = format!("#{}", self.arena.child_count(popup));
                let mut map = Map::new();
                map.insert(key, scalar.clone());
                self.reconcile(popup, &Value::Object(map));
            }
        }
        // shown last, and even when the payload changed nothing
        self.arena.get_mut(popup).hidden = false;
        self.surface(RenderOp::SetPopupVisible { visible: true });
    }

    /// Answer a client-info request with the fields it asked for, in
    /// the order it asked. Unanswerable fields report empty.
    fn send_client_info(&mut self, requested: &Value) {
        let info = self.collab.environment.client_info();
        let mut reply = Map::new();
        if let Some(fields) = requested.as_array() {
            for field in fields {
                match field.as_str() {
                    Some("url") => {
                        if let Ok(url) = serde_json::to_value(info.url.clone().unwrap_or_default())
                        {
                            reply.insert("url".to_owned(), url);
                        }
                    }
                    Some("screen") => {
                        if let Ok(screen) = serde_json::to_value(info.screen.unwrap_or_default()) {
                            reply.insert("screen".to_owned(), screen);
                        }
                    }
                    Some("ip") => {
                        reply.insert(
                            "ip".to_owned(),
                            Value::String(info.ip.clone().unwrap_or_default()),
                        );
                    }
                    Some("userAgent") => {
                        reply.insert(
                            "userAgent".to_owned(),
                            Value::String(info.user_agent.clone().unwrap_or_default()),
                        );
                    }
                    _ => tracing::debug!(field = %field, "unknown client-info field requested"),
                }
            }
        }
        self.send_action_raw("_clientinfo", Value::Object(reply));
    }

    fn defer(&mut self, item: Deferred) {
        if self.queue.len() >= self.config.max_deferred {
            tracing::warn!(
                limit = self.config.max_deferred,
                "deferred queue full, dropping"
            );
            return;
        }
        self.queue.push_back(item);
    }

    fn drain_queue(&mut self) {
        while self.suspension.is_none() {
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            match item {
                Deferred::Message(message) => self.process(message),
                Deferred::Timer(timer) => self.dispatch_timer(timer),
            }
        }
    }

    fn next_load_token(&mut self) -> LoadToken {
        self.next_load += 1;
        LoadToken(self.next_load)
    }
}

/// Extract the URL list from a template directive: one string, or an
/// array whose non-string entries are skipped.
fn template_urls(directive: &Value) -> Vec<String> {
    match directive {
        Value::String(url) => vec![url.clone()],
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry.as_str() {
                Some(url) => Some(url.to_owned()),
                None => {
                    tracing::debug!(entry = %entry, "non-string template entry skipped");
                    None
                }
            })
            .collect(),
        _ => {
            tracing::debug!(directive = %directive, "unusable template directive");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::capability::{
        ClientInfo, RecordingEnvironment, RecordingRequester, RecordingSink, ScreenInfo,
    };
    use crate::render::RecordingSurface;

    fn engine_with(surface: &RecordingSurface, sink: &RecordingSink) -> Engine {
        Engine::new(
            EngineConfig::default(),
            Collaborators::default()
                .with_surface(surface.clone())
                .with_actions(sink.clone()),
        )
    }

    fn sent_json(sink: &RecordingSink) -> Vec<Value> {
        sink.sent()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    #[test]
    fn test_null_message_clears_both_trees() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!({"a": "x", "_pp": {"note": "y"}}));
        assert!(engine.find_node(&["a"]).is_some());
        assert!(engine.find_node(&[POPUP_KEY, "note"]).is_some());
        surface.take();

        engine.apply_message(Value::Null);
        assert!(engine.find_node(&["a"]).is_none());
        assert!(engine.find_node(&[POPUP_KEY, "note"]).is_none());
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            RenderOp::SetPopupVisible { visible: false }
        )));
    }

    #[test]
    fn test_scalar_messages_append_ordinal_children() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!("Loading..."));
        engine.apply_message(json!(42));

        assert!(engine.find_node(&["#0"]).is_some());
        assert!(engine.find_node(&["#1"]).is_some());
        let first = engine.find_node(&["#0"]).unwrap();
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            RenderOp::SetContent { node, text } if *node == first && text == "Loading..."
        )));
    }

    #[test]
    fn test_template_suspends_until_load_resolves() {
        let loader = RecordingRequester::new();
        let surface = RecordingSurface::new();
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default()
                .with_surface(surface.clone())
                .with_loader(loader.clone()),
        );

        engine.apply_message(json!({"_template": ["theme.css", "app.js"], "x": "later"}));
        assert!(engine.is_suspended());
        assert!(engine.find_node(&["x"]).is_none());
        let requests = loader.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, vec!["theme.css".to_owned(), "app.js".to_owned()]);

        engine.apply_message(json!({"y": "queued"}));
        assert_eq!(engine.deferred_count(), 1);
        assert!(engine.find_node(&["y"]).is_none());

        engine.load_finished(requests[0].0, Ok(()));
        assert!(!engine.is_suspended());
        assert!(engine.find_node(&["x"]).is_some());
        assert!(engine.find_node(&["y"]).is_some());
    }

    #[test]
    fn test_failed_load_drops_its_message_but_resumes() {
        let loader = RecordingRequester::new();
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default().with_loader(loader.clone()),
        );
        engine.apply_message(json!({"_template": "theme.css", "x": "lost"}));
        engine.apply_message(json!({"y": "queued"}));

        let token = loader.requests()[0].0;
        engine.load_finished(
            token,
            Err(LoadError::Failed {
                url: "theme.css".to_owned(),
                detail: "404".to_owned(),
            }),
        );
        assert!(!engine.is_suspended());
        assert!(engine.find_node(&["x"]).is_none());
        assert!(engine.find_node(&["y"]).is_some());
    }

    #[test]
    fn test_stale_load_token_is_ignored() {
        let loader = RecordingRequester::new();
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default().with_loader(loader.clone()),
        );
        engine.apply_message(json!({"_template": "theme.css", "x": "later"}));
        let token = loader.requests()[0].0;

        engine.load_finished(LoadToken(token.0 + 40), Ok(()));
        assert!(engine.is_suspended());

        engine.load_finished(token, Ok(()));
        assert!(engine.find_node(&["x"]).is_some());
    }

    #[test]
    fn test_deferred_queue_drops_past_the_cap() {
        let loader = RecordingRequester::new();
        let mut engine = Engine::new(
            EngineConfig::default().with_max_deferred(2),
            Collaborators::default().with_loader(loader.clone()),
        );
        engine.apply_message(json!({"_template": "theme.css"}));
        engine.apply_message(json!({"a": 1}));
        engine.apply_message(json!({"b": 2}));
        engine.apply_message(json!({"c": 3}));

        assert_eq!(engine.deferred_count(), 2);
        engine.load_finished(loader.requests()[0].0, Ok(()));
        assert!(engine.find_node(&["a"]).is_some());
        assert!(engine.find_node(&["b"]).is_some());
        assert!(engine.find_node(&["c"]).is_none());
    }

    #[test]
    fn test_empty_template_list_does_not_suspend() {
        let loader = RecordingRequester::new();
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default().with_loader(loader.clone()),
        );
        engine.apply_message(json!({"_template": [], "x": "now"}));
        assert!(!engine.is_suspended());
        assert!(loader.requests().is_empty());
        assert!(engine.find_node(&["x"]).is_some());
    }

    #[test]
    fn test_client_info_reply_follows_the_request() {
        let sink = RecordingSink::new();
        let environment = RecordingEnvironment::new().with_info(ClientInfo {
            url: None,
            screen: Some(ScreenInfo {
                width: 800,
                height: 600,
                avail_width: 800,
                avail_height: 580,
            }),
            ip: None,
            user_agent: Some("marionette/1".to_owned()),
        });
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default()
                .with_environment(environment)
                .with_actions(sink.clone()),
        );

        engine.apply_message(json!({"_clientinfo": ["screen", "ip", "userAgent", "bogus"]}));
        let sent = sent_json(&sink);
        assert_eq!(
            sent,
            vec![json!({"_clientinfo": {
                "screen": {"width": 800, "height": 600, "availWidth": 800, "availHeight": 580},
                "ip": "",
                "userAgent": "marionette/1",
            }})]
        );
    }

    #[test]
    fn test_exit_warning_installs_and_clears() {
        let environment = RecordingEnvironment::new();
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default().with_environment(environment.clone()),
        );
        engine.apply_message(json!({"_unloadwarn": "Changes are unsaved."}));
        engine.apply_message(json!({"_unloadwarn": null}));
        assert_eq!(
            environment.warnings(),
            vec![Some("Changes are unsaved.".to_owned()), None]
        );
    }

    #[test]
    fn test_falsy_exit_warnings_still_install() {
        let environment = RecordingEnvironment::new();
        let mut engine = Engine::new(
            EngineConfig::default(),
            Collaborators::default().with_environment(environment.clone()),
        );
        engine.apply_message(json!({"_unloadwarn": ""}));
        engine.apply_message(json!({"_unloadwarn": false}));
        engine.apply_message(json!({"_unloadwarn": 0}));
        assert_eq!(
            environment.warnings(),
            vec![
                Some(String::new()),
                Some("false".to_owned()),
                Some("0".to_owned()),
            ],
            "only null clears the warning"
        );
    }

    #[test]
    fn test_replace_directive_feeds_the_same_message() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!({"_replace": {"~u": "Neo"}, "greet": "hello ~u"}));

        let node = engine.find_node(&["greet"]).unwrap();
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            RenderOp::SetContent { node: n, text } if *n == node && text == "hello Neo"
        )));
    }

    #[test]
    fn test_popup_shows_and_dismisses() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!({"_pp": {"msg": "session expired"}}));
        assert!(engine.find_node(&[POPUP_KEY, "msg"]).is_some());
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            RenderOp::SetPopupVisible { visible: true }
        )));
        surface.take();

        engine.apply_message(json!({"_pp": ""}));
        assert!(engine.find_node(&[POPUP_KEY, "msg"]).is_none());
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            RenderOp::SetPopupVisible { visible: false }
        )));
    }

    #[test]
    fn test_error_directive_only_logs() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!({"_error": "upstream exploded", "x": "still here"}));
        assert!(engine.find_node(&["x"]).is_some());
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_root_numeric_spec_reaches_children() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!({"_nm": {"rnd": 1, "unit": "%"}, "cpu": 31.4}));

        let node = engine.find_node(&["cpu"]).unwrap();
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            RenderOp::SetContent { node: n, text } if *n == node && text == "31%"
        )));
    }

    #[test]
    fn test_null_message_drops_root_numeric_spec() {
        let surface = RecordingSurface::new();
        let sink = RecordingSink::new();
        let mut engine = engine_with(&surface, &sink);
        engine.apply_message(json!({"_nm": {"rnd": 1, "unit": "%"}, "cpu": 31.4}));
        surface.take();

        engine.apply_message(Value::Null);
        engine.apply_message(json!({"cpu": 31.4}));

        let node = engine.find_node(&["cpu"]).unwrap();
        assert!(
            surface.ops().iter().any(|op| matches!(
                op,
                RenderOp::SetContent { node: n, text } if *n == node && text == "31.4"
            )),
            "the old root spec no longer decorates"
        );
    }
}

//! Value animations over numeric children.
//!
//! An animation directive turns a declaration into a set of tween
//! requests handed to the interpolator collaborator. The engine never
//! runs a clock; the interpolator feeds interpolated values back through
//! [`Engine::tween_frame`], and every frame re-renders through the full
//! numeric pipeline so rounding, decoration and the retained value stay
//! consistent with plain updates.

use std::time::Duration;

use serde_json::json;

use crate::arena::{ActiveTween, NodeId};
use crate::capability::{TweenId, TweenRequest};
use crate::classify::NodeKind;
use crate::declaration::AnimationDirective;
use crate::engine::Engine;

impl Engine {
    /// Begin one tween per animation target.
    ///
    /// Targets resolve against existing children only, and only numeric
    /// ones animate; anything else is skipped. A target with a running
    /// tween has it displaced. The start value is the child's retained
    /// value, zero when it has none.
    pub(crate) fn animate_children(&mut self, container: NodeId, directive: &AnimationDirective) {
        for (key, target) in &directive.targets {
            let Some(child) = self.arena.child(container, key) else {
                continue;
            };
            if self.arena.get(child).kind != Some(NodeKind::Number) {
                tracing::debug!(%child, key, "animation target is not numeric, skipping");
                continue;
            }
            if let Some(active) = self.arena.get_mut(child).tween.take() {
                self.collab.interpolator.cancel(active.id);
            }
            let retained = self.arena.get(child).retained;
            let from = if retained.is_nan() { 0.0 } else { retained };
            let id = self.collab.interpolator.begin(TweenRequest {
                node: child,
                from,
                to: *target,
                duration: Duration::from_secs_f64(directive.duration_secs),
                easing: directive.easing,
            });
            self.arena.get_mut(child).tween = Some(ActiveTween {
                id,
                ack: directive.ack.clone(),
            });
        }
    }

    /// Feed one interpolated frame back into the engine.
    ///
    /// Frames carrying anything but the node's active handle are stale
    /// and ignored. A frame against a node that is no longer visible
    /// kills the tween without a completion acknowledgment; otherwise
    /// the value renders like any other numeric update, and the final
    /// frame acknowledges if the directive asked for it.
    pub fn tween_frame(&mut self, node: NodeId, tween: TweenId, value: f64, done: bool) {
        if !self.arena.contains(node) {
            tracing::debug!(%node, "animation frame for unknown node");
            return;
        }
        match &self.arena.get(node).tween {
            Some(active) if active.id == tween => {}
            _ => {
                tracing::debug!(%node, %tween, "stale animation frame");
                return;
            }
        }
        if !self.arena.visible(node) {
            self.collab.interpolator.cancel(tween);
            self.arena.get_mut(node).tween = None;
            return;
        }
        self.render_number_value(node, Some(value));
        if done {
            let ack = self
                .arena
                .get_mut(node)
                .tween
                .take()
                .and_then(|active| active.ack);
            if let Some(ack) = ack {
                self.send_action_raw(&ack, json!(0));
            }
        }
    }
}

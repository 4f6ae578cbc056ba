//! Deferred-message scheduling.
//!
//! A wait directive peels itself off a message and parks the rest. An
//! anonymous wait (bare number of seconds) just delays its residue. A
//! named wait keys the parked message so a later directive can retime
//! it, flush it early, or drop it; whichever way it resolves, the
//! later directive's own residue is discarded. Expiry applies the
//! parked message and acknowledges named waits with `{id: 0}`.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::capability::TimerId;
use crate::engine::Engine;
use crate::numeric::value_num;

/// Parked messages, named and anonymous.
#[derive(Debug, Default)]
pub(crate) struct WaitTable {
    named: HashMap<String, NamedWait>,
    anonymous: HashMap<TimerId, Value>,
}

#[derive(Debug)]
struct NamedWait {
    timer: TimerId,
    payload: Value,
}

impl WaitTable {
    /// Number of parked messages of either flavor.
    pub fn len(&self) -> usize {
        self.named.len() + self.anonymous.len()
    }
}

impl Engine {
    /// Apply one wait directive against the residue of its message.
    ///
    /// Returns the residue when the directive was unusable and the
    /// message should continue processing; `None` when the directive
    /// consumed it.
    pub(crate) fn handle_wait(
        &mut self,
        directive: &Value,
        residue: Map<String, Value>,
    ) -> Option<Map<String, Value>> {
        match directive {
            Value::Number(_) => {
                let timer = self.collab.timers.arm(secs(value_num(directive)));
                self.waits.anonymous.insert(timer, Value::Object(residue));
                tracing::debug!(%timer, "anonymous wait armed");
                None
            }
            Value::Object(map) if !map.is_empty() => {
                // the first entry names the wait; anything further is
                // not part of the directive
                if let Some((id, delay)) = map.iter().next() {
                    self.handle_named_wait(id.clone(), delay, residue);
                }
                None
            }
            _ => {
                tracing::warn!(directive = %directive, "unusable wait directive, ignoring");
                Some(residue)
            }
        }
    }

    fn handle_named_wait(&mut self, id: String, delay: &Value, residue: Map<String, Value>) {
        match self.waits.named.remove(&id) {
            None => {
                let timer = self.collab.timers.arm(secs(value_num(delay)));
                tracing::debug!(%timer, id, "named wait armed");
                self.waits.named.insert(
                    id,
                    NamedWait {
                        timer,
                        payload: Value::Object(residue),
                    },
                );
            }
            Some(pending) => {
                self.collab.timers.cancel(pending.timer);
                if delay.is_null() {
                    // dropped outright, held message and all
                    tracing::debug!(id, "named wait dropped");
                } else {
                    let delay_secs = value_num(delay);
                    if delay_secs > 0.0 {
                        // retimed; the held message stays parked
                        let timer = self.collab.timers.arm(secs(delay_secs));
                        tracing::debug!(%timer, id, "named wait retimed");
                        self.waits.named.insert(
                            id,
                            NamedWait {
                                timer,
                                payload: pending.payload,
                            },
                        );
                    } else {
                        tracing::debug!(id, "named wait flushed");
                        self.process(pending.payload);
                        self.send_action_raw(&id, json!(0));
                    }
                }
            }
        }
    }

    /// Resolve one expired timer against the wait table.
    pub(crate) fn dispatch_timer(&mut self, timer: TimerId) {
        if let Some(payload) = self.waits.anonymous.remove(&timer) {
            self.process(payload);
            return;
        }
        let named = self
            .waits
            .named
            .iter()
            .find(|(_, wait)| wait.timer == timer)
            .map(|(id, _)| id.clone());
        if let Some(id) = named {
            if let Some(wait) = self.waits.named.remove(&id) {
                self.process(wait.payload);
                self.send_action_raw(&id, json!(0));
            }
        } else {
            // cancelled before it fired
            tracing::debug!(%timer, "expiry for an unknown timer");
        }
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

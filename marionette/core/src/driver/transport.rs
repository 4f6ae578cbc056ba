//! Transport contract and the in-process loopback.
//!
//! A transport pumps two directions at once: parsed directive messages
//! from the actor toward the driver, serialized action messages from
//! the engine back to the actor. The contract is deliberately small so
//! a socket, a pipe, or a test harness all fit behind it.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// One connection to an actor.
#[async_trait]
pub trait Transport: Send {
    /// Pump the connection until it closes.
    ///
    /// Inbound messages go out through `inbound`; actions to deliver
    /// arrive on `outbound`. A clean local shutdown (the engine side
    /// dropping its channels) resolves `Ok`.
    ///
    /// # Errors
    ///
    /// Resolves with the transport failure when the peer side closes
    /// or delivery breaks down.
    async fn run(
        self: Box<Self>,
        inbound: mpsc::UnboundedSender<Value>,
        outbound: mpsc::UnboundedReceiver<String>,
    ) -> Result<(), TransportError>;
}

/// In-process transport half; the other half is an [`ActorHarness`].
#[derive(Debug)]
pub struct ChannelTransport {
    from_actor: mpsc::UnboundedReceiver<Value>,
    to_actor: mpsc::UnboundedSender<String>,
}

/// The actor's end of a [`ChannelTransport`]: feed directive messages
/// in, read action messages out. Used by the demo binary and tests.
#[derive(Debug)]
pub struct ActorHarness {
    /// Directive messages toward the engine.
    pub directives: mpsc::UnboundedSender<Value>,
    /// Serialized actions coming back.
    pub actions: mpsc::UnboundedReceiver<String>,
}

/// Create a connected loopback pair.
#[must_use]
pub fn channel_pair() -> (ChannelTransport, ActorHarness) {
    let (directive_tx, directive_rx) = mpsc::unbounded_channel();
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            from_actor: directive_rx,
            to_actor: action_tx,
        },
        ActorHarness {
            directives: directive_tx,
            actions: action_rx,
        },
    )
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn run(
        self: Box<Self>,
        inbound: mpsc::UnboundedSender<Value>,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) -> Result<(), TransportError> {
        let Self {
            mut from_actor,
            to_actor,
        } = *self;
        loop {
            tokio::select! {
                message = from_actor.recv() => match message {
                    Some(value) => {
                        if inbound.send(value).is_err() {
                            // driver gone, local shutdown
                            return Ok(());
                        }
                    }
                    None => return Err(TransportError::Closed),
                },
                action = outbound.recv() => match action {
                    Some(text) => {
                        if to_actor.send(text).is_err() {
                            return Err(TransportError::Closed);
                        }
                    }
                    None => return Ok(()),
                },
            }
        }
    }
}

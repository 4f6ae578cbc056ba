//! Async host driver.
//!
//! The engine is strictly single-writer, so the driver funnels every
//! stimulus — directives off the transport, pointer input, timer
//! expiries, animation frames, load completions — into one channel and
//! applies them in arrival order from one task. Collaborator
//! implementations here are the tokio-backed counterparts of the
//! capability traits: timers are spawned sleeps, the interpolator is a
//! shared table walked by an interval task, resource loads go through
//! `reqwest`.
//!
//! ```text
//!   transport ──► Directive ─┐
//!   host input ─► Input ─────┤
//!   timers ─────► TimerFired ├──► Driver::run ──► Engine
//!   ticker ─────► Frames ────┤
//!   loader ─────► LoadFinished ┘
//! ```

mod loader;
mod ticker;
mod timers;
mod transport;

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::actions::InputEvent;
use crate::arena::NodeId;
use crate::capability::{Collaborators, HostEnvironment, LoadToken, TimerId, TweenId};
use crate::config::MarionetteConfig;
use crate::engine::Engine;
use crate::error::{LoadError, TransportError};
use crate::render::RenderSurface;

pub use loader::HttpResourceLoader;
pub use ticker::TickInterpolator;
pub use timers::TokioTimerHost;
pub use transport::{channel_pair, ActorHarness, ChannelTransport, Transport};

/// One interpolated animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    /// Node the frame belongs to.
    pub node: NodeId,
    /// Handle of the animation that produced it.
    pub tween: TweenId,
    /// Interpolated value.
    pub value: f64,
    /// Whether this is the final frame.
    pub done: bool,
}

/// Everything a driver can be fed.
#[derive(Debug)]
pub enum DriverMessage {
    /// One inbound message from the actor.
    Directive(Value),
    /// A pointer event from the host surface.
    Input(InputEvent),
    /// An editable field committed its text.
    Commit {
        /// The editable node.
        node: NodeId,
        /// The committed text.
        text: String,
    },
    /// A host timer expired.
    TimerFired(TimerId),
    /// A batch of animation frames, one per running tween.
    Frames(Vec<Frame>),
    /// A resource batch resolved.
    LoadFinished(LoadToken, Result<(), LoadError>),
    /// A host-side style transition completed; carries its ack id.
    TransitionDone(String),
    /// The transport is gone for good.
    TransportFailed(TransportError),
    /// Stop the driver loop.
    Shutdown,
}

/// Clonable feed into a running driver.
#[derive(Clone, Debug)]
pub struct DriverHandle {
    tx: mpsc::UnboundedSender<DriverMessage>,
}

impl DriverHandle {
    /// Queue one message for the driver. Dropped with a trace once the
    /// driver is gone.
    pub fn send(&self, message: DriverMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("driver channel closed, message dropped");
        }
    }

    /// Whether the driver stopped receiving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-writer pump between the stimulus channel and the engine.
#[derive(Debug)]
pub struct Driver {
    engine: Engine,
    rx: mpsc::UnboundedReceiver<DriverMessage>,
}

impl Driver {
    /// Wrap an engine; the handle is how anything reaches it.
    #[must_use]
    pub fn new(engine: Engine) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { engine, rx }, DriverHandle { tx })
    }

    /// Apply messages until shutdown or every handle is dropped.
    ///
    /// Returns the engine so callers can inspect final state.
    pub async fn run(mut self) -> Engine {
        while let Some(message) = self.rx.recv().await {
            match message {
                DriverMessage::Directive(value) => self.engine.apply_message(value),
                DriverMessage::Input(event) => self.engine.handle_input(event),
                DriverMessage::Commit { node, text } => self.engine.commit_text(node, &text),
                DriverMessage::TimerFired(timer) => self.engine.timer_fired(timer),
                DriverMessage::Frames(frames) => {
                    for frame in frames {
                        self.engine
                            .tween_frame(frame.node, frame.tween, frame.value, frame.done);
                    }
                }
                DriverMessage::LoadFinished(token, result) => {
                    self.engine.load_finished(token, result);
                }
                DriverMessage::TransitionDone(ack) => self.engine.transition_done(&ack),
                DriverMessage::TransportFailed(error) => {
                    // the session stays up; timers and input keep working
                    self.engine.transport_failed(&error);
                }
                DriverMessage::Shutdown => {
                    tracing::info!("driver shutting down");
                    break;
                }
            }
        }
        self.engine
    }
}

/// Action sink that forwards serialized actions to the transport task.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Wrap the outgoing half of an action channel.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl crate::capability::ActionSink for ChannelSink {
    fn send(&mut self, message: String) {
        if self.tx.send(message).is_err() {
            tracing::warn!("action channel closed, action dropped");
        }
    }
}

/// Wire a complete session over a transport.
///
/// Builds the engine with tokio-backed collaborators, spawns the
/// transport pump, and returns the driver ready to
/// [`run`](Driver::run) plus a handle for host input. Must be called
/// inside a tokio runtime.
pub fn session(
    config: &MarionetteConfig,
    surface: impl RenderSurface + 'static,
    environment: impl HostEnvironment + 'static,
    transport: Box<dyn Transport>,
) -> (Driver, DriverHandle) {
    let (handle_tx, rx) = mpsc::unbounded_channel();
    let handle = DriverHandle { tx: handle_tx };
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();

    let collab = Collaborators::default()
        .with_surface(surface)
        .with_environment(environment)
        .with_actions(ChannelSink::new(action_tx))
        .with_timers(TokioTimerHost::new(handle.clone()))
        .with_interpolator(TickInterpolator::spawn(
            handle.clone(),
            Duration::from_millis(config.driver.tick_interval_ms),
        ))
        .with_loader(HttpResourceLoader::new(handle.clone(), &config.driver));
    let engine = Engine::new(config.engine.clone(), collab);

    let transport_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(error) = transport.run(inbound_tx, action_rx).await {
            transport_handle.send(DriverMessage::TransportFailed(error));
        }
    });
    let pump_handle = handle.clone();
    tokio::spawn(async move {
        while let Some(value) = inbound_rx.recv().await {
            if pump_handle.is_closed() {
                break;
            }
            pump_handle.send(DriverMessage::Directive(value));
        }
    });

    (Driver { engine, rx }, handle)
}

//! Marionette Core - Actor-Driven UI State Reconciliation
//!
//! This crate keeps a live element tree in step with hierarchical JSON
//! messages sent by a remote actor, completely independent of any UI
//! framework. Declarations flow down, the engine reconciles them into
//! the tree and tells the host surface what changed, and user actions
//! flow back up as small JSON messages. It can drive a terminal, a
//! canvas, a DOM bridge, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//!                         remote actor
//!                              │
//!                   directive messages (down)
//!                    action messages (up)
//!                              │
//! ┌────────────────────────────┼─────────────────────────────────┐
//! │ DRIVER                     │                                 │
//! │   transport pump ── DriverMessage funnel ── single writer    │
//! │   timers · frame ticker · resource loader (tokio)            │
//! └────────────────────────────┼─────────────────────────────────┘
//! ┌────────────────────────────┼─────────────────────────────────┐
//! │ ENGINE                     │                                 │
//! │  ┌──────────┐  ┌───────────┴─┐  ┌─────────┐  ┌────────────┐  │
//! │  │ directive│  │ reconciler  │  │ waits / │  │  actions   │  │
//! │  │  chain   │  │ + node tree │  │ animate │  │  dispatch  │  │
//! │  └──────────┘  └───────────┬─┘  └─────────┘  └────────────┘  │
//! └────────────────────────────┼─────────────────────────────────┘
//!                              │
//!                     RenderOp stream (down)
//!                  input events / commits (up)
//!                              │
//!                        host surface
//! ```
//!
//! # Key Types
//!
//! - [`Engine`]: owns the tree and applies one stimulus at a time
//! - [`Collaborators`]: the host-injected capability set
//! - [`RenderOp`]: everything the engine ever asks a surface to do
//! - [`InputEvent`]: pointer input fed back into the engine
//! - [`driver::Driver`]: tokio pump that serializes all stimuli
//!
//! # Quick Start
//!
//! ```ignore
//! use marionette_core::{Collaborators, Engine, EngineConfig, RecordingSurface};
//! use serde_json::json;
//!
//! let surface = RecordingSurface::new();
//! let mut engine = Engine::new(
//!     EngineConfig::default(),
//!     Collaborators::default().with_surface(surface.clone()),
//! );
//!
//! engine.apply_message(json!({"greeting": "hello"}));
//! for op in surface.ops() {
//!     // drive your widgets from the operation stream
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`engine`]: the engine itself and the directive chain
//! - [`capability`]: collaborator traits, null and recording doubles
//! - [`render`]: render operations and the surface contract
//! - [`actions`]: pointer input, text commits, outgoing actions
//! - [`classify`]: payload classification and kind compatibility
//! - [`ease`]: easing curves for animations and transitions
//! - [`subst`]: text substitution table
//! - [`config`]: file/env configuration loading
//! - [`error`]: failures that cross collaborator boundaries
//! - [`driver`]: tokio-backed host driver and loopback transport
//!
//! # No UI Dependencies
//!
//! This crate renders nothing. It emits [`RenderOp`] values and leaves
//! every pixel to the host.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod animate;
mod arena;
mod declaration;
mod numeric;
mod reconcile;
mod wait;

pub mod actions;
pub mod capability;
pub mod classify;
pub mod config;
pub mod driver;
pub mod ease;
pub mod engine;
pub mod error;
pub mod render;
pub mod subst;

// Re-exports for convenience
pub use actions::{InputEvent, PointerKind};
pub use arena::{NodeId, POPUP_KEY};
pub use capability::{
    ActionSink, ClientInfo, Collaborators, HostEnvironment, Interpolator, LoadToken,
    RecordingEnvironment, RecordingInterpolator, RecordingRequester, RecordingSink,
    RecordingTimerHost, ResourceRequester, ScreenInfo, TimerHost, TimerId, TweenId, TweenRequest,
    UrlInfo,
};
pub use classify::{NodeKind, SpecialKind};
pub use config::{load_config, DriverConfig, EngineConfig, MarionetteConfig};
pub use driver::{Driver, DriverHandle, DriverMessage};
pub use ease::{EaseCurve, EaseDirection, Easing};
pub use engine::Engine;
pub use error::{LoadError, TransportError};
pub use render::{RecordingSurface, RenderOp, RenderSurface, StyleProp};

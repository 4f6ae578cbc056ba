//! Host collaborator contracts.
//!
//! The engine owns the tree and the protocol; everything with a clock,
//! a screen or a socket behind it is a collaborator the host injects:
//! value interpolation, timers, resource loading, environment queries
//! and the outgoing action channel. Each trait has a no-op default so
//! an engine is constructible headless, and a recording double so tests
//! can assert on what the engine asked for.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::arena::NodeId;
use crate::ease::Easing;
use crate::error::TransportError;
use crate::render::{NullSurface, RenderSurface};

/// Handle for one armed timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Handle for one running value animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenId(pub u64);

/// Correlation token for one resource-load batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadToken(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for TweenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for LoadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything an interpolator needs to run one value animation.
///
/// Frames come back through
/// [`Engine::tween_frame`](crate::engine::Engine::tween_frame) carrying
/// the issued [`TweenId`]; frames for superseded handles are ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct TweenRequest {
    /// Node whose value animates.
    pub node: NodeId,
    /// Start value, the node's retained value at request time.
    pub from: f64,
    /// Target value.
    pub to: f64,
    /// Animation duration.
    pub duration: Duration,
    /// Easing over the duration.
    pub easing: Easing,
}

/// Drives value animations between frames the engine renders.
pub trait Interpolator: Send {
    /// Start an animation, returning its handle.
    fn begin(&mut self, request: TweenRequest) -> TweenId;
    /// Stop an animation; no further frames may be delivered for it.
    fn cancel(&mut self, tween: TweenId);
}

/// One-shot timer scheduling.
pub trait TimerHost: Send {
    /// Arm a timer; the host reports expiry through
    /// [`Engine::timer_fired`](crate::engine::Engine::timer_fired).
    fn arm(&mut self, delay: Duration) -> TimerId;
    /// Disarm a timer; expiry must no longer be reported.
    fn cancel(&mut self, timer: TimerId);
}

/// Fire-and-forget resource loading.
///
/// URLs load sequentially; the host reports a single completion through
/// [`Engine::load_finished`](crate::engine::Engine::load_finished) with
/// the batch token.
pub trait ResourceRequester: Send {
    /// Begin loading a batch.
    fn request(&mut self, token: LoadToken, urls: Vec<String>);
}

/// Outgoing action channel back to the actor.
pub trait ActionSink: Send {
    /// Send one serialized action message.
    fn send(&mut self, message: String);
}

/// Location facts reported on a client-info request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlInfo {
    /// Full location string.
    pub href: String,
    /// Host component.
    pub host: String,
    /// Path component.
    pub path: String,
    /// Query component, empty when absent.
    pub query: String,
}

/// Display facts reported on a client-info request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenInfo {
    /// Screen width in pixels.
    pub width: u32,
    /// Screen height in pixels.
    pub height: u32,
    /// Usable width in pixels.
    pub avail_width: u32,
    /// Usable height in pixels.
    pub avail_height: u32,
}

/// Everything the host knows about itself; fields the host cannot
/// answer stay `None` and are reported as empty to the actor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Current location, if the host has one.
    pub url: Option<UrlInfo>,
    /// Display geometry, if the host has one.
    pub screen: Option<ScreenInfo>,
    /// Public address, if the host knows it.
    pub ip: Option<String>,
    /// Client identification string.
    pub user_agent: Option<String>,
}

/// Host environment: identity queries and session-level side effects.
pub trait HostEnvironment: Send {
    /// Facts for a client-info reply.
    fn client_info(&self) -> ClientInfo;
    /// Install or clear the leave-page warning.
    fn set_exit_warning(&mut self, message: Option<String>);
    /// The transport failed; the session will receive no more messages.
    fn transport_failed(&mut self, error: &TransportError);
}

/// Interpolator that never delivers a frame.
#[derive(Debug, Default)]
pub struct NullInterpolator {
    next: u64,
}

impl Interpolator for NullInterpolator {
    fn begin(&mut self, _request: TweenRequest) -> TweenId {
        self.next += 1;
        TweenId(self.next)
    }

    fn cancel(&mut self, _tween: TweenId) {}
}

/// Timer host whose timers never expire.
#[derive(Debug, Default)]
pub struct NullTimerHost {
    next: u64,
}

impl TimerHost for NullTimerHost {
    fn arm(&mut self, _delay: Duration) -> TimerId {
        self.next += 1;
        TimerId(self.next)
    }

    fn cancel(&mut self, _timer: TimerId) {}
}

/// Requester that drops every batch. Loads never complete under it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRequester;

impl ResourceRequester for NullRequester {
    fn request(&mut self, _token: LoadToken, _urls: Vec<String>) {}
}

/// Environment that knows nothing and warns no one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEnvironment;

impl HostEnvironment for NullEnvironment {
    fn client_info(&self) -> ClientInfo {
        ClientInfo::default()
    }

    fn set_exit_warning(&mut self, _message: Option<String>) {}

    fn transport_failed(&mut self, _error: &TransportError) {}
}

/// Sink that drops every action.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ActionSink for NullSink {
    fn send(&mut self, _message: String) {}
}

/// The full collaborator set an engine runs against.
///
/// Defaults to the no-op implementations; hosts replace the pieces they
/// back with the `with_*` builders.
pub struct Collaborators {
    /// Widget tree receiving render operations.
    pub surface: Box<dyn RenderSurface>,
    /// Value animation driver.
    pub interpolator: Box<dyn Interpolator>,
    /// One-shot timer scheduler.
    pub timers: Box<dyn TimerHost>,
    /// Resource loader.
    pub loader: Box<dyn ResourceRequester>,
    /// Host identity and session side effects.
    pub environment: Box<dyn HostEnvironment>,
    /// Outgoing action channel.
    pub actions: Box<dyn ActionSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            surface: Box::new(NullSurface),
            interpolator: Box::new(NullInterpolator::default()),
            timers: Box::new(NullTimerHost::default()),
            loader: Box::new(NullRequester),
            environment: Box::new(NullEnvironment),
            actions: Box::new(NullSink),
        }
    }
}

impl Collaborators {
    /// Replace the render surface.
    #[must_use]
    pub fn with_surface(mut self, surface: impl RenderSurface + 'static) -> Self {
        self.surface = Box::new(surface);
        self
    }

    /// Replace the interpolator.
    #[must_use]
    pub fn with_interpolator(mut self, interpolator: impl Interpolator + 'static) -> Self {
        self.interpolator = Box::new(interpolator);
        self
    }

    /// Replace the timer host.
    #[must_use]
    pub fn with_timers(mut self, timers: impl TimerHost + 'static) -> Self {
        self.timers = Box::new(timers);
        self
    }

    /// Replace the resource requester.
    #[must_use]
    pub fn with_loader(mut self, loader: impl ResourceRequester + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Replace the host environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl HostEnvironment + 'static) -> Self {
        self.environment = Box::new(environment);
        self
    }

    /// Replace the action sink.
    #[must_use]
    pub fn with_actions(mut self, actions: impl ActionSink + 'static) -> Self {
        self.actions = Box::new(actions);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Interpolator double recording begin and cancel calls. Cloning shares
/// the log; hand one clone to the engine, keep the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingInterpolator {
    inner: Arc<Mutex<TweenLog>>,
}

#[derive(Debug, Default)]
struct TweenLog {
    next: u64,
    begun: Vec<(TweenId, TweenRequest)>,
    cancelled: Vec<TweenId>,
}

impl RecordingInterpolator {
    /// New double with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every animation begun so far, in order.
    #[must_use]
    pub fn begun(&self) -> Vec<(TweenId, TweenRequest)> {
        self.inner.lock().begun.clone()
    }

    /// Every handle cancelled so far, in order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<TweenId> {
        self.inner.lock().cancelled.clone()
    }

    /// Handle of the most recently begun animation.
    #[must_use]
    pub fn last_begun(&self) -> Option<TweenId> {
        self.inner.lock().begun.last().map(|(id, _)| *id)
    }
}

impl Interpolator for RecordingInterpolator {
    fn begin(&mut self, request: TweenRequest) -> TweenId {
        let mut log = self.inner.lock();
        log.next += 1;
        let id = TweenId(log.next);
        log.begun.push((id, request));
        id
    }

    fn cancel(&mut self, tween: TweenId) {
        self.inner.lock().cancelled.push(tween);
    }
}

/// Timer-host double recording arm and cancel calls.
#[derive(Debug, Default, Clone)]
pub struct RecordingTimerHost {
    inner: Arc<Mutex<TimerLog>>,
}

#[derive(Debug, Default)]
struct TimerLog {
    next: u64,
    armed: Vec<(TimerId, Duration)>,
    cancelled: Vec<TimerId>,
}

impl RecordingTimerHost {
    /// New double with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every timer armed so far, in order.
    #[must_use]
    pub fn armed(&self) -> Vec<(TimerId, Duration)> {
        self.inner.lock().armed.clone()
    }

    /// Every timer cancelled so far, in order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<TimerId> {
        self.inner.lock().cancelled.clone()
    }

    /// Handle of the most recently armed timer.
    #[must_use]
    pub fn last_armed(&self) -> Option<TimerId> {
        self.inner.lock().armed.last().map(|(id, _)| *id)
    }
}

impl TimerHost for RecordingTimerHost {
    fn arm(&mut self, delay: Duration) -> TimerId {
        let mut log = self.inner.lock();
        log.next += 1;
        let id = TimerId(log.next);
        log.armed.push((id, delay));
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        self.inner.lock().cancelled.push(timer);
    }
}

/// Requester double recording every batch.
#[derive(Debug, Default, Clone)]
pub struct RecordingRequester {
    inner: Arc<Mutex<Vec<(LoadToken, Vec<String>)>>>,
}

impl RecordingRequester {
    /// New double with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(LoadToken, Vec<String>)> {
        self.inner.lock().clone()
    }
}

impl ResourceRequester for RecordingRequester {
    fn request(&mut self, token: LoadToken, urls: Vec<String>) {
        self.inner.lock().push((token, urls));
    }
}

/// Sink double recording every serialized action.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    inner: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    /// New double with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.lock())
    }
}

impl ActionSink for RecordingSink {
    fn send(&mut self, message: String) {
        self.inner.lock().push(message);
    }
}

/// Environment double with fixed identity and a log of warnings.
#[derive(Debug, Default, Clone)]
pub struct RecordingEnvironment {
    info: ClientInfo,
    inner: Arc<Mutex<EnvLog>>,
}

#[derive(Debug, Default)]
struct EnvLog {
    warnings: Vec<Option<String>>,
    failures: Vec<String>,
}

impl RecordingEnvironment {
    /// New double reporting empty identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity this double reports.
    #[must_use]
    pub fn with_info(mut self, info: ClientInfo) -> Self {
        self.info = info;
        self
    }

    /// Every exit-warning change so far, in order.
    #[must_use]
    pub fn warnings(&self) -> Vec<Option<String>> {
        self.inner.lock().warnings.clone()
    }

    /// Every transport failure reported so far.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.inner.lock().failures.clone()
    }
}

impl HostEnvironment for RecordingEnvironment {
    fn client_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn set_exit_warning(&mut self, message: Option<String>) {
        self.inner.lock().warnings.push(message);
    }

    fn transport_failed(&mut self, error: &TransportError) {
        self.inner.lock().failures.push(error.to_string());
    }
}

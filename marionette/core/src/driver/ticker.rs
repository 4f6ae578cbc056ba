//! Interval-driven value interpolation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::capability::{Interpolator, TweenId, TweenRequest};
use crate::driver::{DriverHandle, DriverMessage, Frame};

#[derive(Debug)]
struct RunningTween {
    request: TweenRequest,
    started: Instant,
}

/// Interpolator backed by one interval task.
///
/// `begin` only inserts into a shared table; the spawned task walks it
/// every tick, eases each running tween, and reports the batch as one
/// [`DriverMessage::Frames`]. Final frames land exactly on the target
/// value and retire the tween from the table; the engine retires its
/// own record when the frame arrives.
#[derive(Debug)]
pub struct TickInterpolator {
    shared: Arc<Mutex<HashMap<TweenId, RunningTween>>>,
    next: u64,
}

impl TickInterpolator {
    /// Create the interpolator and spawn its frame task. Must be
    /// called inside a tokio runtime. The task exits once the driver
    /// is gone.
    #[must_use]
    pub fn spawn(handle: DriverHandle, tick: Duration) -> Self {
        let shared: Arc<Mutex<HashMap<TweenId, RunningTween>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let table = Arc::clone(&shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if handle.is_closed() {
                    break;
                }
                let frames = advance(&table, Instant::now());
                if !frames.is_empty() {
                    handle.send(DriverMessage::Frames(frames));
                }
            }
        });
        Self { shared, next: 0 }
    }

    /// Tweens currently running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.shared.lock().len()
    }
}

/// Walk the table once, producing one frame per running tween and
/// retiring the finished ones.
fn advance(table: &Mutex<HashMap<TweenId, RunningTween>>, now: Instant) -> Vec<Frame> {
    let mut frames = Vec::new();
    table.lock().retain(|id, tween| {
        let elapsed = now.saturating_duration_since(tween.started);
        let done = elapsed >= tween.request.duration;
        let progress = if done {
            1.0
        } else {
            elapsed.as_secs_f64() / tween.request.duration.as_secs_f64()
        };
        let eased = tween.request.easing.apply(progress);
        let value = tween.request.from + (tween.request.to - tween.request.from) * eased;
        frames.push(Frame {
            node: tween.request.node,
            tween: *id,
            value,
            done,
        });
        !done
    });
    frames
}

impl Interpolator for TickInterpolator {
    fn begin(&mut self, request: TweenRequest) -> TweenId {
        self.next += 1;
        let id = TweenId(self.next);
        self.shared.lock().insert(
            id,
            RunningTween {
                request,
                started: Instant::now(),
            },
        );
        id
    }

    fn cancel(&mut self, tween: TweenId) {
        self.shared.lock().remove(&tween);
    }
}

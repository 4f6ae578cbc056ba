//! Easing model for animated transitions.
//!
//! Declarations select a curve (`ease`: 0-4 for polynomial powers, or
//! `"back"`/`"elastic"`/`"bounce"`) and a direction (`easeout`: -1 in,
//! 0 in-out, anything else out). The pair is resolved once per directive
//! and applied per frame as progress 0.0-1.0.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base easing curve, expressed by its ease-in form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EaseCurve {
    /// Polynomial power; 0 is linear, 1 quadratic, up to quintic at 4.
    #[default]
    Power0,
    /// Quadratic.
    Power1,
    /// Cubic.
    Power2,
    /// Quartic.
    Power3,
    /// Quintic.
    Power4,
    /// Overshoot then settle.
    Back,
    /// Damped spring.
    Elastic,
    /// Bouncing settle.
    Bounce,
}

impl EaseCurve {
    /// The curve's ease-in form at progress `t` (already clamped).
    fn ease_in(self, t: f64) -> f64 {
        match self {
            Self::Power0 => t,
            Self::Power1 => t * t,
            Self::Power2 => t * t * t,
            Self::Power3 => t.powi(4),
            Self::Power4 => t.powi(5),
            Self::Back => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                c3 * t * t * t - c1 * t * t
            }
            Self::Elastic => {
                if t == 0.0 || (t - 1.0).abs() < f64::EPSILON {
                    t
                } else {
                    let c4 = (2.0 * std::f64::consts::PI) / 3.0;
                    -(2.0_f64.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * c4).sin()
                }
            }
            Self::Bounce => 1.0 - bounce_out(1.0 - t),
        }
    }
}

/// Progress shaping around a base curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EaseDirection {
    /// Slow start.
    In,
    /// Slow end.
    #[default]
    Out,
    /// Slow start and end.
    InOut,
}

/// A fully resolved easing: curve plus direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Easing {
    /// Base curve.
    pub curve: EaseCurve,
    /// Shaping direction.
    pub direction: EaseDirection,
}

impl Easing {
    /// Constant-speed easing.
    #[must_use]
    pub const fn linear() -> Self {
        Self {
            curve: EaseCurve::Power0,
            direction: EaseDirection::Out,
        }
    }

    /// Resolve easing from an animation directive's parameter mapping.
    ///
    /// A non-mapping parameter value or a missing `ease` entry stays
    /// linear; `easeout` defaults to out.
    #[must_use]
    pub fn from_declaration(params: &Value) -> Self {
        let Some(map) = params.as_object() else {
            return Self::linear();
        };
        let curve = match map.get("ease") {
            Some(v) => match v.as_i64() {
                Some(0) => EaseCurve::Power0,
                Some(1) => EaseCurve::Power1,
                Some(2) => EaseCurve::Power2,
                Some(3) => EaseCurve::Power3,
                Some(4) => EaseCurve::Power4,
                None => match v.as_str() {
                    Some("back") => EaseCurve::Back,
                    Some("elastic") => EaseCurve::Elastic,
                    Some("bounce") => EaseCurve::Bounce,
                    _ => EaseCurve::Power0,
                },
                _ => EaseCurve::Power0,
            },
            None => EaseCurve::Power0,
        };
        let direction = match map.get("easeout").and_then(Value::as_i64) {
            Some(-1) => EaseDirection::In,
            Some(0) => EaseDirection::InOut,
            _ => EaseDirection::Out,
        };
        Self { curve, direction }
    }

    /// Apply the easing to a progress value (0.0 to 1.0).
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self.direction {
            EaseDirection::In => self.curve.ease_in(t),
            EaseDirection::Out => 1.0 - self.curve.ease_in(1.0 - t),
            EaseDirection::InOut => {
                if t < 0.5 {
                    self.curve.ease_in(2.0 * t) / 2.0
                } else {
                    1.0 - self.curve.ease_in(2.0 - 2.0 * t) / 2.0
                }
            }
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984_375
    }
}

//! Numeric value rendering.
//!
//! A numeric node renders through its merged spec: resolve the value
//! (payload, else retained, else declared default), snap it to the
//! rounding step, then decorate it with a unit or a clock format. Range
//! bounds switch the presentation to a progress track (both bounds) or
//! an "x of max" caption (upper bound only). The rounded, undecorated
//! value is what the node retains as the start point for animations.

use chrono::{Datelike, Local, Offset, TimeZone, Timelike};
use serde_json::{Map, Value};

use crate::declaration::{is_truthy, key_string};

/// Parsed numeric spec, merged ancestor entries already folded in.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct NumberSpec {
    /// Rounding step with its display decimal count (`0.01` shows 2).
    rnd: Option<(f64, Option<usize>)>,
    /// Fallback from the `=` entry when nothing else supplies a value.
    default: f64,
    /// Unit decoration; `$` prefixes, anything else suffixes.
    unit: Option<String>,
    /// Clock format applied to the value as an epoch-seconds stamp.
    time: Option<String>,
    /// Lower range bound (`>=`).
    min: Option<f64>,
    /// Upper range bound (`<=`).
    max: Option<f64>,
    /// Raw upper-bound text for the capped caption.
    max_text: Option<String>,
}

/// How a numeric node should present its value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NumberRendering {
    /// Decorated value text.
    Plain(String),
    /// "value of max" caption (upper bound only).
    Capped(String),
    /// Progress track fill with the decorated value overlaid.
    Progress {
        /// Fill fraction, not clamped.
        ratio: f64,
        /// Decorated value text.
        text: String,
    },
}

/// Numeric coercion matching the declaration language: strings parse,
/// booleans count, everything else that isn't a number is NaN.
pub(crate) fn value_num(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => 0.0,
        _ => f64::NAN,
    }
}

/// Display decimals implied by a rounding step's own text form:
/// `0.01` carries two, `1` carries none.
fn frac_digits(value: &Value) -> Option<usize> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    text.split_once('.').map(|(_, frac)| frac.len())
}

impl NumberSpec {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let rnd = map.get("rnd").and_then(|v| {
            let step = value_num(v);
            if !step.is_finite() || step == 0.0 {
                return None;
            }
            let decimals = if step.abs() < 1.0 { frac_digits(v) } else { None };
            Some((step, decimals))
        });
        Self {
            rnd,
            default: map
                .get("=")
                .map(value_num)
                .filter(|d| d.is_finite())
                .unwrap_or(0.0),
            unit: map.get("unit").filter(|v| is_truthy(v)).map(key_string),
            time: map
                .get("time")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            min: map.get(">=").map(value_num),
            max: map.get("<=").map(value_num),
            max_text: map.get("<=").map(key_string),
        }
    }

    /// Resolve the effective value for this update. A zero retained
    /// value counts as unset and falls through to the default.
    pub fn resolve(&self, payload: Option<f64>, retained: f64) -> f64 {
        match payload {
            Some(value) => value,
            None if retained != 0.0 && !retained.is_nan() => retained,
            None => self.default,
        }
    }

    /// Snap a value to the rounding step, half rounding up.
    pub fn round(&self, value: f64) -> f64 {
        match self.rnd {
            Some((step, _)) => (value / step + 0.5).floor() * step,
            None => value,
        }
    }

    /// Decorate a rounded value: decimals, then unit or clock format.
    pub fn decorate(&self, rounded: f64) -> String {
        let text = match self.rnd {
            Some((_, Some(decimals))) => format!("{rounded:.decimals$}"),
            _ => rounded.to_string(),
        };
        if let Some(ref unit) = self.unit {
            if unit == "$" {
                format!("${text}")
            } else {
                format!("{text}{unit}")
            }
        } else if let Some(ref time) = self.time {
            format_epoch(rounded, time)
        } else {
            text
        }
    }

    /// Produce the retained value and the presentation for one update.
    pub fn render(&self, payload: Option<f64>, retained: f64) -> (f64, NumberRendering) {
        let rounded = self.round(self.resolve(payload, retained));
        let text = self.decorate(rounded);
        let rendering = match (self.min, self.max) {
            (Some(min), Some(max)) => NumberRendering::Progress {
                ratio: (rounded - min) / (max - min),
                text,
            },
            (None, Some(_)) => {
                let max_text = self.max_text.as_deref().unwrap_or_default();
                NumberRendering::Capped(format!("{text} of {max_text}"))
            }
            _ => NumberRendering::Plain(text),
        };
        (rounded, rendering)
    }
}

const MONTHS_FULL: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];
const MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAYS_FULL: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];
const WEEKDAYS_SHORT: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Render an epoch-seconds stamp through a clock format, local time.
pub(crate) fn format_epoch(epoch_secs: f64, pattern: &str) -> String {
    let millis = (epoch_secs * 1000.0).trunc();
    let millis = if millis.is_finite() {
        // saturate rather than wrap on absurd stamps
        millis.clamp(i64::MIN as f64, i64::MAX as f64) as i64
    } else {
        0
    };
    let datetime = match Local.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => Local
            .timestamp_millis_opt(0)
            .earliest()
            .unwrap_or_else(Local::now),
    };
    format_datetime(&datetime, pattern)
}

/// Expand clock-format tokens against a datetime.
///
/// Tokens: `yyyy`/`yy` year, `MMMM`/`MMM`/`MM`/`M` month, `dddd`/`ddd`
/// weekday, `dd`/`d` day, `HH`/`H` 24-hour, `hh`/`h` 12-hour, `mm`/`m`
/// minute, `ss`/`s` second, `fff`/`ff`/`f` sub-second, `TT`/`T` and
/// `tt`/`t` meridiem, `K` offset. A backslash escapes the next
/// character.
pub(crate) fn format_datetime<Tz: TimeZone>(datetime: &chrono::DateTime<Tz>, pattern: &str) -> String {
    let year = datetime.year();
    let month = datetime.month() as usize;
    let day = datetime.day();
    let weekday = datetime.weekday().num_days_from_sunday() as usize;
    let hour24 = datetime.hour();
    let hour12 = match hour24 {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    let minute = datetime.minute();
    let second = datetime.second();
    let millis = datetime.timestamp_subsec_millis().min(999);
    let centis = (f64::from(millis) / 10.0 + 0.5).floor() as u32;
    let decis = (f64::from(centis) / 10.0 + 0.5).floor() as u32;
    let meridiem = if hour24 < 12 { "AM" } else { "PM" };

    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        match c {
            'y' if run == 2 => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            'y' => out.push_str(&year.to_string()),
            'M' if run >= 4 => out.push_str(MONTHS_FULL[month - 1]),
            'M' if run == 3 => out.push_str(MONTHS_SHORT[month - 1]),
            'M' if run == 2 => out.push_str(&format!("{month:02}")),
            'M' => out.push_str(&month.to_string()),
            'd' if run >= 4 => out.push_str(WEEKDAYS_FULL[weekday]),
            'd' if run == 3 => out.push_str(WEEKDAYS_SHORT[weekday]),
            'd' if run == 2 => out.push_str(&format!("{day:02}")),
            'd' => out.push_str(&day.to_string()),
            'H' if run >= 2 => out.push_str(&format!("{hour24:02}")),
            'H' => out.push_str(&hour24.to_string()),
            'h' if run >= 2 => out.push_str(&format!("{hour12:02}")),
            'h' => out.push_str(&hour12.to_string()),
            'm' if run >= 2 => out.push_str(&format!("{minute:02}")),
            'm' => out.push_str(&minute.to_string()),
            's' if run >= 2 => out.push_str(&format!("{second:02}")),
            's' => out.push_str(&second.to_string()),
            'f' if run >= 3 => out.push_str(&format!("{millis:03}")),
            'f' if run == 2 => out.push_str(&format!("{centis:02}")),
            'f' => out.push_str(&decis.to_string()),
            'T' if run >= 2 => out.push_str(meridiem),
            'T' => out.push_str(&meridiem[..1]),
            't' if run >= 2 => out.push_str(&meridiem.to_lowercase()),
            't' => out.push_str(&meridiem[..1].to_lowercase()),
            'K' => {
                let offset_secs = datetime.offset().fix().local_minus_utc();
                let sign = if offset_secs > 0 {
                    "+"
                } else if offset_secs < 0 {
                    "-"
                } else {
                    "Z"
                };
                let abs = offset_secs.unsigned_abs();
                out.push_str(&format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60));
                for _ in 1..run {
                    out.push('K');
                }
            }
            _ => {
                for _ in 0..run {
                    out.push(c);
                }
            }
        }
        i += run;
    }
    out
}

//! Inbound declaration model and normalization.
//!
//! A declaration arrives as one parsed [`serde_json::Value`] and can take
//! three shapes: a plain mapping (unordered pairs), an ordered pair
//! sequence `[[key, value], ...]`, or a flat sequence whose elements are
//! present-keys with an implicit empty value. Normalization reduces all
//! three to ordered pairs and extracts the animation directive, which is
//! mutually exclusive with non-animated updates within one declaration.

use serde_json::Value;

use crate::ease::Easing;

/// A declaration reduced to ordered pairs.
///
/// A pair value of `None` means the key was declared without a value (the
/// flat-sequence shorthand, or a one-element pair); the reconciler treats
/// it as an empty string. `Some(Value::Null)` is the explicit removal
/// marker and stays distinct.
#[derive(Debug, Clone)]
pub struct NormalizedDecl {
    /// Ordered (key, value) pairs, private keys included.
    pub pairs: Vec<(String, Option<Value>)>,
    /// Present when the declaration carries a `_T` animation directive.
    pub animate: Option<AnimationDirective>,
}

impl NormalizedDecl {
    /// Normalize a declaration value.
    ///
    /// Scalars and null produce an empty declaration; the engine handles
    /// those shapes before reconciliation.
    #[must_use]
    pub fn parse(decl: &Value) -> Self {
        let pairs: Vec<(String, Option<Value>)> = match decl {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
            Value::Array(items) if items.first().is_some_and(Value::is_array) => items
                .iter()
                .filter_map(Value::as_array)
                .filter(|pair| !pair.is_empty())
                .map(|pair| (key_string(&pair[0]), pair.get(1).cloned()))
                .collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| (key_string(item), None))
                .collect(),
            _ => Vec::new(),
        };
        let animate = AnimationDirective::parse(&pairs);
        Self { pairs, animate }
    }
}

/// Animated update extracted from a declaration's `_T` entry.
#[derive(Debug, Clone)]
pub struct AnimationDirective {
    /// Transition duration in seconds; a missing or falsy `s` means 1.
    pub duration_secs: f64,
    /// Easing resolved from the `ease`/`easeout` entries.
    pub easing: Easing,
    /// Completion-acknowledgment id (`tid`), dispatched once per animated
    /// child on natural completion.
    pub ack: Option<String>,
    /// Keys with numeric targets, in declaration order.
    pub targets: Vec<(String, f64)>,
}

impl AnimationDirective {
    fn parse(pairs: &[(String, Option<Value>)]) -> Option<Self> {
        // A bare `_T` key with no parameter value does not animate; the
        // flat present-key form has no way to carry targets anyway.
        let params = pairs
            .iter()
            .find(|(key, _)| key == "_T")
            .and_then(|(_, value)| value.clone())?;

        let (duration_secs, easing, ack) = transition_params(&params);
        let targets = pairs
            .iter()
            .filter_map(|(key, value)| {
                let target = value.as_ref()?.as_f64()?;
                Some((key.clone(), target))
            })
            .collect();

        Some(Self {
            duration_secs,
            easing,
            ack,
            targets,
        })
    }
}

/// Extract (duration, easing, acknowledgment id) from a `_T` parameter
/// value. Shared between child animations and boxed style transitions.
pub(crate) fn transition_params(params: &Value) -> (f64, Easing, Option<String>) {
    let duration_secs = params
        .get("s")
        .and_then(Value::as_f64)
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0);
    let ack = params
        .get("tid")
        .filter(|tid| is_truthy(tid))
        .map(key_string);
    (duration_secs, Easing::from_declaration(params), ack)
}

/// Render a value as a declaration key.
///
/// Scalars take their text form; compound values (degenerate as keys) take
/// their JSON text so the result stays deterministic.
#[must_use]
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Loose truthiness over JSON values: null, false, zero and the empty
/// string are falsy, everything else is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

//! Text substitution table.
//!
//! A persistent shorthand → replacement map owned by the engine instance,
//! consulted for every rendered label and text content. The actor manages
//! entries through the `_replace` directive: non-null values merge, null
//! deletes.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::declaration::key_string;

/// Shorthand replacement table.
///
/// Entries apply in a deterministic order; replacement output is not
/// re-scanned, matching plain sequential replacement semantics.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionTable {
    entries: BTreeMap<String, String>,
}

impl SubstitutionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one entry.
    pub fn insert(&mut self, shorthand: impl Into<String>, replacement: impl Into<String>) {
        self.entries.insert(shorthand.into(), replacement.into());
    }

    /// Apply a `_replace` directive payload: merge non-null entries,
    /// delete null ones. Non-mapping payloads are ignored with a warning.
    pub fn apply_directive(&mut self, payload: &Value) {
        let Some(map) = payload.as_object() else {
            warn!(?payload, "_replace payload is not a mapping, ignored");
            return;
        };
        for (shorthand, replacement) in map {
            if replacement.is_null() {
                self.entries.remove(shorthand);
            } else {
                self.entries
                    .insert(shorthand.clone(), key_string(replacement));
            }
        }
    }

    /// Expand every shorthand occurring in `text`.
    #[must_use]
    pub fn expand(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for (shorthand, replacement) in &self.entries {
            if out.contains(shorthand.as_str()) {
                out = out.replace(shorthand.as_str(), replacement);
            }
        }
        out
    }

    /// Number of active entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

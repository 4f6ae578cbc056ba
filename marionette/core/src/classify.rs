//! Node kinds and value classification.
//!
//! Every declared value maps to exactly one [`NodeKind`]; classification is
//! total and never fails. The compatibility table decides when an existing
//! node absorbs a value of a different classification instead of being
//! retyped, which is what keeps stateful elements (selections, edit
//! buffers) alive across server restatements.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Special-element variants, the closed set of non-generic node kinds.
///
/// Each variant carries bespoke interaction semantics; children of a
/// special container are always classified as that variant's child kind
/// regardless of their declared value shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialKind {
    /// `_i`: generic item container; child clicks report through the parent.
    GenericItem,
    /// `_ih`: highlighted rows reporting press/release directly.
    HighlightItem,
    /// `_i2`: independently toggling selection rows.
    MultiSelect,
    /// `_i1`: exclusively selecting rows (radio group).
    SingleSelect,
    /// `_ix`: user-editable text committed on blur or Enter.
    EditableText,
    /// `_ln`: polyline plot; children are path segments.
    LinePlot,
    /// `_tb`: reserved table element, renders nothing.
    Table,
    /// `_i*`: wildcard, accepted but never rendered.
    Ignored,
}

impl SpecialKind {
    /// Resolve a declaration key to a special kind, if it is one.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "_i" => Some(Self::GenericItem),
            "_ih" => Some(Self::HighlightItem),
            "_i2" => Some(Self::MultiSelect),
            "_i1" => Some(Self::SingleSelect),
            "_ix" => Some(Self::EditableText),
            "_ln" => Some(Self::LinePlot),
            "_tb" => Some(Self::Table),
            "_i*" => Some(Self::Ignored),
            _ => None,
        }
    }

    /// The wire tag for this kind, as it appears in declarations.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::GenericItem => "_i",
            Self::HighlightItem => "_ih",
            Self::MultiSelect => "_i2",
            Self::SingleSelect => "_i1",
            Self::EditableText => "_ix",
            Self::LinePlot => "_ln",
            Self::Table => "_tb",
            Self::Ignored => "_i*",
        }
    }
}

/// Semantic kind of a live node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Generic container; children are reconciled recursively.
    Object,
    /// Numeric leaf rendered through the numeric spec pipeline.
    Number,
    /// Text leaf with substitution applied.
    Text,
    /// Boolean leaf rendered as `true`/`false`.
    Bool,
    /// A special-element container.
    Special(SpecialKind),
    /// A child of a special-element container.
    SpecialChild(SpecialKind),
}

/// Classify a declared value.
///
/// Scalars map to their primitive kind; a sequence or mapping containing a
/// special tag (for flat sequences, the element values act as keys) maps to
/// that variant; any other compound value is an [`NodeKind::Object`].
#[must_use]
pub fn classify(value: &Value) -> NodeKind {
    match value {
        Value::Null => NodeKind::Text,
        Value::Bool(_) => NodeKind::Bool,
        Value::Number(_) => NodeKind::Number,
        Value::String(_) => NodeKind::Text,
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.as_str().and_then(SpecialKind::from_tag))
            .map_or(NodeKind::Object, NodeKind::Special),
        Value::Object(map) => map
            .keys()
            .find_map(|key| SpecialKind::from_tag(key))
            .map_or(NodeKind::Object, NodeKind::Special),
    }
}

/// Whether an existing node absorbs a value of a different classification
/// without being retyped.
///
/// The table is keyed by the new classification: container specials absorb
/// plain objects, editable text absorbs strings, and selectable rows absorb
/// the numeric/boolean press codes used to preselect them.
#[must_use]
pub fn absorbs(existing: NodeKind, new: NodeKind) -> bool {
    use SpecialKind::{
        EditableText, GenericItem, HighlightItem, LinePlot, MultiSelect, SingleSelect,
    };
    match new {
        NodeKind::Object => matches!(
            existing,
            NodeKind::Special(
                GenericItem | HighlightItem | SingleSelect | MultiSelect | EditableText | LinePlot
            )
        ),
        NodeKind::Text => matches!(existing, NodeKind::Special(EditableText)),
        NodeKind::Number | NodeKind::Bool => matches!(
            existing,
            NodeKind::SpecialChild(SingleSelect | MultiSelect)
        ),
        _ => false,
    }
}

/// Whether a mapping payload carries only private (`_`-prefixed) keys.
///
/// Such payloads update options on an existing node without retyping it,
/// and a fresh key declared with one creates a Number node when the
/// payload includes a numeric spec.
#[must_use]
pub fn is_pure_options(map: &serde_json::Map<String, Value>) -> bool {
    map.keys().all(|key| key.starts_with('_'))
}

//! Render operations and the surface collaborator.
//!
//! The engine never draws. Every visual consequence of a directive is
//! expressed as a [`RenderOp`] and handed to the host's [`RenderSurface`]
//! in order. Ops reference nodes by [`NodeId`]; the surface keeps its own
//! id-to-widget map and interprets style values however its toolkit
//! wants (the engine passes them through verbatim).

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::arena::NodeId;
use crate::classify::NodeKind;
use crate::ease::Easing;

/// Style properties addressable through layout-option shorthands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleProp {
    /// `x` — horizontal offset; switches the node to absolute placement.
    X,
    /// `y` — vertical offset; switches the node to absolute placement.
    Y,
    /// `w` — width.
    Width,
    /// `h` — height.
    Height,
    /// `r` — corner radius.
    CornerRadius,
    /// `bg` — background color.
    Background,
    /// `bd` — border.
    Border,
    /// `bdw` — border width.
    BorderWidth,
    /// `bdc` — border color.
    BorderColor,
    /// `pad` — padding.
    Padding,
    /// `fnt` — font.
    Font,
    /// `col` — text color.
    Color,
    /// `rot` — rotation in degrees.
    Rotation,
}

impl StyleProp {
    /// Resolve a layout-option shorthand key. Unknown keys are not an
    /// error, the caller skips them.
    #[must_use]
    pub fn from_shorthand(key: &str) -> Option<Self> {
        Some(match key {
            "x" => Self::X,
            "y" => Self::Y,
            "w" => Self::Width,
            "h" => Self::Height,
            "r" => Self::CornerRadius,
            "bg" => Self::Background,
            "bd" => Self::Border,
            "bdw" => Self::BorderWidth,
            "bdc" => Self::BorderColor,
            "pad" => Self::Padding,
            "fnt" => Self::Font,
            "col" => Self::Color,
            "rot" => Self::Rotation,
            _ => return None,
        })
    }

    /// The shorthand key this property parses from.
    #[must_use]
    pub fn shorthand(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Width => "w",
            Self::Height => "h",
            Self::CornerRadius => "r",
            Self::Background => "bg",
            Self::Border => "bd",
            Self::BorderWidth => "bdw",
            Self::BorderColor => "bdc",
            Self::Padding => "pad",
            Self::Font => "fnt",
            Self::Color => "col",
            Self::Rotation => "rot",
        }
    }
}

impl std::fmt::Display for StyleProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.shorthand())
    }
}

/// One visual mutation, in application order.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOp {
    /// A node entered the tree. `parent` is `None` only for the two
    /// roots announced at engine construction. The label is fixed at
    /// creation; ordinal keys carry an empty label.
    CreateNode {
        /// Handle for the new node.
        node: NodeId,
        /// Containing node, if any.
        parent: Option<NodeId>,
        /// Declaration key within the parent.
        key: String,
        /// Kind the node was created as.
        kind: NodeKind,
        /// Tree depth, roots at 0.
        depth: u32,
        /// Display label derived from the key.
        label: String,
    },
    /// A node changed kind in place: visuals reset, children dropped,
    /// identity and label kept.
    RetypeNode {
        /// Affected node.
        node: NodeId,
        /// Kind the node becomes.
        kind: NodeKind,
    },
    /// A node and its subtree left the tree for good.
    RemoveNode {
        /// Detached node.
        node: NodeId,
    },
    /// A node's content and children were reset; the node itself stays.
    ClearNode {
        /// Cleared node.
        node: NodeId,
    },
    /// Replace a node's textual content.
    SetContent {
        /// Affected node.
        node: NodeId,
        /// New content, substitutions already expanded.
        text: String,
    },
    /// Apply style properties immediately.
    SetStyle {
        /// Affected node.
        node: NodeId,
        /// Property-value pairs, values verbatim from the declaration.
        props: Vec<(StyleProp, Value)>,
    },
    /// Animate style properties to target values.
    TransitionStyle {
        /// Affected node.
        node: NodeId,
        /// Target property-value pairs.
        props: Vec<(StyleProp, Value)>,
        /// Transition duration in seconds.
        duration_secs: f64,
        /// Easing to apply over the duration.
        easing: Easing,
        /// Acknowledgment id to report through
        /// [`Engine::transition_done`](crate::engine::Engine::transition_done)
        /// once the transition finishes, if requested.
        ack: Option<String>,
    },
    /// Toggle the selection mark on a selectable row.
    SetSelected {
        /// Affected node.
        node: NodeId,
        /// New selection state.
        selected: bool,
    },
    /// Toggle the disabled presentation; a disabled node also stops
    /// accepting edits.
    SetDisabled {
        /// Affected node.
        node: NodeId,
        /// New disabled state.
        disabled: bool,
    },
    /// Constrain a node's content to a scrolling viewport of the given
    /// line count.
    SetVisibleLines {
        /// Affected node.
        node: NodeId,
        /// Number of text lines to keep visible.
        lines: f64,
    },
    /// Enable in-place text editing on a node. Edits come back through
    /// [`Engine::commit_text`](crate::engine::Engine::commit_text).
    SetEditable {
        /// Affected node.
        node: NodeId,
        /// Whether the node accepts edits.
        editable: bool,
    },
    /// Ensure a plot surface exists on a line-plot node. Idempotent.
    EnsurePlot {
        /// Plot container node.
        node: NodeId,
    },
    /// Replace the path data of a plot stroke.
    SetPathData {
        /// Path node inside a plot container.
        node: NodeId,
        /// Move-to command followed by the declared coordinate list.
        data: String,
    },
    /// Display a numeric value as a filled progress track.
    SetProgress {
        /// Affected node.
        node: NodeId,
        /// Fill fraction; not clamped, bounds come from the declaration.
        ratio: f64,
        /// Decorated value text shown over the track.
        text: String,
    },
    /// Show or hide the popup panel.
    SetPopupVisible {
        /// New visibility.
        visible: bool,
    },
}

impl RenderOp {
    /// The node this op targets, when it targets one.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::CreateNode { node, .. }
            | Self::RetypeNode { node, .. }
            | Self::RemoveNode { node }
            | Self::ClearNode { node }
            | Self::SetContent { node, .. }
            | Self::SetStyle { node, .. }
            | Self::TransitionStyle { node, .. }
            | Self::SetSelected { node, .. }
            | Self::SetDisabled { node, .. }
            | Self::SetVisibleLines { node, .. }
            | Self::SetEditable { node, .. }
            | Self::EnsurePlot { node }
            | Self::SetPathData { node, .. }
            | Self::SetProgress { node, .. } => Some(*node),
            Self::SetPopupVisible { .. } => None,
        }
    }
}

/// Host-side widget tree. Receives every [`RenderOp`] in order.
pub trait RenderSurface: Send {
    /// Apply one operation.
    fn apply(&mut self, op: RenderOp);
}

/// Surface that drops every operation. Default collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn apply(&mut self, _op: RenderOp) {}
}

/// Surface that records every operation for later inspection. Meant for
/// tests and headless diagnostics; cloning shares the underlying log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    ops: Arc<Mutex<Vec<RenderOp>>>,
}

impl RecordingSurface {
    /// New surface with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything applied so far.
    #[must_use]
    pub fn ops(&self) -> Vec<RenderOp> {
        self.ops.lock().clone()
    }

    /// Drain the log, returning everything applied since the last take.
    pub fn take(&self) -> Vec<RenderOp> {
        std::mem::take(&mut *self.ops.lock())
    }
}

impl RenderSurface for RecordingSurface {
    fn apply(&mut self, op: RenderOp) {
        self.ops.lock().push(op);
    }
}

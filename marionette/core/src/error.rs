//! Error types shared between the engine core and the driver.
//!
//! The engine itself never fails on inbound data: degenerate directive
//! shapes are logged and skipped, and a render step against a stale node
//! halts only that subtree. The enums here cover the failure sources that
//! cross a collaborator boundary.

use thiserror::Error;

/// Resource loading failures.
///
/// A failed or timed-out load drops the suspended message residue; queued
/// messages resume afterwards. Nothing is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The resource did not load within the configured timeout.
    #[error("resource load timed out: {url}")]
    Timeout {
        /// URL of the resource that timed out.
        url: String,
    },

    /// The loader reported a failure for one resource.
    #[error("resource load failed: {url}: {detail}")]
    Failed {
        /// URL of the resource that failed.
        url: String,
        /// Loader-specific failure description.
        detail: String,
    },
}

/// Transport channel failures.
///
/// There is no automatic reconnection: on failure the tree is left as-is
/// and the host is notified through [`crate::capability::HostEnvironment`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the channel.
    #[error("transport closed")]
    Closed,

    /// An outbound frame could not be delivered.
    #[error("transport send failed: {0}")]
    SendFailed(String),
}

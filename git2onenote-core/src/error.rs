//! Error taxonomy for reconciliation passes.
//!
//! Two tiers exist and must not be conflated:
//! - [`SyncError`]: pass-level failures. A pass that hits one of these
//!   produced no usable result and is surfaced verbatim to the trigger that
//!   started it.
//! - [`FileErrorKind`]: per-file failures. These are accumulated inside a
//!   pass result and never abort the remaining files of the pass.

use thiserror::Error;

/// Boxed error type returned by collaborator clients at the trait seam.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Pass-level and coordinator-level failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing the repository tree (or commit history, when required) failed.
    /// The whole pass aborts; nothing was uploaded.
    #[error("repository source unavailable: {0}")]
    SourceUnavailable(ClientError),

    /// Listing the notebook section pages failed. The whole pass aborts.
    #[error("notebook sink unavailable: {0}")]
    SinkUnavailable(ClientError),

    /// A pass for this link is already in flight and the busy policy rejects
    /// queueing a second one.
    #[error("a sync pass for link '{0}' is already running")]
    Busy(String),

    /// The trigger named a link that is not in the registry.
    #[error("no configured link named '{0}'")]
    UnknownLink(String),

    /// Malformed configuration (duplicate link names, bad schedule string,
    /// empty link set). Fatal at startup, never a runtime path.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// True for the coordinator-level busy rejection, which callers typically
    /// map to a retry-later status rather than a hard failure.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::Busy(_))
    }
}

/// Classifies a per-file failure inside a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FileErrorKind {
    /// Fetching the raw file bytes from the repository failed.
    Fetch,
    /// Creating the page in the notebook section failed.
    Upload,
}

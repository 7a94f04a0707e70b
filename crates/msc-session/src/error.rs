// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for collaborator calls and session operations.

use std::time::Duration;

use msc_app_core::config::ConfigError;
use msc_core::{RepositoryError, SequenceError};
use thiserror::Error;

/// Failure of a collaborator call.
///
/// None of these are fatal to the session: callers log them and fall back to
/// local data.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ─── Transport ───────────────────────────────────────────────────────────
    /// Connection or protocol failure.
    #[error("[SVC_TRANSPORT] {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("[SVC_STATUS] {url} returned {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Response body did not have the expected shape.
    #[error("[SVC_DECODE] {0}")]
    Decode(#[from] serde_json::Error),

    // ─── Call control ────────────────────────────────────────────────────────
    /// The call did not finish within the configured timeout.
    #[error("[SVC_TIMEOUT] {op} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        op: &'static str,
        /// Configured limit.
        after: Duration,
    },
    /// The call was cancelled through a [`crate::Canceller`].
    #[error("[SVC_CANCELLED] {0} cancelled")]
    Cancelled(&'static str),
    /// The collaborator does not offer this operation.
    #[error("[SVC_UNAVAILABLE] {0}")]
    Unavailable(String),

    // ─── Local backends ──────────────────────────────────────────────────────
    /// Error from a local repository.
    #[error("[SVC_REPOSITORY] {0}")]
    Repository(#[from] RepositoryError),
    /// A blocking task panicked or was aborted.
    #[error("[SVC_TASK] {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Whether the error came from the caller giving up rather than the
    /// collaborator failing.
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled(_))
    }
}

/// Failure of an [`crate::EditorSession`] operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Document operation failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// Collaborator call failed with no local fallback.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Config persistence failed.
    #[error("[SESSION_CONFIG] {0}")]
    Config(#[from] ConfigError),
}

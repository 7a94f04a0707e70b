// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors surfaced by document operations.
//!
//! Replay ([`crate::compute_actor_states`]) has no error type: it degrades to
//! "value absent" instead. Actor collisions are not errors either; they are
//! attached to the message as a [`crate::ViolationCode::SameActors`] warning.

use std::fmt;

use thiserror::Error;

/// What kind of thing a [`SequenceError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundTarget {
    /// No open sequence with that id.
    Sequence,
    /// No message with that id in the sequence.
    Message,
    /// No tracked configuration (or no value at that index).
    Configuration,
}

impl fmt::Display for NotFoundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Message => write!(f, "message"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Errors from editing, importing and exporting sequences.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The operation's target is absent. The document is unchanged.
    #[error("{target} not found: {id}")]
    NotFound {
        /// Kind of missing target.
        target: NotFoundTarget,
        /// Id (or name) that was looked up.
        id: String,
    },
    /// Import payload did not parse as a sequence snapshot. The document is unchanged.
    #[error("malformed import: {0}")]
    MalformedImport(String),
    /// Snapshot could not be encoded.
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}

impl SequenceError {
    /// Shorthand for a missing sequence.
    pub fn sequence(id: impl Into<String>) -> Self {
        Self::NotFound {
            target: NotFoundTarget::Sequence,
            id: id.into(),
        }
    }

    /// Shorthand for a missing message.
    pub fn message(id: impl Into<String>) -> Self {
        Self::NotFound {
            target: NotFoundTarget::Message,
            id: id.into(),
        }
    }

    /// Shorthand for a missing configuration entry.
    pub fn configuration(id: impl Into<String>) -> Self {
        Self::NotFound {
            target: NotFoundTarget::Configuration,
            id: id.into(),
        }
    }

    /// Returns `true` for any [`SequenceError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

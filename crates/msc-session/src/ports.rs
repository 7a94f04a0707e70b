// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collaborator ports.
//!
//! The session only talks to these traits. Implementations may be remote
//! ([`crate::HttpServices`]), local ([`crate::RepositoryBackend`]) or absent
//! ([`crate::Offline`]).

use std::future::Future;

use msc_core::{ListFilter, Sequence, SequenceDelta, SequenceId, Suggestion, TypeNode};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Field being edited, as sent to the suggestion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionQuery {
    /// Sequence the field belongs to.
    pub sequence_id: SequenceId,
    /// Index of the message being edited.
    pub message_index: usize,
    /// Field name.
    pub field_name: String,
    /// Protocol of the sequence.
    pub protocol: String,
    /// Type of the message being edited.
    pub type_name: String,
}

/// Message type definitions.
pub trait SchemaService {
    /// Definition tree of `type_name` in `protocol`.
    fn type_definition(
        &self,
        protocol: &str,
        type_name: &str,
    ) -> impl Future<Output = Result<TypeNode, ServiceError>> + Send;
}

/// Values previously used for a field.
pub trait SuggestionService {
    /// Suggestions for the queried field, best first.
    fn suggestions(
        &self,
        query: &SuggestionQuery,
    ) -> impl Future<Output = Result<Vec<Suggestion>, ServiceError>> + Send;
}

/// Identifier-like fields of a message type.
pub trait IdentifierService {
    /// Names of fields in `type_name` that should be tracked.
    fn identifiers(
        &self,
        protocol: &str,
        type_name: &str,
    ) -> impl Future<Output = Result<Vec<String>, ServiceError>> + Send;
}

/// Session-scoped sequence storage.
pub trait PersistenceService {
    /// Store a new sequence.
    fn create(&self, sequence: &Sequence) -> impl Future<Output = Result<Sequence, ServiceError>> + Send;

    /// Look up by id. `Ok(None)` when absent.
    fn get(&self, id: &SequenceId) -> impl Future<Output = Result<Option<Sequence>, ServiceError>> + Send;

    /// Insert or overwrite a whole sequence.
    fn save(&self, sequence: &Sequence) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Apply a partial update and return the stored result.
    fn update(
        &self,
        id: &SequenceId,
        delta: &SequenceDelta,
    ) -> impl Future<Output = Result<Sequence, ServiceError>> + Send;

    /// Remove. Returns whether anything was removed.
    fn delete(&self, id: &SequenceId) -> impl Future<Output = Result<bool, ServiceError>> + Send;

    /// Stored sequences passing `filter`, newest first.
    fn list(&self, filter: &ListFilter) -> impl Future<Output = Result<Vec<Sequence>, ServiceError>> + Send;
}

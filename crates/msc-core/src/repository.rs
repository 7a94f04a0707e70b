// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence port for sequences and an in-memory adapter.
//!
//! # Absence Semantics
//!
//! [`SequenceRepository::get`] returns `Ok(None)` for an unknown id. Missing
//! sequences are an expected outcome of a lookup, not an error; error variants
//! are reserved for storage and encoding failures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::SequenceError;
use crate::history::EditOp;
use crate::ident::{MessageId, SequenceId};
use crate::model::{Message, NewMessage, Sequence};

/// Errors from a [`SequenceRepository`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// `create` was called with an id that is already stored.
    #[error("[REPO_EXISTS] sequence {0} already exists")]
    AlreadyExists(SequenceId),
    /// `update` was called with an unknown id.
    #[error("[REPO_NOT_FOUND] sequence {0} not found")]
    NotFound(SequenceId),
    /// A delta referred to something that is not in the sequence.
    #[error("[REPO_DELTA] {0}")]
    Delta(#[from] SequenceError),
    /// Filesystem failure.
    #[error("[REPO_IO] {0}")]
    Io(#[from] std::io::Error),
    /// Stored data could not be encoded or decoded.
    #[error("[REPO_SERDE] {0}")]
    Serde(#[from] serde_json::Error),
}

/// Replacement body for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdate {
    /// Message to change.
    #[serde(alias = "message_id")]
    pub id: MessageId,
    /// New body.
    pub data: Value,
}

/// Partial update applied by [`SequenceRepository::update`].
///
/// Parts are applied in field order: rename, add, remove, update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequenceDelta {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Message to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_message: Option<NewMessage>,
    /// Message to remove.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_message: Option<MessageId>,
    /// Message body to replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_message: Option<MessageUpdate>,
}

impl SequenceDelta {
    /// Returns `true` when the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.add_message.is_none()
            && self.remove_message.is_none()
            && self.update_message.is_none()
    }

    /// Apply to `sequence`. On error `sequence` is unchanged.
    ///
    /// # Errors
    ///
    /// [`SequenceError::NotFound`] when the removed or updated message is not
    /// in the sequence.
    pub fn apply_to(self, sequence: &mut Sequence) -> Result<(), SequenceError> {
        if self.is_empty() {
            return Ok(());
        }
        let mut next = sequence.clone();
        if let Some(name) = self.name {
            EditOp::Rename { name }.apply(&mut next)?;
        }
        if let Some(message) = self.add_message {
            let message = Message::materialize(message, &next.id);
            let index = next.messages.len();
            EditOp::InsertMessage { index, message }.apply(&mut next)?;
        }
        if let Some(id) = self.remove_message {
            EditOp::RemoveMessage { id }.apply(&mut next)?;
        }
        if let Some(MessageUpdate { id, data }) = self.update_message {
            EditOp::UpdateMessage { id, data }.apply(&mut next)?;
        }
        next.updated_at = OffsetDateTime::now_utc().max(next.created_at);
        *sequence = next;
        Ok(())
    }

    /// Deltas that take `stored` to `wanted`: a rename, then removals, body
    /// updates and appends, one part per delta.
    ///
    /// Messages are matched by id. Deltas cannot reorder messages or carry
    /// configurations, so only the name, message membership and message
    /// bodies are brought across.
    pub fn between(stored: &Sequence, wanted: &Sequence) -> Vec<Self> {
        let mut deltas = Vec::new();
        if stored.name != wanted.name {
            deltas.push(Self {
                name: Some(wanted.name.clone()),
                ..Self::default()
            });
        }
        for message in &stored.messages {
            match wanted.messages.iter().find(|m| m.id == message.id) {
                None => deltas.push(Self {
                    remove_message: Some(message.id.clone()),
                    ..Self::default()
                }),
                Some(next) if next.data != message.data => deltas.push(Self {
                    update_message: Some(MessageUpdate {
                        id: message.id.clone(),
                        data: next.data.clone(),
                    }),
                    ..Self::default()
                }),
                Some(_) => {}
            }
        }
        for message in &wanted.messages {
            if !stored.messages.iter().any(|m| m.id == message.id) {
                deltas.push(Self {
                    add_message: Some(NewMessage::from(message.clone())),
                    ..Self::default()
                });
            }
        }
        deltas
    }
}

/// Selection for [`SequenceRepository::list`]. Empty fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListFilter {
    /// Only this protocol.
    pub protocol: Option<String>,
    /// Only this session.
    pub session_id: Option<String>,
}

impl ListFilter {
    /// Whether `sequence` passes the filter.
    pub fn matches(&self, sequence: &Sequence) -> bool {
        self.protocol.as_ref().is_none_or(|p| &sequence.protocol == p)
            && self
                .session_id
                .as_ref()
                .is_none_or(|s| sequence.session_id.as_ref() == Some(s))
    }
}

/// Session-scoped sequence storage.
///
/// Synchronous; async callers wrap an implementation in a blocking task.
pub trait SequenceRepository {
    /// Store a new sequence.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::AlreadyExists`] when the id is taken, or a storage
    /// error.
    fn create(&mut self, sequence: &Sequence) -> Result<(), RepositoryError>;

    /// Look up by id. `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Storage or decoding failures.
    fn get(&self, id: &SequenceId) -> Result<Option<Sequence>, RepositoryError>;

    /// Insert or overwrite.
    ///
    /// # Errors
    ///
    /// Storage or encoding failures.
    fn save(&mut self, sequence: &Sequence) -> Result<(), RepositoryError>;

    /// Remove. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn delete(&mut self, id: &SequenceId) -> Result<bool, RepositoryError>;

    /// Stored sequences passing `filter`, newest update first.
    ///
    /// # Errors
    ///
    /// Storage failures. Unreadable entries are skipped, not reported.
    fn list(&self, filter: &ListFilter) -> Result<Vec<Sequence>, RepositoryError>;

    /// Apply `delta` to a stored sequence and persist the result.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] for an unknown id,
    /// [`RepositoryError::Delta`] when the delta does not apply.
    fn update(&mut self, id: &SequenceId, delta: SequenceDelta) -> Result<Sequence, RepositoryError> {
        let mut sequence = self
            .get(id)?
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        delta.apply_to(&mut sequence)?;
        self.save(&sequence)?;
        Ok(sequence)
    }
}

/// In-memory [`SequenceRepository`].
#[derive(Debug, Default, Clone)]
pub struct MemorySequenceRepository {
    sequences: BTreeMap<SequenceId, Sequence>,
}

impl MemorySequenceRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl SequenceRepository for MemorySequenceRepository {
    fn create(&mut self, sequence: &Sequence) -> Result<(), RepositoryError> {
        if self.sequences.contains_key(&sequence.id) {
            return Err(RepositoryError::AlreadyExists(sequence.id.clone()));
        }
        self.sequences.insert(sequence.id.clone(), sequence.clone());
        Ok(())
    }

    fn get(&self, id: &SequenceId) -> Result<Option<Sequence>, RepositoryError> {
        Ok(self.sequences.get(id).cloned())
    }

    fn save(&mut self, sequence: &Sequence) -> Result<(), RepositoryError> {
        self.sequences.insert(sequence.id.clone(), sequence.clone());
        Ok(())
    }

    fn delete(&mut self, id: &SequenceId) -> Result<bool, RepositoryError> {
        Ok(self.sequences.remove(id).is_some())
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<Sequence>, RepositoryError> {
        let mut out: Vec<Sequence> = self
            .sequences
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }
}

/// Order by `updated_at` descending, ties by id.
pub fn sort_newest_first(sequences: &mut [Sequence]) {
    sequences.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    // ─── Basic round-trip ────────────────────────────────────────────────────

    #[test]
    fn create_get_delete() {
        let mut repo = MemorySequenceRepository::new();
        let seq = Sequence::new("a", "rrc_demo", Some("s1".into()));
        repo.create(&seq).unwrap();
        assert!(matches!(repo.create(&seq), Err(RepositoryError::AlreadyExists(_))));
        assert_eq!(repo.get(&seq.id).unwrap().unwrap().name, "a");
        assert!(repo.delete(&seq.id).unwrap());
        assert!(!repo.delete(&seq.id).unwrap());
        assert!(repo.get(&seq.id).unwrap().is_none());
    }

    // ─── Deltas ──────────────────────────────────────────────────────────────

    #[test]
    fn delta_applies_every_part() {
        let mut repo = MemorySequenceRepository::new();
        let seq = Sequence::new("a", "rrc_demo", None);
        repo.create(&seq).unwrap();

        let added = repo
            .update(
                &seq.id,
                SequenceDelta {
                    name: Some("b".into()),
                    add_message: Some(NewMessage::new("X", "UE", "gNB").with_id("m1")),
                    ..SequenceDelta::default()
                },
            )
            .unwrap();
        assert_eq!(added.name, "b");
        assert_eq!(added.len(), 1);

        let delta: SequenceDelta = serde_json::from_value(json!({
            "update_message": {"message_id": "m1", "data": {"k": 1}}
        }))
        .unwrap();
        let updated = repo.update(&seq.id, delta).unwrap();
        assert_eq!(updated.messages[0].data, json!({"k": 1}));

        let removed = repo
            .update(
                &seq.id,
                SequenceDelta {
                    remove_message: Some("m1".into()),
                    ..SequenceDelta::default()
                },
            )
            .unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn deltas_between_bring_stored_copy_in_line() {
        let id = SequenceId::new("s");
        let message = |mid: &str, data: Value| {
            Message::materialize(NewMessage::new("X", "UE", "gNB").with_id(mid).with_data(data), &id)
        };
        let mut stored = Sequence::new("old", "rrc_demo", None);
        stored.messages = vec![
            message("keep", json!({"a": 1})),
            message("drop", json!({})),
            message("edit", json!({"b": 1})),
        ];
        let mut wanted = stored.clone();
        wanted.name = "new".into();
        wanted.messages.remove(1);
        wanted.messages[1].data = json!({"b": 2});
        wanted.messages.push(message("fresh", json!({"c": 3})));

        let deltas = SequenceDelta::between(&stored, &wanted);
        assert_eq!(deltas.len(), 4);
        for delta in deltas {
            delta.apply_to(&mut stored).unwrap();
        }
        assert_eq!(stored.name, "new");
        let ids: Vec<&str> = stored.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["keep", "edit", "fresh"]);
        assert_eq!(stored.messages[1].data, json!({"b": 2}));
        assert!(SequenceDelta::between(&stored, &stored).is_empty());
    }

    #[test]
    fn bad_delta_leaves_stored_copy_alone() {
        let mut repo = MemorySequenceRepository::new();
        let seq = Sequence::new("a", "rrc_demo", None);
        repo.create(&seq).unwrap();
        let err = repo
            .update(
                &seq.id,
                SequenceDelta {
                    name: Some("renamed".into()),
                    remove_message: Some("ghost".into()),
                    ..SequenceDelta::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Delta(_)));
        assert_eq!(repo.get(&seq.id).unwrap().unwrap().name, "a");
        assert!(matches!(
            repo.update(&SequenceId::new("nope"), SequenceDelta::default()),
            Err(RepositoryError::NotFound(_))
        ));
    }

    // ─── Listing ─────────────────────────────────────────────────────────────

    #[test]
    fn list_filters_by_protocol_and_session() {
        let mut repo = MemorySequenceRepository::new();
        for (name, protocol, session) in [
            ("a", "rrc_demo", Some("s1")),
            ("b", "rrc_demo", Some("s2")),
            ("c", "nas", Some("s1")),
            ("d", "rrc_demo", None),
        ] {
            repo.save(&Sequence::new(name, protocol, session.map(str::to_owned)))
                .unwrap();
        }
        let names = |filter: ListFilter| -> Vec<String> {
            let mut names: Vec<String> = repo.list(&filter).unwrap().into_iter().map(|s| s.name).collect();
            names.sort();
            names
        };
        assert_eq!(names(ListFilter::default()).len(), 4);
        assert_eq!(
            names(ListFilter {
                protocol: Some("rrc_demo".into()),
                session_id: None
            }),
            ["a", "b", "d"]
        );
        assert_eq!(
            names(ListFilter {
                protocol: Some("rrc_demo".into()),
                session_id: Some("s1".into())
            }),
            ["a"]
        );
    }
}

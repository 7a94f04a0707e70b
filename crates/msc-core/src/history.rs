// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Invertible edit operations and the bounded undo/redo stacks.
//!
//! Every [`EditOp`] returns its own inverse when applied. The history stores
//! those inverses (not snapshots): undo applies the stored inverse and keeps
//! the op that comes back as the redo entry, and redo does the same in the
//! other direction.

use std::collections::VecDeque;
use std::mem;

use serde_json::Value;
use time::OffsetDateTime;

use crate::error::SequenceError;
use crate::ident::MessageId;
use crate::model::{Message, Sequence, TrackedConfiguration};

/// Default number of undo steps kept per sequence.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// A single invertible change to a [`Sequence`].
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    /// Insert `message` at `index` (clamped to the message count).
    InsertMessage {
        /// Target position.
        index: usize,
        /// Message to insert.
        message: Message,
    },
    /// Remove the message with `id`.
    RemoveMessage {
        /// Message to remove.
        id: MessageId,
    },
    /// Replace the body of the message with `id`.
    UpdateMessage {
        /// Message to change.
        id: MessageId,
        /// New body.
        data: Value,
    },
    /// Change the display name.
    Rename {
        /// New name.
        name: String,
    },
    /// Swap in a whole new sequence body.
    Replace {
        /// Replacement.
        sequence: Box<Sequence>,
    },
    /// Set (`Some`) or delete (`None`) a tracked configuration entry.
    SetConfiguration {
        /// Configuration key.
        name: String,
        /// New entry.
        entry: Option<TrackedConfiguration>,
    },
}

impl EditOp {
    /// Apply to `sequence` and return the op that reverses it.
    ///
    /// On error `sequence` is untouched.
    pub fn apply(self, sequence: &mut Sequence) -> Result<Self, SequenceError> {
        match self {
            Self::InsertMessage { index, message } => {
                let index = index.min(sequence.messages.len());
                let id = message.id.clone();
                sequence.messages.insert(index, message);
                Ok(Self::RemoveMessage { id })
            }
            Self::RemoveMessage { id } => {
                let index = sequence
                    .position(&id)
                    .ok_or_else(|| SequenceError::message(id.as_str()))?;
                let message = sequence.messages.remove(index);
                Ok(Self::InsertMessage { index, message })
            }
            Self::UpdateMessage { id, data } => {
                let message = sequence
                    .messages
                    .iter_mut()
                    .find(|m| m.id == id)
                    .ok_or_else(|| SequenceError::message(id.as_str()))?;
                let previous = mem::replace(&mut message.data, data);
                Ok(Self::UpdateMessage { id, data: previous })
            }
            Self::Rename { name } => Ok(Self::Rename {
                name: mem::replace(&mut sequence.name, name),
            }),
            Self::Replace { sequence: next } => {
                let previous = mem::replace(sequence, *next);
                Ok(Self::Replace {
                    sequence: Box::new(previous),
                })
            }
            Self::SetConfiguration { name, entry } => {
                let previous = match entry {
                    Some(entry) => sequence.configurations.insert(name.clone(), entry),
                    None => sequence.configurations.remove(&name),
                };
                Ok(Self::SetConfiguration {
                    name,
                    entry: previous,
                })
            }
        }
    }

    /// Short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InsertMessage { .. } => "insert_message",
            Self::RemoveMessage { .. } => "remove_message",
            Self::UpdateMessage { .. } => "update_message",
            Self::Rename { .. } => "rename",
            Self::Replace { .. } => "replace",
            Self::SetConfiguration { .. } => "set_configuration",
        }
    }
}

/// A stored op plus the `updated_at` to restore when it is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Op to apply on undo (or redo).
    pub op: EditOp,
    /// Document timestamp before the change this entry reverses.
    pub updated_at: OffsetDateTime,
}

/// Linear undo/redo stacks bounded to a fixed depth.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    depth: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl CommandHistory {
    /// Empty history keeping at most `depth` undo steps (at least one).
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    /// Record the inverse of a fresh edit. Clears the redo stack and drops the
    /// oldest entry past the depth limit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.push_undo(entry);
    }

    /// Take the most recent undo entry.
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop_back()
    }

    /// Take the most recent redo entry.
    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// Push onto the undo stack without touching redo (used by redo).
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    /// Push onto the redo stack (used by undo).
    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// Whether there is anything to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether there is anything to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undo steps held.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of redo steps held.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Configured depth.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NewMessage;
    use serde_json::json;

    fn sample() -> Sequence {
        let mut seq = Sequence::new("sample", "rrc_demo", None);
        let id = seq.id.clone();
        seq.messages.push(Message::materialize(
            NewMessage::new("A", "UE", "gNB").with_data(json!({"x": 1})),
            &id,
        ));
        seq
    }

    fn round_trip(op: EditOp) {
        let original = sample();
        let mut seq = original.clone();
        let inverse = op.apply(&mut seq).unwrap();
        assert_ne!(seq, original);
        let after = seq.clone();
        let forward = inverse.apply(&mut seq).unwrap();
        assert_eq!(seq, original);
        forward.apply(&mut seq).unwrap();
        assert_eq!(seq, after);
    }

    #[test]
    fn every_op_inverts() {
        let seq = sample();
        let id = seq.messages[0].id.clone();
        let extra = Message::materialize(NewMessage::new("B", "gNB", "UE"), &seq.id);
        round_trip(EditOp::InsertMessage { index: 99, message: extra });
        round_trip(EditOp::RemoveMessage { id: id.clone() });
        round_trip(EditOp::UpdateMessage { id, data: json!({"x": 2}) });
        round_trip(EditOp::Rename { name: "renamed".into() });
        round_trip(EditOp::Replace {
            sequence: Box::new(Sequence::new("other", "nas", Some("s".into()))),
        });
        round_trip(EditOp::SetConfiguration {
            name: "cellIdentity".into(),
            entry: Some(TrackedConfiguration::new("cellIdentity")),
        });
    }

    #[test]
    fn missing_target_leaves_sequence_untouched() {
        let original = sample();
        let mut seq = original.clone();
        let err = EditOp::RemoveMessage { id: "nope".into() }.apply(&mut seq).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(seq, original);
    }

    #[test]
    fn depth_bounds_undo_and_record_clears_redo() {
        let mut history = CommandHistory::new(2);
        let entry = |n: &str| HistoryEntry {
            op: EditOp::Rename { name: n.into() },
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        history.record(entry("a"));
        history.record(entry("b"));
        history.record(entry("c"));
        assert_eq!(history.undo_len(), 2);

        let top = history.pop_undo().unwrap();
        history.push_redo(top);
        assert!(history.can_redo());
        history.record(entry("d"));
        assert!(!history.can_redo());

        assert_eq!(CommandHistory::new(0).depth(), 1);
        assert!(CommandHistory::default().pop_undo().is_none());
    }
}

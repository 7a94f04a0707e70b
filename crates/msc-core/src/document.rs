// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The sequence editor: one active document, immutable snapshots, undo/redo.
//!
//! Every mutation clones the active snapshot, applies an [`EditOp`], records
//! the returned inverse in the [`CommandHistory`] and only then installs the
//! new snapshot. Readers holding an older `Arc<Sequence>` keep seeing the old
//! state. A monotonically increasing version is bumped on every install and
//! can key caches such as [`crate::ActorStateCache`].

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::error::SequenceError;
use crate::history::{CommandHistory, EditOp, HistoryEntry, DEFAULT_HISTORY_DEPTH};
use crate::ident::{MessageId, SequenceId};
use crate::model::{Message, NewMessage, Sequence};
use crate::validate::{validate_sequence, Violation};
use crate::{snapshot, tracker};

#[derive(Debug)]
struct Document {
    snapshot: Arc<Sequence>,
    history: CommandHistory,
}

/// Owns the active sequence and its history.
///
/// History is scoped to one sequence: [`SequenceEditor::create`],
/// [`SequenceEditor::open`] and [`SequenceEditor::close`] reset it.
#[derive(Debug)]
pub struct SequenceEditor {
    active: Option<Document>,
    depth: usize,
    version: u64,
}

impl Default for SequenceEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceEditor {
    /// Editor with the default history depth.
    pub fn new() -> Self {
        Self::with_history_depth(DEFAULT_HISTORY_DEPTH)
    }

    /// Editor keeping at most `depth` undo steps.
    pub fn with_history_depth(depth: usize) -> Self {
        Self {
            active: None,
            depth,
            version: 0,
        }
    }

    /// Create an empty sequence and make it active.
    #[instrument(skip(self, session_id))]
    pub fn create(&mut self, name: &str, protocol: &str, session_id: Option<String>) -> Arc<Sequence> {
        let sequence = Sequence::new(name, protocol, session_id);
        debug!(id = %sequence.id, "created sequence");
        self.open(sequence)
    }

    /// Make `sequence` the active document, discarding the previous history.
    pub fn open(&mut self, sequence: Sequence) -> Arc<Sequence> {
        let snapshot = Arc::new(sequence);
        self.active = Some(Document {
            snapshot: Arc::clone(&snapshot),
            history: CommandHistory::new(self.depth),
        });
        self.version += 1;
        snapshot
    }

    /// Close the active document and return its last snapshot.
    pub fn close(&mut self) -> Option<Arc<Sequence>> {
        self.version += 1;
        self.active.take().map(|doc| doc.snapshot)
    }

    /// The active snapshot, if any.
    pub fn current(&self) -> Option<&Arc<Sequence>> {
        self.active.as_ref().map(|doc| &doc.snapshot)
    }

    /// Snapshot of `seq_id`, or `NotFound` when it is not the active document.
    pub fn get(&self, seq_id: &SequenceId) -> Result<Arc<Sequence>, SequenceError> {
        self.active
            .as_ref()
            .filter(|doc| &doc.snapshot.id == seq_id)
            .map(|doc| Arc::clone(&doc.snapshot))
            .ok_or_else(|| SequenceError::sequence(seq_id.as_str()))
    }

    /// Counter bumped whenever the active snapshot changes.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Whether [`SequenceEditor::undo`] would do anything.
    pub fn can_undo(&self) -> bool {
        self.active.as_ref().is_some_and(|doc| doc.history.can_undo())
    }

    /// Whether [`SequenceEditor::redo`] would do anything.
    pub fn can_redo(&self) -> bool {
        self.active.as_ref().is_some_and(|doc| doc.history.can_redo())
    }

    /// Append a message. Missing id and timestamp are filled in; colliding
    /// actors produce an attached warning.
    #[instrument(skip(self, message), fields(seq = %seq_id, type_name = %message.type_name))]
    pub fn add_message(
        &mut self,
        seq_id: &SequenceId,
        message: NewMessage,
    ) -> Result<Message, SequenceError> {
        self.insert_message(seq_id, usize::MAX, message)
    }

    /// Insert a message at `index`, clamped to the message count.
    pub fn insert_message(
        &mut self,
        seq_id: &SequenceId,
        index: usize,
        message: NewMessage,
    ) -> Result<Message, SequenceError> {
        let snapshot = self.get(seq_id)?;
        let message = materialize_unique(message, &snapshot);
        self.commit(
            seq_id,
            EditOp::InsertMessage {
                index,
                message: message.clone(),
            },
        )?;
        Ok(message)
    }

    /// Replace the body of a message.
    #[instrument(skip(self, data), fields(seq = %seq_id, message = %message_id))]
    pub fn update_message(
        &mut self,
        seq_id: &SequenceId,
        message_id: &MessageId,
        data: Value,
    ) -> Result<Arc<Sequence>, SequenceError> {
        self.commit(
            seq_id,
            EditOp::UpdateMessage {
                id: message_id.clone(),
                data,
            },
        )
    }

    /// Remove a message and return it.
    #[instrument(skip(self), fields(seq = %seq_id, message = %message_id))]
    pub fn remove_message(
        &mut self,
        seq_id: &SequenceId,
        message_id: &MessageId,
    ) -> Result<Message, SequenceError> {
        let removed = self
            .get(seq_id)?
            .message(message_id)
            .cloned()
            .ok_or_else(|| SequenceError::message(message_id.as_str()))?;
        self.commit(
            seq_id,
            EditOp::RemoveMessage {
                id: message_id.clone(),
            },
        )?;
        Ok(removed)
    }

    /// Change the display name.
    pub fn rename(&mut self, seq_id: &SequenceId, name: &str) -> Result<Arc<Sequence>, SequenceError> {
        self.commit(seq_id, EditOp::Rename { name: name.to_owned() })
    }

    /// Swap in `replacement` wholesale. The active id, session and creation
    /// time are kept so the document keeps its identity.
    pub fn replace(
        &mut self,
        seq_id: &SequenceId,
        mut replacement: Sequence,
    ) -> Result<Arc<Sequence>, SequenceError> {
        let current = self.get(seq_id)?;
        replacement.id = current.id.clone();
        replacement.session_id.clone_from(&current.session_id);
        replacement.created_at = current.created_at;
        self.commit(
            seq_id,
            EditOp::Replace {
                sequence: Box::new(replacement),
            },
        )
    }

    /// Record a configuration value at a message index.
    pub fn track_value(
        &mut self,
        seq_id: &SequenceId,
        name: &str,
        index: usize,
        value: Value,
    ) -> Result<Arc<Sequence>, SequenceError> {
        let mut configs = self.get(seq_id)?.configurations.clone();
        tracker::track_value(&mut configs, name, index, value);
        let entry = configs.remove(name);
        self.commit(
            seq_id,
            EditOp::SetConfiguration {
                name: name.to_owned(),
                entry,
            },
        )
    }

    /// Remove the configuration value recorded at a message index.
    pub fn untrack_value(
        &mut self,
        seq_id: &SequenceId,
        name: &str,
        index: usize,
    ) -> Result<Arc<Sequence>, SequenceError> {
        let mut configs = self.get(seq_id)?.configurations.clone();
        if tracker::untrack_value(&mut configs, name, index).is_none() {
            return Err(SequenceError::configuration(format!("{name}@{index}")));
        }
        let entry = configs.remove(name);
        self.commit(
            seq_id,
            EditOp::SetConfiguration {
                name: name.to_owned(),
                entry,
            },
        )
    }

    /// Store validation results on the active snapshot. Not recorded in history.
    pub fn set_validation_results(
        &mut self,
        seq_id: &SequenceId,
        results: Vec<Violation>,
    ) -> Result<Arc<Sequence>, SequenceError> {
        let mut next = (*self.get(seq_id)?).clone();
        next.validation_results = results;
        Ok(self.install(next))
    }

    /// Validate the active sequence and store the results on it.
    pub fn validate(&mut self, seq_id: &SequenceId) -> Result<Vec<Violation>, SequenceError> {
        let results = validate_sequence(&*self.get(seq_id)?);
        self.set_validation_results(seq_id, results.clone())?;
        Ok(results)
    }

    /// Revert the most recent edit. `Ok(None)` when there is nothing to undo.
    #[instrument(skip(self))]
    pub fn undo(&mut self) -> Result<Option<Arc<Sequence>>, SequenceError> {
        self.step(Direction::Undo)
    }

    /// Re-apply the most recently undone edit. `Ok(None)` when there is
    /// nothing to redo.
    #[instrument(skip(self))]
    pub fn redo(&mut self) -> Result<Option<Arc<Sequence>>, SequenceError> {
        self.step(Direction::Redo)
    }

    /// Pretty JSON snapshot of the sequence.
    pub fn export(&self, seq_id: &SequenceId) -> Result<String, SequenceError> {
        snapshot::export_sequence(&*self.get(seq_id)?)
    }

    /// Import a JSON snapshot.
    ///
    /// Messages go through the add-message path (ids and timestamps filled in,
    /// warnings recomputed). With an active document the import is an undoable
    /// replace of it; otherwise the imported sequence is opened. On
    /// [`SequenceError::MalformedImport`] nothing changes.
    #[instrument(skip(self, json), fields(bytes = json.len()))]
    pub fn import(&mut self, json: &str) -> Result<Arc<Sequence>, SequenceError> {
        let mut imported = snapshot::parse_snapshot(json)?;
        let messages = std::mem::take(&mut imported.messages);
        for message in messages {
            let message = materialize_unique(NewMessage::from(message), &imported);
            imported.messages.push(message);
        }
        debug!(messages = imported.messages.len(), "parsed import");
        match self.current().map(|s| s.id.clone()) {
            Some(active) => self.replace(&active, imported),
            None => Ok(self.open(imported)),
        }
    }

    fn commit(&mut self, seq_id: &SequenceId, op: EditOp) -> Result<Arc<Sequence>, SequenceError> {
        let doc = self
            .active
            .as_mut()
            .filter(|doc| &doc.snapshot.id == seq_id)
            .ok_or_else(|| SequenceError::sequence(seq_id.as_str()))?;
        let label = op.label();
        let mut next = (*doc.snapshot).clone();
        let before = next.updated_at;
        let inverse = op.apply(&mut next)?;
        next.updated_at = OffsetDateTime::now_utc().max(next.created_at);
        doc.history.record(HistoryEntry {
            op: inverse,
            updated_at: before,
        });
        debug!(op = label, undo = doc.history.undo_len(), "committed edit");
        Ok(self.install(next))
    }

    fn step(&mut self, direction: Direction) -> Result<Option<Arc<Sequence>>, SequenceError> {
        let Some(doc) = self.active.as_mut() else {
            return Ok(None);
        };
        let entry = match direction {
            Direction::Undo => doc.history.pop_undo(),
            Direction::Redo => doc.history.pop_redo(),
        };
        let Some(entry) = entry else {
            debug!(?direction, "history empty");
            return Ok(None);
        };
        let mut next = (*doc.snapshot).clone();
        let current_updated = next.updated_at;
        let label = entry.op.label();
        let forward = entry.op.apply(&mut next).inspect_err(|err| {
            warn!(op = label, ?direction, %err, "history entry no longer applies; dropped");
        })?;
        next.updated_at = entry.updated_at;
        let reverse = HistoryEntry {
            op: forward,
            updated_at: current_updated,
        };
        match direction {
            Direction::Undo => doc.history.push_redo(reverse),
            Direction::Redo => doc.history.push_undo(reverse),
        }
        Ok(Some(self.install(next)))
    }

    fn install(&mut self, next: Sequence) -> Arc<Sequence> {
        let snapshot = Arc::new(next);
        if let Some(doc) = self.active.as_mut() {
            doc.snapshot = Arc::clone(&snapshot);
        }
        self.version += 1;
        snapshot
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

/// Materialize `message` for `sequence`, minting a fresh id when the caller's
/// id is already taken.
fn materialize_unique(mut message: NewMessage, sequence: &Sequence) -> Message {
    if let Some(id) = &message.id {
        if sequence.position(id).is_some() {
            warn!(%id, "duplicate message id; minting a fresh one");
            message.id = None;
        }
    }
    Message::materialize(message, &sequence.id)
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The editor session: one open document plus its collaborators.
//!
//! Document operations are synchronous and go straight to the
//! [`SequenceEditor`]. Collaborator calls are async, bounded by the configured
//! timeout and cancellable; when one fails the session logs it and answers
//! from local data. A failed call never changes the document or its history.

use std::sync::Arc;
use std::time::Duration;

use msc_app_core::config::{ConfigError, ConfigService, ConfigStore};
use msc_app_core::prefs::{EditorPrefs, EDITOR_PREFS_KEY};
use msc_app_core::recent::{RecentKey, RecentValues};
use msc_core::payload::for_each_leaf;
use msc_core::{
    detect_identifiers, suggest, ActorState, ActorStateCache, ListFilter, Message, MessageId,
    NewMessage, Sequence, SequenceEditor, SequenceError, SequenceId, Suggestion, TypeNode,
    Violation, ROLE_GNB, ROLE_UE,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cancel::{guarded, Canceller};
use crate::error::{ServiceError, SessionError};
use crate::ports::{
    IdentifierService, PersistenceService, SchemaService, SuggestionQuery, SuggestionService,
};

/// Async facade over one [`SequenceEditor`].
///
/// `C` stores config blobs, `P` persists sequences and `X` provides the
/// remote schema, suggestion and identifier services.
pub struct EditorSession<C, P, X> {
    config: ConfigService<C>,
    prefs: EditorPrefs,
    recent: RecentValues,
    editor: SequenceEditor,
    states: ActorStateCache,
    persistence: P,
    remote: X,
    canceller: Canceller,
    session_id: Option<String>,
}

impl<C, P, X> EditorSession<C, P, X>
where
    C: ConfigStore,
{
    /// Start a session. Preferences and recent values are loaded from
    /// `config`; unreadable blobs fall back to defaults.
    pub fn new(config: ConfigService<C>, persistence: P, remote: X) -> Self {
        let prefs: EditorPrefs = config.load_or_default(EDITOR_PREFS_KEY);
        let recent = RecentValues::load(&config);
        info!(
            history_depth = prefs.history_depth,
            timeout_ms = prefs.services.timeout_ms,
            recent = recent.len(),
            "editor session started"
        );
        Self {
            editor: SequenceEditor::with_history_depth(prefs.history_depth),
            config,
            prefs,
            recent,
            states: ActorStateCache::new(),
            persistence,
            remote,
            canceller: Canceller::new(),
            session_id: None,
        }
    }

    /// Scope new sequences and listings to `session_id`.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    /// Loaded preferences.
    pub const fn prefs(&self) -> &EditorPrefs {
        &self.prefs
    }

    /// Replace and persist preferences. The history depth applies to the next
    /// document opened.
    pub fn set_prefs(&mut self, prefs: EditorPrefs) -> Result<(), ConfigError> {
        self.config.save(EDITOR_PREFS_KEY, &prefs)?;
        self.prefs = prefs;
        Ok(())
    }

    /// Underlying editor, read-only.
    pub const fn editor(&self) -> &SequenceEditor {
        &self.editor
    }

    /// The open sequence, if any.
    pub fn current(&self) -> Option<&Arc<Sequence>> {
        self.editor.current()
    }

    /// Handle that cancels in-flight collaborator calls.
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Session scope, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.prefs.services.timeout_ms)
    }

    // ─── Recent values ───────────────────────────────────────────────────────

    /// Last value used for a field.
    pub fn recent_value(&self, key: &RecentKey) -> Option<&Value> {
        self.recent.get(key)
    }

    /// Persist recent values if they changed.
    pub fn flush_recent(&mut self) -> Result<(), ConfigError> {
        self.recent.flush(&self.config)
    }

    fn remember(&mut self, protocol: &str, message: &Message) {
        let recent = &mut self.recent;
        for_each_leaf(&message.data, |path, _key, value| {
            recent.record(&RecentKey::new(protocol, &message.type_name, path), value.clone());
        });
    }

    // ─── Document operations ─────────────────────────────────────────────────

    /// Message of `type_name` between the preferred default actors.
    pub fn new_message(&self, type_name: &str) -> NewMessage {
        let mut actors = self.prefs.default_actors.iter().map(String::as_str);
        let source = actors.next().unwrap_or(ROLE_UE);
        let target = actors.next().unwrap_or(ROLE_GNB);
        NewMessage::new(type_name, source, target)
    }

    /// Create and open a sequence. `protocol` defaults to the preferred one.
    #[instrument(skip(self))]
    pub fn create_sequence(&mut self, name: &str, protocol: Option<&str>) -> Arc<Sequence> {
        let protocol = protocol.unwrap_or(&self.prefs.default_protocol).to_owned();
        self.editor.create(name, &protocol, self.session_id.clone())
    }

    /// Append a message and remember its field values.
    pub fn add_message(&mut self, seq_id: &SequenceId, message: NewMessage) -> Result<Message, SequenceError> {
        let added = self.editor.add_message(seq_id, message)?;
        let protocol = self.editor.get(seq_id)?.protocol.clone();
        self.remember(&protocol, &added);
        Ok(added)
    }

    /// Replace a message body and remember its field values.
    pub fn update_message(
        &mut self,
        seq_id: &SequenceId,
        message_id: &MessageId,
        data: Value,
    ) -> Result<Arc<Sequence>, SequenceError> {
        let updated = self.editor.update_message(seq_id, message_id, data)?;
        if let Some(message) = updated.message(message_id) {
            self.remember(&updated.protocol, message);
        }
        Ok(updated)
    }

    /// Remove a message.
    pub fn remove_message(&mut self, seq_id: &SequenceId, message_id: &MessageId) -> Result<Message, SequenceError> {
        self.editor.remove_message(seq_id, message_id)
    }

    /// Rename the sequence.
    pub fn rename(&mut self, seq_id: &SequenceId, name: &str) -> Result<Arc<Sequence>, SequenceError> {
        self.editor.rename(seq_id, name)
    }

    /// Record a configuration value at a message index.
    pub fn track_value(
        &mut self,
        seq_id: &SequenceId,
        name: &str,
        index: usize,
        value: Value,
    ) -> Result<Arc<Sequence>, SequenceError> {
        self.editor.track_value(seq_id, name, index, value)
    }

    /// Undo the last edit.
    pub fn undo(&mut self) -> Result<Option<Arc<Sequence>>, SequenceError> {
        self.editor.undo()
    }

    /// Redo the last undone edit.
    pub fn redo(&mut self) -> Result<Option<Arc<Sequence>>, SequenceError> {
        self.editor.redo()
    }

    /// JSON snapshot of the sequence.
    pub fn export(&self, seq_id: &SequenceId) -> Result<String, SequenceError> {
        self.editor.export(seq_id)
    }

    /// Import a JSON snapshot into the open document (or open it).
    pub fn import(&mut self, json: &str) -> Result<Arc<Sequence>, SequenceError> {
        self.editor.import(json)
    }

    /// Validate and store the results on the sequence.
    pub fn validate(&mut self, seq_id: &SequenceId) -> Result<Vec<Violation>, SequenceError> {
        self.editor.validate(seq_id)
    }

    /// Actor states at `as_of`, memoized until the document changes.
    pub fn actor_states(
        &mut self,
        seq_id: &SequenceId,
        as_of: Option<usize>,
    ) -> Result<Arc<Vec<ActorState>>, SequenceError> {
        let snapshot = self.editor.get(seq_id)?;
        Ok(self
            .states
            .get_or_compute(self.editor.version(), &snapshot, as_of))
    }
}

impl<C, P, X> EditorSession<C, P, X>
where
    C: ConfigStore,
    X: SchemaService + SuggestionService + IdentifierService,
{
    /// Type definition from the schema service. No local fallback.
    pub async fn schema(&self, protocol: &str, type_name: &str) -> Result<TypeNode, ServiceError> {
        guarded(
            "schema",
            self.timeout(),
            &self.canceller,
            self.remote.type_definition(protocol, type_name),
        )
        .await
    }

    /// Suggestions for a field of message `message_index`.
    ///
    /// Asks the suggestion service first and falls back to values recorded in
    /// the sequence's own configurations.
    #[instrument(skip(self))]
    pub async fn suggestions(
        &self,
        seq_id: &SequenceId,
        message_index: usize,
        field_name: &str,
        type_name: &str,
    ) -> Result<Vec<Suggestion>, SequenceError> {
        let snapshot = self.editor.get(seq_id)?;
        let query = SuggestionQuery {
            sequence_id: seq_id.clone(),
            message_index,
            field_name: field_name.to_owned(),
            protocol: snapshot.protocol.clone(),
            type_name: type_name.to_owned(),
        };
        let remote = guarded(
            "suggestions",
            self.timeout(),
            &self.canceller,
            self.remote.suggestions(&query),
        )
        .await;
        Ok(match remote {
            Ok(list) => list,
            Err(err) => {
                warn!(%err, "suggestion service failed; using local values");
                suggest(&snapshot.configurations, field_name, message_index)
            }
        })
    }

    /// Identifier-like fields of a message type.
    ///
    /// Asks the identifier service, then detects them locally from the
    /// schema. Empty when both are unreachable.
    #[instrument(skip(self))]
    pub async fn identifiers(&self, protocol: &str, type_name: &str) -> Vec<String> {
        let remote = guarded(
            "identifiers",
            self.timeout(),
            &self.canceller,
            self.remote.identifiers(protocol, type_name),
        )
        .await;
        match remote {
            Ok(names) => return names,
            Err(err) => warn!(%err, "identifier service failed; detecting from schema"),
        }
        match self.schema(protocol, type_name).await {
            Ok(tree) => detect_identifiers(&tree),
            Err(err) => {
                warn!(%err, "schema unavailable; no identifiers");
                Vec::new()
            }
        }
    }
}

impl<C, P, X> EditorSession<C, P, X>
where
    C: ConfigStore,
    P: PersistenceService,
{
    /// Persist the sequence as it is now.
    #[instrument(skip(self))]
    pub async fn save(&self, seq_id: &SequenceId) -> Result<(), SessionError> {
        let snapshot = self.editor.get(seq_id)?;
        guarded(
            "save",
            self.timeout(),
            &self.canceller,
            self.persistence.save(&snapshot),
        )
        .await
        .inspect_err(|err| warn!(%err, "save failed; document unchanged"))?;
        debug!(messages = snapshot.len(), "saved");
        Ok(())
    }

    /// Load a stored sequence and make it the open document.
    #[instrument(skip(self))]
    pub async fn open(&mut self, id: &SequenceId) -> Result<Arc<Sequence>, SessionError> {
        let loaded = guarded("open", self.timeout(), &self.canceller, self.persistence.get(id))
            .await?
            .ok_or_else(|| SequenceError::sequence(id.as_str()))?;
        Ok(self.editor.open(loaded))
    }

    /// Stored sequences in this session (all sessions when unscoped).
    pub async fn list(&self, protocol: Option<&str>) -> Result<Vec<Sequence>, SessionError> {
        let filter = ListFilter {
            protocol: protocol.map(str::to_owned),
            session_id: self.session_id.clone(),
        };
        Ok(guarded("list", self.timeout(), &self.canceller, self.persistence.list(&filter)).await?)
    }

    /// Delete a stored sequence. The open document, if it is the same one,
    /// stays open and editable.
    pub async fn delete(&self, id: &SequenceId) -> Result<bool, SessionError> {
        Ok(guarded("delete", self.timeout(), &self.canceller, self.persistence.delete(id)).await?)
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sequence, message and tracked-configuration types.
//!
//! JSON uses camelCase field names. The snake_case spellings written by older
//! exports (`type_name`, `source_actor`, `tracked_identifiers`, ...) are
//! accepted on input.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::actors::{ROLE_GNB, ROLE_UE};
use crate::ident::{ActorName, MessageId, SequenceId};
use crate::validate::{Severity, Violation, ViolationCode};

/// One protocol message in a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique id within the sequence.
    pub id: MessageId,
    /// Protocol type name (`RRCSetupRequest`, ...).
    #[serde(alias = "type_name")]
    pub type_name: String,
    /// Message body: a JSON tree of objects, arrays, tuples and primitives.
    #[serde(default = "empty_object")]
    pub data: Value,
    /// Sending actor.
    #[serde(alias = "source_actor")]
    pub source_actor: ActorName,
    /// Receiving actor.
    #[serde(alias = "target_actor")]
    pub target_actor: ActorName,
    /// Creation time, seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: f64,
    /// Issues attached when the message entered the sequence.
    #[serde(
        default,
        alias = "validation_errors",
        alias = "validationErrors",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub warnings: Vec<Violation>,
}

impl Message {
    /// Returns `true` when no attached issue is an error.
    pub fn is_valid(&self) -> bool {
        !self.warnings.iter().any(|w| w.severity == Severity::Error)
    }

    /// The add-message path: assign an id and timestamp when absent and attach
    /// an actor-collision warning when source and target coincide.
    pub(crate) fn materialize(new: NewMessage, sequence: &SequenceId) -> Self {
        let mut warnings = Vec::new();
        if new.source_actor == new.target_actor {
            warnings.push(
                Violation::new(
                    Severity::Warn,
                    ViolationCode::SameActors,
                    format!(
                        "source and target actor are both '{}'; this may be a self-message",
                        new.source_actor
                    ),
                )
                .with_field("actors"),
            );
        }
        Self {
            id: new.id.unwrap_or_else(|| MessageId::fresh(sequence)),
            type_name: new.type_name,
            data: new.data,
            source_actor: new.source_actor,
            target_actor: new.target_actor,
            timestamp: new.timestamp.unwrap_or_else(unix_now),
            warnings,
        }
    }
}

/// A message as supplied by a caller: id and timestamp are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Keep this id instead of minting one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Protocol type name.
    #[serde(alias = "type_name")]
    pub type_name: String,
    /// Message body.
    #[serde(default = "empty_object")]
    pub data: Value,
    /// Sending actor; defaults to `UE`.
    #[serde(default = "default_source", alias = "source_actor")]
    pub source_actor: ActorName,
    /// Receiving actor; defaults to `gNB`.
    #[serde(default = "default_target", alias = "target_actor")]
    pub target_actor: ActorName,
    /// Keep this timestamp instead of stamping "now".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl NewMessage {
    /// A message of `type_name` from `source` to `target` with an empty body.
    pub fn new(
        type_name: impl Into<String>,
        source: impl Into<ActorName>,
        target: impl Into<ActorName>,
    ) -> Self {
        Self {
            id: None,
            type_name: type_name.into(),
            data: empty_object(),
            source_actor: source.into(),
            target_actor: target.into(),
            timestamp: None,
        }
    }

    /// Replace the body.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Pin the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Pin the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<Message> for NewMessage {
    fn from(message: Message) -> Self {
        Self {
            id: Some(message.id),
            type_name: message.type_name,
            data: message.data,
            source_actor: message.source_actor,
            target_actor: message.target_actor,
            timestamp: Some(message.timestamp),
        }
    }
}

/// A configuration value tracked across messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedConfiguration {
    /// Configuration name; also its key in [`Configurations`].
    pub name: String,
    /// Sparse map from message index to the value recorded there.
    pub values: BTreeMap<usize, Value>,
    /// Whether every recorded value is equal.
    pub is_consistent: bool,
    /// Human-readable conflict descriptions.
    pub conflicts: Vec<String>,
}

impl TrackedConfiguration {
    /// An empty, consistent configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            is_consistent: true,
            conflicts: Vec::new(),
        }
    }
}

/// The sequence's tracked configurations, keyed by name.
///
/// Input may be either a mapping keyed by name or a list of entries; both are
/// normalized into this one mapping when deserialized (see
/// [`crate::tracker::normalize_configurations`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Configurations(BTreeMap<String, TrackedConfiguration>);

impl Configurations {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up by name.
    pub fn get(&self, name: &str) -> Option<&TrackedConfiguration> {
        self.0.get(name)
    }

    /// Iterate in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TrackedConfiguration)> {
        self.0.iter()
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert or replace an entry under `name`, returning the previous entry.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        entry: TrackedConfiguration,
    ) -> Option<TrackedConfiguration> {
        self.0.insert(name.into(), entry)
    }

    /// Remove and return the entry under `name`.
    pub fn remove(&mut self, name: &str) -> Option<TrackedConfiguration> {
        self.0.remove(name)
    }
}

impl FromIterator<(String, TrackedConfiguration)> for Configurations {
    fn from_iter<I: IntoIterator<Item = (String, TrackedConfiguration)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Configurations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.map_or_else(Self::default, |raw| {
            crate::tracker::normalize_configurations(&raw)
        }))
    }
}

/// An ordered message log plus metadata. The unit of editing and undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    /// Sequence id.
    pub id: SequenceId,
    /// Display name.
    pub name: String,
    /// Protocol the messages belong to.
    pub protocol: String,
    /// Owning session, if any.
    #[serde(default, alias = "session_id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Messages in timeline order; the index is the as-of coordinate.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Declared tracked configurations.
    #[serde(default, alias = "tracked_identifiers", alias = "trackedIdentifiers")]
    pub configurations: Configurations,
    /// Results of the last validation run.
    #[serde(default, alias = "validation_results")]
    pub validation_results: Vec<Violation>,
    /// Creation time.
    #[serde(with = "timefmt", default = "OffsetDateTime::now_utc", alias = "created_at")]
    pub created_at: OffsetDateTime,
    /// Time of the last committed edit.
    #[serde(with = "timefmt", default = "OffsetDateTime::now_utc", alias = "updated_at")]
    pub updated_at: OffsetDateTime,
}

impl Sequence {
    /// A new, empty sequence. An empty `name` becomes `Sequence <id8>`.
    pub fn new(name: impl Into<String>, protocol: impl Into<String>, session_id: Option<String>) -> Self {
        let name = name.into();
        let id = SequenceId::fresh(&name);
        let name = if name.trim().is_empty() {
            format!("Sequence {}", id.short())
        } else {
            name
        };
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            name,
            protocol: protocol.into(),
            session_id,
            messages: Vec::new(),
            configurations: Configurations::new(),
            validation_results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Index of the message with `id`.
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    /// The message with `id`.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` when there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_source() -> ActorName {
    ActorName::from(ROLE_UE)
}

fn default_target() -> ActorName {
    ActorName::from(ROLE_GNB)
}

pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// RFC 3339 on output; RFC 3339 or an offset-less ISO 8601 timestamp (read
/// as UTC) on input.
mod timefmt {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub(super) fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        if let Ok(parsed) = OffsetDateTime::parse(&text, &Rfc3339) {
            return Ok(parsed);
        }
        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(&text, naive)
            .map(PrimitiveDateTime::assume_utc)
            .map_err(|err| de::Error::custom(format!("bad timestamp '{text}': {err}")))
    }
}

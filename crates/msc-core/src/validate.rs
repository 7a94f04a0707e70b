// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sequence-level consistency checks.
//!
//! [`validate_sequence`] never mutates its input and never fails; it returns
//! structured [`Violation`] records. Checks are grouped as:
//!
//! - **Metadata**: empty sequence, timestamps out of order.
//! - **Per message**: missing type name, unknown or colliding actors,
//!   negative timestamps, RRC messages sent by an unusual role.
//! - **Configurations**: one error per recorded conflict text.
//! - **Flow**: duplicate consecutive messages, one-sided UE/gNB traffic,
//!   and for RRC protocols a missing connection start and invalid state
//!   transitions (see [`crate::rrc`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actors::{is_known_role, ROLE_GNB, ROLE_UE};
use crate::model::{Message, Sequence};
use crate::rrc;

/// Share of one direction above which traffic is reported as unbalanced.
const UNBALANCED_RATIO: f64 = 0.8;

const CONNECTION_START: [&str; 2] = ["RRCConnectionRequest", "RRCReestablishmentRequest"];

/// How serious a [`Violation`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Notable, not a problem.
    Info,
    /// Likely a mistake; nothing is blocked.
    #[serde(rename = "warning", alias = "warn")]
    Warn,
    /// The sequence is inconsistent.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Stable classification of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    // ─── Metadata ────────────────────────────────────────────────────────────
    /// The sequence has no messages.
    EmptySequence,
    /// `updatedAt` precedes `createdAt`, or a message timestamp is negative.
    InvalidTimestamp,

    // ─── Messages ────────────────────────────────────────────────────────────
    /// A message has an empty type name.
    MissingTypeName,
    /// An actor outside the known roles.
    UnknownActor,
    /// Source and target actor are the same.
    SameActors,
    /// An RRC message sent by a role that does not normally send it.
    UnexpectedSource,

    // ─── Configurations ──────────────────────────────────────────────────────
    /// A tracked configuration holds disagreeing values.
    IdentifierConflict,

    // ─── Flow ────────────────────────────────────────────────────────────────
    /// Two consecutive messages of the same type from the same actor.
    DuplicateConsecutiveMessages,
    /// Traffic between UE and gNB is overwhelmingly one-directional.
    UnbalancedCommunication,
    /// An RRC sequence without a connection request.
    MissingConnectionStart,
    /// A message that the RRC state machine does not accept in its state.
    InvalidStateTransition,

    /// A code written by another tool.
    #[serde(other)]
    Other,
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EmptySequence => "EMPTY_SEQUENCE",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::MissingTypeName => "MISSING_TYPE_NAME",
            Self::UnknownActor => "UNKNOWN_ACTOR",
            Self::SameActors => "SAME_ACTORS",
            Self::UnexpectedSource => "UNEXPECTED_SOURCE",
            Self::IdentifierConflict => "IDENTIFIER_CONFLICT",
            Self::DuplicateConsecutiveMessages => "DUPLICATE_CONSECUTIVE_MESSAGES",
            Self::UnbalancedCommunication => "UNBALANCED_COMMUNICATION",
            Self::MissingConnectionStart => "MISSING_CONNECTION_START",
            Self::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// One finding from validation, or a warning attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Severity level.
    #[serde(alias = "type")]
    pub severity: Severity,
    /// Classification code.
    #[serde(default = "other_code")]
    pub code: ViolationCode,
    /// Human-readable description.
    pub message: String,
    /// Field involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Message index involved, if any.
    #[serde(default, alias = "message_index", skip_serializing_if = "Option::is_none")]
    pub message_index: Option<usize>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(severity: Severity, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            field: None,
            message_index: None,
        }
    }

    /// Attaches a field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attaches a message index.
    #[must_use]
    pub fn with_message_index(mut self, index: usize) -> Self {
        self.message_index = Some(index);
        self
    }

    /// Returns `true` for [`Severity::Error`].
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(index) = self.message_index {
            write!(f, " (message {index})")?;
        }
        Ok(())
    }
}

const fn other_code() -> ViolationCode {
    ViolationCode::Other
}

/// Whether `protocol` is handled by the RRC-specific rules.
pub fn is_rrc_protocol(protocol: &str) -> bool {
    protocol.starts_with("rrc")
}

/// Run every check against `sequence`.
pub fn validate_sequence(sequence: &Sequence) -> Vec<Violation> {
    let mut out = Vec::new();
    check_metadata(sequence, &mut out);
    for (index, message) in sequence.messages.iter().enumerate() {
        out.extend(validate_message(message, index));
    }
    check_configurations(sequence, &mut out);
    check_flow(sequence, &mut out);
    if is_rrc_protocol(&sequence.protocol) {
        check_rrc(sequence, &mut out);
    }
    tracing::debug!(
        sequence = %sequence.id,
        findings = out.len(),
        "validated sequence"
    );
    out
}

/// Checks that only need the message and its position.
pub fn validate_message(message: &Message, index: usize) -> Vec<Violation> {
    let mut out = Vec::new();
    if message.type_name.trim().is_empty() {
        out.push(
            Violation::new(
                Severity::Error,
                ViolationCode::MissingTypeName,
                "message type name is required",
            )
            .with_field("typeName"),
        );
    }
    for (field, actor) in [
        ("sourceActor", &message.source_actor),
        ("targetActor", &message.target_actor),
    ] {
        if !is_known_role(actor) {
            out.push(
                Violation::new(
                    Severity::Warn,
                    ViolationCode::UnknownActor,
                    format!("unknown actor '{actor}'"),
                )
                .with_field(field),
            );
        }
    }
    if message.timestamp < 0.0 {
        out.push(
            Violation::new(
                Severity::Error,
                ViolationCode::InvalidTimestamp,
                "message timestamp cannot be negative",
            )
            .with_field("timestamp"),
        );
    }
    if message.source_actor == message.target_actor {
        out.push(
            Violation::new(
                Severity::Warn,
                ViolationCode::SameActors,
                "source and target actors are the same; this may be a self-message",
            )
            .with_field("actors"),
        );
    }
    if let Some(expected) = expected_source(&message.type_name) {
        if message.source_actor != expected {
            out.push(
                Violation::new(
                    Severity::Warn,
                    ViolationCode::UnexpectedSource,
                    format!(
                        "{} is normally sent by {expected}, not {}",
                        message.type_name, message.source_actor
                    ),
                )
                .with_field("sourceActor"),
            );
        }
    }
    for violation in &mut out {
        violation.message_index = Some(index);
    }
    out
}

fn expected_source(type_name: &str) -> Option<&'static str> {
    match type_name {
        "RRCConnectionRequest" | "RRCConnectionSetupComplete" | "MeasurementReport" => {
            Some(ROLE_UE)
        }
        "RRCConnectionSetup" | "RRCReconfiguration" => Some(ROLE_GNB),
        _ => None,
    }
}

fn check_metadata(sequence: &Sequence, out: &mut Vec<Violation>) {
    if sequence.messages.is_empty() {
        out.push(Violation::new(
            Severity::Warn,
            ViolationCode::EmptySequence,
            "sequence is empty; consider adding messages",
        ));
    }
    if sequence.updated_at < sequence.created_at {
        out.push(
            Violation::new(
                Severity::Error,
                ViolationCode::InvalidTimestamp,
                "sequence updatedAt precedes createdAt",
            )
            .with_field("updatedAt"),
        );
    }
}

fn check_configurations(sequence: &Sequence, out: &mut Vec<Violation>) {
    for (name, config) in sequence.configurations.iter() {
        if config.is_consistent {
            continue;
        }
        if config.conflicts.is_empty() {
            out.push(
                Violation::new(
                    Severity::Error,
                    ViolationCode::IdentifierConflict,
                    format!("inconsistent values for '{name}'"),
                )
                .with_field(name.as_str()),
            );
        }
        for conflict in &config.conflicts {
            out.push(
                Violation::new(Severity::Error, ViolationCode::IdentifierConflict, conflict.as_str())
                    .with_field(name.as_str()),
            );
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn check_flow(sequence: &Sequence, out: &mut Vec<Violation>) {
    let messages = &sequence.messages;
    for (index, pair) in messages.windows(2).enumerate() {
        if pair[0].type_name == pair[1].type_name && pair[0].source_actor == pair[1].source_actor {
            out.push(
                Violation::new(
                    Severity::Warn,
                    ViolationCode::DuplicateConsecutiveMessages,
                    format!(
                        "consecutive '{}' messages from {}",
                        pair[1].type_name, pair[1].source_actor
                    ),
                )
                .with_message_index(index + 1),
            );
        }
    }

    if messages.is_empty() {
        return;
    }
    let uplink = messages
        .iter()
        .filter(|m| m.source_actor == ROLE_UE && m.target_actor == ROLE_GNB)
        .count();
    let downlink = messages
        .iter()
        .filter(|m| m.source_actor == ROLE_GNB && m.target_actor == ROLE_UE)
        .count();
    let total = messages.len() as f64;
    if uplink as f64 / total > UNBALANCED_RATIO || downlink as f64 / total > UNBALANCED_RATIO {
        out.push(Violation::new(
            Severity::Warn,
            ViolationCode::UnbalancedCommunication,
            "sequence is unbalanced; UE and gNB traffic normally alternates",
        ));
    }
}

fn check_rrc(sequence: &Sequence, out: &mut Vec<Violation>) {
    let has_start = sequence
        .messages
        .iter()
        .any(|m| CONNECTION_START.contains(&m.type_name.as_str()));
    if !has_start && !sequence.messages.is_empty() {
        out.push(Violation::new(
            Severity::Warn,
            ViolationCode::MissingConnectionStart,
            "RRC sequence has no connection establishment (RRCConnectionRequest or similar)",
        ));
    }
    out.extend(rrc::validate_transitions(sequence));
}

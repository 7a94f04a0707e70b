// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! RRC connection state machine.
//!
//! Replay starts in [`RrcState::Idle`]. Each message type known to the
//! transition table moves the machine to a new state. A known message that
//! has no entry for the current state is an invalid transition: it is
//! reported and the state stays put. Unknown message types leave the state
//! unchanged and are not reported.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Message, Sequence};
use crate::tracker;
use crate::validate::{Severity, Violation, ViolationCode};

/// RRC protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RrcState {
    /// Not connected.
    Idle,
    /// Connection establishment in progress.
    Connecting,
    /// Connection active.
    Connected,
    /// Reconfiguration in progress.
    Reconfiguring,
    /// Measurement reporting in progress.
    Measuring,
    /// Release in progress.
    Releasing,
    /// Released into RRC inactive.
    Inactive,
    /// Suspended.
    Suspended,
}

impl RrcState {
    /// Every state.
    pub const ALL: [Self; 8] = [
        Self::Idle,
        Self::Connecting,
        Self::Connected,
        Self::Reconfiguring,
        Self::Measuring,
        Self::Releasing,
        Self::Inactive,
        Self::Suspended,
    ];

    /// Human-readable description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "UE is not RRC connected",
            Self::Connecting => "RRC connection establishment in progress",
            Self::Connected => "RRC connection active",
            Self::Reconfiguring => "RRC connection reconfiguration in progress",
            Self::Measuring => "UE performing measurements",
            Self::Releasing => "RRC connection release in progress",
            Self::Inactive => "RRC inactive (connection suspended by release)",
            Self::Suspended => "RRC connection suspended",
        }
    }
}

impl fmt::Display for RrcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Reconfiguring => "RECONFIGURING",
            Self::Measuring => "MEASURING",
            Self::Releasing => "RELEASING",
            Self::Inactive => "INACTIVE",
            Self::Suspended => "SUSPENDED",
        };
        write!(f, "{s}")
    }
}

/// Outcome of feeding one message to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The message moved (or kept) the machine in this state.
    Moved(RrcState),
    /// The message type is known but not accepted in the current state.
    Rejected,
    /// The message type is not part of the machine.
    Ignored,
}

/// Bare transition table, without the body-driven refinements.
#[allow(clippy::match_same_arms)]
fn table(state: RrcState, type_name: &str) -> Step {
    use RrcState::{Connected, Connecting, Idle, Inactive, Measuring, Reconfiguring, Releasing, Suspended};
    let next = match (type_name, state) {
        ("RRCConnectionRequest", Idle | Suspended) => Connecting,
        ("RRCConnectionReject", Connecting) => Idle,
        ("RRCConnectionSetup", Connecting) => Connected,
        ("RRCConnectionSetupComplete", Connected | Connecting) => Connected,

        ("RRCReconfiguration", Connected) => Reconfiguring,
        ("RRCReconfigurationComplete" | "RRCConnectionReconfigurationComplete", Reconfiguring) => {
            Connected
        }
        ("RRCConnectionReconfiguration", Connected) => Measuring,
        ("MeasurementReport", Measuring | Connected) => Connected,

        (
            "SecurityModeCommand"
            | "SecurityModeComplete"
            | "SecurityModeFailure"
            | "UECapabilityEnquiry"
            | "UECapabilityInformation"
            | "RRCReestablishmentComplete"
            | "RRCConnectionReestablishmentComplete"
            | "RRCConnectionResumeComplete",
            Connected,
        ) => Connected,

        ("RRCReestablishmentRequest", Connected | Inactive) => Connecting,
        ("RRCReestablishment", Connecting) => Connected,
        ("RRCReestablishmentReject", Connecting) => Idle,

        ("RRCConnectionRelease", Connected | Reconfiguring | Inactive | Releasing) => Inactive,
        ("RRCConnectionReleaseComplete", Releasing) => Idle,
        ("RRCConnectionResumeRequest", Idle | Inactive | Suspended) => Connecting,
        ("RRCConnectionResume", Connecting) => Connected,

        (
            "RRCConnectionRequest"
            | "RRCConnectionReject"
            | "RRCConnectionSetup"
            | "RRCConnectionSetupComplete"
            | "RRCReconfiguration"
            | "RRCReconfigurationComplete"
            | "RRCConnectionReconfigurationComplete"
            | "RRCConnectionReconfiguration"
            | "MeasurementReport"
            | "SecurityModeCommand"
            | "SecurityModeComplete"
            | "SecurityModeFailure"
            | "UECapabilityEnquiry"
            | "UECapabilityInformation"
            | "RRCReestablishmentComplete"
            | "RRCConnectionReestablishmentComplete"
            | "RRCConnectionResumeComplete"
            | "RRCReestablishmentRequest"
            | "RRCReestablishment"
            | "RRCReestablishmentReject"
            | "RRCConnectionRelease"
            | "RRCConnectionReleaseComplete"
            | "RRCConnectionResumeRequest"
            | "RRCConnectionResume",
            _,
        ) => return Step::Rejected,
        _ => return Step::Ignored,
    };
    Step::Moved(next)
}

/// Feed one message to the machine in `state`.
///
/// Message bodies refine two transitions: a release carrying `suspendConfig`
/// suspends instead of going inactive, and a measurement report whose
/// `reportTrigger` is `reconfiguration` or `handover` leads to
/// reconfiguration.
pub fn step(state: RrcState, type_name: &str, data: &Value) -> Step {
    match table(state, type_name) {
        Step::Moved(next) => Step::Moved(refine(next, type_name, data)),
        other => other,
    }
}

fn refine(next: RrcState, type_name: &str, data: &Value) -> RrcState {
    match type_name {
        "RRCConnectionRelease"
            if data.get("suspendConfig").is_some_and(|v| !v.is_null() && v != &Value::Bool(false)) =>
        {
            RrcState::Suspended
        }
        "MeasurementReport"
            if data
                .get("reportTrigger")
                .and_then(Value::as_str)
                .is_some_and(|t| matches!(t.to_lowercase().as_str(), "reconfiguration" | "handover")) =>
        {
            RrcState::Reconfiguring
        }
        _ => next,
    }
}

/// Message types accepted in `state`, sorted.
pub fn allowed_messages(state: RrcState) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = KNOWN_MESSAGES
        .iter()
        .copied()
        .filter(|t| matches!(table(state, t), Step::Moved(_)))
        .collect();
    out.sort_unstable();
    out
}

const KNOWN_MESSAGES: [&str; 24] = [
    "RRCConnectionRequest",
    "RRCConnectionReject",
    "RRCConnectionSetup",
    "RRCConnectionSetupComplete",
    "RRCReconfiguration",
    "RRCReconfigurationComplete",
    "RRCConnectionReconfigurationComplete",
    "RRCConnectionReconfiguration",
    "MeasurementReport",
    "SecurityModeCommand",
    "SecurityModeComplete",
    "SecurityModeFailure",
    "UECapabilityEnquiry",
    "UECapabilityInformation",
    "RRCReestablishmentComplete",
    "RRCConnectionReestablishmentComplete",
    "RRCConnectionResumeComplete",
    "RRCReestablishmentRequest",
    "RRCReestablishment",
    "RRCReestablishmentReject",
    "RRCConnectionRelease",
    "RRCConnectionReleaseComplete",
    "RRCConnectionResumeRequest",
    "RRCConnectionResume",
];

fn replay<'a>(messages: &'a [Message], mut on_reject: impl FnMut(usize, RrcState, &'a Message)) -> RrcState {
    let mut state = RrcState::Idle;
    for (index, message) in messages.iter().enumerate() {
        match step(state, &message.type_name, &message.data) {
            Step::Moved(next) => state = next,
            Step::Rejected => on_reject(index, state, message),
            Step::Ignored => {}
        }
    }
    state
}

/// State after replaying messages `0..=as_of` (`None` = all).
pub fn rrc_state_at(sequence: &Sequence, as_of: Option<usize>) -> RrcState {
    replay(tracker::prefix(&sequence.messages, as_of), |_, _, _| {})
}

/// One [`ViolationCode::InvalidStateTransition`] warning per rejected message.
pub fn validate_transitions(sequence: &Sequence) -> Vec<Violation> {
    let mut out = Vec::new();
    replay(&sequence.messages, |index, state, message| {
        out.push(
            Violation::new(
                Severity::Warn,
                ViolationCode::InvalidStateTransition,
                format!("{} is not accepted in RRC state {state}", message.type_name),
            )
            .with_message_index(index),
        );
    });
    out
}

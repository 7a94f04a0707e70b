// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON snapshots of whole sequences.

use crate::error::SequenceError;
use crate::model::Sequence;

/// Pretty-printed JSON snapshot of `sequence`.
pub fn export_sequence(sequence: &Sequence) -> Result<String, SequenceError> {
    Ok(serde_json::to_string_pretty(sequence)?)
}

/// Parse a snapshot. Any syntax or shape error is a
/// [`SequenceError::MalformedImport`].
pub fn parse_snapshot(json: &str) -> Result<Sequence, SequenceError> {
    serde_json::from_str(json).map_err(|err| SequenceError::MalformedImport(err.to_string()))
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Offline field suggestions and identifier detection.
//!
//! These are the local stand-ins for the suggestion and identifier services:
//! they only look at data already in memory.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Configurations;
use crate::schema::TypeNode;

/// Identifiers whose suggestions get a confidence bonus.
pub const CRITICAL_IDENTIFIERS: [&str; 3] = ["ue-Identity", "rrc-TransactionIdentifier", "cellIdentity"];

const MAX_SUGGESTIONS: usize = 3;
const BASE_CONFIDENCE: f64 = 0.8;
const RECENCY_DECAY: f64 = 0.1;
const CRITICAL_BONUS: f64 = 0.2;

const NAME_SUFFIXES: [&str; 5] = ["Identity", "Identifier", "ID", "Config", "Configuration"];
const EXACT_NAMES: [&str; 4] = ["establishmentCause", "cellIdentity", "physCellId", "carrierFreq"];
const NAME_KEYWORDS: [&str; 4] = ["id", "identity", "config", "transaction"];

/// A value offered for a field, taken from an earlier message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Suggested value.
    pub value: Value,
    /// Message the value was recorded at.
    #[serde(alias = "source_message_index")]
    pub source_message_index: usize,
    /// Between 0 and 1.
    pub confidence: f64,
    /// Field the suggestion is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Why it was suggested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Confidence for a value recorded `recency` messages ago.
#[allow(clippy::cast_precision_loss)]
pub fn confidence(name: &str, recency: usize) -> f64 {
    let recency_bonus = RECENCY_DECAY.mul_add(-(recency as f64), 1.0).max(0.0);
    let critical = if CRITICAL_IDENTIFIERS.contains(&name) {
        CRITICAL_BONUS
    } else {
        0.0
    };
    (BASE_CONFIDENCE + recency_bonus + critical).min(1.0)
}

/// Up to three values of `name` recorded strictly before `index`, most recent
/// first, then ordered by confidence (stable).
pub fn suggest(configs: &Configurations, name: &str, index: usize) -> Vec<Suggestion> {
    let Some(config) = configs.get(name) else {
        return Vec::new();
    };
    let mut out: Vec<Suggestion> = config
        .values
        .range(..index)
        .rev()
        .take(MAX_SUGGESTIONS)
        .map(|(source, value)| Suggestion {
            value: value.clone(),
            source_message_index: *source,
            confidence: confidence(name, index - source),
            identifier: Some(name.to_owned()),
            reason: Some(format!("used in message {source}")),
        })
        .collect();
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out
}

/// Whether a field named `name` of `kind` should be tracked as an identifier.
pub fn is_identifier_field(name: &str, node: &TypeNode) -> bool {
    if NAME_SUFFIXES.iter().any(|s| name.ends_with(s)) || EXACT_NAMES.contains(&name) {
        return true;
    }
    if !node.kind.is_identifier_like() {
        return false;
    }
    let lower = name.to_lowercase();
    NAME_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Names of identifier-like fields anywhere in `root`, in tree order, without
/// duplicates.
pub fn detect_identifiers(root: &TypeNode) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    root.walk(&mut |node| {
        if let Some(name) = node.name.as_deref() {
            if is_identifier_field(name, node) && !found.iter().any(|f| f == name) {
                found.push(name.to_owned());
            }
        }
    });
    found
}

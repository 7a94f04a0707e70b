// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-actor state replay.
//!
//! [`compute_actor_states`] answers "what does each actor believe at message
//! `as_of`?". It merges two sources:
//!
//! 1. Declared configurations, resolved by [`crate::tracker`] and fanned out
//!    to their owners.
//! 2. Ad-hoc identifiers found by walking the bodies of the message prefix.
//!
//! Three value policies stay separate. Ad-hoc identifiers keep the first value
//! seen. `state` keeps the last value seen. Configurations use the value
//! recorded at the highest index not past `as_of`.
//!
//! Every actor's identifier set at `as_of` contains its set at any earlier
//! index. `state` carries no such guarantee.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actors::{ActorRegistry, ROLE_GNB, ROLE_UE};
use crate::ident::ActorName;
use crate::model::Sequence;
use crate::payload::{for_each_leaf, leaf_text};
use crate::tracker::{self, Resolved};

const UE_IDENTITY_KEYS: [&str; 7] = [
    "ue-identity",
    "ueidentity",
    "tmsi",
    "imsi",
    "guti",
    "imei",
    "randomvalue",
];
const GNB_IDENTITY_KEYS: [&str; 2] = ["rnti", "paging"];

/// One identifier as seen by an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierEntry {
    /// The value.
    pub value: Value,
    /// Index of the message the value came from.
    pub from_message: usize,
    /// Consistency flag, present for declared configurations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_consistent: Option<bool>,
    /// Conflict texts, present for declared configurations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<String>>,
}

/// A declared configuration as attached to an owning actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorConfiguration {
    /// Key in the sequence's configurations.
    pub id: String,
    /// Configuration name.
    pub name: String,
    /// Every recorded value by message index.
    pub values: BTreeMap<usize, Value>,
    /// Carried through from the configuration.
    pub is_consistent: bool,
    /// Carried through from the configuration.
    pub conflicts: Vec<String>,
    /// Value in force at the as-of index.
    pub current_value: Value,
}

/// What one actor believes at an as-of index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorState {
    /// The actor.
    pub actor: ActorName,
    /// Identifiers by name.
    pub identifiers: BTreeMap<String, IdentifierEntry>,
    /// Keys of attached configurations, in attachment order.
    pub configuration_ids: Vec<String>,
    /// Index of the last prefix message the actor sent or received.
    pub last_message: Option<usize>,
    /// Last protocol state reported by a message this actor sent.
    pub state: Option<String>,
    /// Attached configurations.
    pub configurations: Vec<ActorConfiguration>,
}

impl ActorState {
    fn new(actor: ActorName) -> Self {
        Self {
            actor,
            identifiers: BTreeMap::new(),
            configuration_ids: Vec::new(),
            last_message: None,
            state: None,
            configurations: Vec::new(),
        }
    }

    fn attach(&mut self, resolved: &Resolved<'_>) {
        if self.configuration_ids.iter().any(|id| id == resolved.id) {
            return;
        }
        self.configuration_ids.push(resolved.id.to_owned());
        self.configurations.push(ActorConfiguration {
            id: resolved.id.to_owned(),
            name: resolved.config.name.clone(),
            values: resolved.config.values.clone(),
            is_consistent: resolved.config.is_consistent,
            conflicts: resolved.config.conflicts.clone(),
            current_value: resolved.value.clone(),
        });
        self.identifiers.insert(
            resolved.config.name.clone(),
            IdentifierEntry {
                value: resolved.value.clone(),
                from_message: resolved.from_message,
                is_consistent: Some(resolved.config.is_consistent),
                conflicts: Some(resolved.config.conflicts.clone()),
            },
        );
    }

    fn observe(&mut self, key: &str, value: &Value, index: usize) {
        self.identifiers
            .entry(key.to_owned())
            .or_insert_with(|| IdentifierEntry {
                value: value.clone(),
                from_message: index,
                is_consistent: None,
                conflicts: None,
            });
    }
}

struct Records {
    states: Vec<ActorState>,
}

impl Records {
    fn seeded(registry: &ActorRegistry) -> Self {
        Self {
            states: registry.actors().iter().cloned().map(ActorState::new).collect(),
        }
    }

    fn ensure(&mut self, actor: &ActorName) -> &mut ActorState {
        let slot = match self.states.iter().position(|s| &s.actor == actor) {
            Some(slot) => slot,
            None => {
                self.states.push(ActorState::new(actor.clone()));
                self.states.len() - 1
            }
        };
        &mut self.states[slot]
    }
}

/// Replay `sequence` up to and including message `as_of` (`None` = the whole
/// log) and return one record per actor in registry order.
///
/// Never fails. Payloads that are not objects contribute nothing. An `as_of`
/// past the end is treated as the end.
pub fn compute_actor_states(sequence: &Sequence, as_of: Option<usize>) -> Vec<ActorState> {
    let registry = ActorRegistry::for_sequence(sequence);
    let resolved = tracker::resolve(sequence, as_of, &registry);
    // Owners outside the registry (the network/core pair) slot in by role.
    let order = ActorRegistry::from_names(
        registry
            .actors()
            .iter()
            .chain(resolved.iter().flat_map(|r| r.owners.iter())),
    );
    let mut records = Records::seeded(&order);

    for entry in &resolved {
        for owner in &entry.owners {
            records.ensure(owner).attach(entry);
        }
    }

    let ue = ActorName::from(ROLE_UE);
    let gnb = ActorName::from(ROLE_GNB);
    for (index, message) in tracker::prefix(&sequence.messages, as_of).iter().enumerate() {
        records.ensure(&message.source_actor).last_message = Some(index);
        records.ensure(&message.target_actor).last_message = Some(index);
        for_each_leaf(&message.data, |_path, key, value| {
            let lower = key.to_lowercase();
            if is_ue_identity(&lower) {
                records.ensure(&ue).observe(key, value, index);
            }
            if GNB_IDENTITY_KEYS.iter().any(|k| lower.contains(k)) {
                records.ensure(&gnb).observe(key, value, index);
            }
            if lower.contains("state") {
                records.ensure(&message.source_actor).state = Some(leaf_text(value));
            }
        });
    }
    records.states
}

fn is_ue_identity(lower_key: &str) -> bool {
    lower_key.starts_with("ue-") || UE_IDENTITY_KEYS.iter().any(|k| lower_key.contains(k))
}

/// Memo of [`compute_actor_states`] keyed by `(version, as_of)`.
///
/// Entries for older versions are dropped as soon as a newer version is
/// requested.
#[derive(Debug, Default)]
pub struct ActorStateCache {
    version: Option<u64>,
    entries: HashMap<Option<usize>, Arc<Vec<ActorState>>>,
}

impl ActorStateCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached states for `(version, as_of)`, computing them on a miss.
    pub fn get_or_compute(
        &mut self,
        version: u64,
        sequence: &Sequence,
        as_of: Option<usize>,
    ) -> Arc<Vec<ActorState>> {
        if self.version != Some(version) {
            self.entries.clear();
            self.version = Some(version);
        }
        Arc::clone(
            self.entries
                .entry(as_of)
                .or_insert_with(|| Arc::new(compute_actor_states(sequence, as_of))),
        )
    }

    /// Number of cached as-of entries for the current version.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

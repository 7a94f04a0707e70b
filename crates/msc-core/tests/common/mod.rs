// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, clippy::panic)]

use std::collections::BTreeSet;

use msc_core::{compute_actor_states, ActorState, NewMessage, Sequence, SequenceEditor, SequenceId};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// =============================================================================
// FIXTURES
// =============================================================================

/// Editor with one empty active sequence.
pub fn editor() -> (SequenceEditor, SequenceId) {
    let mut editor = SequenceEditor::new();
    let id = editor.create("fixture", "rrc_demo", Some("session-1".into())).id.clone();
    (editor, id)
}

/// Message body built from `(key, value)` pairs, keeping their order.
pub fn body(pairs: &[(&str, Value)]) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_owned(), v.clone());
    }
    Value::Object(map)
}

/// Find the record for `actor`.
pub fn actor<'a>(states: &'a [ActorState], actor: &str) -> &'a ActorState {
    states
        .iter()
        .find(|s| s.actor == actor)
        .unwrap_or_else(|| panic!("no record for {actor}"))
}

/// Identifier names per actor.
pub fn identifier_sets(states: &[ActorState]) -> Vec<(String, BTreeSet<String>)> {
    states
        .iter()
        .map(|s| (s.actor.to_string(), s.identifiers.keys().cloned().collect()))
        .collect()
}

/// Replay at every prefix index.
pub fn replay_all(sequence: &Sequence) -> Vec<Vec<ActorState>> {
    (0..sequence.messages.len())
        .map(|i| compute_actor_states(sequence, Some(i)))
        .collect()
}

// =============================================================================
// GENERATORS
// =============================================================================

pub const ACTORS: [&str; 4] = ["UE", "gNB", "AMF", "Network"];
pub const PAYLOAD_KEYS: [&str; 8] = [
    "ue-Identity",
    "s-TMSI",
    "c-RNTI",
    "pagingCycle",
    "rrcState",
    "establishmentCause",
    "measId",
    "randomValue",
];
/// Names every keyword group classifies.
pub const CLASSIFIED_CONFIGS: [&str; 4] = ["cellIdentity", "c-rnti-1", "ue-Identity", "plmn-Identity"];
/// Names no keyword group matches. Some are payload paths `arb_body` writes.
pub const UNCLASSIFIED_CONFIGS: [&str; 4] = [
    "measId",
    "establishmentCause",
    "measId-ext.inner.measId",
    "spareField",
];

pub fn arb_actor() -> impl Strategy<Value = &'static str> {
    prop::sample::select(ACTORS.to_vec())
}

pub fn arb_config_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        prop::sample::select(CLASSIFIED_CONFIGS.to_vec()),
        prop::sample::select(UNCLASSIFIED_CONFIGS.to_vec()),
    ]
}

pub fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0u32..4).prop_map(|n| json!(n)),
        prop::sample::select(vec!["0xAB", "0xCD", "CONNECTED", "IDLE"]).prop_map(|s| json!(s)),
        (0u8..3).prop_map(|n| json!([format!("0x{n:02X}"), 8])),
        Just(Value::Null),
    ]
}

pub fn arb_body() -> impl Strategy<Value = Value> {
    prop::collection::vec(
        (
            prop::sample::select(PAYLOAD_KEYS.to_vec()),
            arb_leaf(),
            any::<bool>(),
        ),
        0..4,
    )
    .prop_map(|fields| {
        let mut map = Map::new();
        for (key, leaf, nested) in fields {
            let value = if nested {
                json!({ "inner": { key: leaf } })
            } else {
                leaf
            };
            map.insert(if nested { format!("{key}-ext") } else { key.to_owned() }, value);
        }
        Value::Object(map)
    })
}

pub fn arb_message() -> impl Strategy<Value = NewMessage> {
    (
        prop::sample::select(vec!["RRCConnectionRequest", "RRCConnectionSetup", "MeasurementReport", "Custom"]),
        arb_actor(),
        arb_actor(),
        arb_body(),
    )
        .prop_map(|(t, from, to, data)| NewMessage::new(t, from, to).with_data(data))
}

/// A sequence of up to `max` messages plus tracked values, classified and not.
pub fn arb_sequence(max: usize) -> impl Strategy<Value = Sequence> {
    (
        prop::collection::vec(arb_message(), 1..max),
        prop::collection::vec(
            (arb_config_name(), 0..max, arb_leaf()),
            0..6,
        ),
    )
        .prop_map(|(messages, tracked)| {
            let mut editor = SequenceEditor::new();
            let id = editor.create("generated", "rrc_demo", None).id.clone();
            for message in messages {
                let _ = editor.add_message(&id, message);
            }
            for (name, index, value) in tracked {
                let _ = editor.track_value(&id, name, index, value);
            }
            editor.get(&id).map(|s| (*s).clone()).unwrap_or_else(|_| Sequence::new("x", "rrc_demo", None))
        })
}

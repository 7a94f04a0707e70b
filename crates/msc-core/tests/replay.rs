// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used)]
//! Actor-state replay: worked examples and replay laws.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{actor, arb_sequence, body, editor, identifier_sets, replay_all};
use msc_core::{
    compute_actor_states, export_sequence, parse_snapshot, rrc_state_at, ActorStateCache,
    NewMessage, RrcState, SequenceError,
};
use proptest::prelude::*;
use serde_json::json;

// =============================================================================
// WORKED EXAMPLES
// =============================================================================

#[test]
fn ue_identity_in_first_payload_is_owned_by_ue() {
    let (mut editor, id) = editor();
    editor
        .add_message(
            &id,
            NewMessage::new("RRCConnectionRequest", "UE", "gNB").with_data(body(&[
                ("ue-Identity", json!(["0x12345678", 40])),
                ("establishmentCause", json!("mo-Signalling")),
            ])),
        )
        .unwrap();
    let seq = editor.get(&id).unwrap();
    let states = compute_actor_states(&seq, Some(0));

    let ue = actor(&states, "UE");
    let entry = &ue.identifiers["ue-Identity"];
    assert_eq!(entry.from_message, 0);
    assert_eq!(entry.value, json!(["0x12345678", 40]));
    assert_eq!(ue.last_message, Some(0));
    assert!(actor(&states, "gNB").identifiers.is_empty());
}

#[test]
fn tracked_rnti_resolves_per_index_under_gnb() {
    let (mut editor, id) = editor();
    for (t, from, to) in [
        ("RRCConnectionRequest", "UE", "gNB"),
        ("RRCConnectionSetup", "gNB", "UE"),
        ("RRCReconfiguration", "gNB", "UE"),
    ] {
        editor.add_message(&id, NewMessage::new(t, from, to)).unwrap();
    }
    editor.track_value(&id, "c-rnti-1", 1, json!("A")).unwrap();
    editor.track_value(&id, "c-rnti-1", 2, json!("B")).unwrap();
    let seq = editor.get(&id).unwrap();

    assert!(compute_actor_states(&seq, Some(0))
        .iter()
        .all(|s| !s.identifiers.contains_key("c-rnti-1")));

    let at_one = compute_actor_states(&seq, Some(1));
    let gnb = actor(&at_one, "gNB");
    assert_eq!(gnb.identifiers["c-rnti-1"].value, json!("A"));
    assert_eq!(gnb.identifiers["c-rnti-1"].from_message, 1);
    assert_eq!(gnb.configuration_ids, ["c-rnti-1"]);
    assert!(!actor(&at_one, "UE").identifiers.contains_key("c-rnti-1"));

    let at_two = compute_actor_states(&seq, Some(2));
    let entry = &actor(&at_two, "gNB").identifiers["c-rnti-1"];
    assert_eq!(entry.value, json!("B"));
    assert_eq!(entry.is_consistent, Some(false));
    assert!(entry
        .conflicts
        .as_ref()
        .unwrap()
        .iter()
        .any(|c| c.starts_with("Multiple values for c-rnti-1")));
}

#[test]
fn identity_is_first_wins_and_state_is_last_wins() {
    let (mut editor, id) = editor();
    editor
        .add_message(
            &id,
            NewMessage::new("A", "UE", "gNB").with_data(json!({
                "ue-Identity": "first", "rrcState": "IDLE"
            })),
        )
        .unwrap();
    editor
        .add_message(
            &id,
            NewMessage::new("B", "UE", "gNB").with_data(json!({
                "nested": {"ue-Identity": "second"}, "rrcState": "CONNECTED"
            })),
        )
        .unwrap();
    let seq = editor.get(&id).unwrap();
    let states = compute_actor_states(&seq, None);
    let ue = actor(&states, "UE");
    assert_eq!(ue.identifiers["ue-Identity"].value, json!("first"));
    assert_eq!(ue.identifiers["ue-Identity"].from_message, 0);
    assert_eq!(ue.state.as_deref(), Some("CONNECTED"));
    assert_eq!(actor(&states, "gNB").state, None);
}

#[test]
fn unclassified_configuration_owner_falls_back() {
    let (mut editor, id) = editor();
    editor
        .add_message(
            &id,
            NewMessage::new("Setup", "UE", "AMF").with_data(json!({"measConfig": {"measId": 4}})),
        )
        .unwrap();
    editor
        .add_message(&id, NewMessage::new("Other", "gNB", "AMF"))
        .unwrap();
    editor.track_value(&id, "measConfig.measId", 0, json!(4)).unwrap();
    editor.track_value(&id, "spareField", 0, json!(true)).unwrap();
    let seq = editor.get(&id).unwrap();
    let states = compute_actor_states(&seq, None);

    let owners = |name: &str| -> BTreeSet<String> {
        states
            .iter()
            .filter(|s| s.configuration_ids.iter().any(|c| c == name))
            .map(|s| s.actor.to_string())
            .collect()
    };
    // Found in a payload: the endpoints of that message.
    assert_eq!(owners("measConfig.measId"), BTreeSet::from(["UE".to_owned(), "AMF".to_owned()]));
    // Found nowhere: every actor.
    assert_eq!(
        owners("spareField"),
        BTreeSet::from(["UE".to_owned(), "gNB".to_owned(), "AMF".to_owned()])
    );
}

#[test]
fn fallback_owners_do_not_shrink_when_a_later_message_defines_the_path() {
    let (mut editor, id) = editor();
    editor.add_message(&id, NewMessage::new("A", "UE", "gNB")).unwrap();
    editor
        .add_message(
            &id,
            NewMessage::new("B", "gNB", "AMF").with_data(json!({"spareField": 1})),
        )
        .unwrap();
    editor.track_value(&id, "spareField", 0, json!(1)).unwrap();
    let seq = editor.get(&id).unwrap();

    for as_of in [Some(0), Some(1), None] {
        let states = compute_actor_states(&seq, as_of);
        for name in ["UE", "gNB", "AMF"] {
            assert!(
                actor(&states, name).identifiers.contains_key("spareField"),
                "{name} lost spareField at {as_of:?}"
            );
        }
    }
}

#[test]
fn network_owners_keep_role_priority_over_unknown_actors() {
    let (mut editor, id) = editor();
    editor
        .add_message(&id, NewMessage::new("Registration", "UE", "AMF"))
        .unwrap();
    editor.track_value(&id, "plmn-Identity", 0, json!("00101")).unwrap();
    let seq = editor.get(&id).unwrap();
    let states = compute_actor_states(&seq, None);
    let order: Vec<&str> = states.iter().map(|s| s.actor.as_str()).collect();
    assert_eq!(order, ["UE", "gNB", "Network", "CoreNetwork", "AMF"]);
}

#[test]
fn empty_object_state_is_not_a_state() {
    let (mut editor, id) = editor();
    editor
        .add_message(
            &id,
            NewMessage::new("A", "UE", "gNB").with_data(json!({"rrcState": "IDLE"})),
        )
        .unwrap();
    editor
        .add_message(
            &id,
            NewMessage::new("B", "UE", "gNB").with_data(json!({"rrcState": {}, "ue-Identity": {}})),
        )
        .unwrap();
    let seq = editor.get(&id).unwrap();
    let ue = compute_actor_states(&seq, None)
        .into_iter()
        .find(|s| s.actor == "UE")
        .unwrap();
    assert_eq!(ue.state.as_deref(), Some("IDLE"));
    assert!(!ue.identifiers.contains_key("ue-Identity"));
}

#[test]
fn network_keywords_map_to_both_core_roles() {
    let (mut editor, id) = editor();
    editor
        .add_message(&id, NewMessage::new("Registration", "UE", "gNB"))
        .unwrap();
    editor.track_value(&id, "plmn-Identity", 0, json!("00101")).unwrap();
    let seq = editor.get(&id).unwrap();
    let states = compute_actor_states(&seq, None);
    assert!(actor(&states, "Network").identifiers.contains_key("plmn-Identity"));
    assert!(actor(&states, "CoreNetwork").identifiers.contains_key("plmn-Identity"));
    assert!(!actor(&states, "UE").identifiers.contains_key("plmn-Identity"));
}

#[test]
fn malformed_import_changes_nothing() {
    let (mut editor, id) = editor();
    editor
        .add_message(&id, NewMessage::new("RRCConnectionRequest", "UE", "gNB"))
        .unwrap();
    let before = editor.get(&id).unwrap();

    let err = editor.import("{\"messages\": [ {\"typeName\": ").unwrap_err();
    assert!(matches!(err, SequenceError::MalformedImport(_)));
    let after = editor.get(&id).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(*after, *before);
}

#[test]
fn rrc_state_follows_connection_setup() {
    let (mut editor, id) = editor();
    for (t, from, to) in [
        ("RRCConnectionRequest", "UE", "gNB"),
        ("RRCConnectionSetup", "gNB", "UE"),
        ("RRCConnectionSetupComplete", "UE", "gNB"),
    ] {
        editor.add_message(&id, NewMessage::new(t, from, to)).unwrap();
    }
    let seq = editor.get(&id).unwrap();
    assert_eq!(rrc_state_at(&seq, Some(0)), RrcState::Connecting);
    assert_eq!(rrc_state_at(&seq, None), RrcState::Connected);
}

#[test]
fn cache_hits_until_the_document_moves() {
    let (mut editor, id) = editor();
    editor
        .add_message(&id, NewMessage::new("A", "UE", "gNB"))
        .unwrap();
    let mut cache = ActorStateCache::new();
    let seq = editor.get(&id).unwrap();
    let first = cache.get_or_compute(editor.version(), &seq, Some(0));
    let again = cache.get_or_compute(editor.version(), &seq, Some(0));
    assert!(std::sync::Arc::ptr_eq(&first, &again));

    editor.rename(&id, "moved").unwrap();
    let seq = editor.get(&id).unwrap();
    let fresh = cache.get_or_compute(editor.version(), &seq, Some(0));
    assert!(!std::sync::Arc::ptr_eq(&first, &fresh));
    assert_eq!(cache.len(), 1);
}

// =============================================================================
// REPLAY LAWS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn replay_is_deterministic(seq in arb_sequence(10)) {
        let text = export_sequence(&seq).unwrap();
        let reparsed = parse_snapshot(&text).unwrap();
        for as_of in (0..seq.len()).map(Some).chain([None]) {
            let a = compute_actor_states(&seq, as_of);
            let b = compute_actor_states(&seq, as_of);
            let c = compute_actor_states(&reparsed, as_of);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);
        }
    }

    #[test]
    fn identifier_keys_only_grow(seq in arb_sequence(10)) {
        let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for states in replay_all(&seq) {
            let now: BTreeMap<String, BTreeSet<String>> =
                identifier_sets(&states).into_iter().collect();
            for (actor, keys) in &seen {
                let current = now.get(actor).cloned().unwrap_or_default();
                prop_assert!(
                    keys.is_subset(&current),
                    "{} lost identifiers: {:?} -> {:?}", actor, keys, current
                );
            }
            seen = now;
        }
    }

    #[test]
    fn as_of_past_the_end_is_the_whole_log(seq in arb_sequence(8), extra in 0usize..5) {
        prop_assert_eq!(
            compute_actor_states(&seq, Some(seq.len() + extra)),
            compute_actor_states(&seq, None)
        );
    }
}

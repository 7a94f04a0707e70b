// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used)]
//! Undo/redo laws over random edit scripts.

mod common;

use common::{arb_leaf, arb_message, editor, CLASSIFIED_CONFIGS};
use msc_core::{NewMessage, Sequence, SequenceEditor, SequenceId};
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum Edit {
    Add(NewMessage),
    Insert(usize, NewMessage),
    Remove(usize),
    Update(usize, Value),
    Rename(String),
    Track(&'static str, usize, Value),
    Untrack(&'static str, usize),
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => arb_message().prop_map(Edit::Add),
        1 => (0usize..8, arb_message()).prop_map(|(i, m)| Edit::Insert(i, m)),
        2 => (0usize..8).prop_map(Edit::Remove),
        2 => (0usize..8, arb_leaf()).prop_map(|(i, v)| Edit::Update(i, json!({ "field": v }))),
        1 => "[a-z]{1,8}".prop_map(Edit::Rename),
        2 => (prop::sample::select(CLASSIFIED_CONFIGS.to_vec()), 0usize..8, arb_leaf())
            .prop_map(|(n, i, v)| Edit::Track(n, i, v)),
        1 => (prop::sample::select(CLASSIFIED_CONFIGS.to_vec()), 0usize..8)
            .prop_map(|(n, i)| Edit::Untrack(n, i)),
    ]
}

/// Apply one edit. Returns whether it landed in history.
fn apply(editor: &mut SequenceEditor, id: &SequenceId, edit: Edit) -> bool {
    let current = editor.get(id).unwrap();
    let message_at = |i: usize| current.messages.get(i).map(|m| m.id.clone());
    match edit {
        Edit::Add(m) => editor.add_message(id, m).is_ok(),
        Edit::Insert(i, m) => editor.insert_message(id, i, m).is_ok(),
        Edit::Remove(i) => message_at(i).is_some_and(|mid| editor.remove_message(id, &mid).is_ok()),
        Edit::Update(i, data) => {
            message_at(i).is_some_and(|mid| editor.update_message(id, &mid, data).is_ok())
        }
        Edit::Rename(name) => editor.rename(id, &name).is_ok(),
        Edit::Track(name, i, v) => editor.track_value(id, name, i, v).is_ok(),
        Edit::Untrack(name, i) => editor.untrack_value(id, name, i).is_ok(),
    }
}

fn snapshot(editor: &SequenceEditor, id: &SequenceId) -> Sequence {
    (*editor.get(id).unwrap()).clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn undo_all_restores_start_and_redo_all_restores_end(
        edits in prop::collection::vec(arb_edit(), 0..24)
    ) {
        let (mut editor, id) = editor();
        let start = snapshot(&editor, &id);

        let mut states = vec![start.clone()];
        for edit in edits {
            if apply(&mut editor, &id, edit) {
                states.push(snapshot(&editor, &id));
            }
        }
        let end = snapshot(&editor, &id);

        // Each undo walks back exactly one recorded state.
        for expected in states.iter().rev().skip(1) {
            let back = editor.undo().unwrap();
            prop_assert!(back.is_some());
            prop_assert_eq!(&snapshot(&editor, &id), expected);
        }
        prop_assert!(editor.undo().unwrap().is_none());
        prop_assert_eq!(&snapshot(&editor, &id), &start);

        for expected in states.iter().skip(1) {
            prop_assert!(editor.redo().unwrap().is_some());
            prop_assert_eq!(&snapshot(&editor, &id), expected);
        }
        prop_assert!(!editor.can_redo());
        prop_assert_eq!(snapshot(&editor, &id), end);
    }

    #[test]
    fn a_new_edit_after_undo_discards_redo(
        first in arb_message(),
        second in arb_message(),
    ) {
        let (mut editor, id) = editor();
        editor.add_message(&id, first).unwrap();
        editor.undo().unwrap();
        prop_assert!(editor.can_redo());
        editor.add_message(&id, second).unwrap();
        prop_assert!(!editor.can_redo());
        prop_assert!(editor.redo().unwrap().is_none());
    }
}

#[test]
fn history_depth_bounds_undo() {
    let mut editor = SequenceEditor::with_history_depth(3);
    let id = editor.create("bounded", "rrc_demo", None).id.clone();
    for i in 0..5 {
        editor
            .add_message(&id, NewMessage::new(format!("M{i}"), "UE", "gNB"))
            .unwrap();
    }
    let mut undone = 0;
    while editor.undo().unwrap().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 3);
    assert_eq!(editor.get(&id).unwrap().len(), 2);
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tracked configuration values: normalization, owner attribution, value
//! resolution and conflict detection.
//!
//! Owner attribution is two pure steps. [`classify`] matches the configuration
//! name against keyword groups. When no group matches, [`fallback_owners`]
//! reads the name as a dotted path and collects the endpoints of every prefix
//! message whose body defines it. When the path is undefined up to the first
//! index the configuration has a value at, it belongs to every registered
//! actor at every later as-of index too, so owner sets only grow.
//!
//! Value resolution is "last by index": the entry recorded at the as-of index
//! if there is one, otherwise the highest recorded index below it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::actors::{ActorRegistry, ROLE_CORE, ROLE_GNB, ROLE_NETWORK, ROLE_UE};
use crate::ident::ActorName;
use crate::model::{Configurations, Message, Sequence, TrackedConfiguration};
use crate::payload::{leaf_text, lookup_path};

const UE_KEYWORDS: [&str; 7] = [
    "imsi",
    "tmsi",
    "guti",
    "imei",
    "ue-identity",
    "ueidentity",
    "ue-capability",
];
const GNB_KEYWORDS: [&str; 7] = ["rnti", "gnb", "enb", "cell", "pci", "physcellid", "paging"];
const NETWORK_KEYWORDS: [&str; 5] = ["amf", "mme", "core", "network", "plmn"];

/// Keyword classification of a configuration name.
///
/// Groups are tried in order (UE, gNB, network/core) and the first match wins.
/// The network/core group maps to both `Network` and `CoreNetwork`.
pub fn classify(name: &str) -> Option<&'static [&'static str]> {
    let lower = name.to_lowercase();
    let hit = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    if hit(&UE_KEYWORDS) {
        Some(&[ROLE_UE])
    } else if hit(&GNB_KEYWORDS) {
        Some(&[ROLE_GNB])
    } else if hit(&NETWORK_KEYWORDS) {
        Some(&[ROLE_NETWORK, ROLE_CORE])
    } else {
        None
    }
}

/// Endpoints of every message in `prefix` whose body defines `name` as a
/// dotted path, in discovery order without duplicates.
pub fn fallback_owners(prefix: &[Message], name: &str) -> Vec<ActorName> {
    let mut owners: Vec<ActorName> = Vec::new();
    for message in prefix {
        if lookup_path(&message.data, name).is_none() {
            continue;
        }
        for actor in [&message.source_actor, &message.target_actor] {
            if !owners.contains(actor) {
                owners.push(actor.clone());
            }
        }
    }
    owners
}

/// Full owner resolution: keywords, then the path scan, then every actor.
///
/// `settled` is the log up to the configuration's first recorded index and
/// `prefix` the log up to the as-of index. A path undefined in `settled`
/// means every actor, whatever later messages define.
pub fn resolve_owners(
    name: &str,
    settled: &[Message],
    prefix: &[Message],
    registry: &ActorRegistry,
) -> Vec<ActorName> {
    if let Some(roles) = classify(name) {
        return roles.iter().map(|r| ActorName::from(*r)).collect();
    }
    if !settled.iter().any(|m| lookup_path(&m.data, name).is_some()) {
        return registry.actors().to_vec();
    }
    fallback_owners(prefix, name)
}

/// The value in force at `as_of` (`None` = end of the log) and its index.
pub fn current_value(
    config: &TrackedConfiguration,
    as_of: Option<usize>,
) -> Option<(usize, &Value)> {
    match as_of {
        None => config.values.iter().next_back(),
        Some(limit) => config.values.range(..=limit).next_back(),
    }
    .map(|(index, value)| (*index, value))
}

/// One configuration resolved at an as-of index, ready to fan out to owners.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// Key in [`Configurations`].
    pub id: &'a str,
    /// The configuration itself.
    pub config: &'a TrackedConfiguration,
    /// Index the current value was recorded at.
    pub from_message: usize,
    /// Current value.
    pub value: &'a Value,
    /// Actors the configuration is attributed to.
    pub owners: Vec<ActorName>,
}

/// Resolve every configuration of `sequence` at `as_of`. Configurations with
/// no value at or before `as_of` are omitted.
pub fn resolve<'a>(
    sequence: &'a Sequence,
    as_of: Option<usize>,
    registry: &ActorRegistry,
) -> Vec<Resolved<'a>> {
    let window = prefix(&sequence.messages, as_of);
    sequence
        .configurations
        .iter()
        .filter_map(|(id, config)| {
            let (from_message, value) = current_value(config, as_of)?;
            let first = config.values.keys().next().copied();
            let settled = prefix(&sequence.messages, first);
            Some(Resolved {
                id: id.as_str(),
                config,
                from_message,
                value,
                owners: resolve_owners(&config.name, settled, window, registry),
            })
        })
        .collect()
}

pub(crate) fn prefix(messages: &[Message], as_of: Option<usize>) -> &[Message] {
    match as_of {
        None => messages,
        Some(limit) => &messages[..messages.len().min(limit.saturating_add(1))],
    }
}

/// Record `value` for `name` at `index`, creating the entry if needed, and
/// recompute its consistency and conflicts.
pub fn track_value(configs: &mut Configurations, name: &str, index: usize, value: Value) {
    let mut entry = configs
        .get(name)
        .cloned()
        .unwrap_or_else(|| TrackedConfiguration::new(name));
    entry.values.insert(index, value);
    refresh(&mut entry);
    configs.insert(name, entry);
}

/// Remove the value recorded for `name` at `index`. Returns the removed value.
/// The entry itself stays, even when it becomes empty.
pub fn untrack_value(configs: &mut Configurations, name: &str, index: usize) -> Option<Value> {
    let mut entry = configs.get(name)?.clone();
    let removed = entry.values.remove(&index)?;
    refresh(&mut entry);
    configs.insert(name, entry);
    Some(removed)
}

/// Recompute `is_consistent` and `conflicts` from the recorded values.
pub fn refresh(config: &mut TrackedConfiguration) {
    config.is_consistent = all_equal(&config.values);
    config.conflicts = detect_conflicts(config);
}

/// Conflict descriptions for `config`: one for disagreeing values and one for
/// values that change more than once across more than two messages.
pub fn detect_conflicts(config: &TrackedConfiguration) -> Vec<String> {
    let mut conflicts = Vec::new();
    if !all_equal(&config.values) {
        let mut distinct: Vec<&Value> = Vec::new();
        for value in config.values.values() {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        let rendered: Vec<String> = distinct.into_iter().map(leaf_text).collect();
        conflicts.push(format!(
            "Multiple values for {}: {}",
            config.name,
            rendered.join(", ")
        ));
    }
    if config.values.len() > 2 {
        let ordered: Vec<&Value> = config.values.values().collect();
        let changes = ordered.windows(2).filter(|w| w[0] != w[1]).count();
        if changes > 1 {
            conflicts.push(format!(
                "Frequent changes in '{}': {changes} changes across {} messages",
                config.name,
                ordered.len()
            ));
        }
    }
    conflicts
}

fn all_equal(values: &BTreeMap<usize, Value>) -> bool {
    let mut iter = values.values();
    iter.next().is_none_or(|first| iter.all(|value| value == first))
}

/// Normalize the `configurations` field of a sequence.
///
/// Accepts a mapping keyed by name or a list of entries. List entries are
/// keyed by their `name`, else their `identifier`, else `config_<index>`.
/// Entries that are not objects are skipped. `values` keys that are not
/// message indices are skipped. A missing `isConsistent` is computed.
pub fn normalize_configurations(raw: &Value) -> Configurations {
    match raw {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, entry)| {
                let entry = entry.as_object()?;
                let name = string_field(entry, &["name", "identifier"]).unwrap_or(key.as_str());
                Some((key.clone(), normalize_entry(name, entry)))
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let entry = entry.as_object()?;
                let key = string_field(entry, &["name", "identifier"])
                    .map_or_else(|| format!("config_{position}"), str::to_owned);
                let config = normalize_entry(&key, entry);
                Some((key, config))
            })
            .collect(),
        Value::Null => Configurations::new(),
        other => {
            tracing::warn!(kind = %json_kind(other), "ignoring configurations of unexpected shape");
            Configurations::new()
        }
    }
}

fn normalize_entry(name: &str, entry: &Map<String, Value>) -> TrackedConfiguration {
    let values: BTreeMap<usize, Value> = entry
        .get("values")
        .and_then(Value::as_object)
        .map(|values| {
            values
                .iter()
                .filter_map(|(k, v)| k.trim().parse::<usize>().ok().map(|i| (i, v.clone())))
                .collect()
        })
        .unwrap_or_default();
    let is_consistent = ["isConsistent", "is_consistent"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_bool))
        .unwrap_or_else(|| all_equal(&values));
    let conflicts = entry
        .get("conflicts")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(leaf_text).collect())
        .unwrap_or_default();
    TrackedConfiguration {
        name: name.to_owned(),
        values,
        is_consistent,
        conflicts,
    }
}

fn string_field<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

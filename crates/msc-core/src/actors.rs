// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The working set of actor names for a sequence.

use crate::ident::ActorName;
use crate::model::Sequence;

/// Role A: the user equipment.
pub const ROLE_UE: &str = "UE";
/// Role B: the radio base station.
pub const ROLE_GNB: &str = "gNB";
/// Network side (paired with [`ROLE_CORE`]).
pub const ROLE_NETWORK: &str = "Network";
/// Core network side (paired with [`ROLE_NETWORK`]).
pub const ROLE_CORE: &str = "CoreNetwork";

/// Known roles in display priority order.
pub const KNOWN_ROLES: [&str; 4] = [ROLE_UE, ROLE_GNB, ROLE_NETWORK, ROLE_CORE];

const SEED: [&str; 2] = [ROLE_UE, ROLE_GNB];

/// Ordered, duplicate-free list of actors.
///
/// Known roles come first in [`KNOWN_ROLES`] order, then any other names in
/// the order they were first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRegistry {
    actors: Vec<ActorName>,
}

impl ActorRegistry {
    /// Seed actors plus every source and target across the whole sequence.
    pub fn for_sequence(sequence: &Sequence) -> Self {
        Self::from_names(
            sequence
                .messages
                .iter()
                .flat_map(|m| [&m.source_actor, &m.target_actor]),
        )
    }

    /// Seed actors plus `names`.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a ActorName>) -> Self {
        let mut unknown: Vec<ActorName> = Vec::new();
        let mut seen_known = [false; KNOWN_ROLES.len()];
        for seed in SEED {
            if let Some(slot) = KNOWN_ROLES.iter().position(|r| *r == seed) {
                seen_known[slot] = true;
            }
        }
        for name in names {
            match KNOWN_ROLES.iter().position(|r| name == r) {
                Some(slot) => seen_known[slot] = true,
                None if !unknown.contains(name) => unknown.push(name.clone()),
                None => {}
            }
        }
        let actors = KNOWN_ROLES
            .iter()
            .zip(seen_known)
            .filter(|(_, seen)| *seen)
            .map(|(role, _)| ActorName::from(*role))
            .chain(unknown)
            .collect();
        Self { actors }
    }

    /// Actors in registry order.
    pub fn actors(&self) -> &[ActorName] {
        &self.actors
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &ActorName) -> bool {
        self.actors.contains(name)
    }

    /// Registry position of `name`.
    pub fn position(&self, name: &ActorName) -> Option<usize> {
        self.actors.iter().position(|a| a == name)
    }

    /// Number of actors.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Always `false`: the seed pair is always present.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

/// Whether `name` is one of [`KNOWN_ROLES`].
pub fn is_known_role(name: &ActorName) -> bool {
    KNOWN_ROLES.iter().any(|r| name == r)
}

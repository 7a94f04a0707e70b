// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier newtypes and id minting.
//!
//! Fresh ids are domain-separated BLAKE3 digests (`"seq:"` / `"msg:"` prefix)
//! over a caller label, the wall clock and a random nonce, rendered as 32 hex
//! characters. Ids read back from files are kept verbatim; nothing assumes a
//! particular shape.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Name of a participant in a message exchange. Two actors are the same actor
/// exactly when their names are equal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorName(String);

impl ActorName {
    /// Wrap a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ActorName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for ActorName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ActorName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Identifier of a sequence.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(String);

impl SequenceId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh id. `label` only adds entropy; it is not recoverable.
    pub fn fresh(label: &str) -> Self {
        Self(mint(b"seq:", label))
    }

    /// Borrow the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in human-readable file names.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identifier of a message, unique within its sequence.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh message id scoped to `sequence`.
    pub fn fresh(sequence: &SequenceId) -> Self {
        Self(mint(b"msg:", sequence.as_str()))
    }

    /// Borrow the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

static MINT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn mint(domain: &[u8], label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let counter = MINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(label.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&counter.to_le_bytes());
    hasher.update(&rand::random::<u64>().to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fresh_ids_are_distinct_and_hex() {
        let seq = SequenceId::fresh("demo");
        let ids: HashSet<_> = (0..256).map(|_| MessageId::fresh(&seq)).collect();
        assert_eq!(ids.len(), 256);
        assert!(seq.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(seq.as_str().len(), 32);
    }

    #[test]
    fn short_handles_tiny_ids() {
        assert_eq!(SequenceId::new("abc").short(), "abc");
        assert_eq!(SequenceId::new("0123456789").short(), "01234567");
    }

    #[test]
    fn actor_name_compares_with_str() {
        assert_eq!(ActorName::from("UE"), "UE");
        assert_ne!(ActorName::from("UE"), "gNB");
    }
}

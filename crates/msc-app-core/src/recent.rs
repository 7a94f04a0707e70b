// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Last-used field values, kept as an explicit store with a load/flush lifecycle.
//!
//! Editors pre-fill a field with whatever the user last typed for the same
//! `(protocol, type, field)` triple. The store is owned by the session and
//! passed by reference; nothing here is process-global.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigError, ConfigService, ConfigStore};

/// Config key under which [`RecentValues`] are persisted.
pub const RECENT_VALUES_KEY: &str = "recent_values";

/// Address of a remembered value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecentKey {
    /// Protocol name (`rrc_demo`, ...).
    pub protocol: String,
    /// Message type name.
    pub type_name: String,
    /// Dotted field path inside the message body.
    pub field: String,
}

impl RecentKey {
    /// Build a key from its three parts.
    pub fn new(
        protocol: impl Into<String>,
        type_name: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    fn storage_key(&self) -> String {
        format!("{}/{}/{}", self.protocol, self.type_name, self.field)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecentBlob {
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

/// In-memory cache of last-used values with explicit persistence.
#[derive(Debug, Default)]
pub struct RecentValues {
    values: BTreeMap<String, Value>,
    dirty: bool,
}

impl RecentValues {
    /// Empty, clean store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted values. A missing or unreadable blob yields an empty store.
    pub fn load<S: ConfigStore>(config: &ConfigService<S>) -> Self {
        let blob: RecentBlob = config.load_or_default(RECENT_VALUES_KEY);
        Self {
            values: blob.values,
            dirty: false,
        }
    }

    /// Last value remembered for `key`.
    pub fn get(&self, key: &RecentKey) -> Option<&Value> {
        self.values.get(&key.storage_key())
    }

    /// Remember `value` for `key`. Marks the store dirty when the value changes.
    pub fn record(&mut self, key: &RecentKey, value: Value) {
        let storage_key = key.storage_key();
        if self.values.get(&storage_key) == Some(&value) {
            return;
        }
        self.values.insert(storage_key, value);
        self.dirty = true;
    }

    /// Forget everything remembered for `protocol`.
    pub fn clear_protocol(&mut self, protocol: &str) {
        let prefix = format!("{protocol}/");
        let before = self.values.len();
        self.values.retain(|k, _| !k.starts_with(&prefix));
        self.dirty |= self.values.len() != before;
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of remembered values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Persist pending changes. No-op when clean.
    pub fn flush<S: ConfigStore>(&mut self, config: &ConfigService<S>) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }
        let blob = RecentBlob {
            values: self.values.clone(),
        };
        config.save(RECENT_VALUES_KEY, &blob)?;
        self.dirty = false;
        Ok(())
    }
}

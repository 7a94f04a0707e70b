// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted editor preferences (storage location, history depth, collaborators).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Config key under which [`EditorPrefs`] are stored.
pub const EDITOR_PREFS_KEY: &str = "editor_prefs";

/// Saved preferences for an editor session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPrefs {
    /// Root directory for persisted sequences. `None` means `sequences/` under the config dir.
    pub storage_dir: Option<PathBuf>,
    /// Protocol assigned to new sequences when the caller does not name one.
    pub default_protocol: String,
    /// Source and target offered for a new message, in that order.
    pub default_actors: Vec<String>,
    /// Maximum number of undo entries kept per sequence.
    pub history_depth: usize,
    /// Remote collaborator settings.
    pub services: ServicePrefs,
}

impl Default for EditorPrefs {
    fn default() -> Self {
        Self {
            storage_dir: None,
            default_protocol: "rrc_demo".into(),
            default_actors: vec!["UE".into(), "gNB".into()],
            history_depth: 100,
            services: ServicePrefs::default(),
        }
    }
}

/// Where the schema/suggestion/identifier services live and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePrefs {
    /// Base URL of the collaborator API (e.g. `http://127.0.0.1:8000/api/`).
    /// `None` runs fully offline on local fallbacks.
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ServicePrefs {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_blob_fills_defaults() {
        let prefs: EditorPrefs = serde_json::from_str(r#"{"history_depth": 5}"#).unwrap();
        assert_eq!(prefs.history_depth, 5);
        assert_eq!(prefs.default_protocol, "rrc_demo");
        assert_eq!(prefs.default_actors, ["UE", "gNB"]);
        assert_eq!(prefs.services.timeout_ms, 5_000);
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One JSON file per sequence, grouped by session and protocol.
//!
//! Layout under the repository root:
//!
//! ```text
//! _sequence_index.json                       id -> relative path
//! sessions/<session>/<protocol>/<name>_<id8>.json
//! <protocol>/<name>_<id8>.json               sequences without a session
//! ```
//!
//! The index is a cache. Entries that point outside the root, at missing
//! files, or at files holding another id are ignored, and a missing or
//! unreadable index is rebuilt by scanning the tree.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use msc_core::{sort_newest_first, ListFilter, RepositoryError, Sequence, SequenceId, SequenceRepository};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Name of the id → path index file at the repository root.
pub const INDEX_FILE: &str = "_sequence_index.json";

const SESSIONS_DIR: &str = "sessions";
const MAX_NAME_LEN: usize = 100;
const FALLBACK_NAME: &str = "sequence";
const RESERVED: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make `name` safe as a single path segment.
///
/// Reserved characters become `_`, the result is cut to 100 characters and
/// stripped of leading and trailing dots and spaces. An empty result becomes
/// `sequence`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Filesystem [`SequenceRepository`].
#[derive(Debug)]
pub struct FsSequenceRepository {
    root: PathBuf,
    index: BTreeMap<SequenceId, PathBuf>,
}

impl FsSequenceRepository {
    /// Open (or create) a repository rooted at `root`.
    ///
    /// Loads the index, rebuilding it by scanning when it is missing or
    /// cannot be parsed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let mut repo = Self {
            root,
            index: BTreeMap::new(),
        };
        match repo.read_index() {
            Some(index) => repo.index = index,
            None => repo.rebuild_index()?,
        }
        Ok(repo)
    }

    /// Repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed sequences.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rescan the tree and rewrite the index from what is on disk.
    pub fn rebuild_index(&mut self) -> Result<(), RepositoryError> {
        let mut index = BTreeMap::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Some(id) = scan_candidate(&path) {
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        index.insert(id, relative.to_path_buf());
                    }
                }
            }
        }
        info!(root = %self.root.display(), entries = index.len(), "rebuilt sequence index");
        self.index = index;
        self.write_index()
    }

    /// Path a sequence is stored at, relative to the root.
    pub fn relative_path_for(sequence: &Sequence) -> PathBuf {
        let mut path = PathBuf::new();
        if let Some(session) = &sequence.session_id {
            path.push(SESSIONS_DIR);
            path.push(sanitize_file_name(session));
        }
        path.push(sanitize_file_name(&sequence.protocol));
        path.push(format!(
            "{}_{}.json",
            sanitize_file_name(&sequence.name),
            sequence.id.short()
        ));
        path
    }

    fn read_index(&self) -> Option<BTreeMap<SequenceId, PathBuf>> {
        let bytes = match fs::read(self.root.join(INDEX_FILE)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(%err, "sequence index unreadable");
                return None;
            }
        };
        let raw: BTreeMap<String, String> = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "sequence index malformed");
                return None;
            }
        };
        Some(
            raw.into_iter()
                .filter_map(|(id, path)| {
                    let path = PathBuf::from(path);
                    is_contained(&path).then(|| (SequenceId::new(id), path))
                })
                .collect(),
        )
    }

    fn write_index(&self) -> Result<(), RepositoryError> {
        let raw: BTreeMap<&str, String> = self
            .index
            .iter()
            .map(|(id, path)| (id.as_str(), index_path_text(path)))
            .collect();
        write_atomic(&self.root.join(INDEX_FILE), &serde_json::to_vec_pretty(&raw)?)
    }

    /// Load the file the index names for `id`, if it really holds `id`.
    fn load_indexed(&self, id: &SequenceId) -> Result<Option<Sequence>, RepositoryError> {
        let Some(relative) = self.index.get(id) else {
            return Ok(None);
        };
        match read_sequence(&self.root.join(relative)) {
            Ok(Some(sequence)) if &sequence.id == id => Ok(Some(sequence)),
            Ok(_) => {
                debug!(%id, path = %relative.display(), "stale index entry");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Find `id` by scanning when the index is stale.
    fn scan_for(&self, id: &SequenceId) -> Result<Option<(PathBuf, Sequence)>, RepositoryError> {
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if scan_candidate(&path).as_ref() == Some(id) {
                    if let Some(sequence) = read_sequence(&path)? {
                        return Ok(Some((path, sequence)));
                    }
                }
            }
        }
        Ok(None)
    }

    fn locate(&self, id: &SequenceId) -> Result<Option<(PathBuf, Sequence)>, RepositoryError> {
        if let Some(sequence) = self.load_indexed(id)? {
            let path = self.root.join(&self.index[id]);
            return Ok(Some((path, sequence)));
        }
        self.scan_for(id)
    }
}

impl SequenceRepository for FsSequenceRepository {
    fn create(&mut self, sequence: &Sequence) -> Result<(), RepositoryError> {
        if self.locate(&sequence.id)?.is_some() {
            return Err(RepositoryError::AlreadyExists(sequence.id.clone()));
        }
        self.save(sequence)
    }

    fn get(&self, id: &SequenceId) -> Result<Option<Sequence>, RepositoryError> {
        Ok(self.locate(id)?.map(|(_, sequence)| sequence))
    }

    fn save(&mut self, sequence: &Sequence) -> Result<(), RepositoryError> {
        let relative = Self::relative_path_for(sequence);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&target, &serde_json::to_vec_pretty(sequence)?)?;

        if let Some((previous, _)) = self.locate(&sequence.id)?.filter(|(p, _)| p != &target) {
            debug!(id = %sequence.id, from = %previous.display(), to = %relative.display(), "moved sequence file");
            remove_if_present(&previous)?;
        }
        self.index.insert(sequence.id.clone(), relative);
        self.write_index()
    }

    fn delete(&mut self, id: &SequenceId) -> Result<bool, RepositoryError> {
        let found = self.locate(id)?;
        let had_entry = self.index.remove(id).is_some();
        if let Some((path, _)) = &found {
            remove_if_present(path)?;
        }
        if had_entry {
            self.write_index()?;
        }
        Ok(found.is_some())
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<Sequence>, RepositoryError> {
        let mut out = Vec::new();
        for (id, relative) in &self.index {
            match read_sequence(&self.root.join(relative)) {
                Ok(Some(sequence)) if &sequence.id == id => {
                    if filter.matches(&sequence) {
                        out.push(sequence);
                    }
                }
                Ok(_) => debug!(%id, "skipping stale index entry"),
                Err(err) => warn!(%id, %err, "skipping unreadable sequence"),
            }
        }
        sort_newest_first(&mut out);
        Ok(out)
    }
}

/// Relative, no parent or root components, `.json` extension.
fn is_contained(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn index_path_text(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Id of a file the rebuild scan should index: a `.json` file not starting
/// with `_` or `example_` whose top level carries string `id` and `protocol`.
fn scan_candidate(path: &Path) -> Option<SequenceId> {
    let name = path.file_name()?.to_str()?;
    if !name.ends_with(".json") || name.starts_with('_') || name.starts_with("example_") {
        return None;
    }
    let bytes = fs::read(path).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    value.get("protocol")?.as_str()?;
    value.get("id")?.as_str().map(SequenceId::new)
}

fn read_sequence(path: &Path) -> Result<Option<Sequence>, RepositoryError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RepositoryError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), RepositoryError> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use msc_core::{NewMessage, SequenceDelta};

    fn repo() -> (tempfile::TempDir, FsSequenceRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsSequenceRepository::open(dir.path()).unwrap();
        (dir, repo)
    }

    // ─── File names ──────────────────────────────────────────────────────────

    #[test]
    fn sanitizes_reserved_characters_and_length() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name(" ..attach. "), "attach");
        assert_eq!(sanitize_file_name("..."), "sequence");
        assert_eq!(sanitize_file_name(""), "sequence");
        assert_eq!(sanitize_file_name(&"x".repeat(150)).len(), 100);
    }

    #[test]
    fn layout_groups_by_session_and_protocol() {
        let with = Sequence::new("Attach flow", "rrc_demo", Some("s/1".into()));
        let path = FsSequenceRepository::relative_path_for(&with);
        assert_eq!(
            path,
            PathBuf::from("sessions")
                .join("s_1")
                .join("rrc_demo")
                .join(format!("Attach flow_{}.json", with.id.short()))
        );
        let without = Sequence::new("x", "nas", None);
        assert!(FsSequenceRepository::relative_path_for(&without).starts_with("nas"));
    }

    // ─── CRUD ────────────────────────────────────────────────────────────────

    #[test]
    fn create_get_list_delete() {
        let (_dir, mut repo) = repo();
        let a = Sequence::new("a", "rrc_demo", Some("s1".into()));
        let b = Sequence::new("b", "nas", None);
        repo.create(&a).unwrap();
        repo.create(&b).unwrap();
        assert!(matches!(repo.create(&a), Err(RepositoryError::AlreadyExists(_))));

        assert_eq!(repo.get(&a.id).unwrap().unwrap().name, "a");
        assert!(repo.get(&SequenceId::new("missing")).unwrap().is_none());

        let only_rrc = repo
            .list(&ListFilter {
                protocol: Some("rrc_demo".into()),
                session_id: None,
            })
            .unwrap();
        assert_eq!(only_rrc.len(), 1);
        assert_eq!(repo.list(&ListFilter::default()).unwrap().len(), 2);

        assert!(repo.delete(&a.id).unwrap());
        assert!(!repo.delete(&a.id).unwrap());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn rename_through_update_moves_the_file() {
        let (dir, mut repo) = repo();
        let seq = Sequence::new("before", "rrc_demo", None);
        repo.create(&seq).unwrap();
        let old = dir.path().join(FsSequenceRepository::relative_path_for(&seq));
        assert!(old.exists());

        let updated = repo
            .update(
                &seq.id,
                SequenceDelta {
                    name: Some("after".into()),
                    add_message: Some(NewMessage::new("RRCConnectionRequest", "UE", "gNB")),
                    ..SequenceDelta::default()
                },
            )
            .unwrap();
        assert!(!old.exists());
        let new = dir.path().join(FsSequenceRepository::relative_path_for(&updated));
        assert!(new.exists());
        let stored = repo.get(&seq.id).unwrap().unwrap();
        assert_eq!(stored.name, "after");
        assert_eq!(stored.len(), 1);
    }

    // ─── Index recovery ──────────────────────────────────────────────────────

    #[test]
    fn missing_index_is_rebuilt_by_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let seq = Sequence::new("kept", "rrc_demo", Some("s1".into()));
        {
            let mut repo = FsSequenceRepository::open(dir.path()).unwrap();
            repo.create(&seq).unwrap();
        }
        fs::remove_file(dir.path().join(INDEX_FILE)).unwrap();
        fs::write(dir.path().join("example_demo.json"), r#"{"id":"ex","protocol":"p"}"#).unwrap();
        fs::write(dir.path().join("notes.json"), r#"{"title":"no id"}"#).unwrap();

        let repo = FsSequenceRepository::open(dir.path()).unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(&seq.id).unwrap().unwrap().name, "kept");
        assert!(dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn escaping_or_stale_index_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let seq = Sequence::new("real", "rrc_demo", None);
        {
            let mut repo = FsSequenceRepository::open(dir.path()).unwrap();
            repo.create(&seq).unwrap();
        }
        let index = serde_json::json!({
            "evil": "../outside.json",
            seq.id.as_str(): "rrc_demo/wrong_place.json",
        });
        fs::write(dir.path().join(INDEX_FILE), index.to_string()).unwrap();

        let repo = FsSequenceRepository::open(dir.path()).unwrap();
        assert!(repo.get(&SequenceId::new("evil")).unwrap().is_none());
        // Stale path: found again by scanning.
        assert_eq!(repo.get(&seq.id).unwrap().unwrap().name, "real");
    }
}

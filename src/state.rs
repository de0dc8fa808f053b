//! Durable record of completed links
//!
//! The store is a single JSON document mapping a link to `true`. Every
//! mark rewrites the whole document into a temporary file next to the
//! store and atomically renames it over the old one, so an interrupted
//! process leaves either the previous or the new document behind.

use crate::links::normalize_link;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur while loading or writing the state document
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error on state file: {0}")]
    Io(#[from] io::Error),

    #[error("State file {path} is not a valid state document: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not replace state file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Persisted mapping from link to completion flag
///
/// Links are keyed by their normalized form, see [`normalize_link`].
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    completed: Mutex<BTreeMap<String, bool>>,
}

impl StateStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let completed = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                let raw: BTreeMap<String, bool> =
                    serde_json::from_str(&contents).map_err(|source| StateError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                // Documents written by older runs may carry raw links
                let mut completed = BTreeMap::new();
                for (link, done) in raw {
                    let entry = completed.entry(normalize_link(&link)).or_insert(false);
                    *entry |= done;
                }
                completed
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        ::log::debug!(
            "Loaded state from {} with {} entries",
            path.display(),
            completed.len()
        );

        Ok(Self {
            path,
            completed: Mutex::new(completed),
        })
    }

    /// Path of the state document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff `link` has been marked completed
    pub fn contains(&self, link: &str) -> bool {
        self.lock()
            .get(&normalize_link(link))
            .copied()
            .unwrap_or(false)
    }

    /// Mark `link` completed; the mark is on disk when this returns
    pub fn mark_completed(&self, link: &str) -> Result<(), StateError> {
        let key = normalize_link(link);
        let mut completed = self.lock();
        if completed.get(&key).copied().unwrap_or(false) {
            return Ok(());
        }

        let mut updated = completed.clone();
        updated.insert(key, true);
        self.write(&updated)?;
        *completed = updated;

        ::log::trace!("Marked completed: {}", link);
        Ok(())
    }

    /// Number of completed links
    pub fn len(&self) -> usize {
        self.lock().values().filter(|done| **done).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All completed links, sorted
    pub fn links(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, done)| **done)
            .map(|(link, _)| link.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, bool>> {
        // The map is only replaced after a successful write, so it is
        // consistent even if a holder panicked
        self.completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, completed: &BTreeMap<String, bool>) -> Result<(), StateError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, completed)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join(".state")).unwrap();
        assert!(store.is_empty());
        assert!(!store.contains("https://example.com/site"));
    }

    #[test]
    fn test_mark_is_visible_and_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state");

        let store = StateStore::open(&path).unwrap();
        store.mark_completed("https://example.com/album/1").unwrap();
        assert!(store.contains("https://example.com/album/1"));

        let reopened = StateStore::open(&path).unwrap();
        assert!(reopened.contains("https://example.com/album/1"));
        assert_eq!(reopened.len(), 1);

        let document: BTreeMap<String, bool> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document.get("https://example.com/album/1"), Some(&true));
    }

    #[test]
    fn test_mark_twice_keeps_single_entry() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join(".state")).unwrap();
        store.mark_completed("https://example.com/p?id=1").unwrap();
        store.mark_completed("https://example.com/p?id=1#zoom").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_write_leaves_no_temporary_files() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join(".state")).unwrap();
        for i in 0..5 {
            store
                .mark_completed(&format!("https://example.com/p/{}", i))
                .unwrap();
        }
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = StateStore::open(&path).unwrap();
        store.mark_completed("https://example.com/site").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_legacy_keys_are_normalized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state");
        fs::write(
            &path,
            r#"{"https://example.com/site/": true, "https://example.com/p?b=2&a=1": true}"#,
        )
        .unwrap();

        let store = StateStore::open(&path).unwrap();
        assert!(store.contains("https://example.com/site"));
        assert!(store.contains("https://example.com/p?a=1&b=2"));
    }

    #[test]
    fn test_false_entries_are_not_completed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state");
        fs::write(&path, r#"{"https://example.com/site": false}"#).unwrap();

        let store = StateStore::open(&path).unwrap();
        assert!(!store.contains("https://example.com/site"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".state");
        fs::write(&path, "{\"https://example.com/site\": tr").unwrap();

        assert!(matches!(
            StateStore::open(&path),
            Err(StateError::Corrupt { .. })
        ));
    }
}

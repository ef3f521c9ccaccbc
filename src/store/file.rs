//! JSON-file-per-key store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PersistenceError;

use super::Store;

/// Store writing one file per key under a data directory.
///
/// Keys are sanitized into filenames; writes go through a temp file and an
/// atomic rename so a crash mid-write never leaves a torn value behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| PersistenceError::WriteFailed {
            key: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        let write_err = |e: std::io::Error| PersistenceError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        fs::write(&tmp, value).map_err(write_err)?;
        fs::rename(&tmp, &path).map_err(write_err)?;

        debug!(key = %key, path = %path.display(), bytes = value.len(), "persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        assert_eq!(store.get("odds_soccer_epl").unwrap(), None);

        store.put("odds_soccer_epl", r#"{"timestamp":1,"data":[]}"#).unwrap();
        assert_eq!(
            store.get("odds_soccer_epl").unwrap().as_deref(),
            Some(r#"{"timestamp":1,"data":[]}"#)
        );
    }

    #[test]
    fn keys_are_sanitized_into_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        store.put("odds/soccer epl:live", "x").unwrap();
        assert_eq!(store.get("odds/soccer epl:live").unwrap().as_deref(), Some("x"));
        // Same sanitized name resolves to the same file
        assert_eq!(store.get("odds_soccer_epl_live").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn no_tmp_file_left_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.put("quota", r#"{"date":"2026-08-06","count":1}"#).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }
}

// ============================================================================
// PERSISTENT STORE - JSON blob storage under the app data directory
// ============================================================================
//
// Each slice of app state lives in its own blob file and is read/written as
// a whole unit. Missing or corrupt blobs degrade to the slice's default so
// the app always starts, whatever is on disk.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

// Blob file names, one per persisted slice.
pub const SAVED_RECIPES: &str = "saved_recipes.json";
pub const PLANNER_DATA: &str = "planner_data.json";
pub const MEAL_PHOTOS: &str = "meal_photos.json";
pub const LOGGED_IN: &str = "logged_in.json";

const MAX_BLOB_SIZE: u64 = 50 * 1024 * 1024; // 50 MB max per blob

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("blob exceeds maximum size limit")]
    TooLarge,
}

/// Directory-backed blob store. One JSON file per key.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Loads a blob, falling back to the type's default when the file is
    /// missing, unreadable, or corrupt. Never errors.
    pub fn load<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.try_load(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(err) => {
                warn!(key, error = %err, "resetting corrupt blob to default");
                T::default()
            }
        }
    }

    /// Saves a blob, absorbing failures. Persistence problems must never
    /// leave the in-memory state unusable.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(err) = self.try_save(key, value) {
            warn!(key, error = %err, "failed to persist blob");
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.blob_path(key);
        if !path.exists() {
            return Ok(None);
        }

        // Check file size before reading
        let metadata = fs::metadata(&path)?;
        if metadata.len() > MAX_BLOB_SIZE {
            return Err(StoreError::TooLarge);
        }

        let data = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn try_save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let serialized = serde_json::to_vec_pretty(value)?;
        if serialized.len() > MAX_BLOB_SIZE as usize {
            return Err(StoreError::TooLarge);
        }

        // Write to a temporary file first, then atomic rename
        let path = self.blob_path(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serialized)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Removes a blob if present. Missing files are fine.
    pub fn remove(&self, key: &str) {
        let path = self.blob_path(key);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(key, error = %err, "failed to remove blob");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(dir.path()).expect("store should open in temp dir")
    }

    #[test]
    fn missing_blob_loads_default() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let ids: Vec<String> = store.load(SAVED_RECIPES);
        assert!(ids.is_empty());

        let logged_in: bool = store.load(LOGGED_IN);
        assert!(!logged_in);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let ids = vec!["101".to_string(), "205".to_string()];
        store.save(SAVED_RECIPES, &ids);

        let loaded: Vec<String> = store.load(SAVED_RECIPES);
        assert_eq!(loaded, ids);
    }

    #[test]
    fn corrupt_blob_resets_to_default() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        fs::write(dir.path().join(SAVED_RECIPES), b"{not json at all").unwrap();

        let loaded: Vec<String> = store.load(SAVED_RECIPES);
        assert!(loaded.is_empty());
    }

    #[test]
    fn wrong_shape_blob_resets_to_default() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        // Valid JSON, wrong type for the slice.
        fs::write(dir.path().join(LOGGED_IN), b"[1, 2, 3]").unwrap();

        let logged_in: bool = store.load(LOGGED_IN);
        assert!(!logged_in);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.save(LOGGED_IN, &true);

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec![LOGGED_IN.to_string()]);
        let logged_in: bool = store.load(LOGGED_IN);
        assert!(logged_in);
    }

    #[test]
    fn save_overwrites_previous_blob() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.save(SAVED_RECIPES, &vec!["1".to_string()]);
        store.save(SAVED_RECIPES, &vec!["2".to_string(), "3".to_string()]);

        let loaded: Vec<String> = store.load(SAVED_RECIPES);
        assert_eq!(loaded, vec!["2".to_string(), "3".to_string()]);
    }

    #[test]
    fn remove_deletes_blob() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.save(LOGGED_IN, &true);
        store.remove(LOGGED_IN);

        let logged_in: bool = store.load(LOGGED_IN);
        assert!(!logged_in);
        // Removing again is fine.
        store.remove(LOGGED_IN);
    }
}

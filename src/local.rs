//! Durable local key/value storage.
//!
//! Each key is one JSON file under the data directory. Three keys are used:
//! the Local Cache snapshot, the password-override map, and the stored
//! remote settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::entry::Entry;
use crate::error::GradeFixError;

pub const CACHE_KEY: &str = "grade_fix_data_cache";
pub const PASSWORD_OVERRIDES_KEY: &str = "grade_fix_password_overrides";
pub const REMOTE_SETTINGS_KEY: &str = "grade_fix_firebase_config";

/// Directory-backed key/value slots.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Reads and decodes `key`. Missing key is `Ok(None)`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GradeFixError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Overwrites `key`. Writes a sibling temp file and renames it into place.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), GradeFixError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), GradeFixError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// The single snapshot slot holding the last known entry sequence.
#[derive(Debug, Clone)]
pub struct LocalCache {
    storage: LocalStorage,
}

impl LocalCache {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Last persisted snapshot, or empty. Never fails; unreadable data is logged.
    pub fn read(&self) -> Vec<Entry> {
        match self.storage.get::<Vec<Entry>>(CACHE_KEY) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(%err, "Local cache unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Whether a snapshot has ever been written.
    pub fn exists(&self) -> bool {
        self.storage.path_for(CACHE_KEY).exists()
    }

    /// Overwrites the snapshot wholesale. Failures are logged and swallowed.
    pub fn write(&self, entries: &[Entry]) {
        if let Err(err) = self.storage.set(CACHE_KEY, entries) {
            tracing::warn!(%err, "Failed to persist local cache");
        }
    }
}

/// Username → password overrides set through `passwd`.
pub type PasswordOverrides = BTreeMap<String, String>;

pub fn load_password_overrides(storage: &LocalStorage) -> PasswordOverrides {
    match storage.get::<PasswordOverrides>(PASSWORD_OVERRIDES_KEY) {
        Ok(map) => map.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(%err, "Password overrides unreadable, ignoring");
            PasswordOverrides::new()
        }
    }
}

pub fn save_password_overrides(
    storage: &LocalStorage,
    overrides: &PasswordOverrides,
) -> Result<(), GradeFixError> {
    storage.set(PASSWORD_OVERRIDES_KEY, overrides)
}

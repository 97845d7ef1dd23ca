//! Key/value preference storage.
//!
//! [`FileStore`] keeps a flat TOML table of strings on disk, [`MemoryStore`]
//! keeps everything in memory and is what tests plug in.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::Error;

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.values.lock().insert(key.to_string(), value.to_string());
        store
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences persisted as `key = "value"` lines in a TOML file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file starts out empty; an
    /// unreadable one is logged and also starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_table(&path) {
            Ok(values) => values,
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable preferences");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), entries = values.len(), "opened preference store");

        FileStore {
            path,
            values: Mutex::new(values),
        }
    }
}

fn read_table(path: &Path) -> Result<BTreeMap<String, String>, Error> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path).map_err(|e| Error::Store(e.to_string()))?;
    toml::from_str(&content).map_err(|e| Error::Store(e.to_string()))
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut values = self.values.lock();
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());

        let content = toml::to_string(&updated).map_err(|e| Error::Store(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Store(e.to_string()))?;
        }
        fs::write(&self.path, content).map_err(|e| Error::Store(e.to_string()))?;

        *values = updated;
        Ok(())
    }
}

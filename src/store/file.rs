use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{validate_name, DocumentStore, StoreError, StoreResult, Versioned};

/// Stores each document as `<dir>/<name>.json`.
///
/// Versions are tracked in memory, so the compare-and-set only protects
/// writers inside this process. Writes go through a temp file and a rename
/// so a reader never sees half a document.
pub struct JsonFileStore {
    dir: PathBuf,
    versions: Mutex<HashMap<String, u64>>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            versions: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, name: &str) -> StoreResult<Option<Versioned>> {
        validate_name(name)?;
        let mut versions = self.versions.lock().map_err(|_| StoreError::Poisoned)?;

        match fs::read_to_string(self.path(name)) {
            Ok(body) => {
                let version = *versions.entry(name.to_string()).or_insert(1);
                Ok(Some(Versioned { body, version }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, body: &str, expected_version: u64) -> StoreResult<u64> {
        validate_name(name)?;
        let mut versions = self.versions.lock().map_err(|_| StoreError::Poisoned)?;

        let path = self.path(name);
        let current = if path.exists() {
            *versions.entry(name.to_string()).or_insert(1)
        } else {
            0
        };
        if current != expected_version {
            return Err(StoreError::Conflict(name.to_string()));
        }

        let tmp = self.dir.join(format!(".{}.json.tmp", name));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        let next = current + 1;
        versions.insert(name.to_string(), next);
        Ok(next)
    }
}

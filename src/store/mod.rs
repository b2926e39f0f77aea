//! Document storage.
//!
//! Every resource (content, faq, projects, ...) lives in one named JSON
//! document. Repositories only talk to the [`DocumentStore`] trait so the
//! backend can be a directory of JSON files or a SQLite table.
//!
//! Each document carries a version. Writes are compare-and-set against the
//! version that was read, so two interleaved read-modify-write cycles can no
//! longer silently drop one another's change.

mod file;
mod sqlite;

pub use file::JsonFileStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const CONTENT_DOC: &str = "content";
pub const FAQ_DOC: &str = "faq";
pub const PROJECTS_DOC: &str = "projects";
pub const WINDOWS_DOC: &str = "windows";
pub const BACKGROUND_DOC: &str = "background";
pub const ANALYTICS_DOC: &str = "analytics";
pub const USERS_DOC: &str = "users";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Version conflict on document {0}")]
    Conflict(String),
    #[error("Invalid document name: {0}")]
    InvalidName(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Raw document body plus the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub body: String,
    pub version: u64,
}

pub trait DocumentStore: Send + Sync {
    /// Load a document, `None` if it has never been written.
    fn load(&self, name: &str) -> StoreResult<Option<Versioned>>;

    /// Write a document if its current version equals `expected_version`
    /// (0 meaning "must not exist yet"). Returns the new version.
    fn save(&self, name: &str, body: &str, expected_version: u64) -> StoreResult<u64>;
}

/// Read a document, materialising `default` on first access.
///
/// A document that no longer parses is logged and replaced by the default
/// in memory; the broken body stays on disk until the next write.
pub fn read_document<T, D>(store: &dyn DocumentStore, name: &str, default: D) -> StoreResult<(T, u64)>
where
    T: Serialize + DeserializeOwned,
    D: Fn() -> T,
{
    match store.load(name)? {
        Some(doc) => Ok((parse_or_default(name, &doc.body, &default), doc.version)),
        None => {
            let value = default();
            let body = serde_json::to_string_pretty(&value)?;
            match store.save(name, &body, 0) {
                Ok(version) => Ok((value, version)),
                Err(StoreError::Conflict(_)) => {
                    // Someone else created it between our load and save
                    let doc = store
                        .load(name)?
                        .ok_or_else(|| StoreError::Conflict(name.to_string()))?;
                    Ok((parse_or_default(name, &doc.body, &default), doc.version))
                }
                Err(e) => Err(e),
            }
        }
    }
}

fn parse_or_default<T, D>(name: &str, body: &str, default: &D) -> T
where
    T: DeserializeOwned,
    D: Fn() -> T,
{
    serde_json::from_str(body).unwrap_or_else(|e| {
        log::warn!("Document '{}' is malformed ({}), falling back to default", name, e);
        default()
    })
}

/// Like [`read_document`], but a stored body that no longer parses is an
/// error: writing the default over it would drop every record it holds.
fn read_for_update<T, D>(store: &dyn DocumentStore, name: &str, default: &D) -> StoreResult<(T, u64)>
where
    T: Serialize + DeserializeOwned,
    D: Fn() -> T,
{
    match store.load(name)? {
        Some(doc) => {
            let value = serde_json::from_str(&doc.body).map_err(|e| {
                log::error!("Document '{}' is malformed ({}), refusing to overwrite it", name, e);
                StoreError::Json(e)
            })?;
            Ok((value, doc.version))
        }
        None => read_document(store, name, default),
    }
}

pub fn write_document<T: Serialize>(
    store: &dyn DocumentStore,
    name: &str,
    value: &T,
    expected_version: u64,
) -> StoreResult<u64> {
    let body = serde_json::to_string_pretty(value)?;
    store.save(name, &body, expected_version)
}

/// Read-modify-write a document.
///
/// `apply` runs against the freshly read value; if it fails nothing is
/// written. A document that exists but does not parse is never overwritten.
/// A version conflict re-runs the whole cycle once against the newer state
/// before giving up.
pub fn mutate<T, D, R, E, F>(store: &dyn DocumentStore, name: &str, default: D, mut apply: F) -> Result<R, E>
where
    T: Serialize + DeserializeOwned,
    D: Fn() -> T,
    F: FnMut(&mut T) -> Result<R, E>,
    E: From<StoreError>,
{
    let mut attempt = 0;
    loop {
        let (mut value, version) = read_for_update(store, name, &default)?;
        let out = apply(&mut value)?;
        match write_document(store, name, &value, version) {
            Ok(_) => return Ok(out),
            Err(StoreError::Conflict(doc)) if attempt == 0 => {
                log::warn!("Concurrent write on '{}', retrying", doc);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

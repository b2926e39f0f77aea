//! Repositories over the document store, one per resource.

mod background;
mod content;
mod faq;
mod projects;
mod users;
mod windows;

pub use background::BackgroundRepo;
pub use content::ContentRepo;
pub use faq::{faq_transcript, FaqRepo, FAQ_PLACEHOLDER, FAQ_SECTION, FAQ_SECTION_TITLE};
pub use projects::{ProjectFilter, ProjectRepo};
pub use users::UserRepo;
pub use windows::{default_windows, WindowRepo};

use thiserror::Error;

use crate::store::{read_document, DocumentStore, StoreError, WINDOWS_DOC};

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// One more than the largest id, or 1 for an empty collection.
pub(crate) fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0).max(0) + 1
}

/// Treat blank owner keys as "no owner".
pub(crate) fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// Reject owner keys that don't name an existing window.
pub(crate) fn ensure_window_key(store: &dyn DocumentStore, key: Option<&str>) -> RepoResult<()> {
    let Some(key) = key else {
        return Ok(());
    };
    let (windows, _) = read_document(store, WINDOWS_DOC, default_windows)?;
    if windows.iter().any(|w: &crate::models::WindowConfig| w.key == key) {
        Ok(())
    } else {
        Err(RepoError::Validation(format!("Unknown window key: {}", key)))
    }
}

pub(crate) fn require_text(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Drop duplicate and blank strings, keeping first occurrences in order.
pub(crate) fn dedup_strings(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim().to_string();
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

use chrono::Utc;
use std::sync::Arc;

use super::{next_id, RepoResult};
use crate::models::ContentEntry;
use crate::store::{mutate, read_document, DocumentStore, CONTENT_DOC};

/// Section-keyed text blocks. Entries are created on first write and never removed.
#[derive(Clone)]
pub struct ContentRepo {
    store: Arc<dyn DocumentStore>,
}

impl ContentRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> RepoResult<Vec<ContentEntry>> {
        let (entries, _) = read_document(self.store.as_ref(), CONTENT_DOC, Vec::new)?;
        Ok(entries)
    }

    pub fn get(&self, section: &str) -> RepoResult<Option<ContentEntry>> {
        Ok(self.list()?.into_iter().find(|e| e.section == section))
    }

    /// Overwrite the entry for `section`, or append a new one.
    pub fn upsert(&self, section: &str, title: &str, body: &str) -> RepoResult<ContentEntry> {
        mutate(self.store.as_ref(), CONTENT_DOC, Vec::new, |entries: &mut Vec<ContentEntry>| {
            let now = Utc::now();
            if let Some(entry) = entries.iter_mut().find(|e| e.section == section) {
                entry.title = title.to_string();
                entry.body = body.to_string();
                entry.updated_at = now;
                return Ok(entry.clone());
            }

            let entry = ContentEntry {
                id: next_id(entries.iter().map(|e| e.id)),
                section: section.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                updated_at: now,
            };
            entries.push(entry.clone());
            Ok(entry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn repo() -> ContentRepo {
        ContentRepo::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[test]
    fn test_upsert_then_get_round_trips() {
        let repo = repo();
        repo.upsert("about", "About me", "I build things").unwrap();

        let entry = repo.get("about").unwrap().unwrap();
        assert_eq!(entry.title, "About me");
        assert_eq!(entry.body, "I build things");
        assert_eq!(entry.id, 1);
    }

    #[test]
    fn test_upsert_keeps_one_entry_per_section() {
        let repo = repo();
        repo.upsert("about", "v1", "first").unwrap();
        repo.upsert("contact", "Contact", "mail me").unwrap();
        let updated = repo.upsert("about", "v2", "second").unwrap();

        assert_eq!(updated.id, 1);
        let entries = repo.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().filter(|e| e.section == "about").count(), 1);
        assert_eq!(repo.get("about").unwrap().unwrap().body, "second");
    }

    #[test]
    fn test_missing_section_is_none() {
        assert!(repo().get("nope").unwrap().is_none());
    }
}

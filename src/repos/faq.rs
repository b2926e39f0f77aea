use chrono::Utc;
use std::sync::Arc;

use super::{ensure_window_key, next_id, normalize_key, require_text, RepoError, RepoResult};
use crate::events::{EventProcessor, SiteEvent};
use crate::models::{CreateFaqRequest, FaqItem, UpdateFaqRequest};
use crate::store::{mutate, read_document, DocumentStore, FAQ_DOC};

pub const FAQ_SECTION: &str = "faq";
pub const FAQ_SECTION_TITLE: &str = "Frequently Asked Questions";
pub const FAQ_PLACEHOLDER: &str = "FAQ will be updated soon.";

/// Plain-text FAQ summary: every active item without an owner tab, in
/// (order, id) rank, as `Q: ...\nA: ...` blocks separated by a blank line.
/// Empty input gives an empty string.
pub fn faq_transcript(items: &[FaqItem]) -> String {
    let mut ranked: Vec<&FaqItem> = items
        .iter()
        .filter(|i| i.is_active && i.custom_tab_key.is_none())
        .collect();
    ranked.sort_by_key(|i| (i.order, i.id));

    ranked
        .iter()
        .map(|i| format!("Q: {}\nA: {}\n", i.question, i.answer))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn sort_items(items: &mut [FaqItem]) {
    items.sort_by_key(|i| (i.order, i.id));
}

#[derive(Clone)]
pub struct FaqRepo {
    store: Arc<dyn DocumentStore>,
    events: Arc<EventProcessor>,
}

impl FaqRepo {
    pub fn new(store: Arc<dyn DocumentStore>, events: Arc<EventProcessor>) -> Self {
        Self { store, events }
    }

    /// All items ordered by (order, id).
    pub fn list(&self) -> RepoResult<Vec<FaqItem>> {
        let (mut items, _) = read_document(self.store.as_ref(), FAQ_DOC, Vec::new)?;
        sort_items(&mut items);
        Ok(items)
    }

    /// Active items, optionally narrowed to one owner tab.
    pub fn list_active(&self, custom_tab_key: Option<&str>) -> RepoResult<Vec<FaqItem>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|i| i.is_active)
            .filter(|i| custom_tab_key.is_none() || i.custom_tab_key.as_deref() == custom_tab_key)
            .collect())
    }

    pub fn get(&self, id: i64) -> RepoResult<Option<FaqItem>> {
        Ok(self.list()?.into_iter().find(|i| i.id == id))
    }

    pub fn create(&self, req: CreateFaqRequest) -> RepoResult<FaqItem> {
        if !require_text(&req.question) || !require_text(&req.answer) {
            return Err(RepoError::Validation("Question and answer are required".to_string()));
        }
        let custom_tab_key = normalize_key(req.custom_tab_key);
        ensure_window_key(self.store.as_ref(), custom_tab_key.as_deref())?;

        let (item, snapshot) = mutate(self.store.as_ref(), FAQ_DOC, Vec::new, |items: &mut Vec<FaqItem>| {
            let now = Utc::now();
            let item = FaqItem {
                id: next_id(items.iter().map(|i| i.id)),
                question: req.question.clone(),
                answer: req.answer.clone(),
                order: req.order.unwrap_or(items.len() as i64 + 1),
                is_active: true,
                created_at: now,
                updated_at: now,
                custom_tab_key: custom_tab_key.clone(),
            };
            items.push(item.clone());
            sort_items(items);
            Ok::<_, RepoError>((item, items.clone()))
        })?;

        log::info!("Created FAQ item {}", item.id);
        self.publish(snapshot);
        Ok(item)
    }

    pub fn update(&self, id: i64, patch: UpdateFaqRequest) -> RepoResult<FaqItem> {
        if patch.question.as_deref().is_some_and(|q| !require_text(q))
            || patch.answer.as_deref().is_some_and(|a| !require_text(a))
        {
            return Err(RepoError::Validation("Question and answer cannot be empty".to_string()));
        }
        // Some("") detaches the item, None leaves the owner alone
        let new_owner = patch.custom_tab_key.clone().map(|k| normalize_key(Some(k)));
        if let Some(owner) = &new_owner {
            ensure_window_key(self.store.as_ref(), owner.as_deref())?;
        }

        let (item, snapshot) = mutate(self.store.as_ref(), FAQ_DOC, Vec::new, |items: &mut Vec<FaqItem>| {
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| RepoError::NotFound(format!("FAQ item {}", id)))?;

            if let Some(ref q) = patch.question {
                item.question = q.clone();
            }
            if let Some(ref a) = patch.answer {
                item.answer = a.clone();
            }
            if let Some(order) = patch.order {
                item.order = order;
            }
            if let Some(active) = patch.is_active {
                item.is_active = active;
            }
            if let Some(ref owner) = new_owner {
                item.custom_tab_key = owner.clone();
            }
            item.updated_at = Utc::now();

            let updated = item.clone();
            sort_items(items);
            Ok::<_, RepoError>((updated, items.clone()))
        })?;

        self.publish(snapshot);
        Ok(item)
    }

    pub fn delete(&self, id: i64) -> RepoResult<()> {
        let snapshot = mutate(self.store.as_ref(), FAQ_DOC, Vec::new, |items: &mut Vec<FaqItem>| {
            let before = items.len();
            items.retain(|i| i.id != id);
            if items.len() == before {
                return Err(RepoError::NotFound(format!("FAQ item {}", id)));
            }
            Ok(items.clone())
        })?;

        log::info!("Deleted FAQ item {}", id);
        self.publish(snapshot);
        Ok(())
    }

    /// Tell subscribers the collection changed. The FAQ write has already
    /// committed, so a failed subscriber is logged rather than surfaced; the
    /// next FAQ write recomputes the summary from scratch.
    fn publish(&self, items: Vec<FaqItem>) {
        match self.events.process(&SiteEvent::FaqChanged { items }) {
            Ok(result) => {
                for failed in result.action_results.iter().filter(|r| !r.success) {
                    log::error!(
                        "FAQ change subscriber '{}' failed: {}",
                        failed.subscriber,
                        failed.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            Err(e) => log::error!("FAQ change event failed: {}", e),
        }
    }
}

use std::sync::Arc;

use super::{RepoError, RepoResult};
use crate::models::BackgroundConfig;
use crate::store::{mutate, read_document, DocumentStore, BACKGROUND_DOC};

/// The single desktop background slot.
#[derive(Clone)]
pub struct BackgroundRepo {
    store: Arc<dyn DocumentStore>,
}

impl BackgroundRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> RepoResult<BackgroundConfig> {
        let (config, _) = read_document(self.store.as_ref(), BACKGROUND_DOC, BackgroundConfig::default)?;
        Ok(config)
    }

    /// Replace the background. No history is kept.
    pub fn set(&self, config: BackgroundConfig) -> RepoResult<BackgroundConfig> {
        let saved = mutate(
            self.store.as_ref(),
            BACKGROUND_DOC,
            BackgroundConfig::default,
            |current: &mut BackgroundConfig| {
                *current = config.clone();
                Ok::<_, RepoError>(current.clone())
            },
        )?;
        log::info!("Background updated");
        Ok(saved)
    }
}

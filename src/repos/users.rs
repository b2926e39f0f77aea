use chrono::Utc;
use std::sync::Arc;

use super::{next_id, RepoError, RepoResult};
use crate::models::AdminUser;
use crate::store::{mutate, read_document, DocumentStore, USERS_DOC};

/// Admin accounts. The site has one owner, but the document is a list so a
/// second account can be seeded without a format change.
#[derive(Clone)]
pub struct UserRepo {
    store: Arc<dyn DocumentStore>,
}

impl UserRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn all(&self) -> RepoResult<Vec<AdminUser>> {
        let (users, _) = read_document(self.store.as_ref(), USERS_DOC, Vec::new)?;
        Ok(users)
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.all()?.len())
    }

    /// Case-insensitive email lookup.
    pub fn find_by_email(&self, email: &str) -> RepoResult<Option<AdminUser>> {
        let email = email.trim();
        Ok(self
            .all()?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    pub fn create(&self, email: &str, password_hash: &str, role: &str) -> RepoResult<AdminUser> {
        let email = email.trim().to_lowercase();
        mutate(self.store.as_ref(), USERS_DOC, Vec::new, |users: &mut Vec<AdminUser>| {
            if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
                return Err(RepoError::Conflict(format!("User {} already exists", email)));
            }
            let user = AdminUser {
                id: next_id(users.iter().map(|u| u.id)),
                email: email.clone(),
                password_hash: password_hash.to_string(),
                role: role.to_string(),
                created_at: Utc::now(),
            };
            users.push(user.clone());
            Ok(user)
        })
    }
}

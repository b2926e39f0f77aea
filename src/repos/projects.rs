use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::{dedup_strings, ensure_window_key, next_id, normalize_key, require_text, RepoError, RepoResult};
use crate::models::{CreateProjectRequest, Project, ProjectCategory, UpdateProjectRequest, DEFAULT_CARD_STYLE};
use crate::store::{mutate, read_document, DocumentStore, PROJECTS_DOC};

/// Listing filter. Every set field must match; inactive projects are
/// skipped unless `include_inactive` is set.
#[derive(Debug, Default, Clone)]
pub struct ProjectFilter {
    pub category: Option<ProjectCategory>,
    pub custom_tab_key: Option<String>,
    pub include_inactive: bool,
}

impl ProjectFilter {
    fn matches(&self, p: &Project) -> bool {
        (self.include_inactive || p.is_active)
            && self.category.map_or(true, |c| p.category == c)
            && self
                .custom_tab_key
                .as_deref()
                .map_or(true, |k| p.custom_tab_key.as_deref() == Some(k))
    }
}

fn parse_category(raw: &str) -> RepoResult<ProjectCategory> {
    raw.trim().parse().map_err(RepoError::Validation)
}

#[derive(Clone)]
pub struct ProjectRepo {
    store: Arc<dyn DocumentStore>,
}

impl ProjectRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn all(&self) -> RepoResult<Vec<Project>> {
        let (projects, _) = read_document(self.store.as_ref(), PROJECTS_DOC, Vec::new)?;
        Ok(projects)
    }

    /// Projects matching `filter`, ordered by (display order, id).
    pub fn list(&self, filter: &ProjectFilter) -> RepoResult<Vec<Project>> {
        let mut projects: Vec<Project> = self.all()?.into_iter().filter(|p| filter.matches(p)).collect();
        projects.sort_by_key(|p| (p.display_order, p.id));
        Ok(projects)
    }

    /// Direct lookup; soft-deleted projects are still returned.
    pub fn get(&self, id: i64) -> RepoResult<Option<Project>> {
        Ok(self.all()?.into_iter().find(|p| p.id == id))
    }

    pub fn create(&self, req: CreateProjectRequest) -> RepoResult<Project> {
        if !require_text(&req.title) || !require_text(&req.description) || !require_text(&req.category) {
            return Err(RepoError::Validation(
                "Title, description, and category are required".to_string(),
            ));
        }
        let category = parse_category(&req.category)?;
        let custom_tab_key = normalize_key(req.custom_tab_key);
        ensure_window_key(self.store.as_ref(), custom_tab_key.as_deref())?;

        let project = mutate(self.store.as_ref(), PROJECTS_DOC, Vec::new, |projects: &mut Vec<Project>| {
            let now = Utc::now();
            // Ids are drawn from every stored project, inactive ones included
            let project = Project {
                id: next_id(projects.iter().map(|p| p.id)),
                title: req.title.clone(),
                description: req.description.clone(),
                category,
                image_url: req.image_url.clone().unwrap_or_default(),
                additional_photos: req.photos.clone(),
                keywords: dedup_strings(req.keywords.clone()),
                external_link: req.project_link.clone().unwrap_or_default(),
                tags: dedup_strings(req.tags.clone()),
                display_order: req.order_index.unwrap_or(0),
                is_active: true,
                card_style: Some(
                    req.card_style
                        .clone()
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| DEFAULT_CARD_STYLE.to_string()),
                ),
                custom_tab_key: custom_tab_key.clone(),
                created_at: now,
                updated_at: now,
            };
            projects.push(project.clone());
            Ok::<_, RepoError>(project)
        })?;

        log::info!("Created project {} ({})", project.id, project.title);
        Ok(project)
    }

    /// Merge every field present in `patch`; the id never changes.
    pub fn update(&self, id: i64, patch: UpdateProjectRequest) -> RepoResult<Project> {
        let category = patch.category.as_deref().map(parse_category).transpose()?;
        if patch.title.as_deref().is_some_and(|t| !require_text(t))
            || patch.description.as_deref().is_some_and(|d| !require_text(d))
        {
            return Err(RepoError::Validation("Title and description cannot be empty".to_string()));
        }
        let new_owner = patch.custom_tab_key.clone().map(|k| normalize_key(Some(k)));
        if let Some(owner) = &new_owner {
            ensure_window_key(self.store.as_ref(), owner.as_deref())?;
        }

        mutate(self.store.as_ref(), PROJECTS_DOC, Vec::new, |projects: &mut Vec<Project>| {
            let project = projects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| RepoError::NotFound(format!("Project {}", id)))?;

            if let Some(ref t) = patch.title {
                project.title = t.clone();
            }
            if let Some(ref d) = patch.description {
                project.description = d.clone();
            }
            if let Some(c) = category {
                project.category = c;
            }
            if let Some(ref url) = patch.image_url {
                project.image_url = url.clone();
            }
            if let Some(ref photos) = patch.photos {
                project.additional_photos = photos.clone();
            }
            if let Some(ref keywords) = patch.keywords {
                project.keywords = dedup_strings(keywords.clone());
            }
            if let Some(ref link) = patch.project_link {
                project.external_link = link.clone();
            }
            if let Some(ref tags) = patch.tags {
                project.tags = dedup_strings(tags.clone());
            }
            if let Some(order) = patch.order_index {
                project.display_order = order;
            }
            if let Some(active) = patch.is_active {
                project.is_active = active;
            }
            if let Some(ref style) = patch.card_style {
                project.card_style = Some(style.clone());
            }
            if let Some(ref owner) = new_owner {
                project.custom_tab_key = owner.clone();
            }
            project.updated_at = Utc::now();

            Ok::<_, RepoError>(project.clone())
        })
    }

    /// Mark a project inactive. The record stays in storage.
    pub fn soft_delete(&self, id: i64) -> RepoResult<()> {
        mutate(self.store.as_ref(), PROJECTS_DOC, Vec::new, |projects: &mut Vec<Project>| {
            let project = projects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| RepoError::NotFound(format!("Project {}", id)))?;
            project.is_active = false;
            project.updated_at = Utc::now();
            Ok::<_, RepoError>(())
        })?;
        log::info!("Deactivated project {}", id);
        Ok(())
    }

    /// Physically remove projects that have been inactive for longer than
    /// `older_than`. Returns how many were removed.
    pub fn purge_inactive(&self, older_than: Duration, now: DateTime<Utc>) -> RepoResult<usize> {
        let cutoff = now.checked_sub_signed(older_than).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = mutate(self.store.as_ref(), PROJECTS_DOC, Vec::new, |projects: &mut Vec<Project>| {
            let before = projects.len();
            projects.retain(|p| p.is_active || p.updated_at >= cutoff);
            Ok::<_, RepoError>(before - projects.len())
        })?;
        if removed > 0 {
            log::info!("Purged {} inactive projects", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn repo() -> ProjectRepo {
        ProjectRepo::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    fn new_project(title: &str, category: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            title: title.to_string(),
            description: format!("{} description", title),
            category: category.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults() {
        let repo = repo();
        let p = repo.create(new_project("Engine", "engineering")).unwrap();

        assert_eq!(p.id, 1);
        assert!(p.is_active);
        assert_eq!(p.display_order, 0);
        assert!(p.additional_photos.is_empty());
        assert!(p.keywords.is_empty());
        assert!(p.tags.is_empty());
        assert_eq!(p.card_style.as_deref(), Some(DEFAULT_CARD_STYLE));
    }

    #[test]
    fn test_soft_delete_hides_but_keeps_record() {
        let repo = repo();
        let p = repo.create(new_project("Engine", "engineering")).unwrap();
        repo.soft_delete(p.id).unwrap();

        assert!(repo.list(&ProjectFilter::default()).unwrap().is_empty());
        let stored = repo.get(p.id).unwrap().unwrap();
        assert!(!stored.is_active);
    }

    #[test]
    fn test_ids_continue_past_soft_deleted_records() {
        let repo = repo();
        repo.create(new_project("One", "art")).unwrap();
        let two = repo.create(new_project("Two", "art")).unwrap();
        repo.create(new_project("Three", "art")).unwrap();
        repo.soft_delete(two.id).unwrap();

        let four = repo.create(new_project("Four", "art")).unwrap();
        assert_eq!(four.id, 4);
    }

    #[test]
    fn test_category_and_owner_filters_combine() {
        let repo = repo();
        repo.create(new_project("Engine", "engineering")).unwrap();
        repo.create(new_project("Platformer", "games")).unwrap();
        let mut tabbed = new_project("Tabbed", "games");
        tabbed.custom_tab_key = Some("games".to_string());
        repo.create(tabbed).unwrap();

        let games = repo
            .list(&ProjectFilter {
                category: Some(ProjectCategory::Games),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(games.len(), 2);

        let owned = repo
            .list(&ProjectFilter {
                category: Some(ProjectCategory::Games),
                custom_tab_key: Some("games".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].title, "Tabbed");
    }

    #[test]
    fn test_update_merges_fields_and_keeps_id() {
        let repo = repo();
        let p = repo.create(new_project("Engine", "engineering")).unwrap();
        let updated = repo
            .update(
                p.id,
                UpdateProjectRequest {
                    id: Some(99),
                    title: Some("Engine 2".to_string()),
                    tags: Some(vec!["rust".into(), "rust".into()]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, p.id);
        assert_eq!(updated.title, "Engine 2");
        assert_eq!(updated.description, p.description);
        assert_eq!(updated.tags, vec!["rust".to_string()]);
    }

    #[test]
    fn test_validation() {
        let repo = repo();
        assert!(matches!(
            repo.create(new_project("", "art")),
            Err(RepoError::Validation(_))
        ));
        assert!(matches!(
            repo.create(new_project("Sculpture", "pottery")),
            Err(RepoError::Validation(_))
        ));
        assert!(matches!(repo.soft_delete(5), Err(RepoError::NotFound(_))));
    }

    #[test]
    fn test_purge_inactive_respects_age() {
        let repo = repo();
        let old = repo.create(new_project("Old", "art")).unwrap();
        repo.create(new_project("Live", "art")).unwrap();
        repo.soft_delete(old.id).unwrap();

        // Not old enough yet
        assert_eq!(repo.purge_inactive(Duration::days(30), Utc::now()).unwrap(), 0);
        // Pretend 31 days have passed
        let later = Utc::now() + Duration::days(31);
        assert_eq!(repo.purge_inactive(Duration::days(30), later).unwrap(), 1);
        assert!(repo.get(old.id).unwrap().is_none());
        assert_eq!(repo.list(&ProjectFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_purge_with_extreme_age_keeps_everything() {
        let repo = repo();
        let old = repo.create(new_project("Old", "art")).unwrap();
        repo.soft_delete(old.id).unwrap();

        // A cutoff before the earliest representable date removes nothing
        let removed = repo.purge_inactive(Duration::days(100_000_000), Utc::now()).unwrap();
        assert_eq!(removed, 0);
        assert!(repo.get(old.id).unwrap().is_some());
    }

    #[test]
    fn test_legacy_form_records_survive_reads_and_writes() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let legacy = r#"[
            {"id": 1, "title": "Rocket", "description": "Model rocket", "category": "engineering",
             "orderIndex": "3", "isActive": true, "tags": "[\"space\"]",
             "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"},
            {"id": 2, "title": "Sketch", "description": "Charcoal", "category": "art",
             "orderIndex": 1, "isActive": "true",
             "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"}
        ]"#;
        store.save(PROJECTS_DOC, legacy, 0).unwrap();
        let repo = ProjectRepo::new(store);

        let titles: Vec<String> = repo
            .list(&ProjectFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Sketch".to_string(), "Rocket".to_string()]);

        let created = repo.create(new_project("Third", "games")).unwrap();
        assert_eq!(created.id, 3);
        assert_eq!(repo.get(1).unwrap().unwrap().tags, vec!["space".to_string()]);
    }
}

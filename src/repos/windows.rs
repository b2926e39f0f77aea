use std::sync::Arc;

use super::{next_id, RepoError, RepoResult};
use crate::models::{
    CreateWindowRequest, FaqItem, Project, UpdateCustomPanelRequest, UpdateWindowRequest, WindowConfig,
    WindowKind, WindowLayout,
};
use crate::store::{mutate, read_document, DocumentStore, FAQ_DOC, PROJECTS_DOC, WINDOWS_DOC};

fn builtin(id: i64, key: &str, on_desktop: bool, icon: &str, layout: WindowLayout) -> WindowConfig {
    WindowConfig {
        id,
        key: key.to_string(),
        label: key.to_string(),
        kind: WindowKind::BuiltIn,
        show_on_desktop: on_desktop,
        show_in_home: true,
        order_desktop: id,
        order_home: id,
        is_hidden: false,
        body: None,
        icon: Some(icon.to_string()),
        custom_icon_url: None,
        layout: Some(layout),
    }
}

/// The six built-in windows seeded on first access.
pub fn default_windows() -> Vec<WindowConfig> {
    vec![
        builtin(1, "about", false, "user", WindowLayout::Content),
        builtin(2, "engineering", true, "rocket", WindowLayout::Projects),
        builtin(3, "games", true, "gamepad2", WindowLayout::Projects),
        builtin(4, "art", true, "palette", WindowLayout::Projects),
        builtin(5, "contact", false, "mail", WindowLayout::Content),
        builtin(6, "faq", false, "help-circle", WindowLayout::Faq),
    ]
}

/// A usable order value. Orders are whole positions, so finite values round
/// to the nearest integer (saturating at the i64 range); NaN and infinities
/// are rejected.
fn finite_order(value: Option<f64>) -> Option<i64> {
    value.filter(|v| v.is_finite()).map(|v| v.round() as i64)
}

fn parse_layout(raw: Option<&str>) -> WindowLayout {
    match raw {
        Some("projects") => WindowLayout::Projects,
        Some("faq") => WindowLayout::Faq,
        _ => WindowLayout::Content,
    }
}

#[derive(Clone)]
pub struct WindowRepo {
    store: Arc<dyn DocumentStore>,
}

impl WindowRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Every window, built-in and custom, ordered by id.
    pub fn list(&self) -> RepoResult<Vec<WindowConfig>> {
        let (mut windows, _) = read_document(self.store.as_ref(), WINDOWS_DOC, default_windows)?;
        windows.sort_by_key(|w: &WindowConfig| w.id);
        Ok(windows)
    }

    pub fn custom(&self) -> RepoResult<Vec<WindowConfig>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|w| w.kind == WindowKind::Custom)
            .collect())
    }

    pub fn get(&self, id: i64) -> RepoResult<Option<WindowConfig>> {
        Ok(self.list()?.into_iter().find(|w| w.id == id))
    }

    /// Add a custom window. Kind is always custom; key and orders default
    /// from the new id.
    pub fn create(&self, req: CreateWindowRequest) -> RepoResult<WindowConfig> {
        let window = mutate(self.store.as_ref(), WINDOWS_DOC, default_windows, |windows: &mut Vec<WindowConfig>| {
            let id = next_id(windows.iter().map(|w| w.id));
            let key = req
                .key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("custom-{}", id));

            if windows.iter().any(|w| w.key == key) {
                return Err(RepoError::Validation(format!("Window key '{}' already exists", key)));
            }

            let window = WindowConfig {
                id,
                key,
                label: req
                    .label
                    .clone()
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| "New Window".to_string()),
                kind: WindowKind::Custom,
                show_on_desktop: req.show_on_desktop.unwrap_or(false),
                show_in_home: req.show_in_home.unwrap_or(true),
                order_desktop: finite_order(req.order_desktop).unwrap_or(id),
                order_home: finite_order(req.order_home).unwrap_or(id),
                is_hidden: false,
                body: Some(req.content.clone().unwrap_or_default()),
                icon: Some(req.icon.clone().unwrap_or_else(|| "folder".to_string())),
                custom_icon_url: None,
                layout: Some(parse_layout(req.layout.as_deref())),
            };
            windows.push(window.clone());
            Ok(window)
        })?;

        log::info!("Created custom window {} ({})", window.id, window.key);
        Ok(window)
    }

    /// Merge the fields present in `patch`. An uploaded icon url replaces
    /// the previous one.
    pub fn update(&self, id: i64, patch: UpdateWindowRequest) -> RepoResult<WindowConfig> {
        mutate(self.store.as_ref(), WINDOWS_DOC, default_windows, |windows: &mut Vec<WindowConfig>| {
            let window = windows
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| RepoError::NotFound(format!("Window {}", id)))?;

            if let Some(ref label) = patch.label {
                window.label = label.clone();
            }
            if let Some(v) = patch.show_on_desktop {
                window.show_on_desktop = v;
            }
            if let Some(v) = patch.show_in_home {
                window.show_in_home = v;
            }
            if let Some(order) = finite_order(patch.order_desktop) {
                window.order_desktop = order;
            }
            if let Some(order) = finite_order(patch.order_home) {
                window.order_home = order;
            }
            if let Some(v) = patch.is_hidden {
                window.is_hidden = v;
            }
            if let Some(ref content) = patch.content {
                window.body = Some(content.clone());
            }
            if let Some(ref icon) = patch.icon {
                window.icon = Some(icon.clone());
            }
            if let Some(layout) = patch.layout {
                window.layout = Some(layout);
            }
            if let Some(ref url) = patch.custom_icon_url {
                window.custom_icon_url = Some(url.clone());
            }

            Ok::<_, RepoError>(window.clone())
        })
    }

    /// Update the custom window identified by key (the custom panel editor).
    pub fn update_custom_panel(&self, patch: UpdateCustomPanelRequest) -> RepoResult<WindowConfig> {
        let key = patch
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RepoError::Validation("Key is required".to_string()))?
            .to_string();

        mutate(self.store.as_ref(), WINDOWS_DOC, default_windows, |windows: &mut Vec<WindowConfig>| {
            let window = windows
                .iter_mut()
                .find(|w| w.key == key && w.kind == WindowKind::Custom)
                .ok_or_else(|| RepoError::NotFound("Custom panel".to_string()))?;

            if let Some(ref label) = patch.label {
                window.label = label.clone();
            }
            if let Some(ref content) = patch.content {
                window.body = Some(content.clone());
            }
            if let Some(layout) = patch.layout {
                window.layout = Some(layout);
            }
            if let Some(ref icon) = patch.icon {
                window.icon = Some(icon.clone());
            }
            if let Some(ref url) = patch.custom_icon_url {
                window.custom_icon_url = Some(url.clone());
            }

            Ok::<_, RepoError>(window.clone())
        })
    }

    /// Delete a custom window. Built-ins are refused, and so is a window
    /// that still owns projects or FAQ items.
    pub fn delete(&self, id: i64) -> RepoResult<()> {
        let target = self
            .get(id)?
            .ok_or_else(|| RepoError::NotFound(format!("Window {}", id)))?;
        if target.kind == WindowKind::BuiltIn {
            return Err(RepoError::Forbidden("Built-in windows cannot be deleted".to_string()));
        }

        let dependents = self.dependents(&target.key)?;
        if dependents > 0 {
            return Err(RepoError::Conflict(format!(
                "Window '{}' still owns {} projects or FAQ items",
                target.key, dependents
            )));
        }

        mutate(self.store.as_ref(), WINDOWS_DOC, default_windows, |windows: &mut Vec<WindowConfig>| {
            let before = windows.len();
            windows.retain(|w| w.id != id);
            if windows.len() == before {
                return Err(RepoError::NotFound(format!("Window {}", id)));
            }
            Ok(())
        })?;

        log::info!("Deleted custom window {} ({})", id, target.key);
        Ok(())
    }

    /// Active projects plus FAQ items that reference `key` as their owner tab.
    fn dependents(&self, key: &str) -> RepoResult<usize> {
        let (projects, _) = read_document(self.store.as_ref(), PROJECTS_DOC, Vec::<Project>::new)?;
        let (faq, _) = read_document(self.store.as_ref(), FAQ_DOC, Vec::<FaqItem>::new)?;

        let owned_projects = projects
            .iter()
            .filter(|p| p.is_active && p.custom_tab_key.as_deref() == Some(key))
            .count();
        let owned_faq = faq
            .iter()
            .filter(|i| i.custom_tab_key.as_deref() == Some(key))
            .count();
        Ok(owned_projects + owned_faq)
    }
}

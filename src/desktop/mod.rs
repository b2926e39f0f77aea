//! The simulated desktop: which windows are open, their stacking order, and
//! which one has focus. Also the icon/grid layouts derived from window configs.
//!
//! Pure in-memory state owned by a single page view. Nothing here touches
//! storage.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::WindowConfig;

pub const HOME_WINDOW: &str = "home";
/// z-index reported for a window that has never been raised.
pub const BASE_Z: u32 = 10;
/// First z-index handed out.
pub const FIRST_Z: u32 = 100;

#[derive(Error, Debug, PartialEq)]
pub enum DesktopError {
    #[error("Unknown window: {0}")]
    UnknownWindow(String),
}

#[derive(Debug, Clone)]
pub struct WindowManager {
    /// Keys that may be opened. `None` accepts any key.
    known: Option<HashSet<String>>,
    /// Open windows in the order they were opened.
    open: Vec<String>,
    z: HashMap<String, u32>,
    next_z: u32,
    focused: Option<String>,
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowManager {
    /// Start with only the home window open and focused.
    pub fn new() -> Self {
        let mut wm = Self {
            known: None,
            open: Vec::new(),
            z: HashMap::new(),
            next_z: FIRST_Z,
            focused: None,
        };
        wm.raise(HOME_WINDOW);
        wm
    }

    /// Manager that only accepts home plus the keys of non-hidden `windows`.
    pub fn seeded(windows: &[WindowConfig]) -> Self {
        let mut known: HashSet<String> = windows
            .iter()
            .filter(|w| !w.is_hidden)
            .map(|w| w.key.clone())
            .collect();
        known.insert(HOME_WINDOW.to_string());

        let mut wm = Self::new();
        wm.known = Some(known);
        wm
    }

    fn raise(&mut self, key: &str) {
        if !self.open.iter().any(|k| k == key) {
            self.open.push(key.to_string());
        }
        self.z.insert(key.to_string(), self.next_z);
        self.next_z += 1;
        self.focused = Some(key.to_string());
    }

    /// Open `key` (or bring it forward if already open) and focus it.
    pub fn open(&mut self, key: &str) -> Result<u32, DesktopError> {
        if let Some(known) = &self.known {
            if !known.contains(key) {
                return Err(DesktopError::UnknownWindow(key.to_string()));
            }
        }
        self.raise(key);
        Ok(self.z_index(key))
    }

    /// Raise an open window. Closed windows are left alone and `None` is returned.
    pub fn focus(&mut self, key: &str) -> Option<u32> {
        if !self.is_open(key) {
            return None;
        }
        self.raise(key);
        Some(self.z_index(key))
    }

    /// Close `key`. If it had focus, focus passes to the earliest-opened
    /// window still open. Returns false if the window was not open.
    pub fn close(&mut self, key: &str) -> bool {
        let Some(pos) = self.open.iter().position(|k| k == key) else {
            return false;
        };
        self.open.remove(pos);
        self.z.remove(key);

        if self.focused.as_deref() == Some(key) {
            self.focused = self.open.first().cloned();
        }
        true
    }

    pub fn z_index(&self, key: &str) -> u32 {
        self.z.get(key).copied().unwrap_or(BASE_Z)
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.open.iter().any(|k| k == key)
    }

    /// Open windows in the order they were opened.
    pub fn open_windows(&self) -> &[String] {
        &self.open
    }

    /// Open windows bottom to top.
    pub fn stacking_order(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.open.iter().map(String::as_str).collect();
        keys.sort_by_key(|k| self.z_index(k));
        keys
    }
}

/// Windows that get a desktop icon, in desktop order.
pub fn desktop_icons(windows: &[WindowConfig]) -> Vec<&WindowConfig> {
    let mut icons: Vec<&WindowConfig> = windows
        .iter()
        .filter(|w| w.show_on_desktop && !w.is_hidden)
        .collect();
    icons.sort_by_key(|w| (w.order_desktop, w.id));
    icons
}

/// Windows that appear in the home grid, in home order.
pub fn home_grid(windows: &[WindowConfig]) -> Vec<&WindowConfig> {
    let mut grid: Vec<&WindowConfig> = windows
        .iter()
        .filter(|w| w.show_in_home && !w.is_hidden)
        .collect();
    grid.sort_by_key(|w| (w.order_home, w.id));
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::default_windows;

    #[test]
    fn test_initial_state() {
        let wm = WindowManager::new();
        assert_eq!(wm.open_windows(), &["home".to_string()]);
        assert_eq!(wm.focused(), Some("home"));
        assert_eq!(wm.z_index("home"), FIRST_Z);
        assert_eq!(wm.z_index("about"), BASE_Z);
    }

    #[test]
    fn test_open_focus_close() {
        let mut wm = WindowManager::new();
        assert_eq!(wm.open("about").unwrap(), 101);
        assert_eq!(wm.open("games").unwrap(), 102);
        assert_eq!(wm.focused(), Some("games"));

        // Focusing raises without changing membership
        assert_eq!(wm.focus("about"), Some(103));
        assert_eq!(wm.open_windows().len(), 3);
        assert_eq!(wm.stacking_order(), vec!["home", "games", "about"]);

        assert!(wm.close("about"));
        assert_eq!(wm.focused(), Some("home"));
        assert!(!wm.close("about"));
        assert_eq!(wm.focus("about"), None);
    }

    #[test]
    fn test_reopen_keeps_single_entry() {
        let mut wm = WindowManager::new();
        wm.open("art").unwrap();
        wm.open("art").unwrap();
        assert_eq!(wm.open_windows().iter().filter(|k| *k == "art").count(), 1);
    }

    #[test]
    fn test_closing_everything_leaves_no_focus() {
        let mut wm = WindowManager::new();
        wm.close("home");
        assert_eq!(wm.focused(), None);
        assert!(wm.open_windows().is_empty());
    }

    #[test]
    fn test_seeded_rejects_unknown_keys() {
        let mut windows = default_windows();
        windows[0].is_hidden = true;
        let mut wm = WindowManager::seeded(&windows);

        assert!(wm.open("games").is_ok());
        assert_eq!(wm.open("about"), Err(DesktopError::UnknownWindow("about".to_string())));
        assert_eq!(wm.open("nope"), Err(DesktopError::UnknownWindow("nope".to_string())));
    }

    #[test]
    fn test_desktop_and_home_layouts() {
        let mut windows = default_windows();
        // Move art ahead of engineering on the desktop and hide games
        windows[3].order_desktop = 0;
        windows[2].is_hidden = true;

        let icons: Vec<&str> = desktop_icons(&windows).iter().map(|w| w.key.as_str()).collect();
        assert_eq!(icons, vec!["art", "engineering"]);

        let grid: Vec<&str> = home_grid(&windows).iter().map(|w| w.key.as_str()).collect();
        assert_eq!(grid, vec!["about", "engineering", "art", "contact", "faq"]);
    }
}

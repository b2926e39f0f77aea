use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod lenient;

/// ContentEntry is a titled block of text keyed by section (about, contact, faq, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub id: i64,
    pub section: String,
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
    pub updated_at: DateTime<Utc>,
}

/// FaqItem is one question/answer pair. Items carrying a `custom_tab_key`
/// belong to a custom window and stay out of the default FAQ summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaqItem {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    pub question: String,
    pub answer: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub order: i64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_tab_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Engineering,
    Games,
    Art,
}

impl std::str::FromStr for ProjectCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "engineering" => Ok(ProjectCategory::Engineering),
            "games" => Ok(ProjectCategory::Games),
            "art" => Ok(ProjectCategory::Art),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

pub const DEFAULT_CARD_STYLE: &str = "style1";

/// Project is a portfolio entry. Deleting a project only clears `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: ProjectCategory,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, rename = "photos", deserialize_with = "lenient::strings")]
    pub additional_photos: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub keywords: Vec<String>,
    #[serde(default, rename = "projectLink")]
    pub external_link: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub tags: Vec<String>,
    #[serde(default, rename = "orderIndex", deserialize_with = "lenient::int")]
    pub display_order: i64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_tab_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WindowKind {
    BuiltIn,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WindowLayout {
    Content,
    Projects,
    Faq,
}

/// WindowConfig describes one simulated desktop window and where it shows up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: WindowKind,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub show_on_desktop: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub show_in_home: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub order_desktop: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub order_home: i64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_hidden: bool,
    #[serde(default, rename = "content", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<WindowLayout>,
}

impl WindowConfig {
    /// Icon to render: an uploaded image wins over a named icon.
    pub fn display_icon(&self) -> Option<&str> {
        self.custom_icon_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or(self.icon.as_deref())
    }
}

/// BackgroundConfig is the single global desktop background.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackgroundConfig {
    Solid {
        color: String,
    },
    Gradient {
        from: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        via: Option<String>,
        to: String,
    },
    Image {
        #[serde(rename = "imageUrl")]
        image_url: String,
        #[serde(default)]
        overlay: bool,
    },
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        BackgroundConfig::Gradient {
            from: "#60a5fa".to_string(),
            via: Some("#3b82f6".to_string()),
            to: "#2563eb".to_string(),
        }
    }
}

/// AnalyticsEvent is one recorded page interaction. The timestamp is kept as
/// text so a malformed value only drops that event from rollups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: i64,
    pub visitor_id: String,
    pub page: String,
    pub action: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default)]
    pub session_id: String,
    pub timestamp: String,
}

/// AdminUser is the site owner account used for login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

// Rollup output

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageViews {
    pub page: String,
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyVisits {
    pub date: String,
    pub unique_visitors: u64,
    pub total_views: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReferrerCount {
    pub referrer: String,
    pub visits: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRollup {
    pub page_views: Vec<PageViews>,
    pub daily_visits: Vec<DailyVisits>,
    pub top_referrers: Vec<ReferrerCount>,
}

// Request types for API

#[derive(Debug, Deserialize)]
pub struct UpdateContentRequest {
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFaqRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    pub order: Option<i64>,
    pub custom_tab_key: Option<String>,
}

/// Partial FAQ update. An empty `custom_tab_key` detaches the item from its tab.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFaqRequest {
    pub id: Option<i64>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub order: Option<i64>,
    pub is_active: Option<bool>,
    pub custom_tab_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub project_link: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub order_index: Option<i64>,
    pub card_style: Option<String>,
    pub custom_tab_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub photos: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub project_link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub order_index: Option<i64>,
    pub is_active: Option<bool>,
    pub card_style: Option<String>,
    pub custom_tab_key: Option<String>,
}

/// Window creation payload. Order fields arrive as floats so that a
/// non-numeric multipart value can be told apart from a real number.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWindowRequest {
    pub key: Option<String>,
    pub label: Option<String>,
    pub show_on_desktop: Option<bool>,
    pub show_in_home: Option<bool>,
    pub order_desktop: Option<f64>,
    pub order_home: Option<f64>,
    pub content: Option<String>,
    pub icon: Option<String>,
    pub layout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWindowRequest {
    pub id: Option<i64>,
    pub label: Option<String>,
    pub show_on_desktop: Option<bool>,
    pub show_in_home: Option<bool>,
    pub order_desktop: Option<f64>,
    pub order_home: Option<f64>,
    pub is_hidden: Option<bool>,
    pub content: Option<String>,
    pub icon: Option<String>,
    pub layout: Option<WindowLayout>,
    pub custom_icon_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomPanelRequest {
    pub key: Option<String>,
    pub label: Option<String>,
    pub content: Option<String>,
    pub layout: Option<WindowLayout>,
    pub icon: Option<String>,
    pub custom_icon_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventRequest {
    pub page: Option<String>,
    pub action: Option<String>,
    #[serde(alias = "visitor_id")]
    pub visitor_id: Option<String>,
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_background_tagged_json() {
        let bg: BackgroundConfig = serde_json::from_value(json!({
            "type": "image",
            "imageUrl": "/uploads/a.png",
            "overlay": true
        }))
        .unwrap();
        assert_eq!(
            bg,
            BackgroundConfig::Image {
                image_url: "/uploads/a.png".to_string(),
                overlay: true
            }
        );

        let value = serde_json::to_value(BackgroundConfig::default()).unwrap();
        assert_eq!(value["type"], "gradient");
        assert_eq!(value["via"], "#3b82f6");
    }

    #[test]
    fn test_window_config_field_names() {
        let window: WindowConfig = serde_json::from_value(json!({
            "id": 7,
            "key": "blog",
            "label": "blog",
            "type": "custom",
            "showOnDesktop": true,
            "showInHome": false,
            "orderDesktop": 7,
            "orderHome": 7,
            "isHidden": false,
            "content": "hello",
            "icon": "folder",
            "customIconUrl": "/uploads/icon.svg",
            "layout": "projects"
        }))
        .unwrap();

        assert_eq!(window.kind, WindowKind::Custom);
        assert_eq!(window.body.as_deref(), Some("hello"));
        assert_eq!(window.layout, Some(WindowLayout::Projects));
        assert_eq!(window.display_icon(), Some("/uploads/icon.svg"));

        let value = serde_json::to_value(&window).unwrap();
        assert_eq!(value["type"], "custom");
        assert_eq!(value["orderDesktop"], 7);
    }

    #[test]
    fn test_legacy_form_values_in_stored_project() {
        let project: Project = serde_json::from_value(json!({
            "id": 2,
            "title": "Rocket",
            "description": "Model rocket",
            "category": "engineering",
            "orderIndex": "3",
            "isActive": "false",
            "tags": "[\"diy\",\"space\"]",
            "keywords": "launch",
            "photos": null,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(project.display_order, 3);
        assert!(!project.is_active);
        assert_eq!(project.tags, vec!["diy", "space"]);
        assert_eq!(project.keywords, vec!["launch"]);
        assert!(project.additional_photos.is_empty());

        // Written back in canonical form
        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(value["orderIndex"], 3);
        assert_eq!(value["isActive"], false);
    }

    #[test]
    fn test_builtin_kind_spelling() {
        assert_eq!(serde_json::to_value(WindowKind::BuiltIn).unwrap(), "builtIn");
    }
}

mod error;
mod form;

pub use error::{ApiError, ApiResult};
pub use form::{FormBody, UploadedFile};

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::analytics::{AnalyticsLog, NewEvent, DEFAULT_ROLLUP_DAYS, MAX_WINDOW_DAYS};
use crate::auth::{removal_cookie, session_cookie, AuthService, Claims};
use crate::events::EventProcessor;
use crate::models::*;
use crate::repos::{
    BackgroundRepo, ContentRepo, FaqRepo, ProjectFilter, ProjectRepo, UserRepo, WindowRepo,
};
use crate::store::DocumentStore;
use crate::uploads::{content_type, UploadDir, UploadKind};

pub struct AppState {
    pub content: ContentRepo,
    pub faq: FaqRepo,
    pub projects: ProjectRepo,
    pub windows: WindowRepo,
    pub background: BackgroundRepo,
    pub users: UserRepo,
    pub analytics: AnalyticsLog,
    pub auth_service: Arc<AuthService>,
    pub uploads: UploadDir,
}

impl AppState {
    /// Wire every repository to one document store.
    pub fn new(store: Arc<dyn DocumentStore>, auth_service: Arc<AuthService>, uploads: UploadDir) -> Self {
        let content = ContentRepo::new(store.clone());
        let events = Arc::new(EventProcessor::with_defaults(content.clone()));

        Self {
            faq: FaqRepo::new(store.clone(), events),
            projects: ProjectRepo::new(store.clone()),
            windows: WindowRepo::new(store.clone()),
            background: BackgroundRepo::new(store.clone()),
            users: UserRepo::new(store.clone()),
            analytics: AnalyticsLog::new(store),
            content,
            auth_service,
            uploads,
        }
    }
}

fn parse_id(raw: Option<&str>, missing: &str) -> ApiResult<i64> {
    raw.and_then(|s| s.trim().parse().ok())
        .filter(|id: &i64| *id > 0)
        .ok_or_else(|| ApiError::BadRequest(missing.to_string()))
}

/// A positive day count, capped at [`MAX_WINDOW_DAYS`].
fn parse_days(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse().ok())
        .filter(|d: &i64| *d > 0)
        .map(|d| d.min(MAX_WINDOW_DAYS))
        .unwrap_or(DEFAULT_ROLLUP_DAYS)
}

#[derive(Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ==================== Auth Endpoints ====================

fn session_user(claims: &Claims) -> serde_json::Value {
    json!({ "id": claims.user_id, "email": claims.email, "role": claims.role })
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> ApiResult<HttpResponse> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = state.users.find_by_email(&body.email)?.ok_or_else(invalid)?;
    if !state.auth_service.verify_password(&body.password, &user.password_hash)? {
        log::warn!("Failed login for {}", user.email);
        return Err(invalid());
    }

    let token = state.auth_service.generate_token(&user)?;
    log::info!("{} logged in", user.email);

    Ok(HttpResponse::Ok().cookie(session_cookie(token)).json(ApiResponse::success(json!({
        "user": { "id": user.id, "email": user.email, "role": user.role }
    }))))
}

pub async fn logout() -> impl Responder {
    HttpResponse::Ok().cookie(removal_cookie()).json(ApiResponse::<()>::ok())
}

pub async fn check_auth(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    match state.auth_service.authenticate(&req) {
        Ok(claims) => HttpResponse::Ok().json(json!({
            "isAuthenticated": true,
            "user": session_user(&claims)
        })),
        Err(_) => HttpResponse::Unauthorized().json(json!({ "isAuthenticated": false })),
    }
}

// ==================== Content Endpoints ====================

#[derive(Deserialize)]
pub struct ContentQuery {
    section: Option<String>,
}

pub async fn get_content(state: web::Data<AppState>, query: web::Query<ContentQuery>) -> ApiResult<HttpResponse> {
    match query.section.as_deref().filter(|s| !s.is_empty()) {
        Some(section) => {
            let entry = state
                .content
                .get(section)?
                .ok_or_else(|| ApiError::NotFound("Content not found".to_string()))?;
            Ok(HttpResponse::Ok().json(ApiResponse::success(entry)))
        }
        None => Ok(HttpResponse::Ok().json(ApiResponse::success(state.content.list()?))),
    }
}

pub async fn update_content(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    body: web::Json<UpdateContentRequest>,
) -> ApiResult<HttpResponse> {
    if body.section.trim().is_empty() || body.title.trim().is_empty() || body.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Section, title, and content are required".to_string(),
        ));
    }

    let entry = state.content.upsert(&body.section, &body.title, &body.content)?;
    log::info!("{} updated content section '{}'", claims.email, entry.section);
    Ok(HttpResponse::Ok().json(ApiResponse::success(entry)))
}

// ==================== FAQ Endpoints ====================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    custom_tab_key: Option<String>,
}

pub async fn list_faq(state: web::Data<AppState>, query: web::Query<OwnerQuery>) -> ApiResult<HttpResponse> {
    let owner = query.custom_tab_key.as_deref().filter(|k| !k.is_empty());
    Ok(HttpResponse::Ok().json(ApiResponse::success(state.faq.list_active(owner)?)))
}

pub async fn create_faq(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    body: web::Json<CreateFaqRequest>,
) -> ApiResult<HttpResponse> {
    let item = state.faq.create(body.into_inner())?;
    log::info!("{} created FAQ item {}", claims.email, item.id);
    Ok(HttpResponse::Created().json(ApiResponse::success(item)))
}

pub async fn update_faq(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    body: web::Json<UpdateFaqRequest>,
) -> ApiResult<HttpResponse> {
    let patch = body.into_inner();
    let id = patch
        .id
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("FAQ ID is required".to_string()))?;
    let item = state.faq.update(id, patch)?;
    log::info!("{} updated FAQ item {}", claims.email, item.id);
    Ok(HttpResponse::Ok().json(ApiResponse::success(item)))
}

pub async fn delete_faq(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    query: web::Query<IdQuery>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(query.id.as_deref(), "FAQ ID is required")?;
    state.faq.delete(id)?;
    log::info!("{} deleted FAQ item {}", claims.email, id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

// ==================== Project Endpoints ====================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    category: Option<String>,
    custom_tab_key: Option<String>,
}

pub async fn list_projects(
    state: web::Data<AppState>,
    query: web::Query<ProjectQuery>,
) -> ApiResult<HttpResponse> {
    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => Some(raw.parse::<ProjectCategory>().map_err(ApiError::BadRequest)?),
        None => None,
    };
    let filter = ProjectFilter {
        category,
        custom_tab_key: query.custom_tab_key.clone().filter(|k| !k.is_empty()),
        include_inactive: false,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(state.projects.list(&filter)?)))
}

/// Store an attached project image, if any, and point `imageUrl` at it.
/// Returns the stored URL so a failed write can discard the file.
fn attach_project_image(state: &AppState, form: &mut FormBody) -> ApiResult<Option<String>> {
    let Some(file) = form.take_any_file() else {
        return Ok(None);
    };
    let url = state.uploads.save(UploadKind::ProjectImage, &file.filename, &file.bytes)?;
    form.insert("imageUrl", url.clone());
    Ok(Some(url))
}

/// Remove a just-stored upload when the write it belonged to was rejected.
fn discard_on_error<T>(state: &AppState, url: Option<String>, result: ApiResult<T>) -> ApiResult<T> {
    if result.is_err() {
        if let Some(url) = url {
            state.uploads.discard(&url);
        }
    }
    result
}

pub async fn create_project(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    req: HttpRequest,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let mut form = FormBody::read(&req, payload, state.uploads.max_bytes()).await?;
    let image = attach_project_image(&state, &mut form)?;

    let created = form
        .parse::<CreateProjectRequest>()
        .and_then(|request| state.projects.create(request).map_err(ApiError::from));
    let project = discard_on_error(&state, image, created)?;
    log::info!("{} created project {}", claims.email, project.id);
    Ok(HttpResponse::Created().json(ApiResponse::success(project)))
}

pub async fn update_project(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    req: HttpRequest,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let mut form = FormBody::read(&req, payload, state.uploads.max_bytes()).await?;
    let id = form
        .get_i64("id")
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("Project ID is required".to_string()))?;
    let image = attach_project_image(&state, &mut form)?;

    let updated = form
        .parse::<UpdateProjectRequest>()
        .and_then(|patch| state.projects.update(id, patch).map_err(ApiError::from));
    let project = discard_on_error(&state, image, updated)?;
    log::info!("{} updated project {}", claims.email, project.id);
    Ok(HttpResponse::Ok().json(ApiResponse::success(project)))
}

pub async fn delete_project(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    query: web::Query<IdQuery>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(query.id.as_deref(), "Project ID is required")?;
    state.projects.soft_delete(id)?;
    log::info!("{} deactivated project {}", claims.email, id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

#[derive(Deserialize)]
pub struct DaysQuery {
    days: Option<String>,
}

pub async fn purge_projects(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    query: web::Query<DaysQuery>,
) -> ApiResult<HttpResponse> {
    let days = parse_days(query.days.as_deref());
    let removed = state.projects.purge_inactive(Duration::days(days), Utc::now())?;
    log::info!("{} purged {} projects inactive for {} days", claims.email, removed, days);
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({ "removed": removed }))))
}

// ==================== Window Endpoints ====================

pub async fn list_windows(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(state.windows.list()?)))
}

pub async fn create_window(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    req: HttpRequest,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let form = FormBody::read(&req, payload, state.uploads.max_bytes()).await?;
    let window = state.windows.create(form.parse()?)?;
    log::info!("{} created window '{}'", claims.email, window.key);
    Ok(HttpResponse::Created().json(ApiResponse::success(window)))
}

/// Store an uploaded `icon` file and point `customIconUrl` at it.
fn attach_icon(state: &AppState, form: &mut FormBody, kind: UploadKind) -> ApiResult<Option<String>> {
    let Some(file) = form.take_file("icon") else {
        return Ok(None);
    };
    let url = state.uploads.save(kind, &file.filename, &file.bytes)?;
    form.insert("customIconUrl", url.clone());
    Ok(Some(url))
}

pub async fn update_window(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    req: HttpRequest,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let mut form = FormBody::read(&req, payload, state.uploads.max_bytes()).await?;
    let id = form
        .get_i64("id")
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("ID is required".to_string()))?;
    let icon = attach_icon(&state, &mut form, UploadKind::WindowIcon)?;

    let updated = form
        .parse::<UpdateWindowRequest>()
        .and_then(|patch| state.windows.update(id, patch).map_err(ApiError::from));
    let window = discard_on_error(&state, icon, updated)?;
    log::info!("{} updated window '{}'", claims.email, window.key);
    Ok(HttpResponse::Ok().json(ApiResponse::success(window)))
}

pub async fn delete_window(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    query: web::Query<IdQuery>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(query.id.as_deref(), "ID is required")?;
    state.windows.delete(id)?;
    log::info!("{} deleted window {}", claims.email, id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

// ==================== Custom Panel Endpoints ====================

#[derive(Deserialize)]
pub struct KeyQuery {
    key: Option<String>,
}

pub async fn get_custom_panels(
    state: web::Data<AppState>,
    query: web::Query<KeyQuery>,
) -> ApiResult<HttpResponse> {
    let custom = state.windows.custom()?;
    match query.key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            let panel = custom
                .into_iter()
                .find(|w| w.key == key)
                .ok_or_else(|| ApiError::NotFound("Custom panel not found".to_string()))?;
            Ok(HttpResponse::Ok().json(ApiResponse::success(panel)))
        }
        None => Ok(HttpResponse::Ok().json(ApiResponse::success(custom))),
    }
}

pub async fn update_custom_panel(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    req: HttpRequest,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let mut form = FormBody::read(&req, payload, state.uploads.max_bytes()).await?;
    let icon = attach_icon(&state, &mut form, UploadKind::PanelIcon)?;

    let updated = form
        .parse::<UpdateCustomPanelRequest>()
        .and_then(|patch| state.windows.update_custom_panel(patch).map_err(ApiError::from));
    let panel = discard_on_error(&state, icon, updated)?;
    log::info!("{} updated custom panel '{}'", claims.email, panel.key);
    Ok(HttpResponse::Ok().json(ApiResponse::success(panel)))
}

// ==================== Background Endpoints ====================

pub async fn get_background(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(state.background.get()?)))
}

fn form_color(form: &FormBody, key: &str, default: &str) -> String {
    form.get_str(key)
        .filter(|c| !c.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Build a background from form fields. Image backgrounds need an `image` file.
fn background_from_form(state: &AppState, form: &mut FormBody) -> ApiResult<BackgroundConfig> {
    match form.get_str("type").unwrap_or("gradient") {
        "image" => {
            let file = form
                .take_file("image")
                .ok_or_else(|| ApiError::BadRequest("Image file is required".to_string()))?;
            let image_url = state.uploads.save(UploadKind::Background, &file.filename, &file.bytes)?;
            Ok(BackgroundConfig::Image {
                image_url,
                overlay: form.get_bool("overlay"),
            })
        }
        "solid" => Ok(BackgroundConfig::Solid {
            color: form_color(form, "color", "#000000"),
        }),
        _ => Ok(BackgroundConfig::Gradient {
            from: form_color(form, "from", "#60a5fa"),
            via: Some(form_color(form, "via", "#3b82f6")),
            to: form_color(form, "to", "#2563eb"),
        }),
    }
}

pub async fn set_background(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    req: HttpRequest,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let is_multipart = actix_web::HttpMessage::content_type(&req).starts_with("multipart/form-data");
    let mut form = FormBody::read(&req, payload, state.uploads.max_bytes()).await?;

    let config = if is_multipart {
        background_from_form(&state, &mut form)?
    } else {
        form.parse()?
    };

    let saved = state.background.set(config)?;
    log::info!("{} changed the background", claims.email);
    Ok(HttpResponse::Ok().json(ApiResponse::success(saved)))
}

// ==================== Analytics Endpoints ====================

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|h| h.to_str().ok())
}

pub async fn track_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<TrackEventRequest>>,
) -> ApiResult<HttpResponse> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let ip_address = header(&req, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let event = NewEvent {
        visitor_id: non_empty(body.visitor_id).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        page: non_empty(body.page).unwrap_or_else(|| "/".to_string()),
        action: non_empty(body.action).unwrap_or_else(|| "pageview".to_string()),
        user_agent: header(&req, "user-agent").unwrap_or_default().to_string(),
        ip_address,
        referrer: non_empty(body.referrer).or_else(|| non_empty(header(&req, "referer").map(str::to_string))),
        session_id: non_empty(body.session_id).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    };

    state.analytics.record(event)?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

pub async fn get_analytics(
    state: web::Data<AppState>,
    _claims: web::ReqData<Claims>,
    query: web::Query<DaysQuery>,
) -> ApiResult<HttpResponse> {
    let days = parse_days(query.days.as_deref());
    Ok(HttpResponse::Ok().json(ApiResponse::success(state.analytics.rollup(days)?)))
}

// ==================== Uploaded Files ====================

pub async fn serve_upload(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let filename = path.into_inner();
    let bytes = state.uploads.read(&filename)?;
    Ok(HttpResponse::Ok().content_type(content_type(&filename)).body(bytes))
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))
        .route("/api/health", web::get().to(health))

        // Auth routes
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/logout", web::post().to(logout))
        .route("/api/auth/check", web::get().to(check_auth))

        // Content
        .route("/api/content", web::get().to(get_content))
        .route("/api/content", web::put().to(update_content))

        // FAQ
        .route("/api/faq", web::get().to(list_faq))
        .route("/api/faq", web::post().to(create_faq))
        .route("/api/faq", web::put().to(update_faq))
        .route("/api/faq", web::delete().to(delete_faq))

        // Projects
        .route("/api/projects", web::get().to(list_projects))
        .route("/api/projects", web::post().to(create_project))
        .route("/api/projects", web::put().to(update_project))
        .route("/api/projects", web::delete().to(delete_project))
        .route("/api/projects/purge", web::post().to(purge_projects))

        // Windows
        .route("/api/windows", web::get().to(list_windows))
        .route("/api/windows", web::post().to(create_window))
        .route("/api/windows", web::put().to(update_window))
        .route("/api/windows", web::delete().to(delete_window))

        // Custom panels
        .route("/api/custom-panels", web::get().to(get_custom_panels))
        .route("/api/custom-panels", web::put().to(update_custom_panel))

        // Background
        .route("/api/background", web::get().to(get_background))
        .route("/api/background", web::post().to(set_background))

        // Analytics
        .route("/api/analytics", web::post().to(track_event))
        .route("/api/analytics", web::get().to(get_analytics))

        // Uploaded images
        .route("/uploads/{filename}", web::get().to(serve_upload));
}

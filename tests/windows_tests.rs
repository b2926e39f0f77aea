use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use deskfolio::api::{self, AppState};
use deskfolio::auth::{AuthGate, AuthService, AUTH_COOKIE};
use deskfolio::desktop::{desktop_icons, home_grid, WindowManager};
use deskfolio::models::AdminUser;
use deskfolio::store::SqliteStore;
use deskfolio::uploads::UploadDir;

const BOUNDARY: &str = "deskfolio-test-boundary";

fn create_app_state(auth_service: Arc<AuthService>) -> (web::Data<AppState>, tempfile::TempDir) {
    let uploads_dir = tempfile::tempdir().unwrap();
    let uploads = UploadDir::new(uploads_dir.path(), 1024 * 1024).unwrap();
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    (web::Data::new(AppState::new(store, auth_service, uploads)), uploads_dir)
}

fn admin_cookie(auth_service: &AuthService) -> Cookie<'static> {
    let admin = AdminUser {
        id: 1,
        email: "owner@example.com".to_string(),
        password_hash: String::new(),
        role: "admin".to_string(),
        created_at: Utc::now(),
    };
    Cookie::new(AUTH_COOKIE, auth_service.generate_token(&admin).unwrap())
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((field, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[actix_web::test]
async fn test_builtins_listed_and_protected() {
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (state, _uploads) = create_app_state(auth_service.clone());

    let app = test::init_service(
        App::new()
            .wrap(AuthGate::new(auth_service.clone()))
            .app_data(state.clone())
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/windows").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let windows = body["data"].as_array().unwrap();
    assert_eq!(windows.len(), 6);
    assert!(windows.iter().all(|w| w["type"] == "builtIn"));

    let req = test::TestRequest::delete()
        .uri("/api/windows?id=1")
        .cookie(admin_cookie(&auth_service))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Built-in windows cannot be deleted");
    assert_eq!(state.windows.list().unwrap().len(), 6);
}

#[actix_web::test]
async fn test_create_and_delete_custom_window() {
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (state, _uploads) = create_app_state(auth_service.clone());

    let app = test::init_service(
        App::new()
            .wrap(AuthGate::new(auth_service.clone()))
            .app_data(state.clone())
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/windows")
        .cookie(admin_cookie(&auth_service))
        .set_json(json!({ "label": "Blog", "layout": "projects" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let window = &body["data"];
    assert_eq!(window["id"], 7);
    assert_eq!(window["key"], "custom-7");
    assert_eq!(window["type"], "custom");
    assert_eq!(window["orderDesktop"], 7);
    assert_eq!(window["showInHome"], true);
    assert_eq!(window["showOnDesktop"], false);
    assert_eq!(window["icon"], "folder");
    assert_eq!(window["layout"], "projects");

    let req = test::TestRequest::delete()
        .uri("/api/windows?id=7")
        .cookie(admin_cookie(&auth_service))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let keys: Vec<String> = state.windows.list().unwrap().into_iter().map(|w| w.key).collect();
    assert_eq!(keys, vec!["about", "engineering", "games", "art", "contact", "faq"]);

    let req = test::TestRequest::delete()
        .uri("/api/windows?id=7")
        .cookie(admin_cookie(&auth_service))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_window_with_dependents_cannot_be_deleted() {
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (state, _uploads) = create_app_state(auth_service.clone());

    let app = test::init_service(
        App::new()
            .wrap(AuthGate::new(auth_service.clone()))
            .app_data(state.clone())
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/windows")
        .cookie(admin_cookie(&auth_service))
        .set_json(json!({ "key": "blog" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .cookie(admin_cookie(&auth_service))
        .set_json(json!({ "title": "Post", "description": "d", "category": "art", "customTabKey": "blog" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::delete()
        .uri("/api/windows?id=7")
        .cookie(admin_cookie(&auth_service))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri("/api/projects?customTabKey=blog").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_multipart_update_with_icon() {
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (state, _uploads) = create_app_state(auth_service.clone());

    let app = test::init_service(
        App::new()
            .wrap(AuthGate::new(auth_service.clone()))
            .app_data(state.clone())
            .configure(api::configure_routes),
    )
    .await;

    let body = multipart(
        &[
            ("id", "2"),
            ("label", "Code"),
            ("showOnDesktop", "false"),
            ("orderHome", "not-a-number"),
        ],
        Some(("icon", "rocket.svg", b"<svg/>")),
    );
    let req = test::TestRequest::put()
        .uri("/api/windows")
        .cookie(admin_cookie(&auth_service))
        .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let window = &body["data"];
    assert_eq!(window["label"], "Code");
    assert_eq!(window["key"], "engineering");
    assert_eq!(window["showOnDesktop"], false);
    // Unparseable order keeps the current value
    assert_eq!(window["orderHome"], 2);
    assert_eq!(window["icon"], "rocket");
    assert!(window["customIconUrl"].as_str().unwrap().ends_with("-rocket.svg"));

    let stored = state.windows.get(2).unwrap().unwrap();
    assert_eq!(stored.display_icon(), stored.custom_icon_url.as_deref());
}

#[actix_web::test]
async fn test_custom_panels() {
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (state, _uploads) = create_app_state(auth_service.clone());

    let app = test::init_service(
        App::new()
            .wrap(AuthGate::new(auth_service.clone()))
            .app_data(state.clone())
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/custom-panels").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!([]));

    let req = test::TestRequest::post()
        .uri("/api/windows")
        .cookie(admin_cookie(&auth_service))
        .set_json(json!({ "key": "notes", "label": "Notes" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::put()
        .uri("/api/custom-panels")
        .cookie(admin_cookie(&auth_service))
        .set_json(json!({ "key": "notes", "content": "Hello", "layout": "faq" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/custom-panels?key=notes").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["content"], "Hello");
    assert_eq!(body["data"]["layout"], "faq");
    assert_eq!(body["data"]["label"], "Notes");

    let req = test::TestRequest::get().uri("/api/custom-panels?key=about").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri("/api/custom-panels")
        .cookie(admin_cookie(&auth_service))
        .set_json(json!({ "content": "no key" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Key is required");
}

#[actix_web::test]
async fn test_window_manager_seeded_from_stored_windows() {
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (state, _uploads) = create_app_state(auth_service);

    let windows = state.windows.list().unwrap();
    let icons: Vec<&str> = desktop_icons(&windows).iter().map(|w| w.key.as_str()).collect();
    assert_eq!(icons, vec!["engineering", "games", "art"]);
    assert_eq!(home_grid(&windows).len(), 6);

    let mut wm = WindowManager::seeded(&windows);
    assert_eq!(wm.focused(), Some("home"));
    wm.open("games").unwrap();
    wm.open("faq").unwrap();
    assert!(wm.open("custom-99").is_err());
    assert!(wm.close("faq"));
    assert_eq!(wm.focused(), Some("home"));
}

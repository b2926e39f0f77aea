use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;

use deskfolio::api::{self, AppState};
use deskfolio::auth::{AuthGate, AuthService};
use deskfolio::config::{Config, StorageBackend};
use deskfolio::repos::UserRepo;
use deskfolio::store::{DocumentStore, JsonFileStore, SqliteStore};
use deskfolio::uploads::UploadDir;

fn to_io(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

/// Create the admin account from the environment when no users exist yet.
fn seed_admin(config: &Config, users: &UserRepo, auth_service: &AuthService) -> std::io::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    if users.count().map_err(to_io)? > 0 {
        return Ok(());
    }

    log::info!("Creating admin user from environment: {}", email);
    let password_hash = auth_service.hash_password(password).map_err(to_io)?;
    users.create(email, &password_hash, "admin").map_err(to_io)?;
    log::info!("Admin user created successfully");
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();

    let store: Arc<dyn DocumentStore> = match config.storage {
        StorageBackend::File => Arc::new(JsonFileStore::new(&config.data_dir).map_err(to_io)?),
        StorageBackend::Sqlite => {
            if let Some(parent) = config.sqlite_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::new(&config.sqlite_path).map_err(to_io)?)
        }
    };
    log::info!("Storage backend: {}", config.storage);

    let auth_service = Arc::new(AuthService::new(config.jwt_secret.clone()));
    seed_admin(&config, &UserRepo::new(store.clone()), &auth_service)?;

    let uploads = UploadDir::new(&config.uploads_dir, config.max_upload_bytes).map_err(to_io)?;
    let state = web::Data::new(AppState::new(store, auth_service.clone(), uploads));
    // Multipart bodies carry the upload plus its form fields
    let payload_limit = config.max_upload_bytes + 64 * 1024;

    log::info!("Starting deskfolio server on port {}", config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(AuthGate::new(auth_service.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(payload_limit))
            .app_data(web::JsonConfig::default().limit(payload_limit))
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}

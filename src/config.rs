use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Which `DocumentStore` implementation backs the repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub storage: StorageBackend,
    pub sqlite_path: PathBuf,
    pub jwt_secret: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let sqlite_path = var("SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("site.db"));

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            "default_jwt_secret_change_me".to_string()
        });

        Self {
            port: try_load("PORT", 3000),
            uploads_dir: PathBuf::from(
                var("UPLOADS_DIR").unwrap_or_else(|| "public/uploads".to_string()),
            ),
            storage: try_load("STORAGE_BACKEND", StorageBackend::File),
            sqlite_path,
            data_dir,
            jwt_secret,
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {} value '{}': {}, using default: {}", key, raw, e, default);
            default
        }),
        None => {
            log::debug!("{} not set, using default: {}", key, default);
            default
        }
    }
}

//! Image uploads.
//!
//! Files land flat in one public directory under a server-chosen name:
//! `{unix millis}-{8 hex chars}-{sanitized original name}`.

use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File exceeds the {0} byte upload limit")]
    TooLarge(usize),
    #[error("Invalid file name")]
    InvalidName,
    #[error("File not found")]
    NotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the upload is for; each purpose has its own extension allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    ProjectImage,
    Background,
    WindowIcon,
    PanelIcon,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::ProjectImage | UploadKind::Background => &["jpg", "jpeg", "png", "gif"],
            UploadKind::WindowIcon => &["jpg", "jpeg", "png", "gif", "svg"],
            UploadKind::PanelIcon => &["jpg", "jpeg", "png", "gif", "svg", "webp"],
        }
    }

    pub fn accepts(self, filename: &str) -> bool {
        extension(filename)
            .map(|ext| self.allowed_extensions().contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Replace anything outside `[A-Za-z0-9.]` with an underscore.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

pub fn content_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn check_name(filename: &str) -> Result<(), UploadError> {
    if filename.is_empty()
        || filename.starts_with('.')
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(UploadError::InvalidName);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UploadDir {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadDir {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Result<Self, UploadError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store `bytes` and return the public URL of the new file.
    pub fn save(&self, kind: UploadKind, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        if !kind.accepts(original_name) {
            return Err(UploadError::UnsupportedType(
                extension(original_name).unwrap_or_else(|| original_name.to_string()),
            ));
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge(self.max_bytes));
        }

        let short_id = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            &short_id[..8],
            sanitize_filename(original_name)
        );

        let mut file = fs::File::create(self.dir.join(&filename))?;
        file.write_all(bytes)?;
        log::info!("Stored upload {} ({} bytes)", filename, bytes.len());

        Ok(format!("{}/{}", PUBLIC_PREFIX, filename))
    }

    /// Read a previously stored file. Names that could escape the directory
    /// are refused.
    pub fn read(&self, filename: &str) -> Result<Vec<u8>, UploadError> {
        check_name(filename)?;
        fs::read(self.dir.join(filename)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => UploadError::NotFound,
            _ => UploadError::Io(e),
        })
    }

    /// Delete a file stored by [`UploadDir::save`], given its public URL.
    /// Failures are logged; the caller is already reporting another error.
    pub fn discard(&self, url: &str) {
        let filename = url
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(url);
        if check_name(filename).is_err() {
            log::warn!("Refusing to discard upload {}", url);
            return;
        }
        match fs::remove_file(self.dir.join(filename)) {
            Ok(()) => log::info!("Discarded upload {}", filename),
            Err(e) => log::warn!("Could not discard upload {}: {}", filename, e),
        }
    }
}

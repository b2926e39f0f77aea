//! Request bodies that may arrive as JSON or as multipart form data.
//!
//! Multipart text fields are all strings on the wire, so known numeric,
//! boolean and list fields are coerced before the body is deserialised into
//! a request type. Files are kept aside for the handler to store.

use actix_multipart::Multipart;
use actix_web::{web, HttpMessage, HttpRequest};
use futures_util::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use super::error::{ApiError, ApiResult};
use crate::uploads::UploadError;

const NUMERIC_FIELDS: &[&str] = &["id", "order", "orderIndex", "orderDesktop", "orderHome"];
const BOOL_FIELDS: &[&str] = &["showOnDesktop", "showInHome", "isHidden", "isActive", "overlay"];
const LIST_FIELDS: &[&str] = &["tags", "keywords", "photos"];

#[derive(Debug)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FormBody {
    fields: Map<String, Value>,
    files: Vec<UploadedFile>,
}

impl FormBody {
    /// Read the whole body, refusing anything over `limit` bytes.
    pub async fn read(req: &HttpRequest, payload: web::Payload, limit: usize) -> ApiResult<Self> {
        if req.content_type().starts_with("multipart/form-data") {
            Self::read_multipart(req, payload, limit).await
        } else {
            Self::read_json(payload, limit).await
        }
    }

    async fn read_json(mut payload: web::Payload, limit: usize) -> ApiResult<Self> {
        let mut body = web::BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if body.len() + chunk.len() > limit {
                return Err(UploadError::TooLarge(limit).into());
            }
            body.extend_from_slice(&chunk);
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice(&body) {
            Ok(Value::Object(fields)) => Ok(Self {
                fields,
                files: Vec::new(),
            }),
            Ok(_) => Err(ApiError::BadRequest("Expected a JSON object".to_string())),
            Err(e) => Err(ApiError::BadRequest(format!("Invalid JSON: {}", e))),
        }
    }

    async fn read_multipart(req: &HttpRequest, payload: web::Payload, limit: usize) -> ApiResult<Self> {
        let mut form = Self::default();
        let mut total = 0usize;
        let mut multipart = Multipart::new(req.headers(), payload);

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| ApiError::BadRequest(format!("Malformed form data: {}", e)))?;
            let name = field.name().unwrap_or_default().to_string();
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);

            let mut data = Vec::new();
            while let Some(chunk) = field
                .try_next()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {}", e)))?
            {
                total += chunk.len();
                if total > limit {
                    return Err(UploadError::TooLarge(limit).into());
                }
                data.extend_from_slice(&chunk);
            }

            match filename {
                // An empty file input still sends a part with a blank filename
                Some(f) if f.is_empty() && data.is_empty() => {}
                Some(filename) => form.files.push(UploadedFile {
                    field: name,
                    filename,
                    bytes: data,
                }),
                None => {
                    let text = String::from_utf8(data)
                        .map_err(|_| ApiError::BadRequest(format!("Field '{}' is not valid UTF-8", name)))?;
                    let value = coerce_field(&name, text);
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.fields.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Remove and return the file sent under `field`.
    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        let pos = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(pos))
    }

    /// Remove and return the first file, whatever field it came in.
    pub fn take_any_file(&mut self) -> Option<UploadedFile> {
        if self.files.is_empty() {
            None
        } else {
            Some(self.files.remove(0))
        }
    }

    pub fn parse<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
    }
}

/// Turn a multipart text value into the JSON type its field name implies.
/// Numbers that don't parse become null so the repository default applies.
fn coerce_field(name: &str, raw: String) -> Value {
    if NUMERIC_FIELDS.contains(&name) {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::from(n);
        }
        return trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if BOOL_FIELDS.contains(&name) {
        return Value::Bool(matches!(raw.trim(), "true" | "on" | "1"));
    }
    if LIST_FIELDS.contains(&name) {
        return match serde_json::from_str::<Value>(&raw) {
            Ok(list @ Value::Array(_)) => list,
            _ if raw.trim().is_empty() => Value::Array(Vec::new()),
            _ => Value::Array(vec![Value::String(raw)]),
        };
    }
    Value::String(raw)
}

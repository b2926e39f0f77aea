use actix_web::body::EitherBody;
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::{Error, HttpMessage, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use futures_util::future::{ok, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;

use crate::models::{AdminUser, ApiResponse};

pub const AUTH_COOKIE: &str = "auth-token";
const TOKEN_DAYS: i64 = 7;
const BCRYPT_COST: u32 = 10;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    Missing,
    #[error("Invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Identity carried in the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(bcrypt::hash(password, BCRYPT_COST)?)
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        Ok(bcrypt::verify(password, hash)?)
    }

    /// Issue a 7-day session token for `user`.
    pub fn generate_token(&self, user: &AdminUser) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_DAYS)).timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?)
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Claims from the request's session cookie, or a bearer header as a fallback.
    pub fn authenticate(&self, req: &HttpRequest) -> Result<Claims, AuthError> {
        let token = request_token(req).ok_or(AuthError::Missing)?;
        self.validate_token(&token)
    }
}

fn request_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(AUTH_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Session cookie set on login.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(TOKEN_DAYS))
        .finish()
}

/// Expired cookie that clears the session on logout.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(AUTH_COOKIE, "").path("/").http_only(true).finish();
    cookie.make_removal();
    cookie
}

/// Which requests need a session. Reads are public, writes are not, except
/// the login routes and analytics ingestion. Reading analytics needs a session.
pub fn requires_auth(method: &Method, path: &str) -> bool {
    if !path.starts_with("/api/") || path.starts_with("/api/auth/") {
        return false;
    }
    if path == "/api/analytics" {
        return *method != Method::POST && *method != Method::OPTIONS;
    }
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Middleware that rejects protected requests without a valid session
/// before any handler runs, and hands valid claims to handlers through the
/// request extensions.
#[derive(Clone)]
pub struct AuthGate {
    auth: Arc<AuthService>,
}

impl AuthGate {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthGateMiddleware {
            service,
            auth: self.auth.clone(),
        })
    }
}

pub struct AuthGateMiddleware<S> {
    service: S,
    auth: Arc<AuthService>,
}

impl<S, B> Service<ServiceRequest> for AuthGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // The router matches against the percent-decoded path, so the policy must too
        let needs_auth = requires_auth(req.method(), req.match_info().as_str());

        match self.auth.authenticate(req.request()) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(e) if needs_auth => {
                log::debug!("Rejected {} {}: {}", req.method(), req.match_info().as_str(), e);
                let response = HttpResponse::Unauthorized()
                    .json(ApiResponse::<()>::error("Authentication required"));
                return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
            }
            Err(_) => {}
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

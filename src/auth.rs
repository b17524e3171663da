use std::sync::Arc;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::gateway::{AuthGateway, GatewayError, GatewayUser};
use crate::routes::AppState;

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

/// The signed-in account as seen by request handlers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl Principal {
    /// Full name when set, otherwise the local part of the e-mail address.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("Anonymous")
            .to_string()
    }
}

impl From<GatewayUser> for Principal {
    fn from(u: GatewayUser) -> Self {
        Principal {
            id: u.id,
            email: u.email,
            full_name: u.user_metadata.and_then(|m| m.full_name),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Session token claims as issued by the BaaS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("invalid or expired session")]
    Invalid,
    #[error("{0}")]
    Unavailable(String),
}

/// Turns a session token into a principal.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError>;
}

/// Verifies HS256 session tokens locally with the project's JWT secret.
pub struct JwtIdentity {
    secret: String,
}

impl JwtIdentity {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    fn decode_jwt(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // BaaS tokens carry aud = "authenticated"
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)?;
        Ok(data.claims)
    }

    /// Mint a token the same shape as the BaaS would. Used for local development and tests.
    pub fn issue(&self, principal: &Principal, ttl: chrono::Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = (chrono::Utc::now() + ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: principal.id.to_string(),
            exp,
            email: principal.email.clone(),
            role: Some("authenticated".into()),
            user_metadata: Some(UserMetadata { full_name: principal.full_name.clone() }),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentity {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        let claims = self.decode_jwt(token).map_err(|_| IdentityError::Invalid)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| IdentityError::Invalid)?;
        Ok(Principal {
            id,
            email: claims.email,
            full_name: claims.user_metadata.and_then(|m| m.full_name),
        })
    }
}

/// Asks the auth service who the token belongs to. Used when no JWT secret is configured.
pub struct GatewayIdentity {
    gateway: Arc<dyn AuthGateway>,
}

impl GatewayIdentity {
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl IdentityResolver for GatewayIdentity {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        match self.gateway.get_user(token).await {
            Ok(user) => Ok(user.into()),
            Err(GatewayError::Unauthorized | GatewayError::InvalidCredentials | GatewayError::Rejected(_)) => {
                Err(IdentityError::Invalid)
            }
            Err(e) => Err(IdentityError::Unavailable(e.to_string())),
        }
    }
}

/// Bearer header first, then the session cookie.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    if let Ok(bearer) = BearerAuth::from_request(req, &mut Payload::None).into_inner() {
        return Some(bearer.token().to_string());
    }
    req.cookie(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Extractor yielding the authenticated principal. Use `Option<Auth>` on public routes.
#[derive(Debug)]
pub struct Auth {
    pub principal: Principal,
    pub token: String,
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let token = session_token(req);
        let identity = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.identity.clone());
        Box::pin(async move {
            let identity = identity
                .ok_or_else(|| ApiError::Internal("application state not registered".into()))?
                .ok_or_else(|| ApiError::ServiceUnavailable("Authentication is not configured".into()))?;
            let token = token.ok_or(ApiError::Unauthorized)?;
            match identity.resolve(&token).await {
                Ok(principal) => Ok(Auth { principal, token }),
                Err(IdentityError::Invalid) => Err(ApiError::Unauthorized),
                Err(IdentityError::Unavailable(msg)) => {
                    warn!(error = %msg, "identity lookup failed");
                    Err(ApiError::ServiceUnavailable("Authentication service unavailable".into()))
                }
            }
        })
    }
}

//! Client for the BaaS auth API (GoTrue-compatible `/auth/v1` endpoints).

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::UserMetadata;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session rejected")]
    Unauthorized,
    #[error("{0}")]
    Rejected(String),
    #[error("auth service unreachable: {0}")]
    Transport(String),
    #[error("unexpected auth service response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct GatewayUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    pub user: GatewayUser,
}

// Sign-up answers with a session when e-mail confirmation is off, otherwise with the bare user.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(GatewayUser),
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<GatewayUser, GatewayError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), GatewayError>;
    async fn send_recovery(&self, email: &str, redirect_to: &str) -> Result<(), GatewayError>;
    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), GatewayError>;
    async fn get_user(&self, access_token: &str) -> Result<GatewayUser, GatewayError>;
}

pub struct BaasAuthGateway {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl BaasAuthGateway {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: Option<&str>) -> reqwest::RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Response, GatewayError> {
        req.send().await.map_err(|e| {
            error!(error = %e, "auth service request failed");
            GatewayError::Transport(e.to_string())
        })
    }
}

/// Pulls the human-readable message out of an error body; the service is not
/// consistent about which field carries it.
fn error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

async fn reject(resp: Response) -> GatewayError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
        s if s.is_server_error() => {
            warn!(%status, %message, "auth service error");
            GatewayError::Transport(message)
        }
        _ => GatewayError::Rejected(message),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
    resp.json::<T>().await.map_err(|e| GatewayError::Decode(e.to_string()))
}

#[async_trait]
impl AuthGateway for BaasAuthGateway {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<GatewayUser, GatewayError> {
        let body = json!({ "email": email, "password": password, "data": { "full_name": full_name } });
        let resp = self.send(self.request(reqwest::Method::POST, "/signup", None).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(reject(resp).await);
        }
        match decode::<SignUpResponse>(resp).await? {
            SignUpResponse::Session(s) => Ok(s.user),
            SignUpResponse::User(u) => Ok(u),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let body = json!({ "email": email, "password": password });
        let resp = self
            .send(self.request(reqwest::Method::POST, "/token?grant_type=password", None).json(&body))
            .await?;
        match resp.status() {
            s if s.is_success() => decode(resp).await,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(GatewayError::InvalidCredentials),
            _ => Err(reject(resp).await),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), GatewayError> {
        let resp = self.send(self.request(reqwest::Method::POST, "/logout", Some(access_token))).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(reject(resp).await)
        }
    }

    async fn send_recovery(&self, email: &str, redirect_to: &str) -> Result<(), GatewayError> {
        let path = format!("/recover?redirect_to={}", urlencoding::encode(redirect_to));
        let resp = self
            .send(self.request(reqwest::Method::POST, &path, None).json(&json!({ "email": email })))
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(reject(resp).await)
        }
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), GatewayError> {
        let resp = self
            .send(self.request(reqwest::Method::PUT, "/user", Some(access_token)).json(&json!({ "password": password })))
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(reject(resp).await)
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<GatewayUser, GatewayError> {
        let resp = self.send(self.request(reqwest::Method::GET, "/user", Some(access_token))).await?;
        if resp.status().is_success() {
            decode(resp).await
        } else {
            Err(reject(resp).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_message_field() {
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#).as_deref(), Some("User already registered"));
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message("not json"), None);
    }
}

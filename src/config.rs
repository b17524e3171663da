use std::env;

use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Endpoint and public key of the hosted backend.
#[derive(Debug, Clone)]
pub struct BaasSettings {
    pub url: String,
    pub anon_key: String,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self { endpoint: None, region: "us-east-1".into(), access_key: String::new(), secret_key: String::new() }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` puts the service in degraded mode.
    pub baas: Option<BaasSettings>,
    pub s3: S3Settings,
    pub bind_addr: String,
    pub frontend_url: String,
    pub enable_hsts: bool,
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn flag_env(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let baas = match (non_empty_env("BAAS_URL"), non_empty_env("BAAS_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(BaasSettings {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                jwt_secret: non_empty_env("BAAS_JWT_SECRET"),
            }),
            (url, key) => {
                warn!(
                    url_set = url.is_some(),
                    key_set = key.is_some(),
                    "BAAS_URL / BAAS_ANON_KEY missing; running degraded (auth and uploads disabled)"
                );
                None
            }
        };
        let s3 = S3Settings {
            endpoint: non_empty_env("S3_ENDPOINT"),
            region: non_empty_env("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            access_key: non_empty_env("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: non_empty_env("S3_SECRET_KEY").unwrap_or_default(),
        };
        Self {
            baas,
            s3,
            bind_addr: non_empty_env("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            frontend_url: non_empty_env("FRONTEND_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.into()),
            enable_hsts: flag_env("ENABLE_HSTS"),
        }
    }

    /// Configuration with no backend at all.
    pub fn degraded() -> Self {
        Self {
            baas: None,
            s3: S3Settings::default(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            frontend_url: DEFAULT_FRONTEND_URL.into(),
            enable_hsts: false,
        }
    }

    pub fn baas_configured(&self) -> bool {
        self.baas.is_some()
    }

    /// Where password-recovery e-mails send the user.
    pub fn recovery_redirect(&self) -> String {
        format!("{}/auth/update-password", self.frontend_url)
    }
}

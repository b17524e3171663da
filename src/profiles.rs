use reqwest::Url;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::gateway::{AuthGateway, GatewayError};
use crate::models::{non_blank, Profile, ProfileInput};
use crate::posts::ensure_profile;
use crate::repo::Repo;

pub const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;
const MAX_BIO_LEN: usize = 160;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

pub fn validate_profile(input: ProfileInput) -> Result<ProfileInput, ApiError> {
    let full_name = input.full_name.trim().to_string();
    if full_name.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::bad_request("Full name must be at least 2 characters"));
    }
    let bio = non_blank(input.bio);
    if bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
        return Err(ApiError::bad_request("Bio must be at most 160 characters"));
    }
    let website = non_blank(input.website);
    if let Some(site) = &website {
        let ok = Url::parse(site).map(|u| matches!(u.scheme(), "http" | "https")).unwrap_or(false);
        if !ok {
            return Err(ApiError::bad_request("Website must be a valid URL"));
        }
    }
    Ok(ProfileInput { full_name, bio, website })
}

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }
    if password != confirm {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    Ok(())
}

pub async fn get(repo: &dyn Repo, who: &Principal) -> Result<Profile, ApiError> {
    ensure_profile(repo, who).await
}

pub async fn update(repo: &dyn Repo, who: &Principal, input: ProfileInput) -> Result<Profile, ApiError> {
    let input = validate_profile(input)?;
    ensure_profile(repo, who).await?;
    let profile = repo.update_profile(who.id, input).await?;
    info!(account = %who.id, "profile updated");
    Ok(profile)
}

/// The current password is proven by signing in with it before the change is sent.
pub async fn change_password(gateway: &dyn AuthGateway, who: &Principal, token: &str, change: PasswordChange) -> Result<(), ApiError> {
    if change.current_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }
    validate_new_password(&change.new_password, &change.confirm_new_password)?;
    let email = who
        .email
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Account has no e-mail address"))?;
    match gateway.sign_in(email, &change.current_password).await {
        Ok(_) => {}
        Err(GatewayError::InvalidCredentials) => return Err(ApiError::bad_request("Current password is incorrect")),
        Err(e) => return Err(e.into()),
    }
    gateway.update_password(token, &change.new_password).await?;
    info!(account = %who.id, "password changed");
    Ok(())
}

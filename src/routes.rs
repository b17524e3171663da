use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::auth::{session_token, Auth, IdentityResolver, Principal, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::gateway::AuthGateway;
use crate::models::*;
use crate::profiles::{self, PasswordChange, MIN_PASSWORD_LEN};
use crate::rate_limit::RateLimiterFacade;
use crate::repo::Repo;
use crate::storage::{object_key, MediaStore, MediaStoreError, BUCKETS};
use crate::{albums, comments, posts};

pub const UPLOAD_SIZE_LIMIT: usize = 10 * 1024 * 1024;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    );
    // a malformed id cannot name an existing row
    cfg.app_data(web::PathConfig::default().error_handler(|_err, _req| ApiError::NotFound("Not found".into()).into()));
    cfg.app_data(
        web::QueryConfig::default().error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    );
    cfg.service(
        web::scope("/api")
            .service(web::resource("/health").route(web::get().to(health)))
            .service(
                web::scope("/auth")
                    .service(web::resource("/register").route(web::post().to(register)))
                    .service(web::resource("/login").route(web::post().to(login)))
                    .service(web::resource("/logout").route(web::post().to(logout)))
                    .service(web::resource("/forgot-password").route(web::post().to(forgot_password)))
                    .service(web::resource("/update-password").route(web::post().to(update_password)))
                    .service(web::resource("/me").route(web::get().to(me))),
            )
            .service(web::resource("/home").route(web::get().to(home)))
            .service(web::resource("/posts/{slug}").route(web::get().to(post_page)))
            .service(
                web::resource("/posts/{slug}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(create_comment)),
            )
            .service(web::resource("/gallery").route(web::get().to(gallery)))
            .service(web::resource("/gallery/{id}").route(web::get().to(gallery_album)))
            .service(
                web::resource("/albums")
                    .route(web::get().to(list_albums))
                    .route(web::post().to(create_album)),
            )
            .service(
                web::resource("/albums/{album_id}")
                    .route(web::get().to(get_album))
                    .route(web::put().to(update_album))
                    .route(web::delete().to(delete_album)),
            )
            .service(
                web::resource("/albums/{album_id}/photos")
                    .route(web::get().to(list_photos))
                    .route(web::post().to(create_photo)),
            )
            .service(
                web::resource("/albums/{album_id}/photos/{photo_id}")
                    .route(web::put().to(update_photo))
                    .route(web::delete().to(delete_photo)),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/stats").route(web::get().to(dashboard_stats)))
                    .service(
                        web::resource("/profile")
                            .route(web::get().to(get_profile))
                            .route(web::put().to(update_profile)),
                    )
                    .service(web::resource("/settings/password").route(web::post().to(change_password)))
                    .service(
                        web::resource("/posts")
                            .route(web::get().to(list_own_posts))
                            .route(web::post().to(create_post)),
                    )
                    .service(
                        web::resource("/posts/{id}")
                            .route(web::get().to(get_own_post))
                            .route(web::put().to(update_post))
                            .route(web::delete().to(delete_post)),
                    )
                    .service(web::resource("/comments").route(web::get().to(moderation_queue)))
                    .service(web::resource("/comments/{id}").route(web::delete().to(delete_comment)))
                    .service(web::resource("/comments/{id}/approve").route(web::post().to(approve_comment)))
                    .service(web::resource("/comments/{id}/reject").route(web::post().to(reject_comment)))
                    .service(web::resource("/comments/{id}/reply").route(web::post().to(reply_comment))),
            )
            .service(web::resource("/uploads/{bucket}").route(web::post().to(upload))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    /// `None` when the BaaS is not configured; authenticated routes answer 503.
    pub identity: Option<Arc<dyn IdentityResolver>>,
    pub gateway: Option<Arc<dyn AuthGateway>>,
    pub media: Option<Arc<dyn MediaStore>>,
    pub limiter: RateLimiterFacade,
    pub settings: Arc<AppConfig>,
}

impl AppState {
    /// Store only; every BaaS-backed capability starts switched off.
    pub fn new(repo: Arc<dyn Repo>, settings: AppConfig) -> Self {
        Self {
            repo,
            identity: None,
            gateway: None,
            media: None,
            limiter: RateLimiterFacade::disabled(),
            settings: Arc::new(settings),
        }
    }

    fn gateway(&self) -> Result<&dyn AuthGateway, ApiError> {
        self.gateway
            .as_deref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Authentication is not configured".into()))
    }

    fn repo(&self) -> &dyn Repo {
        self.repo.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse { message: text.to_string() })
}

// ---------------------------------------------------------------------------
// Operational
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub baas_configured: bool,
    pub storage_configured: bool,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "ops",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let baas_configured = data.settings.baas_configured();
    HttpResponse::Ok().json(HealthResponse {
        status: if baas_configured { "ok" } else { "degraded" }.to_string(),
        baas_configured,
        storage_configured: data.media.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Account flows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: Principal,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut c = Cookie::build(name, "").path("/").finish();
    c.make_removal();
    c
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() > 2 && email.contains('@') && !email.starts_with('@') && !email.ends_with('@')
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = Principal),
        (status = 400, description = "Invalid input", body = ApiErrorBody),
        (status = 503, description = "Auth not configured", body = ApiErrorBody)
    )
)]
pub async fn register(data: web::Data<AppState>, payload: web::Json<RegisterRequest>) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    if !valid_email(&req.email) {
        return Err(ApiError::bad_request("Please enter a valid e-mail address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }
    let full_name = req.full_name.trim();
    if full_name.chars().count() < 2 {
        return Err(ApiError::bad_request("Full name must be at least 2 characters"));
    }
    let user = data.gateway()?.sign_up(req.email.trim(), &req.password, full_name).await?;
    info!(account = %user.id, "account registered");
    Ok(HttpResponse::Created().json(Principal::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookies set", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ApiErrorBody)
    )
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    let session = data.gateway()?.sign_in(req.email.trim(), &req.password).await?;
    let secure = data.settings.enable_hsts;
    // refresh tokens outlive the access token; keep them for a week
    let access = session_cookie(ACCESS_COOKIE, session.access_token.clone(), session.expires_in.max(60), secure);
    let refresh = session_cookie(REFRESH_COOKIE, session.refresh_token.clone(), 7 * 24 * 3600, secure);
    Ok(HttpResponse::Ok().cookie(access).cookie(refresh).json(LoginResponse {
        user: session.user.into(),
        access_token: session.access_token,
        expires_in: session.expires_in,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Session cookies cleared", body = MessageResponse))
)]
pub async fn logout(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    if let (Some(gateway), Some(token)) = (data.gateway.as_deref(), session_token(&req)) {
        if let Err(e) = gateway.sign_out(&token).await {
            warn!(error = %e, "remote sign-out failed; clearing cookies anyway");
        }
    }
    HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE))
        .json(MessageResponse { message: "Signed out".into() })
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Recovery e-mail requested", body = MessageResponse))
)]
pub async fn forgot_password(data: web::Data<AppState>, payload: web::Json<ForgotPasswordRequest>) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim();
    if !valid_email(email) {
        return Err(ApiError::bad_request("Please enter a valid e-mail address"));
    }
    data.gateway()?.send_recovery(email, &data.settings.recovery_redirect()).await?;
    Ok(message("Password reset link sent, please check your e-mail"))
}

#[utoipa::path(
    post,
    path = "/api/auth/update-password",
    tag = "auth",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid password", body = ApiErrorBody),
        (status = 401, description = "No recovery session", body = ApiErrorBody)
    )
)]
pub async fn update_password(auth: Auth, data: web::Data<AppState>, payload: web::Json<UpdatePasswordRequest>) -> Result<HttpResponse, ApiError> {
    profiles::validate_new_password(&payload.password, &payload.confirm_password)?;
    data.gateway()?.update_password(&auth.token, &payload.password).await?;
    info!(account = %auth.principal.id, "password reset completed");
    Ok(message("Password updated"))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current principal", body = Principal),
        (status = 401, description = "Not signed in", body = ApiErrorBody)
    )
)]
pub async fn me(auth: Auth) -> HttpResponse {
    HttpResponse::Ok().json(auth.principal)
}

// ---------------------------------------------------------------------------
// Public reading
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HomeQuery {
    /// Case-insensitive title search.
    pub q: Option<String>,
    /// Tag slug.
    pub tag: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/home",
    tag = "posts",
    params(HomeQuery),
    responses((status = 200, description = "Published posts, top tags and archive", body = HomeFeed))
)]
pub async fn home(data: web::Data<AppState>, query: web::Query<HomeQuery>) -> Result<HttpResponse, ApiError> {
    let HomeQuery { q, tag } = query.into_inner();
    let feed = posts::home_feed(data.repo(), q, tag).await?;
    Ok(HttpResponse::Ok().json(feed))
}

#[utoipa::path(
    get,
    path = "/api/posts/{slug}",
    tag = "posts",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Post with tags and comment thread", body = PostPage),
        (status = 404, description = "Post not found", body = ApiErrorBody)
    )
)]
pub async fn post_page(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let page = posts::post_page(data.repo(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/posts/{slug}/comments",
    tag = "comments",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Approved comments as a thread", body = [CommentNode]),
        (status = 404, description = "Post not found", body = ApiErrorBody)
    )
)]
pub async fn list_comments(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let page = posts::post_page(data.repo(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page.comments))
}

#[utoipa::path(
    post,
    path = "/api/posts/{slug}/comments",
    tag = "comments",
    params(("slug" = String, Path, description = "Post slug")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Comment queued for moderation", body = Comment),
        (status = 400, description = "Invalid comment", body = ApiErrorBody),
        (status = 401, description = "Not signed in", body = ApiErrorBody),
        (status = 429, description = "Too many comments", body = ApiErrorBody)
    )
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CommentInput>,
) -> Result<HttpResponse, ApiError> {
    if !data.limiter.allow_comment(&auth.principal.id.to_string()) {
        return Err(ApiError::TooManyRequests);
    }
    let comment = comments::submit_comment(data.repo(), &auth.principal, &path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    get,
    path = "/api/gallery",
    tag = "albums",
    responses((status = 200, description = "Newest albums", body = [AlbumSummary]))
)]
pub async fn gallery(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(albums::gallery(data.repo()).await?))
}

#[utoipa::path(
    get,
    path = "/api/gallery/{id}",
    tag = "albums",
    params(("id" = Uuid, Path, description = "Album id")),
    responses(
        (status = 200, description = "Album with photos", body = AlbumDetail),
        (status = 404, description = "Album not found", body = ApiErrorBody)
    )
)]
pub async fn gallery_album(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(albums::gallery_album(data.repo(), path.into_inner()).await?))
}

// ---------------------------------------------------------------------------
// Albums & photos (owner only)
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/albums",
    tag = "albums",
    responses(
        (status = 200, description = "Own albums, newest first", body = [AlbumSummary]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody)
    )
)]
pub async fn list_albums(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(albums::list_own(data.repo(), &auth.principal).await?))
}

#[utoipa::path(
    post,
    path = "/api/albums",
    tag = "albums",
    request_body = NewAlbum,
    responses(
        (status = 201, description = "Album created", body = Album),
        (status = 400, description = "Title is required", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody)
    )
)]
pub async fn create_album(auth: Auth, data: web::Data<AppState>, payload: web::Json<NewAlbum>) -> Result<HttpResponse, ApiError> {
    let album = albums::create(data.repo(), &auth.principal, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(album))
}

#[utoipa::path(
    get,
    path = "/api/albums/{album_id}",
    tag = "albums",
    params(("album_id" = Uuid, Path, description = "Album id")),
    responses(
        (status = 200, description = "Album with photos", body = AlbumDetail),
        (status = 404, description = "Album not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn get_album(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(albums::get_own(data.repo(), &auth.principal, path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/albums/{album_id}",
    tag = "albums",
    params(("album_id" = Uuid, Path, description = "Album id")),
    request_body = UpdateAlbum,
    responses(
        (status = 200, description = "Album updated", body = Album),
        (status = 404, description = "Album not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn update_album(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<UpdateAlbum>) -> Result<HttpResponse, ApiError> {
    let album = albums::update(data.repo(), &auth.principal, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(album))
}

#[utoipa::path(
    delete,
    path = "/api/albums/{album_id}",
    tag = "albums",
    params(("album_id" = Uuid, Path, description = "Album id")),
    responses(
        (status = 200, description = "Album and its photos deleted", body = MessageResponse),
        (status = 404, description = "Album not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn delete_album(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    albums::delete(data.repo(), &auth.principal, path.into_inner()).await?;
    Ok(message("Album deleted successfully"))
}

#[utoipa::path(
    get,
    path = "/api/albums/{album_id}/photos",
    tag = "albums",
    params(("album_id" = Uuid, Path, description = "Album id")),
    responses(
        (status = 200, description = "Photos, newest first", body = [Photo]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Album not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn list_photos(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(albums::list_photos(data.repo(), &auth.principal, path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/albums/{album_id}/photos",
    tag = "albums",
    params(("album_id" = Uuid, Path, description = "Album id")),
    request_body = NewPhoto,
    responses(
        (status = 201, description = "Photo added", body = Photo),
        (status = 400, description = "URL is required", body = ApiErrorBody),
        (status = 404, description = "Album not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn create_photo(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<NewPhoto>) -> Result<HttpResponse, ApiError> {
    let photo = albums::add_photo(data.repo(), &auth.principal, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(photo))
}

#[utoipa::path(
    put,
    path = "/api/albums/{album_id}/photos/{photo_id}",
    tag = "albums",
    params(
        ("album_id" = Uuid, Path, description = "Album id"),
        ("photo_id" = Uuid, Path, description = "Photo id")
    ),
    request_body = UpdatePhoto,
    responses(
        (status = 200, description = "Photo updated", body = Photo),
        (status = 404, description = "Photo not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn update_photo(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
    payload: web::Json<UpdatePhoto>,
) -> Result<HttpResponse, ApiError> {
    let (album_id, photo_id) = path.into_inner();
    let photo = albums::update_photo(data.repo(), &auth.principal, album_id, photo_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(photo))
}

#[utoipa::path(
    delete,
    path = "/api/albums/{album_id}/photos/{photo_id}",
    tag = "albums",
    params(
        ("album_id" = Uuid, Path, description = "Album id"),
        ("photo_id" = Uuid, Path, description = "Photo id")
    ),
    responses(
        (status = 200, description = "Photo deleted", body = MessageResponse),
        (status = 404, description = "Photo not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn delete_photo(auth: Auth, data: web::Data<AppState>, path: web::Path<(Id, Id)>) -> Result<HttpResponse, ApiError> {
    let (album_id, photo_id) = path.into_inner();
    albums::delete_photo(data.repo(), &auth.principal, album_id, photo_id).await?;
    Ok(message("Photo deleted successfully"))
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "dashboard",
    responses((status = 200, description = "Own post and comment counts", body = DashboardStats))
)]
pub async fn dashboard_stats(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(posts::dashboard_stats(data.repo(), &auth.principal).await?))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/profile",
    tag = "dashboard",
    responses((status = 200, description = "Own profile", body = Profile))
)]
pub async fn get_profile(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(profiles::get(data.repo(), &auth.principal).await?))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/profile",
    tag = "dashboard",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 400, description = "Invalid profile", body = ApiErrorBody)
    )
)]
pub async fn update_profile(auth: Auth, data: web::Data<AppState>, payload: web::Json<ProfileInput>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(profiles::update(data.repo(), &auth.principal, payload.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/settings/password",
    tag = "dashboard",
    request_body = PasswordChange,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or wrong password", body = ApiErrorBody)
    )
)]
pub async fn change_password(auth: Auth, data: web::Data<AppState>, payload: web::Json<PasswordChange>) -> Result<HttpResponse, ApiError> {
    profiles::change_password(data.gateway()?, &auth.principal, &auth.token, payload.into_inner()).await?;
    Ok(message("Password changed"))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/posts",
    tag = "dashboard",
    responses((status = 200, description = "Own posts, newest first", body = [Post]))
)]
pub async fn list_own_posts(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(posts::list_own(data.repo(), &auth.principal).await?))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/posts",
    tag = "dashboard",
    request_body = PostInput,
    responses(
        (status = 201, description = "Post created", body = EditablePost),
        (status = 400, description = "Invalid post", body = ApiErrorBody),
        (status = 409, description = "Slug already taken", body = ApiErrorBody)
    )
)]
pub async fn create_post(auth: Auth, data: web::Data<AppState>, payload: web::Json<PostInput>) -> Result<HttpResponse, ApiError> {
    let post = posts::create_post(data.repo(), &auth.principal, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/posts/{id}",
    tag = "dashboard",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Own post with tag names", body = EditablePost),
        (status = 404, description = "Post not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn get_own_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(posts::get_own(data.repo(), &auth.principal, path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/posts/{id}",
    tag = "dashboard",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = PostInput,
    responses(
        (status = 200, description = "Post updated", body = EditablePost),
        (status = 404, description = "Post not found or unauthorized", body = ApiErrorBody),
        (status = 409, description = "Slug already taken", body = ApiErrorBody)
    )
)]
pub async fn update_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<PostInput>) -> Result<HttpResponse, ApiError> {
    let post = posts::update_post(data.repo(), &auth.principal, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[utoipa::path(
    delete,
    path = "/api/dashboard/posts/{id}",
    tag = "dashboard",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post deleted", body = MessageResponse),
        (status = 404, description = "Post not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    posts::delete_post(data.repo(), &auth.principal, path.into_inner()).await?;
    Ok(message("Post deleted successfully"))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/comments",
    tag = "comments",
    responses((status = 200, description = "Comments on own posts, newest first", body = [ModerationItem]))
)]
pub async fn moderation_queue(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(comments::moderation_queue(data.repo(), &auth.principal).await?))
}

async fn set_status(auth: Auth, data: web::Data<AppState>, id: Id, to: CommentStatus) -> Result<HttpResponse, ApiError> {
    let comment = comments::moderate(data.repo(), &auth.principal, id, to).await?;
    Ok(HttpResponse::Ok().json(comment))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/comments/{id}/approve",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment approved", body = Comment),
        (status = 404, description = "Comment not found or unauthorized", body = ApiErrorBody),
        (status = 409, description = "Comment already moderated", body = ApiErrorBody)
    )
)]
pub async fn approve_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    set_status(auth, data, path.into_inner(), CommentStatus::Approved).await
}

#[utoipa::path(
    post,
    path = "/api/dashboard/comments/{id}/reject",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment rejected", body = Comment),
        (status = 404, description = "Comment not found or unauthorized", body = ApiErrorBody),
        (status = 409, description = "Comment already moderated", body = ApiErrorBody)
    )
)]
pub async fn reject_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    set_status(auth, data, path.into_inner(), CommentStatus::Rejected).await
}

#[utoipa::path(
    delete,
    path = "/api/dashboard/comments/{id}",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment deleted", body = MessageResponse),
        (status = 404, description = "Comment not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn delete_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    comments::remove(data.repo(), &auth.principal, path.into_inner()).await?;
    Ok(message("Comment deleted"))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/comments/{id}/reply",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment being answered")),
    request_body = ReplyInput,
    responses(
        (status = 201, description = "Reply published", body = Comment),
        (status = 404, description = "Comment not found or unauthorized", body = ApiErrorBody)
    )
)]
pub async fn reply_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<ReplyInput>) -> Result<HttpResponse, ApiError> {
    let reply = comments::reply_as_author(data.repo(), &auth.principal, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(reply))
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
    pub bucket: String,
    pub key: String,
    pub duplicate: bool,
}

#[utoipa::path(
    post,
    path = "/api/uploads/{bucket}",
    tag = "uploads",
    params(("bucket" = String, Path, description = "post-images or album-images")),
    request_body(content = String, description = "Multipart form with a `file` field", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = UploadResponse),
        (status = 200, description = "Identical image already stored", body = UploadResponse),
        (status = 400, description = "Missing file or unknown bucket", body = ApiErrorBody),
        (status = 413, description = "Image larger than 10 MiB", body = ApiErrorBody),
        (status = 415, description = "Not an image", body = ApiErrorBody),
        (status = 503, description = "Storage not configured", body = ApiErrorBody)
    )
)]
pub async fn upload(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let media = data
        .media
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Storage is not configured".into()))?;
    let bucket = path.into_inner();
    if !BUCKETS.contains(&bucket.as_str()) {
        return Err(ApiError::bad_request("Unknown bucket"));
    }
    if !data.limiter.allow_upload(&auth.principal.id.to_string()) {
        return Err(ApiError::TooManyRequests);
    }

    while let Some(mut field) = payload.try_next().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }
        let mut bytes: Vec<u8> = Vec::new();
        let mut hasher = Sha256::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
            if bytes.len() + chunk.len() > UPLOAD_SIZE_LIMIT {
                return Err(ApiError::PayloadTooLarge);
            }
            hasher.update(&chunk);
            bytes.extend_from_slice(&chunk);
        }
        let kind = infer::get(&bytes)
            .filter(|k| k.mime_type().starts_with("image/"))
            .ok_or(ApiError::UnsupportedMediaType)?;
        let key = object_key(&format!("{:x}", hasher.finalize()), kind.extension());
        let (status, duplicate) = match media.put(&bucket, &key, kind.mime_type(), &bytes).await {
            Ok(()) => (actix_web::http::StatusCode::CREATED, false),
            Err(MediaStoreError::Duplicate) => (actix_web::http::StatusCode::OK, true),
            Err(e) => {
                error!(bucket = %bucket, key = %key, error = %e, "upload failed");
                return Err(e.into());
            }
        };
        info!(bucket = %bucket, key = %key, size = bytes.len(), duplicate, "image uploaded");
        let url = media.public_url(&bucket, &key);
        return Ok(HttpResponse::build(status).json(UploadResponse { url, bucket, key, duplicate }));
    }
    Err(ApiError::bad_request("Multipart field `file` is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(valid_email("a@b.c"));
        assert!(!valid_email("nope"));
        assert!(!valid_email("@b.c"));
        assert!(!valid_email("a@"));
    }
}

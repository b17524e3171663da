use crate::auth::{Principal, UserMetadata};
use crate::error::ApiErrorBody;
use crate::models::*;
use crate::profiles::PasswordChange;
use crate::routes::{
    ForgotPasswordRequest, HealthResponse, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    UpdatePasswordRequest, UploadResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::register,
        crate::routes::login,
        crate::routes::logout,
        crate::routes::forgot_password,
        crate::routes::update_password,
        crate::routes::me,
        crate::routes::home,
        crate::routes::post_page,
        crate::routes::list_comments,
        crate::routes::create_comment,
        crate::routes::gallery,
        crate::routes::gallery_album,
        crate::routes::list_albums,
        crate::routes::create_album,
        crate::routes::get_album,
        crate::routes::update_album,
        crate::routes::delete_album,
        crate::routes::list_photos,
        crate::routes::create_photo,
        crate::routes::update_photo,
        crate::routes::delete_photo,
        crate::routes::dashboard_stats,
        crate::routes::get_profile,
        crate::routes::update_profile,
        crate::routes::change_password,
        crate::routes::list_own_posts,
        crate::routes::create_post,
        crate::routes::get_own_post,
        crate::routes::update_post,
        crate::routes::delete_post,
        crate::routes::moderation_queue,
        crate::routes::approve_comment,
        crate::routes::reject_comment,
        crate::routes::delete_comment,
        crate::routes::reply_comment,
        crate::routes::upload,
    ),
    components(schemas(
        Profile, ProfileInput, Post, PostInput, PostSummary, EditablePost, PostPage, ArchiveMonth, HomeFeed,
        DashboardStats, Tag, CommentStatus, Comment, CommentView, CommentNode, ModerationItem, CommentInput,
        ReplyInput, Album, AlbumSummary, AlbumDetail, NewAlbum, UpdateAlbum, Photo, NewPhoto, UpdatePhoto,
        Principal, UserMetadata, PasswordChange, ApiErrorBody, MessageResponse, HealthResponse,
        RegisterRequest, LoginRequest, LoginResponse, ForgotPasswordRequest, UpdatePasswordRequest,
        UploadResponse
    )),
    tags(
        (name = "auth", description = "Sign-up, sign-in and password recovery"),
        (name = "posts", description = "Public reading"),
        (name = "comments", description = "Comment threads and moderation"),
        (name = "albums", description = "Albums, photos and the public gallery"),
        (name = "dashboard", description = "Author dashboard"),
        (name = "uploads", description = "Image uploads to object storage"),
        (name = "ops", description = "Health"),
    )
)]
pub struct ApiDoc;

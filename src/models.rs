use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Row identifiers are the BaaS's uuid primary keys.
pub type Id = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct Profile {
    pub id: Id,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileInput {
    pub full_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct Post {
    pub id: Id,
    pub author_id: Id,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>, // set once, on first publish
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author-submitted post body, used for both create and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Id,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Full field set written by an edit; `published_at` is already resolved by the caller.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Published post as listed on the home feed, author already resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct PostSummary {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Case-insensitive title substring.
    pub title_query: Option<String>,
    /// Restrict to these ids (tag filtering); `Some(vec![])` matches nothing.
    pub post_ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EditablePost {
    #[serde(flatten)]
    pub post: Post,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostPage {
    #[serde(flatten)]
    pub post: Post,
    pub author_name: Option<String>,
    pub tags: Vec<Tag>,
    pub comments: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArchiveMonth {
    /// `YYYY-MM` of `published_at`.
    pub month: String,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HomeFeed {
    pub posts: Vec<PostSummary>,
    pub tags: Vec<Tag>,
    pub archive: Vec<ArchiveMonth>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DashboardStats {
    pub posts: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct PostTag {
    pub post_id: Id,
    pub tag_id: Id,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown comment status '{0}'")]
pub struct UnknownStatus(pub String);

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("comment is already {from:?}; cannot move to {to:?}")]
pub struct InvalidTransition {
    pub from: CommentStatus,
    pub to: CommentStatus,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Rejected => "rejected",
        }
    }

    /// Moderation only ever leaves `pending`. Re-applying the current status is allowed
    /// so that double-clicks stay harmless.
    pub fn transition(self, to: CommentStatus) -> Result<CommentStatus, InvalidTransition> {
        match (self, to) {
            (from, to) if from == to => Ok(to),
            (CommentStatus::Pending, CommentStatus::Approved | CommentStatus::Rejected) => Ok(to),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

impl TryFrom<String> for CommentStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(CommentStatus::Pending),
            "approved" => Ok(CommentStatus::Approved),
            "rejected" => Ok(CommentStatus::Rejected),
            _ => Err(UnknownStatus(value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub author_id: Id,
    pub parent_id: Option<Id>,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Id,
    pub author_id: Id,
    pub parent_id: Option<Id>,
    pub content: String,
    pub status: CommentStatus,
}

/// Approved comment as shown to readers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct CommentView {
    pub id: Id,
    pub post_id: Id,
    pub parent_id: Option<Id>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_name: Option<String>,
}

/// Root comment with its (flattened) replies, oldest reply first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

/// Row of the author's moderation table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct ModerationItem {
    pub id: Id,
    pub post_id: Id,
    pub parent_id: Option<Id>,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
    pub post_title: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentInput {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReplyInput {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct Album {
    pub id: Id,
    pub author_id: Id,
    pub title: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct AlbumSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub album: Album,
    pub photo_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlbumDetail {
    #[serde(flatten)]
    pub album: Album,
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewAlbum {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAlbum {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
}

/// Stored form of an album edit. The outer `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct AlbumChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub cover_image: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct Photo {
    pub id: Id,
    pub album_id: Id,
    pub filename: String,
    pub url: String,
    pub caption: Option<String>,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewPhoto {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub album_id: Id,
    pub filename: String,
    pub url: String,
    pub caption: Option<String>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePhoto {
    pub caption: Option<String>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PhotoChanges {
    pub caption: Option<Option<String>>,
    pub alt_text: Option<Option<String>>,
}

/// A present field is trimmed; blank means "clear".
pub fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| non_blank(Some(v)))
}

/// Trims and maps blank strings to `None`; optional text columns store null, never "".
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_either_terminal_state() {
        assert_eq!(CommentStatus::Pending.transition(CommentStatus::Approved), Ok(CommentStatus::Approved));
        assert_eq!(CommentStatus::Pending.transition(CommentStatus::Rejected), Ok(CommentStatus::Rejected));
    }

    #[test]
    fn terminal_states_do_not_flip() {
        assert!(CommentStatus::Approved.transition(CommentStatus::Rejected).is_err());
        assert!(CommentStatus::Rejected.transition(CommentStatus::Approved).is_err());
        assert!(CommentStatus::Approved.transition(CommentStatus::Pending).is_err());
        // same status is a no-op
        assert_eq!(CommentStatus::Approved.transition(CommentStatus::Approved), Ok(CommentStatus::Approved));
    }

    #[test]
    fn status_parses_from_store_text() {
        assert_eq!(CommentStatus::try_from("approved".to_string()).unwrap(), CommentStatus::Approved);
        assert!(CommentStatus::try_from("spam".to_string()).is_err());
    }

    #[test]
    fn non_blank_drops_whitespace() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" hi ".into())), Some("hi".into()));
        assert_eq!(non_blank(None), None);
    }
}

//! Ownership checks run before every read-for-edit, update and delete.
//!
//! A miss is reported the same way whether the row is absent or owned by someone
//! else, so callers cannot probe for the existence of other authors' content.

use std::fmt;

use crate::models::{Album, Comment, Id, Photo, Post};
use crate::repo::{Repo, RepoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Post,
    Album,
    Photo,
    Comment,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Post => "Post",
            Resource::Album => "Album",
            Resource::Photo => "Photo",
            Resource::Comment => "Comment",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GuardError {
    #[error("{0} not found or unauthorized")]
    NotFoundOrUnauthorized(Resource),
    #[error("{0}")]
    Store(String),
}

fn collapse(resource: Resource) -> impl Fn(RepoError) -> GuardError {
    move |e| match e {
        RepoError::NotFound => GuardError::NotFoundOrUnauthorized(resource),
        RepoError::Conflict => GuardError::Store("unexpected conflict".into()),
        RepoError::Internal(msg) => GuardError::Store(msg),
    }
}

pub async fn owned_post(repo: &dyn Repo, post_id: Id, account: Id) -> Result<Post, GuardError> {
    repo.find_owned_post(post_id, account).await.map_err(collapse(Resource::Post))
}

pub async fn owned_album(repo: &dyn Repo, album_id: Id, account: Id) -> Result<Album, GuardError> {
    repo.find_owned_album(album_id, account).await.map_err(collapse(Resource::Album))
}

/// Photos carry no author column; ownership is proven through the set of albums the
/// account owns.
pub async fn owned_photo(repo: &dyn Repo, album_id: Id, photo_id: Id, account: Id) -> Result<Photo, GuardError> {
    let owned = repo.list_album_ids_by_author(account).await.map_err(collapse(Resource::Photo))?;
    if owned.is_empty() {
        return Err(GuardError::NotFoundOrUnauthorized(Resource::Photo));
    }
    repo.find_photo_in_albums(photo_id, album_id, &owned)
        .await
        .map_err(collapse(Resource::Photo))
}

/// A comment may be moderated only by the author of the post it belongs to.
pub async fn moderated_comment(repo: &dyn Repo, comment_id: Id, account: Id) -> Result<Comment, GuardError> {
    let comment = repo.get_comment(comment_id).await.map_err(collapse(Resource::Comment))?;
    repo.find_owned_post(comment.post_id, account)
        .await
        .map_err(collapse(Resource::Comment))?;
    Ok(comment)
}

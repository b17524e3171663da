use tracing::info;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::guard;
use crate::models::*;
use crate::repo::{Repo, RepoError};

const GALLERY_LIMIT: i64 = 20;
const FALLBACK_FILENAME: &str = "photo";

/// Last path segment of the URL, or a placeholder when there is none.
pub fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

pub async fn list_own(repo: &dyn Repo, who: &Principal) -> Result<Vec<AlbumSummary>, ApiError> {
    Ok(repo.list_albums_by_author(who.id).await?)
}

pub async fn create(repo: &dyn Repo, who: &Principal, input: NewAlbum) -> Result<Album, ApiError> {
    let title = non_blank(input.title).ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let album = repo
        .create_album(who.id, title, non_blank(input.description), non_blank(input.cover_image))
        .await?;
    info!(album_id = %album.id, author = %who.id, "album created");
    Ok(album)
}

pub async fn get_own(repo: &dyn Repo, who: &Principal, album_id: Id) -> Result<AlbumDetail, ApiError> {
    let album = guard::owned_album(repo, album_id, who.id).await?;
    let photos = repo.list_photos(album.id).await?;
    Ok(AlbumDetail { album, photos })
}

pub async fn update(repo: &dyn Repo, who: &Principal, album_id: Id, input: UpdateAlbum) -> Result<Album, ApiError> {
    let album = guard::owned_album(repo, album_id, who.id).await?;
    // an explicit blank title is a mistake, not a clear
    let title = match input.title {
        Some(t) => Some(non_blank(Some(t)).ok_or_else(|| ApiError::bad_request("Title is required"))?),
        None => None,
    };
    let upd = AlbumChanges {
        title,
        description: clearable(input.description),
        cover_image: clearable(input.cover_image),
    };
    Ok(repo.update_album(album.id, upd).await?)
}

pub async fn delete(repo: &dyn Repo, who: &Principal, album_id: Id) -> Result<(), ApiError> {
    let album = guard::owned_album(repo, album_id, who.id).await?;
    repo.delete_album(album.id).await?;
    info!(album_id = %album.id, "album deleted with its photos");
    Ok(())
}

pub async fn list_photos(repo: &dyn Repo, who: &Principal, album_id: Id) -> Result<Vec<Photo>, ApiError> {
    let album = guard::owned_album(repo, album_id, who.id).await?;
    Ok(repo.list_photos(album.id).await?)
}

/// The image is expected to be in object storage already; only its URL is recorded.
pub async fn add_photo(repo: &dyn Repo, who: &Principal, album_id: Id, input: NewPhoto) -> Result<Photo, ApiError> {
    let album = guard::owned_album(repo, album_id, who.id).await?;
    let url = non_blank(input.url).ok_or_else(|| ApiError::bad_request("URL is required"))?;
    let photo = repo
        .create_photo(PhotoRecord {
            album_id: album.id,
            filename: filename_from_url(&url),
            url,
            caption: non_blank(input.caption),
            alt_text: non_blank(input.alt_text),
        })
        .await?;
    Ok(photo)
}

pub async fn update_photo(repo: &dyn Repo, who: &Principal, album_id: Id, photo_id: Id, input: UpdatePhoto) -> Result<Photo, ApiError> {
    let photo = guard::owned_photo(repo, album_id, photo_id, who.id).await?;
    let upd = PhotoChanges {
        caption: clearable(input.caption),
        alt_text: clearable(input.alt_text),
    };
    Ok(repo.update_photo(photo.id, upd).await?)
}

pub async fn delete_photo(repo: &dyn Repo, who: &Principal, album_id: Id, photo_id: Id) -> Result<(), ApiError> {
    let photo = guard::owned_photo(repo, album_id, photo_id, who.id).await?;
    repo.delete_photo(photo.id).await?;
    Ok(())
}

pub async fn gallery(repo: &dyn Repo) -> Result<Vec<AlbumSummary>, ApiError> {
    Ok(repo.list_recent_albums(GALLERY_LIMIT).await?)
}

pub async fn gallery_album(repo: &dyn Repo, album_id: Id) -> Result<AlbumDetail, ApiError> {
    let album = match repo.get_album(album_id).await {
        Ok(a) => a,
        Err(RepoError::NotFound) => return Err(ApiError::NotFound("Album not found".into())),
        Err(e) => return Err(e.into()),
    };
    let photos = repo.list_photos(album.id).await?;
    Ok(AlbumDetail { album, photos })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_last_segment() {
        assert_eq!(filename_from_url("https://cdn/x.jpg"), "x.jpg");
        assert_eq!(filename_from_url("plain.png"), "plain.png");
        assert_eq!(filename_from_url("https://cdn/dir/"), "photo");
        assert_eq!(filename_from_url(""), "photo");
    }
}

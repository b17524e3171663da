use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("{0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get_profile(&self, id: Id) -> RepoResult<Profile>;
    async fn insert_profile(&self, id: Id, full_name: Option<String>) -> RepoResult<Profile>;
    async fn update_profile(&self, id: Id, input: ProfileInput) -> RepoResult<Profile>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    async fn get_post_by_slug(&self, slug: &str) -> RepoResult<Post>;
    /// Filtered existence query behind the ownership guard: id AND author.
    async fn find_owned_post(&self, id: Id, author_id: Id) -> RepoResult<Post>;
    async fn update_post(&self, id: Id, changes: PostChanges) -> RepoResult<Post>;
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
    async fn list_posts_by_author(&self, author_id: Id) -> RepoResult<Vec<Post>>;
    async fn list_post_ids_by_author(&self, author_id: Id) -> RepoResult<Vec<Id>>;
    async fn count_posts_by_author(&self, author_id: Id) -> RepoResult<i64>;
    async fn list_published(&self, filter: PostFilter) -> RepoResult<Vec<PostSummary>>;
}

#[async_trait]
pub trait TagRepo: Send + Sync {
    async fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>>;
    async fn find_tag_by_slug(&self, slug: &str) -> RepoResult<Option<Tag>>;
    async fn insert_tag(&self, name: &str, slug: &str) -> RepoResult<Tag>;
    async fn list_tags(&self, limit: i64) -> RepoResult<Vec<Tag>>;
    async fn clear_post_tags(&self, post_id: Id) -> RepoResult<()>;
    async fn attach_tag(&self, post_id: Id, tag_id: Id) -> RepoResult<()>;
    async fn tags_for_post(&self, post_id: Id) -> RepoResult<Vec<Tag>>;
    async fn post_ids_for_tag(&self, tag_id: Id) -> RepoResult<Vec<Id>>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    /// Approved comments of one post, oldest first.
    async fn list_approved_comments(&self, post_id: Id) -> RepoResult<Vec<CommentView>>;
    /// Every comment on the given posts regardless of status, newest first.
    async fn list_comments_for_posts(&self, post_ids: &[Id]) -> RepoResult<Vec<ModerationItem>>;
    async fn count_comments_for_posts(&self, post_ids: &[Id]) -> RepoResult<i64>;
    async fn set_comment_status(&self, id: Id, status: CommentStatus) -> RepoResult<Comment>;
    async fn delete_comment(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait AlbumRepo: Send + Sync {
    async fn create_album(&self, author_id: Id, title: String, description: Option<String>, cover_image: Option<String>) -> RepoResult<Album>;
    async fn get_album(&self, id: Id) -> RepoResult<Album>;
    async fn find_owned_album(&self, id: Id, author_id: Id) -> RepoResult<Album>;
    async fn list_albums_by_author(&self, author_id: Id) -> RepoResult<Vec<AlbumSummary>>;
    async fn list_recent_albums(&self, limit: i64) -> RepoResult<Vec<AlbumSummary>>;
    async fn list_album_ids_by_author(&self, author_id: Id) -> RepoResult<Vec<Id>>;
    async fn update_album(&self, id: Id, upd: AlbumChanges) -> RepoResult<Album>;
    async fn delete_album(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait PhotoRepo: Send + Sync {
    async fn create_photo(&self, record: PhotoRecord) -> RepoResult<Photo>;
    async fn list_photos(&self, album_id: Id) -> RepoResult<Vec<Photo>>;
    /// Photo by id within `album_id`, only if that album is one of `owned_album_ids`.
    async fn find_photo_in_albums(&self, photo_id: Id, album_id: Id, owned_album_ids: &[Id]) -> RepoResult<Photo>;
    async fn update_photo(&self, id: Id, upd: PhotoChanges) -> RepoResult<Photo>;
    async fn delete_photo(&self, id: Id) -> RepoResult<()>;
}

pub trait Repo: ProfileRepo + PostRepo + TagRepo + CommentRepo + AlbumRepo + PhotoRepo {}

impl<T> Repo for T where T: ProfileRepo + PostRepo + TagRepo + CommentRepo + AlbumRepo + PhotoRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};
    use tracing::{info, warn};
    use uuid::Uuid;

    const SNAPSHOT_FILE: &str = "state.json";

    // Tables are vectors so insertion order breaks created_at ties.
    #[derive(Default, Serialize, Deserialize)]
    struct State {
        profiles: Vec<Profile>,
        posts: Vec<Post>,
        tags: Vec<Tag>,
        post_tags: Vec<PostTag>,
        comments: Vec<Comment>,
        albums: Vec<Album>,
        photos: Vec<Photo>,
    }

    impl State {
        fn author_name(&self, id: Id) -> Option<String> {
            self.profiles.iter().find(|p| p.id == id).and_then(|p| p.full_name.clone())
        }

        fn photo_count(&self, album_id: Id) -> i64 {
            self.photos.iter().filter(|p| p.album_id == album_id).count() as i64
        }

        fn summarize(&self, album: &Album) -> AlbumSummary {
            AlbumSummary { album: album.clone(), photo_count: self.photo_count(album.id) }
        }
    }

    /// Dev/test backend. With a snapshot path every write is flushed to a JSON file.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        fn snapshot_path() -> PathBuf {
            let mut dir = std::env::var("FOLIO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"));
            dir.push(SNAPSHOT_FILE);
            dir
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), "loaded in-memory snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "unreadable snapshot, starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), error = %e, "no snapshot, starting empty");
                    State::default()
                }
            }
        }

        /// Snapshot-backed store rooted at `FOLIO_DATA_DIR` (default `data/`).
        pub fn new() -> Self {
            let path = Self::snapshot_path();
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) }
        }

        /// Store that never touches disk.
        pub fn ephemeral() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), snapshot_path: None }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_ref() else { return };
            let bytes = match self.state.read() {
                Ok(s) => serde_json::to_vec_pretty(&*s),
                Err(_) => return,
            };
            match bytes {
                Ok(bytes) => {
                    if let Some(dir) = path.parent() {
                        let _ = std::fs::create_dir_all(dir);
                    }
                    if let Err(e) = std::fs::write(&**path, bytes) {
                        warn!(path = %path.display(), error = %e, "failed to write snapshot");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialise snapshot"),
            }
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl ProfileRepo for InMemRepo {
        async fn get_profile(&self, id: Id) -> RepoResult<Profile> {
            let s = self.read()?;
            s.profiles.iter().find(|p| p.id == id).cloned().ok_or(RepoError::NotFound)
        }

        async fn insert_profile(&self, id: Id, full_name: Option<String>) -> RepoResult<Profile> {
            let mut s = self.write()?;
            if s.profiles.iter().any(|p| p.id == id) {
                return Err(RepoError::Conflict);
            }
            let now = Utc::now();
            let profile = Profile { id, full_name, bio: None, website: None, created_at: now, updated_at: now };
            s.profiles.push(profile.clone());
            drop(s);
            self.persist();
            Ok(profile)
        }

        async fn update_profile(&self, id: Id, input: ProfileInput) -> RepoResult<Profile> {
            let mut s = self.write()?;
            let profile = s.profiles.iter_mut().find(|p| p.id == id).ok_or(RepoError::NotFound)?;
            profile.full_name = Some(input.full_name);
            profile.bio = input.bio;
            profile.website = input.website;
            profile.updated_at = Utc::now();
            let updated = profile.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            let mut s = self.write()?;
            if s.posts.iter().any(|p| p.slug == new.slug) {
                return Err(RepoError::Conflict);
            }
            let now = Utc::now();
            let post = Post {
                id: Uuid::new_v4(),
                author_id: new.author_id,
                title: new.title,
                slug: new.slug,
                excerpt: new.excerpt,
                content: new.content,
                featured_image: new.featured_image,
                published: new.published,
                published_at: new.published_at,
                created_at: now,
                updated_at: now,
            };
            s.posts.push(post.clone());
            drop(s);
            self.persist();
            Ok(post)
        }

        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            let s = self.read()?;
            s.posts.iter().find(|p| p.id == id).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_post_by_slug(&self, slug: &str) -> RepoResult<Post> {
            let s = self.read()?;
            s.posts.iter().find(|p| p.slug == slug).cloned().ok_or(RepoError::NotFound)
        }

        async fn find_owned_post(&self, id: Id, author_id: Id) -> RepoResult<Post> {
            let s = self.read()?;
            s.posts
                .iter()
                .find(|p| p.id == id && p.author_id == author_id)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn update_post(&self, id: Id, changes: PostChanges) -> RepoResult<Post> {
            let mut s = self.write()?;
            // uniqueness check before taking the mutable borrow
            if s.posts.iter().any(|p| p.slug == changes.slug && p.id != id) {
                return Err(RepoError::Conflict);
            }
            let post = s.posts.iter_mut().find(|p| p.id == id).ok_or(RepoError::NotFound)?;
            post.title = changes.title;
            post.slug = changes.slug;
            post.excerpt = changes.excerpt;
            post.content = changes.content;
            post.featured_image = changes.featured_image;
            post.published = changes.published;
            post.published_at = changes.published_at;
            post.updated_at = Utc::now();
            let updated = post.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            let before = s.posts.len();
            s.posts.retain(|p| p.id != id);
            if s.posts.len() == before {
                return Err(RepoError::NotFound);
            }
            s.post_tags.retain(|pt| pt.post_id != id);
            s.comments.retain(|c| c.post_id != id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn list_posts_by_author(&self, author_id: Id) -> RepoResult<Vec<Post>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.posts.iter().rev().filter(|p| p.author_id == author_id).cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn list_post_ids_by_author(&self, author_id: Id) -> RepoResult<Vec<Id>> {
            let s = self.read()?;
            Ok(s.posts.iter().filter(|p| p.author_id == author_id).map(|p| p.id).collect())
        }

        async fn count_posts_by_author(&self, author_id: Id) -> RepoResult<i64> {
            let s = self.read()?;
            Ok(s.posts.iter().filter(|p| p.author_id == author_id).count() as i64)
        }

        async fn list_published(&self, filter: PostFilter) -> RepoResult<Vec<PostSummary>> {
            let s = self.read()?;
            let needle = filter.title_query.as_ref().map(|q| q.to_lowercase());
            let mut v: Vec<_> = s
                .posts
                .iter()
                .rev()
                .filter(|p| p.published)
                .filter(|p| needle.as_ref().map_or(true, |n| p.title.to_lowercase().contains(n.as_str())))
                .filter(|p| filter.post_ids.as_ref().map_or(true, |ids| ids.contains(&p.id)))
                .map(|p| PostSummary {
                    id: p.id,
                    title: p.title.clone(),
                    slug: p.slug.clone(),
                    excerpt: p.excerpt.clone(),
                    featured_image: p.featured_image.clone(),
                    published_at: p.published_at,
                    author_name: s.author_name(p.author_id),
                })
                .collect();
            v.sort_by(|a, b| b.published_at.cmp(&a.published_at));
            Ok(v)
        }
    }

    #[async_trait]
    impl TagRepo for InMemRepo {
        async fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
            let s = self.read()?;
            Ok(s.tags.iter().find(|t| t.name == name).cloned())
        }

        async fn find_tag_by_slug(&self, slug: &str) -> RepoResult<Option<Tag>> {
            let s = self.read()?;
            Ok(s.tags.iter().find(|t| t.slug == slug).cloned())
        }

        async fn insert_tag(&self, name: &str, slug: &str) -> RepoResult<Tag> {
            let mut s = self.write()?;
            if s.tags.iter().any(|t| t.name == name || t.slug == slug) {
                return Err(RepoError::Conflict);
            }
            let tag = Tag { id: Uuid::new_v4(), name: name.to_string(), slug: slug.to_string(), created_at: Utc::now() };
            s.tags.push(tag.clone());
            drop(s);
            self.persist();
            Ok(tag)
        }

        async fn list_tags(&self, limit: i64) -> RepoResult<Vec<Tag>> {
            let s = self.read()?;
            Ok(s.tags.iter().take(limit.max(0) as usize).cloned().collect())
        }

        async fn clear_post_tags(&self, post_id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.post_tags.retain(|pt| pt.post_id != post_id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn attach_tag(&self, post_id: Id, tag_id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if !s.posts.iter().any(|p| p.id == post_id) || !s.tags.iter().any(|t| t.id == tag_id) {
                return Err(RepoError::NotFound);
            }
            let pair = PostTag { post_id, tag_id };
            if s.post_tags.contains(&pair) {
                return Err(RepoError::Conflict);
            }
            s.post_tags.push(pair);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn tags_for_post(&self, post_id: Id) -> RepoResult<Vec<Tag>> {
            let s = self.read()?;
            let mut v: Vec<Tag> = s
                .post_tags
                .iter()
                .filter(|pt| pt.post_id == post_id)
                .filter_map(|pt| s.tags.iter().find(|t| t.id == pt.tag_id).cloned())
                .collect();
            v.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(v)
        }

        async fn post_ids_for_tag(&self, tag_id: Id) -> RepoResult<Vec<Id>> {
            let s = self.read()?;
            Ok(s.post_tags.iter().filter(|pt| pt.tag_id == tag_id).map(|pt| pt.post_id).collect())
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let mut s = self.write()?;
            if !s.posts.iter().any(|p| p.id == new.post_id) {
                return Err(RepoError::NotFound);
            }
            let comment = Comment {
                id: Uuid::new_v4(),
                post_id: new.post_id,
                author_id: new.author_id,
                parent_id: new.parent_id,
                content: new.content,
                status: new.status,
                created_at: Utc::now(),
            };
            s.comments.push(comment.clone());
            drop(s);
            self.persist();
            Ok(comment)
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let s = self.read()?;
            s.comments.iter().find(|c| c.id == id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_approved_comments(&self, post_id: Id) -> RepoResult<Vec<CommentView>> {
            let s = self.read()?;
            let mut v: Vec<_> = s
                .comments
                .iter()
                .filter(|c| c.post_id == post_id && c.status == CommentStatus::Approved)
                .map(|c| CommentView {
                    id: c.id,
                    post_id: c.post_id,
                    parent_id: c.parent_id,
                    content: c.content.clone(),
                    created_at: c.created_at,
                    author_name: s.author_name(c.author_id),
                })
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at)); // ascending
            Ok(v)
        }

        async fn list_comments_for_posts(&self, post_ids: &[Id]) -> RepoResult<Vec<ModerationItem>> {
            let s = self.read()?;
            let mut v: Vec<_> = s
                .comments
                .iter()
                .rev()
                .filter(|c| post_ids.contains(&c.post_id))
                .map(|c| ModerationItem {
                    id: c.id,
                    post_id: c.post_id,
                    parent_id: c.parent_id,
                    content: c.content.clone(),
                    status: c.status,
                    created_at: c.created_at,
                    post_title: s.posts.iter().find(|p| p.id == c.post_id).map(|p| p.title.clone()),
                    author_name: s.author_name(c.author_id),
                })
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn count_comments_for_posts(&self, post_ids: &[Id]) -> RepoResult<i64> {
            let s = self.read()?;
            Ok(s.comments.iter().filter(|c| post_ids.contains(&c.post_id)).count() as i64)
        }

        async fn set_comment_status(&self, id: Id, status: CommentStatus) -> RepoResult<Comment> {
            let mut s = self.write()?;
            let comment = s.comments.iter_mut().find(|c| c.id == id).ok_or(RepoError::NotFound)?;
            comment.status = status;
            let updated = comment.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_comment(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            let before = s.comments.len();
            s.comments.retain(|c| c.id != id);
            if s.comments.len() == before {
                return Err(RepoError::NotFound);
            }
            // replies keep existing but lose their parent, like ON DELETE SET NULL
            for c in s.comments.iter_mut().filter(|c| c.parent_id == Some(id)) {
                c.parent_id = None;
            }
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl AlbumRepo for InMemRepo {
        async fn create_album(&self, author_id: Id, title: String, description: Option<String>, cover_image: Option<String>) -> RepoResult<Album> {
            let mut s = self.write()?;
            let now = Utc::now();
            let album = Album { id: Uuid::new_v4(), author_id, title, description, cover_image, created_at: now, updated_at: now };
            s.albums.push(album.clone());
            drop(s);
            self.persist();
            Ok(album)
        }

        async fn get_album(&self, id: Id) -> RepoResult<Album> {
            let s = self.read()?;
            s.albums.iter().find(|a| a.id == id).cloned().ok_or(RepoError::NotFound)
        }

        async fn find_owned_album(&self, id: Id, author_id: Id) -> RepoResult<Album> {
            let s = self.read()?;
            s.albums
                .iter()
                .find(|a| a.id == id && a.author_id == author_id)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn list_albums_by_author(&self, author_id: Id) -> RepoResult<Vec<AlbumSummary>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.albums.iter().rev().filter(|a| a.author_id == author_id).map(|a| s.summarize(a)).collect();
            v.sort_by(|a, b| b.album.created_at.cmp(&a.album.created_at));
            Ok(v)
        }

        async fn list_recent_albums(&self, limit: i64) -> RepoResult<Vec<AlbumSummary>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.albums.iter().rev().map(|a| s.summarize(a)).collect();
            v.sort_by(|a, b| b.album.created_at.cmp(&a.album.created_at));
            v.truncate(limit.max(0) as usize);
            Ok(v)
        }

        async fn list_album_ids_by_author(&self, author_id: Id) -> RepoResult<Vec<Id>> {
            let s = self.read()?;
            Ok(s.albums.iter().filter(|a| a.author_id == author_id).map(|a| a.id).collect())
        }

        async fn update_album(&self, id: Id, upd: AlbumChanges) -> RepoResult<Album> {
            let mut s = self.write()?;
            let album = s.albums.iter_mut().find(|a| a.id == id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title { album.title = title; }
            if let Some(description) = upd.description { album.description = description; }
            if let Some(cover) = upd.cover_image { album.cover_image = cover; }
            album.updated_at = Utc::now();
            let updated = album.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_album(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            let before = s.albums.len();
            s.albums.retain(|a| a.id != id);
            if s.albums.len() == before {
                return Err(RepoError::NotFound);
            }
            s.photos.retain(|p| p.album_id != id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl PhotoRepo for InMemRepo {
        async fn create_photo(&self, record: PhotoRecord) -> RepoResult<Photo> {
            let mut s = self.write()?;
            if !s.albums.iter().any(|a| a.id == record.album_id) {
                return Err(RepoError::NotFound);
            }
            let photo = Photo {
                id: Uuid::new_v4(),
                album_id: record.album_id,
                filename: record.filename,
                url: record.url,
                caption: record.caption,
                alt_text: record.alt_text,
                created_at: Utc::now(),
            };
            s.photos.push(photo.clone());
            drop(s);
            self.persist();
            Ok(photo)
        }

        async fn list_photos(&self, album_id: Id) -> RepoResult<Vec<Photo>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.photos.iter().rev().filter(|p| p.album_id == album_id).cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn find_photo_in_albums(&self, photo_id: Id, album_id: Id, owned_album_ids: &[Id]) -> RepoResult<Photo> {
            let s = self.read()?;
            s.photos
                .iter()
                .find(|p| p.id == photo_id && p.album_id == album_id && owned_album_ids.contains(&p.album_id))
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn update_photo(&self, id: Id, upd: PhotoChanges) -> RepoResult<Photo> {
            let mut s = self.write()?;
            let photo = s.photos.iter_mut().find(|p| p.id == id).ok_or(RepoError::NotFound)?;
            if let Some(caption) = upd.caption { photo.caption = caption; }
            if let Some(alt) = upd.alt_text { photo.alt_text = alt; }
            let updated = photo.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_photo(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            let before = s.photos.len();
            s.photos.retain(|p| p.id != id);
            if s.photos.len() == before {
                return Err(RepoError::NotFound);
            }
            drop(s);
            self.persist();
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store"), pointed at the BaaS database.
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => RepoError::Conflict,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    const POST_COLS: &str = "id, author_id, title, slug, excerpt, content, featured_image, published, published_at, created_at, updated_at";
    const ALBUM_COLS: &str = "a.id, a.author_id, a.title, a.description, a.cover_image, a.created_at, a.updated_at";
    const PHOTO_COLS: &str = "id, album_id, filename, url, caption, alt_text, created_at";
    const COMMENT_COLS: &str = "id, post_id, author_id, parent_id, content, status, created_at";

    #[async_trait]
    impl ProfileRepo for PgRepo {
        async fn get_profile(&self, id: Id) -> RepoResult<Profile> {
            sqlx::query_as::<_, Profile>("SELECT id, full_name, bio, website, created_at, updated_at FROM profiles WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn insert_profile(&self, id: Id, full_name: Option<String>) -> RepoResult<Profile> {
            sqlx::query_as::<_, Profile>(
                "INSERT INTO profiles (id, full_name) VALUES ($1, $2) RETURNING id, full_name, bio, website, created_at, updated_at"
            )
            .bind(id).bind(full_name)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn update_profile(&self, id: Id, input: ProfileInput) -> RepoResult<Profile> {
            sqlx::query_as::<_, Profile>(
                "UPDATE profiles SET full_name = $2, bio = $3, website = $4, updated_at = now() WHERE id = $1 \
                 RETURNING id, full_name, bio, website, created_at, updated_at"
            )
            .bind(id).bind(input.full_name).bind(input.bio).bind(input.website)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(&format!(
                "INSERT INTO posts (author_id, title, slug, excerpt, content, featured_image, published, published_at) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8) RETURNING {POST_COLS}"
            ))
            .bind(new.author_id).bind(new.title).bind(new.slug).bind(new.excerpt)
            .bind(new.content).bind(new.featured_image).bind(new.published).bind(new.published_at)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLS} FROM posts WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_post_by_slug(&self, slug: &str) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLS} FROM posts WHERE slug = $1"))
                .bind(slug)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn find_owned_post(&self, id: Id, author_id: Id) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLS} FROM posts WHERE id = $1 AND author_id = $2"))
                .bind(id).bind(author_id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn update_post(&self, id: Id, c: PostChanges) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(&format!(
                "UPDATE posts SET title = $2, slug = $3, excerpt = $4, content = $5, featured_image = $6, \
                 published = $7, published_at = $8, updated_at = now() WHERE id = $1 RETURNING {POST_COLS}"
            ))
            .bind(id).bind(c.title).bind(c.slug).bind(c.excerpt).bind(c.content)
            .bind(c.featured_image).bind(c.published).bind(c.published_at)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM posts WHERE id = $1").bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn list_posts_by_author(&self, author_id: Id) -> RepoResult<Vec<Post>> {
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLS} FROM posts WHERE author_id = $1 ORDER BY created_at DESC"))
                .bind(author_id)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn list_post_ids_by_author(&self, author_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>("SELECT id FROM posts WHERE author_id = $1")
                .bind(author_id)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn count_posts_by_author(&self, author_id: Id) -> RepoResult<i64> {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE author_id = $1")
                .bind(author_id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn list_published(&self, filter: PostFilter) -> RepoResult<Vec<PostSummary>> {
            // NULL parameters disable their predicate
            let pattern = filter.title_query.map(|q| format!("%{}%", q.replace('%', "\\%").replace('_', "\\_")));
            sqlx::query_as::<_, PostSummary>(r#"
                SELECT p.id, p.title, p.slug, p.excerpt, p.featured_image, p.published_at, pr.full_name AS author_name
                FROM posts p
                LEFT JOIN profiles pr ON pr.id = p.author_id
                WHERE p.published
                  AND ($1::text IS NULL OR p.title ILIKE $1)
                  AND ($2::uuid[] IS NULL OR p.id = ANY($2))
                ORDER BY p.published_at DESC NULLS LAST
            "#)
            .bind(pattern)
            .bind(filter.post_ids)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl TagRepo for PgRepo {
        async fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
            sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tags WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool).await.map_err(map_err)
        }
        async fn find_tag_by_slug(&self, slug: &str) -> RepoResult<Option<Tag>> {
            sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tags WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool).await.map_err(map_err)
        }
        async fn insert_tag(&self, name: &str, slug: &str) -> RepoResult<Tag> {
            sqlx::query_as::<_, Tag>("INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id, name, slug, created_at")
                .bind(name).bind(slug)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn list_tags(&self, limit: i64) -> RepoResult<Vec<Tag>> {
            sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tags ORDER BY created_at LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn clear_post_tags(&self, post_id: Id) -> RepoResult<()> {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1").bind(post_id).execute(&self.pool).await.map_err(map_err)?;
            Ok(())
        }
        async fn attach_tag(&self, post_id: Id, tag_id: Id) -> RepoResult<()> {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
                .bind(post_id).bind(tag_id)
                .execute(&self.pool).await.map_err(map_err)?;
            Ok(())
        }
        async fn tags_for_post(&self, post_id: Id) -> RepoResult<Vec<Tag>> {
            sqlx::query_as::<_, Tag>(
                "SELECT t.id, t.name, t.slug, t.created_at FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = $1 ORDER BY t.name"
            )
            .bind(post_id)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn post_ids_for_tag(&self, tag_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>("SELECT post_id FROM post_tags WHERE tag_id = $1")
                .bind(tag_id)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(&format!(
                "INSERT INTO comments (post_id, author_id, parent_id, content, status) VALUES ($1,$2,$3,$4,$5) RETURNING {COMMENT_COLS}"
            ))
            .bind(new.post_id).bind(new.author_id).bind(new.parent_id).bind(new.content).bind(new.status.as_str())
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLS} FROM comments WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn list_approved_comments(&self, post_id: Id) -> RepoResult<Vec<CommentView>> {
            sqlx::query_as::<_, CommentView>(r#"
                SELECT c.id, c.post_id, c.parent_id, c.content, c.created_at, pr.full_name AS author_name
                FROM comments c
                LEFT JOIN profiles pr ON pr.id = c.author_id
                WHERE c.post_id = $1 AND c.status = 'approved'
                ORDER BY c.created_at ASC
            "#)
            .bind(post_id)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn list_comments_for_posts(&self, post_ids: &[Id]) -> RepoResult<Vec<ModerationItem>> {
            sqlx::query_as::<_, ModerationItem>(r#"
                SELECT c.id, c.post_id, c.parent_id, c.content, c.status, c.created_at,
                       p.title AS post_title, pr.full_name AS author_name
                FROM comments c
                LEFT JOIN posts p ON p.id = c.post_id
                LEFT JOIN profiles pr ON pr.id = c.author_id
                WHERE c.post_id = ANY($1)
                ORDER BY c.created_at DESC
            "#)
            .bind(post_ids)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn count_comments_for_posts(&self, post_ids: &[Id]) -> RepoResult<i64> {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = ANY($1)")
                .bind(post_ids)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn set_comment_status(&self, id: Id, status: CommentStatus) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(&format!("UPDATE comments SET status = $2 WHERE id = $1 RETURNING {COMMENT_COLS}"))
                .bind(id).bind(status.as_str())
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_comment(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM comments WHERE id = $1").bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl AlbumRepo for PgRepo {
        async fn create_album(&self, author_id: Id, title: String, description: Option<String>, cover_image: Option<String>) -> RepoResult<Album> {
            sqlx::query_as::<_, Album>(
                "INSERT INTO albums (author_id, title, description, cover_image) VALUES ($1,$2,$3,$4) \
                 RETURNING id, author_id, title, description, cover_image, created_at, updated_at"
            )
            .bind(author_id).bind(title).bind(description).bind(cover_image)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_album(&self, id: Id) -> RepoResult<Album> {
            sqlx::query_as::<_, Album>(&format!("SELECT {ALBUM_COLS} FROM albums a WHERE a.id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn find_owned_album(&self, id: Id, author_id: Id) -> RepoResult<Album> {
            sqlx::query_as::<_, Album>(&format!("SELECT {ALBUM_COLS} FROM albums a WHERE a.id = $1 AND a.author_id = $2"))
                .bind(id).bind(author_id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn list_albums_by_author(&self, author_id: Id) -> RepoResult<Vec<AlbumSummary>> {
            sqlx::query_as::<_, AlbumSummary>(&format!(
                "SELECT {ALBUM_COLS}, (SELECT COUNT(*) FROM photos ph WHERE ph.album_id = a.id) AS photo_count \
                 FROM albums a WHERE a.author_id = $1 ORDER BY a.created_at DESC"
            ))
            .bind(author_id)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn list_recent_albums(&self, limit: i64) -> RepoResult<Vec<AlbumSummary>> {
            sqlx::query_as::<_, AlbumSummary>(&format!(
                "SELECT {ALBUM_COLS}, (SELECT COUNT(*) FROM photos ph WHERE ph.album_id = a.id) AS photo_count \
                 FROM albums a ORDER BY a.created_at DESC LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn list_album_ids_by_author(&self, author_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>("SELECT id FROM albums WHERE author_id = $1")
                .bind(author_id)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn update_album(&self, id: Id, upd: AlbumChanges) -> RepoResult<Album> {
            sqlx::query_as::<_, Album>(
                "UPDATE albums SET title = COALESCE($2, title), \
                 description = CASE WHEN $3 THEN $4 ELSE description END, \
                 cover_image = CASE WHEN $5 THEN $6 ELSE cover_image END, updated_at = now() WHERE id = $1 \
                 RETURNING id, author_id, title, description, cover_image, created_at, updated_at"
            )
            .bind(id).bind(upd.title)
            .bind(upd.description.is_some()).bind(upd.description.flatten())
            .bind(upd.cover_image.is_some()).bind(upd.cover_image.flatten())
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_album(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM albums WHERE id = $1").bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl PhotoRepo for PgRepo {
        async fn create_photo(&self, r: PhotoRecord) -> RepoResult<Photo> {
            sqlx::query_as::<_, Photo>(&format!(
                "INSERT INTO photos (album_id, filename, url, caption, alt_text) VALUES ($1,$2,$3,$4,$5) RETURNING {PHOTO_COLS}"
            ))
            .bind(r.album_id).bind(r.filename).bind(r.url).bind(r.caption).bind(r.alt_text)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn list_photos(&self, album_id: Id) -> RepoResult<Vec<Photo>> {
            sqlx::query_as::<_, Photo>(&format!("SELECT {PHOTO_COLS} FROM photos WHERE album_id = $1 ORDER BY created_at DESC"))
                .bind(album_id)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn find_photo_in_albums(&self, photo_id: Id, album_id: Id, owned_album_ids: &[Id]) -> RepoResult<Photo> {
            sqlx::query_as::<_, Photo>(&format!(
                "SELECT {PHOTO_COLS} FROM photos WHERE id = $1 AND album_id = $2 AND album_id = ANY($3)"
            ))
            .bind(photo_id).bind(album_id).bind(owned_album_ids)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn update_photo(&self, id: Id, upd: PhotoChanges) -> RepoResult<Photo> {
            sqlx::query_as::<_, Photo>(&format!(
                "UPDATE photos SET caption = CASE WHEN $2 THEN $3 ELSE caption END, \
                 alt_text = CASE WHEN $4 THEN $5 ELSE alt_text END WHERE id = $1 RETURNING {PHOTO_COLS}"
            ))
            .bind(id)
            .bind(upd.caption.is_some()).bind(upd.caption.flatten())
            .bind(upd.alt_text.is_some()).bind(upd.alt_text.flatten())
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_photo(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM photos WHERE id = $1").bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }
}

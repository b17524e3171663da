use chrono::Utc;
use tracing::info;

use crate::auth::Principal;
use crate::comments;
use crate::error::ApiError;
use crate::guard;
use crate::models::*;
use crate::repo::{Repo, RepoError};
use crate::tags;

const HOME_TAG_LIMIT: i64 = 10;

/// `"Hello, World!"` -> `"hello-world"`.
pub fn slugify_title(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Profiles are created lazily, the first time an account authors something.
pub async fn ensure_profile(repo: &dyn Repo, who: &Principal) -> Result<Profile, ApiError> {
    match repo.get_profile(who.id).await {
        Ok(profile) => return Ok(profile),
        Err(RepoError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }
    match repo.insert_profile(who.id, Some(who.display_name())).await {
        Ok(profile) => {
            info!(account = %who.id, "provisioned profile");
            Ok(profile)
        }
        // another request provisioned it first
        Err(RepoError::Conflict) => Ok(repo.get_profile(who.id).await?),
        Err(e) => Err(e.into()),
    }
}

struct ValidPost {
    title: String,
    slug: String,
    excerpt: Option<String>,
    content: String,
    featured_image: Option<String>,
}

fn validate(input: &PostInput) -> Result<ValidPost, ApiError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    if input.content.trim().is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    let slug = match non_blank(input.slug.clone()) {
        Some(s) => slugify_title(&s),
        None => slugify_title(title),
    };
    if slug.is_empty() {
        return Err(ApiError::bad_request("Slug is required"));
    }
    Ok(ValidPost {
        title: title.to_string(),
        slug,
        excerpt: non_blank(input.excerpt.clone()),
        content: input.content.clone(),
        featured_image: non_blank(input.featured_image.clone()),
    })
}

fn slug_taken(e: RepoError) -> ApiError {
    match e {
        RepoError::Conflict => ApiError::Conflict("A post with this slug already exists".into()),
        other => other.into(),
    }
}

async fn with_tag_names(repo: &dyn Repo, post: Post) -> Result<EditablePost, ApiError> {
    let tags = repo.tags_for_post(post.id).await?.into_iter().map(|t| t.name).collect();
    Ok(EditablePost { post, tags })
}

pub async fn create_post(repo: &dyn Repo, who: &Principal, input: PostInput) -> Result<EditablePost, ApiError> {
    let valid = validate(&input)?;
    ensure_profile(repo, who).await?;
    let post = repo
        .create_post(NewPost {
            author_id: who.id,
            title: valid.title,
            slug: valid.slug,
            excerpt: valid.excerpt,
            content: valid.content,
            featured_image: valid.featured_image,
            published: input.published,
            published_at: input.published.then(Utc::now),
        })
        .await
        .map_err(slug_taken)?;
    tags::replace_post_tags(repo, post.id, &input.tags).await?;
    info!(post_id = %post.id, slug = %post.slug, published = post.published, "post created");
    with_tag_names(repo, post).await
}

pub async fn update_post(repo: &dyn Repo, who: &Principal, post_id: Id, input: PostInput) -> Result<EditablePost, ApiError> {
    let existing = guard::owned_post(repo, post_id, who.id).await?;
    let valid = validate(&input)?;
    // published_at is written once, on the first publish
    let published_at = match existing.published_at {
        Some(at) => Some(at),
        None if input.published => Some(Utc::now()),
        None => None,
    };
    let post = repo
        .update_post(
            existing.id,
            PostChanges {
                title: valid.title,
                slug: valid.slug,
                excerpt: valid.excerpt,
                content: valid.content,
                featured_image: valid.featured_image,
                published: input.published,
                published_at,
            },
        )
        .await
        .map_err(slug_taken)?;
    tags::replace_post_tags(repo, post.id, &input.tags).await?;
    with_tag_names(repo, post).await
}

pub async fn delete_post(repo: &dyn Repo, who: &Principal, post_id: Id) -> Result<(), ApiError> {
    let post = guard::owned_post(repo, post_id, who.id).await?;
    repo.delete_post(post.id).await?;
    info!(post_id = %post.id, "post deleted");
    Ok(())
}

pub async fn list_own(repo: &dyn Repo, who: &Principal) -> Result<Vec<Post>, ApiError> {
    Ok(repo.list_posts_by_author(who.id).await?)
}

pub async fn get_own(repo: &dyn Repo, who: &Principal, post_id: Id) -> Result<EditablePost, ApiError> {
    let post = guard::owned_post(repo, post_id, who.id).await?;
    with_tag_names(repo, post).await
}

/// Posts must already be ordered by `published_at` descending. Unpublished-date rows
/// are left out.
pub fn group_by_month(posts: &[PostSummary]) -> Vec<ArchiveMonth> {
    let mut months: Vec<ArchiveMonth> = Vec::new();
    for post in posts {
        let Some(at) = post.published_at else { continue };
        let key = at.format("%Y-%m").to_string();
        match months.last_mut() {
            Some(m) if m.month == key => m.posts.push(post.clone()),
            _ => months.push(ArchiveMonth { month: key, posts: vec![post.clone()] }),
        }
    }
    months
}

pub async fn home_feed(repo: &dyn Repo, query: Option<String>, tag_slug: Option<String>) -> Result<HomeFeed, ApiError> {
    let mut filter = PostFilter { title_query: non_blank(query), post_ids: None };
    if let Some(slug) = non_blank(tag_slug) {
        filter.post_ids = Some(match repo.find_tag_by_slug(&slug).await? {
            Some(tag) => repo.post_ids_for_tag(tag.id).await?,
            None => Vec::new(),
        });
    }
    let posts = repo.list_published(filter).await?;
    let tags = repo.list_tags(HOME_TAG_LIMIT).await?;
    let archive = group_by_month(&posts);
    Ok(HomeFeed { posts, tags, archive })
}

pub async fn post_page(repo: &dyn Repo, slug: &str) -> Result<PostPage, ApiError> {
    let post = match repo.get_post_by_slug(slug).await {
        Ok(post) if post.published => post,
        Ok(_) | Err(RepoError::NotFound) => return Err(ApiError::NotFound("Post not found".into())),
        Err(e) => return Err(e.into()),
    };
    let author_name = match repo.get_profile(post.author_id).await {
        Ok(p) => p.full_name,
        Err(RepoError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    let tags = repo.tags_for_post(post.id).await?;
    let comments = comments::approved_thread(repo, post.id).await?;
    Ok(PostPage { post, author_name, tags, comments })
}

pub async fn dashboard_stats(repo: &dyn Repo, who: &Principal) -> Result<DashboardStats, ApiError> {
    let posts = repo.count_posts_by_author(who.id).await?;
    let post_ids = repo.list_post_ids_by_author(who.id).await?;
    let comments = if post_ids.is_empty() { 0 } else { repo.count_comments_for_posts(&post_ids).await? };
    Ok(DashboardStats { posts, comments })
}

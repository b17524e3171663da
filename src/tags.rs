use tracing::debug;

use crate::models::{Id, Tag};
use crate::repo::{Repo, RepoError, RepoResult};

/// `"Rust Async"` -> `"rust-async"`.
pub fn tag_slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Trims names, drops blanks and keeps the first name for each slug,
/// so `["Rust", "rust"]` yields one tag.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    let mut slugs: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let slug = tag_slug(name);
        if slugs.contains(&slug) {
            continue;
        }
        slugs.push(slug);
        out.push(name.to_string());
    }
    out
}

/// Find-or-create. An exact name match wins, then any tag sharing the slug,
/// so "rust" reuses an existing "Rust".
///
/// Two requests may race to insert the same new tag; the store's unique constraints
/// reject the loser, which then picks up the winner's row.
pub async fn resolve_tag(repo: &dyn Repo, name: &str) -> RepoResult<Tag> {
    if let Some(tag) = repo.find_tag_by_name(name).await? {
        return Ok(tag);
    }
    let slug = tag_slug(name);
    if let Some(tag) = repo.find_tag_by_slug(&slug).await? {
        return Ok(tag);
    }
    match repo.insert_tag(name, &slug).await {
        Ok(tag) => Ok(tag),
        Err(RepoError::Conflict) => {
            debug!(tag = name, "tag insert lost a race, re-reading");
            match repo.find_tag_by_slug(&slug).await? {
                Some(tag) => Ok(tag),
                None => repo.find_tag_by_name(name).await?.ok_or(RepoError::Conflict),
            }
        }
        Err(e) => Err(e),
    }
}

/// Full replace: drops every association of the post, then attaches `names` in order.
pub async fn replace_post_tags(repo: &dyn Repo, post_id: Id, names: &[String]) -> RepoResult<Vec<Tag>> {
    repo.clear_post_tags(post_id).await?;
    let mut attached = Vec::new();
    for name in normalize_tag_names(names) {
        let tag = resolve_tag(repo, &name).await?;
        repo.attach_tag(post_id, tag.id).await?;
        attached.push(tag);
    }
    Ok(attached)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_hyphenates() {
        assert_eq!(tag_slug("Rust Async"), "rust-async");
        assert_eq!(tag_slug("web"), "web");
    }

    #[test]
    fn names_are_trimmed_and_deduplicated() {
        let raw = vec![" rust ".to_string(), "".into(), "web".into(), "rust".into(), "  ".into()];
        assert_eq!(normalize_tag_names(&raw), vec!["rust".to_string(), "web".to_string()]);
    }

    #[test]
    fn names_sharing_a_slug_collapse() {
        let raw = vec!["Rust".to_string(), "rust".into(), "a b".into(), "a-b".into()];
        assert_eq!(normalize_tag_names(&raw), vec!["Rust".to_string(), "a b".to_string()]);
    }

    #[cfg(feature = "inmem-store")]
    #[tokio::test]
    async fn replace_is_full_replace() {
        use crate::models::NewPost;
        use crate::repo::inmem::InMemRepo;
        use crate::repo::{PostRepo, TagRepo};

        let repo = InMemRepo::ephemeral();
        let post = repo
            .create_post(NewPost {
                author_id: uuid::Uuid::new_v4(),
                title: "T".into(),
                slug: "t".into(),
                excerpt: None,
                content: "c".into(),
                featured_image: None,
                published: false,
                published_at: None,
            })
            .await
            .unwrap();

        replace_post_tags(&repo, post.id, &["a".into(), "b".into()]).await.unwrap();
        replace_post_tags(&repo, post.id, &["b".into(), "c".into()]).await.unwrap();

        let names: Vec<_> = repo.tags_for_post(post.id).await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b", "c"]);
        // "b" was reused, not duplicated
        assert_eq!(repo.list_tags(100).await.unwrap().len(), 3);

        // a different spelling of an existing slug reuses that tag
        let tags = replace_post_tags(&repo, post.id, &["B".into(), "Rust".into(), "rust".into()]).await.unwrap();
        let names: Vec<_> = tags.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b", "Rust"]);
        assert_eq!(repo.list_tags(100).await.unwrap().len(), 4);
    }
}

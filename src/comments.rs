//! Comment threads and the author's moderation queue.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::guard;
use crate::posts::ensure_profile;
use crate::models::*;
use crate::repo::{Repo, RepoError};

/// Builds the two-level thread shown under a post.
///
/// `comments` must be approved comments of one post, oldest first. A comment whose
/// parent is missing from the set is a root. Any other comment is filed under the root
/// at the top of its parent chain, so deeper replies flatten into one level. Roots come
/// out newest first; replies stay oldest first.
pub fn build_thread(comments: Vec<CommentView>) -> Vec<CommentNode> {
    let parents: HashMap<Id, Option<Id>> = comments.iter().map(|c| (c.id, c.parent_id)).collect();

    let root_of = |id: Id| -> Id {
        let mut current = id;
        let mut seen = HashSet::new();
        while let Some(Some(parent)) = parents.get(&current) {
            if !parents.contains_key(parent) || !seen.insert(current) {
                break;
            }
            current = *parent;
        }
        current
    };

    let mut roots: Vec<CommentNode> = Vec::new();
    let mut index: HashMap<Id, usize> = HashMap::new();
    let mut replies: Vec<(Id, CommentView)> = Vec::new();

    for comment in comments {
        let root = root_of(comment.id);
        if root == comment.id {
            index.insert(comment.id, roots.len());
            roots.push(CommentNode { comment, replies: Vec::new() });
        } else {
            replies.push((root, comment));
        }
    }
    for (root, reply) in replies {
        match index.get(&root) {
            Some(&i) => roots[i].replies.push(reply),
            // cycle with no entry point; show it rather than drop it
            None => roots.push(CommentNode { comment: reply, replies: Vec::new() }),
        }
    }

    roots.reverse();
    roots
}

pub async fn approved_thread(repo: &dyn Repo, post_id: Id) -> Result<Vec<CommentNode>, ApiError> {
    let comments = repo.list_approved_comments(post_id).await?;
    Ok(build_thread(comments))
}

pub async fn submit_comment(repo: &dyn Repo, who: &Principal, slug: &str, input: CommentInput) -> Result<Comment, ApiError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Comment cannot be empty"));
    }
    let post = match repo.get_post_by_slug(slug).await {
        Ok(post) if post.published => post,
        Ok(_) | Err(RepoError::NotFound) => return Err(ApiError::NotFound("Post not found".into())),
        Err(e) => return Err(e.into()),
    };

    if let Some(parent_id) = input.parent_id {
        match repo.get_comment(parent_id).await {
            Ok(parent) if parent.post_id == post.id => {}
            Ok(_) | Err(RepoError::NotFound) => return Err(ApiError::bad_request("Parent comment not found")),
            Err(e) => return Err(e.into()),
        }
    }
    ensure_profile(repo, who).await?;

    let comment = repo
        .create_comment(NewComment {
            post_id: post.id,
            author_id: who.id,
            parent_id: input.parent_id,
            content: content.to_string(),
            status: CommentStatus::Pending,
        })
        .await?;
    info!(comment_id = %comment.id, post_id = %post.id, "comment queued for moderation");
    Ok(comment)
}

pub async fn moderation_queue(repo: &dyn Repo, who: &Principal) -> Result<Vec<ModerationItem>, ApiError> {
    let post_ids = repo.list_post_ids_by_author(who.id).await?;
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(repo.list_comments_for_posts(&post_ids).await?)
}

pub async fn moderate(repo: &dyn Repo, who: &Principal, comment_id: Id, to: CommentStatus) -> Result<Comment, ApiError> {
    let comment = guard::moderated_comment(repo, comment_id, who.id).await?;
    let next = comment
        .status
        .transition(to)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;
    if next == comment.status {
        return Ok(comment);
    }
    let updated = repo.set_comment_status(comment.id, next).await?;
    info!(comment_id = %updated.id, status = next.as_str(), "comment moderated");
    Ok(updated)
}

pub async fn remove(repo: &dyn Repo, who: &Principal, comment_id: Id) -> Result<(), ApiError> {
    let comment = guard::moderated_comment(repo, comment_id, who.id).await?;
    repo.delete_comment(comment.id).await?;
    info!(comment_id = %comment.id, "comment deleted");
    Ok(())
}

/// Author replies skip the queue.
pub async fn reply_as_author(repo: &dyn Repo, who: &Principal, comment_id: Id, input: ReplyInput) -> Result<Comment, ApiError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Reply cannot be empty"));
    }
    let parent = guard::moderated_comment(repo, comment_id, who.id).await?;
    let reply = repo
        .create_comment(NewComment {
            post_id: parent.post_id,
            author_id: who.id,
            parent_id: Some(parent.id),
            content: content.to_string(),
            status: CommentStatus::Approved,
        })
        .await?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn view(id: Id, parent: Option<Id>, minute: i64) -> CommentView {
        CommentView {
            id,
            post_id: Uuid::nil(),
            parent_id: parent,
            content: format!("c{minute}"),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            author_name: None,
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<Id> {
        nodes.iter().map(|n| n.comment.id).collect()
    }

    #[test]
    fn replies_nest_under_root_and_roots_reverse() {
        let (c1, c2, c3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tree = build_thread(vec![view(c1, None, 0), view(c2, Some(c1), 1), view(c3, None, 2)]);
        assert_eq!(ids(&tree), vec![c3, c1]);
        assert_eq!(tree[1].replies.iter().map(|r| r.id).collect::<Vec<_>>(), vec![c2]);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn unresolvable_parent_makes_a_root() {
        let (c1, ghost) = (Uuid::new_v4(), Uuid::new_v4());
        let tree = build_thread(vec![view(c1, Some(ghost), 0)]);
        assert_eq!(ids(&tree), vec![c1]);
    }

    #[test]
    fn deep_chains_flatten_into_top_root() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tree = build_thread(vec![view(a, None, 0), view(b, Some(a), 1), view(c, Some(b), 2)]);
        assert_eq!(ids(&tree), vec![a]);
        assert_eq!(tree[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn every_comment_appears_exactly_once() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // c and d point at each other
        let input = vec![view(a, None, 0), view(b, Some(a), 1), view(c, Some(d), 2), view(d, Some(c), 3)];
        let tree = build_thread(input);
        let mut seen: Vec<Id> = tree
            .iter()
            .flat_map(|n| std::iter::once(n.comment.id).chain(n.replies.iter().map(|r| r.id)))
            .collect();
        seen.sort();
        let mut expected = vec![a, b, c, d];
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn empty_input_yields_empty_thread() {
        assert!(build_thread(Vec::new()).is_empty());
    }
}

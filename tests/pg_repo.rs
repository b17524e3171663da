#![cfg(feature = "postgres-store")]

use folio::models::{CommentStatus, NewComment, NewPost};
use folio::repo::pg::PgRepo;
use folio::repo::{CommentRepo, PostRepo, ProfileRepo, RepoError, TagRepo};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn pg_repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await
        .ok()?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.ok()?;
    Some(repo)
}

#[tokio::test]
#[serial_test::serial]
async fn post_lifecycle_against_postgres() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return; };
    let author = Uuid::new_v4();
    repo.insert_profile(author, Some("Pg Author".into())).await.unwrap();

    let slug = format!("pg-{}", Uuid::new_v4().simple());
    let new_post = || NewPost {
        author_id: author,
        title: "Pg".into(),
        slug: slug.clone(),
        excerpt: None,
        content: "body".into(),
        featured_image: None,
        published: true,
        published_at: Some(chrono::Utc::now()),
    };
    let post = repo.create_post(new_post()).await.unwrap();
    assert!(matches!(repo.create_post(new_post()).await.unwrap_err(), RepoError::Conflict));

    let tag_slug = format!("t-{}", Uuid::new_v4().simple());
    let tag = repo.insert_tag(&tag_slug, &tag_slug).await.unwrap();
    repo.attach_tag(post.id, tag.id).await.unwrap();
    assert_eq!(repo.post_ids_for_tag(tag.id).await.unwrap(), vec![post.id]);

    let comment = repo
        .create_comment(NewComment {
            post_id: post.id,
            author_id: author,
            parent_id: None,
            content: "hi".into(),
            status: CommentStatus::Pending,
        })
        .await
        .unwrap();
    let approved = repo.set_comment_status(comment.id, CommentStatus::Approved).await.unwrap();
    assert_eq!(approved.status, CommentStatus::Approved);
    let thread = repo.list_approved_comments(post.id).await.unwrap();
    assert_eq!(thread[0].author_name.as_deref(), Some("Pg Author"));

    repo.delete_post(post.id).await.unwrap();
    assert!(matches!(repo.get_comment(comment.id).await.unwrap_err(), RepoError::NotFound));
}

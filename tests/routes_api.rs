#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use folio::auth::{JwtIdentity, Principal};
use folio::repo::inmem::InMemRepo;
use folio::{config, AppConfig, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

fn principal(name: &str) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        email: Some(format!("{name}@example.com")),
        full_name: Some(name.to_string()),
    }
}

fn bearer(p: &Principal) -> (&'static str, String) {
    let token = JwtIdentity::new(SECRET).issue(p, chrono::Duration::hours(1)).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn state() -> AppState {
    let mut state = AppState::new(Arc::new(InMemRepo::ephemeral()), AppConfig::degraded());
    state.identity = Some(Arc::new(JwtIdentity::new(SECRET)));
    state
}

#[actix_web::test]
async fn album_photo_count_and_filename() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let x = principal("xavier");

    let req = test::TestRequest::post()
        .uri("/api/albums")
        .insert_header(bearer(&x))
        .set_json(json!({"title": "Trip"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let album: Value = test::read_body_json(resp).await;
    assert!(album["cover_image"].is_null());
    let album_id = album["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri("/api/albums").insert_header(bearer(&x)).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["title"], "Trip");
    assert_eq!(list[0]["photo_count"], 0);

    let req = test::TestRequest::post()
        .uri(&format!("/api/albums/{album_id}/photos"))
        .insert_header(bearer(&x))
        .set_json(json!({"url": "https://cdn/x.jpg", "caption": "  "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let photo: Value = test::read_body_json(resp).await;
    assert_eq!(photo["filename"], "x.jpg");
    assert!(photo["caption"].is_null(), "blank caption stored as null");

    let req = test::TestRequest::get().uri("/api/albums").insert_header(bearer(&x)).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list[0]["photo_count"], 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/albums/{album_id}/photos"))
        .insert_header(bearer(&x))
        .to_request();
    let photos: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(photos.as_array().unwrap().len(), 1);

    // the public gallery sees it too
    let req = test::TestRequest::get().uri("/api/gallery").to_request();
    let gallery: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(gallery[0]["photo_count"], 1);
}

#[actix_web::test]
async fn album_and_photo_validation_messages() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let x = principal("xavier");

    let req = test::TestRequest::post()
        .uri("/api/albums")
        .insert_header(bearer(&x))
        .set_json(json!({"title": "   "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Title is required"}));

    let req = test::TestRequest::post()
        .uri("/api/albums")
        .insert_header(bearer(&x))
        .set_json(json!({"title": "Trip"}))
        .to_request();
    let album: Value = test::call_and_read_body_json(&app, req).await;
    let req = test::TestRequest::post()
        .uri(&format!("/api/albums/{}/photos", album["id"].as_str().unwrap()))
        .insert_header(bearer(&x))
        .set_json(json!({"caption": "no url"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "URL is required"}));
}

#[actix_web::test]
async fn foreign_resources_look_missing() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let (a, b) = (principal("ann"), principal("bob"));

    let req = test::TestRequest::post()
        .uri("/api/albums")
        .insert_header(bearer(&a))
        .set_json(json!({"title": "Mine"}))
        .to_request();
    let album: Value = test::call_and_read_body_json(&app, req).await;
    let album_id = album["id"].as_str().unwrap().to_string();
    let req = test::TestRequest::post()
        .uri(&format!("/api/albums/{album_id}/photos"))
        .insert_header(bearer(&a))
        .set_json(json!({"url": "https://cdn/a.png"}))
        .to_request();
    let photo: Value = test::call_and_read_body_json(&app, req).await;
    let photo_id = photo["id"].as_str().unwrap().to_string();

    let mut outcomes = Vec::new();
    for uri in [
        format!("/api/albums/{album_id}/photos/{photo_id}"),
        format!("/api/albums/{album_id}/photos/{}", Uuid::new_v4()),
    ] {
        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&b))
            .set_json(json!({"caption": "hijack"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        outcomes.push((status, body));
    }
    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0].0, 404);
    assert_eq!(outcomes[0].1, json!({"error": "Photo not found or unauthorized"}));

    for uri in [format!("/api/albums/{album_id}"), format!("/api/albums/{}", Uuid::new_v4())] {
        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&b)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Album not found or unauthorized"}));
    }

    // owner still sees the untouched photo
    let req = test::TestRequest::get()
        .uri(&format!("/api/albums/{album_id}"))
        .insert_header(bearer(&a))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert!(detail["photos"][0]["caption"].is_null());

    // owner deletes the album; photos go with it
    let req = test::TestRequest::delete()
        .uri(&format!("/api/albums/{album_id}"))
        .insert_header(bearer(&a))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::get().uri(&format!("/api/gallery/{album_id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn tags_are_fully_replaced_on_save() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let a = principal("ann");

    let req = test::TestRequest::post()
        .uri("/api/dashboard/posts")
        .insert_header(bearer(&a))
        .set_json(json!({"title": "Tagged Post", "content": "body", "tags": ["a", "b"], "published": true}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let post: Value = test::read_body_json(resp).await;
    assert_eq!(post["slug"], "tagged-post");
    assert_eq!(post["tags"], json!(["a", "b"]));
    let id = post["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/dashboard/posts/{id}"))
        .insert_header(bearer(&a))
        .set_json(json!({"title": "Tagged Post", "content": "body", "tags": ["b", " c ", "c"], "published": true}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/api/dashboard/posts/{id}"))
        .insert_header(bearer(&a))
        .to_request();
    let post: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(post["tags"], json!(["b", "c"]));

    // tag filter on the home feed goes by slug
    let req = test::TestRequest::get().uri("/api/home?tag=a").to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["posts"].as_array().unwrap().len(), 0);
    let req = test::TestRequest::get().uri("/api/home?tag=c").to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["posts"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn tags_differing_only_in_spelling_share_one_row() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let a = principal("ann");
    let create = |title: &str, tags: Value| {
        test::TestRequest::post()
            .uri("/api/dashboard/posts")
            .insert_header(bearer(&a))
            .set_json(json!({"title": title, "content": "body", "tags": tags, "published": true}))
            .to_request()
    };

    let resp = test::call_service(&app, create("First", json!(["Rust"]))).await;
    assert_eq!(resp.status(), 201);

    let resp = test::call_service(&app, create("Second", json!(["rust", "a b"]))).await;
    assert_eq!(resp.status(), 201);
    let second: Value = test::read_body_json(resp).await;
    assert_eq!(second["tags"], json!(["Rust", "a b"]));

    // same slug twice in one submission attaches once
    let resp = test::call_service(&app, create("Third", json!(["Rust", "rust", "a-b"]))).await;
    assert_eq!(resp.status(), 201);
    let third: Value = test::read_body_json(resp).await;
    assert_eq!(third["tags"], json!(["Rust", "a b"]));

    let req = test::TestRequest::get().uri("/api/home?tag=rust").to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["posts"].as_array().unwrap().len(), 3);
}

#[actix_web::test]
async fn published_at_is_set_once() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let a = principal("ann");
    let body = |published: bool| json!({"title": "Draft", "slug": "draft", "content": "x", "published": published});

    let req = test::TestRequest::post()
        .uri("/api/dashboard/posts")
        .insert_header(bearer(&a))
        .set_json(body(false))
        .to_request();
    let post: Value = test::call_and_read_body_json(&app, req).await;
    assert!(post["published_at"].is_null());
    let uri = format!("/api/dashboard/posts/{}", post["id"].as_str().unwrap());

    let req = test::TestRequest::put().uri(&uri).insert_header(bearer(&a)).set_json(body(true)).to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    let stamp = first["published_at"].clone();
    assert!(stamp.is_string());

    for published in [true, false, true] {
        let req = test::TestRequest::put().uri(&uri).insert_header(bearer(&a)).set_json(body(published)).to_request();
        let again: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(again["published_at"], stamp);
        assert_eq!(again["published"], published);
    }
}

#[actix_web::test]
async fn duplicate_slug_conflicts() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let a = principal("ann");
    for expected in [201, 409] {
        let req = test::TestRequest::post()
            .uri("/api/dashboard/posts")
            .insert_header(bearer(&a))
            .set_json(json!({"title": "Same", "content": "x"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), expected);
    }
}

#[actix_web::test]
async fn comment_moderation_flow() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let (author, reader) = (principal("author"), principal("reader"));

    let req = test::TestRequest::post()
        .uri("/api/dashboard/posts")
        .insert_header(bearer(&author))
        .set_json(json!({"title": "Hello", "content": "x", "published": true}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/posts/hello/comments")
        .insert_header(bearer(&reader))
        .set_json(json!({"content": "Nice post"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let c1: Value = test::read_body_json(resp).await;
    assert_eq!(c1["status"], "pending");
    let c1_id = c1["id"].as_str().unwrap().to_string();

    // pending comments are not public
    let req = test::TestRequest::get().uri("/api/posts/hello/comments").to_request();
    let thread: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(thread, json!([]));

    // only the post author moderates
    let req = test::TestRequest::post()
        .uri(&format!("/api/dashboard/comments/{c1_id}/approve"))
        .insert_header(bearer(&reader))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri(&format!("/api/dashboard/comments/{c1_id}/approve"))
        .insert_header(bearer(&author))
        .to_request();
    let approved: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(approved["status"], "approved");

    let req = test::TestRequest::post()
        .uri(&format!("/api/dashboard/comments/{c1_id}/reply"))
        .insert_header(bearer(&author))
        .set_json(json!({"content": "Thanks!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let c2: Value = test::read_body_json(resp).await;
    assert_eq!(c2["status"], "approved");
    assert_eq!(c2["parent_id"], c1["id"]);

    let req = test::TestRequest::get().uri("/api/posts/hello").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["author_name"], "author");
    let thread = page["comments"].as_array().unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0]["id"], c1["id"]);
    assert_eq!(thread[0]["author_name"], "reader");
    assert_eq!(thread[0]["replies"].as_array().unwrap().len(), 1);
    assert_eq!(thread[0]["replies"][0]["id"], c2["id"]);

    // approved comments stay approved
    let req = test::TestRequest::post()
        .uri(&format!("/api/dashboard/comments/{c1_id}/reject"))
        .insert_header(bearer(&author))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);
    let req = test::TestRequest::post()
        .uri(&format!("/api/dashboard/comments/{c1_id}/approve"))
        .insert_header(bearer(&author))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/api/dashboard/comments").insert_header(bearer(&author)).to_request();
    let queue: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(queue.as_array().unwrap().len(), 2);
    assert_eq!(queue[0]["post_title"], "Hello");

    let req = test::TestRequest::get().uri("/api/dashboard/stats").insert_header(bearer(&author)).to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats, json!({"posts": 1, "comments": 2}));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/dashboard/comments/{c1_id}"))
        .insert_header(bearer(&author))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn comment_parent_must_belong_to_post() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let (author, reader) = (principal("author"), principal("reader"));
    for title in ["One", "Two"] {
        let req = test::TestRequest::post()
            .uri("/api/dashboard/posts")
            .insert_header(bearer(&author))
            .set_json(json!({"title": title, "content": "x", "published": true}))
            .to_request();
        let _: Value = test::call_and_read_body_json(&app, req).await;
    }
    let req = test::TestRequest::post()
        .uri("/api/posts/one/comments")
        .insert_header(bearer(&reader))
        .set_json(json!({"content": "on one"}))
        .to_request();
    let on_one: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/posts/two/comments")
        .insert_header(bearer(&reader))
        .set_json(json!({"content": "wrong parent", "parent_id": on_one["id"]}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/posts/missing/comments")
        .insert_header(bearer(&reader))
        .set_json(json!({"content": "hello?"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn home_feed_search_and_archive() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let a = principal("ann");
    for (title, published) in [("Rust Tips", true), ("Cooking", true), ("Secret Draft", false)] {
        let req = test::TestRequest::post()
            .uri("/api/dashboard/posts")
            .insert_header(bearer(&a))
            .set_json(json!({"title": title, "content": "x", "published": published}))
            .to_request();
        let _: Value = test::call_and_read_body_json(&app, req).await;
    }

    let req = test::TestRequest::get().uri("/api/home").to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["posts"].as_array().unwrap().len(), 2);
    assert_eq!(feed["posts"][0]["title"], "Cooking");
    assert_eq!(feed["posts"][0]["author_name"], "ann");
    assert_eq!(feed["archive"][0]["posts"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get().uri("/api/home?q=rUsT").to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["posts"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/api/posts/secret-draft").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Post not found"}));
}

#[actix_web::test]
async fn profile_is_provisioned_and_validated() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let mut a = principal("ann");
    a.full_name = None;

    let req = test::TestRequest::get().uri("/api/dashboard/profile").insert_header(bearer(&a)).to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["full_name"], "ann");

    let req = test::TestRequest::put()
        .uri("/api/dashboard/profile")
        .insert_header(bearer(&a))
        .set_json(json!({"full_name": "Ann Lee", "website": "javascript:alert(1)"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::put()
        .uri("/api/dashboard/profile")
        .insert_header(bearer(&a))
        .set_json(json!({"full_name": "Ann Lee", "bio": "writes", "website": "https://ann.dev"}))
        .to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["full_name"], "Ann Lee");
    assert_eq!(profile["website"], "https://ann.dev");
}

#[actix_web::test]
async fn auth_is_required_and_degrades_without_backend() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/albums").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Unauthorized"}));

    let req = test::TestRequest::get()
        .uri("/api/albums")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // no identity resolver at all
    let bare = AppState::new(Arc::new(InMemRepo::ephemeral()), AppConfig::degraded());
    let app = test::init_service(App::new().app_data(web::Data::new(bare)).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/albums").insert_header(bearer(&principal("x"))).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 503);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let health: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["storage_configured"], false);

    // public reads still work
    let req = test::TestRequest::get().uri("/api/home").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn session_cookie_is_accepted() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let a = principal("ann");
    let token = JwtIdentity::new(SECRET).issue(&a, chrono::Duration::hours(1)).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .cookie(actix_web::cookie::Cookie::new("sb-access-token", token))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["id"], a.id.to_string());
    assert_eq!(me["full_name"], "ann");
}

#[actix_web::test]
async fn blank_album_and_photo_fields_clear_to_null() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let x = principal("xavier");

    let req = test::TestRequest::post()
        .uri("/api/albums")
        .insert_header(bearer(&x))
        .set_json(json!({"title": "Trip", "description": "Summer", "cover_image": "https://cdn/c.jpg"}))
        .to_request();
    let album: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(album["description"], "Summer");
    let album_uri = format!("/api/albums/{}", album["id"].as_str().unwrap());

    let req = test::TestRequest::put()
        .uri(&album_uri)
        .insert_header(bearer(&x))
        .set_json(json!({"description": "   "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let updated: Value = test::read_body_json(resp).await;
    assert!(updated["description"].is_null());
    assert_eq!(updated["cover_image"], "https://cdn/c.jpg", "absent fields are untouched");

    let req = test::TestRequest::put()
        .uri(&album_uri)
        .insert_header(bearer(&x))
        .set_json(json!({"cover_image": ""}))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert!(updated["cover_image"].is_null());
    assert_eq!(updated["title"], "Trip");

    let req = test::TestRequest::post()
        .uri(&format!("{album_uri}/photos"))
        .insert_header(bearer(&x))
        .set_json(json!({"url": "https://cdn/p.jpg", "caption": "Beach", "alt_text": "Sand"}))
        .to_request();
    let photo: Value = test::call_and_read_body_json(&app, req).await;
    let req = test::TestRequest::put()
        .uri(&format!("{album_uri}/photos/{}", photo["id"].as_str().unwrap()))
        .insert_header(bearer(&x))
        .set_json(json!({"caption": " ", "alt_text": " Dunes "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let photo: Value = test::read_body_json(resp).await;
    assert!(photo["caption"].is_null());
    assert_eq!(photo["alt_text"], "Dunes");
}

#[actix_web::test]
async fn malformed_ids_and_queries_answer_json() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let x = principal("xavier");

    for uri in ["/api/albums/not-a-uuid", "/api/albums/not-a-uuid/photos", "/api/gallery/123"] {
        let req = test::TestRequest::get().uri(uri).insert_header(bearer(&x)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string(), "{uri}");
    }

    let req = test::TestRequest::get().uri("/api/home?q=a&q=b").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

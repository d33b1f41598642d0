//! Admin Endpoint Tests
//!
//! Covers group management, user deletion and admin token checks.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn create_group_returns_created() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/admin/groups/",
            json!({"title": "Cats", "slug": "adm-cats", "description": "all about cats"}),
            Some(app.admin_token()),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["title"], "Cats");
    assert_eq!(body["slug"], "adm-cats");
    assert!(body["id"].is_i64());

    let resp = app.get("/group/adm-cats/", None).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_slug_conflicts() {
    let app = app().await;
    let body = json!({"title": "Dogs", "slug": "adm-dogs"});

    let resp = app
        .post_admin("/admin/groups/", body.clone(), Some(app.admin_token()))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_admin("/admin/groups/", body, Some(app.admin_token()))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_group_payloads_are_rejected() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/admin/groups/",
            json!({"title": "   "}),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_admin(
            "/admin/groups/",
            json!({"title": "Spaces", "slug": "has spaces"}),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_endpoints_require_the_token() {
    let app = app().await;

    let resp = app
        .post_admin("/admin/groups/", json!({"title": "Nope"}), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .post_admin("/admin/groups/", json!({"title": "Nope"}), Some("wrong-token"))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.delete_admin("/admin/users/anyone/", None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_group_keeps_its_posts() {
    let app = app().await;
    let user = app.create_user("adm_group_delete").await;
    let group_id = app.create_group("adm_delete").await;
    let post_id = app.create_post(user.id, "survivor", Some(group_id)).await;

    let resp = app
        .delete_admin("/admin/groups/group-adm_delete/", Some(app.admin_token()))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let group: Option<i64> = sqlx::query_scalar("SELECT group_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(group, None);

    let resp = app.get("/group/group-adm_delete/", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .delete_admin("/admin/groups/group-adm_delete/", Some(app.admin_token()))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_user_cascades() {
    let app = app().await;
    let doomed = app.create_user("adm_user_doomed").await;
    let other = app.create_user("adm_user_other").await;
    let own_post = app.create_post(doomed.id, "mine", None).await;
    let other_post = app.create_post(other.id, "theirs", None).await;

    app.post_form(
        &format!("/{}/{}/comment/", other.username, other_post),
        &[("text", "doomed comment")],
        Some(&doomed.session),
    )
    .await;
    app.get(&format!("/{}/follow/", other.username), Some(&doomed.session))
        .await;
    app.get(&format!("/{}/follow/", doomed.username), Some(&other.session))
        .await;

    let resp = app
        .delete_admin(
            &format!("/admin/users/{}/", doomed.username),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE id = $1")
        .bind(own_post)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(posts, 0);

    let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE author_id = $1")
        .bind(doomed.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(comments, 0);

    let follows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 OR followee_id = $1",
    )
    .bind(doomed.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(follows, 0);

    assert_eq!(app.post_count_by(other.id).await, 1);

    let resp = app
        .get(&format!("/{}/", doomed.username), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

//! Auth Tests
//!
//! Covers signup, login, logout and session handling.

mod common;

use axum::http::{header, StatusCode};
use common::{app, DEFAULT_PASSWORD};

// ===========================================================================
// Signup
// ===========================================================================

#[tokio::test]
async fn signup_creates_user_and_redirects_to_login() {
    let app = app().await;

    let resp = app.get("/auth/signup/", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.template(), "signup.html");

    let resp = app
        .post_form(
            "/auth/signup/",
            &[
                ("username", "auth_newcomer"),
                ("email", "newcomer@example.com"),
                ("password", "a decent password"),
            ],
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/auth/login/");

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = 'auth_newcomer')")
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(exists);
}

#[tokio::test]
async fn signup_rejects_taken_and_reserved_usernames() {
    let app = app().await;
    let existing = app.create_user("auth_taken").await;

    let resp = app
        .post_form(
            "/auth/signup/",
            &[
                ("username", existing.username.as_str()),
                ("email", "dup@example.com"),
                ("password", "a decent password"),
            ],
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.template(), "signup.html");
    assert_eq!(
        resp.context()["form"]["errors"]["username"][0],
        "a user with that username already exists"
    );

    let resp = app
        .post_form(
            "/auth/signup/",
            &[
                ("username", "follow"),
                ("email", "reserved@example.com"),
                ("password", "a decent password"),
            ],
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.context()["form"]["errors"]["username"].is_array());
}

// ===========================================================================
// Login / Logout
// ===========================================================================

#[tokio::test]
async fn login_sets_session_and_honours_local_next() {
    let app = app().await;
    let user = app.create_user("auth_login").await;

    let resp = app.get("/auth/login/?next=/new/", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.template(), "login.html");
    assert_eq!(resp.context()["next"], "/new/");

    let resp = app
        .post_form(
            "/auth/login/",
            &[
                ("username", user.username.as_str()),
                ("password", DEFAULT_PASSWORD),
                ("next", "/new/"),
            ],
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/new/");

    let set_cookie = resp.headers[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Expires="));
    let session = resp.session_cookie().expect("session cookie set");

    let resp = app.get("/new/", Some(&session)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.template(), "new.html");
}

#[tokio::test]
async fn login_ignores_external_next() {
    let app = app().await;
    let user = app.create_user("auth_login_external").await;

    let resp = app
        .post_form(
            "/auth/login/",
            &[
                ("username", user.username.as_str()),
                ("password", DEFAULT_PASSWORD),
                ("next", "https://evil.example/"),
            ],
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/");
}

#[tokio::test]
async fn login_with_control_characters_in_next_goes_home() {
    let app = app().await;
    let user = app.create_user("auth_login_crlf").await;

    let resp = app
        .post_form(
            "/auth/login/",
            &[
                ("username", user.username.as_str()),
                ("password", DEFAULT_PASSWORD),
                ("next", "/ok/\r\nSet-Cookie: x=1"),
            ],
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/");
    assert!(resp.session_cookie().is_some());
}

#[tokio::test]
async fn login_with_bad_credentials_rerenders() {
    let app = app().await;
    let user = app.create_user("auth_login_bad").await;

    let resp = app
        .post_form(
            "/auth/login/",
            &[
                ("username", user.username.as_str()),
                ("password", "wrong password"),
            ],
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.template(), "login.html");
    assert!(resp.session_cookie().is_none());
    let context = resp.context();
    assert!(context["form"]["errors"]["__all__"][0].is_string());
    assert_eq!(context["form"]["fields"][0]["value"], user.username.as_str());
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let app = app().await;
    let user = app.create_user("auth_logout").await;

    let resp = app.get("/auth/logout/", Some(&user.session)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.template(), "logged_out.html");
    assert_eq!(resp.session_cookie().as_deref(), Some(""));
}

// ===========================================================================
// Sessions
// ===========================================================================

#[tokio::test]
async fn bearer_header_is_accepted() {
    let app = app().await;
    let user = app.create_user("auth_bearer").await;
    let bearer = format!("Bearer {}", user.session);

    let resp = app
        .request(
            axum::http::Method::GET,
            "/new/",
            None,
            &[("authorization", bearer.as_str())],
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn garbage_session_is_anonymous() {
    let app = app().await;

    let resp = app.get("/new/", Some("not-a-token")).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/auth/login/?next=/new/");
}

#[tokio::test]
async fn session_of_deleted_user_is_anonymous() {
    let app = app().await;
    let user = app.create_user("auth_deleted").await;
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app.get("/new/", Some(&user.session)).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/auth/login/?next=/new/");
}

use axum::{routing::delete, routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/signup/",
            get(handlers::signup_form).post(handlers::signup),
        )
        .route(
            "/auth/login/",
            get(handlers::login_form).post(handlers::login),
        )
        .route("/auth/logout/", get(handlers::logout))
}

pub fn about() -> Router<AppState> {
    Router::new()
        .route("/about/author/", get(handlers::about_author))
        .route("/about/tech/", get(handlers::about_tech))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/groups/", post(handlers::admin_create_group))
        .route("/admin/groups/:slug/", delete(handlers::admin_delete_group))
        .route("/admin/users/:username/", delete(handlers::admin_delete_user))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route("/group/:slug/", get(handlers::group_posts))
        .route(
            "/new/",
            get(handlers::new_post_form).post(handlers::create_post),
        )
        .route("/follow/", get(handlers::follow_index))
        // static segments above take precedence over :username
        .route("/:username/", get(handlers::profile))
        .route("/:username/follow/", get(handlers::profile_follow))
        .route("/:username/unfollow/", get(handlers::profile_unfollow))
        .route("/:username/:post_id/", get(handlers::post_detail))
        .route(
            "/:username/:post_id/edit/",
            get(handlers::edit_post_form).post(handlers::edit_post),
        )
        .route("/:username/:post_id/comment/", post(handlers::add_comment))
}

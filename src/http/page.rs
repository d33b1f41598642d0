//! Render contexts and redirects.
//!
//! Pages are not rendered here: a handler names the template and hands over a
//! serializable context, which is emitted as `{"template", "context"}` JSON
//! for the renderer in front of this service.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::AppError;

pub const LOGIN_PATH: &str = "/auth/login/";

#[derive(Debug)]
pub struct Page<C> {
    template: &'static str,
    status: StatusCode,
    context: C,
}

#[derive(Serialize)]
struct Rendered<'a, C> {
    template: &'a str,
    context: &'a C,
}

impl<C: Serialize> Page<C> {
    pub fn new(template: &'static str, context: C) -> Self {
        Self {
            template,
            status: StatusCode::OK,
            context,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<C: Serialize> IntoResponse for Page<C> {
    fn into_response(self) -> Response {
        let body = Json(Rendered {
            template: self.template,
            context: &self.context,
        });
        (self.status, body).into_response()
    }
}

/// A `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => AppError::internal("invalid redirect target").into_response(),
    }
}

/// Login URL carrying the path to come back to, e.g. `/auth/login/?next=/new/`.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_PATH, encoded.replace("%2F", "/"))
}

/// Only same-site paths are honoured as a post-login destination.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next)
            if next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && !next.chars().any(char::is_control) =>
        {
            next
        }
        _ => "/",
    }
}

fn path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn profile_url(username: &str) -> String {
    format!("/{}/", path_segment(username))
}

pub fn post_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", path_segment(username), post_id)
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::http::page::Page;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorContext {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Template used for an error status.
pub fn error_template(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "misc/404.html",
        StatusCode::FORBIDDEN => "misc/403.html",
        StatusCode::BAD_REQUEST => "misc/400.html",
        s if s.is_server_error() => "misc/500.html",
        _ => "misc/error.html",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Page::new(
            error_template(self.status),
            ErrorContext {
                error: self.message,
            },
        )
        .with_status(self.status)
        .into_response()
    }
}

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderName};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::app::auth::{AuthService, SessionToken};
use crate::app::users::UserService;
use crate::http::page::{found, login_url};
use crate::http::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sessionid";

const ADMIN_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-admin-token");

/// The signed-in user. Anonymous requests are sent to the login page with
/// `next` pointing back at the requested path.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Signed-in user or `None` for anonymous visitors.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[derive(Debug, Clone)]
pub struct AdminToken;

pub enum AuthRejection {
    Login { next: String },
    Failed(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Login { next } => found(&login_url(&next)),
            AuthRejection::Failed(err) => err.into_response(),
        }
    }
}

fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    if bearer.is_some() {
        return bearer;
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = session_token(parts) else {
        return Ok(None);
    };

    let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_minutes);
    let session = service.authenticate_session_token(&token).map_err(|err| {
        tracing::error!(error = ?err, "failed to authenticate session");
        AppError::internal("failed to authenticate")
    })?;
    let Some(session) = session else {
        return Ok(None);
    };

    // tokens outlive deleted accounts
    let user = UserService::new(state.db.clone())
        .get_by_id(session.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %session.user_id, "failed to load session user");
            AppError::internal("failed to authenticate")
        })?;

    Ok(user.map(|user| AuthUser {
        user_id: user.id,
        username: user.username,
    }))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_user(parts, state).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                Err(AuthRejection::Login { next })
            }
            Err(err) => Err(AuthRejection::Failed(err)),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(resolve_user(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("admin token not configured"))?;

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing admin token"))?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::forbidden("invalid admin token"));
        }

        Ok(AdminToken)
    }
}

pub fn with_session(jar: CookieJar, session: &SessionToken, state: &AppState) -> CookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(state.secure_cookies)
            .expires(session.expires_at),
    )
}

pub fn without_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

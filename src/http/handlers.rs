use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::forms::{
    empty_comment_form, empty_login_form, empty_post_form, empty_signup_form, post_form_for,
    CommentInput, FormContext, FormErrors, ImageChange, LoginInput, SignupInput,
    NON_FIELD_ERRORS,
};
use crate::app::groups::{GroupService, NewGroup};
use crate::app::media::MediaService;
use crate::app::pagination::Paginated;
use crate::app::posts::{PostChanges, PostFilter, PostService};
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::comment::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::User;
use crate::http::auth::{with_session, without_session, AdminToken};
use crate::http::form::PostFormData;
use crate::http::page::{found, post_url, profile_url, safe_next, Page, LOGIN_PATH};
use crate::http::{AppError, AuthUser, MaybeAuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct EmptyContext {}

#[derive(Serialize)]
pub struct ListingContext {
    page: Paginated<Post>,
}

#[derive(Serialize)]
pub struct GroupContext {
    group: Group,
    page: Paginated<Post>,
}

#[derive(Serialize)]
pub struct ProfileContext {
    profile: User,
    page: Paginated<Post>,
    count: i64,
    following: bool,
}

#[derive(Serialize)]
pub struct PostContext {
    post: Post,
    author: User,
    count: i64,
    form: FormContext,
    comments: Vec<Comment>,
}

#[derive(Serialize)]
pub struct PostFormContext {
    form: FormContext,
    is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    post: Option<Post>,
}

#[derive(Serialize)]
pub struct AccountFormContext {
    form: FormContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

#[derive(Serialize)]
pub struct NotFoundContext {
    path: String,
}

fn media_service(state: &AppState) -> MediaService {
    MediaService::new(
        state.cache.clone(),
        state.storage.clone(),
        state.s3_public_endpoint.clone(),
    )
}

fn feed_service(state: &AppState) -> FeedService {
    FeedService::new(
        state.db.clone(),
        state.cache.clone(),
        media_service(state),
        state.index_cache_ttl_seconds,
        state.image_url_ttl_seconds,
    )
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.session_key, state.session_ttl_minutes)
}

/// Post ids in paths are integers; anything else cannot name a post.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("post not found"))
}

async fn load_groups(state: &AppState) -> Result<Vec<Group>, AppError> {
    GroupService::new(state.db.clone())
        .list_all()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list groups");
            AppError::internal("failed to load groups")
        })
}

async fn load_user(state: &AppState, username: &str) -> Result<User, AppError> {
    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn load_post(state: &AppState, username: &str, raw_post_id: &str) -> Result<Post, AppError> {
    let post_id = parse_post_id(raw_post_id)?;
    PostService::new(state.db.clone())
        .get_by_author(username, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

async fn store_image_change(
    state: &AppState,
    change: ImageChange,
    current: Option<String>,
) -> Result<Option<String>, AppError> {
    match change {
        ImageChange::Keep => Ok(current),
        ImageChange::Clear => Ok(None),
        ImageChange::Replace(image) => {
            let key = media_service(state)
                .store_post_image(&image)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, filename = %image.filename, "failed to store image");
                    AppError::internal("failed to store image")
                })?;
            Ok(Some(key))
        }
    }
}

/// The post page with `form` as the comment form.
async fn render_post_view(
    state: &AppState,
    mut post: Post,
    form: FormContext,
) -> Result<Page<PostContext>, AppError> {
    let author = UserService::new(state.db.clone())
        .get_by_id(post.author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %post.author.id, "failed to fetch author");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let count = PostService::new(state.db.clone())
        .count(PostFilter::Author(author.id))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %author.id, "failed to count posts");
            AppError::internal("failed to fetch post")
        })?;

    let comments = CommentService::new(state.db.clone())
        .list_for_post(post.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = post.id, "failed to list comments");
            AppError::internal("failed to fetch comments")
        })?;

    media_service(state)
        .populate_image_urls(std::slice::from_mut(&mut post), state.image_url_ttl_seconds)
        .await;

    Ok(Page::new(
        "post.html",
        PostContext {
            post,
            author,
            count,
            form,
            comments,
        },
    ))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Page<ListingContext>, AppError> {
    let page = feed_service(&state)
        .index_page(query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load index page");
            AppError::internal("failed to load posts")
        })?;

    Ok(Page::new("index.html", ListingContext { page }))
}

pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Page<GroupContext>, AppError> {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to fetch group");
            AppError::internal("failed to fetch group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let mut page = PostService::new(state.db.clone())
        .page(PostFilter::Group(group.id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id = group.id, "failed to list group posts");
            AppError::internal("failed to load posts")
        })?;
    media_service(&state)
        .populate_image_urls(&mut page.object_list, state.image_url_ttl_seconds)
        .await;

    Ok(Page::new("group.html", GroupContext { group, page }))
}

pub async fn new_post_form(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Page<PostFormContext>, AppError> {
    let groups = load_groups(&state).await?;
    Ok(Page::new(
        "new.html",
        PostFormContext {
            form: empty_post_form(&groups),
            is_edit: false,
            post: None,
        },
    ))
}

pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    PostFormData(input): PostFormData,
) -> Result<Response, AppError> {
    let groups = load_groups(&state).await?;

    let draft = match input.clone().validate(&groups) {
        Ok(draft) => draft,
        Err(errors) => {
            let form = input.bound_context(&groups, errors);
            return Ok(Page::new(
                "new.html",
                PostFormContext {
                    form,
                    is_edit: false,
                    post: None,
                },
            )
            .into_response());
        }
    };

    let image = store_image_change(&state, draft.image, None).await?;
    let post = PostService::new(state.db.clone())
        .create_post(
            user.user_id,
            PostChanges {
                text: draft.text,
                group_id: draft.group_id,
                image,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    tracing::info!(post_id = post.id, author = %user.username, "post created");
    Ok(found("/"))
}

pub async fn profile(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Page<ProfileContext>, AppError> {
    let profile = load_user(&state, &username).await?;

    let mut page = PostService::new(state.db.clone())
        .page(PostFilter::Author(profile.id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %profile.id, "failed to list user posts");
            AppError::internal("failed to load posts")
        })?;
    media_service(&state)
        .populate_image_urls(&mut page.object_list, state.image_url_ttl_seconds)
        .await;

    let following = match viewer {
        Some(viewer) => SocialService::new(state.db.clone())
            .is_following(viewer.user_id, profile.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %viewer.user_id, "failed to check follow");
                AppError::internal("failed to load profile")
            })?,
        None => false,
    };

    let count = page.count;
    Ok(Page::new(
        "profile.html",
        ProfileContext {
            profile,
            page,
            count,
            following,
        },
    ))
}

pub async fn post_detail(
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Page<PostContext>, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    render_post_view(&state, post, empty_comment_form()).await
}

pub async fn edit_post_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    if post.author.id != user.user_id {
        return Ok(found(&post_url(&post.author.username, post.id)));
    }

    let groups = load_groups(&state).await?;
    Ok(Page::new(
        "new.html",
        PostFormContext {
            form: post_form_for(&post, &groups),
            is_edit: true,
            post: Some(post),
        },
    )
    .into_response())
}

pub async fn edit_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    PostFormData(input): PostFormData,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    let location = post_url(&post.author.username, post.id);
    if post.author.id != user.user_id {
        return Ok(found(&location));
    }

    let groups = load_groups(&state).await?;
    let draft = match input.clone().validate(&groups) {
        Ok(draft) => draft,
        Err(errors) => {
            let form = input.bound_context(&groups, errors);
            return Ok(Page::new(
                "new.html",
                PostFormContext {
                    form,
                    is_edit: true,
                    post: Some(post),
                },
            )
            .into_response());
        }
    };

    let image = store_image_change(&state, draft.image, post.image.clone()).await?;
    let updated = PostService::new(state.db.clone())
        .update_post(
            post.id,
            user.user_id,
            PostChanges {
                text: draft.text,
                group_id: draft.group_id,
                image,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = post.id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    if updated.is_some() {
        tracing::info!(post_id = post.id, author = %user.username, "post updated");
    }
    Ok(found(&location))
}

pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    Form(input): Form<CommentInput>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;

    let draft = match input.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            let form = input.bound_context(errors);
            return Ok(render_post_view(&state, post, form).await?.into_response());
        }
    };

    let comment = CommentService::new(state.db.clone())
        .add_comment(post.id, user.user_id, draft.text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = post.id, "failed to add comment");
            AppError::internal("failed to add comment")
        })?;

    tracing::info!(comment_id = comment.id, post_id = post.id, "comment added");
    Ok(found(&post_url(&post.author.username, post.id)))
}

pub async fn follow_index(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Page<ListingContext>, AppError> {
    let page = feed_service(&state)
        .follow_page(user.user_id, query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.user_id, "failed to load follow feed");
            AppError::internal("failed to load posts")
        })?;

    Ok(Page::new("follow.html", ListingContext { page }))
}

pub async fn profile_follow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_user(&state, &username).await?;

    if author.id != user.user_id {
        let (_, created) = SocialService::new(state.db.clone())
            .follow(user.user_id, author.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, followee = %author.id, "failed to follow");
                AppError::internal("failed to follow")
            })?;
        if created {
            tracing::info!(follower = %user.username, followee = %author.username, "follow created");
        }
    }

    Ok(found(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_user(&state, &username).await?;

    if author.id != user.user_id {
        let removed = SocialService::new(state.db.clone())
            .unfollow(user.user_id, author.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, followee = %author.id, "failed to unfollow");
                AppError::internal("failed to unfollow")
            })?;
        if removed {
            tracing::info!(follower = %user.username, followee = %author.username, "follow removed");
        }
    }

    Ok(found(&profile_url(&author.username)))
}

pub async fn signup_form() -> Page<AccountFormContext> {
    Page::new(
        "signup.html",
        AccountFormContext {
            form: empty_signup_form(),
            next: None,
        },
    )
}

pub async fn signup(
    State(state): State<AppState>,
    Form(input): Form<SignupInput>,
) -> Result<Response, AppError> {
    let rerender = |errors: FormErrors| {
        Page::new(
            "signup.html",
            AccountFormContext {
                form: input.bound_context(errors),
                next: None,
            },
        )
        .into_response()
    };

    let draft = match input.validate() {
        Ok(draft) => draft,
        Err(errors) => return Ok(rerender(errors)),
    };

    let user = auth_service(&state)
        .signup(&draft.username, &draft.email, &draft.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to sign up");
            AppError::internal("failed to sign up")
        })?;

    match user {
        Some(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
            Ok(found(LOGIN_PATH))
        }
        None => {
            let mut errors = FormErrors::default();
            errors.add("username", "a user with that username already exists");
            Ok(rerender(errors))
        }
    }
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Page<AccountFormContext> {
    Page::new(
        "login.html",
        AccountFormContext {
            form: empty_login_form(),
            next: query.next,
        },
    )
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(input): Form<LoginInput>,
) -> Result<Response, AppError> {
    let rerender = |errors: FormErrors| {
        Page::new(
            "login.html",
            AccountFormContext {
                form: input.bound_context(errors),
                next: input.next.clone(),
            },
        )
        .into_response()
    };

    let credentials = match input.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(rerender(errors)),
    };

    let session = auth_service(&state)
        .login(&credentials.username, &credentials.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match session {
        Some(session) => {
            let jar = with_session(jar, &session, &state);
            Ok((jar, found(safe_next(input.next.as_deref()))).into_response())
        }
        None => {
            let mut errors = FormErrors::default();
            errors.add(
                NON_FIELD_ERRORS,
                "please enter a correct username and password",
            );
            Ok(rerender(errors))
        }
    }
}

pub async fn logout(jar: CookieJar) -> Response {
    (
        without_session(jar),
        Page::new("logged_out.html", EmptyContext {}),
    )
        .into_response()
}

pub async fn about_author() -> Page<EmptyContext> {
    Page::new("about/author.html", EmptyContext {})
}

pub async fn about_tech() -> Page<EmptyContext> {
    Page::new("about/tech.html", EmptyContext {})
}

pub async fn not_found(uri: Uri) -> Page<NotFoundContext> {
    Page::new(
        "misc/404.html",
        NotFoundContext {
            path: uri.path().to_string(),
        },
    )
    .with_status(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

pub async fn admin_create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if title.chars().count() > 200 {
        return Err(AppError::bad_request("title must be at most 200 characters"));
    }

    let slug = payload
        .slug
        .as_deref()
        .map(str::trim)
        .filter(|slug| !slug.is_empty());
    if let Some(slug) = slug {
        if slug.len() > 255
            || !slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::bad_request(
                "slug may only contain letters, digits, hyphens and underscores",
            ));
        }
    }

    let description = payload
        .description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty());
    if description.map(|d| d.chars().count() > 200).unwrap_or(false) {
        return Err(AppError::bad_request(
            "description must be at most 200 characters",
        ));
    }

    let group = GroupService::new(state.db.clone())
        .create(NewGroup {
            title: title.to_string(),
            slug: slug.map(str::to_string),
            description: description.map(str::to_string),
        })
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create group");
            AppError::internal("failed to create group")
        })?
        .ok_or_else(|| AppError::conflict("a group with that slug already exists"))?;

    tracing::info!(group_id = group.id, slug = ?group.slug, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn admin_delete_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = GroupService::new(state.db.clone())
        .delete_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to delete group");
            AppError::internal("failed to delete group")
        })?;

    if !deleted {
        return Err(AppError::not_found("group not found"));
    }
    tracing::info!(slug = %slug, "group deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_delete_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = UserService::new(state.db.clone())
        .delete_by_username(&username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to delete user");
            AppError::internal("failed to delete user")
        })?;

    if !deleted {
        return Err(AppError::not_found("user not found"));
    }
    tracing::info!(username = %username, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

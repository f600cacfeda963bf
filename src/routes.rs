use std::sync::Arc;

use askama::Template;
use axum::{
    async_trait,
    extract::{FromRequest, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::{Authorized, Sessions};
use crate::config::Config;
use crate::fetcher::{content_snippet, FeedEntry, FetchError, Fetcher};
use crate::refresh::{RefreshError, Refresher};
use crate::store::{NewPost, Post, PostStore, PostUpdate, StoreError};

/// Link given to posts written through the API rather than mirrored.
const LOCAL_POST_LINK: &str = "#";

pub struct AppState {
    pub store: Arc<dyn PostStore>,
    pub fetcher: Arc<Fetcher>,
    pub refresher: Refresher,
    pub sessions: Sessions,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn PostStore>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            refresher: Refresher::new(store.clone(), fetcher.clone(), config.feed_url.clone()),
            sessions: Sessions::new(config.admin_username.clone(), config.admin_password.clone()),
            store,
            fetcher,
        }
    }
}

/// Every API route. Static files, tracing and CORS are layered on in `main`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id", put(update_post).delete(delete_post))
        .route("/api/login", post(login))
        .route("/api/feed", get(feed_proxy))
        .route("/config.js", get(config_js))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Template)]
#[template(path = "config.js", escape = "none")]
pub struct ConfigJsTemplate {
    /// Feed URL already encoded as a JSON string literal
    pub default_feed: String,
}

// Wrapper for JavaScript responses
struct JsTemplate<T>(T);

impl<T: Template> IntoResponse for JsTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(js) => ([(header::CONTENT_TYPE, "application/javascript")], js).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// `Json` body extractor whose rejections use the API's error shape:
/// a malformed body, a missing field or a missing content type is a 400.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{1}")]
    Upstream(StatusCode, String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(status, _) => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Post not found".to_string()),
            StoreError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Store(e) => e.into(),
            RefreshError::Fetch(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub content_snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub url: Option<String>,
}

// Route handlers
pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Post>>, AppError> {
    let posts = state.refresher.list_posts().await?;
    Ok(Json(posts))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = state
        .sessions
        .login(&req.username, &req.password)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    info!("Issued session token for '{}'", req.username);
    Ok(Json(LoginResponse { token }))
}

pub async fn create_post(
    _auth: Authorized,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title required".to_string()));
    }

    let content_snippet = req
        .content_snippet
        .unwrap_or_else(|| content_snippet(&req.content));

    let post = state
        .store
        .insert(NewPost {
            title: req.title,
            link: LOCAL_POST_LINK.to_string(),
            content: req.content,
            content_snippet,
            pub_date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        })
        .await?;

    info!("Created post {}", post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    _auth: Authorized,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<PostUpdate>,
) -> Result<Json<Post>, AppError> {
    let post = state.store.update_by_id(&id, update).await?;
    info!("Updated post {}", post.id);
    Ok(Json(post))
}

pub async fn delete_post(
    _auth: Authorized,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_by_id(&id).await?;
    info!("Deleted post {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch and parse any feed on behalf of the browser.
pub async fn feed_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedEntry>>, AppError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("URL required".to_string()))?;

    match state.fetcher.fetch(&url).await {
        Ok(entries) => Ok(Json(entries)),
        Err(err @ FetchError::Status(status)) => {
            warn!("Feed proxy for {} failed: {}", url, err);
            Err(AppError::Upstream(status, err.to_string()))
        }
        Err(err) => Err(AppError::Internal(err.to_string())),
    }
}

pub async fn config_js(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let default_feed = serde_json::to_string(state.refresher.feed_url())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(JsTemplate(ConfigJsTemplate { default_feed }))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

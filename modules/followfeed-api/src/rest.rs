use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use uuid::Uuid;

use followfeed_store::FollowStore;
use followfeed_sync::SyncService;

pub struct AppState {
    pub service: SyncService,
    pub store: Arc<dyn FollowStore>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/sync/user-profile", post(sync_user_profile))
        .route("/api/sync/user-feeds", post(sync_user_feeds))
        .route("/api/users", get(list_users).post(add_user))
        .route("/api/users/{id}", delete(remove_user))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

type ApiResult = (StatusCode, Json<serde_json::Value>);

fn ok(message: &str) -> ApiResult {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "message": message })),
    )
}

fn bad_request(error: &str) -> ApiResult {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "success": false, "error": error })),
    )
}

fn server_error(error: String) -> ApiResult {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "success": false, "error": error })),
    )
}

/// Pull `userId` out of a sync request body. The id is parsed by hand so a
/// missing field and a malformed uuid both map to 400 rather than a
/// serde rejection.
fn parse_user_id(body: &serde_json::Value) -> Result<Uuid, ApiResult> {
    let raw = body
        .get("userId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_request("userId is required"))?;
    raw.parse()
        .map_err(|_| bad_request("userId must be a valid uuid"))
}

// --- Sync handlers ---

pub async fn sync_user_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult {
    let user_id = match parse_user_id(&body) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.sync_user_profile(user_id).await {
        Ok(()) => ok("User profile synced"),
        Err(e) => {
            warn!(%user_id, error = %e, "Profile sync request failed");
            server_error(e.to_string())
        }
    }
}

pub async fn sync_user_feeds(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult {
    let user_id = match parse_user_id(&body) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.sync_user_feeds(user_id).await {
        Ok(()) => ok("User feeds synced"),
        Err(e) => {
            warn!(%user_id, error = %e, "Feed sync request failed");
            server_error(e.to_string())
        }
    }
}

// --- Followed-account CRUD ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    pub platform: String,
    pub profile_url: String,
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult {
    match state.store.list_followed_users().await {
        Ok(users) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "users": users })),
        ),
        Err(e) => {
            warn!(error = %e, "Failed to list followed users");
            server_error(e.to_string())
        }
    }
}

pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddUserRequest>,
) -> ApiResult {
    if req.platform.trim().is_empty() || req.profile_url.trim().is_empty() {
        return bad_request("platform and profileUrl are required");
    }
    match state
        .store
        .add_followed_user(&req.platform, &req.profile_url)
        .await
    {
        Ok(user) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "user": user })),
        ),
        Err(e) => {
            warn!(error = %e, "Failed to add followed user");
            server_error(e.to_string())
        }
    }
}

pub async fn remove_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult {
    match state.store.remove_followed_user(id).await {
        Ok(true) => ok("User removed"),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "success": false, "error": "user not found" })),
        ),
        Err(e) => {
            warn!(%id, error = %e, "Failed to remove followed user");
            server_error(e.to_string())
        }
    }
}

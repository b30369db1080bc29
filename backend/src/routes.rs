use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use shared::{Task, TaskCreate, TaskUpdate};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::error::ApiError;
use crate::store::TaskStore;

pub fn build_router(store: TaskStore) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .with_state(store)
}

/// CORS for browser clients: configured origin allow-list with credentials.
/// Credentials forbid the wildcard, so methods are an explicit list and
/// request headers are mirrored back instead.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

async fn create_task(
    State(store): State<TaskStore>,
    Json(payload): Json<TaskCreate>,
) -> Result<Json<Task>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".to_string()));
    }
    let task = store.insert(&payload.title, payload.done).await?;
    Ok(Json(task))
}

async fn list_tasks(State(store): State<TaskStore>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(store.list_all().await?))
}

async fn get_task(
    State(store): State<TaskStore>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    store.get_by_id(id).await?.map(Json).ok_or(ApiError::NotFound)
}

async fn update_task(
    State(store): State<TaskStore>,
    Path(id): Path<i64>,
    Json(patch): Json<TaskUpdate>,
) -> Result<Json<Task>, ApiError> {
    if let Some(ref title) = patch.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("title must not be empty".to_string()));
        }
    }
    store
        .update_fields(id, &patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_task(
    State(store): State<TaskStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if store.delete_by_id(id).await? {
        Ok(Json(json!({ "detail": "Task deleted successfully" })))
    } else {
        Err(ApiError::NotFound)
    }
}

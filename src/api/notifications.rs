//! Notification inbox endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::auth::Actor;
use super::routes::AppState;
use super::types::ListNotificationsQuery;
use crate::notify::Notification;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", post(mark_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, (StatusCode, String)> {
    state
        .store
        .list_notifications(actor.id, query.unread_only)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let updated = state
        .store
        .mark_notification_read(id, actor.id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Notification {} not found", id)))
    }
}

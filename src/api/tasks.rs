//! Task endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::auth::Actor;
use super::routes::AppState;
use super::types::{ApproveRequest, CommentRequest, RejectRequest, SweepResponse};
use crate::task::{NewTask, Task, TaskPatch};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(my_tasks).post(create_task))
        .route("/team", get(team_tasks))
        .route("/sweep", post(sweep))
        .route("/:id", get(get_task).patch(update_task))
        .route("/:id/approve", post(approve_task))
        .route("/:id/reject", post(reject_task))
        .route("/:id/comments", post(add_comment))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(req): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let task = state.tasks.create_task(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn my_tasks(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    Ok(Json(state.tasks.my_tasks(&actor).await?))
}

async fn team_tasks(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    Ok(Json(state.tasks.team_tasks(&actor).await?))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    Ok(Json(state.tasks.get_task(&actor, id).await?))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, (StatusCode, String)> {
    Ok(Json(state.tasks.update_task(&actor, id, patch).await?))
}

async fn approve_task(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state
        .tasks
        .approve_task(&actor, id, req.final_percentage, req.comment.as_deref())
        .await?;
    Ok(Json(task))
}

async fn reject_task(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state
        .tasks
        .reject_task(&actor, id, &req.reason, req.final_percentage)
        .await?;
    Ok(Json(task))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    Ok(Json(state.tasks.add_comment(&actor, id, &req.text).await?))
}

/// Run the past-due sweep now. Safe alongside the scheduled sweep.
async fn sweep(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<SweepResponse>, (StatusCode, String)> {
    tracing::debug!("On-demand past-due sweep requested by {}", actor.id);
    let processed_count = state.sweeper.sweep(state.clock.now()).await?;
    Ok(Json(SweepResponse { processed_count }))
}

use crate::{
    error::Result,
    models::chore::{AssignChoreRequest, ChoreListQuery, CreateChoreRequest},
    services::auth::User,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_chores).post(create_chore))
        .route("/:id/assign", post(assign_chore))
        .route("/:id/complete", post(complete_chore))
}

/// List chores for a group
/// GET /api/nest/chores?group_id=&page=&limit=
async fn list_chores(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ChoreListQuery>,
) -> Result<Json<Value>> {
    debug!("Listing chores for user: {}", user.id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, query.group_id)
        .await?;
    state.group_service.ensure_member(&group_id, &user.id).await?;

    let chores = state
        .chore_service
        .list_chores(&group_id, query.page, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": chores
    })))
}

/// Create a chore
/// POST /api/nest/chores
async fn create_chore(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateChoreRequest>,
) -> Result<Json<Value>> {
    debug!("Creating chore by user: {}", user.id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, request.group_id.clone())
        .await?;

    let chore = state
        .chore_service
        .create_chore(&user.id, &group_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": chore,
        "message": "Chore created successfully"
    })))
}

/// Assign a chore to a member
/// POST /api/nest/chores/:id/assign
async fn assign_chore(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(chore_id): Path<String>,
    Json(request): Json<AssignChoreRequest>,
) -> Result<Json<Value>> {
    debug!("Assigning chore: {} by user: {}", chore_id, user.id);

    let chore = state
        .chore_service
        .assign_chore(&user.id, &chore_id, &request.assignee_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": chore,
        "message": "Chore assigned successfully"
    })))
}

/// Mark a chore completed
/// POST /api/nest/chores/:id/complete
async fn complete_chore(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(chore_id): Path<String>,
) -> Result<Json<Value>> {
    debug!("Completing chore: {} by user: {}", chore_id, user.id);

    let chore = state
        .chore_service
        .complete_chore(&user.id, &chore_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": chore,
        "message": "Chore completed successfully"
    })))
}

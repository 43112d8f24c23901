use crate::{
    error::Result,
    models::{
        notification::{DispatchEvent, NotificationListQuery},
        preferences::UpdatePreferencesRequest,
    },
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
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
        .route("/preferences", get(get_preferences).put(update_preferences))
        // 内部服务间入口：聊天/日程/跳蚤市场等模块把领域事件交给编排器
        .route("/dispatch", post(dispatch_event))
}

/// List the current user's notifications
/// GET /api/nest/notifications?unread=&page=&limit=
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>> {
    debug!("Listing notifications for user: {}", user.id);

    let notifications = state
        .notification_service
        .list_for_user(
            &user.id,
            query.unread.unwrap_or(false),
            query.page,
            query.limit,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications
    })))
}

/// GET /api/nest/notifications/unread-count
async fn unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>> {
    let count = state.notification_service.unread_count(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "unread_count": count
        }
    })))
}

/// Mark one notification read
/// POST /api/nest/notifications/:id/read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>> {
    debug!("Marking notification read: {} by user: {}", notification_id, user.id);

    let notification = state
        .notification_service
        .mark_read(&notification_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notification
    })))
}

/// POST /api/nest/notifications/read-all
async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>> {
    state.notification_service.mark_all_read(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "All notifications marked as read"
    })))
}

/// GET /api/nest/notifications/preferences
async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>> {
    let preferences = state.preferences_service.get_or_default(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": preferences
    })))
}

/// PUT /api/nest/notifications/preferences
async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<Json<Value>> {
    debug!("Updating notification preferences for user: {}", user.id);

    let preferences = state
        .preferences_service
        .update(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": preferences,
        "message": "Preferences updated successfully"
    })))
}

/// Hand a domain event to the orchestrator
/// POST /api/nest/notifications/dispatch
async fn dispatch_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(event): Json<DispatchEvent>,
) -> Result<Json<Value>> {
    debug!(
        "Dispatching event: {} from caller: {}",
        event.event_type, user.id
    );

    let notifications = state.notification_service.dispatch(event).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "created": notifications.len(),
            "notifications": notifications
        }
    })))
}

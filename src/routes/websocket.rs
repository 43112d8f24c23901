use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{Json, Response},
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{error::Result, services::auth::User, state::AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // WebSocket连接端点
        .route("/connect", get(websocket_handler))
        // 在线状态
        .route("/status/:user_id", get(get_user_status))
}

/// WebSocket连接处理器
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Response {
    let connection_id = format!("conn_{}", uuid::Uuid::new_v4());

    info!("WebSocket upgrade request from user: {} with connection: {}", user.id, connection_id);

    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state, user, connection_id))
}

/// 处理WebSocket连接
async fn handle_websocket_connection(
    socket: WebSocket,
    state: Arc<AppState>,
    user: User,
    connection_id: String,
) {
    if let Err(e) = state
        .realtime_service
        .handle_connection(socket, user.id.clone(), connection_id.clone())
        .await
    {
        error!("WebSocket connection error for {}: {}", connection_id, e);
    }

    info!("WebSocket connection closed: {} for user: {}", connection_id, user.id);
}

/// 获取用户在线状态
async fn get_user_status(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Path(target_user_id): Path<String>,
) -> Result<Json<Value>> {
    debug!("Getting online status for user: {}", target_user_id);

    let status = state.realtime_service.online_status(&target_user_id);

    Ok(Json(json!({
        "success": true,
        "data": status
    })))
}

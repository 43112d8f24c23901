use crate::{error::AppError, state::AppState};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// 认证中间件：校验 Bearer JWT 并把用户信息写入请求扩展
/// 本服务的所有业务路由都要求已认证用户
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

    let user = app_state.auth_service.authenticate(token)?;
    debug!("Authenticated user: {}", user.id);

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

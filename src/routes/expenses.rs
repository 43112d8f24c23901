use crate::{
    error::Result,
    models::expense::{BalanceQuery, CreateExpenseRequest, ExpenseListQuery, SettleUpRequest},
    services::auth::User,
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_expenses).post(create_expense))
        .route("/settle", post(settle_up))
        .route("/balances", get(get_balances))
        .route("/balances/export", get(export_balances))
}

/// Create an expense
/// POST /api/nest/expenses
async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExpenseRequest>,
) -> Result<Json<Value>> {
    debug!("Creating expense by user: {}", user.id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, request.group_id.clone())
        .await?;

    let expense = state
        .ledger_service
        .create_expense(&user.id, &group_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": expense,
        "message": "Expense created successfully"
    })))
}

/// List expenses for a group, newest first
/// GET /api/nest/expenses?group_id=&page=&limit=
async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<Value>> {
    debug!("Listing expenses for user: {}", user.id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, query.group_id)
        .await?;
    state.group_service.ensure_member(&group_id, &user.id).await?;

    let expenses = state
        .ledger_service
        .list_expenses_paginated(&group_id, query.page, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": expenses
    })))
}

/// Record a settlement between two members
/// POST /api/nest/expenses/settle
async fn settle_up(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<SettleUpRequest>,
) -> Result<Json<Value>> {
    debug!("Settling up from user: {} to: {}", user.id, request.to_user_id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, request.group_id.clone())
        .await?;

    let settlement = state
        .ledger_service
        .settle_up(&user.id, &group_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": settlement,
        "message": "Settlement recorded successfully"
    })))
}

/// Net balances for a group
/// GET /api/nest/expenses/balances?group_id=
async fn get_balances(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<Value>> {
    debug!("Computing balances for user: {}", user.id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, query.group_id)
        .await?;
    state.group_service.ensure_member(&group_id, &user.id).await?;

    let balances = state.ledger_service.get_balances(&group_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "group_id": group_id,
            "balances": balances
        }
    })))
}

/// Balances as CSV download
/// GET /api/nest/expenses/balances/export?group_id=
async fn export_balances(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<BalanceQuery>,
) -> Result<Response> {
    debug!("Exporting balances CSV for user: {}", user.id);

    let group_id = state
        .group_service
        .resolve_group_id(&user.id, query.group_id)
        .await?;
    state.group_service.ensure_member(&group_id, &user.id).await?;

    let csv = state.ledger_service.export_balances_csv(&group_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"balances-{}.csv\"", group_id),
            ),
        ],
        csv,
    )
        .into_response())
}

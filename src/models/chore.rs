use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 家务任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    #[serde(with = "crate::utils::serde_helpers::record_id")]
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChoreRequest {
    pub group_id: Option<String>,
    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: String,
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignChoreRequest {
    pub assignee_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChoreListQuery {
    pub group_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

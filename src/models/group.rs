use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 合租群组，成员列表由外部的群组管理服务维护
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(with = "crate::utils::serde_helpers::record_id")]
    pub id: String,
    pub name: String,
    pub member_ids: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// 用户档案投影，current_group_id 是显式字段而非成员数组位置约定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub current_group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知分类，用于按用户偏好做订阅开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Chat,
    Chores,
    Events,
    Expenses,
    Marketplace,
    System,
}

/// 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Push,
    InApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl Default for NotificationPriority {
    fn default() -> Self {
        NotificationPriority::Normal
    }
}

/// 通知状态机：queued/scheduled → sent|failed → read
/// sent、failed、read 为终态（failed 不会再被轮询投递）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Queued,
    Scheduled,
    Sent,
    Failed,
    Read,
}

/// 单个用户的一条通知记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(with = "crate::utils::serde_helpers::record_id")]
    pub id: String,
    pub user_id: String,
    pub notification_type: String,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub deeplink: Option<String>,
    pub channels: Vec<NotificationChannel>,
    pub status: NotificationStatus,
    pub priority: NotificationPriority,
    pub scheduled_for: DateTime<Utc>,
    pub attempts: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 领域事件，编排器的唯一入口载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub target_user_ids: Vec<String>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub deeplink: Option<String>,
    #[serde(default)]
    pub priority: NotificationPriority,
    pub idempotency_key: Option<String>,
}

impl DispatchEvent {
    pub fn new(event_type: &str, target_user_ids: Vec<String>, title: &str, body: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            target_user_ids,
            title: title.to_string(),
            body: body.to_string(),
            data: serde_json::Value::Null,
            deeplink: None,
            priority: NotificationPriority::Normal,
            idempotency_key: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_deeplink(mut self, deeplink: &str) -> Self {
        self.deeplink = Some(deeplink.to_string());
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub unread: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 推送到单个用户在线连接的实时消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub id: String,
    pub event: String,
    pub data: serde_json::Value,
    pub to_user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeMessage {
    pub fn new(event: &str, data: serde_json::Value, to_user_id: &str) -> Self {
        Self {
            id: format!("msg_{}", uuid::Uuid::new_v4()),
            event: event.to_string(),
            data,
            to_user_id: to_user_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// 用户在线状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineStatus {
    pub user_id: String,
    pub is_online: bool,
    pub active_connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_message_creation() {
        let message = RealtimeMessage::new(
            "notification.new",
            serde_json::json!({"title": "Test"}),
            "user_123",
        );

        assert_eq!(message.event, "notification.new");
        assert_eq!(message.to_user_id, "user_123");
        assert!(message.id.starts_with("msg_"));
    }
}

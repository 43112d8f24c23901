use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::notification::{NotificationCategory, NotificationChannel};

/// 免打扰时段，HH:mm 本地时间字符串
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: Option<String>,
    pub end: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestFrequency {
    Daily,
    Weekly,
    Off,
}

impl Default for DigestFrequency {
    fn default() -> Self {
        DigestFrequency::Off
    }
}

/// 每用户一条的通知偏好，缺失时按全部开启惰性创建
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotificationPreferences {
    pub user_id: String,
    pub categories: HashMap<NotificationCategory, bool>,
    pub channels: HashMap<NotificationChannel, bool>,
    pub quiet_hours: Option<QuietHours>,
    #[serde(default)]
    pub digest: DigestFrequency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserNotificationPreferences {
    /// 默认偏好：所有分类和渠道全部开启
    pub fn default_for(user_id: &str) -> Self {
        let categories = [
            NotificationCategory::Chat,
            NotificationCategory::Chores,
            NotificationCategory::Events,
            NotificationCategory::Expenses,
            NotificationCategory::Marketplace,
            NotificationCategory::System,
        ]
        .into_iter()
        .map(|c| (c, true))
        .collect();

        let channels = [NotificationChannel::Push, NotificationChannel::InApp]
            .into_iter()
            .map(|c| (c, true))
            .collect();

        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            categories,
            channels,
            quiet_hours: None,
            digest: DigestFrequency::Off,
            created_at: now,
            updated_at: now,
        }
    }

    /// 未知分类视为开启（老记录不会因为新增分类而静默丢通知）
    pub fn category_allowed(&self, category: NotificationCategory) -> bool {
        self.categories.get(&category).copied().unwrap_or(true)
    }

    pub fn channel_enabled(&self, channel: NotificationChannel) -> bool {
        self.channels.get(&channel).copied().unwrap_or(true)
    }

    pub fn enabled_channels(&self) -> Vec<NotificationChannel> {
        [NotificationChannel::Push, NotificationChannel::InApp]
            .into_iter()
            .filter(|c| self.channel_enabled(*c))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub categories: Option<HashMap<NotificationCategory, bool>>,
    pub channels: Option<HashMap<NotificationChannel, bool>>,
    pub quiet_hours: Option<QuietHours>,
    pub digest: Option<DigestFrequency>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_allow_everything() {
        let prefs = UserNotificationPreferences::default_for("user_123");

        assert!(prefs.category_allowed(NotificationCategory::Chores));
        assert!(prefs.category_allowed(NotificationCategory::Expenses));
        assert!(prefs.channel_enabled(NotificationChannel::Push));
        assert_eq!(
            prefs.enabled_channels(),
            vec![NotificationChannel::Push, NotificationChannel::InApp]
        );
        assert!(prefs.quiet_hours.is_none());
        assert_eq!(prefs.digest, DigestFrequency::Off);
    }

    #[test]
    fn test_disabled_category_is_suppressed() {
        let mut prefs = UserNotificationPreferences::default_for("user_123");
        prefs.categories.insert(NotificationCategory::Chores, false);

        assert!(!prefs.category_allowed(NotificationCategory::Chores));
        // 其他分类不受影响
        assert!(prefs.category_allowed(NotificationCategory::Chat));
    }

    #[test]
    fn test_disabled_channel_drops_out_of_fanout() {
        let mut prefs = UserNotificationPreferences::default_for("user_123");
        prefs.channels.insert(NotificationChannel::Push, false);

        assert_eq!(prefs.enabled_channels(), vec![NotificationChannel::InApp]);
    }

    #[test]
    fn test_preferences_survive_serde_round_trip() {
        let mut prefs = UserNotificationPreferences::default_for("user_123");
        prefs.categories.insert(NotificationCategory::Marketplace, false);
        prefs.quiet_hours = Some(QuietHours {
            start: Some("22:00".to_string()),
            end: Some("07:00".to_string()),
            timezone: Some("America/New_York".to_string()),
        });

        let value = serde_json::to_value(&prefs).unwrap();
        let parsed: UserNotificationPreferences = serde_json::from_value(value).unwrap();

        assert!(!parsed.category_allowed(NotificationCategory::Marketplace));
        assert_eq!(parsed.quiet_hours.unwrap().start.as_deref(), Some("22:00"));
    }
}

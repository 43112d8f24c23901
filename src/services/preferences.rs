use crate::{
    error::Result,
    models::preferences::{UpdatePreferencesRequest, UserNotificationPreferences},
    services::Database,
    utils::validation::{validate_clock_string, validate_timezone},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

const TABLE: &str = "notification_preferences";

/// 用户通知偏好存取。记录ID固定取用户ID，惰性初始化走单文档原子 upsert。
#[derive(Clone)]
pub struct PreferencesService {
    db: Arc<Database>,
}

impl PreferencesService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 读取偏好，缺失时写入并返回全开默认值
    pub async fn get_or_default(&self, user_id: &str) -> Result<UserNotificationPreferences> {
        if let Some(prefs) = self.db.get_by_id(TABLE, user_id).await? {
            return Ok(prefs);
        }

        debug!("Initializing default notification preferences for user: {}", user_id);
        let defaults = UserNotificationPreferences::default_for(user_id);
        self.db.upsert_with_id(TABLE, user_id, &defaults).await?;

        Ok(defaults)
    }

    /// 部分更新；只允许用户本人通过偏好接口触达
    pub async fn update(
        &self,
        user_id: &str,
        request: UpdatePreferencesRequest,
    ) -> Result<UserNotificationPreferences> {
        let mut prefs = self.get_or_default(user_id).await?;

        if let Some(categories) = request.categories {
            for (category, allowed) in categories {
                prefs.categories.insert(category, allowed);
            }
        }

        if let Some(channels) = request.channels {
            for (channel, enabled) in channels {
                prefs.channels.insert(channel, enabled);
            }
        }

        if let Some(quiet_hours) = request.quiet_hours {
            if let Some(start) = &quiet_hours.start {
                validate_clock_string(start)?;
            }
            if let Some(end) = &quiet_hours.end {
                validate_clock_string(end)?;
            }
            if let Some(timezone) = &quiet_hours.timezone {
                validate_timezone(timezone)?;
            }
            prefs.quiet_hours = Some(quiet_hours);
        }

        if let Some(digest) = request.digest {
            prefs.digest = digest;
        }

        prefs.updated_at = Utc::now();
        self.db.upsert_with_id(TABLE, user_id, &prefs).await?;

        info!("Updated notification preferences for user: {}", user_id);
        Ok(prefs)
    }
}

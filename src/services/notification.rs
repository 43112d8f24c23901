use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        notification::{
            DispatchEvent, Notification, NotificationCategory, NotificationChannel,
            NotificationPriority, NotificationStatus,
        },
        preferences::QuietHours,
    },
    services::{Database, PaginatedResult, PreferencesService, PushService, RealtimeService},
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 通知编排与投递管线。
///
/// 管线自身无状态：通知记录归持久层所有，这里只做偏好路由、免打扰延期、
/// 渠道扇出和后台补投。投递失败一律就地降级成 failed 记录，绝不向触发
/// 它的业务动作抛错。
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
    preferences_service: PreferencesService,
    push_service: PushService,
    realtime_service: RealtimeService,
    config: Config,
}

/// 事件类型前缀到分类的映射；未识别的前缀归入 system。全函数，不会失败。
pub fn categorize(event_type: &str) -> NotificationCategory {
    if event_type.starts_with("chat.") {
        NotificationCategory::Chat
    } else if event_type.starts_with("chore.") {
        NotificationCategory::Chores
    } else if event_type.starts_with("event.") {
        NotificationCategory::Events
    } else if event_type.starts_with("expense.") {
        NotificationCategory::Expenses
    } else if event_type.starts_with("marketplace.") {
        NotificationCategory::Marketplace
    } else {
        NotificationCategory::System
    }
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// 判断 now 是否落在用户配置的免打扰时段内。
/// end <= start 视为跨夜时段：now >= start 或 now <= end 都算在内。
/// 任一边界缺失或无法解析时返回 false。
pub fn is_quiet_hours(now: DateTime<Utc>, quiet_hours: Option<&QuietHours>) -> bool {
    let quiet_hours = match quiet_hours {
        Some(qh) => qh,
        None => return false,
    };

    let (start_raw, end_raw) = match (&quiet_hours.start, &quiet_hours.end) {
        (Some(start), Some(end)) => (start, end),
        _ => return false,
    };

    let (start, end) = match (parse_clock(start_raw), parse_clock(end_raw)) {
        (Some(start), Some(end)) => (start, end),
        _ => return false,
    };

    // 配了非法时区名就按 UTC 评估，不因此丢通知
    let tz: Tz = quiet_hours
        .timezone
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(chrono_tz::UTC);
    let local = now.with_timezone(&tz).time();

    if end <= start {
        local >= start || local <= end
    } else {
        local >= start && local < end
    }
}

/// 投递时点决策：免打扰生效且优先级不是 high 时推迟固定偏移，否则立即可投
pub fn compute_scheduled_for(
    now: DateTime<Utc>,
    quiet: bool,
    priority: NotificationPriority,
    defer_minutes: i64,
) -> DateTime<Utc> {
    if quiet && priority != NotificationPriority::High {
        now + Duration::minutes(defer_minutes)
    } else {
        now
    }
}

/// 投递失败后的状态迁移：重试预算内退避重排，预算耗尽落入终态 failed。
/// failed 不在轮询的候选状态里，因此一旦落入就不会再被投递。
pub fn failure_transition(
    attempts: u32,
    max_attempts: u32,
    now: DateTime<Utc>,
    backoff_minutes: i64,
) -> (NotificationStatus, Option<DateTime<Utc>>) {
    if attempts < max_attempts {
        (
            NotificationStatus::Queued,
            Some(now + Duration::minutes(backoff_minutes)),
        )
    } else {
        (NotificationStatus::Failed, None)
    }
}

impl NotificationService {
    pub async fn new(
        db: Arc<Database>,
        preferences_service: PreferencesService,
        push_service: PushService,
        realtime_service: RealtimeService,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            db,
            preferences_service,
            push_service,
            realtime_service,
            config: config.clone(),
        })
    }

    /// 把一个领域事件展开成每个目标用户一条的通知记录。
    /// 用户之间互相独立：任何一个用户的偏好读取或投递失败都不阻塞其余用户。
    pub async fn dispatch(&self, event: DispatchEvent) -> Result<Vec<Notification>> {
        let category = categorize(&event.event_type);
        let now = Utc::now();

        debug!(
            "Dispatching event: {} to {} users",
            event.event_type,
            event.target_user_ids.len()
        );

        let mut created = Vec::new();
        for user_id in &event.target_user_ids {
            match self.dispatch_to_user(&event, category, user_id, now).await {
                Ok(Some(notification)) => created.push(notification),
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to process notification for user {}: {}", user_id, e);
                }
            }
        }

        Ok(created)
    }

    async fn dispatch_to_user(
        &self,
        event: &DispatchEvent,
        category: NotificationCategory,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let prefs = self.preferences_service.get_or_default(user_id).await?;

        // 分类被关掉就是硬抑制：不落库、不延期
        if !prefs.category_allowed(category) {
            debug!(
                "Category {:?} disabled for user {}, skipping",
                category, user_id
            );
            return Ok(None);
        }

        if let Some(key) = &event.idempotency_key {
            if self.already_dispatched(user_id, key).await? {
                debug!("Duplicate idempotency key {} for user {}, skipping", key, user_id);
                return Ok(None);
            }
        }

        let quiet = is_quiet_hours(now, prefs.quiet_hours.as_ref());
        let scheduled_for = compute_scheduled_for(
            now,
            quiet,
            event.priority,
            self.config.quiet_hours_defer_minutes,
        );
        let deferred = scheduled_for > now;

        let mut notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            notification_type: event.event_type.clone(),
            category,
            title: event.title.clone(),
            body: event.body.clone(),
            data: event.data.clone(),
            deeplink: event.deeplink.clone(),
            channels: prefs.enabled_channels(),
            status: NotificationStatus::Queued,
            priority: event.priority,
            scheduled_for,
            attempts: 0,
            sent_at: None,
            read_at: None,
            idempotency_key: event.idempotency_key.clone(),
            created_at: now,
        };

        self.db
            .create_with_id("notification", &notification.id, &notification)
            .await?;

        // 实时推送是尽力而为，失败不影响落库和后续投递
        self.realtime_service.emit_to_user(
            user_id,
            "notification.new",
            json!({
                "id": notification.id,
                "type": notification.notification_type,
                "category": notification.category,
                "title": notification.title,
                "body": notification.body,
                "deeplink": notification.deeplink,
                "created_at": notification.created_at,
            }),
        );

        if deferred {
            debug!(
                "Notification {} deferred to {} by quiet hours",
                notification.id, notification.scheduled_for
            );
        } else {
            self.attempt_delivery(&mut notification).await;
        }

        Ok(Some(notification))
    }

    /// 预约一条未来投递的通知（家务/日程提醒）；只有后台轮询会投递它
    pub async fn schedule(
        &self,
        event: DispatchEvent,
        deliver_at: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let category = categorize(&event.event_type);
        let now = Utc::now();

        let mut created = Vec::new();
        for user_id in &event.target_user_ids {
            let prefs = match self.preferences_service.get_or_default(user_id).await {
                Ok(prefs) => prefs,
                Err(e) => {
                    error!("Failed to load preferences for user {}: {}", user_id, e);
                    continue;
                }
            };
            if !prefs.category_allowed(category) {
                continue;
            }

            let notification = Notification {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                notification_type: event.event_type.clone(),
                category,
                title: event.title.clone(),
                body: event.body.clone(),
                data: event.data.clone(),
                deeplink: event.deeplink.clone(),
                channels: prefs.enabled_channels(),
                status: NotificationStatus::Scheduled,
                priority: event.priority,
                scheduled_for: deliver_at,
                attempts: 0,
                sent_at: None,
                read_at: None,
                idempotency_key: event.idempotency_key.clone(),
                created_at: now,
            };

            if let Err(e) = self
                .db
                .create_with_id("notification", &notification.id, &notification)
                .await
            {
                error!("Failed to persist scheduled notification for {}: {}", user_id, e);
                continue;
            }
            created.push(notification);
        }

        Ok(created)
    }

    /// 后台补投：取一批到期的 queued/scheduled 通知逐条投递。
    /// 串行处理，限制对推送网关的瞬时压力。单进程假设：多实例部署
    /// 需要先引入认领机制，否则会重复投递。
    pub async fn sweep_due_notifications(&self, now: DateTime<Utc>) -> Result<usize> {
        let query = r#"
            SELECT * FROM notification
            WHERE (status = 'queued' OR status = 'scheduled')
            AND scheduled_for <= $now
            ORDER BY scheduled_for ASC
            LIMIT $limit
        "#;

        let mut response = self
            .db
            .query_with_params(
                query,
                json!({
                    "now": now,
                    "limit": self.config.notification_sweep_batch_size,
                }),
            )
            .await?;
        let due: Vec<Notification> = response.take(0)?;

        if due.is_empty() {
            return Ok(0);
        }

        info!("Sweeping {} due notifications", due.len());

        let mut delivered = 0;
        for mut notification in due {
            self.attempt_delivery(&mut notification).await;
            if notification.status == NotificationStatus::Sent {
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    /// 单条投递。推送渠道开启则调用网关；没有开启推送的记录只有应用内
    /// 消费路径，直接置为 sent，免得轮询永远重复捞到它。
    /// 失败时在重试预算内退避重排，预算耗尽落入终态 failed。
    async fn attempt_delivery(&self, notification: &mut Notification) {
        notification.attempts += 1;
        let now = Utc::now();

        let push_enabled = notification
            .channels
            .contains(&NotificationChannel::Push);

        let outcome = if push_enabled {
            self.push_service
                .send_push_to_user(
                    &notification.user_id,
                    &notification.title,
                    &notification.body,
                    &notification.data,
                )
                .await
        } else {
            Ok(())
        };

        match outcome {
            Ok(()) => {
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(now);
                debug!("Delivered notification: {}", notification.id);
            }
            Err(e) => {
                warn!("Delivery failed for notification {}: {}", notification.id, e);
                let (status, retry_at) = failure_transition(
                    notification.attempts,
                    self.config.notification_max_delivery_attempts,
                    now,
                    self.config.notification_retry_backoff_minutes,
                );
                notification.status = status;
                if let Some(retry_at) = retry_at {
                    notification.scheduled_for = retry_at;
                }
            }
        }

        // 状态迁移写回失败也只记日志，不能让投递影响触发它的业务动作
        let updates = json!({
            "status": notification.status,
            "attempts": notification.attempts,
            "scheduled_for": notification.scheduled_for,
            "sent_at": notification.sent_at,
        });
        if let Err(e) = self
            .db
            .update_by_id_with_json::<serde_json::Value>("notification", &notification.id, updates)
            .await
        {
            error!(
                "Failed to persist status for notification {}: {}",
                notification.id, e
            );
        }
    }

    async fn already_dispatched(&self, user_id: &str, idempotency_key: &str) -> Result<bool> {
        let query = r#"
            SELECT count() AS total FROM notification
            WHERE user_id = $user_id
            AND idempotency_key = $key
            GROUP ALL
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "user_id": user_id, "key": idempotency_key }))
            .await?;
        let counts: Vec<serde_json::Value> = response.take(0)?;
        let total = counts
            .first()
            .and_then(|v| v.get("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(total > 0)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<PaginatedResult<Notification>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.db.config.default_page_size as i64)
            .clamp(1, self.db.config.max_page_size as i64);
        let offset = (page - 1) * limit;

        let filter = if unread_only {
            "WHERE user_id = $user_id AND status != 'read'"
        } else {
            "WHERE user_id = $user_id"
        };

        let count_query = format!(
            "SELECT count() AS total FROM notification {} GROUP ALL",
            filter
        );
        let mut response = self
            .db
            .query_with_params(&count_query, json!({ "user_id": user_id }))
            .await?;
        let counts: Vec<serde_json::Value> = response.take(0)?;
        let total = counts
            .first()
            .and_then(|v| v.get("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let list_query = format!(
            "SELECT * FROM notification {} ORDER BY created_at DESC LIMIT $limit START $offset",
            filter
        );
        let mut response = self
            .db
            .query_with_params(
                &list_query,
                json!({ "user_id": user_id, "limit": limit, "offset": offset }),
            )
            .await?;
        let notifications: Vec<Notification> = response.take(0)?;

        let per_page = limit as usize;
        Ok(PaginatedResult {
            data: notifications,
            total,
            page: page as usize,
            per_page,
            total_pages: (total + per_page - 1) / per_page.max(1),
        })
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<u64> {
        let query = r#"
            SELECT count() AS total FROM notification
            WHERE user_id = $user_id
            AND status != 'read'
            GROUP ALL
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "user_id": user_id }))
            .await?;
        let counts: Vec<serde_json::Value> = response.take(0)?;
        Ok(counts
            .first()
            .and_then(|v| v.get("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }

    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<Notification> {
        let notification: Notification = self
            .db
            .get_by_id("notification", notification_id)
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))?;

        if notification.user_id != user_id {
            return Err(AppError::not_found("Notification"));
        }

        let updated: Notification = self
            .db
            .update_by_id_with_json(
                "notification",
                notification_id,
                json!({
                    "status": NotificationStatus::Read,
                    "read_at": Utc::now(),
                }),
            )
            .await?
            .ok_or_else(|| AppError::internal("Failed to mark notification read"))?;

        Ok(updated)
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        let query = r#"
            UPDATE notification
            SET status = 'read', read_at = $now
            WHERE user_id = $user_id
            AND status != 'read'
        "#;

        self.db
            .query_with_params(query, json!({ "user_id": user_id, "now": Utc::now() }))
            .await?;

        info!("Marked all notifications read for user: {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quiet(start: &str, end: &str, timezone: Option<&str>) -> QuietHours {
        QuietHours {
            start: Some(start.to_string()),
            end: Some(end.to_string()),
            timezone: timezone.map(|s| s.to_string()),
        }
    }

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_categorize_known_prefixes() {
        assert_eq!(categorize("chat.message"), NotificationCategory::Chat);
        assert_eq!(categorize("chore.assigned"), NotificationCategory::Chores);
        assert_eq!(categorize("event.reminder"), NotificationCategory::Events);
        assert_eq!(categorize("expense.created"), NotificationCategory::Expenses);
        assert_eq!(
            categorize("marketplace.listing.sold"),
            NotificationCategory::Marketplace
        );
    }

    #[test]
    fn test_categorize_unknown_prefix_is_system() {
        assert_eq!(categorize("account.deleted"), NotificationCategory::System);
        assert_eq!(categorize("chores.assigned"), NotificationCategory::System);
        assert_eq!(categorize(""), NotificationCategory::System);
    }

    #[test]
    fn test_quiet_hours_simple_window() {
        let qh = quiet("13:00", "15:00", None);
        assert!(!is_quiet_hours(utc(12, 59), Some(&qh)));
        assert!(is_quiet_hours(utc(13, 0), Some(&qh)));
        assert!(is_quiet_hours(utc(14, 30), Some(&qh)));
        assert!(!is_quiet_hours(utc(15, 0), Some(&qh)));
    }

    #[test]
    fn test_quiet_hours_overnight_window() {
        let qh = quiet("22:00", "07:00", None);
        assert!(is_quiet_hours(utc(23, 30), Some(&qh)));
        assert!(is_quiet_hours(utc(3, 0), Some(&qh)));
        assert!(is_quiet_hours(utc(7, 0), Some(&qh)));
        assert!(!is_quiet_hours(utc(12, 0), Some(&qh)));
        assert!(!is_quiet_hours(utc(21, 59), Some(&qh)));
    }

    #[test]
    fn test_quiet_hours_respects_timezone() {
        // 04:30 UTC 在上海是 12:30，不在 22:00-07:00 的夜间时段内
        let qh = quiet("22:00", "07:00", Some("Asia/Shanghai"));
        assert!(!is_quiet_hours(utc(4, 30), Some(&qh)));
        // 15:30 UTC 在上海是 23:30，命中夜间时段
        assert!(is_quiet_hours(utc(15, 30), Some(&qh)));
    }

    #[test]
    fn test_quiet_hours_unset_bounds() {
        assert!(!is_quiet_hours(utc(23, 30), None));

        let missing_end = QuietHours {
            start: Some("22:00".to_string()),
            end: None,
            timezone: None,
        };
        assert!(!is_quiet_hours(utc(23, 30), Some(&missing_end)));

        let garbage = quiet("late", "early", None);
        assert!(!is_quiet_hours(utc(23, 30), Some(&garbage)));
    }

    #[test]
    fn test_schedule_decision_defers_normal_priority() {
        let now = utc(23, 30);
        let scheduled = compute_scheduled_for(now, true, NotificationPriority::Normal, 60);
        assert_eq!(scheduled, now + Duration::minutes(60));
    }

    #[test]
    fn test_schedule_decision_high_priority_is_immediate() {
        let now = utc(23, 30);
        let scheduled = compute_scheduled_for(now, true, NotificationPriority::High, 60);
        assert_eq!(scheduled, now);
    }

    #[test]
    fn test_schedule_decision_outside_quiet_hours() {
        let now = utc(12, 0);
        let scheduled = compute_scheduled_for(now, false, NotificationPriority::Low, 60);
        assert_eq!(scheduled, now);
    }

    #[test]
    fn test_failure_is_terminal_with_single_attempt() {
        // 默认只投一次：第一次失败就落入终态，不再被轮询捞起
        let now = utc(12, 0);
        let (status, retry_at) = failure_transition(1, 1, now, 5);
        assert_eq!(status, NotificationStatus::Failed);
        assert!(retry_at.is_none());
    }

    #[test]
    fn test_failure_requeues_within_retry_budget() {
        let now = utc(12, 0);
        let (status, retry_at) = failure_transition(1, 3, now, 5);
        assert_eq!(status, NotificationStatus::Queued);
        assert_eq!(retry_at, Some(now + Duration::minutes(5)));

        let (status, retry_at) = failure_transition(3, 3, now, 5);
        assert_eq!(status, NotificationStatus::Failed);
        assert!(retry_at.is_none());
    }
}

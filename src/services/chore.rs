use crate::{
    error::{AppError, Result},
    models::{
        chore::{Chore, CreateChoreRequest},
        notification::{DispatchEvent, NotificationPriority},
    },
    services::{Database, GroupService, NotificationService, PaginatedResult},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// 家务服务。普通的持久化包装，同时是 chore.* 事件的生产方。
#[derive(Clone)]
pub struct ChoreService {
    db: Arc<Database>,
    group_service: GroupService,
    notification_service: NotificationService,
}

impl ChoreService {
    pub async fn new(
        db: Arc<Database>,
        group_service: GroupService,
        notification_service: NotificationService,
    ) -> Result<Self> {
        Ok(Self {
            db,
            group_service,
            notification_service,
        })
    }

    pub async fn create_chore(
        &self,
        creator_id: &str,
        group_id: &str,
        request: CreateChoreRequest,
    ) -> Result<Chore> {
        debug!("Creating chore in group: {} by user: {}", group_id, creator_id);

        request.validate().map_err(AppError::ValidatorError)?;

        if !self.group_service.is_member(group_id, creator_id).await? {
            return Err(AppError::forbidden("Only group members can create chores"));
        }

        let chore = Chore {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            title: request.title,
            description: request.description,
            assignee_id: None,
            due_date: request.due_date,
            completed: false,
            completed_at: None,
            completed_by: None,
            created_by: creator_id.to_string(),
            created_at: Utc::now(),
        };

        self.db.create_with_id("chore", &chore.id, &chore).await?;
        info!("Created chore: {} in group: {}", chore.id, group_id);

        Ok(chore)
    }

    /// 指派家务并通知被指派人；配置了截止时间的话再预约一条到期提醒
    pub async fn assign_chore(
        &self,
        actor_id: &str,
        chore_id: &str,
        assignee_id: &str,
    ) -> Result<Chore> {
        let chore: Chore = self
            .db
            .get_by_id("chore", chore_id)
            .await?
            .ok_or_else(|| AppError::not_found("Chore"))?;

        if !self.group_service.is_member(&chore.group_id, actor_id).await? {
            return Err(AppError::forbidden("Only group members can assign chores"));
        }
        if !self.group_service.is_member(&chore.group_id, assignee_id).await? {
            return Err(AppError::ShareMemberNotInGroup(assignee_id.to_string()));
        }

        let updated: Chore = self
            .db
            .update_by_id_with_json("chore", chore_id, json!({ "assignee_id": assignee_id }))
            .await?
            .ok_or_else(|| AppError::internal("Failed to assign chore"))?;

        info!("Assigned chore: {} to user: {}", chore_id, assignee_id);

        // 投递失败不回滚指派
        if assignee_id != actor_id {
            let event = DispatchEvent::new(
                "chore.assigned",
                vec![assignee_id.to_string()],
                "Chore assigned to you",
                &format!("You were assigned: {}", updated.title),
            )
            .with_data(json!({
                "chore_id": updated.id,
                "group_id": updated.group_id,
                "assigned_by": actor_id,
            }))
            .with_deeplink(&format!("/groups/{}/chores/{}", updated.group_id, updated.id));

            if let Err(e) = self.notification_service.dispatch(event).await {
                warn!("Failed to dispatch chore.assigned notification: {}", e);
            }
        }

        if let Some(due_date) = updated.due_date {
            if due_date > Utc::now() {
                let reminder = DispatchEvent::new(
                    "chore.due",
                    vec![assignee_id.to_string()],
                    "Chore due",
                    &format!("'{}' is due now", updated.title),
                )
                .with_data(json!({ "chore_id": updated.id, "group_id": updated.group_id }))
                .with_priority(NotificationPriority::Low);

                if let Err(e) = self.notification_service.schedule(reminder, due_date).await {
                    warn!("Failed to schedule chore.due reminder: {}", e);
                }
            }
        }

        Ok(updated)
    }

    /// 完成家务并通知群里其他人
    pub async fn complete_chore(&self, actor_id: &str, chore_id: &str) -> Result<Chore> {
        let chore: Chore = self
            .db
            .get_by_id("chore", chore_id)
            .await?
            .ok_or_else(|| AppError::not_found("Chore"))?;

        if !self.group_service.is_member(&chore.group_id, actor_id).await? {
            return Err(AppError::forbidden("Only group members can complete chores"));
        }
        if chore.completed {
            return Err(AppError::Conflict("Chore is already completed".to_string()));
        }

        let updated: Chore = self
            .db
            .update_by_id_with_json(
                "chore",
                chore_id,
                json!({
                    "completed": true,
                    "completed_at": Utc::now(),
                    "completed_by": actor_id,
                }),
            )
            .await?
            .ok_or_else(|| AppError::internal("Failed to complete chore"))?;

        info!("Completed chore: {} by user: {}", chore_id, actor_id);

        let members = self.group_service.get_group_members(&chore.group_id).await?;
        let targets: Vec<String> = members.into_iter().filter(|m| m != actor_id).collect();
        if !targets.is_empty() {
            let event = DispatchEvent::new(
                "chore.completed",
                targets,
                "Chore completed",
                &format!("'{}' was completed", updated.title),
            )
            .with_data(json!({
                "chore_id": updated.id,
                "group_id": updated.group_id,
                "completed_by": actor_id,
            }));

            if let Err(e) = self.notification_service.dispatch(event).await {
                warn!("Failed to dispatch chore.completed notification: {}", e);
            }
        }

        Ok(updated)
    }

    pub async fn list_chores(
        &self,
        group_id: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<PaginatedResult<Chore>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.db.config.default_page_size as i64)
            .clamp(1, self.db.config.max_page_size as i64);
        let offset = (page - 1) * limit;

        self.group_service.get_group(group_id).await?;

        let count_query = r#"
            SELECT count() AS total FROM chore
            WHERE group_id = $group_id
            GROUP ALL
        "#;
        let mut response = self
            .db
            .query_with_params(count_query, json!({ "group_id": group_id }))
            .await?;
        let counts: Vec<serde_json::Value> = response.take(0)?;
        let total = counts
            .first()
            .and_then(|v| v.get("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let list_query = r#"
            SELECT * FROM chore
            WHERE group_id = $group_id
            ORDER BY created_at DESC
            LIMIT $limit START $offset
        "#;
        let mut response = self
            .db
            .query_with_params(
                list_query,
                json!({ "group_id": group_id, "limit": limit, "offset": offset }),
            )
            .await?;
        let chores: Vec<Chore> = response.take(0)?;

        let per_page = limit as usize;
        Ok(PaginatedResult {
            data: chores,
            total,
            page: page as usize,
            per_page,
            total_pages: (total + per_page - 1) / per_page.max(1),
        })
    }
}

use crate::{
    error::{AppError, Result},
    models::group::{Group, UserProfile},
    services::Database,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// 群组成员关系查询。群组的创建/加入/退出由外部的群组管理服务负责，
/// 这里只提供账本和通知所需的成员视图。
#[derive(Clone)]
pub struct GroupService {
    db: Arc<Database>,
}

impl GroupService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Group> {
        debug!("Loading group: {}", group_id);

        self.db
            .get_by_id("group", group_id)
            .await?
            .ok_or(AppError::GroupNotFound)
    }

    pub async fn get_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        let group = self.get_group(group_id).await?;
        Ok(group.member_ids)
    }

    pub async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let members = self.get_group_members(group_id).await?;
        Ok(members.iter().any(|m| m == user_id))
    }

    /// 群组数据只对成员可见
    pub async fn ensure_member(&self, group_id: &str, user_id: &str) -> Result<()> {
        if self.is_member(group_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::forbidden("Not a member of this group"))
        }
    }

    /// 当前群组是档案上的显式字段，不依赖成员数组的位置约定
    pub async fn current_group_id(&self, user_id: &str) -> Result<String> {
        let query = r#"
            SELECT * FROM user_profile
            WHERE user_id = $user_id
            LIMIT 1
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "user_id": user_id }))
            .await?;

        let profiles: Vec<UserProfile> = response.take(0)?;

        profiles
            .into_iter()
            .next()
            .and_then(|p| p.current_group_id)
            .ok_or(AppError::NoGroup)
    }

    /// 请求里带了 group_id 就用它，否则回落到用户的当前群组
    pub async fn resolve_group_id(
        &self,
        user_id: &str,
        requested: Option<String>,
    ) -> Result<String> {
        match requested {
            Some(group_id) => Ok(group_id),
            None => self.current_group_id(user_id).await,
        }
    }
}

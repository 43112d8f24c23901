use crate::{config::Config, error::{AppError, Result}};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// 推送投递服务：调用 Rainbow-Gateway 的推送接口。
/// 网关对重复投递是宽容的，这里不做去重。
#[derive(Clone)]
pub struct PushService {
    config: Config,
    http_client: Client,
}

impl PushService {
    pub async fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.push_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }

    /// 向单个用户的已注册设备推送一条消息
    pub async fn send_push_to_user(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<()> {
        debug!("Sending push to user: {}", user_id);

        let url = format!("{}/api/push/send", self.config.push_gateway_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.push_gateway_token)
            .json(&json!({
                "user_id": user_id,
                "title": title,
                "body": body,
                "data": data,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                "Push gateway returned {} for user: {}",
                response.status(),
                user_id
            );
            return Err(AppError::ExternalService(format!(
                "Push gateway returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

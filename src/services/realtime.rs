use crate::{error::Result, models::realtime::{OnlineStatus, RealtimeMessage}};
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 实时连接注册表。进程启动时创建一份并由 AppState 持有，
/// 不是模块级单例；宿主是多线程运行时，所以读写都要拿锁。
#[derive(Clone)]
pub struct RealtimeService {
    // user_id -> (connection_id -> sender)
    user_connections: Arc<RwLock<HashMap<String, HashMap<String, mpsc::UnboundedSender<RealtimeMessage>>>>>,
}

impl RealtimeService {
    pub fn new() -> Self {
        Self {
            user_connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 处理新的WebSocket连接，直到连接关闭才返回
    pub async fn handle_connection(
        &self,
        websocket: WebSocket,
        user_id: String,
        connection_id: String,
    ) -> Result<()> {
        info!("New realtime connection: {} for user: {}", connection_id, user_id);

        let (mut ws_tx, mut ws_rx) = websocket.split();
        let (tx, mut rx) = mpsc::unbounded_channel();

        self.register_connection(&user_id, &connection_id, tx.clone());

        // 发送连接确认消息
        let connect_msg = RealtimeMessage::new(
            "connection.established",
            json!({
                "connection_id": connection_id,
                "timestamp": Utc::now()
            }),
            &user_id,
        );
        if let Err(e) = tx.send(connect_msg) {
            error!("Failed to send connect message: {}", e);
        }

        // 发送任务：把注册表里投递过来的消息写到socket
        let connection_id_clone = connection_id.clone();
        let send_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(json_str) => {
                        if let Err(e) = ws_tx.send(Message::Text(json_str)).await {
                            error!("Failed to send realtime message: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize realtime message: {}", e);
                    }
                }
            }
            debug!("Send task ended for connection: {}", connection_id_clone);
        });

        // 接收任务：客户端只会发心跳和关闭帧
        let connection_id_clone = connection_id.clone();
        let receive_task = tokio::spawn(async move {
            while let Some(msg_result) = ws_rx.next().await {
                match msg_result {
                    Ok(Message::Close(_)) => {
                        info!("Realtime connection closed: {}", connection_id_clone);
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        debug!("Heartbeat from connection: {}", connection_id_clone);
                    }
                    Ok(_) => {
                        warn!("Ignoring inbound message on connection: {}", connection_id_clone);
                    }
                    Err(e) => {
                        error!("Realtime socket error for {}: {}", connection_id_clone, e);
                        break;
                    }
                }
            }
            debug!("Receive task ended for connection: {}", connection_id_clone);
        });

        let _ = tokio::try_join!(send_task, receive_task);

        self.unregister_connection(&user_id, &connection_id);
        Ok(())
    }

    fn register_connection(
        &self,
        user_id: &str,
        connection_id: &str,
        tx: mpsc::UnboundedSender<RealtimeMessage>,
    ) {
        let mut user_connections = self.user_connections.write().unwrap();
        user_connections
            .entry(user_id.to_string())
            .or_insert_with(HashMap::new)
            .insert(connection_id.to_string(), tx);

        debug!("Registered connection: {} for user: {}", connection_id, user_id);
    }

    fn unregister_connection(&self, user_id: &str, connection_id: &str) {
        let mut user_connections = self.user_connections.write().unwrap();
        if let Some(conns) = user_connections.get_mut(user_id) {
            conns.remove(connection_id);
            if conns.is_empty() {
                user_connections.remove(user_id);
            }
        }

        info!("Unregistered connection: {} for user: {}", connection_id, user_id);
    }

    /// 尽力而为地把事件推给该用户的所有在线连接；没有连接不算错误
    pub fn emit_to_user(&self, user_id: &str, event: &str, payload: serde_json::Value) {
        let senders: Vec<mpsc::UnboundedSender<RealtimeMessage>> = {
            let user_connections = self.user_connections.read().unwrap();
            user_connections
                .get(user_id)
                .map(|conns| conns.values().cloned().collect())
                .unwrap_or_default()
        };

        if senders.is_empty() {
            debug!("No live connections for user: {}", user_id);
            return;
        }

        for tx in senders {
            let message = RealtimeMessage::new(event, payload.clone(), user_id);
            if tx.send(message).is_err() {
                // 连接正在关闭，注销由 handle_connection 的收尾完成
                debug!("Dropped realtime message for user: {}", user_id);
            }
        }
    }

    pub fn online_status(&self, user_id: &str) -> OnlineStatus {
        let user_connections = self.user_connections.read().unwrap();
        let active_connections = user_connections
            .get(user_id)
            .map(|conns| conns.len())
            .unwrap_or(0);

        OnlineStatus {
            user_id: user_id.to_string(),
            is_online: active_connections > 0,
            active_connections,
        }
    }
}

impl Default for RealtimeService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_connections_is_noop() {
        let service = RealtimeService::new();
        service.emit_to_user("user_123", "notification.new", json!({"title": "hi"}));

        let status = service.online_status("user_123");
        assert!(!status.is_online);
        assert_eq!(status.active_connections, 0);
    }

    #[tokio::test]
    async fn test_registry_tracks_connections() {
        let service = RealtimeService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.register_connection("user_123", "conn_1", tx);
        assert!(service.online_status("user_123").is_online);

        service.emit_to_user("user_123", "notification.new", json!({"title": "hi"}));
        let message = rx.recv().await.unwrap();
        assert_eq!(message.event, "notification.new");

        service.unregister_connection("user_123", "conn_1");
        assert!(!service.online_status("user_123").is_online);
    }
}

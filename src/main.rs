use std::sync::Arc;
use axum::{
    routing::{Router, get},
    http::{Method, HeaderValue},
    middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    compression::CompressionLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::{info, warn, error};
use tokio::time::{interval, Duration};

mod routes;
mod models;
mod services;
mod config;
mod error;
mod utils;
mod state;

use crate::{
    config::Config,
    state::AppState,
    services::{
        Database,
        AuthService,
        GroupService,
        LedgerService,
        NotificationService,
        PreferencesService,
        PushService,
        RealtimeService,
        ChoreService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "rainbow_nest=debug,tower_http=debug".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-Nest service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => {
            match db.verify_connection().await {
                Ok(_) => {
                    info!("Database connection established successfully");
                    db
                }
                Err(e) => {
                    warn!("Database connection failed: {}", e);
                    info!("Attempting to auto-start database...");

                    // 尝试自动启动数据库
                    if let Err(start_err) = auto_start_database(&config).await {
                        error!("Failed to auto-start database: {}. Original error: {}", start_err, e);
                        return Err(anyhow::anyhow!("Database connection failed"));
                    }

                    // 重新尝试连接
                    let db = Database::new(&config).await?;
                    db.verify_connection().await?;
                    info!("Database auto-started and connected successfully");
                    db
                }
            }
        }
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });

    // 初始化所有服务；实时注册表随进程创建，由 AppState 显式持有
    let auth_service = AuthService::new(&config).await?;
    let group_service = GroupService::new(db.clone()).await?;
    let preferences_service = PreferencesService::new(db.clone()).await?;
    let push_service = PushService::new(&config).await?;
    let realtime_service = RealtimeService::new();
    let notification_service = NotificationService::new(
        db.clone(),
        preferences_service.clone(),
        push_service.clone(),
        realtime_service.clone(),
        &config,
    )
    .await?;
    let ledger_service = LedgerService::new(
        db.clone(),
        group_service.clone(),
        notification_service.clone(),
    )
    .await?;
    let chore_service = ChoreService::new(
        db.clone(),
        group_service.clone(),
        notification_service.clone(),
    )
    .await?;

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db: (*db).clone(),
        auth_service,
        group_service,
        ledger_service,
        notification_service,
        preferences_service,
        realtime_service,
        chore_service,
    });

    // 启动后台任务
    start_background_tasks(app_state.clone()).await;

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(
            config.cors_allowed_origins
                .split(',')
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        );

    // 业务路由全部要求已认证用户
    let api = Router::new()
        .nest("/api/nest/expenses", routes::expenses::router())
        .nest("/api/nest/notifications", routes::notifications::router())
        .nest("/api/nest/chores", routes::chores::router())
        .nest("/api/nest/ws", routes::websocket::router())
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            utils::middleware::auth_middleware,
        ));

    // 构建应用路由 - 使用/api/nest/前缀避免网关路由冲突
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .merge(api)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Rainbow-Nest is running!"
}

async fn auto_start_database(config: &Config) -> anyhow::Result<()> {
    info!("Attempting to start SurrealDB...");

    // 尝试启动 SurrealDB 进程
    let output = tokio::process::Command::new("surreal")
        .args(&[
            "start",
            "--user", &config.database_username,
            "--pass", &config.database_password,
            "memory",
        ])
        .spawn();

    match output {
        Ok(_) => {
            info!("SurrealDB started successfully");
            // 等待数据库启动
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }
        Err(e) => {
            error!("Failed to start SurrealDB: {}", e);
            Err(anyhow::anyhow!("Failed to start database"))
        }
    }
}

async fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 通知补投任务：唯一会投递被免打扰推迟的通知的路径
    let sweep_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(
            sweep_state.config.notification_sweep_interval
        ));

        loop {
            interval.tick().await;
            match sweep_state
                .notification_service
                .sweep_due_notifications(chrono::Utc::now())
                .await
            {
                Ok(0) => {}
                Ok(delivered) => info!("Notification sweep delivered {} notifications", delivered),
                Err(e) => error!("Notification sweep failed: {}", e),
            }
        }
    });

    info!("Background tasks started successfully");
}

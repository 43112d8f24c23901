use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,

    // Push gateway configuration
    pub push_gateway_url: String,
    pub push_gateway_token: String,
    pub push_timeout_secs: u64,

    // Notification pipeline
    pub notification_sweep_interval: u64,
    pub notification_sweep_batch_size: usize,
    pub quiet_hours_defer_minutes: i64,
    pub notification_max_delivery_attempts: u32,
    pub notification_retry_backoff_minutes: i64,

    // Content settings
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_notes_length: usize,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "nest".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),

            push_gateway_url: env::var("PUSH_GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            push_gateway_token: env::var("PUSH_GATEWAY_TOKEN")
                .unwrap_or_else(|_| "default-token".to_string()),
            push_timeout_secs: env::var("PUSH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            notification_sweep_interval: env::var("NOTIFICATION_SWEEP_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            notification_sweep_batch_size: env::var("NOTIFICATION_SWEEP_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            quiet_hours_defer_minutes: env::var("QUIET_HOURS_DEFER_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            notification_max_delivery_attempts: env::var("NOTIFICATION_MAX_DELIVERY_ATTEMPTS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            notification_retry_backoff_minutes: env::var("NOTIFICATION_RETRY_BACKOFF_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            max_page_size: env::var("MAX_PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            max_notes_length: env::var("MAX_NOTES_LENGTH")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

use crate::{config::Config, error::{AppError, Result}};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 认证服务：本地校验 Rainbow-Auth 签发的 JWT
/// 账号体系本身由 Rainbow-Auth 维护，这里只消费令牌
#[derive(Clone)]
pub struct AuthService {
    config: Config,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    pub email: Option<String>,      // 邮箱
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl AuthService {
    pub async fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    /// 校验令牌并还原请求用户
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.verify_jwt(token)?;

        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(User {
            id: claims.sub,
            email: claims.email,
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_config() -> Config {
        std::env::set_var("JWT_SECRET", "test-secret");
        Config::from_env().unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_round_trip() {
        let config = test_config();
        let service = AuthService::new(&config).await.unwrap();

        let claims = Claims {
            sub: "user_123".to_string(),
            exp: (Utc::now().timestamp()) + 3600,
            iat: Utc::now().timestamp(),
            email: Some("roomie@example.com".to_string()),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_ref()),
        )
        .unwrap();

        let user = service.authenticate(&token).unwrap();
        assert_eq!(user.id, "user_123");
        assert_eq!(user.email.as_deref(), Some("roomie@example.com"));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_garbage() {
        let config = test_config();
        let service = AuthService::new(&config).await.unwrap();

        assert!(service.authenticate("not-a-token").is_err());
    }
}

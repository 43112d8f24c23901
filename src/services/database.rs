use crate::config::Config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use surrealdb::engine::remote::http::{Client, Http, Https};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let client = if let Some(address) = config.database_url.strip_prefix("https://") {
            Surreal::new::<Https>(address).await?
        } else {
            let address = config
                .database_url
                .strip_prefix("http://")
                .unwrap_or(&config.database_url);
            Surreal::new::<Http>(address).await?
        };

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;

        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 执行原始SQL查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        self.client.query(sql).await.map_err(AppError::from)
    }

    /// 执行带参数的查询
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize,
    {
        self.client
            .query(sql)
            .bind(params)
            .await
            .map_err(AppError::from)
    }

    /// 用指定ID创建记录；调用方持有完整模型，落库后直接复用内存中的值
    pub async fn create_with_id<T>(&self, table: &str, id: &str, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        let mut content = serde_json::to_value(data)?;
        // 记录ID由 type::thing 指定，内容里的 id 字段必须去掉
        if let Some(map) = content.as_object_mut() {
            map.remove("id");
        }

        debug!("Creating record {}:{}", table, id);
        self.query_with_params(
            "CREATE type::thing($tb, $id) CONTENT $data RETURN NONE",
            json!({ "tb": table, "id": id, "data": content }),
        )
        .await?;

        Ok(())
    }

    /// 通过ID获取单个记录
    pub async fn get_by_id<T>(&self, table: &str, id: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de> + Send + Sync,
    {
        let mut response = self
            .query_with_params(
                "SELECT * FROM type::thing($tb, $id)",
                json!({ "tb": table, "id": id }),
            )
            .await?;
        let results: Vec<T> = response.take(0)?;
        Ok(results.into_iter().next())
    }

    /// 通过ID合并更新记录并返回更新后的值
    pub async fn update_by_id_with_json<T>(
        &self,
        table: &str,
        id: &str,
        updates: serde_json::Value,
    ) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de> + Send + Sync,
    {
        let mut response = self
            .query_with_params(
                "UPDATE type::thing($tb, $id) MERGE $updates RETURN AFTER",
                json!({ "tb": table, "id": id, "updates": updates }),
            )
            .await?;
        let results: Vec<T> = response.take(0)?;
        Ok(results.into_iter().next())
    }

    /// 按固定ID整体写入记录；单文档原子，目标不存在时创建
    pub async fn upsert_with_id<T>(&self, table: &str, id: &str, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        let mut content = serde_json::to_value(data)?;
        if let Some(map) = content.as_object_mut() {
            map.remove("id");
        }

        self.query_with_params(
            "UPDATE type::thing($tb, $id) CONTENT $data RETURN NONE",
            json!({ "tb": table, "id": id, "data": content }),
        )
        .await?;

        Ok(())
    }

    /// 通过ID删除记录
    pub async fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        self.query_with_params(
            "DELETE type::thing($tb, $id)",
            json!({ "tb": table, "id": id }),
        )
        .await?;
        Ok(())
    }
}

/// 分页结果结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

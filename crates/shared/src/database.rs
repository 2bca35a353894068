//! 数据库连接管理模块
//!
//! 版本号和锁记录都保存在 PostgreSQL 中。CLI 是一次性进程，
//! 连接池很小；流水线启动时数据库可能短暂不可达，因此连接支持按重试策略重连。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::{InfraError, Result};
use crate::retry::{RetryPolicy, retry_with_policy};

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 创建连接池并建立至少一个连接
    #[instrument(skip(config), fields(url = %redact_url(&config.url)))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Database connected");
        Ok(Self { pool })
    }

    /// 按重试策略连接，仅对连接类故障重试
    pub async fn connect_with_retry(config: &DatabaseConfig, policy: &RetryPolicy) -> Result<Self> {
        retry_with_policy(policy, "database_connect", InfraError::is_retryable, || {
            Self::connect(config)
        })
        .await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 关闭连接池，等待已借出的连接归还
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// 隐去连接串中的密码，用于日志
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}

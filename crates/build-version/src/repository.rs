//! 版本号仓储
//!
//! 写入带 fencing 校验：只有持有更新 generation 的锁持有者才能覆盖记录，
//! 租约过期后仍在运行的旧持有者会被拒绝，而不是静默覆盖新值。

use async_trait::async_trait;
use build_version_shared::config::validate_identifier;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::{BuildVersionError, Result};
use crate::models::{BuildVersion, RunContext};

/// 版本号仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// 读取当前版本号，不存在返回 `VersionNotFound`
    async fn get_current(&self, version_key: &str) -> Result<BuildVersion>;

    /// 以 `generation` 作为 fencing token 写入新版本，返回写入后的记录
    async fn update_version(&self, version: &BuildVersion, generation: i64)
    -> Result<BuildVersion>;

    /// 记录不存在时以 `start` 创建，已存在则原样返回
    async fn seed(&self, version_key: &str, start: i64) -> Result<BuildVersion>;
}

// ==================== PostgreSQL ====================

#[derive(sqlx::FromRow)]
struct BuildVersionRow {
    version_key: String,
    version_number: i64,
    updated_at: DateTime<Utc>,
    run_context: Option<Value>,
    lock_generation: i64,
}

impl TryFrom<BuildVersionRow> for BuildVersion {
    type Error = BuildVersionError;

    fn try_from(row: BuildVersionRow) -> Result<Self> {
        let run_context = row
            .run_context
            .map(serde_json::from_value::<RunContext>)
            .transpose()?;
        Ok(Self {
            version_key: row.version_key,
            version_number: row.version_number,
            updated_at: row.updated_at,
            run_context,
            lock_generation: row.lock_generation,
        })
    }
}

/// PostgreSQL 版本号仓储
#[derive(Clone)]
pub struct PgVersionRepository {
    pool: PgPool,
    table: String,
}

impl PgVersionRepository {
    /// 创建仓储（表名会被拼接进 SQL，必须通过标识符校验）
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier("version.table", &table)?;
        Ok(Self { pool, table })
    }

    /// 创建版本号表（幂等）
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version_key     TEXT PRIMARY KEY,
                version_number  BIGINT NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                run_context     JSONB,
                lock_generation BIGINT NOT NULL DEFAULT 0
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        info!("Version table ready");
        Ok(())
    }

    async fn find(&self, version_key: &str) -> Result<Option<BuildVersion>> {
        let sql = format!(
            r#"
            SELECT version_key, version_number, updated_at, run_context, lock_generation
            FROM {}
            WHERE version_key = $1
            "#,
            self.table
        );
        sqlx::query_as::<_, BuildVersionRow>(&sql)
            .bind(version_key)
            .fetch_optional(&self.pool)
            .await?
            .map(BuildVersion::try_from)
            .transpose()
    }
}

#[async_trait]
impl VersionRepository for PgVersionRepository {
    async fn get_current(&self, version_key: &str) -> Result<BuildVersion> {
        self.find(version_key)
            .await?
            .ok_or_else(|| BuildVersionError::VersionNotFound(version_key.to_string()))
    }

    #[instrument(skip(self, version), fields(version_key = %version.version_key))]
    async fn update_version(
        &self,
        version: &BuildVersion,
        generation: i64,
    ) -> Result<BuildVersion> {
        let run_context = version
            .run_context
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let sql = format!(
            r#"
            UPDATE {}
            SET version_number = $2,
                updated_at = $3,
                run_context = $4,
                lock_generation = $5
            WHERE version_key = $1 AND lock_generation < $5
            RETURNING version_key, version_number, updated_at, run_context, lock_generation
            "#,
            self.table
        );
        let row = sqlx::query_as::<_, BuildVersionRow>(&sql)
            .bind(&version.version_key)
            .bind(version.version_number)
            .bind(version.updated_at)
            .bind(run_context)
            .bind(generation)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                info!(version_number = row.version_number, "Version table updated");
                row.try_into()
            }
            None => match self.find(&version.version_key).await? {
                Some(stored) => Err(BuildVersionError::StaleFencingToken {
                    key: version.version_key.clone(),
                    generation,
                    stored: stored.lock_generation,
                }),
                None => Err(BuildVersionError::VersionNotFound(
                    version.version_key.clone(),
                )),
            },
        }
    }

    #[instrument(skip(self))]
    async fn seed(&self, version_key: &str, start: i64) -> Result<BuildVersion> {
        let sql = format!(
            r#"
            INSERT INTO {} (version_key, version_number, updated_at, lock_generation)
            VALUES ($1, $2, NOW(), 0)
            ON CONFLICT (version_key) DO NOTHING
            "#,
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(version_key)
            .bind(start)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(start, "Version record seeded");
        }
        self.get_current(version_key).await
    }
}

// ==================== 内存实现 ====================

/// 内存版本号仓储，语义与 PostgreSQL 实现一致
#[derive(Debug, Clone, Default)]
pub struct InMemoryVersionRepository {
    versions: std::sync::Arc<DashMap<String, BuildVersion>>,
}

impl InMemoryVersionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条记录，用于构造测试场景
    pub fn insert(&self, version: BuildVersion) {
        self.versions.insert(version.version_key.clone(), version);
    }
}

#[async_trait]
impl VersionRepository for InMemoryVersionRepository {
    async fn get_current(&self, version_key: &str) -> Result<BuildVersion> {
        self.versions
            .get(version_key)
            .map(|v| v.clone())
            .ok_or_else(|| BuildVersionError::VersionNotFound(version_key.to_string()))
    }

    async fn update_version(
        &self,
        version: &BuildVersion,
        generation: i64,
    ) -> Result<BuildVersion> {
        let mut stored = self
            .versions
            .get_mut(&version.version_key)
            .ok_or_else(|| BuildVersionError::VersionNotFound(version.version_key.clone()))?;

        if stored.lock_generation >= generation {
            return Err(BuildVersionError::StaleFencingToken {
                key: version.version_key.clone(),
                generation,
                stored: stored.lock_generation,
            });
        }

        *stored = BuildVersion {
            lock_generation: generation,
            ..version.clone()
        };
        Ok(stored.clone())
    }

    async fn seed(&self, version_key: &str, start: i64) -> Result<BuildVersion> {
        Ok(self
            .versions
            .entry(version_key.to_string())
            .or_insert_with(|| BuildVersion::seed(version_key, start))
            .clone())
    }
}

//! PostgreSQL 条件存储
//!
//! 每个条件操作都是单条 SQL 语句，由数据库保证原子性：
//! - 获取：`INSERT ... ON CONFLICT (lock_key) DO UPDATE ... WHERE expires_at < $now`
//! - 释放：`DELETE ... WHERE lock_key = $1 AND holder = $2`
//!
//! generation 来自表专属的序列，记录删除后序列不回退。

use async_trait::async_trait;
use build_version_shared::config::validate_identifier;
use build_version_shared::error::Result as InfraResult;
use sqlx::PgPool;
use tracing::{info, instrument};

use super::ConditionalStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{LeaseWrite, LockRecord};

/// PostgreSQL 条件存储
#[derive(Clone)]
pub struct PostgresConditionalStore {
    pool: PgPool,
    table: String,
    sequence: String,
}

impl PostgresConditionalStore {
    /// 创建存储（表名会被拼接进 SQL，必须通过标识符校验）
    pub fn new(pool: PgPool, table: impl Into<String>) -> InfraResult<Self> {
        let table = table.into();
        validate_identifier("lock.table", &table)?;
        let sequence = format!("{}_generation_seq", table);
        Ok(Self {
            pool,
            table,
            sequence,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 创建锁表和 generation 序列（幂等）
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(&format!("CREATE SEQUENCE IF NOT EXISTS {}", self.sequence))
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                lock_key   TEXT PRIMARY KEY,
                holder     TEXT NOT NULL,
                expires_at BIGINT NOT NULL,
                generation BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        info!("Lock table ready");
        Ok(())
    }
}

#[async_trait]
impl ConditionalStore for PostgresConditionalStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, write), fields(table = %self.table))]
    async fn conditional_put(
        &self,
        key: &str,
        write: LeaseWrite,
        now: i64,
    ) -> StoreResult<LockRecord> {
        let sql = format!(
            r#"
            INSERT INTO {table} (lock_key, holder, expires_at, generation, updated_at)
            VALUES ($1, $2, $3, nextval('{sequence}'), NOW())
            ON CONFLICT (lock_key) DO UPDATE
            SET holder = EXCLUDED.holder,
                expires_at = EXCLUDED.expires_at,
                generation = EXCLUDED.generation,
                updated_at = EXCLUDED.updated_at
            WHERE {table}.expires_at < $4
            RETURNING lock_key, holder, expires_at, generation
            "#,
            table = self.table,
            sequence = self.sequence,
        );
        let record = sqlx::query_as::<_, LockRecord>(&sql)
            .bind(key)
            .bind(&write.holder)
            .bind(write.expires_at)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        record.ok_or_else(|| StoreError::precondition_failed(key))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<LockRecord>> {
        let sql = format!(
            "SELECT lock_key, holder, expires_at, generation FROM {} WHERE lock_key = $1",
            self.table
        );
        let record = sqlx::query_as::<_, LockRecord>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn conditional_delete(&self, key: &str, holder: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE lock_key = $1 AND holder = $2", self.table);
        let result = sqlx::query(&sql)
            .bind(key)
            .bind(holder)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::precondition_failed(key));
        }
        Ok(())
    }
}

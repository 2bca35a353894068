//! 命令执行器
//!
//! 根据配置建立数据库/Redis 连接、组装锁存储和版本号仓储，然后执行子命令。

use std::sync::Arc;

use build_version_shared::config::{AppConfig, LockBackend};
use build_version_shared::database::Database;
use build_version_shared::redis_client::RedisConnector;
use build_version_shared::retry::RetryPolicy;
use tracing::info;
use version_lock::clock::format_epoch;
use version_lock::{
    ConditionalStore, LockError, LockManager, PostgresConditionalStore, RedisConditionalStore,
};

use crate::context::log_context;
use crate::error::Result;
use crate::models::RunContext;
use crate::output::publish_build_version;
use crate::repository::{PgVersionRepository, VersionRepository};
use crate::settings::{self, IncrementSettings, LockTarget, RawInputs};
use crate::workflow::VersionBumper;

/// 命令执行器
pub struct CommandRunner {
    config: AppConfig,
}

impl CommandRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// 递增版本号并发布结果
    pub async fn run_increment(&self, raw: RawInputs) -> Result<i64> {
        let run_context = RunContext::from_env();
        log_context(run_context.as_ref());

        let settings = IncrementSettings::resolve(&raw, &self.config, run_context.as_ref())?;
        info!(
            version_table = %settings.version_table,
            version_key = %settings.version_key,
            lock_key = %settings.lock.lock_key,
            backend = %settings.lock.backend,
            owner = %settings.owner,
            lease_secs = settings.lease_duration.as_secs(),
            wait_secs = settings.wait_timeout.as_secs(),
            poll_secs = settings.poll_interval.as_secs(),
            "Incrementing build version"
        );

        let db = self.connect().await?;
        let repository = self.version_repository(&db, &settings.version_table).await?;
        let lock = LockManager::new(self.lock_store(&db, &settings.lock).await?);

        let result = VersionBumper::new(lock, repository)
            .increment(&settings, run_context)
            .await;
        db.close().await;

        let updated = result?;
        publish_build_version(updated.version_number)?;
        Ok(updated.version_number)
    }

    /// 初始化版本号记录
    pub async fn run_seed(&self, raw: RawInputs, start: i64) -> Result<()> {
        let version_table = settings::version_table(&raw, &self.config).to_string();
        let version_key = settings::version_key(&raw, &self.config)?.to_string();

        let db = self.connect().await?;
        let repository = self.version_repository(&db, &version_table).await?;
        let result = repository.seed(&version_key, start).await;
        db.close().await;

        let version = result?;
        println!(
            "{}: version_number={} updated_at={}",
            version.version_key,
            version.version_number,
            version.updated_at.to_rfc3339()
        );
        Ok(())
    }

    /// 输出当前锁记录
    ///
    /// 只连接锁所在的后端：Redis 锁不需要数据库。
    pub async fn run_lock_status(&self, raw: RawInputs) -> Result<()> {
        let target = LockTarget::resolve(&raw, &self.config)?;

        match target.backend {
            LockBackend::Postgres => {
                let db = self.connect().await?;
                let result = match postgres_lock_store(&db, &target.table).await {
                    Ok(store) => {
                        print_lock_status(&LockManager::new(store), &target.lock_key).await
                    }
                    Err(e) => Err(e),
                };
                db.close().await;
                result
            }
            LockBackend::Redis => {
                let store = self.redis_lock_store(&target.table).await?;
                print_lock_status(&LockManager::new(store), &target.lock_key).await
            }
        }
    }

    async fn connect(&self) -> Result<Database> {
        let policy = RetryPolicy::with_max_retries(self.config.lock.acquire_retries);
        Ok(Database::connect_with_retry(&self.config.database, &policy).await?)
    }

    async fn version_repository(
        &self,
        db: &Database,
        table: &str,
    ) -> Result<Arc<dyn VersionRepository>> {
        let repository = PgVersionRepository::new(db.pool().clone(), table)?;
        repository.ensure_schema().await?;
        Ok(Arc::new(repository))
    }

    async fn lock_store(
        &self,
        db: &Database,
        target: &LockTarget,
    ) -> Result<Arc<dyn ConditionalStore>> {
        match target.backend {
            LockBackend::Postgres => postgres_lock_store(db, &target.table).await,
            LockBackend::Redis => self.redis_lock_store(&target.table).await,
        }
    }

    async fn redis_lock_store(&self, namespace: &str) -> Result<Arc<dyn ConditionalStore>> {
        let connector = RedisConnector::new(&self.config.redis)?;
        connector.health_check().await?;
        Ok(Arc::new(RedisConditionalStore::new(connector, namespace)))
    }
}

async fn postgres_lock_store(db: &Database, table: &str) -> Result<Arc<dyn ConditionalStore>> {
    let store = PostgresConditionalStore::new(db.pool().clone(), table)?;
    store.ensure_schema().await.map_err(LockError::from)?;
    Ok(Arc::new(store))
}

async fn print_lock_status(lock: &LockManager, lock_key: &str) -> Result<()> {
    match lock.describe_lock(lock_key).await? {
        Some(record) => {
            let now = lock.now_epoch_seconds();
            let state = if record.is_live_at(now) { "live" } else { "expired" };
            println!(
                "{}: holder={} expires_at={} generation={} state={}",
                record.key,
                record.holder,
                format_epoch(record.expires_at),
                record.generation,
                state
            );
        }
        None => println!("{}: not held", lock_key),
    }
    Ok(())
}

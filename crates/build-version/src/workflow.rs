//! 版本号递增流程
//!
//! 获取锁 -> 读取当前版本 -> 断言所有权 -> 递增并带 fencing token 写入 -> 释放锁。
//! 无论中间步骤成功与否，获取到的锁都会被释放。

use std::sync::Arc;

use build_version_shared::retry::{RetryPolicy, retry_with_policy};
use tracing::{info, instrument};
use version_lock::{LockError, LockHandle, LockManager};

use crate::context::log_context;
use crate::error::{BuildVersionError, Result};
use crate::models::{BuildVersion, RunContext};
use crate::repository::VersionRepository;
use crate::settings::IncrementSettings;

/// 版本号递增器
#[derive(Clone)]
pub struct VersionBumper {
    lock: LockManager,
    repository: Arc<dyn VersionRepository>,
}

impl VersionBumper {
    pub fn new(lock: LockManager, repository: Arc<dyn VersionRepository>) -> Self {
        Self { lock, repository }
    }

    /// 在锁保护下将版本号加一，返回写入后的记录
    ///
    /// 获取锁时的存储故障按 `acquire_retries` 做指数退避重试；
    /// 等待超时不重试，直接以 `LockUnavailable` 返回。
    #[instrument(
        skip(self, settings, run_context),
        fields(version_key = %settings.version_key, lock_key = %settings.lock.lock_key)
    )]
    pub async fn increment(
        &self,
        settings: &IncrementSettings,
        run_context: Option<RunContext>,
    ) -> Result<BuildVersion> {
        let options = settings.acquire_options();
        let policy = RetryPolicy::with_max_retries(settings.acquire_retries);

        let handle = retry_with_policy(&policy, "acquire_lock", LockError::is_retryable, || {
            self.lock.acquire_lock(&options)
        })
        .await
        .map_err(|source| BuildVersionError::LockUnavailable {
            key: options.lock_key.clone(),
            source,
        })?;

        let outcome = self
            .bump_locked(&handle, &settings.version_key, run_context)
            .await;

        self.lock.release_lock(&handle.lock_key, &handle.owner).await;
        outcome
    }

    async fn bump_locked(
        &self,
        handle: &LockHandle,
        version_key: &str,
        run_context: Option<RunContext>,
    ) -> Result<BuildVersion> {
        let current = self.repository.get_current(version_key).await?;

        info!(
            lock_key = %handle.lock_key,
            "Verifying lock ownership prior to updating version"
        );
        self.lock.assert_lock_ownership(handle).await?;

        info!(
            version_number = current.version_number,
            updated_at = %current.updated_at.to_rfc3339(),
            "Current version number retrieved"
        );
        log_context(current.run_context.as_ref());

        let next = current.next(run_context);
        let updated = self
            .repository
            .update_version(&next, handle.fencing_token())
            .await?;

        info!(
            version_number = updated.version_number,
            updated_at = %updated.updated_at.to_rfc3339(),
            generation = updated.lock_generation,
            "Updated version number"
        );
        log_context(updated.run_context.as_ref());

        Ok(updated)
    }
}

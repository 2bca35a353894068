//! 租约锁管理器
//!
//! 基于条件存储实现“轮询获取 / 所有权断言 / 尽力释放”三个操作。
//! 管理器本身除存储句柄和时钟外不持有任何可变状态，可在多个任务间共享。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock, format_epoch};
use crate::error::{LockError, Result, StoreError};
use crate::models::{AcquireOptions, LeaseWrite, LockHandle, LockRecord};
use crate::store::ConditionalStore;

/// 轮询间隔下限，限制对存储的轮询压力
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 租约锁管理器
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn ConditionalStore>,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    /// 使用系统时钟创建锁管理器
    pub fn new(store: Arc<dyn ConditionalStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn ConditionalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 获取锁
    ///
    /// 反复以“记录不存在或已过期”为条件写入租约，直到成功或等待超时。
    /// 条件不满足时等待 `poll_interval`（下限 1 秒）后重试；
    /// 存储不可用等其他错误立即返回，是否整体重试由调用方决定。
    ///
    /// 等待者之间没有排队顺序，每一轮轮询都是一次竞争，高争用下可能出现饥饿。
    #[instrument(
        skip(self, options),
        fields(lock_key = %options.lock_key, owner = %options.owner, backend = self.store.backend())
    )]
    pub async fn acquire_lock(&self, options: &AcquireOptions) -> Result<LockHandle> {
        options.validate().map_err(LockError::InvalidOptions)?;

        let poll_interval = options.poll_interval.max(MIN_POLL_INTERVAL);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let now = self.clock.now_epoch_seconds();
            let write = LeaseWrite {
                holder: options.owner.clone(),
                expires_at: options.expires_at_from(now).map_err(LockError::InvalidOptions)?,
            };

            match self
                .store
                .conditional_put(&options.lock_key, write, now)
                .await
            {
                Ok(record) => {
                    info!(
                        attempt,
                        generation = record.generation,
                        expires_at = %format_epoch(record.expires_at),
                        "Lock acquired"
                    );
                    return Ok(LockHandle {
                        lock_key: options.lock_key.clone(),
                        owner: options.owner.clone(),
                        expires_at_epoch_seconds: record.expires_at,
                        generation: record.generation,
                    });
                }
                Err(StoreError::PreconditionFailed { .. }) => {
                    self.log_contention(&options.lock_key, poll_interval).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Lock acquisition aborted by store failure");
                    return Err(e.into());
                }
            }

            if started.elapsed() >= options.wait_timeout {
                warn!(
                    attempt,
                    wait_timeout_secs = options.wait_timeout.as_secs(),
                    "Timed out waiting for lock"
                );
                return Err(LockError::Timeout {
                    key: options.lock_key.clone(),
                    wait: options.wait_timeout,
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// 断言锁仍由句柄持有者持有
    ///
    /// 在不可逆的写入前调用，关闭“获取成功”到“受保护写入”之间租约悄然过期的窗口。
    /// 只读操作，不会延长租约。
    #[instrument(skip(self, handle), fields(lock_key = %handle.lock_key, owner = %handle.owner))]
    pub async fn assert_lock_ownership(&self, handle: &LockHandle) -> Result<()> {
        let record = self
            .store
            .get(&handle.lock_key)
            .await?
            .ok_or_else(|| LockError::Lost {
                key: handle.lock_key.clone(),
                owner: handle.owner.clone(),
            })?;

        if record.holder != handle.owner {
            return Err(LockError::Stolen {
                key: handle.lock_key.clone(),
                owner: handle.owner.clone(),
                holder: record.holder,
            });
        }

        let now = self.clock.now_epoch_seconds();
        if !record.is_live_at(now) {
            return Err(LockError::Expired {
                key: handle.lock_key.clone(),
                owner: handle.owner.clone(),
                expires_at: record.expires_at,
            });
        }

        info!(
            generation = record.generation,
            remaining_secs = record.expires_at - now,
            "Lock ownership verified"
        );
        Ok(())
    }

    /// 释放锁
    ///
    /// 仅当记录仍由 `owner` 持有时删除。任何失败都只记录日志、不向上传播：
    /// 释放通常运行在清理路径中，残留记录会在租约到期后自然失效。
    #[instrument(skip(self))]
    pub async fn release_lock(&self, lock_key: &str, owner: &str) {
        match self.store.conditional_delete(lock_key, owner).await {
            Ok(()) => info!("Lock released"),
            Err(StoreError::PreconditionFailed { .. }) => warn!(
                "Unable to release lock: it may have expired or been taken by another process"
            ),
            Err(e) => warn!(error = %e, "Unable to release lock: store failure"),
        }
    }

    /// 读取当前锁记录（一致性读）
    pub async fn describe_lock(&self, lock_key: &str) -> Result<Option<LockRecord>> {
        Ok(self.store.get(lock_key).await?)
    }

    /// 当前时间（epoch 秒），与锁判定使用同一时钟
    pub fn now_epoch_seconds(&self) -> i64 {
        self.clock.now_epoch_seconds()
    }

    /// 获取失败后的诊断日志（尽力而为，读取失败不影响重试）
    async fn log_contention(&self, lock_key: &str, poll_interval: Duration) {
        match self.store.get(lock_key).await {
            Ok(Some(record)) => info!(
                holder = %record.holder,
                expires_at = %format_epoch(record.expires_at),
                retry_in_secs = poll_interval.as_secs(),
                "Lock currently held, waiting before retrying"
            ),
            Ok(None) => info!(
                retry_in_secs = poll_interval.as_secs(),
                "Lock record vanished before it could be read, retrying"
            ),
            Err(e) => debug!(
                error = %e,
                retry_in_secs = poll_interval.as_secs(),
                "Lock record not readable, retrying"
            ),
        }
    }
}

//! 锁领域模型
//!
//! - `LockRecord`: 持久化在共享存储中的租约记录
//! - `LockHandle`: 获取成功后返回给调用方的本地快照
//! - `AcquireOptions`: 获取锁的参数

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 默认租约时长
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(60);
/// 默认最长等待时间
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);
/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// 租约上限：到期时间以 i64 epoch 秒存储
pub const MAX_LEASE_DURATION: Duration = Duration::from_secs(i64::MAX as u64);

/// 租约记录
///
/// 记录存在且 `expires_at` 晚于当前时间即代表锁被持有；
/// 过期记录在逻辑上等同于不存在，任何获取方都可以直接覆盖。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LockRecord {
    #[sqlx(rename = "lock_key")]
    pub key: String,
    pub holder: String,
    /// 租约到期时间（epoch 秒）
    pub expires_at: i64,
    /// 每次成功获取时由存储分配的单调递增代数，用作 fencing token
    pub generation: i64,
}

impl LockRecord {
    /// 是否可以被新的获取方接管（严格早于 now）
    pub fn is_reclaimable_at(&self, now: i64) -> bool {
        self.expires_at < now
    }

    /// 租约在 now 时刻是否仍然有效
    pub fn is_live_at(&self, now: i64) -> bool {
        self.expires_at > now
    }

    pub fn is_held_by(&self, holder: &str) -> bool {
        self.holder == holder
    }
}

/// 条件写入的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseWrite {
    pub holder: String,
    pub expires_at: i64,
}

/// 锁句柄
///
/// 调用方对自身租约的本地认知。租约可能在释放前过期，
/// 执行不可逆写入前应调用 `assert_lock_ownership` 重新确认。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHandle {
    pub lock_key: String,
    pub owner: String,
    pub expires_at_epoch_seconds: i64,
    pub generation: i64,
}

impl LockHandle {
    /// 受保护写入需要携带的 fencing token
    pub fn fencing_token(&self) -> i64 {
        self.generation
    }

    /// 距租约到期的剩余秒数（已过期返回 0）
    pub fn remaining_seconds(&self, now: i64) -> u64 {
        self.expires_at_epoch_seconds.saturating_sub(now).max(0) as u64
    }
}

/// 获取锁的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOptions {
    pub lock_key: String,
    /// 每次获取尝试唯一的持有者标识，例如流水线 run id
    pub owner: String,
    pub lease_duration: Duration,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl AcquireOptions {
    pub fn new(lock_key: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            lock_key: lock_key.into(),
            owner: owner.into(),
            lease_duration: DEFAULT_LEASE_DURATION,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn lease_duration(mut self, lease: Duration) -> Self {
        self.lease_duration = lease;
        self
    }

    pub fn wait_timeout(mut self, wait: Duration) -> Self {
        self.wait_timeout = wait;
        self
    }

    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.poll_interval = poll;
        self
    }

    /// 以秒为单位一次性设置三个时间参数
    pub fn with_seconds(self, lease: u64, wait: u64, poll: u64) -> Self {
        self.lease_duration(Duration::from_secs(lease))
            .wait_timeout(Duration::from_secs(wait))
            .poll_interval(Duration::from_secs(poll))
    }

    /// 校验参数
    ///
    /// 租约以整秒写入存储，不足 1 秒的租约会被截断为 0，因此视为非法。
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.lock_key.trim().is_empty() {
            return Err("lock key must not be empty".to_string());
        }
        if self.owner.trim().is_empty() {
            return Err("owner must not be empty".to_string());
        }
        if self.lease_duration.as_secs() == 0 {
            return Err(format!(
                "lease duration must be at least 1s, got {:?}",
                self.lease_duration
            ));
        }
        if self.lease_duration > MAX_LEASE_DURATION {
            return Err(format!(
                "lease duration must be at most {}s, got {}s",
                MAX_LEASE_DURATION.as_secs(),
                self.lease_duration.as_secs()
            ));
        }
        Ok(())
    }

    /// 租约秒数，超出 i64 范围时报错
    pub fn lease_seconds(&self) -> std::result::Result<i64, String> {
        let seconds = self.lease_duration.as_secs();
        i64::try_from(seconds).map_err(|_| format!("lease duration {}s is out of range", seconds))
    }

    /// 计算在 now 时刻获取的租约到期时间，溢出时报错
    pub fn expires_at_from(&self, now: i64) -> std::result::Result<i64, String> {
        self.lease_seconds()?.checked_add(now).ok_or_else(|| {
            format!(
                "lease duration {}s overflows the expiry timestamp at {}",
                self.lease_duration.as_secs(),
                now
            )
        })
    }
}

//! 时钟抽象
//!
//! 租约到期时间以 epoch 秒计算。生产环境使用系统时钟，
//! 测试中使用可手动拨动的时钟模拟租约过期和时钟偏差。

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// 提供当前 epoch 秒
pub trait Clock: Send + Sync + Debug {
    fn now_epoch_seconds(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// 手动时钟
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_epoch_seconds: i64) -> Self {
        Self {
            now: AtomicI64::new(start_epoch_seconds),
        }
    }

    /// 以当前系统时间为起点
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now_epoch_seconds())
    }

    pub fn set(&self, epoch_seconds: i64) {
        self.now.store(epoch_seconds, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_seconds(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 将 epoch 秒格式化为 RFC 3339，用于日志
pub fn format_epoch(epoch_seconds: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_seconds, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("epoch:{}", epoch_seconds))
}

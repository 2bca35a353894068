//! 分布式锁错误类型
//!
//! 分为两层：`StoreError` 描述条件存储的结果（条件不满足 / 存储不可用），
//! `LockError` 描述锁管理器暴露给调用方的失败（超时、丢失、被抢占、过期）。

use std::time::Duration;

use build_version_shared::error::InfraError;
use thiserror::Error;

/// 条件存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 写入/删除条件在执行瞬间不成立，属于预期内的竞争结果
    #[error("precondition failed for lock record '{key}'")]
    PreconditionFailed { key: String },

    /// 传输层或后端故障
    #[error("{backend} store unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },

    #[error("malformed lock record '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

/// 条件存储 Result 类型别名
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn precondition_failed(key: &str) -> Self {
        Self::PreconditionFailed {
            key: key.to_string(),
        }
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable {
            backend: "postgres",
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable {
            backend: "redis",
            message: err.to_string(),
        }
    }
}

impl From<InfraError> for StoreError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Database(e) => e.into(),
            InfraError::Redis(e) => e.into(),
            other => Self::Unavailable {
                backend: "store",
                message: other.to_string(),
            },
        }
    }
}

/// 锁管理器错误
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out after waiting {}s to acquire lock '{key}'.", .wait.as_secs())]
    Timeout { key: String, wait: Duration },

    #[error("Lock '{key}' is no longer present; ownership by '{owner}' cannot be verified.")]
    Lost { key: String, owner: String },

    #[error("Lock '{key}' is now held by '{holder}', not '{owner}'.")]
    Stolen {
        key: String,
        owner: String,
        holder: String,
    },

    #[error("Lock '{key}' held by '{owner}' has expired (expires_at={expires_at}).")]
    Expired {
        key: String,
        owner: String,
        expires_at: i64,
    },

    #[error("invalid lock options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 锁管理器 Result 类型别名
pub type Result<T> = std::result::Result<T, LockError>;

impl LockError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "LOCK_TIMEOUT",
            Self::Lost { .. } => "LOCK_LOST",
            Self::Stolen { .. } => "LOCK_STOLEN",
            Self::Expired { .. } => "LOCK_EXPIRED",
            Self::InvalidOptions(_) => "INVALID_LOCK_OPTIONS",
            Self::Store(StoreError::PreconditionFailed { .. }) => "PRECONDITION_FAILED",
            Self::Store(StoreError::Unavailable { .. }) => "STORE_UNAVAILABLE",
            Self::Store(StoreError::Malformed { .. }) => "MALFORMED_LOCK_RECORD",
        }
    }

    /// 是否为所有权校验失败（调用方必须中止受保护的操作）
    pub fn is_ownership_failure(&self) -> bool {
        matches!(
            self,
            Self::Lost { .. } | Self::Stolen { .. } | Self::Expired { .. }
        )
    }

    /// 是否值得由调用方重新发起整个获取流程
    ///
    /// 只有存储不可用属于瞬时故障；超时说明锁确实被长期占用，重试没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable { .. }))
    }
}

//! 版本号递增错误类型
//!
//! 定义递增流程中的业务错误和系统错误

use build_version_shared::error::InfraError;
use thiserror::Error;
use version_lock::LockError;

/// 版本号递增错误类型
#[derive(Debug, Error)]
pub enum BuildVersionError {
    // === 版本号相关错误 ===
    #[error("No existing version found for key '{0}'.")]
    VersionNotFound(String),

    #[error(
        "Refusing to write version '{key}' with fencing token {generation}: a newer lock holder (generation {stored}) already wrote it."
    )]
    StaleFencingToken {
        key: String,
        generation: i64,
        stored: i64,
    },

    // === 锁相关错误 ===
    #[error(
        "Unable to acquire lock '{key}'. Ensure no other pipeline is incrementing the build version. {source}"
    )]
    LockUnavailable { key: String, source: LockError },

    #[error(transparent)]
    Lock(#[from] LockError),

    // === 输入错误 ===
    #[error("Invalid numeric input provided for {name}: {value}")]
    InvalidInput { name: String, value: String },

    #[error("Missing required input: {0}")]
    MissingInput(String),

    // === 系统错误 ===
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Shared(#[from] InfraError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 版本号递增 Result 类型别名
pub type Result<T> = std::result::Result<T, BuildVersionError>;

impl BuildVersionError {
    /// 是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Lock(e) => e.is_retryable(),
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::VersionNotFound(_) => "VERSION_NOT_FOUND",
            Self::StaleFencingToken { .. } => "STALE_FENCING_TOKEN",
            Self::LockUnavailable { .. } => "LOCK_UNAVAILABLE",
            Self::Lock(e) => e.code(),
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::MissingInput(_) => "MISSING_INPUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Shared(e) => e.code(),
            Self::Io(_) => "IO_ERROR",
        }
    }
}

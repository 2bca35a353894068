//! 统一错误处理模块
//!
//! 定义基础设施层（配置、数据库、Redis）共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum InfraError {
    // ==================== 配置错误 ====================
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid identifier '{value}' for {field}: {reason}")]
    InvalidIdentifier {
        field: String,
        value: String,
        reason: String,
    },

    // ==================== 存储错误 ====================
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== 通用错误 ====================
    #[error("internal error: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, InfraError>;

impl InfraError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 数据库只有连接类故障可重试，SQL 错误和连接串错误重试也不会成功。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::Protocol(_)
            ),
            Self::Redis(_) => true,
            _ => false,
        }
    }
}

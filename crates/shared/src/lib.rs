//! 共享库
//!
//! 包含构建版本号服务各 crate 共用的配置、错误处理、数据库连接、Redis 连接、
//! 日志初始化和重试策略等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod redis_client;
pub mod retry;
pub mod test_utils;

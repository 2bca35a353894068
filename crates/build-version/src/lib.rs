//! 构建版本号递增
//!
//! 多条互不通信的流水线共享同一个构建版本号。每次递增都在分布式租约锁保护下
//! 完成“读取-加一-写回”，写入时携带锁的 generation 作为 fencing token，
//! 拒绝租约过期后仍在运行的旧持有者。
//!
//! ## 模块结构
//!
//! - `settings`: 输入解析（命令行 / 环境变量 / 配置文件）
//! - `workflow`: 递增流程
//! - `repository`: 版本号存储（PostgreSQL / 内存）
//! - `context`: 流水线运行上下文
//! - `output`: 步骤输出
//! - `cli`: 命令行入口

pub mod cli;
pub mod context;
pub mod error;
pub mod models;
pub mod output;
pub mod repository;
pub mod settings;
pub mod workflow;

pub use error::{BuildVersionError, Result};
pub use models::{BuildVersion, RunContext};
pub use repository::{InMemoryVersionRepository, PgVersionRepository, VersionRepository};
pub use settings::{IncrementSettings, LockTarget, RawInputs};
pub use workflow::VersionBumper;

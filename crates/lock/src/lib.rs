//! 基于租约的分布式锁
//!
//! 在强一致的共享键值存储上实现命名锁的获取、持有校验与释放，
//! 用于串行化来自互不通信的多台机器的“读-改-写”操作。
//!
//! ## 模块结构
//!
//! - `store`: 条件存储适配层（内存 / PostgreSQL / Redis）
//! - `manager`: 锁管理器（轮询获取、所有权断言、尽力释放）
//! - `models`: 租约记录、锁句柄、获取参数
//! - `clock`: 时钟抽象
//! - `error`: 错误类型
//!
//! ## 使用示例
//!
//! ```ignore
//! let manager = LockManager::new(Arc::new(store));
//! let options = AcquireOptions::new("build_versions#mobile", run_id).with_seconds(60, 300, 5);
//!
//! let handle = manager.acquire_lock(&options).await?;
//! let outcome = async {
//!     let current = read_counter().await?;
//!     manager.assert_lock_ownership(&handle).await?;
//!     write_counter(current + 1, handle.fencing_token()).await
//! }
//! .await;
//! manager.release_lock(&handle.lock_key, &handle.owner).await;
//! outcome?;
//! ```
//!
//! ## 保证与局限
//!
//! - 互斥完全依赖存储条件写入的原子性和线性一致性
//! - 没有续约：租约时长必须覆盖受保护操作耗时加时钟偏差
//! - 等待者无先后顺序，高争用下可能饥饿
//! - 每次获取成功都会得到递增的 generation，受保护的写入应以此做 fencing 校验

pub mod clock;
pub mod error;
pub mod manager;
pub mod models;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LockError, Result, StoreError, StoreResult};
pub use manager::{LockManager, MIN_POLL_INTERVAL};
pub use models::{AcquireOptions, LeaseWrite, LockHandle, LockRecord, MAX_LEASE_DURATION};
pub use store::{
    ConditionalStore, MemoryConditionalStore, PostgresConditionalStore, RedisConditionalStore,
};

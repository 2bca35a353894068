//! 锁管理器集成测试
//!
//! 使用内存条件存储 + 手动时钟，覆盖获取、接管过期租约、超时、
//! 所有权断言和释放的完整行为。等待相关的用例使用 tokio 暂停时间。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use version_lock::{
    AcquireOptions, ConditionalStore, LockError, LockHandle, LockManager, LockRecord, ManualClock,
    MemoryConditionalStore, StoreError,
};

const NOW: i64 = 1_700_000_000;
const KEY: &str = "build_versions#mobile";

struct Fixture {
    store: MemoryConditionalStore,
    clock: Arc<ManualClock>,
    manager: LockManager,
}

fn fixture() -> Fixture {
    let store = MemoryConditionalStore::new();
    let clock = Arc::new(ManualClock::new(NOW));
    let manager = LockManager::with_clock(Arc::new(store.clone()), clock.clone());
    Fixture {
        store,
        clock,
        manager,
    }
}

fn options(owner: &str, lease: u64, wait: u64, poll: u64) -> AcquireOptions {
    AcquireOptions::new(KEY, owner).with_seconds(lease, wait, poll)
}

// ==================== 获取 ====================

#[tokio::test]
async fn test_acquire_on_empty_store() {
    let f = fixture();

    let handle = f.manager.acquire_lock(&options("A", 60, 300, 5)).await.unwrap();

    assert_eq!(handle.lock_key, KEY);
    assert_eq!(handle.owner, "A");
    assert_eq!(handle.expires_at_epoch_seconds, NOW + 60);
    assert_eq!(handle.generation, 1);

    let record = f.store.get(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "A");
    assert_eq!(record.expires_at, NOW + 60);
}

#[tokio::test(start_paused = true)]
async fn test_expired_lease_is_reclaimed() {
    let f = fixture();
    let handle_a = f.manager.acquire_lock(&options("A", 60, 300, 5)).await.unwrap();

    f.clock.advance(61);
    let handle_b = f.manager.acquire_lock(&options("B", 60, 5, 1)).await.unwrap();

    assert_eq!(handle_b.owner, "B");
    assert_eq!(handle_b.expires_at_epoch_seconds, NOW + 61 + 60);
    assert!(handle_b.generation > handle_a.generation);

    let err = f.manager.assert_lock_ownership(&handle_a).await.unwrap_err();
    match err {
        LockError::Stolen { holder, owner, .. } => {
            assert_eq!(holder, "B");
            assert_eq!(owner, "A");
        }
        other => panic!("expected Stolen, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiring_exactly_now_is_not_reclaimed() {
    let f = fixture();
    f.manager.acquire_lock(&options("A", 60, 300, 5)).await.unwrap();

    f.clock.advance(60);
    let err = f
        .manager
        .acquire_lock(&options("B", 60, 0, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_acquire_times_out_while_lock_is_held() {
    let f = fixture();
    f.manager.acquire_lock(&options("A", 60, 300, 5)).await.unwrap();

    let started = Instant::now();
    let err = f
        .manager
        .acquire_lock(&options("B", 60, 2, 1))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, LockError::Timeout { .. }));
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));

    let message = err.to_string();
    assert!(message.contains(KEY));
    assert!(message.contains("2s"));

    // 超时不会改动现有记录
    let record = f.store.get(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "A");
}

#[tokio::test(start_paused = true)]
async fn test_zero_wait_makes_a_single_attempt() {
    let f = fixture();
    f.manager.acquire_lock(&options("A", 60, 300, 5)).await.unwrap();

    let started = Instant::now();
    let err = f
        .manager
        .acquire_lock(&options("B", 60, 0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_waiter_acquires_after_release() {
    let f = fixture();
    let handle_a = f.manager.acquire_lock(&options("A", 60, 300, 5)).await.unwrap();

    let waiter = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.acquire_lock(&options("B", 60, 10, 1)).await })
    };

    tokio::time::sleep(Duration::from_secs(3)).await;
    // 租约未到期，B 不能接管
    assert_eq!(f.store.get(KEY).await.unwrap().unwrap().holder, "A");

    f.manager.release_lock(&handle_a.lock_key, &handle_a.owner).await;

    let handle_b = waiter.await.unwrap().unwrap();
    assert_eq!(handle_b.owner, "B");
    assert_eq!(f.store.get(KEY).await.unwrap().unwrap().holder, "B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_only_one_concurrent_acquirer_wins() {
    let f = fixture();

    let attempts = (0..16).map(|i| {
        let manager = f.manager.clone();
        tokio::spawn(async move {
            manager
                .acquire_lock(&options(&format!("run-{}", i), 60, 0, 1))
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let mut winners = Vec::new();
    for result in results {
        match result.unwrap() {
            Ok(handle) => winners.push(handle),
            Err(e) => assert!(matches!(e, LockError::Timeout { .. }), "unexpected {:?}", e),
        }
    }

    assert_eq!(winners.len(), 1);
    let record = f.store.get(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, winners[0].owner);
    assert_eq!(record.generation, winners[0].generation);
}

#[tokio::test]
async fn test_generation_increases_across_release() {
    let f = fixture();

    let mut last = 0;
    for owner in ["A", "B", "C"] {
        let handle = f.manager.acquire_lock(&options(owner, 60, 0, 1)).await.unwrap();
        assert!(handle.fencing_token() > last);
        last = handle.fencing_token();
        f.manager.release_lock(&handle.lock_key, &handle.owner).await;
    }
}

#[tokio::test]
async fn test_acquire_propagates_unavailable_store() {
    let f = fixture();
    f.store.set_unavailable(true);

    let err = f
        .manager
        .acquire_lock(&options("A", 60, 300, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LockError::Store(StoreError::Unavailable { backend: "memory", .. })
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_oversized_lease_is_rejected_and_holder_keeps_lock() {
    let f = fixture();
    let handle_a = f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();

    for lease in [u64::MAX, i64::MAX as u64] {
        let oversized = AcquireOptions::new(KEY, "B").lease_duration(Duration::from_secs(lease));
        let err = f.manager.acquire_lock(&oversized).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidOptions(_)), "lease {}: {:?}", lease, err);
    }

    // 超大租约既不能写入过去的到期时间，也不能抢占现有持有者
    f.manager.assert_lock_ownership(&handle_a).await.unwrap();
    let err = f.manager.acquire_lock(&options("C", 60, 0, 1)).await.unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));
    assert_eq!(f.store.get(KEY).await.unwrap().unwrap().holder, "A");
}

#[tokio::test]
async fn test_oversized_lease_on_empty_store_writes_nothing() {
    let f = fixture();
    let oversized = AcquireOptions::new(KEY, "A").lease_duration(Duration::from_secs(u64::MAX));

    let err = f.manager.acquire_lock(&oversized).await.unwrap_err();
    assert!(matches!(err, LockError::InvalidOptions(_)));
    assert!(f.store.get(KEY).await.unwrap().is_none());
}

// ==================== 所有权断言 ====================

#[tokio::test]
async fn test_assert_ownership_while_valid() {
    let f = fixture();
    let handle = f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();

    f.clock.advance(59);
    f.manager.assert_lock_ownership(&handle).await.unwrap();
}

#[tokio::test]
async fn test_assert_ownership_lost() {
    let f = fixture();
    let handle = f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();

    f.store.conditional_delete(KEY, "A").await.unwrap();

    let err = f.manager.assert_lock_ownership(&handle).await.unwrap_err();
    assert!(matches!(err, LockError::Lost { .. }));
    assert!(err.is_ownership_failure());
}

#[tokio::test]
async fn test_assert_ownership_stolen() {
    let f = fixture();
    let handle = LockHandle {
        lock_key: KEY.to_string(),
        owner: "A".to_string(),
        expires_at_epoch_seconds: NOW + 60,
        generation: 1,
    };
    f.store.insert_record(LockRecord {
        key: KEY.to_string(),
        holder: "B".to_string(),
        expires_at: NOW + 60,
        generation: 2,
    });

    let err = f.manager.assert_lock_ownership(&handle).await.unwrap_err();
    assert!(matches!(err, LockError::Stolen { .. }));
    assert!(err.to_string().contains("'B'"));
}

#[tokio::test]
async fn test_assert_ownership_expired_at_boundary() {
    let f = fixture();
    let handle = f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();

    f.clock.set(handle.expires_at_epoch_seconds);
    let err = f.manager.assert_lock_ownership(&handle).await.unwrap_err();
    match err {
        LockError::Expired { expires_at, .. } => assert_eq!(expires_at, NOW + 60),
        other => panic!("expected Expired, got {:?}", other),
    }
}

// ==================== 释放 ====================

#[tokio::test]
async fn test_release_removes_own_record() {
    let f = fixture();
    let handle = f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();

    f.manager.release_lock(&handle.lock_key, &handle.owner).await;
    assert!(f.store.is_empty());

    // 重复释放不报错
    f.manager.release_lock(&handle.lock_key, &handle.owner).await;
}

#[tokio::test]
async fn test_release_leaves_other_holder_untouched() {
    let f = fixture();
    f.manager.acquire_lock(&options("B", 60, 0, 1)).await.unwrap();

    f.manager.release_lock(KEY, "A").await;

    let record = f.store.get(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "B");
}

#[tokio::test]
async fn test_release_with_unavailable_store_does_not_fail() {
    let f = fixture();
    f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();

    f.store.set_unavailable(true);
    f.manager.release_lock(KEY, "A").await;

    f.store.set_unavailable(false);
    assert_eq!(f.store.len(), 1);
}

#[tokio::test]
async fn test_describe_lock() {
    let f = fixture();
    assert!(f.manager.describe_lock(KEY).await.unwrap().is_none());

    f.manager.acquire_lock(&options("A", 60, 0, 1)).await.unwrap();
    let record = f.manager.describe_lock(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "A");
    assert_eq!(f.manager.now_epoch_seconds(), NOW);
}

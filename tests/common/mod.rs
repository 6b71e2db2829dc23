//! 集成测试共享工具

#![allow(dead_code)]

use async_trait::async_trait;
use progress_recovery::config::RecoveryConfig;
use progress_recovery::models::{ProgressUpdate, Record};
use progress_recovery::retry::RetryPolicy;
use progress_recovery::store::{
    BlobStorage, MemoryBlobStorage, MemoryDataStore, ReloadCounter, StaticIdentity,
};
use progress_recovery::{Collaborators, RecoveryCoordinator, StoreError, StoreResult};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct Harness {
    pub store: Arc<MemoryDataStore>,
    pub blobs: Arc<MemoryBlobStorage>,
    pub reload: Arc<ReloadCounter>,
    pub coordinator: Arc<RecoveryCoordinator>,
}

/// 测试配置：同步失败不重试，避免等待
pub fn test_config() -> RecoveryConfig {
    RecoveryConfig {
        sync_retry: RetryPolicy::none(),
        ..RecoveryConfig::default()
    }
}

pub fn harness(store: MemoryDataStore) -> Harness {
    harness_with(store, StaticIdentity::signed_in("student-1"))
}

pub fn harness_with(store: MemoryDataStore, identity: StaticIdentity) -> Harness {
    let store = Arc::new(store);
    let blobs = Arc::new(MemoryBlobStorage::new());
    let reload = Arc::new(ReloadCounter::new());
    let coordinator = Arc::new(RecoveryCoordinator::new(
        Collaborators {
            identity: Arc::new(identity),
            data_store: store.clone(),
            blobs: blobs.clone(),
            reload: reload.clone(),
        },
        test_config(),
    ));
    Harness {
        store,
        blobs,
        reload,
        coordinator,
    }
}

pub fn progress_record(week: u32, day: u32, lesson_index: u32) -> Record {
    ProgressUpdate {
        id: format!("w{}-d{}-{}", week, day, lesson_index),
        week,
        day,
        lesson_index,
        status: "completed".to_string(),
        time_spent: 300,
    }
    .to_record()
}

pub fn records(prefix: &str, n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new(format!("{}-{}", prefix, i)).with_field("index", i as u64))
        .collect()
}

/// `set` 在放行前一直阻塞的 Blob 存储，用来让备份停在半路
pub struct GatedBlobStorage {
    inner: MemoryBlobStorage,
    gate: Semaphore,
}

impl GatedBlobStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryBlobStorage::new(),
            gate: Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.peek(key)
    }
}

#[async_trait]
impl BlobStorage for GatedBlobStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key).await
    }
}

pub fn gated_coordinator(
    store: Arc<MemoryDataStore>,
    blobs: Arc<GatedBlobStorage>,
    config: RecoveryConfig,
) -> Arc<RecoveryCoordinator> {
    Arc::new(RecoveryCoordinator::new(
        Collaborators {
            identity: Arc::new(StaticIdentity::signed_in("student-1")),
            data_store: store,
            blobs,
            reload: Arc::new(ReloadCounter::new()),
        },
        config,
    ))
}

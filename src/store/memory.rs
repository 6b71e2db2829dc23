//! 内存协作者实现
//!
//! 供测试、基准和无持久化场景使用。数据存储支持：
//! - 云端可达性开关
//! - 按集合注入加载失败 / 同步失败
//! - 写入计数（用于断言 "没有发生写入"）

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error};

use super::traits::{BlobStorage, DataStore, IdentityProvider, ReloadSignal, RemoteStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{ProgressUpdate, Record, User, DASHBOARD_FIGURES_COLLECTION, PROGRESS_COLLECTION};

// ============================================================================
// 安全锁访问辅助函数（处理锁中毒问题）
// ============================================================================

fn safe_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!(
                "[MemoryStore] RwLock poisoned! Recovering read guard for type: {:?}",
                std::any::type_name::<T>()
            );
            poisoned.into_inner()
        }
    }
}

fn safe_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!(
                "[MemoryStore] RwLock poisoned! Recovering write guard for type: {:?}",
                std::any::type_name::<T>()
            );
            poisoned.into_inner()
        }
    }
}

/// 按 id upsert，保持集合内的插入顺序
fn upsert(records: &mut Vec<Record>, record: Record) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(slot) => *slot = record,
        None => records.push(record),
    }
}

type CollectionMap = HashMap<String, Vec<Record>>;

// ============================================================================
// 云端
// ============================================================================

#[derive(Default)]
pub struct MemoryRemoteStore {
    collections: RwLock<CollectionMap>,
    failing: RwLock<HashSet<String>>,
    reads: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        let mut map = safe_write(&self.collections);
        let target = map.entry(collection.to_string()).or_default();
        for record in records {
            upsert(target, record);
        }
    }

    /// 让某个集合的云端读取失败
    pub fn fail_reads_for(&self, collection: &str) {
        safe_write(&self.failing).insert(collection.to_string());
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> CollectionMap {
        safe_read(&self.collections).clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_data(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if safe_read(&self.failing).contains(collection) {
            return Err(StoreError::Unavailable(format!(
                "remote read of '{}' failed",
                collection
            )));
        }
        Ok(safe_read(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// 混合数据库（本地缓存 + 云端）
// ============================================================================

pub struct MemoryDataStore {
    local: RwLock<CollectionMap>,
    remote: MemoryRemoteStore,
    reachable: AtomicBool,
    failing_loads: RwLock<HashSet<String>>,
    fail_sync: AtomicBool,
    writes: AtomicUsize,
    progress_writes: AtomicUsize,
    sync_calls: AtomicUsize,
}

impl Default for MemoryDataStore {
    fn default() -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            remote: MemoryRemoteStore::new(),
            reachable: AtomicBool::new(true),
            failing_loads: RwLock::new(HashSet::new()),
            fail_sync: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            progress_writes: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 离线状态的数据存储
    pub fn offline() -> Self {
        let store = Self::default();
        store.set_reachable(false);
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// 直接写入本地缓存（不计入写入次数）
    pub fn seed_local(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        let mut map = safe_write(&self.local);
        let target = map.entry(collection.to_string()).or_default();
        for record in records {
            upsert(target, record);
        }
    }

    pub fn remote_store(&self) -> &MemoryRemoteStore {
        &self.remote
    }

    pub fn fail_loads_for(&self, collection: &str) {
        safe_write(&self.failing_loads).insert(collection.to_string());
    }

    pub fn set_sync_failure(&self, fail: bool) {
        self.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// 本地集合的当前内容
    pub fn local_records(&self, collection: &str) -> Vec<Record> {
        safe_read(&self.local)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// 所有写入（save_data / save_progress / save_dashboard_figure）的次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn progress_write_count(&self) -> usize {
        self.progress_writes.load(Ordering::SeqCst)
    }

    pub fn sync_count(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    fn upsert_local(&self, collection: &str, record: Record) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut map = safe_write(&self.local);
        upsert(map.entry(collection.to_string()).or_default(), record);
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn get_data(&self, collection: &str) -> StoreResult<Vec<Record>> {
        if safe_read(&self.failing_loads).contains(collection) {
            return Err(StoreError::Other(format!(
                "load of '{}' failed",
                collection
            )));
        }
        Ok(self.local_records(collection))
    }

    async fn sync_from_remote(&self) -> StoreResult<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_reachable() {
            return Err(StoreError::Unavailable("remote store is offline".into()));
        }
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("sync rejected by remote".into()));
        }

        let remote = self.remote.snapshot();
        let mut map = safe_write(&self.local);
        for (collection, records) in remote {
            let target = map.entry(collection).or_default();
            for record in records {
                upsert(target, record);
            }
        }
        debug!("[MemoryStore] synced {} collections from remote", map.len());
        Ok(())
    }

    async fn save_data(&self, collection: &str, record: &Record, id: &str) -> StoreResult<()> {
        let mut record = record.clone();
        record.id = id.to_string();
        self.upsert_local(collection, record);
        Ok(())
    }

    async fn save_progress(&self, update: &ProgressUpdate) -> StoreResult<()> {
        self.progress_writes.fetch_add(1, Ordering::SeqCst);
        self.upsert_local(PROGRESS_COLLECTION, update.to_record());
        Ok(())
    }

    async fn save_dashboard_figure(&self, metric_id: &str, value: f64) -> StoreResult<()> {
        self.upsert_local(
            DASHBOARD_FIGURES_COLLECTION,
            Record::dashboard_figure(metric_id, value),
        );
        Ok(())
    }

    fn remote(&self) -> &dyn RemoteStore {
        &self.remote
    }
}

// ============================================================================
// Blob 存储 / 身份 / 重载信号
// ============================================================================

#[derive(Default)]
pub struct MemoryBlobStorage {
    entries: RwLock<HashMap<String, String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取但不计数
    pub fn peek(&self, key: &str) -> Option<String> {
        safe_read(&self.entries).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = safe_read(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        safe_write(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        safe_write(&self.entries).remove(key);
        Ok(())
    }
}

/// 固定身份
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<User>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(User::new(user_id)),
        }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}

/// 记录重载请求次数
#[derive(Debug, Default)]
pub struct ReloadCounter(AtomicUsize);

impl ReloadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ReloadSignal for ReloadCounter {
    fn request_reload(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_data_upserts_by_id() {
        let store = MemoryDataStore::new();
        let record = Record::new("a").with_field("n", 1);
        store.save_data("lessons", &record, "a").await.unwrap();
        store
            .save_data("lessons", &Record::new("a").with_field("n", 2), "a")
            .await
            .unwrap();

        let records = store.local_records("lessons");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_u64("n"), Some(2));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn sync_copies_remote_into_local() {
        let store = MemoryDataStore::new();
        store.seed_local("lessons", [Record::new("local-only")]);
        store
            .remote_store()
            .insert("lessons", [Record::new("remote-1"), Record::new("remote-2")]);

        store.sync_from_remote().await.unwrap();

        let ids: Vec<String> = store
            .local_records("lessons")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["local-only", "remote-1", "remote-2"]);
    }

    #[tokio::test]
    async fn offline_sync_fails() {
        let store = MemoryDataStore::offline();
        assert!(store.sync_from_remote().await.is_err());
        assert_eq!(store.sync_count(), 1);
    }

    #[test]
    fn closures_are_reload_signals() {
        let counter = std::sync::Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let signal = move || {
            c.fetch_add(1, Ordering::SeqCst);
        };
        signal.request_reload();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

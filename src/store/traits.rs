//! 协作者 trait 定义
//!
//! 协调器只依赖这些接口，具体实现（浏览器缓存、云端数据库等）由宿主应用注入。

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{ProgressUpdate, Record, User};

/// 身份协作者
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 当前登录用户；未登录返回 None
    async fn current_user(&self) -> Option<User>;
}

/// 仅访问云端的数据源（绕过本地缓存）
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_data(&self, collection: &str) -> StoreResult<Vec<Record>>;
}

/// 混合数据库：本地缓存 + 云端同步
#[async_trait]
pub trait DataStore: Send + Sync {
    /// 云端是否可达（网络 / 服务状态标志）
    fn is_reachable(&self) -> bool;

    /// 读取集合（本地与云端合并后的视图）
    async fn get_data(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// 全量 云端 → 本地 同步
    async fn sync_from_remote(&self) -> StoreResult<()>;

    /// 本地 upsert
    async fn save_data(&self, collection: &str, record: &Record, id: &str) -> StoreResult<()>;

    /// 进度写路径，会触发派生统计等副作用
    async fn save_progress(&self, update: &ProgressUpdate) -> StoreResult<()>;

    async fn save_dashboard_figure(&self, metric_id: &str, value: f64) -> StoreResult<()>;

    /// 云端直连子协作者
    fn remote(&self) -> &dyn RemoteStore;
}

/// 本地持久化 Blob 存储（键值，值为字符串）
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// 删除键；键不存在不是错误
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// "重新加载应用状态" 信号
///
/// 协调器只负责触发，具体行为（例如刷新 UI）由宿主决定。
pub trait ReloadSignal: Send + Sync {
    fn request_reload(&self);
}

impl<F> ReloadSignal for F
where
    F: Fn() + Send + Sync,
{
    fn request_reload(&self) {
        self()
    }
}

//! 协作者接口与参考实现
//!
//! - `traits`: 身份、混合数据库、云端直连、Blob 存储、重载信号
//! - `memory`: 内存实现（测试 / 基准）
//! - `file_blob`: 基于文件系统的 Blob 存储

mod file_blob;
mod memory;
mod traits;

pub use file_blob::FileBlobStorage;
pub use memory::{
    MemoryBlobStorage, MemoryDataStore, MemoryRemoteStore, ReloadCounter, StaticIdentity,
};
pub use traits::{BlobStorage, DataStore, IdentityProvider, ReloadSignal, RemoteStore};

//! 基于文件系统的 Blob 存储
//!
//! 每个键对应根目录下的一个文件。写入先落到同目录的临时文件，再原子替换，
//! 保证读者永远看不到写了一半的备份。

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::BlobStorage;
use crate::error::{StoreError, StoreResult};

/// 键的最大长度
const MAX_KEY_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    /// 创建存储；根目录不存在时自动创建
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 键只允许 `[A-Za-z0-9._-]`，且不能以 `.` 开头（防止路径穿越和隐藏文件）
    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

fn write_atomically(root: &Path, target: &Path, value: &str) -> StoreResult<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(value.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        let value = value.to_string();
        let bytes = value.len();
        tokio::task::spawn_blocking(move || write_atomically(&root, &path, &value))
            .await
            .map_err(|e| StoreError::Other(format!("blob write task failed: {}", e)))??;
        debug!("[BlobStore] wrote {} ({} bytes)", key, bytes);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("[BlobStore] removed {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

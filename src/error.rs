//! 统一错误类型
//!
//! - [`RecoveryError`]：恢复协调器对外暴露的结构化失败结果
//! - [`StoreError`]：外部协作者（数据存储、Blob 存储）上报的失败

use serde::Serialize;
use thiserror::Error;

/// 协调器操作的结果类型
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// 协作者操作的结果类型
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 恢复协调器错误
///
/// 所有公开操作都以此类型返回失败，不会把协作者的原始错误直接抛给调用方。
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoveryError {
    /// 当前没有登录用户（仅 `force_refresh`）
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 云端和本地备份都没有可用数据（仅 `recover_collection`）
    #[error("No recovery data found for collection '{collection}'")]
    NoRecoveryDataFound { collection: String },

    /// 单个集合加载失败；在批量操作中只记录，不中断
    #[error("Failed to load collection '{collection}': {cause}")]
    CollectionLoadFailed { collection: String, cause: String },

    /// 同一集合的备份仍在进行中
    #[error("Backup already in progress for collection '{collection}'")]
    BackupInProgress { collection: String },

    /// 其他所有失败（序列化、存储 I/O 等）
    #[error("Unexpected failure: {cause}")]
    UnexpectedFailure { cause: String },
}

impl RecoveryError {
    pub fn collection_load_failed(collection: impl Into<String>, cause: impl ToString) -> Self {
        Self::CollectionLoadFailed {
            collection: collection.into(),
            cause: cause.to_string(),
        }
    }

    pub fn unexpected(cause: impl Into<String>) -> Self {
        Self::UnexpectedFailure {
            cause: cause.into(),
        }
    }
}

impl From<StoreError> for RecoveryError {
    fn from(e: StoreError) -> Self {
        RecoveryError::unexpected(e.to_string())
    }
}

impl From<serde_json::Error> for RecoveryError {
    fn from(e: serde_json::Error) -> Self {
        RecoveryError::unexpected(format!("Serialization error: {}", e))
    }
}

/// 协作者错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Other(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_become_unexpected_failures() {
        let err: RecoveryError = StoreError::Unavailable("offline".into()).into();
        assert_eq!(
            err,
            RecoveryError::unexpected("Remote store unavailable: offline")
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = RecoveryError::collection_load_failed("lessons", "timeout");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "collection_load_failed");
        assert_eq!(json["collection"], "lessons");
        assert_eq!(json["cause"], "timeout");
    }
}

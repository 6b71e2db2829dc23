//! 备份快照
//!
//! 快照在内存中完整构建后才提交：数据 blob 是记录的 JSON 数组，
//! 元数据单独存放，只包含时间戳和条目数，不做摘要。

use chrono::Utc;
use uuid::Uuid;

use super::types::BackupMeta;
use crate::error::Result;
use crate::models::Record;

#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub meta: BackupMeta,
    pub records: Vec<Record>,
}

/// 已序列化、待提交的快照
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub blob: String,
    pub meta: String,
}

impl BackupSnapshot {
    pub fn capture(collection: &str, records: Vec<Record>) -> Self {
        Self {
            meta: BackupMeta {
                collection: collection.to_string(),
                snapshot_id: Uuid::new_v4(),
                created_at: Utc::now(),
                item_count: records.len(),
            },
            records,
        }
    }

    pub fn encode(&self) -> Result<EncodedSnapshot> {
        Ok(EncodedSnapshot {
            blob: serde_json::to_string(&self.records)?,
            meta: serde_json::to_string(&self.meta)?,
        })
    }
}

pub fn decode_records(blob: &str) -> Result<Vec<Record>> {
    Ok(serde_json::from_str(blob)?)
}

pub fn decode_meta(meta: &str) -> Result<BackupMeta> {
    Ok(serde_json::from_str(meta)?)
}

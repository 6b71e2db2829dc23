//! 协调器各操作的结果类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::RecoveryError;

/// `force_refresh` 结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub success: bool,
    /// 本次是否成功完成了 云端 → 本地 同步
    pub synced: bool,
    /// 每个集合的记录数（加载失败记为 0）
    pub counts: BTreeMap<String, usize>,
    /// 加载失败的集合（均为 `CollectionLoadFailed`）
    pub load_failures: Vec<RecoveryError>,
}

/// 恢复数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySource {
    /// 直接从云端读取
    Remote,
    /// 本地备份回放
    LocalBackup,
}

/// `recover_collection` 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub collection: String,
    pub source: RecoverySource,
    /// 成功写入的记录数
    pub recovered: usize,
    /// 写入失败的记录数
    pub failed: usize,
}

/// 备份元数据（与备份数据分开存放在 `<key>_meta`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    pub collection: String,
    pub snapshot_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub item_count: usize,
}

/// `create_backup` 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub collection: String,
    pub item_count: usize,
    pub snapshot_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&BackupMeta> for BackupReport {
    fn from(meta: &BackupMeta) -> Self {
        Self {
            collection: meta.collection.clone(),
            item_count: meta.item_count,
            snapshot_id: meta.snapshot_id,
            created_at: meta.created_at,
        }
    }
}

/// `repair_derived_metric` 结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub metric_id: String,
    /// 修复前的值；条目不存在时为 None
    pub previous_value: Option<f64>,
    pub repaired: bool,
}

/// 完整性问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    CollectionLoadFailed,
    CorruptDerivedMetric,
}

/// 一条完整性问题：类别 + 可读描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub kind: IssueKind,
    pub detail: String,
}

impl IntegrityIssue {
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// `validate_integrity` 结果（诊断用，不持久化）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub counts: BTreeMap<String, usize>,
    pub issues: Vec<IntegrityIssue>,
    pub checked_at: DateTime<Utc>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }
}

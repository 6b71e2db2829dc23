//! 恢复协调器
//!
//! 在本地缓存与云端数据之间对账，提供备份、恢复和派生指标修复。
//! 每次调用都是一次独立的 读 → 改 → 写，不在调用之间保留状态；
//! 唯一的共享状态是备份单飞锁。

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::single_flight::SingleFlight;
use super::snapshot::{decode_meta, decode_records, BackupSnapshot};
use super::types::{
    BackupMeta, BackupReport, IntegrityIssue, IntegrityReport, IssueKind, RecoveryReport,
    RecoverySource, RefreshReport, RepairReport,
};
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::models::{ProgressUpdate, Record, FIGURE_VALUE_FIELD};
use crate::store::{BlobStorage, DataStore, IdentityProvider, ReloadSignal};

/// 协调器依赖的外部协作者
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub data_store: Arc<dyn DataStore>,
    pub blobs: Arc<dyn BlobStorage>,
    pub reload: Arc<dyn ReloadSignal>,
}

pub struct RecoveryCoordinator {
    deps: Collaborators,
    config: RecoveryConfig,
    backups_in_flight: SingleFlight,
}

impl RecoveryCoordinator {
    pub fn new(deps: Collaborators, config: RecoveryConfig) -> Self {
        Self {
            deps,
            config,
            backups_in_flight: SingleFlight::new(),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// 某集合的备份是否正在进行
    pub fn is_backup_running(&self, collection: &str) -> bool {
        self.backups_in_flight.is_busy(collection)
    }

    // ========================================================================
    // 强制刷新
    // ========================================================================

    /// 强制从云端刷新并重新统计各集合
    ///
    /// 需要登录。云端可达时先同步（失败只记录），然后逐个加载集合，
    /// 单个集合失败记为 0 条，最后触发一次应用状态重载。
    pub async fn force_refresh(&self) -> Result<RefreshReport> {
        let user = self
            .deps
            .identity
            .current_user()
            .await
            .ok_or(RecoveryError::NotAuthenticated)?;
        info!("[Recovery] 用户 {} 发起强制刷新", user.id);

        let store = &self.deps.data_store;
        let mut synced = false;
        if store.is_reachable() {
            match self
                .config
                .sync_retry
                .execute("sync_from_remote", || store.sync_from_remote())
                .await
            {
                Ok(()) => {
                    synced = true;
                    info!("[Recovery] 云端同步完成");
                }
                Err(e) => warn!("[Recovery] 云端同步失败，继续使用本地数据: {}", e),
            }
        } else {
            info!("[Recovery] 云端不可达，跳过同步");
        }

        let CollectionScan {
            counts,
            failures: load_failures,
            ..
        } = self.scan_collections(None).await;
        for (collection, count) in &counts {
            debug!("[Recovery] {}: {} 条", collection, count);
        }

        self.deps.reload.request_reload();

        Ok(RefreshReport {
            success: true,
            synced,
            counts,
            load_failures,
        })
    }

    /// 依次加载所有识别的集合；失败的集合记为 0 并返回对应错误
    ///
    /// `keep` 指定的集合加载成功时保留其记录，调用方不必再读一次。
    async fn scan_collections(&self, keep: Option<&str>) -> CollectionScan {
        let mut scan = CollectionScan::default();
        for collection in &self.config.collections {
            match self.deps.data_store.get_data(collection).await {
                Ok(records) => {
                    scan.counts.insert(collection.clone(), records.len());
                    if keep == Some(collection.as_str()) {
                        scan.kept = Some(records);
                    }
                }
                Err(e) => {
                    warn!("[Recovery] 加载集合 {} 失败，记为 0 条: {}", collection, e);
                    scan.counts.insert(collection.clone(), 0);
                    scan.failures
                        .push(RecoveryError::collection_load_failed(collection, e));
                }
            }
        }
        scan
    }

    // ========================================================================
    // 恢复
    // ========================================================================

    /// 恢复默认的进度集合
    pub async fn recover_progress(&self) -> Result<RecoveryReport> {
        let collection = self.config.progress_collection.clone();
        self.recover_collection(&collection).await
    }

    /// 恢复一个集合
    ///
    /// 优先级：云端直连 → 本地备份回放 → `NoRecoveryDataFound`。
    /// 只做 upsert，不会删除本地已有记录，重复执行结果不变。
    pub async fn recover_collection(&self, collection: &str) -> Result<RecoveryReport> {
        let store = &self.deps.data_store;

        if store.is_reachable() {
            match store.remote().get_data(collection).await {
                Ok(records) if !records.is_empty() => {
                    info!(
                        "[Recovery] 从云端恢复 {}: {} 条记录",
                        collection,
                        records.len()
                    );
                    return Ok(self.upsert_all(collection, &records).await);
                }
                Ok(_) => info!("[Recovery] 云端 {} 为空，尝试本地备份", collection),
                Err(e) => warn!("[Recovery] 读取云端 {} 失败，尝试本地备份: {}", collection, e),
            }
        }

        let key = self.config.backup_key(collection);
        match self.deps.blobs.get(&key).await? {
            Some(blob) => {
                let records = decode_records(&blob)?;
                info!(
                    "[Recovery] 从本地备份恢复 {}: {} 条记录",
                    collection,
                    records.len()
                );
                Ok(self.replay_backup(collection, &records).await)
            }
            None => {
                warn!("[Recovery] {} 没有可用的恢复数据", collection);
                Err(RecoveryError::NoRecoveryDataFound {
                    collection: collection.to_string(),
                })
            }
        }
    }

    async fn upsert_all(&self, collection: &str, records: &[Record]) -> RecoveryReport {
        let mut report = RecoveryReport {
            collection: collection.to_string(),
            source: RecoverySource::Remote,
            recovered: 0,
            failed: 0,
        };
        for record in records {
            match self
                .deps
                .data_store
                .save_data(collection, record, &record.id)
                .await
            {
                Ok(()) => report.recovered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("[Recovery] 写入 {}/{} 失败: {}", collection, record.id, e);
                }
            }
        }
        report
    }

    /// 备份回放走正常写路径，让写入副作用（派生统计等）同样执行
    async fn replay_backup(&self, collection: &str, records: &[Record]) -> RecoveryReport {
        let mut report = RecoveryReport {
            collection: collection.to_string(),
            source: RecoverySource::LocalBackup,
            recovered: 0,
            failed: 0,
        };
        for record in records {
            match self.write_through_domain_path(collection, record).await {
                Ok(()) => report.recovered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("[Recovery] 回放 {}/{} 失败: {}", collection, record.id, e);
                }
            }
        }
        report
    }

    async fn write_through_domain_path(&self, collection: &str, record: &Record) -> Result<()> {
        let store = &self.deps.data_store;

        if collection == self.config.progress_collection {
            match ProgressUpdate::from_record(record) {
                Some(update) => return Ok(store.save_progress(&update).await?),
                None => warn!(
                    "[Recovery] 进度记录 {} 字段不完整，改为直接写入",
                    record.id
                ),
            }
        } else if collection == self.config.dashboard_collection {
            if let Some(value) = record.get_f64(FIGURE_VALUE_FIELD) {
                return Ok(store.save_dashboard_figure(&record.id, value).await?);
            }
        }

        Ok(store.save_data(collection, record, &record.id).await?)
    }

    // ========================================================================
    // 备份
    // ========================================================================

    pub async fn backup_progress(&self) -> Result<BackupReport> {
        let collection = self.config.progress_collection.clone();
        self.create_backup(&collection).await
    }

    /// 为集合创建最新备份（覆盖旧备份）
    ///
    /// 同一集合已有备份在进行时返回 `BackupInProgress`。
    pub async fn create_backup(&self, collection: &str) -> Result<BackupReport> {
        let _flight = self.backups_in_flight.try_acquire(collection).ok_or_else(|| {
            RecoveryError::BackupInProgress {
                collection: collection.to_string(),
            }
        })?;

        let records = self.deps.data_store.get_data(collection).await?;
        let snapshot = BackupSnapshot::capture(collection, records);
        let encoded = snapshot.encode()?;

        let blob_key = self.config.backup_key(collection);
        let previous = self.deps.blobs.get(&blob_key).await?;

        self.deps.blobs.set(&blob_key, &encoded.blob).await?;
        if let Err(e) = self
            .deps
            .blobs
            .set(&self.config.backup_meta_key(collection), &encoded.meta)
            .await
        {
            warn!("[Recovery] 写入 {} 备份元数据失败，回滚数据: {}", collection, e);
            self.roll_back_blob(&blob_key, previous).await;
            return Err(e.into());
        }

        info!(
            "[Recovery] 已备份 {}: {} 条记录",
            collection, snapshot.meta.item_count
        );
        Ok(BackupReport::from(&snapshot.meta))
    }

    /// 元数据写入失败后恢复旧数据 blob，使数据与元数据保持成对
    async fn roll_back_blob(&self, blob_key: &str, previous: Option<String>) {
        let restored = match previous {
            Some(blob) => self.deps.blobs.set(blob_key, &blob).await,
            None => self.deps.blobs.remove(blob_key).await,
        };
        if let Err(e) = restored {
            error!("[Recovery] 回滚备份 {} 失败: {}", blob_key, e);
        }
    }

    /// 读取集合最近一次备份的元数据
    pub async fn last_backup(&self, collection: &str) -> Result<Option<BackupMeta>> {
        match self
            .deps
            .blobs
            .get(&self.config.backup_meta_key(collection))
            .await?
        {
            Some(meta) => Ok(Some(decode_meta(&meta)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // 派生指标修复 / 完整性检查
    // ========================================================================

    /// 修复配置中的默认派生指标
    pub async fn repair_default_metric(&self) -> Result<RepairReport> {
        let metric_id = self.config.metric.id.clone();
        self.repair_derived_metric(&metric_id).await
    }

    /// 派生指标超过阈值时重置为安全默认值；幂等
    pub async fn repair_derived_metric(&self, metric_id: &str) -> Result<RepairReport> {
        let collection = &self.config.dashboard_collection;
        let figures = self
            .deps
            .data_store
            .get_data(collection)
            .await
            .map_err(|e| RecoveryError::collection_load_failed(collection, e))?;

        let previous_value = find_metric(&figures, metric_id);
        let corrupt = previous_value.is_some_and(|v| self.config.metric.is_corrupt(v));

        if corrupt {
            warn!(
                "[Recovery] 指标 {} 的值 {:?} 超过阈值 {}，重置为 {}",
                metric_id,
                previous_value,
                self.config.metric.corruption_threshold,
                self.config.metric.safe_default
            );
            self.deps
                .data_store
                .save_dashboard_figure(metric_id, self.config.metric.safe_default)
                .await?;
        }

        Ok(RepairReport {
            metric_id: metric_id.to_string(),
            previous_value,
            repaired: corrupt,
        })
    }

    /// 诊断：统计各集合并检查派生指标是否损坏
    pub async fn validate_integrity(&self) -> Result<IntegrityReport> {
        let collection = &self.config.dashboard_collection;
        let scan = self.scan_collections(Some(collection.as_str())).await;
        let mut issues: Vec<IntegrityIssue> = scan
            .failures
            .iter()
            .map(|e| IntegrityIssue::new(IssueKind::CollectionLoadFailed, e.to_string()))
            .collect();

        // 仪表盘集合在识别列表中时沿用上面的加载结果，失败已计入问题
        let figures = if self.config.collections.contains(collection) {
            scan.kept
        } else {
            match self.deps.data_store.get_data(collection).await {
                Ok(figures) => Some(figures),
                Err(e) => {
                    issues.push(IntegrityIssue::new(
                        IssueKind::CollectionLoadFailed,
                        RecoveryError::collection_load_failed(collection, e).to_string(),
                    ));
                    None
                }
            }
        };

        let metric = &self.config.metric;
        if let Some(value) = figures
            .as_deref()
            .and_then(|figures| find_metric(figures, &metric.id))
        {
            if metric.is_corrupt(value) {
                issues.push(IntegrityIssue::new(
                    IssueKind::CorruptDerivedMetric,
                    format!(
                        "Metric '{}' has corrupt value {} (threshold {})",
                        metric.id, value, metric.corruption_threshold
                    ),
                ));
            }
        }

        if issues.is_empty() {
            info!("[Recovery] 完整性检查通过");
        } else {
            warn!("[Recovery] 完整性检查发现 {} 个问题", issues.len());
        }

        Ok(IntegrityReport {
            counts: scan.counts,
            issues,
            checked_at: chrono::Utc::now(),
        })
    }
}

/// 一次集合扫描的结果
#[derive(Default)]
struct CollectionScan {
    counts: BTreeMap<String, usize>,
    failures: Vec<RecoveryError>,
    kept: Option<Vec<Record>>,
}

fn find_metric(figures: &[Record], metric_id: &str) -> Option<f64> {
    figures
        .iter()
        .find(|r| r.id == metric_id)
        .and_then(|r| r.get_f64(FIGURE_VALUE_FIELD))
}

//! 恢复工具配置
//!
//! 配置来源（后者覆盖前者）：
//! 1. 内置默认值
//! 2. 可选的 TOML 文件
//! 3. `PROGRESS_RECOVERY__*` 环境变量（启动时先加载 `.env`）
//!
//! 也可以以 JSON 形式保存在 Blob 存储中（键 `<app>_recovery_config`）。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::StoreError;
use crate::models::{DASHBOARD_FIGURES_COLLECTION, DEFAULT_COLLECTIONS, PROGRESS_COLLECTION};
use crate::retry::RetryPolicy;
use crate::store::BlobStorage;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "PROGRESS_RECOVERY";

/// 默认应用前缀（备份键 `<app>_progress_backup`）
pub const DEFAULT_APP_PREFIX: &str = "progress_tracker";

/// 派生指标超过该值即视为损坏
pub const DEFAULT_CORRUPTION_THRESHOLD: f64 = 1000.0;

pub const DEFAULT_METRIC_ID: &str = "efficiency_ratio";

/// 基准测试默认延迟目标
pub const DEFAULT_LATENCY_TARGET_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_app_prefix")]
    pub app_prefix: String,

    /// 需要对账的集合（按顺序处理）
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,

    #[serde(default = "default_progress_collection")]
    pub progress_collection: String,

    #[serde(default = "default_dashboard_collection")]
    pub dashboard_collection: String,

    #[serde(default)]
    pub metric: MetricGuardConfig,

    /// 云端同步的重试策略
    #[serde(default)]
    pub sync_retry: RetryPolicy,

    #[serde(default)]
    pub auto_backup: AutoBackupConfig,

    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

/// 派生指标损坏检测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricGuardConfig {
    #[serde(default = "default_metric_id")]
    pub id: String,
    #[serde(default = "default_corruption_threshold")]
    pub corruption_threshold: f64,
    #[serde(default)]
    pub safe_default: f64,
}

/// 自动备份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBackupConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 备份间隔（秒），默认 5 分钟
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// 首次备份前的延迟（秒），避免与启动争用资源
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_auto_backup_collections")]
    pub collections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_latency_target_ms")]
    pub latency_target_ms: u64,
}

fn default_app_prefix() -> String {
    DEFAULT_APP_PREFIX.to_string()
}

fn default_collections() -> Vec<String> {
    DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect()
}

fn default_progress_collection() -> String {
    PROGRESS_COLLECTION.to_string()
}

fn default_dashboard_collection() -> String {
    DASHBOARD_FIGURES_COLLECTION.to_string()
}

fn default_metric_id() -> String {
    DEFAULT_METRIC_ID.to_string()
}

fn default_corruption_threshold() -> f64 {
    DEFAULT_CORRUPTION_THRESHOLD
}

fn default_interval_secs() -> u64 {
    300
}

fn default_initial_delay_secs() -> u64 {
    30
}

fn default_auto_backup_collections() -> Vec<String> {
    vec![PROGRESS_COLLECTION.to_string()]
}

fn default_latency_target_ms() -> u64 {
    DEFAULT_LATENCY_TARGET_MS
}

impl Default for MetricGuardConfig {
    fn default() -> Self {
        Self {
            id: default_metric_id(),
            corruption_threshold: default_corruption_threshold(),
            safe_default: 0.0,
        }
    }
}

impl MetricGuardConfig {
    pub fn is_corrupt(&self, value: f64) -> bool {
        value > self.corruption_threshold
    }
}

impl Default for AutoBackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            collections: default_auto_backup_collections(),
        }
    }
}

impl AutoBackupConfig {
    pub fn interval(&self) -> Duration {
        // interval 为 0 会让 tokio 直接 panic
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            latency_target_ms: default_latency_target_ms(),
        }
    }
}

impl BenchmarkConfig {
    pub fn latency_target(&self) -> Duration {
        Duration::from_millis(self.latency_target_ms)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            app_prefix: default_app_prefix(),
            collections: default_collections(),
            progress_collection: default_progress_collection(),
            dashboard_collection: default_dashboard_collection(),
            metric: MetricGuardConfig::default(),
            sync_retry: RetryPolicy::default(),
            auto_backup: AutoBackupConfig::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl RecoveryConfig {
    /// 从可选 TOML 文件 + 环境变量加载
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // .env 不存在不是错误
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("collections")
                .with_list_parse_key("auto_backup.collections"),
        );

        let settings = builder.build().context("构建恢复配置失败")?;
        let config: RecoveryConfig = settings
            .try_deserialize()
            .context("解析恢复配置失败")?;
        Ok(config)
    }

    /// 配置在 Blob 存储中的键
    pub fn storage_key(app_prefix: &str) -> String {
        format!("{}_recovery_config", app_prefix)
    }

    /// 从 Blob 存储加载；不存在时返回默认配置
    pub async fn load_from(storage: &dyn BlobStorage, app_prefix: &str) -> Result<Self> {
        match storage.get(&Self::storage_key(app_prefix)).await? {
            Some(json_str) => {
                let config: RecoveryConfig =
                    serde_json::from_str(&json_str).context("解析已保存的恢复配置失败")?;
                Ok(config)
            }
            None => Ok(Self {
                app_prefix: app_prefix.to_string(),
                ..Self::default()
            }),
        }
    }

    pub async fn save_to(&self, storage: &dyn BlobStorage) -> Result<(), StoreError> {
        let json_str = serde_json::to_string(self)?;
        storage
            .set(&Self::storage_key(&self.app_prefix), &json_str)
            .await
    }

    /// 某个集合的备份键；默认集合为 `<app>_progress_backup`
    pub fn backup_key(&self, collection: &str) -> String {
        format!("{}_{}_backup", self.app_prefix, collection)
    }

    pub fn backup_meta_key(&self, collection: &str) -> String {
        format!("{}_meta", self.backup_key(collection))
    }
}

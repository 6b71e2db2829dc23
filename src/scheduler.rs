//! 自动备份调度器
//!
//! 由组合根显式持有的周期任务句柄：`start` 启动，`stop` 停止，
//! 句柄被 drop 时同样会取消任务。每个周期依次为配置的集合调用
//! `create_backup`；集合备份仍在进行（例如用户手动触发）时跳过本次。

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AutoBackupConfig;
use crate::error::RecoveryError;
use crate::recovery::RecoveryCoordinator;

/// 调度器运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBackupStats {
    pub ticks: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> AutoBackupStats {
        AutoBackupStats {
            ticks: self.ticks.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// 正在运行的自动备份任务
pub struct AutoBackupHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl AutoBackupHandle {
    /// 启动调度任务；必须在 tokio 运行时内调用
    pub fn start(coordinator: Arc<RecoveryCoordinator>, config: AutoBackupConfig) -> Self {
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let task = tokio::spawn(run_scheduler(
            coordinator,
            config,
            cancel.clone(),
            Arc::clone(&counters),
        ));

        Self {
            cancel,
            task: Some(task),
            counters,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stats(&self) -> AutoBackupStats {
        self.counters.snapshot()
    }

    /// 停止调度并等待任务退出（进行中的备份会先完成）
    pub async fn stop(mut self) -> AutoBackupStats {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[AutoBackup] 调度任务异常退出: {}", e);
            }
        }
        info!("[AutoBackup] 自动备份调度器已停止");
        self.counters.snapshot()
    }
}

impl Drop for AutoBackupHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_scheduler(
    coordinator: Arc<RecoveryCoordinator>,
    config: AutoBackupConfig,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) {
    info!(
        "[AutoBackup] 自动备份调度器已启动: interval={:?}, collections={:?}",
        config.interval(),
        config.collections
    );

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = sleep(config.initial_delay()) => {}
    }

    let mut ticker = interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                counters.ticks.fetch_add(1, Ordering::SeqCst);
                run_tick(&coordinator, &config.collections, &counters).await;
            }
        }
    }
}

async fn run_tick(coordinator: &RecoveryCoordinator, collections: &[String], counters: &Counters) {
    for collection in collections {
        match coordinator.create_backup(collection).await {
            Ok(report) => {
                counters.completed.fetch_add(1, Ordering::SeqCst);
                debug!(
                    "[AutoBackup] {} 自动备份完成: {} 条",
                    collection, report.item_count
                );
            }
            Err(RecoveryError::BackupInProgress { .. }) => {
                counters.skipped.fetch_add(1, Ordering::SeqCst);
                debug!("[AutoBackup] {} 的上一次备份仍在运行，跳过本次", collection);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!("[AutoBackup] {} 自动备份失败: {}", collection, e);
            }
        }
    }
}

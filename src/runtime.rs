//! 组合根
//!
//! 持有协调器和（可选的）自动备份句柄，由宿主应用在启动时创建、退出时关闭。

use std::sync::Arc;
use tracing::info;

use crate::config::RecoveryConfig;
use crate::recovery::{Collaborators, RecoveryCoordinator};
use crate::scheduler::{AutoBackupHandle, AutoBackupStats};

pub struct RecoveryRuntime {
    coordinator: Arc<RecoveryCoordinator>,
    auto_backup: Option<AutoBackupHandle>,
}

impl RecoveryRuntime {
    pub fn new(deps: Collaborators, config: RecoveryConfig) -> Self {
        Self {
            coordinator: Arc::new(RecoveryCoordinator::new(deps, config)),
            auto_backup: None,
        }
    }

    pub fn coordinator(&self) -> &Arc<RecoveryCoordinator> {
        &self.coordinator
    }

    /// 按配置启动后台任务；返回自动备份是否在运行
    pub fn start(&mut self) -> bool {
        if self.coordinator.config().auto_backup.enabled {
            self.start_auto_backup();
        } else {
            info!("[AutoBackup] 自动备份未启用");
        }
        self.is_auto_backup_running()
    }

    /// 启动自动备份（忽略配置开关）；已在运行时不重复启动
    pub fn start_auto_backup(&mut self) {
        if self.is_auto_backup_running() {
            return;
        }
        let config = self.coordinator.config().auto_backup.clone();
        self.auto_backup = Some(AutoBackupHandle::start(
            Arc::clone(&self.coordinator),
            config,
        ));
    }

    pub async fn stop_auto_backup(&mut self) -> Option<AutoBackupStats> {
        match self.auto_backup.take() {
            Some(handle) => Some(handle.stop().await),
            None => None,
        }
    }

    pub fn is_auto_backup_running(&self) -> bool {
        self.auto_backup
            .as_ref()
            .is_some_and(AutoBackupHandle::is_running)
    }

    pub fn auto_backup_stats(&self) -> Option<AutoBackupStats> {
        self.auto_backup.as_ref().map(AutoBackupHandle::stats)
    }

    pub async fn shutdown(mut self) {
        self.stop_auto_backup().await;
    }
}

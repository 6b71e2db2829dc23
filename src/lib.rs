//! Progress Recovery
//!
//! 学习进度应用的辅助工具：
//! - [`recovery::RecoveryCoordinator`]：本地缓存与云端数据对账、备份、恢复、派生指标修复
//! - [`scheduler::AutoBackupHandle`]：显式持有的自动备份周期任务
//! - [`runtime::RecoveryRuntime`]：组合根
//! - [`benchmark::BenchmarkRunner`]：交互耗时基准

pub mod benchmark;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod recovery;
pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use config::RecoveryConfig;
pub use error::{RecoveryError, Result, StoreError, StoreResult};
pub use models::{ProgressUpdate, Record, User};
pub use recovery::{Collaborators, RecoveryCoordinator};
pub use runtime::RecoveryRuntime;

//! 数据恢复模块
//!
//! ## 恢复优先级
//! 1. 云端可达且有数据：直接从云端读取并 upsert 到本地
//! 2. 本地备份存在：反序列化后按正常写路径回放
//! 3. 都没有：`NoRecoveryDataFound`
//!
//! ## 备份
//! 每个集合只保留最新一份快照（`<app>_<collection>_backup` + `_meta`），
//! 同一集合的备份按单飞方式执行，忙时直接跳过。

mod coordinator;
mod single_flight;
mod snapshot;
mod types;

pub use coordinator::{Collaborators, RecoveryCoordinator};
pub use single_flight::{FlightGuard, SingleFlight};
pub use snapshot::{decode_meta, decode_records, BackupSnapshot, EncodedSnapshot};
pub use types::{
    BackupMeta, BackupReport, IntegrityIssue, IntegrityReport, IssueKind, RecoveryReport,
    RecoverySource, RefreshReport, RepairReport,
};
